#![forbid(unsafe_code)]
/*!
Patch inspection without application.
*/

use std::io::{Cursor, Read};

use byteorder::{ByteOrder, LE};

use crate::apply::Patch;
use crate::compress::{Compression, Decoder};
use crate::error::{patch_read_error, Error, Result};
use crate::format::PatchType;
use crate::varint::read_size;

/// Per-chunk statistics of a normal patch body.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ChunkInfo {
    pub diff: u64,
    pub extra: u64,
    pub adjust: i64,
}

/// Statistics of a normal patch.
#[derive(Debug, Clone)]
pub struct NormalInfo {
    pub compression: Compression,
    pub patch_size: u64,
    pub to_size: u64,
    pub metadata: Option<Vec<u8>>,
    pub chunks: Vec<ChunkInfo>,
    /// Total bytes produced from diffed spans.
    pub diff_size: u64,
    /// Total literal bytes.
    pub extra_size: u64,
}

/// Statistics of one in-place segment.
#[derive(Debug, Clone)]
pub struct SegmentInfo {
    pub from_offset: u64,
    pub info: NormalInfo,
}

/// Statistics of an in-place patch.
#[derive(Debug, Clone)]
pub struct InPlaceInfo {
    pub compression: Compression,
    pub patch_size: u64,
    pub to_size: u64,
    pub shift_size: u64,
    pub metadata: Option<Vec<u8>>,
    pub segments: Vec<SegmentInfo>,
}

/// Statistics of a patch container.
#[derive(Debug, Clone)]
pub enum PatchInfo {
    Normal(NormalInfo),
    InPlace(InPlaceInfo),
}

/// Inspect a patch container.
///
/// The whole body is decoded to collect chunk statistics, but no source
/// data is required and no target data is produced.
pub fn patch_info(patch: &[u8]) -> Result<PatchInfo> {
    let patcher = Patch::new(patch)?;
    match patcher.patch_type() {
        PatchType::Normal => Ok(PatchInfo::Normal(normal_info(&patcher, patch.len() as u64)?)),
        PatchType::InPlace => {
            let body = patcher.body();
            let mut at = 0usize;
            let mut segments = Vec::with_capacity(patcher.segment_count() as usize);
            for _ in 0..patcher.segment_count() {
                if body.len() - at < 8 {
                    return Err(Error::truncated("segment record cut short"));
                }
                let from_offset = LE::read_u32(&body[at..]) as u64;
                let patch_len = LE::read_u32(&body[at + 4..]) as usize;
                at += 8;
                if body.len() - at < patch_len {
                    return Err(Error::truncated("segment patch cut short"));
                }
                let sub = Patch::new(&body[at..at + patch_len])?;
                if sub.patch_type() != PatchType::Normal {
                    return Err(Error::format("nested in-place segment"));
                }
                segments.push(SegmentInfo {
                    from_offset,
                    info: normal_info(&sub, patch_len as u64)?,
                });
                at += patch_len;
            }
            if at != body.len() {
                return Err(Error::size_mismatch("trailing data after last segment"));
            }
            Ok(PatchInfo::InPlace(InPlaceInfo {
                compression: patcher.compression(),
                patch_size: patch.len() as u64,
                to_size: patcher.hint_target_size(),
                shift_size: u64::from(patcher.shift_size()),
                metadata: patcher.metadata().map(<[u8]>::to_vec),
                segments,
            }))
        }
    }
}

fn normal_info(patcher: &Patch<'_>, patch_size: u64) -> Result<NormalInfo> {
    let to_size = patcher.hint_target_size();
    let mut body = Decoder::new(patcher.compression(), Cursor::new(patcher.body()))?;
    let mut chunks = Vec::new();
    let mut diff_size = 0u64;
    let mut extra_size = 0u64;
    let mut total = 0u64;

    while total < to_size {
        let diff = next_size(&mut body)?;
        if total + diff > to_size {
            return Err(Error::size_mismatch("diff data too long"));
        }
        skip(&mut body, diff)?;
        total += diff;
        diff_size += diff;

        let extra = next_size(&mut body)?;
        if total + extra > to_size {
            return Err(Error::size_mismatch("extra data too long"));
        }
        skip(&mut body, extra)?;
        total += extra;
        extra_size += extra;

        let adjust = read_size(&mut body).map_err(patch_read_error)?;
        chunks.push(ChunkInfo {
            diff,
            extra,
            adjust,
        });
    }

    let mut probe = [0u8; 1];
    match body.read(&mut probe) {
        Ok(0) => {}
        Ok(_) => return Err(Error::size_mismatch("trailing data after patch body")),
        Err(e) => return Err(patch_read_error(e)),
    }

    Ok(NormalInfo {
        compression: patcher.compression(),
        patch_size,
        to_size,
        metadata: patcher.metadata().map(<[u8]>::to_vec),
        chunks,
        diff_size,
        extra_size,
    })
}

fn next_size<R: Read>(body: &mut R) -> Result<u64> {
    let n = read_size(body).map_err(patch_read_error)?;
    if n < 0 {
        return Err(Error::format("negative chunk length"));
    }
    Ok(n as u64)
}

fn skip<R: Read>(body: &mut R, mut count: u64) -> Result<()> {
    let mut scratch = [0u8; 4096];
    while count > 0 {
        let k = Ord::min(count, scratch.len() as u64) as usize;
        body.read_exact(&mut scratch[..k])
            .map_err(patch_read_error)?;
        count -= k as u64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create::Delta;
    use crate::inplace::create_in_place_patch;

    #[test]
    fn normal_info_counts_bytes() {
        let s = b"an old buffer with some content";
        let t = b"a new buffer with more content than before";
        let mut patch = Vec::new();
        Delta::new(s, t)
            .metadata(b"release 7")
            .create(&mut patch)
            .unwrap();

        match patch_info(&patch).unwrap() {
            PatchInfo::Normal(info) => {
                assert_eq!(info.to_size, t.len() as u64);
                assert_eq!(info.patch_size, patch.len() as u64);
                assert_eq!(info.diff_size + info.extra_size, t.len() as u64);
                assert_eq!(info.metadata.as_deref(), Some(&b"release 7"[..]));
                assert!(!info.chunks.is_empty());
            }
            other => panic!("expected normal info, got {:?}", other),
        }
    }

    #[test]
    fn in_place_info_lists_segments() {
        let s = b"old image contents here.";
        let t = b"new image contents there";
        let patch = create_in_place_patch(s, t, 64, 8, None).unwrap();

        match patch_info(&patch).unwrap() {
            PatchInfo::InPlace(info) => {
                assert_eq!(info.to_size, t.len() as u64);
                assert_eq!(info.segments.len(), 3);
                let covered: u64 = info.segments.iter().map(|s| s.info.to_size).sum();
                assert_eq!(covered, t.len() as u64);
                assert!(info.shift_size >= 16);
            }
            other => panic!("expected in-place info, got {:?}", other),
        }
    }
}
