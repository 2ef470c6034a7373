#![forbid(unsafe_code)]
/*!
In-place patches.

The target image is rebuilt segment by segment inside the storage that
holds the source image. Before any segment is applied the whole buffer is
shifted `shift_size` bytes towards the end; every segment's source window
then starts at or beyond its own write end, so writing a segment never
destroys bytes a later segment still reads. The margin is established at
build time and carried in the container; the applier relies on it instead
of locking.
*/

use std::io::{Cursor, Write};

use byteorder::{ByteOrder, WriteBytesExt, LE};
use log::debug;

use crate::apply::Patch;
use crate::compress::Compression;
use crate::create::Delta;
use crate::error::{Error, Result};
use crate::format::{write_header, PatchType};

/// Builder for in-place patch containers.
///
/// `memory_size` is the size of the storage region holding the image and
/// must be a multiple of `segment_size`. The optional minimum shift size
/// defaults to twice the segment size and must also be a multiple of it.
pub struct InPlaceDelta<'s, 't> {
    s: &'s [u8],
    t: &'t [u8],
    memory_size: usize,
    segment_size: usize,
    minimum_shift_size: Option<usize>,
    compression: Compression,
    metadata: Option<Vec<u8>>,
}

impl<'s, 't> InPlaceDelta<'s, 't> {
    /// Create new configuration for in-place delta compression.
    pub fn new(
        source: &'s [u8],
        target: &'t [u8],
        memory_size: usize,
        segment_size: usize,
    ) -> Self {
        InPlaceDelta {
            s: source,
            t: target,
            memory_size,
            segment_size,
            minimum_shift_size: None,
            compression: Compression::Crle,
            metadata: None,
        }
    }

    /// Override the minimum shift size (default is `2 * segment_size`).
    pub fn minimum_shift_size(mut self, size: usize) -> Self {
        self.minimum_shift_size = Some(size);
        self
    }

    /// Set the compression of the embedded segment patches.
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Attach user metadata, stored in the container's extension block.
    pub fn metadata(mut self, bytes: &[u8]) -> Self {
        self.metadata = Some(bytes.to_vec());
        self
    }

    /// Build the segmented container and write it out.
    ///
    /// The size of the patch would be returned if no error occurs.
    pub fn create<W: Write>(&self, patch: W) -> Result<u64> {
        let shift = self.validate()?;
        let kept = Ord::min(self.s.len(), self.memory_size - Ord::min(shift, self.memory_size));
        let source = &self.s[..kept];

        let count = ceil_div(self.t.len(), self.segment_size);
        debug!(
            "in-place: {} segments of {} bytes, shift {}",
            count, self.segment_size, shift
        );
        let segments = self.build_segments(source, shift, count)?;

        let mut out = patch;
        let mut written = 0u64;
        let mut head = Vec::new();
        write_header(
            &mut head,
            PatchType::InPlace,
            self.compression,
            self.metadata.as_deref(),
        )?;
        head.write_u32::<LE>(count as u32)?;
        head.write_u32::<LE>(as_field(shift, "shift size")?)?;
        head.write_u32::<LE>(as_field(self.t.len(), "target size")?)?;
        out.write_all(&head)?;
        written += head.len() as u64;

        for (from_offset, bytes) in segments {
            let mut record = [0u8; 8];
            LE::write_u32(&mut record[..4], from_offset);
            LE::write_u32(&mut record[4..], as_field(bytes.len(), "segment patch size")?);
            out.write_all(&record)?;
            out.write_all(&bytes)?;
            written += 8 + bytes.len() as u64;
        }
        out.flush()?;
        Ok(written)
    }

    /// Check the geometry and compute the shift size.
    fn validate(&self) -> Result<usize> {
        let seg = self.segment_size;
        if seg == 0 {
            return Err(Error::config("segment size must not be zero"));
        }
        if self.memory_size % seg != 0 {
            return Err(Error::config(format!(
                "memory size {} is not a multiple of segment size {}",
                self.memory_size, seg
            )));
        }
        let minimum = self.minimum_shift_size.unwrap_or(2 * seg);
        if minimum % seg != 0 {
            return Err(Error::config(format!(
                "minimum shift size {} is not a multiple of segment size {}",
                minimum, seg
            )));
        }
        if self.s.len() > self.memory_size {
            return Err(Error::config(format!(
                "source data of {} bytes does not fit memory size {}",
                self.s.len(),
                self.memory_size
            )));
        }
        if self.t.len() > self.memory_size {
            return Err(Error::config(format!(
                "target data of {} bytes does not fit memory size {}",
                self.t.len(),
                self.memory_size
            )));
        }
        if self.memory_size > u32::max_value() as usize {
            return Err(Error::config(format!(
                "memory size {} does not fit the container fields",
                self.memory_size
            )));
        }

        let slack = (ceil_div(self.memory_size, seg) - ceil_div(self.s.len(), seg)) * seg;
        Ok(Ord::max(minimum, slack))
    }

    /// One normal patch per target segment, shifted source window.
    fn segment(&self, source: &[u8], shift: usize, i: usize) -> Result<(u32, Vec<u8>)> {
        let seg = self.segment_size;
        let from_offset = (i * seg + seg).saturating_sub(shift);
        let window = &source[Ord::min(from_offset, source.len())..];
        let target = &self.t[i * seg..Ord::min((i + 1) * seg, self.t.len())];

        let mut bytes = Vec::new();
        Delta::new(window, target)
            .compression(self.compression)
            .create(&mut bytes)?;
        Ok((from_offset as u32, bytes))
    }

    #[cfg(feature = "parallel")]
    fn build_segments(&self, source: &[u8], shift: usize, count: usize) -> Result<Vec<(u32, Vec<u8>)>> {
        use rayon::prelude::*;
        (0..count)
            .into_par_iter()
            .map(|i| self.segment(source, shift, i))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn build_segments(&self, source: &[u8], shift: usize, count: usize) -> Result<Vec<(u32, Vec<u8>)>> {
        (0..count).map(|i| self.segment(source, shift, i)).collect()
    }
}

/// Create an in-place patch with the default configuration.
pub fn create_in_place_patch(
    source: &[u8],
    target: &[u8],
    memory_size: usize,
    segment_size: usize,
    minimum_shift_size: Option<usize>,
) -> Result<Vec<u8>> {
    let mut delta = InPlaceDelta::new(source, target, memory_size, segment_size);
    if let Some(size) = minimum_shift_size {
        delta = delta.minimum_shift_size(size);
    }
    let mut patch = Vec::new();
    delta.create(&mut patch)?;
    Ok(patch)
}

/// Apply an in-place patch inside `memory`, which initially holds the
/// source image. On success the first `target size` bytes of `memory` hold
/// the target image; the rest is scratch. Returns the target size.
///
/// The buffer must be at least as long as the shift size and the target
/// size; callers updating real storage pass the whole memory region.
pub fn apply_in_place_patch(memory: &mut [u8], patch: &[u8]) -> Result<u64> {
    let patcher = Patch::new(patch)?;
    if patcher.patch_type() != PatchType::InPlace {
        return Err(Error::format("not an in-place patch"));
    }
    let shift = patcher.shift_size() as usize;
    let to_size = patcher.hint_target_size();
    if (memory.len() as u64) < to_size {
        return Err(Error::size_mismatch(format!(
            "memory of {} bytes cannot hold the {} byte target",
            memory.len(),
            to_size
        )));
    }
    if memory.len() < shift {
        return Err(Error::size_mismatch(format!(
            "memory of {} bytes is smaller than the shift size {}",
            memory.len(),
            shift
        )));
    }

    // Move the source image clear of the write region.
    if shift > 0 {
        memory.copy_within(0..memory.len() - shift, shift);
    }

    let body = patcher.body();
    let mut at = 0usize;
    let mut write_pos = 0usize;
    for _ in 0..patcher.segment_count() {
        if body.len() - at < 8 {
            return Err(Error::truncated("segment record cut short"));
        }
        let from_offset = LE::read_u32(&body[at..]) as usize;
        let patch_len = LE::read_u32(&body[at + 4..]) as usize;
        at += 8;
        if body.len() - at < patch_len {
            return Err(Error::truncated("segment patch cut short"));
        }
        let segment = &body[at..at + patch_len];
        at += patch_len;

        let sub = Patch::new(segment)?;
        if sub.patch_type() != PatchType::Normal {
            return Err(Error::format("nested in-place segment"));
        }
        let out_len = sub.hint_target_size() as usize;

        let split = from_offset
            .checked_add(shift)
            .filter(|&split| split <= memory.len())
            .ok_or_else(|| Error::format("segment source window out of range"))?;
        if write_pos + out_len > split {
            return Err(Error::format("segment write region overlaps its source"));
        }
        if (write_pos + out_len) as u64 > to_size {
            return Err(Error::size_mismatch("segments exceed declared target size"));
        }

        let (dst, src) = memory.split_at_mut(split);
        sub.apply(src, Cursor::new(&mut dst[write_pos..write_pos + out_len]))?;
        write_pos += out_len;
    }

    if at != body.len() {
        return Err(Error::size_mismatch("trailing data after last segment"));
    }
    if write_pos as u64 != to_size {
        return Err(Error::size_mismatch(
            "segments do not cover declared target size",
        ));
    }
    Ok(to_size)
}

fn ceil_div(x: usize, y: usize) -> usize {
    if x % y == 0 {
        x / y
    } else {
        x / y + 1
    }
}

fn as_field(value: usize, what: &str) -> Result<u32> {
    if value > u32::max_value() as usize {
        return Err(Error::config(format!(
            "{} {} does not fit the container fields",
            what, value
        )));
    }
    Ok(value as u32)
}
