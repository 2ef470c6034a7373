#![forbid(unsafe_code)]
/*!
Container header layout.

One leading byte packs `{extension present: 1, patch type: 3,
compression id: 4}`. When the extension bit is set, a length-prefixed block
of typed sub-records follows; record tag 0 carries arbitrary user metadata,
unknown tags are skipped via their length prefix. Size fields after the
header are format specific: normal containers use the varint size encoding,
in-place containers use fixed-width little-endian words.
*/

use std::io::{Cursor, Read, Write};

use crate::compress::Compression;
use crate::error::{Error, Result};
use crate::varint::{read_size, write_size};

/// Wire values of the 3-bit patch type field.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PatchType {
    /// Whole-buffer patch applied source to target.
    Normal,
    /// Segmented patch applied inside the storage holding the source.
    InPlace,
}

impl PatchType {
    pub fn id(self) -> u8 {
        match self {
            PatchType::Normal => 0,
            PatchType::InPlace => 1,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(PatchType::Normal),
            1 => Some(PatchType::InPlace),
            _ => None,
        }
    }
}

/// Extension record tag for user metadata.
const RECORD_METADATA: u8 = 0;

/// Decoded container header.
pub(crate) struct Header {
    pub patch_type: PatchType,
    pub compression: Compression,
    pub metadata: Option<Vec<u8>>,
}

pub(crate) fn write_header<W: Write>(
    w: &mut W,
    patch_type: PatchType,
    compression: Compression,
    metadata: Option<&[u8]>,
) -> Result<()> {
    let mut byte = (patch_type.id() << 4) | compression.id();
    if metadata.is_some() {
        byte |= 0x80;
    }
    w.write_all(&[byte])?;

    if let Some(metadata) = metadata {
        let mut block = Vec::with_capacity(metadata.len() + 4);
        block.push(RECORD_METADATA);
        write_size(&mut block, metadata.len() as i64)?;
        block.extend_from_slice(metadata);

        write_size(w, block.len() as i64)?;
        w.write_all(&block)?;
    }
    Ok(())
}

pub(crate) fn read_header<R: Read>(r: &mut R) -> Result<Header> {
    let mut byte = [0u8; 1];
    r.read_exact(&mut byte)
        .map_err(|_| Error::truncated("missing patch header"))?;

    let extension = byte[0] & 0x80 != 0;
    let type_id = (byte[0] >> 4) & 0x07;
    let compression_id = byte[0] & 0x0f;

    let patch_type = PatchType::from_id(type_id)
        .ok_or_else(|| Error::format(format!("unknown patch type {}", type_id)))?;
    let compression = Compression::from_id(compression_id)
        .ok_or_else(|| Error::format(format!("unknown compression {}", compression_id)))?;

    let metadata = if extension { read_extension(r)? } else { None };

    Ok(Header {
        patch_type,
        compression,
        metadata,
    })
}

fn read_extension<R: Read>(r: &mut R) -> Result<Option<Vec<u8>>> {
    let block_len = read_size(r).map_err(|_| Error::truncated("missing extension block"))?;
    if block_len < 0 {
        return Err(Error::format("negative extension block length"));
    }
    let mut block = vec![0u8; block_len as usize];
    r.read_exact(&mut block)
        .map_err(|_| Error::truncated("extension block cut short"))?;

    let mut records = Cursor::new(&block[..]);
    let mut metadata = None;
    while (records.position() as usize) < block.len() {
        let mut tag = [0u8; 1];
        records
            .read_exact(&mut tag)
            .map_err(|_| Error::format("bad extension record"))?;
        let len = read_size(&mut records).map_err(|_| Error::format("bad extension record"))?;
        if len < 0 {
            return Err(Error::format("negative extension record length"));
        }
        let mut payload = vec![0u8; len as usize];
        records
            .read_exact(&mut payload)
            .map_err(|_| Error::format("extension record cut short"))?;
        if tag[0] == RECORD_METADATA && metadata.is_none() {
            metadata = Some(payload);
        }
    }
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(patch_type: PatchType, compression: Compression, metadata: Option<&[u8]>) -> Header {
        let mut out = Vec::new();
        write_header(&mut out, patch_type, compression, metadata).unwrap();
        read_header(&mut Cursor::new(&out[..])).unwrap()
    }

    #[test]
    fn plain_header_is_one_byte() {
        let mut out = Vec::new();
        write_header(&mut out, PatchType::Normal, Compression::Crle, None).unwrap();
        assert_eq!(out, [0x01]);

        let mut out = Vec::new();
        write_header(&mut out, PatchType::InPlace, Compression::None, None).unwrap();
        assert_eq!(out, [0x10]);
    }

    #[test]
    fn header_roundtrip() {
        let header = roundtrip(PatchType::Normal, Compression::Bz2, Some(b"v1.2 nightly"));
        assert_eq!(header.patch_type, PatchType::Normal);
        assert_eq!(header.compression, Compression::Bz2);
        assert_eq!(header.metadata.as_deref(), Some(&b"v1.2 nightly"[..]));
    }

    #[test]
    fn unknown_ids_are_fatal() {
        assert!(matches!(
            read_header(&mut Cursor::new(&[0x7f][..])),
            Err(Error::Format(_))
        ));
        assert!(matches!(
            read_header(&mut Cursor::new(&[0x0f][..])),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn unknown_extension_records_are_skipped() {
        // Record tag 9 precedes the metadata record.
        let mut out = Vec::new();
        let mut block = vec![9u8, 0x02, 0xaa, 0xbb];
        block.push(RECORD_METADATA);
        block.push(0x02);
        block.extend_from_slice(b"ok");
        out.push(0x80);
        write_size(&mut out, block.len() as i64).unwrap();
        out.extend_from_slice(&block);

        let header = read_header(&mut Cursor::new(&out[..])).unwrap();
        assert_eq!(header.metadata.as_deref(), Some(&b"ok"[..]));
    }

    #[test]
    fn truncated_header_reports_truncation() {
        assert!(matches!(
            read_header(&mut Cursor::new(&[][..])),
            Err(Error::Truncated(_))
        ));
        // Extension bit set but no block follows.
        assert!(matches!(
            read_header(&mut Cursor::new(&[0x80][..])),
            Err(Error::Truncated(_))
        ));
    }
}
