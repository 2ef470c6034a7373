#![forbid(unsafe_code)]
/*!
Patch application.
*/

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use log::debug;

use byteorder::{ByteOrder, LE};

use crate::compress::{Compression, Decoder};
use crate::error::{patch_read_error, Error, Result};
use crate::format::{read_header, PatchType};
use crate::varint::read_size;

/// Default copy buffer size; application never holds the whole body.
pub const BUFFER_SIZE: usize = 4096;

/// Fixed-width fields after an in-place header: segment count, shift size,
/// declared target size.
const IN_PLACE_FIELDS: usize = 12;

/// A parsed patch container, ready to apply.
///
/// Apply a patch to source data:
/// ```
/// use bindelta::Patch;
///
/// fn patch(source: &[u8], patch: &[u8]) -> bindelta::Result<Vec<u8>> {
///     let patcher = Patch::new(patch)?;
///     let mut target = Vec::with_capacity(patcher.hint_target_size() as usize);
///     patcher.apply(source, &mut target)?;
///     Ok(target)
/// }
/// ```
pub struct Patch<'p> {
    patch_type: PatchType,
    compression: Compression,
    metadata: Option<Vec<u8>>,
    to_size: u64,
    segment_count: u32,
    shift_size: u32,
    body: &'p [u8],
    buffer_size: usize,
}

impl<'p> Patch<'p> {
    /// Parse the container header and create a patcher configuration.
    pub fn new(patch: &'p [u8]) -> Result<Self> {
        let mut r = Cursor::new(patch);
        let header = read_header(&mut r)?;

        let mut segment_count = 0;
        let mut shift_size = 0;
        let to_size;
        match header.patch_type {
            PatchType::Normal => {
                let declared = read_size(&mut r).map_err(patch_read_error)?;
                if declared < 0 {
                    return Err(Error::format("negative target size"));
                }
                to_size = declared as u64;
            }
            PatchType::InPlace => {
                let at = r.position() as usize;
                if patch.len() - at < IN_PLACE_FIELDS {
                    return Err(Error::truncated("missing in-place fields"));
                }
                segment_count = LE::read_u32(&patch[at..]);
                shift_size = LE::read_u32(&patch[at + 4..]);
                to_size = u64::from(LE::read_u32(&patch[at + 8..]));
                r.set_position((at + IN_PLACE_FIELDS) as u64);
            }
        }

        let body = &patch[r.position() as usize..];
        debug!(
            "parsed {:?} patch: compression {}, target size {}",
            header.patch_type, header.compression, to_size
        );
        Ok(Patch {
            patch_type: header.patch_type,
            compression: header.compression,
            metadata: header.metadata,
            to_size,
            segment_count,
            shift_size,
            body,
            buffer_size: BUFFER_SIZE,
        })
    }

    /// Set the copy buffer size (`bs >= 128`, default is `BUFFER_SIZE`).
    pub fn buffer_size(mut self, mut bs: usize) -> Self {
        if bs < 128 {
            bs = 128;
        }
        self.buffer_size = bs;
        self
    }

    /// The final target size, as declared in the patch header.
    pub fn hint_target_size(&self) -> u64 {
        self.to_size
    }

    pub fn patch_type(&self) -> PatchType {
        self.patch_type
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// User metadata from the extension block, if any.
    pub fn metadata(&self) -> Option<&[u8]> {
        self.metadata.as_deref()
    }

    pub(crate) fn body(&self) -> &'p [u8] {
        self.body
    }

    pub(crate) fn segment_count(&self) -> u32 {
        self.segment_count
    }

    pub(crate) fn shift_size(&self) -> u32 {
        self.shift_size
    }

    /// Apply the patch to the source data and write the target stream.
    ///
    /// The target size would be returned if no error occurs.
    pub fn apply<W: Write>(&self, source: &[u8], target: W) -> Result<u64> {
        if self.patch_type != PatchType::Normal {
            return Err(Error::format(
                "in-place patch requires apply_in_place_patch",
            ));
        }
        let body = Decoder::new(self.compression, Cursor::new(self.body))?;
        let ctx = Context::new(body, source, target, self.to_size, self.buffer_size);
        ctx.run()
    }
}

/// Apply a patch with the default configuration.
pub fn apply_patch(source: &[u8], patch: &[u8]) -> Result<Vec<u8>> {
    let patcher = Patch::new(patch)?;
    let mut target = Vec::with_capacity(patcher.hint_target_size() as usize);
    patcher.apply(source, &mut target)?;
    Ok(target)
}

/// Chunk replay state machine.
struct Context<'s, R: Read, W: Write> {
    body: R,
    source: Cursor<&'s [u8]>,
    target: W,
    to_size: u64,
    total: u64,
    buf: Vec<u8>,
    dlt: Vec<u8>,
}

impl<'s, R: Read, W: Write> Context<'s, R, W> {
    fn new(body: R, source: &'s [u8], target: W, to_size: u64, bsize: usize) -> Self {
        Context {
            body,
            source: Cursor::new(source),
            target,
            to_size,
            total: 0,
            buf: vec![0; bsize],
            dlt: vec![0; bsize],
        }
    }

    fn run(mut self) -> Result<u64> {
        while self.total < self.to_size {
            let diff = self.next_size()?;
            if self.total + diff > self.to_size {
                return Err(Error::size_mismatch("diff data too long"));
            }
            self.add(diff)?;

            let extra = self.next_size()?;
            if self.total + extra > self.to_size {
                return Err(Error::size_mismatch("extra data too long"));
            }
            self.copy(extra)?;

            let adjust = read_size(&mut self.body).map_err(patch_read_error)?;
            self.seek(adjust)?;
        }

        // The declared size has been produced; the body must be exhausted.
        let mut probe = [0u8; 1];
        match self.body.read(&mut probe) {
            Ok(0) => {}
            Ok(_) => return Err(Error::size_mismatch("trailing data after patch body")),
            Err(e) => return Err(patch_read_error(e)),
        }
        self.target.flush()?;
        Ok(self.total)
    }

    /// Read a non-negative chunk length from the body.
    fn next_size(&mut self) -> Result<u64> {
        let n = read_size(&mut self.body).map_err(patch_read_error)?;
        if n < 0 {
            return Err(Error::format("negative chunk length"));
        }
        Ok(n as u64)
    }

    /// Add decompressed diff bytes to source bytes and write the result.
    fn add(&mut self, mut count: u64) -> Result<()> {
        while count > 0 {
            let k = Ord::min(count, self.buf.len() as u64) as usize;
            self.source
                .read_exact(&mut self.buf[..k])
                .map_err(|_| Error::format("patch reads outside source data"))?;
            self.body
                .read_exact(&mut self.dlt[..k])
                .map_err(patch_read_error)?;
            for i in 0..k {
                self.buf[i] = self.buf[i].wrapping_add(self.dlt[i]);
            }
            self.target.write_all(&self.buf[..k])?;
            self.total += k as u64;
            count -= k as u64;
        }
        Ok(())
    }

    /// Copy decompressed extra bytes straight to the target.
    fn copy(&mut self, mut count: u64) -> Result<()> {
        while count > 0 {
            let k = Ord::min(count, self.buf.len() as u64) as usize;
            self.body
                .read_exact(&mut self.buf[..k])
                .map_err(patch_read_error)?;
            self.target.write_all(&self.buf[..k])?;
            self.total += k as u64;
            count -= k as u64;
        }
        Ok(())
    }

    /// Move the cursor on the source.
    fn seek(&mut self, offset: i64) -> Result<()> {
        self.source
            .seek(SeekFrom::Current(offset))
            .map_err(|_| Error::format("patch seeks source out of range"))?;
        Ok(())
    }
}
