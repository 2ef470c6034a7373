#![forbid(unsafe_code)]
/*!
Patch creation.
*/

use std::io::{Result as IoResult, Write};

use log::debug;

use crate::compress::{Compression, Encoder};
use crate::diff::DiffChunks;
use crate::error::Result;
use crate::format::{write_header, PatchType};
use crate::sais::suffix_array;
use crate::varint::write_size;

/// Default buffer size for delta calculation.
pub const BUFFER_SIZE: usize = 4096;

/// Delta compressor producing a normal patch container.
///
/// Source data size should not be greater than `sais::MAX_LENGTH`.
///
/// Compare source with target and generate a patch:
/// ```
/// use bindelta::{Compression, Delta};
///
/// fn make_patch(source: &[u8], target: &[u8]) -> bindelta::Result<Vec<u8>> {
///     let mut patch = Vec::new();
///     Delta::new(source, target)
///         .compression(Compression::Crle)
///         .create(&mut patch)?;
///     Ok(patch)
/// }
/// ```
pub struct Delta<'s, 't> {
    s: &'s [u8],
    t: &'t [u8],
    compression: Compression,
    bsize: usize,
    metadata: Option<Vec<u8>>,
}

impl<'s, 't> Delta<'s, 't> {
    /// Create new configuration for delta compression.
    pub fn new(source: &'s [u8], target: &'t [u8]) -> Self {
        Delta {
            s: source,
            t: target,
            compression: Compression::Crle,
            bsize: BUFFER_SIZE,
            metadata: None,
        }
    }

    /// Set the body compression (default is `Compression::Crle`).
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Set the buffer size for delta calculation (`bs >= 128`, default is
    /// `BUFFER_SIZE`).
    pub fn buffer_size(mut self, mut bs: usize) -> Self {
        if bs < 128 {
            bs = 128;
        }
        self.bsize = bs;
        self
    }

    /// Attach user metadata, stored in the container's extension block.
    pub fn metadata(mut self, bytes: &[u8]) -> Self {
        self.metadata = Some(bytes.to_vec());
        self
    }

    /// Search for matches and write the patch container.
    ///
    /// The size of the patch would be returned if no error occurs.
    ///
    /// Panics if the length of source data is greater than
    /// `sais::MAX_LENGTH`.
    pub fn create<W: Write>(&self, patch: W) -> Result<u64> {
        let sa = suffix_array(self.s);
        let chunks = DiffChunks::new(&sa, self.s, self.t);
        pack(
            self.s,
            self.t,
            chunks,
            patch,
            self.compression,
            self.metadata.as_deref(),
            self.bsize,
        )
    }
}

/// Create a patch with the default configuration.
pub fn create_patch(source: &[u8], target: &[u8]) -> Result<Vec<u8>> {
    let mut patch = Vec::new();
    Delta::new(source, target).create(&mut patch)?;
    Ok(patch)
}

/// Construct the patch container from chunk instructions.
fn pack<D, W>(
    s: &[u8],
    t: &[u8],
    chunks: D,
    patch: W,
    compression: Compression,
    metadata: Option<&[u8]>,
    bsize: usize,
) -> Result<u64>
where
    D: Iterator<Item = crate::diff::Control>,
    W: Write,
{
    let mut out = CountingWriter::new(patch);
    write_header(&mut out, PatchType::Normal, compression, metadata)?;
    write_size(&mut out, t.len() as i64)?;

    let mut body = Encoder::new(compression, &mut out)?;
    let mut spos = 0usize;
    let mut tpos = 0usize;
    let mut emitted = 0usize;
    let mut dat = Vec::with_capacity(bsize);

    for ctl in chunks {
        write_size(&mut body, ctl.diff as i64)?;

        // Compute and write delta data, using the limited buffer `dat`.
        let mut n = ctl.diff as usize;
        while n > 0 {
            let k = Ord::min(n, bsize);
            dat.clear();
            dat.extend(
                Iterator::zip(s[spos..].iter(), t[tpos..].iter())
                    .map(|(x, y)| y.wrapping_sub(*x))
                    .take(k),
            );
            body.write_all(&dat)?;
            spos += k;
            tpos += k;
            n -= k;
        }

        write_size(&mut body, ctl.extra as i64)?;
        body.write_all(&t[tpos..tpos + ctl.extra as usize])?;
        tpos += ctl.extra as usize;

        write_size(&mut body, ctl.adjust)?;
        spos = (spos as i64 + ctl.adjust) as usize;
        emitted += 1;
    }
    body.finish()?;

    debug!(
        "packed {} chunks ({} target bytes) into {} patch bytes",
        emitted,
        t.len(),
        out.count
    );
    Ok(out.count)
}

/// Byte-counting writer wrapper.
struct CountingWriter<W: Write> {
    w: W,
    count: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(w: W) -> Self {
        CountingWriter { w, count: 0 }
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        let n = self.w.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> IoResult<()> {
        self.w.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_to_empty_container() {
        let mut patch = Vec::new();
        Delta::new(b"", b"")
            .compression(Compression::None)
            .create(&mut patch)
            .unwrap();
        // Header byte, target size, no body.
        assert_eq!(patch, [0x00, 0x00]);

        let mut patch = Vec::new();
        Delta::new(b"", b"")
            .compression(Compression::Crle)
            .create(&mut patch)
            .unwrap();
        // The CRLE flush emits one empty scattered segment.
        assert_eq!(patch, [0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn reported_size_matches_output() {
        let mut patch = Vec::new();
        let n = Delta::new(b"old old old", b"new new new")
            .create(&mut patch)
            .unwrap();
        assert_eq!(n, patch.len() as u64);
    }

    #[test]
    fn deterministic_output() {
        let s = b"some source buffer with repeated repeated content";
        let t = b"some target buffer with repeated repeated contents";
        assert_eq!(create_patch(s, t).unwrap(), create_patch(s, t).unwrap());
    }
}
