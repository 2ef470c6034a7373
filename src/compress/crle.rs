#![forbid(unsafe_code)]
/*!
Conditional run-length encoding.

The stream is a sequence of tagged segments: `0x00` (scattered) followed by
a size field and that many raw bytes, or `0x01` (repeated) followed by a
repeat count and the single byte to repeat. A run of identical bytes is
only worth a repeated segment once it reaches `MIN_REPEAT`; everything else
stays scattered. Empty input encodes as one empty scattered segment.
*/

use std::io::{Error, ErrorKind, Read, Result, Write};

use crate::varint::{read_size, write_size};

/// Segment tag for raw bytes.
const SCATTERED: u8 = 0x00;

/// Segment tag for a repeated byte.
const REPEATED: u8 = 0x01;

/// Minimum run length encoded as a repeated segment.
const MIN_REPEAT: usize = 6;

/// CRLE compressor wrapping a writer.
pub struct CrleEncoder<W: Write> {
    w: W,
    run_byte: u8,
    run_len: usize,
    scattered: Vec<u8>,
    emitted: bool,
}

impl<W: Write> CrleEncoder<W> {
    pub fn new(w: W) -> Self {
        CrleEncoder {
            w,
            run_byte: 0,
            run_len: 0,
            scattered: Vec::new(),
            emitted: false,
        }
    }

    /// Terminate the stream and return the inner writer.
    pub fn finish(mut self) -> Result<W> {
        self.close_run()?;
        self.flush_scattered()?;
        if !self.emitted {
            self.w.write_all(&[SCATTERED])?;
            write_size(&mut self.w, 0)?;
        }
        self.w.flush()?;
        Ok(self.w)
    }

    fn push(&mut self, byte: u8) -> Result<()> {
        if self.run_len > 0 && byte == self.run_byte {
            self.run_len += 1;
        } else {
            self.close_run()?;
            self.run_byte = byte;
            self.run_len = 1;
        }
        Ok(())
    }

    /// The pending run either becomes a repeated segment or joins the
    /// scattered accumulator.
    fn close_run(&mut self) -> Result<()> {
        if self.run_len == 0 {
            return Ok(());
        }
        if self.run_len >= MIN_REPEAT {
            self.flush_scattered()?;
            self.w.write_all(&[REPEATED])?;
            write_size(&mut self.w, self.run_len as i64)?;
            self.w.write_all(&[self.run_byte])?;
            self.emitted = true;
        } else {
            let n = self.scattered.len() + self.run_len;
            self.scattered.resize(n, self.run_byte);
        }
        self.run_len = 0;
        Ok(())
    }

    fn flush_scattered(&mut self) -> Result<()> {
        if self.scattered.is_empty() {
            return Ok(());
        }
        self.w.write_all(&[SCATTERED])?;
        write_size(&mut self.w, self.scattered.len() as i64)?;
        self.w.write_all(&self.scattered)?;
        self.scattered.clear();
        self.emitted = true;
        Ok(())
    }
}

impl<W: Write> Write for CrleEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        for &byte in buf {
            self.push(byte)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        self.w.flush()
    }
}

enum Segment {
    Between,
    Scattered(u64),
    Repeated(u64, u8),
}

/// CRLE decompressor wrapping a reader; replays segments in order until the
/// underlying stream is exhausted.
pub struct CrleDecoder<R: Read> {
    r: R,
    segment: Segment,
}

impl<R: Read> CrleDecoder<R> {
    pub fn new(r: R) -> Self {
        CrleDecoder {
            r,
            segment: Segment::Between,
        }
    }

    fn read_count(&mut self, what: &str) -> Result<u64> {
        let n = read_size(&mut self.r)?;
        if n < 0 {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("negative {} in compressed data", what),
            ));
        }
        Ok(n as u64)
    }
}

impl<R: Read> Read for CrleDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            match self.segment {
                Segment::Between => {
                    let mut tag = [0u8; 1];
                    if self.r.read(&mut tag)? == 0 {
                        return Ok(0);
                    }
                    match tag[0] {
                        SCATTERED => {
                            let len = self.read_count("segment length")?;
                            self.segment = Segment::Scattered(len);
                        }
                        REPEATED => {
                            let count = self.read_count("repeat count")?;
                            let mut byte = [0u8; 1];
                            self.r.read_exact(&mut byte)?;
                            self.segment = Segment::Repeated(count, byte[0]);
                        }
                        tag => {
                            return Err(Error::new(
                                ErrorKind::InvalidData,
                                format!("unknown segment tag 0x{:02x}", tag),
                            ));
                        }
                    }
                }
                Segment::Scattered(0) | Segment::Repeated(0, _) => {
                    self.segment = Segment::Between;
                }
                Segment::Scattered(ref mut remaining) => {
                    let k = (*remaining).min(buf.len() as u64) as usize;
                    self.r.read_exact(&mut buf[..k])?;
                    *remaining -= k as u64;
                    return Ok(k);
                }
                Segment::Repeated(ref mut remaining, byte) => {
                    let k = (*remaining).min(buf.len() as u64) as usize;
                    for slot in buf[..k].iter_mut() {
                        *slot = byte;
                    }
                    *remaining -= k as u64;
                    return Ok(k);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use std::io::Cursor;

    fn compress(data: &[u8]) -> Vec<u8> {
        let mut enc = CrleEncoder::new(Vec::new());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn decompress(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        CrleDecoder::new(Cursor::new(data))
            .read_to_end(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn wire_vectors() {
        assert_eq!(compress(b""), b"\x00\x00");
        assert_eq!(compress(b"AAAAAA"), b"\x01\x06A");
        assert_eq!(compress(b"AAAAA"), b"\x00\x05AAAAA");
    }

    #[test]
    fn wire_vectors_invert() {
        assert_eq!(decompress(b"\x00\x00"), b"");
        assert_eq!(decompress(b"\x01\x06A"), b"AAAAAA");
        assert_eq!(decompress(b"\x00\x05AAAAA"), b"AAAAA");
    }

    #[test]
    fn mixed_segments() {
        let packed = compress(b"xyAAAAAAAz");
        assert_eq!(packed, b"\x00\x02xy\x01\x07A\x00\x01z");
        assert_eq!(decompress(&packed), b"xyAAAAAAAz");
    }

    #[test]
    fn run_at_threshold_boundaries() {
        // One byte short of a run stays scattered even mid-stream.
        assert_eq!(compress(b"zBBBBB"), b"\x00\x06zBBBBB");
        assert_eq!(compress(b"zBBBBBB"), b"\x00\x01z\x01\x06B");
    }

    #[test]
    fn long_run_count_is_a_varint() {
        // 100 encodes as 0xa4 0x01 in the size encoding.
        let data = vec![7u8; 100];
        assert_eq!(compress(&data), b"\x01\xa4\x01\x07");
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut out = Vec::new();
        let err = CrleDecoder::new(Cursor::new(b"\x02\x01x"))
            .read_to_end(&mut out)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn truncated_segment_is_rejected() {
        let mut out = Vec::new();
        let err = CrleDecoder::new(Cursor::new(b"\x00\x05AA"))
            .read_to_end(&mut out)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }

    #[quickcheck]
    fn roundtrip(data: Vec<u8>) -> bool {
        decompress(&compress(&data)) == data
    }
}
