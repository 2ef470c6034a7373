#![forbid(unsafe_code)]
/*!
Compression framing of the patch body.

Codecs are consumed the same way the patch builder and applier consume
everything else: as `Write`-based encoders and `Read`-based decoders over
the body stream. The built-in codecs are passthrough and CRLE; the bzip2
binding lives behind the `bz2` feature. Further external codecs (LZMA,
Zstandard, LZ4, Heatshrink) would occupy the remaining wire ids behind the
same two wrappers.
*/

use std::fmt;
use std::io::{Read, Result as IoResult, Write};
use std::str::FromStr;

use crate::error::{Error, Result};

mod crle;

pub use crle::{CrleDecoder, CrleEncoder};

#[cfg(feature = "bz2")]
use bzip2::read::BzDecoder;
#[cfg(feature = "bz2")]
use bzip2::write::BzEncoder;

/// Compression codec of a patch body, identified by the 4-bit wire id in
/// the container header.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Compression {
    /// Passthrough, no transformation.
    None,
    /// Conditional run-length encoding, the built-in lightweight codec.
    Crle,
    /// bzip2 (requires the `bz2` feature to encode or decode).
    Bz2,
}

impl Compression {
    /// Wire id stored in the container header.
    pub fn id(self) -> u8 {
        match self {
            Compression::None => 0,
            Compression::Crle => 1,
            Compression::Bz2 => 2,
        }
    }

    /// Look up a wire id read from a container header.
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Compression::None),
            1 => Some(Compression::Crle),
            2 => Some(Compression::Bz2),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Crle => "crle",
            Compression::Bz2 => "bz2",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Compression {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "none" => Ok(Compression::None),
            "crle" => Ok(Compression::Crle),
            "bz2" => Ok(Compression::Bz2),
            _ => Err(Error::config(format!("unknown compression name `{}`", name))),
        }
    }
}

/// Body encoder dispatching on the selected codec.
pub(crate) enum Encoder<W: Write> {
    None(W),
    Crle(CrleEncoder<W>),
    #[cfg(feature = "bz2")]
    Bz2(BzEncoder<W>),
}

impl<W: Write> Encoder<W> {
    pub fn new(compression: Compression, w: W) -> Result<Self> {
        match compression {
            Compression::None => Ok(Encoder::None(w)),
            Compression::Crle => Ok(Encoder::Crle(CrleEncoder::new(w))),
            #[cfg(feature = "bz2")]
            Compression::Bz2 => Ok(Encoder::Bz2(BzEncoder::new(w, bzip2::Compression::Default))),
            #[cfg(not(feature = "bz2"))]
            Compression::Bz2 => Err(Error::compression("bz2 support is not compiled in")),
        }
    }

    /// Terminate the compressed stream, flushing any buffered segments.
    pub fn finish(self) -> IoResult<W> {
        match self {
            Encoder::None(w) => Ok(w),
            Encoder::Crle(enc) => enc.finish(),
            #[cfg(feature = "bz2")]
            Encoder::Bz2(enc) => enc.finish(),
        }
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        match self {
            Encoder::None(w) => w.write(buf),
            Encoder::Crle(enc) => enc.write(buf),
            #[cfg(feature = "bz2")]
            Encoder::Bz2(enc) => enc.write(buf),
        }
    }

    fn flush(&mut self) -> IoResult<()> {
        match self {
            Encoder::None(w) => w.flush(),
            Encoder::Crle(enc) => enc.flush(),
            #[cfg(feature = "bz2")]
            Encoder::Bz2(enc) => enc.flush(),
        }
    }
}

/// Body decoder dispatching on the codec named in the container header.
pub(crate) enum Decoder<R: Read> {
    None(R),
    Crle(CrleDecoder<R>),
    #[cfg(feature = "bz2")]
    Bz2(BzDecoder<R>),
}

impl<R: Read> Decoder<R> {
    pub fn new(compression: Compression, r: R) -> Result<Self> {
        match compression {
            Compression::None => Ok(Decoder::None(r)),
            Compression::Crle => Ok(Decoder::Crle(CrleDecoder::new(r))),
            #[cfg(feature = "bz2")]
            Compression::Bz2 => Ok(Decoder::Bz2(BzDecoder::new(r))),
            #[cfg(not(feature = "bz2"))]
            Compression::Bz2 => Err(Error::compression("bz2 support is not compiled in")),
        }
    }
}

impl<R: Read> Read for Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        match self {
            Decoder::None(r) => r.read(buf),
            Decoder::Crle(dec) => dec.read(buf),
            #[cfg(feature = "bz2")]
            Decoder::Bz2(dec) => dec.read(buf),
        }
    }
}
