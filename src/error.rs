#![forbid(unsafe_code)]
use std::io;
use thiserror::Error;

/// Errors reported while creating, inspecting or applying patches.
///
/// Every failure is fatal to the current operation; the library performs no
/// internal retries and offers no partial results. Callers must discard any
/// output produced before the error.
#[derive(Debug, Error)]
pub enum Error {
    /// The patch bytes do not form a valid container (bad header, tag or
    /// field), or the patch references source data out of range.
    #[error("corrupt patch: {0}")]
    Format(String),

    /// The input ended before a required field or byte run was fully read.
    #[error("early end of patch data: {0}")]
    Truncated(String),

    /// A chunk or total-size invariant of the container was violated.
    #[error("patch size mismatch: {0}")]
    SizeMismatch(String),

    /// The underlying compression codec rejected or failed on the data.
    #[error("compression failed: {0}")]
    Compression(String),

    /// Invalid build-time configuration (segment geometry, unknown
    /// compression or patch type name).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// I/O failure on a caller-provided reader or writer.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn format<S: Into<String>>(msg: S) -> Self {
        Error::Format(msg.into())
    }

    pub(crate) fn truncated<S: Into<String>>(msg: S) -> Self {
        Error::Truncated(msg.into())
    }

    pub(crate) fn size_mismatch<S: Into<String>>(msg: S) -> Self {
        Error::SizeMismatch(msg.into())
    }

    pub(crate) fn compression<S: Into<String>>(msg: S) -> Self {
        Error::Compression(msg.into())
    }

    pub(crate) fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Classify an `io::Error` surfacing from the patch-body decoder chain.
///
/// `UnexpectedEof` means the compressed stream could not ultimately produce
/// the requested bytes; `InvalidData` carries a framing diagnosis from the
/// codec; anything else is a codec failure.
pub(crate) fn patch_read_error(e: io::Error) -> Error {
    match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::truncated("early end of patch data"),
        io::ErrorKind::InvalidData => Error::format(e.to_string()),
        _ => Error::compression(e.to_string()),
    }
}
