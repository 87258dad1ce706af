//! Patch decoding errors
//!
//! Every variant means the patch stream is unusable; none is recoverable by
//! retrying with the same bytes.

use std::fmt::{self, Display, Formatter};
use std::io;

/// One of the three compressed blocks of a BSDIFF40 patch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// `(add, copy, seek)` triples
    Control,
    /// Bytes added to the base artifact
    Diff,
    /// Bytes inserted verbatim
    Extra,
}

impl Display for Stream {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Control => "control",
            Self::Diff => "diff",
            Self::Extra => "extra",
        })
    }
}

/// A malformed or truncated patch
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// Patch is shorter than its fixed header
    #[error("patch is {len} bytes, shorter than the 32-byte header")]
    ShortHeader { len: usize },

    /// Header does not start with `BSDIFF40`
    #[error("bad patch magic {found:?}, expected \"BSDIFF40\"")]
    BadMagic { found: String },

    /// Header lengths are negative or point outside the patch
    #[error("invalid patch header: {0}")]
    InvalidHeader(&'static str),

    /// Declared output size cannot be allocated
    #[error("declared output size of {new_size} bytes cannot be allocated")]
    TooLarge { new_size: u64 },

    /// A control triple is out of range
    #[error("control entry {index} is invalid: {reason}")]
    InvalidControl { index: usize, reason: &'static str },

    /// A block ended before the output was complete
    #[error("{stream} stream ended before the output was complete")]
    Truncated { stream: Stream },

    /// A block failed to decompress (bad bzip2 data or CRC mismatch)
    #[error("{stream} stream is corrupt: {source}")]
    Decompress {
        stream: Stream,
        #[source]
        source: io::Error,
    },

    /// A block still had data once the output was complete
    #[error("{stream} stream has data left after the output was complete")]
    TrailingData { stream: Stream },
}

impl PatchError {
    pub(crate) fn from_read(stream: Stream, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::UnexpectedEof {
            Self::Truncated { stream }
        } else {
            Self::Decompress { stream, source }
        }
    }
}
