//! deltaboot patch engine
//!
//! Applies bsdiff-compatible (BSDIFF40) binary delta patches. The engine is a
//! pure function of `(base, patch)`; it either reconstructs the target bytes
//! exactly or fails with a [`PatchError`].

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod bspatch;
mod error;

pub use bspatch::{apply, decode_offset, encode_offset, PatchHeader, HEADER_LEN, MAGIC};
pub use error::{PatchError, Stream};
