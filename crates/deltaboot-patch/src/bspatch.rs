//! BSDIFF40 patch application
//!
//! Layout of a patch:
//!
//! | offset | size | content |
//! |---|---|---|
//! | 0 | 8 | `BSDIFF40` |
//! | 8 | 8 | length of the compressed control block |
//! | 16 | 8 | length of the compressed diff block |
//! | 24 | 8 | size of the output |
//! | 32 | .. | control block, diff block, extra block (each bzip2) |
//!
//! Integers use sign-magnitude little-endian encoding.

use crate::error::{PatchError, Stream};
use bzip2::read::BzDecoder;
use std::io::Read;
use std::ops::Range;

/// Patch magic
pub const MAGIC: &[u8; 8] = b"BSDIFF40";

/// Size of the fixed header
pub const HEADER_LEN: usize = 32;

/// Decode a sign-magnitude little-endian integer
#[inline]
#[must_use]
pub fn decode_offset(buf: [u8; 8]) -> i64 {
    let negative = buf[7] & 0x80 != 0;
    let mut magnitude = buf;
    magnitude[7] &= 0x7F;
    let value = i64::from_le_bytes(magnitude);
    if negative {
        -value
    } else {
        value
    }
}

/// Encode an integer in sign-magnitude little-endian form
#[inline]
#[must_use]
pub fn encode_offset(value: i64) -> [u8; 8] {
    let mut buf = value.unsigned_abs().to_le_bytes();
    if value < 0 {
        buf[7] |= 0x80;
    }
    buf
}

/// Parsed fixed header of a BSDIFF40 patch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchHeader {
    /// Compressed control block length
    pub control_len: u64,
    /// Compressed diff block length
    pub diff_len: u64,
    /// Output size
    pub new_size: u64,
}

impl PatchHeader {
    /// Parse and sanity-check the header at the start of `patch`
    ///
    /// # Errors
    /// Returns error on a short patch, wrong magic, or negative lengths
    pub fn parse(patch: &[u8]) -> Result<Self, PatchError> {
        let header = patch
            .get(..HEADER_LEN)
            .ok_or(PatchError::ShortHeader { len: patch.len() })?;
        if &header[..8] != MAGIC {
            return Err(PatchError::BadMagic {
                found: String::from_utf8_lossy(&header[..8]).into_owned(),
            });
        }

        let field = |at: usize, what: &'static str| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&header[at..at + 8]);
            u64::try_from(decode_offset(buf)).map_err(|_| PatchError::InvalidHeader(what))
        };

        Ok(Self {
            control_len: field(8, "negative control block length")?,
            diff_len: field(16, "negative diff block length")?,
            new_size: field(24, "negative output size")?,
        })
    }

    /// Byte ranges of the control, diff and extra blocks within a patch of
    /// `patch_len` bytes
    ///
    /// # Errors
    /// Returns error if the declared blocks do not fit
    pub fn block_ranges(&self, patch_len: usize) -> Result<[Range<usize>; 3], PatchError> {
        let control_len = usize::try_from(self.control_len).map_err(|_| too_long_err())?;
        let diff_len = usize::try_from(self.diff_len).map_err(|_| too_long_err())?;

        let control_end = HEADER_LEN.checked_add(control_len).ok_or_else(too_long_err)?;
        let diff_end = control_end.checked_add(diff_len).ok_or_else(too_long_err)?;
        if diff_end > patch_len {
            return Err(too_long_err());
        }
        Ok([HEADER_LEN..control_end, control_end..diff_end, diff_end..patch_len])
    }
}

fn too_long_err() -> PatchError {
    PatchError::InvalidHeader("declared blocks exceed the patch length")
}

/// Apply a BSDIFF40 `patch` to `base`, returning the reconstructed bytes
///
/// Pure and deterministic. Never returns partial output: any inconsistency in
/// the patch (bad header, truncated or corrupt block, out-of-range control
/// entry, leftover block data) is an error.
///
/// # Errors
/// Returns [`PatchError`] for any malformed patch
pub fn apply(base: &[u8], patch: &[u8]) -> Result<Vec<u8>, PatchError> {
    let header = PatchHeader::parse(patch)?;
    let [control_range, diff_range, extra_range] = header.block_ranges(patch.len())?;

    let new_size = usize::try_from(header.new_size).map_err(|_| PatchError::TooLarge {
        new_size: header.new_size,
    })?;
    let mut out = Vec::new();
    out.try_reserve_exact(new_size).map_err(|_| PatchError::TooLarge {
        new_size: header.new_size,
    })?;

    let mut control = BzDecoder::new(&patch[control_range]);
    let mut diff = BzDecoder::new(&patch[diff_range]);
    let mut extra = BzDecoder::new(&patch[extra_range]);

    let mut old_pos: i64 = 0;
    let mut index = 0usize;
    while out.len() < new_size {
        let add = read_offset(&mut control)?;
        let copy = read_offset(&mut control)?;
        let seek = read_offset(&mut control)?;

        let add = entry_len(add, out.len(), new_size, index, "add length out of range")?;
        let start = out.len();
        read_block(&mut diff, Stream::Diff, &mut out, add)?;
        for (i, byte) in out[start..].iter_mut().enumerate() {
            if let Some(old) = base_byte(base, old_pos, i) {
                *byte = byte.wrapping_add(old);
            }
        }
        old_pos = advance(old_pos, i64::try_from(add).ok(), index)?;

        let copy = entry_len(copy, out.len(), new_size, index, "copy length out of range")?;
        read_block(&mut extra, Stream::Extra, &mut out, copy)?;
        old_pos = advance(old_pos, Some(seek), index)?;

        index += 1;
    }

    ensure_drained(&mut control, Stream::Control)?;
    ensure_drained(&mut diff, Stream::Diff)?;
    ensure_drained(&mut extra, Stream::Extra)?;
    Ok(out)
}

fn read_offset<R: Read>(control: &mut R) -> Result<i64, PatchError> {
    let mut buf = [0u8; 8];
    control
        .read_exact(&mut buf)
        .map_err(|e| PatchError::from_read(Stream::Control, e))?;
    Ok(decode_offset(buf))
}

fn entry_len(
    value: i64,
    written: usize,
    new_size: usize,
    index: usize,
    reason: &'static str,
) -> Result<usize, PatchError> {
    usize::try_from(value)
        .ok()
        .filter(|len| written.checked_add(*len).is_some_and(|end| end <= new_size))
        .ok_or(PatchError::InvalidControl { index, reason })
}

fn read_block<R: Read>(
    reader: &mut R,
    stream: Stream,
    out: &mut Vec<u8>,
    len: usize,
) -> Result<(), PatchError> {
    let start = out.len();
    out.resize(start + len, 0);
    reader
        .read_exact(&mut out[start..])
        .map_err(|e| PatchError::from_read(stream, e))
}

fn base_byte(base: &[u8], old_pos: i64, offset: usize) -> Option<u8> {
    let at = old_pos.checked_add(i64::try_from(offset).ok()?)?;
    base.get(usize::try_from(at).ok()?).copied()
}

fn advance(old_pos: i64, by: Option<i64>, index: usize) -> Result<i64, PatchError> {
    by.and_then(|by| old_pos.checked_add(by))
        .ok_or(PatchError::InvalidControl {
            index,
            reason: "seek overflows the base position",
        })
}

/// Reading to the end forces the decoder through its end-of-stream checks
/// (block and stream CRCs), so corruption in the last block is not missed.
fn ensure_drained<R: Read>(reader: &mut R, stream: Stream) -> Result<(), PatchError> {
    let mut rest = Vec::new();
    reader
        .take(1)
        .read_to_end(&mut rest)
        .map_err(|e| PatchError::from_read(stream, e))?;
    if rest.is_empty() {
        Ok(())
    } else {
        Err(PatchError::TrailingData { stream })
    }
}
