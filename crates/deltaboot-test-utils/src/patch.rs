//! BSDIFF40 patch construction for tests

use bzip2::write::BzEncoder;
use bzip2::Compression;
use deltaboot_patch::{encode_offset, HEADER_LEN, MAGIC};
use std::io::Write;

/// Builds a BSDIFF40 patch from explicit control entries
#[derive(Debug, Clone, Default)]
pub struct PatchBuilder {
    control: Vec<u8>,
    diff: Vec<u8>,
    extra: Vec<u8>,
    new_size: i64,
}

impl PatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// One control entry: `diff` bytes are added to the base at the current
    /// position, `extra` bytes are appended verbatim, then the base position
    /// moves by `seek`
    #[must_use]
    pub fn entry(mut self, diff: &[u8], extra: &[u8], seek: i64) -> Self {
        self.control.extend_from_slice(&encode_offset(len(diff)));
        self.control.extend_from_slice(&encode_offset(len(extra)));
        self.control.extend_from_slice(&encode_offset(seek));
        self.diff.extend_from_slice(diff);
        self.extra.extend_from_slice(extra);
        self.new_size += len(diff) + len(extra);
        self
    }

    /// Override the declared output size
    #[must_use]
    pub fn declared_size(mut self, new_size: i64) -> Self {
        self.new_size = new_size;
        self
    }

    /// Append raw bytes to the uncompressed control stream
    #[must_use]
    pub fn raw_control(mut self, bytes: &[u8]) -> Self {
        self.control.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let control = bz(&self.control);
        let diff = bz(&self.diff);
        let extra = bz(&self.extra);

        let mut patch = Vec::with_capacity(HEADER_LEN + control.len() + diff.len() + extra.len());
        patch.extend_from_slice(MAGIC);
        patch.extend_from_slice(&encode_offset(len(&control)));
        patch.extend_from_slice(&encode_offset(len(&diff)));
        patch.extend_from_slice(&encode_offset(self.new_size));
        patch.extend_from_slice(&control);
        patch.extend_from_slice(&diff);
        patch.extend_from_slice(&extra);
        patch
    }
}

/// A correct (if not minimal) delta from `base` to `target`
///
/// Works in fixed-size chunks so the result has several control entries,
/// positive seeks, and an extra-only tail when the target outgrows the base.
pub fn diff_against(base: &[u8], target: &[u8]) -> Vec<u8> {
    const CHUNK: usize = 4096;
    let mut builder = PatchBuilder::new();
    let mut pos = 0;
    while pos < target.len() {
        let end = (pos + CHUNK).min(target.len());
        let overlap = base.len().clamp(pos, end) - pos;
        let diff: Vec<u8> = (pos..pos + overlap)
            .map(|i| target[i].wrapping_sub(base[i]))
            .collect();
        let extra = &target[pos + overlap..end];
        builder = builder.entry(&diff, extra, len(extra));
        pos = end;
    }
    builder.build()
}

/// Flip one byte in the middle of the compressed control block
pub fn flip_control_byte(patch: &[u8]) -> Vec<u8> {
    let mut control_len = [0u8; 8];
    control_len.copy_from_slice(&patch[8..16]);
    let control_len = usize::try_from(deltaboot_patch::decode_offset(control_len)).unwrap();

    let mut corrupted = patch.to_vec();
    corrupted[HEADER_LEN + control_len / 2] ^= 0xFF;
    corrupted
}

fn bz(data: &[u8]) -> Vec<u8> {
    let mut encoder = BzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn len(data: &[u8]) -> i64 {
    i64::try_from(data.len()).unwrap()
}
