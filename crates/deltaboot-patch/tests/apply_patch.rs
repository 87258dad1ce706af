//! Functional tests for patch application.
//!
//! A patch either reproduces the target byte-for-byte or fails; there is no
//! third outcome where wrong bytes come back.

use deltaboot_artifact::ContentHash;
use deltaboot_patch::{apply, PatchError, Stream};
use deltaboot_test_utils::{diff_against, flip_control_byte, sample_bytes, PatchBuilder};
use proptest::prelude::*;

#[test]
fn correct_delta_reproduces_target_digest() {
    let base = sample_bytes(50_000, 1);
    let mut target = base.clone();
    target[10_000..10_100].fill(0);
    target.truncate(45_000);
    target.extend_from_slice(&sample_bytes(9_000, 2));

    let patch = diff_against(&base, &target);
    let derived = apply(&base, &patch).unwrap();
    assert_eq!(ContentHash::compute(&derived), ContentHash::compute(&target));
}

#[test]
fn negative_seek_rereads_the_base() {
    // copy "ABC", seek back to the start, copy "ABC" again, then insert "!"
    let patch = PatchBuilder::new()
        .entry(&[0, 0, 0], b"", -3)
        .entry(&[0, 0, 0], b"!", 0)
        .build();
    assert_eq!(apply(b"ABCDEF", &patch).unwrap(), b"ABCABC!");
}

#[test]
fn diff_bytes_wrap_around() {
    let patch = PatchBuilder::new().entry(&[1, 0xFF], b"", 0).build();
    assert_eq!(apply(&[0xFF, 0x01], &patch).unwrap(), [0x00, 0x00]);
}

#[test]
fn reads_past_the_base_contribute_nothing() {
    let patch = PatchBuilder::new().entry(b"xyz", b"", 0).build();
    assert_eq!(apply(b"", &patch).unwrap(), b"xyz");
}

#[test]
fn flipped_control_byte_is_corrupt() {
    let base = sample_bytes(8_000, 3);
    let target = sample_bytes(12_000, 4);
    let patch = diff_against(&base, &target);

    let result = apply(&base, &flip_control_byte(&patch));
    assert!(result.is_err(), "corrupted patch produced output");
}

#[test]
fn truncated_patch_is_corrupt() {
    let base = sample_bytes(8_000, 5);
    // the tail of the target is extra-block data, so the cut lands there
    let target = sample_bytes(12_000, 6);
    let patch = diff_against(&base, &target);

    let cut = &patch[..patch.len() - 20];
    let err = apply(&base, cut).unwrap_err();
    assert!(
        matches!(err, PatchError::Truncated { stream: Stream::Extra } | PatchError::Decompress { stream: Stream::Extra, .. }),
        "unexpected error: {err}"
    );
}

#[test]
fn bad_stream_checksum_in_last_block_is_corrupt() {
    let base = sample_bytes(8_000, 7);
    let target = sample_bytes(12_000, 8);
    let mut patch = diff_against(&base, &target);
    // the patch ends with the extra stream, whose final bytes hold its combined CRC
    let at = patch.len() - 2;
    patch[at] ^= 0xFF;

    let err = apply(&base, &patch).unwrap_err();
    assert!(
        matches!(err, PatchError::Decompress { stream: Stream::Extra, .. }),
        "unexpected error: {err}"
    );
}

#[test]
fn entry_overrunning_declared_size_is_rejected() {
    let patch = PatchBuilder::new().entry(b"", b"12345", 0).declared_size(3).build();
    assert!(matches!(
        apply(b"", &patch),
        Err(PatchError::InvalidControl { index: 0, .. })
    ));
}

#[test]
fn control_stream_ending_early_is_truncation() {
    let patch = PatchBuilder::new().entry(b"", b"ab", 0).declared_size(4).build();
    assert!(matches!(
        apply(b"", &patch),
        Err(PatchError::Truncated { stream: Stream::Control })
    ));
}

#[test]
fn leftover_control_data_is_rejected() {
    let patch = PatchBuilder::new().entry(b"", b"ab", 0).raw_control(&[0u8; 24]).build();
    assert!(matches!(
        apply(b"", &patch),
        Err(PatchError::TrailingData { stream: Stream::Control })
    ));
}

#[test]
fn negative_control_length_is_rejected() {
    let patch = PatchBuilder::new()
        .raw_control(&deltaboot_patch::encode_offset(-1))
        .raw_control(&[0u8; 16])
        .declared_size(1)
        .build();
    assert!(matches!(
        apply(b"", &patch),
        Err(PatchError::InvalidControl { index: 0, .. })
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_delta_round_trips(
        base in proptest::collection::vec(any::<u8>(), 0..6000),
        target in proptest::collection::vec(any::<u8>(), 0..10000),
    ) {
        let patch = diff_against(&base, &target);
        prop_assert_eq!(apply(&base, &patch).unwrap(), target);
    }
}
