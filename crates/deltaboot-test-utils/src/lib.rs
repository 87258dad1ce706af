//! Testing utilities for the deltaboot workspace
//!
//! Shared fixtures: patch construction, ZIP containers, recording fakes, and
//! a ready-made base/derived/patch triple on disk.

#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc)]

mod fakes;
mod patch;
mod zip;

pub use fakes::{LaunchRecord, RecordingFetcher, RecordingLauncher};
pub use patch::{diff_against, flip_control_byte, PatchBuilder};
pub use zip::{jar_with_main_class, ZipFixture};

use deltaboot_artifact::ContentHash;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Upstream URL used by fixtures; never actually contacted
pub const SOURCE_URL: &str = "https://upstream.example/base-1.0.bin";

/// Main class recorded in fixture manifests
pub const MAIN_CLASS: &str = "org.example.server.Main";

/// Deterministic pseudo-random bytes
pub fn sample_bytes(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            state.to_be_bytes()[1]
        })
        .collect()
}

/// A base artifact, the derived artifact it patches into, and the patch
/// between them, laid out in a temporary directory
#[derive(Debug)]
pub struct BootFixture {
    pub dir: TempDir,
    pub version: String,
    pub base: Vec<u8>,
    pub derived: Vec<u8>,
    pub patch: Vec<u8>,
    pub patch_path: PathBuf,
}

impl BootFixture {
    pub fn new(version: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let base = sample_bytes(20_000, 7);

        let mut payload = base.clone();
        payload[100..140].copy_from_slice(&[0xEE; 40]);
        payload.extend_from_slice(b"patched build");
        let derived = jar_with_main_class(MAIN_CLASS, &payload);

        let patch = diff_against(&base, &derived);
        let patch_path = dir.path().join("server.patch");
        fs::write(&patch_path, &patch).unwrap();

        Self {
            dir,
            version: version.to_string(),
            base,
            derived,
            patch,
            patch_path,
        }
    }

    pub fn base_hash(&self) -> ContentHash {
        ContentHash::compute(&self.base)
    }

    pub fn derived_hash(&self) -> ContentHash {
        ContentHash::compute(&self.derived)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    /// Descriptor JSON pointing at this fixture's patch file
    pub fn descriptor_json(&self) -> String {
        serde_json::json!({
            "patch": self.patch_path.to_string_lossy(),
            "sourceUrl": SOURCE_URL,
            "originalHash": self.base_hash().to_string(),
            "patchedHash": self.derived_hash().to_string(),
            "version": self.version,
        })
        .to_string()
    }

    /// Write the descriptor into the fixture directory
    pub fn write_descriptor(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, self.descriptor_json()).unwrap();
        path
    }
}
