//! Error taxonomy of a bootstrap run

use crate::state::BootState;
use deltaboot_artifact::{CacheError, ContentHash, HashError};
use deltaboot_fetch::TransportError;
use deltaboot_launch::{LaunchError, RuntimeError};
use deltaboot_patch::PatchError;
use std::path::PathBuf;
use thiserror::Error;

/// Descriptor or configuration problems; raised before the cache is touched
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no descriptor found (searched {})", display_paths(.searched))]
    DescriptorNotFound { searched: Vec<PathBuf> },

    #[error("cannot read descriptor {path}: {source}")]
    DescriptorRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed descriptor {path}: {source}")]
    DescriptorParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("descriptor field `{field}` is not a valid digest: {source}")]
    InvalidHash {
        field: &'static str,
        #[source]
        source: HashError,
    },

    #[error("descriptor field `{field}` is not a valid URL: {value} ({reason})")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("descriptor field `{field}` uses unsupported scheme `{scheme}`")]
    UnsupportedScheme { field: &'static str, scheme: String },

    #[error("invalid version {version:?}: {reason}")]
    InvalidVersion { version: String, reason: &'static str },

    #[error("cannot read patch {path}: {source}")]
    PatchRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value for {var}: {value:?} ({reason})")]
    InvalidSetting {
        var: &'static str,
        value: String,
        reason: String,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// What an integrity check was about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    /// Downloaded base artifact
    Base,
    /// Patched derived artifact
    Derived,
    /// Patch bytes
    Patch,
}

impl Subject {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Base => "base artifact",
            Self::Derived => "derived artifact",
            Self::Patch => "patch",
        }
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Illegal move in the bootstrap state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal state transition {from} -> {to}")]
pub struct StateError {
    pub from: BootState,
    pub to: BootState,
}

/// Every way a bootstrap run can end without handing off
#[derive(Debug, Error)]
pub enum BootError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("download failed: {0}")]
    Transport(#[from] TransportError),

    #[error("{subject} digest mismatch for version {version}: expected {expected}, got {actual}")]
    Integrity {
        subject: Subject,
        version: String,
        expected: ContentHash,
        actual: ContentHash,
    },

    #[error("patch is corrupt: {0}")]
    PatchCorrupt(#[from] PatchError),

    #[error("launch failed: {0}")]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("internal error: {0}")]
    State(#[from] StateError),
}

impl BootError {
    /// Process exit code for this failure category
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Cache(_) => 1,
            Self::Config(_) => 2,
            Self::Transport(_) => 3,
            Self::Integrity { .. } => 4,
            Self::PatchCorrupt(_) => 5,
            Self::Launch(_) | Self::Runtime(RuntimeError::Probe { .. } | RuntimeError::Unrecognized { .. }) => 6,
            Self::Runtime(RuntimeError::TooOld { .. }) => 7,
            Self::State(_) => 70,
        }
    }
}
