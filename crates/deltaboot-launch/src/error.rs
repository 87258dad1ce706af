//! Launch and runtime errors
//!
//! [`LaunchError`] means the artifact could not be handed control;
//! [`RuntimeError`] means the host environment is unsuitable. Both are kept
//! apart from fetch and patch failures so operators can tell a bad artifact
//! from a bad environment.

use std::io;
use std::path::PathBuf;

/// Structural problem in the artifact container
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// No end-of-central-directory record
    #[error("not a zip archive (no end of central directory record)")]
    NotAnArchive,

    /// A record points outside the archive
    #[error("archive is truncated or corrupt at offset {offset}")]
    OutOfBounds { offset: usize },

    /// A record has the wrong signature
    #[error("bad {record} signature at offset {offset}")]
    BadSignature { record: &'static str, offset: usize },

    /// ZIP64 archives are not read
    #[error("zip64 archives are not supported")]
    Zip64,

    /// Entry is encrypted
    #[error("entry {name} is encrypted")]
    Encrypted { name: String },

    /// Entry uses a compression method other than stored or deflate
    #[error("entry {name} uses unsupported compression method {method}")]
    UnsupportedMethod { name: String, method: u16 },

    /// Entry failed to inflate or inflated to the wrong size
    #[error("entry {name} is corrupt: {reason}")]
    CorruptEntry { name: String, reason: String },
}

/// Failure to hand control to the derived artifact
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    /// Artifact could not be read
    #[error("failed to read artifact {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Artifact container is unreadable
    #[error("artifact {path} is not a readable container: {source}")]
    Container {
        path: PathBuf,
        #[source]
        source: ContainerError,
    },

    /// Artifact has no manifest entry
    #[error("artifact {path} has no {entry} entry")]
    MissingManifest { path: PathBuf, entry: &'static str },

    /// Manifest lacks the entry-point attribute
    #[error("manifest of {path} has no {attribute} attribute")]
    MissingEntryPoint { path: PathBuf, attribute: String },

    /// Host runtime could not be started
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Host runtime unsuitable for the derived artifact
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Version probe could not be run
    #[error("failed to run {program} to determine its version: {source}")]
    Probe {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Version output not understood
    #[error("could not determine the version of {program} from {output:?}")]
    Unrecognized { program: String, output: String },

    /// Runtime is older than required
    #[error(
        "this artifact requires host runtime version {required} or newer, but version {found} \
         is installed; upgrade the runtime to version {required} or above and run again"
    )]
    TooOld { required: u32, found: u32 },
}
