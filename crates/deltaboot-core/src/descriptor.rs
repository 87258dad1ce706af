//! Patch descriptor: what to fetch, what to apply, what to expect
//!
//! ```json
//! {
//!   "patch": "server.patch",
//!   "sourceUrl": "https://upstream.example/base-1.0.bin",
//!   "originalHash": "<64 hex chars>",
//!   "patchedHash": "<64 hex chars>",
//!   "version": "1.0"
//! }
//! ```
//!
//! An optional `patchHash` pins the patch bytes as well.

use crate::error::ConfigError;
use deltaboot_artifact::ContentHash;
use deltaboot_fetch::Url;
use serde::Deserialize;
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

/// File name of both the operator override and the bundled descriptor
pub const DESCRIPTOR_FILE: &str = "deltaboot.json";

const URL_SCHEMES: [&str; 3] = ["http", "https", "file"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDescriptor {
    patch: String,
    source_url: String,
    original_hash: String,
    patched_hash: String,
    version: String,
    #[serde(default)]
    patch_hash: Option<String>,
}

/// Where the patch bytes come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchLocation {
    File(PathBuf),
    Remote(Url),
}

impl Display for PatchLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => write!(f, "{url}"),
        }
    }
}

/// Immutable description of one bootstrap: base, patch and expected digests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchDescriptor {
    version: String,
    source_url: Url,
    patch: PatchLocation,
    original_hash: ContentHash,
    patched_hash: ContentHash,
    patch_hash: Option<ContentHash>,
}

impl PatchDescriptor {
    /// Read and decode the descriptor at `path`
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file is unreadable or malformed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs::read(path).map_err(|source| ConfigError::DescriptorRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&bytes, path)
    }

    /// Decode descriptor JSON; `origin` names the file it came from and
    /// anchors relative patch paths
    ///
    /// # Errors
    /// Returns [`ConfigError`] for malformed JSON, digests, URLs or versions
    pub fn from_json(bytes: &[u8], origin: &Path) -> Result<Self, ConfigError> {
        let raw: RawDescriptor =
            serde_json::from_slice(bytes).map_err(|source| ConfigError::DescriptorParse {
                path: origin.to_path_buf(),
                source,
            })?;

        validate_version(&raw.version)?;
        let descriptor = Self {
            source_url: parse_url("sourceUrl", &raw.source_url)?,
            patch: resolve_patch(&raw.patch, origin.parent())?,
            original_hash: parse_hash("originalHash", &raw.original_hash)?,
            patched_hash: parse_hash("patchedHash", &raw.patched_hash)?,
            patch_hash: raw
                .patch_hash
                .as_deref()
                .map(|value| parse_hash("patchHash", value))
                .transpose()?,
            version: raw.version,
        };
        tracing::debug!(
            version = %descriptor.version,
            patch = %descriptor.patch,
            source = %descriptor.source_url,
            "descriptor loaded"
        );
        Ok(descriptor)
    }

    #[inline]
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[inline]
    #[must_use]
    pub fn source_url(&self) -> &Url {
        &self.source_url
    }

    #[inline]
    #[must_use]
    pub fn patch(&self) -> &PatchLocation {
        &self.patch
    }

    /// Expected digest of the base artifact
    #[inline]
    #[must_use]
    pub fn original_hash(&self) -> &ContentHash {
        &self.original_hash
    }

    /// Expected digest of the derived artifact
    #[inline]
    #[must_use]
    pub fn patched_hash(&self) -> &ContentHash {
        &self.patched_hash
    }

    /// Expected digest of the patch, if pinned
    #[inline]
    #[must_use]
    pub fn patch_hash(&self) -> Option<&ContentHash> {
        self.patch_hash.as_ref()
    }
}

/// Pick the descriptor file for this run
///
/// An explicit path wins unconditionally. Otherwise the operator override is
/// used if present, then the bundled descriptor.
///
/// # Errors
/// Returns [`ConfigError::DescriptorNotFound`] if neither candidate exists
pub fn locate_descriptor(
    explicit: Option<&Path>,
    operator_override: &Path,
    bundled: Option<&Path>,
) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        tracing::debug!(path = %path.display(), "using configured descriptor");
        return Ok(path.to_path_buf());
    }

    let candidates: Vec<&Path> = std::iter::once(operator_override).chain(bundled).collect();
    if let Some(found) = candidates.iter().find(|path| path.is_file()) {
        tracing::debug!(path = %found.display(), "found descriptor");
        return Ok(found.to_path_buf());
    }
    Err(ConfigError::DescriptorNotFound {
        searched: candidates.into_iter().map(Path::to_path_buf).collect(),
    })
}

fn parse_hash(field: &'static str, value: &str) -> Result<ContentHash, ConfigError> {
    value
        .parse()
        .map_err(|source| ConfigError::InvalidHash { field, source })
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
        reason: e.to_string(),
    })?;
    if !URL_SCHEMES.contains(&url.scheme()) {
        return Err(ConfigError::UnsupportedScheme {
            field,
            scheme: url.scheme().to_string(),
        });
    }
    Ok(url)
}

/// URLs with a supported scheme are remote; anything else is a path, tried
/// relative to the working directory and then to the descriptor's directory
fn resolve_patch(value: &str, descriptor_dir: Option<&Path>) -> Result<PatchLocation, ConfigError> {
    if let Ok(url) = Url::parse(value) {
        if URL_SCHEMES.contains(&url.scheme()) {
            return Ok(PatchLocation::Remote(url));
        }
        if value.contains("://") {
            return Err(ConfigError::UnsupportedScheme {
                field: "patch",
                scheme: url.scheme().to_string(),
            });
        }
    }

    let path = PathBuf::from(value);
    if path.is_absolute() || path.exists() {
        return Ok(PatchLocation::File(path));
    }
    let beside_descriptor = descriptor_dir
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(&path))
        .filter(|candidate| candidate.exists());
    // a missing patch only matters once patching is needed
    Ok(PatchLocation::File(beside_descriptor.unwrap_or(path)))
}

fn validate_version(version: &str) -> Result<(), ConfigError> {
    let reason = if version.is_empty() {
        Some("must not be empty")
    } else if version.contains(['/', '\\', ':']) {
        Some("must not contain path separators")
    } else if version == "." || version.contains("..") {
        Some("must not contain relative path components")
    } else if version.chars().any(char::is_control) {
        Some("must not contain control characters")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(ConfigError::InvalidVersion {
            version: version.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
