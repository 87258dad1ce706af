//! On-disk artifact cache
//!
//! Maps a `(role, version)` identity to a deterministic file under the cache
//! root. Validity is always re-derived from the file content: a file counts as
//! valid only when it exists and hashes to the expected digest.

use crate::hash::ContentHash;
use std::fmt::{self, Display, Formatter};
use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

/// Which artifact of the pair a cache entry holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactRole {
    /// Unmodified upstream artifact the patch is computed against
    Base,
    /// Result of applying the patch to the base artifact
    Derived,
}

impl ArtifactRole {
    /// Tag used in cache file names and diagnostics
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Derived => "derived",
        }
    }
}

impl Display for ArtifactRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A materialized artifact and the digest it must have
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedArtifact {
    role: ArtifactRole,
    path: PathBuf,
    expected: ContentHash,
}

impl CachedArtifact {
    /// Role of this artifact
    #[inline]
    #[must_use]
    pub fn role(&self) -> ArtifactRole {
        self.role
    }

    /// Backing file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Digest the backing file must hash to
    #[inline]
    #[must_use]
    pub fn expected(&self) -> &ContentHash {
        &self.expected
    }

    /// Digest of the backing file, `None` when it does not exist
    ///
    /// # Errors
    /// Returns error on I/O failures other than the file being absent
    pub fn digest(&self) -> Result<Option<ContentHash>, CacheError> {
        digest_file(&self.path)
    }

    /// Re-hash the backing file and compare against the expected digest
    ///
    /// # Errors
    /// Returns error on I/O failures other than the file being absent
    pub fn is_valid(&self) -> Result<bool, CacheError> {
        Ok(self.digest()? == Some(self.expected))
    }
}

/// Cache of base and derived artifacts rooted at one directory
///
/// Assumes a single writer; there is no file locking.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: PathBuf,
}

impl ArtifactCache {
    /// Create a cache rooted at `root` (created lazily on first store)
    #[inline]
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic path for a role and version: `<root>/<role>_<version>.bin`
    ///
    /// # Errors
    /// Returns error if the version cannot be embedded in a file name
    pub fn path_for(&self, role: ArtifactRole, version: &str) -> Result<PathBuf, CacheError> {
        validate_version(version)?;
        Ok(self.root.join(format!("{role}_{version}.bin")))
    }

    /// Handle for the artifact of `role` at `version` with its expected digest
    ///
    /// # Errors
    /// Returns error if the version cannot be embedded in a file name
    pub fn artifact(
        &self,
        role: ArtifactRole,
        version: &str,
        expected: ContentHash,
    ) -> Result<CachedArtifact, CacheError> {
        Ok(CachedArtifact {
            role,
            path: self.path_for(role, version)?,
            expected,
        })
    }

    /// True iff the backing file exists and hashes to `expected`
    ///
    /// A missing file is `Ok(false)`, not an error.
    ///
    /// # Errors
    /// Returns error on any other I/O failure
    pub fn is_valid(
        &self,
        role: ArtifactRole,
        version: &str,
        expected: &ContentHash,
    ) -> Result<bool, CacheError> {
        let path = self.path_for(role, version)?;
        let actual = digest_file(&path)?;
        tracing::debug!(
            %role,
            version,
            path = %path.display(),
            present = actual.is_some(),
            matches = actual.as_ref() == Some(expected),
            "checked cached artifact"
        );
        Ok(actual.as_ref() == Some(expected))
    }

    /// Digest of the backing file, `None` when it does not exist
    ///
    /// # Errors
    /// Returns error on I/O failures other than the file being absent
    pub fn digest(&self, role: ArtifactRole, version: &str) -> Result<Option<ContentHash>, CacheError> {
        digest_file(&self.path_for(role, version)?)
    }

    /// Read the whole backing file
    ///
    /// # Errors
    /// Returns error if the file cannot be read
    pub fn read(&self, role: ArtifactRole, version: &str) -> Result<Vec<u8>, CacheError> {
        let path = self.path_for(role, version)?;
        fs::read(&path).map_err(|source| CacheError::io("read", &path, source))
    }

    /// Write `bytes` as the artifact for `role` at `version`
    ///
    /// Overwrites any existing file. The bytes go to a temporary file in the
    /// cache root which is then renamed over the final path, so a failed write
    /// never leaves a partial artifact behind.
    ///
    /// # Errors
    /// Returns error if the directory, temporary file, or rename fails
    pub fn store(&self, role: ArtifactRole, version: &str, bytes: &[u8]) -> Result<PathBuf, CacheError> {
        let path = self.path_for(role, version)?;
        fs::create_dir_all(&self.root).map_err(|source| CacheError::io("create", &self.root, source))?;

        let mut staged = tempfile::NamedTempFile::new_in(&self.root)
            .map_err(|source| CacheError::io("create", &self.root, source))?;
        staged
            .write_all(bytes)
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|source| CacheError::io("write", staged.path(), source))?;
        staged
            .persist(&path)
            .map_err(|e| CacheError::io("rename", &path, e.error))?;

        tracing::debug!(%role, version, path = %path.display(), len = bytes.len(), "stored artifact");
        Ok(path)
    }

    /// Remove the backing file; an already-absent file is success
    ///
    /// Returns whether a file was actually removed.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be removed
    pub fn invalidate(&self, role: ArtifactRole, version: &str) -> Result<bool, CacheError> {
        let path = self.path_for(role, version)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(%role, version, path = %path.display(), "invalidated artifact");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CacheError::io("remove", &path, source)),
        }
    }
}

fn digest_file(path: &Path) -> Result<Option<ContentHash>, CacheError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(CacheError::io("open", path, source)),
    };
    ContentHash::compute_reader(BufReader::new(file))
        .map(Some)
        .map_err(|source| CacheError::io("read", path, source))
}

fn validate_version(version: &str) -> Result<(), CacheError> {
    let unsafe_char = |c: char| matches!(c, '/' | '\\' | '\0' | ':') || c.is_control();
    if version.is_empty() || version == "." || version.contains("..") || version.chars().any(unsafe_char) {
        return Err(CacheError::InvalidVersion(version.to_string()));
    }
    Ok(())
}

/// Errors raised by the artifact cache
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Version string cannot be used in a cache file name
    #[error("version {0:?} cannot be used in a cache file name")]
    InvalidVersion(String),

    /// I/O failure on a cache file
    #[error("failed to {op} {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CacheError {
    fn io(op: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_cache() -> (tempfile::TempDir, ArtifactCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path().join("cache"));
        (dir, cache)
    }

    #[test]
    fn path_is_derived_from_role_and_version() {
        let cache = ArtifactCache::new("/var/cache/deltaboot");
        assert_eq!(
            cache.path_for(ArtifactRole::Base, "1.20.4").unwrap(),
            PathBuf::from("/var/cache/deltaboot/base_1.20.4.bin")
        );
        assert_eq!(
            cache.path_for(ArtifactRole::Derived, "1.20.4").unwrap(),
            PathBuf::from("/var/cache/deltaboot/derived_1.20.4.bin")
        );
    }

    #[test]
    fn rejects_versions_that_escape_the_root() {
        let cache = ArtifactCache::new("cache");
        for bad in ["", "..", "../x", "a/b", "a\\b", "a\0b"] {
            assert!(
                matches!(cache.path_for(ArtifactRole::Base, bad), Err(CacheError::InvalidVersion(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn missing_file_is_not_valid_and_not_an_error() {
        let (_dir, cache) = temp_cache();
        let expected = ContentHash::compute(b"anything");
        assert!(!cache.is_valid(ArtifactRole::Base, "1.0", &expected).unwrap());
        assert_eq!(cache.digest(ArtifactRole::Base, "1.0").unwrap(), None);
    }

    #[test]
    fn store_then_validate() {
        let (_dir, cache) = temp_cache();
        let bytes = b"base artifact bytes";
        let path = cache.store(ArtifactRole::Base, "1.0", bytes).unwrap();
        assert_eq!(fs::read(&path).unwrap(), bytes);

        let expected = ContentHash::compute(bytes);
        assert!(cache.is_valid(ArtifactRole::Base, "1.0", &expected).unwrap());
        assert!(!cache
            .is_valid(ArtifactRole::Base, "1.0", &ContentHash::compute(b"other"))
            .unwrap());
        // roles are independent
        assert!(!cache.is_valid(ArtifactRole::Derived, "1.0", &expected).unwrap());
    }

    #[test]
    fn store_overwrites_existing_file() {
        let (_dir, cache) = temp_cache();
        cache.store(ArtifactRole::Derived, "2", b"first, longer content").unwrap();
        cache.store(ArtifactRole::Derived, "2", b"second").unwrap();
        assert_eq!(cache.read(ArtifactRole::Derived, "2").unwrap(), b"second");
    }

    #[test]
    fn store_leaves_no_staging_files() {
        let (_dir, cache) = temp_cache();
        cache.store(ArtifactRole::Base, "1.0", b"x").unwrap();
        let names: Vec<_> = fs::read_dir(cache.root())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("base_1.0.bin")]);
    }

    #[test]
    fn invalidate_is_idempotent() {
        let (_dir, cache) = temp_cache();
        cache.store(ArtifactRole::Base, "1.0", b"x").unwrap();
        assert!(cache.invalidate(ArtifactRole::Base, "1.0").unwrap());
        assert!(!cache.invalidate(ArtifactRole::Base, "1.0").unwrap());
        assert!(!cache.path_for(ArtifactRole::Base, "1.0").unwrap().exists());
    }

    #[test]
    fn cached_artifact_handle_rehashes() {
        let (_dir, cache) = temp_cache();
        let artifact = cache
            .artifact(ArtifactRole::Derived, "1.0", ContentHash::compute(b"good"))
            .unwrap();
        assert!(!artifact.is_valid().unwrap());
        cache.store(ArtifactRole::Derived, "1.0", b"good").unwrap();
        assert!(artifact.is_valid().unwrap());
        fs::write(artifact.path(), b"tampered").unwrap();
        assert!(!artifact.is_valid().unwrap());
        assert_eq!(artifact.digest().unwrap(), Some(ContentHash::compute(b"tampered")));
    }

    #[test]
    fn unreadable_artifact_is_an_error_not_a_miss() {
        let (_dir, cache) = temp_cache();
        let path = cache.path_for(ArtifactRole::Derived, "1.0").unwrap();
        fs::create_dir_all(&path).unwrap();

        let expected = ContentHash::compute(b"anything");
        let err = cache.is_valid(ArtifactRole::Derived, "1.0", &expected).unwrap_err();
        assert!(matches!(err, CacheError::Io { op: "read", .. }), "{err}");
        assert!(cache.digest(ArtifactRole::Derived, "1.0").is_err());
    }
}
