//! The verify, fetch, patch, verify, launch pipeline
//!
//! Nothing reaches the cache unverified: a downloaded base is checked before
//! it is stored, and a patched artifact is checked before it is stored or
//! launched. Whenever the base had to be fetched or re-validated for
//! patching, the derived artifact is discarded and rebuilt.

use crate::config::BootConfig;
use crate::descriptor::{locate_descriptor, PatchDescriptor, PatchLocation};
use crate::error::{BootError, ConfigError, Subject};
use crate::state::{BootState, StateTrace};
use deltaboot_artifact::{ArtifactCache, ArtifactRole, CachedArtifact, ContentHash};
use deltaboot_fetch::Fetch;
use deltaboot_launch::{ensure_minimum_version, Launch};
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;

/// Outcome of materializing the derived artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootReport {
    /// Validated derived artifact, ready to launch
    pub derived: PathBuf,
    /// States visited, starting with `START`
    pub states: Vec<BootState>,
    /// The base artifact was downloaded
    pub fetched_base: bool,
    /// The patch was applied
    pub patched: bool,
}

/// One bootstrap run over a cache directory
#[derive(Debug)]
pub struct Bootstrap<F, L> {
    config: BootConfig,
    cache: ArtifactCache,
    fetcher: F,
    launcher: L,
}

impl<F: Fetch, L: Launch> Bootstrap<F, L> {
    #[must_use]
    pub fn new(config: BootConfig, fetcher: F, launcher: L) -> Self {
        let cache = ArtifactCache::new(config.cache_dir());
        Self {
            config,
            cache,
            fetcher,
            launcher,
        }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &BootConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// Check the runtime, materialize the derived artifact and hand off to
    /// it with `args`, returning the exit code to propagate
    ///
    /// In patch-only mode the hand-off is skipped and the result is 0.
    ///
    /// # Errors
    /// Returns [`BootError`] if any stage before the entry point starts fails
    pub fn run(&self, args: &[OsString]) -> Result<i32, BootError> {
        let mut trace = StateTrace::new();
        self.execute(&mut trace, args).map_err(|err| fail(&mut trace, err))
    }

    /// Materialize the derived artifact described by `descriptor` without
    /// launching it
    ///
    /// # Errors
    /// Returns [`BootError`] on any cache, transport, integrity or patch failure
    pub fn prepare(&self, descriptor: &PatchDescriptor) -> Result<BootReport, BootError> {
        let mut trace = StateTrace::new();
        self.materialize(&mut trace, descriptor)
            .map_err(|err| fail(&mut trace, err))
    }

    /// Enforce the configured minimum host runtime version, if any
    ///
    /// # Errors
    /// Returns [`BootError::Runtime`] if the runtime is too old or its version
    /// cannot be determined
    pub fn check_runtime(&self) -> Result<(), BootError> {
        let Some(required) = self.config.min_runtime_version() else {
            return Ok(());
        };
        let found = match self.config.runtime_version() {
            Some(found) => found,
            None => self.config.runtime_command().probe_version()?,
        };
        ensure_minimum_version(required, found)?;
        tracing::debug!(required, found, "runtime version accepted");
        Ok(())
    }

    /// Locate and decode the descriptor for this run
    ///
    /// # Errors
    /// Returns [`BootError::Config`] if no descriptor is found or it is invalid
    pub fn load_descriptor(&self) -> Result<PatchDescriptor, BootError> {
        let path = locate_descriptor(
            self.config.descriptor_path(),
            self.config.override_descriptor(),
            self.config.bundled_descriptor(),
        )?;
        Ok(PatchDescriptor::load(&path)?)
    }

    fn execute(&self, trace: &mut StateTrace, args: &[OsString]) -> Result<i32, BootError> {
        self.check_runtime()?;
        let descriptor = self.load_descriptor()?;
        let report = self.materialize(trace, &descriptor)?;

        if self.config.patch_only() {
            tracing::info!(artifact = %report.derived.display(), "patch-only mode, not launching");
            return Ok(0);
        }
        tracing::info!(artifact = %report.derived.display(), args = args.len(), "handing off");
        Ok(self.launcher.launch(&report.derived, args)?)
    }

    fn materialize(
        &self,
        trace: &mut StateTrace,
        descriptor: &PatchDescriptor,
    ) -> Result<BootReport, BootError> {
        let version = descriptor.version();

        trace.advance(BootState::CheckDerived)?;
        let cached_derived = self
            .cache
            .artifact(ArtifactRole::Derived, version, *descriptor.patched_hash())?;
        if is_current(&cached_derived)? {
            tracing::debug!(version, "derived artifact valid, nothing to fetch or patch");
            trace.advance(BootState::Launch)?;
            return Ok(BootReport {
                derived: cached_derived.path().to_path_buf(),
                states: trace.visited().to_vec(),
                fetched_base: false,
                patched: false,
            });
        }

        trace.advance(BootState::CheckBase)?;
        let cached_base = self
            .cache
            .artifact(ArtifactRole::Base, version, *descriptor.original_hash())?;
        let fetched_base = !is_current(&cached_base)?;
        let base = if fetched_base {
            trace.advance(BootState::Fetching)?;
            let bytes = self.fetch_base(descriptor)?;
            trace.advance(BootState::Patching)?;
            bytes
        } else {
            tracing::debug!(version, "base artifact valid");
            self.cache.invalidate(ArtifactRole::Derived, version)?;
            let bytes = self.cache.read(ArtifactRole::Base, version)?;
            trace.advance(BootState::Patching)?;
            bytes
        };

        let derived = self.patch(descriptor, &base)?;
        trace.advance(BootState::Launch)?;
        Ok(BootReport {
            derived,
            states: trace.visited().to_vec(),
            fetched_base,
            patched: true,
        })
    }

    fn fetch_base(&self, descriptor: &PatchDescriptor) -> Result<Vec<u8>, BootError> {
        let version = descriptor.version();
        tracing::info!(url = %descriptor.source_url(), version, "downloading base artifact");
        let bytes = self.fetcher.fetch(descriptor.source_url())?;
        verify(Subject::Base, version, descriptor.original_hash(), &bytes)?;

        self.cache.store(ArtifactRole::Base, version, &bytes)?;
        self.cache.invalidate(ArtifactRole::Derived, version)?;
        tracing::info!(version, bytes = bytes.len(), "base artifact verified and stored");
        Ok(bytes)
    }

    fn patch(&self, descriptor: &PatchDescriptor, base: &[u8]) -> Result<PathBuf, BootError> {
        let version = descriptor.version();
        let patch = self.read_patch(descriptor.patch())?;
        if let Some(expected) = descriptor.patch_hash() {
            verify(Subject::Patch, version, expected, &patch)?;
        }

        tracing::info!(patch = %descriptor.patch(), version, "applying patch");
        let derived = deltaboot_patch::apply(base, &patch)?;
        verify(Subject::Derived, version, descriptor.patched_hash(), &derived)?;

        let path = self.cache.store(ArtifactRole::Derived, version, &derived)?;
        tracing::info!(path = %path.display(), bytes = derived.len(), "derived artifact verified and stored");
        Ok(path)
    }

    fn read_patch(&self, location: &PatchLocation) -> Result<Vec<u8>, BootError> {
        match location {
            PatchLocation::File(path) => fs::read(path).map_err(|source| {
                ConfigError::PatchRead {
                    path: path.clone(),
                    source,
                }
                .into()
            }),
            PatchLocation::Remote(url) => {
                tracing::info!(%url, "downloading patch");
                Ok(self.fetcher.fetch(url)?)
            }
        }
    }
}

/// Hash the cached file once; a present but mismatching file is stale
fn is_current(artifact: &CachedArtifact) -> Result<bool, BootError> {
    let role = artifact.role();
    match artifact.digest()? {
        Some(actual) if actual == *artifact.expected() => Ok(true),
        Some(actual) => {
            tracing::warn!(
                %role,
                path = %artifact.path().display(),
                expected = %artifact.expected().short(),
                actual = %actual.short(),
                "cached artifact is stale"
            );
            Ok(false)
        }
        None => {
            tracing::debug!(%role, path = %artifact.path().display(), "no cached artifact");
            Ok(false)
        }
    }
}

fn verify(
    subject: Subject,
    version: &str,
    expected: &ContentHash,
    bytes: &[u8],
) -> Result<(), BootError> {
    let actual = ContentHash::compute(bytes);
    if actual == *expected {
        return Ok(());
    }
    Err(BootError::Integrity {
        subject,
        version: version.to_string(),
        expected: *expected,
        actual,
    })
}

fn fail(trace: &mut StateTrace, err: BootError) -> BootError {
    let state = trace.current();
    if !state.is_terminal() {
        // Failed is reachable from every non-terminal state
        let _ = trace.advance(BootState::Failed);
    }
    tracing::debug!(%state, "bootstrap failed");
    err
}
