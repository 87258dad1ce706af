//! Hand-off to the derived artifact
//!
//! The artifact runs in a child process of the host runtime with inherited
//! stdio; its exit code becomes ours.

use crate::error::LaunchError;
use crate::manifest::{read_entry_point, EntryPoint, DEFAULT_ENTRY_ATTRIBUTE};
use crate::runtime::RuntimeCommand;
use std::ffi::OsString;
use std::path::Path;
use std::process::ExitStatus;

/// Transfers control to a materialized derived artifact
pub trait Launch {
    /// Run the artifact's entry point with `args`, returning its exit code
    ///
    /// # Errors
    /// Returns [`LaunchError`] if the entry point cannot be found or the
    /// runtime cannot be started; a failing entry point is not an error
    fn launch(&self, artifact: &Path, args: &[OsString]) -> Result<i32, LaunchError>;
}

impl<T: Launch + ?Sized> Launch for &T {
    fn launch(&self, artifact: &Path, args: &[OsString]) -> Result<i32, LaunchError> {
        (**self).launch(artifact, args)
    }
}

/// Launches the derived artifact through a host runtime command
#[derive(Debug, Clone)]
pub struct Launcher {
    runtime: RuntimeCommand,
    entry_attribute: String,
    entry_override: Option<EntryPoint>,
}

impl Launcher {
    /// Launcher reading the `Main-Class` attribute
    #[must_use]
    pub fn new(runtime: RuntimeCommand) -> Self {
        Self {
            runtime,
            entry_attribute: DEFAULT_ENTRY_ATTRIBUTE.to_string(),
            entry_override: None,
        }
    }

    /// Read a different manifest attribute
    #[must_use]
    pub fn with_entry_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.entry_attribute = attribute.into();
        self
    }

    /// Skip the manifest and invoke this entry point
    #[must_use]
    pub fn with_entry_override(mut self, entry: Option<EntryPoint>) -> Self {
        self.entry_override = entry;
        self
    }

    /// Runtime command in use
    #[inline]
    #[must_use]
    pub fn runtime(&self) -> &RuntimeCommand {
        &self.runtime
    }

    /// Entry point for `artifact`, read fresh from its manifest unless
    /// overridden
    ///
    /// # Errors
    /// Returns error if the manifest or attribute is missing
    pub fn entry_point(&self, artifact: &Path) -> Result<EntryPoint, LaunchError> {
        match &self.entry_override {
            Some(entry) => Ok(entry.clone()),
            None => read_entry_point(artifact, &self.entry_attribute),
        }
    }
}

impl Launch for Launcher {
    fn launch(&self, artifact: &Path, args: &[OsString]) -> Result<i32, LaunchError> {
        let entry = self.entry_point(artifact)?;
        tracing::info!(%entry, artifact = %artifact.display(), "starting entry point");

        let status = self
            .runtime
            .command(artifact, &entry, args)
            .status()
            .map_err(|source| LaunchError::Spawn {
                program: self.runtime.program().to_string_lossy().into_owned(),
                source,
            })?;

        let code = exit_code(status);
        tracing::debug!(%entry, code, "entry point exited");
        Ok(code)
    }
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
