//! Bootstrapper settings, read from the environment
//!
//! Command-line arguments belong to the launched program, so every setting
//! comes from `DELTABOOT_*` variables (optionally via a `.env` file).

use crate::descriptor::DESCRIPTOR_FILE;
use crate::error::ConfigError;
use deltaboot_fetch::{HttpFetcher, TransportError};
use deltaboot_launch::{parse_runtime_version, EntryPoint, Launcher, RuntimeCommand, DEFAULT_ENTRY_ATTRIBUTE};
use once_cell::sync::Lazy;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_CACHE_DIR: &str = "DELTABOOT_CACHE_DIR";
pub const ENV_DESCRIPTOR: &str = "DELTABOOT_DESCRIPTOR";
pub const ENV_RUNTIME: &str = "DELTABOOT_RUNTIME";
pub const ENV_MIN_RUNTIME_VERSION: &str = "DELTABOOT_MIN_RUNTIME_VERSION";
pub const ENV_RUNTIME_VERSION: &str = "DELTABOOT_RUNTIME_VERSION";
pub const ENV_ENTRY_POINT: &str = "DELTABOOT_ENTRY_POINT";
pub const ENV_ENTRY_ATTRIBUTE: &str = "DELTABOOT_ENTRY_ATTRIBUTE";
pub const ENV_PATCH_ONLY: &str = "DELTABOOT_PATCH_ONLY";
pub const ENV_FETCH_TIMEOUT_SECS: &str = "DELTABOOT_FETCH_TIMEOUT_SECS";

/// Default cache directory, relative to the working directory
pub const DEFAULT_CACHE_DIR: &str = "cache";

// Load .env at most once; a missing file is fine.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenvy::dotenv();
});

/// Settings for one bootstrap run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootConfig {
    cache_dir: PathBuf,
    descriptor_path: Option<PathBuf>,
    override_descriptor: PathBuf,
    bundled_descriptor: Option<PathBuf>,
    runtime: OsString,
    min_runtime_version: Option<u32>,
    runtime_version: Option<u32>,
    entry_point: Option<String>,
    entry_attribute: String,
    patch_only: bool,
    fetch_timeout: Option<Duration>,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            descriptor_path: None,
            override_descriptor: PathBuf::from(DESCRIPTOR_FILE),
            bundled_descriptor: env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(|dir| dir.join(DESCRIPTOR_FILE))),
            runtime: OsString::from("java"),
            min_runtime_version: None,
            runtime_version: None,
            entry_point: None,
            entry_attribute: DEFAULT_ENTRY_ATTRIBUTE.to_string(),
            patch_only: false,
            fetch_timeout: None,
        }
    }
}

impl BootConfig {
    /// Defaults overridden by the process environment (after loading `.env`)
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidSetting`] for malformed values
    pub fn from_env() -> Result<Self, ConfigError> {
        Lazy::force(&DOTENV_LOADED);
        Self::from_lookup(|key| env::var_os(key))
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidSetting`] for malformed values
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let mut config = Self::default();
        if let Some(dir) = lookup(ENV_CACHE_DIR).filter(|v| !v.is_empty()) {
            config.cache_dir = PathBuf::from(dir);
        }
        config.descriptor_path = lookup(ENV_DESCRIPTOR).filter(|v| !v.is_empty()).map(PathBuf::from);
        if let Some(runtime) = lookup(ENV_RUNTIME).filter(|v| !v.is_empty()) {
            config.runtime = runtime;
        }
        config.min_runtime_version = parse_runtime(ENV_MIN_RUNTIME_VERSION, lookup(ENV_MIN_RUNTIME_VERSION))?;
        config.runtime_version = parse_runtime(ENV_RUNTIME_VERSION, lookup(ENV_RUNTIME_VERSION))?;
        config.entry_point = text(ENV_ENTRY_POINT, lookup(ENV_ENTRY_POINT))?;
        if let Some(attribute) = text(ENV_ENTRY_ATTRIBUTE, lookup(ENV_ENTRY_ATTRIBUTE))? {
            config.entry_attribute = attribute;
        }
        config.patch_only = parse_flag(ENV_PATCH_ONLY, lookup(ENV_PATCH_ONLY))?.unwrap_or(false);
        config.fetch_timeout = parse_number::<u64>(ENV_FETCH_TIMEOUT_SECS, lookup(ENV_FETCH_TIMEOUT_SECS))?
            .map(Duration::from_secs);
        Ok(config)
    }

    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_descriptor_path(mut self, path: Option<PathBuf>) -> Self {
        self.descriptor_path = path;
        self
    }

    #[must_use]
    pub fn with_override_descriptor(mut self, path: impl Into<PathBuf>) -> Self {
        self.override_descriptor = path.into();
        self
    }

    #[must_use]
    pub fn with_bundled_descriptor(mut self, path: Option<PathBuf>) -> Self {
        self.bundled_descriptor = path;
        self
    }

    #[must_use]
    pub fn with_runtime(mut self, program: impl Into<OsString>) -> Self {
        self.runtime = program.into();
        self
    }

    #[must_use]
    pub fn with_min_runtime_version(mut self, version: Option<u32>) -> Self {
        self.min_runtime_version = version;
        self
    }

    /// Use this host runtime version instead of probing
    #[must_use]
    pub fn with_runtime_version(mut self, version: Option<u32>) -> Self {
        self.runtime_version = version;
        self
    }

    #[must_use]
    pub fn with_entry_point(mut self, entry: Option<String>) -> Self {
        self.entry_point = entry;
        self
    }

    #[must_use]
    pub fn with_entry_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.entry_attribute = attribute.into();
        self
    }

    #[must_use]
    pub fn with_patch_only(mut self, patch_only: bool) -> Self {
        self.patch_only = patch_only;
        self
    }

    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    #[inline]
    #[must_use]
    pub fn descriptor_path(&self) -> Option<&Path> {
        self.descriptor_path.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn override_descriptor(&self) -> &Path {
        &self.override_descriptor
    }

    #[inline]
    #[must_use]
    pub fn bundled_descriptor(&self) -> Option<&Path> {
        self.bundled_descriptor.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn min_runtime_version(&self) -> Option<u32> {
        self.min_runtime_version
    }

    #[inline]
    #[must_use]
    pub fn runtime_version(&self) -> Option<u32> {
        self.runtime_version
    }

    #[inline]
    #[must_use]
    pub fn entry_attribute(&self) -> &str {
        &self.entry_attribute
    }

    #[inline]
    #[must_use]
    pub fn patch_only(&self) -> bool {
        self.patch_only
    }

    #[inline]
    #[must_use]
    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout
    }

    /// Host runtime command (`<runtime> -cp {artifact} {entry}`)
    #[must_use]
    pub fn runtime_command(&self) -> RuntimeCommand {
        RuntimeCommand::new(self.runtime.clone())
    }

    /// Launcher honouring the entry-point settings
    #[must_use]
    pub fn launcher(&self) -> Launcher {
        Launcher::new(self.runtime_command())
            .with_entry_attribute(self.entry_attribute.clone())
            .with_entry_override(self.entry_point.clone().map(EntryPoint::new))
    }

    /// HTTP fetcher honouring the timeout setting
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn fetcher(&self) -> Result<HttpFetcher, TransportError> {
        HttpFetcher::with_timeout(self.fetch_timeout)
    }
}

fn text(var: &'static str, value: Option<OsString>) -> Result<Option<String>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let value = value.into_string().map_err(|raw| ConfigError::InvalidSetting {
        var,
        value: raw.to_string_lossy().into_owned(),
        reason: "not valid UTF-8".to_string(),
    })?;
    let value = value.trim();
    Ok((!value.is_empty()).then(|| value.to_string()))
}

fn parse_number<T>(var: &'static str, value: Option<OsString>) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    text(var, value)?
        .map(|value| {
            value.parse().map_err(|e: T::Err| ConfigError::InvalidSetting {
                var,
                reason: e.to_string(),
                value,
            })
        })
        .transpose()
}

/// Runtime versions use the probe's numbering, so `1.8` is 8
fn parse_runtime(var: &'static str, value: Option<OsString>) -> Result<Option<u32>, ConfigError> {
    text(var, value)?
        .map(|value| {
            value
                .starts_with(|c: char| c.is_ascii_digit())
                .then(|| parse_runtime_version(&value))
                .flatten()
                .ok_or_else(|| ConfigError::InvalidSetting {
                    var,
                    value,
                    reason: "expected a runtime version such as 17 or 1.8".to_string(),
                })
        })
        .transpose()
}

fn parse_flag(var: &'static str, value: Option<OsString>) -> Result<Option<bool>, ConfigError> {
    text(var, value)?
        .map(|value| match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidSetting {
                var,
                value,
                reason: "expected true or false".to_string(),
            }),
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let vars: HashMap<String, OsString> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), OsString::from(v)))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = BootConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.cache_dir(), Path::new("cache"));
        assert_eq!(config.descriptor_path(), None);
        assert_eq!(config.override_descriptor(), Path::new(DESCRIPTOR_FILE));
        assert_eq!(config.entry_attribute(), "Main-Class");
        assert_eq!(config.min_runtime_version(), None);
        assert!(!config.patch_only());
        assert_eq!(config.fetch_timeout(), None);
        assert_eq!(config.runtime_command().program(), "java");
    }

    #[test]
    fn variables_override_defaults() {
        let config = BootConfig::from_lookup(lookup(&[
            (ENV_CACHE_DIR, "/var/cache/app"),
            (ENV_DESCRIPTOR, "/etc/app/deltaboot.json"),
            (ENV_RUNTIME, "/opt/jdk/bin/java"),
            (ENV_MIN_RUNTIME_VERSION, "17"),
            (ENV_RUNTIME_VERSION, " 21 "),
            (ENV_ENTRY_POINT, "org.example.Main"),
            (ENV_ENTRY_ATTRIBUTE, "Start-Class"),
            (ENV_PATCH_ONLY, "TRUE"),
            (ENV_FETCH_TIMEOUT_SECS, "30"),
        ]))
        .unwrap();
        assert_eq!(config.cache_dir(), Path::new("/var/cache/app"));
        assert_eq!(config.descriptor_path(), Some(Path::new("/etc/app/deltaboot.json")));
        assert_eq!(config.runtime_command().program(), "/opt/jdk/bin/java");
        assert_eq!(config.min_runtime_version(), Some(17));
        assert_eq!(config.runtime_version(), Some(21));
        assert_eq!(config.entry_attribute(), "Start-Class");
        assert!(config.patch_only());
        assert_eq!(config.fetch_timeout(), Some(Duration::from_secs(30)));
        let entry = config.launcher().entry_point(Path::new("/nonexistent.jar")).unwrap();
        assert_eq!(entry.as_str(), "org.example.Main");
    }

    #[test]
    fn blank_values_are_unset() {
        let config = BootConfig::from_lookup(lookup(&[
            (ENV_CACHE_DIR, ""),
            (ENV_MIN_RUNTIME_VERSION, "  "),
            (ENV_PATCH_ONLY, ""),
        ]))
        .unwrap();
        assert_eq!(config.cache_dir(), Path::new("cache"));
        assert_eq!(config.min_runtime_version(), None);
        assert!(!config.patch_only());
    }

    #[test]
    fn malformed_values_are_config_errors() {
        for (var, value) in [
            (ENV_MIN_RUNTIME_VERSION, "seventeen"),
            (ENV_RUNTIME_VERSION, "version 8"),
            (ENV_PATCH_ONLY, "maybe"),
            (ENV_FETCH_TIMEOUT_SECS, "-1"),
        ] {
            let err = BootConfig::from_lookup(lookup(&[(var, value)])).unwrap_err();
            match err {
                ConfigError::InvalidSetting { var: got, .. } => assert_eq!(got, var),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn runtime_versions_use_legacy_numbering() {
        let config = BootConfig::from_lookup(lookup(&[
            (ENV_MIN_RUNTIME_VERSION, "1.8"),
            (ENV_RUNTIME_VERSION, "1.8.0_292"),
        ]))
        .unwrap();
        assert_eq!(config.min_runtime_version(), Some(8));
        assert_eq!(config.runtime_version(), Some(8));

        let config = BootConfig::from_lookup(lookup(&[(ENV_RUNTIME_VERSION, "17.0.2")])).unwrap();
        assert_eq!(config.runtime_version(), Some(17));
    }

    #[test]
    fn builders_compose() {
        let config = BootConfig::default()
            .with_cache_dir("/tmp/c")
            .with_patch_only(true)
            .with_min_runtime_version(Some(8))
            .with_runtime_version(Some(11));
        assert_eq!(config.cache_dir(), Path::new("/tmp/c"));
        assert!(config.patch_only());
        assert_eq!(config.min_runtime_version(), Some(8));
        assert_eq!(config.runtime_version(), Some(11));
    }
}
