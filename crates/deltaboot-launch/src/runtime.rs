//! Host runtime command and version checks

use crate::error::RuntimeError;
use crate::manifest::EntryPoint;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::process::Command;

/// Placeholder replaced by the derived artifact path
pub const ARTIFACT_PLACEHOLDER: &str = "{artifact}";

/// Placeholder replaced by the entry-point name
pub const ENTRY_PLACEHOLDER: &str = "{entry}";

static LABELLED_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)version\s+"?(\d+)(?:\.(\d+))?"#).expect("labelled version regex is valid")
});
static BARE_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)(?:\.(\d+))?").expect("bare version regex is valid"));

/// How to start the host runtime that executes the derived artifact
///
/// The launch arguments are templates: `{artifact}` and `{entry}` are
/// substituted, then the forwarded process arguments are appended verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeCommand {
    program: OsString,
    launch_args: Vec<String>,
    version_args: Vec<String>,
}

impl RuntimeCommand {
    /// Runtime started as `<program> -cp {artifact} {entry} <args...>`
    #[must_use]
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            launch_args: vec!["-cp".into(), ARTIFACT_PLACEHOLDER.into(), ENTRY_PLACEHOLDER.into()],
            version_args: vec!["-version".into()],
        }
    }

    /// Replace the launch argument templates
    #[must_use]
    pub fn with_launch_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.launch_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the arguments used to probe the runtime version
    #[must_use]
    pub fn with_version_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.version_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Program name
    #[inline]
    #[must_use]
    pub fn program(&self) -> &OsStr {
        &self.program
    }

    /// Build the command that hands control to `entry` inside `artifact`
    #[must_use]
    pub fn command(&self, artifact: &Path, entry: &EntryPoint, args: &[OsString]) -> Command {
        let mut command = Command::new(&self.program);
        for template in &self.launch_args {
            command.arg(substitute(template, artifact, entry));
        }
        command.args(args);
        command
    }

    /// Ask the runtime for its major version
    ///
    /// Both stdout and stderr are inspected; some runtimes print their version
    /// banner on stderr.
    ///
    /// # Errors
    /// Returns error if the runtime cannot be run or its output has no version
    pub fn probe_version(&self) -> Result<u32, RuntimeError> {
        let program = self.program.to_string_lossy().into_owned();
        let output = Command::new(&self.program)
            .args(&self.version_args)
            .output()
            .map_err(|source| RuntimeError::Probe {
                program: program.clone(),
                source,
            })?;
        let text = format!(
            "{}\n{}",
            String::from_utf8_lossy(&output.stderr),
            String::from_utf8_lossy(&output.stdout)
        );
        tracing::debug!(%program, output = %text.trim(), "probed runtime version");
        parse_runtime_version(&text).ok_or_else(|| RuntimeError::Unrecognized {
            program,
            output: text.trim().lines().next().unwrap_or_default().to_string(),
        })
    }
}

impl Default for RuntimeCommand {
    fn default() -> Self {
        Self::new("java")
    }
}

fn substitute(template: &str, artifact: &Path, entry: &EntryPoint) -> OsString {
    if template == ARTIFACT_PLACEHOLDER {
        return artifact.as_os_str().to_os_string();
    }
    template
        .replace(ARTIFACT_PLACEHOLDER, &artifact.to_string_lossy())
        .replace(ENTRY_PLACEHOLDER, entry.as_str())
        .into()
}

/// Extract a major version from a version banner or a bare version string
///
/// Legacy `1.x` numbering maps to `x`, so `1.8.0_292` is 8 while `17.0.2`
/// is 17.
#[must_use]
pub fn parse_runtime_version(text: &str) -> Option<u32> {
    let captures = LABELLED_VERSION
        .captures(text)
        .or_else(|| BARE_VERSION.captures(text))?;
    let major: u32 = captures.get(1)?.as_str().parse().ok()?;
    match captures.get(2) {
        Some(minor) if major == 1 => minor.as_str().parse().ok(),
        _ => Some(major),
    }
}

/// Fail unless `found` is at least `required`
///
/// # Errors
/// Returns [`RuntimeError::TooOld`] when the runtime is below the minimum
pub fn ensure_minimum_version(required: u32, found: u32) -> Result<(), RuntimeError> {
    if found < required {
        return Err(RuntimeError::TooOld { required, found });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modern_and_legacy_banners() {
        assert_eq!(parse_runtime_version("openjdk version \"17.0.2\" 2022-01-18"), Some(17));
        assert_eq!(parse_runtime_version("java version \"1.8.0_292\""), Some(8));
        assert_eq!(parse_runtime_version("openjdk version \"21\" 2023-09-19"), Some(21));
    }

    #[test]
    fn parses_bare_versions() {
        assert_eq!(parse_runtime_version("16"), Some(16));
        assert_eq!(parse_runtime_version("1.8"), Some(8));
        assert_eq!(parse_runtime_version(" 11.0.1 "), Some(11));
        assert_eq!(parse_runtime_version("no digits"), None);
    }

    #[test]
    fn minimum_version_is_inclusive() {
        assert!(ensure_minimum_version(17, 17).is_ok());
        assert!(ensure_minimum_version(17, 21).is_ok());
        assert!(matches!(
            ensure_minimum_version(17, 8),
            Err(RuntimeError::TooOld { required: 17, found: 8 })
        ));
    }

    #[test]
    fn too_old_message_tells_operator_to_upgrade() {
        let message = RuntimeError::TooOld { required: 17, found: 11 }.to_string();
        assert!(message.contains("upgrade"));
        assert!(message.contains("17"));
        assert!(message.contains("11"));
    }

    #[test]
    fn command_substitutes_placeholders_and_appends_args() {
        let runtime = RuntimeCommand::new("java");
        let command = runtime.command(
            Path::new("/cache/derived_1.0.bin"),
            &EntryPoint::new("org.example.Main"),
            &["--foo".into(), "bar baz".into()],
        );
        let args: Vec<_> = command.get_args().collect();
        assert_eq!(command.get_program(), "java");
        assert_eq!(
            args,
            ["-cp", "/cache/derived_1.0.bin", "org.example.Main", "--foo", "bar baz"]
        );
    }

    #[test]
    fn placeholders_inside_longer_templates() {
        let runtime = RuntimeCommand::new("runner").with_launch_args(["--module={artifact}:{entry}"]);
        let command = runtime.command(Path::new("a.bin"), &EntryPoint::new("main"), &[]);
        let args: Vec<_> = command.get_args().collect();
        assert_eq!(args, ["--module=a.bin:main"]);
    }
}
