//! Launching through a real child process, with `sh` standing in for the
//! host runtime

#![cfg(unix)]

use deltaboot_launch::{Launch, LaunchError, Launcher, RuntimeCommand, RuntimeError};
use deltaboot_test_utils::{jar_with_main_class, MAIN_CLASS};
use std::ffi::OsString;
use std::fs;
use std::path::Path;

/// `sh -c <script> <entry> <artifact> <forwarded...>`
fn shell_runtime(script: &str) -> RuntimeCommand {
    RuntimeCommand::new("sh").with_launch_args(["-c", script, "{entry}", "{artifact}"])
}

#[test]
fn forwards_arguments_unchanged_and_returns_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let jar = dir.path().join("derived_1.0.bin");
    fs::write(&jar, jar_with_main_class(MAIN_CLASS, b"payload")).unwrap();
    let out = dir.path().join("argv.txt");

    let script = format!("printf '%s\\n' \"$0\" \"$@\" > '{}'; exit 3", out.display());
    let launcher = Launcher::new(shell_runtime(&script));
    let args: Vec<OsString> = ["--port", "8080", "two words", ""]
        .into_iter()
        .map(OsString::from)
        .collect();

    let code = launcher.launch(&jar, &args).unwrap();
    assert_eq!(code, 3);

    let recorded = fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = recorded.lines().collect();
    assert_eq!(
        lines,
        [MAIN_CLASS, jar.to_str().unwrap(), "--port", "8080", "two words", ""]
    );
}

#[test]
fn zero_exit_is_propagated() {
    let dir = tempfile::tempdir().unwrap();
    let jar = dir.path().join("derived.bin");
    fs::write(&jar, jar_with_main_class(MAIN_CLASS, b"")).unwrap();

    let code = Launcher::new(shell_runtime("exit 0")).launch(&jar, &[]).unwrap();
    assert_eq!(code, 0);
}

#[test]
fn signal_maps_to_shell_convention() {
    let dir = tempfile::tempdir().unwrap();
    let jar = dir.path().join("derived.bin");
    fs::write(&jar, jar_with_main_class(MAIN_CLASS, b"")).unwrap();

    let code = Launcher::new(shell_runtime("kill -TERM $$")).launch(&jar, &[]).unwrap();
    assert_eq!(code, 128 + 15);
}

#[test]
fn missing_runtime_is_a_spawn_error() {
    let dir = tempfile::tempdir().unwrap();
    let jar = dir.path().join("derived.bin");
    fs::write(&jar, jar_with_main_class(MAIN_CLASS, b"")).unwrap();

    let launcher = Launcher::new(RuntimeCommand::new("deltaboot-no-such-runtime"));
    assert!(matches!(
        launcher.launch(&jar, &[]),
        Err(LaunchError::Spawn { .. })
    ));
}

#[test]
fn missing_entry_point_prevents_spawn() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("ran");
    let jar = dir.path().join("derived.bin");
    fs::write(&jar, b"garbage").unwrap();

    let script = format!("touch '{}'", marker.display());
    let result = Launcher::new(shell_runtime(&script)).launch(&jar, &[]);
    assert!(matches!(result, Err(LaunchError::Container { .. })));
    assert!(!Path::new(&marker).exists());
}

#[test]
fn probes_version_from_stderr_banner() {
    let runtime = RuntimeCommand::new("sh")
        .with_version_args(["-c", "echo 'openjdk version \"17.0.9\" 2023-10-17' >&2"]);
    assert_eq!(runtime.probe_version().unwrap(), 17);
}

#[test]
fn unrecognized_version_output_is_reported() {
    let runtime = RuntimeCommand::new("sh").with_version_args(["-c", "echo no digits here"]);
    assert!(matches!(
        runtime.probe_version(),
        Err(RuntimeError::Unrecognized { .. })
    ));
}
