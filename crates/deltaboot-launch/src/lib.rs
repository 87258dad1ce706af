//! deltaboot launcher
//!
//! Finds the entry point recorded in the derived artifact's manifest and
//! hands control to it through the host runtime, forwarding the original
//! arguments and propagating the exit code.
//!
//! # Example
//!
//! ```rust,no_run
//! use deltaboot_launch::{Launch, Launcher, RuntimeCommand};
//! use std::path::Path;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let launcher = Launcher::new(RuntimeCommand::new("java"));
//! let args: Vec<std::ffi::OsString> = std::env::args_os().skip(1).collect();
//! let code = launcher.launch(Path::new("cache/derived_1.0.bin"), &args)?;
//! std::process::exit(code);
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod launcher;
mod manifest;
mod runtime;

pub use error::{ContainerError, LaunchError, RuntimeError};
pub use launcher::{Launch, Launcher};
pub use manifest::{
    read_entry, read_entry_point, EntryPoint, Manifest, DEFAULT_ENTRY_ATTRIBUTE, MANIFEST_PATH,
};
pub use runtime::{
    ensure_minimum_version, parse_runtime_version, RuntimeCommand, ARTIFACT_PLACEHOLDER,
    ENTRY_PLACEHOLDER,
};
