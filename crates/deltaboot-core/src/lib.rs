//! deltaboot core
//!
//! Turns a small descriptor (base URL, patch, expected digests) into a
//! verified derived artifact on disk, then hands control to it.
//!
//! # Pipeline
//!
//! - Is the cached derived artifact valid? Launch it.
//! - Is the cached base artifact valid? Patch it.
//! - Otherwise download the base, verify it, store it, then patch.
//! - Verify the patched bytes before storing or launching them.
//!
//! # Example
//!
//! ```rust,no_run
//! use deltaboot_core::{BootConfig, Bootstrap};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BootConfig::from_env()?;
//! let bootstrap = Bootstrap::new(config.clone(), config.fetcher()?, config.launcher());
//! let args: Vec<std::ffi::OsString> = std::env::args_os().skip(1).collect();
//! let code = bootstrap.run(&args)?;
//! std::process::exit(code);
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod bootstrap;
mod config;
mod descriptor;
mod error;
pub mod logging;
pub mod state;

pub use bootstrap::{BootReport, Bootstrap};
pub use config::{
    BootConfig, DEFAULT_CACHE_DIR, ENV_CACHE_DIR, ENV_DESCRIPTOR, ENV_ENTRY_ATTRIBUTE,
    ENV_ENTRY_POINT, ENV_FETCH_TIMEOUT_SECS, ENV_MIN_RUNTIME_VERSION, ENV_PATCH_ONLY, ENV_RUNTIME,
    ENV_RUNTIME_VERSION,
};
pub use descriptor::{locate_descriptor, PatchDescriptor, PatchLocation, DESCRIPTOR_FILE};
pub use error::{BootError, ConfigError, StateError, Subject};
pub use state::BootState;
