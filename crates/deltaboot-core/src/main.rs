//! `deltaboot`: materialize the derived artifact and run it
//!
//! Every argument is forwarded to the launched program; settings come from
//! `DELTABOOT_*` environment variables.

use deltaboot_core::{logging, BootConfig, BootError, Bootstrap};
use std::ffi::OsString;

fn main() {
    logging::init();
    let args: Vec<OsString> = std::env::args_os().skip(1).collect();
    let code = match run(&args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("deltaboot: {err}");
            err.exit_code()
        }
    };
    std::process::exit(code);
}

fn run(args: &[OsString]) -> Result<i32, BootError> {
    let config = BootConfig::from_env()?;
    let fetcher = config.fetcher()?;
    let launcher = config.launcher();
    Bootstrap::new(config, fetcher, launcher).run(args)
}
