//! Console logging using env_logger
//!
//! Logs go to stderr so command output on stdout stays machine-readable.
//! `RUST_LOG` wins over the `-v` flags when set.

use env_logger::{Builder, Env, Target};
use log::LevelFilter;

/// Level for the given number of `-v` flags
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Initialize the global logger
pub fn init(verbosity: u8) {
    let default = level_for(verbosity).to_string().to_ascii_lowercase();
    Builder::from_env(Env::default().default_filter_or(default))
        .target(Target::Stderr)
        .format_timestamp_secs()
        .init();
}
