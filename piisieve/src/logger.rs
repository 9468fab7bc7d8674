// piisieve/src/logger.rs
//! Logger setup for the piisieve binary.
//!
//! `RUST_LOG` is honoured as usual; an explicit level from `--quiet` or
//! `--debug` overrides it. Log output goes to stderr so NDJSON written to
//! stdout stays clean.

use log::LevelFilter;

/// Default filter when neither `RUST_LOG` nor a flag sets one.
const DEFAULT_FILTER: &str = "warn";

/// Initializes `env_logger`. Calling it twice is harmless.
pub fn init_logger(level: Option<LevelFilter>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_FILTER));
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder.format_timestamp_millis();
    let _ = builder.try_init();
}

/// Maps the CLI verbosity flags onto a level override.
pub fn level_from_flags(quiet: bool, debug: bool) -> Option<LevelFilter> {
    if quiet {
        Some(LevelFilter::Off)
    } else if debug {
        Some(LevelFilter::Debug)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_wins_over_debug() {
        assert_eq!(level_from_flags(true, true), Some(LevelFilter::Off));
        assert_eq!(level_from_flags(false, true), Some(LevelFilter::Debug));
        assert_eq!(level_from_flags(false, false), None);
    }
}
