//! Tracing subscriber setup.
//!
//! Filter priority: `NCFIX_LOG`, then `RUST_LOG`, then the level implied by
//! `--verbose` / `--quiet`. Logs go to stderr so stdout stays parseable.
use tracing::Level;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Environment variable holding ncfix-specific filter directives.
pub const LOG_ENV: &str = "NCFIX_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    /// Verbose wins when both flags are set.
    pub const fn from_flags(verbose: bool, quiet: bool) -> Self {
        if verbose {
            Self::Verbose
        } else if quiet {
            Self::Quiet
        } else {
            Self::Normal
        }
    }

    pub const fn default_level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
        }
    }
}

/// Install the global subscriber. Call once, before loading config.
pub fn init(verbosity: Verbosity) {
    let filter = build_env_filter(verbosity, std::env::var(LOG_ENV).ok().as_deref());
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .compact();
    tracing_subscriber::registry().with(filter).with(layer).init();
}

/// Unparseable directives fall through to the next source.
fn build_env_filter(verbosity: Verbosity, ncfix_log: Option<&str>) -> EnvFilter {
    if let Some(filter) = ncfix_log.and_then(|directives| EnvFilter::try_new(directives).ok()) {
        return filter;
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::new(verbosity.default_level().as_str())
}
