//! Logging setup for the bot, the API server and the maintenance commands.
//!
//! Output goes through `tracing`. The filter is built from the command-line
//! verbosity unless `RUST_LOG` is set.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Module targets of this crate that get their own filter directive.
const CRATE_TARGETS: &[&str] = &[
    "numerolog::storage",
    "numerolog::ai",
    "numerolog::bot",
    "numerolog::api",
    "numerolog::server",
    "numerolog::notifications",
];

/// HTTP stack targets, noisy below `warn`.
const HTTP_TARGETS: &[&str] = &["warp", "hyper", "reqwest"];

/// How much the process should log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Info and above.
    #[default]
    Normal,
    /// Debug and above.
    Verbose,
    /// Everything, including the HTTP stack.
    Trace,
}

impl Verbosity {
    /// Level used for this crate's own targets.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Level used for the HTTP server and client crates.
    #[must_use]
    pub fn http_level(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal | Self::Verbose => Level::WARN,
            Self::Trace => Level::TRACE,
        }
    }
}

/// Filter directives applied when `RUST_LOG` is not set.
#[must_use]
pub fn default_filter(verbosity: Verbosity) -> String {
    let level = verbosity.to_level_filter();
    let http = verbosity.http_level();

    let mut directives = vec![format!("numerolog={level}")];
    directives.extend(CRATE_TARGETS.iter().map(|target| format!("{target}={level}")));
    directives.extend(HTTP_TARGETS.iter().map(|target| format!("{target}={http}")));
    directives.join(",")
}

/// Install the global subscriber.
///
/// Call once at startup. A second call is a no-op.
///
/// ```no_run
/// use numerolog::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    );

    let _ = subscriber.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(Verbosity::Quiet.to_level_filter(), Level::ERROR);
        assert_eq!(Verbosity::Normal.to_level_filter(), Level::INFO);
        assert_eq!(Verbosity::Verbose.to_level_filter(), Level::DEBUG);
        assert_eq!(Verbosity::Trace.to_level_filter(), Level::TRACE);
        assert_eq!(Verbosity::default(), Verbosity::Normal);
    }

    #[test]
    fn test_default_filter_names_crate_modules() {
        let filter = default_filter(Verbosity::Verbose);
        assert!(filter.starts_with("numerolog=DEBUG,"));
        for target in ["numerolog::storage", "numerolog::ai", "numerolog::bot"] {
            assert!(filter.contains(&format!("{target}=DEBUG")), "{filter}");
        }
        assert!(filter.contains("warp=WARN"));
        assert!(filter.contains("reqwest=WARN"));
    }

    #[test]
    fn test_http_stack_follows_trace_and_quiet() {
        let trace = default_filter(Verbosity::Trace);
        assert!(trace.contains("hyper=TRACE"));

        let quiet = default_filter(Verbosity::Quiet);
        assert!(quiet.contains("numerolog::bot=ERROR"));
        assert!(quiet.contains("warp=ERROR"));
    }

    #[test]
    fn test_default_filter_parses() {
        for verbosity in [
            Verbosity::Quiet,
            Verbosity::Normal,
            Verbosity::Verbose,
            Verbosity::Trace,
        ] {
            assert!(EnvFilter::try_new(default_filter(verbosity)).is_ok());
        }
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging(Verbosity::Quiet);
        init_logging(Verbosity::Trace);
    }
}
