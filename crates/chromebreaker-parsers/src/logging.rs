//! Tracing setup and logging helpers
//!
//! Library code only emits events; binaries call [`init_with_config`]
//! once. `RUST_LOG` overrides the configured filter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static TRACING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Install the subscriber with the default filter (`warn,chromebreaker=info`)
pub fn init_default() {
    init_with_config(TracingConfig::default());
}

/// Install the subscriber. Only the first call in a process has any effect.
pub fn init_with_config(config: TracingConfig) {
    if TRACING_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
        .is_err()
    {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let layer = fmt::layer()
        .with_ansi(config.ansi)
        .with_target(config.show_target)
        .with_thread_ids(config.show_thread_ids)
        .with_line_number(config.show_line_number);

    // An embedding application may own the global subscriber already
    let _ = tracing_subscriber::registry().with(layer).with(filter).try_init();
}

/// Subscriber settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    pub show_target: bool,
    pub show_thread_ids: bool,
    pub show_line_number: bool,
    /// Colored output
    pub ansi: bool,
}

impl TracingConfig {
    /// Map a `-v` count to a level: 0 warn, 1 info, 2 debug, 3+ trace.
    /// Higher levels also show targets, and at trace thread ids and lines.
    pub fn from_verbosity(verbosity: u8) -> Self {
        let level = match verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        Self {
            filter: level.to_string(),
            show_target: verbosity >= 2,
            show_thread_ids: verbosity >= 3,
            show_line_number: verbosity >= 3,
            ..Self::default()
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            filter: "warn,chromebreaker=info".to_string(),
            show_target: false,
            show_thread_ids: false,
            show_line_number: false,
            ansi: true,
        }
    }
}

#[macro_export]
macro_rules! log_archive_open {
    ($parser:expr, $path:expr) => {
        tracing::info!(parser = %$parser, path = %$path.display(), "Opening archive")
    };
}

#[macro_export]
macro_rules! log_archive_done {
    ($path:expr, $elapsed:expr, $resources:expr, $skipped:expr) => {
        tracing::info!(
            path = %$path.display(),
            elapsed_ms = %$elapsed.as_millis(),
            resources = $resources,
            skipped = $skipped,
            "Archive extracted"
        )
    };
}

#[macro_export]
macro_rules! log_archive_failed {
    ($path:expr, $error:expr) => {
        tracing::error!(path = %$path.display(), error = %$error, "Archive extraction failed")
    };
}

/// Run one pipeline phase inside a `phase` span and log its duration
pub fn instrument_phase<T, F>(name: &str, f: F) -> T
where
    F: FnOnce() -> T,
{
    let span = tracing::debug_span!("phase", phase = %name);
    let _guard = span.enter();

    let start = Instant::now();
    let result = f();
    tracing::debug!(duration_ms = %start.elapsed().as_millis(), "Phase complete");

    result
}

/// Span wrapping all events about one logical resource
pub fn resource_span(index: usize, name: &str) -> tracing::Span {
    tracing::debug_span!("resource", index, name = %name)
}
