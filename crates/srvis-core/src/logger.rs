//! Stderr logger for the command-line tool.
//!
//! Lines look like `[  0.042s  INFO read] loaded 1234 localisations`: seconds
//! since installation, level, and the last segment of the emitting module.
//! `-v` raises the level of the `srvis*` crates only.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

/// Crates outside the workspace (image codecs, XML parsing) never log below
/// `Warn`, whatever `-v` asks for.
const DEPENDENCY_CEILING: LevelFilter = LevelFilter::Warn;

fn is_own_target(target: &str) -> bool {
    target == "srvis" || target.starts_with("srvis_") || target.starts_with("srvis::")
}

fn short_target(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

fn level_for(target: &str, level: LevelFilter) -> LevelFilter {
    if is_own_target(target) {
        level
    } else {
        level.min(DEPENDENCY_CEILING)
    }
}

fn format_line(elapsed_s: f64, record: &Record) -> String {
    format!(
        "[{:7.3}s {:>5} {}] {}",
        elapsed_s,
        record.level(),
        short_target(record.target()),
        record.args()
    )
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= level_for(metadata.target(), self.level)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(self.started.elapsed().as_secs_f64(), record);
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger. Later calls keep the first level.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| StderrLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Map `-q` / `-v` counts to a level, starting from `Warn`.
pub fn level_from_verbosity(quiet: bool, verbose: u8) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install a `tracing` subscriber honouring `RUST_LOG`, `srvis=info` when
/// unset. Span close events carry the time spent in readers and histogram
/// builds.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("srvis=info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(level_from_verbosity(true, 3), LevelFilter::Error);
        assert_eq!(level_from_verbosity(false, 0), LevelFilter::Warn);
        assert_eq!(level_from_verbosity(false, 1), LevelFilter::Info);
        assert_eq!(level_from_verbosity(false, 9), LevelFilter::Trace);
    }

    #[test]
    fn dependencies_stay_at_warn() {
        assert_eq!(level_for("srvis_core::store", LevelFilter::Debug), LevelFilter::Debug);
        assert_eq!(level_for("srvis", LevelFilter::Trace), LevelFilter::Trace);
        assert_eq!(level_for("png::decoder", LevelFilter::Debug), LevelFilter::Warn);
        assert_eq!(level_for("roxmltree", LevelFilter::Error), LevelFilter::Error);
        assert!(!is_own_target("srvisual"));
    }

    #[test]
    fn line_carries_level_and_short_target() {
        let line = format_line(
            0.5,
            &Record::builder()
                .args(format_args!("loaded 3 localisations"))
                .level(log::Level::Info)
                .target("srvis_core::read::xyt")
                .build(),
        );
        assert_eq!(line, "[  0.500s  INFO xyt] loaded 3 localisations");
    }

    #[test]
    fn target_is_shortened_to_last_module() {
        assert_eq!(short_target("srvis_core::read::xyt"), "xyt");
        assert_eq!(short_target("srvis"), "srvis");
    }
}
