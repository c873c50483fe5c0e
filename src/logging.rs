//! Logging setup on top of the `log` facade and `env_logger`.
//!
//! Levels are chosen in this order:
//!
//! 1. `RUST_LOG`, when set, is used as-is
//! 2. `--quiet` → error, `-v` → debug, `-vv` → trace
//! 3. Otherwise info
//!
//! Outside of `RUST_LOG`, the chosen level applies to this crate only;
//! dependencies log at warn so `-vv` is not drowned in pool and SQLite noise.
//!
//! Debug builds print a timestamp and, with `-v`, the module path. Release
//! builds print level and message only.
//!
//! ```rust,no_run
//! use model_archivist::logging::init_logging;
//!
//! init_logging(1, false);
//! log::debug!("visible");
//! ```

use std::env;
use std::io::Write;

use env_logger::Builder;
use log::LevelFilter;

const CRATE_MODULE: &str = "model_archivist";

/// Initialize logging from CLI verbosity flags.
///
/// Returns `false` if a logger was already installed, in which case the
/// existing one is kept.
pub fn init_logging(verbose: u8, quiet: bool) -> bool {
    let from_env = env::var("RUST_LOG").is_ok();
    let level = determine_level(verbose, quiet);

    let mut builder = Builder::new();
    if from_env {
        builder.parse_default_env();
    } else {
        builder
            .filter_level(LevelFilter::Warn.min(level))
            .filter_module(CRATE_MODULE, level);
    }
    configure_format(&mut builder, verbose);

    let installed = builder.try_init().is_ok();
    if installed {
        if from_env {
            log::debug!("Logging configured from RUST_LOG={:?}", env::var("RUST_LOG").ok());
        } else {
            log::debug!("Logging initialized at level: {:?}", level);
        }
    }
    installed
}

/// Level for the given flags; `quiet` wins over `verbose`.
fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn configure_format(builder: &mut Builder, verbose: u8) {
    #[cfg(debug_assertions)]
    {
        builder.format(move |buf, record| {
            let timestamp = buf.timestamp_seconds();
            let level = record.level();
            let style = buf.default_level_style(level);
            if verbose >= 1 {
                writeln!(
                    buf,
                    "{} {style}{:<5}{style:#} [{}] {}",
                    timestamp,
                    level,
                    record.module_path().unwrap_or("unknown"),
                    record.args()
                )
            } else {
                writeln!(buf, "{} {style}{:<5}{style:#} {}", timestamp, level, record.args())
            }
        });
    }

    #[cfg(not(debug_assertions))]
    {
        let _ = verbose;
        builder.format(|buf, record| {
            let level = record.level();
            let style = buf.default_level_style(level);
            writeln!(buf, "{style}{:<5}{style:#} {}", level, record.args())
        });
    }
}

/// Current maximum log level as a lowercase name.
#[must_use]
pub fn current_level_name() -> &'static str {
    match log::max_level() {
        LevelFilter::Off => "off",
        LevelFilter::Error => "error",
        LevelFilter::Warn => "warn",
        LevelFilter::Info => "info",
        LevelFilter::Debug => "debug",
        LevelFilter::Trace => "trace",
    }
}
