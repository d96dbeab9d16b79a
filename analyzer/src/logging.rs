//! Logging setup for closecheck
//!
//! Thin wrappers around `env_logger` so the CLI, tests and benches all
//! initialise the `log` facade the same way.
//!
//! # Log Levels
//!
//! - `error!` - load and configuration failures
//! - `warn!` - recoverable type errors in analyzed sources
//! - `info!` - phases (loading, summarizing, checking)
//! - `debug!` - per-function summaries and findings
//! - `trace!` - statement-by-statement scans (only with `trace = true`)
//!
//! Set `RUST_LOG` to override, e.g. `RUST_LOG=analyzer::closecheck=debug`.

use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize logging at Warn level. Later calls are no-ops.
pub fn init() {
    init_with_level(LevelFilter::Warn);
}

/// Initialize logging with a specific level. Later calls are no-ops.
pub fn init_with_level(level: LevelFilter) {
    INIT.call_once(|| {
        Builder::new()
            .filter_level(level)
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{:5}] {} - {}",
                    record.level(),
                    record.target(),
                    record.args()
                )
            })
            .init();
    });
}

/// Initialize logging from `RUST_LOG`, defaulting to Warn.
pub fn init_from_env() {
    INIT.call_once(|| {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    });
}

/// Initialize logging for tests; safe to call from every test.
pub fn init_test() {
    let _ = env_logger::builder()
        .filter_level(LevelFilter::Warn)
        .is_test(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_is_idempotent() {
        init_test();
        init_test();
    }

    #[test]
    fn test_levels_do_not_panic() {
        init_test();
        log::warn!("unresolved identifier in fixture");
        log::debug!("summary computed");
        log::trace!("statement scanned");
    }
}
