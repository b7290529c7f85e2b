//! Test logging.
//!
//! One initializer shared by the backend's unit tests (through a `ctor` in
//! `lib.rs`) and every integration test binary.

use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

static INITIALIZED: OnceCell<()> = OnceCell::new();

const DEFAULT_FILTER: &str = "warn";

/// Install a test-writer subscriber once per process.
///
/// Level comes from `TEST_LOG`, then `RUST_LOG`, then `warn`. Move
/// rejections log at `warn`, so a failing race test shows its losing
/// commit without extra setup. Safe to call any number of times.
pub fn init() {
    INITIALIZED.get_or_init(|| {
        let filter = filter_from(|name| std::env::var(name).ok());
        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .without_time()
            .with_target(true)
            .try_init()
            .ok();
    });
}

fn filter_from(lookup: impl Fn(&str) -> Option<String>) -> EnvFilter {
    let directives = lookup("TEST_LOG")
        .or_else(|| lookup("RUST_LOG"))
        .unwrap_or_else(|| DEFAULT_FILTER.to_owned());
    EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
