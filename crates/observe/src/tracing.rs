use {
    std::sync::Once,
    tracing_subscriber::{EnvFilter, fmt::format::FmtSpan},
};

/// Environment variable that overrides the filter passed to [`initialize`].
pub const LOG_FILTER: &str = "LOG_FILTER";

/// Initializes tracing setup that is shared between the binaries.
/// `env_filter` has similar syntax to env_logger. It is documented at
/// https://docs.rs/tracing-subscriber/0.3/tracing_subscriber/filter/struct.EnvFilter.html
///
/// Panics if a global subscriber was already installed.
pub fn initialize(env_filter: &str) {
    set_tracing_subscriber(env_filter, false);
}

/// Like [`initialize`], but can be called multiple times in a row. Later
/// calls are ignored.
///
/// Useful for tests.
pub fn initialize_reentrant(env_filter: &str) {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| set_tracing_subscriber(env_filter, true));
}

fn set_tracing_subscriber(env_filter: &str, test_writer: bool) {
    let filter = EnvFilter::try_from_env(LOG_FILTER).unwrap_or_else(|_| env_filter.into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true);
    if test_writer {
        // Fails when another test in the same binary already installed a
        // subscriber, which then keeps receiving the events.
        builder.with_test_writer().try_init().ok();
    } else {
        builder.init();
    }
    tracing::debug!(env_filter, "tracing initialized");
}
