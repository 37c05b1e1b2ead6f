/// JSON log output for CloudWatch. Level defaults to INFO, overridable via
/// the `LOG_LEVEL` environment variable.
pub fn init() {
    let level = std::env::var("LOG_LEVEL")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::fmt()
        .json()
        .with_max_level(level)
        .with_current_span(false)
        .with_span_list(false)
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .init();
}
