use tracing_subscriber::EnvFilter;

/// Used when `RUST_LOG` is unset or unparsable, keeping the transcript quiet.
pub const DEFAULT_LOG_DIRECTIVES: &str = "warn";

/// Installs the stderr subscriber, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let filter = log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref());

    // Logs go to stderr so they never split a streamed reply on stdout.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

pub fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|raw| !raw.trim().is_empty())
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_DIRECTIVES))
}
