use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

pub const DEFAULT_LOG_FILTER: &str = "jenkins_api=info,jenkins_status=info";

pub fn init() {
    init_with_default(DEFAULT_LOG_FILTER);
}

/// Installs the global subscriber; `RUST_LOG` wins over `default_filter`.
/// A second call is a no-op.
pub fn init_with_default(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .try_init();
}

pub fn init_dev() {
    init_with_default("jenkins_api=debug,jenkins_status=debug");
}
