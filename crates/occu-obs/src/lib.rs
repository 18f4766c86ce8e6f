use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,occu=debug";

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    /// `OCCU_LOG_FORMAT=text` switches to human readable lines; anything else is JSON
    pub fn from_env() -> Self {
        match std::env::var("OCCU_LOG_FORMAT").as_deref() {
            Ok("text") | Ok("pretty") => LogFormat::Text,
            _ => LogFormat::Json,
        }
    }
}

/// Initialize logging.
/// - JSON logs by default, plain text with `OCCU_LOG_FORMAT=text`
/// - RUST_LOG respected; default to "info,occu=debug"
pub fn init(service_name: &str) {
    let format = LogFormat::from_env();
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string());

    let json = (format == LogFormat::Json).then(|| tracing_subscriber::fmt::layer().json());
    let text = (format == LogFormat::Text).then(|| tracing_subscriber::fmt::layer());

    tracing_subscriber::registry()
        .with(EnvFilter::new(env_filter))
        .with(json)
        .with(text)
        .init();

    tracing::info!(service = %service_name, ?format, "Observability initialized");
}
