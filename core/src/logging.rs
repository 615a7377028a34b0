//! Tracing subscriber setup: a `tracing-subscriber` `fmt` layer with a
//! configurable filter.

use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. `"agent_runtime=debug,info"`.
    pub filter: String,
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            ansi: true,
        }
    }
}

/// Installs a process-global `tracing` subscriber. Safe to call once at
/// process start; subsequent calls are a no-op if a subscriber is already set.
pub fn init_tracing(config: LogConfig) {
    let filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_ansi(config.ansi).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
