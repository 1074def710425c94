use std::collections::VecDeque;
use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

const DEFAULT_FILTER: &str = "info";

/// Prefixes every message with the labels of the run it belongs to, e.g.
/// `[sync #3] 📥 Fetching listing`.
#[derive(Debug, Clone, Default)]
pub struct Logger {
    prefixes: VecDeque<String>,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push_back(prefix.into());
        self
    }

    fn render(&self, message: &str) -> String {
        let mut line = String::new();
        for prefix in &self.prefixes {
            line.push_str(prefix);
            line.push(' ');
        }
        line.push_str(message);
        line
    }

    pub fn info(&self, message: &str) {
        tracing::info!("{}", self.render(message));
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!("{}", self.render(message));
    }

    pub fn error(&self, message: &str) {
        tracing::error!("{}", self.render(message));
    }

    pub fn debug(&self, message: &str) {
        tracing::debug!("{}", self.render(message));
    }
}

/// Install the fmt subscriber once. `RUST_LOG` overrides the default
/// `info` filter.
pub fn init_logging() -> Logger {
    if !tracing::dispatcher::has_been_set() {
        INIT.call_once(|| {
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
            // A subscriber installed elsewhere wins; nothing to do then.
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .try_init();
        });
    }
    Logger::new()
}
