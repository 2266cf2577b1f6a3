//! Configuration struct definitions.

use serde::{Deserialize, Serialize};

/// Top-level Courier configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Event bus settings.
    pub bus: BusConfig,
    /// Logging settings consumed by `courier-telemetry`.
    pub logging: LoggingConfig,
}

/// Where asynchronous handlers are executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AsyncBackend {
    /// Use the tokio blocking pool when a runtime is active at construction,
    /// otherwise dedicated threads.
    #[default]
    Auto,
    /// One OS thread per asynchronous dispatch.
    Thread,
    /// `spawn_blocking` on the current tokio runtime.
    Tokio,
}

/// Event bus settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Bus name, attached to log events and dispatch thread names.
    pub name: String,
    /// Executor for asynchronous handlers.
    pub async_backend: AsyncBackend,
    /// Prefix for dispatch thread names. Defaults to the bus name.
    pub thread_prefix: Option<String>,
    /// Emit a `warn` event for each failed handler invocation.
    pub log_failures: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            name: "courier".to_owned(),
            async_backend: AsyncBackend::Auto,
            thread_prefix: None,
            log_failures: true,
        }
    }
}

impl BusConfig {
    /// Create a config with the given bus name and defaults elsewhere.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the async backend.
    #[must_use]
    pub fn with_async_backend(mut self, backend: AsyncBackend) -> Self {
        self.async_backend = backend;
        self
    }

    /// Set the dispatch thread name prefix.
    #[must_use]
    pub fn with_thread_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_prefix = Some(prefix.into());
        self
    }

    /// Silence per-failure `warn` events.
    #[must_use]
    pub fn without_failure_logs(mut self) -> Self {
        self.log_failures = false;
        self
    }

    /// Prefix used when naming dispatch threads.
    #[must_use]
    pub fn effective_thread_prefix(&self) -> &str {
        self.thread_prefix.as_deref().unwrap_or(&self.name)
    }
}

/// Logging section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level filter (`error`, `warn`, `info`, `debug`, `trace`).
    pub level: String,
    /// Output format: `pretty`, `compact`, `json` or `full`.
    pub format: String,
    /// Extra `EnvFilter` directives (e.g. `courier_events=trace`).
    pub directives: Vec<String>,
}

impl LoggingConfig {
    /// Accepted `format` values.
    pub const FORMATS: &'static [&'static str] = &["pretty", "compact", "json", "full"];
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "pretty".to_owned(),
            directives: Vec::new(),
        }
    }
}
