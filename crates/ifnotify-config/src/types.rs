//! Every struct implements [`Default`] with production defaults so that a
//! bare `[section]` header in TOML produces a working configuration.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration for the event engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How events travel from producers to subscriber callbacks.
    pub delivery: DeliverySection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// DeliverySection
// ---------------------------------------------------------------------------

/// Per-connection delivery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliverySection {
    /// `"queued"` drains a per-connection FIFO on its own task;
    /// `"inline"` invokes callbacks on the emitting thread.
    pub mode: String,
    /// Pending-delivery depth at which a connection logs a warning, repeated
    /// at every multiple. `0` disables the warning.
    pub queue_warn_depth: usize,
}

impl Default for DeliverySection {
    fn default() -> Self {
        Self {
            mode: "queued".to_owned(),
            queue_warn_depth: 1024,
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"`, or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["ifnotify_events=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sections_use_defaults() {
        let config: Config = toml::from_str("[delivery]\n[logging]\n").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str("[delivery]\nmode = \"inline\"\n").unwrap();
        assert_eq!(config.delivery.mode, "inline");
        assert_eq!(config.delivery.queue_warn_depth, 1024);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_serialize_roundtrip_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"mode\":\"queued\""));
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
