//! Environment variables are **fallback**, not override: they only fill
//! fields that the config file left unset.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// How an environment string is converted into a TOML value.
#[derive(Debug, Clone, Copy)]
enum EnvValueKind {
    Str,
    Int,
}

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
    kind: EnvValueKind,
}

/// All supported `IFNOTIFY_*` env var mappings.
const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "IFNOTIFY_LOG_LEVEL",
        field_path: "logging.level",
        kind: EnvValueKind::Str,
    },
    EnvMapping {
        var_name: "IFNOTIFY_LOG_FORMAT",
        field_path: "logging.format",
        kind: EnvValueKind::Str,
    },
    EnvMapping {
        var_name: "IFNOTIFY_DELIVERY_MODE",
        field_path: "delivery.mode",
        kind: EnvValueKind::Str,
    },
    EnvMapping {
        var_name: "IFNOTIFY_QUEUE_WARN_DEPTH",
        field_path: "delivery.queue_warn_depth",
        kind: EnvValueKind::Int,
    },
];

/// Snapshot the `IFNOTIFY_*` variables of the current process.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(k, _)| k.starts_with("IFNOTIFY_"))
        .collect()
}

/// Apply environment variable fallbacks to fields that `file_layer` did not
/// set.
///
/// Returns the number of env vars applied.
///
/// # Errors
///
/// Returns [`ConfigError::EnvError`] if a numeric variable does not parse.
pub fn apply_env_fallbacks<S: ::std::hash::BuildHasher>(
    merged: &mut toml::Value,
    file_layer: Option<&toml::Value>,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<usize> {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        let Some(raw) = env_vars.get(mapping.var_name) else {
            continue;
        };
        if file_layer.is_some_and(|file| lookup(file, mapping.field_path).is_some()) {
            debug!(
                var = mapping.var_name,
                field = mapping.field_path,
                "config file sets field, env fallback ignored"
            );
            continue;
        }

        let value = match mapping.kind {
            EnvValueKind::Str => toml::Value::String(raw.clone()),
            EnvValueKind::Int => {
                let parsed: i64 = raw.trim().parse().map_err(|e| ConfigError::EnvError {
                    var_name: mapping.var_name.to_owned(),
                    message: format!("expected an integer: {e}"),
                })?;
                toml::Value::Integer(parsed)
            },
        };

        set_path(merged, mapping.field_path, value);
        count = count.saturating_add(1);
    }

    Ok(count)
}

/// Look up a dotted path in a TOML tree.
fn lookup<'a>(root: &'a toml::Value, path: &str) -> Option<&'a toml::Value> {
    path.split('.')
        .try_fold(root, |node, key| node.as_table().and_then(|t| t.get(key)))
}

/// Set a dotted path in a TOML tree, creating intermediate tables.
fn set_path(root: &mut toml::Value, path: &str, value: toml::Value) {
    let mut node = root;
    let mut segments = path.split('.').peekable();
    while let Some(key) = segments.next() {
        let Some(table) = node.as_table_mut() else {
            return;
        };
        if segments.peek().is_none() {
            table.insert(key.to_owned(), value);
            return;
        }
        node = table
            .entry(key.to_owned())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> toml::Value {
        toml::from_str("[delivery]\nmode = \"queued\"\nqueue_warn_depth = 1024\n").unwrap()
    }

    #[test]
    fn test_env_applies_when_file_silent() {
        let mut merged = base();
        let env = HashMap::from([("IFNOTIFY_DELIVERY_MODE".to_owned(), "inline".to_owned())]);

        let applied = apply_env_fallbacks(&mut merged, None, &env).unwrap();
        assert_eq!(applied, 1);
        assert_eq!(
            lookup(&merged, "delivery.mode").and_then(toml::Value::as_str),
            Some("inline")
        );
    }

    #[test]
    fn test_env_ignored_when_file_sets_field() {
        let mut merged = base();
        let file: toml::Value = toml::from_str("[delivery]\nmode = \"queued\"\n").unwrap();
        let env = HashMap::from([("IFNOTIFY_DELIVERY_MODE".to_owned(), "inline".to_owned())]);

        let applied = apply_env_fallbacks(&mut merged, Some(&file), &env).unwrap();
        assert_eq!(applied, 0);
        assert_eq!(
            lookup(&merged, "delivery.mode").and_then(toml::Value::as_str),
            Some("queued")
        );
    }

    #[test]
    fn test_env_integer_parsed() {
        let mut merged = base();
        let env = HashMap::from([("IFNOTIFY_QUEUE_WARN_DEPTH".to_owned(), " 64 ".to_owned())]);

        apply_env_fallbacks(&mut merged, None, &env).unwrap();
        assert_eq!(
            lookup(&merged, "delivery.queue_warn_depth").and_then(toml::Value::as_integer),
            Some(64)
        );
    }

    #[test]
    fn test_env_integer_invalid() {
        let mut merged = base();
        let env = HashMap::from([("IFNOTIFY_QUEUE_WARN_DEPTH".to_owned(), "lots".to_owned())]);

        let result = apply_env_fallbacks(&mut merged, None, &env);
        assert!(matches!(result, Err(ConfigError::EnvError { .. })));
    }

    #[test]
    fn test_set_path_creates_tables() {
        let mut merged = toml::Value::Table(toml::map::Map::new());
        set_path(&mut merged, "logging.level", toml::Value::String("debug".into()));
        assert_eq!(
            lookup(&merged, "logging.level").and_then(toml::Value::as_str),
            Some("debug")
        );
    }
}
