use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::paths::AppPaths;
use super::settings::Settings;
use super::validation::validate_config;
use crate::core::errors::ApiError;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 12] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "token_",
    "credential",
    "private_key",
    "auth_",
    "_auth",
    "jwt",
    "access_key",
    "bearer",
];

const SENSITIVE_WHITELIST: [&str; 3] = ["max_tokens", "total_tokens", "tokens"];

/// Environment variables that override entries of the merged YAML document.
const ENV_OVERRIDES: [(&str, &[&str]); 11] = [
    ("GROQ_API_KEY", &["llm", "api_key"]),
    ("GROQ_MODEL", &["llm", "model"]),
    ("EMBEDDING_API_KEY", &["embedding", "api_key"]),
    ("HUGGINGFACE_API_KEY", &["embedding", "api_key"]),
    ("ASTRA_DB_APPLICATION_TOKEN", &["vector_store", "astra", "application_token"]),
    ("ASTRA_DB_ID", &["vector_store", "astra", "database_id"]),
    ("ASTRA_DB_REGION", &["vector_store", "astra", "region"]),
    ("ASTRA_DB_KEYSPACE", &["vector_store", "astra", "keyspace"]),
    ("IMSKOS_VECTOR_BACKEND", &["vector_store", "backend"]),
    ("IMSKOS_ENVIRONMENT", &["app", "environment"]),
    ("PORT", &["server", "port"]),
];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("IMSKOS_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let [data_config, project_config] = self.paths.config_candidates();
        if data_config.exists() {
            data_config
        } else {
            project_config
        }
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.paths.secrets_path.clone()
    }

    /// Public config deep-merged with the secrets file.
    pub fn load_config(&self) -> Result<Value, ApiError> {
        let public_config = load_yaml_file(&self.config_path());
        let secrets_config = load_yaml_file(&self.secrets_path());
        Ok(deep_merge(&public_config, &secrets_config))
    }

    /// Resolve the typed settings: files, then process environment, then validation.
    pub fn load_settings(&self) -> Result<Settings, ApiError> {
        let mut config = self.load_config()?;
        apply_env_overrides(&mut config, |key| env::var(key).ok());
        settings_from_value(config)
    }

    pub fn redact_sensitive_values(&self, value: &Value) -> Value {
        redact_sensitive_values(value)
    }
}

pub fn settings_from_value(mut config: Value) -> Result<Settings, ApiError> {
    validate_config(&config)?;
    // `llm:` with no body parses as null; treat it as an absent section
    if let Some(map) = config.as_object_mut() {
        map.retain(|_, section| !section.is_null());
    }
    serde_json::from_value(config)
        .map_err(|err| ApiError::BadRequest(format!("Invalid config: {}", err)))
}

fn load_yaml_file(path: &Path) -> Value {
    if !path.exists() {
        return Value::Object(Map::new());
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<Value>(&contents) {
            Ok(value) => match value {
                Value::Object(_) => value,
                _ => Value::Object(Map::new()),
            },
            Err(err) => {
                tracing::warn!("Ignoring unparseable config file {}: {}", path.display(), err);
                Value::Object(Map::new())
            }
        },
        Err(_) => Value::Object(Map::new()),
    }
}

fn apply_env_overrides<F>(config: &mut Value, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    for (var, path) in ENV_OVERRIDES {
        let Some(raw) = lookup(var).filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        let value = if var == "PORT" {
            match raw.trim().parse::<u64>() {
                Ok(port) => Value::from(port),
                Err(_) => {
                    tracing::warn!("Ignoring non-numeric PORT value: {}", raw);
                    continue;
                }
            }
        } else {
            Value::String(raw)
        };
        ensure_object_path(config, path, value);
    }
}

fn ensure_object_path(config: &mut Value, path: &[&str], value: Value) {
    if path.is_empty() {
        return;
    }
    if !config.is_object() {
        *config = Value::Object(Map::new());
    }

    let mut current = config;
    for (index, key) in path.iter().enumerate() {
        if index == path.len() - 1 {
            if let Some(map) = current.as_object_mut() {
                map.insert(key.to_string(), value);
            }
            return;
        }

        if !current.get(*key).map(|v| v.is_object()).unwrap_or(false) {
            let Some(map) = current.as_object_mut() else {
                return;
            };
            map.insert((*key).to_string(), Value::Object(Map::new()));
        }

        let Some(next) = current.get_mut(*key) else {
            return;
        };
        current = next;
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST
        .iter()
        .any(|allowed| *allowed == key_lower)
    {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::core::config::VectorStoreBackend;

    fn service_in(dir: &Path) -> ConfigService {
        ConfigService::new(Arc::new(AppPaths::with_dirs(
            dir.to_path_buf(),
            dir.join("data"),
        )))
    }

    #[test]
    fn deep_merge_merges_objects_and_overrides_scalars() {
        let base = json!({
            "llm": { "model": "a", "temperature": 0.0 },
            "origins": ["x", "y"]
        });
        let override_value = json!({
            "llm": { "model": "b" },
            "origins": ["z"],
            "extra": true
        });

        let merged = deep_merge(&base, &override_value);

        assert_eq!(
            merged,
            json!({
                "llm": { "model": "b", "temperature": 0.0 },
                "origins": ["z"],
                "extra": true
            })
        );
    }

    #[test]
    fn env_overrides_land_in_nested_sections() {
        let mut config = json!({ "llm": { "model": "custom" } });
        apply_env_overrides(&mut config, |key| match key {
            "GROQ_API_KEY" => Some("gsk-123".to_string()),
            "ASTRA_DB_ID" => Some("db-1".to_string()),
            "PORT" => Some("9100".to_string()),
            _ => None,
        });

        assert_eq!(config["llm"]["api_key"], "gsk-123");
        assert_eq!(config["llm"]["model"], "custom");
        assert_eq!(config["vector_store"]["astra"]["database_id"], "db-1");
        assert_eq!(config["server"]["port"], 9100);
    }

    #[test]
    fn non_numeric_port_is_ignored() {
        let mut config = json!({});
        apply_env_overrides(&mut config, |key| {
            (key == "PORT").then(|| "eighty".to_string())
        });
        assert!(config.get("server").is_none());
    }

    #[test]
    fn redact_sensitive_values_replaces_secrets_only() {
        let input = json!({
            "llm": { "api_key": "secret", "max_tokens": 42 },
            "vector_store": { "astra": { "application_token": "AstraCS:x", "keyspace": "ks" } }
        });

        let redacted = redact_sensitive_values(&input);

        assert_eq!(
            redacted,
            json!({
                "llm": { "api_key": "****", "max_tokens": 42 },
                "vector_store": { "astra": { "application_token": "****", "keyspace": "ks" } }
            })
        );
    }

    #[test]
    fn load_config_merges_secrets_file() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("config.yml"),
            "vector_store:\n  backend: astra\nworkflow:\n  top_k: 6\n",
        )
        .unwrap();
        let service = service_in(tmp.path());
        fs::write(
            service.secrets_path(),
            "vector_store:\n  astra:\n    application_token: AstraCS:abc\n",
        )
        .unwrap();

        let config = service.load_config().unwrap();
        let settings = settings_from_value(config).unwrap();

        assert_eq!(settings.vector_store.backend, VectorStoreBackend::Astra);
        assert_eq!(settings.workflow.top_k, 6);
        assert_eq!(
            settings.vector_store.astra.application_token.as_deref(),
            Some("AstraCS:abc")
        );
        assert_eq!(settings.workflow.max_context_documents, 5);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = settings_from_value(json!({ "workflow": { "top_k": 0 } })).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err =
            settings_from_value(json!({ "vector_store": { "backend": "pinecone" } })).unwrap_err();
        assert!(err.to_string().contains("vector_store.backend"));
    }

    #[test]
    fn oversized_context_window_is_rejected() {
        let err = settings_from_value(json!({ "workflow": { "max_context_documents": 8 } }))
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert!(err.to_string().contains("workflow.max_context_documents"));
    }
}
