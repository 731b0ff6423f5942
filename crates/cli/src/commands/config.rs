use std::env;
use std::fs;
use std::path::Path;

use phonebook_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

/// One reported setting and the environment variables that can set it, in
/// lookup order.
struct Field {
    key_path: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(&field, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(format!("- {} = {} (source: {source})", field.key_path, field.value));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let api_key = config.llm.api_key.as_ref().map(|key| redact_secret(key.expose_secret()));
    let base_url = match (&config.llm.base_url, config.llm.effective_base_url()) {
        (Some(explicit), _) => explicit.clone(),
        (None, Some(default)) => format!("{default} (provider default)"),
        (None, None) => "<unset>".to_string(),
    };

    vec![
        Field {
            key_path: "database.url",
            env_keys: &["PHONEBOOK_DATABASE_URL", "DATABASE_URL"],
            value: config.database.url.clone(),
        },
        Field {
            key_path: "database.max_connections",
            env_keys: &["PHONEBOOK_DATABASE_MAX_CONNECTIONS"],
            value: config.database.max_connections.to_string(),
        },
        Field {
            key_path: "database.timeout_secs",
            env_keys: &["PHONEBOOK_DATABASE_TIMEOUT_SECS"],
            value: config.database.timeout_secs.to_string(),
        },
        Field {
            key_path: "llm.provider",
            env_keys: &["PHONEBOOK_LLM_PROVIDER"],
            value: format!("{:?}", config.llm.provider),
        },
        Field {
            key_path: "llm.model",
            env_keys: &["PHONEBOOK_LLM_MODEL"],
            value: config.llm.model.clone(),
        },
        Field { key_path: "llm.base_url", env_keys: &["PHONEBOOK_LLM_BASE_URL"], value: base_url },
        Field {
            key_path: "llm.api_key",
            env_keys: &["PHONEBOOK_LLM_API_KEY", "OPENAI_API_KEY"],
            value: api_key.unwrap_or_else(|| "<unset>".to_string()),
        },
        Field {
            key_path: "llm.timeout_secs",
            env_keys: &["PHONEBOOK_LLM_TIMEOUT_SECS"],
            value: config.llm.timeout_secs.to_string(),
        },
        Field {
            key_path: "llm.max_retries",
            env_keys: &["PHONEBOOK_LLM_MAX_RETRIES"],
            value: config.llm.max_retries.to_string(),
        },
        Field {
            key_path: "server.bind_address",
            env_keys: &["PHONEBOOK_SERVER_BIND_ADDRESS", "HOST"],
            value: config.server.bind_address.clone(),
        },
        Field {
            key_path: "server.port",
            env_keys: &["PHONEBOOK_SERVER_PORT", "PORT"],
            value: config.server.port.to_string(),
        },
        Field {
            key_path: "server.graceful_shutdown_secs",
            env_keys: &["PHONEBOOK_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            value: config.server.graceful_shutdown_secs.to_string(),
        },
        Field {
            key_path: "logging.level",
            env_keys: &["PHONEBOOK_LOGGING_LEVEL", "PHONEBOOK_LOG_LEVEL"],
            value: config.logging.level.clone(),
        },
        Field {
            key_path: "logging.format",
            env_keys: &["PHONEBOOK_LOGGING_FORMAT", "PHONEBOOK_LOG_FORMAT"],
            value: format!("{:?}", config.logging.format),
        },
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    field: &Field,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let env_key = field
        .env_keys
        .iter()
        .find(|key| env::var(key).map(|value| !value.trim().is_empty()).unwrap_or(false));
    if let Some(env_key) = env_key {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, field.key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

/// Keeps a short prefix such as `sk-` so operators can tell keys apart.
fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
