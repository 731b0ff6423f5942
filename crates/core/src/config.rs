use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "phonebook.toml";
pub const NESTED_CONFIG_FILE: &str = "config/phonebook.toml";

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

/// Fully resolved settings for the server and the CLI.
///
/// Sources are layered defaults, then the TOML file, then `PHONEBOOK_*`
/// environment variables, then programmatic [`ConfigOverrides`]. The result is
/// validated once every layer is applied.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Which intent classifier backs the resolver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Rules,
    OpenAi,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// Values set in code; they win over every other source.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub database_max_connections: Option<u32>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("failed to parse `{path}` as TOML: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("config file `{0}` does not exist")]
    MissingConfigFile(PathBuf),
    #[error("`${{{var}}}` is referenced in the config file but not set in the environment")]
    MissingEnvInterpolation { var: String },
    #[error("config file contains a `${{` without a closing `}}`")]
    UnterminatedInterpolation,
    #[error("`{key}` has an invalid value `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://phonebook.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::Rules,
                api_key: None,
                base_url: None,
                model: "gpt-3.5-turbo-1106".to_string(),
                timeout_secs: 30,
                max_retries: 2,
            },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 5001,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl LlmConfig {
    /// The configured base URL, or the provider's well-known endpoint.
    pub fn effective_base_url(&self) -> Option<String> {
        if let Some(base_url) = &self.base_url {
            return Some(base_url.trim_end_matches('/').to_string());
        }
        match self.provider {
            LlmProvider::Rules => None,
            LlmProvider::OpenAi => Some(OPENAI_BASE_URL.to_string()),
            LlmProvider::Ollama => Some(OLLAMA_BASE_URL.to_string()),
        }
    }

    fn has_api_key(&self) -> bool {
        self.api_key.as_ref().is_some_and(|key| !key.expose_secret().trim().is_empty())
    }
}

impl FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rules" => Ok(Self::Rules),
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "llm.provider `{other}` is not one of rules|openai|ollama"
            ))),
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "logging.format `{other}` is not one of compact|pretty|json"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let LoadOptions { config_path, require_file, overrides } = options;
        let mut config = Self::default();

        match resolve_config_path(config_path.as_deref()) {
            Some(path) => read_patch(&path)?.apply(&mut config),
            None if require_file => {
                let expected = config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
                return Err(ConfigError::MissingConfigFile(expected));
            }
            None => {}
        }

        env_patch()?.apply(&mut config);
        overrides.into_patch().apply(&mut config);

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let Self { database, llm, server, logging } = self;

        let url = database.url.trim();
        require(
            url.starts_with("sqlite:") || url == ":memory:",
            "database.url must be a sqlite URL such as `sqlite://phonebook.db` or `sqlite::memory:`",
        )?;
        require(database.max_connections > 0, "database.max_connections must be at least 1")?;
        require(
            (1..=300).contains(&database.timeout_secs),
            "database.timeout_secs must be between 1 and 300",
        )?;

        require(
            (1..=300).contains(&llm.timeout_secs),
            "llm.timeout_secs must be between 1 and 300",
        )?;
        if let Some(base_url) = &llm.base_url {
            require(
                base_url.starts_with("http://") || base_url.starts_with("https://"),
                "llm.base_url must be an http:// or https:// URL",
            )?;
        }
        if llm.provider == LlmProvider::OpenAi {
            require(
                llm.has_api_key(),
                "llm.api_key is required for the openai provider (set PHONEBOOK_LLM_API_KEY or OPENAI_API_KEY)",
            )?;
        }
        if llm.provider != LlmProvider::Rules {
            require(!llm.model.trim().is_empty(), "llm.model must not be empty")?;
        }

        require(
            !server.bind_address.trim().is_empty(),
            "server.bind_address must not be empty",
        )?;
        require(server.port > 0, "server.port must not be 0")?;
        require(
            server.graceful_shutdown_secs > 0,
            "server.graceful_shutdown_secs must be at least 1",
        )?;

        require(
            matches!(
                logging.level.trim().to_ascii_lowercase().as_str(),
                "trace" | "debug" | "info" | "warn" | "error"
            ),
            "logging.level must be one of trace|debug|info|warn|error",
        )
    }
}

/// The config file `load` would pick up, if any.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    match explicit_path {
        Some(path) => path.exists().then(|| path.to_path_buf()),
        None => [DEFAULT_CONFIG_FILE, NESTED_CONFIG_FILE]
            .into_iter()
            .map(PathBuf::from)
            .find(|path| path.exists()),
    }
}

fn require(condition: bool, message: &str) -> Result<(), ConfigError> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError::Validation(message.to_string()))
    }
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    let expanded = expand_env_references(&raw)?;

    toml::from_str(&expanded)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Replaces every `${NAME}` with the value of the `NAME` environment variable.
fn expand_env_references(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let end = after_open.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let var = &after_open[..end];
        let value = env::var(var)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: var.to_string() })?;
        output.push_str(&value);
        rest = &after_open[end + 1..];
    }

    output.push_str(rest);
    Ok(output)
}

/// The first non-blank variable among `keys`, with the name that supplied it.
fn env_value(keys: &[&'static str]) -> Option<(&'static str, String)> {
    keys.iter().find_map(|key| {
        env::var(key).ok().filter(|value| !value.trim().is_empty()).map(|value| (*key, value))
    })
}

fn env_string(keys: &[&'static str]) -> Option<String> {
    env_value(keys).map(|(_, value)| value)
}

fn env_number<T: FromStr>(keys: &[&'static str]) -> Result<Option<T>, ConfigError> {
    env_value(keys)
        .map(|(key, value)| {
            value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
                key: key.to_string(),
                value,
            })
        })
        .transpose()
}

fn env_enum<T: FromStr<Err = ConfigError>>(
    keys: &[&'static str],
) -> Result<Option<T>, ConfigError> {
    env_string(keys).map(|value| value.parse()).transpose()
}

// Unprefixed names are what older deployments export.
fn env_patch() -> Result<ConfigPatch, ConfigError> {
    Ok(ConfigPatch {
        database: Some(DatabasePatch {
            url: env_string(&["PHONEBOOK_DATABASE_URL", "DATABASE_URL"]),
            max_connections: env_number(&["PHONEBOOK_DATABASE_MAX_CONNECTIONS"])?,
            timeout_secs: env_number(&["PHONEBOOK_DATABASE_TIMEOUT_SECS"])?,
        }),
        llm: Some(LlmPatch {
            provider: env_enum(&["PHONEBOOK_LLM_PROVIDER"])?,
            api_key: env_string(&["PHONEBOOK_LLM_API_KEY", "OPENAI_API_KEY"]),
            base_url: env_string(&["PHONEBOOK_LLM_BASE_URL"]),
            model: env_string(&["PHONEBOOK_LLM_MODEL"]),
            timeout_secs: env_number(&["PHONEBOOK_LLM_TIMEOUT_SECS"])?,
            max_retries: env_number(&["PHONEBOOK_LLM_MAX_RETRIES"])?,
        }),
        server: Some(ServerPatch {
            bind_address: env_string(&["PHONEBOOK_SERVER_BIND_ADDRESS", "HOST"]),
            port: env_number(&["PHONEBOOK_SERVER_PORT", "PORT"])?,
            graceful_shutdown_secs: env_number(&["PHONEBOOK_SERVER_GRACEFUL_SHUTDOWN_SECS"])?,
        }),
        logging: Some(LoggingPatch {
            level: env_string(&["PHONEBOOK_LOGGING_LEVEL", "PHONEBOOK_LOG_LEVEL"]),
            format: env_enum(&["PHONEBOOK_LOGGING_FORMAT", "PHONEBOOK_LOG_FORMAT"])?,
        }),
    })
}

impl ConfigOverrides {
    fn into_patch(self) -> ConfigPatch {
        ConfigPatch {
            database: Some(DatabasePatch {
                url: self.database_url,
                max_connections: self.database_max_connections,
                timeout_secs: None,
            }),
            llm: Some(LlmPatch {
                provider: self.llm_provider,
                api_key: self.llm_api_key,
                base_url: self.llm_base_url,
                model: self.llm_model,
                ..LlmPatch::default()
            }),
            server: Some(ServerPatch { port: self.server_port, ..ServerPatch::default() }),
            logging: Some(LoggingPatch { level: self.log_level, format: None }),
        }
    }
}

/// One layer of settings; `None` leaves the value beneath it untouched.
#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

fn merge<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

impl ConfigPatch {
    fn apply(self, config: &mut AppConfig) {
        if let Some(database) = self.database {
            merge(&mut config.database.url, database.url);
            merge(&mut config.database.max_connections, database.max_connections);
            merge(&mut config.database.timeout_secs, database.timeout_secs);
        }

        if let Some(llm) = self.llm {
            merge(&mut config.llm.provider, llm.provider);
            if let Some(api_key) = llm.api_key {
                config.llm.api_key = Some(SecretString::from(api_key));
            }
            if let Some(base_url) = llm.base_url {
                config.llm.base_url = Some(base_url);
            }
            merge(&mut config.llm.model, llm.model);
            merge(&mut config.llm.timeout_secs, llm.timeout_secs);
            merge(&mut config.llm.max_retries, llm.max_retries);
        }

        if let Some(server) = self.server {
            merge(&mut config.server.bind_address, server.bind_address);
            merge(&mut config.server.port, server.port);
            merge(&mut config.server.graceful_shutdown_secs, server.graceful_shutdown_secs);
        }

        if let Some(logging) = self.logging {
            merge(&mut config.logging.level, logging.level);
            merge(&mut config.logging.format, logging.format);
        }
    }
}
