// Configuration management with layered configuration (file, env)

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub vault: VaultConfig,
    pub warehouse: WarehouseConfig,
    pub queue: QueueConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Object storage connection settings.
///
/// `endpoint` is the blob service URI that incoming event locations are
/// matched against, e.g. `https://my-account.blob.core.windows.net`. When
/// `access_key`/`secret_key` are absent the ambient credential chain of the
/// execution environment is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Secret vault settings. Either `name` (expanded to the standard vault URI)
/// or an explicit `uri` must be set when a vault-backed credential strategy
/// is configured. `token_endpoint` overrides the ambient-identity token
/// endpoint, which is only useful for test servers.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VaultConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub token_endpoint: Option<String>,
}

impl VaultConfig {
    /// Whether any vault target is configured.
    pub fn is_configured(&self) -> bool {
        self.name.as_deref().is_some_and(|v| !v.is_empty())
            || self.uri.as_deref().is_some_and(|v| !v.is_empty())
    }
}

/// Warehouse connection settings. Exactly one credential strategy is selected
/// from whichever of the password/private-key values are populated; see
/// `credential::CredentialSpec::from_config` for the precedence order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    pub account: String,
    pub user: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub warehouse: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_secret_name: Option<String>,
    #[serde(default)]
    pub private_key_pem: Option<String>,
    #[serde(default)]
    pub private_key_secret_name: Option<String>,
    #[serde(default)]
    pub private_key_passphrase: Option<String>,
    /// Base URL override for the warehouse REST interface (test servers).
    /// Defaults to `https://{account}.snowflakecomputing.com`.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Statement executed by the configured-statement HTTP flow.
    #[serde(default)]
    pub statement: Option<String>,
}

impl WarehouseConfig {
    /// Whether the selected credential strategy requires the vault.
    pub fn uses_vault(&self) -> bool {
        self.password_secret_name
            .as_deref()
            .is_some_and(|v| !v.is_empty())
            || self
                .private_key_secret_name
                .as_deref()
                .is_some_and(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub url: String,
    pub stream_name: String,
    pub subject: String,
    pub consumer_name: String,
    #[serde(default = "default_max_age_seconds")]
    pub max_age_seconds: u64,
    #[serde(default = "default_max_messages")]
    pub max_messages: i64,
}

fn default_max_age_seconds() -> u64 {
    86400
}

fn default_max_messages() -> i64 {
    1_000_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub metrics_port: u16,
    pub tracing_endpoint: Option<String>,
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default configuration
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local configuration (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment-specific configuration
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        // Validate server config
        if self.server.port == 0 {
            return Err("Server port must be greater than 0".to_string());
        }

        // Validate storage config
        if self.storage.endpoint.is_empty() {
            return Err("Storage endpoint cannot be empty".to_string());
        }

        // Validate warehouse config
        if self.warehouse.account.is_empty() {
            return Err("Warehouse account cannot be empty".to_string());
        }
        if self.warehouse.user.is_empty() {
            return Err("Warehouse user cannot be empty".to_string());
        }

        // Cross-field check: vault strategies need a vault target
        if self.warehouse.uses_vault() && !self.vault.is_configured() {
            return Err(
                "Vault name or URI required when a vault credential strategy is configured"
                    .to_string(),
            );
        }

        // Validate queue config
        if self.queue.url.is_empty() {
            return Err("Queue URL cannot be empty".to_string());
        }
        if self.queue.stream_name.is_empty() {
            return Err("Queue stream_name cannot be empty".to_string());
        }
        if self.queue.consumer_name.is_empty() {
            return Err("Queue consumer_name cannot be empty".to_string());
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            storage: StorageConfig {
                endpoint: "http://localhost:9000".to_string(),
                region: "us-east-1".to_string(),
                access_key: None,
                secret_key: None,
            },
            vault: VaultConfig::default(),
            warehouse: WarehouseConfig {
                account: "my-account".to_string(),
                user: "SVC_SNOWRELAY".to_string(),
                role: Some("SYSADMIN".to_string()),
                warehouse: Some("COMPUTE_WH".to_string()),
                password: Some("change-me-in-production".to_string()),
                password_secret_name: None,
                private_key_pem: None,
                private_key_secret_name: None,
                private_key_passphrase: None,
                base_url: None,
                statement: None,
            },
            queue: QueueConfig {
                url: "nats://localhost:4222".to_string(),
                stream_name: "STORAGE_EVENTS".to_string(),
                subject: "storage.events".to_string(),
                consumer_name: "snowrelay-worker".to_string(),
                max_age_seconds: 86400,
                max_messages: 1_000_000,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                metrics_port: 9090,
                tracing_endpoint: None,
            },
        }
    }
}
