// Warehouse credential resolution, polymorphic over four strategies

use crate::config::WarehouseConfig;
use crate::errors::CredentialError;
use crate::vault::{SecretStore, SecretValue};
use pkcs8::{EncryptedPrivateKeyInfo, PrivateKeyInfo, SecretDocument};
use tracing::{debug, error, info, instrument};

/// The resolved credential strategy plus the connection identity it applies
/// to. The strategy is selected structurally from whichever configuration
/// values are populated; it is a deploy-time choice, not a runtime decision
/// on data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSpec {
    pub account: String,
    pub user: String,
    pub role: Option<String>,
    pub warehouse: Option<String>,
    pub strategy: AuthStrategy,
}

/// One of the four mutually exclusive ways of obtaining the warehouse
/// credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    VaultPrivateKey {
        secret_name: String,
        passphrase: Option<String>,
    },
    PlainPrivateKey {
        key_pem: String,
        passphrase: Option<String>,
    },
    VaultPassword {
        secret_name: String,
    },
    PlainPassword {
        password: String,
    },
}

impl AuthStrategy {
    /// Strategy label for logging; never includes secret material.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthStrategy::VaultPrivateKey { .. } => "vault_private_key",
            AuthStrategy::PlainPrivateKey { .. } => "plain_private_key",
            AuthStrategy::VaultPassword { .. } => "vault_password",
            AuthStrategy::PlainPassword { .. } => "plain_password",
        }
    }
}

/// The uniform connection-parameter record all strategies converge on. The
/// session layer never knows which strategy produced it.
#[derive(Debug, Clone)]
pub struct ConnectionParameters {
    pub account: String,
    pub user: String,
    pub role: Option<String>,
    pub warehouse: Option<String>,
    pub auth: AuthMaterial,
}

/// Authentication material consumed by the session layer: either a password
/// or a DER-encoded (PKCS#8) private key.
#[derive(Clone)]
pub enum AuthMaterial {
    Password(SecretValue),
    PrivateKeyDer(Vec<u8>),
}

impl std::fmt::Debug for AuthMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMaterial::Password(_) => f.write_str("Password(<redacted>)"),
            AuthMaterial::PrivateKeyDer(der) => write!(f, "PrivateKeyDer({} bytes)", der.len()),
        }
    }
}

/// Treat empty configuration values as absent.
fn populated(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

/// Normalize a configured passphrase: absent, empty, and the literal string
/// "None" are all "no passphrase". The source configuration value may arrive
/// as a literal string rather than an absent value.
pub fn normalize_passphrase(raw: Option<&str>) -> Option<String> {
    raw.filter(|v| !v.is_empty() && *v != "None")
        .map(str::to_string)
}

impl CredentialSpec {
    /// Select the credential strategy from configuration.
    ///
    /// Precedence when several strategies are simultaneously configured:
    /// private key from vault, then plain private key, then password from
    /// vault, then plain password. No populated value fails with
    /// `CredentialError::MissingConfiguration`.
    #[instrument(skip(config), fields(account = %config.account, user = %config.user))]
    pub fn from_config(config: &WarehouseConfig) -> Result<Self, CredentialError> {
        let passphrase = normalize_passphrase(populated(config.private_key_passphrase.as_ref()));

        let strategy = if let Some(secret_name) = populated(config.private_key_secret_name.as_ref())
        {
            AuthStrategy::VaultPrivateKey {
                secret_name: secret_name.to_string(),
                passphrase,
            }
        } else if let Some(key_pem) = populated(config.private_key_pem.as_ref()) {
            AuthStrategy::PlainPrivateKey {
                key_pem: key_pem.to_string(),
                passphrase,
            }
        } else if let Some(secret_name) = populated(config.password_secret_name.as_ref()) {
            AuthStrategy::VaultPassword {
                secret_name: secret_name.to_string(),
            }
        } else if let Some(password) = populated(config.password.as_ref()) {
            AuthStrategy::PlainPassword {
                password: password.to_string(),
            }
        } else {
            error!("No credential strategy is configured");
            return Err(CredentialError::MissingConfiguration);
        };

        debug!(strategy = strategy.kind(), "Credential strategy selected");

        Ok(Self {
            account: config.account.clone(),
            user: config.user.clone(),
            role: config.role.clone(),
            warehouse: config.warehouse.clone(),
            strategy,
        })
    }

    /// Resolve the strategy into connection parameters, retrieving vault
    /// secrets and decoding private keys as required. Only secret metadata is
    /// logged, never values.
    #[instrument(skip(self, secrets), fields(strategy = self.strategy.kind()))]
    pub async fn materialize(
        &self,
        secrets: &dyn SecretStore,
    ) -> Result<ConnectionParameters, CredentialError> {
        let auth = match &self.strategy {
            AuthStrategy::VaultPrivateKey {
                secret_name,
                passphrase,
            } => {
                let pem = fetch_secret(secrets, secret_name).await?;
                let der = decode_private_key_pem(pem.expose(), passphrase.as_deref())?;
                AuthMaterial::PrivateKeyDer(der)
            }
            AuthStrategy::PlainPrivateKey {
                key_pem,
                passphrase,
            } => {
                let der = decode_private_key_pem(key_pem, passphrase.as_deref())?;
                AuthMaterial::PrivateKeyDer(der)
            }
            AuthStrategy::VaultPassword { secret_name } => {
                let password = fetch_secret(secrets, secret_name).await?;
                AuthMaterial::Password(password)
            }
            AuthStrategy::PlainPassword { password } => {
                AuthMaterial::Password(SecretValue::new(password.clone()))
            }
        };

        info!(strategy = self.strategy.kind(), "Credential materialized");

        Ok(ConnectionParameters {
            account: self.account.clone(),
            user: self.user.clone(),
            role: self.role.clone(),
            warehouse: self.warehouse.clone(),
            auth,
        })
    }
}

async fn fetch_secret(
    secrets: &dyn SecretStore,
    name: &str,
) -> Result<SecretValue, CredentialError> {
    secrets.get_secret(name).await.map_err(|e| {
        error!(secret_name = %name, error = %e, "Secret retrieval failed");
        CredentialError::SecretNotFound {
            name: name.to_string(),
            reason: e.to_string(),
        }
    })
}

/// Decode a PEM-encoded private key, decrypting with the passphrase when the
/// key is encrypted, and re-serialize it to the DER (PKCS#8) form expected by
/// the session layer.
pub fn decode_private_key_pem(
    pem: &str,
    passphrase: Option<&str>,
) -> Result<Vec<u8>, CredentialError> {
    let (label, document) = SecretDocument::from_pem(pem).map_err(|e| {
        error!(error = %e, "Private key PEM parse failed");
        CredentialError::KeyDecodeFailed(e.to_string())
    })?;

    match (label, passphrase) {
        ("PRIVATE KEY", None) => {
            PrivateKeyInfo::try_from(document.as_bytes())
                .map_err(|e| CredentialError::KeyDecodeFailed(e.to_string()))?;
            Ok(document.as_bytes().to_vec())
        }
        ("PRIVATE KEY", Some(_)) => Err(CredentialError::KeyDecodeFailed(
            "passphrase given but private key is not encrypted".to_string(),
        )),
        ("ENCRYPTED PRIVATE KEY", Some(passphrase)) => {
            let encrypted = EncryptedPrivateKeyInfo::try_from(document.as_bytes())
                .map_err(|e| CredentialError::KeyDecodeFailed(e.to_string()))?;
            let decrypted = encrypted.decrypt(passphrase).map_err(|e| {
                error!("Private key decryption failed");
                CredentialError::KeyDecodeFailed(e.to_string())
            })?;
            PrivateKeyInfo::try_from(decrypted.as_bytes())
                .map_err(|e| CredentialError::KeyDecodeFailed(e.to_string()))?;
            Ok(decrypted.as_bytes().to_vec())
        }
        ("ENCRYPTED PRIVATE KEY", None) => Err(CredentialError::KeyDecodeFailed(
            "private key is encrypted but no passphrase is configured".to_string(),
        )),
        (other, _) => Err(CredentialError::KeyDecodeFailed(format!(
            "unsupported PEM label '{}'",
            other
        ))),
    }
}
