// REST driver for the warehouse's session interface. Password credentials go
// in the login request directly; key-pair credentials are exchanged for a
// short-lived RS256 JWT whose issuer carries the public-key fingerprint.

use crate::credential::{AuthMaterial, ConnectionParameters};
use crate::errors::ExecutionError;
use crate::warehouse::{SessionDriver, SessionHandle, StatementResult};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey};
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

const CLIENT_APP_ID: &str = "SnowRelay";
const JWT_LIFETIME_SECONDS: i64 = 300;

#[derive(Debug, Serialize)]
struct KeyPairClaims {
    iss: String,
    sub: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
struct LoginData {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ColumnType {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct QueryData {
    #[serde(default)]
    rowtype: Vec<ColumnType>,
    #[serde(default)]
    rowset: Vec<Vec<Option<String>>>,
}

/// Driver speaking the warehouse session REST interface. The base URL
/// defaults to the account-derived hostname and can be overridden for test
/// servers.
#[derive(Clone, Debug)]
pub struct SnowflakeRestDriver {
    http: reqwest::Client,
    base_url_override: Option<String>,
}

impl SnowflakeRestDriver {
    pub fn new(base_url_override: Option<String>) -> Result<Self, ExecutionError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| {
                ExecutionError::SessionOpenFailed(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            base_url_override: base_url_override.filter(|v| !v.is_empty()),
        })
    }

    fn base_url(&self, account: &str) -> String {
        match &self.base_url_override {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("https://{}.snowflakecomputing.com", account),
        }
    }

    fn auth_header(session: &SessionHandle) -> String {
        format!("Snowflake Token=\"{}\"", session.token)
    }
}

/// Build the key-pair login JWT: issuer `{ACCOUNT}.{USER}.{fingerprint}`,
/// subject `{ACCOUNT}.{USER}`, where the fingerprint is the base64-encoded
/// SHA-256 of the DER public key.
pub fn generate_keypair_jwt(
    account: &str,
    user: &str,
    private_key_der: &[u8],
) -> Result<String, ExecutionError> {
    let key = RsaPrivateKey::from_pkcs8_der(private_key_der).map_err(|e| {
        ExecutionError::SessionOpenFailed(format!("Private key is not usable: {}", e))
    })?;

    let public_der = key.to_public_key().to_public_key_der().map_err(|e| {
        ExecutionError::SessionOpenFailed(format!("Failed to derive public key: {}", e))
    })?;
    let fingerprint = format!(
        "SHA256:{}",
        BASE64_STANDARD.encode(Sha256::digest(public_der.as_bytes()))
    );

    let qualified_user = format!(
        "{}.{}",
        account.to_uppercase(),
        user.to_uppercase()
    );
    let now = chrono::Utc::now().timestamp();
    let claims = KeyPairClaims {
        iss: format!("{}.{}", qualified_user, fingerprint),
        sub: qualified_user,
        iat: now,
        exp: now + JWT_LIFETIME_SECONDS,
    };

    // The signer expects PKCS#1 DER
    let pkcs1 = key.to_pkcs1_der().map_err(|e| {
        ExecutionError::SessionOpenFailed(format!("Failed to re-encode private key: {}", e))
    })?;
    let encoding_key = EncodingKey::from_rsa_der(pkcs1.as_bytes());

    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| ExecutionError::SessionOpenFailed(format!("Failed to sign JWT: {}", e)))
}

#[async_trait]
impl SessionDriver for SnowflakeRestDriver {
    #[instrument(skip(self, params), fields(account = %params.account, user = %params.user))]
    async fn open_session(
        &self,
        params: &ConnectionParameters,
    ) -> Result<SessionHandle, ExecutionError> {
        let mut data = serde_json::json!({
            "ACCOUNT_NAME": params.account,
            "LOGIN_NAME": params.user,
            "CLIENT_APP_ID": CLIENT_APP_ID,
            "CLIENT_APP_VERSION": env!("CARGO_PKG_VERSION"),
        });

        match &params.auth {
            AuthMaterial::Password(password) => {
                data["PASSWORD"] = serde_json::json!(password.expose());
            }
            AuthMaterial::PrivateKeyDer(der) => {
                let jwt = generate_keypair_jwt(&params.account, &params.user, der)?;
                data["AUTHENTICATOR"] = serde_json::json!("SNOWFLAKE_JWT");
                data["TOKEN"] = serde_json::json!(jwt);
            }
        }

        let mut query = vec![("requestId", Uuid::new_v4().to_string())];
        if let Some(role) = &params.role {
            query.push(("roleName", role.clone()));
        }
        if let Some(warehouse) = &params.warehouse {
            query.push(("warehouseName", warehouse.clone()));
        }

        let response = self
            .http
            .post(format!(
                "{}/session/v1/login-request",
                self.base_url(&params.account)
            ))
            .query(&query)
            .json(&serde_json::json!({ "data": data }))
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Login request failed");
                ExecutionError::SessionOpenFailed(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            error!(status = status, "Login request returned an error status");
            return Err(ExecutionError::SessionOpenFailed(format!(
                "login returned status {}",
                status
            )));
        }

        let body: ApiResponse<LoginData> = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse login response");
            ExecutionError::SessionOpenFailed(e.to_string())
        })?;

        if !body.success {
            let message = body.message.unwrap_or_else(|| "login rejected".to_string());
            error!(message = %message, "Warehouse rejected the login");
            return Err(ExecutionError::SessionOpenFailed(message));
        }

        let token = body
            .data
            .map(|d| d.token)
            .ok_or_else(|| ExecutionError::SessionOpenFailed("login response had no token".to_string()))?;

        info!("Warehouse session opened");
        Ok(SessionHandle {
            token,
            base_url: self.base_url(&params.account),
        })
    }

    #[instrument(skip(self, session, statement))]
    async fn execute_statement(
        &self,
        session: &SessionHandle,
        statement: &str,
    ) -> Result<StatementResult, ExecutionError> {
        let response = self
            .http
            .post(format!("{}/queries/v1/query-request", session.base_url))
            .query(&[("requestId", Uuid::new_v4().to_string())])
            .header("Authorization", Self::auth_header(session))
            .json(&serde_json::json!({ "sqlText": statement, "sequenceId": 1 }))
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Query request failed");
                ExecutionError::StatementFailed(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            error!(status = status, "Query request returned an error status");
            return Err(ExecutionError::StatementFailed(format!(
                "query returned status {}",
                status
            )));
        }

        let body: ApiResponse<QueryData> = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse query response");
            ExecutionError::StatementFailed(e.to_string())
        })?;

        if !body.success {
            let message = body
                .message
                .unwrap_or_else(|| "statement rejected".to_string());
            error!(message = %message, "Warehouse rejected the statement");
            return Err(ExecutionError::StatementFailed(message));
        }

        let data = body.data.unwrap_or(QueryData {
            rowtype: Vec::new(),
            rowset: Vec::new(),
        });

        Ok(StatementResult {
            columns: data.rowtype.into_iter().map(|c| c.name).collect(),
            rows: data.rowset,
        })
    }

    #[instrument(skip(self, session))]
    async fn close_session(&self, session: SessionHandle) -> Result<(), ExecutionError> {
        let response = self
            .http
            .post(format!("{}/session", session.base_url))
            .query(&[
                ("delete", "true".to_string()),
                ("requestId", Uuid::new_v4().to_string()),
            ])
            .header("Authorization", Self::auth_header(&session))
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Session delete request failed");
                ExecutionError::SessionCloseFailed(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            error!(status = status, "Session delete returned an error status");
            return Err(ExecutionError::SessionCloseFailed(format!(
                "session delete returned status {}",
                status
            )));
        }

        debug!("Warehouse session closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::decode_private_key_pem;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    const PLAIN_KEY_PEM: &str = include_str!("../../tests/data/test_key_plain.pem");

    #[test]
    fn test_default_base_url_is_account_derived() {
        let driver = SnowflakeRestDriver::new(None).unwrap();
        assert_eq!(
            driver.base_url("my-account"),
            "https://my-account.snowflakecomputing.com"
        );
    }

    #[test]
    fn test_base_url_override_wins() {
        let driver = SnowflakeRestDriver::new(Some("http://localhost:9999/".to_string())).unwrap();
        assert_eq!(driver.base_url("my-account"), "http://localhost:9999");
    }

    #[test]
    fn test_keypair_jwt_claims() {
        let der = decode_private_key_pem(PLAIN_KEY_PEM, None).unwrap();
        let jwt = generate_keypair_jwt("my-account", "svc_user", &der).unwrap();

        let segments: Vec<&str> = jwt.split('.').collect();
        assert_eq!(segments.len(), 3);

        let payload = URL_SAFE_NO_PAD.decode(segments[1]).unwrap();
        let claims: serde_json::Value = serde_json::from_slice(&payload).unwrap();

        assert_eq!(claims["sub"], "MY-ACCOUNT.SVC_USER");
        let issuer = claims["iss"].as_str().unwrap();
        assert!(issuer.starts_with("MY-ACCOUNT.SVC_USER.SHA256:"));
        assert!(claims["exp"].as_i64().unwrap() > claims["iat"].as_i64().unwrap());
    }

    #[test]
    fn test_keypair_jwt_rejects_garbage_key() {
        let err = generate_keypair_jwt("a", "u", b"not a key").unwrap_err();
        assert!(matches!(err, ExecutionError::SessionOpenFailed(_)));
    }
}
