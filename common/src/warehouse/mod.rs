// Warehouse session management: one session per invocation, with
// unconditional teardown on every exit path.

pub mod snowflake;

pub use snowflake::SnowflakeRestDriver;

use crate::credential::ConnectionParameters;
use crate::errors::ExecutionError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// The materialized result of one statement. Result sets are assumed small
/// and log-friendly; no paging or streaming.
#[derive(Debug, Clone, Default)]
pub struct StatementResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl StatementResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Values of the named column, in row order. Null cells are skipped.
    pub fn column_values(&self, name: &str) -> Vec<String> {
        let Some(index) = self.columns.iter().position(|c| c == name) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter_map(|row| row.get(index).cloned().flatten())
            .collect()
    }
}

/// Opaque session handle. Owned exclusively by the runner for the duration of
/// one statement execution. `base_url` is the host the session was opened
/// against; follow-up requests go to the same host.
#[derive(Debug)]
pub struct SessionHandle {
    pub token: String,
    pub base_url: String,
}

/// Driver for the warehouse's session interface.
#[async_trait]
pub trait SessionDriver: Send + Sync {
    async fn open_session(
        &self,
        params: &ConnectionParameters,
    ) -> Result<SessionHandle, ExecutionError>;

    async fn execute_statement(
        &self,
        session: &SessionHandle,
        statement: &str,
    ) -> Result<StatementResult, ExecutionError>;

    async fn close_session(&self, session: SessionHandle) -> Result<(), ExecutionError>;
}

/// Runs a single statement against the warehouse: acquire session, execute,
/// release session unconditionally, and only then surface any captured error.
#[derive(Clone)]
pub struct StatementRunner {
    driver: Arc<dyn SessionDriver>,
}

impl StatementRunner {
    pub fn new(driver: Arc<dyn SessionDriver>) -> Self {
        Self { driver }
    }

    /// Execute `statement` within exactly one session.
    ///
    /// The session is closed on every exit path. An execution failure is
    /// re-raised only after the close attempt completes; a close failure
    /// after a successful statement is surfaced as `SessionCloseFailed`,
    /// while a close failure after a failed statement is logged and the
    /// statement error takes precedence.
    #[instrument(skip(self, params), fields(account = %params.account, user = %params.user))]
    pub async fn run(
        &self,
        params: &ConnectionParameters,
        statement: &str,
    ) -> Result<StatementResult, ExecutionError> {
        info!("Opening warehouse session");
        let session = self.driver.open_session(params).await.map_err(|e| {
            error!(error = %e, "Failed to open warehouse session");
            e
        })?;

        info!("Executing SQL statement");
        let outcome = self.driver.execute_statement(&session, statement).await;

        let close_outcome = self.driver.close_session(session).await;

        match (outcome, close_outcome) {
            (Ok(result), Ok(())) => {
                info!(
                    rows = result.row_count(),
                    result = ?result,
                    "SQL statement result"
                );
                Ok(result)
            }
            (Ok(_), Err(close_err)) => {
                error!(error = %close_err, "Session close failed after successful statement");
                Err(close_err)
            }
            (Err(exec_err), Ok(())) => {
                error!(error = %exec_err, "Statement execution failed, session closed");
                Err(exec_err)
            }
            (Err(exec_err), Err(close_err)) => {
                warn!(error = %close_err, "Session close failed after statement failure");
                error!(error = %exec_err, "Statement execution failed");
                Err(exec_err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::AuthMaterial;
    use crate::vault::SecretValue;
    use std::sync::Mutex;

    fn params() -> ConnectionParameters {
        ConnectionParameters {
            account: "my-account".to_string(),
            user: "SVC_USER".to_string(),
            role: None,
            warehouse: None,
            auth: AuthMaterial::Password(SecretValue::new("pw")),
        }
    }

    #[derive(Default)]
    struct RecordingDriver {
        calls: Mutex<Vec<&'static str>>,
        fail_open: bool,
        fail_execute: bool,
        fail_close: bool,
    }

    impl RecordingDriver {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SessionDriver for RecordingDriver {
        async fn open_session(
            &self,
            _params: &ConnectionParameters,
        ) -> Result<SessionHandle, ExecutionError> {
            self.calls.lock().unwrap().push("open");
            if self.fail_open {
                return Err(ExecutionError::SessionOpenFailed("refused".to_string()));
            }
            Ok(SessionHandle {
                token: "tok".to_string(),
                base_url: String::new(),
            })
        }

        async fn execute_statement(
            &self,
            _session: &SessionHandle,
            _statement: &str,
        ) -> Result<StatementResult, ExecutionError> {
            self.calls.lock().unwrap().push("execute");
            if self.fail_execute {
                return Err(ExecutionError::StatementFailed("syntax error".to_string()));
            }
            Ok(StatementResult {
                columns: vec!["1".to_string()],
                rows: vec![vec![Some("1".to_string())]],
            })
        }

        async fn close_session(&self, _session: SessionHandle) -> Result<(), ExecutionError> {
            self.calls.lock().unwrap().push("close");
            if self.fail_close {
                return Err(ExecutionError::SessionCloseFailed("timeout".to_string()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_success_path_closes_session_once() {
        let driver = Arc::new(RecordingDriver::default());
        let runner = StatementRunner::new(driver.clone());
        let result = runner.run(&params(), "SELECT 1").await.unwrap();
        assert_eq!(result.row_count(), 1);
        assert_eq!(driver.calls(), vec!["open", "execute", "close"]);
    }

    #[tokio::test]
    async fn test_execution_failure_still_closes_session() {
        let driver = Arc::new(RecordingDriver {
            fail_execute: true,
            ..Default::default()
        });
        let runner = StatementRunner::new(driver.clone());
        let err = runner.run(&params(), "SELECT 1").await.unwrap_err();
        assert!(matches!(err, ExecutionError::StatementFailed(_)));
        assert_eq!(driver.calls(), vec!["open", "execute", "close"]);
    }

    #[tokio::test]
    async fn test_open_failure_skips_execute_and_close() {
        let driver = Arc::new(RecordingDriver {
            fail_open: true,
            ..Default::default()
        });
        let runner = StatementRunner::new(driver.clone());
        let err = runner.run(&params(), "SELECT 1").await.unwrap_err();
        assert!(matches!(err, ExecutionError::SessionOpenFailed(_)));
        assert_eq!(driver.calls(), vec!["open"]);
    }

    #[tokio::test]
    async fn test_close_failure_after_success_is_surfaced() {
        let driver = Arc::new(RecordingDriver {
            fail_close: true,
            ..Default::default()
        });
        let runner = StatementRunner::new(driver.clone());
        let err = runner.run(&params(), "SELECT 1").await.unwrap_err();
        assert!(matches!(err, ExecutionError::SessionCloseFailed(_)));
        assert_eq!(driver.calls(), vec!["open", "execute", "close"]);
    }

    #[tokio::test]
    async fn test_statement_error_takes_precedence_over_close_error() {
        let driver = Arc::new(RecordingDriver {
            fail_execute: true,
            fail_close: true,
            ..Default::default()
        });
        let runner = StatementRunner::new(driver.clone());
        let err = runner.run(&params(), "SELECT 1").await.unwrap_err();
        assert!(matches!(err, ExecutionError::StatementFailed(_)));
        assert_eq!(driver.calls(), vec!["open", "execute", "close"]);
    }

    #[test]
    fn test_column_values_extraction() {
        let result = StatementResult {
            columns: vec!["name".to_string(), "owner".to_string()],
            rows: vec![
                vec![Some("DEMO_DB".to_string()), Some("SYSADMIN".to_string())],
                vec![Some("RAW".to_string()), None],
                vec![None, Some("PUBLIC".to_string())],
            ],
        };
        assert_eq!(result.column_values("name"), vec!["DEMO_DB", "RAW"]);
        assert!(result.column_values("missing").is_empty());
    }
}
