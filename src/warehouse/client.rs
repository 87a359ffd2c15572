//! Async client for the warehouse data-api sidecar.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex};
use tracing::{error, warn};

use super::error::{WarehouseError, WarehouseResult};
use super::protocol::{
    methods, DescribeStatementParams, DescribeStatementResponse, ExecuteStatementParams,
    ExecuteStatementResponse, GetStatementResultParams, RequestEnvelope, ResponseEnvelope,
    StatementResult,
};

/// Default timeout for sidecar requests (30 seconds).
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// The asynchronous statement protocol the Query Executor runs against.
///
/// `DataApiClient` is the production implementation; tests substitute
/// recording doubles to observe (or suppress) statement submission.
#[async_trait]
pub trait StatementApi: Send + Sync {
    /// Submit a statement for execution, returning an opaque handle.
    async fn execute_statement(
        &self,
        params: ExecuteStatementParams,
    ) -> WarehouseResult<ExecuteStatementResponse>;

    /// Fetch the current status of a submitted statement.
    async fn describe_statement(&self, id: &str) -> WarehouseResult<DescribeStatementResponse>;

    /// Fetch the raw results of a finished statement.
    async fn get_statement_result(&self, id: &str) -> WarehouseResult<StatementResult>;
}

/// Async client for the warehouse data-api sidecar.
///
/// The client spawns the sidecar as a child process and communicates via
/// NDJSON (newline-delimited JSON) over stdin/stdout. Each request has a
/// unique ID for correlation with responses, enabling concurrent requests.
///
/// # Example
///
/// ```ignore
/// use quarry_gateway::warehouse::{DataApiClient, StatementApi};
///
/// let client = DataApiClient::spawn("./quarry-dataapi").await?;
/// let handle = client.execute_statement(params).await?;
/// ```
pub struct DataApiClient {
    /// Writer for sending requests to sidecar stdin.
    stdin: Arc<Mutex<BufWriter<ChildStdin>>>,

    /// Map of pending request IDs to response channels.
    pending: Arc<Mutex<HashMap<String, oneshot::Sender<ResponseEnvelope>>>>,

    /// Handle to the sidecar child process.
    _child: Child,

    /// Handle to the background reader task.
    _reader_task: tokio::task::JoinHandle<()>,

    /// Request timeout duration.
    timeout: Duration,
}

impl DataApiClient {
    /// Spawn a new sidecar process.
    ///
    /// # Errors
    ///
    /// Returns an error if the sidecar process cannot be spawned.
    pub async fn spawn<P: AsRef<Path>>(sidecar_path: P) -> WarehouseResult<Self> {
        Self::spawn_with_timeout(sidecar_path, Duration::from_secs(DEFAULT_TIMEOUT_SECS)).await
    }

    /// Resolve the sidecar binary path from an optional configured path.
    ///
    /// Falls back to searching common locations next to the binary.
    pub fn resolve_sidecar_path(configured: Option<&str>) -> WarehouseResult<PathBuf> {
        if let Some(path) = configured {
            return Ok(PathBuf::from(path));
        }

        let candidates = ["quarry-dataapi", "./quarry-dataapi", "./sidecar/quarry-dataapi"];
        for candidate in candidates {
            let path = PathBuf::from(candidate);
            if path.exists() {
                return Ok(path);
            }
        }

        Err(WarehouseError::SpawnFailed(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "data-api sidecar binary not found; set warehouse.sidecar_path in config",
        )))
    }

    /// Spawn a new sidecar process with a custom request timeout.
    pub async fn spawn_with_timeout<P: AsRef<Path>>(
        sidecar_path: P,
        timeout: Duration,
    ) -> WarehouseResult<Self> {
        let mut child = Command::new(sidecar_path.as_ref())
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(WarehouseError::SpawnFailed)?;

        let stdin = child.stdin.take().expect("stdin not captured");
        let stdout = child.stdout.take().expect("stdout not captured");

        let stdin = Arc::new(Mutex::new(BufWriter::new(stdin)));
        let pending: Arc<Mutex<HashMap<String, oneshot::Sender<ResponseEnvelope>>>> =
            Arc::new(Mutex::new(HashMap::new()));

        // Spawn background reader task
        let reader_task = Self::spawn_reader_task(stdout, pending.clone());

        Ok(Self {
            stdin,
            pending,
            _child: child,
            _reader_task: reader_task,
            timeout,
        })
    }

    /// Spawn the background task that reads responses from the sidecar.
    fn spawn_reader_task(
        stdout: ChildStdout,
        pending: Arc<Mutex<HashMap<String, oneshot::Sender<ResponseEnvelope>>>>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        // EOF - sidecar exited
                        break;
                    }
                    Ok(_) => match serde_json::from_str::<ResponseEnvelope>(&line) {
                        Ok(resp) => {
                            let mut pending = pending.lock().await;
                            if let Some(tx) = pending.remove(&resp.id) {
                                let _ = tx.send(resp);
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "failed to parse sidecar response");
                        }
                    },
                    Err(e) => {
                        error!(error = %e, "sidecar read error");
                        break;
                    }
                }
            }

            // Sidecar exited - notify all pending requests with error responses
            let mut pending = pending.lock().await;
            for (id, tx) in pending.drain() {
                let error_response = ResponseEnvelope {
                    id,
                    success: false,
                    result: None,
                    error: Some(super::protocol::ErrorInfo {
                        code: "SIDECAR_EXITED".to_string(),
                        message: "data-api sidecar exited unexpectedly".to_string(),
                    }),
                };
                let _ = tx.send(error_response);
            }
        })
    }

    /// Send a request to the sidecar and wait for a response.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails, writing to the sidecar
    /// fails, the request times out, the warehouse returns an error
    /// response, or deserialization of the response fails.
    pub async fn request<P, R>(&self, method: &str, params: P) -> WarehouseResult<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = uuid::Uuid::new_v4().to_string();

        let request = RequestEnvelope {
            id: id.clone(),
            method: method.to_string(),
            params: serde_json::to_value(params).map_err(WarehouseError::SerializeFailed)?,
        };

        // Register response channel
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(id.clone(), tx);
        }

        // Send request
        {
            let mut stdin = self.stdin.lock().await;
            let line =
                serde_json::to_string(&request).map_err(WarehouseError::SerializeFailed)? + "\n";
            stdin
                .write_all(line.as_bytes())
                .await
                .map_err(WarehouseError::WriteFailed)?;
            stdin.flush().await.map_err(WarehouseError::WriteFailed)?;
        }

        // Wait for response with timeout
        let response = match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(_)) => {
                // Channel closed - sidecar exited
                return Err(WarehouseError::ChannelClosed);
            }
            Err(_) => {
                // Timeout - clean up pending request to prevent memory leak
                let mut pending = self.pending.lock().await;
                pending.remove(&id);
                return Err(WarehouseError::Timeout(self.timeout.as_secs()));
            }
        };

        if response.success {
            let result = response.result.unwrap_or(serde_json::Value::Null);
            serde_json::from_value(result).map_err(WarehouseError::DeserializeFailed)
        } else {
            let error = response.error.unwrap_or_else(|| super::protocol::ErrorInfo {
                code: "UNKNOWN".to_string(),
                message: "Unknown error".to_string(),
            });
            Err(Self::classify_error(&error.code, &error.message))
        }
    }

    /// Classify a sidecar error into a more specific error type.
    fn classify_error(code: &str, message: &str) -> WarehouseError {
        match code {
            "STATEMENT_NOT_FOUND" => WarehouseError::StatementNotFound(message.to_string()),
            "INVALID_REQUEST" => WarehouseError::InvalidRequest(message.to_string()),
            "SIDECAR_EXITED" => WarehouseError::SidecarExited,
            _ => WarehouseError::remote(code, message),
        }
    }

    /// Check if the sidecar is still running.
    pub fn is_alive(&self) -> bool {
        // If the reader task has finished, the sidecar has exited
        !self._reader_task.is_finished()
    }

    /// Get the current request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl StatementApi for DataApiClient {
    async fn execute_statement(
        &self,
        params: ExecuteStatementParams,
    ) -> WarehouseResult<ExecuteStatementResponse> {
        self.request(methods::EXECUTE_STATEMENT, params).await
    }

    async fn describe_statement(&self, id: &str) -> WarehouseResult<DescribeStatementResponse> {
        self.request(
            methods::DESCRIBE_STATEMENT,
            DescribeStatementParams { id: id.to_string() },
        )
        .await
    }

    async fn get_statement_result(&self, id: &str) -> WarehouseResult<StatementResult> {
        self.request(
            methods::GET_STATEMENT_RESULT,
            GetStatementResultParams { id: id.to_string() },
        )
        .await
    }
}
