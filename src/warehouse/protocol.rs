//! Protocol types for the warehouse statement API.
//!
//! The warehouse is reached through an asynchronous statement protocol:
//! a statement is submitted (`statement.execute`), its status is polled
//! (`statement.describe`) until a terminal state, and results are fetched
//! (`statement.get_result`). Requests travel to the data-api sidecar as
//! NDJSON envelopes correlated by id.

use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Envelope
// ============================================================================

/// Request envelope sent to the sidecar.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEnvelope {
    /// Unique request ID for correlation.
    pub id: String,
    /// Method name (e.g., "statement.execute").
    pub method: String,
    /// Method-specific parameters.
    pub params: serde_json::Value,
}

/// Response envelope received from the sidecar.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseEnvelope {
    /// Request ID this response corresponds to.
    pub id: String,
    /// Whether the request succeeded.
    pub success: bool,
    /// Result data (present if success = true).
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    /// Error information (present if success = false).
    #[serde(default)]
    pub error: Option<ErrorInfo>,
}

/// Error information in a failed response.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorInfo {
    /// Error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

// ============================================================================
// Statement Lifecycle
// ============================================================================

/// Status of a warehouse statement.
///
/// Transitions are driven entirely by the warehouse; the executor only
/// observes them. `Finished`, `Failed`, and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatementStatus {
    Submitted,
    Running,
    Finished,
    Failed,
    Aborted,
}

impl StatementStatus {
    /// Whether no further transition can occur from this status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Aborted)
    }
}

/// Parameters for `statement.execute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteStatementParams {
    /// Warehouse workgroup to run the statement in.
    pub workgroup_name: String,
    /// Target database.
    pub database: String,
    /// SQL text to execute.
    pub sql: String,
    /// Request an event on completion.
    pub with_event: bool,
}

/// Response from `statement.execute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteStatementResponse {
    /// Opaque statement handle.
    pub id: String,
}

/// Parameters for `statement.describe`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeStatementParams {
    /// Statement handle from `statement.execute`.
    pub id: String,
}

/// Response from `statement.describe`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeStatementResponse {
    /// Current statement status.
    pub status: StatementStatus,
    /// Failure reason (present when status is FAILED or ABORTED).
    #[serde(default)]
    pub error: Option<String>,
}

/// Parameters for `statement.get_result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetStatementResultParams {
    /// Statement handle from `statement.execute`.
    pub id: String,
}

// ============================================================================
// Statement Results
// ============================================================================

/// Metadata for one result column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMetadata {
    /// Column name or alias.
    pub name: String,
    /// Warehouse type name.
    #[serde(default)]
    pub type_name: Option<String>,
}

/// One result cell, in the warehouse data API's tagged-union wire shape.
///
/// Exactly one of the value fields is populated per cell; a cell with no
/// populated field (or `isNull`) is a SQL NULL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CellValue {
    #[serde(rename = "stringValue", skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    #[serde(rename = "longValue", skip_serializing_if = "Option::is_none")]
    pub long_value: Option<i64>,
    #[serde(rename = "doubleValue", skip_serializing_if = "Option::is_none")]
    pub double_value: Option<f64>,
    #[serde(rename = "booleanValue", skip_serializing_if = "Option::is_none")]
    pub boolean_value: Option<bool>,
    #[serde(rename = "isNull", skip_serializing_if = "Option::is_none")]
    pub is_null: Option<bool>,
}

impl CellValue {
    pub fn string(s: impl Into<String>) -> Self {
        Self {
            string_value: Some(s.into()),
            ..Self::default()
        }
    }

    pub fn long(v: i64) -> Self {
        Self {
            long_value: Some(v),
            ..Self::default()
        }
    }

    pub fn double(v: f64) -> Self {
        Self {
            double_value: Some(v),
            ..Self::default()
        }
    }

    pub fn boolean(v: bool) -> Self {
        Self {
            boolean_value: Some(v),
            ..Self::default()
        }
    }

    pub fn null() -> Self {
        Self {
            is_null: Some(true),
            ..Self::default()
        }
    }
}

/// Raw result of a finished statement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatementResult {
    /// Result column descriptions, in output order.
    pub column_metadata: Vec<ColumnMetadata>,
    /// Result rows; each row carries one cell per column.
    pub records: Vec<Vec<CellValue>>,
}

impl StatementResult {
    /// Build a result from column names and rows (used heavily in tests).
    pub fn new(columns: &[&str], records: Vec<Vec<CellValue>>) -> Self {
        Self {
            column_metadata: columns
                .iter()
                .map(|name| ColumnMetadata {
                    name: (*name).to_string(),
                    type_name: None,
                })
                .collect(),
            records,
        }
    }
}

// ============================================================================
// Method Names
// ============================================================================

/// Sidecar method names.
pub mod methods {
    pub const EXECUTE_STATEMENT: &str = "statement.execute";
    pub const DESCRIBE_STATEMENT: &str = "statement.describe";
    pub const GET_STATEMENT_RESULT: &str = "statement.get_result";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_envelope_serialization() {
        let request = RequestEnvelope {
            id: "req-1".to_string(),
            method: methods::EXECUTE_STATEMENT.to_string(),
            params: serde_json::json!({
                "workgroup_name": "analytics-wg",
                "database": "sample_data_dev",
                "sql": "SELECT 1",
                "with_event": true
            }),
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("req-1"));
        assert!(json.contains("statement.execute"));
        assert!(json.contains("analytics-wg"));
    }

    #[test]
    fn test_status_deserialization_and_terminality() {
        let status: StatementStatus = serde_json::from_str("\"FINISHED\"").unwrap();
        assert_eq!(status, StatementStatus::Finished);
        assert!(status.is_terminal());

        let status: StatementStatus = serde_json::from_str("\"RUNNING\"").unwrap();
        assert!(!status.is_terminal());

        assert!(StatementStatus::Failed.is_terminal());
        assert!(StatementStatus::Aborted.is_terminal());
        assert!(!StatementStatus::Submitted.is_terminal());
    }

    #[test]
    fn test_cell_value_wire_shape() {
        let json = serde_json::to_string(&CellValue::string("x")).unwrap();
        assert_eq!(json, r#"{"stringValue":"x"}"#);

        let json = serde_json::to_string(&CellValue::long(5)).unwrap();
        assert_eq!(json, r#"{"longValue":5}"#);

        let cell: CellValue = serde_json::from_str(r#"{"doubleValue":2.5}"#).unwrap();
        assert_eq!(cell.double_value, Some(2.5));
        assert!(cell.string_value.is_none());
    }

    #[test]
    fn test_error_response_deserialization() {
        let json = r#"{
            "id": "req-9",
            "success": false,
            "error": {"code": "STATEMENT_NOT_FOUND", "message": "no such statement"}
        }"#;

        let response: ResponseEnvelope = serde_json::from_str(json).unwrap();
        assert!(!response.success);
        let error = response.error.unwrap();
        assert_eq!(error.code, "STATEMENT_NOT_FOUND");
    }
}
