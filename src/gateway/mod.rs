//! Action gateway.
//!
//! Single entry point for the agent's action invocations: validates the
//! envelope, decodes the route's named properties into a typed request,
//! dispatches to the introspector / executor / ACL resolver, and encodes
//! the outcome under the response size ceiling. `handle` is infallible;
//! every failure becomes a 400-status envelope.

mod envelope;

pub use envelope::{
    ActionInvocation, ActionResponse, ContentBody, JsonBody, Property, RequestBody, ResponseBody,
    ResponseDetail,
};

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::acl::AclResolver;
use crate::executor::{QueryError, QueryExecutor};
use crate::schema::SchemaIntrospector;

/// Serialized success payloads above this many bytes are replaced with the
/// size-limit error marker (the transport rejects bodies near 25 KB).
pub const MAX_BODY_BYTES: usize = 24_000;

/// Known action routes.
pub mod routes {
    pub const GET_SCHEMA: &str = "/getschema";
    pub const QUERY_DATABASE: &str = "/querydatabase";
    pub const GET_USER_ACL: &str = "/getUserACL";
}

/// Failures surfaced as 400-status envelopes.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Missing apiPath in event")]
    MissingApiPath,

    #[error("Invalid API path")]
    InvalidApiPath,

    #[error("Missing {0} parameter")]
    MissingParameter(&'static str),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("{0}")]
    Serialize(#[from] serde_json::Error),
}

// ============================================================================
// Typed Route Requests
// ============================================================================

/// `/getschema` request.
#[derive(Debug, Clone)]
pub struct GetSchemaRequest {
    pub db: String,
}

/// `/querydatabase` request. `user_id` and `schema` are optional by
/// contract; omitting either bypasses the access check (see
/// [`QueryExecutor::execute`]).
#[derive(Debug, Clone)]
pub struct QueryDatabaseRequest {
    pub database: String,
    pub query: String,
    pub user_id: Option<String>,
    pub schema: Option<String>,
    pub table: Option<String>,
}

/// `/getUserACL` request.
#[derive(Debug, Clone)]
pub struct GetUserAclRequest {
    pub user_id: String,
}

fn required(invocation: &ActionInvocation, name: &'static str) -> Result<String, GatewayError> {
    invocation
        .property(name)
        .map(str::to_string)
        .ok_or(GatewayError::MissingParameter(name))
}

impl GetSchemaRequest {
    fn from_invocation(invocation: &ActionInvocation) -> Result<Self, GatewayError> {
        Ok(Self {
            db: required(invocation, "db")?,
        })
    }
}

impl QueryDatabaseRequest {
    fn from_invocation(invocation: &ActionInvocation) -> Result<Self, GatewayError> {
        Ok(Self {
            database: required(invocation, "database")?,
            query: required(invocation, "query")?,
            user_id: invocation.property("user_id").map(str::to_string),
            schema: invocation.property("schema").map(str::to_string),
            table: invocation.property("table").map(str::to_string),
        })
    }
}

impl GetUserAclRequest {
    fn from_invocation(invocation: &ActionInvocation) -> Result<Self, GatewayError> {
        Ok(Self {
            user_id: required(invocation, "user_id")?,
        })
    }
}

// ============================================================================
// Gateway
// ============================================================================

/// Routes action invocations and encodes their outcomes.
pub struct Gateway {
    executor: Arc<QueryExecutor>,
    introspector: SchemaIntrospector,
    acl: Arc<dyn AclResolver>,
    max_body_bytes: usize,
}

impl Gateway {
    pub fn new(executor: Arc<QueryExecutor>, acl: Arc<dyn AclResolver>) -> Self {
        Self {
            introspector: SchemaIntrospector::new(executor.clone()),
            executor,
            acl,
            max_body_bytes: MAX_BODY_BYTES,
        }
    }

    /// Override the payload ceiling (deployment config).
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Handle one invocation. Never fails: validation, authorization, and
    /// warehouse faults all come back as 400-status envelopes, and an
    /// oversized-but-valid result comes back as a 200 envelope carrying
    /// the size-limit marker.
    pub async fn handle(&self, invocation: ActionInvocation) -> ActionResponse {
        let api_path = invocation.api_path.as_deref().unwrap_or("<missing>");
        info!(api_path, "handling action invocation");

        match self.dispatch(&invocation).await {
            Ok(result) => ActionResponse::success(self.render_success(result), &invocation),
            Err(e) => {
                warn!(api_path, error = %e, "invocation failed");
                ActionResponse::error(&e.to_string(), &invocation)
            }
        }
    }

    /// Validate, decode, and route one invocation.
    async fn dispatch(&self, invocation: &ActionInvocation) -> Result<Value, GatewayError> {
        let api_path = invocation
            .api_path
            .as_deref()
            .filter(|path| !path.is_empty())
            .ok_or(GatewayError::MissingApiPath)?;

        match api_path {
            routes::GET_SCHEMA => {
                let request = GetSchemaRequest::from_invocation(invocation)?;
                match self.introspector.describe(&request.db).await {
                    Ok(entries) => Ok(serde_json::to_value(entries)?),
                    // The walk is all-or-nothing; its faults travel as a
                    // single-element error list in a success-shaped
                    // envelope, matching the historical wire contract.
                    Err(e) => Ok(serde_json::json!([{ "Error": e.to_string() }])),
                }
            }
            routes::QUERY_DATABASE => {
                let request = QueryDatabaseRequest::from_invocation(invocation)?;
                let rows = self
                    .executor
                    .execute(
                        &request.query,
                        &request.database,
                        request.schema.as_deref(),
                        request.table.as_deref(),
                        request.user_id.as_deref(),
                    )
                    .await?;
                Ok(serde_json::to_value(rows)?)
            }
            routes::GET_USER_ACL => {
                let request = GetUserAclRequest::from_invocation(invocation)?;
                Ok(serde_json::to_value(self.acl.resolve(&request.user_id))?)
            }
            _ => Err(GatewayError::InvalidApiPath),
        }
    }

    /// Serialize a success payload under the size ceiling.
    ///
    /// A null result is substituted with the no-results marker; a payload
    /// above the ceiling is replaced with the size-limit marker. Both stay
    /// status 200.
    fn render_success(&self, result: Value) -> String {
        let result = if result.is_null() {
            serde_json::json!({ "error": "Query returned no results." })
        } else {
            result
        };

        let body = result.to_string();
        if body.len() > self.max_body_bytes {
            warn!(bytes = body.len(), "payload exceeds size ceiling");
            serde_json::json!({ "error": "Response size exceeds 25 KB limit." }).to_string()
        } else {
            body
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::StaticAclResolver;
    use crate::warehouse::protocol::{
        DescribeStatementResponse, ExecuteStatementParams, ExecuteStatementResponse,
        StatementResult,
    };
    use crate::warehouse::{StatementApi, WarehouseResult};
    use async_trait::async_trait;

    struct NeverCalledApi;

    #[async_trait]
    impl StatementApi for NeverCalledApi {
        async fn execute_statement(
            &self,
            _params: ExecuteStatementParams,
        ) -> WarehouseResult<ExecuteStatementResponse> {
            panic!("warehouse must not be reached");
        }

        async fn describe_statement(
            &self,
            _id: &str,
        ) -> WarehouseResult<DescribeStatementResponse> {
            panic!("warehouse must not be reached");
        }

        async fn get_statement_result(&self, _id: &str) -> WarehouseResult<StatementResult> {
            panic!("warehouse must not be reached");
        }
    }

    fn gateway() -> Gateway {
        let acl: Arc<dyn AclResolver> = Arc::new(StaticAclResolver::sample());
        let executor = Arc::new(QueryExecutor::new(
            Arc::new(NeverCalledApi),
            acl.clone(),
            "test-wg",
        ));
        Gateway::new(executor, acl)
    }

    #[test]
    fn test_render_null_substitution() {
        let body = gateway().render_success(Value::Null);
        assert_eq!(body, r#"{"error":"Query returned no results."}"#);
    }

    #[test]
    fn test_render_size_ceiling() {
        let oversized = Value::String("x".repeat(MAX_BODY_BYTES + 1));
        let body = gateway().render_success(oversized);
        assert_eq!(body, r#"{"error":"Response size exceeds 25 KB limit."}"#);

        let small = serde_json::json!([{"a": 1}]);
        assert_eq!(gateway().render_success(small), r#"[{"a":1}]"#);
    }

    #[test]
    fn test_missing_parameter_message() {
        let err = GatewayError::MissingParameter("db");
        assert_eq!(err.to_string(), "Missing db parameter");
    }

    #[tokio::test]
    async fn test_empty_api_path_is_missing() {
        let mut invocation = ActionInvocation::default();
        invocation.api_path = Some(String::new());

        let response = gateway().handle(invocation).await;
        assert_eq!(response.status(), 400);
        assert_eq!(response.body(), r#"{"error":"Missing apiPath in event"}"#);
    }
}
