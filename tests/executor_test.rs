//! Query executor tests: access policy, poll loop, and failure surfaces.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use quarry_gateway::acl::StaticAclResolver;
use quarry_gateway::warehouse::protocol::{
    CellValue, DescribeStatementResponse, ExecuteStatementParams, ExecuteStatementResponse,
    StatementResult, StatementStatus,
};
use quarry_gateway::warehouse::{StatementApi, WarehouseResult};
use quarry_gateway::{PollPolicy, QueryError, QueryExecutor};

/// Warehouse double with a scripted status sequence.
///
/// `describe_statement` pops from the scripted sequence, falling back to
/// `fallback_status` once the script runs dry.
struct FakeWarehouse {
    submissions: Mutex<Vec<ExecuteStatementParams>>,
    statuses: Mutex<VecDeque<DescribeStatementResponse>>,
    fallback_status: StatementStatus,
    result: Mutex<Option<StatementResult>>,
    fetches: AtomicUsize,
}

impl FakeWarehouse {
    fn finishing_with(result: StatementResult) -> Self {
        Self {
            submissions: Mutex::new(Vec::new()),
            statuses: Mutex::new(VecDeque::new()),
            fallback_status: StatementStatus::Finished,
            result: Mutex::new(Some(result)),
            fetches: AtomicUsize::new(0),
        }
    }

    fn never_finishing() -> Self {
        Self {
            submissions: Mutex::new(Vec::new()),
            statuses: Mutex::new(VecDeque::new()),
            fallback_status: StatementStatus::Running,
            result: Mutex::new(None),
            fetches: AtomicUsize::new(0),
        }
    }

    fn failing_with(reason: &str) -> Self {
        let warehouse = Self::never_finishing();
        warehouse
            .statuses
            .lock()
            .unwrap()
            .push_back(DescribeStatementResponse {
                status: StatementStatus::Failed,
                error: Some(reason.to_string()),
            });
        warehouse
    }

    fn statuses(mut self, statuses: &[StatementStatus]) -> Self {
        self.statuses = Mutex::new(
            statuses
                .iter()
                .map(|&status| DescribeStatementResponse {
                    status,
                    error: None,
                })
                .collect(),
        );
        self
    }

    fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

#[async_trait]
impl StatementApi for FakeWarehouse {
    async fn execute_statement(
        &self,
        params: ExecuteStatementParams,
    ) -> WarehouseResult<ExecuteStatementResponse> {
        self.submissions.lock().unwrap().push(params);
        Ok(ExecuteStatementResponse {
            id: "stmt-0".to_string(),
        })
    }

    async fn describe_statement(&self, _id: &str) -> WarehouseResult<DescribeStatementResponse> {
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(DescribeStatementResponse {
                status: self.fallback_status,
                error: None,
            }))
    }

    async fn get_statement_result(&self, _id: &str) -> WarehouseResult<StatementResult> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.result.lock().unwrap().take().unwrap_or_default())
    }
}

fn executor(warehouse: Arc<FakeWarehouse>) -> QueryExecutor {
    QueryExecutor::new(warehouse, Arc::new(StaticAclResolver::sample()), "test-wg")
}

fn tight_poll() -> PollPolicy {
    PollPolicy {
        initial_interval: Duration::from_millis(10),
        max_interval: Duration::from_millis(40),
        multiplier: 2.0,
        max_wait: Duration::from_millis(200),
    }
}

#[tokio::test]
async fn denied_before_submission() {
    let warehouse = Arc::new(FakeWarehouse::finishing_with(StatementResult::default()));
    let executor = executor(warehouse.clone());

    let err = executor
        .execute(
            "SELECT 1",
            "analytics",
            Some("reports"),
            None,
            Some("sudipta"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, QueryError::AccessDenied { .. }));
    assert_eq!(warehouse.submission_count(), 0);
}

#[tokio::test]
async fn matching_acl_entry_is_allowed() {
    let warehouse = Arc::new(FakeWarehouse::finishing_with(StatementResult::new(
        &["n"],
        vec![vec![CellValue::long(1)]],
    )));
    let executor = executor(warehouse.clone());

    let rows = executor
        .execute(
            "SELECT 1 AS n",
            "sample_data_dev",
            Some("tpcds"),
            None,
            Some("sudipta"),
        )
        .await
        .unwrap();

    assert_eq!(warehouse.submission_count(), 1);
    assert_eq!(serde_json::to_value(rows).unwrap(), json!([{"n": 1}]));
}

#[tokio::test]
async fn omitted_user_id_bypasses_enforcement() {
    // (analytics, nowhere) is in nobody's ACL, but without a user_id the
    // check never runs. Inherited permissive policy, pinned on purpose.
    let warehouse = Arc::new(FakeWarehouse::finishing_with(StatementResult::default()));
    let executor = executor(warehouse.clone());

    executor
        .execute("SELECT 1", "analytics", Some("nowhere"), None, None)
        .await
        .unwrap();
    assert_eq!(warehouse.submission_count(), 1);
}

#[tokio::test]
async fn omitted_schema_bypasses_enforcement() {
    let warehouse = Arc::new(FakeWarehouse::finishing_with(StatementResult::default()));
    let executor = executor(warehouse.clone());

    executor
        .execute("SELECT 1", "analytics", None, None, Some("sudipta"))
        .await
        .unwrap();
    assert_eq!(warehouse.submission_count(), 1);
}

#[tokio::test]
async fn describe_is_exempt_even_with_mismatched_acl() {
    let warehouse = Arc::new(FakeWarehouse::finishing_with(StatementResult::default()));
    let executor = executor(warehouse.clone());

    executor
        .execute(
            "\tDESCRIBE reports.monthly",
            "analytics",
            Some("reports"),
            None,
            Some("sudipta"),
        )
        .await
        .unwrap();
    assert_eq!(warehouse.submission_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn polls_through_transient_statuses() {
    let warehouse = Arc::new(
        FakeWarehouse::finishing_with(StatementResult::new(
            &["n"],
            vec![vec![CellValue::long(7)]],
        ))
        .statuses(&[
            StatementStatus::Submitted,
            StatementStatus::Running,
            StatementStatus::Running,
            StatementStatus::Finished,
        ]),
    );
    let executor = executor(warehouse.clone()).with_poll_policy(tight_poll());

    let rows = executor
        .execute("SELECT 7 AS n", "sample_data_dev", None, None, None)
        .await
        .unwrap();

    assert_eq!(serde_json::to_value(rows).unwrap(), json!([{"n": 7}]));
    assert_eq!(warehouse.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_statement_surfaces_reason_without_fetching() {
    let warehouse = Arc::new(FakeWarehouse::failing_with("relation \"ghost\" does not exist"));
    let executor = executor(warehouse.clone());

    let err = executor
        .execute("SELECT * FROM ghost", "sample_data_dev", None, None, None)
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Query failed: relation \"ghost\" does not exist"
    );
    assert_eq!(warehouse.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn aborted_statement_without_reason_reports_unknown() {
    let warehouse = Arc::new(
        FakeWarehouse::never_finishing().statuses(&[StatementStatus::Aborted]),
    );
    let executor = executor(warehouse);

    let err = executor
        .execute("SELECT 1", "sample_data_dev", None, None, None)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Query failed: Unknown error");
}

#[tokio::test(start_paused = true)]
async fn stuck_statement_times_out_within_the_wait_budget() {
    let warehouse = Arc::new(FakeWarehouse::never_finishing());
    let executor = executor(warehouse.clone()).with_poll_policy(tight_poll());

    let err = executor
        .execute("SELECT pg_sleep(3600)", "sample_data_dev", None, None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, QueryError::Timeout(_)));
    assert_eq!(
        err.to_string(),
        "Error in execute_query: timed out waiting for statement stmt-0"
    );
    assert_eq!(warehouse.fetches.load(Ordering::SeqCst), 0);
}
