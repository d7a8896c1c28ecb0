//! Integration tests for the batch pipeline over a store-backed run.

use async_trait::async_trait;
use orawatch::batch::{BatchOptions, BatchOrchestrator, ExecutionOutcome, NullProgress, ResultSink};
use orawatch::db::{
    ColumnInfo, Connector, DatabaseClient, FailingDatabaseClient, MockConnector,
    MockDatabaseClient, QueryResult, Value,
};
use orawatch::error::Result;
use orawatch::persistence::{self, QueryDefinition, StateDb};
use orawatch::resolver::ConnectionDescriptor;
use orawatch::tns::TnsTable;
use tempfile::tempdir;

fn inline_def(name: &str, host: &str) -> QueryDefinition {
    let mut def = QueryDefinition::new(name, "SELECT 1 FROM dual");
    def.host = Some(host.to_string());
    def.port = Some(1521);
    def.service = Some("XE".to_string());
    def.username = Some("scott".to_string());
    def.password = Some("tiger".to_string());
    def
}

fn three_row_result() -> QueryResult {
    QueryResult::with_data(
        vec![ColumnInfo::new("ID", "NUMBER")],
        vec![
            vec![Value::Int(1)],
            vec![Value::Int(2)],
            vec![Value::Int(3)],
        ],
    )
}

struct RecordingSink {
    outcomes: Vec<(String, bool, Option<usize>)>,
}

impl ResultSink for RecordingSink {
    fn on_result(&mut self, def: &QueryDefinition, outcome: &ExecutionOutcome) {
        self.outcomes.push((
            def.name.clone(),
            outcome.success,
            outcome.result.as_ref().map(|r| r.row_count),
        ));
    }
}

/// Fails mid-query for any endpoint whose host contains "flaky".
struct FlakyConnector;

#[async_trait]
impl Connector for FlakyConnector {
    async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn DatabaseClient>> {
        if descriptor.connect_string.contains("flaky") {
            Ok(Box::new(FailingDatabaseClient::new("simulated crash")))
        } else {
            Ok(Box::new(MockDatabaseClient::with_result(three_row_result())))
        }
    }
}

#[tokio::test]
async fn test_store_backed_batch_end_to_end() {
    let dir = tempdir().unwrap();
    let db = StateDb::open(&dir.path().join("state.db")).await.unwrap();

    let mut watched = inline_def("watched", "db01");
    watched.notify = true;
    watched.count_at_least = Some("2".to_string());
    watched.sort_order = 1;
    let mut plain = inline_def("plain", "db02");
    plain.sort_order = 2;

    persistence::queries::create_query(db.pool(), &watched).await.unwrap();
    persistence::queries::create_query(db.pool(), &plain).await.unwrap();

    let defs = persistence::queries::list_enabled(db.pool()).await.unwrap();
    let connections =
        persistence::connections::list_connections_with_passwords(db.pool(), db.secrets())
            .await
            .unwrap();

    let connector = MockConnector::new(three_row_result());
    let orchestrator = BatchOrchestrator::new(
        &connector,
        connections,
        TnsTable::empty(),
        BatchOptions::default(),
    );

    let mut sink = RecordingSink {
        outcomes: Vec::new(),
    };
    let summary = orchestrator.run(&defs, &mut sink, &mut NullProgress).await;

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.log.len(), 2);

    // Row count 3 meets the at-least-2 threshold: exactly one notification
    // naming both numbers.
    assert_eq!(summary.notifications.len(), 1);
    assert!(summary.notifications[0].contains("3"));
    assert!(summary.notifications[0].contains("at least 2"));

    assert_eq!(
        sink.outcomes,
        vec![
            ("watched".to_string(), true, Some(3)),
            ("plain".to_string(), true, Some(3)),
        ]
    );

    db.close().await;
}

#[tokio::test]
async fn test_failure_mid_batch_does_not_stop_later_items() {
    let defs = vec![
        inline_def("first", "db01"),
        inline_def("second", "flaky-host"),
        inline_def("third", "db03"),
        inline_def("fourth", "db04"),
    ];

    let connector = FlakyConnector;
    let orchestrator = BatchOrchestrator::new(
        &connector,
        vec![],
        TnsTable::empty(),
        BatchOptions::default(),
    );

    let mut sink = RecordingSink {
        outcomes: Vec::new(),
    };
    let summary = orchestrator.run(&defs, &mut sink, &mut NullProgress).await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(sink.outcomes.len(), 4);
    assert!(!sink.outcomes[1].1);
    assert!(sink.outcomes[3].1);
}

#[tokio::test]
async fn test_column_check_scenario() {
    let result = QueryResult::with_data(
        vec![
            ColumnInfo::new("STATUS", "VARCHAR2"),
            ColumnInfo::new("QTY", "NUMBER"),
        ],
        vec![
            vec![Value::from("OK"), Value::from("10")],
            vec![Value::from("NG"), Value::from("10")],
        ],
    );

    let mut def = inline_def("status check", "db01");
    def.notify = true;
    def.check_columns = Some("STATUS,QTY".to_string());
    def.check_values = Some("OK,10".to_string());

    let connector = MockConnector::new(result);
    let orchestrator = BatchOrchestrator::new(
        &connector,
        vec![],
        TnsTable::empty(),
        BatchOptions::default(),
    );

    let summary = orchestrator
        .run(
            &[def],
            &mut RecordingSink {
                outcomes: Vec::new(),
            },
            &mut NullProgress,
        )
        .await;

    // Row 2 mismatches STATUS: exactly one aggregate notification for the
    // single mismatching row.
    assert_eq!(summary.notifications.len(), 1);
    assert!(summary.notifications[0].contains("1 row(s)"));
    assert!(summary.notifications[0].contains("STATUS=OK"));
}
