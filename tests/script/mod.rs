use stageload::error::StageError;
use stageload::script::{run_script, split_statements};

use crate::helpers::RecordingWarehouse;

#[test]
fn test_script_runs_in_one_transaction() {
    let statements = split_statements("CREATE TABLE t (id INT); INSERT INTO t VALUES (1);").unwrap();
    let mut warehouse = RecordingWarehouse::new();

    assert_eq!(run_script(&mut warehouse, &statements).unwrap(), 2);
    assert_eq!(warehouse.verbs(), vec!["CREATE", "INSERT", "COMMIT"]);
}

#[test]
fn test_failed_statement_rolls_back_and_stops() {
    let statements = split_statements("INSERT INTO t VALUES (1); DELETE FROM t; SELECT 1;").unwrap();
    let mut warehouse = RecordingWarehouse::failing_on("DELETE");

    let err = run_script(&mut warehouse, &statements).unwrap_err();
    assert!(err.to_string().contains("rejected: DELETE"));
    assert_eq!(warehouse.verbs(), vec!["INSERT", "DELETE", "ROLLBACK"]);
}

#[test]
fn test_failed_rollback_keeps_original_error() {
    let statements = split_statements("DELETE FROM t;").unwrap();
    let mut warehouse = RecordingWarehouse {
        fail_on: Some("DELETE".to_string()),
        fail_rollback: true,
        ..Default::default()
    };

    let err = run_script(&mut warehouse, &statements).unwrap_err();
    assert!(matches!(err, StageError::RemoteExecution(_)));
    assert!(err.to_string().contains("rejected: DELETE"), "got: {err}");
    assert!(!err.to_string().contains("ROLLBACK"));
    assert_eq!(warehouse.verbs(), vec!["DELETE", "ROLLBACK"]);
}
