use stageload::error::StageError;
use stageload::statement::{Authorization, TableLayout};
use stageload::table::{Table, Value};
use stageload::{export_table, ExportOptions, ExportPlan};
use tempfile::TempDir;

use crate::helpers::{id_amount_table, memory_store, unreachable_store, RecordingWarehouse};

#[test]
fn test_reserved_column_rejected_before_staging() {
    let mut table = Table::new(["Table", "value"]);
    table
        .add_row(vec![Value::from("a"), Value::Integer(1)])
        .unwrap();

    let staging = memory_store();
    let mut warehouse = RecordingWarehouse::new();
    let err = export_table(&mut warehouse, &staging, &table, "things", ExportOptions::default())
        .unwrap_err();

    assert!(matches!(err, StageError::NameConflict { ref column } if column == "table"));
    assert!(staging.list_keys().unwrap().is_empty(), "nothing should be staged");
    assert!(warehouse.statements.is_empty(), "no statement should be issued");
}

#[test]
fn test_fresh_export_issues_drop_create_copy_commit() {
    let table = id_amount_table();
    let staging = memory_store();
    let mut warehouse = RecordingWarehouse::new();

    let report = export_table(&mut warehouse, &staging, &table, "sales", ExportOptions::default())
        .unwrap();

    assert_eq!(warehouse.verbs(), vec!["DROP", "CREATE", "COPY", "COMMIT"]);
    assert_eq!(warehouse.statements[0], "DROP TABLE IF EXISTS sales");
    assert_eq!(
        warehouse.statements[1],
        "CREATE TABLE sales (id BIGINT, amount REAL)"
    );
    assert!(warehouse.statements[2].starts_with(&format!("COPY sales FROM '{}'", report.staged.uri)));
    assert!(warehouse.statements[2].contains("SECRET_ACCESS_KEY 'secret-key'"));

    assert_eq!(report.rows, 3);
    assert!(report.staged.uri.starts_with("s3://test-bucket/exports/sales-"));
    assert_eq!(report.statements.len(), 4);
    assert!(!report.statements[2].contains("secret-key"), "report must be redacted");
}

#[test]
fn test_append_skips_table_definition() {
    let table = id_amount_table();
    let staging = memory_store();
    let mut warehouse = RecordingWarehouse::new();
    let options = ExportOptions {
        append: true,
        ..Default::default()
    };

    export_table(&mut warehouse, &staging, &table, "sales", options).unwrap();
    assert_eq!(warehouse.verbs(), vec!["COPY", "COMMIT"]);
}

#[test]
fn test_staged_csv_round_trips() {
    let table = id_amount_table();
    let staging = memory_store();
    let mut warehouse = RecordingWarehouse::new();

    let report = export_table(&mut warehouse, &staging, &table, "sales", ExportOptions::default())
        .unwrap();
    let bytes = staging.get(&report.staged.key).unwrap();

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b',')
        .from_reader(bytes.as_slice());
    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(headers, vec!["id", "amount"]);

    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), table.row_count());
    assert_eq!(&rows[0][0], "1");
    assert_eq!(&rows[0][1], "9.5");
    assert_eq!(&rows[2][1], "", "NULL is written as an empty field");
}

#[test]
fn test_failed_copy_rolls_back_and_leaves_object() {
    let table = id_amount_table();
    let staging = memory_store();
    let mut warehouse = RecordingWarehouse::failing_on("COPY");

    let err = export_table(&mut warehouse, &staging, &table, "sales", ExportOptions::default())
        .unwrap_err();

    assert!(matches!(err, StageError::RemoteExecution(_)));
    assert_eq!(warehouse.verbs(), vec!["DROP", "CREATE", "COPY", "ROLLBACK"]);
    assert_eq!(staging.list_keys().unwrap().len(), 1, "staged object is kept");
}

#[test]
fn test_failed_create_can_clean_up_staged_object() {
    let table = id_amount_table();
    let staging = memory_store();
    let mut warehouse = RecordingWarehouse::failing_on("CREATE");
    let options = ExportOptions {
        cleanup_on_failure: true,
        ..Default::default()
    };

    let err = export_table(&mut warehouse, &staging, &table, "sales", options).unwrap_err();

    assert!(matches!(err, StageError::RemoteExecution(_)));
    assert_eq!(warehouse.verbs(), vec!["DROP", "CREATE", "ROLLBACK"]);
    assert!(staging.list_keys().unwrap().is_empty());
}

#[test]
fn test_invalid_diststyle_fails_before_any_statement() {
    let table = id_amount_table();
    let staging = memory_store();
    let mut warehouse = RecordingWarehouse::new();
    let options = ExportOptions {
        layout: TableLayout {
            dist_style: Some("random".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };

    let err = export_table(&mut warehouse, &staging, &table, "sales", options).unwrap_err();
    assert!(matches!(err, StageError::Configuration(_)));
    assert!(warehouse.statements.is_empty());
    assert!(staging.list_keys().unwrap().is_empty());
}

#[test]
fn test_distkey_wins_over_diststyle() {
    let table = id_amount_table();
    let options = ExportOptions {
        layout: TableLayout {
            dist_style: Some("even".to_string()),
            dist_key: Some("id".to_string()),
            sort_keys: vec!["amount".to_string()],
            interleaved: false,
        },
        ..Default::default()
    };

    let plan = ExportPlan::prepare(&table, "sales", options).unwrap();
    assert_eq!(
        plan.create_statement().unwrap(),
        "CREATE TABLE sales (id BIGINT, amount REAL) DISTKEY(id) SORTKEY(amount)"
    );
}

#[test]
fn test_caller_types_and_normalized_names() {
    let mut table = Table::new(["ID", "Full Name"]);
    table
        .add_row(vec![Value::Integer(1), Value::from("Ada Lovelace")])
        .unwrap();
    let options = ExportOptions {
        column_types: Some(vec!["INTEGER".to_string(), "VARCHAR(64)".to_string()]),
        ..Default::default()
    };

    let plan = ExportPlan::prepare(&table, "people", options).unwrap();
    assert_eq!(plan.columns(), ["id", "\"full name\""]);
    assert_eq!(
        plan.create_statement().unwrap(),
        "CREATE TABLE people (id INTEGER, \"full name\" VARCHAR(64))"
    );
}

#[test]
fn test_mismatched_column_types_rejected() {
    let table = id_amount_table();
    let options = ExportOptions {
        column_types: Some(vec!["BIGINT".to_string()]),
        ..Default::default()
    };
    assert!(matches!(
        ExportPlan::prepare(&table, "sales", options),
        Err(StageError::Configuration(_))
    ));
}

#[test]
fn test_iam_role_and_custom_format() {
    let table = id_amount_table();
    let staging = memory_store().with_authorization(Authorization::IamRole(
        "arn:aws:iam::123:role/loader".to_string(),
    ));
    let mut warehouse = RecordingWarehouse::new();
    let options = ExportOptions {
        delimiter: "|".to_string(),
        date_format: "YYYY-MM-DD".to_string(),
        region: Some("eu-west-1".to_string()),
        ..Default::default()
    };

    export_table(&mut warehouse, &staging, &table, "sales", options).unwrap();
    let copy = &warehouse.statements[2];
    assert!(copy.contains("DELIMITER '|'"));
    assert!(copy.contains("DATEFORMAT 'YYYY-MM-DD'"));
    assert!(copy.ends_with("IAM_ROLE 'arn:aws:iam::123:role/loader' REGION 'eu-west-1';"));
}

#[test]
fn test_local_copy_matches_staged_object() {
    let temp_dir = TempDir::new().unwrap();
    let local = temp_dir.path().join("sales.csv");
    let table = id_amount_table();
    let staging = memory_store();
    let mut warehouse = RecordingWarehouse::new();
    let options = ExportOptions {
        local_copy: Some(local.clone()),
        ..Default::default()
    };

    let report = export_table(&mut warehouse, &staging, &table, "sales", options).unwrap();
    let on_disk = std::fs::read(&local).unwrap();
    assert_eq!(on_disk, staging.get(&report.staged.key).unwrap());
}

#[test]
fn test_repeated_exports_use_distinct_keys() {
    let table = id_amount_table();
    let staging = memory_store();
    let mut warehouse = RecordingWarehouse::new();

    let first = export_table(&mut warehouse, &staging, &table, "sales", ExportOptions::default())
        .unwrap();
    let second = export_table(&mut warehouse, &staging, &table, "sales", ExportOptions::default())
        .unwrap();

    assert_ne!(first.staged.key, second.staged.key);
    assert_eq!(staging.list_keys().unwrap().len(), 2);
}

#[test]
fn test_upload_failure_issues_no_statements() {
    let table = id_amount_table();
    let staging = unreachable_store();
    let mut warehouse = RecordingWarehouse::new();

    let err = export_table(&mut warehouse, &staging, &table, "sales", ExportOptions::default())
        .unwrap_err();

    assert!(matches!(err, StageError::Transfer(_)), "unexpected error: {err:?}");
    assert!(warehouse.statements.is_empty(), "no statement should be issued");
}

#[test]
fn test_commit_failure_rolls_back() {
    let table = id_amount_table();
    let staging = memory_store();
    let mut warehouse = RecordingWarehouse {
        fail_commit: true,
        ..Default::default()
    };

    let err = export_table(&mut warehouse, &staging, &table, "sales", ExportOptions::default())
        .unwrap_err();

    assert!(matches!(err, StageError::RemoteExecution(_)));
    assert_eq!(warehouse.verbs(), vec!["DROP", "CREATE", "COPY", "COMMIT", "ROLLBACK"]);
    assert_eq!(staging.list_keys().unwrap().len(), 1, "staged object is left in place");
}

#[test]
fn test_report_serializes_without_secrets() {
    let table = id_amount_table();
    let staging = memory_store();
    let mut warehouse = RecordingWarehouse::new();

    let report = export_table(&mut warehouse, &staging, &table, "sales", ExportOptions::default())
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["table"], "sales");
    assert_eq!(json["rows"], 3);
    assert_eq!(json["staged"]["uri"], report.staged.uri.as_str());
    assert_eq!(json["statements"].as_array().unwrap().len(), 4);
    assert!(!json.to_string().contains("secret-key"));
}
