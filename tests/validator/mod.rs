use stageload::error::StageError;
use stageload::table::{Column, ColumnType, Table};
use stageload::validator::{is_reserved, normalize_columns, normalize_name, validate_column_names};

#[test]
fn test_normalization_is_idempotent_for_mixed_case() {
    let names = ["CustomerID", "Order Date", "TOTAL", "mixedCase", "Line\tItem"];
    for name in names {
        let once = normalize_name(name);
        assert_eq!(normalize_name(&once), once);
        assert!(!once.chars().any(|c| c.is_uppercase()));
    }
}

#[test]
fn test_bundled_list_covers_common_keywords() {
    for word in ["select", "FROM", "Where", "order", "user", "group"] {
        assert!(is_reserved(word), "{word} should be reserved");
    }
    assert!(!is_reserved("customer_id"));
}

#[test]
fn test_reserved_word_in_any_position() {
    let err = normalize_columns(&["id", "amount", "ORDER"]).unwrap_err();
    assert!(matches!(err, StageError::NameConflict { column } if column == "order"));
}

#[test]
fn test_declared_types_survive_validation() {
    let table = Table::with_columns(vec![
        Column::typed("ID", ColumnType::Integer),
        Column::new("Label"),
    ]);
    let table = validate_column_names(table).unwrap();
    assert_eq!(table.column_names(), vec!["id", "label"]);
    assert_eq!(table.columns()[0].declared_type, Some(ColumnType::Integer));
}
