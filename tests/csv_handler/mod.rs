use std::fs;

use stageload::csv_handler::CsvHandler;
use stageload::table::{ColumnType, Value};
use tempfile::TempDir;

#[test]
fn test_load_csv_infers_column_types() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("orders.csv");
    fs::write(
        &path,
        "id,amount,placed_at,paid,note\n\
         1,10,2024-01-05 10:00:00,true,first\n\
         2,12.5,2024-01-06 11:30:00,false,\n\
         3,,2024-01-07 09:15:00,true,third\n",
    )
    .unwrap();

    let table = CsvHandler::default().load_csv(&path).unwrap();
    assert_eq!(table.row_count(), 3);
    assert_eq!(table.column_names(), vec!["id", "amount", "placed_at", "paid", "note"]);
    assert_eq!(
        table.column_types(),
        vec![
            ColumnType::BigInt,
            ColumnType::Real,
            ColumnType::Timestamp,
            ColumnType::Boolean,
            ColumnType::Text,
        ]
    );
    assert_eq!(table.rows()[2][1], Value::Null);
}

#[test]
fn test_round_trip_preserves_rows_and_column_order() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("mixed.csv");
    fs::write(&path, "b,a,c\nx,1,\"quoted, text\"\ny,2,plain\n").unwrap();

    let handler = CsvHandler::default();
    let table = handler.load_csv(&path).unwrap();
    let header: Vec<String> = table.column_names().iter().map(|c| c.to_string()).collect();
    let bytes = handler.to_bytes(&table, &header).unwrap();

    let reparsed = handler.read_table(bytes.as_slice()).unwrap();
    assert_eq!(reparsed.column_names(), vec!["b", "a", "c"]);
    assert_eq!(reparsed.row_count(), table.row_count());
    assert_eq!(reparsed.rows(), table.rows());
}

#[test]
fn test_integers_beyond_i64_are_written_back_unchanged() {
    let input = "id,qty\n12345678901234567891,1\n42,2\n";
    let handler = CsvHandler::default();
    let table = handler.read_table(input.as_bytes()).unwrap();
    assert_eq!(table.column_types(), vec![ColumnType::Text, ColumnType::BigInt]);

    let header: Vec<String> = table.column_names().iter().map(|c| c.to_string()).collect();
    let bytes = handler.to_bytes(&table, &header).unwrap();
    assert_eq!(String::from_utf8(bytes).unwrap(), input);
}

#[test]
fn test_tab_delimited_input() {
    let handler = CsvHandler::new("\\t", "\"").unwrap();
    let table = handler
        .read_table("name\tscore\nann\t3\nbob\t4\n".as_bytes())
        .unwrap();
    assert_eq!(table.column_names(), vec!["name", "score"]);
    assert_eq!(table.rows()[1][1], Value::Integer(4));
}

#[test]
fn test_ragged_rows_are_errors() {
    let handler = CsvHandler::default();
    assert!(handler.read_table("a,b\n1,2,3\n".as_bytes()).is_err());
}

#[test]
fn test_save_local_writes_bytes() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("copy.csv");
    CsvHandler::default().save_local(b"a\n1\n", &path).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "a\n1\n");
}
