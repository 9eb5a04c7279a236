//! Table module for stageload
//!
//! This module provides the in-memory tabular dataset that an export reads from.
//! It handles:
//!
//! - Cell values with automatic type inference for data read from delimited text
//! - Column definitions with an optional declared scalar type
//! - Column type inference from the values a column holds
//! - Row storage with arity checks

use std::fmt;

use chrono::NaiveDateTime;

use crate::error::{StageError, StageResult};

/// Formats tried, in order, when reading a timestamp from text
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// Format used when writing a timestamp to text
pub const TIMESTAMP_OUTPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Represents a value in a table cell
#[derive(Debug, Clone)]
pub enum Value {
    /// Represents a NULL or missing value
    Null,
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit floating point number
    Float(f64),
    /// Date and time without a zone
    Timestamp(NaiveDateTime),
    /// Boolean value (true/false)
    Boolean(bool),
    /// UTF-8 string
    String(String),
}

/// Equality allows Integer/Float comparison; other mixed pairs are unequal
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Float(b)) => *a as f64 == *b,
            (Value::Float(a), Value::Integer(b)) => *a == *b as f64,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(float) => write!(f, "{}", float),
            Value::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_OUTPUT_FORMAT)),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}

impl Value {
    /// Render the value as a delimited-text field
    ///
    /// NULL becomes an empty field so that the warehouse loader reads it back
    /// as NULL; every other value uses its display form.
    pub fn to_field(&self) -> String {
        match self {
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Whether this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

fn looks_integral(s: &str) -> bool {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Implementation of string conversion to Value with automatic type inference
///
/// It attempts to parse the string value in the following order:
/// 1. Empty strings are converted to NULL values
/// 2. As an integer (i64); other whole numbers are kept as strings
/// 3. As a finite floating point number (f64), when written with `.` or an exponent
/// 4. As a timestamp in one of the ISO-like layouts
/// 5. As a boolean (`true`/`false`, any case)
/// 6. Any other content is stored as a string
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            return Value::Null;
        }

        if let Ok(i) = s.parse::<i64>() {
            return Value::Integer(i);
        }

        // Whole numbers beyond i64 stay text so no digits are lost
        if looks_integral(s) {
            return Value::String(s.to_string());
        }

        // "nan" and "inf" stay text
        if s.contains(['.', 'e', 'E']) {
            if let Ok(fl) = s.parse::<f64>() {
                if fl.is_finite() {
                    return Value::Float(fl);
                }
            }
        }

        for format in TIMESTAMP_FORMATS {
            if let Ok(ts) = NaiveDateTime::parse_from_str(s, format) {
                return Value::Timestamp(ts);
            }
        }

        match s.to_lowercase().as_str() {
            "true" => return Value::Boolean(true),
            "false" => return Value::Boolean(false),
            _ => {}
        }

        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(ts: NaiveDateTime) -> Self {
        Value::Timestamp(ts)
    }
}

/// Scalar type of a column
///
/// `Integer` is only produced when a caller declares it; inference always
/// widens whole numbers to `BigInt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Integer,
    BigInt,
    Real,
    Timestamp,
    Boolean,
    Text,
}

impl ColumnType {
    /// The warehouse type name used in a table definition
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Real => "REAL",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Text => "VARCHAR(256)",
        }
    }

    /// Infer the type of a column from the values it holds
    ///
    /// NULLs are ignored. Whole numbers mixed with fractional numbers widen to
    /// `Real`; any other mix, or a column with no non-NULL value, is `Text`.
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a Value>) -> ColumnType {
        let mut inferred: Option<ColumnType> = None;

        for value in values {
            let current = match value {
                Value::Null => continue,
                Value::Integer(_) => ColumnType::BigInt,
                Value::Float(_) => ColumnType::Real,
                Value::Timestamp(_) => ColumnType::Timestamp,
                Value::Boolean(_) => ColumnType::Boolean,
                Value::String(_) => return ColumnType::Text,
            };

            inferred = Some(match (inferred, current) {
                (None, t) => t,
                (Some(a), b) if a == b => a,
                (Some(ColumnType::BigInt), ColumnType::Real)
                | (Some(ColumnType::Real), ColumnType::BigInt) => ColumnType::Real,
                _ => return ColumnType::Text,
            });
        }

        inferred.unwrap_or(ColumnType::Text)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_type())
    }
}

/// A named column with an optional declared type
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub declared_type: Option<ColumnType>,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Column {
            name: name.into(),
            declared_type: None,
        }
    }

    pub fn typed(name: impl Into<String>, column_type: ColumnType) -> Self {
        Column {
            name: name.into(),
            declared_type: Some(column_type),
        }
    }
}

/// Represents a row in a table
pub type Row = Vec<Value>;

/// An ordered set of named columns and an ordered sequence of rows
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Column definitions, in order
    columns: Vec<Column>,

    /// Rows of data
    rows: Vec<Row>,
}

impl Table {
    /// Create an empty table with untyped columns
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Table {
            columns: columns.into_iter().map(Column::new).collect(),
            rows: Vec::new(),
        }
    }

    /// Create an empty table from column definitions
    pub fn with_columns(columns: Vec<Column>) -> Self {
        Table {
            columns,
            rows: Vec::new(),
        }
    }

    /// Get the column definitions of the table
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Get the column names, in order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Get the column count
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get the rows of the table
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Get the row count
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the index of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Add a row to the table
    ///
    /// # Returns
    /// * `Ok(())` if the row was successfully added
    /// * `Err` if the row doesn't match the number of columns
    pub fn add_row(&mut self, row: Row) -> StageResult<()> {
        if row.len() != self.columns.len() {
            return Err(StageError::InvalidRow(format!(
                "row has {} values, but the table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }

        self.rows.push(row);
        Ok(())
    }

    /// Declare the type of a column, replacing inference for it
    pub fn set_column_type(&mut self, name: &str, column_type: ColumnType) -> StageResult<()> {
        let index = self.column_index(name).ok_or_else(|| {
            StageError::Configuration(format!("no column named '{}'", name))
        })?;
        self.columns[index].declared_type = Some(column_type);
        Ok(())
    }

    /// Replace every column name, keeping declared types
    ///
    /// The caller supplies exactly one name per column.
    pub(crate) fn rename_columns(&mut self, names: Vec<String>) {
        debug_assert_eq!(names.len(), self.columns.len());
        for (column, name) in self.columns.iter_mut().zip(names) {
            column.name = name;
        }
    }

    /// The type of the column at `index`: declared if present, inferred otherwise
    pub fn column_type(&self, index: usize) -> ColumnType {
        match self.columns[index].declared_type {
            Some(declared) => declared,
            None => ColumnType::infer(self.rows.iter().map(|row| &row[index])),
        }
    }

    /// Types for every column, in order
    pub fn column_types(&self) -> Vec<ColumnType> {
        (0..self.columns.len()).map(|i| self.column_type(i)).collect()
    }
}
