//! CSV handling module for stageload
//!
//! This module converts tables to and from delimited text. It provides:
//!
//! - Encoding a table as CSV bytes with a configurable delimiter and quote character
//! - Writing a local copy of the encoded data
//! - Loading a local CSV file into a table with per-cell type inference
//!
//! The header row is always written, which is why the bulk-load statement
//! skips exactly one line.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{StageError, StageResult};
use crate::table::{Table, Value};

/// Encodes and decodes tables as delimiter-separated text
#[derive(Debug, Clone, Copy)]
pub struct CsvHandler {
    delimiter: u8,
    quote: u8,
}

impl Default for CsvHandler {
    fn default() -> Self {
        CsvHandler {
            delimiter: b',',
            quote: b'"',
        }
    }
}

/// Convert a single-character option to the byte the csv crate expects
///
/// `\t` written out as two characters is accepted for tab.
pub fn single_byte(option: &str, value: &str) -> StageResult<u8> {
    if value == "\\t" {
        return Ok(b'\t');
    }
    match value.as_bytes() {
        [byte] if byte.is_ascii() => Ok(*byte),
        _ => Err(StageError::Configuration(format!(
            "invalid {}: '{}'. Must be a single ASCII character.",
            option, value
        ))),
    }
}

impl CsvHandler {
    /// Create a handler for the given delimiter and quote character
    ///
    /// # Returns
    /// * `Ok(CsvHandler)` if both are single ASCII characters
    /// * `Err(Configuration)` otherwise
    pub fn new(delimiter: &str, quote: &str) -> StageResult<Self> {
        let delimiter = single_byte("delimiter", delimiter)?;
        let quote = single_byte("quote character", quote)?;
        if delimiter == quote {
            return Err(StageError::Configuration(
                "delimiter and quote character must differ".to_string(),
            ));
        }
        Ok(CsvHandler { delimiter, quote })
    }

    pub fn delimiter(&self) -> char {
        self.delimiter as char
    }

    pub fn quote(&self) -> char {
        self.quote as char
    }

    /// Write a header row followed by every row of the table
    ///
    /// `header` supplies the column names to write, which lets the caller
    /// emit normalized names without copying the table.
    pub fn write_table<W: Write>(&self, table: &Table, header: &[String], writer: W) -> StageResult<()> {
        if header.len() != table.column_count() {
            return Err(StageError::InvalidRow(format!(
                "header has {} names, but the table has {} columns",
                header.len(),
                table.column_count()
            )));
        }

        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .quote(self.quote)
            .from_writer(writer);

        csv_writer.write_record(header)?;

        for row in table.rows() {
            csv_writer.write_record(row.iter().map(Value::to_field))?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Encode the table into an in-memory buffer
    pub fn to_bytes(&self, table: &Table, header: &[String]) -> StageResult<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write_table(table, header, &mut buffer)?;
        Ok(buffer)
    }

    /// Write already-encoded bytes to a local file
    pub fn save_local(&self, bytes: &[u8], path: &Path) -> StageResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(bytes)?;
        writer.flush()?;
        Ok(())
    }

    /// Read delimited text with a header row into a table
    ///
    /// Each cell's type is inferred independently; column types are inferred
    /// later from the values a column ends up holding.
    pub fn read_table<R: Read>(&self, reader: R) -> StageResult<Table> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.delimiter)
            .quote(self.quote)
            .from_reader(reader);

        let headers = csv_reader
            .headers()?
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>();

        let mut table = Table::new(headers);

        for result in csv_reader.records() {
            let record = result?;
            let row = record.iter().map(Value::from).collect();
            table.add_row(row)?;
        }

        Ok(table)
    }

    /// Load a local CSV file into a table
    pub fn load_csv(&self, path: &Path) -> StageResult<Table> {
        let file = File::open(path)?;
        self.read_table(BufReader::new(file))
    }
}
