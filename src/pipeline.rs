//! Export pipeline
//!
//! Moves one table into the warehouse in a fixed order:
//!
//! 1. Validate column names
//! 2. Serialize the table as CSV (optionally keeping a local copy)
//! 3. Stage the CSV bytes in the object store under a fresh key
//! 4. Define the table (drop + create) unless appending
//! 5. Load the staged object with a bulk-load statement
//! 6. Commit
//!
//! Steps 1 and the statement building of step 4 happen in
//! [`ExportPlan::prepare`], so naming and configuration errors are reported
//! before any I/O. A failed statement rolls the transaction back and the
//! original error is returned. The staged object is left in place unless
//! [`ExportOptions::cleanup_on_failure`] is set.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::ObjectOptions;
use crate::csv_handler::CsvHandler;
use crate::error::{StageError, StageResult};
use crate::staging::{StagedObject, StagingStore};
use crate::statement::{drop_table_sql, CopyFormat, CopyStatement, CreateTable, TableLayout};
use crate::table::Table;
use crate::validator::normalize_columns;
use crate::warehouse::Warehouse;

/// Options for a single export
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Warehouse types, one per column; inferred from the data when absent
    pub column_types: Option<Vec<String>>,
    /// Where to keep a local copy of the encoded CSV
    pub local_copy: Option<PathBuf>,
    pub delimiter: String,
    pub quote: String,
    pub date_format: String,
    pub time_format: String,
    pub region: Option<String>,
    /// Load into the existing table instead of recreating it
    pub append: bool,
    pub layout: TableLayout,
    pub object_options: ObjectOptions,
    /// Delete the staged object when the load fails
    pub cleanup_on_failure: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            column_types: None,
            local_copy: None,
            delimiter: ",".to_string(),
            quote: "\"".to_string(),
            date_format: "auto".to_string(),
            time_format: "auto".to_string(),
            region: None,
            append: false,
            layout: TableLayout::default(),
            object_options: ObjectOptions::default(),
            cleanup_on_failure: false,
        }
    }
}

/// Outcome of a successful export
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub table: String,
    pub staged: StagedObject,
    pub rows: usize,
    /// Statements issued, in order, with secrets redacted
    pub statements: Vec<String>,
}

/// A validated export, ready to run
#[derive(Debug)]
pub struct ExportPlan<'a> {
    data: &'a Table,
    table_name: String,
    columns: Vec<String>,
    create: Option<CreateTable>,
    csv: CsvHandler,
    options: ExportOptions,
}

impl<'a> ExportPlan<'a> {
    /// Validate the table and options without touching the network
    ///
    /// # Returns
    /// * `Err(NameConflict)` / `Err(DuplicateColumn)` for bad column names
    /// * `Err(Configuration)` for bad layout hints, mismatched column types,
    ///   or an invalid delimiter or quote character
    pub fn prepare(data: &'a Table, table_name: &str, options: ExportOptions) -> StageResult<Self> {
        let columns = normalize_columns(&data.column_names())?;
        let csv = CsvHandler::new(&options.delimiter, &options.quote)?;

        if table_name.trim().is_empty() {
            return Err(StageError::Configuration("table name is empty".to_string()));
        }

        let sql_types = match &options.column_types {
            Some(types) if types.len() != columns.len() => {
                return Err(StageError::Configuration(format!(
                    "{} column types given for {} columns",
                    types.len(),
                    columns.len()
                )))
            }
            Some(types) => types.clone(),
            None => data
                .column_types()
                .iter()
                .map(|t| t.sql_type().to_string())
                .collect(),
        };

        let create = if options.append {
            None
        } else {
            let definitions = columns.iter().cloned().zip(sql_types).collect();
            Some(CreateTable::new(table_name, definitions, &options.layout)?)
        };

        Ok(ExportPlan {
            data,
            table_name: table_name.to_string(),
            columns,
            create,
            csv,
            options,
        })
    }

    /// Normalized column names, in order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The CREATE TABLE statement, when the export recreates the table
    pub fn create_statement(&self) -> Option<String> {
        self.create.as_ref().map(CreateTable::to_sql)
    }

    /// Run the export against a warehouse and a staging store
    pub fn run<W: Warehouse + ?Sized>(
        self,
        warehouse: &mut W,
        staging: &StagingStore,
    ) -> StageResult<ExportReport> {
        let authorization = staging.authorization()?.clone();

        info!(table = %self.table_name, rows = self.data.row_count(), "serializing table");
        let bytes = self.csv.to_bytes(self.data, &self.columns)?;
        if let Some(path) = &self.options.local_copy {
            self.csv.save_local(&bytes, path)?;
            info!(path = %path.display(), "saved local copy");
        }

        let key = staging.key_for(&self.table_name);
        let staged = staging.put(&key, bytes, &self.options.object_options)?;
        info!(uri = %staged.uri, size = staged.size, "staged table data");

        let copy = CopyStatement {
            table: self.table_name.clone(),
            source_uri: staged.uri.clone(),
            format: CopyFormat {
                delimiter: self.csv.delimiter(),
                quote: self.csv.quote(),
                date_format: self.options.date_format.clone(),
                time_format: self.options.time_format.clone(),
                region: self.options.region.clone(),
            },
            authorization,
        };

        let mut statements = Vec::new();
        if let Err(err) = self.load(warehouse, &copy, &mut statements) {
            error!(table = %self.table_name, error = %err, "export failed, rolling back");
            if let Err(rollback_err) = warehouse.rollback() {
                error!(error = %rollback_err, "rollback failed");
            }
            self.handle_orphan(staging, &staged);
            return Err(err);
        }

        info!(table = %self.table_name, "export committed");
        Ok(ExportReport {
            table: self.table_name,
            staged,
            rows: self.data.row_count(),
            statements,
        })
    }

    fn load<W: Warehouse + ?Sized>(
        &self,
        warehouse: &mut W,
        copy: &CopyStatement,
        statements: &mut Vec<String>,
    ) -> StageResult<()> {
        let mut issue = |sql: String, logged: String| -> StageResult<()> {
            info!(statement = %logged, "executing");
            warehouse.execute(&sql)?;
            statements.push(logged);
            Ok(())
        };

        if let Some(create) = &self.create {
            let drop = drop_table_sql(create.name());
            issue(drop.clone(), drop)?;
            let sql = create.to_sql();
            issue(sql.clone(), sql)?;
        }

        issue(copy.to_sql(), copy.redacted())?;
        warehouse.commit()?;
        statements.push("COMMIT".to_string());
        Ok(())
    }

    fn handle_orphan(&self, staging: &StagingStore, staged: &StagedObject) {
        if !self.options.cleanup_on_failure {
            warn!(uri = %staged.uri, "staged object left in place after failed load");
            return;
        }
        match staging.delete(&staged.key) {
            Ok(()) => info!(uri = %staged.uri, "removed staged object"),
            Err(err) => warn!(uri = %staged.uri, error = %err, "could not remove staged object"),
        }
    }
}

/// Validate, stage, define, load and commit `data` as `table_name`
pub fn export_table<W: Warehouse + ?Sized>(
    warehouse: &mut W,
    staging: &StagingStore,
    data: &Table,
    table_name: &str,
    options: ExportOptions,
) -> StageResult<ExportReport> {
    ExportPlan::prepare(data, table_name, options)?.run(warehouse, staging)
}
