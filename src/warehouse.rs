//! Warehouse client
//!
//! [`Warehouse`] is the seam the export pipeline talks to: execute a
//! statement, run a query, commit, roll back. [`WarehouseClient`] implements
//! it over a single Postgres-protocol connection, blocking the caller on
//! every call.
//!
//! Transactions open implicitly: the first statement after a connect,
//! commit or rollback is preceded by `BEGIN`, and nothing is committed
//! until [`Warehouse::commit`] is called.

use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow, PgSslMode};
use sqlx::{Column, Connection, Executor, Row, TypeInfo};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info, warn};

use crate::config::WarehouseConfig;
use crate::error::{StageError, StageResult};
use crate::table::{Column as TableColumn, ColumnType, Table, Value};

/// Operations the export pipeline needs from a warehouse connection
pub trait Warehouse {
    /// Execute a statement inside the current transaction
    ///
    /// # Returns
    /// * The number of rows affected, when the warehouse reports one
    fn execute(&mut self, sql: &str) -> StageResult<u64>;

    /// Run a query and collect its result set as a table
    ///
    /// Column names of a result with no rows come from describing the
    /// statement; when the server rejects that, the table has no columns.
    fn query(&mut self, sql: &str) -> StageResult<Table>;

    /// Commit the current transaction
    fn commit(&mut self) -> StageResult<()>;

    /// Abandon the current transaction
    fn rollback(&mut self) -> StageResult<()>;

    /// Execute a statement and commit it
    fn exec_commit(&mut self, sql: &str) -> StageResult<u64> {
        let affected = self.execute(sql)?;
        self.commit()?;
        Ok(affected)
    }
}

/// Blocking client over one warehouse connection
pub struct WarehouseClient {
    conn: PgConnection,
    runtime: Runtime,
    in_transaction: bool,
}

fn ssl_mode(mode: &str) -> StageResult<PgSslMode> {
    match mode.to_lowercase().as_str() {
        "disable" => Ok(PgSslMode::Disable),
        "prefer" => Ok(PgSslMode::Prefer),
        "require" => Ok(PgSslMode::Require),
        other => Err(StageError::Configuration(format!(
            "unsupported ssl mode '{}' (expected disable, prefer or require)",
            other
        ))),
    }
}

impl WarehouseClient {
    /// Open a connection with the given parameters
    pub fn connect(config: &WarehouseConfig) -> StageResult<Self> {
        let mut options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.dbname)
            .username(&config.user)
            .ssl_mode(ssl_mode(&config.ssl_mode)?);
        if let Some(password) = &config.password {
            options = options.password(password);
        }

        let runtime = Builder::new_current_thread().enable_all().build()?;
        let conn = runtime.block_on(PgConnection::connect_with(&options))?;
        info!(host = %config.host, port = config.port, dbname = %config.dbname, "connected to warehouse");

        Ok(WarehouseClient {
            conn,
            runtime,
            in_transaction: false,
        })
    }

    fn begin_if_needed(&mut self) -> StageResult<()> {
        if !self.in_transaction {
            self.runtime
                .block_on(sqlx::raw_sql("BEGIN").execute(&mut self.conn))?;
            self.in_transaction = true;
        }
        Ok(())
    }

    /// Commit any open transaction and close the connection
    pub fn close(mut self) -> StageResult<()> {
        self.commit()?;
        self.runtime.block_on(self.conn.close())?;
        info!("closed warehouse connection");
        Ok(())
    }
}

impl Warehouse for WarehouseClient {
    fn execute(&mut self, sql: &str) -> StageResult<u64> {
        self.begin_if_needed()?;
        let result = self
            .runtime
            .block_on(sqlx::raw_sql(sql).execute(&mut self.conn))?;
        debug!(rows_affected = result.rows_affected(), "statement executed");
        Ok(result.rows_affected())
    }

    fn query(&mut self, sql: &str) -> StageResult<Table> {
        self.begin_if_needed()?;
        let rows = self
            .runtime
            .block_on(sqlx::raw_sql(sql).fetch_all(&mut self.conn))?;

        if let Some(first) = rows.first() {
            let (columns, types) = describe_row(first);
            let mut table = Table::with_columns(columns);
            for row in &rows {
                table.add_row(decode_row(row, &types)?)?;
            }
            debug!(rows = table.row_count(), "query returned");
            return Ok(table);
        }

        // No rows to read column names from; ask the server instead
        let described: Result<Vec<TableColumn>, sqlx::Error> = self
            .runtime
            .block_on((&mut self.conn).describe(sql))
            .map(|description| {
                description
                    .columns()
                    .iter()
                    .map(|column| match column_type(column.type_info().name()) {
                        Some(t) => TableColumn::typed(column.name(), t),
                        None => TableColumn::new(column.name()),
                    })
                    .collect()
            });
        Ok(empty_result(described))
    }

    fn commit(&mut self) -> StageResult<()> {
        if self.in_transaction {
            self.runtime
                .block_on(sqlx::raw_sql("COMMIT").execute(&mut self.conn))?;
            self.in_transaction = false;
            debug!("committed");
        }
        Ok(())
    }

    fn rollback(&mut self) -> StageResult<()> {
        if self.in_transaction {
            self.in_transaction = false;
            self.runtime
                .block_on(sqlx::raw_sql("ROLLBACK").execute(&mut self.conn))?;
            debug!("rolled back");
        }
        Ok(())
    }
}

/// Map a server type name to a dataset column type
fn column_type(type_name: &str) -> Option<ColumnType> {
    match type_name {
        "INT2" | "INT4" => Some(ColumnType::Integer),
        "INT8" => Some(ColumnType::BigInt),
        "FLOAT4" | "FLOAT8" | "NUMERIC" => Some(ColumnType::Real),
        "BOOL" => Some(ColumnType::Boolean),
        "TIMESTAMP" => Some(ColumnType::Timestamp),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => Some(ColumnType::Text),
        _ => None,
    }
}

fn describe_row(row: &PgRow) -> (Vec<TableColumn>, Vec<Option<ColumnType>>) {
    row.columns()
        .iter()
        .map(|column| {
            let column_type = column_type(column.type_info().name());
            let definition = match column_type {
                Some(t) => TableColumn::typed(column.name(), t),
                None => TableColumn::new(column.name()),
            };
            (definition, column_type)
        })
        .unzip()
}

/// Decode one row of a simple-protocol result
///
/// Every value arrives as text; it is parsed according to the column's
/// server type and kept as text when parsing fails.
fn decode_row(row: &PgRow, types: &[Option<ColumnType>]) -> StageResult<Vec<Value>> {
    let mut values = Vec::with_capacity(types.len());
    for (index, column_type) in types.iter().enumerate() {
        let text: Option<String> = row.try_get_unchecked(index)?;
        values.push(match text {
            None => Value::Null,
            Some(text) => decode_text(text, *column_type),
        });
    }
    Ok(values)
}

/// Table for a query that returned no rows
///
/// Describing a statement runs catalog lookups that not every warehouse
/// accepts; when that fails the empty result has no columns.
fn empty_result(described: Result<Vec<TableColumn>, sqlx::Error>) -> Table {
    match described {
        Ok(columns) => Table::with_columns(columns),
        Err(err) => {
            warn!(error = %err, "could not describe empty result, returning it without columns");
            Table::with_columns(Vec::new())
        }
    }
}

fn decode_text(text: String, column_type: Option<ColumnType>) -> Value {
    match column_type {
        Some(ColumnType::Integer) | Some(ColumnType::BigInt) => text
            .parse::<i64>()
            .map(Value::Integer)
            .unwrap_or(Value::String(text)),
        Some(ColumnType::Real) => text
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or(Value::String(text)),
        Some(ColumnType::Boolean) => match text.as_str() {
            "t" | "true" => Value::Boolean(true),
            "f" | "false" => Value::Boolean(false),
            _ => Value::String(text),
        },
        Some(ColumnType::Timestamp) => match Value::from(text.as_str()) {
            ts @ Value::Timestamp(_) => ts,
            _ => Value::String(text),
        },
        Some(ColumnType::Text) | None => Value::String(text),
    }
}
