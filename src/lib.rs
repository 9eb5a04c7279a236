//! Stageload library crate
//!
//! Moves in-memory tables into a cloud data warehouse by way of staged CSV
//! files in an object store. The library provides:
//!
//! - An in-memory table with per-column type inference
//! - Column name normalization and reserved-word validation
//! - CSV encoding with configurable delimiter and quote character
//! - A blocking object store client that stages uploads under unique keys
//! - A blocking warehouse client with explicit commit and rollback
//! - Builders for table-creation and bulk-load statements
//! - An export pipeline that ties these together and rolls back on failure
//!
//! Clients are plain values passed by reference into each export, so one
//! process can hold several independent connections.

pub mod cli;
pub mod config;
pub mod csv_handler;
pub mod error;
pub mod pipeline;
pub mod script;
pub mod staging;
pub mod statement;
pub mod table;
pub mod validator;
pub mod warehouse;

pub use error::{StageError, StageResult};
pub use pipeline::{export_table, ExportOptions, ExportPlan, ExportReport};
pub use staging::{StagedObject, StagingStore};
pub use table::{Column, ColumnType, Table, Value};
pub use warehouse::{Warehouse, WarehouseClient};
