//! stageload - load CSV data into a warehouse table through an object store
//!
//! # Program Flow
//!
//! 1. Parse command-line arguments and set up logging
//! 2. For `load`: read the CSV file, validate the export (no I/O), then
//!    connect to the object store and the warehouse and run it
//! 3. For `exec`: split the script, execute each statement, commit
//! 4. For `query`: run the query and print the result as CSV

use std::fs;
use std::io;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use stageload::cli::{self, Command, LoadArgs, StageloadArgs};
use stageload::config::AppConfig;
use stageload::csv_handler::CsvHandler;
use stageload::pipeline::ExportPlan;
use stageload::script::{run_script, split_statements};
use stageload::staging::StagingStore;
use stageload::warehouse::{Warehouse, WarehouseClient};

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Read SQL given inline or, with a leading `@`, from a file
fn read_sql(sql: &str) -> Result<String> {
    match sql.strip_prefix('@') {
        Some(path) => fs::read_to_string(path).with_context(|| format!("Failed to read SQL file: {path}")),
        None => Ok(sql.to_string()),
    }
}

fn connect_warehouse(args: &StageloadArgs) -> Result<WarehouseClient> {
    let config = args.warehouse.to_config()?;
    WarehouseClient::connect(&config).context("Failed to connect to the warehouse")
}

fn run_load(args: &StageloadArgs, load: &LoadArgs) -> Result<()> {
    let input = CsvHandler::new(&load.input_delimiter, "\"")?;
    let data = input
        .load_csv(&load.file)
        .with_context(|| format!("Failed to load file: {}", load.file.display()))?;
    info!(rows = data.row_count(), columns = data.column_count(), "read input file");

    // Validation and statement building happen before any connection is made
    let plan = ExportPlan::prepare(&data, &load.table, load.export_options(args.store.region.clone()))
        .context("Invalid export")?;

    let config = AppConfig::new(args.verbose, args.warehouse.to_config()?, args.store.to_config()?);
    let staging = StagingStore::connect(config.store()).context("Failed to open the object store")?;
    let mut warehouse =
        WarehouseClient::connect(config.warehouse()).context("Failed to connect to the warehouse")?;

    let report = plan
        .run(&mut warehouse, &staging)
        .with_context(|| format!("Failed to load table {}", load.table))?;
    warehouse.close()?;

    if load.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    if config.verbose() {
        for statement in &report.statements {
            println!("{statement}");
        }
    }
    println!("Loaded {} rows into {} from {}", report.rows, report.table, report.staged.uri);
    Ok(())
}

fn run_exec(args: &StageloadArgs, sql: &str) -> Result<()> {
    let script = read_sql(sql)?;
    let statements = split_statements(&script).context("Failed to split SQL script")?;
    let mut warehouse = connect_warehouse(args)?;

    let executed = run_script(&mut warehouse, &statements).context("Failed to execute SQL script")?;
    warehouse.close()?;

    println!("Executed {} statements", executed);
    Ok(())
}

fn run_query(args: &StageloadArgs, sql: &str) -> Result<()> {
    let sql = read_sql(sql)?;
    let mut warehouse = connect_warehouse(args)?;
    let table = warehouse
        .query(&sql)
        .with_context(|| format!("Failed to execute SQL: {sql}"))?;
    warehouse.close()?;

    let header: Vec<String> = table.column_names().iter().map(|c| c.to_string()).collect();
    CsvHandler::default().write_table(&table, &header, io::stdout().lock())?;
    Ok(())
}

fn main() -> Result<()> {
    let args = cli::parse_args()?;
    init_logging(args.verbose);

    match &args.command {
        Command::Load(load) => run_load(&args, load),
        Command::Exec { sql } => run_exec(&args, sql),
        Command::Query { sql } => run_query(&args, sql),
    }
}
