//! CLI argument parsing module for stageload
//!
//! This module defines the command-line interface using the clap crate.
//! Connection and credential arguments are global and can also be given
//! through `STAGELOAD_*` environment variables, which keeps secrets out of
//! shell history. They are only required by commands that connect.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::{ObjectOptions, StoreConfig, WarehouseConfig, DEFAULT_PORT, DEFAULT_SSL_MODE};
use crate::pipeline::ExportOptions;
use crate::statement::TableLayout;

/// Command-line arguments for stageload
#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about = "Load CSV data into a warehouse table through a staged object store upload"
)]
pub struct StageloadArgs {
    #[clap(flatten)]
    pub warehouse: WarehouseArgs,

    #[clap(flatten)]
    pub store: StoreArgs,

    /// Enable verbose diagnostic output
    ///
    /// Raises the default log level to debug. `RUST_LOG` still takes
    /// precedence when it is set.
    #[clap(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

/// Warehouse connection arguments
#[derive(Args, Debug, Clone)]
pub struct WarehouseArgs {
    #[clap(long, env = "STAGELOAD_HOST", global = true, help = "Warehouse host")]
    pub host: Option<String>,

    #[clap(long, env = "STAGELOAD_PORT", global = true, default_value_t = DEFAULT_PORT, help = "Warehouse port")]
    pub port: u16,

    #[clap(long, env = "STAGELOAD_DBNAME", global = true, help = "Database name")]
    pub dbname: Option<String>,

    #[clap(long, env = "STAGELOAD_USER", global = true, help = "Database user")]
    pub user: Option<String>,

    #[clap(long, env = "STAGELOAD_PASSWORD", global = true, hide_env_values = true, help = "Database password")]
    pub password: Option<String>,

    #[clap(long, env = "STAGELOAD_SSL_MODE", global = true, default_value = DEFAULT_SSL_MODE, help = "disable, prefer or require")]
    pub ssl_mode: String,
}

impl WarehouseArgs {
    /// Build the connection parameters, requiring host, database and user
    pub fn to_config(&self) -> Result<WarehouseConfig> {
        let required = |value: &Option<String>, flag: &str| {
            value
                .clone()
                .ok_or_else(|| anyhow!("--{} (or STAGELOAD_{}) is required", flag, flag.to_uppercase()))
        };
        Ok(WarehouseConfig {
            host: required(&self.host, "host")?,
            port: self.port,
            dbname: required(&self.dbname, "dbname")?,
            user: required(&self.user, "user")?,
            password: self.password.clone(),
            ssl_mode: self.ssl_mode.clone(),
        })
    }
}

/// Object store arguments
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    #[clap(long, env = "STAGELOAD_BUCKET", global = true, help = "Bucket that receives staged files")]
    pub bucket: Option<String>,

    #[clap(long, env = "STAGELOAD_PREFIX", global = true, help = "Key prefix for staged files")]
    pub prefix: Option<String>,

    #[clap(long, env = "STAGELOAD_ACCESS_KEY_ID", global = true, help = "Access key id")]
    pub access_key_id: Option<String>,

    #[clap(long, env = "STAGELOAD_SECRET_ACCESS_KEY", global = true, hide_env_values = true, help = "Secret access key")]
    pub secret_access_key: Option<String>,

    #[clap(long, env = "STAGELOAD_SESSION_TOKEN", global = true, hide_env_values = true, help = "Session token")]
    pub session_token: Option<String>,

    #[clap(long, env = "STAGELOAD_IAM_ROLE", global = true, help = "Role the warehouse assumes to read staged files")]
    pub iam_role: Option<String>,

    #[clap(long, env = "STAGELOAD_REGION", global = true, help = "Bucket region")]
    pub region: Option<String>,

    #[clap(long, env = "STAGELOAD_ENDPOINT", global = true, help = "Custom S3-compatible endpoint")]
    pub endpoint: Option<String>,

    #[clap(long, global = true, help = "Allow plain HTTP to the endpoint")]
    pub allow_http: bool,
}

impl StoreArgs {
    /// Build the store parameters, requiring a bucket
    pub fn to_config(&self) -> Result<StoreConfig> {
        let bucket = self
            .bucket
            .clone()
            .ok_or_else(|| anyhow!("--bucket (or STAGELOAD_BUCKET) is required"))?;
        Ok(StoreConfig {
            bucket,
            prefix: self.prefix.clone(),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
            session_token: self.session_token.clone(),
            iam_role: self.iam_role.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            allow_http: self.allow_http,
        })
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load a local CSV file into a warehouse table
    Load(LoadArgs),

    /// Execute a SQL script and commit it
    Exec {
        /// SQL text, or @path to read it from a file
        sql: String,
    },

    /// Run a query and print the result as CSV
    Query {
        /// SQL text, or @path to read it from a file
        sql: String,
    },
}

/// Arguments of the `load` command
#[derive(Args, Debug)]
pub struct LoadArgs {
    /// CSV file with a header row
    pub file: PathBuf,

    #[clap(short, long, help = "Target table name")]
    pub table: String,

    /// Warehouse types, one per column, comma separated
    ///
    /// Types are inferred from the data when omitted. Commas inside
    /// parentheses belong to the type.
    /// Example: --types "BIGINT,DECIMAL(10,2),VARCHAR(64)"
    #[clap(long, help = "Column types, comma separated")]
    pub types: Option<String>,

    #[clap(long, help = "Load into the existing table instead of recreating it")]
    pub append: bool,

    #[clap(long, help = "Distribution style: even or all")]
    pub diststyle: Option<String>,

    #[clap(long, help = "Distribution key column (overrides --diststyle)")]
    pub distkey: Option<String>,

    #[clap(long, value_delimiter = ',', help = "Sort key columns, comma separated")]
    pub sortkey: Vec<String>,

    #[clap(long, help = "Use an interleaved sort key")]
    pub interleaved: bool,

    #[clap(long, default_value = ",", help = "Field separator of the input file")]
    pub input_delimiter: String,

    #[clap(long, default_value = ",", help = "Field separator of the staged file")]
    pub delimiter: String,

    #[clap(long, default_value = "\"", help = "Quote character of the staged file")]
    pub quote: String,

    #[clap(long, default_value = "auto", help = "DATEFORMAT for the bulk load")]
    pub dateformat: String,

    #[clap(long, default_value = "auto", help = "TIMEFORMAT for the bulk load")]
    pub timeformat: String,

    #[clap(long, help = "Also write the staged CSV to this path")]
    pub save_local: Option<PathBuf>,

    #[clap(long, help = "Delete the staged file if the load fails")]
    pub cleanup_on_failure: bool,

    #[clap(long, help = "Print the load report as JSON")]
    pub json: bool,

    #[clap(long, help = "Cache-Control of the staged file")]
    pub cache_control: Option<String>,

    #[clap(long, value_parser = parse_key_value, help = "User metadata as key=value (repeatable)")]
    pub metadata: Vec<(String, String)>,

    #[clap(long, value_parser = parse_key_value, help = "Object tag as key=value (repeatable)")]
    pub tag: Vec<(String, String)>,
}

/// Split a type list on commas outside parentheses
fn split_type_list(list: &str) -> Vec<String> {
    let mut types = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for c in list.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                types.push(current.trim().to_string());
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    types.push(current.trim().to_string());

    types.into_iter().filter(|t| !t.is_empty()).collect()
}

fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", s))
}

impl LoadArgs {
    /// Export options for this load; `region` comes from the store arguments
    pub fn export_options(&self, region: Option<String>) -> ExportOptions {
        ExportOptions {
            column_types: self.types.as_deref().map(split_type_list),
            local_copy: self.save_local.clone(),
            delimiter: self.delimiter.clone(),
            quote: self.quote.clone(),
            date_format: self.dateformat.clone(),
            time_format: self.timeformat.clone(),
            region,
            append: self.append,
            layout: TableLayout {
                dist_style: self.diststyle.clone(),
                dist_key: self.distkey.clone(),
                sort_keys: self.sortkey.clone(),
                interleaved: self.interleaved,
            },
            object_options: ObjectOptions {
                cache_control: self.cache_control.clone(),
                metadata: self.metadata.iter().cloned().collect::<BTreeMap<_, _>>(),
                tags: self.tag.iter().cloned().collect::<BTreeMap<_, _>>(),
                ..Default::default()
            },
            cleanup_on_failure: self.cleanup_on_failure,
        }
    }
}

/// Parse command-line arguments into the StageloadArgs structure
pub fn parse_args() -> Result<StageloadArgs> {
    Ok(StageloadArgs::parse())
}
