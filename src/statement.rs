//! Statement builders for table definition and bulk loading
//!
//! Statements are assembled as text and validated while they are built, so
//! an invalid combination of layout hints is reported before anything is
//! sent to the warehouse.
//!
//! Grammar produced:
//!
//! ```text
//! DROP TABLE IF EXISTS <name>
//! CREATE TABLE <name> (<col> <type>, ...) [DISTSTYLE EVEN|ALL | DISTKEY(<col>)] [[INTERLEAVED] SORTKEY(<col>, ...)]
//! COPY <table> FROM '<uri>' DELIMITER '<c>' IGNOREHEADER 1 CSV QUOTE AS '<q>'
//!     DATEFORMAT '<fmt>' TIMEFORMAT '<fmt>' <auth> [REGION '<r>'] [SESSION_TOKEN '<t>'];
//! ```

use std::fmt;


use crate::error::{StageError, StageResult};
use crate::validator::normalize_name;

/// Placeholder written in place of secrets when a statement is logged
const REDACTED: &str = "<redacted>";

/// Quote a string as a SQL literal, doubling embedded single quotes
pub fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Statement that removes any existing table of the given name
pub fn drop_table_sql(table_name: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", table_name)
}

/// Physical layout hints requested by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableLayout {
    /// `even` or `all`; ignored when `dist_key` is set
    pub dist_style: Option<String>,
    pub dist_key: Option<String>,
    pub sort_keys: Vec<String>,
    pub interleaved: bool,
}

/// Row distribution style
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistStyle {
    Even,
    All,
}

impl DistStyle {
    /// Parse a style name, ignoring case
    pub fn parse(style: &str) -> StageResult<Self> {
        match style.trim().to_lowercase().as_str() {
            "even" => Ok(DistStyle::Even),
            "all" => Ok(DistStyle::All),
            other => Err(StageError::Configuration(format!(
                "unsupported distribution style '{}' (expected 'even' or 'all')",
                other
            ))),
        }
    }
}

impl fmt::Display for DistStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistStyle::Even => f.write_str("EVEN"),
            DistStyle::All => f.write_str("ALL"),
        }
    }
}

/// How rows are spread across nodes; a key always wins over a style
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Distribution {
    Key(String),
    Style(DistStyle),
}

/// A validated CREATE TABLE statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTable {
    name: String,
    columns: Vec<(String, String)>,
    distribution: Option<Distribution>,
    sort_keys: Vec<String>,
    interleaved: bool,
}

impl CreateTable {
    /// Build a table definition from column name/type pairs and layout hints
    ///
    /// Layout columns are normalized the same way column names are and must
    /// name one of `columns`.
    ///
    /// # Returns
    /// * `Err(Configuration)` for an empty table name, an empty column list,
    ///   an unknown distribution style, a layout column that does not exist,
    ///   or an interleaved sort key without sort columns
    pub fn new(name: &str, columns: Vec<(String, String)>, layout: &TableLayout) -> StageResult<Self> {
        if name.trim().is_empty() {
            return Err(StageError::Configuration("table name is empty".to_string()));
        }
        if columns.is_empty() {
            return Err(StageError::Configuration(format!(
                "table '{}' has no columns",
                name
            )));
        }

        let known = |key: &str| -> StageResult<String> {
            let key = normalize_name(key.trim());
            if columns.iter().any(|(column, _)| *column == key) {
                Ok(key)
            } else {
                Err(StageError::Configuration(format!(
                    "layout column '{}' is not a column of table '{}'",
                    key, name
                )))
            }
        };

        let dist_key = layout.dist_key.as_deref().filter(|k| !k.trim().is_empty());
        let dist_style = layout.dist_style.as_deref().filter(|s| !s.trim().is_empty());

        let distribution = match (dist_key, dist_style) {
            (Some(key), _) => Some(Distribution::Key(known(key)?)),
            (None, Some(style)) => Some(Distribution::Style(DistStyle::parse(style)?)),
            (None, None) => None,
        };

        let sort_keys = layout
            .sort_keys
            .iter()
            .filter(|k| !k.trim().is_empty())
            .map(|k| known(k.as_str()))
            .collect::<StageResult<Vec<_>>>()?;

        if layout.interleaved && sort_keys.is_empty() {
            return Err(StageError::Configuration(
                "an interleaved sort key needs at least one sort column".to_string(),
            ));
        }

        Ok(CreateTable {
            name: name.to_string(),
            columns,
            distribution,
            sort_keys,
            interleaved: layout.interleaved,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn distribution(&self) -> Option<&Distribution> {
        self.distribution.as_ref()
    }

    /// Render the statement text
    pub fn to_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|(name, sql_type)| format!("{} {}", name, sql_type))
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = format!("CREATE TABLE {} ({})", self.name, columns);

        match &self.distribution {
            Some(Distribution::Key(key)) => sql.push_str(&format!(" DISTKEY({})", key)),
            Some(Distribution::Style(style)) => sql.push_str(&format!(" DISTSTYLE {}", style)),
            None => {}
        }

        if !self.sort_keys.is_empty() {
            if self.interleaved {
                sql.push_str(" INTERLEAVED");
            }
            sql.push_str(&format!(" SORTKEY({})", self.sort_keys.join(", ")));
        }

        sql
    }
}

/// Credentials the warehouse uses to read the staged object
#[derive(Clone, PartialEq, Eq)]
pub enum Authorization {
    AccessKey {
        access_key_id: String,
        secret_access_key: String,
        session_token: Option<String>,
    },
    IamRole(String),
}

// Keeps secrets out of debug output and logs
impl fmt::Debug for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authorization::AccessKey { access_key_id, session_token, .. } => f
                .debug_struct("AccessKey")
                .field("access_key_id", access_key_id)
                .field("secret_access_key", &REDACTED)
                .field("session_token", &session_token.as_ref().map(|_| REDACTED))
                .finish(),
            Authorization::IamRole(role) => f.debug_tuple("IamRole").field(role).finish(),
        }
    }
}

impl Authorization {
    /// Choose the authorization clause from the configured credentials
    ///
    /// Static keys take precedence over an assumed role. A key id without a
    /// secret, or no credentials at all, is a configuration error.
    pub fn from_credentials(
        access_key_id: Option<&str>,
        secret_access_key: Option<&str>,
        session_token: Option<&str>,
        iam_role: Option<&str>,
    ) -> StageResult<Self> {
        let non_empty = |v: Option<&str>| v.filter(|s| !s.is_empty()).map(str::to_string);

        match (non_empty(access_key_id), non_empty(secret_access_key)) {
            (Some(access_key_id), Some(secret_access_key)) => Ok(Authorization::AccessKey {
                access_key_id,
                secret_access_key,
                session_token: non_empty(session_token),
            }),
            (Some(_), None) | (None, Some(_)) => Err(StageError::Configuration(
                "access key id and secret access key must be given together".to_string(),
            )),
            (None, None) => non_empty(iam_role).map(Authorization::IamRole).ok_or_else(|| {
                StageError::Configuration(
                    "no credentials configured: set an access key pair or an IAM role".to_string(),
                )
            }),
        }
    }

    fn clause(&self, redact: bool) -> String {
        let secret = |value: &str| if redact { literal(REDACTED) } else { literal(value) };
        match self {
            Authorization::AccessKey {
                access_key_id,
                secret_access_key,
                ..
            } => format!(
                "ACCESS_KEY_ID {} SECRET_ACCESS_KEY {}",
                literal(access_key_id),
                secret(secret_access_key)
            ),
            Authorization::IamRole(role) => format!("IAM_ROLE {}", literal(role)),
        }
    }

    fn session_token(&self) -> Option<&str> {
        match self {
            Authorization::AccessKey { session_token, .. } => session_token.as_deref(),
            Authorization::IamRole(_) => None,
        }
    }
}

/// Format options for the bulk loader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyFormat {
    pub delimiter: char,
    pub quote: char,
    pub date_format: String,
    pub time_format: String,
    pub region: Option<String>,
}

impl Default for CopyFormat {
    fn default() -> Self {
        CopyFormat {
            delimiter: ',',
            quote: '"',
            date_format: "auto".to_string(),
            time_format: "auto".to_string(),
            region: None,
        }
    }
}

/// A bulk-load statement reading one staged object into a table
#[derive(Debug, Clone)]
pub struct CopyStatement {
    pub table: String,
    pub source_uri: String,
    pub format: CopyFormat,
    pub authorization: Authorization,
}

impl CopyStatement {
    /// Statement text sent to the warehouse
    pub fn to_sql(&self) -> String {
        self.render(false)
    }

    /// Statement text with secrets replaced, for logging
    pub fn redacted(&self) -> String {
        self.render(true)
    }

    fn render(&self, redact: bool) -> String {
        let mut sql = format!(
            "COPY {} FROM {} DELIMITER {} IGNOREHEADER 1 CSV QUOTE AS {} DATEFORMAT {} TIMEFORMAT {} {}",
            self.table,
            literal(&self.source_uri),
            literal(&self.format.delimiter.to_string()),
            literal(&self.format.quote.to_string()),
            literal(&self.format.date_format),
            literal(&self.format.time_format),
            self.authorization.clause(redact),
        );

        if let Some(region) = self.format.region.as_deref().filter(|r| !r.is_empty()) {
            sql.push_str(&format!(" REGION {}", literal(region)));
        }

        if let Some(token) = self.authorization.session_token() {
            let token = if redact { REDACTED } else { token };
            sql.push_str(&format!(" SESSION_TOKEN {}", literal(token)));
        }

        sql.push(';');
        sql
    }
}
