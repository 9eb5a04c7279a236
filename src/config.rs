//! Configuration module for stageload
//!
//! Connection parameters for the warehouse and the object store, the
//! per-object metadata options applied to staged uploads, and the binary's
//! application configuration. These are plain values: the caller builds
//! them (from arguments, environment, or code) and hands them to the clients.

use std::collections::BTreeMap;

use crate::error::StageResult;
use crate::statement::Authorization;

/// Default warehouse port
pub const DEFAULT_PORT: u16 = 5439;

/// Default TLS mode for warehouse connections
pub const DEFAULT_SSL_MODE: &str = "prefer";

/// Warehouse connection parameters
#[derive(Clone)]
pub struct WarehouseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
    /// `disable`, `prefer` or `require`
    pub ssl_mode: String,
}

fn default_ssl_mode() -> String {
    DEFAULT_SSL_MODE.to_string()
}

impl WarehouseConfig {
    pub fn new(host: &str, dbname: &str, user: &str) -> Self {
        WarehouseConfig {
            host: host.to_string(),
            port: DEFAULT_PORT,
            dbname: dbname.to_string(),
            user: user.to_string(),
            password: None,
            ssl_mode: default_ssl_mode(),
        }
    }
}

impl std::fmt::Debug for WarehouseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarehouseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Object store parameters
///
/// The same credentials are used for the upload and, through the bulk-load
/// authorization clause, by the warehouse when it reads the staged object.
#[derive(Clone, Default)]
pub struct StoreConfig {
    pub bucket: String,
    /// Key prefix under which objects are staged, without a trailing slash
    pub prefix: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    /// Role the warehouse assumes when no access key pair is configured
    pub iam_role: Option<String>,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores
    pub endpoint: Option<String>,
    pub allow_http: bool,
}

impl StoreConfig {
    pub fn new(bucket: &str) -> Self {
        StoreConfig {
            bucket: bucket.to_string(),
            ..Default::default()
        }
    }

    /// The authorization clause the warehouse uses to read staged objects
    pub fn authorization(&self) -> StageResult<Authorization> {
        Authorization::from_credentials(
            self.access_key_id.as_deref(),
            self.secret_access_key.as_deref(),
            self.session_token.as_deref(),
            self.iam_role.as_deref(),
        )
    }

    /// Prefix with surrounding slashes removed; `None` when empty
    pub fn normalized_prefix(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .map(|p| p.trim_matches('/'))
            .filter(|p| !p.is_empty())
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("StoreConfig")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &redact(&self.secret_access_key))
            .field("session_token", &redact(&self.session_token))
            .field("iam_role", &self.iam_role)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("allow_http", &self.allow_http)
            .finish()
    }
}

/// Metadata applied to each staged object
///
/// Every supported option is listed here; nothing is passed through to the
/// store unchecked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectOptions {
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub content_disposition: Option<String>,
    pub content_language: Option<String>,
    pub cache_control: Option<String>,
    /// User-defined metadata
    pub metadata: BTreeMap<String, String>,
    /// Object tags
    pub tags: BTreeMap<String, String>,
}

impl Default for ObjectOptions {
    fn default() -> Self {
        ObjectOptions {
            content_type: Some("text/csv".to_string()),
            content_encoding: None,
            content_disposition: None,
            content_language: None,
            cache_control: None,
            metadata: BTreeMap::new(),
            tags: BTreeMap::new(),
        }
    }
}

/// Application configuration for the binary
///
/// Created at startup from the parsed arguments and passed to the command
/// handlers, so no component reads global state.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Whether to show verbose output
    verbose: bool,

    warehouse: WarehouseConfig,

    store: StoreConfig,
}

impl AppConfig {
    pub fn new(verbose: bool, warehouse: WarehouseConfig, store: StoreConfig) -> Self {
        Self {
            verbose,
            warehouse,
            store,
        }
    }

    /// Get the verbose flag
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn warehouse(&self) -> &WarehouseConfig {
        &self.warehouse
    }

    pub fn store(&self) -> &StoreConfig {
        &self.store
    }
}
