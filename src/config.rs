//! Connection configuration.
//!
//! Settings come from three layers, later ones winning: built-in defaults,
//! a TOML file, and per-table options in the table comment, e.g.
//!
//! ```text
//! scylla_hosts=10.0.0.1,10.0.0.2;scylla_keyspace=shop;scylla_table=orders;scylla_port=9043
//! ```
//!
//! Only the adapter layer reads this; statement building and row
//! conversion never do.

use std::fmt;
use std::path::{Path, PathBuf};

use nom::{
    IResult,
    bytes::complete::take_while,
    character::complete::char,
    combinator::opt,
    multi::separated_list0,
    sequence::{pair, preceded},
};
use serde::Deserialize;

use crate::error::{CqlError, CqlResult};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9042;
pub const DEFAULT_KEYSPACE: &str = "mariadb";

/// Settings for reaching the cluster and naming tables in it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Contact points
    pub hosts: Vec<String>,

    /// Native protocol port
    pub port: u16,

    /// Keyspace holding the tables
    pub keyspace: String,

    /// Table name override (otherwise derived from the relational table)
    pub table: Option<String>,

    /// Replication factor for keyspaces created on demand
    pub replication_factor: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            hosts: vec![DEFAULT_HOST.to_string()],
            port: DEFAULT_PORT,
            keyspace: DEFAULT_KEYSPACE.to_string(),
            table: None,
            replication_factor: 1,
        }
    }
}

impl ConnectionConfig {
    /// Create a new configuration builder
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::default()
    }

    /// `$XDG_CONFIG_HOME/cqlmap/config.toml` or the platform equivalent.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cqlmap").join("config.toml"))
    }

    pub fn from_toml(text: &str) -> CqlResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> CqlResult<Self> {
        let path = path.as_ref();
        tracing::debug!("Loading connection config from {}", path.display());
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    /// Load the file at [`default_path`](Self::default_path), or the
    /// defaults when there is none.
    pub fn load_default() -> CqlResult<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> CqlResult<()> {
        if self.hosts.iter().all(|h| h.trim().is_empty()) {
            return Err(CqlError::Config("no hosts configured".to_string()));
        }
        if self.port == 0 {
            return Err(CqlError::Config("port must be non-zero".to_string()));
        }
        if self.keyspace.is_empty() {
            return Err(CqlError::Config("keyspace is empty".to_string()));
        }
        if self.replication_factor == 0 {
            return Err(CqlError::Config(
                "replication_factor must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Override settings with the options of a table comment.
    pub fn apply_table_options(&mut self, comment: &str) -> CqlResult<()> {
        let options = parse_table_options(comment)?;
        if let Some(hosts) = options.hosts {
            self.hosts = hosts;
        }
        if let Some(port) = options.port {
            self.port = port;
        }
        if let Some(keyspace) = options.keyspace {
            self.keyspace = keyspace;
        }
        if let Some(table) = options.table {
            self.table = Some(table);
        }
        Ok(())
    }

    /// `host:port` for each host.
    pub fn contact_points(&self) -> Vec<String> {
        self.hosts
            .iter()
            .map(|host| format!("{}:{}", host, self.port))
            .collect()
    }

    /// Where the relational table at `path` lives.
    pub fn table_ref(&self, path: &str) -> TableRef {
        match &self.table {
            Some(table) => TableRef::new(&self.keyspace, table),
            None => TableRef::from_path(&self.keyspace, path),
        }
    }
}

/// Builder for ConnectionConfig
#[derive(Debug, Default)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    /// Replace the contact points
    pub fn hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.config.keyspace = keyspace.into();
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.config.table = Some(table.into());
        self
    }

    pub fn replication_factor(mut self, factor: u32) -> Self {
        self.config.replication_factor = factor;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> CqlResult<ConnectionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Keyspace and table a relational table maps to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub keyspace: String,
    pub table: String,
}

impl TableRef {
    pub fn new(keyspace: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            table: table.into(),
        }
    }

    /// Take the table name from the last component of a `db/table` path.
    pub fn from_path(keyspace: impl Into<String>, path: &str) -> Self {
        let table = path.rsplit('/').next().unwrap_or(path);
        Self::new(keyspace, table)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.keyspace, self.table)
    }
}

/// Connection options found in a table comment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableOptions {
    pub hosts: Option<Vec<String>>,
    pub port: Option<u16>,
    pub keyspace: Option<String>,
    pub table: Option<String>,
}

/// Parse `key=value` pairs separated by `;`.
///
/// Entries without `=` and unknown keys are skipped; a port that is not a
/// number is an error.
pub fn parse_table_options(comment: &str) -> CqlResult<TableOptions> {
    let mut options = TableOptions::default();
    let entries = match comment_entries(comment) {
        Ok((_, entries)) => entries,
        Err(e) => return Err(CqlError::Config(format!("bad table comment: {}", e))),
    };

    for (key, value) in entries {
        let Some(value) = value.map(str::trim) else {
            continue;
        };
        match key.trim() {
            "scylla_hosts" => {
                let hosts: Vec<String> = value
                    .split(',')
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(String::from)
                    .collect();
                if !hosts.is_empty() {
                    options.hosts = Some(hosts);
                }
            }
            "scylla_keyspace" if !value.is_empty() => options.keyspace = Some(value.to_string()),
            "scylla_table" if !value.is_empty() => options.table = Some(value.to_string()),
            "scylla_port" => {
                let port = value
                    .parse::<u16>()
                    .map_err(|_| CqlError::Config(format!("invalid scylla_port '{}'", value)))?;
                options.port = Some(port);
            }
            other => tracing::debug!("Ignoring table comment entry '{}'", other),
        }
    }

    Ok(options)
}

fn comment_entries(input: &str) -> IResult<&str, Vec<(&str, Option<&str>)>> {
    separated_list0(
        char(';'),
        pair(
            take_while(|c| c != '=' && c != ';'),
            opt(preceded(char('='), take_while(|c| c != ';'))),
        ),
    )(input)
}
