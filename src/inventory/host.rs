//! Host definition for the Choreo inventory.
//!
//! A `Host` is the managed node a task targets: its name (identity), the
//! address to connect to, connection parameters, and a variable bag.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::vars::Vars;

/// Connection type for a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    /// SSH connection (default)
    #[default]
    Ssh,
    /// Local execution on the control node
    Local,
    /// Container connection
    Docker,
}

impl std::fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionType::Ssh => write!(f, "ssh"),
            ConnectionType::Local => write!(f, "local"),
            ConnectionType::Docker => write!(f, "docker"),
        }
    }
}

/// Connection parameters for a host
///
/// Carried for the runner; the orchestration core never opens a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// Connection type
    #[serde(default)]
    pub connection: ConnectionType,

    /// Port (default: 22)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Remote user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Connect timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u32,
}

fn default_port() -> u16 {
    22
}

fn default_timeout() -> u32 {
    10
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            connection: ConnectionType::default(),
            port: default_port(),
            user: None,
            timeout: default_timeout(),
        }
    }
}

/// A managed host in the inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    /// Host name; identity within a resolved host set (case-sensitive)
    pub name: String,

    /// Hostname or IP to connect to (if different from name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Connection parameters
    #[serde(flatten)]
    pub connection: ConnectionParams,

    /// Host-specific variables
    #[serde(default)]
    pub vars: Vars,
}

impl Host {
    /// Create a new host with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
            connection: ConnectionParams::default(),
            vars: Vars::new(),
        }
    }

    /// Set the address to connect to
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Set a host variable
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// The address to connect to, falling back to the name
    pub fn address(&self) -> &str {
        self.address.as_deref().unwrap_or(&self.name)
    }
}

impl std::fmt::Display for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl From<&str> for Host {
    fn from(name: &str) -> Self {
        Host::new(name)
    }
}
