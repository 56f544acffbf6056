//! Inventory for Choreo.
//!
//! The orchestration core only consumes the [`Inventory`] contract. This
//! module ships [`StaticInventory`], an in-memory host/group store that can
//! be loaded from YAML:
//!
//! ```yaml
//! hosts:
//!   - name: web1
//!     address: 10.0.0.1
//!   - name: db1
//! groups:
//!   web:
//!     hosts: [web1]
//!   prod:
//!     children: [web]
//!     hosts: [db1]
//! ```

pub mod host;

use std::collections::HashSet;
use std::path::Path;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::Inventory;

pub use host::{ConnectionParams, ConnectionType, Host};

/// A named group of hosts, possibly nesting other groups
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Direct member host names
    #[serde(default)]
    pub hosts: Vec<String>,
    /// Child group names
    #[serde(default)]
    pub children: Vec<String>,
}

#[derive(Deserialize)]
struct InventoryFile {
    #[serde(default)]
    hosts: Vec<Host>,
    #[serde(default)]
    groups: IndexMap<String, Group>,
}

/// In-memory inventory of hosts and groups
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    hosts: IndexMap<String, Host>,
    groups: IndexMap<String, Group>,
}

impl StaticInventory {
    /// Create an empty inventory
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an inventory from hosts alone (no groups)
    pub fn from_hosts(hosts: impl IntoIterator<Item = Host>) -> Self {
        let mut inventory = Self::new();
        for host in hosts {
            inventory.add_host(host);
        }
        inventory
    }

    /// Parse an inventory document from YAML
    pub fn from_yaml(content: &str) -> Result<Self> {
        let file: InventoryFile = serde_yaml::from_str(content)?;
        let mut inventory = Self::from_hosts(file.hosts);
        for (name, group) in file.groups {
            inventory.add_group(name, group);
        }
        Ok(inventory)
    }

    /// Load an inventory from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::InventoryLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&content).map_err(|e| Error::InventoryLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Add a host; a host with the same name is replaced in place
    pub fn add_host(&mut self, host: Host) {
        self.hosts.insert(host.name.clone(), host);
    }

    /// Add or replace a group
    pub fn add_group(&mut self, name: impl Into<String>, group: Group) {
        self.groups.insert(name.into(), group);
    }

    /// Number of hosts
    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Hosts in a group and its children, in declaration order without repeats
    fn group_hosts(&self, name: &str) -> Vec<&Host> {
        let mut seen = HashSet::new();
        let mut visited_groups = HashSet::new();
        let mut out = Vec::new();
        let mut stack = vec![name];

        while let Some(group_name) = stack.pop() {
            if !visited_groups.insert(group_name) {
                continue;
            }
            let Some(group) = self.groups.get(group_name) else {
                continue;
            };
            for host_name in &group.hosts {
                if let Some(host) = self.hosts.get(host_name) {
                    if seen.insert(host_name.as_str()) {
                        out.push(host);
                    }
                }
            }
            // reverse so children are expanded in declaration order
            stack.extend(group.children.iter().rev().map(String::as_str));
        }
        out
    }

    fn match_pattern(&self, pattern: &str) -> Result<Vec<&Host>> {
        let pattern = pattern.trim();

        if pattern == "all" || pattern == "*" {
            return Ok(self.hosts.values().collect());
        }

        if let Some(expr) = pattern.strip_prefix('~') {
            let regex = Regex::new(expr).map_err(|e| Error::InventoryPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
            return Ok(self
                .hosts
                .values()
                .filter(|h| regex.is_match(&h.name))
                .collect());
        }

        if self.groups.contains_key(pattern) {
            return Ok(self.group_hosts(pattern));
        }

        if let Some(host) = self.hosts.get(pattern) {
            return Ok(vec![host]);
        }

        Err(Error::InventoryPattern {
            pattern: pattern.to_string(),
            message: "no hosts matched".to_string(),
        })
    }
}

impl Inventory for StaticInventory {
    fn get_hosts(&self, pattern: &str) -> Result<Vec<Host>> {
        let hosts = self.match_pattern(pattern)?;
        debug!("Pattern '{}' matched {} hosts", pattern, hosts.len());
        Ok(hosts.into_iter().cloned().collect())
    }

    fn get_host(&self, name: &str) -> Result<Host> {
        self.hosts
            .get(name)
            .cloned()
            .ok_or_else(|| Error::HostNotFound(name.to_string()))
    }
}
