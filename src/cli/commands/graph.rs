//! Graph command - show role ordering

use std::path::PathBuf;

use anyhow::{Context, Result};
use choreo::roles::{DependencyResolver, Role};
use clap::Parser;

use super::CommandContext;

/// Arguments for the graph command
#[derive(Parser, Debug, Clone)]
pub struct GraphArgs {
    /// YAML file holding a list of roles
    #[arg(required = true)]
    pub roles: PathBuf,

    /// Print a Graphviz DOT graph instead of the resolved order
    #[arg(long)]
    pub dot: bool,
}

impl GraphArgs {
    /// Execute the graph command
    pub async fn execute(&self, _ctx: &mut CommandContext) -> Result<i32> {
        let roles = Role::load_all(&self.roles)
            .with_context(|| format!("Failed to load roles: {}", self.roles.display()))?;
        let resolver = DependencyResolver::with_roles(roles);

        if self.dot {
            print!("{}", resolver.to_dot());
            return Ok(0);
        }

        match resolver.resolve() {
            Ok(order) => {
                for (index, role) in order.iter().enumerate() {
                    println!("{:>3}. {}", index + 1, role.name);
                }
                Ok(0)
            }
            Err(e) => {
                eprintln!("ERROR: {}", e);
                Ok(e.exit_code())
            }
        }
    }
}
