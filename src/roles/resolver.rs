//! Role dependency resolution.
//!
//! Produces a single deterministic execution order in which every role
//! follows its dependencies, or reports the cycle / missing role that makes
//! ordering impossible. Traversal is an explicit-stack depth-first search in
//! lexicographic name order, so the result never depends on registration
//! order.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::roles::Role;
use crate::vars::{merge, Vars};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    InProgress,
    Resolved,
}

/// One DFS frame: a role and the cursor into its sorted dependency names.
struct Frame<'a> {
    role: &'a Role,
    deps: Vec<&'a str>,
    next: usize,
}

impl<'a> Frame<'a> {
    fn new(role: &'a Role) -> Self {
        let mut deps: Vec<&'a str> = role.dependencies.iter().map(|d| d.role.as_str()).collect();
        deps.sort_unstable();
        deps.dedup();
        Self {
            role,
            deps,
            next: 0,
        }
    }

    fn next_dep(&mut self) -> Option<&'a str> {
        let dep = self.deps.get(self.next).copied();
        self.next += 1;
        dep
    }
}

/// Variables and tags a role inherits from the dependency edges pointing at it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyBinding {
    /// Merged `vars` of every edge targeting the role
    pub vars: Vars,
    /// Union of `tags` of every edge targeting the role
    pub tags: Vec<String>,
}

/// Registry of roles with deterministic topological ordering.
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver {
    roles: BTreeMap<String, Role>,
}

impl DependencyResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resolver from a set of roles
    pub fn with_roles(roles: impl IntoIterator<Item = Role>) -> Self {
        let mut resolver = Self::new();
        for role in roles {
            resolver.add_role(role);
        }
        resolver
    }

    /// Register a role. A role with the same name is replaced.
    pub fn add_role(&mut self, role: Role) {
        if self.roles.contains_key(&role.name) {
            warn!("Role '{}' registered twice, keeping the latest", role.name);
        }
        self.roles.insert(role.name.clone(), role);
    }

    /// Get a registered role
    pub fn get(&self, name: &str) -> Option<&Role> {
        self.roles.get(name)
    }

    /// Number of registered roles
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Whether no roles are registered
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Order every registered role so each follows its dependencies.
    pub fn resolve(&self) -> Result<Vec<&Role>> {
        let mut states = HashMap::new();
        let mut order = Vec::with_capacity(self.roles.len());
        for role in self.roles.values() {
            self.visit(role, &mut states, &mut order)?;
        }
        debug!("Resolved {} roles", order.len());
        Ok(order)
    }

    /// Order the given roots and everything they transitively depend on.
    ///
    /// Roots are visited in the order given; each role appears once.
    pub fn resolve_from<'n>(&self, roots: impl IntoIterator<Item = &'n str>) -> Result<Vec<&Role>> {
        let mut states = HashMap::new();
        let mut order = Vec::new();
        for name in roots {
            let role = self
                .roles
                .get(name)
                .ok_or_else(|| Error::RoleNotFound(name.to_string()))?;
            self.visit(role, &mut states, &mut order)?;
        }
        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        root: &'a Role,
        states: &mut HashMap<&'a str, VisitState>,
        order: &mut Vec<&'a Role>,
    ) -> Result<()> {
        if states.contains_key(root.name.as_str()) {
            return Ok(());
        }

        states.insert(root.name.as_str(), VisitState::InProgress);
        let mut stack = vec![Frame::new(root)];

        while let Some(frame) = stack.last_mut() {
            let role: &'a Role = frame.role;
            match frame.next_dep() {
                Some(dep) => match states.get(dep) {
                    Some(VisitState::Resolved) => {}
                    Some(VisitState::InProgress) => {
                        return Err(Error::DependencyCycle(dep.to_string()));
                    }
                    None => {
                        let dep_role =
                            self.roles
                                .get(dep)
                                .ok_or_else(|| Error::MissingDependency {
                                    dependency: dep.to_string(),
                                    dependent: role.name.clone(),
                                })?;
                        states.insert(dep, VisitState::InProgress);
                        stack.push(Frame::new(dep_role));
                    }
                },
                None => {
                    stack.pop();
                    states.insert(role.name.as_str(), VisitState::Resolved);
                    order.push(role);
                }
            }
        }

        Ok(())
    }

    /// Declared dependencies of every registered role.
    pub fn dependency_graph(&self) -> BTreeMap<String, Vec<String>> {
        self.roles
            .values()
            .map(|role| {
                let deps = role.dependencies.iter().map(|d| d.role.clone()).collect();
                (role.name.clone(), deps)
            })
            .collect()
    }

    /// Names of roles that declare a dependency on `name`, sorted.
    pub fn dependents(&self, name: &str) -> Vec<String> {
        self.roles
            .values()
            .filter(|role| role.dependencies.iter().any(|d| d.role == name))
            .map(|role| role.name.clone())
            .collect()
    }

    /// Vars and tags each role receives from the edges among `resolved`.
    ///
    /// Edges are applied with dependents in name order, so the binding is
    /// deterministic when several roles depend on the same role.
    pub fn bindings(&self, resolved: &[&Role]) -> HashMap<String, DependencyBinding> {
        let mut dependents: Vec<&Role> = resolved.to_vec();
        dependents.sort_by(|a, b| a.name.cmp(&b.name));

        let mut bindings: HashMap<String, DependencyBinding> = HashMap::new();
        for dependent in dependents {
            for edge in &dependent.dependencies {
                let binding = bindings.entry(edge.role.clone()).or_default();
                binding.vars = merge(&[&binding.vars, &edge.vars]);
                for tag in &edge.tags {
                    if !binding.tags.contains(tag) {
                        binding.tags.push(tag.clone());
                    }
                }
            }
        }
        bindings
    }

    /// Render the registered graph in Graphviz DOT format.
    pub fn to_dot(&self) -> String {
        let mut output = String::new();
        output.push_str("digraph RoleDependencies {\n");
        output.push_str("    rankdir=LR;\n");
        output.push_str("    node [shape=ellipse];\n\n");

        for role in self.roles.values() {
            let _ = writeln!(output, "    \"{}\";", role.name);
        }
        output.push('\n');
        for role in self.roles.values() {
            for dep in &role.dependencies {
                let label = dep
                    .version
                    .as_deref()
                    .map(|v| format!(" [label=\"{}\"]", v))
                    .unwrap_or_default();
                let _ = writeln!(output, "    \"{}\" -> \"{}\"{};", role.name, dep.role, label);
            }
        }

        output.push_str("}\n");
        output
    }
}
