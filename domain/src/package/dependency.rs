//! Package dependency graph.
//!
//! Each package ID maps to the ordered, de-duplicated list of names it included as
//! shared libraries during its own load. Entries are committed once per load and
//! are rejected if they would close a cycle.

use super::package_id::PackageId;
use crate::core::error::DomainError;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: BTreeMap<String, Vec<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit the dependency list recorded while `package` was loading.
    ///
    /// Duplicates are dropped keeping first-seen order. A later commit for the same
    /// package replaces the earlier one. Fails without mutating the graph when the
    /// new edges would create a cycle.
    pub fn register(
        &mut self,
        package: &PackageId,
        dependencies: impl IntoIterator<Item = String>,
    ) -> Result<&[String], DomainError> {
        let mut seen = HashSet::new();
        let deps: Vec<String> = dependencies
            .into_iter()
            .filter(|d| seen.insert(d.clone()))
            .collect();

        let root = package.as_str();
        for dep in &deps {
            if let Some(mut path) = self.path_between(dep, root) {
                path.insert(0, root.to_string());
                return Err(DomainError::DependencyCycle { cycle: path });
            }
        }

        let slot = self.edges.entry(root.to_string()).or_default();
        *slot = deps;
        Ok(slot.as_slice())
    }

    /// Declared dependencies of `package`, or `None` when it never registered any.
    pub fn dependencies_of(&self, package: &str) -> Option<&[String]> {
        self.edges.get(package).map(Vec::as_slice)
    }

    /// Packages that list `name` as a direct dependency.
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|(_, deps)| deps.iter().any(|d| d == name))
            .map(|(pkg, _)| pkg.as_str())
            .collect()
    }

    pub fn packages(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.edges.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Order in which packages can be initialised so that dependencies come first.
    ///
    /// Names that only ever appear as dependencies are included as leaves.
    pub fn load_order(&self) -> Vec<String> {
        fn visit(
            graph: &DependencyGraph,
            name: &str,
            done: &mut HashSet<String>,
            out: &mut Vec<String>,
        ) {
            if !done.insert(name.to_string()) {
                return;
            }
            for dep in graph.dependencies_of(name).unwrap_or(&[]) {
                visit(graph, dep, done, out);
            }
            out.push(name.to_string());
        }

        let mut done = HashSet::new();
        let mut out = Vec::new();
        for name in self.edges.keys() {
            visit(self, name, &mut done, &mut out);
        }
        out
    }

    /// Depth-first search for a path `from -> ... -> to` through committed edges.
    fn path_between(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let mut stack = vec![(from.to_string(), vec![from.to_string()])];
        let mut visited = HashSet::new();

        while let Some((node, path)) = stack.pop() {
            if node == to {
                return Some(path);
            }
            if !visited.insert(node.clone()) {
                continue;
            }
            for next in self.dependencies_of(&node).unwrap_or(&[]) {
                let mut next_path = path.clone();
                next_path.push(next.clone());
                stack.push((next.clone(), next_path));
            }
        }
        None
    }
}
