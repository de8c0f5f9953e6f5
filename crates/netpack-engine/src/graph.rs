//! Module dependency graph
//!
//! Tracks dependencies between modules and provides:
//! - Execution order for linking
//! - Cycle reporting
//!
//! Cycles are legal. The order is a depth-first post-order, so a module in
//! a cycle runs before the importer that closed it, as ES module evaluation
//! does.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::plugin::Domain;

/// Index of a module in the graph
pub type ModuleId = usize;

/// Identity of a module: the same path in two domains is two modules
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleKey {
    pub domain: Domain,
    pub path: String,
}

impl ModuleKey {
    pub fn new(domain: Domain, path: impl Into<String>) -> Self {
        Self {
            domain,
            path: path.into(),
        }
    }
}

/// A node in the module graph
#[derive(Debug, Clone)]
struct ModuleNode {
    key: ModuleKey,
    /// Modules this module imports, in source order
    imports: Vec<ModuleId>,
}

/// Result of one depth-first walk
struct Walk {
    order: Vec<ModuleId>,
    cycles: Vec<Vec<ModuleId>>,
}

/// Module dependency graph
#[derive(Debug, Default)]
pub struct ModuleGraph {
    nodes: Vec<ModuleNode>,
    index: FxHashMap<ModuleKey, ModuleId>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module, returning its id and whether it was new
    pub fn add_module(&mut self, key: ModuleKey) -> (ModuleId, bool) {
        if let Some(&id) = self.index.get(&key) {
            return (id, false);
        }
        let id = self.nodes.len();
        self.index.insert(key.clone(), id);
        self.nodes.push(ModuleNode {
            key,
            imports: Vec::new(),
        });
        (id, true)
    }

    /// Add a dependency edge (from imports to)
    pub fn add_dependency(&mut self, from: ModuleId, to: ModuleId) {
        if !self.nodes[from].imports.contains(&to) {
            self.nodes[from].imports.push(to);
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Modules reachable from `root`, dependencies first and `root` last
    ///
    /// Siblings keep their import order, so the result is stable for a
    /// given set of sources. An edge that closes a cycle is skipped.
    pub fn topological_order(&self, root: ModuleId) -> Vec<ModuleId> {
        self.walk(root).order
    }

    /// Import cycles reachable from `root`, each as the paths along it with
    /// the first module repeated at the end
    pub fn cycles(&self, root: ModuleId) -> Vec<Vec<String>> {
        self.walk(root)
            .cycles
            .into_iter()
            .map(|cycle| cycle.iter().map(|&id| self.nodes[id].key.path.clone()).collect())
            .collect()
    }

    fn walk(&self, root: ModuleId) -> Walk {
        let mut walk = Walk {
            order: Vec::with_capacity(self.nodes.len()),
            cycles: Vec::new(),
        };
        let mut visited = FxHashSet::default();
        let mut path = Vec::new();
        if root < self.nodes.len() {
            self.visit(root, &mut visited, &mut path, &mut walk);
        }
        walk
    }

    fn visit(
        &self,
        id: ModuleId,
        visited: &mut FxHashSet<ModuleId>,
        path: &mut Vec<ModuleId>,
        walk: &mut Walk,
    ) {
        if let Some(start) = path.iter().position(|&p| p == id) {
            let mut cycle = path[start..].to_vec();
            cycle.push(id);
            walk.cycles.push(cycle);
            return;
        }
        if !visited.insert(id) {
            return;
        }

        path.push(id);
        for &dep in &self.nodes[id].imports {
            self.visit(dep, visited, path, walk);
        }
        path.pop();

        walk.order.push(id);
    }
}
