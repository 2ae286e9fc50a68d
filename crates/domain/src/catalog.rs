use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use caregrid_core::{AppError, AppResult};

use crate::permission::{PermissionDefinition, PermissionName};

/// Registry of permission definitions and their dependency graph.
///
/// Built during startup and read-only afterwards. Registration rejects
/// duplicate names and dependency cycles; reads are side-effect free.
#[derive(Debug, Default)]
pub struct PermissionCatalog {
    definitions: BTreeMap<PermissionName, PermissionDefinition>,
}

impl PermissionCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a permission definition.
    ///
    /// Dependencies may reference names that are not registered yet; a cycle
    /// among registered definitions is rejected at this point, before the
    /// catalog is ever consulted for a decision.
    pub fn register(&mut self, definition: PermissionDefinition) -> AppResult<()> {
        let name = definition.name.clone();
        match self.definitions.entry(name.clone()) {
            Entry::Occupied(_) => {
                return Err(AppError::Conflict(format!(
                    "permission '{name}' is already registered"
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(definition);
            }
        }

        if let Some(cycle_member) = self.find_cycle_from(&name) {
            self.definitions.remove(&name);
            return Err(AppError::Configuration(format!(
                "permission '{name}' introduces a dependency cycle through '{cycle_member}'"
            )));
        }

        Ok(())
    }

    /// Returns the definition registered under a name.
    #[must_use]
    pub fn get(&self, name: &PermissionName) -> Option<&PermissionDefinition> {
        self.definitions.get(name)
    }

    /// Returns definitions in a category, ordered by priority then name.
    ///
    /// Priority only breaks display ordering ties; it has no effect on
    /// authorization decisions.
    #[must_use]
    pub fn list_by_category(&self, category: &str) -> Vec<&PermissionDefinition> {
        let mut definitions: Vec<&PermissionDefinition> = self
            .definitions
            .values()
            .filter(|definition| definition.category == category)
            .collect();
        definitions.sort_by(|left, right| {
            left.priority
                .cmp(&right.priority)
                .then_with(|| left.name.cmp(&right.name))
        });
        definitions
    }

    /// Returns the transitive dependency closure of a permission.
    ///
    /// The result is ordered by name and excludes the permission itself. A
    /// dependency on an unregistered name fails with a configuration error.
    pub fn resolve_dependencies(
        &self,
        name: &PermissionName,
    ) -> AppResult<Vec<PermissionDefinition>> {
        let root = self.definitions.get(name).ok_or_else(|| {
            AppError::NotFound(format!("permission '{name}' is not registered"))
        })?;

        let mut closure: BTreeSet<PermissionName> = BTreeSet::new();
        let mut pending: Vec<PermissionName> = root.depends_on.clone();

        while let Some(dependency_name) = pending.pop() {
            if dependency_name == *name || !closure.insert(dependency_name.clone()) {
                continue;
            }

            let dependency = self.definitions.get(&dependency_name).ok_or_else(|| {
                AppError::Configuration(format!(
                    "permission '{name}' depends on unregistered permission '{dependency_name}'"
                ))
            })?;
            pending.extend(dependency.depends_on.iter().cloned());
        }

        Ok(closure
            .into_iter()
            .filter_map(|dependency_name| self.definitions.get(&dependency_name).cloned())
            .collect())
    }

    /// Returns the number of registered definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns whether the catalog holds no definitions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Depth-first search over registered definitions starting at `origin`.
    ///
    /// Edges to unregistered names cannot close a cycle and are skipped; they
    /// are re-examined when the missing definition registers.
    fn find_cycle_from(&self, origin: &PermissionName) -> Option<PermissionName> {
        let mut visited: BTreeSet<PermissionName> = BTreeSet::new();
        let mut on_path: BTreeSet<PermissionName> = BTreeSet::new();
        self.visit(origin, &mut visited, &mut on_path)
    }

    fn visit(
        &self,
        name: &PermissionName,
        visited: &mut BTreeSet<PermissionName>,
        on_path: &mut BTreeSet<PermissionName>,
    ) -> Option<PermissionName> {
        if on_path.contains(name) {
            return Some(name.clone());
        }
        if !visited.insert(name.clone()) {
            return None;
        }

        let Some(definition) = self.definitions.get(name) else {
            return None;
        };

        on_path.insert(name.clone());
        for dependency in &definition.depends_on {
            if let Some(cycle_member) = self.visit(dependency, visited, on_path) {
                return Some(cycle_member);
            }
        }
        on_path.remove(name);

        None
    }
}
