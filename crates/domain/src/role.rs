use std::collections::{BTreeSet, HashMap, HashSet};

use caregrid_core::{AppError, AppResult, OrgId, RoleId};
use serde::{Deserialize, Serialize};

use crate::permission::PermissionName;

/// Closed classification of a role.
///
/// System roles bypass granular permission checks entirely; the distinction
/// is a variant, not a flag, so every consumer has to handle both arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    /// Ordinary role carrying an explicit permission set.
    Regular,
    /// Platform role granting every permission.
    System,
}

/// Role definition row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Stable role identifier.
    pub id: RoleId,
    /// Role name, unique inside its organization.
    pub name: String,
    /// Owning organization; `None` marks a global role.
    pub organization_id: Option<OrgId>,
    /// Role classification.
    pub kind: RoleKind,
}

/// Effective permission collection carried by a snapshot.
///
/// `All` is the system-role sentinel: membership checks succeed in O(1)
/// without enumerating a concrete set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "names")]
pub enum PermissionSet {
    /// Every permission, granted through a system role.
    All,
    /// An explicit set of permission names.
    Named(BTreeSet<PermissionName>),
}

impl PermissionSet {
    /// Creates an empty named set.
    #[must_use]
    pub fn empty() -> Self {
        Self::Named(BTreeSet::new())
    }

    /// Returns whether the set contains a permission name.
    #[must_use]
    pub fn contains(&self, name: &PermissionName) -> bool {
        match self {
            Self::All => true,
            Self::Named(names) => names.contains(name),
        }
    }

    /// Returns whether this is the system-role sentinel.
    #[must_use]
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Folds another set into this one; `All` absorbs everything.
    pub fn union_with(&mut self, other: Self) {
        match (&mut *self, other) {
            (Self::All, _) => {}
            (_, Self::All) => *self = Self::All,
            (Self::Named(names), Self::Named(other_names)) => {
                names.extend(other_names);
            }
        }
    }

    /// Removes revoked names from an explicit set; the sentinel is kept as
    /// is and revokes against it are enforced at check time.
    pub fn subtract(&mut self, revoked: &BTreeSet<PermissionName>) {
        if let Self::Named(names) = self {
            names.retain(|name| !revoked.contains(name));
        }
    }
}

/// A role together with its inheritance links and attached permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGraphNode {
    /// The role definition.
    pub role: Role,
    /// Roles this role inherits from.
    pub parents: Vec<RoleId>,
    /// Permissions attached directly to this role.
    pub permissions: BTreeSet<PermissionName>,
}

/// Inheritance graph loaded for one resolution pass.
///
/// Holds the transitive closure of every role reachable from the roles a
/// user is assigned to, so expansion never goes back to the store.
#[derive(Debug, Clone, Default)]
pub struct RoleGraph {
    nodes: HashMap<RoleId, RoleGraphNode>,
}

impl RoleGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a node, replacing any previous node for the same role.
    pub fn insert(&mut self, node: RoleGraphNode) {
        self.nodes.insert(node.role.id, node);
    }

    /// Returns the node registered for a role.
    #[must_use]
    pub fn get(&self, role_id: RoleId) -> Option<&RoleGraphNode> {
        self.nodes.get(&role_id)
    }

    /// Returns the number of nodes in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns whether the graph holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Expands a role into its full permission set.
    ///
    /// The union covers the role and all ancestors. Diamond inheritance is
    /// legal; an inheritance cycle fails fast with a configuration error. A
    /// system role anywhere on the path short-circuits to the sentinel.
    pub fn expand(&self, role_id: RoleId) -> AppResult<PermissionSet> {
        let mut permissions: BTreeSet<PermissionName> = BTreeSet::new();
        let mut visited: HashSet<RoleId> = HashSet::new();
        let mut on_path: HashSet<RoleId> = HashSet::new();

        if self.expand_into(role_id, &mut permissions, &mut visited, &mut on_path)? {
            return Ok(PermissionSet::All);
        }

        Ok(PermissionSet::Named(permissions))
    }

    fn expand_into(
        &self,
        role_id: RoleId,
        permissions: &mut BTreeSet<PermissionName>,
        visited: &mut HashSet<RoleId>,
        on_path: &mut HashSet<RoleId>,
    ) -> AppResult<bool> {
        if on_path.contains(&role_id) {
            return Err(AppError::Configuration(format!(
                "role inheritance cycle through role '{role_id}'"
            )));
        }
        if !visited.insert(role_id) {
            // already expanded through another branch of a diamond
            return Ok(false);
        }

        let node = self.nodes.get(&role_id).ok_or_else(|| {
            AppError::NotFound(format!("role '{role_id}' is missing from the loaded graph"))
        })?;

        if node.role.kind == RoleKind::System {
            return Ok(true);
        }

        permissions.extend(node.permissions.iter().cloned());

        on_path.insert(role_id);
        for parent in &node.parents {
            if self.expand_into(*parent, permissions, visited, on_path)? {
                on_path.remove(&role_id);
                return Ok(true);
            }
        }
        on_path.remove(&role_id);

        Ok(false)
    }
}
