use std::fmt::{Display, Formatter};
use std::str::FromStr;

use caregrid_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Namespaced permission name of the form `resource.action`.
///
/// Names are globally unique and act as the natural key for permission
/// definitions. Segments are lowercase `[a-z0-9_]` joined by `.`, with at
/// least a resource and an action segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionName(String);

impl PermissionName {
    /// Creates a validated permission name.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let segments: Vec<&str> = value.split('.').collect();

        if segments.len() < 2 {
            return Err(AppError::Validation(format!(
                "permission name '{value}' must be namespaced as 'resource.action'"
            )));
        }

        for segment in &segments {
            if segment.is_empty()
                || !segment
                    .chars()
                    .all(|character| character.is_ascii_lowercase() || character.is_ascii_digit() || character == '_')
            {
                return Err(AppError::Validation(format!(
                    "permission name '{value}' contains invalid segment '{segment}'"
                )));
            }
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the resource portion, everything before the action segment.
    #[must_use]
    pub fn resource(&self) -> &str {
        self.0.rsplit_once('.').map_or("", |(resource, _)| resource)
    }

    /// Returns the trailing action segment.
    #[must_use]
    pub fn action(&self) -> &str {
        self.0.rsplit_once('.').map_or("", |(_, action)| action)
    }
}

impl Display for PermissionName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl FromStr for PermissionName {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

/// Access level granted by a per-resource ACL entry.
///
/// Levels are ordered: `Admin` satisfies a `Write` requirement, `Write`
/// satisfies `Read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// Read-only access.
    Read,
    /// Read and mutate access.
    Write,
    /// Full control including destructive operations.
    Admin,
}

impl AccessLevel {
    /// Returns a stable storage value for this level.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Admin => "admin",
        }
    }

    /// Returns the minimum level required to perform an action.
    ///
    /// Unrecognized actions require `Admin` so the resource fallback stays
    /// closed for verbs this core does not know.
    #[must_use]
    pub fn required_for_action(action: &str) -> Self {
        match action {
            "read" | "view" | "list" => Self::Read,
            "create" | "update" | "write" => Self::Write,
            _ => Self::Admin,
        }
    }
}

impl FromStr for AccessLevel {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "admin" => Ok(Self::Admin),
            _ => Err(AppError::Validation(format!(
                "unknown access level value '{value}'"
            ))),
        }
    }
}

/// Permission definition registered in the catalog.
///
/// Immutable once registered; `name` is the natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDefinition {
    /// Globally unique namespaced name.
    pub name: PermissionName,
    /// Resource portion of the name.
    pub resource: String,
    /// Action portion of the name.
    pub action: String,
    /// Display grouping for administrative listings.
    pub category: String,
    /// Display ordering tie-breaker inside a category.
    pub priority: i32,
    /// Names of permissions this one depends on.
    pub depends_on: Vec<PermissionName>,
    /// Indicates a platform-managed definition.
    pub is_system: bool,
    /// Indicates the definition is currently grantable.
    pub is_active: bool,
}

impl PermissionDefinition {
    /// Creates an active, dependency-free definition from a validated name.
    #[must_use]
    pub fn new(name: PermissionName, category: impl Into<String>, priority: i32) -> Self {
        let resource = name.resource().to_owned();
        let action = name.action().to_owned();
        Self {
            name,
            resource,
            action,
            category: category.into(),
            priority,
            depends_on: Vec::new(),
            is_system: false,
            is_active: true,
        }
    }

    /// Attaches dependency names to the definition.
    #[must_use]
    pub fn with_dependencies(mut self, depends_on: Vec<PermissionName>) -> Self {
        self.depends_on = depends_on;
        self
    }
}
