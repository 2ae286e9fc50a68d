use std::str::FromStr;

use caregrid_core::{AppError, DepartmentId, OrgId, OrgScope, RoleId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::permission::{AccessLevel, PermissionName};

/// Returns whether an instant falls inside a half-open validity window.
///
/// The upper bound is exclusive: a row with `valid_until == now` is already
/// expired.
fn window_contains(
    valid_from: DateTime<Utc>,
    valid_until: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    valid_from <= now && valid_until.is_none_or(|until| now < until)
}

/// Assignment of a role to a user, bounded in time and scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// Assigned user.
    pub user_id: UserId,
    /// Assigned role.
    pub role_id: RoleId,
    /// Organization the assignment applies in; `None` is globally scoped.
    pub organization_id: Option<OrgId>,
    /// Optional department restriction inside the organization.
    pub department_id: Option<DepartmentId>,
    /// Start of the validity window.
    pub valid_from: DateTime<Utc>,
    /// Exclusive end of the validity window, open-ended when `None`.
    pub valid_until: Option<DateTime<Utc>>,
    /// Administrative active flag.
    pub is_active: bool,
}

impl RoleAssignment {
    /// Returns whether the assignment is effective at an instant.
    ///
    /// Both the active flag and the validity window must hold.
    #[must_use]
    pub fn is_effective_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && window_contains(self.valid_from, self.valid_until, now)
    }

    /// Returns whether the assignment contributes under a requested scope.
    ///
    /// Without a scope every assignment contributes. Under a scope, globally
    /// scoped assignments always match; organization-bound assignments must
    /// match the organization, and a department-bound assignment must match
    /// the scope's department when one is requested. A mismatch is "not
    /// granted", never an error.
    #[must_use]
    pub fn matches_scope(&self, scope: Option<&OrgScope>) -> bool {
        let Some(scope) = scope else {
            return true;
        };
        let Some(organization_id) = self.organization_id else {
            return true;
        };
        if organization_id != scope.organization_id {
            return false;
        }

        match (self.department_id, scope.department_id) {
            (Some(assignment_department), Some(scope_department)) => {
                assignment_department == scope_department
            }
            _ => true,
        }
    }
}

/// Direction of a direct permission override.
///
/// Grant and revoke are distinct variants rather than two meanings of one
/// flag; a revoke always wins over role- or grant-derived access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideAction {
    /// Adds the named permission for the user.
    Grant,
    /// Removes the named permission regardless of any other source.
    Revoke,
}

impl OverrideAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grant => "grant",
            Self::Revoke => "revoke",
        }
    }
}

impl FromStr for OverrideAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "grant" => Ok(Self::Grant),
            "revoke" => Ok(Self::Revoke),
            _ => Err(AppError::Validation(format!(
                "unknown override action value '{value}'"
            ))),
        }
    }
}

/// Direct user-level permission override, bounded in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverride {
    /// Overridden user.
    pub user_id: UserId,
    /// Permission the override targets.
    pub permission_name: PermissionName,
    /// Grant or revoke.
    pub action: OverrideAction,
    /// Start of the validity window.
    pub valid_from: DateTime<Utc>,
    /// Exclusive end of the validity window, open-ended when `None`.
    pub valid_until: Option<DateTime<Utc>>,
    /// Administrator who created the override.
    pub granted_by: UserId,
    /// Free-form justification captured at creation.
    pub notes: Option<String>,
}

impl PermissionOverride {
    /// Returns whether the override is effective at an instant.
    #[must_use]
    pub fn is_effective_at(&self, now: DateTime<Utc>) -> bool {
        window_contains(self.valid_from, self.valid_until, now)
    }
}

/// Per-object access grant, independent of the role hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceAccessGrant {
    /// Granted user.
    pub user_id: UserId,
    /// Resource type discriminator, e.g. `"device"`.
    pub resource_type: String,
    /// Identifier of the concrete resource instance.
    pub resource_id: String,
    /// Granted access level.
    pub access_level: AccessLevel,
}

impl ResourceAccessGrant {
    /// Returns whether this grant satisfies a minimum level on a resource.
    #[must_use]
    pub fn covers(&self, resource_type: &str, resource_id: &str, minimum: AccessLevel) -> bool {
        self.resource_type == resource_type
            && self.resource_id == resource_id
            && self.access_level >= minimum
    }
}

#[cfg(test)]
mod tests {
    use caregrid_core::{DepartmentId, OrgId, OrgScope, RoleId, UserId};
    use chrono::{Duration, Utc};
    use proptest::prelude::*;

    use super::{OverrideAction, PermissionOverride, ResourceAccessGrant, RoleAssignment};
    use crate::permission::{AccessLevel, PermissionName};

    fn assignment() -> RoleAssignment {
        RoleAssignment {
            user_id: UserId::new(),
            role_id: RoleId::new(),
            organization_id: None,
            department_id: None,
            valid_from: Utc::now() - Duration::hours(1),
            valid_until: None,
            is_active: true,
        }
    }

    #[test]
    fn expired_assignment_contributes_nothing() {
        let now = Utc::now();
        let mut expired = assignment();
        expired.valid_until = Some(now - Duration::seconds(1));
        assert!(!expired.is_effective_at(now));
    }

    #[test]
    fn future_expiry_contributes_fully() {
        let now = Utc::now();
        let mut active = assignment();
        active.valid_until = Some(now + Duration::hours(1));
        assert!(active.is_effective_at(now));
    }

    #[test]
    fn boundary_instant_is_exclusive() {
        let now = Utc::now();
        let mut boundary = assignment();
        boundary.valid_until = Some(now);
        assert!(!boundary.is_effective_at(now));
    }

    #[test]
    fn inactive_flag_wins_over_open_window() {
        let now = Utc::now();
        let mut inactive = assignment();
        inactive.is_active = false;
        assert!(!inactive.is_effective_at(now));
    }

    #[test]
    fn global_assignment_matches_any_scope() {
        let scope = OrgScope {
            organization_id: OrgId::new(),
            department_id: None,
        };
        assert!(assignment().matches_scope(Some(&scope)));
        assert!(assignment().matches_scope(None));
    }

    #[test]
    fn org_bound_assignment_requires_matching_org() {
        let organization_id = OrgId::new();
        let mut bound = assignment();
        bound.organization_id = Some(organization_id);

        let matching = OrgScope {
            organization_id,
            department_id: None,
        };
        let other = OrgScope {
            organization_id: OrgId::new(),
            department_id: None,
        };
        assert!(bound.matches_scope(Some(&matching)));
        assert!(!bound.matches_scope(Some(&other)));
    }

    #[test]
    fn department_mismatch_is_filtered() {
        let organization_id = OrgId::new();
        let department_id = DepartmentId::new();
        let mut bound = assignment();
        bound.organization_id = Some(organization_id);
        bound.department_id = Some(department_id);

        let same_department = OrgScope {
            organization_id,
            department_id: Some(department_id),
        };
        let other_department = OrgScope {
            organization_id,
            department_id: Some(DepartmentId::new()),
        };
        let no_department_filter = OrgScope {
            organization_id,
            department_id: None,
        };
        assert!(bound.matches_scope(Some(&same_department)));
        assert!(!bound.matches_scope(Some(&other_department)));
        assert!(bound.matches_scope(Some(&no_department_filter)));
    }

    #[test]
    fn override_window_is_half_open() {
        let now = Utc::now();
        let Ok(permission_name) = PermissionName::new("device.update") else {
            panic!("invalid permission name in test fixture");
        };
        let mut entry = PermissionOverride {
            user_id: UserId::new(),
            permission_name,
            action: OverrideAction::Grant,
            valid_from: now,
            valid_until: Some(now + Duration::hours(1)),
            granted_by: UserId::new(),
            notes: None,
        };
        assert!(entry.is_effective_at(now));
        entry.valid_from = now + Duration::seconds(1);
        assert!(!entry.is_effective_at(now));
    }

    #[test]
    fn resource_grant_covers_equal_or_higher_levels() {
        let grant = ResourceAccessGrant {
            user_id: UserId::new(),
            resource_type: "device".to_owned(),
            resource_id: "pump-7".to_owned(),
            access_level: AccessLevel::Write,
        };
        assert!(grant.covers("device", "pump-7", AccessLevel::Read));
        assert!(grant.covers("device", "pump-7", AccessLevel::Write));
        assert!(!grant.covers("device", "pump-7", AccessLevel::Admin));
        assert!(!grant.covers("device", "pump-8", AccessLevel::Read));
        assert!(!grant.covers("bed", "pump-7", AccessLevel::Read));
    }

    proptest! {
        #[test]
        fn window_membership_is_consistent(offset_seconds in -86_400i64..86_400i64) {
            let now = Utc::now();
            let mut entry = assignment();
            entry.valid_from = now - Duration::hours(12);
            entry.valid_until = Some(now + Duration::seconds(offset_seconds));

            let effective = entry.is_effective_at(now);
            prop_assert_eq!(effective, offset_seconds > 0);
        }
    }
}
