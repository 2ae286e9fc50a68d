use serde::{Deserialize, Serialize};

use crate::{DepartmentId, OrgId, UserId};

/// User information supplied by the identity provider after verification.
///
/// Trusted as-is; the authorization core never re-checks these claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    user_id: UserId,
    organization_id: Option<OrgId>,
    department_id: Option<DepartmentId>,
}

impl UserIdentity {
    /// Creates a user identity from authentication claims.
    #[must_use]
    pub fn new(
        user_id: UserId,
        organization_id: Option<OrgId>,
        department_id: Option<DepartmentId>,
    ) -> Self {
        Self {
            user_id,
            organization_id,
            department_id,
        }
    }

    /// Returns the stable user identifier.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the organization claim, if the provider returned one.
    #[must_use]
    pub fn organization_id(&self) -> Option<OrgId> {
        self.organization_id
    }

    /// Returns the department claim, if the provider returned one.
    #[must_use]
    pub fn department_id(&self) -> Option<DepartmentId> {
        self.department_id
    }

    /// Returns the organization scope carried by this identity.
    ///
    /// `None` when the identity carries no organization claim; such requests
    /// are evaluated unscoped and see every assignment.
    #[must_use]
    pub fn org_scope(&self) -> Option<OrgScope> {
        self.organization_id.map(|organization_id| OrgScope {
            organization_id,
            department_id: self.department_id,
        })
    }
}

/// Organization context restricting which role assignments contribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrgScope {
    /// Organization the request is evaluated in.
    pub organization_id: OrgId,
    /// Optional department filter inside the organization.
    pub department_id: Option<DepartmentId>,
}

#[cfg(test)]
mod tests {
    use super::UserIdentity;
    use crate::{OrgId, UserId};

    #[test]
    fn identity_without_org_claim_has_no_scope() {
        let identity = UserIdentity::new(UserId::new(), None, None);
        assert!(identity.org_scope().is_none());
    }

    #[test]
    fn identity_scope_carries_organization() {
        let organization_id = OrgId::new();
        let identity = UserIdentity::new(UserId::new(), Some(organization_id), None);
        let scope = identity.org_scope();
        assert!(scope.is_some_and(|scope| scope.organization_id == organization_id));
    }
}
