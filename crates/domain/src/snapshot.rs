use std::collections::BTreeSet;

use caregrid_core::{OrgId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::grants::ResourceAccessGrant;
use crate::permission::PermissionName;
use crate::role::PermissionSet;

/// Derived, cached view of a user's effective permissions.
///
/// Never hand-edited: snapshots are produced by the resolver, written
/// through the cache, and discarded on invalidation or expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePermissionSnapshot {
    /// User the snapshot belongs to.
    pub user_id: UserId,
    /// Organization scope the snapshot was computed under.
    pub organization_id: Option<OrgId>,
    /// Effective permission set after precedence rules.
    pub permissions: PermissionSet,
    /// Active revoke overrides, checked before the sentinel set.
    pub revoked: BTreeSet<PermissionName>,
    /// Per-resource ACL entries used as the fallback channel.
    pub resource_access: Vec<ResourceAccessGrant>,
    /// Instant the snapshot was computed.
    pub computed_at: DateTime<Utc>,
    /// Instant the snapshot stops being served.
    pub expires_at: DateTime<Utc>,
    /// Hash of the sorted active inputs; identical grant sets hash
    /// identically regardless of computation time.
    pub content_hash: String,
}

impl EffectivePermissionSnapshot {
    /// Creates a snapshot and seals it with its content hash.
    #[must_use]
    pub fn new(
        user_id: UserId,
        organization_id: Option<OrgId>,
        permissions: PermissionSet,
        revoked: BTreeSet<PermissionName>,
        mut resource_access: Vec<ResourceAccessGrant>,
        computed_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        resource_access.sort();
        let content_hash = Self::content_hash_of(
            user_id,
            organization_id,
            &permissions,
            &revoked,
            &resource_access,
        );

        Self {
            user_id,
            organization_id,
            permissions,
            revoked,
            resource_access,
            computed_at,
            expires_at,
            content_hash,
        }
    }

    /// Computes the canonical content hash over sorted inputs.
    ///
    /// Timestamps are excluded so two computations over identical grant
    /// sets produce identical hashes.
    #[must_use]
    pub fn content_hash_of(
        user_id: UserId,
        organization_id: Option<OrgId>,
        permissions: &PermissionSet,
        revoked: &BTreeSet<PermissionName>,
        resource_access: &[ResourceAccessGrant],
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"user:");
        hasher.update(user_id.as_uuid().as_bytes());
        hasher.update(b"\norg:");
        match organization_id {
            Some(organization_id) => hasher.update(organization_id.as_uuid().as_bytes()),
            None => hasher.update(b"-"),
        }

        match permissions {
            PermissionSet::All => {
                hasher.update(b"\nperm:*");
            }
            PermissionSet::Named(names) => {
                for name in names {
                    hasher.update(b"\nperm:");
                    hasher.update(name.as_str().as_bytes());
                }
            }
        }

        for name in revoked {
            hasher.update(b"\nrevoke:");
            hasher.update(name.as_str().as_bytes());
        }

        for grant in resource_access {
            hasher.update(b"\nresource:");
            hasher.update(grant.resource_type.as_bytes());
            hasher.update(b":");
            hasher.update(grant.resource_id.as_bytes());
            hasher.update(b":");
            hasher.update(grant.access_level.as_str().as_bytes());
        }

        hex::encode(hasher.finalize())
    }

    /// Returns whether the sealed hash still matches the snapshot contents.
    ///
    /// A mismatch marks a row mutated or corrupted after sealing; such a
    /// snapshot is discarded and recomputed, never served.
    #[must_use]
    pub fn verify_content_hash(&self) -> bool {
        self.content_hash
            == Self::content_hash_of(
                self.user_id,
                self.organization_id,
                &self.permissions,
                &self.revoked,
                &self.resource_access,
            )
    }

    /// Returns whether the snapshot must be treated as absent at an instant.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Returns whether the snapshot allows a permission by name.
    ///
    /// Revokes are consulted first so an explicit revoke locks a permission
    /// even under the system-role sentinel.
    #[must_use]
    pub fn allows(&self, name: &PermissionName) -> bool {
        if self.revoked.contains(name) {
            return false;
        }
        self.permissions.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use caregrid_core::UserId;
    use chrono::{Duration, Utc};

    use super::EffectivePermissionSnapshot;
    use crate::grants::ResourceAccessGrant;
    use crate::permission::{AccessLevel, PermissionName};
    use crate::role::PermissionSet;

    fn name(value: &str) -> PermissionName {
        let Ok(name) = PermissionName::new(value) else {
            panic!("invalid permission name '{value}' in test fixture");
        };
        name
    }

    fn snapshot(user_id: UserId, permissions: &[&str]) -> EffectivePermissionSnapshot {
        let now = Utc::now();
        EffectivePermissionSnapshot::new(
            user_id,
            None,
            PermissionSet::Named(permissions.iter().map(|value| name(value)).collect()),
            BTreeSet::new(),
            Vec::new(),
            now,
            now + Duration::hours(1),
        )
    }

    #[test]
    fn identical_inputs_hash_identically() {
        let user_id = UserId::new();
        let first = snapshot(user_id, &["device.read", "maintenance.read"]);
        let second = snapshot(user_id, &["maintenance.read", "device.read"]);
        assert_eq!(first.content_hash, second.content_hash);
    }

    #[test]
    fn different_inputs_hash_differently() {
        let user_id = UserId::new();
        let first = snapshot(user_id, &["device.read"]);
        let second = snapshot(user_id, &["device.update"]);
        assert_ne!(first.content_hash, second.content_hash);
    }

    #[test]
    fn resource_order_does_not_affect_hash() {
        let user_id = UserId::new();
        let now = Utc::now();
        let first_grant = ResourceAccessGrant {
            user_id,
            resource_type: "device".to_owned(),
            resource_id: "pump-7".to_owned(),
            access_level: AccessLevel::Read,
        };
        let second_grant = ResourceAccessGrant {
            user_id,
            resource_type: "device".to_owned(),
            resource_id: "pump-8".to_owned(),
            access_level: AccessLevel::Write,
        };

        let forward = EffectivePermissionSnapshot::new(
            user_id,
            None,
            PermissionSet::empty(),
            BTreeSet::new(),
            vec![first_grant.clone(), second_grant.clone()],
            now,
            now + Duration::hours(1),
        );
        let reversed = EffectivePermissionSnapshot::new(
            user_id,
            None,
            PermissionSet::empty(),
            BTreeSet::new(),
            vec![second_grant, first_grant],
            now,
            now + Duration::hours(1),
        );
        assert_eq!(forward.content_hash, reversed.content_hash);
    }

    #[test]
    fn tampered_snapshot_fails_verification() {
        let mut tampered = snapshot(UserId::new(), &["device.read"]);
        assert!(tampered.verify_content_hash());

        tampered.permissions = PermissionSet::Named([name("device.manage")].into_iter().collect());
        assert!(!tampered.verify_content_hash());
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let fresh = snapshot(UserId::new(), &[]);
        assert!(!fresh.is_expired_at(fresh.computed_at));
        assert!(fresh.is_expired_at(fresh.expires_at));
        assert!(fresh.is_expired_at(fresh.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn revoke_locks_permission_under_sentinel() {
        let now = Utc::now();
        let locked = EffectivePermissionSnapshot::new(
            UserId::new(),
            None,
            PermissionSet::All,
            [name("maintenance.read")].into_iter().collect(),
            Vec::new(),
            now,
            now + Duration::hours(1),
        );
        assert!(locked.allows(&name("device.read")));
        assert!(!locked.allows(&name("maintenance.read")));
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let original = snapshot(UserId::new(), &["device.read"]);
        let Ok(encoded) = serde_json::to_string(&original) else {
            panic!("snapshot serialization failed");
        };
        let Ok(decoded) = serde_json::from_str::<EffectivePermissionSnapshot>(&encoded) else {
            panic!("snapshot deserialization failed");
        };
        assert_eq!(original, decoded);
        assert!(decoded.verify_content_hash());
    }
}
