//! Shared primitives for all Rust crates in Caregrid.

#![forbid(unsafe_code)]

/// Identity primitives supplied by the authentication layer.
pub mod auth;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use auth::{OrgScope, UserIdentity};

/// Result type used across Caregrid crates.
pub type AppResult<T> = Result<T, AppError>;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID value.
            #[must_use]
            pub fn from_uuid(value: Uuid) -> Self {
                Self(value)
            }

            /// Returns the underlying UUID value.
            #[must_use]
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }
    };
}

uuid_id! {
    /// User identifier issued by the identity provider.
    UserId
}

uuid_id! {
    /// Organization identifier used as the partition key for scoped grants.
    OrgId
}

uuid_id! {
    /// Department identifier scoping an assignment inside an organization.
    DepartmentId
}

uuid_id! {
    /// Role identifier referencing a role definition.
    RoleId
}

/// Common application error categories.
#[derive(Debug, Clone, Error)]
pub enum AppError {
    /// Invalid registration data, dependency cycle or inheritance cycle.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Store timeout or connection failure; decision paths fail closed.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns a stable label for the error category, used in log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal",
        }
    }
}
