//! Note owners and the seam to the external identity provider.

use serde::{Deserialize, Serialize};

/// A registered note owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    /// Stable subject identifier issued by the identity provider.
    pub token_identifier: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub created_at: i64,
}

/// Supplies the verified identity of the current caller.
///
/// Implementations wrap whatever authentication layer fronts the repository;
/// returning `None` means the request carries no verified identity.
pub trait IdentityProvider {
    fn token_identifier(&self) -> Option<String>;
}

/// A fixed identity, used when the caller is already known.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(pub Option<String>);

impl StaticIdentity {
    pub fn new(token_identifier: impl Into<String>) -> Self {
        Self(Some(token_identifier.into()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn token_identifier(&self) -> Option<String> {
        self.0.clone()
    }
}
