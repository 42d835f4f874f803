//! Identity gateway
//!
//! Capability interface over the hosted authentication service. The account
//! service only talks to the gateway through [`IdentityGateway`], so the
//! Firebase adapter and the in-memory fake are interchangeable.

pub mod firebase;
pub mod memory;

use async_trait::async_trait;

use crate::models::Identity;

pub use firebase::{FirebaseCredentials, FirebaseIdentityGateway};
pub use memory::{GatewayCall, InMemoryIdentityGateway};

/// Errors reported by the identity gateway
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The gateway refused the call. The message is the gateway's own,
    /// passed through verbatim (e.g. `EMAIL_EXISTS`).
    #[error("{0}")]
    Rejected(String),

    /// The gateway could not be reached or answered with something unreadable
    #[error("Identity service unavailable: {0}")]
    Transport(String),

    /// The call needs a signed-in identity and the gateway has none
    #[error("No signed-in identity")]
    NotSignedIn,
}

/// Identity gateway capability set
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    /// Verify credentials and make the account the current identity
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    /// Create an account; the new account becomes the current identity
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    /// Forget the current identity
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Set the display name attribute. An empty name removes it.
    async fn update_display_name(&self, identity: &Identity, name: &str)
        -> Result<(), AuthError>;

    /// Delete the account. Used to undo a sign-up that could not complete.
    async fn delete_identity(&self, identity: &Identity) -> Result<(), AuthError>;

    /// The identity signed in on this gateway, if any
    async fn current_identity(&self) -> Option<Identity>;
}
