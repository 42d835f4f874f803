//! Data models
//!
//! This module contains the data structures shared by the account layer:
//! - Identity records returned by the identity gateway
//! - Profile names and the per-user profile document
//! - The process-local session state

mod identity;
mod profile;
mod session;

pub use identity::{Identity, UserId};
pub use profile::{ProfileDocument, ProfileDraft, ProfileName};
pub use session::{SessionSnapshot, SessionState, SignedInUser};
