//! Session model
//!
//! Process-local view of who is signed in and what the interface should
//! display for them. Never persisted.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::identity::{Identity, UserId};
use super::profile::ProfileName;

/// Attributes of the signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedInUser {
    pub user_id: UserId,
    pub email: String,
    pub name: ProfileName,
    pub created_at: Option<DateTime<Utc>>,
}

impl SignedInUser {
    pub fn from_identity(identity: &Identity, name: ProfileName) -> Self {
        Self {
            user_id: identity.id.clone(),
            email: identity.email.clone(),
            name,
            created_at: identity.created_at,
        }
    }
}

/// Authentication state.
///
/// A user id only exists inside `SignedIn`, so "authenticated" and
/// "has a user id" cannot disagree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    SignedOut,
    SignedIn(SignedInUser),
}

/// Point-in-time copy of the session handed to readers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    /// True while an account operation is in flight
    pub loading: bool,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::SignedIn(_))
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn user(&self) -> Option<&SignedInUser> {
        match &self.state {
            SessionState::SignedIn(user) => Some(user),
            SessionState::SignedOut => None,
        }
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user().map(|u| &u.user_id)
    }

    pub fn email(&self) -> Option<&str> {
        self.user().map(|u| u.email.as_str())
    }

    pub fn first_name(&self) -> Option<&str> {
        self.user().map(|u| u.name.first_name.as_str())
    }

    pub fn last_name(&self) -> Option<&str> {
        self.user().and_then(|u| u.name.last_name.as_deref())
    }

    pub fn display_name(&self) -> Option<String> {
        self.user().map(|u| u.name.display_name())
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.user().and_then(|u| u.created_at)
    }
}
