//! Profile model
//!
//! Structured first/last names and the per-user document mirrored into the
//! profile store. The identity gateway only knows a single display name, so
//! this module also owns the conversion between the two shapes.

use serde::{Deserialize, Serialize};

/// Structured user name.
///
/// `last_name` is `None` when the name was recovered from a display name
/// that contained no space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileName {
    pub first_name: String,
    pub last_name: Option<String>,
}

impl ProfileName {
    /// Create a name from both parts
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        let last_name = last_name.into();
        Self {
            first_name: first_name.into(),
            last_name: (!last_name.is_empty()).then_some(last_name),
        }
    }

    /// Recover a structured name from a display name.
    ///
    /// Splits on the first space only: `"Ahmet Can Yılmaz"` becomes
    /// `"Ahmet"` / `"Can Yılmaz"`, and `"Ahmet"` has no last name.
    pub fn split(display_name: &str) -> Self {
        let trimmed = display_name.trim();
        match trimmed.split_once(' ') {
            Some((first, rest)) => {
                let rest = rest.trim_start();
                Self {
                    first_name: first.to_string(),
                    last_name: (!rest.is_empty()).then(|| rest.to_string()),
                }
            }
            None => Self {
                first_name: trimmed.to_string(),
                last_name: None,
            },
        }
    }

    /// The display name stored on the identity gateway
    pub fn display_name(&self) -> String {
        match self.last_name.as_deref() {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

/// Per-user record kept in the `users` collection.
///
/// Field names are camelCase on the wire (`email`, `firstName`, `lastName`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDocument {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl ProfileDocument {
    pub fn new(email: impl Into<String>, name: &ProfileName) -> Self {
        Self {
            email: email.into(),
            first_name: name.first_name.clone(),
            last_name: name.last_name.clone().unwrap_or_default(),
        }
    }

    /// Structured name held by this document
    pub fn name(&self) -> ProfileName {
        ProfileName::new(self.first_name.clone(), self.last_name.clone())
    }
}

/// Editable form values produced when a profile edit begins.
///
/// A missing last name is presented as an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDraft {
    pub first_name: String,
    pub last_name: String,
}

impl From<&ProfileName> for ProfileDraft {
    fn from(name: &ProfileName) -> Self {
        Self {
            first_name: name.first_name.clone(),
            last_name: name.last_name.clone().unwrap_or_default(),
        }
    }
}
