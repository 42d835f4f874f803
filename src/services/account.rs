//! Account service
//!
//! Implements the account flows of the app on top of the identity gateway
//! and the profile document store:
//! - Sign-in and sign-up, including the profile document of a new account
//! - Sign-out
//! - Profile editing (first/last name kept in both backends)
//! - Rehydrating the session from the gateway's current identity
//!
//! Multi-step writes are compensated: when a later step fails, the earlier
//! steps are undone where possible and the caller gets
//! [`AccountError::PartialFailure`] describing what happened.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::db::repositories::{ProfileRepository, StoreError};
use crate::identity::{AuthError, IdentityGateway};
use crate::models::{
    Identity, ProfileDocument, ProfileDraft, ProfileName, SessionSnapshot, SignedInUser,
};
use crate::services::session::{SessionReader, SessionWriter};

/// Credentials submitted from the sign-in / sign-up form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRequest {
    SignIn {
        email: String,
        password: String,
    },
    SignUp {
        email: String,
        password: String,
        first_name: String,
        last_name: String,
    },
}

impl AuthRequest {
    pub fn sign_in(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self::SignIn {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn sign_up(
        email: impl Into<String>,
        password: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self::SignUp {
            email: email.into(),
            password: password.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    fn validate(&self) -> Result<(), AccountError> {
        let (email, password) = match self {
            Self::SignIn { email, password } | Self::SignUp { email, password, .. } => {
                (email, password)
            }
        };
        if email.trim().is_empty() {
            return Err(AccountError::Validation("Email cannot be empty".to_string()));
        }
        if password.is_empty() {
            return Err(AccountError::Validation(
                "Password cannot be empty".to_string(),
            ));
        }
        if let Self::SignUp {
            first_name,
            last_name,
            ..
        } = self
        {
            validate_name(first_name, last_name)?;
        }
        Ok(())
    }
}

fn validate_name(first_name: &str, last_name: &str) -> Result<(), AccountError> {
    if first_name.trim().is_empty() {
        return Err(AccountError::Validation(
            "First name cannot be empty".to_string(),
        ));
    }
    if last_name.trim().is_empty() {
        return Err(AccountError::Validation(
            "Last name cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Multi-step operation named in a partial failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    SignUp,
    SaveProfile,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignUp => f.write_str("Sign-up"),
            Self::SaveProfile => f.write_str("Profile update"),
        }
    }
}

/// Write step that failed inside a multi-step operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStep {
    DisplayName,
    ProfileDocument,
}

impl fmt::Display for WriteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DisplayName => f.write_str("saving the display name"),
            Self::ProfileDocument => f.write_str("saving the profile"),
        }
    }
}

/// Operation not allowed in the current session state
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("You are not signed in")]
    NotSignedIn,

    #[error("Another account operation is already in progress")]
    OperationInProgress,
}

/// Error types for account operations
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    /// Form input rejected before any remote call
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    State(#[from] StateError),

    /// A later write step failed after an earlier one succeeded.
    ///
    /// `compensated` tells whether the earlier steps were undone.
    #[error("{operation} failed while {step}: {source}")]
    PartialFailure {
        operation: Operation,
        step: WriteStep,
        compensated: bool,
        source: Box<AccountError>,
    },
}

/// Clears the loading flag and releases the operation slot on every exit path
struct OperationGuard<'a> {
    session: &'a SessionWriter,
    _slot: MutexGuard<'a, ()>,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.session.set_loading(false);
    }
}

/// Account service coordinating the identity gateway, the profile store
/// and the session
pub struct AccountService {
    gateway: Arc<dyn IdentityGateway>,
    profiles: Arc<dyn ProfileRepository>,
    session: SessionWriter,
    in_flight: Mutex<()>,
}

impl AccountService {
    /// Create a new account service owning the session's write handle
    pub fn new(
        gateway: Arc<dyn IdentityGateway>,
        profiles: Arc<dyn ProfileRepository>,
        session: SessionWriter,
    ) -> Self {
        Self {
            gateway,
            profiles,
            session,
            in_flight: Mutex::new(()),
        }
    }

    /// New read-only subscription to the session
    pub fn subscribe(&self) -> SessionReader {
        self.session.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    /// Claim the single operation slot and raise the loading flag
    fn begin(&self) -> Result<OperationGuard<'_>, AccountError> {
        let slot = self
            .in_flight
            .try_lock()
            .map_err(|_| StateError::OperationInProgress)?;
        self.session.set_loading(true);
        Ok(OperationGuard {
            session: &self.session,
            _slot: slot,
        })
    }

    /// Sign in or sign up, depending on the request
    ///
    /// # Errors
    ///
    /// - `Validation` if a required field is empty (no remote call is made)
    /// - `Auth` if the gateway rejects the credentials
    /// - `PartialFailure` if sign-up created the account but a later write
    ///   failed; the new account is deleted again when possible
    /// - `State(OperationInProgress)` if another operation is running
    pub async fn authenticate(
        &self,
        request: AuthRequest,
    ) -> Result<SessionSnapshot, AccountError> {
        request.validate()?;
        let op = self.begin()?;

        match request {
            AuthRequest::SignIn { email, password } => {
                let identity = self.gateway.sign_in(email.trim(), &password).await?;
                let name = self.resolve_name(&identity).await;
                tracing::info!(user_id = %identity.id, "signed in");
                self.session
                    .sign_in(SignedInUser::from_identity(&identity, name));
            }
            AuthRequest::SignUp {
                email,
                password,
                first_name,
                last_name,
            } => {
                let name = ProfileName::new(first_name.trim(), last_name.trim());
                self.sign_up(email.trim(), &password, name).await?;
            }
        }

        drop(op);
        Ok(self.session.snapshot())
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: ProfileName,
    ) -> Result<(), AccountError> {
        let identity = self.gateway.sign_up(email, password).await?;
        tracing::debug!(user_id = %identity.id, "identity created");

        if let Err(e) = self
            .gateway
            .update_display_name(&identity, &name.display_name())
            .await
        {
            return Err(self
                .abandon_sign_up(&identity, WriteStep::DisplayName, e.into())
                .await);
        }

        let document = ProfileDocument::new(identity.email.clone(), &name);
        if let Err(e) = self.profiles.create(&identity.id, &document).await {
            return Err(self
                .abandon_sign_up(&identity, WriteStep::ProfileDocument, e.into())
                .await);
        }

        tracing::info!(user_id = %identity.id, "signed up");
        self.session
            .sign_in(SignedInUser::from_identity(&identity, name));
        Ok(())
    }

    /// Delete a half-created account and leave both the gateway and the
    /// session signed out
    async fn abandon_sign_up(
        &self,
        identity: &Identity,
        step: WriteStep,
        source: AccountError,
    ) -> AccountError {
        tracing::warn!(user_id = %identity.id, %step, error = %source, "sign-up incomplete, deleting identity");

        let compensated = match self.gateway.delete_identity(identity).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(user_id = %identity.id, error = %e, "failed to delete identity");
                false
            }
        };
        if let Err(e) = self.gateway.sign_out().await {
            tracing::warn!(error = %e, "gateway sign-out after failed sign-up failed");
        }
        self.session.sign_out();

        AccountError::PartialFailure {
            operation: Operation::SignUp,
            step,
            compensated,
            source: Box::new(source),
        }
    }

    /// Sign out of the gateway and clear the session
    ///
    /// Signing out while already signed out succeeds.
    pub async fn sign_out(&self) -> Result<SessionSnapshot, AccountError> {
        let op = self.begin()?;

        self.gateway.sign_out().await?;
        self.session.sign_out();
        tracing::info!("signed out");

        drop(op);
        Ok(self.session.snapshot())
    }

    /// Current names of the signed-in user, for pre-filling the edit form
    pub fn begin_profile_edit(&self) -> Result<ProfileDraft, AccountError> {
        self.session
            .signed_in_user()
            .map(|user| ProfileDraft::from(&user.name))
            .ok_or_else(|| StateError::NotSignedIn.into())
    }

    /// Save new first/last names to the gateway and the profile document
    ///
    /// The session changes only once both writes succeeded. If the document
    /// write fails the display name is reverted.
    pub async fn save_profile_edit(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<SessionSnapshot, AccountError> {
        validate_name(first_name, last_name)?;
        let op = self.begin()?;

        let user = self
            .session
            .signed_in_user()
            .ok_or(StateError::NotSignedIn)?;
        let identity = match self.gateway.current_identity().await {
            Some(identity) if identity.id == user.user_id => identity,
            _ => return Err(StateError::NotSignedIn.into()),
        };

        let name = ProfileName::new(first_name.trim(), last_name.trim());
        self.gateway
            .update_display_name(&identity, &name.display_name())
            .await?;

        if let Err(e) = self.profiles.update_name(&user.user_id, &name).await {
            tracing::warn!(user_id = %user.user_id, error = %e, "profile write failed, reverting display name");

            let previous = identity.display_name.clone().unwrap_or_default();
            let compensated = match self.gateway.update_display_name(&identity, &previous).await {
                Ok(()) => true,
                Err(revert) => {
                    tracing::warn!(user_id = %user.user_id, error = %revert, "failed to revert display name");
                    false
                }
            };
            return Err(AccountError::PartialFailure {
                operation: Operation::SaveProfile,
                step: WriteStep::ProfileDocument,
                compensated,
                source: Box::new(e.into()),
            });
        }

        tracing::info!(user_id = %user.user_id, "profile updated");
        self.session.update_name(name);

        drop(op);
        Ok(self.session.snapshot())
    }

    /// Rebuild the session from the gateway's current identity.
    ///
    /// Without one the session ends up signed out.
    pub async fn restore_session(&self) -> Result<SessionSnapshot, AccountError> {
        let op = self.begin()?;

        match self.gateway.current_identity().await {
            Some(identity) => {
                let name = self.resolve_name(&identity).await;
                tracing::info!(user_id = %identity.id, "session restored");
                self.session
                    .sign_in(SignedInUser::from_identity(&identity, name));
            }
            None => self.session.sign_out(),
        }

        drop(op);
        Ok(self.session.snapshot())
    }

    /// Structured name from the profile document, falling back to the
    /// gateway display name split on its first space
    async fn resolve_name(&self, identity: &Identity) -> ProfileName {
        let fallback = || ProfileName::split(identity.display_name.as_deref().unwrap_or_default());

        match self.profiles.get(&identity.id).await {
            Ok(Some(document)) if !document.first_name.is_empty() => document.name(),
            Ok(_) => {
                tracing::debug!(user_id = %identity.id, "no profile document, using display name");
                fallback()
            }
            Err(e) => {
                tracing::warn!(user_id = %identity.id, error = %e, "profile read failed, using display name");
                fallback()
            }
        }
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::db::repositories::InMemoryProfileRepository;
    use crate::identity::InMemoryIdentityGateway;
    use crate::services::session;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Sign-up with a blank first or last name never reaches a backend
        #[test]
        fn blank_name_sign_up_makes_no_remote_call(
            email in "[a-z]{1,8}@[a-z]{1,8}\\.com",
            password in "[a-zA-Z0-9]{6,16}",
            name in "[A-Za-zçğıöşüÇĞİÖŞÜ]{1,12}",
            blank in "[ \t]{0,3}",
            blank_first in any::<bool>(),
        ) {
            let result: Result<(), TestCaseError> = tokio_test::block_on(async {
                let gateway = Arc::new(InMemoryIdentityGateway::new());
                let profiles = Arc::new(InMemoryProfileRepository::new());
                let (writer, _reader) = session::channel();
                let service = AccountService::new(gateway.clone(), profiles.clone(), writer);

                let (first, last) = if blank_first {
                    (blank.clone(), name.clone())
                } else {
                    (name.clone(), blank.clone())
                };
                let err = service
                    .authenticate(AuthRequest::sign_up(email, password, first, last))
                    .await
                    .unwrap_err();

                prop_assert!(matches!(err, AccountError::Validation(_)));
                prop_assert_eq!(gateway.total_calls().await, 0);
                prop_assert_eq!(profiles.total_calls().await, 0);
                prop_assert!(!service.snapshot().is_authenticated());
                Ok(())
            });
            result?;
        }
    }
}
