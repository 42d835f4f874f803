//! In-memory identity gateway
//!
//! Keeps accounts in a process-local map. Every call is counted, and any
//! capability can be made to fail with a chosen message, which is what the
//! account service tests use to exercise partial failures.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{AuthError, IdentityGateway};
use crate::models::{Identity, UserId};

/// Minimum password length enforced by the hosted service
const MIN_PASSWORD_LEN: usize = 6;

/// Gateway capability, used for call counting and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayCall {
    SignIn,
    SignUp,
    SignOut,
    UpdateDisplayName,
    DeleteIdentity,
}

struct Account {
    identity: Identity,
    password: String,
}

#[derive(Default)]
struct GatewayState {
    /// Accounts keyed by lowercased email
    accounts: HashMap<String, Account>,
    current: Option<UserId>,
    calls: HashMap<GatewayCall, usize>,
    failures: HashMap<GatewayCall, String>,
}

impl GatewayState {
    /// Count the call and return the injected failure, if any
    fn record(&mut self, call: GatewayCall) -> Result<(), AuthError> {
        *self.calls.entry(call).or_insert(0) += 1;
        match self.failures.get(&call) {
            Some(message) => Err(AuthError::Rejected(message.clone())),
            None => Ok(()),
        }
    }

    fn account_mut(&mut self, id: &UserId) -> Option<&mut Account> {
        self.accounts.values_mut().find(|a| &a.identity.id == id)
    }

    fn require_current(&self, identity: &Identity) -> Result<(), AuthError> {
        if self.current.as_ref() == Some(&identity.id) {
            Ok(())
        } else {
            Err(AuthError::NotSignedIn)
        }
    }
}

/// Process-local identity gateway
#[derive(Default)]
pub struct InMemoryIdentityGateway {
    state: Mutex<GatewayState>,
}

impl InMemoryIdentityGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account directly, bypassing `sign_up` and its counters
    pub async fn insert_account(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Identity {
        let mut identity = Identity::new(Uuid::new_v4().to_string(), email)
            .with_created_at(Utc::now());
        if let Some(name) = display_name {
            identity = identity.with_display_name(name);
        }

        let mut state = self.state.lock().await;
        state.accounts.insert(
            email.to_lowercase(),
            Account {
                identity: identity.clone(),
                password: password.to_string(),
            },
        );
        identity
    }

    /// Look up an account by id
    pub async fn identity(&self, id: &UserId) -> Option<Identity> {
        let state = self.state.lock().await;
        state
            .accounts
            .values()
            .find(|a| &a.identity.id == id)
            .map(|a| a.identity.clone())
    }

    /// Number of accounts
    pub async fn account_count(&self) -> usize {
        self.state.lock().await.accounts.len()
    }

    /// How many times a capability has been called
    pub async fn call_count(&self, call: GatewayCall) -> usize {
        self.state.lock().await.calls.get(&call).copied().unwrap_or(0)
    }

    /// Total number of remote calls of any kind
    pub async fn total_calls(&self) -> usize {
        self.state.lock().await.calls.values().sum()
    }

    /// Make every subsequent call of `call` fail with `message`
    pub async fn fail_on(&self, call: GatewayCall, message: impl Into<String>) {
        self.state.lock().await.failures.insert(call, message.into());
    }

    pub async fn clear_failure(&self, call: GatewayCall) {
        self.state.lock().await.failures.remove(&call);
    }
}

#[async_trait]
impl IdentityGateway for InMemoryIdentityGateway {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let mut state = self.state.lock().await;
        state.record(GatewayCall::SignIn)?;

        let identity = match state.accounts.get(&email.to_lowercase()) {
            Some(account) if account.password == password => account.identity.clone(),
            _ => return Err(AuthError::Rejected("INVALID_LOGIN_CREDENTIALS".to_string())),
        };
        state.current = Some(identity.id.clone());
        Ok(identity)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let mut state = self.state.lock().await;
        state.record(GatewayCall::SignUp)?;

        let key = email.to_lowercase();
        if state.accounts.contains_key(&key) {
            return Err(AuthError::Rejected("EMAIL_EXISTS".to_string()));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::Rejected(
                "WEAK_PASSWORD : Password should be at least 6 characters".to_string(),
            ));
        }

        let identity =
            Identity::new(Uuid::new_v4().to_string(), email).with_created_at(Utc::now());
        state.accounts.insert(
            key,
            Account {
                identity: identity.clone(),
                password: password.to_string(),
            },
        );
        state.current = Some(identity.id.clone());
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let mut state = self.state.lock().await;
        state.record(GatewayCall::SignOut)?;
        state.current = None;
        Ok(())
    }

    async fn update_display_name(
        &self,
        identity: &Identity,
        name: &str,
    ) -> Result<(), AuthError> {
        let mut state = self.state.lock().await;
        state.record(GatewayCall::UpdateDisplayName)?;
        state.require_current(identity)?;

        let account = state
            .account_mut(&identity.id)
            .ok_or_else(|| AuthError::Rejected("USER_NOT_FOUND".to_string()))?;
        account.identity.display_name = (!name.is_empty()).then(|| name.to_string());
        Ok(())
    }

    async fn delete_identity(&self, identity: &Identity) -> Result<(), AuthError> {
        let mut state = self.state.lock().await;
        state.record(GatewayCall::DeleteIdentity)?;
        state.require_current(identity)?;

        state.accounts.retain(|_, a| a.identity.id != identity.id);
        state.current = None;
        Ok(())
    }

    async fn current_identity(&self) -> Option<Identity> {
        let state = self.state.lock().await;
        let id = state.current.as_ref()?;
        state
            .accounts
            .values()
            .find(|a| &a.identity.id == id)
            .map(|a| a.identity.clone())
    }
}
