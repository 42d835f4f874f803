//! Application context
//!
//! Wires the collaborators together: one account service holding the
//! session's write handle, plus a read handle for the presentation layer.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::db::repositories::{
    FirestoreProfileRepository, InMemoryProfileRepository, ProfileRepository,
};
use crate::db::FirestoreClient;
use crate::identity::{
    FirebaseCredentials, FirebaseIdentityGateway, IdentityGateway, InMemoryIdentityGateway,
};
use crate::services::{session, AccountService, SessionReader};

/// Shared application state
#[derive(Clone)]
pub struct AppContext {
    accounts: Arc<AccountService>,
    session: SessionReader,
}

impl AppContext {
    /// Build a context over the given collaborators with a fresh session
    pub fn new(gateway: Arc<dyn IdentityGateway>, profiles: Arc<dyn ProfileRepository>) -> Self {
        let (writer, reader) = session::channel();
        Self {
            accounts: Arc::new(AccountService::new(gateway, profiles, writer)),
            session: reader,
        }
    }

    /// Build a context backed by Firebase Authentication and Cloud Firestore
    pub fn firebase(config: &Config) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.identity.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        let credentials = FirebaseCredentials::new();

        let gateway =
            FirebaseIdentityGateway::boxed(&config.identity, http.clone(), credentials.clone());
        let client = FirestoreClient::new(&config.profile_store, http, credentials);
        let profiles =
            FirestoreProfileRepository::boxed(client, config.profile_store.collection.clone());

        tracing::info!(
            project_id = %config.profile_store.project_id,
            collection = %config.profile_store.collection,
            "Firebase backend configured"
        );
        Ok(Self::new(gateway, profiles))
    }

    /// Build a context over process-local fakes
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryIdentityGateway::new()),
            Arc::new(InMemoryProfileRepository::new()),
        )
    }

    pub fn accounts(&self) -> &Arc<AccountService> {
        &self.accounts
    }

    /// Read handle to the session
    pub fn session(&self) -> SessionReader {
        self.session.clone()
    }
}
