//! Profile repository
//!
//! Per-user profile documents in the `users` collection, keyed by the
//! identity gateway's user id.
//!
//! This module provides:
//! - `ProfileRepository` trait defining the interface for profile document access
//! - `FirestoreProfileRepository` implementing the trait over Cloud Firestore
//! - `InMemoryProfileRepository`, a process-local store with call counting and
//!   failure injection

use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::db::firestore::{Document, ErrorResponse, FirestoreClient};
use crate::models::{ProfileDocument, ProfileName, UserId};

/// Errors reported by the profile store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store refused the write. The message is the store's own.
    #[error("{0}")]
    Rejected(String),

    /// The store could not be reached or answered with something unreadable
    #[error("Profile store unavailable: {0}")]
    Transport(String),

    /// No document exists for this user
    #[error("Profile document not found: {0}")]
    NotFound(String),
}

/// Profile repository trait
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Create the document for a new user
    async fn create(&self, user_id: &UserId, profile: &ProfileDocument) -> Result<(), StoreError>;

    /// Overwrite `firstName` and `lastName` of an existing document
    async fn update_name(&self, user_id: &UserId, name: &ProfileName) -> Result<(), StoreError>;

    /// Read the document, `None` if it does not exist
    async fn get(&self, user_id: &UserId) -> Result<Option<ProfileDocument>, StoreError>;
}

// ============================================================================
// Firestore implementation
// ============================================================================

/// Profile repository backed by Cloud Firestore
pub struct FirestoreProfileRepository {
    client: FirestoreClient,
    collection: String,
}

impl FirestoreProfileRepository {
    pub fn new(client: FirestoreClient, collection: impl Into<String>) -> Self {
        Self {
            client,
            collection: collection.into(),
        }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(client: FirestoreClient, collection: impl Into<String>) -> Arc<dyn ProfileRepository> {
        Arc::new(Self::new(client, collection))
    }

    async fn rejection(response: reqwest::Response, user_id: &UserId) -> StoreError {
        let error = ErrorResponse::read(response).await;
        match (error.status, error.message) {
            (StatusCode::NOT_FOUND, _) => StoreError::NotFound(user_id.to_string()),
            (_, Some(message)) => StoreError::Rejected(message),
            (status, None) => StoreError::Transport(format!("HTTP {status}")),
        }
    }
}

fn transport(e: reqwest::Error) -> StoreError {
    StoreError::Transport(e.to_string())
}

fn name_fields(name: &ProfileName) -> Document {
    Document::default()
        .with_string("firstName", name.first_name.clone())
        .with_string("lastName", name.last_name.clone().unwrap_or_default())
}

#[async_trait]
impl ProfileRepository for FirestoreProfileRepository {
    async fn create(&self, user_id: &UserId, profile: &ProfileDocument) -> Result<(), StoreError> {
        tracing::debug!(user_id = %user_id, collection = %self.collection, "creating profile document");

        let body = Document::default()
            .with_string("email", profile.email.clone())
            .with_string("firstName", profile.first_name.clone())
            .with_string("lastName", profile.last_name.clone());

        let request = self
            .client
            .http()
            .post(self.client.collection_url(&self.collection))
            .query(&[("documentId", user_id.as_str())])
            .json(&body);
        let response = self
            .client
            .authorize(request)
            .await
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(Self::rejection(response, user_id).await);
        }
        Ok(())
    }

    async fn update_name(&self, user_id: &UserId, name: &ProfileName) -> Result<(), StoreError> {
        tracing::debug!(user_id = %user_id, collection = %self.collection, "updating profile name");

        let request = self
            .client
            .http()
            .patch(self.client.document_url(&self.collection, user_id.as_str()))
            .query(&[
                ("updateMask.fieldPaths", "firstName"),
                ("updateMask.fieldPaths", "lastName"),
                ("currentDocument.exists", "true"),
            ])
            .json(&name_fields(name));
        let response = self
            .client
            .authorize(request)
            .await
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(Self::rejection(response, user_id).await);
        }
        Ok(())
    }

    async fn get(&self, user_id: &UserId) -> Result<Option<ProfileDocument>, StoreError> {
        let request = self
            .client
            .http()
            .get(self.client.document_url(&self.collection, user_id.as_str()));
        let response = self
            .client
            .authorize(request)
            .await
            .send()
            .await
            .map_err(transport)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::rejection(response, user_id).await);
        }

        let document: Document = response.json().await.map_err(transport)?;
        Ok(Some(ProfileDocument {
            email: document.string("email").to_string(),
            first_name: document.string("firstName").to_string(),
            last_name: document.string("lastName").to_string(),
        }))
    }
}

// ============================================================================
// In-memory implementation
// ============================================================================

/// Repository capability, used for call counting and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreCall {
    Create,
    UpdateName,
    Get,
}

#[derive(Default)]
struct StoreState {
    documents: HashMap<UserId, ProfileDocument>,
    calls: HashMap<StoreCall, usize>,
    failures: HashMap<StoreCall, String>,
}

impl StoreState {
    fn record(&mut self, call: StoreCall) -> Result<(), StoreError> {
        *self.calls.entry(call).or_insert(0) += 1;
        match self.failures.get(&call) {
            Some(message) => Err(StoreError::Rejected(message.clone())),
            None => Ok(()),
        }
    }
}

/// Process-local profile repository
#[derive(Default)]
pub struct InMemoryProfileRepository {
    state: Mutex<StoreState>,
}

impl InMemoryProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a document directly, bypassing `create` and its counters
    pub async fn insert(&self, user_id: UserId, profile: ProfileDocument) {
        self.state.lock().await.documents.insert(user_id, profile);
    }

    /// Stored document, without counting a call
    pub async fn document(&self, user_id: &UserId) -> Option<ProfileDocument> {
        self.state.lock().await.documents.get(user_id).cloned()
    }

    pub async fn document_count(&self) -> usize {
        self.state.lock().await.documents.len()
    }

    pub async fn call_count(&self, call: StoreCall) -> usize {
        self.state.lock().await.calls.get(&call).copied().unwrap_or(0)
    }

    pub async fn total_calls(&self) -> usize {
        self.state.lock().await.calls.values().sum()
    }

    /// Make every subsequent call of `call` fail with `message`
    pub async fn fail_on(&self, call: StoreCall, message: impl Into<String>) {
        self.state.lock().await.failures.insert(call, message.into());
    }

    pub async fn clear_failure(&self, call: StoreCall) {
        self.state.lock().await.failures.remove(&call);
    }
}

#[async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn create(&self, user_id: &UserId, profile: &ProfileDocument) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.record(StoreCall::Create)?;

        if state.documents.contains_key(user_id) {
            return Err(StoreError::Rejected(format!(
                "Document already exists: users/{user_id}"
            )));
        }
        state.documents.insert(user_id.clone(), profile.clone());
        Ok(())
    }

    async fn update_name(&self, user_id: &UserId, name: &ProfileName) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.record(StoreCall::UpdateName)?;

        let document = state
            .documents
            .get_mut(user_id)
            .ok_or_else(|| StoreError::NotFound(user_id.to_string()))?;
        document.first_name = name.first_name.clone();
        document.last_name = name.last_name.clone().unwrap_or_default();
        Ok(())
    }

    async fn get(&self, user_id: &UserId) -> Result<Option<ProfileDocument>, StoreError> {
        let mut state = self.state.lock().await;
        state.record(StoreCall::Get)?;
        Ok(state.documents.get(user_id).cloned())
    }
}
