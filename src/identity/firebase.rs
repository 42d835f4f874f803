//! Firebase identity gateway
//!
//! Talks to the Identity Toolkit REST API (`accounts:*` methods). The ID
//! token of the signed-in account lives in [`FirebaseCredentials`], which is
//! shared with the Firestore profile repository so document calls carry the
//! same bearer token.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{AuthError, IdentityGateway};
use crate::config::IdentityConfig;
use crate::models::{Identity, UserId};

struct SignedInAccount {
    id_token: String,
    identity: Identity,
}

/// ID token and identity of the signed-in account
#[derive(Clone, Default)]
pub struct FirebaseCredentials {
    inner: Arc<RwLock<Option<SignedInAccount>>>,
}

impl FirebaseCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bearer token for authenticated calls
    pub async fn id_token(&self) -> Option<String> {
        self.inner.read().await.as_ref().map(|a| a.id_token.clone())
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.inner.read().await.as_ref().map(|a| a.identity.clone())
    }

    async fn set(&self, id_token: String, identity: Identity) {
        *self.inner.write().await = Some(SignedInAccount { id_token, identity });
    }

    async fn clear(&self) {
        *self.inner.write().await = None;
    }

    /// Token of the signed-in account, provided it is `id`
    async fn token_for(&self, id: &UserId) -> Result<String, AuthError> {
        match self.inner.read().await.as_ref() {
            Some(account) if &account.identity.id == id => Ok(account.id_token.clone()),
            _ => Err(AuthError::NotSignedIn),
        }
    }

    async fn set_display_name(&self, name: Option<String>) {
        if let Some(account) = self.inner.write().await.as_mut() {
            account.identity.display_name = name;
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    id_token: String,
    local_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdTokenRequest<'a> {
    id_token: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest<'a> {
    id_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    delete_attribute: Vec<&'static str>,
    return_secure_token: bool,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    /// Milliseconds since the epoch, as a string
    #[serde(default)]
    created_at: Option<String>,
}

impl LookupUser {
    fn into_identity(self, fallback_email: &str) -> Identity {
        Identity {
            id: UserId::new(self.local_id),
            email: self.email.unwrap_or_else(|| fallback_email.to_string()),
            display_name: self.display_name.filter(|n| !n.is_empty()),
            created_at: self.created_at.as_deref().and_then(parse_epoch_millis),
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn parse_epoch_millis(value: &str) -> Option<DateTime<Utc>> {
    value
        .parse::<i64>()
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
}

/// Extract the `error.message` field of a Google API error body
pub(crate) fn google_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|e| e.error.message)
}

fn transport(e: reqwest::Error) -> AuthError {
    AuthError::Transport(e.to_string())
}

// ============================================================================
// Gateway
// ============================================================================

/// Identity gateway backed by Firebase Authentication
pub struct FirebaseIdentityGateway {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    credentials: FirebaseCredentials,
}

impl FirebaseIdentityGateway {
    pub fn new(
        config: &IdentityConfig,
        http: reqwest::Client,
        credentials: FirebaseCredentials,
    ) -> Self {
        Self {
            http,
            base_url: config.auth_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            credentials,
        }
    }

    /// Create a boxed gateway for use with dependency injection
    pub fn boxed(
        config: &IdentityConfig,
        http: reqwest::Client,
        credentials: FirebaseCredentials,
    ) -> Arc<dyn IdentityGateway> {
        Arc::new(Self::new(config, http, credentials))
    }

    /// POST an `accounts:{method}` call and decode the JSON answer
    async fn call<B, R>(&self, method: &'static str, body: &B) -> Result<R, AuthError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        tracing::debug!(method, "identity toolkit request");

        let response = self
            .http
            .post(format!("{}/accounts:{}", self.base_url, method))
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match google_error_message(&body) {
                Some(message) => AuthError::Rejected(message),
                None => AuthError::Transport(format!("{method} returned HTTP {status}")),
            });
        }

        response.json::<R>().await.map_err(transport)
    }

    /// Exchange a fresh token for the full account record and remember both
    async fn establish(&self, token: TokenResponse, email: &str) -> Result<Identity, AuthError> {
        let lookup: LookupResponse = self
            .call("lookup", &IdTokenRequest { id_token: &token.id_token })
            .await?;

        let identity = lookup
            .users
            .into_iter()
            .find(|u| u.local_id == token.local_id)
            .map(|u| u.into_identity(email))
            .ok_or_else(|| AuthError::Rejected("USER_NOT_FOUND".to_string()))?;

        self.credentials.set(token.id_token, identity.clone()).await;
        Ok(identity)
    }
}

#[async_trait]
impl IdentityGateway for FirebaseIdentityGateway {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let token: TokenResponse = self
            .call(
                "signInWithPassword",
                &PasswordRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;
        self.establish(token, email).await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let token: TokenResponse = self
            .call(
                "signUp",
                &PasswordRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;

        // The account exists from here on; a failed lookup deletes it again.
        let id_token = token.id_token.clone();
        match self.establish(token, email).await {
            Ok(identity) => Ok(identity),
            Err(e) => {
                tracing::warn!(error = %e, "lookup after sign-up failed, deleting new account");
                let delete: Result<serde_json::Value, _> = self
                    .call("delete", &IdTokenRequest { id_token: &id_token })
                    .await;
                if let Err(delete) = delete {
                    tracing::warn!(error = %delete, "failed to delete new account");
                }
                Err(e)
            }
        }
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        // Firebase sessions are client-side: dropping the token is the sign-out.
        self.credentials.clear().await;
        Ok(())
    }

    async fn update_display_name(
        &self,
        identity: &Identity,
        name: &str,
    ) -> Result<(), AuthError> {
        let id_token = self.credentials.token_for(&identity.id).await?;
        let request = if name.is_empty() {
            UpdateProfileRequest {
                id_token: &id_token,
                display_name: None,
                delete_attribute: vec!["DISPLAY_NAME"],
                return_secure_token: false,
            }
        } else {
            UpdateProfileRequest {
                id_token: &id_token,
                display_name: Some(name),
                delete_attribute: Vec::new(),
                return_secure_token: false,
            }
        };

        let _: serde_json::Value = self.call("update", &request).await?;
        self.credentials
            .set_display_name((!name.is_empty()).then(|| name.to_string()))
            .await;
        Ok(())
    }

    async fn delete_identity(&self, identity: &Identity) -> Result<(), AuthError> {
        let id_token = self.credentials.token_for(&identity.id).await?;
        let _: serde_json::Value = self
            .call("delete", &IdTokenRequest { id_token: &id_token })
            .await?;
        self.credentials.clear().await;
        Ok(())
    }

    async fn current_identity(&self) -> Option<Identity> {
        self.credentials.identity().await
    }
}
