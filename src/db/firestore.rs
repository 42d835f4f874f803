//! Firestore REST client
//!
//! Minimal plumbing for the Cloud Firestore v1 REST API: document URLs,
//! bearer authentication from the shared Firebase credentials, and the
//! typed-value document encoding. Only string fields are used by the
//! profile store, so only `stringValue` is modelled.

use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::ProfileStoreConfig;
use crate::identity::FirebaseCredentials;

/// Connection settings and HTTP client for one Firestore database
#[derive(Clone)]
pub struct FirestoreClient {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    database: String,
    credentials: FirebaseCredentials,
}

impl FirestoreClient {
    pub fn new(
        config: &ProfileStoreConfig,
        http: reqwest::Client,
        credentials: FirebaseCredentials,
    ) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            project_id: config.project_id.clone(),
            database: config.database.clone(),
            credentials,
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// `.../projects/{project}/databases/{database}/documents/{collection}`
    pub fn collection_url(&self, collection: &str) -> String {
        format!(
            "{}/projects/{}/databases/{}/documents/{}",
            self.base_url, self.project_id, self.database, collection
        )
    }

    pub fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}", self.collection_url(collection), id)
    }

    /// Attach the signed-in user's ID token, if there is one
    pub async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.credentials.id_token().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Firestore typed value; only strings are read or written
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Value {
    #[serde(
        rename = "stringValue",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub string_value: Option<String>,
}

/// Firestore document body (`{"fields": {...}}`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl Document {
    pub fn with_string(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.insert(
            key.to_string(),
            Value {
                string_value: Some(value.into()),
            },
        );
        self
    }

    /// String field, or `""` when missing or of another type
    pub fn string(&self, key: &str) -> &str {
        self.fields
            .get(key)
            .and_then(|v| v.string_value.as_deref())
            .unwrap_or_default()
    }
}

/// Outcome of a non-success Firestore response
pub struct ErrorResponse {
    pub status: StatusCode,
    /// `error.message` when the body is a Google API error
    pub message: Option<String>,
}

impl ErrorResponse {
    pub async fn read(response: reqwest::Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Self {
            status,
            message: crate::identity::firebase::google_error_message(&body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> FirestoreClient {
        let config = ProfileStoreConfig {
            project_id: "kulturelweb".to_string(),
            base_url: "https://firestore.googleapis.com/v1/".to_string(),
            ..ProfileStoreConfig::default()
        };
        FirestoreClient::new(&config, reqwest::Client::new(), FirebaseCredentials::new())
    }

    #[test]
    fn test_document_url() {
        assert_eq!(
            client().document_url("users", "uid-1"),
            "https://firestore.googleapis.com/v1/projects/kulturelweb/databases/(default)/documents/users/uid-1"
        );
    }

    #[test]
    fn test_document_encoding() {
        let doc = Document::default()
            .with_string("firstName", "Ahmet")
            .with_string("lastName", "Yılmaz");
        let json = serde_json::to_value(&doc).unwrap();

        assert_eq!(json["fields"]["firstName"]["stringValue"], "Ahmet");
        assert_eq!(json["fields"]["lastName"]["stringValue"], "Yılmaz");
    }

    #[test]
    fn test_document_decoding_ignores_other_types() {
        let doc: Document = serde_json::from_str(
            r#"{"name":"projects/p/databases/(default)/documents/users/uid-1",
                "fields":{"email":{"stringValue":"a@b.com"},"visits":{"integerValue":"24"}},
                "createTime":"2025-04-15T10:00:00Z"}"#,
        )
        .unwrap();

        assert_eq!(doc.string("email"), "a@b.com");
        assert_eq!(doc.string("visits"), "");
        assert_eq!(doc.string("missing"), "");
    }
}
