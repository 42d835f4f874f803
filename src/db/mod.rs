//! Document store layer
//!
//! This module provides access to the hosted profile document store.
//! It supports:
//! - Cloud Firestore over its REST API (production)
//! - An in-memory store (tests and local runs)
//!
//! # Usage
//!
//! ```ignore
//! use kesif::config::ProfileStoreConfig;
//! use kesif::db::{FirestoreClient, repositories::FirestoreProfileRepository};
//! use kesif::identity::FirebaseCredentials;
//!
//! let config = ProfileStoreConfig::default();
//! let client = FirestoreClient::new(&config, reqwest::Client::new(), FirebaseCredentials::new());
//! let profiles = FirestoreProfileRepository::boxed(client, &config.collection);
//! let doc = profiles.get(&user_id).await?;
//! ```

pub mod firestore;
pub mod repositories;

pub use firestore::FirestoreClient;
