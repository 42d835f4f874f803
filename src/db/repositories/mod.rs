//! Document store repositories
//!
//! Repository pattern implementations for the hosted document store.
//! Each repository handles the operations for one collection.

pub mod profile;

pub use profile::{
    FirestoreProfileRepository, InMemoryProfileRepository, ProfileRepository, StoreCall,
    StoreError,
};
