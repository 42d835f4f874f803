//! Services layer - Business logic
//!
//! This module contains the account flows of the app and the session they
//! maintain. Services are responsible for:
//! - Validating form input before any remote call
//! - Coordinating the identity gateway and the profile store
//! - Keeping the session consistent with both

pub mod account;
pub mod session;

pub use account::{
    AccountError, AccountService, AuthRequest, Operation, StateError, WriteStep,
};
pub use session::{SessionReader, SessionWriter};
