//! Kesif - accounts and profiles for the Kesif cultural places app
//!
//! This library provides sign-in, sign-up, sign-out and profile editing
//! over a hosted identity service and a profile document store, plus the
//! observable session the presentation layer renders from.

pub mod app;
pub mod config;
pub mod db;
pub mod identity;
pub mod models;
pub mod services;

pub use app::AppContext;
