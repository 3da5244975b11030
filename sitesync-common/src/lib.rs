//! # SiteSync Common Library
//!
//! Shared code for the SiteSync services including:
//! - Site and material record models
//! - Real-time wire events (client commands, server events)
//! - Session token signing and verification
//! - Configuration loading
//! - Database access for the `sites` and `materials` collections

pub mod auth;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod time;

pub use error::{Error, Result};
pub use models::{Identity, MaterialRecord, Role, Site};
