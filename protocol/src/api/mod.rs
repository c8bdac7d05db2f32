//! API DTOs module
//!
//! This module contains request and query objects organized by domain:
//! - `auth`: login, logout and password management
//! - `content`: listing queries and create-payload validation for content kinds

pub mod auth;
pub mod content;

pub use auth::*;
pub use content::*;
