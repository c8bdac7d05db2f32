//! Wire types shared between the sitedesk console and the site content backend.

pub mod api;
pub mod common;

pub use api::*;
pub use common::*;
