pub mod auth;
pub mod content;
pub mod envelope;

pub use auth::*;
pub use content::*;
pub use envelope::*;
