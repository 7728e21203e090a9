//! Token material: redacted secrets, cached tokens, and rendered authentication headers.

pub mod secret;
pub mod token;

pub use secret::*;
pub use token::*;
