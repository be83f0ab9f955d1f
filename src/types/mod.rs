//! Auth Types
//!
//! Core type definitions for the authenticated request layer.

pub mod claims;
pub mod config;
pub mod session;
pub mod token;
pub mod wire;

pub use claims::*;
pub use config::*;
pub use session::*;
pub use token::*;
pub use wire::*;
