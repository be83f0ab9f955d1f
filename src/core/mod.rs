//! Core Components
//!
//! HTTP transport and token decoding.

pub mod codec;
pub mod transport;

pub use codec::*;
pub use transport::*;
