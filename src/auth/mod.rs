//! Request authentication
//!
//! This module provides:
//! - Provider descriptors (header prefixes, scheme tag, error table)
//! - The immutable signing context built from resolved credentials
//! - The shared HMAC-SHA1 signer

pub mod context;
pub mod provider;
pub mod signer;

pub use context::SigningContext;
pub use provider::Provider;
pub use signer::{sign, RequestSigner};
