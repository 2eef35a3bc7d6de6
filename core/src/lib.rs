//! Credshim Core - Shared Types for the Dynamic Credential Provider Shim
//!
//! This crate provides the error taxonomy and the typed configuration
//! document (loading, validation, defaulting) used across the shim.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{
    DynamicCredentialProviderConfig, MergePolicy, MirrorConfig, MirrorEndpoint, ProviderSpec,
};
pub use error::{Result, ShimError};

/// Credshim version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
