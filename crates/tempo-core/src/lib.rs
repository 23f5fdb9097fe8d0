//! Tempo Core Library
//!
//! This crate provides the domain models, error types, configuration, and the
//! tenancy primitives (context, tenant-owned trait, access checks) shared
//! across all Tempo components.

pub mod config;
pub mod error;
pub mod models;
pub mod tenant;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use tenant::{ensure_access, TenantContext, TenantOwned};
