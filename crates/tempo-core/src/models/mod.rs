//! Data models for the application
//!
//! This module contains all data structures used throughout the application,
//! organized by domain. Each sub-module represents a specific feature area.

mod client;
mod membership;
mod organization;
mod project;
mod user;

// Re-export all models for convenient imports
pub use client::*;
pub use membership::*;
pub use organization::*;
pub use project::*;
pub use user::*;
