//! HTTP handlers, one module per resource.

pub mod admin;
pub mod clients;
pub mod members;
pub mod organizations;
pub mod projects;
