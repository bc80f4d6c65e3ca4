//! Core domain types for webflow.
//!
//! This crate provides the identifier types shared by the flow library and
//! the HTTP server.

pub mod id;

pub use id::{EndpointId, OrgId, UserId};
