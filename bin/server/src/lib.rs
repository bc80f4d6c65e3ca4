//! webflow HTTP server.
//!
//! This crate provides the axum/tower binding of the OAuth2 web-server flow:
//! - `WebServerFlowLayer`, the interception middleware
//! - `PrincipalHandle`, the request extension and extractor for the principal
//! - The OAuth2 provider client (`OAuth2Exchanger`)
//! - The cookie-backed session slot
//! - A small demo application

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod provider;
pub mod slot;

pub use config::{CookieConfig, ServerConfig};
pub use error::ServerError;
pub use middleware::{
    FlowFailure, OnFailure, PrincipalHandle, RedirectToFailure, WebServerFlowLayer,
    WebServerFlowService,
};
pub use provider::{OAuth2Exchanger, TokenExchanger};
