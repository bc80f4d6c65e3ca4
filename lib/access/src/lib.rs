//! OAuth2 authorization code flow for web applications.
//!
//! This crate provides:
//! - Path routing of intercepted requests (`Route`)
//! - The relay state carried through the provider (`RelayState`)
//! - Endpoint resolution and credentials (`Endpoints`, `ClientCredentials`)
//! - The encrypted session principal (`Principal`, `SessionCodec`)
//! - The authorize and callback legs (`WebServerFlow`)
//! - Failure redirects (`failure_location`)
//!
//! The crate performs no I/O. The caller exchanges the authorization code
//! with the provider and owns the session storage through [`SessionSlot`].
//!
//! # Example
//!
//! ```
//! use webflow_access::{FlowConfig, FlowRequest, Route, WebServerFlow};
//!
//! let config = FlowConfig::builder("a-long-token-encryption-key")
//!     .endpoint("login.example.com", "client-key", "client-secret")
//!     .build()
//!     .expect("valid configuration");
//! let flow = WebServerFlow::new(config);
//!
//! assert_eq!(flow.route("/auth/provider"), Route::Authorize);
//!
//! let request = FlowRequest::new("/auth/provider", Some("state=%2Freports"))
//!     .with_host("app.example.com");
//! let authorize = flow.authorize(&request).expect("authorize");
//! assert_eq!(authorize.client_id, "client-key");
//! assert_eq!(authorize.state, "/reports?endpoint=login.example.com");
//! ```

pub mod authorize;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod failure;
pub mod flow;
pub mod params;
pub mod principal;
pub mod relay_state;
pub mod route;
pub mod session;

// Re-export main types at crate root
pub use authorize::AuthorizeRequest;
pub use config::{AuthorizeOptions, EndpointSettings, FlowConfig, FlowConfigBuilder, FlowSettings};
pub use endpoint::{ClientCredentials, Endpoints, parse_domain, sanitize_mydomain};
pub use error::{ConfigError, FlowError, SessionError};
pub use failure::{Phase, failure_location};
pub use flow::{CallbackRequest, FlowRequest, WebServerFlow};
pub use params::RequestParams;
pub use principal::{ClientBinding, Principal, TokenGrant};
pub use relay_state::RelayState;
pub use route::Route;
pub use session::{Persisted, SESSION_KEY, SessionCodec, SessionSlot};
