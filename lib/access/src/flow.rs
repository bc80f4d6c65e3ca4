//! The web-server flow: routing, authorize leg, callback leg.
//!
//! [`WebServerFlow`] holds only validated, read-only configuration. All
//! request-scoped data travels in a [`FlowRequest`] built fresh for every
//! request, so one flow can serve concurrent requests without locking.

use crate::authorize::{AuthorizeRequest, authorize_params};
use crate::config::FlowConfig;
use crate::endpoint::{ClientCredentials, parse_domain, sanitize_mydomain};
use crate::error::FlowError;
use crate::failure::failure_location;
use crate::params::RequestParams;
use crate::principal::{Principal, TokenGrant};
use crate::relay_state::RelayState;
use crate::route::Route;
use crate::session::{SessionCodec, SessionSlot};
use rootcause::prelude::Report;
use webflow_core::EndpointId;

/// Emits a flow trace at `info` when debugging is enabled, else at `debug`.
macro_rules! flow_trace {
    ($debugging:expr, $($arg:tt)+) => {
        if $debugging {
            tracing::info!($($arg)+);
        } else {
            tracing::debug!($($arg)+);
        }
    };
}

/// Request-scoped input to the flow.
#[derive(Debug, Clone, Default)]
pub struct FlowRequest {
    /// Request path, without query.
    pub path: String,
    /// Decoded query parameters.
    pub params: RequestParams,
    /// Value of the `Host` header.
    pub host: Option<String>,
    /// Value of the `X-Forwarded-Proto` header.
    pub forwarded_proto: Option<String>,
}

impl FlowRequest {
    /// Creates a request from its path and raw query string.
    #[must_use]
    pub fn new(path: impl Into<String>, query: Option<&str>) -> Self {
        Self {
            path: path.into(),
            params: RequestParams::from_query(query),
            host: None,
            forwarded_proto: None,
        }
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn with_forwarded_proto(mut self, proto: impl Into<String>) -> Self {
        self.forwarded_proto = Some(proto.into());
        self
    }

    /// Returns the caller's `state` parameter, if any.
    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.params.get("state")
    }
}

/// Everything needed to exchange the authorization code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackRequest {
    /// Endpoint recovered from the relay state, after default fallback.
    pub endpoint: EndpointId,
    pub credentials: ClientCredentials,
    /// Provider host the code is exchanged with.
    pub site: String,
    /// Absolute URL of the provider's token endpoint.
    pub token_url: String,
    pub code: String,
    /// Must equal the `redirect_uri` sent on the authorize leg.
    pub redirect_uri: String,
    /// The caller's original destination, `endpoint` removed.
    pub destination: String,
}

/// The OAuth2 authorization code flow over a set of endpoints.
#[derive(Debug, Clone)]
pub struct WebServerFlow {
    config: FlowConfig,
    codec: SessionCodec,
}

impl WebServerFlow {
    /// Creates a flow for a validated configuration.
    #[must_use]
    pub fn new(config: FlowConfig) -> Self {
        let codec = SessionCodec::new(&config);
        Self { config, codec }
    }

    #[must_use]
    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Classifies a request path.
    #[must_use]
    pub fn route(&self, path: &str) -> Route {
        Route::classify(path, self.config.path_prefix())
    }

    /// Prepares the authorize leg.
    ///
    /// The endpoint comes from the `endpoint` parameter (default on absence
    /// or miss). A `mydomain` parameter changes only the provider host; the
    /// relay state still records the resolved endpoint for the callback.
    pub fn authorize(&self, request: &FlowRequest) -> Result<AuthorizeRequest, Report<FlowError>> {
        let debugging = self.config.debugging();
        let (endpoint, credentials) = self
            .config
            .endpoints()
            .resolve(request.params.get("endpoint"));
        let mydomain = request
            .params
            .get("mydomain")
            .and_then(|raw| sanitize_mydomain(raw, self.config.mydomain_suffix()));

        let state = RelayState::build(request.state(), endpoint)?;
        flow_trace!(
            debugging,
            endpoint = %endpoint,
            mydomain = mydomain.as_deref().unwrap_or(""),
            state = %state,
            "authorize phase"
        );

        let site_source = mydomain.as_deref().unwrap_or(endpoint.as_str());
        let site = parse_domain(site_source).ok_or_else(|| FlowError::InvalidSite {
            site: site_source.to_string(),
        })?;

        Ok(AuthorizeRequest {
            endpoint: endpoint.clone(),
            authorize_url: format!("https://{site}{}", self.config.authorize_path()),
            site,
            client_id: credentials.key().to_string(),
            redirect_uri: self.callback_url(request)?,
            state: state.to_string(),
            params: authorize_params(self.config.authorize(), &request.params),
        })
    }

    /// Prepares the callback leg.
    ///
    /// Fails when the provider returned an error or no code, or when the
    /// relay state cannot be read.
    pub fn callback(&self, request: &FlowRequest) -> Result<CallbackRequest, Report<FlowError>> {
        if let Some(error) = request.params.get_non_blank("error") {
            return Err(FlowError::Provider {
                error: error.trim().to_string(),
                description: request
                    .params
                    .get_non_blank("error_description")
                    .map(|d| d.trim().to_string()),
            }
            .into());
        }

        let code = request
            .params
            .get_non_blank("code")
            .ok_or(FlowError::MissingCode)?;

        let (requested, remaining) = RelayState::parse(request.state())?.extract_endpoint();
        let (endpoint, credentials) = self.config.endpoints().resolve(requested.as_deref());
        flow_trace!(
            self.config.debugging(),
            endpoint = %endpoint,
            requested = requested.as_deref().unwrap_or(""),
            destination = %remaining,
            "callback phase"
        );

        let site = parse_domain(endpoint.as_str()).ok_or_else(|| FlowError::InvalidSite {
            site: endpoint.to_string(),
        })?;

        Ok(CallbackRequest {
            endpoint: endpoint.clone(),
            credentials: credentials.clone(),
            token_url: format!("https://{site}{}", self.config.token_path()),
            site,
            code: code.to_string(),
            redirect_uri: self.callback_url(request)?,
            destination: remaining.finalize(),
        })
    }

    /// Finishes the callback leg after a successful token exchange.
    ///
    /// Stores the new principal in the slot and returns the destination.
    pub fn complete(
        &self,
        callback: &CallbackRequest,
        grant: TokenGrant,
        slot: &mut impl SessionSlot,
    ) -> Result<String, Report<FlowError>> {
        let id_url = grant.id_url.clone();
        let mut principal = Principal::from_grant(callback.endpoint.clone(), grant)
            .ok_or(FlowError::InvalidIdentity { id_url })?;

        self.codec
            .save(slot, Some(&mut principal))
            .map_err(|e| FlowError::Session {
                details: e.to_string(),
            })?;

        flow_trace!(
            self.config.debugging(),
            endpoint = %principal.endpoint(),
            user_id = %principal.user_id(),
            destination = %callback.destination,
            "principal stored"
        );
        Ok(callback.destination.clone())
    }

    /// Loads the principal for a pass-through request.
    #[must_use]
    pub fn load_principal(&self, slot: &impl SessionSlot) -> Option<Principal> {
        self.codec.load(slot.get())
    }

    /// Re-persists the principal after the application ran.
    ///
    /// Encoding failures are logged; the slot is left as it was.
    pub fn save_principal(&self, slot: &mut impl SessionSlot, principal: Option<&mut Principal>) {
        if let Err(report) = self.codec.save(slot, principal) {
            tracing::error!(error = %report, "failed to persist session principal");
        }
    }

    /// Returns the default failure redirect for an error message.
    #[must_use]
    pub fn failure_location(&self, message: &str, state: Option<&str>) -> String {
        failure_location(&self.config.failure_path(), message, state)
    }

    /// Builds the absolute callback URL.
    ///
    /// A configured origin wins; otherwise the request's `Host` header is
    /// used, with `https` when `X-Forwarded-Proto` says so.
    pub fn callback_url(&self, request: &FlowRequest) -> Result<String, Report<FlowError>> {
        let origin = match self.config.origin() {
            Some(origin) => origin.to_string(),
            None => {
                let host = request
                    .host
                    .as_deref()
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .ok_or_else(|| FlowError::InvalidRedirect {
                        reason: "request has no Host header".to_string(),
                    })?;
                let scheme = match request.forwarded_proto.as_deref() {
                    Some(proto) if proto.trim().eq_ignore_ascii_case("https") => "https",
                    _ => "http",
                };
                format!("{scheme}://{host}")
            }
        };
        Ok(format!("{origin}{}", self.config.callback_path()))
    }
}
