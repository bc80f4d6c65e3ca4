//! Optional authorize parameters and their request overrides.
//!
//! `display`, `immediate`, `prompt` and `scope` have static defaults in the
//! configuration. When a parameter's override flag is set, a value supplied
//! on the authorize request replaces the default. `prompt` and `scope` may be
//! repeated; all occurrences are joined with a single space.

use crate::config::AuthorizeOptions;
use crate::params::RequestParams;
use webflow_core::EndpointId;

/// Everything needed to redirect the user agent to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeRequest {
    /// Endpoint whose credentials are used and recorded in the relay state.
    pub endpoint: EndpointId,
    /// Provider host the user agent is sent to.
    pub site: String,
    /// Absolute URL of the provider's authorization endpoint.
    pub authorize_url: String,
    /// Consumer key of the endpoint, sent as `client_id`.
    ///
    /// The consumer secret stays out of this leg; only the token request
    /// carries it.
    pub client_id: String,
    /// Callback URL on this application.
    pub redirect_uri: String,
    /// Rendered relay state.
    pub state: String,
    /// Optional parameters after overrides, in a fixed order.
    pub params: Vec<(&'static str, String)>,
}

impl AuthorizeRequest {
    /// Returns the value of an optional parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Computes the optional authorize parameters for a request.
#[must_use]
pub fn authorize_params(
    options: &AuthorizeOptions,
    request: &RequestParams,
) -> Vec<(&'static str, String)> {
    let display = single(
        options.display.as_deref(),
        options.display_override,
        request,
        "display",
    );
    let immediate = single(
        options.immediate.as_deref(),
        options.immediate_override,
        request,
        "immediate",
    );
    let prompt = repeated(
        options.prompt.as_deref(),
        options.prompt_override,
        request,
        "prompt",
    );
    let scope = repeated(
        options.scope.as_deref(),
        options.scope_override,
        request,
        "scope",
    )
    .filter(|s| !s.trim().is_empty());

    [
        ("display", display),
        ("immediate", immediate),
        ("prompt", prompt),
        ("scope", scope),
    ]
    .into_iter()
    .filter_map(|(name, value)| value.map(|v| (name, v)))
    .collect()
}

fn single(
    default: Option<&str>,
    override_enabled: bool,
    request: &RequestParams,
    name: &str,
) -> Option<String> {
    let requested = override_enabled
        .then(|| request.get(name))
        .flatten()
        .map(str::to_string);
    requested.or_else(|| default.map(str::to_string))
}

fn repeated(
    default: Option<&str>,
    override_enabled: bool,
    request: &RequestParams,
    name: &str,
) -> Option<String> {
    let requested = override_enabled
        .then(|| request.all(name).join(" "))
        .filter(|joined| !joined.trim().is_empty());
    requested.or_else(|| default.map(str::to_string))
}
