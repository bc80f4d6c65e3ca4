//! Flow configuration.
//!
//! The configuration is validated once, when the flow is constructed, and is
//! read-only afterwards so it can be shared across concurrent requests.
//! [`FlowSettings`] is the raw, deserializable form; [`FlowConfig`] is the
//! validated form produced by [`FlowConfigBuilder`].

use crate::endpoint::{ClientCredentials, Endpoints};
use crate::error::ConfigError;
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;
use webflow_core::EndpointId;

/// Minimum length of the token encryption key, in bytes.
pub const MIN_ENCRYPTION_KEY_LEN: usize = 16;

/// Default path prefix of the authorize leg.
pub const DEFAULT_PATH_PREFIX: &str = "/auth/provider";

/// Default provider API version attached to loaded principals.
pub const DEFAULT_API_VERSION: &str = "25.0";

/// Default suffix of provider custom domains.
pub const DEFAULT_MYDOMAIN_SUFFIX: &str = "my.salesforce.com";

/// Default provider path of the authorization endpoint.
pub const DEFAULT_AUTHORIZE_PATH: &str = "/services/oauth2/authorize";

/// Default provider path of the token endpoint.
pub const DEFAULT_TOKEN_PATH: &str = "/services/oauth2/token";

/// Operator-supplied key protecting the session principal.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenEncryptionKey(String);

impl TokenEncryptionKey {
    /// Wraps a raw key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for TokenEncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenEncryptionKey([redacted])")
    }
}

/// Static defaults for optional authorize parameters, and whether a
/// request may override each of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizeOptions {
    /// Default `display` value (`page`, `popup`, `touch`, `mobile`).
    pub display: Option<String>,
    /// Default `immediate` value.
    pub immediate: Option<String>,
    /// Default `prompt` value; several prompts are space separated.
    pub prompt: Option<String>,
    /// Default `scope` value; several scopes are space separated.
    pub scope: Option<String>,
    /// Whether a `display` request parameter replaces the default.
    pub display_override: bool,
    /// Whether an `immediate` request parameter replaces the default.
    pub immediate_override: bool,
    /// Whether `prompt` request parameters replace the default.
    pub prompt_override: bool,
    /// Whether `scope` request parameters replace the default.
    pub scope_override: bool,
}

/// Validated configuration of the web-server flow.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    endpoints: Endpoints,
    token_encryption_key: TokenEncryptionKey,
    path_prefix: String,
    authorize: AuthorizeOptions,
    api_version: String,
    debugging: bool,
    mydomain_suffix: String,
    authorize_path: String,
    token_path: String,
    origin: Option<String>,
}

impl FlowConfig {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(token_encryption_key: impl Into<String>) -> FlowConfigBuilder {
        FlowConfigBuilder::new(token_encryption_key)
    }

    /// Returns the configured endpoints.
    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Returns the session encryption key.
    #[must_use]
    pub fn token_encryption_key(&self) -> &TokenEncryptionKey {
        &self.token_encryption_key
    }

    /// Returns the authorize path (also the prefix of the callback path).
    #[must_use]
    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    /// Returns the callback path.
    #[must_use]
    pub fn callback_path(&self) -> String {
        format!("{}/callback", self.path_prefix)
    }

    /// Returns the failure path the default failure policy redirects to.
    #[must_use]
    pub fn failure_path(&self) -> String {
        format!("{}/failure", self.path_prefix)
    }

    /// Returns the authorize parameter defaults and override flags.
    #[must_use]
    pub fn authorize(&self) -> &AuthorizeOptions {
        &self.authorize
    }

    #[must_use]
    pub fn display_override(&self) -> bool {
        self.authorize.display_override
    }

    #[must_use]
    pub fn immediate_override(&self) -> bool {
        self.authorize.immediate_override
    }

    #[must_use]
    pub fn prompt_override(&self) -> bool {
        self.authorize.prompt_override
    }

    #[must_use]
    pub fn scope_override(&self) -> bool {
        self.authorize.scope_override
    }

    /// Returns the provider API version attached to loaded principals.
    #[must_use]
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Returns true when verbose flow tracing is enabled.
    #[must_use]
    pub fn debugging(&self) -> bool {
        self.debugging
    }

    /// Returns the custom-domain suffix (e.g. `my.salesforce.com`).
    #[must_use]
    pub fn mydomain_suffix(&self) -> &str {
        &self.mydomain_suffix
    }

    /// Returns the provider path of the authorization endpoint.
    #[must_use]
    pub fn authorize_path(&self) -> &str {
        &self.authorize_path
    }

    /// Returns the provider path of the token endpoint.
    #[must_use]
    pub fn token_path(&self) -> &str {
        &self.token_path
    }

    /// Returns the fixed public origin, if one is configured.
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }
}

/// Builder for `FlowConfig`.
#[derive(Debug)]
pub struct FlowConfigBuilder {
    endpoints: Vec<(EndpointId, ClientCredentials)>,
    default_endpoint: Option<EndpointId>,
    token_encryption_key: TokenEncryptionKey,
    path_prefix: Option<String>,
    authorize: AuthorizeOptions,
    api_version: Option<String>,
    debugging: bool,
    mydomain_suffix: Option<String>,
    authorize_path: Option<String>,
    token_path: Option<String>,
    origin: Option<String>,
}

impl FlowConfigBuilder {
    /// Creates a new builder with the required encryption key.
    #[must_use]
    pub fn new(token_encryption_key: impl Into<String>) -> Self {
        Self {
            endpoints: Vec::new(),
            default_endpoint: None,
            token_encryption_key: TokenEncryptionKey::new(token_encryption_key),
            path_prefix: None,
            authorize: AuthorizeOptions::default(),
            api_version: None,
            debugging: false,
            mydomain_suffix: None,
            authorize_path: None,
            token_path: None,
            origin: None,
        }
    }

    /// Adds an endpoint. Later entries with the same id replace earlier ones.
    #[must_use]
    pub fn endpoint(
        mut self,
        id: impl Into<EndpointId>,
        key: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        self.endpoints
            .push((id.into(), ClientCredentials::new(key, secret)));
        self
    }

    /// Names the default endpoint instead of the first valid one.
    #[must_use]
    pub fn default_endpoint(mut self, id: impl Into<EndpointId>) -> Self {
        self.default_endpoint = Some(id.into());
        self
    }

    /// Sets the path prefix. Blank values keep the default.
    #[must_use]
    pub fn path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn display(mut self, display: impl Into<String>) -> Self {
        self.authorize.display = Some(display.into());
        self
    }

    #[must_use]
    pub fn immediate(mut self, immediate: impl Into<String>) -> Self {
        self.authorize.immediate = Some(immediate.into());
        self
    }

    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.authorize.prompt = Some(prompt.into());
        self
    }

    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.authorize.scope = Some(scope.into());
        self
    }

    #[must_use]
    pub fn display_override(mut self, enabled: bool) -> Self {
        self.authorize.display_override = enabled;
        self
    }

    #[must_use]
    pub fn immediate_override(mut self, enabled: bool) -> Self {
        self.authorize.immediate_override = enabled;
        self
    }

    #[must_use]
    pub fn prompt_override(mut self, enabled: bool) -> Self {
        self.authorize.prompt_override = enabled;
        self
    }

    #[must_use]
    pub fn scope_override(mut self, enabled: bool) -> Self {
        self.authorize.scope_override = enabled;
        self
    }

    /// Sets the provider API version.
    #[must_use]
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Enables verbose flow tracing.
    #[must_use]
    pub fn debugging(mut self, enabled: bool) -> Self {
        self.debugging = enabled;
        self
    }

    /// Sets the custom-domain suffix.
    #[must_use]
    pub fn mydomain_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.mydomain_suffix = Some(suffix.into());
        self
    }

    /// Sets the provider authorization and token paths.
    #[must_use]
    pub fn provider_paths(
        mut self,
        authorize_path: impl Into<String>,
        token_path: impl Into<String>,
    ) -> Self {
        self.authorize_path = Some(authorize_path.into());
        self.token_path = Some(token_path.into());
        self
    }

    /// Fixes the public origin used to build the callback URL.
    #[must_use]
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Validates the settings and builds the `FlowConfig`.
    ///
    /// # Errors
    ///
    /// Returns an error if no endpoint has a non-empty key and secret, if the
    /// encryption key is shorter than [`MIN_ENCRYPTION_KEY_LEN`] bytes, if
    /// the named default endpoint is not valid, or if the origin is not an
    /// absolute http(s) URL.
    pub fn build(self) -> Result<FlowConfig, Report<ConfigError>> {
        let endpoints = match (
            Endpoints::sanitize(self.endpoints, None),
            &self.default_endpoint,
        ) {
            (None, _) => return Err(ConfigError::NoValidEndpoints.into()),
            (Some(valid), None) => valid,
            (Some(valid), Some(wanted)) => valid.with_default(wanted).ok_or_else(|| {
                ConfigError::UnknownDefaultEndpoint {
                    endpoint: wanted.to_string(),
                }
            })?,
        };

        let key_len = self.token_encryption_key.as_bytes().len();
        if key_len < MIN_ENCRYPTION_KEY_LEN {
            return Err(ConfigError::EncryptionKeyTooShort {
                length: key_len,
                minimum: MIN_ENCRYPTION_KEY_LEN,
            }
            .into());
        }

        let path_prefix = self
            .path_prefix
            .as_deref()
            .map(|p| p.trim().trim_end_matches('/'))
            .filter(|p| !p.is_empty())
            .map(|p| {
                if p.starts_with('/') {
                    p.to_string()
                } else {
                    format!("/{p}")
                }
            })
            .unwrap_or_else(|| DEFAULT_PATH_PREFIX.to_string());

        let origin = match self.origin.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                let url = Url::parse(raw).map_err(|e| ConfigError::InvalidSetting {
                    setting: "origin",
                    reason: e.to_string(),
                })?;
                if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
                    return Err(ConfigError::InvalidSetting {
                        setting: "origin",
                        reason: format!("'{raw}' is not an absolute http(s) URL"),
                    }
                    .into());
                }
                Some(url.origin().ascii_serialization())
            }
        };

        let authorize = AuthorizeOptions {
            scope: self.authorize.scope.filter(|s| !s.trim().is_empty()),
            ..self.authorize
        };

        Ok(FlowConfig {
            endpoints,
            token_encryption_key: self.token_encryption_key,
            path_prefix,
            authorize,
            api_version: non_blank(self.api_version, DEFAULT_API_VERSION),
            debugging: self.debugging,
            mydomain_suffix: non_blank(self.mydomain_suffix, DEFAULT_MYDOMAIN_SUFFIX),
            authorize_path: non_blank(self.authorize_path, DEFAULT_AUTHORIZE_PATH),
            token_path: non_blank(self.token_path, DEFAULT_TOKEN_PATH),
            origin,
        })
    }
}

fn non_blank(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Raw endpoint credentials as they appear in configuration sources.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct EndpointSettings {
    /// Consumer key.
    #[serde(default)]
    pub key: String,
    /// Consumer secret.
    #[serde(default)]
    pub secret: String,
}

impl fmt::Debug for EndpointSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointSettings")
            .field("key", &self.key)
            .field("secret", &"[redacted]")
            .finish()
    }
}

/// Deserializable flow settings.
///
/// Fields with defaults can be omitted when loading from environment
/// variables. Endpoint maps are unordered in most sources, so endpoints are
/// taken in id order and `default_endpoint` should be set when the first id
/// is not the intended default.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct FlowSettings {
    #[serde(default)]
    pub endpoints: BTreeMap<String, EndpointSettings>,
    #[serde(default)]
    pub default_endpoint: Option<String>,
    #[serde(default)]
    pub token_encryption_key: String,
    #[serde(default)]
    pub path_prefix: Option<String>,
    #[serde(default)]
    pub display: Option<String>,
    #[serde(default)]
    pub immediate: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub display_override: bool,
    #[serde(default)]
    pub immediate_override: bool,
    #[serde(default)]
    pub prompt_override: bool,
    #[serde(default)]
    pub scope_override: bool,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub debugging: bool,
    #[serde(default)]
    pub mydomain_suffix: Option<String>,
    #[serde(default)]
    pub authorize_path: Option<String>,
    #[serde(default)]
    pub token_path: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
}

impl fmt::Debug for FlowSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowSettings")
            .field("endpoints", &self.endpoints)
            .field("default_endpoint", &self.default_endpoint)
            .field("token_encryption_key", &"[redacted]")
            .field("path_prefix", &self.path_prefix)
            .field("display", &self.display)
            .field("immediate", &self.immediate)
            .field("prompt", &self.prompt)
            .field("scope", &self.scope)
            .field("display_override", &self.display_override)
            .field("immediate_override", &self.immediate_override)
            .field("prompt_override", &self.prompt_override)
            .field("scope_override", &self.scope_override)
            .field("api_version", &self.api_version)
            .field("debugging", &self.debugging)
            .field("mydomain_suffix", &self.mydomain_suffix)
            .field("authorize_path", &self.authorize_path)
            .field("token_path", &self.token_path)
            .field("origin", &self.origin)
            .finish()
    }
}

impl FlowSettings {
    /// Validates the settings into a `FlowConfig`.
    ///
    /// # Errors
    ///
    /// See [`FlowConfigBuilder::build`].
    pub fn into_config(self) -> Result<FlowConfig, Report<ConfigError>> {
        let mut builder = FlowConfig::builder(self.token_encryption_key)
            .display_override(self.display_override)
            .immediate_override(self.immediate_override)
            .prompt_override(self.prompt_override)
            .scope_override(self.scope_override)
            .debugging(self.debugging);

        for (id, credentials) in self.endpoints {
            builder = builder.endpoint(id, credentials.key, credentials.secret);
        }
        if let Some(default) = self.default_endpoint {
            builder = builder.default_endpoint(default);
        }
        if let Some(prefix) = self.path_prefix {
            builder = builder.path_prefix(prefix);
        }
        if let Some(display) = self.display {
            builder = builder.display(display);
        }
        if let Some(immediate) = self.immediate {
            builder = builder.immediate(immediate);
        }
        if let Some(prompt) = self.prompt {
            builder = builder.prompt(prompt);
        }
        if let Some(scope) = self.scope {
            builder = builder.scope(scope);
        }
        if let Some(version) = self.api_version {
            builder = builder.api_version(version);
        }
        if let Some(suffix) = self.mydomain_suffix {
            builder = builder.mydomain_suffix(suffix);
        }
        builder = builder.provider_paths(
            self.authorize_path.unwrap_or_default(),
            self.token_path.unwrap_or_default(),
        );
        if let Some(origin) = self.origin {
            builder = builder.origin(origin);
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "9rg/hsK8ZSi+jc8R40ruJQ==";

    fn builder() -> FlowConfigBuilder {
        FlowConfig::builder(KEY)
            .endpoint("login.example.com", "K1", "S1")
            .endpoint("test.example.com", "K2", "S2")
    }

    #[test]
    fn defaults_are_applied() {
        let config = builder().build().expect("valid config");

        assert_eq!(config.path_prefix(), "/auth/provider");
        assert_eq!(config.callback_path(), "/auth/provider/callback");
        assert_eq!(config.failure_path(), "/auth/provider/failure");
        assert_eq!(config.api_version(), "25.0");
        assert!(!config.display_override());
        assert!(!config.immediate_override());
        assert!(!config.prompt_override());
        assert!(!config.scope_override());
        assert!(!config.debugging());
        assert_eq!(config.authorize_path(), "/services/oauth2/authorize");
        assert_eq!(config.token_path(), "/services/oauth2/token");
        assert!(config.origin().is_none());
        assert_eq!(
            config.endpoints().default_endpoint().0.as_str(),
            "login.example.com"
        );
    }

    #[test]
    fn missing_endpoints_fail() {
        let err = FlowConfig::builder(KEY).build().unwrap_err();
        assert_eq!(err.current_context(), &ConfigError::NoValidEndpoints);
    }

    #[test]
    fn endpoints_without_secrets_fail() {
        let err = FlowConfig::builder(KEY)
            .endpoint("login.example.com", "K1", "")
            .build()
            .unwrap_err();
        assert_eq!(err.current_context(), &ConfigError::NoValidEndpoints);
    }

    #[test]
    fn short_encryption_key_fails() {
        let err = FlowConfig::builder("invalid")
            .endpoint("login.example.com", "K1", "S1")
            .build()
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            ConfigError::EncryptionKeyTooShort { length: 7, .. }
        ));
    }

    #[test]
    fn unknown_default_endpoint_fails() {
        let err = builder()
            .default_endpoint("other.example.com")
            .build()
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            ConfigError::UnknownDefaultEndpoint { .. }
        ));
    }

    #[test]
    fn explicit_default_endpoint_is_used() {
        let config = builder()
            .default_endpoint("test.example.com")
            .build()
            .expect("valid config");
        assert_eq!(
            config.endpoints().default_endpoint().0.as_str(),
            "test.example.com"
        );
        assert_eq!(config.endpoints().len(), 2);
    }

    #[test]
    fn path_prefix_is_normalized() {
        let config = builder().path_prefix("auth/sso/").build().expect("valid");
        assert_eq!(config.path_prefix(), "/auth/sso");

        let config = builder().path_prefix("   ").build().expect("valid");
        assert_eq!(config.path_prefix(), "/auth/provider");
    }

    #[test]
    fn blank_scope_is_dropped() {
        let config = builder().scope("  ").build().expect("valid");
        assert!(config.authorize().scope.is_none());
    }

    #[test]
    fn origin_keeps_scheme_host_and_port() {
        let config = builder()
            .origin("https://app.example.com:8443/ignored")
            .build()
            .expect("valid");
        assert_eq!(config.origin(), Some("https://app.example.com:8443"));

        let err = builder().origin("app.example.com").build().unwrap_err();
        assert!(matches!(
            err.current_context(),
            ConfigError::InvalidSetting {
                setting: "origin",
                ..
            }
        ));
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let json = r#"{
            "endpoints": {
                "test.example.com": { "key": "K2", "secret": "S2" },
                "login.example.com": { "key": "K1", "secret": "S1" }
            },
            "token_encryption_key": "9rg/hsK8ZSi+jc8R40ruJQ==",
            "prompt_override": true
        }"#;

        let settings: FlowSettings = serde_json::from_str(json).expect("deserialize");
        let config = settings.into_config().expect("valid config");

        assert!(config.prompt_override());
        assert_eq!(config.path_prefix(), "/auth/provider");
        assert_eq!(
            config.endpoints().default_endpoint().0.as_str(),
            "login.example.com"
        );
    }

    #[test]
    fn encryption_key_debug_is_redacted() {
        let config = builder().build().expect("valid");
        assert!(!format!("{config:?}").contains(KEY));
    }

    #[test]
    fn settings_debug_hides_secrets_and_key() {
        let mut settings = FlowSettings {
            token_encryption_key: KEY.to_string(),
            ..FlowSettings::default()
        };
        settings.endpoints.insert(
            "login.example.com".to_string(),
            EndpointSettings {
                key: "K1".to_string(),
                secret: "hunter2-secret".to_string(),
            },
        );

        let rendered = format!("{settings:?}");
        assert!(rendered.contains("K1"));
        assert!(!rendered.contains("hunter2-secret"));
        assert!(!rendered.contains(KEY));
    }
}
