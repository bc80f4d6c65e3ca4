//! Centralized server configuration.
//!
//! Loaded via the `config` crate from an optional `webflow.{toml,json,yaml}`
//! file in the working directory, then from `WEBFLOW__*` environment
//! variables (`__` separates nesting levels). Endpoint ids usually contain
//! dots, which environment variable names cannot carry, so endpoints are
//! normally declared in the file:
//!
//! ```toml
//! [flow]
//! token_encryption_key = "..."
//! default_endpoint = "login.salesforce.com"
//!
//! [flow.endpoints."login.salesforce.com"]
//! key = "..."
//! secret = "..."
//! ```
//!
//! See [`FlowSettings`] for the flow options.

use rootcause::prelude::Report;
use serde::Deserialize;
use webflow_access::{ConfigError, FlowConfig, FlowSettings, SESSION_KEY};

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address the listener binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Session cookie configuration.
    #[serde(default)]
    pub cookie: CookieConfig,

    /// Web-server flow configuration.
    #[serde(default)]
    pub flow: FlowSettings,
}

/// Cookie that carries the encrypted principal.
#[derive(Debug, Clone, Deserialize)]
pub struct CookieConfig {
    #[serde(default = "default_cookie_name")]
    pub name: String,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Defaults to true for production safety; set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure: bool,
}

fn default_bind_address() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_cookie_name() -> String {
    SESSION_KEY.to_string()
}

fn default_secure_cookies() -> bool {
    true
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: default_cookie_name(),
            secure: default_secure_cookies(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from the optional file and environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be read or deserialized.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_sources(environment())
    }

    fn from_sources(environment: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("webflow").required(false))
            .add_source(environment)
            .build()?
            .try_deserialize()
    }

    /// Validates the flow settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the endpoints or encryption key are invalid.
    pub fn flow_config(&self) -> Result<FlowConfig, Report<ConfigError>> {
        self.flow.clone().into_config()
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("WEBFLOW")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "9rg/hsK8ZSi+jc8R40ruJQ==";

    fn load(vars: &[(&str, &str)]) -> ServerConfig {
        let map = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect::<config::Map<String, String>>();
        ServerConfig::from_sources(environment().source(Some(map))).expect("load config")
    }

    #[test]
    fn cookie_config_has_correct_defaults() {
        let config = CookieConfig::default();
        assert_eq!(config.name, "webflow.principal");
        assert!(config.secure);
    }

    #[test]
    fn loads_flow_settings_from_environment() {
        let config = load(&[
            ("WEBFLOW__BIND_ADDRESS", "0.0.0.0:8080"),
            ("WEBFLOW__COOKIE__SECURE", "false"),
            ("WEBFLOW__FLOW__TOKEN_ENCRYPTION_KEY", KEY),
            ("WEBFLOW__FLOW__ENDPOINTS__SANDBOX__KEY", "K1"),
            ("WEBFLOW__FLOW__ENDPOINTS__SANDBOX__SECRET", "S1"),
            ("WEBFLOW__FLOW__PROMPT_OVERRIDE", "true"),
        ]);

        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert!(!config.cookie.secure);
        assert_eq!(config.cookie.name, "webflow.principal");

        let flow = config.flow_config().expect("valid flow config");
        assert!(flow.prompt_override());
        assert_eq!(flow.endpoints().default_endpoint().0.as_str(), "sandbox");
        assert_eq!(flow.endpoints().default_endpoint().1.key(), "K1");
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = load(&[
            ("WEBFLOW__FLOW__TOKEN_ENCRYPTION_KEY", KEY),
            ("WEBFLOW__FLOW__ENDPOINTS__SANDBOX__KEY", "K1"),
            ("WEBFLOW__FLOW__ENDPOINTS__SANDBOX__SECRET", "hunter2"),
        ]);

        let rendered = format!("{config:?}");
        assert!(rendered.contains("sandbox"));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains(KEY));
    }

    #[test]
    fn missing_endpoints_fail_validation() {
        let config = load(&[("WEBFLOW__FLOW__TOKEN_ENCRYPTION_KEY", KEY)]);
        let err = config.flow_config().unwrap_err();
        assert_eq!(err.current_context(), &ConfigError::NoValidEndpoints);
    }
}
