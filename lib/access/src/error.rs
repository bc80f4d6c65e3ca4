//! Error types for the webflow-access crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `ConfigError`: Invalid flow configuration (fatal at startup)
//! - `FlowError`: Failures inside the authorize/callback legs
//! - `SessionError`: Failures encoding or decoding the session principal

use std::fmt;

/// Errors raised while validating the flow configuration.
///
/// These abort initialization; a flow is never constructed from an
/// invalid configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No endpoint survived validation.
    NoValidEndpoints,
    /// The token encryption key is missing or shorter than required.
    EncryptionKeyTooShort { length: usize, minimum: usize },
    /// The explicitly configured default endpoint is not among the valid endpoints.
    UnknownDefaultEndpoint { endpoint: String },
    /// A configured path or origin could not be used.
    InvalidSetting {
        setting: &'static str,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoValidEndpoints => write!(
                f,
                "endpoints are invalid: configure at least one endpoint with a non-empty key and secret"
            ),
            Self::EncryptionKeyTooShort { length, minimum } => write!(
                f,
                "token encryption key is invalid: expected at least {minimum} bytes, got {length}"
            ),
            Self::UnknownDefaultEndpoint { endpoint } => {
                write!(f, "default endpoint '{endpoint}' is not a valid configured endpoint")
            }
            Self::InvalidSetting { setting, reason } => {
                write!(f, "invalid {setting}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors raised during the authorize or callback legs.
///
/// Every variant is caught at the flow boundary and turned into a
/// failure redirect; none reaches the user agent as a raw error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// The identity provider redirected back with an error parameter.
    Provider {
        error: String,
        description: Option<String>,
    },
    /// The callback carried no authorization code.
    MissingCode,
    /// The relay state could not be parsed.
    InvalidRelayState { reason: String },
    /// The provider site for an endpoint could not be determined.
    InvalidSite { site: String },
    /// The redirect or callback URL could not be built.
    InvalidRedirect { reason: String },
    /// Exchanging the authorization code for tokens failed.
    Exchange { details: String },
    /// The token response did not identify the user.
    InvalidIdentity { id_url: String },
    /// The authenticated principal could not be written to the session.
    Session { details: String },
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provider {
                error,
                description: Some(description),
            } => write!(f, "{error} {description}"),
            Self::Provider {
                error,
                description: None,
            } => f.write_str(error),
            Self::MissingCode => write!(f, "callback is missing the authorization code"),
            Self::InvalidRelayState { reason } => write!(f, "invalid relay state: {reason}"),
            Self::InvalidSite { site } => write!(f, "cannot determine provider host for '{site}'"),
            Self::InvalidRedirect { reason } => write!(f, "invalid redirect: {reason}"),
            Self::Exchange { details } => write!(f, "token exchange failed: {details}"),
            Self::InvalidIdentity { id_url } => {
                write!(f, "identity url '{id_url}' does not name an organization and user")
            }
            Self::Session { details } => write!(f, "failed to store session: {details}"),
        }
    }
}

impl std::error::Error for FlowError {}

/// Errors raised by the session credential codec.
///
/// Decoding failures never interrupt a request; they are logged and the
/// request proceeds anonymously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Serializing or encrypting the principal failed.
    Encode { details: String },
    /// The stored blob could not be decoded, decrypted or deserialized.
    Decode { details: String },
    /// The stored principal names an endpoint that is no longer configured.
    StaleEndpoint { endpoint: String },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode { details } => write!(f, "failed to encode session principal: {details}"),
            Self::Decode { details } => write!(f, "failed to decode session principal: {details}"),
            Self::StaleEndpoint { endpoint } => {
                write!(f, "session endpoint '{endpoint}' is no longer configured")
            }
        }
    }
}

impl std::error::Error for SessionError {}
