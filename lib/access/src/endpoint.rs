//! Identity-provider endpoints and their client credentials.
//!
//! Request-supplied endpoint names are routing hints only: the credential
//! pair is always looked up here, server side, and an unknown name degrades
//! to the default endpoint instead of failing.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;
use webflow_core::EndpointId;

/// OAuth2 client id and secret registered for one endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredentials {
    /// The OAuth2 client id.
    key: String,
    /// The OAuth2 client secret.
    secret: String,
}

impl ClientCredentials {
    /// Creates a credential pair.
    #[must_use]
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    /// Returns the OAuth2 client id.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the OAuth2 client secret.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Returns true if both the key and the secret are non-empty.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.key.is_empty() && !self.secret.is_empty()
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("key", &self.key)
            .field("secret", &"[redacted]")
            .finish()
    }
}

/// The validated set of configured endpoints with a designated default.
///
/// Insertion order is kept; unless a default is named explicitly the first
/// valid entry is the default.
#[derive(Debug, Clone)]
pub struct Endpoints {
    entries: Vec<(EndpointId, ClientCredentials)>,
    default: usize,
}

impl Endpoints {
    /// Validates raw endpoint entries.
    ///
    /// Entries with an empty key or secret are dropped. Returns `None` when
    /// nothing survives or when `default` names an entry that did not.
    #[must_use]
    pub fn sanitize(
        raw: impl IntoIterator<Item = (EndpointId, ClientCredentials)>,
        default: Option<&EndpointId>,
    ) -> Option<Self> {
        let mut entries: Vec<(EndpointId, ClientCredentials)> = Vec::new();
        for (id, credentials) in raw {
            if id.as_str().trim().is_empty() || !credentials.is_valid() {
                tracing::warn!(endpoint = %id, "dropping endpoint with empty key or secret");
                continue;
            }
            match entries.iter_mut().find(|(existing, _)| *existing == id) {
                Some(entry) => entry.1 = credentials,
                None => entries.push((id, credentials)),
            }
        }

        if entries.is_empty() {
            return None;
        }

        let default = match default {
            Some(wanted) => entries.iter().position(|(id, _)| id == wanted)?,
            None => 0,
        };

        Some(Self { entries, default })
    }

    /// Designates a different default endpoint.
    ///
    /// Returns `None` if the endpoint is not configured.
    #[must_use]
    pub fn with_default(mut self, endpoint: &EndpointId) -> Option<Self> {
        self.default = self.entries.iter().position(|(id, _)| id == endpoint)?;
        Some(self)
    }

    /// Returns the default endpoint and its credentials.
    #[must_use]
    pub fn default_endpoint(&self) -> (&EndpointId, &ClientCredentials) {
        let (id, credentials) = &self.entries[self.default];
        (id, credentials)
    }

    /// Returns the credentials of a configured endpoint, if any.
    #[must_use]
    pub fn get(&self, endpoint: &str) -> Option<(&EndpointId, &ClientCredentials)> {
        self.entries
            .iter()
            .find(|(id, _)| id.as_str() == endpoint)
            .map(|(id, credentials)| (id, credentials))
    }

    /// Returns true if the endpoint is configured.
    #[must_use]
    pub fn contains(&self, endpoint: &str) -> bool {
        self.get(endpoint).is_some()
    }

    /// Resolves an optional, request-supplied endpoint name.
    ///
    /// Absent or unrecognized names resolve to the default endpoint. The
    /// returned id is always a configured one.
    #[must_use]
    pub fn resolve(&self, requested: Option<&str>) -> (&EndpointId, &ClientCredentials) {
        requested
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .and_then(|name| self.get(name))
            .unwrap_or_else(|| self.default_endpoint())
    }

    /// Returns the credentials for an endpoint, falling back to the default.
    #[must_use]
    pub fn lookup(&self, endpoint: &EndpointId) -> &ClientCredentials {
        self.resolve(Some(endpoint.as_str())).1
    }

    /// Returns the number of configured endpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: a constructed set holds at least one endpoint.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Extracts the host from a URL that may omit its scheme or carry a path.
///
/// Returns `None` for blank input, bare paths and unparsable values.
#[must_use]
pub fn parse_domain(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let lowered = input.to_ascii_lowercase();
    let candidate = if lowered.starts_with("http://") || lowered.starts_with("https://") {
        input.to_string()
    } else if input.starts_with('/') {
        return None;
    } else {
        format!("https://{input}")
    };

    let url = Url::parse(&candidate).ok()?;
    let host = url.host_str()?.trim();
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Canonicalizes a custom-domain parameter to `<subdomain>.<suffix>`.
///
/// Accepts a bare subdomain (`acme`), a full custom-domain host, or a URL
/// with scheme and path.
#[must_use]
pub fn sanitize_mydomain(input: &str, suffix: &str) -> Option<String> {
    let host = parse_domain(input)?;
    let suffix = suffix.trim_matches('.');
    let marker = format!(".{suffix}");
    let subdomain = host.split(marker.as_str()).next().unwrap_or(host.as_str());
    if subdomain.is_empty() {
        return None;
    }
    Some(format!("{subdomain}.{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints() -> Endpoints {
        Endpoints::sanitize(
            vec![
                (
                    EndpointId::from("login.example.com"),
                    ClientCredentials::new("K1", "S1"),
                ),
                (
                    EndpointId::from("test.example.com"),
                    ClientCredentials::new("K2", "S2"),
                ),
            ],
            None,
        )
        .expect("valid endpoints")
    }

    #[test]
    fn first_valid_entry_is_default() {
        let endpoints = endpoints();
        let (id, credentials) = endpoints.default_endpoint();
        assert_eq!(id.as_str(), "login.example.com");
        assert_eq!(credentials.key(), "K1");
    }

    #[test]
    fn invalid_entries_are_dropped() {
        let endpoints = Endpoints::sanitize(
            vec![
                (
                    EndpointId::from("blank.example.com"),
                    ClientCredentials::new("", "S0"),
                ),
                (
                    EndpointId::from("nosecret.example.com"),
                    ClientCredentials::new("K0", ""),
                ),
                (
                    EndpointId::from("test.example.com"),
                    ClientCredentials::new("K2", "S2"),
                ),
            ],
            None,
        )
        .expect("one endpoint survives");

        assert_eq!(endpoints.len(), 1);
        assert!(!endpoints.contains("blank.example.com"));
        assert_eq!(endpoints.default_endpoint().0.as_str(), "test.example.com");
    }

    #[test]
    fn all_invalid_yields_none() {
        let endpoints = Endpoints::sanitize(
            vec![(
                EndpointId::from("login.example.com"),
                ClientCredentials::new("", ""),
            )],
            None,
        );
        assert!(endpoints.is_none());
    }

    #[test]
    fn explicit_default_is_honoured() {
        let default = EndpointId::from("test.example.com");
        let endpoints = Endpoints::sanitize(
            vec![
                (
                    EndpointId::from("login.example.com"),
                    ClientCredentials::new("K1", "S1"),
                ),
                (default.clone(), ClientCredentials::new("K2", "S2")),
            ],
            Some(&default),
        )
        .expect("valid endpoints");
        assert_eq!(endpoints.default_endpoint().0, &default);
    }

    #[test]
    fn unset_endpoint_resolves_to_default() {
        let endpoints = endpoints();
        let (id, credentials) = endpoints.resolve(None);
        assert_eq!(id.as_str(), "login.example.com");
        assert_eq!(credentials, &ClientCredentials::new("K1", "S1"));

        let (id, _) = endpoints.resolve(Some(""));
        assert_eq!(id.as_str(), "login.example.com");
    }

    #[test]
    fn unknown_endpoint_resolves_to_default() {
        let endpoints = endpoints();
        let (id, credentials) = endpoints.resolve(Some("evil.example.net"));
        assert_eq!(id.as_str(), "login.example.com");
        assert_eq!(credentials.secret(), "S1");
    }

    #[test]
    fn known_endpoint_resolves_to_itself() {
        let endpoints = endpoints();
        let (id, credentials) = endpoints.resolve(Some("test.example.com"));
        assert_eq!(id.as_str(), "test.example.com");
        assert_eq!(credentials.key(), "K2");

        let test = EndpointId::from("test.example.com");
        assert_eq!(endpoints.lookup(&test).key(), "K2");
    }

    #[test]
    fn credentials_debug_redacts_secret() {
        let debug = format!("{:?}", ClientCredentials::new("K1", "hunter2"));
        assert!(debug.contains("K1"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn parse_domain_handles_schemes_and_paths() {
        assert_eq!(
            parse_domain("http://my.domain/some/path").as_deref(),
            Some("my.domain")
        );
        assert_eq!(
            parse_domain("https://my.domain/some/path").as_deref(),
            Some("my.domain")
        );
        assert_eq!(
            parse_domain("my.domain/some/path").as_deref(),
            Some("my.domain")
        );
    }

    #[test]
    fn parse_domain_rejects_paths_and_blanks() {
        assert_eq!(parse_domain("/invalid/url"), None);
        assert_eq!(parse_domain(""), None);
        assert_eq!(parse_domain("   "), None);
    }

    #[test]
    fn mydomain_is_canonicalized() {
        let suffix = "my.example.com";
        assert_eq!(
            sanitize_mydomain("acme", suffix).as_deref(),
            Some("acme.my.example.com")
        );
        assert_eq!(
            sanitize_mydomain("acme.my.example.com", suffix).as_deref(),
            Some("acme.my.example.com")
        );
        assert_eq!(
            sanitize_mydomain("https://acme.my.example.com/home", suffix).as_deref(),
            Some("acme.my.example.com")
        );
        assert_eq!(sanitize_mydomain("", suffix), None);
    }
}
