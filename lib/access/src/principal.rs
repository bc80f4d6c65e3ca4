//! The authenticated principal and its token material.
//!
//! A principal is created by the callback leg after a successful token
//! exchange, handed to the wrapped application on every later request, and
//! written back to the session afterwards. The client binding (client id,
//! client secret, API version, debug flag) is server-side configuration and
//! is never serialized: it is attached after every load.

use crate::endpoint::{ClientCredentials, parse_domain};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use webflow_core::{EndpointId, OrgId, UserId};

/// Server-side client settings attached to a loaded principal.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientBinding {
    pub client_id: String,
    pub client_secret: String,
    pub api_version: String,
    pub debugging: bool,
}

impl ClientBinding {
    /// Builds a binding from endpoint credentials.
    #[must_use]
    pub fn new(credentials: &ClientCredentials, api_version: &str, debugging: bool) -> Self {
        Self {
            client_id: credentials.key().to_string(),
            client_secret: credentials.secret().to_string(),
            api_version: api_version.to_string(),
            debugging,
        }
    }
}

impl fmt::Debug for ClientBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBinding")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("api_version", &self.api_version)
            .field("debugging", &self.debugging)
            .finish()
    }
}

/// Tokens and identity returned by the provider's token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Identity URL whose last two path segments are the org and user ids.
    pub id_url: String,
    pub instance_url: String,
}

impl TokenGrant {
    /// Splits the identity URL into organization and user ids.
    ///
    /// `https://login.example.com/id/<org>/<user>` yields `(<org>, <user>)`.
    #[must_use]
    pub fn identity(&self) -> Option<(OrgId, UserId)> {
        let path = self
            .id_url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim_end_matches('/');
        let mut segments = path.rsplit('/');
        let user = segments.next().filter(|s| !s.is_empty())?;
        let org = segments.next().filter(|s| !s.is_empty())?;
        Some((OrgId::new(org), UserId::new(user)))
    }
}

/// An authenticated identity with its authorization artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    endpoint: EndpointId,
    org_id: OrgId,
    user_id: UserId,
    /// Host of the instance URL.
    host: Option<String>,
    instance_url: String,
    access_token: String,
    refresh_token: Option<String>,
    last_seen: Option<DateTime<Utc>>,
    /// Application-owned values persisted with the principal.
    #[serde(default)]
    attributes: BTreeMap<String, String>,
    #[serde(skip)]
    client: Option<ClientBinding>,
    #[serde(skip)]
    logout: bool,
}

impl Principal {
    /// Creates a principal for an endpoint.
    #[must_use]
    pub fn new(
        endpoint: EndpointId,
        org_id: OrgId,
        user_id: UserId,
        instance_url: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        let instance_url = instance_url.into();
        Self {
            endpoint,
            org_id,
            user_id,
            host: parse_domain(&instance_url),
            instance_url,
            access_token: access_token.into(),
            refresh_token: None,
            last_seen: None,
            attributes: BTreeMap::new(),
            client: None,
            logout: false,
        }
    }

    /// Creates a principal from a token grant, or `None` if the grant's
    /// identity URL does not name an organization and user.
    #[must_use]
    pub fn from_grant(endpoint: EndpointId, grant: TokenGrant) -> Option<Self> {
        let (org_id, user_id) = grant.identity()?;
        let mut principal = Self::new(
            endpoint,
            org_id,
            user_id,
            grant.instance_url,
            grant.access_token,
        );
        principal.refresh_token = grant.refresh_token;
        Some(principal)
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &EndpointId {
        &self.endpoint
    }

    #[must_use]
    pub fn org_id(&self) -> &OrgId {
        &self.org_id
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    #[must_use]
    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }

    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Returns when the principal was last written to the session.
    #[must_use]
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.last_seen
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.last_seen = Some(now);
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        self.attributes.remove(name)
    }

    /// Returns the server-side client binding, present on loaded principals.
    #[must_use]
    pub fn client(&self) -> Option<&ClientBinding> {
        self.client.as_ref()
    }

    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.client.as_ref().map(|c| c.client_id.as_str())
    }

    #[must_use]
    pub fn client_secret(&self) -> Option<&str> {
        self.client.as_ref().map(|c| c.client_secret.as_str())
    }

    #[must_use]
    pub fn api_version(&self) -> Option<&str> {
        self.client.as_ref().map(|c| c.api_version.as_str())
    }

    pub(crate) fn bind(&mut self, binding: ClientBinding) {
        self.client = Some(binding);
    }

    /// Returns a copy without the client binding.
    #[must_use]
    pub fn unbound(&self) -> Self {
        Self {
            client: None,
            ..self.clone()
        }
    }

    /// Marks the principal for removal from the session after this request.
    pub fn logout(&mut self) {
        self.logout = true;
    }

    #[must_use]
    pub fn is_logged_out(&self) -> bool {
        self.logout
    }
}
