//! OAuth2 client for the identity provider.
//!
//! The authorize redirect and the code exchange are built with the `oauth2`
//! crate. The relay state travels as the OAuth2 `state` parameter and is not
//! a CSRF token: it is produced and read back by the flow.

use async_trait::async_trait;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, ExtraTokenFields,
    RedirectUrl, Scope, StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
    basic::{
        BasicClient, BasicErrorResponse, BasicRevocationErrorResponse,
        BasicTokenIntrospectionResponse, BasicTokenType,
    },
};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use webflow_access::{AuthorizeRequest, CallbackRequest, FlowError, TokenGrant};

use crate::error::ServerError;

/// Provider-specific fields of the token response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderTokenFields {
    /// Identity URL naming the organization and user.
    pub id: String,
    /// Base URL of the user's instance.
    pub instance_url: String,
}

impl ExtraTokenFields for ProviderTokenFields {}

/// Type alias for the token response type.
type ProviderTokenResponse = StandardTokenResponse<ProviderTokenFields, BasicTokenType>;

type ProviderClient = oauth2::Client<
    BasicErrorResponse,
    ProviderTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
>;

/// Builds the provider authorization URL the user agent is redirected to.
///
/// # Errors
///
/// Returns `FlowError` if the provider or callback URL is malformed.
pub fn authorization_url(request: &AuthorizeRequest) -> Result<String, Report<FlowError>> {
    let auth_url =
        AuthUrl::new(request.authorize_url.clone()).map_err(|_| FlowError::InvalidSite {
            site: request.site.clone(),
        })?;
    let redirect_url =
        RedirectUrl::new(request.redirect_uri.clone()).map_err(|e| FlowError::InvalidRedirect {
            reason: e.to_string(),
        })?;

    let client = BasicClient::new(ClientId::new(request.client_id.clone()))
        .set_auth_uri(auth_url)
        .set_redirect_uri(redirect_url);

    let state = request.state.clone();
    let mut auth_request = client.authorize_url(move || CsrfToken::new(state));
    for (name, value) in &request.params {
        auth_request = if *name == "scope" {
            auth_request.add_scopes(value.split_whitespace().map(|s| Scope::new(s.to_string())))
        } else {
            auth_request.add_extra_param(*name, value.clone())
        };
    }

    let (url, _) = auth_request.url();
    Ok(url.to_string())
}

/// Exchanges an authorization code for tokens.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// Performs the exchange described by the callback.
    async fn exchange(&self, callback: &CallbackRequest) -> Result<TokenGrant, Report<FlowError>>;
}

/// Token exchange against the provider's token endpoint over HTTPS.
#[derive(Debug, Clone)]
pub struct OAuth2Exchanger {
    http_client: reqwest::Client,
}

impl OAuth2Exchanger {
    /// Creates an exchanger with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self, Report<ServerError>> {
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ServerError::HttpClient {
                details: e.to_string(),
            })?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl TokenExchanger for OAuth2Exchanger {
    async fn exchange(&self, callback: &CallbackRequest) -> Result<TokenGrant, Report<FlowError>> {
        let token_url =
            TokenUrl::new(callback.token_url.clone()).map_err(|_| FlowError::InvalidSite {
                site: callback.site.clone(),
            })?;
        let redirect_url =
            RedirectUrl::new(callback.redirect_uri.clone()).map_err(|e| FlowError::InvalidRedirect {
                reason: e.to_string(),
            })?;

        let client = ProviderClient::new(ClientId::new(callback.credentials.key().to_string()))
            .set_client_secret(ClientSecret::new(callback.credentials.secret().to_string()))
            .set_auth_type(AuthType::RequestBody)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);

        let response = client
            .exchange_code(AuthorizationCode::new(callback.code.clone()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| FlowError::Exchange {
                details: e.to_string(),
            })?;

        tracing::debug!(
            endpoint = %callback.endpoint,
            instance_url = %response.extra_fields().instance_url,
            "exchanged authorization code"
        );

        Ok(TokenGrant {
            access_token: response.access_token().secret().clone(),
            refresh_token: response.refresh_token().map(|t| t.secret().clone()),
            id_url: response.extra_fields().id.clone(),
            instance_url: response.extra_fields().instance_url.clone(),
        })
    }
}
