//! Demo application wrapped by the web-server flow.
//!
//! - `/` shows the current principal, or how to sign in
//! - `/logout` clears the session principal
//! - `<prefix>/failure` renders the failure redirect target

use axum::{
    Json, Router,
    extract::Query,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::middleware::{PrincipalHandle, WebServerFlowLayer};

/// Principal info for display.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrincipalInfo {
    pub endpoint: String,
    pub org_id: String,
    pub user_id: String,
    pub host: Option<String>,
    pub instance_url: String,
    pub attributes: BTreeMap<String, String>,
}

/// Query parameters of the failure page.
#[derive(Debug, Deserialize)]
pub struct FailureQuery {
    #[serde(default)]
    pub message: String,
    pub state: Option<String>,
}

/// Builds the demo router behind the flow layer.
pub fn router(layer: WebServerFlowLayer) -> Router {
    let prefix = layer.flow().config().path_prefix().to_string();
    Router::new()
        .route("/", get(home))
        .route("/logout", get(logout))
        .route(&format!("{prefix}/failure"), get(failure))
        .fallback(|| async { StatusCode::NOT_FOUND })
        .layer(layer)
}

async fn home(handle: PrincipalHandle) -> Response {
    let Some(principal) = handle.principal() else {
        return (
            StatusCode::UNAUTHORIZED,
            "Not signed in. Visit the authorize path to sign in.",
        )
            .into_response();
    };

    Json(PrincipalInfo {
        endpoint: principal.endpoint().to_string(),
        org_id: principal.org_id().to_string(),
        user_id: principal.user_id().to_string(),
        host: principal.host().map(str::to_string),
        instance_url: principal.instance_url().to_string(),
        attributes: principal.attributes().clone(),
    })
    .into_response()
}

async fn logout(handle: PrincipalHandle) -> Redirect {
    if handle.logout() {
        tracing::info!("principal logged out");
    }
    Redirect::to("/")
}

async fn failure(Query(query): Query<FailureQuery>) -> impl IntoResponse {
    tracing::debug!(
        message = %query.message,
        state = query.state.as_deref().unwrap_or(""),
        "rendering failure page"
    );
    (
        StatusCode::UNAUTHORIZED,
        format!("Sign-in failed: {}", query.message),
    )
}
