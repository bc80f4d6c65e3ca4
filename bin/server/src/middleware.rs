//! Tower middleware that runs the web-server flow in front of an application.
//!
//! Requests to the authorize and callback paths are answered by the layer
//! itself. Every other request is handed to the wrapped service with the
//! session principal available through a [`PrincipalHandle`] extension; the
//! principal is written back to the session cookie afterwards.

use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{Request, StatusCode, header, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use rootcause::prelude::Report;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tower::{Layer, Service, ServiceExt};
use webflow_access::{
    FlowError, FlowRequest, Phase, Principal, RequestParams, Route, WebServerFlow,
    failure_location,
};

use crate::config::CookieConfig;
use crate::provider::{TokenExchanger, authorization_url};
use crate::slot::CookieSlot;

/// A failed authorize or callback leg.
#[derive(Debug, Clone)]
pub struct FlowFailure {
    pub phase: Phase,
    pub error: FlowError,
    /// User-facing error text.
    pub message: String,
    /// The request's original `state` parameter.
    pub state: Option<String>,
    pub request: FlowRequest,
}

/// Produces the response for a failed leg.
pub trait OnFailure: Send + Sync {
    fn respond(&self, failure: FlowFailure) -> Response;
}

impl<F> OnFailure for F
where
    F: Fn(FlowFailure) -> Response + Send + Sync,
{
    fn respond(&self, failure: FlowFailure) -> Response {
        self(failure)
    }
}

/// Redirects to `<prefix>/failure?message=..&state=..`.
#[derive(Debug, Clone)]
pub struct RedirectToFailure {
    failure_path: String,
}

impl RedirectToFailure {
    #[must_use]
    pub fn new(failure_path: impl Into<String>) -> Self {
        Self {
            failure_path: failure_path.into(),
        }
    }
}

impl OnFailure for RedirectToFailure {
    fn respond(&self, failure: FlowFailure) -> Response {
        let location = failure_location(
            &self.failure_path,
            &failure.message,
            failure.state.as_deref(),
        );
        Redirect::to(&location).into_response()
    }
}

/// Shared handle to the principal of the current request.
///
/// Inserted as a request extension on pass-through requests. Changes made
/// through the handle are persisted after the application responds.
#[derive(Debug, Clone, Default)]
pub struct PrincipalHandle(Arc<Mutex<Option<Principal>>>);

impl PrincipalHandle {
    #[must_use]
    pub fn new(principal: Option<Principal>) -> Self {
        Self(Arc::new(Mutex::new(principal)))
    }

    fn lock(&self) -> MutexGuard<'_, Option<Principal>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a copy of the current principal.
    #[must_use]
    pub fn principal(&self) -> Option<Principal> {
        self.lock().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.lock().is_some()
    }

    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        !self.is_authenticated()
    }

    /// Mutates the principal in place. Returns `None` when anonymous.
    pub fn update<R>(&self, f: impl FnOnce(&mut Principal) -> R) -> Option<R> {
        self.lock().as_mut().map(f)
    }

    /// Removes the principal from the session after this request.
    ///
    /// Returns false when there was no principal.
    pub fn logout(&self) -> bool {
        self.update(Principal::logout).is_some()
    }

    fn take(&self) -> Option<Principal> {
        self.lock().take()
    }
}

impl<S> FromRequestParts<S> for PrincipalHandle
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "web server flow layer is not installed",
        ))
    }
}

/// Layer that installs the web-server flow.
#[derive(Clone)]
pub struct WebServerFlowLayer {
    flow: Arc<WebServerFlow>,
    exchanger: Arc<dyn TokenExchanger>,
    on_failure: Arc<dyn OnFailure>,
    cookie: Arc<CookieConfig>,
}

impl WebServerFlowLayer {
    /// Creates a layer with the default failure redirect and cookie.
    #[must_use]
    pub fn new(flow: WebServerFlow, exchanger: impl TokenExchanger + 'static) -> Self {
        let on_failure = RedirectToFailure::new(flow.config().failure_path());
        Self {
            flow: Arc::new(flow),
            exchanger: Arc::new(exchanger),
            on_failure: Arc::new(on_failure),
            cookie: Arc::new(CookieConfig::default()),
        }
    }

    /// Replaces the failure redirect with a custom handler.
    #[must_use]
    pub fn on_failure(mut self, handler: impl OnFailure + 'static) -> Self {
        self.on_failure = Arc::new(handler);
        self
    }

    #[must_use]
    pub fn cookie(mut self, cookie: CookieConfig) -> Self {
        self.cookie = Arc::new(cookie);
        self
    }

    #[must_use]
    pub fn flow(&self) -> &WebServerFlow {
        &self.flow
    }

    async fn handle<S>(&self, mut request: Request<Body>, inner: S) -> Response
    where
        S: Service<Request<Body>, Response = Response, Error = Infallible>,
    {
        let flow_request = flow_request(&request);
        let mut slot = CookieSlot::from_headers(request.headers(), &self.cookie);

        match self.flow.route(&flow_request.path) {
            Route::Authorize => match self.authorize(&flow_request) {
                Ok(location) => Redirect::to(&location).into_response(),
                Err(report) => self.fail(Phase::Authorizing, &report, flow_request),
            },
            Route::Callback => match self.callback(&flow_request, &mut slot).await {
                Ok(destination) => {
                    (slot.into_jar(&self.cookie), Redirect::to(&destination)).into_response()
                }
                Err(report) => self.fail(Phase::CallingBack, &report, flow_request),
            },
            Route::PassThrough => {
                let handle = PrincipalHandle::new(self.flow.load_principal(&slot));
                request.extensions_mut().insert(handle.clone());

                let response = match inner.oneshot(request).await {
                    Ok(response) => response,
                    Err(never) => match never {},
                };

                let mut principal = handle.take();
                self.flow.save_principal(&mut slot, principal.as_mut());
                (slot.into_jar(&self.cookie), response).into_response()
            }
        }
    }

    fn authorize(&self, request: &FlowRequest) -> Result<String, Report<FlowError>> {
        let authorize = self.flow.authorize(request)?;
        authorization_url(&authorize)
    }

    async fn callback(
        &self,
        request: &FlowRequest,
        slot: &mut CookieSlot,
    ) -> Result<String, Report<FlowError>> {
        let callback = self.flow.callback(request)?;
        let grant = self.exchanger.exchange(&callback).await?;
        self.flow.complete(&callback, grant, slot)
    }

    fn fail(&self, phase: Phase, report: &Report<FlowError>, request: FlowRequest) -> Response {
        tracing::error!(
            phase = %phase,
            path = %request.path,
            error = %report,
            "web server flow failed"
        );

        let error = report.current_context().clone();
        let failure = FlowFailure {
            phase,
            message: error.to_string(),
            error,
            state: request.state().map(str::to_string),
            request,
        };
        self.on_failure.respond(failure)
    }
}

impl<S> Layer<S> for WebServerFlowLayer {
    type Service = WebServerFlowService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        WebServerFlowService {
            inner,
            layer: self.clone(),
        }
    }
}

/// Service produced by [`WebServerFlowLayer`].
#[derive(Clone)]
pub struct WebServerFlowService<S> {
    inner: S,
    layer: WebServerFlowLayer,
}

impl<S> Service<Request<Body>> for WebServerFlowService<S>
where
    S: Service<Request<Body>, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let layer = self.layer.clone();
        Box::pin(async move { Ok(layer.handle(request, inner).await) })
    }
}

fn flow_request(request: &Request<Body>) -> FlowRequest {
    let header_value = |name: header::HeaderName| {
        request
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };

    FlowRequest {
        path: request.uri().path().to_string(),
        params: RequestParams::from_query(request.uri().query()),
        host: header_value(header::HOST)
            .or_else(|| request.uri().authority().map(|a| a.to_string())),
        forwarded_proto: header_value(header::HeaderName::from_static("x-forwarded-proto")),
    }
}
