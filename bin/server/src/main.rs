use rootcause::prelude::Report;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use webflow_access::WebServerFlow;
use webflow_server::{OAuth2Exchanger, ServerConfig, ServerError, WebServerFlowLayer, app};

#[tokio::main]
async fn main() -> Result<(), Report<ServerError>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from file and environment
    let config = ServerConfig::from_env().map_err(|e| ServerError::Configuration {
        details: e.to_string(),
    })?;
    let flow_config = config
        .flow_config()
        .map_err(|e| ServerError::Configuration {
            details: e.to_string(),
        })?;
    tracing::info!(
        endpoints = flow_config.endpoints().len(),
        default_endpoint = %flow_config.endpoints().default_endpoint().0,
        path_prefix = flow_config.path_prefix(),
        "Loaded configuration"
    );

    let layer = WebServerFlowLayer::new(WebServerFlow::new(flow_config), OAuth2Exchanger::new()?)
        .cookie(config.cookie);
    let router = app::router(layer).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .map_err(|e| ServerError::Bind {
            address: config.bind_address.clone(),
            details: e.to_string(),
        })?;

    tracing::info!("listening on http://{}", config.bind_address);

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServerError::Serve {
            details: e.to_string(),
        })?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
