use std::{future::Future, net::SocketAddr, sync::Arc};

use {
    axum::{
        Router,
        extract::{State, rejection::JsonRejection},
        response::{IntoResponse, Json},
        routing::{get, post},
    },
    scrapegate_browser::{BrowserConfig, BrowserManager},
    scrapegate_config::ScrapegateConfig,
    scrapegate_scrape::{PageMetadata, ScrapeRequest, ScrapeResult},
    serde::{Deserialize, Serialize},
    tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
    },
    tracing::{info, warn},
};

use crate::{auth_middleware::require_api_key, error::GatewayError, state::AppState};

/// Body of a successful `POST /scrape`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScrapeResponse {
    pub success: bool,
    pub data: ScrapeResult,
    pub metadata: PageMetadata,
}

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the HTTP router (shared between production startup and tests).
pub fn build_app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/scrape", post(scrape_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    let mut router = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .merge(protected)
        .layer(TraceLayer::new_for_http());

    if state.cors_allow_any {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router = router.layer(cors);
    }

    router.with_state(state)
}

/// Serve `state` on an already bound listener until `shutdown` resolves.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = build_app(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Start the scraping service and block until SIGINT/SIGTERM.
///
/// When `browser.launch_on_startup` is set the browser is launched before the
/// listener is bound and a launch failure aborts start-up.
pub async fn start_server(config: &ScrapegateConfig) -> anyhow::Result<()> {
    if config.auth.api_key.is_none() {
        warn!("no API key configured (set SERVICE_API_KEY); every /scrape request will be rejected");
    }

    let browser = Arc::new(BrowserManager::new(BrowserConfig::from(&config.browser)));
    if config.browser.launch_on_startup {
        browser
            .acquire()
            .await
            .map_err(|e| anyhow::anyhow!("failed to launch browser on startup: {e}"))?;
    }

    let state = AppState::new(config, Arc::clone(&browser));
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;

    let lines = [
        format!("scrapegate v{}", state.version),
        format!("listening: http://{local}"),
        format!(
            "browser: {} ({})",
            browser.state().await,
            if config.browser.headless {
                "headless"
            } else {
                "headed"
            }
        ),
        format!("page timeout: {} ms", config.browser.default_timeout_ms),
        match state.service.max_concurrent() {
            0 => "max concurrent scrapes: unbounded".to_string(),
            n => format!("max concurrent scrapes: {n}"),
        },
    ];
    let width = lines.iter().map(|l| l.len()).max().unwrap_or(0) + 4;
    info!("┌{}┐", "─".repeat(width));
    for line in &lines {
        info!("│  {:<w$}│", line, w = width - 2);
    }
    info!("└{}┘", "─".repeat(width));

    let result = serve(listener, state, shutdown_signal()).await;
    info!("shutting down browser");
    browser.shutdown().await;
    result?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn root_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "scrapegate",
        "status": "running",
        "version": state.version,
    }))
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let browser = if state.browser.is_connected().await {
        "connected"
    } else {
        "disconnected"
    };
    Json(serde_json::json!({
        "status": "healthy",
        "browser": browser,
        "headless": state.headless,
    }))
}

async fn scrape_handler(
    State(state): State<AppState>,
    body: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Result<Json<ScrapeResponse>, GatewayError> {
    let Json(request) = body.map_err(|e| GatewayError::Validation(e.body_text()))?;
    let output = state.service.scrape(request).await?;
    Ok(Json(ScrapeResponse {
        success: true,
        data: output.data,
        metadata: output.metadata,
    }))
}
