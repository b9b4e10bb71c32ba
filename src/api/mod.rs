use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use chrono::Duration;
use std::path::Path;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::pipeline::{HttpBackend, SearchBackend, SearchPipeline};
use crate::render::Renderer;
use crate::security::SecurityGate;
use crate::widget::{AJAX_PATH, WidgetManager};

pub mod handlers;
pub mod models;

pub const DEFAULT_PAGE_CONTENT: &str = "[text_search]";

/// Everything a request handler needs, shared across requests.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<SecurityGate>,
    pub pipeline: Arc<SearchPipeline>,
    pub renderer: Arc<Renderer>,
    pub widgets: Arc<WidgetManager>,
    pub page_content: Arc<str>,
    pub base_url: Arc<str>,
}

impl AppState {
    pub fn new(
        gate: Arc<SecurityGate>,
        backend: Arc<dyn SearchBackend>,
        renderer: Renderer,
        page_content: &str,
        base_url: &str,
    ) -> AppState {
        let pipeline = Arc::new(SearchPipeline::new(gate.clone(), backend));
        let renderer = Arc::new(renderer);
        let widgets = Arc::new(WidgetManager::new(pipeline.clone(), renderer.clone()));
        AppState {
            gate,
            pipeline,
            renderer,
            widgets,
            page_content: Arc::from(page_content),
            base_url: Arc::from(base_url),
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<AppState> {
        let max_age = Duration::from_std(config.token_max_age)
            .context("token max age out of range")?;
        let gate = match &config.token_secret {
            Some(secret) => SecurityGate::new(secret.as_bytes(), max_age),
            None => {
                tracing::warn!("TOKEN_SECRET not set, tokens will not survive a restart");
                SecurityGate::with_random_key(max_age)?
            }
        };

        let backend = HttpBackend::new(
            &config.search_api_base_url,
            config.search_timeout,
            config.probe_timeout,
        )?;

        let page_content = match &config.page_content_path {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("failed to read page content from {}", path.display()))?,
            None => DEFAULT_PAGE_CONTENT.to_string(),
        };

        Ok(AppState::new(
            Arc::new(gate),
            Arc::new(backend),
            Renderer::new(config.date_format.clone()),
            &page_content,
            &config.search_api_base_url,
        ))
    }
}

pub fn create_router(state: AppState, static_dir: &Path) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::host_page))
        .route("/widget", get(handlers::widget_fragment))
        .route(AJAX_PATH, post(handlers::ajax_handler))
        .route("/api/status", get(handlers::status_handler))
        .with_state(state)
        // Widget script and styles
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
