use askama::Template;
use axum::{
    Form, Json,
    extract::{Query, State},
    http::StatusCode,
    response::Html,
};

use crate::data_models::sanitize_text;
use crate::error::ErrorKind;
use crate::render::ResultsView;
use crate::security::{PageContext, SEARCH_ACTION};
use crate::shortcode;
use crate::widget::{ID_PREFIX, WidgetOptions};

use super::AppState;
use super::models::{AjaxRequest, Envelope, StatusReport, WidgetParams};

#[derive(Template)]
#[template(path = "page.html")]
struct HostPageTemplate<'a> {
    body: &'a str,
}

fn internal_error(e: askama::Error) -> (StatusCode, String) {
    tracing::error!("template rendering failed: {e}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Failed to render page".to_string(),
    )
}

pub async fn host_page(
    State(state): State<AppState>,
) -> Result<Html<String>, (StatusCode, String)> {
    let page = PageContext::new();
    let token = state.gate.issue_token(&page, SEARCH_ACTION);

    let body = shortcode::expand(&state.page_content, |options| {
        state.widgets.embed(&options, &token).map(|e| e.markup)
    })
    .map_err(internal_error)?;

    let html = HostPageTemplate { body: &body }
        .render()
        .map_err(internal_error)?;
    Ok(Html(html))
}

pub async fn widget_fragment(
    State(state): State<AppState>,
    Query(params): Query<WidgetParams>,
) -> Result<Html<String>, (StatusCode, String)> {
    let mut options = WidgetOptions::default();
    if let Some(placeholder) = params.placeholder {
        options.placeholder = placeholder;
    }
    let token = state.gate.issue_token(&PageContext::new(), SEARCH_ACTION);
    let embedding = state
        .widgets
        .embed(&options, &token)
        .map_err(internal_error)?;
    Ok(Html(embedding.markup))
}

/// The proxy hop: validates the posted search and answers with an envelope
/// carrying either results or a single error message, plus the region markup.
pub async fn ajax_handler(
    State(state): State<AppState>,
    Form(request): Form<AjaxRequest>,
) -> (StatusCode, Json<Envelope>) {
    let instance_id = request
        .instance_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| ID_PREFIX.trim_end_matches('_').to_string());

    if request.action != SEARCH_ACTION {
        tracing::warn!(action = %request.action, "unknown ajax action");
        let message = "Unknown action".to_string();
        let html = ResultsView::Error {
            message: message.clone(),
        }
        .to_html(&instance_id)
        .unwrap_or_default();
        return (
            StatusCode::BAD_REQUEST,
            Json(Envelope::failure(message, ErrorKind::Validation, html)),
        );
    }

    let outcome = state
        .pipeline
        .search(&request.search_term, &request.nonce)
        .await;
    let query = sanitize_text(&request.search_term);
    let view = state.renderer.render_outcome(&outcome, &query);

    let html = match view.to_html(&instance_id) {
        Ok(html) => html,
        Err(e) => {
            tracing::error!("failed to render results for {instance_id}: {e}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(Envelope::failure(
                    "Failed to render results".to_string(),
                    ErrorKind::MalformedResponse,
                    String::new(),
                )),
            );
        }
    };

    let envelope = match outcome {
        Ok(response) => Envelope::success(response, html),
        Err(e) => Envelope::failure(e.user_message(), e.kind(), html),
    };
    (StatusCode::OK, Json(envelope))
}

pub async fn status_handler(State(state): State<AppState>) -> Json<StatusReport> {
    let status = state.pipeline.backend().probe().await;
    Json(StatusReport {
        base_url: state.base_url.to_string(),
        status,
    })
}
