use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::application::use_cases::reads::read_feed::ReadFeed;
use crate::application::use_cases::reads::read_item::ReadItem;
use crate::bootstrap::app_context::AppContext;
use crate::domain::bridge::{Failure, FailureKind, Outcome};

#[derive(Debug, Serialize, ToSchema)]
pub struct FailureResponse {
    /// One of `source_unavailable`, `invalid_path`, `timeout`.
    pub kind: String,
    pub message: String,
}

type ReadResult = Result<Json<Value>, (StatusCode, Json<FailureResponse>)>;

fn status_for(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::InvalidPath => StatusCode::BAD_REQUEST,
        FailureKind::SourceUnavailable => StatusCode::BAD_GATEWAY,
        FailureKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
    }
}

fn into_response(outcome: Outcome) -> ReadResult {
    outcome.map(Json).map_err(|Failure { kind, message }| {
        (
            status_for(kind),
            Json(FailureResponse {
                kind: kind.to_string(),
                message,
            }),
        )
    })
}

#[utoipa::path(
    get,
    path = "/api/item/{id}",
    tag = "Reads",
    params(("id" = String, Path, description = "Item id, used verbatim as a path segment")),
    responses(
        (status = 200, description = "Current value at item/{id}; null when absent"),
        (status = 400, body = FailureResponse),
        (status = 502, body = FailureResponse),
        (status = 504, body = FailureResponse)
    )
)]
pub async fn get_item(State(ctx): State<AppContext>, Path(id): Path<String>) -> ReadResult {
    let source = ctx.source();
    let uc = ReadItem {
        source: source.as_ref(),
        timeout: ctx.delivery_policy().once_timeout,
    };
    let outcome = uc.execute(&id).await;
    if let Err(failure) = &outcome {
        tracing::debug!(%id, error = %failure, "item_read_failed");
    }
    into_response(outcome)
}

#[utoipa::path(
    get,
    path = "/api/feed/{name}",
    tag = "Reads",
    params(("name" = String, Path, description = "Feed name; may span several segments")),
    responses(
        (status = 200, description = "Current value of the feed; null when absent"),
        (status = 400, body = FailureResponse),
        (status = 502, body = FailureResponse),
        (status = 504, body = FailureResponse)
    )
)]
pub async fn get_feed(State(ctx): State<AppContext>, Path(name): Path<String>) -> ReadResult {
    let source = ctx.source();
    let uc = ReadFeed {
        source: source.as_ref(),
        timeout: ctx.delivery_policy().once_timeout,
    };
    let outcome = uc.execute(&name).await;
    if let Err(failure) = &outcome {
        tracing::debug!(%name, error = %failure, "feed_read_failed");
    }
    into_response(outcome)
}

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/item/:id", get(get_item))
        .route("/feed/*name", get(get_feed))
        .with_state(ctx)
}
