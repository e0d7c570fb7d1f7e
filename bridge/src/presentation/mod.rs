use axum::extract::MatchedPath;
use axum::{Router, routing::get};
use ::http::HeaderValue;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::bootstrap::app_context::AppContext;
use crate::bootstrap::config::Config;

pub mod http;
pub mod ws;

#[derive(OpenApi)]
#[openapi(
    paths(
        http::health::health,
        http::reads::get_item,
        http::reads::get_feed,
        ws::port_socket_entry,
    ),
    components(schemas(http::health::HealthResp, http::reads::FailureResponse)),
    tags(
        (name = "Health", description = "System health checks"),
        (name = "Reads", description = "One-shot item and feed reads"),
        (name = "Ports", description = "Request/response port sessions over WebSocket")
    )
)]
pub struct ApiDoc;

fn cors_layer(cfg: &Config) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([::http::Method::GET, ::http::Method::OPTIONS])
        .allow_headers([::http::header::CONTENT_TYPE]);
    match cfg.frontend_url.as_deref().map(HeaderValue::from_str) {
        Some(Ok(origin)) => base.allow_origin(origin),
        // FRONTEND_URL is mandatory in production; an unparsable one denies all.
        _ if cfg.is_production => {
            base.allow_origin(AllowOrigin::exact(HeaderValue::from_static("http://invalid")))
        }
        _ => base.allow_origin(AllowOrigin::mirror_request()),
    }
}

/// The full HTTP surface: health, one-shot reads, the port socket and docs.
pub fn router(ctx: AppContext) -> Router {
    let cors = cors_layer(&ctx.cfg);

    let ws_router = Router::new()
        .route("/api/ports", get(ws::port_socket_entry))
        .with_state(ctx.clone());

    Router::new()
        .nest("/api", http::health::routes(ctx.clone()))
        .nest("/api", http::reads::routes(ctx))
        .merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", ApiDoc::openapi()))
        .merge(ws_router)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &::http::Request<_>| {
                let method = req.method().clone();
                let uri = req.uri().clone();
                let matched = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default();
                tracing::info_span!("http", %method, %uri, matched_path = %matched)
            }),
        )
}
