use std::net::SocketAddr;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::conversation::FAILED_TURN_MESSAGE;
use crate::engine::Resolver;
use crate::mode::effective_mode;
use crate::models::{ModeRequest, ModeResponse, ResolveRequest, ResolveResponse};
use crate::render::render_markdown;

#[derive(Clone)]
struct AppState {
    resolver: Resolver,
}

pub fn router(resolver: Resolver) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/resolve", post(resolve_handler))
        .route("/api/mode", post(mode_handler))
        .route("/api/conditions", get(conditions_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { resolver })
}

pub async fn run_server(config: AppConfig, resolver: Resolver) -> Result<()> {
    let app = router(resolver);

    let addr: SocketAddr = config.bind_addr.parse()?;
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn resolve_handler(
    State(state): State<AppState>,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let response = resolve_request(&state.resolver, request).await?;
    Ok(Json(response))
}

async fn resolve_request(resolver: &Resolver, request: ResolveRequest) -> Result<ResolveResponse, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::bad_request("query must not be blank".to_string()));
    }

    let mode = effective_mode(request.mode, request.is_connected);
    let result = resolver
        .resolve(&request.query, &request.history, mode)
        .await
        .map_err(|err| {
            tracing::error!("resolution failed: {err}");
            ApiError {
                status: StatusCode::BAD_GATEWAY,
                message: FAILED_TURN_MESSAGE.to_string(),
            }
        })?;

    Ok(ResolveResponse {
        effective_mode: mode,
        rendered: render_markdown(&result),
        result,
    })
}

async fn mode_handler(Json(request): Json<ModeRequest>) -> Json<ModeResponse> {
    Json(ModeResponse {
        effective_mode: effective_mode(request.mode, request.is_connected),
    })
}

async fn conditions_handler(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.resolver.knowledge_base().names())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}
