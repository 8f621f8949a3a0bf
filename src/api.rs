//! REST API for the design service.
//!
//! Exposes the design engine and the frozen catalogs over HTTP.
//! Uses Axum as the web framework and supports CORS.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::sync::OnceLock;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};

use crate::config::ApiConfig;
use crate::design::{
    DesignCandidate, DesignEngine, DesignEvent, DesignOutcome, DesignRequest, DesignWarning,
    Feasibility,
};
use crate::error::{DesignError, Infeasibility, NoFeasibleDesignError};
use crate::model::{MaterialProfile, ProductShape};
use crate::selector::ScoreBreakdown;
use crate::template::PackagingTemplate;

#[derive(Clone)]
struct ApiState {
    engine: DesignEngine,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

// SRI hashes verified against https://unpkg.com/swagger-ui-dist@5.17.14/ on 2025-10-29.
const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>wrap-it-now API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-standalone-preset.js"
            integrity="sha384-2YH8WDRaj7V2OqU/trsmzSagmk/E2SutiCsGkdgoQwC9pNUJV1u/141DHB6jgs8t"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                const ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                    presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
                    layout: "StandaloneLayout",
                });
                window.ui = ui;
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Error body for every non-2xx response.
#[derive(Debug, Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
    /// Constraint code that blocked the design, when one did.
    #[schema(nullable = true)]
    constraint: Option<String>,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
            constraint: None,
        }
    }

    fn from_design_error(err: &DesignError) -> Self {
        let error = match err {
            DesignError::Geometry(_) => "Unusable product geometry",
            DesignError::Validation(_) => "Invalid input data",
            DesignError::Catalog(_) => "Catalog lookup failed",
            DesignError::NoFeasibleDesign(_) => "No feasible design",
        };
        Self {
            error: error.to_string(),
            details: err.to_string(),
            constraint: err.blocking_constraint().map(str::to_string),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn design_error(err: &DesignError) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorResponse::from_design_error(err)),
    )
        .into_response()
}

fn parse_design_request(
    payload: Result<Json<DesignRequest>, JsonRejection>,
) -> Result<DesignRequest, Response> {
    let Json(request) = payload.map_err(json_deserialize_error)?;
    if let Err(err) = request.constraints.validate() {
        return Err(design_error(&err.into()));
    }
    Ok(request)
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_design, handle_design_stream, handle_materials, handle_templates),
    components(
        schemas(
            DesignRequest,
            DesignOutcome,
            DesignCandidate,
            DesignWarning,
            Feasibility,
            Infeasibility,
            NoFeasibleDesignError,
            ScoreBreakdown,
            ProductShape,
            MaterialProfile,
            PackagingTemplate,
            ErrorResponse
        )
    ),
    tags(
        (name = "design", description = "Packaging design optimization"),
        (name = "catalog", description = "Read-only material and template catalogs")
    )
)]
struct ApiDoc;

/// Builds the router with all endpoints.
fn router(engine: DesignEngine) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/design", post(handle_design))
        .route("/design_stream", post(handle_design_stream))
        .route("/catalog/materials", get(handle_materials))
        .route("/catalog/templates", get(handle_templates))
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(ApiState { engine })
}

/// Starts the API server and blocks until it terminates.
///
/// # Errors
/// Binding the listener or serving connections failed.
pub async fn start_api_server(config: ApiConfig, engine: DesignEngine) -> std::io::Result<()> {
    let app = router(engine);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|err| {
        error!(%addr, %err, "could not bind API server");
        err
    })?;

    info!(
        host = config.display_host(),
        port = config.port(),
        "server running on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() && config.uses_default_host() {
        info!("local access: http://localhost:{}", config.port());
    }
    info!("endpoints: POST /design, POST /design_stream, GET /catalog/materials, GET /catalog/templates");
    info!("documentation: GET /docs, GET /docs/openapi.json");

    axum::serve(listener, app).await
}

/// Handler for POST /design.
///
/// Runs the whole pipeline on the blocking pool and returns the chosen design.
#[utoipa::path(
    post,
    path = "/design",
    request_body = DesignRequest,
    responses(
        (status = 200, description = "Feasible design found", body = DesignOutcome),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request, unusable geometry or no feasible design",
            body = ErrorResponse
        )
    ),
    tag = "design"
)]
async fn handle_design(
    State(state): State<ApiState>,
    payload: Result<Json<DesignRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match parse_design_request(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    info!(
        request = request.request_id.as_deref().unwrap_or("-"),
        vertices = request.mesh.vertices.len(),
        "new design request"
    );
    let engine = state.engine.clone();
    let result = tokio::task::spawn_blocking(move || engine.design(&request)).await;

    match result {
        Ok(Ok(outcome)) => (StatusCode::OK, Json(outcome)).into_response(),
        Ok(Err(err)) => design_error(&err),
        Err(err) => {
            error!(%err, "design task failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Design task failed",
                err.to_string(),
            )
        }
    }
}

/// Handler for POST /design_stream (SSE).
///
/// Streams `DesignEvent`s as Server-Sent Events while the search runs.
/// The final event is `finished` or `failed`.
#[utoipa::path(
    post,
    path = "/design_stream",
    request_body = DesignRequest,
    responses(
        (
            status = 200,
            description = "Streams design progress events in real-time",
            content_type = "text/event-stream",
            body = String
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request",
            body = ErrorResponse
        )
    ),
    tag = "design"
)]
async fn handle_design_stream(
    State(state): State<ApiState>,
    payload: Result<Json<DesignRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match parse_design_request(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let (tx, rx) = mpsc::channel::<String>(32);
    let engine = state.engine.clone();

    tokio::task::spawn_blocking(move || {
        let _ = engine.design_with_progress(&request, |evt: &DesignEvent| {
            if let Ok(json) = serde_json::to_string(evt) {
                // A closed receiver drops the remaining events.
                let _ = tx.blocking_send(json);
            }
        });
    });

    let stream = ReceiverStream::new(rx)
        .map(|msg| Ok::<_, std::convert::Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Handler for GET /catalog/materials.
#[utoipa::path(
    get,
    path = "/catalog/materials",
    responses((status = 200, description = "All materials, ordered by id", body = Vec<MaterialProfile>)),
    tag = "catalog"
)]
async fn handle_materials(State(state): State<ApiState>) -> impl IntoResponse {
    let materials: Vec<MaterialProfile> =
        state.engine.catalogs().materials.iter().cloned().collect();
    Json(materials)
}

/// Handler for GET /catalog/templates.
#[utoipa::path(
    get,
    path = "/catalog/templates",
    responses((status = 200, description = "All templates, ordered by id", body = Vec<PackagingTemplate>)),
    tag = "catalog"
)]
async fn handle_templates(State(state): State<ApiState>) -> impl IntoResponse {
    let templates: Vec<PackagingTemplate> =
        state.engine.catalogs().templates.iter().cloned().collect();
    Json(templates)
}

async fn serve_openapi_json(State(_state): State<ApiState>) -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui(State(_state): State<ApiState>) -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
