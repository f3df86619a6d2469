use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;

// Routing segregation (public vs. token-protected).
pub mod routes;
use auth::AuthUser;
use routes::{authenticated, public};

// --- Public Re-exports ---

// Core state types for the application entry point (main.rs).
pub use config::AppConfig;
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// Aggregates the OpenAPI documentation for every handler and schema; the
/// resulting JSON is served at `/api-docs/openapi.json` and rendered by the
/// Swagger UI.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::users::login, handlers::users::create_user, handlers::users::list_users,
        handlers::users::get_user, handlers::users::update_user, handlers::users::delete_user,
        handlers::users::change_password,
        handlers::projects::create_project, handlers::projects::list_projects,
        handlers::projects::get_project, handlers::projects::update_project,
        handlers::projects::delete_project, handlers::projects::assign_users,
        handlers::projects::unassign_users, handlers::projects::assign_risks,
        handlers::projects::unassign_risks, handlers::projects::risks_of_projects,
        handlers::risks::create_risk, handlers::risks::list_risks, handlers::risks::get_risk,
        handlers::risks::update_risk, handlers::risks::delete_risk,
        handlers::risks::assign_countermeasures, handlers::risks::unassign_countermeasures,
        handlers::countermeasures::create_countermeasure,
        handlers::countermeasures::list_countermeasures,
        handlers::countermeasures::get_countermeasure,
        handlers::countermeasures::update_countermeasure,
        handlers::countermeasures::delete_countermeasure
    ),
    components(
        schemas(
            models::UserResponse, models::ProjectResponse, models::RiskResponse,
            models::CounterMeasureResponse, models::LoginRequest, models::LoginResponse,
            models::CreateUserRequest, models::UpdateUserRequest, models::ChangePasswordRequest,
            models::ProjectRequest, models::RiskRequest, models::CounterMeasureRequest,
            models::IdsRequest, error::ErrorBody,
        )
    ),
    tags(
        (name = "risk-portal", description = "Risk management portal API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single shared container for all request-scoped dependencies: the
/// repository handle and the immutable configuration.
#[derive(Clone)]
pub struct AppState {
    /// Repository layer: abstracts database access via the PgPool connection.
    pub repo: RepositoryState,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// FromRef implementations let extractors pull individual components out of
// the shared state (the AuthUser extractor only needs AppConfig).

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Gate for the authenticated routes: extracting `AuthUser` runs the full
/// token validation, so an invalid or absent token rejects the request with
/// a 401 error body before any handler executes.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies global and scoped middleware,
/// and registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name used for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        // Serve the generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public routes: no middleware applied.
        .merge(public::public_routes())
        // Protected routes: token verification happens in the layer, role
        // checks happen in the handlers.
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .with_state(state);

    // Observability and correlation layers, applied outermost.
    base_router
        .layer(
            ServiceBuilder::new()
                // Generate a unique id for every incoming request ...
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // ... wrap the request lifecycle in a tracing span carrying it ...
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // ... and echo it back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// Customizes the `TraceLayer` span so every log line of a request is
/// correlated by the generated request id.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
