use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    http::HeaderName,
    middleware,
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

pub mod accounts;
pub mod auth;
pub mod client;
pub mod config;
pub mod crud;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod spreadsheet;
pub mod storage;

// Routing segregated by gate (public, authenticated, admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::ApiError;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{InMemoryStorage, S3StorageClient, StorageState};

/// ApiDoc
///
/// OpenAPI document aggregated from every `#[utoipa::path]` handler and
/// `ToSchema` model, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register, handlers::login, handlers::get_me,
        handlers::list_files, handlers::upload_file, handlers::get_file, handlers::update_file,
        handlers::delete_file, handlers::download_file,
        handlers::list_analyses, handlers::create_analysis, handlers::get_analysis,
        handlers::update_analysis, handlers::delete_analysis,
        handlers::list_downloads, handlers::get_download,
        handlers::submit_contact,
        handlers::list_users, handlers::get_user, handlers::update_user, handlers::delete_user,
        handlers::create_user, handlers::get_summary,
        handlers::list_contacts, handlers::get_contact, handlers::update_contact,
        handlers::delete_contact,
        handlers::list_uploads, handlers::upload_total
    ),
    components(
        schemas(
            models::Role, models::AccountView, models::AccountActivity, models::ActivitySummary,
            models::UploadTotal, models::RegisterRequest, models::RegisterResponse,
            models::LoginRequest, models::LoginResponse, models::MessageResponse,
            models::CreateAccountRequest, models::UpdateAccountRequest,
            models::FileRecord, models::FilePatch, models::UploadForm,
            models::Analysis, models::NewAnalysis, models::AnalysisPatch, models::Download,
            models::ContactStatus, models::ContactMessage, models::NewContactMessage,
            models::ContactPatch,
        )
    ),
    tags(
        (name = "excel-analytics", description = "Excel Analytics API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single shared container of services and configuration, cloned into
/// every request.
#[derive(Clone)]
pub struct AppState {
    /// Accounts and the owned collections (Postgres or in-memory).
    pub repo: RepositoryState,
    /// Content store for the uploaded workbook bytes.
    pub storage: StorageState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routing tree, applies the gates and the observability
/// layers, and binds the state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");
    let body_limit = state.config.max_upload_bytes;

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::require_authenticated,
            )),
        )
        .nest("/admin", admin::admin_routes(state.clone()))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the `http_request` span for every request, tagged with method, URI
/// and the `x-request-id` set above.
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
