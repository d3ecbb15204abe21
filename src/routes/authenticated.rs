use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Features available to every signed-in role. The router is wrapped in
/// `require_authenticated`, so each handler receives a validated `AuthUser`.
/// Lists are always the caller's own; single-record access widens to every
/// owner for admin-level callers.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        .route("/auth/me", get(handlers::get_me))
        // --- Files ---
        .route("/files", get(handlers::list_files))
        // POST /files/upload
        // Multipart upload of one xlsx/xls workbook in the `file` field.
        .route("/files/upload", post(handlers::upload_file))
        .route(
            "/files/{id}",
            get(handlers::get_file)
                .put(handlers::update_file)
                .delete(handlers::delete_file),
        )
        // GET /files/{id}/download
        // Returns the original bytes and records a Download.
        .route("/files/{id}/download", get(handlers::download_file))
        // --- Analyses ---
        .route(
            "/analysis",
            get(handlers::list_analyses).post(handlers::create_analysis),
        )
        .route(
            "/analysis/{id}",
            get(handlers::get_analysis)
                .put(handlers::update_analysis)
                .delete(handlers::delete_analysis),
        )
        // --- Download history ---
        .route("/downloads", get(handlers::list_downloads))
        .route("/downloads/{id}", get(handlers::get_download))
}
