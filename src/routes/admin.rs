use crate::{AppState, auth, handlers};
use axum::{
    Router, middleware,
    routing::{get, post},
};

/// Admin Router Module
///
/// Account management, activity reporting and contact moderation for
/// `admin` and `superadmin`. Account creation and the upload views are
/// narrowed further to `superadmin`. Nested under `/admin` by `create_router`.
pub fn admin_routes(state: AppState) -> Router<AppState> {
    let admin = Router::new()
        // GET /admin/users
        // All accounts with totalUploads / totalAnalyses / totalDownloads.
        .route("/users", get(handlers::list_users))
        .route(
            "/users/{id}",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
        .route("/summary", get(handlers::get_summary))
        .route("/contacts", get(handlers::list_contacts))
        .route(
            "/contacts/{id}",
            get(handlers::get_contact)
                .patch(handlers::update_contact)
                .delete(handlers::delete_contact),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    let superadmin = Router::new()
        // POST /admin/create
        // Role grants are checked again in the account service.
        .route("/create", post(handlers::create_user))
        .route("/uploads", get(handlers::list_uploads))
        .route("/uploads/total", get(handlers::upload_total))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_superadmin,
        ));

    admin.merge(superadmin)
}
