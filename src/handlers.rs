use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::MultipartRejection},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    AppState, accounts,
    auth::AuthUser,
    crud::{self, ValidJson},
    error::ApiError,
    models::{
        AccountActivity, AccountView, ActivitySummary, Analysis, AnalysisPatch, ContactMessage,
        ContactPatch, CreateAccountRequest, Download, FilePatch, FileRecord, LoginRequest,
        LoginResponse, MessageResponse, NewAnalysis, NewContactMessage, RegisterRequest,
        RegisterResponse, UpdateAccountRequest, UploadForm, UploadTotal,
    },
    repository::Scope,
    spreadsheet,
    storage::object_key,
};

// --- Auth ---

/// register
///
/// [Public Route] Self-service sign-up. New accounts always get the `user` role.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = RegisterResponse),
        (status = 400, description = "Validation failed or email already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let account = accounts::register(state.repo.as_ref(), payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".to_string(),
            user: AccountView::from(&account),
        }),
    ))
}

/// login
///
/// [Public Route] Exchanges credentials for a seven-day session token.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Unknown email or wrong password"),
        (status = 403, description = "Account does not hold the requested role")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let response = accounts::login(state.repo.as_ref(), &state.config.jwt_secret, payload).await?;
    Ok(Json(response))
}

/// get_me
///
/// [Authenticated Route] Profile of the token's account.
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Profile", body = AccountView),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn get_me(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<AccountView>, ApiError> {
    Ok(Json(accounts::profile(state.repo.as_ref(), &user).await?))
}

// --- Files ---

#[utoipa::path(
    get,
    path = "/files",
    responses((status = 200, description = "My uploads, newest first", body = [FileRecord]))
)]
pub async fn list_files(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<FileRecord>>, ApiError> {
    Ok(Json(crud::list_owned(state.repo.files(), &user).await?))
}

/// upload_file
///
/// [Authenticated Route] Accepts one spreadsheet in the multipart field `file`.
/// The workbook is parsed before anything is stored, so a corrupt file leaves
/// no trace. If recording the metadata fails the stored bytes are removed.
#[utoipa::path(
    post,
    path = "/files/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Uploaded and parsed", body = FileRecord),
        (status = 400, description = "No file, wrong type or unreadable workbook")
    )
)]
pub async fn upload_file(
    user: AuthUser,
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<FileRecord>), ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::validation(e.body_text()))?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let name = field
            .file_name()
            .map(str::to_string)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "spreadsheet.xlsx".to_string());
        let mimetype = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        upload = Some((name, mimetype, bytes));
        break;
    }

    let Some((name, mimetype, bytes)) = upload.filter(|(_, _, bytes)| !bytes.is_empty()) else {
        return Err(ApiError::validation("No file uploaded"));
    };
    if !spreadsheet::is_accepted_mimetype(&mimetype) {
        return Err(ApiError::validation("Only Excel files allowed"));
    }

    // Unzipping and walking the sheet is CPU-bound.
    let workbook = bytes.clone();
    let parsed = tokio::task::spawn_blocking(move || spreadsheet::parse_first_sheet(&workbook))
        .await
        .map_err(|e| ApiError::Server(format!("spreadsheet task failed: {e}")))??;

    let storage_key = object_key(user.id, &name);
    state
        .storage
        .put_object(&storage_key, &mimetype, bytes.to_vec())
        .await?;

    let now = Utc::now();
    let record = FileRecord {
        id: Uuid::new_v4(),
        owner_id: user.id,
        name,
        storage_key: storage_key.clone(),
        mimetype,
        size_bytes: bytes.len() as i64,
        row_count: parsed.row_count(),
        rows: parsed.into_json(),
        created_at: now,
        updated_at: now,
    };

    let record = match state.repo.files().insert(record).await {
        Ok(record) => record,
        Err(e) => {
            if let Err(cleanup) = state.storage.delete_object(&storage_key).await {
                tracing::warn!(key = %storage_key, error = %cleanup, "orphaned object after failed upload");
            }
            return Err(e.into());
        }
    };

    tracing::info!(
        file_id = %record.id,
        owner = %user.id,
        rows = record.row_count,
        bytes = record.size_bytes,
        "spreadsheet uploaded"
    );
    Ok((StatusCode::CREATED, Json(record)))
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::validation("File too large")
    } else {
        ApiError::validation(e.body_text())
    }
}

#[utoipa::path(
    get,
    path = "/files/{id}",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "Found", body = FileRecord),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_file(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FileRecord>, ApiError> {
    Ok(Json(crud::fetch(state.repo.files(), &user, id).await?))
}

/// update_file
///
/// [Authenticated Route] Renames an upload. The stored bytes are untouched.
#[utoipa::path(
    put,
    path = "/files/{id}",
    params(("id" = Uuid, Path, description = "File ID")),
    request_body = FilePatch,
    responses(
        (status = 200, description = "Updated", body = FileRecord),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_file(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidJson(patch): ValidJson<FilePatch>,
) -> Result<Json<FileRecord>, ApiError> {
    Ok(Json(crud::update(state.repo.files(), &user, id, patch).await?))
}

/// delete_file
///
/// [Authenticated Route] Deletes the record, then its bytes (best effort).
#[utoipa::path(
    delete,
    path = "/files/{id}",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_file(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    let removed = crud::remove(state.repo.files(), &user, id).await?;
    if let Err(e) = state.storage.delete_object(&removed.storage_key).await {
        tracing::warn!(key = %removed.storage_key, error = %e, "orphaned object after file delete");
    }
    Ok(Json(MessageResponse::new("File deleted")))
}

/// download_file
///
/// [Authenticated Route] Streams the stored workbook back under its original
/// name and records the download. `410 Gone` when the metadata survived but
/// the bytes did not.
#[utoipa::path(
    get,
    path = "/files/{id}/download",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "Spreadsheet bytes as an attachment"),
        (status = 404, description = "Not Found"),
        (status = 410, description = "Content no longer available")
    )
)]
pub async fn download_file(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let file = crud::fetch(state.repo.files(), &user, id).await?;
    let bytes = state.storage.get_object(&file.storage_key).await?;

    state
        .repo
        .downloads()
        .insert(Download {
            id: Uuid::new_v4(),
            owner_id: user.id,
            file_id: file.id,
            file_name: file.name.clone(),
            created_at: Utc::now(),
        })
        .await?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        attachment_filename(&file.name)
    );
    Ok((
        [
            (header::CONTENT_TYPE, file.mimetype),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

/// Keeps the filename header-safe: printable ASCII without quotes.
fn attachment_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

// --- Analyses ---

#[utoipa::path(
    get,
    path = "/analysis",
    responses((status = 200, description = "My analyses, newest first", body = [Analysis]))
)]
pub async fn list_analyses(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Analysis>>, ApiError> {
    Ok(Json(crud::list_owned(state.repo.analyses(), &user).await?))
}

#[utoipa::path(
    post,
    path = "/analysis",
    request_body = NewAnalysis,
    responses(
        (status = 201, description = "Saved", body = Analysis),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn create_analysis(
    user: AuthUser,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<NewAnalysis>,
) -> Result<(StatusCode, Json<Analysis>), ApiError> {
    let analysis = crud::create(state.repo.analyses(), &user, payload).await?;
    Ok((StatusCode::CREATED, Json(analysis)))
}

#[utoipa::path(
    get,
    path = "/analysis/{id}",
    params(("id" = Uuid, Path, description = "Analysis ID")),
    responses(
        (status = 200, description = "Found", body = Analysis),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_analysis(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Analysis>, ApiError> {
    Ok(Json(crud::fetch(state.repo.analyses(), &user, id).await?))
}

#[utoipa::path(
    put,
    path = "/analysis/{id}",
    params(("id" = Uuid, Path, description = "Analysis ID")),
    request_body = AnalysisPatch,
    responses(
        (status = 200, description = "Updated", body = Analysis),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_analysis(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidJson(patch): ValidJson<AnalysisPatch>,
) -> Result<Json<Analysis>, ApiError> {
    Ok(Json(crud::update(state.repo.analyses(), &user, id, patch).await?))
}

#[utoipa::path(
    delete,
    path = "/analysis/{id}",
    params(("id" = Uuid, Path, description = "Analysis ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_analysis(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    crud::remove(state.repo.analyses(), &user, id).await?;
    Ok(Json(MessageResponse::new("Analysis deleted")))
}

// --- Downloads ---

#[utoipa::path(
    get,
    path = "/downloads",
    responses((status = 200, description = "My download history", body = [Download]))
)]
pub async fn list_downloads(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Download>>, ApiError> {
    Ok(Json(crud::list_owned(state.repo.downloads(), &user).await?))
}

#[utoipa::path(
    get,
    path = "/downloads/{id}",
    params(("id" = Uuid, Path, description = "Download ID")),
    responses(
        (status = 200, description = "Found", body = Download),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_download(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Download>, ApiError> {
    Ok(Json(crud::fetch(state.repo.downloads(), &user, id).await?))
}

// --- Contact ---

/// submit_contact
///
/// [Public Route] Contact form. Anonymous; the message has no owner.
#[utoipa::path(
    post,
    path = "/contact",
    request_body = NewContactMessage,
    responses(
        (status = 201, description = "Message received", body = ContactMessage),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn submit_contact(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<NewContactMessage>,
) -> Result<(StatusCode, Json<ContactMessage>), ApiError> {
    let message = crud::create_anonymous(state.repo.contacts(), payload).await?;
    tracing::info!(message_id = %message.id, "contact message received");
    Ok((StatusCode::CREATED, Json(message)))
}

// --- Admin ---

/// list_users
///
/// [Admin Route] Every account with its upload, analysis and download totals.
#[utoipa::path(
    get,
    path = "/admin/users",
    responses(
        (status = 200, description = "All accounts", body = [AccountActivity]),
        (status = 403, description = "Not admin-level")
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<AccountActivity>>, ApiError> {
    Ok(Json(state.repo.list_account_activity().await?))
}

#[utoipa::path(
    get,
    path = "/admin/users/{id}",
    params(("id" = Uuid, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Found", body = AccountView),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AccountView>, ApiError> {
    let account = accounts::get_account(state.repo.as_ref(), id).await?;
    Ok(Json(AccountView::from(&account)))
}

/// update_user
///
/// [Admin Route] Partial profile update or password reset. Accounts that
/// outrank the caller are off limits.
#[utoipa::path(
    put,
    path = "/admin/users/{id}",
    params(("id" = Uuid, Path, description = "Account ID")),
    request_body = UpdateAccountRequest,
    responses(
        (status = 200, description = "Updated", body = AccountView),
        (status = 400, description = "Validation failed or email taken"),
        (status = 403, description = "Target outranks caller"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<UpdateAccountRequest>,
) -> Result<Json<AccountView>, ApiError> {
    let account = accounts::update_account(state.repo.as_ref(), &user, id, payload).await?;
    Ok(Json(AccountView::from(&account)))
}

/// delete_user
///
/// [Admin Route] Deletes the account together with its files, analyses and
/// downloads.
#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    params(("id" = Uuid, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Target outranks caller"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    accounts::delete_account(state.repo.as_ref(), state.storage.as_ref(), &user, id).await?;
    Ok(Json(MessageResponse::new("User deleted")))
}

/// create_user
///
/// [Superadmin Route] Creates a user or admin account.
#[utoipa::path(
    post,
    path = "/admin/create",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Created", body = AccountView),
        (status = 400, description = "Validation failed or email taken"),
        (status = 403, description = "Caller is not a superadmin")
    )
)]
pub async fn create_user(
    user: AuthUser,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountView>), ApiError> {
    let account = accounts::create_account(state.repo.as_ref(), &user, payload).await?;
    Ok((StatusCode::CREATED, Json(AccountView::from(&account))))
}

#[utoipa::path(
    get,
    path = "/admin/summary",
    responses((status = 200, description = "System-wide totals", body = ActivitySummary))
)]
pub async fn get_summary(State(state): State<AppState>) -> Result<Json<ActivitySummary>, ApiError> {
    Ok(Json(state.repo.activity_summary().await?))
}

#[utoipa::path(
    get,
    path = "/admin/contacts",
    responses((status = 200, description = "All contact messages", body = [ContactMessage]))
)]
pub async fn list_contacts(
    State(state): State<AppState>,
) -> Result<Json<Vec<ContactMessage>>, ApiError> {
    Ok(Json(crud::list_all(state.repo.contacts()).await?))
}

#[utoipa::path(
    get,
    path = "/admin/contacts/{id}",
    params(("id" = Uuid, Path, description = "Message ID")),
    responses(
        (status = 200, description = "Found", body = ContactMessage),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_contact(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ContactMessage>, ApiError> {
    Ok(Json(crud::fetch(state.repo.contacts(), &user, id).await?))
}

#[utoipa::path(
    patch,
    path = "/admin/contacts/{id}",
    params(("id" = Uuid, Path, description = "Message ID")),
    request_body = ContactPatch,
    responses(
        (status = 200, description = "Status updated", body = ContactMessage),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_contact(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidJson(patch): ValidJson<ContactPatch>,
) -> Result<Json<ContactMessage>, ApiError> {
    Ok(Json(crud::update(state.repo.contacts(), &user, id, patch).await?))
}

#[utoipa::path(
    delete,
    path = "/admin/contacts/{id}",
    params(("id" = Uuid, Path, description = "Message ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_contact(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    crud::remove(state.repo.contacts(), &user, id).await?;
    Ok(Json(MessageResponse::new("Message deleted")))
}

// --- Superadmin ---

/// list_uploads
///
/// [Superadmin Route] Every uploaded file across all accounts.
#[utoipa::path(
    get,
    path = "/admin/uploads",
    responses(
        (status = 200, description = "All uploads", body = [FileRecord]),
        (status = 403, description = "Not superadmin")
    )
)]
pub async fn list_uploads(State(state): State<AppState>) -> Result<Json<Vec<FileRecord>>, ApiError> {
    Ok(Json(crud::list_all(state.repo.files()).await?))
}

#[utoipa::path(
    get,
    path = "/admin/uploads/total",
    responses(
        (status = 200, description = "Upload count", body = UploadTotal),
        (status = 403, description = "Not superadmin")
    )
)]
pub async fn upload_total(State(state): State<AppState>) -> Result<Json<UploadTotal>, ApiError> {
    let count = state.repo.files().count(Scope::All).await?;
    Ok(Json(UploadTotal { count }))
}
