use reqwest::{RequestBuilder, Response, StatusCode, multipart};
use serde::{Deserialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::models::{
    AccountActivity, AccountView, ActivitySummary, Analysis, ContactMessage,
    CreateAccountRequest, Download, FileRecord, LoginRequest, LoginResponse, MessageResponse,
    NewAnalysis, NewContactMessage, RegisterRequest, RegisterResponse, Role,
};

/// ClientError
///
/// Failures seen by API consumers. `Api` carries the server's message so it
/// can be shown to the user as-is.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{message}")]
    Api { status: StatusCode, message: String },
    /// The server answered 401; the session has been cleared.
    #[error("session expired, please log in again")]
    SessionExpired,
    #[error("not logged in")]
    NotLoggedIn,
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::SessionExpired => Some(StatusCode::UNAUTHORIZED),
            ClientError::Http(e) => e.status(),
            ClientError::NotLoggedIn => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Deserialize)]
struct ErrorPayload {
    message: String,
}

/// SessionContext
///
/// What a successful login leaves on the client.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub token: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl SessionContext {
    /// Front-end route of the dashboard matching the session's role.
    pub fn dashboard_path(&self) -> &'static str {
        match self.role {
            Role::User => "/dashboard",
            Role::Admin => "/admin",
            Role::Superadmin => "/superadmin",
        }
    }
}

impl From<LoginResponse> for SessionContext {
    fn from(login: LoginResponse) -> Self {
        Self {
            token: login.token,
            name: login.name,
            email: login.email,
            role: login.role,
        }
    }
}

/// Session
///
/// Explicit client-side session state. Owned by the caller and passed to
/// every authenticated call; the client never keeps a hidden copy.
#[derive(Debug, Default)]
pub struct Session {
    context: Option<SessionContext>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(&self) -> Option<&SessionContext> {
        self.context.as_ref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.context.is_some()
    }

    pub fn clear(&mut self) {
        self.context = None;
    }

    fn token(&self) -> ClientResult<&str> {
        self.context
            .as_ref()
            .map(|c| c.token.as_str())
            .ok_or(ClientError::NotLoggedIn)
    }
}

/// ApiClient
///
/// Typed wrapper over the HTTP API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Maps a non-success response onto `ClientError`, clearing the session
    /// on 401.
    async fn check(response: Response, session: Option<&mut Session>) -> ClientResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            if let Some(session) = session {
                session.clear();
                return Err(ClientError::SessionExpired);
            }
        }
        let message = match response.json::<ErrorPayload>().await {
            Ok(body) => body.message,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string(),
        };
        Err(ClientError::Api { status, message })
    }

    async fn send_public<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = Self::check(request.send().await?, None).await?;
        Ok(response.json().await?)
    }

    async fn send_raw(&self, session: &mut Session, request: RequestBuilder) -> ClientResult<Response> {
        let request = request.bearer_auth(session.token()?);
        Self::check(request.send().await?, Some(session)).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        session: &mut Session,
        request: RequestBuilder,
    ) -> ClientResult<T> {
        Ok(self.send_raw(session, request).await?.json().await?)
    }

    // --- Auth ---

    pub async fn register(&self, req: &RegisterRequest) -> ClientResult<RegisterResponse> {
        self.send_public(self.http.post(self.url("/auth/register")).json(req))
            .await
    }

    /// Logs in and stores the resulting context in `session`.
    pub async fn login(
        &self,
        session: &mut Session,
        req: &LoginRequest,
    ) -> ClientResult<SessionContext> {
        let login: LoginResponse = self
            .send_public(self.http.post(self.url("/auth/login")).json(req))
            .await?;
        let context = SessionContext::from(login);
        session.context = Some(context.clone());
        Ok(context)
    }

    pub fn logout(&self, session: &mut Session) {
        session.clear();
    }

    pub async fn me(&self, session: &mut Session) -> ClientResult<AccountView> {
        self.send(session, self.http.get(self.url("/auth/me"))).await
    }

    // --- Files ---

    pub async fn upload_file(
        &self,
        session: &mut Session,
        file_name: &str,
        mimetype: &str,
        bytes: Vec<u8>,
    ) -> ClientResult<FileRecord> {
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mimetype)?;
        let form = multipart::Form::new().part("file", part);
        self.send(
            session,
            self.http.post(self.url("/files/upload")).multipart(form),
        )
        .await
    }

    pub async fn list_files(&self, session: &mut Session) -> ClientResult<Vec<FileRecord>> {
        self.send(session, self.http.get(self.url("/files"))).await
    }

    pub async fn download_file(&self, session: &mut Session, id: Uuid) -> ClientResult<Vec<u8>> {
        let response = self
            .send_raw(
                session,
                self.http.get(self.url(&format!("/files/{id}/download"))),
            )
            .await?;
        Ok(response.bytes().await?.to_vec())
    }

    pub async fn delete_file(&self, session: &mut Session, id: Uuid) -> ClientResult<MessageResponse> {
        self.send(session, self.http.delete(self.url(&format!("/files/{id}"))))
            .await
    }

    // --- Analyses & downloads ---

    pub async fn create_analysis(
        &self,
        session: &mut Session,
        analysis: &NewAnalysis,
    ) -> ClientResult<Analysis> {
        self.send(session, self.http.post(self.url("/analysis")).json(analysis))
            .await
    }

    pub async fn list_analyses(&self, session: &mut Session) -> ClientResult<Vec<Analysis>> {
        self.send(session, self.http.get(self.url("/analysis"))).await
    }

    pub async fn list_downloads(&self, session: &mut Session) -> ClientResult<Vec<Download>> {
        self.send(session, self.http.get(self.url("/downloads"))).await
    }

    // --- Admin ---

    pub async fn list_users(&self, session: &mut Session) -> ClientResult<Vec<AccountActivity>> {
        self.send(session, self.http.get(self.url("/admin/users"))).await
    }

    pub async fn create_account(
        &self,
        session: &mut Session,
        req: &CreateAccountRequest,
    ) -> ClientResult<AccountView> {
        self.send(session, self.http.post(self.url("/admin/create")).json(req))
            .await
    }

    pub async fn delete_user(&self, session: &mut Session, id: Uuid) -> ClientResult<MessageResponse> {
        self.send(
            session,
            self.http.delete(self.url(&format!("/admin/users/{id}"))),
        )
        .await
    }

    pub async fn summary(&self, session: &mut Session) -> ClientResult<ActivitySummary> {
        self.send(session, self.http.get(self.url("/admin/summary"))).await
    }

    // --- Contact ---

    pub async fn send_contact(&self, message: &NewContactMessage) -> ClientResult<ContactMessage> {
        self.send_public(self.http.post(self.url("/contact")).json(message))
            .await
    }
}
