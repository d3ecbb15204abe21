use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;

// --- Roles ---

/// Role
///
/// The RBAC field carried by every account and every session token.
/// Variants are declared in ascending order of privilege so `Ord` doubles as
/// the "outranks" relation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
    TS, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Admin,
    Superadmin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        }
    }

    /// Admin-level roles may see and manage records they do not own.
    pub fn is_admin_level(self) -> bool {
        matches!(self, Role::Admin | Role::Superadmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role `{0}`")]
pub struct UnknownRole(pub String);

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "superadmin" => Ok(Role::Superadmin),
            _ => Err(UnknownRole(value)),
        }
    }
}

// --- Accounts ---

/// Account
///
/// Canonical row of the `accounts` table. Holds the password hash, so it is
/// deliberately not `Serialize`; every read path goes through `AccountView`.
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    /// Trimmed and lowercased, see `normalize_email`.
    pub email: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// AccountView
///
/// Public projection of an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AccountView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            name: account.name.clone(),
            email: account.email.clone(),
            role: account.role,
            created_at: account.created_at,
        }
    }
}

/// AccountActivity
///
/// Row of the admin user listing: the account plus derived per-account totals.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AccountActivity {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "number")]
    pub total_uploads: i64,
    #[ts(type = "number")]
    pub total_analyses: i64,
    #[ts(type = "number")]
    pub total_downloads: i64,
}

/// ActivitySummary
///
/// System-wide counters for the admin dashboard (GET /admin/summary).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ActivitySummary {
    #[ts(type = "number")]
    pub total_users: i64,
    #[ts(type = "number")]
    pub total_uploads: i64,
    #[ts(type = "number")]
    pub total_analyses: i64,
    #[ts(type = "number")]
    pub total_downloads: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UploadTotal {
    #[ts(type = "number")]
    pub count: i64,
}

// --- Auth payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(deny_unknown_fields)]
#[ts(export)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// LoginRequest
///
/// `role` is an advisory hint naming the dashboard the user picked on the
/// login form. A mismatch fails the login, but the issued token always carries
/// the role stored on the account, never this value.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(deny_unknown_fields)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterResponse {
    pub message: String,
    pub user: AccountView,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// --- Account administration payloads ---

/// CreateAccountRequest
///
/// Administrative creation (POST /admin/create). Admin-level roles may only
/// be granted by a superadmin.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(deny_unknown_fields)]
#[ts(export)]
pub struct CreateAccountRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

/// UpdateAccountRequest
///
/// Partial update; only supplied fields overwrite. A supplied `password`
/// resets the password.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(deny_unknown_fields)]
#[ts(export)]
pub struct UpdateAccountRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub password: Option<String>,
}

// --- Files ---

/// FileRecord
///
/// Metadata of an uploaded spreadsheet plus the rows parsed from its first
/// worksheet. The bytes themselves live in the content store under
/// `storage_key`, which never leaves the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FileRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// Original filename as sent by the client.
    pub name: String,
    #[serde(skip)]
    pub storage_key: String,
    pub mimetype: String,
    #[ts(type = "number")]
    pub size_bytes: i64,
    #[ts(type = "number")]
    pub row_count: i64,
    /// Array of objects keyed by the header row.
    #[ts(type = "Array<Record<string, unknown>>")]
    #[schema(value_type = Object)]
    pub rows: Value,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(deny_unknown_fields)]
#[ts(export)]
pub struct FilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub name: Option<String>,
}

/// UploadForm
///
/// Documentation-only schema of the multipart upload body.
#[derive(ToSchema)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

// --- Analyses ---

/// Analysis
///
/// A saved chart analysis. `result` is an opaque blob produced by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Analysis {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub file_id: Option<Uuid>,
    pub file_name: String,
    #[ts(type = "unknown")]
    #[schema(value_type = Object)]
    pub result: Value,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[ts(export)]
pub struct NewAnalysis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub file_id: Option<Uuid>,
    pub file_name: String,
    #[ts(type = "unknown")]
    #[schema(value_type = Object)]
    pub result: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[ts(export)]
pub struct AnalysisPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "unknown")]
    #[schema(value_type = Option<Object>)]
    pub result: Option<Value>,
}

// --- Downloads ---

/// Download
///
/// One row per successful file download, kept for the activity counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Download {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub file_id: Uuid,
    pub file_name: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Contact messages ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum ContactStatus {
    #[default]
    New,
    InProgress,
    Resolved,
}

impl ContactStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ContactStatus::New => "new",
            ContactStatus::InProgress => "in-progress",
            ContactStatus::Resolved => "resolved",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown contact status `{0}`")]
pub struct UnknownStatus(pub String);

impl TryFrom<String> for ContactStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "new" => Ok(ContactStatus::New),
            "in-progress" => Ok(ContactStatus::InProgress),
            "resolved" => Ok(ContactStatus::Resolved),
            _ => Err(UnknownStatus(value)),
        }
    }
}

/// ContactMessage
///
/// A message from the public contact form. Submissions are anonymous, so the
/// owner reference is usually empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ContactMessage {
    pub id: Uuid,
    pub owner_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub message: String,
    #[sqlx(try_from = "String")]
    pub status: ContactStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(deny_unknown_fields)]
#[ts(export)]
pub struct NewContactMessage {
    pub name: String,
    pub email: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(deny_unknown_fields)]
#[ts(export)]
pub struct ContactPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub status: Option<ContactStatus>,
}

// --- Validation ---

/// Validate
///
/// Boundary checks run on every request payload before it reaches a service.
pub trait Validate {
    fn validate(&self) -> Result<(), ApiError>;
}

/// Rejects blank required fields.
fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!("{field} is required")));
    }
    Ok(())
}

/// Rejects an optional field that was supplied but left blank.
fn reject_blank(field: &str, value: Option<&String>) -> Result<(), ApiError> {
    match value {
        Some(v) => require(field, v),
        None => Ok(()),
    }
}

/// Accepts `local@domain.tld`: non-blank, no whitespace, one `@`, and a dot
/// inside the domain part.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}

fn require_email(value: &str) -> Result<(), ApiError> {
    require("email", value)?;
    if !is_valid_email(value) {
        return Err(ApiError::validation("Enter a valid email"));
    }
    Ok(())
}

/// Emails are the login key; compare them case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), ApiError> {
        require("name", &self.name)?;
        require_email(&self.email)?;
        require("password", &self.password)
    }
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), ApiError> {
        require("email", &self.email)?;
        require("password", &self.password)
    }
}

impl Validate for CreateAccountRequest {
    fn validate(&self) -> Result<(), ApiError> {
        require("name", &self.name)?;
        require_email(&self.email)?;
        require("password", &self.password)
    }
}

impl Validate for UpdateAccountRequest {
    fn validate(&self) -> Result<(), ApiError> {
        reject_blank("name", self.name.as_ref())?;
        reject_blank("password", self.password.as_ref())?;
        if let Some(email) = &self.email {
            require_email(email)?;
        }
        Ok(())
    }
}

impl Validate for FilePatch {
    fn validate(&self) -> Result<(), ApiError> {
        reject_blank("name", self.name.as_ref())
    }
}

impl Validate for NewAnalysis {
    fn validate(&self) -> Result<(), ApiError> {
        require("fileName", &self.file_name)?;
        if self.result.is_null() {
            return Err(ApiError::validation("result is required"));
        }
        Ok(())
    }
}

impl Validate for AnalysisPatch {
    fn validate(&self) -> Result<(), ApiError> {
        reject_blank("fileName", self.file_name.as_ref())?;
        if matches!(self.result, Some(Value::Null)) {
            return Err(ApiError::validation("result must not be null"));
        }
        Ok(())
    }
}

impl Validate for NewContactMessage {
    fn validate(&self) -> Result<(), ApiError> {
        require("name", &self.name)?;
        require_email(&self.email)?;
        require("message", &self.message)
    }
}

impl Validate for ContactPatch {
    fn validate(&self) -> Result<(), ApiError> {
        Ok(())
    }
}

impl Validate for std::convert::Infallible {
    fn validate(&self) -> Result<(), ApiError> {
        match *self {}
    }
}
