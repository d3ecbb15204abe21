use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRef, FromRequestParts, Request},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{config::AppConfig, error::ApiError, models::Role};

/// Lifetime of an issued session token.
pub const TOKEN_TTL_DAYS: i64 = 7;

/// Roles admitted by the admin router.
pub const ADMIN_ROLES: &[Role] = &[Role::Admin, Role::Superadmin];
/// Roles admitted by the superadmin-only routes.
pub const SUPERADMIN_ROLES: &[Role] = &[Role::Superadmin];

/// Claims
///
/// Payload of every session token. Signed with the server secret (HS256) and
/// validated on every authenticated request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the account id.
    pub sub: Uuid,
    /// Role held by the account when the token was issued. A token whose role
    /// is not one of the known values fails to decode.
    pub role: Role,
    /// Issued At (iat).
    pub iat: usize,
    /// Expiration Time (exp): `iat` plus seven days.
    pub exp: usize,
}

impl Claims {
    pub fn new(sub: Uuid, role: Role) -> Self {
        let now = Utc::now();
        Self {
            sub,
            role,
            iat: now.timestamp() as usize,
            exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
        }
    }
}

/// issue_token
///
/// Signs a fresh session token for the given account.
pub fn issue_token(sub: Uuid, role: Role, secret: &str) -> Result<String, ApiError> {
    encode(
        &Header::default(),
        &Claims::new(sub, role),
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Server(format!("token signing failed: {e}")))
}

/// decode_token
///
/// Verifies signature and expiry. Every failure collapses to `Unauthenticated`;
/// the reason is only logged.
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        match e.kind() {
            ErrorKind::ExpiredSignature => tracing::debug!("rejected expired token"),
            other => tracing::debug!(reason = ?other, "rejected invalid token"),
        }
        ApiError::Unauthenticated
    })
}

/// AuthUser
///
/// The principal of an authenticated request, taken straight from the token
/// claims. No database lookup happens here; controllers enforce ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            role: claims.role,
        }
    }
}

/// AuthUser Extractor Implementation
///
/// Reuses the principal a gate middleware already attached to the request;
/// otherwise reads `Authorization: Bearer <token>` and decodes it.
///
/// Rejection: `ApiError::Unauthenticated` (401).
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(*user);
        }

        let config = AppConfig::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ApiError::Unauthenticated)?;

        decode_token(token, &config.jwt_secret).map(AuthUser::from)
    }
}

/// authorize
///
/// The role half of the gate: `Forbidden` unless the principal's role is in
/// the allowed set.
pub fn authorize(user: &AuthUser, allowed: &[Role]) -> Result<(), ApiError> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        tracing::warn!(user_id = %user.id, role = %user.role, "role not permitted on route");
        Err(ApiError::Forbidden)
    }
}

/// require_authenticated
///
/// Route layer for the authenticated router. A failed `AuthUser` extraction
/// short-circuits with 401 before the handler runs.
pub async fn require_authenticated(user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(user);
    next.run(request).await
}

/// require_admin
///
/// Route layer for the admin router: authenticated and admin-level.
pub async fn require_admin(
    user: AuthUser,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&user, ADMIN_ROLES)?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// require_superadmin
pub async fn require_superadmin(
    user: AuthUser,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&user, SUPERADMIN_ROLES)?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

// --- Password hashing ---

/// hash_password
///
/// Argon2id with a random salt, encoded as a PHC string. CPU-heavy; call it
/// from a blocking thread.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Server(format!("password hashing failed: {e}")))
}

/// verify_password
///
/// `Ok(false)` on mismatch; an unparsable stored hash is a server error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, ApiError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| ApiError::Server(format!("invalid stored password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
