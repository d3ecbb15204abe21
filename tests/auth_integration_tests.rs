use axum::{
    extract::FromRequestParts,
    http::{Request, header, request::Parts},
};
use chrono::Utc;
use excel_analytics::{
    AppConfig, ApiError,
    auth::{
        ADMIN_ROLES, AuthUser, Claims, SUPERADMIN_ROLES, TOKEN_TTL_DAYS, authorize, decode_token,
        hash_password, issue_token, verify_password,
    },
    models::Role,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

const SECRET: &str = "super-secure-test-secret-value-local";

fn parts_with_auth(value: Option<&str>) -> Parts {
    let mut builder = Request::builder().uri("/files");
    if let Some(value) = value {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    let (parts, _) = builder.body(()).unwrap().into_parts();
    parts
}

async fn extract(parts: &mut Parts) -> Result<AuthUser, ApiError> {
    AuthUser::from_request_parts(parts, &AppConfig::default()).await
}

// --- Token issuance ---

#[test]
fn test_token_round_trip_carries_id_and_role() {
    let id = Uuid::new_v4();
    let token = issue_token(id, Role::Admin, SECRET).unwrap();

    let claims = decode_token(&token, SECRET).unwrap();
    assert_eq!(claims.sub, id);
    assert_eq!(claims.role, Role::Admin);
    assert_eq!(
        claims.exp - claims.iat,
        (TOKEN_TTL_DAYS * 24 * 60 * 60) as usize
    );
}

#[test]
fn test_token_signed_with_other_secret_is_rejected() {
    let token = issue_token(Uuid::new_v4(), Role::User, "another-secret").unwrap();
    assert!(matches!(
        decode_token(&token, SECRET),
        Err(ApiError::Unauthenticated)
    ));
}

#[test]
fn test_expired_token_is_rejected() {
    let now = Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: Uuid::new_v4(),
        role: Role::User,
        iat: now - 8 * 24 * 3600,
        exp: now - 24 * 3600,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    assert!(matches!(
        decode_token(&token, SECRET),
        Err(ApiError::Unauthenticated)
    ));
}

#[test]
fn test_token_with_unknown_role_is_rejected() {
    let now = Utc::now().timestamp();
    let claims = serde_json::json!({
        "sub": Uuid::new_v4(),
        "role": "root",
        "iat": now,
        "exp": now + 3600,
    });
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    assert!(matches!(
        decode_token(&token, SECRET),
        Err(ApiError::Unauthenticated)
    ));
}

#[test]
fn test_garbage_token_is_rejected() {
    assert!(matches!(
        decode_token("not.a.jwt", SECRET),
        Err(ApiError::Unauthenticated)
    ));
}

// --- Extractor ---

#[tokio::test]
async fn test_extractor_accepts_bearer_token() {
    let id = Uuid::new_v4();
    let token = issue_token(id, Role::Superadmin, SECRET).unwrap();
    let mut parts = parts_with_auth(Some(&format!("Bearer {token}")));

    let user = extract(&mut parts).await.unwrap();
    assert_eq!(
        user,
        AuthUser {
            id,
            role: Role::Superadmin
        }
    );
}

#[tokio::test]
async fn test_extractor_rejects_missing_header() {
    let mut parts = parts_with_auth(None);
    assert!(matches!(
        extract(&mut parts).await,
        Err(ApiError::Unauthenticated)
    ));
}

#[tokio::test]
async fn test_extractor_rejects_non_bearer_scheme() {
    let mut parts = parts_with_auth(Some("Basic dXNlcjpwYXNz"));
    assert!(matches!(
        extract(&mut parts).await,
        Err(ApiError::Unauthenticated)
    ));

    let mut parts = parts_with_auth(Some("Bearer "));
    assert!(matches!(
        extract(&mut parts).await,
        Err(ApiError::Unauthenticated)
    ));
}

#[tokio::test]
async fn test_extractor_reuses_principal_from_gate() {
    let attached = AuthUser {
        id: Uuid::new_v4(),
        role: Role::Admin,
    };
    let mut parts = parts_with_auth(None);
    parts.extensions.insert(attached);

    assert_eq!(extract(&mut parts).await.unwrap(), attached);
}

// --- Role gate ---

#[test]
fn test_authorize_role_sets() {
    let user = AuthUser {
        id: Uuid::new_v4(),
        role: Role::User,
    };
    let admin = AuthUser {
        role: Role::Admin,
        ..user
    };
    let superadmin = AuthUser {
        role: Role::Superadmin,
        ..user
    };

    assert!(matches!(authorize(&user, ADMIN_ROLES), Err(ApiError::Forbidden)));
    assert!(authorize(&admin, ADMIN_ROLES).is_ok());
    assert!(authorize(&superadmin, ADMIN_ROLES).is_ok());

    assert!(matches!(
        authorize(&admin, SUPERADMIN_ROLES),
        Err(ApiError::Forbidden)
    ));
    assert!(authorize(&superadmin, SUPERADMIN_ROLES).is_ok());
}

// --- Password hashing ---

#[test]
fn test_password_hash_verifies_and_is_salted() {
    let first = hash_password("correct horse").unwrap();
    let second = hash_password("correct horse").unwrap();

    assert!(first.starts_with("$argon2id$"));
    assert_ne!(first, second, "each hash uses a fresh salt");
    assert!(verify_password("correct horse", &first).unwrap());
    assert!(!verify_password("battery staple", &first).unwrap());
}

#[test]
fn test_corrupt_stored_hash_is_server_error() {
    assert!(matches!(
        verify_password("anything", "plaintext-oops"),
        Err(ApiError::Server(_))
    ));
}
