use excel_analytics::{
    ApiError, accounts,
    auth::{AuthUser, decode_token, verify_password},
    config::SeedAccount,
    models::{CreateAccountRequest, LoginRequest, RegisterRequest, Role, UpdateAccountRequest},
    repository::{InMemoryRepository, Repository, Scope},
    storage::{InMemoryStorage, StorageService},
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

const SECRET: &str = "super-secure-test-secret-value-local";

fn register_req(name: &str, email: &str) -> RegisterRequest {
    RegisterRequest {
        name: name.to_string(),
        email: email.to_string(),
        password: "password123".to_string(),
    }
}

fn login_req(email: &str, password: &str, role: Option<Role>) -> LoginRequest {
    LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
        role,
    }
}

fn caller(role: Role) -> AuthUser {
    AuthUser {
        id: Uuid::new_v4(),
        role,
    }
}

fn create_req(email: &str, role: Role) -> CreateAccountRequest {
    CreateAccountRequest {
        name: "Created".to_string(),
        email: email.to_string(),
        password: "password123".to_string(),
        role,
    }
}

// --- Register / Login ---

#[tokio::test]
async fn test_register_creates_user_with_hashed_password() {
    let repo = InMemoryRepository::new();
    let account = accounts::register(&repo, register_req("Alice", " Alice@Example.com "))
        .await
        .unwrap();

    assert_eq!(account.role, Role::User);
    assert_eq!(account.email, "alice@example.com");
    assert_ne!(account.password_hash, "password123");
    assert!(verify_password("password123", &account.password_hash).unwrap());
}

#[tokio::test]
async fn test_register_duplicate_email_case_insensitive() {
    let repo = InMemoryRepository::new();
    accounts::register(&repo, register_req("Alice", "alice@example.com"))
        .await
        .unwrap();

    let err = accounts::register(&repo, register_req("Other", "ALICE@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::DuplicateEmail));
}

#[tokio::test]
async fn test_login_issues_token_with_stored_role() {
    let repo = InMemoryRepository::new();
    let account = accounts::register(&repo, register_req("Alice", "alice@example.com"))
        .await
        .unwrap();

    let response = accounts::login(&repo, SECRET, login_req("alice@example.com", "password123", None))
        .await
        .unwrap();
    assert_eq!(response.role, Role::User);
    assert_eq!(response.name, "Alice");

    let claims = decode_token(&response.token, SECRET).unwrap();
    assert_eq!(claims.sub, account.id);
    assert_eq!(claims.role, Role::User);
}

#[tokio::test]
async fn test_login_failures_are_distinguished() {
    let repo = InMemoryRepository::new();
    accounts::register(&repo, register_req("Alice", "alice@example.com"))
        .await
        .unwrap();

    let unknown = accounts::login(&repo, SECRET, login_req("nobody@example.com", "x", None)).await;
    assert!(matches!(unknown, Err(ApiError::UnknownEmail)));

    let wrong = accounts::login(&repo, SECRET, login_req("alice@example.com", "nope", None)).await;
    assert!(matches!(wrong, Err(ApiError::InvalidCredentials)));
}

#[tokio::test]
async fn test_login_role_hint_mismatch_fails_loudly() {
    let repo = InMemoryRepository::new();
    accounts::register(&repo, register_req("Alice", "alice@example.com"))
        .await
        .unwrap();

    let err = accounts::login(
        &repo,
        SECRET,
        login_req("alice@example.com", "password123", Some(Role::Admin)),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ApiError::RoleMismatch(Role::Admin)));
    assert_eq!(err.to_string(), "This account is not a admin");

    // A matching hint is accepted.
    assert!(
        accounts::login(
            &repo,
            SECRET,
            login_req("alice@example.com", "password123", Some(Role::User)),
        )
        .await
        .is_ok()
    );
}

// --- Administrative creation ---

#[tokio::test]
async fn test_only_superadmin_grants_admin_roles() {
    let repo = InMemoryRepository::new();

    for role in [Role::Admin, Role::Superadmin] {
        let err = accounts::create_account(&repo, &caller(Role::Admin), create_req("x@example.com", role))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden));
    }

    let admin = accounts::create_account(
        &repo,
        &caller(Role::Superadmin),
        create_req("admin@example.com", Role::Admin),
    )
    .await
    .unwrap();
    assert_eq!(admin.role, Role::Admin);

    // The service only guards role grants; the route itself is superadmin-only.
    let user = accounts::create_account(
        &repo,
        &caller(Role::Admin),
        create_req("user@example.com", Role::User),
    )
    .await
    .unwrap();
    assert_eq!(user.role, Role::User);
}

// --- Update ---

#[tokio::test]
async fn test_update_merges_and_resets_password() {
    let repo = InMemoryRepository::new();
    let account = accounts::register(&repo, register_req("Alice", "alice@example.com"))
        .await
        .unwrap();

    let updated = accounts::update_account(
        &repo,
        &caller(Role::Admin),
        account.id,
        UpdateAccountRequest {
            name: Some("Alice Smith".to_string()),
            password: Some("new-password".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(updated.name, "Alice Smith");
    assert_eq!(updated.email, "alice@example.com");
    assert!(verify_password("new-password", &updated.password_hash).unwrap());
    assert!(!verify_password("password123", &updated.password_hash).unwrap());
}

#[tokio::test]
async fn test_update_rejects_taken_email_and_missing_account() {
    let repo = InMemoryRepository::new();
    accounts::register(&repo, register_req("Alice", "alice@example.com"))
        .await
        .unwrap();
    let bob = accounts::register(&repo, register_req("Bob", "bob@example.com"))
        .await
        .unwrap();

    let taken = accounts::update_account(
        &repo,
        &caller(Role::Admin),
        bob.id,
        UpdateAccountRequest {
            email: Some("Alice@example.com".to_string()),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(taken, Err(ApiError::DuplicateEmail)));

    let missing = accounts::update_account(
        &repo,
        &caller(Role::Admin),
        Uuid::new_v4(),
        UpdateAccountRequest::default(),
    )
    .await;
    assert!(matches!(missing, Err(ApiError::NotFound("User"))));
}

#[tokio::test]
async fn test_admin_cannot_touch_superadmin_or_promote() {
    let repo = InMemoryRepository::new();
    let root = accounts::create_account(
        &repo,
        &caller(Role::Superadmin),
        create_req("root@example.com", Role::Superadmin),
    )
    .await
    .unwrap();
    let user = accounts::register(&repo, register_req("Alice", "alice@example.com"))
        .await
        .unwrap();
    let admin = caller(Role::Admin);

    let rename_root = accounts::update_account(
        &repo,
        &admin,
        root.id,
        UpdateAccountRequest {
            name: Some("pwned".to_string()),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(rename_root, Err(ApiError::Forbidden)));

    let promote = accounts::update_account(
        &repo,
        &admin,
        user.id,
        UpdateAccountRequest {
            role: Some(Role::Admin),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(promote, Err(ApiError::Forbidden)));

    let storage = InMemoryStorage::new();
    let delete_root = accounts::delete_account(&repo, &storage, &admin, root.id).await;
    assert!(matches!(delete_root, Err(ApiError::Forbidden)));
}

// --- Delete ---

#[tokio::test]
async fn test_delete_cascades_and_removes_blobs() {
    let repo = InMemoryRepository::new();
    let storage = InMemoryStorage::new();
    let alice = accounts::register(&repo, register_req("Alice", "alice@example.com"))
        .await
        .unwrap();

    let key = format!("uploads/{}/sheet.xlsx", alice.id);
    storage
        .put_object(&key, "application/vnd.ms-excel", vec![1, 2, 3])
        .await
        .unwrap();
    let now = Utc::now();
    repo.files()
        .insert(excel_analytics::models::FileRecord {
            id: Uuid::new_v4(),
            owner_id: alice.id,
            name: "sheet.xlsx".to_string(),
            storage_key: key.clone(),
            mimetype: "application/vnd.ms-excel".to_string(),
            size_bytes: 3,
            row_count: 0,
            rows: json!([]),
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();

    let outcome = accounts::delete_account(&repo, &storage, &caller(Role::Admin), alice.id)
        .await
        .unwrap();
    assert_eq!(outcome.files, 1);
    assert!(!storage.contains(&key).await);
    assert_eq!(repo.files().count(Scope::Owner(alice.id)).await.unwrap(), 0);

    let again = accounts::delete_account(&repo, &storage, &caller(Role::Admin), alice.id).await;
    assert!(matches!(again, Err(ApiError::NotFound("User"))));
}

// --- Seed ---

#[tokio::test]
async fn test_seed_is_idempotent() {
    let repo = InMemoryRepository::new();
    let seed = SeedAccount {
        name: "Root".to_string(),
        email: "Root@Example.com".to_string(),
        password: "root-password".to_string(),
    };

    assert!(accounts::ensure_seed_account(&repo, &seed).await.unwrap());
    assert!(!accounts::ensure_seed_account(&repo, &seed).await.unwrap());

    let root = repo
        .find_account_by_email("root@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(root.role, Role::Superadmin);
}
