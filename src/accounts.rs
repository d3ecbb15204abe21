use chrono::Utc;
use uuid::Uuid;

use crate::{
    auth::{self, AuthUser},
    config::SeedAccount,
    error::ApiError,
    models::{
        Account, AccountView, CreateAccountRequest, LoginRequest, LoginResponse, RegisterRequest,
        Role, UpdateAccountRequest, normalize_email,
    },
    repository::{CascadeOutcome, Repository},
    storage::StorageService,
};

/// Hashes on the blocking pool so request workers stay responsive.
async fn hash_blocking(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || auth::hash_password(&password))
        .await
        .map_err(|e| ApiError::Server(format!("hashing task failed: {e}")))?
}

async fn verify_blocking(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || auth::verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::Server(format!("verification task failed: {e}")))?
}

/// Granting an admin-level role is reserved to superadmins.
fn ensure_may_grant(caller: &AuthUser, role: Role) -> Result<(), ApiError> {
    if role.is_admin_level() && caller.role != Role::Superadmin {
        tracing::warn!(caller = %caller.id, requested = %role, "admin-level grant refused");
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

/// A caller may only manage accounts at or below its own rank.
fn ensure_not_outranked(caller: &AuthUser, target: &Account) -> Result<(), ApiError> {
    if target.role > caller.role {
        tracing::warn!(caller = %caller.id, target = %target.id, "target outranks caller");
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

async fn create_with_role(
    repo: &dyn Repository,
    name: &str,
    email: &str,
    password: String,
    role: Role,
) -> Result<Account, ApiError> {
    let email = normalize_email(email);
    if repo.find_account_by_email(&email).await?.is_some() {
        return Err(ApiError::DuplicateEmail);
    }

    let now = Utc::now();
    let account = Account {
        id: Uuid::new_v4(),
        name: name.trim().to_string(),
        email,
        password_hash: hash_blocking(password).await?,
        role,
        created_at: now,
        updated_at: now,
    };

    // The unique index still guards the race between the lookup and the insert.
    let account = repo.insert_account(account).await?;
    tracing::info!(account_id = %account.id, role = %account.role, "account created");
    Ok(account)
}

/// register
///
/// Self-service sign-up. Always yields a `user`.
pub async fn register(repo: &dyn Repository, req: RegisterRequest) -> Result<Account, ApiError> {
    create_with_role(repo, &req.name, &req.email, req.password, Role::User).await
}

/// login
///
/// Verifies the credentials and issues a token carrying the stored role. The
/// optional role hint from the login form must match that role exactly.
pub async fn login(
    repo: &dyn Repository,
    jwt_secret: &str,
    req: LoginRequest,
) -> Result<LoginResponse, ApiError> {
    let email = normalize_email(&req.email);
    let account = repo
        .find_account_by_email(&email)
        .await?
        .ok_or(ApiError::UnknownEmail)?;

    if !verify_blocking(req.password, account.password_hash.clone()).await? {
        tracing::info!(account_id = %account.id, "login rejected: bad password");
        return Err(ApiError::InvalidCredentials);
    }

    if let Some(expected) = req.role {
        if expected != account.role {
            return Err(ApiError::RoleMismatch(expected));
        }
    }

    let token = auth::issue_token(account.id, account.role, jwt_secret)?;
    tracing::info!(account_id = %account.id, role = %account.role, "login succeeded");

    Ok(LoginResponse {
        token,
        name: account.name,
        email: account.email,
        role: account.role,
    })
}

/// profile
pub async fn profile(repo: &dyn Repository, user: &AuthUser) -> Result<AccountView, ApiError> {
    repo.get_account(user.id)
        .await?
        .map(|account| AccountView::from(&account))
        // The token outlived its account.
        .ok_or(ApiError::Unauthenticated)
}

/// create_account
///
/// Administrative creation with a chosen role.
pub async fn create_account(
    repo: &dyn Repository,
    caller: &AuthUser,
    req: CreateAccountRequest,
) -> Result<Account, ApiError> {
    ensure_may_grant(caller, req.role)?;
    create_with_role(repo, &req.name, &req.email, req.password, req.role).await
}

pub async fn get_account(repo: &dyn Repository, id: Uuid) -> Result<Account, ApiError> {
    repo.get_account(id).await?.ok_or(ApiError::NotFound("User"))
}

/// update_account
///
/// Partial merge of the supplied fields. A supplied password is re-hashed.
pub async fn update_account(
    repo: &dyn Repository,
    caller: &AuthUser,
    id: Uuid,
    req: UpdateAccountRequest,
) -> Result<Account, ApiError> {
    let mut account = get_account(repo, id).await?;
    ensure_not_outranked(caller, &account)?;

    if let Some(role) = req.role {
        if role != account.role {
            ensure_may_grant(caller, role)?;
        }
        account.role = role;
    }
    if let Some(name) = req.name {
        account.name = name.trim().to_string();
    }
    if let Some(email) = req.email {
        let email = normalize_email(&email);
        if let Some(existing) = repo.find_account_by_email(&email).await? {
            if existing.id != account.id {
                return Err(ApiError::DuplicateEmail);
            }
        }
        account.email = email;
    }
    if let Some(password) = req.password {
        account.password_hash = hash_blocking(password).await?;
        tracing::info!(account_id = %account.id, "password reset");
    }
    account.updated_at = Utc::now();

    repo.update_account(account)
        .await?
        .ok_or(ApiError::NotFound("User"))
}

/// delete_account
///
/// Removes the account with its files, analyses and downloads in one atomic
/// unit, then drops the stored spreadsheet bytes. Blob removal is best effort:
/// a failure is logged and leaves an orphaned object, never a dangling row.
pub async fn delete_account(
    repo: &dyn Repository,
    storage: &dyn StorageService,
    caller: &AuthUser,
    id: Uuid,
) -> Result<CascadeOutcome, ApiError> {
    let target = get_account(repo, id).await?;
    ensure_not_outranked(caller, &target)?;

    let outcome = repo
        .delete_account(id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    for key in &outcome.storage_keys {
        if let Err(e) = storage.delete_object(key).await {
            tracing::warn!(key = %key, error = %e, "orphaned object after account delete");
        }
    }

    tracing::info!(
        account_id = %id,
        files = outcome.files,
        analyses = outcome.analyses,
        downloads = outcome.downloads,
        "account deleted"
    );
    Ok(outcome)
}

/// ensure_seed_account
///
/// Creates the bootstrap superadmin unless an account with that email exists.
/// Returns whether an account was created.
pub async fn ensure_seed_account(
    repo: &dyn Repository,
    seed: &SeedAccount,
) -> Result<bool, ApiError> {
    if repo
        .find_account_by_email(&normalize_email(&seed.email))
        .await?
        .is_some()
    {
        return Ok(false);
    }
    create_with_role(
        repo,
        &seed.name,
        &seed.email,
        seed.password.clone(),
        Role::Superadmin,
    )
    .await?;
    Ok(true)
}
