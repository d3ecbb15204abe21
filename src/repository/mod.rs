use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, postgres::PgRow, query_builder::Separated};
use uuid::Uuid;

use crate::{
    error::RepoResult,
    models::{
        Account, AccountActivity, ActivitySummary, Analysis, ContactMessage, Download, FileRecord,
        Role, Validate,
    },
};

pub mod memory;
pub mod postgres;
mod resources;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// Scope
///
/// Which slice of a collection an operation may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Only records whose owner column equals this account id.
    Owner(Uuid),
    /// Every record (admin-level callers).
    All,
}

impl Scope {
    /// Admin-level principals act system-wide, everyone else on their own rows.
    pub fn for_principal(id: Uuid, role: Role) -> Self {
        if role.is_admin_level() {
            Scope::All
        } else {
            Scope::Owner(id)
        }
    }

    pub fn permits(self, owner: Option<Uuid>) -> bool {
        match self {
            Scope::All => true,
            Scope::Owner(id) => owner == Some(id),
        }
    }
}

/// Resource
///
/// Describes one owned collection to the generic CRUD machinery: where it
/// lives, which column names its owner, and how its rows are written.
/// `COLUMNS` and `push_values` must list the same columns in the same order.
pub trait Resource:
    for<'r> sqlx::FromRow<'r, PgRow> + Clone + Send + Sync + Unpin + 'static
{
    /// Partial update payload applied by `Collection::update`.
    type Patch: Validate + Send + 'static;

    /// Human label used in "<label> not found" messages.
    const LABEL: &'static str;
    const TABLE: &'static str;
    const OWNER_COLUMN: &'static str;
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> Uuid;
    fn owner(&self) -> Option<Uuid>;
    fn created_at(&self) -> DateTime<Utc>;

    /// Merges the supplied fields and bumps the modification timestamp.
    fn apply(&mut self, patch: Self::Patch);

    /// Binds every column value, in `COLUMNS` order.
    fn push_values(&self, row: &mut Separated<'_, '_, Postgres, &'static str>);
}

/// Collection
///
/// Generic CRUD over one resource kind. Every read and write is filtered by
/// a `Scope`, so ownership isolation lives in one place.
#[async_trait]
pub trait Collection<R: Resource>: Send + Sync {
    /// Newest first.
    async fn list(&self, scope: Scope) -> RepoResult<Vec<R>>;
    async fn get(&self, id: Uuid, scope: Scope) -> RepoResult<Option<R>>;
    async fn insert(&self, record: R) -> RepoResult<R>;
    /// `None` when the record is missing or outside the scope.
    async fn update(&self, id: Uuid, scope: Scope, patch: R::Patch) -> RepoResult<Option<R>>;
    /// Returns the removed record so callers can clean up side data.
    async fn delete(&self, id: Uuid, scope: Scope) -> RepoResult<Option<R>>;
    async fn count(&self, scope: Scope) -> RepoResult<i64>;
}

/// CascadeOutcome
///
/// What an account deletion removed along with the account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeOutcome {
    /// Content-store keys of the deleted files; the bytes are not transactional.
    pub storage_keys: Vec<String>,
    pub files: u64,
    pub analyses: u64,
    pub downloads: u64,
}

/// Repository Trait
///
/// The persistence contract used by every handler: the credential store plus
/// one generic collection per owned resource kind. `Send + Sync` so it can
/// live behind `Arc<dyn Repository>` in the shared state.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Credential Store ---
    /// Expects an already normalised email.
    async fn find_account_by_email(&self, email: &str) -> RepoResult<Option<Account>>;
    async fn get_account(&self, id: Uuid) -> RepoResult<Option<Account>>;
    /// Fails with `DuplicateEmail` when the email is taken.
    async fn insert_account(&self, account: Account) -> RepoResult<Account>;
    /// Full-row write (last write wins). `None` if the account vanished.
    async fn update_account(&self, account: Account) -> RepoResult<Option<Account>>;
    /// Removes the account and everything it owns in one atomic unit.
    async fn delete_account(&self, id: Uuid) -> RepoResult<Option<CascadeOutcome>>;

    // --- Admin reporting ---
    async fn list_account_activity(&self) -> RepoResult<Vec<AccountActivity>>;
    async fn activity_summary(&self) -> RepoResult<ActivitySummary>;

    // --- Owned collections ---
    fn files(&self) -> &dyn Collection<FileRecord>;
    fn analyses(&self) -> &dyn Collection<Analysis>;
    fn downloads(&self) -> &dyn Collection<Download>;
    fn contacts(&self) -> &dyn Collection<ContactMessage>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
