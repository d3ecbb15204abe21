use std::marker::PhantomData;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder};
use uuid::Uuid;

use super::{CascadeOutcome, Collection, Repository, Resource, Scope};
use crate::{
    error::RepoResult,
    models::{Account, AccountActivity, ActivitySummary, Analysis, ContactMessage, Download, FileRecord},
};

const ACCOUNT_COLUMNS: &str = "id, name, email, password_hash, role, created_at, updated_at";

/// PgCollection
///
/// `Collection` implementation for any `Resource`, built with `QueryBuilder`
/// so every value is bound rather than interpolated. Only the static table and
/// column names from the `Resource` impl are spliced into the SQL text.
pub struct PgCollection<R> {
    pool: PgPool,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> PgCollection<R> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _resource: PhantomData,
        }
    }

    fn columns() -> String {
        R::COLUMNS.join(", ")
    }

    fn select() -> QueryBuilder<'static, Postgres> {
        QueryBuilder::new(format!("SELECT {} FROM {}", Self::columns(), R::TABLE))
    }

    /// Appends the owner filter when the scope is restricted. Assumes a
    /// preceding `WHERE` clause.
    fn push_scope(builder: &mut QueryBuilder<'static, Postgres>, scope: Scope) {
        if let Scope::Owner(owner) = scope {
            builder.push(format!(" AND {} = ", R::OWNER_COLUMN));
            builder.push_bind(owner);
        }
    }
}

#[async_trait]
impl<R: Resource> Collection<R> for PgCollection<R> {
    async fn list(&self, scope: Scope) -> RepoResult<Vec<R>> {
        let mut builder = Self::select();
        builder.push(" WHERE TRUE");
        Self::push_scope(&mut builder, scope);
        builder.push(" ORDER BY created_at DESC");

        Ok(builder.build_query_as::<R>().fetch_all(&self.pool).await?)
    }

    async fn get(&self, id: Uuid, scope: Scope) -> RepoResult<Option<R>> {
        let mut builder = Self::select();
        builder.push(" WHERE id = ");
        builder.push_bind(id);
        Self::push_scope(&mut builder, scope);

        Ok(builder
            .build_query_as::<R>()
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert(&self, record: R) -> RepoResult<R> {
        let mut builder: QueryBuilder<'static, Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {} ({}) VALUES (",
            R::TABLE,
            Self::columns()
        ));
        record.push_values(&mut builder.separated(", "));
        builder.push(format!(") RETURNING {}", Self::columns()));

        Ok(builder.build_query_as::<R>().fetch_one(&self.pool).await?)
    }

    /// Read, merge in memory, write the whole row back. Concurrent updates
    /// to the same record are last-write-wins.
    async fn update(&self, id: Uuid, scope: Scope, patch: R::Patch) -> RepoResult<Option<R>> {
        let Some(mut record) = self.get(id, scope).await? else {
            return Ok(None);
        };
        record.apply(patch);

        let mut builder: QueryBuilder<'static, Postgres> = QueryBuilder::new(format!(
            "UPDATE {} SET ({}) = (",
            R::TABLE,
            Self::columns()
        ));
        record.push_values(&mut builder.separated(", "));
        builder.push(") WHERE id = ");
        builder.push_bind(id);
        Self::push_scope(&mut builder, scope);
        builder.push(format!(" RETURNING {}", Self::columns()));

        Ok(builder
            .build_query_as::<R>()
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete(&self, id: Uuid, scope: Scope) -> RepoResult<Option<R>> {
        let mut builder: QueryBuilder<'static, Postgres> =
            QueryBuilder::new(format!("DELETE FROM {} WHERE id = ", R::TABLE));
        builder.push_bind(id);
        Self::push_scope(&mut builder, scope);
        builder.push(format!(" RETURNING {}", Self::columns()));

        Ok(builder
            .build_query_as::<R>()
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn count(&self, scope: Scope) -> RepoResult<i64> {
        let mut builder: QueryBuilder<'static, Postgres> =
            QueryBuilder::new(format!("SELECT COUNT(*) FROM {} WHERE TRUE", R::TABLE));
        Self::push_scope(&mut builder, scope);

        Ok(builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?)
    }
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
    files: PgCollection<FileRecord>,
    analyses: PgCollection<Analysis>,
    downloads: PgCollection<Download>,
    contacts: PgCollection<ContactMessage>,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            files: PgCollection::new(pool.clone()),
            analyses: PgCollection::new(pool.clone()),
            downloads: PgCollection::new(pool.clone()),
            contacts: PgCollection::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_account_by_email(&self, email: &str) -> RepoResult<Option<Account>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1");
        Ok(sqlx::query_as::<_, Account>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_account(&self, id: Uuid) -> RepoResult<Option<Account>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        Ok(sqlx::query_as::<_, Account>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_account(&self, account: Account) -> RepoResult<Account> {
        let query = format!(
            "INSERT INTO accounts ({ACCOUNT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {ACCOUNT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Account>(&query)
            .bind(account.id)
            .bind(&account.name)
            .bind(&account.email)
            .bind(&account.password_hash)
            .bind(account.role.as_str())
            .bind(account.created_at)
            .bind(account.updated_at)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_account(&self, account: Account) -> RepoResult<Option<Account>> {
        let query = format!(
            "UPDATE accounts SET name = $2, email = $3, password_hash = $4, role = $5, \
             updated_at = $6 WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Account>(&query)
            .bind(account.id)
            .bind(&account.name)
            .bind(&account.email)
            .bind(&account.password_hash)
            .bind(account.role.as_str())
            .bind(account.updated_at)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// delete_account
    ///
    /// Deletes the owned rows and then the account inside one transaction, so
    /// a failure part-way leaves nothing orphaned. Contact messages keep their
    /// text; the foreign key nulls their owner.
    async fn delete_account(&self, id: Uuid) -> RepoResult<Option<CascadeOutcome>> {
        let mut tx = self.pool.begin().await?;

        let storage_keys: Vec<String> =
            sqlx::query_scalar("DELETE FROM files WHERE owner_id = $1 RETURNING storage_key")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;
        let analyses = sqlx::query("DELETE FROM analyses WHERE owner_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let downloads = sqlx::query("DELETE FROM downloads WHERE owner_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let deleted = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await?;
            return Ok(None);
        }
        tx.commit().await?;

        Ok(Some(CascadeOutcome {
            files: storage_keys.len() as u64,
            storage_keys,
            analyses,
            downloads,
        }))
    }

    async fn list_account_activity(&self) -> RepoResult<Vec<AccountActivity>> {
        let query = r#"
            SELECT
                a.id, a.name, a.email, a.role, a.created_at,
                (SELECT COUNT(*) FROM files f WHERE f.owner_id = a.id) AS total_uploads,
                (SELECT COUNT(*) FROM analyses n WHERE n.owner_id = a.id) AS total_analyses,
                (SELECT COUNT(*) FROM downloads d WHERE d.owner_id = a.id) AS total_downloads
            FROM accounts a
            ORDER BY a.created_at DESC
        "#;

        Ok(sqlx::query_as::<_, AccountActivity>(query)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn activity_summary(&self) -> RepoResult<ActivitySummary> {
        let (total_users, total_uploads, total_analyses, total_downloads): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM accounts),
                    (SELECT COUNT(*) FROM files),
                    (SELECT COUNT(*) FROM analyses),
                    (SELECT COUNT(*) FROM downloads)
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(ActivitySummary {
            total_users,
            total_uploads,
            total_analyses,
            total_downloads,
        })
    }

    fn files(&self) -> &dyn Collection<FileRecord> {
        &self.files
    }

    fn analyses(&self) -> &dyn Collection<Analysis> {
        &self.analyses
    }

    fn downloads(&self) -> &dyn Collection<Download> {
        &self.downloads
    }

    fn contacts(&self) -> &dyn Collection<ContactMessage> {
        &self.contacts
    }
}
