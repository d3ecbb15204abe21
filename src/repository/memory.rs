use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CascadeOutcome, Collection, Repository, Resource, Scope};
use crate::{
    error::{RepoResult, RepositoryError},
    models::{Account, AccountActivity, ActivitySummary, Analysis, ContactMessage, Download, FileRecord},
};

type AccountMap = Arc<RwLock<HashMap<Uuid, Account>>>;

/// MemoryCollection
///
/// `Collection` over a locked map. Used by the test suites and by
/// database-less runs; it mirrors the scoping rules of `PgCollection` and the
/// owner foreign key of the schema.
pub struct MemoryCollection<R> {
    records: RwLock<HashMap<Uuid, R>>,
    accounts: AccountMap,
}

impl<R: Resource> MemoryCollection<R> {
    fn new(accounts: AccountMap) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            accounts,
        }
    }

    /// Removes every record owned by `owner`, returning them.
    async fn purge_owner(&self, owner: Uuid) -> Vec<R> {
        let mut records = self.records.write().await;
        let doomed: Vec<Uuid> = records
            .values()
            .filter(|r| r.owner() == Some(owner))
            .map(Resource::id)
            .collect();
        doomed
            .into_iter()
            .filter_map(|id| records.remove(&id))
            .collect()
    }

    async fn count_owned(&self, owner: Uuid) -> i64 {
        let records = self.records.read().await;
        records.values().filter(|r| r.owner() == Some(owner)).count() as i64
    }
}

#[async_trait]
impl<R: Resource> Collection<R> for MemoryCollection<R> {
    async fn list(&self, scope: Scope) -> RepoResult<Vec<R>> {
        let records = self.records.read().await;
        let mut listed: Vec<R> = records
            .values()
            .filter(|r| scope.permits(r.owner()))
            .cloned()
            .collect();
        listed.sort_by_key(|r| std::cmp::Reverse(r.created_at()));
        Ok(listed)
    }

    async fn get(&self, id: Uuid, scope: Scope) -> RepoResult<Option<R>> {
        let records = self.records.read().await;
        Ok(records
            .get(&id)
            .filter(|r| scope.permits(r.owner()))
            .cloned())
    }

    async fn insert(&self, record: R) -> RepoResult<R> {
        // Lock order is accounts, then records, same as the account cascade.
        let accounts = self.accounts.read().await;
        if let Some(owner) = record.owner() {
            if !accounts.contains_key(&owner) {
                return Err(RepositoryError::MissingOwner);
            }
        }
        let mut records = self.records.write().await;
        records.insert(record.id(), record.clone());
        Ok(record)
    }

    async fn update(&self, id: Uuid, scope: Scope, patch: R::Patch) -> RepoResult<Option<R>> {
        let mut records = self.records.write().await;
        match records.get_mut(&id) {
            Some(record) if scope.permits(record.owner()) => {
                record.apply(patch);
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete(&self, id: Uuid, scope: Scope) -> RepoResult<Option<R>> {
        let mut records = self.records.write().await;
        let permitted = records
            .get(&id)
            .is_some_and(|r| scope.permits(r.owner()));
        Ok(if permitted { records.remove(&id) } else { None })
    }

    async fn count(&self, scope: Scope) -> RepoResult<i64> {
        let records = self.records.read().await;
        Ok(records.values().filter(|r| scope.permits(r.owner())).count() as i64)
    }
}

/// InMemoryRepository
///
/// Process-local `Repository`. Account deletion holds the accounts write lock
/// for the whole cascade so no reader observes a half-deleted account.
pub struct InMemoryRepository {
    accounts: AccountMap,
    files: MemoryCollection<FileRecord>,
    analyses: MemoryCollection<Analysis>,
    downloads: MemoryCollection<Download>,
    contacts: MemoryCollection<ContactMessage>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        let accounts = AccountMap::default();
        Self {
            files: MemoryCollection::new(accounts.clone()),
            analyses: MemoryCollection::new(accounts.clone()),
            downloads: MemoryCollection::new(accounts.clone()),
            contacts: MemoryCollection::new(accounts.clone()),
            accounts,
        }
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_account_by_email(&self, email: &str) -> RepoResult<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.values().find(|a| a.email == email).cloned())
    }

    async fn get_account(&self, id: Uuid) -> RepoResult<Option<Account>> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }

    async fn insert_account(&self, account: Account) -> RepoResult<Account> {
        let mut accounts = self.accounts.write().await;
        if accounts.values().any(|a| a.email == account.email) {
            return Err(RepositoryError::DuplicateEmail);
        }
        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn update_account(&self, account: Account) -> RepoResult<Option<Account>> {
        let mut accounts = self.accounts.write().await;
        if accounts
            .values()
            .any(|a| a.email == account.email && a.id != account.id)
        {
            return Err(RepositoryError::DuplicateEmail);
        }
        match accounts.get_mut(&account.id) {
            Some(slot) => {
                *slot = account.clone();
                Ok(Some(account))
            }
            None => Ok(None),
        }
    }

    async fn delete_account(&self, id: Uuid) -> RepoResult<Option<CascadeOutcome>> {
        let mut accounts = self.accounts.write().await;
        if accounts.remove(&id).is_none() {
            return Ok(None);
        }

        let files = self.files.purge_owner(id).await;
        let analyses = self.analyses.purge_owner(id).await.len() as u64;
        let downloads = self.downloads.purge_owner(id).await.len() as u64;

        // Contact messages outlive their sender, like ON DELETE SET NULL.
        {
            let mut contacts = self.contacts.records.write().await;
            for message in contacts.values_mut().filter(|m| m.owner_id == Some(id)) {
                message.owner_id = None;
            }
        }
        drop(accounts);

        Ok(Some(CascadeOutcome {
            files: files.len() as u64,
            storage_keys: files.into_iter().map(|f| f.storage_key).collect(),
            analyses,
            downloads,
        }))
    }

    async fn list_account_activity(&self) -> RepoResult<Vec<AccountActivity>> {
        let accounts: Vec<Account> = self.accounts.read().await.values().cloned().collect();

        let mut rows = Vec::with_capacity(accounts.len());
        for account in accounts {
            rows.push(AccountActivity {
                total_uploads: self.files.count_owned(account.id).await,
                total_analyses: self.analyses.count_owned(account.id).await,
                total_downloads: self.downloads.count_owned(account.id).await,
                id: account.id,
                name: account.name,
                email: account.email,
                role: account.role,
                created_at: account.created_at,
            });
        }
        rows.sort_by_key(|r| std::cmp::Reverse(r.created_at));
        Ok(rows)
    }

    async fn activity_summary(&self) -> RepoResult<ActivitySummary> {
        Ok(ActivitySummary {
            total_users: self.accounts.read().await.len() as i64,
            total_uploads: self.files.count(Scope::All).await?,
            total_analyses: self.analyses.count(Scope::All).await?,
            total_downloads: self.downloads.count(Scope::All).await?,
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
