use axum::{
    Json,
    extract::{FromRequest, Request},
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::ApiError,
    models::{
        Analysis, ContactMessage, ContactStatus, NewAnalysis, NewContactMessage, Validate,
        normalize_email,
    },
    repository::{Collection, Resource, Scope},
};

/// ValidJson
///
/// `Json<T>` plus `Validate`. Malformed bodies, missing fields and unknown
/// fields all surface as a 400 `ValidationError` instead of axum's 422.
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::validation(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidJson(value))
    }
}

/// Draft
///
/// A validated create payload that becomes a stored record once the server
/// stamps id, owner and timestamps.
pub trait Draft: Validate {
    type Record: Resource;

    fn into_record(self, owner: Option<Uuid>) -> Self::Record;
}

impl Draft for NewAnalysis {
    type Record = Analysis;

    fn into_record(self, owner: Option<Uuid>) -> Analysis {
        let now = Utc::now();
        Analysis {
            id: Uuid::new_v4(),
            owner_id: owner.unwrap_or_default(),
            file_id: self.file_id,
            file_name: self.file_name.trim().to_string(),
            result: self.result,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Draft for NewContactMessage {
    type Record = ContactMessage;

    fn into_record(self, owner: Option<Uuid>) -> ContactMessage {
        let now = Utc::now();
        ContactMessage {
            id: Uuid::new_v4(),
            owner_id: owner,
            name: self.name.trim().to_string(),
            email: normalize_email(&self.email),
            message: self.message.trim().to_string(),
            status: ContactStatus::New,
            created_at: now,
            updated_at: now,
        }
    }
}

// --- Generic operations ---
//
// Every helper takes the principal and derives the scope itself: plain users
// only ever reach their own rows, admin-level callers reach everything.
// "Not yours" is reported exactly like "missing".

/// Lists the caller's own records, newest first.
pub async fn list_owned<R: Resource>(
    collection: &dyn Collection<R>,
    user: &AuthUser,
) -> Result<Vec<R>, ApiError> {
    Ok(collection.list(Scope::Owner(user.id)).await?)
}

/// Lists every record regardless of owner. Admin routes only.
pub async fn list_all<R: Resource>(collection: &dyn Collection<R>) -> Result<Vec<R>, ApiError> {
    Ok(collection.list(Scope::All).await?)
}

pub async fn fetch<R: Resource>(
    collection: &dyn Collection<R>,
    user: &AuthUser,
    id: Uuid,
) -> Result<R, ApiError> {
    collection
        .get(id, Scope::for_principal(user.id, user.role))
        .await?
        .ok_or(ApiError::NotFound(R::LABEL))
}

/// Creates a record owned by the caller.
pub async fn create<D: Draft>(
    collection: &dyn Collection<D::Record>,
    user: &AuthUser,
    draft: D,
) -> Result<D::Record, ApiError> {
    let record = collection.insert(draft.into_record(Some(user.id))).await?;
    let kind = <D::Record as Resource>::LABEL;
    tracing::debug!(kind, id = %record.id(), owner = %user.id, "record created");
    Ok(record)
}

/// Creates a record with no owner (public submissions).
pub async fn create_anonymous<D: Draft>(
    collection: &dyn Collection<D::Record>,
    draft: D,
) -> Result<D::Record, ApiError> {
    Ok(collection.insert(draft.into_record(None)).await?)
}

pub async fn update<R: Resource>(
    collection: &dyn Collection<R>,
    user: &AuthUser,
    id: Uuid,
    patch: R::Patch,
) -> Result<R, ApiError> {
    collection
        .update(id, Scope::for_principal(user.id, user.role), patch)
        .await?
        .ok_or(ApiError::NotFound(R::LABEL))
}

/// Deletes and returns the record. A repeated delete is `NotFound`.
pub async fn remove<R: Resource>(
    collection: &dyn Collection<R>,
    user: &AuthUser,
    id: Uuid,
) -> Result<R, ApiError> {
    let removed = collection
        .delete(id, Scope::for_principal(user.id, user.role))
        .await?
        .ok_or(ApiError::NotFound(R::LABEL))?;
    tracing::debug!(kind = R::LABEL, id = %id, by = %user.id, "record deleted");
    Ok(removed)
}
