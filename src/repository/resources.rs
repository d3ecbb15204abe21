use std::convert::Infallible;

use chrono::{DateTime, Utc};
use sqlx::{Postgres, query_builder::Separated};
use uuid::Uuid;

use super::Resource;
use crate::models::{
    Analysis, AnalysisPatch, ContactMessage, ContactPatch, Download, FilePatch, FileRecord,
};

impl Resource for FileRecord {
    type Patch = FilePatch;

    const LABEL: &'static str = "File";
    const TABLE: &'static str = "files";
    const OWNER_COLUMN: &'static str = "owner_id";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "owner_id",
        "name",
        "storage_key",
        "mimetype",
        "size_bytes",
        "row_count",
        "rows",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> Option<Uuid> {
        Some(self.owner_id)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn apply(&mut self, patch: FilePatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        self.updated_at = Utc::now();
    }

    fn push_values(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.id)
            .push_bind(self.owner_id)
            .push_bind(self.name.clone())
            .push_bind(self.storage_key.clone())
            .push_bind(self.mimetype.clone())
            .push_bind(self.size_bytes)
            .push_bind(self.row_count)
            .push_bind(self.rows.clone())
            .push_bind(self.created_at)
            .push_bind(self.updated_at);
    }
}

impl Resource for Analysis {
    type Patch = AnalysisPatch;

    const LABEL: &'static str = "Analysis";
    const TABLE: &'static str = "analyses";
    const OWNER_COLUMN: &'static str = "owner_id";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "owner_id",
        "file_id",
        "file_name",
        "result",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> Option<Uuid> {
        Some(self.owner_id)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn apply(&mut self, patch: AnalysisPatch) {
        if let Some(file_name) = patch.file_name {
            self.file_name = file_name;
        }
        if let Some(result) = patch.result {
            self.result = result;
        }
        self.updated_at = Utc::now();
    }

    fn push_values(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.id)
            .push_bind(self.owner_id)
            .push_bind(self.file_id)
            .push_bind(self.file_name.clone())
            .push_bind(self.result.clone())
            .push_bind(self.created_at)
            .push_bind(self.updated_at);
    }
}

// Download rows are append-only.
impl Resource for Download {
    type Patch = Infallible;

    const LABEL: &'static str = "Download";
    const TABLE: &'static str = "downloads";
    const OWNER_COLUMN: &'static str = "owner_id";
    const COLUMNS: &'static [&'static str] =
        &["id", "owner_id", "file_id", "file_name", "created_at"];

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> Option<Uuid> {
        Some(self.owner_id)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn apply(&mut self, patch: Infallible) {
        match patch {}
    }

    fn push_values(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.id)
            .push_bind(self.owner_id)
            .push_bind(self.file_id)
            .push_bind(self.file_name.clone())
            .push_bind(self.created_at);
    }
}

impl Resource for ContactMessage {
    type Patch = ContactPatch;

    const LABEL: &'static str = "Message";
    const TABLE: &'static str = "contact_messages";
    const OWNER_COLUMN: &'static str = "owner_id";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "owner_id",
        "name",
        "email",
        "message",
        "status",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> Option<Uuid> {
        self.owner_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn apply(&mut self, patch: ContactPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.updated_at = Utc::now();
    }

    fn push_values(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.id)
            .push_bind(self.owner_id)
            .push_bind(self.name.clone())
            .push_bind(self.email.clone())
            .push_bind(self.message.clone())
            .push_bind(self.status.as_str())
            .push_bind(self.created_at)
            .push_bind(self.updated_at);
    }
}
