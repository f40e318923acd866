//! Persistence — libSQL-backed contact storage.

pub mod libsql_backend;
pub mod migrations;

pub use libsql_backend::LibSqlStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;

/// A finalized contact ready to persist.
#[derive(Debug, Clone)]
pub struct NewContact {
    /// Idempotency key — one record ever exists per source message.
    pub source_id: String,
    pub name: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub linkedin_url: Option<String>,
    pub company_website: Option<String>,
    pub location: Option<String>,
    pub raw_note: String,
    pub event: Option<String>,
    pub meeting_notes: Option<String>,
    pub follow_up: Option<String>,
    pub dossier: String,
    /// "Text" | "Voice Note" | "Business Card".
    pub source: String,
    pub enriched: bool,
    /// Set when no usable name was parsed.
    pub needs_review: bool,
}

/// Stable reference to a stored contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRef {
    pub id: String,
    /// False when the record already existed for this `source_id`.
    pub created: bool,
}

/// A persisted contact record. Append-only — never updated after creation.
#[derive(Debug, Clone)]
pub struct ContactRecord {
    pub id: String,
    pub source_id: String,
    pub name: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub linkedin_url: Option<String>,
    pub company_website: Option<String>,
    pub location: Option<String>,
    pub raw_note: String,
    pub event: Option<String>,
    pub meeting_notes: Option<String>,
    pub follow_up: Option<String>,
    pub dossier: String,
    pub source: String,
    pub enriched: bool,
    pub needs_review: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Backend-agnostic contact store.
///
/// `create_if_absent` is the only write path and must be atomic at the
/// store level: concurrent or repeated calls with the same `source_id`
/// yield exactly one record.
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), StoreError>;

    /// Insert the contact unless a record with its `source_id` exists;
    /// either way, return a reference to the record for that key.
    async fn create_if_absent(&self, contact: &NewContact) -> Result<ContactRef, StoreError>;

    /// Look up a contact by its source message ID.
    async fn get_by_source_id(
        &self,
        source_id: &str,
    ) -> Result<Option<ContactRecord>, StoreError>;

    /// Total number of stored contacts.
    async fn count(&self) -> Result<u64, StoreError>;
}
