//! libSQL-backed contact store.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::Connection;
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{migrations, ContactRecord, ContactRef, ContactStore, NewContact};

/// Local libSQL database backend.
pub struct LibSqlStore {
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Query(format!("Failed to create db directory: {e}")))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to open database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Query(format!("Failed to connect: {e}")))?;
        Ok(Self { conn })
    }

    /// In-memory database, for tests.
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to open database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Query(format!("Failed to connect: {e}")))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl ContactStore for LibSqlStore {
    async fn run_migrations(&self) -> Result<(), StoreError> {
        migrations::run_migrations(&self.conn).await
    }

    async fn create_if_absent(&self, contact: &NewContact) -> Result<ContactRef, StoreError> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now().to_rfc3339();

        // ON CONFLICT DO NOTHING makes the check-and-create atomic: the
        // UNIQUE constraint on source_id decides, not a read-then-write.
        let affected = self
            .conn
            .execute(
                "INSERT INTO contacts (
                    id, source_id, name, company, title, email, phone,
                    linkedin_url, company_website, location, raw_note, event,
                    meeting_notes, follow_up, dossier, source, enriched,
                    needs_review, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
                ON CONFLICT(source_id) DO NOTHING",
                libsql::params![
                    id.as_str(),
                    contact.source_id.as_str(),
                    contact.name.as_deref().unwrap_or(""),
                    contact.company.as_deref().unwrap_or(""),
                    contact.title.as_deref().unwrap_or(""),
                    contact.email.as_deref().unwrap_or(""),
                    contact.phone.as_deref().unwrap_or(""),
                    contact.linkedin_url.as_deref().unwrap_or(""),
                    contact.company_website.as_deref().unwrap_or(""),
                    contact.location.as_deref().unwrap_or(""),
                    contact.raw_note.as_str(),
                    contact.event.as_deref().unwrap_or(""),
                    contact.meeting_notes.as_deref().unwrap_or(""),
                    contact.follow_up.as_deref().unwrap_or(""),
                    contact.dossier.as_str(),
                    contact.source.as_str(),
                    contact.enriched as i64,
                    contact.needs_review as i64,
                    created_at.as_str(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Insert failed: {e}")))?;

        if affected > 0 {
            return Ok(ContactRef { id, created: true });
        }

        // Conflict path: the record for this source_id already exists.
        let existing = self
            .get_by_source_id(&contact.source_id)
            .await?
            .ok_or_else(|| {
                StoreError::Constraint(format!(
                    "source_id {} conflicted but no row found",
                    contact.source_id
                ))
            })?;
        Ok(ContactRef {
            id: existing.id,
            created: false,
        })
    }

    async fn get_by_source_id(
        &self,
        source_id: &str,
    ) -> Result<Option<ContactRecord>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, source_id, name, company, title, email, phone,
                        linkedin_url, company_website, location, raw_note, event,
                        meeting_notes, follow_up, dossier, source, enriched,
                        needs_review, status, created_at
                 FROM contacts WHERE source_id = ?1",
                libsql::params![source_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Select failed: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("Row read failed: {e}")))?;

        match row {
            Some(row) => Ok(Some(record_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM contacts", ())
            .await
            .map_err(|e| StoreError::Query(format!("Count failed: {e}")))?;
        let row = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("Row read failed: {e}")))?
            .ok_or_else(|| StoreError::Query("COUNT returned no row".into()))?;
        let count: i64 = row
            .get(0)
            .map_err(|e| StoreError::Query(format!("Count parse failed: {e}")))?;
        Ok(count.max(0) as u64)
    }
}

fn record_from_row(row: &libsql::Row) -> Result<ContactRecord, StoreError> {
    let text = |idx: i32| -> Result<String, StoreError> {
        row.get::<String>(idx)
            .map_err(|e| StoreError::Query(format!("Column {idx} read failed: {e}")))
    };
    let opt_text = |idx: i32| -> Result<Option<String>, StoreError> {
        Ok(Some(text(idx)?).filter(|v| !v.is_empty()))
    };
    let flag = |idx: i32| -> Result<bool, StoreError> {
        let v: i64 = row
            .get(idx)
            .map_err(|e| StoreError::Query(format!("Column {idx} read failed: {e}")))?;
        Ok(v != 0)
    };

    Ok(ContactRecord {
        id: text(0)?,
        source_id: text(1)?,
        name: opt_text(2)?,
        company: opt_text(3)?,
        title: opt_text(4)?,
        email: opt_text(5)?,
        phone: opt_text(6)?,
        linkedin_url: opt_text(7)?,
        company_website: opt_text(8)?,
        location: opt_text(9)?,
        raw_note: text(10)?,
        event: opt_text(11)?,
        meeting_notes: opt_text(12)?,
        follow_up: opt_text(13)?,
        dossier: text(14)?,
        source: text(15)?,
        enriched: flag(16)?,
        needs_review: flag(17)?,
        status: text(18)?,
        created_at: parse_timestamp(&text(19)?)?,
    })
}

/// Parse RFC 3339 (what we write) or SQLite's `datetime('now')` format
/// (the column default).
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| StoreError::Query(format!("Bad timestamp '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> LibSqlStore {
        let store = LibSqlStore::new_memory().await.unwrap();
        store.run_migrations().await.unwrap();
        store
    }

    fn contact(source_id: &str) -> NewContact {
        NewContact {
            source_id: source_id.into(),
            name: Some("Sarah Chen".into()),
            company: Some("General Mills".into()),
            title: Some("VP Brand Strategy".into()),
            email: None,
            phone: None,
            linkedin_url: None,
            company_website: None,
            location: None,
            raw_note: "Just met Sarah Chen from General Mills".into(),
            event: None,
            meeting_notes: Some("Talked about organic line.".into()),
            follow_up: None,
            dossier: "**Background:** ...".into(),
            source: "Text".into(),
            enriched: false,
            needs_review: false,
        }
    }

    #[tokio::test]
    async fn create_and_read_back() {
        let store = test_store().await;

        let reference = store.create_if_absent(&contact("u-1")).await.unwrap();
        assert!(reference.created);

        let record = store.get_by_source_id("u-1").await.unwrap().unwrap();
        assert_eq!(record.id, reference.id);
        assert_eq!(record.name.as_deref(), Some("Sarah Chen"));
        assert_eq!(record.company.as_deref(), Some("General Mills"));
        assert_eq!(record.email, None);
        assert_eq!(record.status, "new");
        assert!(!record.needs_review);
        assert_eq!(record.raw_note, "Just met Sarah Chen from General Mills");
    }

    #[tokio::test]
    async fn duplicate_source_id_is_idempotent() {
        let store = test_store().await;

        let first = store.create_if_absent(&contact("u-2")).await.unwrap();
        assert!(first.created);

        // Second write with the same key: no new record, same reference.
        let mut changed = contact("u-2");
        changed.name = Some("Different Name".into());
        let second = store.create_if_absent(&changed).await.unwrap();
        assert!(!second.created);
        assert_eq!(second.id, first.id);

        assert_eq!(store.count().await.unwrap(), 1);
        // Original content preserved, never overwritten
        let record = store.get_by_source_id("u-2").await.unwrap().unwrap();
        assert_eq!(record.name.as_deref(), Some("Sarah Chen"));
    }

    #[tokio::test]
    async fn distinct_source_ids_create_distinct_records() {
        let store = test_store().await;
        store.create_if_absent(&contact("u-3")).await.unwrap();
        store.create_if_absent(&contact("u-4")).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn needs_review_flag_round_trips() {
        let store = test_store().await;
        let mut anonymous = contact("u-5");
        anonymous.name = None;
        anonymous.needs_review = true;

        store.create_if_absent(&anonymous).await.unwrap();
        let record = store.get_by_source_id("u-5").await.unwrap().unwrap();
        assert!(record.needs_review);
        assert_eq!(record.name, None);
    }

    #[tokio::test]
    async fn missing_source_id_returns_none() {
        let store = test_store().await;
        assert!(store.get_by_source_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn on_disk_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.db");

        {
            let store = LibSqlStore::new_local(&path).await.unwrap();
            store.run_migrations().await.unwrap();
            store.create_if_absent(&contact("u-6")).await.unwrap();
        }

        let store = LibSqlStore::new_local(&path).await.unwrap();
        store.run_migrations().await.unwrap();
        assert!(store.get_by_source_id("u-6").await.unwrap().is_some());
    }

    #[test]
    fn timestamp_parsing_both_formats() {
        assert!(parse_timestamp("2026-08-07T10:00:00+00:00").is_ok());
        assert!(parse_timestamp("2026-08-07 10:00:00").is_ok());
        assert!(parse_timestamp("not a date").is_err());
    }
}
