//! Repository layer for database operations
//!
//! CRUD for notes and reminders. Multi-statement writes run in a transaction.
//! Reminders hold a plain id reference to notes (no foreign key), so removing
//! a note never touches reminders.

use super::models::*;
use crate::error::{AppError, Result};
use sqlx::SqlitePool;
use std::collections::HashSet;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ===== Notes =====

    /// Insert or replace a note together with its ordered attachment hashes
    pub async fn save_note(&self, note: &Note, attachment_hashes: &[String]) -> Result<()> {
        let meta = note.meta();
        let tags_json = serde_json::to_string(meta.tags())?;

        let (content, is_formatted, formatted_content, canvas_data) = match note {
            Note::Text(text) => (
                text.content(),
                text.is_formatted(),
                text.raw_formatted_content(),
                "",
            ),
            Note::Graphic(graphic) => ("", false, "", graphic.canvas_data()),
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO notes (id, kind, title, tags_json, content, is_formatted,
                               formatted_content, canvas_data, created_at, modified_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                title = excluded.title,
                tags_json = excluded.tags_json,
                content = excluded.content,
                is_formatted = excluded.is_formatted,
                formatted_content = excluded.formatted_content,
                canvas_data = excluded.canvas_data,
                modified_at = excluded.modified_at
            "#,
        )
        .bind(meta.id())
        .bind(note.kind())
        .bind(meta.title())
        .bind(&tags_json)
        .bind(content)
        .bind(is_formatted)
        .bind(formatted_content)
        .bind(canvas_data)
        .bind(meta.created_at())
        .bind(meta.modified_at())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM note_attachments WHERE note_id = ?")
            .bind(meta.id())
            .execute(&mut *tx)
            .await?;

        for (position, hash) in attachment_hashes.iter().enumerate() {
            sqlx::query(
                "INSERT INTO note_attachments (note_id, position, blob_hash) VALUES (?, ?, ?)",
            )
            .bind(meta.id())
            .bind(position as i64)
            .bind(hash)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(
            "Saved {} note: {} ({} attachments)",
            note.kind(),
            meta.id(),
            attachment_hashes.len()
        );
        Ok(())
    }

    /// Get a note row by ID
    pub async fn get_note_row(&self, id: &str) -> Result<NoteRow> {
        sqlx::query_as::<_, NoteRow>("SELECT * FROM notes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NoteNotFound(id.to_string()))
    }

    /// List all note rows, most recently modified first
    pub async fn list_note_rows(&self) -> Result<Vec<NoteRow>> {
        let rows = sqlx::query_as::<_, NoteRow>("SELECT * FROM notes ORDER BY modified_at DESC")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Attachment hashes of a note, in display order
    pub async fn attachment_hashes(&self, note_id: &str) -> Result<Vec<String>> {
        let hashes: Vec<String> = sqlx::query_scalar(
            "SELECT blob_hash FROM note_attachments WHERE note_id = ? ORDER BY position ASC",
        )
        .bind(note_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(hashes)
    }

    /// Every attachment hash still referenced by some note
    pub async fn referenced_attachment_hashes(&self) -> Result<HashSet<String>> {
        let hashes: Vec<String> = sqlx::query_scalar("SELECT DISTINCT blob_hash FROM note_attachments")
            .fetch_all(&self.pool)
            .await?;

        Ok(hashes.into_iter().collect())
    }

    pub async fn note_exists(&self, id: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notes WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    /// Delete a note and its attachment rows. Reminders are left alone.
    pub async fn delete_note(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM notes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::NoteNotFound(id.to_string()));
        }

        tracing::debug!("Deleted note: {}", id);
        Ok(())
    }

    // ===== Reminders =====

    /// Persist a new reminder
    pub async fn create_reminder(&self, reminder: &Reminder) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reminders (id, title, description, due_at, is_completed, related_note_id)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&reminder.id)
        .bind(&reminder.title)
        .bind(&reminder.description)
        .bind(reminder.due_at)
        .bind(reminder.is_completed)
        .bind(&reminder.related_note_id)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Created reminder: {}", reminder.id);
        Ok(())
    }

    pub async fn get_reminder(&self, id: &str) -> Result<Reminder> {
        sqlx::query_as::<_, Reminder>("SELECT * FROM reminders WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::ReminderNotFound(id.to_string()))
    }

    /// All reminders, soonest first
    pub async fn list_reminders(&self) -> Result<Vec<Reminder>> {
        let reminders = sqlx::query_as::<_, Reminder>("SELECT * FROM reminders ORDER BY due_at ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(reminders)
    }

    /// Reminders not yet completed, soonest first
    pub async fn list_active_reminders(&self) -> Result<Vec<Reminder>> {
        let reminders = sqlx::query_as::<_, Reminder>(
            "SELECT * FROM reminders WHERE is_completed = 0 ORDER BY due_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(reminders)
    }

    /// Overwrite a reminder's mutable fields
    pub async fn update_reminder(&self, reminder: &Reminder) -> Result<()> {
        let rows = sqlx::query(
            r#"
            UPDATE reminders
            SET title = ?, description = ?, due_at = ?, is_completed = ?, related_note_id = ?
            WHERE id = ?
            "#,
        )
        .bind(&reminder.title)
        .bind(&reminder.description)
        .bind(reminder.due_at)
        .bind(reminder.is_completed)
        .bind(&reminder.related_note_id)
        .bind(&reminder.id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(AppError::ReminderNotFound(reminder.id.clone()));
        }

        tracing::debug!("Updated reminder: {}", reminder.id);
        Ok(())
    }

    /// Mark reminder as completed
    pub async fn mark_reminder_completed(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("UPDATE reminders SET is_completed = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::ReminderNotFound(id.to_string()));
        }

        tracing::debug!("Marked reminder as completed: {}", id);
        Ok(())
    }

    pub async fn delete_reminder(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM reminders WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::ReminderNotFound(id.to_string()));
        }

        tracing::debug!("Deleted reminder: {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::open_in_memory;
    use chrono::{Duration, Utc};

    async fn create_test_repo() -> Repository {
        Repository::new(open_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_save_and_get_text_note() {
        let repo = create_test_repo().await;

        let mut text = TextNote::new("Chemistry", "H2O");
        text.meta.add_tag("lab");
        text.set_formatted("H2O", "H<sub>2</sub>O");
        let note = Note::from(text);

        repo.save_note(&note, &[]).await.unwrap();

        let row = repo.get_note_row(note.id()).await.unwrap();
        assert_eq!(row.kind, "text");
        let restored = row.into_note(Vec::new()).unwrap();
        assert_eq!(restored, note);
    }

    #[tokio::test]
    async fn test_save_replaces_existing_row() {
        let repo = create_test_repo().await;

        let mut text = TextNote::new("Draft", "v1");
        repo.save_note(&Note::from(text.clone()), &[]).await.unwrap();

        text.set_content("v2");
        repo.save_note(&Note::from(text.clone()), &[]).await.unwrap();

        let rows = repo.list_note_rows().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content, "v2");
    }

    #[tokio::test]
    async fn test_attachment_order_is_kept() {
        let repo = create_test_repo().await;

        let note = Note::from(GraphicNote::new("Sketch"));
        let hashes = vec!["b".repeat(64), "a".repeat(64), "c".repeat(64)];
        repo.save_note(&note, &hashes).await.unwrap();

        assert_eq!(repo.attachment_hashes(note.id()).await.unwrap(), hashes);

        // Rewriting drops removed attachments
        repo.save_note(&note, &hashes[..1]).await.unwrap();
        assert_eq!(repo.attachment_hashes(note.id()).await.unwrap(), &hashes[..1]);
        assert_eq!(repo.referenced_attachment_hashes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_note() {
        let repo = create_test_repo().await;

        let note = Note::from(GraphicNote::new("Gone"));
        repo.save_note(&note, &["d".repeat(64)]).await.unwrap();

        repo.delete_note(note.id()).await.unwrap();

        assert!(!repo.note_exists(note.id()).await.unwrap());
        assert!(repo.attachment_hashes(note.id()).await.unwrap().is_empty());
        assert!(matches!(
            repo.delete_note(note.id()).await,
            Err(AppError::NoteNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_get_missing_note() {
        let repo = create_test_repo().await;

        assert!(matches!(
            repo.get_note_row("nope").await,
            Err(AppError::NoteNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reminder_crud() {
        let repo = create_test_repo().await;

        let due = Utc::now() + Duration::hours(1);
        let mut reminder = Reminder::new("Essay", "Draft intro", due, Some("note-1"));
        repo.create_reminder(&reminder).await.unwrap();

        let fetched = repo.get_reminder(&reminder.id).await.unwrap();
        assert_eq!(fetched, reminder);

        reminder.title = "Essay (final)".to_string();
        reminder.due_at = due + Duration::hours(1);
        repo.update_reminder(&reminder).await.unwrap();
        assert_eq!(repo.get_reminder(&reminder.id).await.unwrap(), reminder);

        repo.delete_reminder(&reminder.id).await.unwrap();
        assert!(matches!(
            repo.get_reminder(&reminder.id).await,
            Err(AppError::ReminderNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_active_reminders_exclude_completed() {
        let repo = create_test_repo().await;

        let later = Reminder::new("Later", "", Utc::now() + Duration::hours(2), None);
        let sooner = Reminder::new("Sooner", "", Utc::now() + Duration::hours(1), None);
        repo.create_reminder(&later).await.unwrap();
        repo.create_reminder(&sooner).await.unwrap();

        let active = repo.list_active_reminders().await.unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].id, sooner.id);

        repo.mark_reminder_completed(&sooner.id).await.unwrap();

        let active = repo.list_active_reminders().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, later.id);
        assert_eq!(repo.list_reminders().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_deleting_note_keeps_reminder() {
        let repo = create_test_repo().await;

        let note = Note::from(TextNote::new("Related", ""));
        repo.save_note(&note, &[]).await.unwrap();
        let reminder = Reminder::new("Check", "", Utc::now() + Duration::hours(1), Some(note.id()));
        repo.create_reminder(&reminder).await.unwrap();

        repo.delete_note(note.id()).await.unwrap();

        let kept = repo.get_reminder(&reminder.id).await.unwrap();
        assert_eq!(kept.related_note_id, note.id());
    }
}
