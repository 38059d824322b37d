//! Notes service
//!
//! High-level operations on text and graphic notes.
//! Image attachments go to the blob store; the database keeps their hashes.
//!
//! Blob writes, the row commit and garbage collection run under one write
//! lock. Otherwise a collection could delete a blob another save has written
//! but not yet committed a reference to.

use crate::database::{GraphicNote, Note, Repository, TextNote};
use crate::error::Result;
use crate::storage::BlobStore;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Service for managing notes
#[derive(Clone)]
pub struct NotesService {
    repo: Repository,
    blob_store: BlobStore,
    write_lock: Arc<Mutex<()>>,
}

impl NotesService {
    pub fn new(repo: Repository, blob_store: BlobStore) -> Self {
        Self {
            repo,
            blob_store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Create and persist a new text note
    pub async fn create_text_note(&self, title: String, content: String) -> Result<Note> {
        tracing::info!("Creating text note: {}", title);

        let note = Note::from(TextNote::new(title, content));
        self.save_note(&note).await?;

        Ok(note)
    }

    /// Create and persist an empty graphic note
    pub async fn create_graphic_note(&self, title: String) -> Result<Note> {
        tracing::info!("Creating graphic note: {}", title);

        let note = Note::from(GraphicNote::new(title));
        self.save_note(&note).await?;

        Ok(note)
    }

    /// Get a note by ID, attachments included
    pub async fn get_note(&self, id: &str) -> Result<Note> {
        let row = self.repo.get_note_row(id).await?;
        let attachments = self.load_attachments(&row.id, &row.kind).await?;
        row.into_note(attachments)
    }

    /// List all notes, most recently modified first
    pub async fn list_notes(&self) -> Result<Vec<Note>> {
        let rows = self.repo.list_note_rows().await?;
        let mut notes = Vec::with_capacity(rows.len());

        for row in rows {
            let attachments = self.load_attachments(&row.id, &row.kind).await?;
            notes.push(row.into_note(attachments)?);
        }

        Ok(notes)
    }

    /// Insert or update a note
    pub async fn save_note(&self, note: &Note) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut hashes = Vec::new();
        if let Note::Graphic(graphic) = note {
            for data in graphic.image_attachments() {
                hashes.push(self.blob_store.write(data).await?);
            }
        }

        self.repo.save_note(note, &hashes).await?;

        if let Note::Graphic(_) = note {
            // An attachment may have been removed from this note
            self.collect_garbage_locked().await?;
        }

        tracing::debug!("Note saved: {}", note.id());

        Ok(())
    }

    /// Delete a note. Reminders pointing at it are kept.
    pub async fn delete_note(&self, id: &str) -> Result<()> {
        tracing::info!("Deleting note: {}", id);

        let _guard = self.write_lock.lock().await;
        self.repo.delete_note(id).await?;
        self.collect_garbage_locked().await?;

        tracing::info!("Note deleted successfully: {}", id);

        Ok(())
    }

    /// Search notes by title, text content or tag (case-insensitive)
    pub async fn search_notes(&self, query: &str) -> Result<Vec<Note>> {
        let query_lower = query.to_lowercase();

        let filtered = self
            .list_notes()
            .await?
            .into_iter()
            .filter(|note| {
                let meta = note.meta();
                meta.title().to_lowercase().contains(&query_lower)
                    || meta.tags().iter().any(|t| t.to_lowercase().contains(&query_lower))
                    || match note {
                        Note::Text(text) => text.content().to_lowercase().contains(&query_lower),
                        Note::Graphic(_) => false,
                    }
            })
            .collect();

        Ok(filtered)
    }

    /// Remove attachment blobs no note refers to any more
    pub async fn collect_garbage(&self) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        self.collect_garbage_locked().await
    }

    async fn collect_garbage_locked(&self) -> Result<usize> {
        let referenced = self.repo.referenced_attachment_hashes().await?;
        self.blob_store.collect_garbage(&referenced).await
    }

    async fn load_attachments(&self, note_id: &str, kind: &str) -> Result<Vec<Vec<u8>>> {
        if kind != "graphic" {
            return Ok(Vec::new());
        }

        let mut attachments = Vec::new();
        for hash in self.repo.attachment_hashes(note_id).await? {
            attachments.push(self.blob_store.read(&hash).await?);
        }

        Ok(attachments)
    }
}
