//! Database models
//!
//! Persisted entities: notes (text or graphic) and reminders.
//! All models use serde with stable camelCase field names so a UI bridge or
//! export can read them without knowing the storage layout.

use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Metadata shared by every note variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteMeta {
    id: String,
    title: String,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    #[serde(default)]
    tags: Vec<String>,
}

impl NoteMeta {
    fn new(title: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            created_at: now,
            modified_at: now,
            tags: Vec::new(),
        }
    }

    /// Rebuild metadata read back from storage
    pub(crate) fn restore(
        id: String,
        title: String,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
        tags: Vec<String>,
    ) -> Self {
        Self {
            id,
            title,
            created_at,
            modified_at: modified_at.max(created_at),
            tags,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        let title = title.into();
        if title != self.title {
            self.title = title;
            self.touch();
        }
    }

    /// Append a tag unless it is blank or already present
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.tags.iter().any(|t| t == tag) {
            return false;
        }

        self.tags.push(tag.to_string());
        self.touch();
        true
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        let removed = self.tags.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    /// Record a content mutation. Never moves `modified_at` before `created_at`.
    pub(crate) fn touch(&mut self) {
        self.modified_at = Utc::now().max(self.created_at);
    }
}

/// Freeform text note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNote {
    #[serde(flatten)]
    pub meta: NoteMeta,
    content: String,
    #[serde(default)]
    is_formatted: bool,
    /// Markup-annotated copy of `content`; meaningful only when `is_formatted`
    #[serde(default)]
    formatted_content: String,
}

impl TextNote {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            meta: NoteMeta::new(title.into()),
            content: content.into(),
            is_formatted: false,
            formatted_content: String::new(),
        }
    }

    pub(crate) fn restore(
        meta: NoteMeta,
        content: String,
        is_formatted: bool,
        formatted_content: String,
    ) -> Self {
        Self {
            meta,
            content,
            is_formatted,
            formatted_content,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_formatted(&self) -> bool {
        self.is_formatted
    }

    /// Formatted representation, if the note carries one
    pub fn formatted_content(&self) -> Option<&str> {
        self.is_formatted.then_some(self.formatted_content.as_str())
    }

    /// Raw stored markup regardless of the flag (persistence only)
    pub(crate) fn raw_formatted_content(&self) -> &str {
        &self.formatted_content
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        let content = content.into();
        if content != self.content {
            self.content = content;
            self.meta.touch();
        }
    }

    /// Attach a formatted representation alongside the plain text
    pub fn set_formatted(&mut self, content: impl Into<String>, markup: impl Into<String>) {
        self.content = content.into();
        self.formatted_content = markup.into();
        self.is_formatted = true;
        self.meta.touch();
    }

    pub fn clear_formatting(&mut self) {
        if self.is_formatted {
            self.is_formatted = false;
            self.formatted_content.clear();
            self.meta.touch();
        }
    }
}

/// Hand-drawn note: ink payload plus image attachments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphicNote {
    #[serde(flatten)]
    pub meta: NoteMeta,
    /// Opaque serialized stroke list (see `document::ink`)
    #[serde(default)]
    canvas_data: String,
    #[serde(default)]
    image_attachments: Vec<Vec<u8>>,
}

impl GraphicNote {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            meta: NoteMeta::new(title.into()),
            canvas_data: String::new(),
            image_attachments: Vec::new(),
        }
    }

    pub(crate) fn restore(meta: NoteMeta, canvas_data: String, image_attachments: Vec<Vec<u8>>) -> Self {
        Self {
            meta,
            canvas_data,
            image_attachments,
        }
    }

    pub fn canvas_data(&self) -> &str {
        &self.canvas_data
    }

    pub fn image_attachments(&self) -> &[Vec<u8>] {
        &self.image_attachments
    }

    pub fn set_canvas_data(&mut self, canvas_data: impl Into<String>) {
        let canvas_data = canvas_data.into();
        if canvas_data != self.canvas_data {
            self.canvas_data = canvas_data;
            self.meta.touch();
        }
    }

    pub fn add_image_attachment(&mut self, data: Vec<u8>) {
        self.image_attachments.push(data);
        self.meta.touch();
    }

    pub fn remove_image_attachment(&mut self, index: usize) -> Option<Vec<u8>> {
        if index >= self.image_attachments.len() {
            return None;
        }

        let removed = self.image_attachments.remove(index);
        self.meta.touch();
        Some(removed)
    }
}

/// A note is either text or ink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Note {
    Text(TextNote),
    Graphic(GraphicNote),
}

impl Note {
    pub fn meta(&self) -> &NoteMeta {
        match self {
            Note::Text(note) => &note.meta,
            Note::Graphic(note) => &note.meta,
        }
    }

    pub fn meta_mut(&mut self) -> &mut NoteMeta {
        match self {
            Note::Text(note) => &mut note.meta,
            Note::Graphic(note) => &mut note.meta,
        }
    }

    pub fn id(&self) -> &str {
        self.meta().id()
    }

    pub fn title(&self) -> &str {
        self.meta().title()
    }

    /// Storage discriminator
    pub fn kind(&self) -> &'static str {
        match self {
            Note::Text(_) => "text",
            Note::Graphic(_) => "graphic",
        }
    }
}

impl From<TextNote> for Note {
    fn from(note: TextNote) -> Self {
        Note::Text(note)
    }
}

impl From<GraphicNote> for Note {
    fn from(note: GraphicNote) -> Self {
        Note::Graphic(note)
    }
}

/// Flat `notes` table row; converted into a [`Note`] by the repository
#[derive(Debug, Clone, FromRow)]
pub struct NoteRow {
    pub id: String,
    pub kind: String,
    pub title: String,
    pub tags_json: String,
    pub content: String,
    pub is_formatted: bool,
    pub formatted_content: String,
    pub canvas_data: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl NoteRow {
    /// Reassemble the note variant; `attachments` are the blob contents in order
    pub fn into_note(self, attachments: Vec<Vec<u8>>) -> Result<Note> {
        let tags: Vec<String> = serde_json::from_str(&self.tags_json)?;
        let meta = NoteMeta::restore(self.id, self.title, self.created_at, self.modified_at, tags);

        match self.kind.as_str() {
            "text" => Ok(Note::Text(TextNote::restore(
                meta,
                self.content,
                self.is_formatted,
                self.formatted_content,
            ))),
            "graphic" => Ok(Note::Graphic(GraphicNote::restore(meta, self.canvas_data, attachments))),
            other => Err(AppError::SerializationFailure(format!(
                "Unknown note kind '{}' for note {}",
                other,
                meta.id()
            ))),
        }
    }
}

/// Scheduled task, optionally pointing at a note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    pub title: String,
    pub description: String,
    pub due_at: DateTime<Utc>,
    pub is_completed: bool,
    /// Empty string means no related note. Kept as a string sentinel
    /// for compatibility with existing persisted data.
    pub related_note_id: String,
}

impl Reminder {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        due_at: DateTime<Utc>,
        related_note_id: Option<&str>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: description.into(),
            due_at,
            is_completed: false,
            related_note_id: related_note_id.unwrap_or_default().to_string(),
        }
    }

    /// Related note id, with the empty-string sentinel mapped to `None`
    pub fn related_note(&self) -> Option<&str> {
        let id = self.related_note_id.trim();
        (!id.is_empty()).then_some(id)
    }

    /// Mark completed. Returns false if it already was.
    pub fn complete(&mut self) -> bool {
        if self.is_completed {
            return false;
        }

        self.is_completed = true;
        true
    }
}

/// Create reminder request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReminderRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_at: DateTime<Utc>,
    #[serde(default)]
    pub related_note_id: Option<String>,
}
