//! Autosave coordination
//!
//! [`AutosaveCoordinator`] decides when a dirty editor must be persisted:
//! at most once per configured interval while editing, and always when the
//! app is suspending or the user saves explicitly. It is a plain state
//! machine over caller-supplied instants; the host owns the timer and calls
//! `on_tick`.
//!
//! [`EditingSession`] wires one live editor (text document or stroke canvas)
//! to a coordinator and to [`NotesService`]. Flushes persist a snapshot taken
//! when the flush is triggered and run on a spawned task: if the session's
//! future is dropped mid-write (app teardown) the write still completes.

use crate::database::Note;
use crate::document::{DocumentProperty, DrawingStroke, StrokeCanvas, TextDocument};
use crate::error::{AppError, Result};
use crate::services::notes::NotesService;
use crate::services::settings::AutosaveSettings;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushDecision {
    Flush,
    Skip,
}

#[derive(Debug, Clone)]
pub struct AutosaveCoordinator {
    interval: Duration,
    /// Periodic saving; suspend and explicit saves flush regardless
    enabled: bool,
    dirty: bool,
    deadline: Option<Instant>,
}

impl AutosaveCoordinator {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            enabled: true,
            dirty: false,
            deadline: None,
        }
    }

    pub fn from_settings(settings: &AutosaveSettings) -> Self {
        Self {
            enabled: settings.enabled,
            ..Self::new(settings.interval())
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// When the armed timer expires
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Editor became dirty. Arms the timer unless already armed.
    /// Returns true if this call armed it.
    pub fn on_dirty(&mut self, now: Instant) -> bool {
        self.dirty = true;

        if !self.enabled || self.deadline.is_some() {
            return false;
        }

        self.deadline = Some(now + self.interval);
        true
    }

    /// Timer callback. Flushes and disarms once the deadline has passed.
    pub fn on_tick(&mut self, now: Instant) -> FlushDecision {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.decide()
            }
            _ => FlushDecision::Skip,
        }
    }

    /// App is going to the background; flush now if anything is unsaved
    pub fn on_app_suspending(&mut self) -> FlushDecision {
        self.deadline = None;
        self.decide()
    }

    pub fn on_explicit_save(&mut self) -> FlushDecision {
        self.deadline = None;
        self.decide()
    }

    /// Persistence succeeded
    pub fn on_flushed(&mut self) {
        self.dirty = false;
        self.deadline = None;
    }

    /// Persistence failed; stay dirty and try again after another interval
    pub fn on_flush_failed(&mut self, now: Instant) {
        self.dirty = true;
        if self.enabled {
            self.deadline = Some(now + self.interval);
        }
    }

    fn decide(&self) -> FlushDecision {
        if self.dirty {
            FlushDecision::Flush
        } else {
            FlushDecision::Skip
        }
    }
}

/// The live editor of a session
#[derive(Debug)]
pub enum Editor {
    Text(TextDocument),
    Graphic { canvas: StrokeCanvas, title: String },
}

/// One open note being edited
pub struct EditingSession {
    /// Last persisted state
    note: Note,
    editor: Editor,
    coordinator: AutosaveCoordinator,
    notes: NotesService,
    /// Raised by the text document when `IsModified` changes
    modified_signal: Arc<AtomicBool>,
}

impl EditingSession {
    /// Open an editor over a stored note
    pub fn open(note: Note, notes: NotesService, settings: &AutosaveSettings) -> Result<Self> {
        let modified_signal = Arc::new(AtomicBool::new(false));

        let editor = match &note {
            Note::Text(text) => {
                let mut doc = TextDocument::open(text.meta.title(), text.content());
                let signal = Arc::clone(&modified_signal);
                doc.subscribe(move |property| {
                    if property == DocumentProperty::IsModified {
                        signal.store(true, Ordering::SeqCst);
                    }
                });
                Editor::Text(doc)
            }
            Note::Graphic(graphic) => Editor::Graphic {
                canvas: StrokeCanvas::from_canvas_data(graphic.canvas_data())?,
                title: graphic.meta.title().to_string(),
            },
        };

        tracing::debug!("Opened editing session for note {}", note.id());

        Ok(Self {
            note,
            editor,
            coordinator: AutosaveCoordinator::from_settings(settings),
            notes,
            modified_signal,
        })
    }

    pub fn note_id(&self) -> &str {
        self.note.id()
    }

    /// The note as last persisted
    pub fn note(&self) -> &Note {
        &self.note
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn coordinator(&self) -> &AutosaveCoordinator {
        &self.coordinator
    }

    /// Mutable access for UI bindings. Edits made here are picked up at the
    /// next tick, suspend or save.
    pub fn text_document_mut(&mut self) -> Option<&mut TextDocument> {
        match &mut self.editor {
            Editor::Text(doc) => Some(doc),
            Editor::Graphic { .. } => None,
        }
    }

    /// Unsaved content or title
    pub fn has_unsaved_changes(&self) -> bool {
        self.coordinator.is_dirty()
            || self.editor_modified()
            || self.current_title() != self.note.title()
    }

    /// Replace the text. Returns false for graphic sessions.
    pub fn set_content(&mut self, content: impl Into<String>, now: Instant) -> bool {
        let Editor::Text(doc) = &mut self.editor else {
            return false;
        };

        doc.set_content(content);

        if self.modified_signal.swap(false, Ordering::SeqCst) && doc.is_modified() {
            self.coordinator.on_dirty(now);
        }
        true
    }

    /// Rename the note. Not autosaved on its own; persisted with the next flush.
    pub fn set_title(&mut self, title: impl Into<String>) {
        match &mut self.editor {
            Editor::Text(doc) => doc.set_title(title),
            Editor::Graphic { title: current, .. } => *current = title.into(),
        }
    }

    /// Append a finished stroke. Returns false for text sessions.
    pub fn add_stroke(&mut self, stroke: DrawingStroke, now: Instant) -> bool {
        let Editor::Graphic { canvas, .. } = &mut self.editor else {
            return false;
        };

        canvas.append(stroke);
        self.coordinator.on_dirty(now);
        true
    }

    /// Remove the most recent stroke
    pub fn undo_stroke(&mut self, now: Instant) -> Option<DrawingStroke> {
        let Editor::Graphic { canvas, .. } = &mut self.editor else {
            return None;
        };

        let stroke = canvas.undo()?;
        self.coordinator.on_dirty(now);
        Some(stroke)
    }

    /// Timer callback. Returns true if a flush happened.
    pub async fn on_tick(&mut self, now: Instant) -> Result<bool> {
        self.sync_dirty(now);
        match self.coordinator.on_tick(now) {
            FlushDecision::Flush => self.flush(now).await.map(|_| true),
            FlushDecision::Skip => Ok(false),
        }
    }

    /// Must complete before the app finishes suspending
    pub async fn on_app_suspending(&mut self) -> Result<bool> {
        self.sync_dirty(Instant::now());
        let decision = self.coordinator.on_app_suspending();
        self.flush_if(decision).await
    }

    /// Explicit save from the UI
    pub async fn save(&mut self) -> Result<bool> {
        self.sync_dirty(Instant::now());
        let decision = self.coordinator.on_explicit_save();
        self.flush_if(decision).await
    }

    /// Flush anything unsaved and hand back the final note
    pub async fn close(mut self) -> Result<Note> {
        self.save().await?;
        tracing::debug!("Closed editing session for note {}", self.note.id());
        Ok(self.note)
    }

    async fn flush_if(&mut self, decision: FlushDecision) -> Result<bool> {
        let title_changed = self.current_title() != self.note.title();

        if decision == FlushDecision::Skip && !title_changed {
            return Ok(false);
        }

        self.flush(Instant::now()).await?;
        Ok(true)
    }

    /// Pick up edits made directly on the editor (through
    /// `text_document_mut`) that the coordinator has not seen yet
    fn sync_dirty(&mut self, now: Instant) {
        let signalled = self.modified_signal.swap(false, Ordering::SeqCst);
        let dirty = match &self.editor {
            Editor::Text(doc) => signalled && doc.is_modified(),
            Editor::Graphic { canvas, .. } => canvas.is_modified(),
        };

        if dirty {
            self.coordinator.on_dirty(now);
        }
    }

    fn editor_modified(&self) -> bool {
        match &self.editor {
            Editor::Text(doc) => doc.is_modified(),
            Editor::Graphic { canvas, .. } => canvas.is_modified(),
        }
    }

    fn current_title(&self) -> &str {
        match &self.editor {
            Editor::Text(doc) => doc.title(),
            Editor::Graphic { title, .. } => title,
        }
    }

    /// Build the note to persist from the editor's current state
    fn snapshot(&self) -> Result<Note> {
        let mut note = self.note.clone();

        match (&mut note, &self.editor) {
            (Note::Text(text), Editor::Text(doc)) => {
                let snapshot = doc.snapshot();
                text.meta.set_title(snapshot.title);
                text.set_content(snapshot.content);
            }
            (Note::Graphic(graphic), Editor::Graphic { canvas, title }) => {
                graphic.meta.set_title(title.as_str());
                graphic.set_canvas_data(canvas.encode()?);
            }
            _ => {
                return Err(AppError::Generic(format!(
                    "Editor does not match note kind for {}",
                    self.note.id()
                )))
            }
        }

        Ok(note)
    }

    async fn flush(&mut self, now: Instant) -> Result<()> {
        let note = match self.snapshot() {
            Ok(note) => note,
            Err(e) => {
                self.coordinator.on_flush_failed(now);
                return Err(e);
            }
        };

        let notes = self.notes.clone();
        let to_save = note.clone();
        let write = tokio::spawn(async move { notes.save_note(&to_save).await });

        let result = match write.await {
            Ok(result) => result,
            Err(e) => Err(AppError::Generic(format!("Autosave task failed: {}", e))),
        };

        if let Err(e) = result {
            tracing::error!("Autosave of note {} failed: {}", note.id(), e);
            self.coordinator.on_flush_failed(now);
            return Err(e);
        }

        match &mut self.editor {
            Editor::Text(doc) => doc.mark_saved(),
            Editor::Graphic { canvas, .. } => canvas.mark_saved(),
        }
        self.modified_signal.store(false, Ordering::SeqCst);
        self.coordinator.on_flushed();
        self.note = note;

        tracing::debug!("Autosaved note {}", self.note.id());
        Ok(())
    }
}
