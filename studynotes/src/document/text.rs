//! Live text document
//!
//! In-memory editing buffer for one open text note. Tracks a dirty flag and
//! notifies observers synchronously, in registration order, once per
//! attribute that actually changed.
//!
//! Title edits are deliberately not tracked as unsaved content: `set_title`
//! raises `Title` but never touches `is_modified`.

use crate::config::DEFAULT_DOCUMENT_TITLE;
use std::fmt;

/// Attribute named in a change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentProperty {
    Content,
    Title,
    IsModified,
}

impl DocumentProperty {
    /// Attribute name as surfaced to UI bindings
    pub fn name(self) -> &'static str {
        match self {
            DocumentProperty::Content => "Content",
            DocumentProperty::Title => "Title",
            DocumentProperty::IsModified => "IsModified",
        }
    }
}

impl fmt::Display for DocumentProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Handle returned by [`TextDocument::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn FnMut(DocumentProperty) + Send>;

/// Point-in-time copy of a document, handed to background persistence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSnapshot {
    pub title: String,
    pub content: String,
}

pub struct TextDocument {
    title: String,
    content: String,
    is_modified: bool,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
}

impl TextDocument {
    /// Empty document titled "Untitled"
    pub fn new() -> Self {
        Self::open(DEFAULT_DOCUMENT_TITLE, "")
    }

    /// Open a document over already-persisted text; starts clean
    pub fn open(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            is_modified: false,
            observers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_modified(&self) -> bool {
        self.is_modified
    }

    /// Register an observer. Delivery is synchronous, in registration order.
    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(DocumentProperty) + Send + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer; returns false if it was not registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sid, _)| *sid != id);
        self.observers.len() != before
    }

    /// Replace the content. Raises `Content` then `IsModified` (the latter
    /// only on the clean-to-dirty transition). Equal values are a no-op.
    pub fn set_content(&mut self, value: impl Into<String>) {
        let value = value.into();
        if value == self.content {
            return;
        }

        self.content = value;
        self.notify(DocumentProperty::Content);
        self.set_modified(true);
    }

    /// Replace the title. Does not dirty the document.
    pub fn set_title(&mut self, value: impl Into<String>) {
        let value = value.into();
        if value == self.title {
            return;
        }

        self.title = value;
        self.notify(DocumentProperty::Title);
    }

    /// Clear the dirty flag after the content has been persisted
    pub fn mark_saved(&mut self) {
        self.set_modified(false);
    }

    pub fn snapshot(&self) -> TextSnapshot {
        TextSnapshot {
            title: self.title.clone(),
            content: self.content.clone(),
        }
    }

    fn set_modified(&mut self, value: bool) {
        if self.is_modified == value {
            return;
        }

        self.is_modified = value;
        self.notify(DocumentProperty::IsModified);
    }

    fn notify(&mut self, property: DocumentProperty) {
        for (_, observer) in self.observers.iter_mut() {
            observer(property);
        }
    }
}

impl Default for TextDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TextDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextDocument")
            .field("title", &self.title)
            .field("content", &self.content)
            .field("is_modified", &self.is_modified)
            .field("observers", &self.observers.len())
            .finish()
    }
}
