//! Reminders service
//!
//! Reminder lifecycle on top of the repository and the notification service.
//! Persisting a reminder and scheduling its notification are separate steps:
//! when the platform refuses, the reminder still exists and the caller can
//! keep it as an in-app-only reminder.

use crate::config::REMINDER_SWEEP_INTERVAL_SECS;
use crate::database::{CreateReminderRequest, Note, Reminder, Repository};
use crate::error::{AppError, Result};
use crate::services::notifications::{NotificationService, ReconcileReport};
use crate::services::notes::NotesService;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

/// Reminders service with background reconciliation
#[derive(Clone)]
pub struct RemindersService {
    repo: Repository,
    notes: NotesService,
    notifications: NotificationService,
}

impl RemindersService {
    pub fn new(repo: Repository, notes: NotesService, notifications: NotificationService) -> Self {
        Self {
            repo,
            notes,
            notifications,
        }
    }

    pub fn notifications(&self) -> &NotificationService {
        &self.notifications
    }

    /// Persist a new reminder (not scheduled yet)
    pub async fn create_reminder(&self, req: CreateReminderRequest) -> Result<Reminder> {
        let reminder = Reminder::new(
            req.title,
            req.description,
            req.due_at,
            req.related_note_id.as_deref(),
        );

        tracing::info!("Creating reminder {} due at {}", reminder.id, reminder.due_at);
        self.repo.create_reminder(&reminder).await?;

        Ok(reminder)
    }

    pub async fn get_reminder(&self, id: &str) -> Result<Reminder> {
        self.repo.get_reminder(id).await
    }

    pub async fn list_reminders(&self) -> Result<Vec<Reminder>> {
        self.repo.list_reminders().await
    }

    /// List reminders not yet completed
    pub async fn list_active_reminders(&self) -> Result<Vec<Reminder>> {
        self.repo.list_active_reminders().await
    }

    /// Schedule the platform notification for a stored reminder
    pub async fn schedule_reminder(&self, id: &str) -> Result<()> {
        let reminder = self.repo.get_reminder(id).await?;
        self.notifications.schedule(&reminder).await
    }

    /// Move a reminder to a new due time and reschedule its notification.
    /// A due time in the past is rejected before anything is stored.
    pub async fn reschedule_reminder(&self, id: &str, due_at: DateTime<Utc>) -> Result<Reminder> {
        if due_at <= Utc::now() {
            return Err(AppError::InvalidSchedule(format!(
                "New due time {} for reminder {} is not in the future",
                due_at.to_rfc3339(),
                id
            )));
        }

        let mut reminder = self.repo.get_reminder(id).await?;
        reminder.due_at = due_at;
        self.repo.update_reminder(&reminder).await?;

        tracing::info!("Reminder {} moved to {}", id, due_at);

        self.notifications.schedule(&reminder).await?;
        Ok(reminder)
    }

    /// Complete a reminder and withdraw its notification.
    ///
    /// Completion is stored first. If the platform then refuses the cancel,
    /// the error is returned and the next sweep retries it.
    pub async fn complete_reminder(&self, id: &str) -> Result<Reminder> {
        let mut reminder = self.repo.get_reminder(id).await?;

        if reminder.complete() {
            self.repo.mark_reminder_completed(id).await?;
            tracing::info!("Reminder {} completed", id);
        }

        self.notifications.cancel(id).await?;
        Ok(reminder)
    }

    /// Delete a reminder and withdraw its notification
    pub async fn delete_reminder(&self, id: &str) -> Result<()> {
        self.repo.delete_reminder(id).await?;
        tracing::info!("Reminder {} deleted", id);

        self.notifications.cancel(id).await
    }

    /// The note a reminder points at. An empty reference or a note that no
    /// longer exists both yield `None`.
    pub async fn related_note(&self, reminder: &Reminder) -> Result<Option<Note>> {
        let Some(note_id) = reminder.related_note() else {
            return Ok(None);
        };

        match self.notes.get_note(note_id).await {
            Ok(note) => Ok(Some(note)),
            Err(AppError::NoteNotFound(_)) => {
                tracing::warn!(
                    "Reminder {} points at missing note {}",
                    reminder.id,
                    note_id
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Reconcile stored reminders with the notification registry.
    /// Reminders are read under the registry lock.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let repo = self.repo.clone();
        self.notifications
            .reconcile_with(|| async move { repo.list_reminders().await }, Utc::now())
            .await
    }

    /// Start the background sweep
    pub fn start_scheduler(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("Starting reminders scheduler");

            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_secs(REMINDER_SWEEP_INTERVAL_SECS));

            loop {
                interval.tick().await;

                if let Err(e) = self.reconcile().await {
                    tracing::error!("Error reconciling reminders: {}", e);
                }
            }
        })
    }
}
