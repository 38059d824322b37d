//! Application state and initialization
//!
//! This module manages the central application state and lifecycle.
//! All services are initialized here and made available through AppState.

use crate::database::{create_pool, Note, Repository};
use crate::error::Result;
use crate::services::{
    AppSettings, EditingSession, NotesService, NotificationService, NotificationSettings,
    NotificationSurface, RemindersService, SettingsService,
};
use crate::storage::BlobStore;
use std::path::PathBuf;
use std::sync::Arc;

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub app_data_dir: PathBuf,
    pub settings: SettingsService,
    pub notes: NotesService,
    pub reminders: RemindersService,
}

impl AppState {
    /// Open (or create) the data directory and wire up the services.
    /// `surface` is the platform notification backend.
    pub async fn initialize(
        app_data_dir: PathBuf,
        surface: Arc<dyn NotificationSurface>,
    ) -> Result<Self> {
        tracing::info!("Initializing application");
        tracing::info!("App data directory: {:?}", app_data_dir);

        std::fs::create_dir_all(&app_data_dir)?;

        let settings = SettingsService::new(app_data_dir.clone());
        let AppSettings {
            notifications: notification_settings,
            ..
        } = settings.load().await?;

        let pool = create_pool(&app_data_dir.join("studynotes.db")).await?;
        let repo = Repository::new(pool);

        let blob_store = BlobStore::new(app_data_dir.join("attachments"));
        blob_store.initialize().await?;

        let notes = NotesService::new(repo.clone(), blob_store);
        let notifications = NotificationService::new(surface, notification_settings);
        let reminders = RemindersService::new(repo, notes.clone(), notifications);

        tracing::info!("Application initialized successfully");

        Ok(Self {
            app_data_dir,
            settings,
            notes,
            reminders,
        })
    }

    pub fn notifications(&self) -> &NotificationService {
        self.reminders.notifications()
    }

    /// Persist notification settings and apply them to the live service
    pub async fn update_notification_settings(&self, settings: NotificationSettings) -> Result<()> {
        self.settings.update_notifications(settings.clone()).await?;
        self.notifications().update_settings(settings).await;

        tracing::info!("Notification settings updated");
        Ok(())
    }

    /// Open an autosaving editor over a stored note
    pub async fn open_editor(&self, note_id: &str) -> Result<EditingSession> {
        let note: Note = self.notes.get_note(note_id).await?;
        let autosave = self.settings.get_autosave().await?;
        EditingSession::open(note, self.notes.clone(), &autosave)
    }
}
