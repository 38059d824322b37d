//! Services module
//!
//! Business logic services that coordinate between editors, the repository
//! and the platform notification surface.

pub mod autosave;
pub mod notes;
pub mod notifications;
pub mod reminders;
pub mod settings;

pub use autosave::{AutosaveCoordinator, EditingSession, Editor, FlushDecision};
pub use notes::NotesService;
pub use notifications::{
    decode_launch_context, decode_launch_json, notification_id_for, LaunchContext, LoggingSurface,
    MemorySurface, NotificationRequest, NotificationService, NotificationSurface, ReconcileReport,
    ReminderState,
};
pub use reminders::RemindersService;
pub use settings::{
    AppSettings, AutosaveSettings, NotificationImportance, NotificationSettings, SettingsService,
};
