//! Application configuration constants
//!
//! Central location for defaults, resource limits and validation
//! boundaries used throughout the application.

// ===== Documents =====

/// Title given to a freshly opened text document
pub const DEFAULT_DOCUMENT_TITLE: &str = "Untitled";

/// Smallest stroke width accepted when finalizing ink input.
/// Zero or negative widths from a misbehaving input device are clamped to this.
pub const MIN_STROKE_WIDTH: f64 = 0.1;

/// Stroke width used when the caller does not pick one
pub const DEFAULT_STROKE_WIDTH: f64 = 2.0;

/// Stroke color used when the caller does not pick one
pub const DEFAULT_STROKE_COLOR: &str = "#FF000000";

// ===== Autosave Limits =====

/// Minimum autosave interval in milliseconds.
/// Values below this cause excessive disk I/O.
pub const MIN_AUTO_SAVE_INTERVAL_MS: u32 = 100;

/// Maximum autosave interval in milliseconds (5 minutes).
/// Values above this risk data loss on unexpected shutdown.
pub const MAX_AUTO_SAVE_INTERVAL_MS: u32 = 300_000;

/// Default autosave interval in milliseconds
pub const DEFAULT_AUTO_SAVE_INTERVAL_MS: u32 = 1_000;

// ===== Reminders & Notifications =====

/// How often the background sweep reconciles reminders with the registry
pub const REMINDER_SWEEP_INTERVAL_SECS: u64 = 60;

/// Notification channel reminders are posted to
pub const DEFAULT_NOTIFICATION_CHANNEL: &str = "reminders";

/// Notification title used when a reminder has an empty title
pub const FALLBACK_NOTIFICATION_TITLE: &str = "StudyNotes Reminder";

/// Prefix of the string tag attached to every reminder notification
pub const NOTIFICATION_TAG_PREFIX: &str = "reminder:";

/// Routing payload key marking where a launch came from
pub const ROUTING_KEY_SOURCE: &str = "source";

/// Routing payload value for reminder notifications
pub const ROUTING_SOURCE_REMINDER: &str = "reminder";

/// Routing payload key carrying the reminder id
pub const ROUTING_KEY_REMINDER_ID: &str = "reminderId";

/// Routing payload key carrying the reminder title
pub const ROUTING_KEY_TITLE: &str = "title";
