//! Settings service
//!
//! Manages application settings persistence using JSON file storage.

use crate::config::{
    DEFAULT_AUTO_SAVE_INTERVAL_MS, DEFAULT_NOTIFICATION_CHANNEL, FALLBACK_NOTIFICATION_TITLE,
    MAX_AUTO_SAVE_INTERVAL_MS, MIN_AUTO_SAVE_INTERVAL_MS,
};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;

/// Autosave behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutosaveSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Minimum time between dirty and flush, in milliseconds
    #[serde(default = "default_auto_save_interval")]
    pub interval_ms: u32,
}

fn default_true() -> bool {
    true
}

fn default_auto_save_interval() -> u32 {
    DEFAULT_AUTO_SAVE_INTERVAL_MS
}

impl AutosaveSettings {
    /// Configured interval clamped into the supported range
    pub fn interval(&self) -> Duration {
        let ms = self
            .interval_ms
            .clamp(MIN_AUTO_SAVE_INTERVAL_MS, MAX_AUTO_SAVE_INTERVAL_MS);
        Duration::from_millis(u64::from(ms))
    }
}

impl Default for AutosaveSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: default_auto_save_interval(),
        }
    }
}

/// How prominently the platform should present a reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationImportance {
    Low,
    #[default]
    Default,
    High,
}

/// Reminder notification settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// When false, scheduling reports the platform as unavailable
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_channel_id")]
    pub channel_id: String,
    #[serde(default)]
    pub importance: NotificationImportance,
    /// Title shown when a reminder has none
    #[serde(default = "default_fallback_title")]
    pub fallback_title: String,
}

fn default_channel_id() -> String {
    DEFAULT_NOTIFICATION_CHANNEL.to_string()
}

fn default_fallback_title() -> String {
    FALLBACK_NOTIFICATION_TITLE.to_string()
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            channel_id: default_channel_id(),
            importance: NotificationImportance::default(),
            fallback_title: default_fallback_title(),
        }
    }
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AppSettings {
    #[serde(default)]
    pub autosave: AutosaveSettings,
    #[serde(default)]
    pub notifications: NotificationSettings,
}

/// Service for managing application settings
#[derive(Clone)]
pub struct SettingsService {
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new(app_data_dir: PathBuf) -> Self {
        Self {
            settings_path: app_data_dir.join("settings.json"),
        }
    }

    /// Load settings from disk or create default if not exists
    pub async fn load(&self) -> Result<AppSettings> {
        if !self.settings_path.exists() {
            tracing::info!("Settings file not found, creating default settings");
            let default = AppSettings::default();
            self.save(&default).await?;
            return Ok(default);
        }

        let content = fs::read_to_string(&self.settings_path).await?;
        let settings: AppSettings = serde_json::from_str(&content)
            .map_err(|e| AppError::Generic(format!("Failed to parse settings: {}", e)))?;

        Ok(settings)
    }

    /// Save settings to disk
    pub async fn save(&self, settings: &AppSettings) -> Result<()> {
        let content = serde_json::to_string_pretty(settings)?;

        fs::write(&self.settings_path, content).await?;
        tracing::info!("Settings saved to {:?}", self.settings_path);

        Ok(())
    }

    pub async fn get_autosave(&self) -> Result<AutosaveSettings> {
        Ok(self.load().await?.autosave)
    }

    pub async fn update_autosave(&self, autosave: AutosaveSettings) -> Result<()> {
        let mut settings = self.load().await?;
        settings.autosave = autosave;
        self.save(&settings).await
    }

    pub async fn get_notifications(&self) -> Result<NotificationSettings> {
        Ok(self.load().await?.notifications)
    }

    pub async fn update_notifications(&self, notifications: NotificationSettings) -> Result<()> {
        let mut settings = self.load().await?;
        settings.notifications = notifications;
        self.save(&settings).await
    }
}
