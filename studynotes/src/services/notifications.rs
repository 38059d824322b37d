//! Notification reconciliation
//!
//! Keeps reminders consistent with the platform notification surface.
//!
//! Every reminder maps to one platform notification id derived from the
//! reminder id, so scheduling the same reminder again replaces instead of
//! duplicating. Per reminder the registry tracks:
//!
//! ```text
//! Unscheduled --schedule--> Pending --fired--> Fired
//!                              |
//!                              +----cancel---> Cancelled
//! ```
//!
//! `Fired` and `Cancelled` only leave through an explicit `schedule`.
//! Recurrence is modelled as repeated single-shot schedules.
//!
//! The registry is the one piece of shared state; every mutation (user
//! action, resume sweep, background loop) goes through a single mutex.

use crate::config::{
    NOTIFICATION_TAG_PREFIX, ROUTING_KEY_REMINDER_ID, ROUTING_KEY_SOURCE, ROUTING_KEY_TITLE,
    ROUTING_SOURCE_REMINDER,
};
use crate::database::Reminder;
use crate::error::{AppError, Result};
use crate::services::settings::{NotificationImportance, NotificationSettings};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Platform notification capability.
///
/// Scheduling under an id that is already scheduled must replace it.
/// Implementations report refusals (permission denied, channel missing)
/// as [`AppError::SchedulingUnavailable`].
pub trait NotificationSurface: Send + Sync {
    fn request_schedule(&self, request: &NotificationRequest) -> Result<()>;

    fn request_cancel(&self, notification_id: i32) -> Result<()>;
}

/// Everything the platform needs to post one reminder notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub reminder_id: String,
    /// Stable platform id derived from `reminder_id`
    pub notification_id: i32,
    pub tag: String,
    pub trigger_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
    pub channel_id: String,
    pub importance: NotificationImportance,
    /// Handed back by the platform when the user taps the notification
    pub routing: BTreeMap<String, String>,
}

impl NotificationRequest {
    /// Build the request for a reminder. Rejects completed reminders and
    /// due times that are not strictly after `now`.
    pub fn for_reminder(
        reminder: &Reminder,
        settings: &NotificationSettings,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if reminder.is_completed {
            return Err(AppError::InvalidSchedule(format!(
                "Reminder {} is already completed",
                reminder.id
            )));
        }

        if reminder.due_at <= now {
            return Err(AppError::InvalidSchedule(format!(
                "Reminder {} is due at {}, which is not in the future",
                reminder.id,
                reminder.due_at.to_rfc3339()
            )));
        }

        let title = match reminder.title.trim() {
            "" => settings.fallback_title.clone(),
            t => t.to_string(),
        };

        let body = match reminder.description.trim() {
            "" => format!("Reminder: {}", title),
            d => d.to_string(),
        };

        let mut routing = BTreeMap::new();
        routing.insert(ROUTING_KEY_SOURCE.to_string(), ROUTING_SOURCE_REMINDER.to_string());
        routing.insert(ROUTING_KEY_REMINDER_ID.to_string(), reminder.id.clone());
        routing.insert(ROUTING_KEY_TITLE.to_string(), title.clone());

        Ok(Self {
            reminder_id: reminder.id.clone(),
            notification_id: notification_id_for(&reminder.id),
            tag: format!("{}{}", NOTIFICATION_TAG_PREFIX, reminder.id),
            trigger_at: reminder.due_at,
            title,
            body,
            channel_id: settings.channel_id.clone(),
            importance: settings.importance,
            routing,
        })
    }
}

/// Platform notification id for a reminder: the first four bytes of the
/// SHA-256 of its id, kept non-negative for platforms with signed ids.
pub fn notification_id_for(reminder_id: &str) -> i32 {
    let digest = Sha256::digest(reminder_id.as_bytes());
    let raw = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    (raw & 0x7fff_ffff) as i32
}

/// Per-reminder notification lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReminderState {
    Unscheduled,
    Pending,
    Fired,
    Cancelled,
}

/// Where the app was entered from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LaunchContext {
    #[serde(rename_all = "camelCase")]
    Reminder { reminder_id: String, title: String },
    NotOpenedFromNotification,
}

/// Decode the key/value bag the platform hands over on launch.
/// Never fails: anything unusable becomes `NotOpenedFromNotification`.
pub fn decode_launch_context(raw: &HashMap<String, String>) -> LaunchContext {
    match parse_launch_payload(raw) {
        Ok(Some((reminder_id, title))) => LaunchContext::Reminder { reminder_id, title },
        Ok(None) => LaunchContext::NotOpenedFromNotification,
        Err(e) => {
            tracing::warn!("Ignoring launch payload: {}", e);
            LaunchContext::NotOpenedFromNotification
        }
    }
}

/// Same as [`decode_launch_context`] for platforms that pass launch
/// arguments as a JSON object string
pub fn decode_launch_json(raw: &str) -> LaunchContext {
    if raw.trim().is_empty() {
        return LaunchContext::NotOpenedFromNotification;
    }

    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(
                "Ignoring launch payload: {}",
                AppError::MalformedLaunchPayload(e.to_string())
            );
            return LaunchContext::NotOpenedFromNotification;
        }
    };

    let Some(object) = value.as_object() else {
        tracing::warn!(
            "Ignoring launch payload: {}",
            AppError::MalformedLaunchPayload("not a JSON object".to_string())
        );
        return LaunchContext::NotOpenedFromNotification;
    };

    let bag: HashMap<String, String> = object
        .iter()
        .filter_map(|(key, value)| {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((key.clone(), text))
        })
        .collect();

    decode_launch_context(&bag)
}

/// `Ok(None)`: the payload is not ours. `Err`: it claims to be ours but is unusable.
fn parse_launch_payload(raw: &HashMap<String, String>) -> Result<Option<(String, String)>> {
    let source = raw.get(ROUTING_KEY_SOURCE).map(|s| s.trim());
    let reminder_id = raw.get(ROUTING_KEY_REMINDER_ID).map(|s| s.trim());

    match (source, reminder_id) {
        (None, None) => Ok(None),
        (Some(source), _) if source != ROUTING_SOURCE_REMINDER => Ok(None),
        (_, None) | (_, Some("")) => Err(AppError::MalformedLaunchPayload(
            "reminder launch without a reminder id".to_string(),
        )),
        (_, Some(id)) => {
            let title = raw
                .get(ROUTING_KEY_TITLE)
                .map(|t| t.trim().to_string())
                .unwrap_or_default();
            Ok(Some((id.to_string(), title)))
        }
    }
}

/// Outcome counts of a reconciliation sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub scheduled: usize,
    pub cancelled: usize,
    pub fired: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
struct TrackedReminder {
    state: ReminderState,
    request: NotificationRequest,
}

struct Registry {
    settings: NotificationSettings,
    entries: HashMap<String, TrackedReminder>,
}

impl Registry {
    fn state(&self, reminder_id: &str) -> ReminderState {
        self.entries
            .get(reminder_id)
            .map_or(ReminderState::Unscheduled, |e| e.state)
    }

    fn schedule(
        &mut self,
        surface: &dyn NotificationSurface,
        reminder: &Reminder,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let request = match NotificationRequest::for_reminder(reminder, &self.settings, now) {
            Ok(request) => request,
            Err(e) => {
                // A pending notification for the old due time is now stale
                if self.state(&reminder.id) == ReminderState::Pending {
                    if let Err(cancel_err) = self.cancel(surface, &reminder.id) {
                        tracing::warn!(
                            "Could not withdraw stale notification for reminder {}: {}",
                            reminder.id,
                            cancel_err
                        );
                    }
                }
                return Err(e);
            }
        };

        if !self.settings.enabled {
            return Err(AppError::SchedulingUnavailable(
                "notifications are disabled in settings".to_string(),
            ));
        }

        if let Some(existing) = self.entries.get(&reminder.id) {
            if existing.state == ReminderState::Pending && existing.request == request {
                tracing::debug!("Reminder {} already pending, nothing to do", reminder.id);
                return Ok(());
            }
        }

        surface
            .request_schedule(&request)
            .map_err(into_unavailable)?;

        tracing::info!(
            "Scheduled notification {} for reminder {} at {}",
            request.notification_id,
            reminder.id,
            request.trigger_at
        );

        self.entries.insert(
            reminder.id.clone(),
            TrackedReminder {
                state: ReminderState::Pending,
                request,
            },
        );

        Ok(())
    }

    /// Returns true if a pending notification was cancelled
    fn cancel(&mut self, surface: &dyn NotificationSurface, reminder_id: &str) -> Result<bool> {
        let Some(entry) = self.entries.get_mut(reminder_id) else {
            return Ok(false);
        };

        if entry.state != ReminderState::Pending {
            return Ok(false);
        }

        surface
            .request_cancel(entry.request.notification_id)
            .map_err(into_unavailable)?;

        entry.state = ReminderState::Cancelled;
        tracing::info!("Cancelled notification for reminder {}", reminder_id);

        Ok(true)
    }

    fn mark_fired(&mut self, reminder_id: &str) -> bool {
        match self.entries.get_mut(reminder_id) {
            Some(entry) if entry.state == ReminderState::Pending => {
                entry.state = ReminderState::Fired;
                tracing::info!("Reminder {} fired", reminder_id);
                true
            }
            _ => false,
        }
    }

    fn reconcile(
        &mut self,
        surface: &dyn NotificationSurface,
        reminders: &[Reminder],
        now: DateTime<Utc>,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        self.prune(reminders);

        for reminder in reminders {
            let state = self.state(&reminder.id);

            if reminder.is_completed {
                if state == ReminderState::Pending {
                    tally(&mut report, self.cancel(surface, &reminder.id), Tally::Cancelled, &reminder.id);
                }
                continue;
            }

            match state {
                ReminderState::Pending => {
                    let trigger_at = self.entries[&reminder.id].request.trigger_at;
                    if trigger_at <= now {
                        self.mark_fired(&reminder.id);
                        report.fired += 1;
                    } else if trigger_at != reminder.due_at {
                        let result = if reminder.due_at > now {
                            self.schedule(surface, reminder, now).map(|_| true)
                        } else {
                            self.cancel(surface, &reminder.id)
                        };
                        let kind = if reminder.due_at > now { Tally::Scheduled } else { Tally::Cancelled };
                        tally(&mut report, result, kind, &reminder.id);
                    }
                }
                ReminderState::Unscheduled if reminder.due_at > now => {
                    let result = self.schedule(surface, reminder, now).map(|_| true);
                    tally(&mut report, result, Tally::Scheduled, &reminder.id);
                }
                ReminderState::Unscheduled | ReminderState::Fired | ReminderState::Cancelled => {}
            }
        }

        let stored: HashSet<&str> = reminders.iter().map(|r| r.id.as_str()).collect();
        let orphans: Vec<String> = self
            .entries
            .iter()
            .filter(|(id, e)| e.state == ReminderState::Pending && !stored.contains(id.as_str()))
            .map(|(id, _)| id.clone())
            .collect();

        for id in orphans {
            tally(&mut report, self.cancel(surface, &id), Tally::Cancelled, &id);
        }

        if report != ReconcileReport::default() {
            tracing::info!(
                "Reminder sweep: {} scheduled, {} cancelled, {} fired, {} failed",
                report.scheduled,
                report.cancelled,
                report.fired,
                report.failed
            );
        }

        report
    }

    /// Drop settled entries whose reminder is completed or gone. They can
    /// never be scheduled again, and an `Unscheduled` lookup reads the same.
    fn prune(&mut self, reminders: &[Reminder]) {
        let live: HashSet<&str> = reminders
            .iter()
            .filter(|r| !r.is_completed)
            .map(|r| r.id.as_str())
            .collect();

        let before = self.entries.len();
        self.entries
            .retain(|id, e| e.state == ReminderState::Pending || live.contains(id.as_str()));

        let pruned = before - self.entries.len();
        if pruned > 0 {
            tracing::debug!("Pruned {} settled notification entries", pruned);
        }
    }
}

fn into_unavailable(err: AppError) -> AppError {
    match err {
        AppError::SchedulingUnavailable(_) => err,
        other => AppError::SchedulingUnavailable(other.to_string()),
    }
}

/// Bridges reminders and the platform notification surface
#[derive(Clone)]
pub struct NotificationService {
    surface: Arc<dyn NotificationSurface>,
    registry: Arc<Mutex<Registry>>,
}

impl NotificationService {
    pub fn new(surface: Arc<dyn NotificationSurface>, settings: NotificationSettings) -> Self {
        Self {
            surface,
            registry: Arc::new(Mutex::new(Registry {
                settings,
                entries: HashMap::new(),
            })),
        }
    }

    /// Apply new channel/importance/enabled settings to future requests
    pub async fn update_settings(&self, settings: NotificationSettings) {
        self.registry.lock().await.settings = settings;
    }

    /// Create or replace the pending notification for a reminder.
    /// Idempotent for an unchanged reminder.
    pub async fn schedule(&self, reminder: &Reminder) -> Result<()> {
        self.schedule_at(reminder, Utc::now()).await
    }

    /// [`Self::schedule`] against an explicit clock
    pub async fn schedule_at(&self, reminder: &Reminder, now: DateTime<Utc>) -> Result<()> {
        // Dropping this future before the lock is acquired abandons the
        // request; once the platform call starts it runs to completion.
        let mut registry = self.registry.lock().await;
        registry.schedule(self.surface.as_ref(), reminder, now)
    }

    /// Remove the pending notification for a reminder; no-op if none
    pub async fn cancel(&self, reminder_id: &str) -> Result<()> {
        let mut registry = self.registry.lock().await;
        registry.cancel(self.surface.as_ref(), reminder_id)?;
        Ok(())
    }

    /// Record that the platform delivered a reminder.
    /// Returns false if it was not pending.
    pub async fn mark_fired(&self, reminder_id: &str) -> bool {
        self.registry.lock().await.mark_fired(reminder_id)
    }

    pub async fn state(&self, reminder_id: &str) -> ReminderState {
        self.registry.lock().await.state(reminder_id)
    }

    /// Pending requests, earliest trigger first
    pub async fn pending(&self) -> Vec<NotificationRequest> {
        let registry = self.registry.lock().await;
        let mut pending: Vec<NotificationRequest> = registry
            .entries
            .values()
            .filter(|e| e.state == ReminderState::Pending)
            .map(|e| e.request.clone())
            .collect();
        pending.sort_by(|a, b| a.trigger_at.cmp(&b.trigger_at).then(a.reminder_id.cmp(&b.reminder_id)));
        pending
    }

    pub async fn pending_count(&self) -> usize {
        let registry = self.registry.lock().await;
        registry
            .entries
            .values()
            .filter(|e| e.state == ReminderState::Pending)
            .count()
    }

    /// Decode a launch payload; a tapped reminder is recorded as fired
    pub async fn handle_launch(&self, raw: &HashMap<String, String>) -> LaunchContext {
        let context = decode_launch_context(raw);

        if let LaunchContext::Reminder { reminder_id, .. } = &context {
            tracing::info!("Opened from notification for reminder {}", reminder_id);
            self.mark_fired(reminder_id).await;
        }

        context
    }

    /// Bring the registry in line with the stored reminders.
    ///
    /// - completed reminders and reminders no longer stored lose their
    ///   pending notification
    /// - pending notifications whose trigger time has passed become `Fired`
    /// - pending notifications whose reminder moved get rescheduled
    /// - incomplete, future reminders this registry has never seen get
    ///   scheduled (app restart)
    /// - settled entries of completed or deleted reminders are dropped
    ///
    /// Per-reminder failures are counted and logged; the sweep continues.
    /// `reminders` must be current: prefer [`Self::reconcile_with`] when
    /// they are read from storage.
    pub async fn reconcile(&self, reminders: &[Reminder], now: DateTime<Utc>) -> ReconcileReport {
        let mut registry = self.registry.lock().await;
        registry.reconcile(self.surface.as_ref(), reminders, now)
    }

    /// [`Self::reconcile`] over reminders loaded while the registry is
    /// locked, so a user action cannot slip in between the read and the
    /// sweep and be reverted by a stale copy.
    pub async fn reconcile_with<F, Fut>(&self, load: F, now: DateTime<Utc>) -> Result<ReconcileReport>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Reminder>>>,
    {
        let mut registry = self.registry.lock().await;
        let reminders = load().await?;
        Ok(registry.reconcile(self.surface.as_ref(), &reminders, now))
    }
}

#[derive(Clone, Copy)]
enum Tally {
    Scheduled,
    Cancelled,
}

fn tally(report: &mut ReconcileReport, result: Result<bool>, kind: Tally, reminder_id: &str) {
    match (result, kind) {
        (Ok(false), _) => {}
        (Ok(true), Tally::Scheduled) => report.scheduled += 1,
        (Ok(true), Tally::Cancelled) => report.cancelled += 1,
        (Err(e), _) => {
            tracing::error!("Reminder sweep failed for {}: {}", reminder_id, e);
            report.failed += 1;
        }
    }
}

/// Surface that only logs. Used when the host has no notification backend.
#[derive(Debug, Default)]
pub struct LoggingSurface;

impl NotificationSurface for LoggingSurface {
    fn request_schedule(&self, request: &NotificationRequest) -> Result<()> {
        tracing::info!(
            "Notification {} at {}: {} - {}",
            request.notification_id,
            request.trigger_at,
            request.title,
            request.body
        );
        Ok(())
    }

    fn request_cancel(&self, notification_id: i32) -> Result<()> {
        tracing::info!("Notification {} cancelled", notification_id);
        Ok(())
    }
}

/// In-process surface for in-app-only reminders: keeps requests in memory
/// so the host can poll for due ones and show them itself.
#[derive(Debug)]
pub struct MemorySurface {
    scheduled: std::sync::Mutex<BTreeMap<i32, NotificationRequest>>,
    available: AtomicBool,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self {
            scheduled: std::sync::Mutex::new(BTreeMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the platform refusing requests (permission revoked)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn scheduled(&self) -> Vec<NotificationRequest> {
        self.lock().values().cloned().collect()
    }

    /// Remove and return every request due at `now`
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<NotificationRequest> {
        let mut scheduled = self.lock();
        let due: Vec<i32> = scheduled
            .iter()
            .filter(|(_, r)| r.trigger_at <= now)
            .map(|(id, _)| *id)
            .collect();
        due.into_iter().filter_map(|id| scheduled.remove(&id)).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<i32, NotificationRequest>> {
        // A poisoned map is still a consistent map of requests
        self.scheduled.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AppError::SchedulingUnavailable(
                "notification permission denied".to_string(),
            ))
        }
    }
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSurface for MemorySurface {
    fn request_schedule(&self, request: &NotificationRequest) -> Result<()> {
        self.check_available()?;
        self.lock().insert(request.notification_id, request.clone());
        Ok(())
    }

    fn request_cancel(&self, notification_id: i32) -> Result<()> {
        self.check_available()?;
        self.lock().remove(&notification_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn service() -> (NotificationService, Arc<MemorySurface>) {
        let surface = Arc::new(MemorySurface::new());
        let service = NotificationService::new(surface.clone(), NotificationSettings::default());
        (service, surface)
    }

    fn reminder_in(hours: i64) -> Reminder {
        Reminder::new("Revise", "Chapter 7", Utc::now() + Duration::hours(hours), None)
    }

    fn bag(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_notification_id_is_stable() {
        let a = notification_id_for("3f1c9a5e-0000-4000-8000-000000000001");
        let b = notification_id_for("3f1c9a5e-0000-4000-8000-000000000001");
        let c = notification_id_for("3f1c9a5e-0000-4000-8000-000000000002");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a >= 0);
    }

    #[test]
    fn test_request_contents() {
        let reminder = Reminder::new("", "", Utc::now() + Duration::hours(1), None);
        let request =
            NotificationRequest::for_reminder(&reminder, &NotificationSettings::default(), Utc::now())
                .unwrap();

        assert_eq!(request.title, "StudyNotes Reminder");
        assert_eq!(request.body, "Reminder: StudyNotes Reminder");
        assert_eq!(request.tag, format!("reminder:{}", reminder.id));
        assert_eq!(request.channel_id, "reminders");
        assert_eq!(request.routing["source"], "reminder");
        assert_eq!(request.routing["reminderId"], reminder.id);
    }

    #[test]
    fn test_request_rejects_past_and_completed() {
        let settings = NotificationSettings::default();
        let now = Utc::now();

        let past = Reminder::new("Old", "", now - Duration::minutes(1), None);
        assert!(matches!(
            NotificationRequest::for_reminder(&past, &settings, now),
            Err(AppError::InvalidSchedule(_))
        ));

        let exactly_now = Reminder::new("Now", "", now, None);
        assert!(matches!(
            NotificationRequest::for_reminder(&exactly_now, &settings, now),
            Err(AppError::InvalidSchedule(_))
        ));

        let mut done = Reminder::new("Done", "", now + Duration::hours(1), None);
        done.complete();
        assert!(matches!(
            NotificationRequest::for_reminder(&done, &settings, now),
            Err(AppError::InvalidSchedule(_))
        ));
    }

    #[tokio::test]
    async fn test_schedule_twice_same_due_is_one_entry() {
        let (service, surface) = service();
        let reminder = reminder_in(1);

        service.schedule(&reminder).await.unwrap();
        service.schedule(&reminder).await.unwrap();

        assert_eq!(service.pending_count().await, 1);
        assert_eq!(surface.scheduled().len(), 1);
        assert_eq!(service.state(&reminder.id).await, ReminderState::Pending);
    }

    #[tokio::test]
    async fn test_reschedule_replaces_trigger() {
        let (service, surface) = service();
        let mut reminder = reminder_in(1);
        service.schedule(&reminder).await.unwrap();

        reminder.due_at = reminder.due_at + Duration::hours(3);
        service.schedule(&reminder).await.unwrap();

        let pending = service.pending().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].trigger_at, reminder.due_at);
        assert_eq!(surface.scheduled()[0].trigger_at, reminder.due_at);
    }

    #[tokio::test]
    async fn test_past_due_is_rejected_without_entry() {
        let (service, surface) = service();
        let reminder = reminder_in(-1);

        let result = service.schedule(&reminder).await;

        assert!(matches!(result, Err(AppError::InvalidSchedule(_))));
        assert_eq!(service.pending_count().await, 0);
        assert_eq!(service.state(&reminder.id).await, ReminderState::Unscheduled);
        assert!(surface.scheduled().is_empty());
    }

    #[tokio::test]
    async fn test_platform_refusal_is_recoverable() {
        let (service, surface) = service();
        surface.set_available(false);
        let reminder = reminder_in(1);

        let result = service.schedule(&reminder).await;

        assert!(matches!(result, Err(AppError::SchedulingUnavailable(_))));
        assert_eq!(service.state(&reminder.id).await, ReminderState::Unscheduled);

        surface.set_available(true);
        service.schedule(&reminder).await.unwrap();
        assert_eq!(service.state(&reminder.id).await, ReminderState::Pending);
    }

    #[tokio::test]
    async fn test_disabled_notifications_are_unavailable() {
        let (service, _surface) = service();
        service
            .update_settings(NotificationSettings {
                enabled: false,
                ..NotificationSettings::default()
            })
            .await;

        let result = service.schedule(&reminder_in(1)).await;

        assert!(matches!(result, Err(AppError::SchedulingUnavailable(_))));
    }

    #[tokio::test]
    async fn test_cancel() {
        let (service, surface) = service();
        let reminder = reminder_in(1);

        // Nothing to cancel yet
        service.cancel(&reminder.id).await.unwrap();
        assert_eq!(service.state(&reminder.id).await, ReminderState::Unscheduled);

        service.schedule(&reminder).await.unwrap();
        service.cancel(&reminder.id).await.unwrap();

        assert_eq!(service.state(&reminder.id).await, ReminderState::Cancelled);
        assert!(surface.scheduled().is_empty());

        // Cancelling again is still fine
        service.cancel(&reminder.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_fired_only_leaves_through_schedule() {
        let (service, _surface) = service();
        let reminder = reminder_in(1);
        service.schedule(&reminder).await.unwrap();

        assert!(service.mark_fired(&reminder.id).await);
        assert!(!service.mark_fired(&reminder.id).await);
        assert_eq!(service.state(&reminder.id).await, ReminderState::Fired);

        service.cancel(&reminder.id).await.unwrap();
        assert_eq!(service.state(&reminder.id).await, ReminderState::Fired);

        service.schedule(&reminder).await.unwrap();
        assert_eq!(service.state(&reminder.id).await, ReminderState::Pending);
    }

    #[test]
    fn test_decode_empty_payload() {
        assert_eq!(
            decode_launch_context(&HashMap::new()),
            LaunchContext::NotOpenedFromNotification
        );
    }

    #[test]
    fn test_decode_reminder_payload() {
        let context = decode_launch_context(&bag(&[
            ("source", "reminder"),
            ("reminderId", " r-42 "),
            ("title", "Revise"),
        ]));

        assert_eq!(
            context,
            LaunchContext::Reminder {
                reminder_id: "r-42".to_string(),
                title: "Revise".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_tolerates_bad_payloads() {
        let cases = [
            bag(&[("source", "reminder")]),
            bag(&[("source", "reminder"), ("reminderId", "   ")]),
            bag(&[("source", "calendar"), ("reminderId", "r-1")]),
            bag(&[("unrelated", "value")]),
        ];

        for raw in cases {
            assert_eq!(decode_launch_context(&raw), LaunchContext::NotOpenedFromNotification);
        }

        // Title is optional
        assert_eq!(
            decode_launch_context(&bag(&[("reminderId", "r-1")])),
            LaunchContext::Reminder {
                reminder_id: "r-1".to_string(),
                title: String::new(),
            }
        );
    }

    #[test]
    fn test_decode_launch_json() {
        assert_eq!(decode_launch_json(""), LaunchContext::NotOpenedFromNotification);
        assert_eq!(decode_launch_json("{"), LaunchContext::NotOpenedFromNotification);
        assert_eq!(decode_launch_json("[1,2]"), LaunchContext::NotOpenedFromNotification);
        assert_eq!(
            decode_launch_json(r#"{"source":"reminder","reminderId":17,"title":"Quiz"}"#),
            LaunchContext::Reminder {
                reminder_id: "17".to_string(),
                title: "Quiz".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_handle_launch_marks_fired() {
        let (service, _surface) = service();
        let reminder = reminder_in(1);
        service.schedule(&reminder).await.unwrap();

        let routing: HashMap<String, String> = service.pending().await[0]
            .routing
            .clone()
            .into_iter()
            .collect();
        let context = service.handle_launch(&routing).await;

        assert_eq!(
            context,
            LaunchContext::Reminder {
                reminder_id: reminder.id.clone(),
                title: "Revise".to_string(),
            }
        );
        assert_eq!(service.state(&reminder.id).await, ReminderState::Fired);
    }

    #[tokio::test]
    async fn test_reconcile_after_restart_schedules_future_reminders() {
        let (service, surface) = service();
        let now = Utc::now();
        let future = Reminder::new("Future", "", now + Duration::hours(1), None);
        let past = Reminder::new("Past", "", now - Duration::hours(1), None);
        let mut done = Reminder::new("Done", "", now + Duration::hours(1), None);
        done.complete();

        let report = service.reconcile(&[future.clone(), past.clone(), done.clone()], now).await;

        assert_eq!(report.scheduled, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(service.state(&future.id).await, ReminderState::Pending);
        assert_eq!(service.state(&past.id).await, ReminderState::Unscheduled);
        assert_eq!(service.state(&done.id).await, ReminderState::Unscheduled);
        assert_eq!(surface.scheduled().len(), 1);

        // A second sweep has nothing to do
        let again = service.reconcile(&[future, past, done], now).await;
        assert_eq!(again, ReconcileReport::default());
    }

    #[tokio::test]
    async fn test_reconcile_cancels_completed_and_deleted() {
        let (service, _surface) = service();
        let now = Utc::now();
        let mut completed = Reminder::new("Completed", "", now + Duration::hours(1), None);
        let deleted = Reminder::new("Deleted", "", now + Duration::hours(2), None);
        service.schedule_at(&completed, now).await.unwrap();
        service.schedule_at(&deleted, now).await.unwrap();

        completed.complete();
        let report = service.reconcile(&[completed.clone()], now).await;

        assert_eq!(report.cancelled, 2);
        assert_eq!(service.pending_count().await, 0);
        assert_eq!(service.state(&completed.id).await, ReminderState::Cancelled);
        assert_eq!(service.state(&deleted.id).await, ReminderState::Cancelled);
    }

    #[tokio::test]
    async fn test_reconcile_marks_elapsed_as_fired() {
        let (service, _surface) = service();
        let now = Utc::now();
        let reminder = Reminder::new("Soon", "", now + Duration::minutes(5), None);
        service.schedule_at(&reminder, now).await.unwrap();

        let later = now + Duration::minutes(10);
        let report = service.reconcile(&[reminder.clone()], later).await;

        assert_eq!(report.fired, 1);
        assert_eq!(service.state(&reminder.id).await, ReminderState::Fired);

        // Fired stays fired across sweeps
        let report = service.reconcile(&[reminder.clone()], later).await;
        assert_eq!(report, ReconcileReport::default());
    }

    #[tokio::test]
    async fn test_reconcile_follows_moved_reminder() {
        let (service, _surface) = service();
        let now = Utc::now();
        let mut reminder = Reminder::new("Moved", "", now + Duration::hours(1), None);
        service.schedule_at(&reminder, now).await.unwrap();

        reminder.due_at = now + Duration::hours(4);
        let report = service.reconcile(&[reminder.clone()], now).await;

        assert_eq!(report.scheduled, 1);
        assert_eq!(service.pending().await[0].trigger_at, reminder.due_at);
    }

    #[tokio::test]
    async fn test_reconcile_counts_failures_and_continues() {
        let (service, surface) = service();
        let now = Utc::now();
        surface.set_available(false);

        let reminders = vec![
            Reminder::new("A", "", now + Duration::hours(1), None),
            Reminder::new("B", "", now + Duration::hours(2), None),
        ];
        let report = service.reconcile(&reminders, now).await;

        assert_eq!(report.failed, 2);
        assert_eq!(report.scheduled, 0);

        surface.set_available(true);
        let report = service.reconcile(&reminders, now).await;
        assert_eq!(report.scheduled, 2);
    }

    #[tokio::test]
    async fn test_moving_pending_reminder_into_past_withdraws_it() {
        let (service, surface) = service();
        let mut reminder = reminder_in(1);
        service.schedule(&reminder).await.unwrap();

        reminder.due_at = Utc::now() - Duration::minutes(5);
        let result = service.schedule(&reminder).await;

        assert!(matches!(result, Err(AppError::InvalidSchedule(_))));
        assert_eq!(service.state(&reminder.id).await, ReminderState::Cancelled);
        assert_eq!(service.pending_count().await, 0);
        assert!(surface.scheduled().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_prunes_settled_entries() {
        let (service, _surface) = service();
        let now = Utc::now();
        let mut completed = Reminder::new("Completed", "", now + Duration::hours(1), None);
        let deleted = Reminder::new("Deleted", "", now + Duration::hours(2), None);
        let fired = Reminder::new("Fired", "", now + Duration::hours(3), None);
        for r in [&completed, &deleted, &fired] {
            service.schedule_at(r, now).await.unwrap();
        }
        service.mark_fired(&fired.id).await;
        completed.complete();

        // First sweep cancels; the entries settle
        service.reconcile(&[completed.clone(), fired.clone()], now).await;
        assert_eq!(service.state(&completed.id).await, ReminderState::Cancelled);
        assert_eq!(service.state(&deleted.id).await, ReminderState::Cancelled);

        // Next sweep drops them; a fired reminder that still exists stays
        let report = service.reconcile(&[completed.clone(), fired.clone()], now).await;
        assert_eq!(report, ReconcileReport::default());
        assert_eq!(service.registry.lock().await.entries.len(), 1);
        assert_eq!(service.state(&fired.id).await, ReminderState::Fired);
        assert_eq!(service.state(&completed.id).await, ReminderState::Unscheduled);
    }

    #[tokio::test]
    async fn test_reconcile_with_reads_under_lock() {
        let (service, surface) = service();
        let reminder = reminder_in(2);
        let loaded = vec![reminder.clone()];

        let report = service
            .reconcile_with(|| async move { Ok::<_, AppError>(loaded) }, Utc::now())
            .await
            .unwrap();

        assert_eq!(report.scheduled, 1);
        assert_eq!(surface.scheduled().len(), 1);

        let failed = service
            .reconcile_with(
                || async { Err::<Vec<Reminder>, _>(AppError::Generic("database offline".to_string())) },
                Utc::now(),
            )
            .await;
        assert!(failed.is_err());
        assert_eq!(service.pending_count().await, 1);
    }

    #[test]
    fn test_memory_surface_take_due() {
        let surface = MemorySurface::new();
        let now = Utc::now();
        let settings = NotificationSettings::default();
        let soon = Reminder::new("Soon", "", now + Duration::minutes(1), None);
        let later = Reminder::new("Later", "", now + Duration::hours(1), None);
        for r in [&soon, &later] {
            surface
                .request_schedule(&NotificationRequest::for_reminder(r, &settings, now).unwrap())
                .unwrap();
        }

        let due = surface.take_due(now + Duration::minutes(2));

        assert_eq!(due.len(), 1);
        assert_eq!(due[0].reminder_id, soon.id);
        assert_eq!(surface.scheduled().len(), 1);
    }
}
