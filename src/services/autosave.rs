//! Auto-save service — one scheduler behind editor change notifications.
//!
//! DESIGN
//! ======
//! Each open drawing gets a worker task fed by an mpsc command queue:
//! change notifications carry the full latest snapshot, so only the newest
//! pending snapshot is kept. A [`SaveScheduler`] turns the change history
//! into the next save deadline according to a [`SavePolicy`]; the worker
//! sleeps until that deadline or the next command, whichever comes first.
//!
//! Saves run inline in the worker, one at a time. An earlier, slower save
//! from this session can therefore never land after a newer one. Writes from
//! other sessions are not coordinated: the store stays last-write-wins.
//!
//! ERROR HANDLING
//! ==============
//! A failed save is logged and reported as an event. There is no retry or
//! backoff; the pending snapshot is kept and goes out with the next save.
//! Events are sent with `try_send` so a slow consumer never stalls the worker.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{env_bool, env_parse};
use crate::frame::ErrorCode;
use crate::services::drawing::{Drawing, DrawingPatch, DrawingStore, NewDrawing};

const DEFAULT_IDLE_MS: u64 = 1500;
const DEFAULT_INTERVAL_MS: u64 = 30_000;
const DEFAULT_MAX_WAIT_MS: u64 = 10_000;
const COMMAND_QUEUE_CAPACITY: usize = 64;

// =============================================================================
// POLICY
// =============================================================================

/// When pending edits are written without an explicit save request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavePolicy {
    /// Save once `idle` has passed since the last change.
    Debounce { idle: Duration },
    /// Save `period` after the first unsaved change, repeating while edits continue.
    Interval { period: Duration },
    /// Only explicit save requests persist.
    Manual,
    /// Debounce, but never hold a change longer than `max_wait`.
    Hybrid { idle: Duration, max_wait: Duration },
}

impl SavePolicy {
    #[must_use]
    pub fn kind(&self) -> PolicyKind {
        match self {
            Self::Debounce { .. } => PolicyKind::Debounce,
            Self::Interval { .. } => PolicyKind::Interval,
            Self::Manual => PolicyKind::Manual,
            Self::Hybrid { .. } => PolicyKind::Hybrid,
        }
    }
}

/// Policy name as it appears in configuration and `drawing:open` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    Debounce,
    Interval,
    Manual,
    Hybrid,
}

impl PolicyKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debounce => "debounce",
            Self::Interval => "interval",
            Self::Manual => "manual",
            Self::Hybrid => "hybrid",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown save policy: {0:?}")]
pub struct UnknownPolicy(pub String);

impl std::str::FromStr for PolicyKind {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debounce" => Ok(Self::Debounce),
            "interval" => Ok(Self::Interval),
            "manual" => Ok(Self::Manual),
            "hybrid" => Ok(Self::Hybrid),
            _ => Err(UnknownPolicy(s.to_owned())),
        }
    }
}

/// Auto-save tuning loaded from environment variables.
#[derive(Debug, Clone, Copy)]
pub struct AutosaveConfig {
    pub default_kind: PolicyKind,
    pub idle: Duration,
    pub interval: Duration,
    pub max_wait: Duration,
    /// Write pending changes of a saved drawing when its session closes.
    pub flush_on_close: bool,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            default_kind: PolicyKind::Debounce,
            idle: Duration::from_millis(DEFAULT_IDLE_MS),
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            max_wait: Duration::from_millis(DEFAULT_MAX_WAIT_MS),
            flush_on_close: true,
        }
    }
}

impl AutosaveConfig {
    /// Load from `AUTOSAVE_POLICY`, `AUTOSAVE_IDLE_MS`, `AUTOSAVE_INTERVAL_MS`,
    /// `AUTOSAVE_MAX_WAIT_MS`, `AUTOSAVE_FLUSH_ON_CLOSE`.
    ///
    /// An unknown policy name is logged and replaced by the debounce default.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let default_kind = match std::env::var("AUTOSAVE_POLICY") {
            Ok(raw) => raw.parse().unwrap_or_else(|e: UnknownPolicy| {
                warn!(error = %e, "falling back to debounce auto-save");
                defaults.default_kind
            }),
            Err(_) => defaults.default_kind,
        };

        Self {
            default_kind,
            idle: Duration::from_millis(env_parse("AUTOSAVE_IDLE_MS", DEFAULT_IDLE_MS)),
            interval: Duration::from_millis(env_parse("AUTOSAVE_INTERVAL_MS", DEFAULT_INTERVAL_MS)),
            max_wait: Duration::from_millis(env_parse("AUTOSAVE_MAX_WAIT_MS", DEFAULT_MAX_WAIT_MS)),
            flush_on_close: env_bool("AUTOSAVE_FLUSH_ON_CLOSE").unwrap_or(defaults.flush_on_close),
        }
    }

    /// Build a policy of the given kind from the configured timings.
    #[must_use]
    pub fn policy(&self, kind: PolicyKind) -> SavePolicy {
        match kind {
            PolicyKind::Debounce => SavePolicy::Debounce { idle: self.idle },
            PolicyKind::Interval => SavePolicy::Interval { period: self.interval },
            PolicyKind::Manual => SavePolicy::Manual,
            PolicyKind::Hybrid => SavePolicy::Hybrid { idle: self.idle, max_wait: self.max_wait },
        }
    }

    #[must_use]
    pub fn default_policy(&self) -> SavePolicy {
        self.policy(self.default_kind)
    }
}

// =============================================================================
// SCHEDULER
// =============================================================================

/// Pure deadline bookkeeping: no timers, no I/O.
#[derive(Debug, Clone)]
pub struct SaveScheduler {
    policy: SavePolicy,
    first_change: Option<Instant>,
    last_change: Option<Instant>,
}

impl SaveScheduler {
    #[must_use]
    pub fn new(policy: SavePolicy) -> Self {
        Self { policy, first_change: None, last_change: None }
    }

    pub fn record_change(&mut self, now: Instant) {
        self.first_change.get_or_insert(now);
        self.last_change = Some(now);
    }

    /// True while changes have arrived since the last save attempt.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.last_change.is_some()
    }

    /// When the pending changes should be written, if ever.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        let first = self.first_change?;
        let last = self.last_change?;
        match self.policy {
            SavePolicy::Debounce { idle } => Some(last + idle),
            SavePolicy::Interval { period } => Some(first + period),
            SavePolicy::Manual => None,
            SavePolicy::Hybrid { idle, max_wait } => Some((last + idle).min(first + max_wait)),
        }
    }

    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }

    /// Forget the change history. Called when a save is attempted, whether
    /// or not it succeeds.
    pub fn mark_saved(&mut self) {
        self.first_change = None;
        self.last_change = None;
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// What a save writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveTarget {
    /// Not yet in the store. Only an explicit save creates it.
    Unsaved { title: String },
    Saved(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTrigger {
    Auto,
    Manual,
    Close,
}

impl SaveTrigger {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
            Self::Close => "close",
        }
    }
}

/// Outcome of a save attempt, delivered to the session owner.
#[derive(Debug, Clone)]
pub enum AutosaveEvent {
    Saved { drawing: Drawing, created: bool, trigger: SaveTrigger },
    Failed { drawing_id: Option<Uuid>, code: &'static str, message: String, trigger: SaveTrigger },
}

#[derive(Debug)]
enum Command {
    Change(String),
    Rename(String),
    SaveNow,
    Close,
}

/// Everything needed to start an auto-save worker for one open drawing.
pub struct AutosaveSession {
    pub store: Arc<dyn DrawingStore>,
    pub owner_id: Uuid,
    pub target: SaveTarget,
    pub policy: SavePolicy,
    pub flush_on_close: bool,
}

impl AutosaveSession {
    /// Spawn the worker. Save outcomes are sent to `events`.
    #[must_use]
    pub fn spawn(self, events: mpsc::Sender<AutosaveEvent>) -> AutosaveHandle {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let worker = Worker {
            store: self.store,
            owner_id: self.owner_id,
            target: self.target,
            scheduler: SaveScheduler::new(self.policy),
            pending_content: None,
            pending_title: None,
            flush_on_close: self.flush_on_close,
            events,
        };
        let task = tokio::spawn(worker.run(rx));
        AutosaveHandle { tx, task }
    }
}

/// Owner side of a running worker. Dropping it closes the session like [`AutosaveHandle::close`]
/// but without waiting for the final flush.
pub struct AutosaveHandle {
    tx: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl AutosaveHandle {
    /// Editor change notification carrying the latest snapshot.
    pub async fn change(&self, content: String) {
        self.send(Command::Change(content)).await;
    }

    pub async fn rename(&self, title: String) {
        self.send(Command::Rename(title)).await;
    }

    /// Explicit save request; bypasses the policy.
    pub async fn save_now(&self) {
        self.send(Command::SaveNow).await;
    }

    /// Stop the worker after it flushes pending changes (when configured to).
    pub async fn close(self) {
        self.send(Command::Close).await;
        if let Err(e) = self.task.await {
            error!(error = %e, "autosave worker ended abnormally");
        }
    }

    async fn send(&self, command: Command) {
        if self.tx.send(command).await.is_err() {
            warn!("autosave worker gone; command dropped");
        }
    }
}

struct Worker {
    store: Arc<dyn DrawingStore>,
    owner_id: Uuid,
    target: SaveTarget,
    scheduler: SaveScheduler,
    pending_content: Option<String>,
    pending_title: Option<String>,
    flush_on_close: bool,
    events: mpsc::Sender<AutosaveEvent>,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        loop {
            let deadline = self.auto_deadline();
            tokio::select! {
                command = rx.recv() => match command {
                    Some(Command::Change(content)) => {
                        self.pending_content = Some(content);
                        self.scheduler.record_change(Instant::now());
                    }
                    Some(Command::Rename(title)) => {
                        self.pending_title = Some(title);
                        self.scheduler.record_change(Instant::now());
                    }
                    Some(Command::SaveNow) => self.save(SaveTrigger::Manual).await,
                    Some(Command::Close) | None => {
                        if self.flush_on_close && self.has_pending() && matches!(self.target, SaveTarget::Saved(_)) {
                            self.save(SaveTrigger::Close).await;
                        }
                        break;
                    }
                },
                () = wait_until(deadline) => {
                    if self.scheduler.is_due(Instant::now()) {
                        self.save(SaveTrigger::Auto).await;
                    }
                }
            }
        }
        debug!(owner_id = %self.owner_id, dirty = self.scheduler.is_dirty(), "autosave worker stopped");
    }

    /// Unsaved drawings never auto-save; they wait for an explicit save.
    fn auto_deadline(&self) -> Option<Instant> {
        match self.target {
            SaveTarget::Saved(_) => self.scheduler.deadline(),
            SaveTarget::Unsaved { .. } => None,
        }
    }

    fn has_pending(&self) -> bool {
        self.pending_content.is_some() || self.pending_title.is_some()
    }

    async fn save(&mut self, trigger: SaveTrigger) {
        self.scheduler.mark_saved();
        let content = self.pending_content.take();
        let title = self.pending_title.take();
        let bytes = content.as_ref().map_or(0, String::len);

        let result = match &self.target {
            SaveTarget::Saved(id) => {
                let patch = DrawingPatch { title: title.clone(), content: content.clone() };
                self.store
                    .update(*id, self.owner_id, patch)
                    .await
                    .map(|drawing| (drawing, false))
            }
            SaveTarget::Unsaved { title: initial } => {
                let new = NewDrawing {
                    title: title.clone().unwrap_or_else(|| initial.clone()),
                    content: content.clone().unwrap_or_default(),
                    owner_id: self.owner_id,
                };
                self.store.create(new).await.map(|drawing| (drawing, true))
            }
        };

        match result {
            Ok((drawing, created)) => {
                info!(drawing_id = %drawing.id, trigger = trigger.as_str(), created, bytes, "drawing saved");
                self.target = SaveTarget::Saved(drawing.id);
                self.emit(AutosaveEvent::Saved { drawing, created, trigger });
            }
            Err(e) => {
                let drawing_id = match self.target {
                    SaveTarget::Saved(id) => Some(id),
                    SaveTarget::Unsaved { .. } => None,
                };
                error!(error = %e, drawing_id = ?drawing_id, trigger = trigger.as_str(), "drawing save failed");
                // Keep the unsaved edits for the next save, unless newer ones replaced them.
                self.pending_content = self.pending_content.take().or(content);
                self.pending_title = self.pending_title.take().or(title);
                self.emit(AutosaveEvent::Failed { drawing_id, code: e.error_code(), message: e.to_string(), trigger });
            }
        }
    }

    fn emit(&self, event: AutosaveEvent) {
        match self.events.try_send(event) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(_)) => warn!("autosave event queue full; dropping event"),
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "autosave_test.rs"]
mod tests;
