//! Async owner of the study timer.
//!
//! The controller applies transitions to [`StudyTimer`] under a lock,
//! persists the result, restarts the ticker, and pushes record-store
//! updates into the background. Local state is the source of truth; the
//! record store is synchronised on a best-effort basis and its failures
//! are only logged.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::machine::{FinishedSession, SessionOrigin, StudyTimer, TimerSnapshot};
use super::state::{PersistedState, SessionState, TimerStatus};
use crate::clock::{to_epoch_ms, to_utc, Clock, SystemClock};
use crate::events::Event;
use crate::identity::IdentityProvider;
use crate::remote::{Finalization, SessionRecordStore};
use crate::score::Score;
use crate::storage::{KvStore, PersistExt};

/// Key the serialized session state is stored under.
pub const STATE_KEY: &str = "focus.timer";

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

struct Inner {
    timer: StudyTimer,
    store: Box<dyn KvStore>,
}

impl Inner {
    fn persist(&self) {
        let result = match self.timer.state() {
            SessionState::Idle => self.store.delete(STATE_KEY),
            state => self.store.save(STATE_KEY, &PersistedState::from(state)),
        };
        if let Err(e) = result {
            warn!(error = %e, "failed to persist timer state");
        }
    }
}

/// Clears the in-flight start flag, also when the start future is dropped.
struct StartingGuard<'a>(&'a AtomicBool);

impl Drop for StartingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Construction options for [`TimerController`].
#[derive(Clone)]
pub struct ControllerOptions {
    pub clock: Arc<dyn Clock>,
    pub tick_interval: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

#[derive(Clone)]
pub struct TimerController {
    inner: Arc<Mutex<Inner>>,
    remote: Arc<dyn SessionRecordStore>,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    tick_interval: Duration,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    pending: Arc<Mutex<JoinSet<()>>>,
    snapshots: Arc<watch::Sender<TimerSnapshot>>,
    starting: Arc<AtomicBool>,
}

impl TimerController {
    /// Rehydrate from `store` and resume ticking if a session is active.
    pub async fn open(
        store: impl KvStore + 'static,
        remote: Arc<dyn SessionRecordStore>,
        identity: Arc<dyn IdentityProvider>,
        options: ControllerOptions,
    ) -> Self {
        let now = options.clock.now_ms();
        let persisted = store.load(STATE_KEY, PersistedState::Idle);
        let timer = StudyTimer::from_state(persisted.rehydrate(now));
        let inner = Inner {
            timer,
            store: Box::new(store),
        };
        // Clears a key that held an undecodable value.
        inner.persist();

        let (tx, _rx) = watch::channel(inner.timer.snapshot(now));
        let status = inner.timer.status();
        if status != TimerStatus::Idle {
            info!(
                session = inner.timer.state().session_id().unwrap_or_default(),
                ?status,
                "rehydrated study session"
            );
        }

        let controller = Self {
            inner: Arc::new(Mutex::new(inner)),
            remote,
            identity,
            clock: options.clock,
            tick_interval: options.tick_interval,
            ticker: Arc::new(Mutex::new(None)),
            pending: Arc::new(Mutex::new(JoinSet::new())),
            snapshots: Arc::new(tx),
            starting: Arc::new(AtomicBool::new(false)),
        };
        controller.restart_ticker(status).await;
        controller
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub async fn snapshot(&self) -> TimerSnapshot {
        let inner = self.inner.lock().await;
        inner.timer.snapshot(self.clock.now_ms())
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.timer.state().clone()
    }

    /// Receive a fresh snapshot on every tick and every transition.
    pub fn subscribe(&self) -> watch::Receiver<TimerSnapshot> {
        self.snapshots.subscribe()
    }

    pub async fn is_ticking(&self) -> bool {
        self.ticker
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn remote(&self) -> &Arc<dyn SessionRecordStore> {
        &self.remote
    }

    /// Record-store updates spawned and not yet reaped.
    pub async fn pending_updates(&self) -> usize {
        self.pending.lock().await.len()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a session, adopting the user's unterminated record if there
    /// is one. A no-op without an identity or while a session is active.
    pub async fn start(&self) -> Option<Event> {
        let Some(user_id) = self.identity.user_id() else {
            debug!("start ignored: no identity");
            return None;
        };
        if self.inner.lock().await.timer.state().is_active() {
            return None;
        }
        if self.starting.swap(true, Ordering::SeqCst) {
            debug!("start ignored: already starting");
            return None;
        }
        let _starting = StartingGuard(&self.starting);

        let (id, start_ms, break_acc, origin) = self.open_record(&user_id).await;

        let mut inner = self.inner.lock().await;
        let event = inner
            .timer
            .start(id.clone(), start_ms, break_acc, origin, self.clock.now_ms());
        let Some(event) = event else {
            warn!(session = %id, "session became active while starting; record left open");
            return None;
        };
        inner.persist();
        self.publish(&inner);
        self.restart_ticker(inner.timer.status()).await;
        info!(session = %id, ?origin, "study session started");
        Some(event)
    }

    pub async fn pause(&self) -> Option<Event> {
        let mut inner = self.inner.lock().await;
        let event = inner.timer.pause(self.clock.now_ms())?;
        inner.persist();
        self.publish(&inner);
        self.restart_ticker(inner.timer.status()).await;
        info!(session = inner.timer.state().session_id().unwrap_or_default(), "paused");
        Some(event)
    }

    pub async fn resume(&self) -> Option<Event> {
        let mut inner = self.inner.lock().await;
        let event = inner.timer.resume(self.clock.now_ms())?;
        inner.persist();
        self.publish(&inner);
        self.restart_ticker(inner.timer.status()).await;

        if let Event::SessionResumed {
            session_id,
            break_secs,
            total_break_secs,
            ..
        } = &event
        {
            info!(session = %session_id, break_secs, "resumed");
            self.patch_break_in_background(session_id.clone(), *total_break_secs)
                .await;
        }
        Some(event)
    }

    /// Pause and open the finish prompt.
    pub async fn begin_finish(&self) -> Option<Event> {
        let mut inner = self.inner.lock().await;
        let event = inner.timer.begin_finish(self.clock.now_ms())?;
        inner.persist();
        self.publish(&inner);
        self.restart_ticker(inner.timer.status()).await;
        Some(event)
    }

    /// Close the finish prompt without ending the session.
    pub async fn cancel_finish(&self) -> Option<Event> {
        let mut inner = self.inner.lock().await;
        let event = inner.timer.cancel_finish(self.clock.now_ms())?;
        self.publish(&inner);
        Some(event)
    }

    /// End the session with a rating and note.
    ///
    /// The local reset happens immediately; finalising the record and
    /// patching the final break total run in the background.
    pub async fn finish(&self, productivity: Score, note: impl Into<String>) -> Option<Event> {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock().await;
        let (finished, event) = inner.timer.finish(productivity, note.into(), now)?;
        inner.persist();
        self.publish(&inner);
        self.restart_ticker(TimerStatus::Idle).await;
        drop(inner);

        info!(
            session = %finished.id,
            elapsed_secs = finished.elapsed_secs,
            productivity = productivity.get(),
            "study session finished"
        );
        self.finalize_in_background(finished, now).await;
        Some(event)
    }

    /// Drop the session without finalising its record.
    pub async fn discard(&self) -> Event {
        let mut inner = self.inner.lock().await;
        let event = inner.timer.discard(self.clock.now_ms());
        inner.persist();
        self.publish(&inner);
        self.restart_ticker(TimerStatus::Idle).await;
        info!("study session discarded");
        event
    }

    /// Wait for outstanding record-store updates.
    pub async fn settle(&self) {
        let mut tasks = std::mem::take(&mut *self.pending.lock().await);
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "record store task failed");
            }
        }
    }

    /// Stop ticking and wait for outstanding record-store updates.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
        self.settle().await;
    }

    // ── Internal ─────────────────────────────────────────────────────

    async fn open_record(&self, user_id: &str) -> (String, u64, u64, SessionOrigin) {
        match self.remote.find_active_session(user_id).await {
            Ok(Some(record)) => {
                debug!(session = %record.id, "reusing active session record");
                return (
                    record.id,
                    to_epoch_ms(record.started_at),
                    record.total_break_secs,
                    SessionOrigin::Adopted,
                );
            }
            Ok(None) => {}
            Err(e) => {
                warn!(store = self.remote.name(), error = %e, "active session lookup failed");
            }
        }

        let now = self.clock.now_ms();
        match self.remote.create_session(user_id, to_utc(now)).await {
            Ok(record) => (record.id, now, 0, SessionOrigin::Created),
            Err(e) => {
                warn!(store = self.remote.name(), error = %e, "create session failed; continuing offline");
                (uuid::Uuid::new_v4().to_string(), now, 0, SessionOrigin::Offline)
            }
        }
    }

    fn publish(&self, inner: &Inner) {
        self.snapshots
            .send_replace(inner.timer.snapshot(self.clock.now_ms()));
    }

    /// Replace the ticker so at most one runs, and none while idle.
    async fn restart_ticker(&self, status: TimerStatus) {
        let mut ticker = self.ticker.lock().await;
        if let Some(handle) = ticker.take() {
            handle.abort();
        }
        if status == TimerStatus::Idle {
            return;
        }

        let inner = self.inner.clone();
        let clock = self.clock.clone();
        let snapshots = self.snapshots.clone();
        let period = self.tick_interval;
        *ticker = Some(tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                // Sent under the lock so a transition's publish is never
                // overwritten by an older snapshot.
                let guard = inner.lock().await;
                if guard.timer.status() != status {
                    break;
                }
                snapshots.send_replace(guard.timer.snapshot(clock.now_ms()));
            }
        }));
    }

    /// Spawn a record-store update, reaping any that already finished.
    async fn spawn_pending(&self, task: impl Future<Output = ()> + Send + 'static) {
        let mut pending = self.pending.lock().await;
        while let Some(result) = pending.try_join_next() {
            if let Err(e) = result {
                warn!(error = %e, "record store task failed");
            }
        }
        pending.spawn(task);
    }

    async fn patch_break_in_background(&self, session_id: String, total_break_secs: u64) {
        let remote = self.remote.clone();
        self.spawn_pending(async move {
            if let Err(e) = remote
                .patch_break_seconds(&session_id, total_break_secs)
                .await
            {
                warn!(session = %session_id, error = %e, "break patch failed");
            }
        })
        .await;
    }

    async fn finalize_in_background(&self, finished: FinishedSession, now_ms: u64) {
        let remote = self.remote.clone();
        self.spawn_pending(async move {
            let finalization = Finalization {
                productivity: finished.productivity,
                note: finished.note,
                ended_at: to_utc(now_ms),
            };
            if let Err(e) = remote.finalize_session(&finished.id, &finalization).await {
                warn!(session = %finished.id, error = %e, "finalize failed");
            }
            if let Err(e) = remote
                .patch_break_seconds(&finished.id, finished.total_break_secs)
                .await
            {
                warn!(session = %finished.id, error = %e, "final break patch failed");
            }
        })
        .await;
    }
}
