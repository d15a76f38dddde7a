//! End-to-end timer controller scenarios against a scripted record store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use studytimer_core::clock::{to_utc, ManualClock};
use studytimer_core::error::RemoteError;
use studytimer_core::remote::{Finalization, SessionRecord, SessionRecordStore};
use studytimer_core::timer::{PersistedState, STATE_KEY};
use studytimer_core::{
    ControllerOptions, Event, KvStore, MemoryKv, PersistExt, Score, StaticIdentity,
    TimerController, TimerStatus,
};

const T0: u64 = 1_800_000_000_000;
const SEC: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    FindActive,
    Create,
    PatchBreak(String, u64),
    Finalize(String, u8),
}

/// In-memory record store that records every call and can be told to fail.
#[derive(Default)]
struct ScriptedStore {
    records: Mutex<Vec<SessionRecord>>,
    calls: Mutex<Vec<Call>>,
    fail_lookup: AtomicBool,
    fail_create: AtomicBool,
    fail_writes: AtomicBool,
}

impl ScriptedStore {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn unavailable(op: &'static str) -> RemoteError {
        RemoteError::Status {
            operation: op,
            status: 503,
            body: "unavailable".into(),
        }
    }
}

#[async_trait]
impl SessionRecordStore for ScriptedStore {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn find_active_session(
        &self,
        user_id: &str,
    ) -> Result<Option<SessionRecord>, RemoteError> {
        self.record(Call::FindActive);
        if self.fail_lookup.load(Ordering::SeqCst) {
            return Err(Self::unavailable("find_active_session"));
        }
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| r.user_id == user_id && r.is_active())
            .max_by_key(|r| r.started_at)
            .cloned())
    }

    async fn create_session(
        &self,
        user_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<SessionRecord, RemoteError> {
        self.record(Call::Create);
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Self::unavailable("create_session"));
        }
        let mut records = self.records.lock().unwrap();
        let record = SessionRecord {
            id: format!("srv-{}", records.len() + 1),
            user_id: user_id.to_string(),
            started_at,
            ended_at: None,
            total_break_secs: 0,
            productivity: None,
            note: None,
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn patch_break_seconds(&self, id: &str, secs: u64) -> Result<(), RemoteError> {
        self.record(Call::PatchBreak(id.to_string(), secs));
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::unavailable("patch_break_seconds"));
        }
        if let Some(r) = self.records.lock().unwrap().iter_mut().find(|r| r.id == id) {
            r.total_break_secs = secs;
        }
        Ok(())
    }

    async fn finalize_session(
        &self,
        id: &str,
        finalization: &Finalization,
    ) -> Result<(), RemoteError> {
        self.record(Call::Finalize(id.to_string(), finalization.productivity.get()));
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::unavailable("finalize_session"));
        }
        if let Some(r) = self.records.lock().unwrap().iter_mut().find(|r| r.id == id) {
            r.ended_at = Some(finalization.ended_at);
            r.productivity = Some(finalization.productivity.get());
            r.note = Some(finalization.note.clone());
        }
        Ok(())
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>, RemoteError> {
        let mut records: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(records)
    }
}

struct Harness {
    kv: MemoryKv,
    store: Arc<ScriptedStore>,
    clock: ManualClock,
}

impl Harness {
    fn new() -> Self {
        Self {
            kv: MemoryKv::new(),
            store: Arc::new(ScriptedStore::default()),
            clock: ManualClock::new(T0),
        }
    }

    async fn open(&self) -> TimerController {
        TimerController::open(
            self.kv.clone(),
            self.store.clone(),
            Arc::new(StaticIdentity::new("student")),
            ControllerOptions {
                clock: Arc::new(self.clock.clone()),
                tick_interval: Duration::from_secs(1),
            },
        )
        .await
    }
}

fn score(n: i64) -> Score {
    Score::new(n).unwrap()
}

#[tokio::test]
async fn finish_returns_to_idle_even_when_store_fails() {
    let h = Harness::new();
    let ctl = h.open().await;
    ctl.start().await.unwrap();
    h.clock.advance_secs(300);

    h.store.fail_writes.store(true, Ordering::SeqCst);
    let event = ctl.finish(score(6), "tired").await.unwrap();
    assert!(matches!(event, Event::SessionFinished { elapsed_secs: 300, .. }));
    ctl.settle().await;

    assert_eq!(ctl.snapshot().await.status, TimerStatus::Idle);
    assert!(h.kv.kv_get(STATE_KEY).unwrap().is_none());
    assert!(h
        .store
        .calls()
        .contains(&Call::Finalize("srv-1".into(), 6)));
    ctl.shutdown().await;
}

#[tokio::test]
async fn finish_finalizes_then_patches_break_total() {
    let h = Harness::new();
    let ctl = h.open().await;
    ctl.start().await.unwrap();
    h.clock.advance_secs(300);
    ctl.pause().await.unwrap();
    h.clock.advance_secs(60);
    ctl.finish(score(8), "").await.unwrap();
    ctl.settle().await;

    let calls = h.store.calls();
    let tail = &calls[calls.len() - 2..];
    assert_eq!(
        tail,
        [
            Call::Finalize("srv-1".into(), 8),
            Call::PatchBreak("srv-1".into(), 60)
        ]
    );
    let records = h.store.list_sessions("student").await.unwrap();
    assert!(!records[0].is_active());
    assert_eq!(records[0].total_break_secs, 60);
    ctl.shutdown().await;
}

#[tokio::test]
async fn discard_never_finalizes() {
    let h = Harness::new();
    let ctl = h.open().await;
    ctl.start().await.unwrap();
    h.clock.advance_secs(120);
    ctl.pause().await.unwrap();
    ctl.discard().await;
    ctl.settle().await;

    assert!(!h
        .store
        .calls()
        .iter()
        .any(|c| matches!(c, Call::Finalize(..))));
    assert!(h.kv.kv_get(STATE_KEY).unwrap().is_none());
    ctl.shutdown().await;
}

#[tokio::test]
async fn pause_does_not_patch_but_resume_does() {
    let h = Harness::new();
    let ctl = h.open().await;
    ctl.start().await.unwrap();
    h.clock.advance_secs(300);
    ctl.pause().await.unwrap();
    ctl.settle().await;
    assert!(!h
        .store
        .calls()
        .iter()
        .any(|c| matches!(c, Call::PatchBreak(..))));

    h.clock.advance_secs(60);
    let event = ctl.resume().await.unwrap();
    assert!(matches!(
        event,
        Event::SessionResumed { break_secs: 60, total_break_secs: 60, .. }
    ));
    ctl.settle().await;
    assert_eq!(
        h.store.calls().last(),
        Some(&Call::PatchBreak("srv-1".into(), 60))
    );
    ctl.shutdown().await;
}

#[tokio::test]
async fn reload_while_paused_shows_break_so_far() {
    let h = Harness::new();
    {
        let ctl = h.open().await;
        ctl.start().await.unwrap();
        h.clock.advance_secs(300);
        ctl.pause().await.unwrap();
        ctl.shutdown().await;
    }

    h.clock.advance_secs(45);
    let ctl = h.open().await;
    let snap = ctl.snapshot().await;
    assert_eq!(snap.status, TimerStatus::Paused);
    assert_eq!(snap.elapsed_secs, 300);
    assert_eq!(snap.break_secs, 45);
    assert!(!snap.finishing);
    ctl.shutdown().await;
}

#[tokio::test]
async fn legacy_paused_state_recomputes_elapsed() {
    let h = Harness::new();
    // Written by an older version: no pausedElapsed.
    let legacy = serde_json::json!({
        "status": "paused",
        "id": "old-1",
        "start": T0 - 600 * SEC,
        "breakAcc": 100,
        "breakStart": T0 - 50 * SEC,
    });
    h.kv.kv_set(STATE_KEY, &legacy.to_string()).unwrap();

    let ctl = h.open().await;
    let snap = ctl.snapshot().await;
    assert_eq!(snap.status, TimerStatus::Paused);
    assert_eq!(snap.session_id.as_deref(), Some("old-1"));
    assert_eq!(snap.elapsed_secs, 500);
    assert_eq!(snap.break_secs, 50);

    // Re-saved in the current shape on the next transition. Resuming folds
    // the whole break in, so active time is measured from breakStart.
    h.clock.advance_secs(10);
    ctl.resume().await.unwrap();
    ctl.pause().await.unwrap();
    let saved: PersistedState = h.kv.load(STATE_KEY, PersistedState::Idle);
    assert!(matches!(
        saved,
        PersistedState::Paused { paused_elapsed: Some(450), break_acc: 160, .. }
    ));
    ctl.shutdown().await;
}

#[tokio::test]
async fn start_adopts_unterminated_record() {
    let h = Harness::new();
    h.store.records.lock().unwrap().push(SessionRecord {
        id: "left-open".into(),
        user_id: "student".into(),
        started_at: to_utc(T0 - 600 * SEC),
        ended_at: None,
        total_break_secs: 60,
        productivity: None,
        note: None,
    });

    let ctl = h.open().await;
    let event = ctl.start().await.unwrap();
    assert!(matches!(
        &event,
        Event::SessionStarted { session_id, adopted: true, offline: false, .. } if session_id == "left-open"
    ));
    assert_eq!(ctl.snapshot().await.elapsed_secs, 540);
    assert!(!h.store.calls().contains(&Call::Create));
    ctl.shutdown().await;
}

#[tokio::test]
async fn failed_lookup_still_creates() {
    let h = Harness::new();
    h.store.fail_lookup.store(true, Ordering::SeqCst);
    let ctl = h.open().await;
    let event = ctl.start().await.unwrap();
    assert!(matches!(
        &event,
        Event::SessionStarted { session_id, adopted: false, offline: false, .. } if session_id == "srv-1"
    ));
    ctl.shutdown().await;
}

#[tokio::test]
async fn failed_create_falls_back_to_local_id() {
    let h = Harness::new();
    h.store.fail_create.store(true, Ordering::SeqCst);
    let ctl = h.open().await;
    let Event::SessionStarted {
        session_id,
        offline,
        ..
    } = ctl.start().await.unwrap()
    else {
        panic!("expected SessionStarted");
    };
    assert!(offline);
    assert!(uuid::Uuid::parse_str(&session_id).is_ok());
    assert_eq!(ctl.snapshot().await.status, TimerStatus::Running);
    ctl.shutdown().await;
}

#[tokio::test]
async fn concurrent_starts_open_one_session() {
    let h = Harness::new();
    let ctl = h.open().await;
    let (a, b) = tokio::join!(ctl.start(), ctl.start());
    assert_eq!(a.is_some() as u8 + b.is_some() as u8, 1);
    let creates = h
        .store
        .calls()
        .into_iter()
        .filter(|c| *c == Call::Create)
        .count();
    assert_eq!(creates, 1);
    ctl.shutdown().await;
}

#[tokio::test]
async fn clock_moving_backwards_reads_as_zero() {
    let h = Harness::new();
    let ctl = h.open().await;
    ctl.start().await.unwrap();
    h.clock.set_ms(T0 - 30 * SEC);
    assert_eq!(ctl.snapshot().await.elapsed_secs, 0);

    ctl.pause().await.unwrap();
    h.clock.set_ms(T0 - 60 * SEC);
    assert_eq!(ctl.snapshot().await.break_secs, 0);
    ctl.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn ticker_publishes_snapshots_while_active() {
    let h = Harness::new();
    let ctl = h.open().await;
    let rx = ctl.subscribe();

    ctl.start().await.unwrap();
    h.clock.advance_secs(3);
    tokio::time::sleep(Duration::from_millis(3_500)).await;
    assert_eq!(rx.borrow().status, TimerStatus::Running);
    assert_eq!(rx.borrow().elapsed_secs, 3);

    ctl.pause().await.unwrap();
    h.clock.advance_secs(5);
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(rx.borrow().elapsed_secs, 3);
    assert_eq!(rx.borrow().break_secs, 5);

    ctl.finish(score(7), "").await.unwrap();
    assert!(!ctl.is_ticking().await);
    assert_eq!(rx.borrow().status, TimerStatus::Idle);
    ctl.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn transition_snapshot_is_not_overwritten_by_ticker() {
    let h = Harness::new();
    let ctl = TimerController::open(
        h.kv.clone(),
        h.store.clone(),
        Arc::new(StaticIdentity::new("student")),
        ControllerOptions {
            clock: Arc::new(h.clock.clone()),
            tick_interval: Duration::from_millis(1),
        },
    )
    .await;
    let rx = ctl.subscribe();
    ctl.start().await.unwrap();

    for _ in 0..100 {
        ctl.pause().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(rx.borrow().status, TimerStatus::Paused);
        ctl.resume().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(rx.borrow().status, TimerStatus::Running);
    }
    ctl.finish(score(5), "").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(rx.borrow().status, TimerStatus::Idle);
    ctl.settle().await;
    ctl.shutdown().await;
}
