//! The coordinator itself: lifecycle, worker-count accounting, the
//! primary-reader election, and the "advanced" callbacks readers use to talk
//! back to it. Grounded on the tick-driven spawn/reap loop of a cancellable
//! thread pool, reshaped around async tasks, a signed token bucket, and a
//! single-slot CAS primary-reader cell instead of a polling coordinator thread.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bottleneck::{AsyncBottleneck, BottleneckPermit};
use crate::error::CoordinatorError;
use crate::reader::ReaderFactory;
use crate::worker::run_worker;

/// `tasksCanBeStarted + activeWorkers == maxWorkers` at every steady state;
/// this sentinel marks an empty primary-reader slot. Worker ids start at 1 so
/// it never collides with a live id.
const NO_PRIMARY: u64 = 0;

pub(crate) struct Inner {
    name: String,

    max_workers: AtomicU32,
    tasks_can_be_started: AtomicI64,
    active_workers: DashMap<u64, JoinHandle<()>>,
    task_id_seq: AtomicU64,
    primary_reader: AtomicU64,

    started: AtomicBool,
    paused: AtomicBool,
    cancel_token: Mutex<CancellationToken>,

    shutdown_timeout: Duration,
    stop_grace_period: Duration,

    bottleneck: AsyncBottleneck,
    reader_factory: Arc<dyn ReaderFactory>,
}

/// Attempt to spawn one additional worker. Succeeds iff a start token can be
/// taken from the bucket; never blocks. A free function rather than a method
/// because it needs to clone the surrounding `Arc<Inner>` to hand to the
/// spawned task, not just `&Inner`.
fn start_new_task(inner: &Arc<Inner>) -> bool {
    loop {
        let current = inner.tasks_can_be_started.load(Ordering::Acquire);
        if current <= 0 {
            return false;
        }

        if inner
            .tasks_can_be_started
            .compare_exchange_weak(current, current - 1, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            break;
        }
    }

    let worker_id = inner.task_id_seq.fetch_add(1, Ordering::Relaxed) + 1;
    let cancel_token = inner.cancel_token.lock().clone();

    // Register a placeholder under the fresh id *before* spawning, so
    // `exit_worker`'s removal can never race ahead of this registration. Once
    // the real handle is in hand, replace the placeholder - but only if it's
    // still there: a worker fast enough to have already exited and removed
    // itself must not be resurrected by re-inserting a stale handle.
    inner
        .active_workers
        .insert(worker_id, tokio::spawn(async {}));

    let handle = tokio::spawn(run_worker(inner.clone(), worker_id, cancel_token));
    if let Some(mut slot) = inner.active_workers.get_mut(&worker_id) {
        *slot = handle;
    }

    true
}

impl Inner {

    /// Exit-accounting for a worker: remove it from the active set and refund
    /// its start token. Invoked exactly once per worker via the scopeguard set
    /// up in [`run_worker`], covering both normal and panicking exits.
    pub(crate) fn exit_worker(&self, worker_id: u64) {
        self.active_workers.remove(&worker_id);
        self.tasks_can_be_started.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn try_install_primary(&self, worker_id: u64) -> bool {
        self.primary_reader
            .compare_exchange(NO_PRIMARY, worker_id, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn clear_primary_if(&self, worker_id: u64) {
        let _ = self.primary_reader.compare_exchange(
            worker_id,
            NO_PRIMARY,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    fn is_primary(&self, worker_id: u64) -> bool {
        self.primary_reader.load(Ordering::Acquire) == worker_id
    }

    fn current_token(&self) -> CancellationToken {
        self.cancel_token.lock().clone()
    }

    pub(crate) fn reader_factory(&self) -> &Arc<dyn ReaderFactory> {
        &self.reader_factory
    }
}

/// The back-reference readers hold into the coordinator. Bound to a single
/// worker id at creation (mirrors the identity comparison the source performs
/// against `primaryReader`).
#[derive(Clone)]
pub struct CoordinatorAdvanced {
    inner: Arc<Inner>,
    worker_id: u64,
}

impl CoordinatorAdvanced {
    pub(crate) fn new(inner: Arc<Inner>, worker_id: u64) -> Self {
        Self { inner, worker_id }
    }

    pub fn start_new_task(&self) -> bool {
        start_new_task(&self.inner)
    }

    pub fn is_primary_reader(&self) -> bool {
        self.inner.is_primary(self.worker_id)
    }

    pub fn is_safe_to_remove_reader(&self, _work_done: bool) -> bool {
        self.inner.current_token().is_cancelled()
            || !self.is_primary_reader()
            || self.inner.tasks_can_be_started.load(Ordering::Acquire) < 0
    }

    /// Releases the primary slot if held, checks cancellation, then attempts
    /// to spawn a successor prober. The ordering matters: releasing before
    /// checking cancellation means a Stop racing with message receipt at
    /// worst spawns a worker that immediately exits, rather than leaving the
    /// primary slot stuck empty forever.
    pub fn on_before_do_work(&self) {
        self.inner.clear_primary_if(self.worker_id);

        if self.inner.current_token().is_cancelled() {
            return;
        }

        start_new_task(&self.inner);
    }

    pub fn on_after_do_work(&self) {
        self.inner.try_install_primary(self.worker_id);
    }

    pub async fn wait_read_async(&self) -> Option<BottleneckPermit> {
        let token = self.inner.current_token();
        self.inner.bottleneck.enter(&token).await
    }

    pub fn token(&self) -> CancellationToken {
        self.inner.current_token()
    }
}

/// Dynamic worker-pool coordinator driving concurrent consumption from a
/// transport-backed queue. See the crate-level documentation for the full
/// state-machine and invariants.
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    pub fn new(
        name: impl Into<String>,
        max_workers: u32,
        max_read_parallelism: usize,
        shutdown_timeout: Duration,
        stop_grace_period: Duration,
        reader_factory: Arc<dyn ReaderFactory>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                max_workers: AtomicU32::new(max_workers),
                tasks_can_be_started: AtomicI64::new(0),
                active_workers: DashMap::new(),
                task_id_seq: AtomicU64::new(0),
                primary_reader: AtomicU64::new(NO_PRIMARY),
                started: AtomicBool::new(false),
                paused: AtomicBool::new(false),
                cancel_token: Mutex::new(CancellationToken::new()),
                shutdown_timeout,
                stop_grace_period,
                bottleneck: AsyncBottleneck::new(max_read_parallelism),
                reader_factory,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Idempotent transition from stopped to started. Returns `true` on both
    /// first success and on a call while already started.
    pub fn start(&self) -> bool {
        if self.inner.started.compare_exchange(
            false,
            true,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) == Err(true)
        {
            return true;
        }

        *self.inner.cancel_token.lock() = CancellationToken::new();
        self.inner.task_id_seq.store(0, Ordering::Relaxed);
        self.inner.primary_reader.store(NO_PRIMARY, Ordering::Release);
        self.inner.paused.store(false, Ordering::Release);
        self.inner.tasks_can_be_started.store(
            self.inner.max_workers.load(Ordering::Acquire) as i64,
            Ordering::Release,
        );

        start_new_task(&self.inner);

        true
    }

    /// Idempotent transition from started to stopped. Triggers cancellation,
    /// waits a short grace period for in-flight receives to unwind, then waits
    /// for either all workers to finish or `shutdown_timeout`, whichever comes
    /// first. Never fails.
    pub async fn stop(&self) {
        let was_started =
            self.inner
                .started
                .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire);
        if was_started.is_err() {
            return;
        }

        self.inner.cancel_token.lock().cancel();
        self.inner.paused.store(false, Ordering::Release);

        tokio::time::sleep(self.inner.stop_grace_period).await;

        let worker_ids: Vec<u64> = self
            .inner
            .active_workers
            .iter()
            .map(|entry| *entry.key())
            .collect();

        let handles: Vec<(u64, JoinHandle<()>)> = worker_ids
            .into_iter()
            .filter_map(|id| self.inner.active_workers.remove(&id))
            .collect();

        let join_all = async {
            for (_id, handle) in handles {
                if let Err(error) = handle.await {
                    if error.is_panic() {
                        warn!(coordinator = %self.inner.name, "a worker panicked during shutdown: {error}");
                    }
                }
            }
        };

        if tokio::time::timeout(self.inner.shutdown_timeout, join_all)
            .await
            .is_err()
        {
            warn!(
                coordinator = %self.inner.name,
                "shutdown_timeout elapsed before all workers finished; abandoning stragglers"
            );
        }

        self.inner.active_workers.clear();
        self.inner.tasks_can_be_started.store(0, Ordering::Release);
    }

    /// Calls [`Coordinator::stop`] and additionally warns if any worker
    /// remained active once the shutdown timeout expired. Safe to call more
    /// than once.
    pub async fn dispose(&self) {
        self.stop().await;

        if !self.inner.active_workers.is_empty() {
            warn!(
                coordinator = %self.inner.name,
                remaining = self.inner.active_workers.len(),
                "dispose() completed with workers still registered"
            );
        } else {
            info!(coordinator = %self.inner.name, "dispose() completed cleanly");
        }
    }

    pub fn max_workers_count(&self) -> u32 {
        self.inner.max_workers.load(Ordering::Acquire)
    }

    /// Rejects negative values. Adds `new - old` atomically to the start-token
    /// bucket; lowering the cap can drive the bucket negative until excess
    /// workers drain naturally via [`CoordinatorAdvanced::is_safe_to_remove_reader`].
    pub fn set_max_workers_count(&self, new_value: i64) -> Result<(), CoordinatorError> {
        if new_value < 0 {
            return Err(CoordinatorError::NegativeMaxWorkers { value: new_value });
        }

        let old_value = self.inner.max_workers.load(Ordering::Acquire) as i64;
        let delta = new_value - old_value;

        // `new_value >= 0` was just checked above.
        self.inner
            .max_workers
            .store(new_value as u32, Ordering::Release);
        self.inner
            .tasks_can_be_started
            .fetch_add(delta, Ordering::AcqRel);

        if self.inner.active_workers.is_empty() {
            start_new_task(&self.inner);
        }

        Ok(())
    }

    pub fn tasks_count(&self) -> usize {
        self.inner.active_workers.len()
    }

    pub fn tasks_can_be_started(&self) -> i64 {
        self.inner.tasks_can_be_started.load(Ordering::Acquire)
    }

    pub fn free_readers_available(&self) -> usize {
        self.inner.bottleneck.available_permits()
    }

    pub fn token(&self) -> CancellationToken {
        self.inner.current_token()
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::Acquire)
    }

    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration as StdDuration;
    use tokio::time::sleep;

    use crate::reader::{MessageReader, ProcessOutcome, ReaderFactory};

    /// A reader whose behavior is scripted by a counter shared across every
    /// worker the factory spawns, simulating a single queue with a fixed
    /// number of messages: it reports work done for the first `work_rounds`
    /// receives total, then every worker idles forever.
    struct ScriptedReader {
        coordinator: CoordinatorAdvanced,
        remaining_work: Arc<AtomicI64>,
        busy_sleep: StdDuration,
        /// Whether to consult `is_safe_to_remove_reader` after a work round, as
        /// the real reader contract does, or to always keep going - some
        /// scenarios deliberately hardcode "never step down while busy" to
        /// isolate the coordinator's own cap/growth behavior from reader-side draining.
        respect_removal_advice: bool,
    }

    #[async_trait]
    impl MessageReader for ScriptedReader {
        async fn process_message(&self, _token: &CancellationToken) -> ProcessOutcome {
            let remaining = self.remaining_work.fetch_sub(1, Ordering::AcqRel);

            if remaining > 0 {
                self.coordinator.on_before_do_work();
                if !self.busy_sleep.is_zero() {
                    sleep(self.busy_sleep).await;
                }
                self.coordinator.on_after_do_work();

                if self.respect_removal_advice && self.coordinator.is_safe_to_remove_reader(true) {
                    ProcessOutcome::removed(true)
                } else {
                    ProcessOutcome::worked()
                }
            } else {
                self.remaining_work.fetch_add(1, Ordering::AcqRel);

                if self.coordinator.is_safe_to_remove_reader(false) {
                    ProcessOutcome::removed(false)
                } else {
                    sleep(StdDuration::from_millis(5)).await;
                    ProcessOutcome::idle()
                }
            }
        }
    }

    struct ScriptedFactory {
        remaining_work: Arc<AtomicI64>,
        busy_sleep: StdDuration,
        respect_removal_advice: bool,
        spawned: Arc<AtomicUsize>,
    }

    impl ScriptedFactory {
        fn new(work_rounds: i64, busy_sleep: StdDuration) -> Self {
            Self {
                remaining_work: Arc::new(AtomicI64::new(work_rounds)),
                busy_sleep,
                respect_removal_advice: false,
                spawned: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn draining(work_rounds: i64, busy_sleep: StdDuration) -> Self {
            Self {
                respect_removal_advice: true,
                ..Self::new(work_rounds, busy_sleep)
            }
        }
    }

    #[async_trait]
    impl ReaderFactory for ScriptedFactory {
        async fn create_reader(
            &self,
            _task_id: u64,
            coordinator: CoordinatorAdvanced,
        ) -> Box<dyn MessageReader> {
            self.spawned.fetch_add(1, Ordering::AcqRel);
            Box::new(ScriptedReader {
                coordinator,
                remaining_work: self.remaining_work.clone(),
                busy_sleep: self.busy_sleep,
                respect_removal_advice: self.respect_removal_advice,
            })
        }
    }

    fn idle_coordinator(max_workers: u32) -> Coordinator {
        let factory = Arc::new(ScriptedFactory::new(0, StdDuration::ZERO));
        Coordinator::new(
            "test",
            max_workers,
            4,
            StdDuration::from_secs(2),
            StdDuration::from_millis(10),
            factory,
        )
    }

    #[tokio::test]
    async fn idle_prober_holds_exactly_one_worker() {
        let coordinator = idle_coordinator(10);
        coordinator.start();

        sleep(StdDuration::from_millis(80)).await;

        assert_eq!(coordinator.tasks_count(), 1);
        assert_eq!(coordinator.tasks_can_be_started(), 9);

        coordinator.stop().await;
    }

    #[tokio::test]
    async fn growth_on_work_then_decay() {
        let factory = Arc::new(ScriptedFactory::new(5, StdDuration::from_millis(20)));
        let coordinator = Coordinator::new(
            "growth",
            10,
            4,
            StdDuration::from_secs(2),
            StdDuration::from_millis(10),
            factory,
        );
        coordinator.start();

        sleep(StdDuration::from_millis(150)).await;
        assert!(coordinator.tasks_count() >= 2);

        sleep(StdDuration::from_millis(400)).await;
        assert_eq!(coordinator.tasks_count(), 1);

        coordinator.stop().await;
    }

    #[tokio::test]
    async fn never_exceeds_max_workers() {
        let factory = Arc::new(ScriptedFactory::new(i64::MAX, StdDuration::from_millis(5)));
        let coordinator = Coordinator::new(
            "cap",
            10,
            4,
            StdDuration::from_secs(2),
            StdDuration::from_millis(10),
            factory,
        );
        coordinator.start();

        for _ in 0..20 {
            sleep(StdDuration::from_millis(20)).await;
            assert!(coordinator.tasks_count() <= 10);
            assert!(coordinator.tasks_can_be_started() >= 0 || coordinator.tasks_count() == 10);
        }

        coordinator.stop().await;
    }

    #[tokio::test]
    async fn graceful_stop_under_load_clears_all_workers() {
        let factory = Arc::new(ScriptedFactory::new(i64::MAX, StdDuration::from_millis(100)));
        let coordinator = Coordinator::new(
            "load",
            10,
            10,
            StdDuration::from_secs(1),
            StdDuration::from_millis(10),
            factory,
        );
        coordinator.start();

        sleep(StdDuration::from_millis(300)).await;
        assert!(coordinator.tasks_count() > 1);

        coordinator.stop().await;

        assert_eq!(coordinator.tasks_count(), 0);
        assert_eq!(coordinator.tasks_can_be_started(), 0);
    }

    #[tokio::test]
    async fn lowering_the_cap_shrinks_the_pool() {
        let factory = Arc::new(ScriptedFactory::draining(i64::MAX, StdDuration::from_millis(10)));
        let coordinator = Coordinator::new(
            "shrink",
            10,
            10,
            StdDuration::from_secs(2),
            StdDuration::from_millis(10),
            factory,
        );
        coordinator.start();

        sleep(StdDuration::from_millis(200)).await;
        assert!(coordinator.tasks_count() > 3);

        coordinator.set_max_workers_count(3).unwrap();

        sleep(StdDuration::from_millis(500)).await;
        assert_eq!(coordinator.tasks_count(), 3);

        coordinator.stop().await;
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let coordinator = idle_coordinator(5);
        assert!(coordinator.start());
        assert!(coordinator.start());
        assert_eq!(coordinator.tasks_count(), 1);

        coordinator.stop().await;
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let coordinator = idle_coordinator(5);
        coordinator.start();
        sleep(StdDuration::from_millis(30)).await;

        coordinator.stop().await;
        coordinator.stop().await;

        assert_eq!(coordinator.tasks_count(), 0);
    }

    #[tokio::test]
    async fn start_stop_round_trip_matches_fresh_state() {
        let coordinator = idle_coordinator(5);
        coordinator.start();
        sleep(StdDuration::from_millis(30)).await;
        coordinator.stop().await;

        assert_eq!(coordinator.tasks_count(), 0);
        assert_eq!(coordinator.tasks_can_be_started(), 0);
        assert!(!coordinator.is_started());
        assert!(!coordinator.is_paused());
    }

    #[tokio::test]
    async fn rejects_negative_max_workers() {
        let coordinator = idle_coordinator(5);
        let result = coordinator.set_max_workers_count(-1);
        assert!(matches!(
            result,
            Err(CoordinatorError::NegativeMaxWorkers { value: -1 })
        ));
    }

    #[tokio::test]
    async fn setting_cap_while_idle_starts_a_worker() {
        let coordinator = idle_coordinator(0);
        coordinator.start();
        sleep(StdDuration::from_millis(30)).await;
        assert_eq!(coordinator.tasks_count(), 0);

        coordinator.set_max_workers_count(2).unwrap();
        sleep(StdDuration::from_millis(30)).await;
        assert_eq!(coordinator.tasks_count(), 1);

        coordinator.stop().await;
    }
}
