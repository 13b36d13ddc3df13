//! Timed, cancellable stroke playback
//!
//! [`PlaybackEngine`] is a cloneable handle around one state machine:
//!
//! ```text
//! Idle --execute--> Running(1, n) -> ... -> Running(n, n) --> Completed
//!                      |   ^
//!                pause |   | resume
//!                      v   |
//!                     Paused
//! any --stop/supersede--> Idle      any --failure--> Error(reason)
//! ```
//!
//! Only one run is active at a time. Starting a new one supersedes the
//! previous run, which is cancelled and never publishes again.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use touchmacro_core::{
    Error, ExecutionState, Gesture, GestureOutcome, InputCapability, PlaybackConfig,
    PlaybackSettings, Stroke, TouchEvent,
};

use crate::strokes::build_strokes;

/// Why a run loop stopped early.
enum RunError {
    Cancelled,
    Failed(Error),
}

impl From<Error> for RunError {
    fn from(e: Error) -> Self {
        RunError::Failed(e)
    }
}

struct StateCell {
    current: ExecutionState,
    /// Bumped whenever a run is started or stopped. A run may only publish
    /// while its own generation is current.
    generation: u64,
    /// Last `(current_run, total_runs)` published by the active run
    progress: Option<(u32, Option<u32>)>,
}

struct ActiveRun {
    generation: u64,
    cancel: CancellationToken,
}

struct Inner {
    capability: Arc<dyn InputCapability>,
    config: PlaybackConfig,
    paused: AtomicBool,
    // Lock order: active, then cell.
    active: Mutex<Option<ActiveRun>>,
    cell: Mutex<StateCell>,
    tx: broadcast::Sender<ExecutionState>,
}

/// Drives replay of a stroke set against an [`InputCapability`].
#[derive(Clone)]
pub struct PlaybackEngine {
    inner: Arc<Inner>,
}

impl PlaybackEngine {
    pub fn new(capability: Arc<dyn InputCapability>, config: PlaybackConfig) -> Self {
        let (tx, _) = broadcast::channel(config.state_channel_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                capability,
                config,
                paused: AtomicBool::new(false),
                active: Mutex::new(None),
                cell: Mutex::new(StateCell {
                    current: ExecutionState::Idle,
                    generation: 0,
                    progress: None,
                }),
                tx,
            }),
        }
    }

    /// Start playing `strokes`, superseding any active run.
    ///
    /// Returns once the run is spawned; progress is reported through
    /// [`subscribe`](Self::subscribe). Must be called within a Tokio runtime.
    pub fn execute(&self, strokes: Vec<Stroke>, settings: &PlaybackSettings) {
        let inner = &self.inner;
        let settings = settings.normalized(&inner.config);

        let mut active = inner.active.lock();
        let generation = inner.supersede(&mut active);

        if !inner.capability.is_available() {
            warn!("input capability unavailable, not starting playback");
            inner.publish(
                generation,
                ExecutionState::error(Error::capability_unavailable().message),
            );
            return;
        }

        if strokes.is_empty() {
            debug!("nothing to play");
            inner.publish(generation, ExecutionState::Completed);
            return;
        }

        info!(
            strokes = strokes.len(),
            repeat = settings.repeat_count,
            speed = settings.speed,
            "playback started"
        );
        let cancel = CancellationToken::new();
        tokio::spawn(drive(
            inner.clone(),
            generation,
            strokes,
            settings,
            cancel.clone(),
        ));
        *active = Some(ActiveRun { generation, cancel });
    }

    /// Build strokes from recorded events, then [`execute`](Self::execute).
    pub fn execute_events(&self, events: &[TouchEvent], settings: &PlaybackSettings) {
        self.execute(build_strokes(events), settings);
    }

    /// Hold the active run before its next stroke. No-op when nothing runs.
    pub fn pause(&self) {
        let inner = &self.inner;
        let active = inner.active.lock();
        let Some(run) = active.as_ref() else {
            return;
        };
        // Flag and state change together so a concurrent progress update
        // either lands before `Paused` or sees the flag.
        let mut cell = inner.cell.lock();
        if cell.generation != run.generation {
            return;
        }
        inner.paused.store(true, Ordering::SeqCst);
        inner.set_state(&mut cell, ExecutionState::Paused);
        debug!("playback paused");
    }

    /// Continue a paused run and republish its last known progress.
    pub fn resume(&self) {
        let inner = &self.inner;
        let active = inner.active.lock();
        let Some(run) = active.as_ref() else {
            return;
        };
        let mut cell = inner.cell.lock();
        if cell.generation != run.generation || !inner.paused.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some((current_run, total_runs)) = cell.progress {
            inner.set_state(
                &mut cell,
                ExecutionState::Running {
                    current_run,
                    total_runs,
                },
            );
        }
        debug!("playback resumed");
    }

    /// Cancel whatever is running and force `Idle`.
    pub fn stop(&self) {
        let inner = &self.inner;
        let mut active = inner.active.lock();
        let had_run = active.is_some();
        let generation = inner.supersede(&mut active);
        if had_run {
            info!("playback stopped");
        }
        let was_idle = inner.cell.lock().current == ExecutionState::Idle;
        if !was_idle {
            inner.publish(generation, ExecutionState::Idle);
        }
    }

    pub fn state(&self) -> ExecutionState {
        self.inner.cell.lock().current.clone()
    }

    /// Stream of every state transition from now on, in order.
    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionState> {
        self.inner.tx.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.lock().is_some()
    }

    /// Resolve with the state the current run ends in. Returns right away
    /// when nothing is running.
    pub async fn wait_until_terminal(&self) -> ExecutionState {
        let mut rx = self.subscribe();
        loop {
            if !self.is_active() {
                let state = self.state();
                if state.is_terminal() {
                    return state;
                }
            }
            match rx.recv().await {
                Ok(state) if state.is_terminal() && !self.is_active() => return state,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return self.state(),
            }
        }
    }
}

impl Inner {
    /// Cancel the active run, if any, and open a new generation.
    fn supersede(&self, active: &mut Option<ActiveRun>) -> u64 {
        if let Some(prev) = active.take() {
            debug!(generation = prev.generation, "cancelling previous run");
            prev.cancel.cancel();
        }
        self.paused.store(false, Ordering::SeqCst);
        let mut cell = self.cell.lock();
        cell.generation += 1;
        cell.progress = None;
        cell.generation
    }

    /// Replace the current state if `generation` still owns the engine.
    fn publish(&self, generation: u64, state: ExecutionState) -> bool {
        let mut cell = self.cell.lock();
        if cell.generation != generation {
            return false;
        }
        self.set_state(&mut cell, state);
        true
    }

    /// Caller holds `cell`; sending under it keeps subscribers in order.
    fn set_state(&self, cell: &mut StateCell, state: ExecutionState) {
        if let ExecutionState::Running {
            current_run,
            total_runs,
        } = state
        {
            cell.progress = Some((current_run, total_runs));
        }
        cell.current = state.clone();
        let _ = self.tx.send(state);
    }

    /// Record run progress; announce it unless the user has paused.
    fn publish_progress(&self, generation: u64, current_run: u32, total_runs: Option<u32>) {
        let mut cell = self.cell.lock();
        if cell.generation != generation {
            return;
        }
        // Read under `cell`, the lock `pause()` sets the flag under.
        if self.paused.load(Ordering::SeqCst) {
            cell.progress = Some((current_run, total_runs));
        } else {
            self.set_state(
                &mut cell,
                ExecutionState::Running {
                    current_run,
                    total_runs,
                },
            );
        }
    }

    async fn run_loop(
        &self,
        generation: u64,
        strokes: &[Stroke],
        settings: &PlaybackSettings,
        cancel: &CancellationToken,
    ) -> Result<(), RunError> {
        let total_runs = settings.total_runs();
        let mut run: u32 = 0;
        loop {
            run = run.saturating_add(1);
            self.publish_progress(generation, run, total_runs);
            self.play_pass(strokes, settings.speed, cancel).await?;

            if total_runs.is_some_and(|total| run >= total) {
                return Ok(());
            }
            if settings.pause_between_runs_ms > 0 {
                self.sleep_until(
                    Instant::now() + Duration::from_millis(settings.pause_between_runs_ms),
                    cancel,
                )
                .await?;
            } else {
                tokio::task::yield_now().await;
            }
        }
    }

    async fn play_pass(
        &self,
        strokes: &[Stroke],
        speed: f32,
        cancel: &CancellationToken,
    ) -> Result<(), RunError> {
        let speed = f64::from(speed);
        let run_start = Instant::now();
        for (index, stroke) in strokes.iter().enumerate() {
            self.wait_while_paused(cancel).await?;

            let offset_ms = (stroke.start_ms as f64 / speed) as u64;
            self.sleep_until(run_start + Duration::from_millis(offset_ms), cancel)
                .await?;
            self.wait_while_paused(cancel).await?;

            let duration_ms =
                ((stroke.duration_ms as f64 / speed) as u64).max(self.config.min_gesture_ms);
            let outcome = self
                .dispatch(Gesture::new(stroke.points.clone(), duration_ms), cancel)
                .await?;
            if outcome == GestureOutcome::Cancelled {
                warn!(stroke = index, "stroke cancelled by host, continuing");
            }
        }
        Ok(())
    }

    async fn dispatch(
        &self,
        gesture: Gesture,
        cancel: &CancellationToken,
    ) -> Result<GestureOutcome, RunError> {
        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        if !self.capability.is_available() {
            return Err(Error::capability_unavailable().into());
        }

        let (tx, rx) = oneshot::channel();
        let accepted = self.capability.dispatch(
            gesture,
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );
        if !accepted {
            warn!("gesture refused by host");
            return Ok(GestureOutcome::Cancelled);
        }

        tokio::select! {
            _ = cancel.cancelled() => Err(RunError::Cancelled),
            // A dropped callback counts as a host cancellation.
            outcome = rx => Ok(outcome.unwrap_or(GestureOutcome::Cancelled)),
        }
    }

    async fn wait_while_paused(&self, cancel: &CancellationToken) -> Result<(), RunError> {
        let poll = Duration::from_millis(self.config.pause_poll_ms.max(1));
        while self.paused.load(Ordering::SeqCst) {
            self.sleep_until(Instant::now() + poll, cancel).await?;
        }
        Ok(())
    }

    async fn sleep_until(&self, deadline: Instant, cancel: &CancellationToken) -> Result<(), RunError> {
        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        if deadline <= Instant::now() {
            return Ok(());
        }
        tokio::select! {
            _ = cancel.cancelled() => Err(RunError::Cancelled),
            _ = tokio::time::sleep_until(deadline) => Ok(()),
        }
    }
}

async fn drive(
    inner: Arc<Inner>,
    generation: u64,
    strokes: Vec<Stroke>,
    settings: PlaybackSettings,
    cancel: CancellationToken,
) {
    let result = inner
        .run_loop(generation, &strokes, &settings, &cancel)
        .await;

    let final_state = match result {
        Ok(()) => {
            info!("playback completed");
            ExecutionState::Completed
        }
        Err(RunError::Cancelled) => ExecutionState::Idle,
        Err(RunError::Failed(e)) => {
            error!(error = %e, "playback failed");
            ExecutionState::error(e.message)
        }
    };

    {
        let mut active = inner.active.lock();
        if active.as_ref().is_some_and(|r| r.generation == generation) {
            *active = None;
            inner.paused.store(false, Ordering::SeqCst);
        }
    }
    inner.publish(generation, final_state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use touchmacro_core::{GestureCallback, Point, REPEAT_FOREVER};

    struct FakeCapability {
        available: AtomicBool,
        outcome: Mutex<GestureOutcome>,
        accept: AtomicBool,
        dispatched: Mutex<Vec<(Instant, Gesture)>>,
    }

    impl FakeCapability {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                available: AtomicBool::new(true),
                outcome: Mutex::new(GestureOutcome::Completed),
                accept: AtomicBool::new(true),
                dispatched: Mutex::new(Vec::new()),
            })
        }

        fn count(&self) -> usize {
            self.dispatched.lock().len()
        }
    }

    impl InputCapability for FakeCapability {
        fn is_available(&self) -> bool {
            self.available.load(Ordering::SeqCst)
        }

        // Completes after the gesture's own duration, like a real host.
        fn dispatch(&self, gesture: Gesture, on_done: GestureCallback) -> bool {
            if !self.accept.load(Ordering::SeqCst) {
                return false;
            }
            let duration = Duration::from_millis(gesture.duration_ms);
            self.dispatched.lock().push((Instant::now(), gesture));
            let outcome = *self.outcome.lock();
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                on_done(outcome);
            });
            true
        }
    }

    fn stroke(start_ms: u64, duration_ms: u64) -> Stroke {
        Stroke {
            points: vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)],
            start_ms,
            duration_ms,
        }
    }

    fn engine(cap: &Arc<FakeCapability>) -> PlaybackEngine {
        PlaybackEngine::new(cap.clone(), PlaybackConfig::default())
    }

    fn settings(repeat_count: i32) -> PlaybackSettings {
        PlaybackSettings {
            repeat_count,
            ..Default::default()
        }
    }

    async fn collect_until_terminal(
        rx: &mut broadcast::Receiver<ExecutionState>,
    ) -> Vec<ExecutionState> {
        let mut seen = Vec::new();
        loop {
            let state = rx.recv().await.unwrap();
            let done = state.is_terminal();
            seen.push(state);
            if done {
                return seen;
            }
        }
    }

    fn running(current_run: u32, total_runs: Option<u32>) -> ExecutionState {
        ExecutionState::Running {
            current_run,
            total_runs,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn three_runs_then_completed() {
        let cap = FakeCapability::new();
        let engine = engine(&cap);
        let mut rx = engine.subscribe();

        engine.execute(vec![stroke(0, 20), stroke(40, 20)], &settings(3));
        let seen = collect_until_terminal(&mut rx).await;

        assert_eq!(
            seen,
            vec![
                running(1, Some(3)),
                running(2, Some(3)),
                running(3, Some(3)),
                ExecutionState::Completed,
            ]
        );
        assert_eq!(cap.count(), 6);
        assert!(!engine.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn endless_runs_until_stopped() {
        let cap = FakeCapability::new();
        let engine = engine(&cap);
        let mut rx = engine.subscribe();

        let s = PlaybackSettings {
            repeat_count: REPEAT_FOREVER,
            pause_between_runs_ms: 10,
            ..Default::default()
        };
        engine.execute(vec![stroke(0, 20)], &s);

        let mut last = 0;
        while last < 5 {
            match rx.recv().await.unwrap() {
                ExecutionState::Running {
                    current_run,
                    total_runs: None,
                } => {
                    assert!(current_run > last);
                    last = current_run;
                }
                other => panic!("unexpected state {other:?}"),
            }
        }

        engine.stop();
        assert_eq!(engine.state(), ExecutionState::Idle);
        assert!(!engine.is_active());
        assert_eq!(rx.recv().await.unwrap(), ExecutionState::Idle);

        // The cancelled task must not publish anything after stop.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_capability_errors_without_playing() {
        let cap = FakeCapability::new();
        cap.available.store(false, Ordering::SeqCst);
        let engine = engine(&cap);

        engine.execute(vec![stroke(0, 20)], &settings(1));

        assert_eq!(
            engine.state(),
            ExecutionState::error("capability unavailable")
        );
        assert!(!engine.is_active());
        assert_eq!(cap.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn capability_lost_mid_run_fails() {
        let cap = FakeCapability::new();
        let engine = engine(&cap);

        engine.execute(vec![stroke(0, 20), stroke(500, 20)], &settings(1));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(cap.count(), 1);
        cap.available.store(false, Ordering::SeqCst);

        assert_eq!(
            engine.wait_until_terminal().await,
            ExecutionState::error("capability unavailable")
        );
        assert_eq!(cap.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn speed_scales_offsets_and_floors_duration() {
        let cap = FakeCapability::new();
        let engine = engine(&cap);
        let s = PlaybackSettings {
            speed: 2.0,
            ..Default::default()
        };

        engine.execute(vec![stroke(0, 10), stroke(100, 200), stroke(300, 40)], &s);
        assert_eq!(engine.wait_until_terminal().await, ExecutionState::Completed);

        let dispatched = cap.dispatched.lock();
        let first = dispatched[0].0;
        let offsets: Vec<u64> = dispatched
            .iter()
            .map(|(at, _)| at.duration_since(first).as_millis() as u64)
            .collect();
        assert!((50..55).contains(&offsets[1]), "{offsets:?}");
        assert!((150..155).contains(&offsets[2]), "{offsets:?}");

        let durations: Vec<u64> = dispatched.iter().map(|(_, g)| g.duration_ms).collect();
        assert_eq!(durations, vec![16, 100, 20]);
    }

    #[tokio::test(start_paused = true)]
    async fn long_gesture_delays_following_stroke() {
        let cap = FakeCapability::new();
        let engine = engine(&cap);

        // The first gesture is still in flight when the second is due.
        engine.execute(vec![stroke(0, 300), stroke(100, 20)], &settings(1));
        assert_eq!(engine.wait_until_terminal().await, ExecutionState::Completed);

        let dispatched = cap.dispatched.lock();
        let gap = dispatched[1].0.duration_since(dispatched[0].0);
        assert!(gap >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn host_cancelled_strokes_are_skipped() {
        let cap = FakeCapability::new();
        *cap.outcome.lock() = GestureOutcome::Cancelled;
        let engine = engine(&cap);

        engine.execute(vec![stroke(0, 20), stroke(50, 20), stroke(90, 20)], &settings(1));
        assert_eq!(engine.wait_until_terminal().await, ExecutionState::Completed);
        assert_eq!(cap.count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn refused_strokes_are_skipped() {
        let cap = FakeCapability::new();
        cap.accept.store(false, Ordering::SeqCst);
        let engine = engine(&cap);

        engine.execute(vec![stroke(0, 20), stroke(50, 20)], &settings(2));
        assert_eq!(engine.wait_until_terminal().await, ExecutionState::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_holds_and_resume_restores_progress() {
        let cap = FakeCapability::new();
        let engine = engine(&cap);

        engine.execute(vec![stroke(0, 20), stroke(1_000, 20)], &settings(1));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(cap.count(), 1);

        engine.pause();
        assert_eq!(engine.state(), ExecutionState::Paused);
        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert_eq!(cap.count(), 1);

        engine.resume();
        assert_eq!(engine.state(), running(1, Some(1)));
        assert_eq!(engine.wait_until_terminal().await, ExecutionState::Completed);
        assert_eq!(cap.count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn pause_sticks_while_runs_advance() {
        let cap = FakeCapability::new();
        let engine = engine(&cap);
        let forever = settings(REPEAT_FOREVER);

        for trial in 0..500 {
            engine.execute(vec![stroke(0, 1)], &forever);
            tokio::task::yield_now().await;
            engine.pause();
            tokio::time::sleep(Duration::from_millis(1)).await;
            assert_eq!(engine.state(), ExecutionState::Paused, "trial {trial}");
        }
        engine.stop();
        assert_eq!(engine.state(), ExecutionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_while_paused_is_idle() {
        let cap = FakeCapability::new();
        let engine = engine(&cap);

        engine.execute(vec![stroke(0, 20), stroke(1_000, 20)], &settings(1));
        tokio::time::sleep(Duration::from_millis(10)).await;
        engine.pause();
        engine.stop();

        assert_eq!(engine.state(), ExecutionState::Idle);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(cap.count(), 1);
        assert_eq!(engine.state(), ExecutionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_and_stop_without_run_do_nothing() {
        let cap = FakeCapability::new();
        let engine = engine(&cap);
        let mut rx = engine.subscribe();

        engine.pause();
        engine.resume();
        engine.stop();

        assert_eq!(engine.state(), ExecutionState::Idle);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn new_execution_supersedes_old() {
        let cap = FakeCapability::new();
        let engine = engine(&cap);

        let endless = PlaybackSettings {
            repeat_count: REPEAT_FOREVER,
            ..Default::default()
        };
        engine.execute(vec![stroke(0, 20), stroke(500, 20)], &endless);
        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut rx = engine.subscribe();
        engine.execute(vec![stroke(0, 20)], &settings(1));
        let seen = collect_until_terminal(&mut rx).await;

        assert_eq!(seen, vec![running(1, Some(1)), ExecutionState::Completed]);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(engine.state(), ExecutionState::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_input_completes_immediately() {
        let cap = FakeCapability::new();
        let engine = engine(&cap);
        let mut rx = engine.subscribe();

        engine.execute_events(&[], &settings(3));

        assert_eq!(rx.recv().await.unwrap(), ExecutionState::Completed);
        assert!(rx.try_recv().is_err());
        assert_eq!(cap.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_repeat_plays_once() {
        let cap = FakeCapability::new();
        let engine = engine(&cap);
        let mut rx = engine.subscribe();

        engine.execute(vec![stroke(0, 20)], &settings(0));
        let seen = collect_until_terminal(&mut rx).await;
        assert_eq!(seen, vec![running(1, Some(1)), ExecutionState::Completed]);
    }
}
