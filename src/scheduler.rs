//! Cooperative per-frame scheduling.
//!
//! The [`FrameLoop`] is the single-threaded driver of the streaming pipeline: once per rendered
//! frame it samples the latest video frame, invokes the detector, computes the instantaneous
//! frame rate, and hands frame and result to an observer. Detection runs every tick, but stats
//! and other cross-cutting derived state are only *committed* through a throttle gate, at most
//! once per [`STATS_COMMIT_INTERVAL`], so UI update cost stays decoupled from detection cadence.
//!
//! The loop holds its own cancellation flag and last-tick timestamp and is driven by an injected
//! tick primitive ([`Ticker`]) and clock ([`Clock`]), which keeps the throttle and FPS logic
//! testable without a display.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use serde::Serialize;

use crate::{
    image::Image,
    perception::{FrameResult, ModelKind, RunningMode},
    resolution::Resolution,
};

/// Minimum interval between two committed stats updates.
///
/// Intermediate per-tick snapshots inside the window are computed and discarded
/// (last-writer-wins), never queued.
pub const STATS_COMMIT_INTERVAL: Duration = Duration::from_millis(150);

/// A source of "now" timestamps.
///
/// Production code uses [`SystemClock`]; tests drive the loop with a [`ManualClock`].
pub trait Clock {
    fn now(&self) -> Instant;
}

/// The monotonic system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A manually advanced clock for deterministic tests and headless drivers.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Moves the reported time forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        *self.now.lock().unwrap() += delta;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}

/// Supplies the latest frame of a live video source.
///
/// A source that has not delivered a frame yet reports no resolution; the loop treats that as a
/// transient condition and re-arms without detecting.
pub trait FrameSource {
    /// Returns the dimensions of the source, or `None` while no valid frame is available.
    fn resolution(&self) -> Option<Resolution>;

    /// Returns the most recently published frame.
    fn latest_frame(&mut self) -> Option<Image>;
}

/// The detection half of the pipeline, as seen by the scheduler.
///
/// [`crate::perception::Orchestrator`] is the production implementation.
pub trait Detector {
    /// Returns whether at least one perception model is ready.
    fn is_ready(&self) -> bool;

    /// Runs detection against one frame. Must not fail; degraded models contribute empty results.
    fn detect(&mut self, frame: &Image, mode: RunningMode) -> FrameResult;
}

/// Per-frame statistics, recomputed every tick and committed at most once per
/// [`STATS_COMMIT_INTERVAL`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct StatsSnapshot {
    /// Instantaneous frame rate, `1000 / Δt_ms` between the two most recent ticks.
    pub fps: f32,
    pub objects: usize,
    pub faces: usize,
    pub poses: usize,
    pub hands: usize,
}

impl StatsSnapshot {
    pub fn from_result(fps: f32, result: &FrameResult) -> Self {
        Self {
            fps,
            objects: result.count(ModelKind::Object),
            faces: result.count(ModelKind::Face),
            poses: result.count(ModelKind::Pose),
            hands: result.count(ModelKind::Hand),
        }
    }
}

/// Receives per-tick and throttled outputs of the frame loop.
pub trait FrameObserver {
    /// Called for every processed frame.
    fn frame(&mut self, _frame: &Image, _result: &FrameResult) {}

    /// Called at most once per [`STATS_COMMIT_INTERVAL`], with the stats snapshot of the most
    /// recent tick and the result that produced it.
    fn stats(&mut self, _stats: &StatsSnapshot, _result: &FrameResult) {}
}

/// The outcome of a single scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The source had no valid dimensions or no frame; re-armed without detecting.
    SourceNotReady,
    /// No perception model is ready yet; re-armed without detecting.
    DetectorNotReady,
    /// A frame was sampled and processed. `committed` is whether stats passed the throttle gate.
    Processed { committed: bool },
}

/// Cancels a running [`FrameLoop`].
///
/// Stopping is deterministic: the next scheduled tick will not run. A tick that is already in
/// progress is never interrupted. Stopping an already stopped loop has no effect.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Rate limiter for observable state commits.
#[derive(Debug)]
pub struct Throttle {
    last: Option<Instant>,
}

impl Throttle {
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Returns `true` (and records the commit) if at least [`STATS_COMMIT_INTERVAL`] has passed
    /// since the previous commit. The first call always commits.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < STATS_COMMIT_INTERVAL => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives the detection pipeline once per rendered frame.
pub struct FrameLoop<C: Clock = SystemClock> {
    clock: C,
    cancel: Arc<AtomicBool>,
    last_tick: Option<Instant>,
    throttle: Throttle,
}

impl FrameLoop<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for FrameLoop<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> FrameLoop<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            cancel: Arc::new(AtomicBool::new(false)),
            last_tick: None,
            throttle: Throttle::new(),
        }
    }

    /// Returns a handle that cancels this loop from any thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.cancel.clone())
    }

    /// Executes a single cooperative tick.
    ///
    /// The tick never fails: transient conditions (source without dimensions, no ready model)
    /// simply re-arm for the next tick, and per-model faults degrade to "no detections this
    /// tick" inside the detector.
    pub fn tick(
        &mut self,
        source: &mut dyn FrameSource,
        detector: &mut dyn Detector,
        observer: &mut dyn FrameObserver,
    ) -> TickOutcome {
        match source.resolution() {
            None => return TickOutcome::SourceNotReady,
            Some(res) if res.is_empty() => return TickOutcome::SourceNotReady,
            Some(_) => {}
        }
        if !detector.is_ready() {
            return TickOutcome::DetectorNotReady;
        }
        let Some(frame) = source.latest_frame() else {
            return TickOutcome::SourceNotReady;
        };

        let now = self.clock.now();
        let fps = match self.last_tick {
            Some(prev) => {
                let dt = now.saturating_duration_since(prev);
                if dt.is_zero() {
                    0.0
                } else {
                    1.0 / dt.as_secs_f32()
                }
            }
            None => 0.0,
        };
        self.last_tick = Some(now);

        let result = detector.detect(&frame, RunningMode::Stream);
        observer.frame(&frame, &result);

        let committed = self.throttle.ready(now);
        if committed {
            observer.stats(&StatsSnapshot::from_result(fps, &result), &result);
        }

        TickOutcome::Processed { committed }
    }

    /// Runs ticks until the loop is stopped.
    ///
    /// `ticker` decides when the next tick happens; a render-callback driven host passes its
    /// own implementation, headless hosts use an [`IntervalTicker`].
    pub fn run(
        &mut self,
        ticker: &mut dyn Ticker,
        source: &mut dyn FrameSource,
        detector: &mut dyn Detector,
        observer: &mut dyn FrameObserver,
    ) {
        while !self.cancel.load(Ordering::Relaxed) {
            ticker.wait();
            // A stop that arrived while waiting cancels the pending tick.
            if self.cancel.load(Ordering::Relaxed) {
                break;
            }
            self.tick(source, detector, observer);
        }
    }
}

/// Decides when the next cooperative tick runs.
pub trait Ticker {
    /// Blocks until the next tick is due.
    fn wait(&mut self);
}

/// A fixed-interval [`Ticker`] for hosts without a render callback.
#[derive(Debug)]
pub struct IntervalTicker {
    period: Duration,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    /// Creates a ticker approximating a display refresh rate.
    pub fn from_hz(hz: u32) -> Self {
        assert_ne!(hz, 0);
        Self::new(Duration::from_secs(1) / hz)
    }
}

impl Ticker for IntervalTicker {
    fn wait(&mut self) {
        thread::sleep(self.period);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestSource {
        resolution: Option<Resolution>,
    }

    impl FrameSource for TestSource {
        fn resolution(&self) -> Option<Resolution> {
            self.resolution
        }

        fn latest_frame(&mut self) -> Option<Image> {
            let res = self.resolution.filter(|res| !res.is_empty())?;
            Some(Image::new(res.width(), res.height()))
        }
    }

    struct CountingDetector {
        ready: bool,
        calls: usize,
    }

    impl Detector for CountingDetector {
        fn is_ready(&self) -> bool {
            self.ready
        }

        fn detect(&mut self, _frame: &Image, _mode: RunningMode) -> FrameResult {
            self.calls += 1;
            FrameResult::new(Duration::ZERO)
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        frames: usize,
        commits: Vec<StatsSnapshot>,
    }

    impl FrameObserver for RecordingObserver {
        fn frame(&mut self, _frame: &Image, _result: &FrameResult) {
            self.frames += 1;
        }

        fn stats(&mut self, stats: &StatsSnapshot, _result: &FrameResult) {
            self.commits.push(*stats);
        }
    }

    fn fixture() -> (ManualClock, FrameLoop<ManualClock>, TestSource, CountingDetector, RecordingObserver) {
        let clock = ManualClock::new();
        let frame_loop = FrameLoop::with_clock(clock.clone());
        let source = TestSource {
            resolution: Some(Resolution::new(64, 48)),
        };
        let detector = CountingDetector {
            ready: true,
            calls: 0,
        };
        (clock, frame_loop, source, detector, RecordingObserver::default())
    }

    #[test]
    fn zero_sized_source_rearms_without_detecting() {
        let (_clock, mut frame_loop, mut source, mut detector, mut observer) = fixture();
        source.resolution = Some(Resolution::new(0, 480));

        let outcome = frame_loop.tick(&mut source, &mut detector, &mut observer);
        assert_eq!(outcome, TickOutcome::SourceNotReady);
        assert_eq!(detector.calls, 0);

        // The source becoming ready later is picked up by a subsequent tick.
        source.resolution = Some(Resolution::new(640, 480));
        let outcome = frame_loop.tick(&mut source, &mut detector, &mut observer);
        assert_eq!(outcome, TickOutcome::Processed { committed: true });
        assert_eq!(detector.calls, 1);
    }

    #[test]
    fn detector_not_ready_rearms_without_detecting() {
        let (_clock, mut frame_loop, mut source, mut detector, mut observer) = fixture();
        detector.ready = false;

        let outcome = frame_loop.tick(&mut source, &mut detector, &mut observer);
        assert_eq!(outcome, TickOutcome::DetectorNotReady);
        assert_eq!(detector.calls, 0);
        assert_eq!(observer.frames, 0);
    }

    #[test]
    fn fps_is_computed_from_tick_deltas() {
        let (clock, mut frame_loop, mut source, mut detector, mut observer) = fixture();

        frame_loop.tick(&mut source, &mut detector, &mut observer);
        clock.advance(Duration::from_millis(200));
        frame_loop.tick(&mut source, &mut detector, &mut observer);

        // Both ticks commit (throttle window is 150ms); the second saw Δt = 200ms.
        assert_eq!(observer.commits.len(), 2);
        assert_eq!(observer.commits[0].fps, 0.0);
        approx::assert_relative_eq!(observer.commits[1].fps, 5.0, max_relative = 1e-4);
    }

    #[test]
    fn stats_commits_respect_throttle_window() {
        let (clock, mut frame_loop, mut source, mut detector, mut observer) = fixture();

        // 10ms ticks for one simulated second.
        let mut elapsed = Duration::ZERO;
        for _ in 0..100 {
            frame_loop.tick(&mut source, &mut detector, &mut observer);
            clock.advance(Duration::from_millis(10));
            elapsed += Duration::from_millis(10);
        }

        // Detection ran every tick, commits were throttled.
        assert_eq!(detector.calls, 100);
        let max_commits = elapsed.as_millis().div_ceil(STATS_COMMIT_INTERVAL.as_millis()) + 1;
        assert!(
            (observer.commits.len() as u128) <= max_commits,
            "{} commits for {}ms",
            observer.commits.len(),
            elapsed.as_millis()
        );
        assert!(observer.commits.len() >= 2);
    }

    #[test]
    fn stop_is_idempotent_and_cancels_pending_tick() {
        let (_clock, mut frame_loop, mut source, mut detector, mut observer) = fixture();

        let handle = frame_loop.stop_handle();
        handle.stop();
        handle.stop();
        assert!(handle.is_stopped());

        // `run` observes the cancellation before executing a tick.
        let mut ticker = IntervalTicker::new(Duration::from_millis(1));
        frame_loop.run(&mut ticker, &mut source, &mut detector, &mut observer);
        assert_eq!(detector.calls, 0);
        assert_eq!(observer.frames, 0);
    }

    #[test]
    fn committed_stats_are_last_writer_wins() {
        let (clock, mut frame_loop, mut source, mut detector, mut observer) = fixture();

        frame_loop.tick(&mut source, &mut detector, &mut observer);
        // Three quick ticks inside the throttle window, then one past it.
        for _ in 0..3 {
            clock.advance(Duration::from_millis(10));
            frame_loop.tick(&mut source, &mut detector, &mut observer);
        }
        clock.advance(Duration::from_millis(150));
        frame_loop.tick(&mut source, &mut detector, &mut observer);

        assert_eq!(observer.commits.len(), 2);
        // The committed snapshot reflects the most recent tick (Δt = 150ms → ~6.7 FPS), not any
        // of the discarded intermediate ones.
        approx::assert_relative_eq!(
            observer.commits[1].fps,
            1000.0 / 150.0,
            max_relative = 1e-3
        );
    }
}
