//! End-to-end pipeline test: synthetic capture device → stream manager → frame loop →
//! orchestrator with stub models → overlay → history.

use std::thread;
use std::time::{Duration, Instant};

use percept::{
    history::{DetectionHistory, HISTORY_CAPACITY},
    image::{Image, Rect},
    object::ObjectDetection,
    overlay::{self, OverlayOptions},
    perception::{
        Delegate, FrameResult, Model, ModelKind, ModelLoader, ModelLoaders, Orchestrator,
        RunningMode,
    },
    resolution::Resolution,
    scheduler::{FrameLoop, FrameObserver, FrameSource, ManualClock, StatsSnapshot, TickOutcome},
    video::stream::{CaptureDevice, StreamManager, VideoSink},
};

struct StubObjectModel;

impl Model for StubObjectModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Object
    }

    fn set_running_mode(&mut self, _mode: RunningMode) -> anyhow::Result<()> {
        Ok(())
    }

    fn infer(
        &mut self,
        _frame: &Image,
        _mode: RunningMode,
        out: &mut FrameResult,
    ) -> anyhow::Result<()> {
        out.objects.push(ObjectDetection {
            rect: Rect::from_top_left(8.0, 8.0, 24.0, 16.0),
            label: "person",
            confidence: 0.9,
        });
        Ok(())
    }
}

fn stub_loaders() -> ModelLoaders {
    fn ok() -> Box<dyn ModelLoader> {
        Box::new(|_delegate: Delegate| -> anyhow::Result<Box<dyn Model>> {
            Ok(Box::new(StubObjectModel))
        })
    }
    fn failing() -> Box<dyn ModelLoader> {
        Box::new(|_delegate: Delegate| -> anyhow::Result<Box<dyn Model>> {
            anyhow::bail!("not available in tests")
        })
    }
    ModelLoaders {
        object: ok(),
        face: failing(),
        pose: failing(),
        hand: failing(),
    }
}

struct TestPattern {
    resolution: Resolution,
}

impl CaptureDevice for TestPattern {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn read_frame(&mut self) -> anyhow::Result<Image> {
        thread::sleep(Duration::from_millis(2));
        Ok(Image::new(self.resolution.width(), self.resolution.height()))
    }
}

#[derive(Default)]
struct Recorder {
    frames: usize,
    commits: usize,
    last_stats: Option<StatsSnapshot>,
}

impl FrameObserver for Recorder {
    fn frame(&mut self, _frame: &Image, result: &FrameResult) {
        assert_eq!(result.count(ModelKind::Object), 1);
        assert_eq!(result.count(ModelKind::Face), 0);
        self.frames += 1;
    }

    fn stats(&mut self, stats: &StatsSnapshot, _result: &FrameResult) {
        self.commits += 1;
        self.last_stats = Some(*stats);
    }
}

fn wait_until_ready(sink: &mut VideoSink) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while sink.resolution().is_none() || sink.latest_frame().is_none() {
        assert!(Instant::now() < deadline, "stream never became ready");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn streaming_pipeline_end_to_end() {
    let mut orchestrator = Orchestrator::new(stub_loaders());
    assert!(orchestrator.wait_for_initialization());
    orchestrator.set_running_mode(RunningMode::Stream);

    let mut manager = StreamManager::new();
    let handle = manager.acquire_device(Box::new(TestPattern {
        resolution: Resolution::new(64, 48),
    }));
    let mut sink = VideoSink::new();
    manager.bind(&handle, &sink);
    wait_until_ready(&mut sink);

    let clock = ManualClock::new();
    let mut frame_loop = FrameLoop::with_clock(clock.clone());
    let mut recorder = Recorder::default();

    // Ticks spaced wider than the throttle window: every tick processes, every tick commits.
    for i in 0..4 {
        if i > 0 {
            clock.advance(Duration::from_millis(160));
        }
        let outcome = frame_loop.tick(&mut sink, &mut orchestrator, &mut recorder);
        assert_eq!(outcome, TickOutcome::Processed { committed: true });
    }
    // A tick right inside the throttle window still processes, but does not commit.
    clock.advance(Duration::from_millis(10));
    let outcome = frame_loop.tick(&mut sink, &mut orchestrator, &mut recorder);
    assert_eq!(outcome, TickOutcome::Processed { committed: false });

    assert_eq!(recorder.frames, 5);
    assert_eq!(recorder.commits, 4);
    let stats = recorder.last_stats.unwrap();
    assert_eq!(stats.objects, 1);
    assert_eq!(stats.faces, 0);

    // Releasing the stream while the loop is "running" pushes ticks into the not-ready branch
    // instead of faulting.
    manager.release(&handle);
    let outcome = frame_loop.tick(&mut sink, &mut orchestrator, &mut recorder);
    assert_eq!(outcome, TickOutcome::SourceNotReady);
    assert_eq!(recorder.frames, 5);

    // Stopping twice is a no-op both times.
    let stop = frame_loop.stop_handle();
    stop.stop();
    stop.stop();
    assert!(stop.is_stopped());
}

#[test]
fn overlay_and_export_from_detection_results() {
    let mut orchestrator = Orchestrator::new(stub_loaders());
    assert!(orchestrator.wait_for_initialization());

    let frame = Image::new(64, 48);
    let result = orchestrator.detect(&frame, RunningMode::SingleImage);
    assert_eq!(result.count(ModelKind::Object), 1);

    // Overlay canvas at double the source size; export back at source resolution.
    let mut canvas = Image::new(128, 96);
    overlay::draw(
        &mut canvas,
        &result,
        frame.resolution(),
        &OverlayOptions::default(),
        None,
    );

    let blob = overlay::capture_composite(&frame, &canvas, 42).unwrap();
    assert_eq!(blob.filename, "capture-42.png");
    assert_eq!(&blob.data[..8], b"\x89PNG\r\n\x1a\n");
}

#[test]
fn history_records_noteworthy_detections() {
    let mut history = DetectionHistory::new();
    for i in 0..HISTORY_CAPACITY + 10 {
        history.record(ModelKind::Object, format!("obj-{i}"), Some(0.5));
    }
    assert_eq!(history.len(), HISTORY_CAPACITY);
    assert_eq!(history.newest().unwrap().label, "obj-59");
    assert!(history.to_json().unwrap().contains("obj-59"));

    history.clear();
    assert!(history.is_empty());
}
