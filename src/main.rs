//! Realtime perception demo.
//!
//! Without arguments, opens the first supported webcam and runs the streaming pipeline until the
//! process is terminated, logging throttled stats and keeping a detection history. With an image
//! path as the only argument, runs the one-shot analysis path against that image instead and
//! writes the annotated composite next to the current directory.

use std::collections::HashSet;
use std::env;

use percept::{
    history::DetectionHistory,
    image::Image,
    overlay::{self, OverlayOptions},
    perception::{
        AnalysisOutcome, AnalysisTask, ModelKind, ModelPaths, Orchestrator, RunningMode,
    },
    resolution::Resolution,
    scheduler::{
        FrameLoop, FrameObserver, IntervalTicker, StatsSnapshot,
    },
    timer::FpsCounter,
    video::stream::{StreamConstraints, StreamManager, VideoSink},
};

use percept::perception::FrameResult;

const MODEL_DIR: &str = "models";

fn main() -> anyhow::Result<()> {
    percept::init_logger!();

    let mut orchestrator = Orchestrator::with_model_paths(ModelPaths::from_dir(MODEL_DIR));
    orchestrator.initialize();

    match env::args().nth(1) {
        Some(path) => analyze_image(&mut orchestrator, &path),
        None => run_realtime(&mut orchestrator),
    }
}

fn analyze_image(orchestrator: &mut Orchestrator, path: &str) -> anyhow::Result<()> {
    if !orchestrator.wait_for_initialization() {
        anyhow::bail!("no perception model could be loaded; check the {MODEL_DIR}/ directory");
    }

    let image = Image::load(path)?;

    for task in [
        AnalysisTask::Objects,
        AnalysisTask::Faces,
        AnalysisTask::Poses,
        AnalysisTask::Hands,
    ] {
        match orchestrator.analyze(&image, task) {
            AnalysisOutcome::Objects(objects) => {
                for obj in &objects {
                    log::info!("object: {} ({:.0}%)", obj.label, obj.confidence * 100.0);
                }
            }
            AnalysisOutcome::Faces(faces) => log::info!("{} face(s)", faces.len()),
            AnalysisOutcome::Poses(poses) => log::info!("{} pose(s)", poses.len()),
            AnalysisOutcome::Hands(hands) => log::info!("{} hand(s)", hands.len()),
            AnalysisOutcome::Unavailable(kind) => {
                log::warn!("{kind} capability unavailable on this host")
            }
        }
    }

    // Render the full annotated composite at source resolution.
    let result = orchestrator.detect(&image, RunningMode::SingleImage);
    let mut canvas = Image::new(image.width(), image.height());
    overlay::draw(
        &mut canvas,
        &result,
        image.resolution(),
        &OverlayOptions::default(),
        None,
    );
    let blob = overlay::capture_composite(&image, &canvas, result.timestamp.as_millis() as u64)?;
    std::fs::write(&blob.filename, &blob.data)?;
    log::info!("wrote {}", blob.filename);
    Ok(())
}

fn run_realtime(orchestrator: &mut Orchestrator) -> anyhow::Result<()> {
    let mut manager = StreamManager::new();
    let handle = manager.acquire(
        &StreamConstraints::default()
            .resolution(Resolution::RES_720P)
            .fps(30),
    )?;
    let mut sink = VideoSink::new();
    manager.bind(&handle, &sink);

    if !orchestrator.wait_for_initialization() {
        manager.release(&handle);
        anyhow::bail!("no perception model could be loaded; check the {MODEL_DIR}/ directory");
    }
    for kind in ModelKind::ALL {
        log::info!("{kind} model: {:?}", orchestrator.load_state(kind));
    }
    orchestrator.set_running_mode(RunningMode::Stream);

    let mut app = App {
        canvas: Image::new(960, 540),
        options: OverlayOptions::default(),
        history: DetectionHistory::new(),
        fps: FpsCounter::new("pipeline"),
        seen_labels: HashSet::new(),
        latest_stats: None,
    };

    let mut frame_loop = FrameLoop::new();
    let mut ticker = IntervalTicker::from_hz(60);
    frame_loop.run(&mut ticker, &mut sink, orchestrator, &mut app);

    manager.release(&handle);
    Ok(())
}

struct App {
    canvas: Image,
    options: OverlayOptions,
    history: DetectionHistory,
    fps: FpsCounter,
    seen_labels: HashSet<&'static str>,
    latest_stats: Option<StatsSnapshot>,
}

impl FrameObserver for App {
    fn frame(&mut self, frame: &Image, result: &FrameResult) {
        // Newly appearing object labels are the noteworthy events worth logging.
        for obj in &result.objects {
            if self.seen_labels.insert(obj.label) {
                self.history
                    .record(ModelKind::Object, obj.label, Some(obj.confidence));
                log::info!("new object: {} ({:.0}%)", obj.label, obj.confidence * 100.0);
            }
        }

        // The overlay canvas is sized independently of the source; the renderer projects
        // accordingly. Stats are only as fresh as the most recent throttled commit.
        overlay::draw(
            &mut self.canvas,
            result,
            frame.resolution(),
            &self.options,
            self.latest_stats.as_ref(),
        );
        self.fps.tick();
    }

    fn stats(&mut self, stats: &StatsSnapshot, _result: &FrameResult) {
        self.latest_stats = Some(*stats);
        log::debug!(
            "{:.1} FPS, {} obj / {} face / {} pose / {} hand",
            stats.fps,
            stats.objects,
            stats.faces,
            stats.poses,
            stats.hands,
        );
    }
}
