//! Perception model orchestration.
//!
//! The [`Orchestrator`] owns one slot per perception model kind (object, face, pose, hand),
//! tracks each slot's load state, and merges per-model outputs into a [`FrameResult`]. Models are
//! loaded concurrently in the background; each load attempts the GPU delegate first and falls
//! back to the CPU before the slot is marked [`LoadState::Failed`]. A failed model never
//! participates in detection, and never blocks its peers.
//!
//! The same model instances serve both the continuous streaming path ([`Orchestrator::detect`])
//! and one-shot static-image analysis ([`Orchestrator::analyze`]).

use std::{
    fmt,
    mem,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use pawawwewism::{promise, PromiseHandle};
use serde::Serialize;

use crate::{
    face::{FaceDetection, FaceModel},
    hand::{HandDetection, HandModel},
    image::Image,
    object::{ObjectDetection, ObjectModel},
    pose::{PoseDetection, PoseModel},
    scheduler,
};

pub use crate::nn::Delegate;

/// The four perception modalities the pipeline can run per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ModelKind {
    Object,
    Face,
    Pose,
    Hand,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::Object,
        ModelKind::Face,
        ModelKind::Pose,
        ModelKind::Hand,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Object => "object",
            ModelKind::Face => "face",
            ModelKind::Pose => "pose",
            ModelKind::Hand => "hand",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Global inference mode shared by all loaded models.
///
/// In [`RunningMode::Stream`] the models assume that subsequent inputs are consecutive frames of
/// one video feed and enable temporal smoothing; in [`RunningMode::SingleImage`] every input is
/// treated as unrelated and temporal state is discarded. The mode changes internal model state
/// only, never the shape of the produced results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunningMode {
    SingleImage,
    Stream,
}

/// Load state of one model slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Ready,
    Failed,
}

/// All detections produced for one sampled frame.
///
/// Ephemeral: rebuilt for every processed frame and not retained by the pipeline.
#[derive(Debug, Clone)]
pub struct FrameResult {
    /// Time the frame was processed, relative to orchestrator construction.
    pub timestamp: Duration,
    pub objects: Vec<ObjectDetection>,
    pub faces: Vec<FaceDetection>,
    pub poses: Vec<PoseDetection>,
    pub hands: Vec<HandDetection>,
}

impl FrameResult {
    pub fn new(timestamp: Duration) -> Self {
        Self {
            timestamp,
            objects: Vec::new(),
            faces: Vec::new(),
            poses: Vec::new(),
            hands: Vec::new(),
        }
    }

    /// Returns the number of detections of the given kind.
    pub fn count(&self, kind: ModelKind) -> usize {
        match kind {
            ModelKind::Object => self.objects.len(),
            ModelKind::Face => self.faces.len(),
            ModelKind::Pose => self.poses.len(),
            ModelKind::Hand => self.hands.len(),
        }
    }

    /// Returns the total number of detections across all kinds.
    pub fn total(&self) -> usize {
        ModelKind::ALL.iter().map(|kind| self.count(*kind)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// A loaded perception model.
///
/// Implementations extract their detections into the per-kind list of the passed [`FrameResult`];
/// kinds they do not handle are left untouched.
pub trait Model: Send {
    fn kind(&self) -> ModelKind;

    /// Switches the model between single-image and continuous-stream operation.
    ///
    /// Failures are reported to the caller, which keeps the model in its previous mode.
    fn set_running_mode(&mut self, mode: RunningMode) -> anyhow::Result<()>;

    /// Runs the model against `frame` and appends its detections to `out`.
    fn infer(
        &mut self,
        frame: &Image,
        mode: RunningMode,
        out: &mut FrameResult,
    ) -> anyhow::Result<()>;
}

/// Constructs a [`Model`] for a given compute delegate.
///
/// The orchestrator invokes a loader up to twice per slot: once with [`Delegate::Gpu`], and, if
/// that fails, once more with [`Delegate::Cpu`].
pub trait ModelLoader: Send + 'static {
    fn load(&self, delegate: Delegate) -> anyhow::Result<Box<dyn Model>>;
}

impl<F> ModelLoader for F
where
    F: Fn(Delegate) -> anyhow::Result<Box<dyn Model>> + Send + 'static,
{
    fn load(&self, delegate: Delegate) -> anyhow::Result<Box<dyn Model>> {
        self(delegate)
    }
}

/// One loader per model kind.
pub struct ModelLoaders {
    pub object: Box<dyn ModelLoader>,
    pub face: Box<dyn ModelLoader>,
    pub pose: Box<dyn ModelLoader>,
    pub hand: Box<dyn ModelLoader>,
}

/// Filesystem locations of the ONNX model files.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub object: PathBuf,
    pub face: PathBuf,
    pub pose: PathBuf,
    pub hand: PathBuf,
}

impl ModelPaths {
    /// Uses the conventional model file names inside `dir`.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            object: dir.join("yolov8n.onnx"),
            face: dir.join("face_detection_short_range.onnx"),
            pose: dir.join("pose_landmark_lite.onnx"),
            hand: dir.join("hand_landmark_lite.onnx"),
        }
    }
}

struct Slot {
    kind: ModelKind,
    state: Mutex<SlotState>,
}

enum SlotState {
    Unloaded(Box<dyn ModelLoader>),
    Loading,
    Ready(Box<dyn Model>),
    Failed,
}

impl SlotState {
    fn load_state(&self) -> LoadState {
        match self {
            SlotState::Unloaded(_) => LoadState::Unloaded,
            SlotState::Loading => LoadState::Loading,
            SlotState::Ready(_) => LoadState::Ready,
            SlotState::Failed => LoadState::Failed,
        }
    }
}

enum InitState {
    Idle,
    Pending(Vec<PromiseHandle<bool>>),
    Settled(bool),
}

/// Owns the perception models and their shared running mode.
///
/// Constructed once and passed by reference to both the streaming path and the one-shot analysis
/// path, so all callers reuse the same loaded model instances.
pub struct Orchestrator {
    slots: Vec<Arc<Slot>>,
    init: InitState,
    mode: RunningMode,
    epoch: Instant,
}

impl Orchestrator {
    /// Creates an orchestrator with one model slot per [`ModelKind`].
    ///
    /// No loading happens until [`Orchestrator::initialize`] is called.
    pub fn new(loaders: ModelLoaders) -> Self {
        let ModelLoaders {
            object,
            face,
            pose,
            hand,
        } = loaders;
        let slot = |kind, loader| {
            Arc::new(Slot {
                kind,
                state: Mutex::new(SlotState::Unloaded(loader)),
            })
        };
        Self {
            slots: vec![
                slot(ModelKind::Object, object),
                slot(ModelKind::Face, face),
                slot(ModelKind::Pose, pose),
                slot(ModelKind::Hand, hand),
            ],
            init: InitState::Idle,
            mode: RunningMode::SingleImage,
            epoch: Instant::now(),
        }
    }

    /// Creates an orchestrator that loads the bundled network glue from `paths`.
    pub fn with_model_paths(paths: ModelPaths) -> Self {
        let ModelPaths {
            object,
            face,
            pose,
            hand,
        } = paths;
        Self::new(ModelLoaders {
            object: Box::new(move |delegate: Delegate| -> anyhow::Result<Box<dyn Model>> {
                Ok(Box::new(ObjectModel::load(&object, delegate)?))
            }),
            face: Box::new(move |delegate: Delegate| -> anyhow::Result<Box<dyn Model>> {
                Ok(Box::new(FaceModel::load(&face, delegate)?))
            }),
            pose: Box::new(move |delegate: Delegate| -> anyhow::Result<Box<dyn Model>> {
                Ok(Box::new(PoseModel::load(&pose, delegate)?))
            }),
            hand: Box::new(move |delegate: Delegate| -> anyhow::Result<Box<dyn Model>> {
                Ok(Box::new(HandModel::load(&hand, delegate)?))
            }),
        })
    }

    /// Starts loading every model concurrently in the background.
    ///
    /// Calling this more than once has no effect.
    pub fn initialize(&mut self) {
        if !matches!(self.init, InitState::Idle) {
            return;
        }

        let mut handles = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let loader = {
                let mut state = slot.state.lock().unwrap();
                match mem::replace(&mut *state, SlotState::Loading) {
                    SlotState::Unloaded(loader) => loader,
                    other => {
                        *state = other;
                        continue;
                    }
                }
            };

            let (result, handle) = promise();
            let worker_slot = slot.clone();
            let spawned = thread::Builder::new()
                .name(format!("{} loader", slot.kind))
                .spawn(move || {
                    let outcome = load_with_fallback(worker_slot.kind, &*loader);
                    let mut state = worker_slot.state.lock().unwrap();
                    match outcome {
                        Ok(model) => {
                            *state = SlotState::Ready(model);
                            result.fulfill(true);
                        }
                        Err(e) => {
                            log::warn!("failed to load {} model: {e:#}", worker_slot.kind);
                            *state = SlotState::Failed;
                            result.fulfill(false);
                        }
                    }
                });

            match spawned {
                Ok(_) => handles.push(handle),
                Err(e) => {
                    log::warn!("failed to spawn loader for {} model: {e}", slot.kind);
                    *slot.state.lock().unwrap() = SlotState::Failed;
                }
            }
        }

        self.init = InitState::Pending(handles);
    }

    /// Blocks until every model load has settled.
    ///
    /// Returns `true` if at least one model is [`LoadState::Ready`]. Partial availability is
    /// acceptable; callers use the per-slot [`Orchestrator::load_state`] to inspect which
    /// capabilities are present. Invoking this repeatedly returns the settled result without
    /// blocking again. Calls [`Orchestrator::initialize`] first if that has not happened yet.
    pub fn wait_for_initialization(&mut self) -> bool {
        if matches!(self.init, InitState::Idle) {
            self.initialize();
        }

        match mem::replace(&mut self.init, InitState::Settled(false)) {
            InitState::Idle => unreachable!("initialize() leaves the idle state"),
            InitState::Pending(handles) => {
                let mut any_ready = false;
                for handle in handles {
                    if handle.block().unwrap_or(false) {
                        any_ready = true;
                    }
                }
                self.init = InitState::Settled(any_ready);
                any_ready
            }
            InitState::Settled(ready) => {
                self.init = InitState::Settled(ready);
                ready
            }
        }
    }

    /// Returns whether at least one model is ready for detection, without blocking.
    pub fn is_ready(&self) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.state.lock().unwrap().load_state() == LoadState::Ready)
    }

    /// Returns the load state of the given model slot.
    pub fn load_state(&self, kind: ModelKind) -> LoadState {
        self.slots
            .iter()
            .find(|slot| slot.kind == kind)
            .map(|slot| slot.state.lock().unwrap().load_state())
            .unwrap_or(LoadState::Unloaded)
    }

    /// Returns the running mode most recently requested by a caller.
    pub fn running_mode(&self) -> RunningMode {
        self.mode
    }

    /// Applies `mode` to every ready model.
    ///
    /// This is a no-op (not an error) while initialization has not completed. A model that fails
    /// to switch keeps its previous mode; the failure is logged and the remaining models are
    /// still switched.
    pub fn set_running_mode(&mut self, mode: RunningMode) {
        self.mode = mode;
        for slot in &self.slots {
            let mut state = slot.state.lock().unwrap();
            if let SlotState::Ready(model) = &mut *state {
                if let Err(e) = model.set_running_mode(mode) {
                    log::warn!(
                        "{} model failed to switch to {mode:?}, continuing in previous mode: {e:#}",
                        slot.kind
                    );
                }
            }
        }
    }

    /// Runs every ready model against `frame` and merges the outputs.
    ///
    /// Models that are still loading, failed to load, or fail on this particular frame contribute
    /// an empty list for their kind; this method never fails as a whole.
    pub fn detect(&mut self, frame: &Image, mode: RunningMode) -> FrameResult {
        self.mode = mode;
        let mut result = FrameResult::new(self.epoch.elapsed());
        for slot in &self.slots {
            let mut state = slot.state.lock().unwrap();
            if let SlotState::Ready(model) = &mut *state {
                if let Err(e) = model.infer(frame, mode, &mut result) {
                    log::warn!("{} model produced no detections: {e:#}", slot.kind);
                }
            }
        }
        result
    }

    /// Runs a single one-shot analysis task against a static image.
    ///
    /// Reuses the already-loaded model instances. If the required model is not ready, an explicit
    /// [`AnalysisOutcome::Unavailable`] is returned instead of an error.
    pub fn analyze(&mut self, image: &Image, task: AnalysisTask) -> AnalysisOutcome {
        let kind = task.kind();
        let slot = match self.slots.iter().find(|slot| slot.kind == kind) {
            Some(slot) => slot.clone(),
            None => return AnalysisOutcome::Unavailable(kind),
        };

        let mut result = FrameResult::new(self.epoch.elapsed());
        {
            let mut state = slot.state.lock().unwrap();
            let SlotState::Ready(model) = &mut *state else {
                log::debug!("{kind} capability unavailable for analysis");
                return AnalysisOutcome::Unavailable(kind);
            };
            if let Err(e) = model.infer(image, RunningMode::SingleImage, &mut result) {
                log::warn!("{kind} analysis produced no detections: {e:#}");
            }
        }

        match task {
            AnalysisTask::Objects => AnalysisOutcome::Objects(result.objects),
            AnalysisTask::Faces => AnalysisOutcome::Faces(result.faces),
            AnalysisTask::Poses => AnalysisOutcome::Poses(result.poses),
            AnalysisTask::Hands => AnalysisOutcome::Hands(result.hands),
        }
    }
}

impl scheduler::Detector for Orchestrator {
    fn is_ready(&self) -> bool {
        Orchestrator::is_ready(self)
    }

    fn detect(&mut self, frame: &Image, mode: RunningMode) -> FrameResult {
        Orchestrator::detect(self, frame, mode)
    }
}

fn load_with_fallback(kind: ModelKind, loader: &dyn ModelLoader) -> anyhow::Result<Box<dyn Model>> {
    match loader.load(Delegate::Gpu) {
        Ok(model) => {
            log::debug!("{kind} model loaded with GPU delegate");
            Ok(model)
        }
        Err(gpu_err) => {
            log::debug!("{kind} model: GPU delegate unavailable ({gpu_err:#}), retrying on CPU");
            let model = loader.load(Delegate::Cpu)?;
            log::debug!("{kind} model loaded with CPU delegate");
            Ok(model)
        }
    }
}

/// A one-shot static-image task; see [`Orchestrator::analyze`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisTask {
    Objects,
    Faces,
    Poses,
    Hands,
}

impl AnalysisTask {
    pub fn kind(&self) -> ModelKind {
        match self {
            AnalysisTask::Objects => ModelKind::Object,
            AnalysisTask::Faces => ModelKind::Face,
            AnalysisTask::Poses => ModelKind::Pose,
            AnalysisTask::Hands => ModelKind::Hand,
        }
    }
}

/// The result of a one-shot analysis task.
#[derive(Debug, Clone)]
pub enum AnalysisOutcome {
    Objects(Vec<ObjectDetection>),
    Faces(Vec<FaceDetection>),
    Poses(Vec<PoseDetection>),
    Hands(Vec<HandDetection>),
    /// The model backing the requested capability is not available on this host.
    Unavailable(ModelKind),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Rect;

    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubModel {
        kind: ModelKind,
        fail_mode_switch: bool,
        fail_infer: bool,
    }

    impl Model for StubModel {
        fn kind(&self) -> ModelKind {
            self.kind
        }

        fn set_running_mode(&mut self, _mode: RunningMode) -> anyhow::Result<()> {
            if self.fail_mode_switch {
                anyhow::bail!("mode switch unsupported");
            }
            Ok(())
        }

        fn infer(
            &mut self,
            _frame: &Image,
            _mode: RunningMode,
            out: &mut FrameResult,
        ) -> anyhow::Result<()> {
            if self.fail_infer {
                anyhow::bail!("inference error");
            }
            match self.kind {
                ModelKind::Object => out.objects.push(ObjectDetection {
                    rect: Rect::from_top_left(1.0, 2.0, 3.0, 4.0),
                    label: "person",
                    confidence: 0.9,
                }),
                _ => {}
            }
            Ok(())
        }
    }

    fn ok_loader(kind: ModelKind) -> Box<dyn ModelLoader> {
        Box::new(move |_delegate: Delegate| -> anyhow::Result<Box<dyn Model>> {
            Ok(Box::new(StubModel {
                kind,
                fail_mode_switch: false,
                fail_infer: false,
            }))
        })
    }

    fn failing_loader() -> Box<dyn ModelLoader> {
        Box::new(|_delegate: Delegate| -> anyhow::Result<Box<dyn Model>> {
            anyhow::bail!("model file missing")
        })
    }

    fn orchestrator_with_object_only() -> Orchestrator {
        let mut orchestrator = Orchestrator::new(ModelLoaders {
            object: ok_loader(ModelKind::Object),
            face: failing_loader(),
            pose: failing_loader(),
            hand: failing_loader(),
        });
        assert!(orchestrator.wait_for_initialization());
        orchestrator
    }

    #[test]
    fn partial_availability_yields_empty_lists() {
        let mut orchestrator = orchestrator_with_object_only();

        assert_eq!(orchestrator.load_state(ModelKind::Object), LoadState::Ready);
        assert_eq!(orchestrator.load_state(ModelKind::Face), LoadState::Failed);
        assert_eq!(orchestrator.load_state(ModelKind::Pose), LoadState::Failed);
        assert_eq!(orchestrator.load_state(ModelKind::Hand), LoadState::Failed);

        let frame = Image::new(8, 8);
        let result = orchestrator.detect(&frame, RunningMode::Stream);
        assert_eq!(result.count(ModelKind::Object), 1);
        assert_eq!(result.count(ModelKind::Face), 0);
        assert_eq!(result.count(ModelKind::Pose), 0);
        assert_eq!(result.count(ModelKind::Hand), 0);
    }

    #[test]
    fn wait_for_initialization_is_idempotent() {
        let mut orchestrator = orchestrator_with_object_only();
        assert!(orchestrator.wait_for_initialization());
        assert!(orchestrator.wait_for_initialization());
    }

    #[test]
    fn total_failure_reports_not_ready() {
        let mut orchestrator = Orchestrator::new(ModelLoaders {
            object: failing_loader(),
            face: failing_loader(),
            pose: failing_loader(),
            hand: failing_loader(),
        });
        assert!(!orchestrator.wait_for_initialization());
        assert!(!orchestrator.is_ready());

        // Detection must still return a (fully empty) result.
        let result = orchestrator.detect(&Image::new(4, 4), RunningMode::Stream);
        assert!(result.is_empty());
    }

    #[test]
    fn gpu_failure_retries_on_cpu() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let recorded = attempts.clone();
        let loader = move |delegate: Delegate| -> anyhow::Result<Box<dyn Model>> {
            recorded.fetch_add(1, Ordering::SeqCst);
            match delegate {
                Delegate::Gpu => anyhow::bail!("no adapter"),
                Delegate::Cpu => Ok(Box::new(StubModel {
                    kind: ModelKind::Object,
                    fail_mode_switch: false,
                    fail_infer: false,
                })),
            }
        };
        let mut orchestrator = Orchestrator::new(ModelLoaders {
            object: Box::new(loader),
            face: failing_loader(),
            pose: failing_loader(),
            hand: failing_loader(),
        });
        assert!(orchestrator.wait_for_initialization());
        assert_eq!(orchestrator.load_state(ModelKind::Object), LoadState::Ready);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn set_running_mode_before_initialize_is_a_noop() {
        let mut orchestrator = Orchestrator::new(ModelLoaders {
            object: ok_loader(ModelKind::Object),
            face: failing_loader(),
            pose: failing_loader(),
            hand: failing_loader(),
        });
        orchestrator.set_running_mode(RunningMode::Stream);
        assert_eq!(orchestrator.running_mode(), RunningMode::Stream);
        assert!(orchestrator.wait_for_initialization());
    }

    #[test]
    fn failed_mode_switch_is_logged_and_ignored() {
        let mut orchestrator = Orchestrator::new(ModelLoaders {
            object: Box::new(move |_delegate: Delegate| -> anyhow::Result<Box<dyn Model>> {
                Ok(Box::new(StubModel {
                    kind: ModelKind::Object,
                    fail_mode_switch: true,
                    fail_infer: false,
                }))
            }),
            face: failing_loader(),
            pose: failing_loader(),
            hand: failing_loader(),
        });
        assert!(orchestrator.wait_for_initialization());
        orchestrator.set_running_mode(RunningMode::Stream);
        // The model keeps working despite the failed switch.
        let result = orchestrator.detect(&Image::new(4, 4), RunningMode::Stream);
        assert_eq!(result.count(ModelKind::Object), 1);
    }

    #[test]
    fn per_frame_faults_degrade_to_empty() {
        let mut orchestrator = Orchestrator::new(ModelLoaders {
            object: Box::new(move |_delegate: Delegate| -> anyhow::Result<Box<dyn Model>> {
                Ok(Box::new(StubModel {
                    kind: ModelKind::Object,
                    fail_mode_switch: false,
                    fail_infer: true,
                }))
            }),
            face: failing_loader(),
            pose: failing_loader(),
            hand: failing_loader(),
        });
        assert!(orchestrator.wait_for_initialization());
        let result = orchestrator.detect(&Image::new(4, 4), RunningMode::Stream);
        assert!(result.is_empty());
    }

    #[test]
    fn analyze_substitutes_unavailable() {
        let mut orchestrator = orchestrator_with_object_only();

        match orchestrator.analyze(&Image::new(4, 4), AnalysisTask::Objects) {
            AnalysisOutcome::Objects(objects) => assert_eq!(objects.len(), 1),
            other => panic!("unexpected outcome: {other:?}"),
        }
        match orchestrator.analyze(&Image::new(4, 4), AnalysisTask::Poses) {
            AnalysisOutcome::Unavailable(ModelKind::Pose) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
