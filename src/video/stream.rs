//! Stream lifecycle management.
//!
//! The [`StreamManager`] owns the exclusive camera resource. Acquiring yields a generation-tagged
//! [`StreamHandle`]; binding a handle to a [`VideoSink`] starts a capture worker that publishes
//! frames into the sink; releasing stops the worker (and with it every underlying hardware
//! track) and clears the sink binding. Consumers of the frames (the scheduler) only ever hold the
//! sink, never the stream itself.
//!
//! Releasing is idempotent, and a stale handle can never stop a newer stream: every acquisition
//! bumps the generation counter and release requests against an older generation are ignored.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use thiserror::Error;

use crate::{
    image::Image,
    resolution::Resolution,
    scheduler::FrameSource,
    timer::FpsCounter,
    video::webcam::Webcam,
};

/// Typed reasons for a failed stream acquisition.
///
/// These are surfaced to the UI as user-actionable messages; the pipeline stays idle afterwards
/// and a manual retry is the only recovery path.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The operating system refused access to the capture device.
    #[error("camera access denied: {0}")]
    PermissionDenied(String),
    /// No usable capture device is present.
    #[error("no usable capture device: {0}")]
    DeviceUnavailable(String),
}

/// Camera facing preference, matched against device names as a soft hint.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    #[default]
    Any,
    /// Prefer a user-facing ("front") camera.
    User,
    /// Prefer an environment-facing ("back") camera.
    Environment,
}

impl Facing {
    pub(crate) fn matches(&self, device_name: &str) -> bool {
        match self {
            Facing::Any => true,
            Facing::User => device_name.contains("front") || device_name.contains("user"),
            Facing::Environment => {
                device_name.contains("back")
                    || device_name.contains("rear")
                    || device_name.contains("environment")
            }
        }
    }
}

/// Simple constraints for stream acquisition.
///
/// All constraints are hints: the manager picks the closest supported configuration rather than
/// failing when a hint cannot be satisfied exactly.
#[derive(Debug, Default, Clone)]
pub struct StreamConstraints {
    pub(crate) resolution: Option<Resolution>,
    pub(crate) fps: Option<u32>,
    pub(crate) facing: Facing,
    pub(crate) device_name: Option<String>,
}

impl StreamConstraints {
    /// Sets the desired image resolution.
    #[inline]
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    /// Sets the desired frame rate.
    #[inline]
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = Some(fps);
        self
    }

    /// Sets the camera facing preference.
    #[inline]
    pub fn facing(mut self, facing: Facing) -> Self {
        self.facing = facing;
        self
    }

    /// Requires a specific capture device by name.
    #[inline]
    pub fn device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }
}

/// A source of raw video frames (a webcam, or a synthetic device in tests).
pub trait CaptureDevice: Send + 'static {
    /// The native resolution frames will be delivered in.
    fn resolution(&self) -> Resolution;

    /// Reads the next frame, blocking until one is available.
    fn read_frame(&mut self) -> anyhow::Result<Image>;
}

/// The binding point between a stream and its consumers.
///
/// Holds the latest published frame. Cheap to clone; all clones share the same state. When the
/// backing stream is released the sink is cleared and reports no resolution, which pushes the
/// frame loop into its "source not ready" branch instead of faulting.
#[derive(Debug, Default, Clone)]
pub struct VideoSink {
    shared: Arc<Mutex<SinkState>>,
}

#[derive(Debug, Default)]
struct SinkState {
    resolution: Option<Resolution>,
    frame: Option<Image>,
}

impl VideoSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn set_resolution(&self, resolution: Resolution) {
        self.shared.lock().unwrap().resolution = Some(resolution);
    }

    fn publish(&self, frame: Image) {
        let mut state = self.shared.lock().unwrap();
        state.resolution = Some(frame.resolution());
        state.frame = Some(frame);
    }

    fn clear(&self) {
        let mut state = self.shared.lock().unwrap();
        state.resolution = None;
        state.frame = None;
    }
}

impl FrameSource for VideoSink {
    fn resolution(&self) -> Option<Resolution> {
        self.shared.lock().unwrap().resolution
    }

    fn latest_frame(&mut self) -> Option<Image> {
        self.shared.lock().unwrap().frame.clone()
    }
}

/// An exclusive, revocable reference to an acquired stream.
///
/// The handle is a token: all operations go through the owning [`StreamManager`]. Operations with
/// a handle from an earlier acquisition are ignored.
#[derive(Debug)]
pub struct StreamHandle {
    generation: u64,
}

struct ActiveStream {
    generation: u64,
    stop: Arc<AtomicBool>,
    device: Option<Box<dyn CaptureDevice>>,
    worker: Option<JoinHandle<()>>,
    sink: Option<VideoSink>,
}

/// Owns at most one active camera stream.
///
/// Streams are created on explicit acquisition and destroyed on explicit release or manager
/// teardown, whichever comes first; there is no implicit creation.
#[derive(Default)]
pub struct StreamManager {
    active: Option<ActiveStream>,
    next_generation: u64,
}

impl StreamManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires a hardware camera stream matching `constraints`.
    ///
    /// Failure reasons are typed so the UI can branch on them; see [`StreamError`]. Acquiring
    /// while a stream is active releases the previous stream first, keeping the "at most one
    /// active stream" invariant.
    pub fn acquire(
        &mut self,
        constraints: &StreamConstraints,
    ) -> Result<StreamHandle, StreamError> {
        let webcam = Webcam::open(constraints)?;
        Ok(self.acquire_device(Box::new(webcam)))
    }

    /// Acquires a stream backed by an arbitrary [`CaptureDevice`].
    ///
    /// This is how synthetic and non-hardware sources enter the pipeline.
    pub fn acquire_device(&mut self, device: Box<dyn CaptureDevice>) -> StreamHandle {
        self.release_active();

        self.next_generation += 1;
        let generation = self.next_generation;
        self.active = Some(ActiveStream {
            generation,
            stop: Arc::new(AtomicBool::new(false)),
            device: Some(device),
            worker: None,
            sink: None,
        });

        log::debug!("acquired stream (generation {generation})");
        StreamHandle { generation }
    }

    /// Returns whether a stream is currently active.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Binds the stream to a sink and starts publishing frames into it.
    ///
    /// Binding a stale or already-bound handle is a no-op.
    pub fn bind(&mut self, handle: &StreamHandle, sink: &VideoSink) {
        let Some(active) = &mut self.active else {
            log::warn!("bind with no active stream ignored");
            return;
        };
        if active.generation != handle.generation {
            log::warn!("bind with stale stream handle ignored");
            return;
        }
        let Some(mut device) = active.device.take() else {
            log::warn!("stream is already bound");
            return;
        };

        sink.set_resolution(device.resolution());

        let stop = active.stop.clone();
        let worker_sink = sink.clone();
        let worker = thread::Builder::new()
            .name("capture".into())
            .spawn(move || {
                let mut fps = FpsCounter::new("capture");
                while !stop.load(Ordering::Relaxed) {
                    match device.read_frame() {
                        Ok(frame) => {
                            worker_sink.publish(frame);
                            fps.tick();
                        }
                        Err(e) => {
                            log::error!("capture error: {e:#}");
                            thread::sleep(Duration::from_millis(50));
                        }
                    }
                }
            });

        match worker {
            Ok(join) => {
                active.worker = Some(join);
                active.sink = Some(sink.clone());
            }
            Err(e) => {
                log::error!("failed to spawn capture worker: {e}");
                sink.clear();
            }
        }
    }

    /// Stops the stream the handle refers to.
    ///
    /// Stops the capture worker (all underlying tracks) and clears the sink binding. Safe to call
    /// any number of times; a handle from an earlier acquisition never stops a newer stream.
    pub fn release(&mut self, handle: &StreamHandle) {
        match &self.active {
            Some(active) if active.generation == handle.generation => self.release_active(),
            _ => {}
        }
    }

    fn release_active(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };

        active.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = active.worker.take() {
            if worker.join().is_err() {
                log::error!("capture worker panicked");
            }
        }
        if let Some(sink) = active.sink.take() {
            sink.clear();
        }
        log::debug!("released stream (generation {})", active.generation);
    }
}

/// Component teardown releases any stream that is still active.
impl Drop for StreamManager {
    fn drop(&mut self) {
        self.release_active();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Instant;

    struct TestDevice {
        resolution: Resolution,
    }

    impl CaptureDevice for TestDevice {
        fn resolution(&self) -> Resolution {
            self.resolution
        }

        fn read_frame(&mut self) -> anyhow::Result<Image> {
            thread::sleep(Duration::from_millis(2));
            Ok(Image::new(self.resolution.width(), self.resolution.height()))
        }
    }

    fn test_device() -> Box<dyn CaptureDevice> {
        Box::new(TestDevice {
            resolution: Resolution::new(64, 48),
        })
    }

    fn wait_for_frame(sink: &mut VideoSink) -> Image {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(frame) = sink.latest_frame() {
                return frame;
            }
            assert!(Instant::now() < deadline, "no frame published in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn bind_publishes_frames_and_release_clears_sink() {
        let mut manager = StreamManager::new();
        let handle = manager.acquire_device(test_device());

        let mut sink = VideoSink::new();
        manager.bind(&handle, &sink);
        assert_eq!(sink.resolution(), Some(Resolution::new(64, 48)));

        let frame = wait_for_frame(&mut sink);
        assert_eq!(frame.resolution(), Resolution::new(64, 48));

        manager.release(&handle);
        assert!(!manager.is_active());
        assert_eq!(sink.resolution(), None);
        assert!(sink.latest_frame().is_none());
    }

    #[test]
    fn release_is_idempotent() {
        let mut manager = StreamManager::new();
        let handle = manager.acquire_device(test_device());
        manager.release(&handle);
        manager.release(&handle);
        assert!(!manager.is_active());
    }

    #[test]
    fn stale_handle_does_not_stop_newer_stream() {
        let mut manager = StreamManager::new();
        let old_handle = manager.acquire_device(test_device());
        manager.release(&old_handle);

        let new_handle = manager.acquire_device(test_device());
        let mut sink = VideoSink::new();
        manager.bind(&new_handle, &sink);

        // The stale handle must not affect the newer stream.
        manager.release(&old_handle);
        assert!(manager.is_active());
        wait_for_frame(&mut sink);

        manager.release(&new_handle);
        assert!(!manager.is_active());
    }

    #[test]
    fn acquiring_replaces_the_previous_stream() {
        let mut manager = StreamManager::new();
        let first = manager.acquire_device(test_device());
        let mut first_sink = VideoSink::new();
        manager.bind(&first, &first_sink);
        wait_for_frame(&mut first_sink);

        let _second = manager.acquire_device(test_device());
        // The first stream was stopped and its sink cleared.
        assert!(first_sink.latest_frame().is_none());
        assert!(manager.is_active());
    }

    #[test]
    fn stale_bind_is_ignored() {
        let mut manager = StreamManager::new();
        let old_handle = manager.acquire_device(test_device());
        let _new_handle = manager.acquire_device(test_device());

        let sink = VideoSink::new();
        manager.bind(&old_handle, &sink);
        assert_eq!(FrameSource::resolution(&sink), None);
    }
}
