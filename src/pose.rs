//! Body pose landmark prediction.
//!
//! Glue for the pose landmarker networks: one person per frame, 33 named pose landmarks plus 6
//! auxiliary landmarks, each with visibility and presence scores.

use std::path::Path;

use anyhow::ensure;

use crate::{
    image::Image,
    landmark::{Landmark, LandmarkSmoother, Landmarks},
    nn::{Cnn, CnnInputShape, ColorMapper, Delegate, NeuralNetwork},
    num::sigmoid,
    perception::{FrameResult, Model, ModelKind, RunningMode},
    slice::SliceExt,
    timer::Timer,
};

/// Number of named pose landmarks (see [`LandmarkIdx`]).
pub const NUM_LANDMARKS: usize = 33;

/// Auxiliary landmarks predicted after the 33 named ones.
const NUM_AUX_LANDMARKS: usize = 6;

/// Names for the pose landmarks, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

/// The skeleton edges drawn by the overlay, over [`LandmarkIdx`] indices.
pub const CONNECTIVITY: &[(LandmarkIdx, LandmarkIdx)] = {
    use LandmarkIdx::*;
    &[
        (LeftShoulder, RightShoulder),
        (LeftShoulder, LeftElbow),
        (LeftElbow, LeftWrist),
        (RightShoulder, RightElbow),
        (RightElbow, RightWrist),
        (LeftShoulder, LeftHip),
        (LeftHip, RightHip),
        (LeftHip, LeftKnee),
        (LeftKnee, LeftAnkle),
        (LeftAnkle, LeftHeel),
        (LeftAnkle, LeftFootIndex),
        (RightShoulder, RightHip),
        (RightHip, RightKnee),
        (RightKnee, RightAnkle),
        (RightAnkle, RightHeel),
        (RightAnkle, RightFootIndex),
    ]
};

/// The anatomically significant landmarks that get text labels in the overlay.
pub const SIGNIFICANT: &[(LandmarkIdx, &str)] = {
    use LandmarkIdx::*;
    &[
        (Nose, "nose"),
        (LeftShoulder, "l.shoulder"),
        (RightShoulder, "r.shoulder"),
        (LeftElbow, "l.elbow"),
        (RightElbow, "r.elbow"),
        (LeftWrist, "l.wrist"),
        (RightWrist, "r.wrist"),
        (LeftHip, "l.hip"),
        (RightHip, "r.hip"),
        (LeftKnee, "l.knee"),
        (RightKnee, "r.knee"),
        (LeftAnkle, "l.ankle"),
        (RightAnkle, "r.ankle"),
    ]
};

/// A detected body pose in source-pixel coordinates.
#[derive(Debug, Clone)]
pub struct PoseDetection {
    landmarks: Landmarks,
    confidence: f32,
}

impl PoseDetection {
    /// Creates a pose detection from raw landmark data.
    ///
    /// `landmarks` must contain at least [`NUM_LANDMARKS`] entries in [`LandmarkIdx`] order.
    pub fn new(landmarks: Landmarks, confidence: f32) -> Self {
        assert!(landmarks.len() >= NUM_LANDMARKS);
        Self {
            landmarks,
            confidence,
        }
    }

    /// Returns the 33 named pose landmarks, in [`LandmarkIdx`] order.
    pub fn landmarks(&self) -> impl Iterator<Item = Landmark> + '_ {
        (0..NUM_LANDMARKS).map(|i| self.landmarks.get(i))
    }

    /// Returns the landmark at a named index.
    pub fn get(&self, idx: LandmarkIdx) -> Landmark {
        self.landmarks.get(idx as usize)
    }

    /// Presence confidence of the whole pose.
    #[inline]
    pub fn confidence(&self) -> f32 {
        self.confidence
    }
}

/// Pose landmark model glue.
pub struct PoseModel {
    cnn: Cnn,
    smoother: LandmarkSmoother,
    mode: RunningMode,
    thresh: f32,
    t_infer: Timer,
    t_extract: Timer,
}

impl PoseModel {
    pub const DEFAULT_THRESHOLD: f32 = 0.5;

    const SMOOTHING_ALPHA: f32 = 0.7;

    /// Loads the landmark network from an ONNX file.
    pub fn load<P: AsRef<Path>>(path: P, delegate: Delegate) -> anyhow::Result<Self> {
        // Only landmarks and the pose presence flag are needed; segmentation, heatmap and world
        // landmark outputs are disabled at load time.
        let nn = NeuralNetwork::from_path(path)?
            .with_output_selection([0, 1])
            .with_delegate(delegate)
            .load()?;
        let cnn = Cnn::new(nn, CnnInputShape::NCHW, ColorMapper::linear(0.0..=1.0))?;

        Ok(Self {
            cnn,
            smoother: LandmarkSmoother::new(
                Self::SMOOTHING_ALPHA,
                NUM_LANDMARKS + NUM_AUX_LANDMARKS,
            ),
            mode: RunningMode::SingleImage,
            thresh: Self::DEFAULT_THRESHOLD,
            t_infer: Timer::new("infer"),
            t_extract: Timer::new("extract"),
        })
    }

    /// Returns profiling timers for this model.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_extract].into_iter()
    }

    fn align_mode(&mut self, mode: RunningMode) {
        if self.mode != mode {
            self.mode = mode;
            // Previous frames must not bleed into unrelated inputs.
            self.smoother.reset();
        }
    }

    fn detect(&mut self, frame: &Image) -> anyhow::Result<Vec<PoseDetection>> {
        let outputs = self.t_infer.time(|| self.cnn.estimate(frame))?;
        ensure!(
            outputs.len() >= 2,
            "pose network must produce landmarks and a presence flag"
        );

        let screen_landmarks = &outputs[0];
        let pose_flag = &outputs[1];

        let total = NUM_LANDMARKS + NUM_AUX_LANDMARKS;
        // 5 values per landmark: x, y, z, visibility, presence.
        ensure!(
            screen_landmarks.shape() == [1, total * 5],
            "unexpected landmark output shape {:?}",
            screen_landmarks.shape(),
        );
        ensure!(
            pose_flag.shape() == [1, 1],
            "unexpected presence output shape {:?}",
            pose_flag.shape(),
        );

        let confidence = pose_flag.index([0, 0]).as_singular();
        if confidence < self.thresh {
            return Ok(Vec::new());
        }

        let mut landmarks = Landmarks::new(total);
        self.t_extract.time(|| {
            for (i, &[x, y, z, visibility, presence]) in screen_landmarks
                .index([0])
                .as_slice()
                .array_chunks_exact::<5>()
                .enumerate()
            {
                landmarks.set(
                    i,
                    Landmark::new([x, y, z])
                        .with_visibility(sigmoid(visibility))
                        .with_presence(sigmoid(presence)),
                );
            }
        });

        // Smoothing happens in network coordinates, which keeps the filter parameters
        // independent of the source resolution.
        if self.mode == RunningMode::Stream {
            self.smoother.apply(&mut landmarks);
        }

        let input_res = self.cnn.input_resolution();
        let scale_x = frame.width() as f32 / input_res.width() as f32;
        let scale_y = frame.height() as f32 / input_res.height() as f32;
        landmarks.map_positions(|[x, y, z]| [x * scale_x, y * scale_y, z]);

        Ok(vec![PoseDetection {
            landmarks,
            confidence,
        }])
    }
}

impl Model for PoseModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Pose
    }

    fn set_running_mode(&mut self, mode: RunningMode) -> anyhow::Result<()> {
        self.align_mode(mode);
        Ok(())
    }

    fn infer(
        &mut self,
        frame: &Image,
        mode: RunningMode,
        out: &mut FrameResult,
    ) -> anyhow::Result<()> {
        self.align_mode(mode);
        out.poses = self.detect(frame)?;
        Ok(())
    }
}
