//! Hand landmark prediction.
//!
//! Glue for the hand landmarker networks: one hand per frame, 21 landmarks over a fixed hand
//! topology, plus presence and handedness estimates.

use std::path::Path;

use anyhow::ensure;
use nalgebra::{Point2, Rotation2, Vector2};

use crate::{
    image::Image,
    landmark::{Landmark, LandmarkSmoother, Landmarks},
    nn::{Cnn, CnnInputShape, ColorMapper, Delegate, NeuralNetwork},
    perception::{FrameResult, Model, ModelKind, RunningMode},
    slice::SliceExt,
    timer::Timer,
};

/// Number of landmarks predicted per hand.
pub const NUM_LANDMARKS: usize = 21;

/// Names for the hand landmarks, in output order.
///
/// # Terminology
///
/// - **CMC**: Carpometacarpal joint, the lowest joint of the thumb, located near the wrist.
/// - **MCP**: Metacarpophalangeal joint, the lower joint forming the knuckles near the palm.
/// - **PIP**: Proximal Interphalangeal joint, between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: placed on the tip of the finger, above the DIP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist = 0,
    ThumbCmc = 1,
    ThumbMcp = 2,
    ThumbIp = 3,
    ThumbTip = 4,
    IndexFingerMcp = 5,
    IndexFingerPip = 6,
    IndexFingerDip = 7,
    IndexFingerTip = 8,
    MiddleFingerMcp = 9,
    MiddleFingerPip = 10,
    MiddleFingerDip = 11,
    MiddleFingerTip = 12,
    RingFingerMcp = 13,
    RingFingerPip = 14,
    RingFingerDip = 15,
    RingFingerTip = 16,
    PinkyMcp = 17,
    PinkyPip = 18,
    PinkyDip = 19,
    PinkyTip = 20,
}

/// The hand skeleton edges drawn by the overlay, over [`LandmarkIdx`] indices.
pub const CONNECTIVITY: &[(LandmarkIdx, LandmarkIdx)] = {
    use LandmarkIdx::*;
    &[
        // Surround the palm:
        (Wrist, ThumbCmc),
        (ThumbCmc, IndexFingerMcp),
        (IndexFingerMcp, MiddleFingerMcp),
        (MiddleFingerMcp, RingFingerMcp),
        (RingFingerMcp, PinkyMcp),
        (PinkyMcp, Wrist),
        // Thumb:
        (ThumbCmc, ThumbMcp),
        (ThumbMcp, ThumbIp),
        (ThumbIp, ThumbTip),
        // Index:
        (IndexFingerMcp, IndexFingerPip),
        (IndexFingerPip, IndexFingerDip),
        (IndexFingerDip, IndexFingerTip),
        // Middle:
        (MiddleFingerMcp, MiddleFingerPip),
        (MiddleFingerPip, MiddleFingerDip),
        (MiddleFingerDip, MiddleFingerTip),
        // Ring:
        (RingFingerMcp, RingFingerPip),
        (RingFingerPip, RingFingerDip),
        (RingFingerDip, RingFingerTip),
        // Pinky:
        (PinkyMcp, PinkyPip),
        (PinkyPip, PinkyDip),
        (PinkyDip, PinkyTip),
    ]
};

/// The fingertip landmarks that get text labels in the overlay.
pub const FINGERTIPS: &[(LandmarkIdx, &str)] = {
    use LandmarkIdx::*;
    &[
        (ThumbTip, "thumb"),
        (IndexFingerTip, "index"),
        (MiddleFingerTip, "middle"),
        (RingFingerTip, "ring"),
        (PinkyTip, "pinky"),
    ]
};

/// Which hand a detection belongs to.
///
/// This assumes the camera image is passed in unmirrored; it should only be relied on when the
/// detection confidence is above threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    /// Short label for overlay display.
    pub fn label(&self) -> &'static str {
        match self {
            Handedness::Left => "L",
            Handedness::Right => "R",
        }
    }
}

/// A detected hand in source-pixel coordinates.
#[derive(Debug, Clone)]
pub struct HandDetection {
    landmarks: Landmarks,
    handedness: Handedness,
    confidence: f32,
}

impl HandDetection {
    /// Creates a hand detection from raw landmark data.
    ///
    /// `landmarks` must contain [`NUM_LANDMARKS`] entries in [`LandmarkIdx`] order.
    pub fn new(landmarks: Landmarks, handedness: Handedness, confidence: f32) -> Self {
        assert_eq!(landmarks.len(), NUM_LANDMARKS);
        Self {
            landmarks,
            handedness,
            confidence,
        }
    }

    /// Returns the 21 hand landmarks, in [`LandmarkIdx`] order.
    pub fn landmarks(&self) -> impl Iterator<Item = Landmark> + '_ {
        self.landmarks.iter()
    }

    /// Returns the landmark at a named index.
    pub fn get(&self, idx: LandmarkIdx) -> Landmark {
        self.landmarks.get(idx as usize)
    }

    #[inline]
    pub fn handedness(&self) -> Handedness {
        self.handedness
    }

    /// Presence confidence of the hand.
    #[inline]
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Computes the clockwise rotation of the hand compared to an upright position.
    ///
    /// A rotation of 0° means the fingers point upwards.
    pub fn rotation_radians(&self) -> f32 {
        let mcp = self.get(LandmarkIdx::MiddleFingerMcp);
        let finger = Point2::new(mcp.x(), mcp.y());
        let wrist = self.get(LandmarkIdx::Wrist);
        let wrist = Point2::new(wrist.x(), wrist.y());

        let rel = wrist - finger;
        Rotation2::rotation_between(&Vector2::y(), &rel).angle()
    }
}

/// Hand landmark model glue.
pub struct HandModel {
    cnn: Cnn,
    smoother: LandmarkSmoother,
    mode: RunningMode,
    thresh: f32,
    t_infer: Timer,
    t_extract: Timer,
}

impl HandModel {
    pub const DEFAULT_THRESHOLD: f32 = 0.5;

    const SMOOTHING_ALPHA: f32 = 0.7;

    /// Loads the landmark network from an ONNX file.
    pub fn load<P: AsRef<Path>>(path: P, delegate: Delegate) -> anyhow::Result<Self> {
        let nn = NeuralNetwork::from_path(path)?
            .with_delegate(delegate)
            .load()?;
        let cnn = Cnn::new(nn, CnnInputShape::NCHW, ColorMapper::linear(0.0..=1.0))?;

        Ok(Self {
            cnn,
            smoother: LandmarkSmoother::new(Self::SMOOTHING_ALPHA, NUM_LANDMARKS),
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
            self.smoother.reset();
        }
    }

    fn detect(&mut self, frame: &Image) -> anyhow::Result<Vec<HandDetection>> {
        let outputs = self.t_infer.time(|| self.cnn.estimate(frame))?;
        ensure!(
            outputs.len() >= 3,
            "hand network must produce landmarks, presence and handedness"
        );

        let screen_landmarks = &outputs[0];
        let presence_flag = &outputs[1];
        let handedness = &outputs[2];

        ensure!(
            screen_landmarks.shape() == [1, NUM_LANDMARKS * 3],
            "unexpected landmark output shape {:?}",
            screen_landmarks.shape(),
        );
        ensure!(
            presence_flag.shape() == [1, 1],
            "unexpected presence output shape {:?}",
            presence_flag.shape(),
        );
        ensure!(
            handedness.shape() == [1, 1],
            "unexpected handedness output shape {:?}",
            handedness.shape(),
        );

        let confidence = presence_flag.index([0, 0]).as_singular();
        if confidence < self.thresh {
            return Ok(Vec::new());
        }

        let handedness = if handedness.index([0, 0]).as_singular() > 0.5 {
            Handedness::Right
        } else {
            Handedness::Left
        };

        let mut landmarks = Landmarks::new(NUM_LANDMARKS);
        self.t_extract.time(|| {
            for (i, &[x, y, z]) in screen_landmarks
                .index([0])
                .as_slice()
                .array_chunks_exact::<3>()
                .enumerate()
            {
                landmarks.set(i, Landmark::new([x, y, z]));
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

        Ok(vec![HandDetection {
            landmarks,
            handedness,
            confidence,
        }])
    }
}

impl Model for HandModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Hand
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
        out.hands = self.detect(frame)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_of_upright_hand_is_zero() {
        let mut landmarks = Landmarks::new(NUM_LANDMARKS);
        landmarks.set(LandmarkIdx::Wrist as usize, Landmark::new([5.0, 10.0, 0.0]));
        landmarks.set(
            LandmarkIdx::MiddleFingerMcp as usize,
            Landmark::new([5.0, 2.0, 0.0]),
        );
        let hand = HandDetection {
            landmarks,
            handedness: Handedness::Left,
            confidence: 1.0,
        };
        // Fingers pointing up (towards smaller Y) means no rotation.
        assert!(hand.rotation_radians().abs() < 1e-5);
    }
}
