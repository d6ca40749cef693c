//! Common functionality for object detection.
//!
//! The types in this module (and submodules) are shared by the per-kind model glue: raw network
//! outputs are extracted into [`Detection`]s, deduplicated with non-maximum suppression, and then
//! converted into the kind-specific result types.

pub mod nms;
pub mod ssd;

use crate::image::Rect;

/// A detected region in source-pixel coordinates.
///
/// A [`Detection`] consists of a [`Rect`] enclosing the detected object, a confidence value, a
/// class index, and a possibly empty list of located keypoints.
///
/// Per convention, the confidence value lies between 0.0 and 1.0 (raw network outputs are passed
/// through [`crate::num::sigmoid`] where necessary). Detectors that only handle a single object
/// class leave the class index at 0.
#[derive(Debug, Clone)]
pub struct Detection {
    confidence: f32,
    class: u32,
    rect: Rect,
    keypoints: Vec<Keypoint>,
}

impl Detection {
    pub fn new(confidence: f32, rect: Rect) -> Self {
        Self {
            confidence,
            class: 0,
            rect,
            keypoints: Vec::new(),
        }
    }

    pub fn with_keypoints(confidence: f32, rect: Rect, keypoints: Vec<Keypoint>) -> Self {
        Self {
            confidence,
            class: 0,
            rect,
            keypoints,
        }
    }

    pub fn push_keypoint(&mut self, keypoint: Keypoint) {
        self.keypoints.push(keypoint);
    }

    #[inline]
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn set_confidence(&mut self, confidence: f32) {
        self.confidence = confidence;
    }

    /// Returns the class index assigned by the detector.
    #[inline]
    pub fn class(&self) -> u32 {
        self.class
    }

    pub fn set_class(&mut self, class: u32) {
        self.class = class;
    }

    /// Returns the axis-aligned bounding rectangle containing the detected object.
    #[inline]
    pub fn bounding_rect(&self) -> Rect {
        self.rect
    }

    pub fn set_bounding_rect(&mut self, rect: Rect) {
        self.rect = rect;
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    pub fn keypoints_mut(&mut self) -> &mut Vec<Keypoint> {
        &mut self.keypoints
    }
}

/// A 2D keypoint produced as part of a [`Detection`].
///
/// Keypoints are usually, but not always, inside the detection bounding box and indicate the
/// approximate location of some object landmark. Their meaning depends on the specific detector
/// and on their index in the keypoint list.
#[derive(Debug, Clone, Copy)]
pub struct Keypoint {
    x: f32,
    y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.y
    }

    pub(crate) fn set(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
    }
}
