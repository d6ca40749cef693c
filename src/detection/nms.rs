//! Non-Maximum Suppression and Averaging.
//!
//! Detectors typically produce several overlapping detections for a single object. Non-Maximum
//! Suppression (NMS) filters these duplicates, leaving a single high-confidence detection per
//! object.
//!
//! Two variants are implemented, selected with [`SuppressionMode`]: classic suppression, which
//! removes any overlapping detection with lower confidence ([`SuppressionMode::Remove`]), and
//! Non-Maximum Averaging ([`SuppressionMode::Average`]), which computes a confidence-weighted
//! average of the overlapping detections instead. Averaging reduces jitter between frames and is
//! the default.
//!
//! Detections only suppress each other when they share the same class index.

use crate::{image::Rect, iter::zip_exact, num::TotalF32};

use super::{Detection, Keypoint};

/// A non-maximum suppression algorithm.
pub struct NonMaxSuppression {
    iou_thresh: f32,
    avg_buf: Vec<Detection>,
    out_buf: Vec<Detection>,
    mode: SuppressionMode,
}

impl NonMaxSuppression {
    /// The default intersection-over-union threshold used to determine if two detections overlap.
    pub const DEFAULT_IOU_THRESH: f32 = 0.3;

    /// Creates a new non-maximum suppressor using [`SuppressionMode::Average`] and the default
    /// IOU threshold.
    pub fn new() -> Self {
        Self {
            iou_thresh: Self::DEFAULT_IOU_THRESH,
            avg_buf: Vec::new(),
            out_buf: Vec::new(),
            mode: SuppressionMode::Average,
        }
    }

    /// Sets the intersection-over-union threshold at which two detections count as overlapping.
    pub fn set_iou_thresh(&mut self, iou_thresh: f32) {
        self.iou_thresh = iou_thresh;
    }

    /// Sets the suppression mode.
    pub fn set_mode(&mut self, mode: SuppressionMode) {
        self.mode = mode;
    }

    /// Performs non-maximum suppression on `detections`.
    ///
    /// `detections` is drained in the process. The filtered detections are returned as an
    /// iterator.
    pub fn process(
        &mut self,
        detections: &mut Vec<Detection>,
    ) -> impl Iterator<Item = Detection> + '_ {
        self.out_buf.clear();

        // Sort by ascending confidence and process the highest confidence first by starting at
        // the back.
        detections.sort_unstable_by_key(|det| TotalF32(det.confidence()));

        while let Some(seed) = detections.pop() {
            match self.mode {
                SuppressionMode::Remove => {
                    detections.retain(|other| !self.overlaps(&seed, other));
                    self.out_buf.push(seed);
                }
                SuppressionMode::Average => {
                    self.avg_buf.clear();
                    self.avg_buf.push(seed.clone());
                    let (avg_buf, iou_thresh) = (&mut self.avg_buf, self.iou_thresh);
                    detections.retain(|other| {
                        let overlaps = other.class() == seed.class()
                            && seed.bounding_rect().iou(&other.bounding_rect()) >= iou_thresh;
                        if overlaps {
                            avg_buf.push(other.clone());
                        }
                        !overlaps
                    });

                    self.out_buf.push(average(&self.avg_buf));
                }
            }
        }

        self.avg_buf.clear();
        self.out_buf.drain(..)
    }

    fn overlaps(&self, seed: &Detection, other: &Detection) -> bool {
        other.class() == seed.class()
            && seed.bounding_rect().iou(&other.bounding_rect()) >= self.iou_thresh
    }
}

impl Default for NonMaxSuppression {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the confidence-weighted average of a non-empty group of overlapping detections.
fn average(group: &[Detection]) -> Detection {
    let seed = &group[0];

    let mut keypoints = vec![Keypoint::new(0.0, 0.0); seed.keypoints().len()];
    let (mut xc, mut yc, mut w, mut h) = (0.0, 0.0, 0.0, 0.0);
    let mut divisor = 0.0;

    for det in group {
        assert_eq!(
            keypoints.len(),
            det.keypoints().len(),
            "keypoint count must be constant within a class"
        );

        let factor = det.confidence();
        divisor += factor;
        for (acc, kp) in zip_exact(&mut keypoints, det.keypoints()) {
            acc.set(acc.x() + kp.x() * factor, acc.y() + kp.y() * factor);
        }
        let rect = det.bounding_rect();
        let center = rect.center();
        xc += center.0 * factor;
        yc += center.1 * factor;
        w += rect.width() * factor;
        h += rect.height() * factor;
    }

    for kp in &mut keypoints {
        kp.set(kp.x() / divisor, kp.y() / divisor);
    }

    let mut result = Detection::with_keypoints(
        seed.confidence(),
        Rect::from_center(xc / divisor, yc / divisor, w / divisor, h / divisor),
        keypoints,
    );
    result.set_class(seed.class());
    result
}

/// Describes how [`NonMaxSuppression`] deals with overlapping detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SuppressionMode {
    /// Remove overlapping detections, only retaining the one with the highest confidence.
    Remove,
    /// Replace groups of overlapping detections with their confidence-weighted average.
    Average,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: f32, confidence: f32, class: u32) -> Detection {
        let mut det = Detection::new(confidence, Rect::from_top_left(x, 0.0, 10.0, 10.0));
        det.set_class(class);
        det
    }

    #[test]
    fn removes_overlapping_duplicates() {
        let mut nms = NonMaxSuppression::new();
        nms.set_mode(SuppressionMode::Remove);

        let mut detections = vec![det(0.0, 0.9, 0), det(1.0, 0.5, 0)];
        let out: Vec<_> = nms.process(&mut detections).collect();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].confidence(), 0.9);
    }

    #[test]
    fn distinct_classes_survive() {
        let mut nms = NonMaxSuppression::new();
        nms.set_mode(SuppressionMode::Remove);

        let mut detections = vec![det(0.0, 0.9, 0), det(1.0, 0.5, 1)];
        let out: Vec<_> = nms.process(&mut detections).collect();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn averaging_merges_boxes() {
        let mut nms = NonMaxSuppression::new();

        let mut detections = vec![det(0.0, 0.5, 0), det(2.0, 0.5, 0)];
        let out: Vec<_> = nms.process(&mut detections).collect();
        assert_eq!(out.len(), 1);
        // Equal confidences average to the midpoint.
        assert!((out[0].bounding_rect().x() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn disjoint_detections_survive() {
        let mut nms = NonMaxSuppression::new();

        let mut detections = vec![det(0.0, 0.5, 0), det(100.0, 0.5, 0)];
        let out: Vec<_> = nms.process(&mut detections).collect();
        assert_eq!(out.len(), 2);
    }
}
