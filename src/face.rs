//! Face detection.
//!
//! Glue for the "BlazeFace"-style short-range SSD face detection networks: 896 anchors over a
//! 128x128 input, each predicting a bounding box and 6 facial keypoints.

use std::path::Path;

use anyhow::ensure;
use itertools::izip;

use crate::{
    detection::{
        nms::NonMaxSuppression,
        ssd::{AnchorParams, Anchors, LayerInfo},
        Detection, Keypoint,
    },
    image::{Image, Rect},
    nn::{Cnn, CnnInputShape, ColorMapper, Delegate, NeuralNetwork},
    num::sigmoid,
    perception::{FrameResult, Model, ModelKind, RunningMode},
    timer::Timer,
};

/// Names for the keypoints produced by the face detection network, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeypointIdx {
    RightEye = 0,
    LeftEye = 1,
    NoseTip = 2,
    Mouth = 3,
    RightEar = 4,
    LeftEar = 5,
}

/// Facial contour edges drawn by the overlay, over [`KeypointIdx`] indices.
pub const CONTOUR: &[(KeypointIdx, KeypointIdx)] = {
    use KeypointIdx::*;
    &[
        (RightEar, RightEye),
        (RightEye, NoseTip),
        (NoseTip, LeftEye),
        (LeftEye, LeftEar),
        (NoseTip, Mouth),
    ]
};

/// A named expression score derived from face blendshapes.
///
/// The bundled detection network does not produce these; backends that run an additional
/// blendshape stage attach them here.
#[derive(Debug, Clone)]
pub struct ExpressionScore {
    pub name: String,
    pub score: f32,
}

/// A detected face in source-pixel coordinates.
#[derive(Debug, Clone)]
pub struct FaceDetection {
    pub rect: Rect,
    /// The 6 keypoints of [`KeypointIdx`], in order.
    pub keypoints: Vec<Keypoint>,
    pub confidence: f32,
    /// Optional blendshape-derived expression scores; empty when the backend provides none.
    pub expressions: Vec<ExpressionScore>,
}

/// Face detection model glue.
pub struct FaceModel {
    cnn: Cnn,
    anchors: Anchors,
    nms: NonMaxSuppression,
    thresh: f32,
    t_infer: Timer,
    t_extract: Timer,
}

impl FaceModel {
    pub const DEFAULT_THRESHOLD: f32 = 0.5;

    /// Loads the detection network from an ONNX file.
    pub fn load<P: AsRef<Path>>(path: P, delegate: Delegate) -> anyhow::Result<Self> {
        let nn = NeuralNetwork::from_path(path)?
            .with_delegate(delegate)
            .load()?;
        let cnn = Cnn::new(nn, CnnInputShape::NCHW, ColorMapper::linear(-1.0..=1.0))?;

        // Anchor layout of the short-range network: two output layers over 16x16 and 8x8
        // feature maps.
        let anchors = Anchors::calculate(&AnchorParams {
            layers: &[LayerInfo::new(2, 16, 16), LayerInfo::new(6, 8, 8)],
        });

        Ok(Self {
            cnn,
            anchors,
            nms: NonMaxSuppression::new(),
            thresh: Self::DEFAULT_THRESHOLD,
            t_infer: Timer::new("infer"),
            t_extract: Timer::new("extract"),
        })
    }

    /// Returns profiling timers for this model.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_extract].into_iter()
    }

    fn detect(&mut self, frame: &Image) -> anyhow::Result<Vec<FaceDetection>> {
        let outputs = self.t_infer.time(|| self.cnn.estimate(frame))?;
        ensure!(outputs.len() >= 2, "face network must produce boxes and scores");

        let num_anchors = self.anchors.anchor_count();
        let boxes = &outputs[0];
        let confidences = &outputs[1];
        ensure!(
            boxes.shape() == [1, num_anchors, 16],
            "unexpected box output shape {:?}",
            boxes.shape(),
        );
        ensure!(
            confidences.shape() == [1, num_anchors, 1],
            "unexpected score output shape {:?}",
            confidences.shape(),
        );

        let input_res = self.cnn.input_resolution();
        let (input_w, input_h) = (input_res.width() as f32, input_res.height() as f32);
        let scale_x = frame.width() as f32 / input_w;
        let scale_y = frame.height() as f32 / input_h;

        let thresh = self.thresh;
        let anchors = &self.anchors;
        let mut detections = Vec::new();
        self.t_extract.time(|| {
            let anchor_iter = (0..num_anchors).map(|i| &anchors[i]);
            for (index, anchor, view) in izip!(0.., anchor_iter, confidences.index([0]).iter()) {
                let confidence = sigmoid(view.as_slice()[0]);
                if confidence < thresh {
                    continue;
                }

                let view = boxes.index([0, index]);
                let params = view.as_slice();

                let xc = params[0] + anchor.x_center() * input_w;
                let yc = params[1] + anchor.y_center() * input_h;
                let (w, h) = (params[2], params[3]);
                // Degenerate boxes are model noise, not an error.
                if w <= 0.0 || h <= 0.0 {
                    continue;
                }

                let mut det = Detection::new(
                    confidence,
                    Rect::from_center(xc * scale_x, yc * scale_y, w * scale_x, h * scale_y),
                );
                for chunk in params[4..].chunks_exact(2) {
                    det.push_keypoint(Keypoint::new(
                        (chunk[0] + anchor.x_center() * input_w) * scale_x,
                        (chunk[1] + anchor.y_center() * input_h) * scale_y,
                    ));
                }
                detections.push(det);
            }
        });

        let faces = self
            .nms
            .process(&mut detections)
            .map(|det| FaceDetection {
                rect: det.bounding_rect(),
                keypoints: det.keypoints().to_vec(),
                confidence: det.confidence(),
                expressions: Vec::new(),
            })
            .collect();
        Ok(faces)
    }
}

impl Model for FaceModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Face
    }

    fn set_running_mode(&mut self, _mode: RunningMode) -> anyhow::Result<()> {
        // Per-frame detection with non-maximum averaging carries no temporal state.
        Ok(())
    }

    fn infer(
        &mut self,
        frame: &Image,
        _mode: RunningMode,
        out: &mut FrameResult,
    ) -> anyhow::Result<()> {
        out.faces = self.detect(frame)?;
        Ok(())
    }
}
