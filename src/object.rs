//! Object detection.
//!
//! Glue for single-tensor YOLO-style detection networks: the network produces one output of
//! shape `[1, 4 + num_classes, num_anchors]`, where the first four rows are the box center,
//! width and height in input-pixel space, and the remaining rows are per-class scores.

use std::path::Path;

use anyhow::ensure;

use crate::{
    detection::{
        nms::{NonMaxSuppression, SuppressionMode},
        Detection,
    },
    image::{Image, Rect},
    nn::{Cnn, CnnInputShape, ColorMapper, Delegate, NeuralNetwork},
    perception::{FrameResult, Model, ModelKind, RunningMode},
    timer::Timer,
};

/// The class labels of the standard 80-class COCO detection networks.
pub const LABELS: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich",
    "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote",
    "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book",
    "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// A detected object in source-pixel coordinates.
#[derive(Debug, Clone)]
pub struct ObjectDetection {
    pub rect: Rect,
    /// Human-readable class label.
    pub label: &'static str,
    pub confidence: f32,
}

/// Object detection model glue.
pub struct ObjectModel {
    cnn: Cnn,
    nms: NonMaxSuppression,
    thresh: f32,
    t_infer: Timer,
    t_extract: Timer,
}

impl ObjectModel {
    pub const DEFAULT_THRESHOLD: f32 = 0.4;

    /// Loads the detection network from an ONNX file.
    pub fn load<P: AsRef<Path>>(path: P, delegate: Delegate) -> anyhow::Result<Self> {
        let nn = NeuralNetwork::from_path(path)?
            .with_delegate(delegate)
            .load()?;
        let cnn = Cnn::new(nn, CnnInputShape::NCHW, ColorMapper::linear(0.0..=1.0))?;

        let mut nms = NonMaxSuppression::new();
        nms.set_mode(SuppressionMode::Remove);
        nms.set_iou_thresh(0.45);

        Ok(Self {
            cnn,
            nms,
            thresh: Self::DEFAULT_THRESHOLD,
            t_infer: Timer::new("infer"),
            t_extract: Timer::new("extract"),
        })
    }

    #[inline]
    pub fn set_threshold(&mut self, thresh: f32) {
        self.thresh = thresh;
    }

    /// Returns profiling timers for this model.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_extract].into_iter()
    }

    fn detect(&mut self, frame: &Image) -> anyhow::Result<Vec<ObjectDetection>> {
        let outputs = self.t_infer.time(|| self.cnn.estimate(frame))?;
        ensure!(outputs.len() >= 1, "detection network produced no outputs");

        let preds = &outputs[0];
        let shape = preds.shape();
        ensure!(
            shape.len() == 3 && shape[0] == 1 && shape[1] > 4,
            "unexpected detection output shape {shape:?}",
        );
        let num_classes = shape[1] - 4;
        let num_anchors = shape[2];

        let input_res = self.cnn.input_resolution();
        let scale_x = frame.width() as f32 / input_res.width() as f32;
        let scale_y = frame.height() as f32 / input_res.height() as f32;

        let thresh = self.thresh;
        let mut detections = Vec::new();
        self.t_extract.time(|| {
            // Highest class score per anchor. Iterating classes in ascending order with a
            // strictly-greater comparison keeps the earliest class index on equal scores.
            let mut best = vec![(0u32, f32::NEG_INFINITY); num_anchors];
            for class in 0..num_classes {
                let row = preds.index([0, 4 + class]);
                for (anchor, &score) in row.as_slice().iter().enumerate() {
                    if score > best[anchor].1 {
                        best[anchor] = (class as u32, score);
                    }
                }
            }

            let xs = preds.index([0, 0]);
            let ys = preds.index([0, 1]);
            let ws = preds.index([0, 2]);
            let hs = preds.index([0, 3]);
            let (xs, ys, ws, hs) = (xs.as_slice(), ys.as_slice(), ws.as_slice(), hs.as_slice());

            for (anchor, &(class, score)) in best.iter().enumerate() {
                if score < thresh {
                    continue;
                }
                // Degenerate boxes are model noise, not an error.
                if ws[anchor] <= 0.0 || hs[anchor] <= 0.0 {
                    continue;
                }
                let rect = Rect::from_center(
                    xs[anchor] * scale_x,
                    ys[anchor] * scale_y,
                    ws[anchor] * scale_x,
                    hs[anchor] * scale_y,
                );
                let mut det = Detection::new(score, rect);
                det.set_class(class);
                detections.push(det);
            }
        });

        let objects = self
            .nms
            .process(&mut detections)
            .map(|det| ObjectDetection {
                rect: det.bounding_rect(),
                label: LABELS
                    .get(det.class() as usize)
                    .copied()
                    .unwrap_or("object"),
                confidence: det.confidence(),
            })
            .collect();
        Ok(objects)
    }
}

impl Model for ObjectModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Object
    }

    fn set_running_mode(&mut self, _mode: RunningMode) -> anyhow::Result<()> {
        // Object detection carries no temporal state across frames.
        Ok(())
    }

    fn infer(
        &mut self,
        frame: &Image,
        _mode: RunningMode,
        out: &mut FrameResult,
    ) -> anyhow::Result<()> {
        out.objects = self.detect(frame)?;
        Ok(())
    }
}
