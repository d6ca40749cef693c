//! Coordinate transform and overlay rendering.
//!
//! This module is a stateless projection+paint pass: [`Projection`] converts source-pixel
//! coordinates into destination canvas space (the canvas is typically sized independently of the
//! video's native resolution), and [`draw`] paints typed annotations for each detection kind.
//! Every kind is gated independently by [`OverlayOptions`]; drawing is idempotent for a given
//! input.

use crate::{
    face::{self, FaceDetection},
    hand::{self, HandDetection},
    image::{blend_scaled, draw, Color, Image, Rect},
    perception::FrameResult,
    pose::{self, PoseDetection},
    resolution::Resolution,
    scheduler::StatsSnapshot,
};

const OBJECT_COLOR: Color = Color::from_rgb8(0, 200, 0);
const FACE_COLOR: Color = Color::from_rgb8(170, 0, 0);
const POSE_EDGE_COLOR: Color = Color::from_rgb8(255, 85, 85);
const HAND_EDGE_COLOR: Color = Color::GREEN;
const POINT_COLOR: Color = Color::YELLOW;
const LABEL_COLOR: Color = Color::WHITE;

/// Independent rendering toggles.
///
/// These are pure render configuration: toggling one never affects detection, and never affects
/// the rendering of the other kinds.
#[derive(Debug, Clone)]
pub struct OverlayOptions {
    pub show_objects: bool,
    pub show_faces: bool,
    pub show_poses: bool,
    pub show_hands: bool,
    /// Master toggle for text labels; a label is only drawn when this *and* the toggle of its
    /// detection kind are enabled.
    pub show_labels: bool,
    /// Appends confidence percentages to labels.
    pub show_confidence: bool,
    /// Draws the individual landmark points of faces, poses and hands.
    pub show_landmark_points: bool,
    /// Draws the stats line into the canvas corner.
    pub show_stats: bool,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            show_objects: true,
            show_faces: true,
            show_poses: true,
            show_hands: true,
            show_labels: true,
            show_confidence: true,
            show_landmark_points: true,
            show_stats: true,
        }
    }
}

/// Maps source-pixel coordinates into destination canvas coordinates.
///
/// The X and Y scale factors are independent, since source and destination aspect ratios are not
/// required to match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    scale_x: f32,
    scale_y: f32,
}

impl Projection {
    /// Computes the projection from `source` (video) space into `dest` (canvas) space.
    pub fn new(source: Resolution, dest: Resolution) -> Self {
        Self {
            scale_x: dest.width() as f32 / source.width() as f32,
            scale_y: dest.height() as f32 / source.height() as f32,
        }
    }

    #[inline]
    pub fn scale_x(&self) -> f32 {
        self.scale_x
    }

    #[inline]
    pub fn scale_y(&self) -> f32 {
        self.scale_y
    }

    /// Projects a point.
    #[inline]
    pub fn point(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.scale_x, y * self.scale_y)
    }

    /// Projects a rectangle: `(x, y, w, h)` maps to exactly
    /// `(x·scale_x, y·scale_y, w·scale_x, h·scale_y)`.
    pub fn rect(&self, rect: Rect) -> Rect {
        Rect::from_top_left(
            rect.x() * self.scale_x,
            rect.y() * self.scale_y,
            rect.width() * self.scale_x,
            rect.height() * self.scale_y,
        )
    }
}

/// Paints one frame's detections onto `canvas`.
///
/// The canvas is cleared first, then objects, faces, poses and hands are drawn in that order,
/// each gated by its [`OverlayOptions`] toggle. `source` is the resolution of the video frame the
/// detections were produced from; the destination size is taken from the canvas itself.
pub fn draw(
    canvas: &mut Image,
    result: &FrameResult,
    source: Resolution,
    options: &OverlayOptions,
    stats: Option<&StatsSnapshot>,
) {
    canvas.clear(Color::NULL);
    let proj = Projection::new(source, canvas.resolution());

    if options.show_objects {
        for det in &result.objects {
            draw_object(canvas, det, &proj, options);
        }
    }
    if options.show_faces {
        for det in &result.faces {
            draw_face(canvas, det, &proj, options);
        }
    }
    if options.show_poses {
        for det in &result.poses {
            draw_pose(canvas, det, &proj, options);
        }
    }
    if options.show_hands {
        for det in &result.hands {
            draw_hand(canvas, det, &proj, options);
        }
    }

    if options.show_stats {
        if let Some(stats) = stats {
            let line = format!(
                "{:.0} FPS | obj {} | face {} | pose {} | hand {}",
                stats.fps, stats.objects, stats.faces, stats.poses, stats.hands,
            );
            draw::text(canvas, 8.0, 8.0, &line)
                .align_left()
                .align_top()
                .color(LABEL_COLOR);
        }
    }
}

fn confidence_color(confidence: f32) -> Color {
    if confidence >= 0.8 {
        Color::GREEN
    } else if confidence >= 0.4 {
        Color::YELLOW
    } else {
        Color::RED
    }
}

fn label_text(label: &str, confidence: f32, options: &OverlayOptions) -> String {
    if options.show_confidence {
        format!("{label} {:.0}%", confidence * 100.0)
    } else {
        label.to_string()
    }
}

fn draw_object(canvas: &mut Image, det: &crate::object::ObjectDetection, proj: &Projection, options: &OverlayOptions) {
    let rect = proj.rect(det.rect);
    draw::rect(canvas, rect).color(OBJECT_COLOR).stroke_width(2);

    if options.show_labels {
        let (xc, _) = rect.center();
        draw::text(
            canvas,
            xc,
            rect.y() - 4.0,
            &label_text(det.label, det.confidence, options),
        )
        .align_bottom()
        .color(confidence_color(det.confidence));
    }
}

fn draw_face(canvas: &mut Image, det: &FaceDetection, proj: &Projection, options: &OverlayOptions) {
    let rect = proj.rect(det.rect);
    draw::rect(canvas, rect).color(FACE_COLOR).stroke_width(2);

    // Contour edges over the named keypoints.
    for &(a, b) in face::CONTOUR {
        let (Some(a), Some(b)) = (det.keypoints.get(a as usize), det.keypoints.get(b as usize))
        else {
            continue;
        };
        let (ax, ay) = proj.point(a.x(), a.y());
        let (bx, by) = proj.point(b.x(), b.y());
        draw::line(canvas, ax, ay, bx, by).color(FACE_COLOR);
    }

    if options.show_landmark_points {
        for kp in &det.keypoints {
            let (x, y) = proj.point(kp.x(), kp.y());
            draw::marker(canvas, x, y).color(POINT_COLOR);
        }
    }

    if options.show_labels {
        let (xc, _) = rect.center();
        draw::text(
            canvas,
            xc,
            rect.y() - 4.0,
            &label_text("face", det.confidence, options),
        )
        .align_bottom()
        .color(confidence_color(det.confidence));
    }
}

fn draw_pose(canvas: &mut Image, det: &PoseDetection, proj: &Projection, options: &OverlayOptions) {
    for &(a, b) in pose::CONNECTIVITY {
        let a = det.get(a);
        let b = det.get(b);
        let (ax, ay) = proj.point(a.x(), a.y());
        let (bx, by) = proj.point(b.x(), b.y());
        draw::line(canvas, ax, ay, bx, by)
            .color(POSE_EDGE_COLOR)
            .stroke_width(2);
    }

    if options.show_landmark_points {
        for lm in det.landmarks() {
            let (x, y) = proj.point(lm.x(), lm.y());
            draw::marker(canvas, x, y).color(POINT_COLOR);
        }
    }

    // Only the anatomically significant landmarks get labels; a label per landmark would be
    // unreadable.
    if options.show_labels {
        for &(idx, name) in pose::SIGNIFICANT {
            let lm = det.get(idx);
            let (x, y) = proj.point(lm.x(), lm.y());
            draw::text(canvas, x, y - 6.0, name)
                .align_bottom()
                .color(LABEL_COLOR);
        }
    }
}

fn draw_hand(canvas: &mut Image, det: &HandDetection, proj: &Projection, options: &OverlayOptions) {
    for &(a, b) in hand::CONNECTIVITY {
        let a = det.get(a);
        let b = det.get(b);
        let (ax, ay) = proj.point(a.x(), a.y());
        let (bx, by) = proj.point(b.x(), b.y());
        draw::line(canvas, ax, ay, bx, by).color(HAND_EDGE_COLOR);
    }

    if options.show_landmark_points {
        for lm in det.landmarks() {
            let (x, y) = proj.point(lm.x(), lm.y());
            draw::marker(canvas, x, y).color(POINT_COLOR);
        }
    }

    if options.show_labels {
        for &(idx, name) in hand::FINGERTIPS {
            let lm = det.get(idx);
            let (x, y) = proj.point(lm.x(), lm.y());
            draw::text(canvas, x, y - 6.0, name)
                .align_bottom()
                .color(LABEL_COLOR);
        }

        let wrist = det.get(hand::LandmarkIdx::Wrist);
        let (x, y) = proj.point(wrist.x(), wrist.y());
        draw::text(
            canvas,
            x,
            y + 6.0,
            &label_text(det.handedness().label(), det.confidence(), options),
        )
        .align_top()
        .color(confidence_color(det.confidence()));
    }
}

/// An encoded image ready for file-save semantics: raw bytes plus a suggested filename.
#[derive(Debug, Clone)]
pub struct ImageBlob {
    pub data: Vec<u8>,
    pub filename: String,
}

/// Renders the current video frame plus the overlay onto an offscreen surface of **source**
/// resolution and encodes it as PNG.
///
/// Exports are resolution-faithful to the source, not to whatever size the overlay happens to be
/// displayed at; the overlay canvas is rescaled onto the frame accordingly.
pub fn capture_composite(
    frame: &Image,
    overlay: &Image,
    timestamp_ms: u64,
) -> anyhow::Result<ImageBlob> {
    let mut composite = frame.clone();
    blend_scaled(&mut composite, overlay);
    let data = composite.encode_png()?;
    Ok(ImageBlob {
        data,
        filename: format!("capture-{timestamp_ms}.png"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::Handedness;
    use crate::landmark::{Landmark, Landmarks};
    use crate::object::ObjectDetection;
    use std::time::Duration;

    fn painted_pixels(image: &Image) -> usize {
        let mut count = 0;
        for y in 0..image.height() {
            for x in 0..image.width() {
                if image.get(x, y) != Color::NULL {
                    count += 1;
                }
            }
        }
        count
    }

    fn sample_result() -> FrameResult {
        let mut result = FrameResult::new(Duration::ZERO);
        result.objects.push(ObjectDetection {
            rect: Rect::from_top_left(50.0, 50.0, 80.0, 40.0),
            label: "person",
            confidence: 0.9,
        });

        let mut landmarks = Landmarks::new(hand::NUM_LANDMARKS);
        for i in 0..hand::NUM_LANDMARKS {
            let x = 100.0 + (i % 5) as f32 * 10.0;
            let y = 100.0 + (i / 5) as f32 * 10.0;
            landmarks.set(i, Landmark::new([x, y, 0.0]));
        }
        result
            .hands
            .push(HandDetection::new(landmarks, Handedness::Right, 0.8));
        result
    }

    #[test]
    fn projection_scales_boxes_exactly() {
        let proj = Projection::new(Resolution::new(640, 480), Resolution::new(320, 960));
        assert_eq!(proj.scale_x(), 0.5);
        assert_eq!(proj.scale_y(), 2.0);

        let rect = proj.rect(Rect::from_top_left(10.0, 20.0, 100.0, 50.0));
        assert_eq!(rect.x(), 10.0 * 0.5);
        assert_eq!(rect.y(), 20.0 * 2.0);
        assert_eq!(rect.width(), 100.0 * 0.5);
        assert_eq!(rect.height(), 50.0 * 2.0);

        assert_eq!(proj.point(8.0, 8.0), (4.0, 16.0));
    }

    #[test]
    fn identity_projection_on_equal_resolutions() {
        let proj = Projection::new(Resolution::new(200, 200), Resolution::new(200, 200));
        let rect = Rect::from_top_left(3.0, 4.0, 5.0, 6.0);
        assert_eq!(proj.rect(rect), rect);
    }

    #[test]
    fn kind_toggles_are_independent() {
        let result = sample_result();
        let source = Resolution::new(200, 200);

        let mut all_on = Image::new(200, 200);
        draw(&mut all_on, &result, source, &OverlayOptions::default(), None);

        let mut hands_off = Image::new(200, 200);
        let options = OverlayOptions {
            show_hands: false,
            ..OverlayOptions::default()
        };
        draw(&mut hands_off, &result, source, &options, None);

        // Hand skeleton and points are gone, the object box is untouched.
        assert!(painted_pixels(&hands_off) < painted_pixels(&all_on));
        assert_eq!(all_on.get(50, 70), OBJECT_COLOR);
        assert_eq!(hands_off.get(50, 70), OBJECT_COLOR);
        // A pixel inside the hand cluster area is no longer painted.
        assert_eq!(hands_off.get(120, 120), Color::NULL);
    }

    #[test]
    fn labels_require_both_toggles() {
        let mut result = FrameResult::new(Duration::ZERO);
        result.objects.push(ObjectDetection {
            rect: Rect::from_top_left(50.0, 50.0, 80.0, 40.0),
            label: "person",
            confidence: 0.9,
        });
        let source = Resolution::new(200, 200);

        let mut with_labels = Image::new(200, 200);
        draw(
            &mut with_labels,
            &result,
            source,
            &OverlayOptions::default(),
            None,
        );

        let mut without_labels = Image::new(200, 200);
        let options = OverlayOptions {
            show_labels: false,
            ..OverlayOptions::default()
        };
        draw(&mut without_labels, &result, source, &options, None);

        assert!(painted_pixels(&without_labels) < painted_pixels(&with_labels));
    }

    #[test]
    fn draw_is_idempotent() {
        let result = sample_result();
        let source = Resolution::new(200, 200);

        let mut first = Image::new(200, 200);
        draw(&mut first, &result, source, &OverlayOptions::default(), None);
        let mut second = first.clone();
        draw(&mut second, &result, source, &OverlayOptions::default(), None);

        assert!(first.buf.as_raw() == second.buf.as_raw());
    }

    #[test]
    fn stats_line_is_gated() {
        let result = FrameResult::new(Duration::ZERO);
        let stats = StatsSnapshot {
            fps: 30.0,
            ..StatsSnapshot::default()
        };
        let source = Resolution::new(100, 100);

        let mut canvas = Image::new(100, 100);
        draw(
            &mut canvas,
            &result,
            source,
            &OverlayOptions::default(),
            Some(&stats),
        );
        assert!(painted_pixels(&canvas) > 0);

        let options = OverlayOptions {
            show_stats: false,
            ..OverlayOptions::default()
        };
        draw(&mut canvas, &result, source, &options, Some(&stats));
        assert_eq!(painted_pixels(&canvas), 0);
    }

    #[test]
    fn composite_is_source_resolution_png() {
        let mut frame = Image::new(64, 48);
        frame.clear(Color::BLACK);
        let overlay = Image::new(32, 24);

        let blob = capture_composite(&frame, &overlay, 1234).unwrap();
        assert_eq!(blob.filename, "capture-1234.png");
        // PNG signature.
        assert_eq!(&blob.data[..8], b"\x89PNG\r\n\x1a\n");
    }
}
