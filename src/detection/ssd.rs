//! Anchor generation for Single Shot MultiBox Detectors (SSDs).
//!
//! The implementation is intentionally limited to the anchor layouts used by the face detection
//! network in this crate; it is not a general-purpose anchor generator.

use std::ops::Index;

use crate::resolution::Resolution;

/// An anchor of an SSD network.
///
/// Anchor center coordinates are normalized to the `0.0..=1.0` range.
pub struct Anchor {
    x_center: f32,
    y_center: f32,
}

impl Anchor {
    #[inline]
    pub fn x_center(&self) -> f32 {
        self.x_center
    }

    #[inline]
    pub fn y_center(&self) -> f32 {
        self.y_center
    }
}

/// Describes an output layer of an SSD network.
pub struct LayerInfo {
    /// Number of anchors per feature map cell. Must be non-zero.
    boxes_per_cell: u32,
    /// Feature map resolution of this layer.
    resolution: Resolution,
}

impl LayerInfo {
    /// Creates a new SSD layer description.
    ///
    /// # Parameters
    ///
    /// - `boxes_per_cell`: the number of boxes associated with each cell in this feature map.
    /// - `width`/`height`: size of this layer's feature map, in output cells.
    pub fn new(boxes_per_cell: u32, width: u32, height: u32) -> Self {
        assert_ne!(boxes_per_cell, 0);
        Self {
            boxes_per_cell,
            resolution: Resolution::new(width, height),
        }
    }
}

/// Parameters for [`Anchors::calculate`].
pub struct AnchorParams<'a> {
    /// List of output layers.
    pub layers: &'a [LayerInfo],
}

/// The computed anchor list of an SSD network.
pub struct Anchors {
    anchors: Vec<Anchor>,
}

impl Anchors {
    pub fn calculate(params: &AnchorParams<'_>) -> Self {
        let mut anchors = Vec::new();

        for layer in params.layers {
            let height = layer.resolution.height();
            let width = layer.resolution.width();

            for y in 0..height {
                for x in 0..width {
                    // All anchors of one cell share the same center; box shape differences are
                    // encoded in the network outputs.
                    for _ in 0..layer.boxes_per_cell {
                        let x_center = (x as f32 + 0.5) / width as f32;
                        let y_center = (y as f32 + 0.5) / height as f32;

                        anchors.push(Anchor { x_center, y_center });
                    }
                }
            }
        }

        Self { anchors }
    }

    /// Returns the total number of SSD anchors.
    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }
}

impl Index<usize> for Anchors {
    type Output = Anchor;

    fn index(&self, index: usize) -> &Anchor {
        &self.anchors[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_count() {
        let anchors = Anchors::calculate(&AnchorParams {
            layers: &[LayerInfo::new(2, 16, 16), LayerInfo::new(6, 8, 8)],
        });
        assert_eq!(anchors.anchor_count(), 2 * 16 * 16 + 6 * 8 * 8);
    }
}
