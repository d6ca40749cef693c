//! Landmark storage and temporal smoothing.

use crate::filter::{Ema, Filter};
use crate::iter::zip_exact;

type Position = [f32; 3];

/// A fixed-size collection of landmarks.
///
/// Visibility and presence scores are stored lazily; collections whose landmarks never carry them
/// do not allocate the extra buffers.
#[derive(Debug, Clone)]
pub struct Landmarks {
    positions: Box<[Position]>,
    visibility: Option<Box<[f32]>>,
    presence: Option<Box<[f32]>>,
}

impl Landmarks {
    /// Creates a new [`Landmarks`] collection containing `len` preallocated landmarks.
    ///
    /// All landmarks start with all coordinates at `0.0`.
    pub fn new(len: usize) -> Self {
        Self {
            positions: vec![[0.0, 0.0, 0.0]; len].into_boxed_slice(),
            visibility: None,
            presence: None,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Landmark> + Clone + '_ {
        (0..self.positions.len()).map(|i| self.get(i))
    }

    pub fn get(&self, index: usize) -> Landmark {
        let mut lm = Landmark::new(self.positions[index]);
        if let Some(vis) = &self.visibility {
            lm = lm.with_visibility(vis[index]);
        }
        if let Some(pres) = &self.presence {
            lm = lm.with_presence(pres[index]);
        }
        lm
    }

    pub fn set(&mut self, index: usize, landmark: Landmark) {
        let len = self.positions.len();
        self.positions[index] = landmark.pos;
        if let Some(vis) = landmark.visibility {
            self.visibility.get_or_insert_with(|| vec![0.0; len].into())[index] = vis;
        }
        if let Some(pres) = landmark.presence {
            self.presence.get_or_insert_with(|| vec![0.0; len].into())[index] = pres;
        }
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut [Position] {
        &mut self.positions
    }

    /// Computes the unweighted average of all landmark positions.
    pub fn average_position(&self) -> Position {
        let mut center = [0.0; 3];
        for pos in self.positions() {
            center[0] += pos[0] / self.positions().len() as f32;
            center[1] += pos[1] / self.positions().len() as f32;
            center[2] += pos[2] / self.positions().len() as f32;
        }
        center
    }

    pub fn map_positions(&mut self, mut f: impl FnMut(Position) -> Position) {
        for pos in self.positions_mut() {
            *pos = f(*pos);
        }
    }
}

/// A landmark in 3D space.
#[derive(Debug, PartialEq, PartialOrd, Clone, Copy)]
pub struct Landmark {
    pos: Position,
    visibility: Option<f32>,
    presence: Option<f32>,
}

impl Landmark {
    pub fn new(position: Position) -> Self {
        Self {
            pos: position,
            visibility: None,
            presence: None,
        }
    }

    pub fn with_visibility(self, visibility: f32) -> Self {
        Self {
            visibility: Some(visibility),
            ..self
        }
    }

    pub fn with_presence(self, presence: f32) -> Self {
        Self {
            presence: Some(presence),
            ..self
        }
    }

    #[inline]
    pub fn position(&self) -> Position {
        self.pos
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.pos[0]
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.pos[1]
    }

    #[inline]
    pub fn z(&self) -> f32 {
        self.pos[2]
    }

    /// Returns how likely it is that the landmark is visible (not occluded), if the network
    /// estimates this.
    #[inline]
    pub fn visibility(&self) -> Option<f32> {
        self.visibility
    }

    /// Returns how likely it is that the landmark is present in the image, if the network
    /// estimates this.
    #[inline]
    pub fn presence(&self) -> Option<f32> {
        self.presence
    }
}

/// Batch EMA filter for landmark positions.
///
/// Landmark networks jitter noticeably between consecutive video frames. In continuous-stream
/// operation the per-coordinate EMA smooths that jitter; for single-image operation it must be
/// disabled and reset, since unrelated images must not bleed into each other.
///
/// The smoother should be applied to the unadjusted landmarks output by the network, so that the
/// filter parameters are independent of the input image size.
pub struct LandmarkSmoother {
    filters: Vec<[Ema; 3]>,
}

impl LandmarkSmoother {
    /// Creates a smoother for batches of `num_landmarks` landmarks.
    pub fn new(alpha: f32, num_landmarks: usize) -> Self {
        Self {
            filters: (0..num_landmarks)
                .map(|_| [Ema::new(alpha), Ema::new(alpha), Ema::new(alpha)])
                .collect(),
        }
    }

    /// Filters a batch of landmarks in-place.
    ///
    /// # Panics
    ///
    /// Panics if `landmarks` does not have exactly `num_landmarks` entries.
    pub fn apply(&mut self, landmarks: &mut Landmarks) {
        for (pos, filters) in zip_exact(landmarks.positions_mut(), &mut self.filters) {
            for (coord, filter) in zip_exact(pos, filters) {
                *coord = filter.push(*coord);
            }
        }
    }

    /// Discards all accumulated temporal state.
    pub fn reset(&mut self) {
        for filters in &mut self.filters {
            for filter in filters {
                filter.reset();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lazy_score_buffers() {
        let mut landmarks = Landmarks::new(2);
        assert_eq!(landmarks.get(0).visibility(), None);

        landmarks.set(1, Landmark::new([1.0, 2.0, 3.0]).with_visibility(0.5));
        assert_eq!(landmarks.get(1).visibility(), Some(0.5));
        assert_eq!(landmarks.get(0).visibility(), Some(0.0));
    }

    #[test]
    fn smoother_converges_and_resets() {
        let mut smoother = LandmarkSmoother::new(0.5, 1);
        let mut landmarks = Landmarks::new(1);

        landmarks.set(0, Landmark::new([2.0, 0.0, 0.0]));
        smoother.apply(&mut landmarks);
        assert_eq!(landmarks.get(0).x(), 2.0);

        landmarks.set(0, Landmark::new([4.0, 0.0, 0.0]));
        smoother.apply(&mut landmarks);
        assert_eq!(landmarks.get(0).x(), 3.0);

        smoother.reset();
        landmarks.set(0, Landmark::new([10.0, 0.0, 0.0]));
        smoother.apply(&mut landmarks);
        assert_eq!(landmarks.get(0).x(), 10.0);
    }
}
