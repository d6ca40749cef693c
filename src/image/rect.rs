//! Rectangle types.

use std::fmt;

/// An axis-aligned rectangle in pixel coordinates.
///
/// Rectangles are allowed to have zero width and/or height. Negative dimensions are not allowed.
#[derive(Clone, Copy, PartialEq)]
pub struct Rect {
    x: f32,
    y: f32,
    w: f32,
    h: f32,
}

impl Rect {
    /// Creates a rectangle extending downwards and right from a point.
    #[inline]
    pub fn from_top_left(x: f32, y: f32, width: f32, height: f32) -> Self {
        assert!(width >= 0.0 && height >= 0.0, "negative rect dimensions");
        Self {
            x,
            y,
            w: width,
            h: height,
        }
    }

    /// Creates a rectangle extending outwards from a center point.
    #[inline]
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self::from_top_left(
            x_center - width * 0.5,
            y_center - height * 0.5,
            width,
            height,
        )
    }

    /// Computes the axis-aligned bounding rectangle that encompasses `points`.
    ///
    /// Returns [`None`] if `points` is an empty iterator.
    pub fn bounding<I: IntoIterator<Item = [f32; 2]>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let [mut min_x, mut min_y] = iter.next()?;
        let (mut max_x, mut max_y) = (min_x, min_y);

        for [x, y] in iter {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        Some(Self::from_top_left(
            min_x,
            min_y,
            max_x - min_x,
            max_y - min_y,
        ))
    }

    /// Returns the X coordinate of the left side of the rectangle.
    #[inline]
    pub fn x(&self) -> f32 {
        self.x
    }

    /// Returns the Y coordinate of the top side of the rectangle.
    #[inline]
    pub fn y(&self) -> f32 {
        self.y
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.w
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.h
    }

    /// Returns the center point of the rectangle.
    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w * 0.5, self.y + self.h * 0.5)
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.w * self.h
    }

    /// Moves the rectangle by an offset, keeping its size.
    #[must_use]
    pub fn move_by(&self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// Grows this rectangle by adding a margin relative to width and height.
    ///
    /// `amount` is the relative amount of the rectangle's width and height to add to each side.
    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        let dx = self.w * amount;
        let dy = self.h * amount;
        Self::from_top_left(self.x - dx, self.y - dy, self.w + dx * 2.0, self.h + dy * 2.0)
    }

    fn intersection_area(&self, other: &Self) -> f32 {
        let x_min = self.x.max(other.x);
        let y_min = self.y.max(other.y);
        let x_max = (self.x + self.w).min(other.x + other.w);
        let y_max = (self.y + self.h).min(other.y + other.h);
        if x_max <= x_min || y_max <= y_min {
            return 0.0;
        }
        (x_max - x_min) * (y_max - y_min)
    }

    /// Computes the intersection-over-union of `self` and `other`.
    ///
    /// Returns 0.0 when the rectangles do not overlap, or when the union has zero area.
    pub fn iou(&self, other: &Self) -> f32 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect @ ({:.1}, {:.1}), size {:.1}x{:.1}",
            self.x, self.y, self.w, self.h
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_round_trip() {
        let rect = Rect::from_center(10.0, 20.0, 4.0, 6.0);
        assert_eq!(rect.x(), 8.0);
        assert_eq!(rect.y(), 17.0);
        assert_eq!(rect.center(), (10.0, 20.0));
    }

    #[test]
    fn iou() {
        let a = Rect::from_top_left(0.0, 0.0, 10.0, 10.0);
        assert_eq!(a.iou(&a), 1.0);

        let b = Rect::from_top_left(20.0, 20.0, 10.0, 10.0);
        assert_eq!(a.iou(&b), 0.0);

        let c = Rect::from_top_left(5.0, 0.0, 10.0, 10.0);
        let iou = a.iou(&c);
        assert!((iou - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn bounding() {
        assert_eq!(Rect::bounding(std::iter::empty::<[f32; 2]>()), None);
        let rect = Rect::bounding([[1.0, 2.0], [5.0, -1.0], [3.0, 4.0]]).unwrap();
        assert_eq!((rect.x(), rect.y()), (1.0, -1.0));
        assert_eq!((rect.width(), rect.height()), (4.0, 5.0));
    }
}
