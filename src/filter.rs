//! Data filtering and smoothing.

/// A filter for values of type `V`.
pub trait Filter<V> {
    /// Adds a new value to the filter, returning the filtered value.
    fn push(&mut self, value: V) -> V;

    /// Resets the accumulated state of the filter to be identical to the state just after
    /// construction.
    fn reset(&mut self);
}

impl<V> Filter<V> for Box<dyn Filter<V>> {
    fn push(&mut self, value: V) -> V {
        (**self).push(value)
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}

/// Exponential Moving Average, a weighted moving average whose weight decreases exponentially.
#[derive(Debug, Clone)]
pub struct Ema {
    alpha: f32,
    last: Option<f32>,
}

impl Ema {
    /// Creates a new Exponential Moving Average calculator.
    ///
    /// The `alpha` parameter must be between 0.0 and 1.0 and defines how quickly the weight of
    /// older values decays. Values close to 1.0 strongly favor recent values, values close to 0.0
    /// retain more of the history.
    ///
    /// # Panics
    ///
    /// Panics if `alpha` is outside of the `0.0..=1.0` range.
    pub fn new(alpha: f32) -> Self {
        assert!((0.0..=1.0).contains(&alpha));
        Self { alpha, last: None }
    }
}

impl Filter<f32> for Ema {
    fn push(&mut self, value: f32) -> f32 {
        match self.last {
            Some(last) => {
                let avg = self.alpha * value + (1.0 - self.alpha) * last;
                self.last = Some(avg);
                avg
            }
            None => {
                self.last = Some(value);
                value
            }
        }
    }

    fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema() {
        let mut filter = Ema::new(0.5);
        assert_eq!(filter.push(1.0), 1.0);
        assert_eq!(filter.push(2.0), 1.5);
        assert_eq!(filter.push(2.0), 1.75);

        filter.reset();
        assert_eq!(filter.push(2.0), 2.0);
    }
}
