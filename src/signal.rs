//! Magnitude smoothing.
//!
//! Keeps a short FIFO of recent acceleration magnitudes and reports their
//! arithmetic mean. The activity classifier reads the smoothed value; step
//! and fall detection deliberately read the raw magnitude.
//!
//! Design note: The window is tiny (10 entries), so the mean is recomputed
//! from scratch on every push instead of maintaining a running sum that
//! would drift with floating-point error.

use std::collections::VecDeque;

use serde::Deserialize;

use crate::types::{MotionSample, HISTORY_SIZE};

/// Parameters for magnitude smoothing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SmootherConfig {
    /// Number of magnitudes kept in the window. Must be at least 1.
    pub history_size: usize,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            history_size: HISTORY_SIZE,
        }
    }
}

/// Fixed-capacity FIFO of recent magnitudes.
#[derive(Debug, Clone)]
pub struct MagnitudeWindow {
    values: VecDeque<f64>,
    capacity: usize,
}

impl MagnitudeWindow {
    /// Create an empty window. A capacity of zero is treated as one.
    pub fn new(config: &SmootherConfig) -> Self {
        let capacity = config.history_size.max(1);
        Self {
            values: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Push the magnitude of `sample` and return the new average.
    pub fn push(&mut self, sample: &MotionSample) -> f64 {
        self.push_magnitude(sample.magnitude())
    }

    /// Push a precomputed magnitude and return the new average.
    pub fn push_magnitude(&mut self, magnitude: f64) -> f64 {
        self.values.push_back(magnitude);
        while self.values.len() > self.capacity {
            self.values.pop_front();
        }
        self.average()
    }

    /// Mean of the current contents, 0.0 when empty.
    pub fn average(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Contents, oldest first.
    pub fn values(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl Default for MagnitudeWindow {
    fn default() -> Self {
        Self::new(&SmootherConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_push_returns_itself() {
        let mut window = MagnitudeWindow::default();
        assert_eq!(window.push_magnitude(7.5), 7.5);
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_push_sample_uses_norm() {
        let mut window = MagnitudeWindow::default();
        let avg = window.push(&MotionSample::new(6.0, 8.0, 0.0, 0));
        assert!((avg - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_window_never_exceeds_capacity() {
        let mut window = MagnitudeWindow::default();
        for i in 0..100 {
            window.push_magnitude(i as f64);
            assert!(window.len() <= HISTORY_SIZE);
        }
        assert_eq!(window.len(), HISTORY_SIZE);
    }

    #[test]
    fn test_average_tracks_last_ten() {
        let mut window = MagnitudeWindow::default();
        let inputs: Vec<f64> = (1..=25).map(|v| v as f64 * 0.7).collect();

        for (n, value) in inputs.iter().enumerate() {
            let avg = window.push_magnitude(*value);
            let start = (n + 1).saturating_sub(HISTORY_SIZE);
            let tail = &inputs[start..=n];
            let expected = tail.iter().sum::<f64>() / tail.len() as f64;
            assert!((avg - expected).abs() < 1e-9, "n={n}: {avg} vs {expected}");
        }
    }

    #[test]
    fn test_oldest_evicted_first() {
        let mut window = MagnitudeWindow::new(&SmootherConfig { history_size: 3 });
        for v in [1.0, 2.0, 3.0, 4.0] {
            window.push_magnitude(v);
        }
        assert_eq!(window.values(), vec![2.0, 3.0, 4.0]);
        assert!((window.average() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut window = MagnitudeWindow::new(&SmootherConfig { history_size: 0 });
        window.push_magnitude(1.0);
        window.push_magnitude(5.0);
        assert_eq!(window.capacity(), 1);
        assert_eq!(window.average(), 5.0);
    }

    #[test]
    fn test_clear() {
        let mut window = MagnitudeWindow::default();
        window.push_magnitude(3.0);
        window.clear();
        assert!(window.is_empty());
        assert_eq!(window.average(), 0.0);
    }
}
