use super::{median::MedianFilter, ScoreFilter};
use std::collections::VecDeque;

/// Hampel filter for outlier removal
pub struct HampelFilter {
    window_size: usize,
    threshold: f64,
    buffer: VecDeque<f64>,
}

impl HampelFilter {
    /// Create a new Hampel filter
    ///
    /// # Panics
    ///
    /// Panics if `window_size` is not odd or is zero, or if threshold is negative
    #[must_use]
    pub fn new(window_size: usize, threshold: f64) -> Self {
        assert!(window_size > 0, "Window size must be greater than 0");
        assert!(window_size % 2 == 1, "Window size must be odd, got {}", window_size);
        assert!(threshold >= 0.0, "Threshold must be non-negative, got {}", threshold);
        Self {
            window_size,
            threshold,
            buffer: VecDeque::with_capacity(window_size),
        }
    }

    fn filter_sample(&mut self, value: f64) -> f64 {
        if self.buffer.is_empty() {
            return value;
        }

        let mut window: Vec<f64> = self.buffer.iter().copied().collect();
        window.push(value);
        let median = MedianFilter::median(&window);

        // Median absolute deviation, scaled to a robust standard deviation
        let deviations: Vec<f64> = window.iter().map(|&x| (x - median).abs()).collect();
        let sigma = 1.4826 * MedianFilter::median(&deviations);

        if (value - median).abs() > self.threshold * sigma {
            median
        } else {
            value
        }
    }
}

impl ScoreFilter for HampelFilter {
    fn apply(&mut self, value: f64) -> f64 {
        let filtered = self.filter_sample(value);

        if self.buffer.len() >= self.window_size {
            self.buffer.pop_front();
        }
        self.buffer.push_back(filtered);

        filtered
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }

    fn name(&self) -> &str {
        "HampelFilter"
    }
}
