//! Signal filtering for per-frame scores and joint angles.
//!
//! The live form score jumps around from frame to frame; these filters
//! smooth it for display and, optionally, smooth the knee angle before it
//! reaches the repetition counter.

/// Exponential moving average (the default score smoother)
pub mod exponential;

/// Moving average filter for simple smoothing
pub mod moving_average;

/// Median filter for outlier rejection
pub mod median;

/// Hampel filter for robust outlier detection and smoothing
pub mod hampel;

use crate::{Error, Result};

/// Trait for all single-channel filters
pub trait ScoreFilter: Send + Sync {
    /// Feed one sample and return the filtered value
    fn apply(&mut self, value: f64) -> f64;

    /// Reset filter state
    fn reset(&mut self);

    /// Get filter name
    fn name(&self) -> &str;
}

/// No-op filter that passes through values unchanged
pub struct NoFilter;

impl ScoreFilter for NoFilter {
    fn apply(&mut self, value: f64) -> f64 {
        value
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "NoFilter"
    }
}

fn parse_param<T: std::str::FromStr>(descriptor: &str, raw: Option<&str>, default: T, what: &str) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(s) => s
            .trim()
            .parse()
            .map_err(|_| Error::FilterError(format!("Invalid {what} '{s}' in filter descriptor '{descriptor}'"))),
    }
}

/// Create a filter from a descriptor of the form `name[:param[:param]]`
///
/// # Errors
///
/// Returns [`Error::FilterError`] for unknown names or invalid parameters.
pub fn create_filter(descriptor: &str) -> Result<Box<dyn ScoreFilter>> {
    let mut parts = descriptor.split(':');
    let name = parts.next().unwrap_or_default().trim().to_lowercase();
    let p1 = parts.next();
    let p2 = parts.next();
    if parts.next().is_some() {
        return Err(Error::FilterError(format!("Too many parameters in filter descriptor '{descriptor}'")));
    }

    match name.as_str() {
        "none" | "nofilter" | "" => Ok(Box::new(NoFilter)),
        "exponential" | "ema" => {
            let alpha: f64 = parse_param(descriptor, p1, 0.3, "alpha")?;
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(Error::FilterError(format!("Alpha must be in (0, 1], got {alpha}")));
            }
            Ok(Box::new(exponential::ExponentialFilter::new(alpha)))
        }
        "moving_average" | "movingaverage" => {
            let window: usize = parse_param(descriptor, p1, 5, "window size")?;
            if window == 0 {
                return Err(Error::FilterError("Window size must be greater than 0".to_string()));
            }
            Ok(Box::new(moving_average::MovingAverageFilter::new(window)))
        }
        "median" => {
            let window: usize = parse_param(descriptor, p1, 5, "window size")?;
            if window == 0 {
                return Err(Error::FilterError("Window size must be greater than 0".to_string()));
            }
            Ok(Box::new(median::MedianFilter::new(window)))
        }
        "hampel" => {
            let window: usize = parse_param(descriptor, p1, 5, "window size")?;
            let threshold: f64 = parse_param(descriptor, p2, 3.0, "threshold")?;
            if window == 0 || window % 2 == 0 {
                return Err(Error::FilterError(format!("Window size must be odd and greater than 0, got {window}")));
            }
            if !(threshold >= 0.0) {
                return Err(Error::FilterError(format!("Threshold must be non-negative, got {threshold}")));
            }
            Ok(Box::new(hampel::HampelFilter::new(window, threshold)))
        }
        _ => Err(Error::FilterError(format!("Unknown filter type: {descriptor}"))),
    }
}
