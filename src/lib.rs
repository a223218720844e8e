//! Exercise form scoring library for pose-landmark streams.
//!
//! This library turns the 33 body landmarks produced by a pose estimator into
//! coaching signals:
//! - A 0–100 form score per frame, with per-limb fault flags and hints
//! - Squat and lunge repetition counting with correct/wrong classification
//! - Debounced per-limb alerts delivered through a pluggable notifier
//!
//! The per-frame pipeline consists of:
//! 1. A visibility pre-check on the nose, shoulders and hips
//! 2. Geometric scoring of shoulder/hip level, spine tilt and elbow angles
//! 3. Repetition counting on the left knee angle
//! 4. Alert debouncing on the limb fault flags
//!
//! # Examples
//!
//! ## Scoring a Single Frame
//!
//! ```
//! use form_coach::{landmarks::{Landmark, Pose}, scorer::FrameScorer};
//!
//! # fn main() -> form_coach::Result<()> {
//! // A pose estimator would normally fill these in
//! let pose = Pose::new(vec![Landmark::planar(0.5, 0.5, 0.9); 33]);
//!
//! let analysis = FrameScorer::default().score(&pose, "squat")?;
//! assert!((0.0..=100.0).contains(&analysis.score));
//! println!("Score: {:.1}, errors: {:?}", analysis.score, analysis.error_codes);
//! # Ok(())
//! # }
//! ```
//!
//! ## Running a Session
//!
//! ```no_run
//! use form_coach::{alert::LogNotifier, config::Config, session::{Frame, FrameOutcome, Session}};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_file("form-coach.yaml")?;
//! let mut session = Session::new(&config, Arc::new(LogNotifier))?;
//!
//! let line = r#"{"timestamp_ms": 0, "exercise": "squat", "landmarks": []}"#;
//! let frame: Frame = serde_json::from_str(line)?;
//!
//! if let FrameOutcome::Scored(scored) = session.process(&frame)? {
//!     println!("Smoothed score: {:.1}", scored.smoothed_score);
//!     if let Some(outcome) = scored.rep {
//!         println!("Rep finished: {:?}", outcome);
//!     }
//! }
//!
//! for summary in session.rep_summaries() {
//!     println!("{}: {} reps ({} correct)", summary.name, summary.total, summary.correct);
//! }
//! # Ok(())
//! # }
//! ```

/// Pose landmarks, body-part indices and visibility checks
pub mod landmarks;

/// Geometric primitives and scoring curves
pub mod geometry;

/// Supported exercises and their scoring parameters
pub mod exercise;

/// Per-frame form scoring
pub mod scorer;

/// Repetition counting for squats and lunges
pub mod rep_counter;

/// Debounced limb alerts and their delivery
pub mod alert;

/// Signal filtering algorithms for smoothing scores and angles
pub mod filters;

/// Per-subject scoring session
pub mod session;

/// Multi-subject session registry
pub mod registry;

/// Error types and result handling
pub mod error;

/// Frame replay application
pub mod app;

/// Constants used throughout the library
pub mod constants;

/// Configuration management
pub mod config;

pub use error::{Error, Result};
