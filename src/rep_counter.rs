//! Repetition counting for cyclic exercises.
//!
//! A two-state machine (`Top`, `Down`) over the knee angle. A rep starts
//! when the angle drops past the bottom threshold with real motion, and
//! completes when it rises past the top threshold after enough frames at the
//! bottom. Faults anywhere in the rep are sticky and make it wrong.

use crate::{config::RepCounterConfig, scorer::FrameAnalysis};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Counter state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepState {
    /// Standing / extended
    Top,
    /// Descended past the bottom threshold
    Down,
}

/// Classification of a completed rep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepOutcome {
    /// Deep enough, fault-free, good score on completion
    Correct,
    /// Anything else
    Wrong,
}

/// Per-frame input besides the angle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepSignal {
    /// Any limb fault in this frame
    pub fault: bool,
    /// Form score of this frame
    pub score: f64,
}

impl From<&FrameAnalysis> for RepSignal {
    fn from(analysis: &FrameAnalysis) -> Self {
        Self {
            fault: analysis.has_fault(),
            score: analysis.score,
        }
    }
}

/// Read-only snapshot of a counter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepSummary {
    /// Exercise name
    pub name: String,
    /// Completed reps
    pub total: u32,
    /// Reps classified correct
    pub correct: u32,
    /// Reps classified wrong
    pub wrong: u32,
}

/// Repetition counter for one exercise
#[derive(Debug, Clone)]
pub struct RepCounter {
    name: String,
    config: RepCounterConfig,
    state: RepState,
    total_reps: u32,
    correct_reps: u32,
    wrong_reps: u32,
    current_rep_has_error: bool,
    current_rep_min_angle: f64,
    last_angle: Option<f64>,
    down_frames: u32,
}

impl RepCounter {
    /// Create a counter in the `Top` state
    #[must_use]
    pub fn new(name: impl Into<String>, config: RepCounterConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: RepState::Top,
            total_reps: 0,
            correct_reps: 0,
            wrong_reps: 0,
            current_rep_has_error: false,
            current_rep_min_angle: f64::INFINITY,
            last_angle: None,
            down_frames: 0,
        }
    }

    /// Advance with one frame's knee angle and analysis
    pub fn update(&mut self, angle: Option<f64>, analysis: &FrameAnalysis) -> Option<RepOutcome> {
        self.update_signal(angle, RepSignal::from(analysis))
    }

    /// Advance with one frame's knee angle and fault/score signal
    ///
    /// Returns the outcome when this frame completes a rep.
    pub fn update_signal(&mut self, angle: Option<f64>, signal: RepSignal) -> Option<RepOutcome> {
        let angle = angle.filter(|a| (self.config.plausible_min..=self.config.plausible_max).contains(a))?;

        let Some(last) = self.last_angle.replace(angle) else {
            return None;
        };

        let moving_down = angle < last;
        let moving_up = angle > last;
        let enough_motion = (angle - last).abs() >= self.config.min_motion;
        let below_bottom = angle < self.config.bottom_threshold;

        match self.state {
            RepState::Top => {
                if moving_down && enough_motion && below_bottom {
                    self.state = RepState::Down;
                    self.current_rep_min_angle = angle;
                    self.down_frames = 1;
                    self.current_rep_has_error = signal.fault;
                    debug!("{}: descent started at {:.1}°", self.name, angle);
                }
                None
            }
            RepState::Down => {
                self.current_rep_min_angle = self.current_rep_min_angle.min(angle);
                if below_bottom {
                    self.down_frames += 1;
                }
                self.current_rep_has_error |= signal.fault;

                let complete = moving_up
                    && enough_motion
                    && angle > self.config.top_threshold
                    && self.down_frames >= self.config.min_down_frames;
                complete.then(|| self.complete_rep(signal.score))
            }
        }
    }

    fn complete_rep(&mut self, score: f64) -> RepOutcome {
        let depth_ok = self.current_rep_min_angle < self.config.bottom_threshold - self.config.depth_bonus;
        let score_ok = score >= self.config.min_score;
        let outcome = if !self.current_rep_has_error && depth_ok && score_ok {
            RepOutcome::Correct
        } else {
            RepOutcome::Wrong
        };

        self.total_reps += 1;
        match outcome {
            RepOutcome::Correct => self.correct_reps += 1,
            RepOutcome::Wrong => self.wrong_reps += 1,
        }

        info!(
            "{}: rep {} {:?} (min {:.1}°, fault {}, score {:.1})",
            self.name, self.total_reps, outcome, self.current_rep_min_angle, self.current_rep_has_error, score
        );

        self.state = RepState::Top;
        self.current_rep_has_error = false;
        self.current_rep_min_angle = f64::INFINITY;
        self.down_frames = 0;
        outcome
    }

    /// Exercise name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> RepState {
        self.state
    }

    /// Completed reps
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.total_reps
    }

    /// Correct reps
    #[must_use]
    pub const fn correct(&self) -> u32 {
        self.correct_reps
    }

    /// Wrong reps
    #[must_use]
    pub const fn wrong(&self) -> u32 {
        self.wrong_reps
    }

    /// Frames spent below the bottom threshold in the current rep
    #[must_use]
    pub const fn down_frames(&self) -> u32 {
        self.down_frames
    }

    /// Lowest angle reached in the current rep (infinite outside a rep)
    #[must_use]
    pub const fn current_min_angle(&self) -> f64 {
        self.current_rep_min_angle
    }

    /// Snapshot of the counts
    #[must_use]
    pub fn summary(&self) -> RepSummary {
        RepSummary {
            name: self.name.clone(),
            total: self.total_reps,
            correct: self.correct_reps,
            wrong: self.wrong_reps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAN: RepSignal = RepSignal { fault: false, score: 80.0 };

    fn feed(counter: &mut RepCounter, angles: &[f64], signal: RepSignal) -> Vec<RepOutcome> {
        angles.iter().filter_map(|&a| counter.update_signal(Some(a), signal)).collect()
    }

    #[test]
    fn test_first_sample_only_primes() {
        let mut counter = RepCounter::new("squat", RepCounterConfig::default());
        assert!(counter.update_signal(Some(90.0), CLEAN).is_none());
        assert_eq!(counter.state(), RepState::Top);
    }

    #[test]
    fn test_implausible_angles_ignored() {
        let mut counter = RepCounter::new("squat", RepCounterConfig::default());
        counter.update_signal(Some(160.0), CLEAN);
        counter.update_signal(Some(30.0), CLEAN);
        counter.update_signal(Some(250.0), CLEAN);
        counter.update_signal(None, CLEAN);
        assert_eq!(counter.state(), RepState::Top);

        // 30° was never stored, so this is a 60° descent from 160
        counter.update_signal(Some(100.0), CLEAN);
        assert_eq!(counter.state(), RepState::Down);
    }

    #[test]
    fn test_single_correct_rep() {
        let mut counter = RepCounter::new("squat", RepCounterConfig::default());
        let outcomes = feed(
            &mut counter,
            &[160.0, 160.0, 140.0, 120.0, 100.0, 100.0, 105.0, 130.0, 155.0, 160.0],
            CLEAN,
        );
        assert_eq!(outcomes, vec![RepOutcome::Correct]);
        assert_eq!(counter.summary(), RepSummary { name: "squat".into(), total: 1, correct: 1, wrong: 0 });
        assert_eq!(counter.state(), RepState::Top);
    }

    #[test]
    fn test_too_few_down_frames_stays_down() {
        let mut counter = RepCounter::new("squat", RepCounterConfig::default());
        feed(&mut counter, &[160.0, 140.0, 120.0, 100.0, 108.0, 130.0, 155.0], CLEAN);
        assert_eq!(counter.total(), 0);
        assert_eq!(counter.state(), RepState::Down);
        assert_eq!(counter.down_frames(), 2);
    }

    #[test]
    fn test_shallow_rep_is_wrong() {
        let mut counter = RepCounter::new("squat", RepCounterConfig::default());
        // Bottoms out at exactly 105: not past 110 - 5
        let outcomes = feed(
            &mut counter,
            &[160.0, 140.0, 120.0, 105.0, 106.0, 107.0, 130.0, 155.0],
            CLEAN,
        );
        assert_eq!(outcomes, vec![RepOutcome::Wrong]);
    }

    #[test]
    fn test_low_completion_score_is_wrong() {
        let mut counter = RepCounter::new("squat", RepCounterConfig::default());
        feed(&mut counter, &[160.0, 140.0, 120.0, 100.0, 100.0, 100.0, 130.0], CLEAN);
        let outcome = counter.update_signal(Some(155.0), RepSignal { fault: false, score: 69.9 });
        assert_eq!(outcome, Some(RepOutcome::Wrong));
    }

    #[test]
    fn test_counts_stay_consistent() {
        let mut counter = RepCounter::new("lunge", RepCounterConfig::default());
        let rep = [160.0, 140.0, 120.0, 100.0, 100.0, 100.0, 130.0, 160.0];
        for i in 0..6 {
            let signal = RepSignal { fault: i % 3 == 0, score: 80.0 };
            feed(&mut counter, &rep, signal);
            assert_eq!(counter.total(), counter.correct() + counter.wrong());
        }
        assert_eq!(counter.total(), 6);
        assert_eq!(counter.wrong(), 2);
    }
}
