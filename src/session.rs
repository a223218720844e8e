//! Per-subject session: scoring, repetition counting and alerting for one
//! sequential frame stream.
//!
//! Each subject owns exactly one [`Session`]. Nothing in here is shared
//! between sessions, so two subjects can never corrupt each other's counters
//! or alert timers.

use crate::{
    alert::{Alert, AlertDebouncer, AlertDispatcher, AlertNotifier},
    config::Config,
    exercise::Exercise,
    filters::{create_filter, ScoreFilter},
    landmarks::{BodyPart, Landmark, Pose, PRECHECK_PARTS},
    rep_counter::{RepCounter, RepOutcome, RepSummary},
    scorer::{FrameAnalysis, FrameScorer, LimbFaults},
    Error, Result,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc, time::Duration};

/// One frame from the pose estimator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Capture time in milliseconds (any epoch, non-decreasing)
    pub timestamp_ms: u64,
    /// Exercise identifier; unknown or empty scores as standing
    #[serde(default)]
    pub exercise: String,
    /// The 33 pose landmarks
    pub landmarks: Vec<Landmark>,
}

/// Delivery record for a fired alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDelivery {
    /// The alert
    pub alert: Alert,
    /// Topic it was sent on
    pub topic: String,
    /// Whether the notifier accepted it
    pub delivered: bool,
}

/// Result of a scored frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredFrame {
    /// Raw analysis
    pub analysis: FrameAnalysis,
    /// Score after the session's score filter
    pub smoothed_score: f64,
    /// Outcome if this frame completed a rep
    pub rep: Option<RepOutcome>,
    /// Alerts fired by this frame
    pub alerts: Vec<AlertDelivery>,
}

/// What happened to a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FrameOutcome {
    /// Torso not visible enough; nothing was scored
    NotVisible {
        /// Parts below the visibility threshold
        missing: Vec<BodyPart>,
    },
    /// The estimator found no pose; nothing was scored
    NoPose,
    /// Frame scored
    Scored(Box<ScoredFrame>),
}

impl FrameOutcome {
    /// Alerts fired by this frame
    #[must_use]
    pub fn alerts(&self) -> &[AlertDelivery] {
        match self {
            Self::Scored(scored) => &scored.alerts,
            Self::NotVisible { .. } | Self::NoPose => &[],
        }
    }

    /// Hand every fired alert to `dispatcher`, recording whether it was accepted
    pub fn deliver_alerts(&mut self, dispatcher: &AlertDispatcher) {
        let Self::Scored(scored) = self else {
            return;
        };
        for delivery in &mut scored.alerts {
            delivery.delivered = dispatcher.dispatch(&delivery.topic, &delivery.alert);
            if delivery.delivered {
                info!("Alert for {} sent on {}", delivery.alert.limb, delivery.topic);
            } else {
                warn!("Alert for {} on {} was not delivered", delivery.alert.limb, delivery.topic);
            }
        }
    }
}

/// Per-exercise statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseStats {
    /// Exercise
    pub exercise: Exercise,
    /// Frames scored as this exercise
    pub frames_scored: u64,
    /// Mean raw score over those frames
    pub average_score: f64,
    /// Repetition counts for cyclic exercises
    pub reps: Option<RepSummary>,
}

/// Summary of a session so far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Frames handed to the session
    pub frames_processed: u64,
    /// Frames skipped by the visibility pre-check
    pub frames_not_visible: u64,
    /// Frames without any detected pose
    pub frames_no_pose: u64,
    /// Statistics for every exercise seen
    pub exercises: Vec<ExerciseStats>,
    /// Mean of the per-exercise averages (0 when nothing was scored)
    pub session_score: f64,
}

struct TrackedCounter {
    counter: RepCounter,
    knee_filter: Box<dyn ScoreFilter>,
}

#[derive(Debug, Default, Clone, Copy)]
struct ScoreTally {
    frames: u64,
    sum: f64,
}

/// Scoring session for one subject
pub struct Session {
    scorer: FrameScorer,
    precheck_threshold: f64,
    counters: HashMap<Exercise, TrackedCounter>,
    debouncer: AlertDebouncer,
    dispatcher: AlertDispatcher,
    score_filter: Box<dyn ScoreFilter>,
    tallies: HashMap<Exercise, ScoreTally>,
    first_timestamp_ms: Option<u64>,
    last_timestamp_ms: Option<u64>,
    frames_processed: u64,
    frames_not_visible: u64,
    frames_no_pose: u64,
}

impl Session {
    /// Create a session
    ///
    /// # Errors
    ///
    /// Fails if a configured filter descriptor is invalid.
    pub fn new(config: &Config, notifier: Arc<dyn AlertNotifier>) -> Result<Self> {
        let mut counters = HashMap::new();
        for exercise in Exercise::CYCLIC {
            counters.insert(
                exercise,
                TrackedCounter {
                    counter: RepCounter::new(exercise.id(), config.rep_counter.clone()),
                    knee_filter: create_filter(&config.filter.knee_angle)?,
                },
            );
        }

        Ok(Self {
            scorer: FrameScorer::new(config.scoring.clone()),
            precheck_threshold: config.visibility.precheck_threshold,
            counters,
            debouncer: AlertDebouncer::new(&config.alerts),
            dispatcher: AlertDispatcher::new(config.alerts.device_id.clone(), notifier),
            score_filter: create_filter(&config.filter.score)?,
            tallies: HashMap::new(),
            first_timestamp_ms: None,
            last_timestamp_ms: None,
            frames_processed: 0,
            frames_not_visible: 0,
            frames_no_pose: 0,
        })
    }

    /// The dispatcher alerts of this session are delivered through
    #[must_use]
    pub const fn dispatcher(&self) -> &AlertDispatcher {
        &self.dispatcher
    }

    /// Process the next frame of the stream and deliver any alerts it fires
    ///
    /// # Errors
    ///
    /// Fails if the timestamp goes backwards or a required landmark is
    /// missing; the session is left untouched in either case.
    pub fn process(&mut self, frame: &Frame) -> Result<FrameOutcome> {
        let mut outcome = self.evaluate(frame)?;
        outcome.deliver_alerts(&self.dispatcher);
        Ok(outcome)
    }

    /// Process the next frame without delivering alerts
    ///
    /// Fired alerts come back with `delivered == false`. Pass the outcome to
    /// [`FrameOutcome::deliver_alerts`] once the session is no longer locked.
    /// An empty landmark list means no pose was detected and yields
    /// [`FrameOutcome::NoPose`].
    ///
    /// # Errors
    ///
    /// Same as [`Session::process`].
    pub fn evaluate(&mut self, frame: &Frame) -> Result<FrameOutcome> {
        if let Some(last) = self.last_timestamp_ms {
            if frame.timestamp_ms < last {
                return Err(Error::InvalidInput(format!(
                    "Frame timestamp {} ms is earlier than previous frame at {} ms",
                    frame.timestamp_ms, last
                )));
            }
        }

        if frame.landmarks.is_empty() {
            let now = self.advance_clock(frame.timestamp_ms);
            self.frames_no_pose += 1;
            self.debouncer.update_all(&LimbFaults::default(), now);
            debug!("No pose detected in frame at {} ms", frame.timestamp_ms);
            return Ok(FrameOutcome::NoPose);
        }

        let pose = Pose::new(frame.landmarks.clone());
        let missing = pose.invisible_parts(&PRECHECK_PARTS, self.precheck_threshold)?;
        let exercise = Exercise::resolve(&frame.exercise);
        let analysis = if missing.is_empty() {
            Some(self.scorer.score_exercise(&pose, exercise)?)
        } else {
            None
        };

        // Nothing below can fail; commit the frame
        let now = self.advance_clock(frame.timestamp_ms);

        let Some(analysis) = analysis else {
            self.frames_not_visible += 1;
            self.debouncer.update_all(&LimbFaults::default(), now);
            let names: Vec<&str> = missing.iter().map(|p| p.label()).collect();
            warn!("Frame at {} ms skipped, not visible: {}", frame.timestamp_ms, names.join(", "));
            return Ok(FrameOutcome::NotVisible { missing });
        };

        let smoothed_score = self.score_filter.apply(analysis.score);

        let rep = self.counters.get_mut(&exercise).and_then(|tracked| {
            let knee = analysis.angles.left_knee.map(|a| tracked.knee_filter.apply(a));
            tracked.counter.update(knee, &analysis)
        });

        let alerts = self
            .debouncer
            .update_all(&analysis.faults, now)
            .into_iter()
            .map(|alert| AlertDelivery {
                topic: self.debouncer.topic(alert.limb).to_string(),
                alert,
                delivered: false,
            })
            .collect();

        let tally = self.tallies.entry(exercise).or_default();
        tally.frames += 1;
        tally.sum += analysis.score;

        Ok(FrameOutcome::Scored(Box::new(ScoredFrame {
            analysis,
            smoothed_score,
            rep,
            alerts,
        })))
    }

    /// Record a committed frame; returns its session time
    fn advance_clock(&mut self, timestamp_ms: u64) -> Duration {
        let first = *self.first_timestamp_ms.get_or_insert(timestamp_ms);
        self.last_timestamp_ms = Some(timestamp_ms);
        self.frames_processed += 1;
        Duration::from_millis(timestamp_ms - first)
    }

    /// Current counts for every tracked exercise
    #[must_use]
    pub fn rep_summaries(&self) -> Vec<RepSummary> {
        Exercise::CYCLIC
            .iter()
            .filter_map(|e| self.counters.get(e))
            .map(|tracked| tracked.counter.summary())
            .collect()
    }

    /// Counter for one exercise, if it is tracked
    #[must_use]
    pub fn counter(&self, exercise: Exercise) -> Option<&RepCounter> {
        self.counters.get(&exercise).map(|tracked| &tracked.counter)
    }

    /// Summary of everything processed so far
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn report(&self) -> SessionReport {
        let exercises: Vec<ExerciseStats> = Exercise::ALL
            .iter()
            .filter_map(|&exercise| {
                let tally = self.tallies.get(&exercise).copied().unwrap_or_default();
                let reps = self.counter(exercise).map(RepCounter::summary);
                let has_reps = reps.as_ref().is_some_and(|r| r.total > 0);
                (tally.frames > 0 || has_reps).then(|| ExerciseStats {
                    exercise,
                    frames_scored: tally.frames,
                    average_score: if tally.frames > 0 { tally.sum / tally.frames as f64 } else { 0.0 },
                    reps,
                })
            })
            .collect();

        let scored: Vec<f64> = exercises
            .iter()
            .filter(|s| s.frames_scored > 0)
            .map(|s| s.average_score)
            .collect();
        let session_score = if scored.is_empty() {
            0.0
        } else {
            scored.iter().sum::<f64>() / scored.len() as f64
        };

        SessionReport {
            frames_processed: self.frames_processed,
            frames_not_visible: self.frames_not_visible,
            frames_no_pose: self.frames_no_pose,
            exercises,
            session_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{alert::NullNotifier, constants::NUM_POSE_LANDMARKS};

    fn session() -> Session {
        Session::new(&Config::default(), Arc::new(NullNotifier)).unwrap()
    }

    fn frame(timestamp_ms: u64, visibility: f64) -> Frame {
        Frame {
            timestamp_ms,
            exercise: "standing".to_string(),
            landmarks: vec![Landmark::planar(0.5, 0.5, visibility); NUM_POSE_LANDMARKS],
        }
    }

    #[test]
    fn test_invisible_torso_is_skipped() {
        let mut s = session();
        match s.process(&frame(0, 0.2)).unwrap() {
            FrameOutcome::NotVisible { missing } => assert_eq!(missing, PRECHECK_PARTS.to_vec()),
            other => panic!("Expected NotVisible, got {other:?}"),
        }
        let report = s.report();
        assert_eq!(report.frames_processed, 1);
        assert_eq!(report.frames_not_visible, 1);
        assert!(report.exercises.is_empty());
        assert_eq!(report.session_score, 0.0);
    }

    #[test]
    fn test_timestamps_must_not_go_backwards() {
        let mut s = session();
        s.process(&frame(1000, 0.9)).unwrap();
        assert!(matches!(s.process(&frame(999, 0.9)), Err(Error::InvalidInput(_))));
        assert_eq!(s.report().frames_processed, 1);
        assert!(s.process(&frame(1000, 0.9)).is_ok());
    }

    #[test]
    fn test_truncated_landmarks_fail_without_side_effects() {
        let mut s = session();
        let mut f = frame(0, 0.9);
        f.landmarks.truncate(20);
        assert!(matches!(s.process(&f), Err(Error::MissingLandmark { .. })));
        assert_eq!(s.report().frames_processed, 0);
    }

    #[test]
    fn test_empty_landmarks_mean_no_pose() {
        let mut s = session();
        s.process(&frame(0, 0.9)).unwrap();

        let mut empty = frame(100, 0.9);
        empty.landmarks.clear();
        assert_eq!(s.process(&empty).unwrap(), FrameOutcome::NoPose);
        assert!(s.process(&frame(200, 0.9)).is_ok());

        let report = s.report();
        assert_eq!(report.frames_processed, 3);
        assert_eq!(report.frames_no_pose, 1);
        assert_eq!(report.frames_not_visible, 0);
        assert_eq!(report.exercises[0].frames_scored, 2);
    }

    #[test]
    fn test_evaluate_leaves_alerts_undelivered() {
        let mut s = session();
        // Left wrist folded back over the shoulder keeps the left arm at fault
        let mut faulty = frame(0, 0.9);
        faulty.exercise = "plank".to_string();
        faulty.landmarks[BodyPart::LeftShoulder.index()] = Landmark::planar(0.6, 0.3, 0.9);
        faulty.landmarks[BodyPart::LeftElbow.index()] = Landmark::planar(0.6, 0.45, 0.9);
        faulty.landmarks[BodyPart::LeftWrist.index()] = Landmark::planar(0.6, 0.3, 0.9);

        let mut fired = Vec::new();
        for t in (0..=3000).step_by(500) {
            faulty.timestamp_ms = t;
            let outcome = s.evaluate(&faulty).unwrap();
            fired.extend(outcome.alerts().to_vec());
        }
        assert!(!fired.is_empty());
        assert!(fired.iter().all(|a| !a.delivered));
    }

    #[test]
    fn test_tracks_squat_and_lunge() {
        let s = session();
        let names: Vec<String> = s.rep_summaries().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["squat", "lunge"]);
        assert!(s.counter(Exercise::Plank).is_none());
    }
}
