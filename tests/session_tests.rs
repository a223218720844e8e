//! End-to-end session tests: counting, alerting and reporting


use form_coach::{
    alert::{Alert, AlertNotifier, NullNotifier},
    config::Config,
    exercise::Exercise,
    rep_counter::{RepOutcome, RepState, RepSummary},
    registry::SessionRegistry,
    scorer::Limb,
    session::{Frame, FrameOutcome, Session},
    Error, Result,
};
use parking_lot::Mutex;
use std::{
    sync::{mpsc, Arc},
    thread,
    time::{Duration, Instant},
};
use test_helpers::{assert_close, knee_trace, PoseBuilder, CLEAN_REP};

/// Records every delivered alert
#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String, Limb)>>,
}

impl AlertNotifier for RecordingNotifier {
    fn notify(&self, device_id: &str, topic: &str, alert: &Alert) -> Result<()> {
        self.sent.lock().push((device_id.to_string(), topic.to_string(), alert.limb));
        Ok(())
    }

    fn name(&self) -> &str {
        "RecordingNotifier"
    }
}

struct BrokenNotifier;

impl AlertNotifier for BrokenNotifier {
    fn notify(&self, _: &str, _: &str, _: &Alert) -> Result<()> {
        Err(Error::AlertDispatch("device offline".to_string()))
    }

    fn name(&self) -> &str {
        "BrokenNotifier"
    }
}

/// Signals when delivery starts, then takes its time
struct SlowNotifier {
    started: Mutex<mpsc::Sender<()>>,
    delay: Duration,
}

impl AlertNotifier for SlowNotifier {
    fn notify(&self, _: &str, _: &str, _: &Alert) -> Result<()> {
        // The receiver may already be gone once the test has its answer
        let _ = self.started.lock().send(());
        thread::sleep(self.delay);
        Ok(())
    }

    fn name(&self) -> &str {
        "SlowNotifier"
    }
}

fn session() -> Session {
    Session::new(&Config::default(), Arc::new(NullNotifier)).unwrap()
}

fn feed(session: &mut Session, frames: &[Frame]) -> Vec<FrameOutcome> {
    frames.iter().map(|f| session.process(f).unwrap()).collect()
}

fn rep_events(outcomes: &[FrameOutcome]) -> Vec<RepOutcome> {
    outcomes
        .iter()
        .filter_map(|o| match o {
            FrameOutcome::Scored(scored) => scored.rep,
            FrameOutcome::NotVisible { .. } | FrameOutcome::NoPose => None,
        })
        .collect()
}

fn summary(session: &Session, name: &str) -> RepSummary {
    session.rep_summaries().into_iter().find(|s| s.name == name).unwrap()
}

#[test]
fn test_clean_squat_counts_one_correct_rep() {
    let mut s = session();
    let outcomes = feed(&mut s, &knee_trace("squat", &CLEAN_REP, 33));

    assert_eq!(rep_events(&outcomes), vec![RepOutcome::Correct]);
    assert_eq!(summary(&s, "squat"), RepSummary { name: "squat".into(), total: 1, correct: 1, wrong: 0 });
    assert_eq!(summary(&s, "lunge").total, 0);
    assert_eq!(s.counter(Exercise::Squat).unwrap().state(), RepState::Top);
}

#[test]
fn test_fault_during_descent_makes_rep_wrong() {
    let mut s = session();
    let mut frames = knee_trace("squat", &CLEAN_REP, 33);
    // Collapse the right knee on one bottom frame; the left knee still drives the counter
    frames[5] = PoseBuilder::upright().knee_angles(100.0, 50.0).frame(frames[5].timestamp_ms, "squat");

    let outcomes = feed(&mut s, &frames);
    assert_eq!(rep_events(&outcomes), vec![RepOutcome::Wrong]);
    assert_eq!(summary(&s, "squat").wrong, 1);
}

#[test]
fn test_oscillation_near_top_never_descends() {
    let mut s = session();
    let angles: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { 148.0 } else { 152.0 }).collect();
    feed(&mut s, &knee_trace("squat", &angles, 33));

    let counter = s.counter(Exercise::Squat).unwrap();
    assert_eq!(counter.state(), RepState::Top);
    assert_eq!(counter.total(), 0);
}

#[test]
fn test_squat_and_lunge_counters_are_independent() {
    let mut s = session();
    let mut frames = knee_trace("lunge", &CLEAN_REP, 33);
    let offset = frames.len() as u64 * 33;
    frames.extend(knee_trace("squat", &CLEAN_REP, 33).into_iter().map(|mut f| {
        f.timestamp_ms += offset;
        f
    }));
    frames.extend(knee_trace("lunge", &CLEAN_REP, 33).into_iter().map(|mut f| {
        f.timestamp_ms += 2 * offset;
        f
    }));
    feed(&mut s, &frames);

    assert_eq!(summary(&s, "lunge").correct, 2);
    assert_eq!(summary(&s, "squat").correct, 1);
}

#[test]
fn test_non_cyclic_exercises_do_not_count() {
    let mut s = session();
    let outcomes = feed(&mut s, &knee_trace("plank", &CLEAN_REP, 33));
    assert!(rep_events(&outcomes).is_empty());
    assert!(s.rep_summaries().iter().all(|r| r.total == 0));
}

#[test]
fn test_persistent_arm_fault_alerts_once() {
    let notifier = Arc::new(RecordingNotifier::default());
    let mut config = Config::default();
    config.alerts.device_id = "band-7".to_string();
    let mut s = Session::new(&config, notifier.clone()).unwrap();

    let pose = PoseBuilder::upright().bent_left_elbow();
    let mut delivered = Vec::new();
    for i in 0..=31u64 {
        if let FrameOutcome::Scored(scored) = s.process(&pose.frame(i * 100, "standing")).unwrap() {
            delivered.extend(scored.alerts);
        }
    }

    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].delivered);
    assert_eq!(delivered[0].alert.limb, Limb::LeftArm);
    assert_eq!(delivered[0].alert.timestamp.as_millis(), 3000);
    assert_eq!(delivered[0].topic, "form/left_arm");
    assert_eq!(
        *notifier.sent.lock(),
        vec![("band-7".to_string(), "form/left_arm".to_string(), Limb::LeftArm)]
    );
}

#[test]
fn test_alert_timing_uses_timestamps_not_frame_count() {
    let notifier = Arc::new(RecordingNotifier::default());
    let mut s = Session::new(&Config::default(), notifier.clone()).unwrap();
    let pose = PoseBuilder::upright().bent_left_elbow();

    // 300 frames but only 2.99 s of wall-clock time
    for i in 0..300u64 {
        s.process(&pose.frame(10_000 + i * 10, "standing")).unwrap();
    }
    assert!(notifier.sent.lock().is_empty());

    // Clock offset is relative to the first frame
    s.process(&pose.frame(13_000, "standing")).unwrap();
    assert_eq!(notifier.sent.lock().len(), 1);
}

#[test]
fn test_invisible_frame_resets_fault_timer() {
    let notifier = Arc::new(RecordingNotifier::default());
    let mut s = Session::new(&Config::default(), notifier.clone()).unwrap();
    let faulty = PoseBuilder::upright().bent_left_elbow();
    let hidden = PoseBuilder::upright().all_visibility(0.1);

    for t in (0..=2500).step_by(100) {
        s.process(&faulty.frame(t, "standing")).unwrap();
    }
    let outcome = s.process(&hidden.frame(2600, "standing")).unwrap();
    assert!(matches!(outcome, FrameOutcome::NotVisible { ref missing } if missing.len() == 5));

    for t in (2700..=5600).step_by(100) {
        s.process(&faulty.frame(t, "standing")).unwrap();
    }
    assert!(notifier.sent.lock().is_empty());

    s.process(&faulty.frame(5700, "standing")).unwrap();
    assert_eq!(notifier.sent.lock().len(), 1);
}

#[test]
fn test_dispatch_failure_does_not_affect_scoring() {
    let mut s = Session::new(&Config::default(), Arc::new(BrokenNotifier)).unwrap();
    let pose = PoseBuilder::upright().bent_left_elbow();

    let mut failed = 0;
    for i in 0..=30u64 {
        let FrameOutcome::Scored(scored) = s.process(&pose.frame(i * 100, "standing")).unwrap() else {
            panic!("frame should be visible");
        };
        assert_eq!(scored.analysis.error_codes, vec![1]);
        failed += scored.alerts.iter().filter(|a| !a.delivered).count();
    }
    assert_eq!(failed, 1);
    assert_eq!(s.report().frames_processed, 31);
}

#[test]
fn test_smoothed_score_follows_raw_score() {
    let mut s = session();
    let clean = PoseBuilder::upright();
    let bent = PoseBuilder::upright().bent_left_elbow();

    let first = feed(&mut s, &[clean.frame(0, "standing")]);
    let FrameOutcome::Scored(first) = &first[0] else { panic!() };
    assert_close(first.smoothed_score, first.analysis.score, 1e-9);

    let second = s.process(&bent.frame(33, "standing")).unwrap();
    let FrameOutcome::Scored(second) = second else { panic!() };
    let expected = 0.3 * second.analysis.score + 0.7 * first.analysis.score;
    assert_close(second.smoothed_score, expected, 1e-9);
}

#[test]
fn test_report_averages_per_exercise() {
    let mut s = session();
    feed(&mut s, &knee_trace("squat", &CLEAN_REP, 33));
    let standing_start = CLEAN_REP.len() as u64 * 33;
    s.process(&PoseBuilder::upright().frame(standing_start, "standing")).unwrap();
    s.process(&PoseBuilder::upright().all_visibility(0.2).frame(standing_start + 33, "standing"))
        .unwrap();

    let report = s.report();
    assert_eq!(report.frames_processed, CLEAN_REP.len() as u64 + 2);
    assert_eq!(report.frames_not_visible, 1);

    let exercises: Vec<Exercise> = report.exercises.iter().map(|e| e.exercise).collect();
    assert_eq!(exercises, vec![Exercise::Standing, Exercise::Squat]);

    let squat = &report.exercises[1];
    assert_eq!(squat.frames_scored, CLEAN_REP.len() as u64);
    assert_eq!(squat.reps.as_ref().unwrap().correct, 1);
    assert!(report.exercises[0].reps.is_none());

    let mean = (report.exercises[0].average_score + squat.average_score) / 2.0;
    assert_close(report.session_score, mean, 1e-9);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["exercises"][1]["exercise"], "squat");
}

#[test]
fn test_registry_isolates_subjects_across_threads() {
    let registry = Arc::new(SessionRegistry::new(Config::default(), Arc::new(NullNotifier)).unwrap());

    let handles: Vec<_> = ["alice", "bob", "carol"]
        .into_iter()
        .enumerate()
        .map(|(reps, subject)| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let mut t = 0;
                for _ in 0..=reps {
                    for mut frame in knee_trace("squat", &CLEAN_REP, 33) {
                        frame.timestamp_ms += t;
                        registry.process(subject, &frame).unwrap();
                    }
                    t += CLEAN_REP.len() as u64 * 33;
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let summaries = registry.summaries();
    let squats = |subject: &str| summaries[subject].iter().find(|s| s.name == "squat").unwrap().correct;
    assert_eq!(squats("alice"), 1);
    assert_eq!(squats("bob"), 2);
    assert_eq!(squats("carol"), 3);
    assert_eq!(registry.reports()["carol"].frames_processed, 3 * CLEAN_REP.len() as u64);
}

#[test]
fn test_no_pose_frame_resets_fault_timer_and_keeps_counting() {
    let notifier = Arc::new(RecordingNotifier::default());
    let mut s = Session::new(&Config::default(), notifier.clone()).unwrap();
    let faulty = PoseBuilder::upright().bent_left_elbow();
    let empty = Frame {
        timestamp_ms: 2600,
        exercise: "standing".to_string(),
        landmarks: Vec::new(),
    };

    for t in (0..=2500).step_by(100) {
        s.process(&faulty.frame(t, "standing")).unwrap();
    }
    assert_eq!(s.process(&empty).unwrap(), FrameOutcome::NoPose);
    for t in (2700..=5600).step_by(100) {
        s.process(&faulty.frame(t, "standing")).unwrap();
    }
    assert!(notifier.sent.lock().is_empty());

    s.process(&faulty.frame(5700, "standing")).unwrap();
    assert_eq!(notifier.sent.lock().len(), 1);
    assert_eq!(s.report().frames_no_pose, 1);
}

#[test]
fn test_slow_delivery_does_not_block_queries() {
    let (tx, rx) = mpsc::channel();
    let notifier = Arc::new(SlowNotifier {
        started: Mutex::new(tx),
        delay: Duration::from_millis(800),
    });
    let registry = Arc::new(SessionRegistry::new(Config::default(), notifier).unwrap());

    let worker = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || {
            let pose = PoseBuilder::upright().bent_left_elbow();
            for i in 0..=30u64 {
                registry.process("alice", &pose.frame(i * 100, "standing")).unwrap();
            }
        })
    };

    rx.recv_timeout(Duration::from_secs(5)).expect("alert delivery should start");
    let started = Instant::now();
    let summaries = registry.summaries();
    let reports = registry.reports();
    let session_free = registry.session("alice").unwrap().try_lock().is_some();
    let elapsed = started.elapsed();
    worker.join().unwrap();

    assert!(elapsed < Duration::from_millis(400), "queries waited {elapsed:?}");
    assert!(session_free, "session stayed locked during delivery");
    assert_eq!(summaries["alice"].len(), 2);
    assert_eq!(reports["alice"].frames_processed, 31);
}
