//! Sessions for many subjects, keyed by subject id.
//!
//! Each subject gets its own [`Session`] behind its own lock, so frames for
//! different subjects can be processed in parallel while frames for the same
//! subject are serialized. Alerts are delivered after the session lock is
//! released, and queries never wait on a busy session: they fall back to the
//! snapshot published after that session's last frame.

use crate::{
    alert::{AlertDispatcher, AlertNotifier},
    config::Config,
    rep_counter::RepSummary,
    session::{Frame, FrameOutcome, Session, SessionReport},
    Result,
};
use log::info;
use parking_lot::Mutex;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

/// Shared handle to one subject's session
pub type SessionHandle = Arc<Mutex<Session>>;

/// Last published state of a session
#[derive(Debug, Clone)]
struct Snapshot {
    reps: Vec<RepSummary>,
    report: SessionReport,
}

impl Snapshot {
    fn of(session: &Session) -> Self {
        Self {
            reps: session.rep_summaries(),
            report: session.report(),
        }
    }
}

/// Lazily-populated map of subject sessions
pub struct SessionRegistry {
    config: Config,
    notifier: Arc<dyn AlertNotifier>,
    dispatcher: AlertDispatcher,
    sessions: Mutex<HashMap<String, SessionHandle>>,
    published: Mutex<HashMap<String, Snapshot>>,
}

impl SessionRegistry {
    /// Create an empty registry
    ///
    /// # Errors
    ///
    /// Fails if the configuration does not validate.
    pub fn new(config: Config, notifier: Arc<dyn AlertNotifier>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            dispatcher: AlertDispatcher::new(config.alerts.device_id.clone(), Arc::clone(&notifier)),
            config,
            notifier,
            sessions: Mutex::new(HashMap::new()),
            published: Mutex::new(HashMap::new()),
        })
    }

    /// Session for `subject`, created on first use
    ///
    /// # Errors
    ///
    /// Fails if a new session cannot be built from the configuration.
    pub fn session(&self, subject: &str) -> Result<SessionHandle> {
        let mut sessions = self.sessions.lock();
        if let Some(handle) = sessions.get(subject) {
            return Ok(Arc::clone(handle));
        }

        let session = Session::new(&self.config, Arc::clone(&self.notifier))?;
        self.published.lock().insert(subject.to_string(), Snapshot::of(&session));
        let handle = Arc::new(Mutex::new(session));
        sessions.insert(subject.to_string(), Arc::clone(&handle));
        info!("Started session for subject {}", subject);
        Ok(handle)
    }

    /// Process a frame for `subject`
    ///
    /// Only that subject's session is locked while the frame is scored.
    /// Fired alerts are delivered once the lock is released.
    ///
    /// # Errors
    ///
    /// Propagates session creation and frame processing errors.
    pub fn process(&self, subject: &str, frame: &Frame) -> Result<FrameOutcome> {
        let handle = self.session(subject)?;
        let mut outcome = {
            let mut session = handle.lock();
            let outcome = session.evaluate(frame)?;
            self.published.lock().insert(subject.to_string(), Snapshot::of(&session));
            outcome
        };
        outcome.deliver_alerts(&self.dispatcher);
        Ok(outcome)
    }

    /// Drop a subject's session; returns whether it existed
    pub fn remove(&self, subject: &str) -> bool {
        let removed = self.sessions.lock().remove(subject).is_some();
        self.published.lock().remove(subject);
        if removed {
            info!("Ended session for subject {}", subject);
        }
        removed
    }

    /// Rep summaries of every subject, ordered by subject id
    #[must_use]
    pub fn summaries(&self) -> BTreeMap<String, Vec<RepSummary>> {
        self.snapshot(|snapshot| snapshot.reps)
    }

    /// Session reports of every subject, ordered by subject id
    #[must_use]
    pub fn reports(&self) -> BTreeMap<String, SessionReport> {
        self.snapshot(|snapshot| snapshot.report)
    }

    /// Number of live sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Whether no sessions are live
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    fn snapshot<T>(&self, f: impl Fn(Snapshot) -> T) -> BTreeMap<String, T> {
        // Clone the handles first so the map lock is not held across sessions
        let handles: Vec<(String, SessionHandle)> = self
            .sessions
            .lock()
            .iter()
            .map(|(id, handle)| (id.clone(), Arc::clone(handle)))
            .collect();
        handles
            .into_iter()
            .filter_map(|(id, handle)| {
                // A busy session is reported as of its last published frame
                let snapshot = match handle.try_lock() {
                    Some(session) => Snapshot::of(&session),
                    None => self.published.lock().get(&id).cloned()?,
                };
                Some((id, f(snapshot)))
            })
            .collect()
    }
}
