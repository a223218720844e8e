//! Frame replay application: feeds a JSON-lines frame stream through one
//! session and reports the result.

use crate::{
    alert::{AlertNotifier, JsonLinesNotifier, LogNotifier, NullNotifier},
    config::Config,
    error::{Error, Result},
    exercise::Exercise,
    session::{Frame, FrameOutcome, Session, SessionReport},
};
use log::{debug, info};
use serde::Serialize;
use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::PathBuf,
    str::FromStr,
    sync::Arc,
};

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Where frames are read from
    pub input: StreamTarget,
    /// Where per-frame results are written, if anywhere
    pub output: Option<StreamTarget>,
    /// How alerts are delivered
    pub alert_mode: AlertMode,
    /// Score every frame as this exercise instead of the frame's own id
    pub exercise_override: Option<Exercise>,
    /// Suppress per-frame output
    pub summary_only: bool,
    /// Scoring, counting and alert configuration
    pub config: Config,
}

/// A file path or a standard stream (`-`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTarget {
    /// Standard input or output
    Std,
    /// File path
    File(PathBuf),
}

impl FromStr for StreamTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" => Err(Error::InvalidInput("Empty path".to_string())),
            "-" => Ok(Self::Std),
            path => Ok(Self::File(PathBuf::from(path))),
        }
    }
}

/// Alert delivery mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertMode {
    /// Log alerts
    Log,
    /// Discard alerts
    None,
    /// Print alerts to stdout as JSON lines
    Stdout,
}

impl FromStr for AlertMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "none" => Ok(Self::None),
            "stdout" => Ok(Self::Stdout),
            other => Err(Error::InvalidInput(format!(
                "Unknown alert mode '{other}'. Available modes: log, none, stdout"
            ))),
        }
    }
}

impl AlertMode {
    fn notifier(self) -> Arc<dyn AlertNotifier> {
        match self {
            Self::Log => Arc::new(LogNotifier),
            Self::None => Arc::new(NullNotifier),
            Self::Stdout => Arc::new(JsonLinesNotifier::new(io::stdout())),
        }
    }
}

#[derive(Serialize)]
struct FrameRecord<'a> {
    line: usize,
    timestamp_ms: u64,
    outcome: &'a FrameOutcome,
}

/// Replays a recorded frame stream through a single session
pub struct ReplayApp {
    config: AppConfig,
    session: Session,
}

impl ReplayApp {
    /// Create the application
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid.
    pub fn new(config: AppConfig) -> Result<Self> {
        info!("Initializing form coach replay");
        config.config.validate()?;
        let session = Session::new(&config.config, config.alert_mode.notifier())?;
        if let Some(exercise) = config.exercise_override {
            info!("Scoring every frame as {}", exercise);
        }
        Ok(Self { config, session })
    }

    /// Open the configured streams and replay them
    ///
    /// # Errors
    ///
    /// Fails on I/O errors, malformed frames, or frames the session rejects.
    pub fn run(&mut self) -> Result<SessionReport> {
        let reader: Box<dyn BufRead> = match &self.config.input {
            StreamTarget::Std => Box::new(io::stdin().lock()),
            StreamTarget::File(path) => {
                info!("Reading frames from {}", path.display());
                Box::new(BufReader::new(File::open(path)?))
            }
        };

        let mut writer: Box<dyn Write> = match (&self.config.output, self.config.summary_only) {
            (_, true) | (None, _) => Box::new(io::sink()),
            (Some(StreamTarget::Std), false) => Box::new(io::stdout()),
            (Some(StreamTarget::File(path)), false) => Box::new(BufWriter::new(File::create(path)?)),
        };

        let report = self.replay(reader, &mut writer)?;
        writer.flush()?;
        Ok(report)
    }

    /// Replay frames from `reader`, writing one JSON line per frame to `out`
    ///
    /// Blank lines are skipped. Line numbers in errors are 1-based.
    ///
    /// # Errors
    ///
    /// Aborts on the first malformed or rejected frame.
    pub fn replay<R: BufRead, W: Write>(&mut self, reader: R, mut out: W) -> Result<SessionReport> {
        for (index, line) in reader.lines().enumerate() {
            let line_no = index + 1;
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let mut frame: Frame = serde_json::from_str(&line)
                .map_err(|e| Error::InvalidInput(format!("Line {line_no}: malformed frame: {e}")))?;
            if let Some(exercise) = self.config.exercise_override {
                frame.exercise = exercise.id().to_string();
            }

            let outcome = self
                .session
                .process(&frame)
                .map_err(|e| Error::InvalidInput(format!("Line {line_no}: {e}")))?;

            if let FrameOutcome::Scored(scored) = &outcome {
                debug!(
                    "Line {}: score {:.1} (smoothed {:.1}), errors {:?}",
                    line_no, scored.analysis.score, scored.smoothed_score, scored.analysis.error_codes
                );
            }

            let record = FrameRecord {
                line: line_no,
                timestamp_ms: frame.timestamp_ms,
                outcome: &outcome,
            };
            serde_json::to_writer(&mut out, &record)?;
            writeln!(out)?;
        }

        let report = self.session.report();
        info!(
            "Replay finished: {} frames, {} not visible, {} without pose, session score {:.1}",
            report.frames_processed, report.frames_not_visible, report.frames_no_pose, report.session_score
        );
        Ok(report)
    }

    /// The session being fed
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }
}
