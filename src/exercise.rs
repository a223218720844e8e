//! Exercise identifiers and their scoring parameters.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Exercises the scorer knows how to parameterize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exercise {
    /// Upright standing posture (the default)
    Standing,
    /// Straight-arm plank hold
    Plank,
    /// Push-up
    Pushup,
    /// Squat (repetitions counted)
    Squat,
    /// Lunge (repetitions counted)
    Lunge,
}

/// Scoring constants for one exercise
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExerciseParams {
    /// Elbow angle that earns the peak elbow score
    pub target_elbow_deg: f64,
    /// Sigmoid width for the elbow score
    pub elbow_width: f64,
    /// Per-side elbow score below which the arm is flagged; 0 disables the check
    pub min_elbow_score: f64,
    /// Expected knee angle
    pub target_knee_deg: f64,
    /// Allowed knee deviation before the leg is flagged
    pub knee_deviation_tolerance: f64,
}

const STANDING: ExerciseParams = ExerciseParams {
    target_elbow_deg: 160.0,
    elbow_width: 35.0,
    min_elbow_score: 6.0,
    target_knee_deg: 175.0,
    knee_deviation_tolerance: 20.0,
};

const PLANK: ExerciseParams = ExerciseParams {
    target_elbow_deg: 170.0,
    elbow_width: 30.0,
    min_elbow_score: 6.0,
    target_knee_deg: 175.0,
    knee_deviation_tolerance: 15.0,
};

const PUSHUP: ExerciseParams = ExerciseParams {
    target_elbow_deg: 160.0,
    elbow_width: 45.0,
    min_elbow_score: 5.0,
    target_knee_deg: 175.0,
    knee_deviation_tolerance: 15.0,
};

// Knee targets sit mid-range so only collapse or lockout is flagged.
const SQUAT: ExerciseParams = ExerciseParams {
    target_elbow_deg: 160.0,
    elbow_width: 60.0,
    min_elbow_score: 0.0,
    target_knee_deg: 120.0,
    knee_deviation_tolerance: 60.0,
};

const LUNGE: ExerciseParams = ExerciseParams {
    target_elbow_deg: 160.0,
    elbow_width: 60.0,
    min_elbow_score: 0.0,
    target_knee_deg: 110.0,
    knee_deviation_tolerance: 70.0,
};

impl Exercise {
    /// Every known exercise
    pub const ALL: [Self; 5] = [Self::Standing, Self::Plank, Self::Pushup, Self::Squat, Self::Lunge];

    /// Exercises whose repetitions are counted
    pub const CYCLIC: [Self; 2] = [Self::Squat, Self::Lunge];

    /// Resolve an identifier, falling back to [`Exercise::Standing`]
    #[must_use]
    pub fn resolve(id: &str) -> Self {
        id.parse().unwrap_or_else(|_| {
            log::debug!("Unknown exercise '{id}', scoring as standing");
            Self::Standing
        })
    }

    /// Identifier string
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Standing => "standing",
            Self::Plank => "plank",
            Self::Pushup => "pushup",
            Self::Squat => "squat",
            Self::Lunge => "lunge",
        }
    }

    /// Scoring parameters
    #[must_use]
    pub const fn params(self) -> &'static ExerciseParams {
        match self {
            Self::Standing => &STANDING,
            Self::Plank => &PLANK,
            Self::Pushup => &PUSHUP,
            Self::Squat => &SQUAT,
            Self::Lunge => &LUNGE,
        }
    }

    /// True for exercises with a repetition counter
    #[must_use]
    pub const fn is_cyclic(self) -> bool {
        matches!(self, Self::Squat | Self::Lunge)
    }
}

impl Default for Exercise {
    fn default() -> Self {
        Self::Standing
    }
}

impl FromStr for Exercise {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "standing" => Ok(Self::Standing),
            "plank" => Ok(Self::Plank),
            "pushup" => Ok(Self::Pushup),
            "squat" => Ok(Self::Squat),
            "lunge" => Ok(Self::Lunge),
            _ => Err(Error::InvalidInput(format!("Unknown exercise: {s}"))),
        }
    }
}

impl fmt::Display for Exercise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
