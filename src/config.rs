//! Configuration management for form scoring sessions

use crate::{
    alert::AlertPolicy,
    constants::*,
    filters::create_filter,
    scorer::Limb,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Session configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Frame scoring tunables
    pub scoring: ScoringConfig,

    /// Repetition counter tunables
    pub rep_counter: RepCounterConfig,

    /// Pre-scoring visibility check
    pub visibility: VisibilityConfig,

    /// Alert debounce and delivery
    pub alerts: AlertConfig,

    /// Signal smoothing
    pub filter: FilterConfig,
}

/// Visibility requirement for one score component
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisibilityGate {
    /// Minimum visibility for a landmark to count as tracked
    pub threshold: f64,
    /// Fraction of the component's landmarks that must be tracked
    pub min_fraction: f64,
}

impl VisibilityGate {
    /// Create a gate
    #[must_use]
    pub const fn new(threshold: f64, min_fraction: f64) -> Self {
        Self { threshold, min_fraction }
    }
}

/// Frame scoring tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Shoulder level tolerance (torso-normalized)
    pub shoulder_tolerance: f64,

    /// Hip level tolerance (torso-normalized)
    pub hip_tolerance: f64,

    /// Spine tilt tolerance in degrees
    pub spine_tolerance_deg: f64,

    /// Tail gain of the Huber-like penalty
    pub huber_tail_gain: f64,

    /// Tolerance inflation at 90° yaw
    pub yaw_tolerance_gain: f64,

    /// Gate for the shoulder level component
    pub shoulder_gate: VisibilityGate,

    /// Gate for the hip level component
    pub hip_gate: VisibilityGate,

    /// Gate for the spine component
    pub spine_gate: VisibilityGate,

    /// Gate for the elbow component
    pub elbow_gate: VisibilityGate,

    /// Multiplier for a component failing its gate
    pub gate_penalty: f64,

    /// Lower bound of the visibility weight
    pub visibility_weight_floor: f64,

    /// Slope of the visibility weight over average visibility
    pub visibility_weight_gain: f64,

    /// Upper bound of the visibility weight
    pub visibility_weight_ceiling: f64,

    /// Multiple of the base tolerance at which alignment hints fire
    pub hint_factor: f64,
}

/// Repetition counter tunables (degrees unless noted)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepCounterConfig {
    /// Knee angle above which a rep may complete
    pub top_threshold: f64,

    /// Knee angle below which a rep may start
    pub bottom_threshold: f64,

    /// Extra depth past the bottom threshold for a rep to count as deep enough
    pub depth_bonus: f64,

    /// Frames below the bottom threshold required per rep
    pub min_down_frames: u32,

    /// Minimum frame-to-frame motion for a transition
    pub min_motion: f64,

    /// Minimum form score on the completing frame for a correct rep
    pub min_score: f64,

    /// Lowest plausible knee angle
    pub plausible_min: f64,

    /// Highest plausible knee angle
    pub plausible_max: f64,
}

/// Pre-scoring visibility check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityConfig {
    /// Minimum visibility of nose, shoulders and hips
    pub precheck_threshold: f64,
}

/// Alert debounce and delivery configuration
///
/// Each limb policy may be given partially; missing fields keep that limb's
/// default topic, message and timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "AlertConfigFile")]
pub struct AlertConfig {
    /// Device the alerts are addressed to
    pub device_id: String,

    /// Left arm policy
    pub left_arm: AlertPolicy,

    /// Right arm policy
    pub right_arm: AlertPolicy,

    /// Left leg policy
    pub left_leg: AlertPolicy,

    /// Right leg policy
    pub right_leg: AlertPolicy,
}

/// Alert section as written in a config file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AlertConfigFile {
    device_id: Option<String>,
    left_arm: PolicyOverride,
    right_arm: PolicyOverride,
    left_leg: PolicyOverride,
    right_leg: PolicyOverride,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PolicyOverride {
    duration_secs: Option<f64>,
    cooldown_secs: Option<f64>,
    topic: Option<String>,
    message: Option<String>,
}

impl PolicyOverride {
    fn resolve(self, limb: Limb) -> AlertPolicy {
        let default = AlertPolicy::for_limb(limb);
        AlertPolicy {
            duration_secs: self.duration_secs.unwrap_or(default.duration_secs),
            cooldown_secs: self.cooldown_secs.unwrap_or(default.cooldown_secs),
            topic: self.topic.unwrap_or(default.topic),
            message: self.message.unwrap_or(default.message),
        }
    }
}

impl From<AlertConfigFile> for AlertConfig {
    fn from(file: AlertConfigFile) -> Self {
        Self {
            device_id: file.device_id.unwrap_or_else(|| Self::default().device_id),
            left_arm: file.left_arm.resolve(Limb::LeftArm),
            right_arm: file.right_arm.resolve(Limb::RightArm),
            left_leg: file.left_leg.resolve(Limb::LeftLeg),
            right_leg: file.right_leg.resolve(Limb::RightLeg),
        }
    }
}

/// Filter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Filter applied to the form score
    pub score: String,

    /// Filter applied to the knee angle before repetition counting
    pub knee_angle: String,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            shoulder_tolerance: SHOULDER_LEVEL_TOLERANCE,
            hip_tolerance: HIP_LEVEL_TOLERANCE,
            spine_tolerance_deg: SPINE_TILT_TOLERANCE_DEG,
            huber_tail_gain: HUBER_TAIL_GAIN,
            yaw_tolerance_gain: YAW_TOLERANCE_GAIN,
            shoulder_gate: VisibilityGate::new(0.5, 1.0),
            hip_gate: VisibilityGate::new(0.5, 1.0),
            spine_gate: VisibilityGate::new(0.5, 0.75),
            elbow_gate: VisibilityGate::new(0.4, 0.66),
            gate_penalty: VISIBILITY_GATE_PENALTY,
            visibility_weight_floor: VISIBILITY_WEIGHT_FLOOR,
            visibility_weight_gain: VISIBILITY_WEIGHT_GAIN,
            visibility_weight_ceiling: VISIBILITY_WEIGHT_CEILING,
            hint_factor: HINT_FACTOR,
        }
    }
}

impl Default for RepCounterConfig {
    fn default() -> Self {
        Self {
            top_threshold: DEFAULT_TOP_THRESHOLD,
            bottom_threshold: DEFAULT_BOTTOM_THRESHOLD,
            depth_bonus: DEFAULT_DEPTH_BONUS,
            min_down_frames: DEFAULT_MIN_DOWN_FRAMES,
            min_motion: DEFAULT_MIN_MOTION,
            min_score: DEFAULT_MIN_REP_SCORE,
            plausible_min: PLAUSIBLE_ANGLE_MIN,
            plausible_max: PLAUSIBLE_ANGLE_MAX,
        }
    }
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            precheck_threshold: PRECHECK_VISIBILITY,
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            device_id: "form-coach".to_string(),
            left_arm: AlertPolicy::for_limb(Limb::LeftArm),
            right_arm: AlertPolicy::for_limb(Limb::RightArm),
            left_leg: AlertPolicy::for_limb(Limb::LeftLeg),
            right_leg: AlertPolicy::for_limb(Limb::RightLeg),
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            score: DEFAULT_SCORE_FILTER.to_string(),
            knee_angle: "none".to_string(),
        }
    }
}

impl AlertConfig {
    /// Policy for one limb
    #[must_use]
    pub const fn policy(&self, limb: Limb) -> &AlertPolicy {
        match limb {
            Limb::LeftArm => &self.left_arm,
            Limb::RightArm => &self.right_arm,
            Limb::LeftLeg => &self.left_leg,
            Limb::RightLeg => &self.right_leg,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::IoError(e.to_string()))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to a YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| Error::IoError(e.to_string()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let s = &self.scoring;

        // Validate tolerances
        for (name, value) in [
            ("Shoulder tolerance", s.shoulder_tolerance),
            ("Hip tolerance", s.hip_tolerance),
            ("Spine tolerance", s.spine_tolerance_deg),
        ] {
            if !(value > 0.0) {
                return Err(Error::ConfigError(format!("{name} must be greater than 0")));
            }
        }
        if !(s.huber_tail_gain >= 0.0) || !(s.yaw_tolerance_gain >= 0.0) {
            return Err(Error::ConfigError("Huber and yaw gains must be non-negative".to_string()));
        }

        // Validate visibility gates
        for (name, gate) in [
            ("shoulder", &s.shoulder_gate),
            ("hip", &s.hip_gate),
            ("spine", &s.spine_gate),
            ("elbow", &s.elbow_gate),
        ] {
            if !(0.0..=1.0).contains(&gate.threshold) || !(0.0..=1.0).contains(&gate.min_fraction) {
                return Err(Error::ConfigError(format!(
                    "The {name} gate threshold and fraction must be between 0.0 and 1.0"
                )));
            }
        }
        if !(s.hint_factor > 0.0) {
            return Err(Error::ConfigError("Hint factor must be greater than 0".to_string()));
        }
        if !(0.0..=1.0).contains(&s.gate_penalty) {
            return Err(Error::ConfigError("Gate penalty must be between 0.0 and 1.0".to_string()));
        }
        if s.visibility_weight_floor > s.visibility_weight_ceiling
            || !(0.0..=1.0).contains(&s.visibility_weight_floor)
            || !(0.0..=1.0).contains(&s.visibility_weight_ceiling)
        {
            return Err(Error::ConfigError(
                "Visibility weight window must satisfy 0 <= floor <= ceiling <= 1".to_string(),
            ));
        }

        // Validate repetition counter
        let r = &self.rep_counter;
        if !(r.top_threshold > r.bottom_threshold) {
            return Err(Error::ConfigError(
                "Top threshold must be greater than bottom threshold".to_string(),
            ));
        }
        if r.min_down_frames == 0 {
            return Err(Error::ConfigError("Minimum down frames must be greater than 0".to_string()));
        }
        if !(r.min_motion >= 0.0) || !(r.depth_bonus >= 0.0) {
            return Err(Error::ConfigError("Motion and depth bonus must be non-negative".to_string()));
        }
        if !(r.plausible_min < r.plausible_max) {
            return Err(Error::ConfigError("Plausible angle band is inverted".to_string()));
        }
        if !(0.0..=100.0).contains(&r.min_score) {
            return Err(Error::ConfigError("Minimum rep score must be between 0 and 100".to_string()));
        }

        if !(0.0..=1.0).contains(&self.visibility.precheck_threshold) {
            return Err(Error::ConfigError(
                "Pre-check visibility threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        // Validate alert policies
        for limb in Limb::ALL {
            let policy = self.alerts.policy(limb);
            if !(policy.duration_secs >= 0.0) || !(policy.cooldown_secs >= 0.0) {
                return Err(Error::ConfigError(format!(
                    "Alert duration and cooldown for {limb} must be non-negative"
                )));
            }
            if policy.topic.is_empty() {
                return Err(Error::ConfigError(format!("Alert topic for {limb} must not be empty")));
            }
        }

        // Validate filters
        create_filter(&self.filter.score)
            .map_err(|e| Error::ConfigError(format!("Invalid score filter: {e}")))?;
        create_filter(&self.filter.knee_angle)
            .map_err(|e| Error::ConfigError(format!("Invalid knee angle filter: {e}")))?;

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Form Coach Configuration

# Frame scoring
scoring:
  shoulder_tolerance: 0.08
  hip_tolerance: 0.10
  spine_tolerance_deg: 30.0
  huber_tail_gain: 0.3
  yaw_tolerance_gain: 0.5
  shoulder_gate: { threshold: 0.5, min_fraction: 1.0 }
  hip_gate: { threshold: 0.5, min_fraction: 1.0 }
  spine_gate: { threshold: 0.5, min_fraction: 0.75 }
  elbow_gate: { threshold: 0.4, min_fraction: 0.66 }
  gate_penalty: 0.15
  visibility_weight_floor: 0.7
  visibility_weight_gain: 0.3
  visibility_weight_ceiling: 0.98
  hint_factor: 1.2

# Repetition counting (squat / lunge)
rep_counter:
  top_threshold: 150.0
  bottom_threshold: 110.0
  depth_bonus: 5.0
  min_down_frames: 3
  min_motion: 10.0
  min_score: 70.0
  plausible_min: 60.0
  plausible_max: 200.0

# Frames are skipped unless nose, shoulders and hips reach this visibility
visibility:
  precheck_threshold: 0.5

# Alert debounce per limb
alerts:
  device_id: "form-coach"
  left_arm:
    duration_secs: 3.0
    cooldown_secs: 10.0
    topic: "form/left_arm"
    message: "Left arm form needs correction"
  right_arm:
    duration_secs: 3.0
    cooldown_secs: 10.0
    topic: "form/right_arm"
    message: "Right arm form needs correction"
  left_leg:
    duration_secs: 3.0
    cooldown_secs: 10.0
    topic: "form/left_leg"
    message: "Left leg form needs correction"
  right_leg:
    duration_secs: 3.0
    cooldown_secs: 10.0
    topic: "form/right_leg"
    message: "Right leg form needs correction"

# Smoothing filters: none, exponential:<alpha>, moving_average:<n>, median:<n>, hampel:<n>:<k>
filter:
  score: "exponential:0.3"
  knee_angle: "none"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let parsed = Config::from_yaml(EXAMPLE_CONFIG).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed = Config::from_yaml("rep_counter:\n  min_down_frames: 5\n").unwrap();
        assert_eq!(parsed.rep_counter.min_down_frames, 5);
        assert_eq!(parsed.rep_counter.top_threshold, DEFAULT_TOP_THRESHOLD);
        assert_eq!(parsed.scoring, ScoringConfig::default());
    }

    #[test]
    fn test_validation_rejects_inverted_thresholds() {
        let mut config = Config::default();
        config.rep_counter.top_threshold = 100.0;
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_validation_rejects_bad_filter() {
        let mut config = Config::default();
        config.filter.score = "exponential:2.0".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_gate() {
        let mut config = Config::default();
        config.scoring.elbow_gate.min_fraction = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.scoring.visibility_weight_floor = 0.99;
        assert!(config.validate().is_err());
    }
}
