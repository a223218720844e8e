//! Constants used throughout the library

/// Number of landmarks produced by the pose estimator
pub const NUM_POSE_LANDMARKS: usize = 33;

/// Numeric precision epsilon
pub const EPSILON: f64 = 1e-6;

/// Floor for the torso scale normalizer
pub const MIN_TORSO_SCALE: f64 = 1e-6;

/// Base tolerance for vertical shoulder difference (normalized by torso scale)
pub const SHOULDER_LEVEL_TOLERANCE: f64 = 0.08;
/// Base tolerance for vertical hip difference (normalized by torso scale)
pub const HIP_LEVEL_TOLERANCE: f64 = 0.10;
/// Base tolerance for spine tilt from vertical, in degrees
pub const SPINE_TILT_TOLERANCE_DEG: f64 = 30.0;

/// Tail gain of the Huber-like penalty beyond its tolerance
pub const HUBER_TAIL_GAIN: f64 = 0.3;

/// Tolerance inflation at a full 90° yaw
pub const YAW_TOLERANCE_GAIN: f64 = 0.5;

/// Maximum points per component
pub const SHOULDER_MAX_POINTS: f64 = 25.0;
pub const HIP_MAX_POINTS: f64 = 20.0;
pub const SPINE_MAX_POINTS: f64 = 25.0;
pub const ELBOW_SIDE_MAX_POINTS: f64 = 15.0;

/// Multiplier applied to a component whose landmarks fail their visibility gate
pub const VISIBILITY_GATE_PENALTY: f64 = 0.15;

/// Visibility weight window: `clamp(floor + gain * avg, floor, ceiling)`
pub const VISIBILITY_WEIGHT_FLOOR: f64 = 0.7;
pub const VISIBILITY_WEIGHT_GAIN: f64 = 0.3;
pub const VISIBILITY_WEIGHT_CEILING: f64 = 0.98;

/// Raw deviation multiple at which informational hints fire
pub const HINT_FACTOR: f64 = 1.2;

/// Minimum visibility for the pre-scoring torso check
pub const PRECHECK_VISIBILITY: f64 = 0.5;

/// Repetition counter defaults, in degrees unless noted
pub const DEFAULT_TOP_THRESHOLD: f64 = 150.0;
pub const DEFAULT_BOTTOM_THRESHOLD: f64 = 110.0;
pub const DEFAULT_DEPTH_BONUS: f64 = 5.0;
pub const DEFAULT_MIN_DOWN_FRAMES: u32 = 3;
pub const DEFAULT_MIN_MOTION: f64 = 10.0;
pub const DEFAULT_MIN_REP_SCORE: f64 = 70.0;
pub const PLAUSIBLE_ANGLE_MIN: f64 = 60.0;
pub const PLAUSIBLE_ANGLE_MAX: f64 = 200.0;

/// Alert debounce defaults, in seconds
pub const DEFAULT_ALERT_DURATION_SECS: f64 = 3.0;
pub const DEFAULT_ALERT_COOLDOWN_SECS: f64 = 10.0;

/// Default score smoothing (EMA alpha 0.3)
pub const DEFAULT_SCORE_FILTER: &str = "exponential:0.3";
