//! Per-frame form scoring.
//!
//! The score is the sum of four components (shoulder level, hip level,
//! spine verticality, elbow angles), each gated on the visibility of the
//! landmarks behind it, weighted by overall arm/torso visibility and clamped
//! to [0, 100]. Limb faults and hints are derived from the same geometry.

use crate::{
    config::{ScoringConfig, VisibilityGate},
    constants::{ELBOW_SIDE_MAX_POINTS, HIP_MAX_POINTS, MIN_TORSO_SCALE, SHOULDER_MAX_POINTS, SPINE_MAX_POINTS},
    exercise::{Exercise, ExerciseParams},
    geometry::{angle_at_vertex, distance_3d, huber_like_with_gain, midpoint, sigmoid_score, visibility_gate_ok},
    landmarks::{BodyPart, Pose},
    Result,
};
use log::debug;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A limb that can carry a form fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Limb {
    /// Left arm (elbow angle)
    LeftArm,
    /// Right arm (elbow angle)
    RightArm,
    /// Left leg (knee angle)
    LeftLeg,
    /// Right leg (knee angle)
    RightLeg,
}

impl Limb {
    /// All limbs in error-code order
    pub const ALL: [Self; 4] = [Self::LeftArm, Self::RightArm, Self::LeftLeg, Self::RightLeg];

    /// Stable error code (1 = left arm … 4 = right leg)
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::LeftArm => 1,
            Self::RightArm => 2,
            Self::LeftLeg => 3,
            Self::RightLeg => 4,
        }
    }

    /// Identifier used for topics and logs
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::LeftArm => "left_arm",
            Self::RightArm => "right_arm",
            Self::LeftLeg => "left_leg",
            Self::RightLeg => "right_leg",
        }
    }

    const fn hint(self) -> &'static str {
        match self {
            Self::LeftArm => "Left arm: correct the elbow angle",
            Self::RightArm => "Right arm: correct the elbow angle",
            Self::LeftLeg => "Left leg: correct the knee angle",
            Self::RightLeg => "Right leg: correct the knee angle",
        }
    }
}

impl fmt::Display for Limb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Component sub-scores, after visibility gating
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    /// 0..=25
    pub shoulders_level: f64,
    /// 0..=20
    pub hips_level: f64,
    /// 0..=25
    pub spine_vertical: f64,
    /// 0..=30 (two sides)
    pub elbows_angle: f64,
}

impl ComponentScores {
    /// Sum of all components
    #[must_use]
    pub fn total(&self) -> f64 {
        self.shoulders_level + self.hips_level + self.spine_vertical + self.elbows_angle
    }
}

/// Per-limb fault flags for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimbFaults {
    /// Left elbow score under the exercise minimum
    pub left_arm: bool,
    /// Right elbow score under the exercise minimum
    pub right_arm: bool,
    /// Left knee outside the exercise tolerance
    pub left_leg: bool,
    /// Right knee outside the exercise tolerance
    pub right_leg: bool,
}

impl LimbFaults {
    /// Fault flag for one limb
    #[must_use]
    pub const fn is_set(&self, limb: Limb) -> bool {
        match limb {
            Limb::LeftArm => self.left_arm,
            Limb::RightArm => self.right_arm,
            Limb::LeftLeg => self.left_leg,
            Limb::RightLeg => self.right_leg,
        }
    }

    /// True if any limb is at fault
    #[must_use]
    pub const fn any(&self) -> bool {
        self.left_arm || self.right_arm || self.left_leg || self.right_leg
    }

    /// Faulted limbs in error-code order
    pub fn active(&self) -> impl Iterator<Item = Limb> + '_ {
        Limb::ALL.into_iter().filter(|&limb| self.is_set(limb))
    }

    /// Error codes of the faulted limbs, ascending
    #[must_use]
    pub fn error_codes(&self) -> Vec<u8> {
        self.active().map(Limb::code).collect()
    }
}

/// Joint angles measured in the frame; `None` where geometry is degenerate
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JointAngles {
    /// Shoulder-elbow-wrist, left
    pub left_elbow: Option<f64>,
    /// Shoulder-elbow-wrist, right
    pub right_elbow: Option<f64>,
    /// Hip-knee-ankle, left
    pub left_knee: Option<f64>,
    /// Hip-knee-ankle, right
    pub right_knee: Option<f64>,
}

/// Raw alignment measurements, before any tolerance is applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Deviations {
    /// Vertical shoulder difference over torso scale
    pub shoulders: f64,
    /// Vertical hip difference over torso scale
    pub hips: f64,
    /// Spine tilt from vertical, degrees
    pub spine_deg: f64,
    /// Body yaw estimated from shoulder depth, degrees
    pub yaw_deg: f64,
}

/// Result of scoring one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameAnalysis {
    /// Exercise the frame was scored as
    pub exercise: Exercise,
    /// Form score in [0, 100]
    pub score: f64,
    /// Gated component scores
    pub components: ComponentScores,
    /// Multiplier derived from arm/torso visibility
    pub visibility_weight: f64,
    /// Codes of active limb faults, ascending
    pub error_codes: Vec<u8>,
    /// Human-readable correction hints
    pub hints: Vec<String>,
    /// Per-limb fault flags
    pub faults: LimbFaults,
    /// Measured joint angles
    pub angles: JointAngles,
    /// Raw alignment measurements
    pub deviations: Deviations,
}

impl FrameAnalysis {
    /// True if any limb is at fault in this frame
    #[must_use]
    pub const fn has_fault(&self) -> bool {
        self.faults.any()
    }
}

const SHOULDER_GATE_PARTS: [BodyPart; 2] = [BodyPart::LeftShoulder, BodyPart::RightShoulder];
const HIP_GATE_PARTS: [BodyPart; 2] = [BodyPart::LeftHip, BodyPart::RightHip];
const SPINE_GATE_PARTS: [BodyPart; 4] = [
    BodyPart::LeftShoulder,
    BodyPart::RightShoulder,
    BodyPart::LeftHip,
    BodyPart::RightHip,
];
const ELBOW_GATE_PARTS: [BodyPart; 6] = [
    BodyPart::LeftShoulder,
    BodyPart::RightShoulder,
    BodyPart::LeftElbow,
    BodyPart::RightElbow,
    BodyPart::LeftWrist,
    BodyPart::RightWrist,
];
const WEIGHT_PARTS: [BodyPart; 8] = [
    BodyPart::LeftShoulder,
    BodyPart::RightShoulder,
    BodyPart::LeftElbow,
    BodyPart::RightElbow,
    BodyPart::LeftWrist,
    BodyPart::RightWrist,
    BodyPart::LeftHip,
    BodyPart::RightHip,
];

const SHOULDER_HINT: &str = "Level your shoulders";
const HIP_HINT: &str = "Level your hips";
const SPINE_HINT: &str = "Keep your spine upright";

/// Landmark positions used by the scorer
struct Skeleton {
    left_shoulder: Vector3<f64>,
    right_shoulder: Vector3<f64>,
    left_elbow: Vector3<f64>,
    right_elbow: Vector3<f64>,
    left_wrist: Vector3<f64>,
    right_wrist: Vector3<f64>,
    left_hip: Vector3<f64>,
    right_hip: Vector3<f64>,
    left_knee: Vector3<f64>,
    right_knee: Vector3<f64>,
    left_ankle: Vector3<f64>,
    right_ankle: Vector3<f64>,
}

impl Skeleton {
    fn from_pose(pose: &Pose) -> Result<Self> {
        Ok(Self {
            left_shoulder: pose.point(BodyPart::LeftShoulder)?,
            right_shoulder: pose.point(BodyPart::RightShoulder)?,
            left_elbow: pose.point(BodyPart::LeftElbow)?,
            right_elbow: pose.point(BodyPart::RightElbow)?,
            left_wrist: pose.point(BodyPart::LeftWrist)?,
            right_wrist: pose.point(BodyPart::RightWrist)?,
            left_hip: pose.point(BodyPart::LeftHip)?,
            right_hip: pose.point(BodyPart::RightHip)?,
            left_knee: pose.point(BodyPart::LeftKnee)?,
            right_knee: pose.point(BodyPart::RightKnee)?,
            left_ankle: pose.point(BodyPart::LeftAnkle)?,
            right_ankle: pose.point(BodyPart::RightAnkle)?,
        })
    }
}

/// Stateless frame scorer
#[derive(Debug, Clone, Default)]
pub struct FrameScorer {
    config: ScoringConfig,
}

impl FrameScorer {
    /// Create a scorer with the given tunables
    #[must_use]
    pub const fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Scoring tunables
    #[must_use]
    pub const fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score a frame for an exercise identifier (unknown ids score as standing)
    ///
    /// # Errors
    ///
    /// Fails if a required landmark is missing or non-finite.
    pub fn score(&self, pose: &Pose, exercise_id: &str) -> Result<FrameAnalysis> {
        self.score_exercise(pose, Exercise::resolve(exercise_id))
    }

    /// Score a frame for a known exercise
    ///
    /// # Errors
    ///
    /// Fails if a required landmark is missing or non-finite.
    pub fn score_exercise(&self, pose: &Pose, exercise: Exercise) -> Result<FrameAnalysis> {
        let cfg = &self.config;
        let params = exercise.params();
        let sk = Skeleton::from_pose(pose)?;

        let mid_shoulder = midpoint(&sk.left_shoulder, &sk.right_shoulder);
        let mid_hip = midpoint(&sk.left_hip, &sk.right_hip);
        let shoulder_width = distance_3d(&sk.left_shoulder, &sk.right_shoulder);
        let torso_length = distance_3d(&mid_shoulder, &mid_hip);
        let scale = (0.5 * (shoulder_width + torso_length)).max(MIN_TORSO_SCALE);

        let yaw_deg = estimate_yaw(&sk.left_shoulder, &sk.right_shoulder);
        let yaw_factor = 1.0 + cfg.yaw_tolerance_gain * (yaw_deg / 90.0);

        let deviations = Deviations {
            shoulders: (sk.left_shoulder.y - sk.right_shoulder.y).abs() / scale,
            hips: (sk.left_hip.y - sk.right_hip.y).abs() / scale,
            spine_deg: spine_tilt(&mid_shoulder, &mid_hip),
            yaw_deg,
        };

        let huber = |err: f64, tolerance: f64| huber_like_with_gain(err, tolerance * yaw_factor, cfg.huber_tail_gain);
        let shoulders = SHOULDER_MAX_POINTS * huber(deviations.shoulders, cfg.shoulder_tolerance);
        let hips = HIP_MAX_POINTS * huber(deviations.hips, cfg.hip_tolerance);
        let spine = SPINE_MAX_POINTS * huber(deviations.spine_deg, cfg.spine_tolerance_deg);

        let angles = JointAngles {
            left_elbow: angle_at_vertex(&sk.left_shoulder, &sk.left_elbow, &sk.left_wrist),
            right_elbow: angle_at_vertex(&sk.right_shoulder, &sk.right_elbow, &sk.right_wrist),
            left_knee: angle_at_vertex(&sk.left_hip, &sk.left_knee, &sk.left_ankle),
            right_knee: angle_at_vertex(&sk.right_hip, &sk.right_knee, &sk.right_ankle),
        };
        let left_elbow_score = elbow_side_score(angles.left_elbow, params);
        let right_elbow_score = elbow_side_score(angles.right_elbow, params);

        let components = ComponentScores {
            shoulders_level: shoulders * self.gate_factor(pose, &SHOULDER_GATE_PARTS, &cfg.shoulder_gate)?,
            hips_level: hips * self.gate_factor(pose, &HIP_GATE_PARTS, &cfg.hip_gate)?,
            spine_vertical: spine * self.gate_factor(pose, &SPINE_GATE_PARTS, &cfg.spine_gate)?,
            elbows_angle: (left_elbow_score + right_elbow_score)
                * self.gate_factor(pose, &ELBOW_GATE_PARTS, &cfg.elbow_gate)?,
        };

        let visibility_weight = self.visibility_weight(pose)?;
        let raw = components.total() * visibility_weight;
        let score = if raw.is_finite() { raw.clamp(0.0, 100.0) } else { 0.0 };

        let arm_check = params.min_elbow_score > 0.0;
        let faults = LimbFaults {
            left_arm: arm_check && left_elbow_score < params.min_elbow_score,
            right_arm: arm_check && right_elbow_score < params.min_elbow_score,
            left_leg: knee_out_of_range(angles.left_knee, params),
            right_leg: knee_out_of_range(angles.right_knee, params),
        };

        let mut hints: Vec<String> = faults.active().map(|limb| limb.hint().to_string()).collect();
        if deviations.shoulders > cfg.shoulder_tolerance * cfg.hint_factor {
            hints.push(SHOULDER_HINT.to_string());
        }
        if deviations.hips > cfg.hip_tolerance * cfg.hint_factor {
            hints.push(HIP_HINT.to_string());
        }
        if deviations.spine_deg > cfg.spine_tolerance_deg * cfg.hint_factor {
            hints.push(SPINE_HINT.to_string());
        }

        debug!(
            "Scored {} frame: {:.1} (sh {:.1}, hp {:.1}, sp {:.1}, el {:.1}, vis {:.2}, yaw {:.1}°) codes {:?}",
            exercise,
            score,
            components.shoulders_level,
            components.hips_level,
            components.spine_vertical,
            components.elbows_angle,
            visibility_weight,
            yaw_deg,
            faults.error_codes()
        );

        Ok(FrameAnalysis {
            exercise,
            score,
            components,
            visibility_weight,
            error_codes: faults.error_codes(),
            hints,
            faults,
            angles,
            deviations,
        })
    }

    fn gate_factor(&self, pose: &Pose, parts: &[BodyPart], gate: &VisibilityGate) -> Result<f64> {
        let visibilities = pose.visibilities(parts)?;
        if visibility_gate_ok(&visibilities, gate.threshold, gate.min_fraction) {
            Ok(1.0)
        } else {
            Ok(self.config.gate_penalty)
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn visibility_weight(&self, pose: &Pose) -> Result<f64> {
        let cfg = &self.config;
        let visibilities = pose.visibilities(&WEIGHT_PARTS)?;
        let average = visibilities.iter().sum::<f64>() / visibilities.len() as f64;
        Ok((cfg.visibility_weight_floor + cfg.visibility_weight_gain * average)
            .clamp(cfg.visibility_weight_floor, cfg.visibility_weight_ceiling))
    }
}

/// Yaw from shoulder depth asymmetry, degrees in [0, 90]
fn estimate_yaw(left_shoulder: &Vector3<f64>, right_shoulder: &Vector3<f64>) -> f64 {
    let dz = (left_shoulder.z - right_shoulder.z).abs();
    let dx = (left_shoulder.x - right_shoulder.x).abs();
    dz.atan2(dx).to_degrees()
}

/// Tilt of the shoulder→hip line from image vertical; 90° when degenerate
fn spine_tilt(mid_shoulder: &Vector3<f64>, mid_hip: &Vector3<f64>) -> f64 {
    let vx = (mid_shoulder.x - mid_hip.x).abs();
    let vy = (mid_shoulder.y - mid_hip.y).abs();
    if vx == 0.0 && vy == 0.0 {
        return 90.0;
    }
    vx.atan2(vy).to_degrees()
}

fn elbow_side_score(angle: Option<f64>, params: &ExerciseParams) -> f64 {
    angle.map_or(0.0, |a| {
        sigmoid_score(a, params.target_elbow_deg, params.elbow_width, ELBOW_SIDE_MAX_POINTS)
    })
}

fn knee_out_of_range(angle: Option<f64>, params: &ExerciseParams) -> bool {
    angle.is_some_and(|a| (a - params.target_knee_deg).abs() > params.knee_deviation_tolerance)
}
