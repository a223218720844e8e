//! Body landmarks as produced by the external pose estimator.
//!
//! A [`Pose`] is the ordered 33-entry landmark list for one frame, indexed by
//! [`BodyPart`]. Coordinates are taken as given (normalized image units for
//! x/y, relative depth for z); a missing z deserializes as 0.

use crate::{constants::NUM_POSE_LANDMARKS, Error, Result};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// One tracked body keypoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Horizontal position
    pub x: f64,
    /// Vertical position (grows downwards in image space)
    pub y: f64,
    /// Depth relative to the hips
    #[serde(default)]
    pub z: f64,
    /// Detection confidence in [0, 1]
    #[serde(default = "default_visibility")]
    pub visibility: f64,
}

const fn default_visibility() -> f64 {
    1.0
}

impl Landmark {
    /// Create a landmark with full 3D position
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64, visibility: f64) -> Self {
        Self { x, y, z, visibility }
    }

    /// Create a planar landmark (z = 0)
    #[must_use]
    pub const fn planar(x: f64, y: f64, visibility: f64) -> Self {
        Self::new(x, y, 0.0, visibility)
    }

    /// Position as a vector
    #[must_use]
    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Stable body-part enumeration matching the estimator's output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum BodyPart {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl BodyPart {
    /// Position of this part in the landmark list
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Human-readable name
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEyeInner => "left eye (inner)",
            Self::LeftEye => "left eye",
            Self::LeftEyeOuter => "left eye (outer)",
            Self::RightEyeInner => "right eye (inner)",
            Self::RightEye => "right eye",
            Self::RightEyeOuter => "right eye (outer)",
            Self::LeftEar => "left ear",
            Self::RightEar => "right ear",
            Self::MouthLeft => "mouth (left)",
            Self::MouthRight => "mouth (right)",
            Self::LeftShoulder => "left shoulder",
            Self::RightShoulder => "right shoulder",
            Self::LeftElbow => "left elbow",
            Self::RightElbow => "right elbow",
            Self::LeftWrist => "left wrist",
            Self::RightWrist => "right wrist",
            Self::LeftPinky => "left pinky",
            Self::RightPinky => "right pinky",
            Self::LeftIndex => "left index",
            Self::RightIndex => "right index",
            Self::LeftThumb => "left thumb",
            Self::RightThumb => "right thumb",
            Self::LeftHip => "left hip",
            Self::RightHip => "right hip",
            Self::LeftKnee => "left knee",
            Self::RightKnee => "right knee",
            Self::LeftAnkle => "left ankle",
            Self::RightAnkle => "right ankle",
            Self::LeftHeel => "left heel",
            Self::RightHeel => "right heel",
            Self::LeftFootIndex => "left foot index",
            Self::RightFootIndex => "right foot index",
        }
    }
}

/// Parts that must be visible before a frame is scored
pub const PRECHECK_PARTS: [BodyPart; 5] = [
    BodyPart::Nose,
    BodyPart::LeftShoulder,
    BodyPart::RightShoulder,
    BodyPart::LeftHip,
    BodyPart::RightHip,
];

/// Landmark set for a single frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pose {
    landmarks: Vec<Landmark>,
}

impl Pose {
    /// Wrap an estimator output. Length is checked lazily on lookup.
    #[must_use]
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        if landmarks.len() != NUM_POSE_LANDMARKS {
            log::debug!(
                "Pose built with {} landmarks (expected {})",
                landmarks.len(),
                NUM_POSE_LANDMARKS
            );
        }
        Self { landmarks }
    }

    /// Raw landmark list
    #[must_use]
    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    /// Number of landmarks supplied
    #[must_use]
    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    /// True if no landmarks were supplied
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    /// Look up a landmark
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingLandmark`] if the index is absent and
    /// [`Error::InvalidLandmark`] if any coordinate is non-finite.
    pub fn get(&self, part: BodyPart) -> Result<&Landmark> {
        let landmark = self.landmarks.get(part.index()).ok_or(Error::MissingLandmark {
            part,
            index: part.index(),
            len: self.landmarks.len(),
        })?;

        if !landmark.is_finite() {
            return Err(Error::InvalidLandmark(format!(
                "{} has non-finite coordinates ({}, {}, {})",
                part.label(),
                landmark.x,
                landmark.y,
                landmark.z
            )));
        }

        Ok(landmark)
    }

    /// Position of a landmark
    ///
    /// # Errors
    ///
    /// See [`Pose::get`].
    pub fn point(&self, part: BodyPart) -> Result<Vector3<f64>> {
        self.get(part).map(Landmark::position)
    }

    /// Visibility of a landmark, clamped to [0, 1] (NaN reads as 0)
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingLandmark`] if the index is absent.
    pub fn visibility(&self, part: BodyPart) -> Result<f64> {
        let landmark = self.landmarks.get(part.index()).ok_or(Error::MissingLandmark {
            part,
            index: part.index(),
            len: self.landmarks.len(),
        })?;
        let v = landmark.visibility;
        Ok(if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) })
    }

    /// Visibilities of several landmarks, in order
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingLandmark`] for the first absent index.
    pub fn visibilities(&self, parts: &[BodyPart]) -> Result<Vec<f64>> {
        parts.iter().map(|&p| self.visibility(p)).collect()
    }

    /// Parts whose visibility is below `threshold`, in the order given
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingLandmark`] for the first absent index.
    pub fn invisible_parts(&self, parts: &[BodyPart], threshold: f64) -> Result<Vec<BodyPart>> {
        let mut missing = Vec::new();
        for &part in parts {
            if self.visibility(part)? < threshold {
                missing.push(part);
            }
        }
        Ok(missing)
    }
}

impl From<Vec<Landmark>> for Pose {
    fn from(landmarks: Vec<Landmark>) -> Self {
        Self::new(landmarks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_pose(visibility: f64) -> Pose {
        Pose::new(vec![Landmark::planar(0.5, 0.5, visibility); NUM_POSE_LANDMARKS])
    }

    #[test]
    fn test_body_part_indices() {
        assert_eq!(BodyPart::Nose.index(), 0);
        assert_eq!(BodyPart::LeftShoulder.index(), 11);
        assert_eq!(BodyPart::RightHip.index(), 24);
        assert_eq!(BodyPart::RightFootIndex.index(), NUM_POSE_LANDMARKS - 1);
    }

    #[test]
    fn test_missing_landmark_is_an_error() {
        let pose = Pose::new(vec![Landmark::planar(0.0, 0.0, 1.0); 12]);
        assert!(pose.get(BodyPart::LeftShoulder).is_ok());
        match pose.get(BodyPart::LeftHip) {
            Err(Error::MissingLandmark { part, index, len }) => {
                assert_eq!(part, BodyPart::LeftHip);
                assert_eq!(index, 23);
                assert_eq!(len, 12);
            }
            other => panic!("Expected MissingLandmark, got {other:?}"),
        }
    }

    #[test]
    fn test_non_finite_landmark_rejected() {
        let mut landmarks = vec![Landmark::planar(0.5, 0.5, 1.0); NUM_POSE_LANDMARKS];
        landmarks[BodyPart::LeftKnee.index()].y = f64::NAN;
        let pose = Pose::new(landmarks);
        assert!(matches!(pose.get(BodyPart::LeftKnee), Err(Error::InvalidLandmark(_))));
        assert!(pose.get(BodyPart::RightKnee).is_ok());
    }

    #[test]
    fn test_visibility_clamped() {
        let mut landmarks = vec![Landmark::planar(0.5, 0.5, 1.7); NUM_POSE_LANDMARKS];
        landmarks[0].visibility = -0.2;
        landmarks[1].visibility = f64::NAN;
        let pose = Pose::new(landmarks);
        assert_eq!(pose.visibility(BodyPart::Nose).unwrap(), 0.0);
        assert_eq!(pose.visibility(BodyPart::LeftEyeInner).unwrap(), 0.0);
        assert_eq!(pose.visibility(BodyPart::LeftEye).unwrap(), 1.0);
    }

    #[test]
    fn test_invisible_parts_reports_in_order() {
        let mut landmarks = full_pose(0.9).landmarks().to_vec();
        landmarks[BodyPart::RightHip.index()].visibility = 0.2;
        landmarks[BodyPart::Nose.index()].visibility = 0.49;
        let pose = Pose::new(landmarks);

        let missing = pose.invisible_parts(&PRECHECK_PARTS, 0.5).unwrap();
        assert_eq!(missing, vec![BodyPart::Nose, BodyPart::RightHip]);
    }

    #[test]
    fn test_missing_z_deserializes_as_zero() {
        let lm: Landmark = serde_json::from_str(r#"{"x": 0.1, "y": 0.2, "visibility": 0.8}"#).unwrap();
        assert_eq!(lm.z, 0.0);
        assert_eq!(lm.visibility, 0.8);

        let lm: Landmark = serde_json::from_str(r#"{"x": 0.1, "y": 0.2}"#).unwrap();
        assert_eq!(lm.visibility, 1.0);
    }
}
