use crate::{BoardPoint, CameraPoint, Skew3};
use nalgebra::{IsometryMatrix3, Matrix4, Rotation3, Vector3};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The pose of the calibration board relative to the camera.
///
/// This maps [`BoardPoint`] into [`CameraPoint`]: `camera = R(rotation) * board + translation`.
/// It is stored exactly the way planar calibration solvers report extrinsics, a rotation
/// vector plus a translation, so that a solved pose can be copied around and compared
/// bit for bit. Poses are plain values; blending two of them produces a third and never
/// touches the originals.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct BoardToCamera {
    /// Axis-angle rotation vector.
    pub rotation: Skew3,
    /// Translation of the board origin in camera space.
    pub translation: Vector3<f64>,
}

impl BoardToCamera {
    pub fn new(rotation: Skew3, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Creates a pose with no change in position or orientation.
    pub fn identity() -> Self {
        Self::new(Skew3::zeros(), Vector3::zeros())
    }

    /// Create the pose from rotation and translation.
    pub fn from_parts(translation: Vector3<f64>, rotation: Rotation3<f64>) -> Self {
        Self::new(rotation.into(), translation)
    }

    /// The rotation matrix of the pose.
    pub fn rotation_matrix(self) -> Rotation3<f64> {
        self.rotation.rotation()
    }

    /// Retrieve the isometry.
    pub fn isometry(self) -> IsometryMatrix3<f64> {
        IsometryMatrix3::from_parts(self.translation.into(), self.rotation_matrix())
    }

    /// Retrieve the homogeneous matrix `[R | t]` with a `[0 0 0 1]` bottom row.
    pub fn homogeneous(self) -> Matrix4<f64> {
        self.isometry().to_homogeneous()
    }

    /// Transform a point on the board into camera space.
    pub fn transform(self, point: BoardPoint) -> CameraPoint {
        CameraPoint(self.isometry() * point.0)
    }

    /// Component-wise linear blend of rotation vector and translation.
    ///
    /// `alpha == 0` yields `self` and `alpha == 1` yields `other` up to rounding; callers that
    /// need exact pass-through at the anchors must not call this with those values.
    #[must_use]
    pub fn lerp(self, other: Self, alpha: f64) -> Self {
        Self {
            rotation: self.rotation.lerp(other.rotation, alpha),
            translation: (1.0 - alpha) * self.translation + alpha * other.translation,
        }
    }
}

impl From<IsometryMatrix3<f64>> for BoardToCamera {
    fn from(isometry: IsometryMatrix3<f64>) -> Self {
        Self::from_parts(isometry.translation.vector, isometry.rotation)
    }
}

impl Default for BoardToCamera {
    fn default() -> Self {
        Self::identity()
    }
}
