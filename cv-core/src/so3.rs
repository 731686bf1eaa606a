use derive_more::{AsMut, AsRef, Deref, DerefMut, From, Into};
use nalgebra::{Matrix3, Rotation3, Unit, Vector3};
use num_traits::Float;
#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Contains a member of the lie algebra so(3), a representation of the tangent space
/// of 3d rotation. This is the axis-angle "rotation vector" that calibration solvers
/// report: its direction is the rotation axis and its norm is the angle in radians.
///
/// Rotation vectors are what poses carry around and what gets blended when poses are
/// interpolated. Anything that actually rotates a point should go through [`Skew3::rotation`].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Skew3(pub Vector3<f64>);

impl Skew3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self(Vector3::new(x, y, z))
    }

    pub fn zeros() -> Self {
        Self(Vector3::zeros())
    }

    /// Converts the Skew3 to a Rotation3 matrix.
    pub fn rotation(self) -> Rotation3<f64> {
        self.into()
    }

    /// Converts the Skew3 into a Rotation3 matrix quickly, but only works when the rotation
    /// is very small.
    pub fn rotation_small(self) -> Rotation3<f64> {
        Rotation3::from_matrix(&(Matrix3::identity() + self.hat()))
    }

    /// This converts a matrix in skew-symmetric form into a Skew3.
    ///
    /// Warning: Does no check to ensure matrix is actually skew-symmetric.
    pub fn vee(mat: Matrix3<f64>) -> Self {
        Self(Vector3::new(mat.m32, mat.m13, mat.m21))
    }

    /// This converts the Skew3 into its skew-symmetric matrix form.
    pub fn hat(self) -> Matrix3<f64> {
        self.0.cross_matrix()
    }

    /// Blends two rotation vectors component by component: `(1 - alpha) * self + alpha * other`.
    ///
    /// This is not a geodesic interpolation on SO(3), so it is only close to the true
    /// in-between rotation when the two rotations are close to each other.
    #[must_use]
    pub fn lerp(self, other: Self, alpha: f64) -> Self {
        Self((1.0 - alpha) * self.0 + alpha * other.0)
    }
}

/// This is the exponential map.
impl From<Skew3> for Rotation3<f64> {
    fn from(w: Skew3) -> Self {
        // This check is done to avoid the degenerate case where the angle is near zero.
        let theta2 = w.0.norm_squared();
        if theta2 <= f64::epsilon() {
            w.rotation_small()
        } else {
            let theta = theta2.sqrt();
            let axis = Unit::new_unchecked(w.0 / theta);
            Self::from_axis_angle(&axis, theta)
        }
    }
}

/// This is the log map.
impl From<Rotation3<f64>> for Skew3 {
    fn from(r: Rotation3<f64>) -> Self {
        let skew3 = r.scaled_axis();
        // `scaled_axis` can produce NaN for rotations numerically indistinguishable from identity.
        let skew3 = if skew3.iter().any(|n| n.is_nan()) {
            Vector3::zeros()
        } else {
            skew3
        };
        Self(skew3)
    }
}
