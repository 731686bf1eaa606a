//! This crate plugs into `cv-core` and provides the pinhole camera model used when tracking a
//! planar pattern: linear intrinsics, Brown-Conrady lens distortion, and a camera that combines
//! both to project board points onto the image.
//!
//! It also defines the seam between tracking and calibration: the [`Calibration`] a solver
//! produces and the [`CalibrationSolver`] trait any planar calibration method implements.

mod calibration;
mod camera;
mod distortion;

pub use calibration::*;
pub use camera::*;
pub use distortion::*;

use cv_core::nalgebra::{Matrix3, Point2, Vector2};
use cv_core::{ImagePoint, KeyPoint};
use derive_more::{AsMut, AsRef, Deref, DerefMut, From, Into};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A point in normalized image coordinates: the point on the virtual image plane at
/// depth `1.0` in front of the camera.
///
/// Whether lens distortion is still present depends on where the point came from;
/// [`CameraIntrinsics::calibrate`] only undoes the linear part of the camera.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct NormalizedKeyPoint(pub Point2<f64>);

/// Dimensions of the images a camera produces, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// This contains intrinsic camera parameters as per
/// [this Wikipedia page](https://en.wikipedia.org/wiki/Camera_resectioning#Intrinsic_parameters).
///
/// The intrinsic matrix is fixed for a whole recording; distortion lives separately in
/// [`BrownConrady`].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CameraIntrinsics {
    pub focals: Vector2<f64>,
    pub principal_point: Point2<f64>,
    pub skew: f64,
}

impl CameraIntrinsics {
    /// Creates camera intrinsics that would create an identity intrinsic matrix.
    /// This would imply that the pixel positions have an origin at `0,0`,
    /// the pixel distance unit is the focal length, pixels are square,
    /// and there is no skew.
    pub fn identity() -> Self {
        Self {
            focals: Vector2::new(1.0, 1.0),
            skew: 0.0,
            principal_point: Point2::new(0.0, 0.0),
        }
    }

    pub fn focals(self, focals: Vector2<f64>) -> Self {
        Self { focals, ..self }
    }

    pub fn focal(self, focal: f64) -> Self {
        Self {
            focals: Vector2::new(focal, focal),
            ..self
        }
    }

    pub fn principal_point(self, principal_point: Point2<f64>) -> Self {
        Self {
            principal_point,
            ..self
        }
    }

    pub fn skew(self, skew: f64) -> Self {
        Self { skew, ..self }
    }

    #[rustfmt::skip]
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.focals.x,  self.skew,      self.principal_point.x,
            0.0,            self.focals.y,  self.principal_point.y,
            0.0,            0.0,            1.0,
        )
    }

    /// Reads the intrinsics back out of an upper triangular intrinsic matrix.
    ///
    /// The matrix is divided through by its bottom right entry first, so any projectively
    /// equivalent scaling is accepted. Returns `None` when that entry is zero.
    pub fn from_matrix(matrix: &Matrix3<f64>) -> Option<Self> {
        let scale = matrix.m33;
        if scale == 0.0 || !scale.is_finite() {
            return None;
        }
        let k = matrix / scale;
        Some(Self {
            focals: Vector2::new(k.m11, k.m22),
            principal_point: Point2::new(k.m13, k.m23),
            skew: k.m12,
        })
    }

    /// Whether the focal lengths and principal point are all finite and strictly positive.
    ///
    /// Anything that divides by these values (normalizing points, deriving a field of view)
    /// must check this first.
    pub fn is_valid(&self) -> bool {
        let values = [
            self.focals.x,
            self.focals.y,
            self.principal_point.x,
            self.principal_point.y,
        ];
        values.iter().all(|&v| v.is_finite() && v > 0.0) && self.skew.is_finite()
    }

    /// Takes in a point from an image in pixel coordinates and
    /// converts it to a [`NormalizedKeyPoint`].
    ///
    /// ```
    /// use cv_core::KeyPoint;
    /// use cv_pinhole::CameraIntrinsics;
    /// use cv_core::nalgebra::{Vector2, Point2};
    /// let intrinsics = CameraIntrinsics {
    ///     focals: Vector2::new(800.0, 900.0),
    ///     principal_point: Point2::new(500.0, 600.0),
    ///     skew: 1.7,
    /// };
    /// let kp = KeyPoint(Point2::new(471.0, 322.0));
    /// let nkp = intrinsics.calibrate(kp);
    /// let calibration_matrix = intrinsics.matrix();
    /// let distance = (kp.to_homogeneous() - calibration_matrix * nkp.to_homogeneous()).norm();
    /// assert!(distance < 0.1);
    /// ```
    pub fn calibrate<P>(&self, point: P) -> NormalizedKeyPoint
    where
        P: ImagePoint,
    {
        let centered = point.image_point() - self.principal_point;
        let y = centered.y / self.focals.y;
        let x = (centered.x - self.skew * y) / self.focals.x;
        NormalizedKeyPoint(Point2::new(x, y))
    }

    /// Converts a [`NormalizedKeyPoint`] back into pixel coordinates.
    ///
    /// ```
    /// use cv_core::KeyPoint;
    /// use cv_pinhole::CameraIntrinsics;
    /// use cv_core::nalgebra::{Vector2, Point2};
    /// let intrinsics = CameraIntrinsics {
    ///     focals: Vector2::new(800.0, 900.0),
    ///     principal_point: Point2::new(500.0, 600.0),
    ///     skew: 1.7,
    /// };
    /// let kp = KeyPoint(Point2::new(471.0, 322.0));
    /// let nkp = intrinsics.calibrate(kp);
    /// let ukp = intrinsics.uncalibrate(nkp);
    /// assert!((kp.0 - ukp.0).norm() < 1e-6);
    /// ```
    pub fn uncalibrate(&self, projection: NormalizedKeyPoint) -> KeyPoint {
        let y = projection.y * self.focals.y;
        let x = projection.x * self.focals.x + self.skew * projection.y;
        let centered = Point2::new(x, y);
        KeyPoint(centered + self.principal_point.coords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn intrinsics() -> CameraIntrinsics {
        CameraIntrinsics::identity()
            .focals(Vector2::new(900.0, 880.0))
            .principal_point(Point2::new(640.0, 360.0))
    }

    #[test]
    fn matrix_roundtrip() {
        let k = intrinsics().skew(0.5);
        let back = CameraIntrinsics::from_matrix(&(k.matrix() * 3.0)).unwrap();
        assert_relative_eq!(back.focals, k.focals);
        assert_relative_eq!(back.principal_point, k.principal_point);
        assert_relative_eq!(back.skew, k.skew);
    }

    #[test]
    fn zero_focal_is_invalid() {
        assert!(intrinsics().is_valid());
        assert!(!intrinsics().focals(Vector2::new(0.0, 880.0)).is_valid());
        assert!(!intrinsics().principal_point(Point2::new(640.0, 0.0)).is_valid());
        assert!(!intrinsics().focal(f64::NAN).is_valid());
    }
}
