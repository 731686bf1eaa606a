use crate::{BrownConrady, CameraIntrinsics, NormalizedKeyPoint};
use cv_core::{CameraModel, CameraPoint, KeyPoint};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A pinhole camera with Brown-Conrady lens distortion.
///
/// Projection runs camera point → normalized image plane → distortion → intrinsic matrix,
/// which is the model planar calibration solvers such as OpenCV's `calibrateCamera` fit.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct PinholeCamera {
    pub intrinsics: CameraIntrinsics,
    pub distortion: BrownConrady,
}

impl PinholeCamera {
    pub fn new(intrinsics: CameraIntrinsics, distortion: BrownConrady) -> Self {
        Self {
            intrinsics,
            distortion,
        }
    }

    /// A camera without lens distortion.
    pub fn ideal(intrinsics: CameraIntrinsics) -> Self {
        Self::new(intrinsics, BrownConrady::none())
    }

    /// Converts a pixel into an undistorted [`NormalizedKeyPoint`].
    pub fn calibrate(&self, point: KeyPoint) -> NormalizedKeyPoint {
        let NormalizedKeyPoint(distorted) = self.intrinsics.calibrate(point);
        NormalizedKeyPoint(self.distortion.undistort(distorted.coords).into())
    }
}

impl CameraModel for PinholeCamera {
    /// ```
    /// use cv_core::{BoardPoint, BoardToCamera, CameraModel, Skew3};
    /// use cv_core::nalgebra::{Point2, Vector2, Vector3};
    /// use cv_pinhole::{CameraIntrinsics, PinholeCamera};
    /// let camera = PinholeCamera::ideal(CameraIntrinsics {
    ///     focals: Vector2::new(800.0, 800.0),
    ///     principal_point: Point2::new(320.0, 240.0),
    ///     skew: 0.0,
    /// });
    /// let pose = BoardToCamera::new(Skew3::zeros(), Vector3::new(0.0, 0.0, 2.0));
    /// let kp = camera.project_board(pose, BoardPoint::new(0.5, 0.25, 0.0)).unwrap();
    /// assert!((kp.0 - Point2::new(520.0, 340.0)).norm() < 1e-9);
    /// ```
    fn project(&self, point: CameraPoint) -> Option<KeyPoint> {
        let normalized = point.normalized()?;
        let distorted = self.distortion.distort(normalized.coords);
        Some(
            self.intrinsics
                .uncalibrate(NormalizedKeyPoint(distorted.into())),
        )
    }
}
