use derive_more::{AsMut, AsRef, Deref, DerefMut, From, Into};
use nalgebra::{Point2, Point3};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Allows the retrieval of the point on the image the observation came from.
pub trait ImagePoint {
    /// Retrieves the point on the image
    fn image_point(&self) -> Point2<f64>;
}

/// A point on an image frame in pixel coordinates.
///
/// The keypoint is neither undistorted nor normalized. Its X is right and its Y is down,
/// with the origin at the top left corner of the image.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct KeyPoint(pub Point2<f64>);

impl KeyPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self(Point2::new(x, y))
    }

    /// Euclidean distance in pixels between two key points.
    pub fn distance(&self, other: &KeyPoint) -> f64 {
        nalgebra::distance(&self.0, &other.0)
    }
}

impl ImagePoint for KeyPoint {
    fn image_point(&self) -> Point2<f64> {
        self.0
    }
}

/// A point on the calibration pattern, expressed in board space.
///
/// Every point produced by a [`BoardLayout`](crate::BoardLayout) has `z == 0`, but the type
/// does not enforce it so that non-planar targets can still flow through projection code.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct BoardPoint(pub Point3<f64>);

impl BoardPoint {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self(Point3::new(x, y, z))
    }
}

/// A 3d point which is relative to the camera's optical center and orientation where
/// the positive X axis is right, positive Y axis is down, and positive Z axis is forwards
/// from the optical center of the camera.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CameraPoint(pub Point3<f64>);

impl CameraPoint {
    /// Divides by depth to land on the virtual image plane at `z = 1`.
    ///
    /// Returns `None` for points on or behind the optical center, which cannot be imaged.
    pub fn normalized(self) -> Option<Point2<f64>> {
        if self.z > f64::EPSILON {
            Some(Point2::new(self.x / self.z, self.y / self.z))
        } else {
            None
        }
    }
}
