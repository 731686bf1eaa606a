use crate::{BoardPoint, BoardToCamera, CameraPoint, KeyPoint};

/// Allows conversion from a point in camera space to where it lands on the image.
pub trait CameraModel {
    /// Extracts the pixel location in the image from a camera point.
    ///
    /// The camera point X axis points right, Y axis points down, and Z axis points forwards.
    /// The image point uses the same coordiate frame. Its Y is down and its X is right.
    ///
    /// Since this might not be possible (if the point is behind the camera for a pinhole camera),
    /// this operation is fallible.
    fn project(&self, point: CameraPoint) -> Option<KeyPoint>;

    /// Projects a board point seen from `pose` onto the image.
    fn project_board(&self, pose: BoardToCamera, point: BoardPoint) -> Option<KeyPoint> {
        self.project(pose.transform(point))
    }
}
