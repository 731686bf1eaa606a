use crate::{FramePoseMap, TrackError, ViewSettings};
use cv_core::nalgebra::{Matrix4, Perspective3};
use cv_core::BoardToCamera;
use cv_pinhole::CameraIntrinsics;

/// Flips Y and Z to go from the vision camera frame (Y down, Z forward) to the rendering
/// camera frame (Y up, Z backward).
#[rustfmt::skip]
fn vision_to_render() -> Matrix4<f64> {
    Matrix4::new(
        1.0,  0.0,  0.0, 0.0,
        0.0, -1.0,  0.0, 0.0,
        0.0,  0.0, -1.0, 0.0,
        0.0,  0.0,  0.0, 1.0,
    )
}

/// The render view matrix of a board pose: the board to camera transform followed by the
/// change to the rendering camera frame.
pub fn view_matrix(pose: BoardToCamera) -> Matrix4<f64> {
    vision_to_render() * pose.homogeneous()
}

/// An OpenGL style perspective projection matching the camera's vertical field of view.
///
/// The field of view is `2 * atan(cy / fy)` and the aspect ratio `cx / cy`, so the principal
/// point is taken to be the image center.
pub fn projection_matrix(
    intrinsics: &CameraIntrinsics,
    settings: &ViewSettings,
) -> Result<Matrix4<f64>, TrackError> {
    if !intrinsics.is_valid() {
        return Err(TrackError::DegenerateIntrinsics(
            "focal lengths and principal point must be finite and positive",
        ));
    }
    let ViewSettings { near, far } = *settings;
    if !(near.is_finite() && far.is_finite() && near > 0.0 && far - near > f64::EPSILON) {
        return Err(TrackError::InvalidClipPlanes { near, far });
    }
    let cx = intrinsics.principal_point.x;
    let cy = intrinsics.principal_point.y;
    let fovy = 2.0 * (cy / intrinsics.focals.y).atan();
    let aspect = cx / cy;
    if !(aspect.is_finite() && aspect > f64::EPSILON) {
        return Err(TrackError::DegenerateIntrinsics(
            "principal point gives a vanishing or unbounded aspect ratio",
        ));
    }
    if !(fovy.is_finite() && fovy > 0.0) {
        return Err(TrackError::DegenerateIntrinsics(
            "principal point and focal length give no vertical field of view",
        ));
    }
    Ok(Perspective3::new(aspect, fovy, near, far).into_inner())
}

/// Copies a matrix into the column-major single precision layout graphics APIs take.
fn column_major(matrix: &Matrix4<f64>) -> [f32; 16] {
    let mut out = [0.0f32; 16];
    for (out, &v) in out.iter_mut().zip(matrix.iter()) {
        *out = v as f32;
    }
    out
}

/// The view and projection matrix for rendering over one frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewMatrices {
    pub view: Matrix4<f64>,
    pub projection: Matrix4<f64>,
}

impl ViewMatrices {
    pub fn new(
        pose: BoardToCamera,
        intrinsics: &CameraIntrinsics,
        settings: &ViewSettings,
    ) -> Result<Self, TrackError> {
        Ok(Self {
            view: view_matrix(pose),
            projection: projection_matrix(intrinsics, settings)?,
        })
    }

    pub fn view_column_major(&self) -> [f32; 16] {
        column_major(&self.view)
    }

    pub fn projection_column_major(&self) -> [f32; 16] {
        column_major(&self.projection)
    }
}

/// View matrices for every frame of a pose map, in frame order.
///
/// Each frame gets its own result so that a caller can skip the frames that fail.
pub fn view_matrices<'a>(
    poses: &'a FramePoseMap,
    intrinsics: &'a CameraIntrinsics,
    settings: &'a ViewSettings,
) -> impl Iterator<Item = (usize, Result<ViewMatrices, TrackError>)> + 'a {
    poses
        .iter()
        .map(move |(frame, pose)| (frame, ViewMatrices::new(pose, intrinsics, settings)))
}
