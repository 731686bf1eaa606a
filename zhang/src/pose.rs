use cv_core::nalgebra::{Matrix3, Rotation3};
use cv_core::BoardToCamera;

/// Decomposes the homography of the `Z = 0` board plane into the board pose, given the
/// inverse of the intrinsic matrix.
///
/// The scale is chosen so that the board lies in front of the camera, and the rotation is
/// projected onto the nearest proper rotation matrix.
pub fn pose_from_homography(
    k_inverse: &Matrix3<f64>,
    homography: &Matrix3<f64>,
) -> Option<BoardToCamera> {
    let h1 = k_inverse * homography.column(0);
    let h2 = k_inverse * homography.column(1);
    let h3 = k_inverse * homography.column(2);

    let norm = 0.5 * (h1.norm() + h2.norm());
    if !(norm > f64::EPSILON) {
        return None;
    }
    let mut lambda = norm.recip();
    if h3.z < 0.0 {
        lambda = -lambda;
    }

    let r1 = lambda * h1;
    let r2 = lambda * h2;
    let r3 = r1.cross(&r2);
    let translation = lambda * h3;

    let svd = Matrix3::from_columns(&[r1, r2, r3]).svd(true, true);
    let mut u = svd.u?;
    let v_t = svd.v_t?;
    if (u * v_t).determinant() < 0.0 {
        u.column_mut(2).neg_mut();
    }
    let rotation = Rotation3::from_matrix_unchecked(u * v_t);

    if translation.iter().all(|v| v.is_finite()) {
        Some(BoardToCamera::from_parts(translation, rotation))
    } else {
        None
    }
}
