use crate::smallest_eigenvector;
use cv_core::nalgebra::{DMatrix, Matrix3, Point2, Vector2, Vector6};
use cv_pinhole::{CameraIntrinsics, SolverError};

/// The constraint vector `v_ij` such that `h_iᵀ B h_j = v_ijᵀ b` where `b` holds the six
/// distinct entries of the symmetric matrix `B = K⁻ᵀ K⁻¹`.
fn v_ij(homography: &Matrix3<f64>, i: usize, j: usize) -> Vector6<f64> {
    let hi = homography.column(i);
    let hj = homography.column(j);
    Vector6::new(
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    )
}

/// Recovers the intrinsic matrix from the homographies of several views of the same plane.
///
/// Each homography contributes the two constraints `h₁ᵀ B h₂ = 0` and
/// `h₁ᵀ B h₁ = h₂ᵀ B h₂`. With `zero_skew` the additional constraint `B₁₂ = 0` is added and
/// the returned skew is exactly zero.
///
/// The homographies should map the board into a conditioned image frame with coordinates of
/// order one, otherwise the linear system is badly scaled.
pub fn intrinsics_from_homographies(
    homographies: &[Matrix3<f64>],
    zero_skew: bool,
    epsilon: f64,
    iterations: usize,
) -> Result<CameraIntrinsics, SolverError> {
    let rows = 2 * homographies.len() + usize::from(zero_skew);
    let mut v = DMatrix::<f64>::zeros(rows, 6);
    for (k, homography) in homographies.iter().enumerate() {
        let v11 = v_ij(homography, 0, 0);
        let v22 = v_ij(homography, 1, 1);
        let v12 = v_ij(homography, 0, 1);
        v.row_mut(2 * k).copy_from(&v12.transpose());
        v.row_mut(2 * k + 1).copy_from(&(v11 - v22).transpose());
    }
    if zero_skew {
        v[(rows - 1, 1)] = 1.0;
    }

    let b = smallest_eigenvector(v.tr_mul(&v), epsilon, iterations)
        .ok_or(SolverError::DegenerateIntrinsics(
            "views do not determine a unique image of the absolute conic",
        ))?;
    let (b11, b12, b22, b13, b23, b33) = (b[0], b[1], b[2], b[3], b[4], b[5]);

    let denom = b11 * b22 - b12 * b12;
    let denom_norm = b11 * b11 + b22 * b22;
    if !(denom_norm > 0.0) || denom.abs() / denom_norm <= 1e-9 {
        return Err(SolverError::DegenerateIntrinsics(
            "views are too similar to separate focal length from pose",
        ));
    }

    let v0 = (b12 * b13 - b11 * b23) / denom;
    let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;
    if lambda / b11 <= 0.0 || lambda * b11 / denom <= 0.0 {
        return Err(SolverError::DegenerateIntrinsics(
            "image of the absolute conic is not positive definite",
        ));
    }

    let alpha = (lambda / b11).sqrt();
    let beta = (lambda * b11 / denom).sqrt();
    let gamma = if zero_skew {
        0.0
    } else {
        -b12 * alpha * alpha * beta / lambda
    };
    let u0 = gamma * v0 / beta - b13 * alpha * alpha / lambda;

    let intrinsics = CameraIntrinsics {
        focals: Vector2::new(alpha, beta),
        principal_point: Point2::new(u0, v0),
        skew: gamma,
    };
    let finite = intrinsics
        .focals
        .iter()
        .chain(intrinsics.principal_point.iter())
        .all(|v| v.is_finite());
    if finite {
        Ok(intrinsics)
    } else {
        Err(SolverError::DegenerateIntrinsics("intrinsics are not finite"))
    }
}
