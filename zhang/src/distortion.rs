use crate::homography::apply_homography;
use cv_core::nalgebra::{DMatrix, DVector, Matrix3, Point2};
use cv_pinhole::{BrownConrady, SolverError};

/// Which lens distortion coefficients the solver estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistortionModel {
    /// Assume an ideal pinhole lens.
    None,
    /// Estimate `k1` only.
    K1,
    /// Estimate `k1` and `k2`.
    K1K2,
    /// Estimate `k1`, `k2` and the tangential terms `p1` and `p2`.
    K1K2P1P2,
}

impl DistortionModel {
    fn parameters(self) -> usize {
        match self {
            Self::None => 0,
            Self::K1 => 1,
            Self::K1K2 => 2,
            Self::K1K2P1P2 => 4,
        }
    }
}

impl Default for DistortionModel {
    fn default() -> Self {
        Self::K1K2
    }
}

/// One view for the distortion fit.
pub struct DistortionView<'a> {
    /// Homography from the board plane to undistorted pixels.
    pub homography: Matrix3<f64>,
    /// Board plane points paired with the raw, distorted pixels.
    pub pairs: &'a [(Point2<f64>, Point2<f64>)],
}

/// Fits distortion coefficients to the residual between the raw pixels and the pixels the
/// undistorted homography predicts, both taken to normalized coordinates with `k_inverse`.
///
/// The residual is linear in the coefficients when evaluated at the predicted point, which
/// makes this a single least squares solve.
pub fn fit_distortion(
    model: DistortionModel,
    k_inverse: &Matrix3<f64>,
    views: &[DistortionView<'_>],
) -> Result<BrownConrady, SolverError> {
    let parameters = model.parameters();
    if parameters == 0 {
        return Ok(BrownConrady::none());
    }

    let normalize = |pixel: Point2<f64>| k_inverse.transform_point(&pixel);
    let total: usize = views.iter().map(|view| view.pairs.len()).sum();
    let mut a = DMatrix::<f64>::zeros(2 * total, parameters);
    let mut b = DVector::<f64>::zeros(2 * total);
    let mut max_r2: f64 = 0.0;

    let mut row = 0;
    for view in views {
        for &(board, observed) in view.pairs {
            let predicted = apply_homography(&view.homography, board).ok_or(
                SolverError::DegenerateIntrinsics("board point maps to infinity"),
            )?;
            let ideal = normalize(predicted);
            let residual = normalize(observed) - ideal;

            let (x, y) = (ideal.x, ideal.y);
            let r2 = x * x + y * y;
            max_r2 = max_r2.max(r2);

            a[(row, 0)] = x * r2;
            a[(row + 1, 0)] = y * r2;
            if parameters > 1 {
                a[(row, 1)] = x * r2 * r2;
                a[(row + 1, 1)] = y * r2 * r2;
            }
            if parameters > 2 {
                a[(row, 2)] = 2.0 * x * y;
                a[(row + 1, 2)] = r2 + 2.0 * y * y;
                a[(row, 3)] = r2 + 2.0 * x * x;
                a[(row + 1, 3)] = 2.0 * x * y;
            }
            b[row] = residual.x;
            b[row + 1] = residual.y;
            row += 2;
        }
    }

    if max_r2 < 1e-6 {
        return Err(SolverError::DegenerateIntrinsics(
            "board points stay too close to the principal point to observe distortion",
        ));
    }

    let x = a
        .svd(true, true)
        .solve(&b, 1e-12)
        .map_err(SolverError::DegenerateIntrinsics)?;

    let coefficient = |i: usize| if i < parameters { x[i] } else { 0.0 };
    Ok(BrownConrady {
        k1: coefficient(0),
        k2: coefficient(1),
        p1: coefficient(2),
        p2: coefficient(3),
        k3: 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cv_core::nalgebra::{Rotation3, Vector2, Vector3};

    fn distorted_view(
        k: &Matrix3<f64>,
        homography_normalized: &Matrix3<f64>,
        lens: &BrownConrady,
    ) -> Vec<(Point2<f64>, Point2<f64>)> {
        (0..6)
            .flat_map(|y| (0..9).map(move |x| Point2::new(x as f64, y as f64)))
            .map(|board| {
                let n: Vector2<f64> =
                    apply_homography(homography_normalized, board).unwrap().coords;
                let pixel = k.transform_point(&lens.distort(n).into());
                (board, pixel)
            })
            .collect()
    }

    #[rustfmt::skip]
    fn k() -> Matrix3<f64> {
        Matrix3::new(
            800.0, 0.0,   640.0,
            0.0,   800.0, 360.0,
            0.0,   0.0,   1.0,
        )
    }

    fn plane(rotation: Rotation3<f64>, t: Vector3<f64>) -> Matrix3<f64> {
        let r = rotation.matrix();
        Matrix3::from_columns(&[r.column(0).into_owned(), r.column(1).into_owned(), t])
    }

    fn fit(model: DistortionModel, lens: &BrownConrady) -> BrownConrady {
        let k = k();
        let planes = [
            plane(
                Rotation3::from_euler_angles(0.1, 0.0, 0.05),
                Vector3::new(-4.0, -2.5, 8.0),
            ),
            plane(
                Rotation3::from_euler_angles(-0.05, 0.15, -0.1),
                Vector3::new(-3.0, -3.0, 9.0),
            ),
            plane(
                Rotation3::from_euler_angles(0.2, -0.1, 0.0),
                Vector3::new(-4.5, -2.0, 7.0),
            ),
        ];
        let pairs: Vec<_> = planes.iter().map(|h| distorted_view(&k, h, lens)).collect();
        let views: Vec<_> = planes
            .iter()
            .zip(&pairs)
            .map(|(h, pairs)| DistortionView {
                homography: k * h,
                pairs,
            })
            .collect();
        fit_distortion(model, &k.try_inverse().unwrap(), &views).unwrap()
    }

    #[test]
    fn no_model_means_no_distortion() {
        let lens = BrownConrady::radial(-0.2, 0.05);
        assert!(fit(DistortionModel::None, &lens).is_identity());
    }

    #[test]
    fn recovers_radial_terms() {
        let lens = BrownConrady::radial(-0.2, 0.05);
        let estimate = fit(DistortionModel::K1K2, &lens);
        assert_relative_eq!(estimate.k1, lens.k1, epsilon = 1e-9);
        assert_relative_eq!(estimate.k2, lens.k2, epsilon = 1e-9);
        assert_eq!(estimate.p1, 0.0);
    }

    #[test]
    fn recovers_tangential_terms() {
        let lens = BrownConrady::from_coefficients(&[-0.15, 0.02, 0.001, -0.002]);
        let estimate = fit(DistortionModel::K1K2P1P2, &lens);
        assert_relative_eq!(estimate.k1, lens.k1, epsilon = 1e-9);
        assert_relative_eq!(estimate.p1, lens.p1, epsilon = 1e-9);
        assert_relative_eq!(estimate.p2, lens.p2, epsilon = 1e-9);
    }
}
