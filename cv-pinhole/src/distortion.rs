use cv_core::nalgebra::Vector2;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Number of coefficients in a [`BrownConrady`] model.
pub const DISTORTION_COEFFICIENTS: usize = 5;

/// Lens distortion following the [Brown-Conrady][b71] model with three radial and two
/// tangential (decentering) coefficients, laid out in OpenCV order `[k1, k2, p1, p2, k3]`.
///
/// Given undistorted normalized coordinates $(x, y)$ and $r^2 = x^2 + y^2$, the distorted
/// coordinates are
///
/// $$
/// \begin{aligned}
/// x' &= x ⋅ (1 + k_1 r^2 + k_2 r^4 + k_3 r^6) + 2 p_1 x y + p_2 (r^2 + 2 x^2) \\\\
/// y' &= y ⋅ (1 + k_1 r^2 + k_2 r^4 + k_3 r^6) + p_1 (r^2 + 2 y^2) + 2 p_2 x y
/// \end{aligned}
/// $$
///
/// [b71]: https://www.asprs.org/wp-content/uploads/pers/1971journal/aug/1971_aug_855-866.pdf
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct BrownConrady {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl BrownConrady {
    /// A lens without distortion.
    pub fn none() -> Self {
        Self::default()
    }

    /// Purely radial distortion with `k1` and `k2`.
    pub fn radial(k1: f64, k2: f64) -> Self {
        Self {
            k1,
            k2,
            ..Self::default()
        }
    }

    /// Builds the model from an OpenCV style coefficient vector.
    ///
    /// Shorter vectors leave the missing coefficients at zero and extra coefficients
    /// (rational or thin prism terms) are ignored.
    pub fn from_coefficients(coefficients: &[f64]) -> Self {
        let c = |i: usize| coefficients.get(i).copied().unwrap_or(0.0);
        Self {
            k1: c(0),
            k2: c(1),
            p1: c(2),
            p2: c(3),
            k3: c(4),
        }
    }

    /// The coefficient vector `[k1, k2, p1, p2, k3]`.
    pub fn coefficients(&self) -> [f64; DISTORTION_COEFFICIENTS] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    /// Applies distortion to an undistorted normalized point.
    pub fn distort(&self, point: Vector2<f64>) -> Vector2<f64> {
        let (x, y) = (point.x, point.y);
        let r2 = point.norm_squared();
        let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
        let xy = x * y;
        Vector2::new(
            x * radial + 2.0 * self.p1 * xy + self.p2 * (r2 + 2.0 * x * x),
            y * radial + self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * xy,
        )
    }

    /// Removes distortion from a distorted normalized point by fixed point iteration.
    ///
    /// This converges for the moderate distortion a calibration board reveals; for severe
    /// fisheye distortion a different model should be used.
    pub fn undistort(&self, point: Vector2<f64>) -> Vector2<f64> {
        // Maximum number of refinement steps.
        const MAX_ITERATIONS: usize = 100;

        let mut undistorted = point;
        for _ in 0..MAX_ITERATIONS {
            let error = self.distort(undistorted) - point;
            undistorted -= error;
            if error.norm_squared() <= f64::EPSILON * f64::EPSILON {
                break;
            }
        }
        undistorted
    }

    pub fn is_identity(&self) -> bool {
        self.coefficients().iter().all(|&c| c == 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn lens() -> BrownConrady {
        BrownConrady::from_coefficients(&[-0.28, 0.07, 0.0012, -0.0004, 0.0])
    }

    #[test]
    fn identity_is_noop() {
        let p = Vector2::new(0.3, -0.2);
        assert_eq!(BrownConrady::none().distort(p), p);
        assert!(BrownConrady::none().is_identity());
    }

    #[test]
    fn radial_only_scales_along_the_ray() {
        let lens = BrownConrady::radial(0.1, 0.0);
        let p = Vector2::new(0.3, 0.4);
        // r^2 = 0.25, factor = 1.025
        assert_relative_eq!(lens.distort(p), p * 1.025, epsilon = 1e-15);
    }

    #[test]
    fn coefficient_order_matches_opencv() {
        let lens = BrownConrady::from_coefficients(&[1.0, 2.0, 3.0]);
        assert_eq!(lens.coefficients(), [1.0, 2.0, 3.0, 0.0, 0.0]);
    }

    #[test]
    fn undistort_inverts_distort() {
        let lens = lens();
        proptest!(|(x in -0.5..0.5f64, y in -0.4..0.4f64)| {
            let p = Vector2::new(x, y);
            let back = lens.undistort(lens.distort(p));
            prop_assert!((back - p).norm() < 1e-9);
        });
    }
}
