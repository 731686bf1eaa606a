use crate::smallest_eigenvector;
use cv_core::nalgebra::{DMatrix, Matrix3, Point2, Vector2};

/// Minimum number of point pairs that determine a homography.
pub const MIN_POINTS: usize = 4;

/// Builds the similarity that moves `points` to zero centroid and a mean distance of `√2`
/// from the origin.
fn conditioner<I>(points: I) -> Option<Matrix3<f64>>
where
    I: Iterator<Item = Point2<f64>> + Clone,
{
    let n = points.clone().count() as f64;
    if n == 0.0 {
        return None;
    }
    let centroid = points
        .clone()
        .fold(Vector2::zeros(), |acc, p| acc + p.coords)
        / n;
    let spread = points.map(|p| (p.coords - centroid).norm()).sum::<f64>() / n;
    if !(spread > f64::EPSILON) {
        return None;
    }
    let s = core::f64::consts::SQRT_2 / spread;
    #[rustfmt::skip]
    let conditioner = Matrix3::new(
        s,   0.0, -s * centroid.x,
        0.0, s,   -s * centroid.y,
        0.0, 0.0, 1.0,
    );
    Some(conditioner)
}

/// Estimates the homography `H` with `image ~ H * board` from pairs of board plane
/// coordinates and image coordinates using the normalized direct linear transform.
///
/// The result is scaled so that `H[(2, 2)] == 1` when that entry is not vanishing.
/// Returns `None` with fewer than [`MIN_POINTS`] pairs or when the points are degenerate.
pub fn estimate_homography(
    pairs: &[(Point2<f64>, Point2<f64>)],
    epsilon: f64,
    iterations: usize,
) -> Option<Matrix3<f64>> {
    if pairs.len() < MIN_POINTS {
        return None;
    }
    let board_conditioner = conditioner(pairs.iter().map(|&(board, _)| board))?;
    let image_conditioner = conditioner(pairs.iter().map(|&(_, image)| image))?;

    let mut a = DMatrix::<f64>::zeros(2 * pairs.len(), 9);
    for (i, &(board, image)) in pairs.iter().enumerate() {
        let b = board_conditioner.transform_point(&board);
        let m = image_conditioner.transform_point(&image);
        let (x, y, u, v) = (b.x, b.y, m.x, m.y);

        let r0 = 2 * i;
        let r1 = r0 + 1;

        a[(r0, 0)] = -x;
        a[(r0, 1)] = -y;
        a[(r0, 2)] = -1.0;
        a[(r0, 6)] = u * x;
        a[(r0, 7)] = u * y;
        a[(r0, 8)] = u;

        a[(r1, 3)] = -x;
        a[(r1, 4)] = -y;
        a[(r1, 5)] = -1.0;
        a[(r1, 6)] = v * x;
        a[(r1, 7)] = v * y;
        a[(r1, 8)] = v;
    }

    let h = smallest_eigenvector(a.tr_mul(&a), epsilon, iterations)?;
    let conditioned = Matrix3::from_row_slice(h.as_slice());
    let mut homography = image_conditioner.try_inverse()? * conditioned * board_conditioner;

    let scale = homography.m33;
    if scale.abs() > f64::EPSILON {
        homography /= scale;
    } else {
        homography /= homography.norm();
    }

    if homography.iter().all(|v| v.is_finite()) {
        Some(homography)
    } else {
        None
    }
}

/// Maps a board plane point through a homography.
pub fn apply_homography(homography: &Matrix3<f64>, point: Point2<f64>) -> Option<Point2<f64>> {
    let projected = homography * point.to_homogeneous();
    if projected.z.abs() <= f64::EPSILON {
        return None;
    }
    Some(Point2::new(projected.x / projected.z, projected.y / projected.z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn scaling_homography() {
        let pairs = [
            (Point2::new(0.0, 0.0), Point2::new(0.0, 0.0)),
            (Point2::new(1.0, 0.0), Point2::new(2.0, 0.0)),
            (Point2::new(1.0, 1.0), Point2::new(2.0, 2.0)),
            (Point2::new(0.0, 1.0), Point2::new(0.0, 2.0)),
        ];
        let h = estimate_homography(&pairs, 1e-12, 1000).unwrap();
        assert_relative_eq!(h.m11, 2.0, epsilon = 1e-6);
        assert_relative_eq!(h.m22, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn recovers_projective_map() {
        #[rustfmt::skip]
        let truth = Matrix3::new(
            310.0, -42.0, 400.0,
            25.0,  290.0, 230.0,
            0.02,  -0.03, 1.0,
        );
        let pairs: Vec<_> = (0..6)
            .flat_map(|y| (0..9).map(move |x| Point2::new(x as f64, y as f64)))
            .map(|board| (board, apply_homography(&truth, board).unwrap()))
            .collect();
        let h = estimate_homography(&pairs, 1e-12, 1000).unwrap();
        assert_relative_eq!(h, truth, max_relative = 1e-6);
    }

    #[test]
    fn too_few_or_collapsed_points() {
        let p = Point2::new(1.0, 1.0);
        assert!(estimate_homography(&[(p, p); 3], 1e-12, 1000).is_none());
        assert!(estimate_homography(&[(p, p); 8], 1e-12, 1000).is_none());
    }
}
