//! Closed-form camera calibration from several views of a planar board, following
//! [Zhang's method](https://www.microsoft.com/en-us/research/publication/a-flexible-new-technique-for-camera-calibration/).
//!
//! Each view yields a board to image homography. The homographies constrain the image of the
//! absolute conic, which gives the intrinsic matrix in closed form. Every homography then
//! decomposes into a board pose, and the residual between the observed corners and the
//! undistorted homography fixes the lens distortion by linear least squares. When distortion
//! is estimated, the corners are undistorted with the current estimate and the whole linear
//! chain is repeated until the distortion settles.
//!
//! ```
//! use cv_core::{BoardLayout, CorrespondenceSet};
//! use cv_pinhole::{CalibrationSolver, ImageSize, SolverError};
//! use zhang::Zhang;
//!
//! // Two views are not enough to separate the focal length from the board pose.
//! let layout = BoardLayout::default();
//! let view = CorrespondenceSet::from_detection(
//!     &layout,
//!     &vec![cv_core::KeyPoint::new(0.0, 0.0); layout.grid.len()],
//! )
//! .unwrap();
//! let result = Zhang::new().calibrate(&[view.clone(), view], ImageSize::new(640, 480));
//! assert_eq!(
//!     result,
//!     Err(SolverError::InsufficientViews { found: 2, required: 3 })
//! );
//! ```

mod distortion;
mod homography;
mod intrinsics;
mod pose;

pub use distortion::{fit_distortion, DistortionModel, DistortionView};
pub use homography::{apply_homography, estimate_homography, MIN_POINTS};
pub use intrinsics::intrinsics_from_homographies;
pub use pose::pose_from_homography;

use cv_core::nalgebra::{DMatrix, DVector, Matrix3, Point2};
use cv_core::{BoardToCamera, Correspondence, CorrespondenceSet, KeyPoint};
use cv_pinhole::{
    BrownConrady, Calibration, CalibrationSolver, CameraIntrinsics, ImageSize, PinholeCamera,
    SolverError,
};
use float_ord::FloatOrd;
use log::{debug, info};

/// Pairs of board plane coordinates and pixel coordinates for one view.
type PlanePairs = Vec<(Point2<f64>, Point2<f64>)>;

/// Eigenvector of the smallest eigenvalue of the symmetric matrix `ata`.
///
/// Returns `None` when the decomposition does not converge or when the smallest eigenvalue
/// is not isolated, which means the null space of the underlying system is not a single
/// direction.
pub(crate) fn smallest_eigenvector(
    ata: DMatrix<f64>,
    epsilon: f64,
    iterations: usize,
) -> Option<DVector<f64>> {
    // Relative size below which an eigenvalue of `AᵀA` counts as zero.
    const RANK_TOLERANCE: f64 = 1e-12;

    let eigens = ata.try_symmetric_eigen(epsilon, iterations)?;
    let mut order: Vec<usize> = (0..eigens.eigenvalues.len()).collect();
    order.sort_unstable_by_key(|&ix| FloatOrd(eigens.eigenvalues[ix]));
    let largest = eigens.eigenvalues[*order.last()?].abs();
    let second = eigens.eigenvalues[*order.get(1)?];
    if !(second > largest * RANK_TOLERANCE) {
        return None;
    }
    Some(eigens.eigenvectors.column(order[0]).into_owned())
}

/// Linear planar calibration after Zhang.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Zhang {
    /// Which distortion coefficients to estimate.
    pub distortion: DistortionModel,
    /// Constrain the intrinsic matrix to zero skew.
    pub zero_skew: bool,
    /// Maximum number of undistort and re-solve rounds after the first pass.
    pub max_refinements: usize,
    /// Refinement stops once no distortion coefficient moves more than this.
    pub distortion_tolerance: f64,
    /// Convergence threshold of the symmetric eigen solver.
    pub epsilon: f64,
    /// Iteration limit of the symmetric eigen solver.
    pub iterations: usize,
}

impl Zhang {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn distortion(self, distortion: DistortionModel) -> Self {
        Self { distortion, ..self }
    }

    pub fn zero_skew(self, zero_skew: bool) -> Self {
        Self { zero_skew, ..self }
    }

    pub fn max_refinements(self, max_refinements: usize) -> Self {
        Self {
            max_refinements,
            ..self
        }
    }

    /// Similarity taking pixels to a frame centered on the image with coordinates of order one.
    fn conditioner(image_size: ImageSize) -> Result<Matrix3<f64>, SolverError> {
        let scale = f64::from(image_size.width.max(image_size.height));
        if scale == 0.0 {
            return Err(SolverError::DegenerateIntrinsics("image size is empty"));
        }
        let cx = 0.5 * f64::from(image_size.width);
        let cy = 0.5 * f64::from(image_size.height);
        #[rustfmt::skip]
        let conditioner = Matrix3::new(
            1.0 / scale, 0.0,         -cx / scale,
            0.0,         1.0 / scale, -cy / scale,
            0.0,         0.0,         1.0,
        );
        Ok(conditioner)
    }

    /// One run of the linear chain. Homographies, intrinsics and poses come from `undistorted`
    /// while distortion is fitted against the `raw` pixels.
    fn solve_linear(
        &self,
        raw: &[PlanePairs],
        undistorted: &[PlanePairs],
        conditioner: &Matrix3<f64>,
    ) -> Result<(CameraIntrinsics, Vec<BoardToCamera>, BrownConrady), SolverError> {
        let homographies = undistorted
            .iter()
            .enumerate()
            .map(|(view, pairs)| {
                estimate_homography(pairs, self.epsilon, self.iterations)
                    .ok_or(SolverError::DegenerateHomography(view))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let conditioned: Vec<_> = homographies.iter().map(|h| conditioner * h).collect();
        let conditioned_intrinsics = intrinsics_from_homographies(
            &conditioned,
            self.zero_skew,
            self.epsilon,
            self.iterations,
        )?;
        let deconditioner = conditioner
            .try_inverse()
            .ok_or(SolverError::DegenerateIntrinsics("image conditioning is singular"))?;
        let intrinsics =
            CameraIntrinsics::from_matrix(&(deconditioner * conditioned_intrinsics.matrix()))
                .filter(CameraIntrinsics::is_valid)
                .ok_or(SolverError::DegenerateIntrinsics(
                    "recovered focal length or principal point is not positive",
                ))?;
        let k_inverse = intrinsics
            .matrix()
            .try_inverse()
            .ok_or(SolverError::DegenerateIntrinsics("intrinsic matrix is singular"))?;

        let poses = homographies
            .iter()
            .enumerate()
            .map(|(view, h)| {
                pose_from_homography(&k_inverse, h).ok_or(SolverError::DegenerateHomography(view))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let distortion_views: Vec<_> = homographies
            .iter()
            .zip(raw)
            .map(|(&homography, pairs)| DistortionView { homography, pairs })
            .collect();
        let distortion = fit_distortion(self.distortion, &k_inverse, &distortion_views)?;

        Ok((intrinsics, poses, distortion))
    }
}

impl Default for Zhang {
    fn default() -> Self {
        Self {
            distortion: DistortionModel::default(),
            zero_skew: true,
            max_refinements: 20,
            distortion_tolerance: 1e-9,
            epsilon: 1e-12,
            iterations: 1000,
        }
    }
}

/// Removes `camera`'s distortion from every pixel, keeping pixel units.
fn undistort(raw: &[PlanePairs], camera: &PinholeCamera) -> Vec<PlanePairs> {
    raw.iter()
        .map(|pairs| {
            pairs
                .iter()
                .map(|&(board, pixel)| {
                    let normalized = camera.calibrate(KeyPoint(pixel));
                    (board, camera.intrinsics.uncalibrate(normalized).0)
                })
                .collect()
        })
        .collect()
}

impl CalibrationSolver for Zhang {
    const MIN_VIEWS: usize = 3;

    fn calibrate(
        &self,
        views: &[CorrespondenceSet],
        image_size: ImageSize,
    ) -> Result<Calibration, SolverError> {
        if views.len() < Self::MIN_VIEWS {
            return Err(SolverError::InsufficientViews {
                found: views.len(),
                required: Self::MIN_VIEWS,
            });
        }
        let expected = views[0].len().max(MIN_POINTS);
        if let Some((view, set)) = views
            .iter()
            .enumerate()
            .find(|(_, set)| set.len() != expected)
        {
            return Err(SolverError::MismatchedCorrespondences {
                view,
                found: set.len(),
                expected,
            });
        }

        let conditioner = Self::conditioner(image_size)?;
        let raw: Vec<PlanePairs> = views
            .iter()
            .map(|set| {
                set.iter()
                    .map(|&Correspondence(board, image)| (board.0.xy(), image.0))
                    .collect()
            })
            .collect();

        let (mut intrinsics, mut poses, mut distortion) =
            self.solve_linear(&raw, &raw, &conditioner)?;
        debug!(
            "initial estimate: focals {:?}, principal point {:?}, distortion {:?}",
            intrinsics.focals, intrinsics.principal_point, distortion
        );

        if self.distortion != DistortionModel::None {
            for refinement in 0..self.max_refinements {
                let camera = PinholeCamera::new(intrinsics, distortion);
                let undistorted = undistort(&raw, &camera);
                let (next_intrinsics, next_poses, next_distortion) =
                    self.solve_linear(&raw, &undistorted, &conditioner)?;
                let change = distortion
                    .coefficients()
                    .iter()
                    .zip(next_distortion.coefficients().iter())
                    .map(|(a, b)| (a - b).abs())
                    .fold(0.0, f64::max);
                intrinsics = next_intrinsics;
                poses = next_poses;
                distortion = next_distortion;
                debug!(
                    "refinement {}: focals {:?}, distortion {:?}, change {:e}",
                    refinement, intrinsics.focals, distortion, change
                );
                if change <= self.distortion_tolerance {
                    break;
                }
            }
        }

        info!(
            "calibrated {} views: focals ({:.3}, {:.3}), principal point ({:.3}, {:.3})",
            views.len(),
            intrinsics.focals.x,
            intrinsics.focals.y,
            intrinsics.principal_point.x,
            intrinsics.principal_point.y
        );

        Ok(Calibration {
            image_size,
            intrinsics,
            distortion,
            poses,
        })
    }
}
