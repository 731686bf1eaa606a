use crate::{BrownConrady, CameraIntrinsics, ImageSize, PinholeCamera};
use cv_core::nalgebra::Matrix3;
use cv_core::{BoardToCamera, CorrespondenceSet};
use thiserror::Error;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The outcome of calibrating a camera against a set of board views.
///
/// There is one intrinsic matrix and one distortion model for the whole recording, and one
/// board pose per view, in the same order as the views handed to the solver.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Calibration {
    pub image_size: ImageSize,
    pub intrinsics: CameraIntrinsics,
    pub distortion: BrownConrady,
    pub poses: Vec<BoardToCamera>,
}

impl Calibration {
    /// The 3x3 intrinsic matrix.
    pub fn intrinsic_matrix(&self) -> Matrix3<f64> {
        self.intrinsics.matrix()
    }

    /// The camera model for projecting with this calibration.
    pub fn camera(&self) -> PinholeCamera {
        PinholeCamera::new(self.intrinsics, self.distortion)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverError {
    #[error("need at least {required} board views to calibrate, got {found}")]
    InsufficientViews { found: usize, required: usize },
    #[error("board view {view} has {found} correspondences, expected {expected}")]
    MismatchedCorrespondences {
        view: usize,
        found: usize,
        expected: usize,
    },
    #[error("homography estimation failed for board view {0}")]
    DegenerateHomography(usize),
    #[error("board views do not constrain the intrinsics: {0}")]
    DegenerateIntrinsics(&'static str),
}

/// Recovers camera intrinsics, distortion and one board pose per view from several full
/// views of a planar board.
pub trait CalibrationSolver {
    /// The fewest views the solver accepts.
    const MIN_VIEWS: usize;

    /// Calibrates from the given views.
    ///
    /// Implementations must return [`SolverError::InsufficientViews`] when fewer than
    /// [`CalibrationSolver::MIN_VIEWS`] views are passed, and must return exactly one pose per
    /// view, in input order.
    fn calibrate(
        &self,
        views: &[CorrespondenceSet],
        image_size: ImageSize,
    ) -> Result<Calibration, SolverError>;
}
