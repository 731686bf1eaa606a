use cv_pinhole::SolverError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("the pattern was not detected in any frame")]
    NoPatternDetected,
    #[error("no frames are left to process")]
    EmptyScope,
    #[error("frame at position {position} carries index {index}, frames must be numbered from 0")]
    FrameIndexMismatch { position: usize, index: usize },
    #[error("the pattern was found in {found} frames, calibration needs at least {required}")]
    InsufficientKeyframes { found: usize, required: usize },
    #[error("camera intrinsics cannot be turned into a projection: {0}")]
    DegenerateIntrinsics(&'static str),
    #[error("clip planes near = {near} and far = {far} do not satisfy 0 < near < far")]
    InvalidClipPlanes { near: f64, far: f64 },
    #[error("the solver returned {poses} poses for {keyframes} keyframes")]
    PoseCountMismatch { poses: usize, keyframes: usize },
    #[error("unknown propagation policy {0:?}, expected \"hold\" or \"interpolate\"")]
    UnknownPolicy(String),
    #[error("tracking was cancelled")]
    Cancelled,
    #[error("calibration failed: {0}")]
    Solver(SolverError),
    #[error("failed to load frame {path:?}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<SolverError> for TrackError {
    fn from(error: SolverError) -> Self {
        match error {
            SolverError::InsufficientViews { found, required } => {
                Self::InsufficientKeyframes { found, required }
            }
            other => Self::Solver(other),
        }
    }
}
