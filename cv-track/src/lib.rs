//! Tracks a planar calibration pattern through a recorded frame sequence.
//!
//! The pattern is detected in a sparse set of keyframes, the camera is calibrated from those
//! detections, and every frame of the sequence is then given a board pose, including the
//! frames where the pattern was never looked for or not found. The poses can be measured
//! against the frames again ([`reprojection_error`]) and turned into matrices a renderer can
//! draw with ([`ViewMatrices`]).
//!
//! Detection and calibration are pluggable through the [`PatternDetector`] and
//! [`CalibrationSolver`](cv_pinhole::CalibrationSolver) traits.
//!
//! ```no_run
//! use cv_core::{GridSize, KeyPoint};
//! use cv_track::{CancelToken, Frame, ImageSequence, PatternDetector, TrackSettings, Tracker};
//!
//! struct ChessboardDetector;
//!
//! impl PatternDetector for ChessboardDetector {
//!     fn detect(&self, _frame: &Frame, _grid: GridSize) -> Option<Vec<KeyPoint>> {
//!         // Find the inner corners of the board here.
//!         None
//!     }
//! }
//!
//! let sequence = ImageSequence::open_dir("frames", 30.0)?;
//! let tracker = Tracker::new(ChessboardDetector, zhang::Zhang::new(), TrackSettings::default());
//! let track = tracker.track(&sequence, &CancelToken::new())?;
//! if let Some(report) = tracker.diagnose(sequence.frames(), &track) {
//!     println!("mean reprojection error: {} px", report.mean_error);
//! }
//! # Ok::<(), cv_track::TrackError>(())
//! ```

mod cancel;
mod detector;
mod diagnostic;
mod error;
mod frame;
mod propagate;
mod sampler;
mod settings;
mod track;
mod view;

pub use cancel::*;
pub use detector::*;
pub use diagnostic::*;
pub use error::*;
pub use frame::*;
pub use propagate::*;
pub use sampler::*;
pub use settings::*;
pub use track::*;
pub use view::*;
