use crate::{detect_board, Frame, FramePoseMap, PatternDetector};
use cv_core::{BoardLayout, BoardToCamera, CameraModel, Correspondence};
use cv_pinhole::Calibration;
use float_ord::FloatOrd;
use log::{info, warn};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The mean pixel distance between detected and reprojected grid points in one frame.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameError {
    pub frame: usize,
    pub error: f64,
}

/// How well the tracked poses explain the pattern wherever it can be seen.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ReprojectionReport {
    /// Unweighted mean of the per-frame errors, in pixels.
    pub mean_error: f64,
    /// Every measured frame, in frame order.
    pub per_frame: Vec<FrameError>,
}

impl ReprojectionReport {
    /// Summarizes per-frame errors, or `None` if there are none.
    ///
    /// Frames are put in frame order before summing, so the result does not depend on the
    /// order in which they were measured.
    pub fn from_frames(mut per_frame: Vec<FrameError>) -> Option<Self> {
        if per_frame.is_empty() {
            return None;
        }
        per_frame.sort_unstable_by_key(|e| e.frame);
        let mean_error =
            per_frame.iter().map(|e| e.error).sum::<f64>() / per_frame.len() as f64;
        Some(Self {
            mean_error,
            per_frame,
        })
    }

    pub fn frames_measured(&self) -> usize {
        self.per_frame.len()
    }

    /// The frame with the largest error.
    pub fn worst(&self) -> Option<FrameError> {
        self.per_frame
            .iter()
            .copied()
            .max_by_key(|e| FloatOrd(e.error))
    }
}

/// Mean distance between the detected points and the board points projected through `pose`.
fn frame_error<C: CameraModel>(
    camera: &C,
    pose: BoardToCamera,
    correspondences: impl Iterator<Item = Correspondence>,
) -> Option<f64> {
    let mut total = 0.0;
    let mut count = 0usize;
    for Correspondence(board, detected) in correspondences {
        total += camera.project_board(pose, board)?.distance(&detected);
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(total / count as f64)
    }
}

/// Re-detects the pattern in every frame of the pose map's scope and measures how far the
/// detected points lie from the points the calibration and the frame's pose predict.
///
/// This pass is independent of keyframe sampling: frames that were skipped there are examined
/// here too. Frames without a detection are left out rather than counted as zero, as are frames
/// where a board point projects behind the camera. Returns `None` when no frame could be
/// measured.
pub fn reprojection_error<D>(
    detector: &D,
    frames: &[Frame],
    layout: &BoardLayout,
    poses: &FramePoseMap,
    calibration: &Calibration,
) -> Option<ReprojectionReport>
where
    D: PatternDetector + ?Sized,
{
    let camera = calibration.camera();
    let scope = poses.scope();
    let in_scope = frames.get(scope.start..scope.end.min(frames.len()))?;

    let measure = |(offset, frame): (usize, &Frame)| -> Option<FrameError> {
        let index = scope.start + offset;
        let pose = poses.get(index)?;
        let set = detect_board(detector, frame, layout)?;
        match frame_error(&camera, pose, set.iter().copied()) {
            Some(error) => Some(FrameError {
                frame: index,
                error,
            }),
            None => {
                warn!("frame {}: board projects behind the camera, not measured", index);
                None
            }
        }
    };

    #[cfg(not(feature = "rayon"))]
    let per_frame: Vec<FrameError> = in_scope.iter().enumerate().filter_map(measure).collect();
    #[cfg(feature = "rayon")]
    let per_frame: Vec<FrameError> = in_scope
        .par_iter()
        .enumerate()
        .filter_map(measure)
        .collect();

    let report = ReprojectionReport::from_frames(per_frame);
    match &report {
        Some(report) => info!(
            "mean reprojection error {:.4} px over {} of {} frames",
            report.mean_error,
            report.frames_measured(),
            scope.len()
        ),
        None => info!("reprojection error unavailable, no frame in scope shows the pattern"),
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_unavailable() {
        assert_eq!(ReprojectionReport::from_frames(Vec::new()), None);
    }

    #[test]
    fn measurement_order_does_not_matter() {
        let errors: Vec<FrameError> = (0..50)
            .map(|frame| FrameError {
                frame,
                error: 0.1 + (frame as f64 * 0.37).sin().abs(),
            })
            .collect();
        let mut reversed = errors.clone();
        reversed.reverse();
        let forward = ReprojectionReport::from_frames(errors).unwrap();
        let backward = ReprojectionReport::from_frames(reversed).unwrap();
        assert_eq!(forward.mean_error.to_bits(), backward.mean_error.to_bits());
        assert_eq!(forward, backward);
    }

    #[test]
    fn worst_frame() {
        let report = ReprojectionReport::from_frames(vec![
            FrameError { frame: 3, error: 0.5 },
            FrameError { frame: 4, error: 2.0 },
            FrameError { frame: 5, error: 1.0 },
        ])
        .unwrap();
        assert_eq!(report.worst().unwrap().frame, 4);
        assert_eq!(report.frames_measured(), 3);
        assert!((report.mean_error - 3.5 / 3.0).abs() < 1e-15);
    }
}
