use crate::{
    propagate, reprojection_error, view_matrices, CancelToken, Frame, FramePoseMap,
    ImageSequence, Keyframe, KeyframeSampler, PatternDetector, PropagationPolicy,
    ReprojectionReport, SampledSequence, ScopeWindow, TrackError, TrackSettings, ViewMatrices,
    ViewSettings,
};
use cv_core::BoardToCamera;
use cv_pinhole::{Calibration, CalibrationSolver};
use log::info;
use std::time::{Duration, Instant};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Everything a successful tracking run produces.
///
/// A track is never updated in place. Tracking again, or changing the policy with
/// [`Track::with_policy`], produces a new one.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    sampled: SampledSequence,
    calibration: Calibration,
    policy: PropagationPolicy,
    poses: FramePoseMap,
    elapsed: Duration,
}

impl Track {
    pub fn scope(&self) -> ScopeWindow {
        self.sampled.scope()
    }

    pub fn sampled(&self) -> &SampledSequence {
        &self.sampled
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        self.sampled.keyframes()
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn policy(&self) -> PropagationPolicy {
        self.policy
    }

    pub fn poses(&self) -> &FramePoseMap {
        &self.poses
    }

    /// Wall-clock time spent sampling, calibrating and propagating.
    ///
    /// Changing the policy afterwards does not change it.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// The pose of `frame`, or `None` if the frame is outside of the scope.
    pub fn pose(&self, frame: usize) -> Option<BoardToCamera> {
        self.poses.get(frame)
    }

    /// Assigns poses to the frames between keyframes again with another policy.
    ///
    /// The calibration is reused, so this does not run the detector or the solver.
    pub fn with_policy(&self, policy: PropagationPolicy) -> Result<Self, TrackError> {
        let poses = propagate(policy, &self.sampled, &self.calibration.poses)?;
        Ok(Self {
            sampled: self.sampled.clone(),
            calibration: self.calibration.clone(),
            policy,
            poses,
            elapsed: self.elapsed,
        })
    }

    /// Render matrices for every frame in the scope.
    pub fn view_matrices<'a>(
        &'a self,
        settings: &'a ViewSettings,
    ) -> impl Iterator<Item = (usize, Result<ViewMatrices, TrackError>)> + 'a {
        view_matrices(&self.poses, &self.calibration.intrinsics, settings)
    }
}

/// Runs the whole pipeline: keyframe sampling, calibration and pose propagation.
pub struct Tracker<D, S> {
    detector: D,
    solver: S,
    settings: TrackSettings,
}

impl<D, S> Tracker<D, S>
where
    D: PatternDetector,
    S: CalibrationSolver,
{
    pub fn new(detector: D, solver: S, settings: TrackSettings) -> Self {
        Self {
            detector,
            solver,
            settings,
        }
    }

    pub fn settings(&self) -> &TrackSettings {
        &self.settings
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn track(
        &self,
        sequence: &ImageSequence,
        cancel: &CancelToken,
    ) -> Result<Track, TrackError> {
        self.track_frames(sequence.frames(), cancel)
    }

    /// Tracks the pattern through `frames`, whose slice positions are their frame indices.
    ///
    /// The image size handed to the solver is the size of the first frame.
    pub fn track_frames(
        &self,
        frames: &[Frame],
        cancel: &CancelToken,
    ) -> Result<Track, TrackError> {
        let started = Instant::now();
        let sampled = KeyframeSampler::new(
            &self.detector,
            self.settings.board,
            self.settings.skip_interval,
        )
        .sample(frames, cancel)?;

        let found = sampled.keyframes().len();
        if found < S::MIN_VIEWS {
            info!(
                "only {} keyframes, calibration needs at least {}",
                found,
                S::MIN_VIEWS
            );
            return Err(TrackError::InsufficientKeyframes {
                found,
                required: S::MIN_VIEWS,
            });
        }
        cancel.check()?;

        let image_size = frames.first().ok_or(TrackError::EmptyScope)?.size();
        let calibration = self
            .solver
            .calibrate(&sampled.correspondence_sets(), image_size)?;
        info!(
            "calibrated from {} keyframes: focals {:?}, principal point {:?}",
            found, calibration.intrinsics.focals, calibration.intrinsics.principal_point
        );

        let policy = self.settings.policy;
        let poses = propagate(policy, &sampled, &calibration.poses)?;
        let elapsed = started.elapsed();
        info!(
            "tracked {} frames in {:.3} s",
            sampled.scope().len(),
            elapsed.as_secs_f64()
        );
        Ok(Track {
            sampled,
            calibration,
            policy,
            poses,
            elapsed,
        })
    }

    /// Measures how well `track` explains the pattern in `frames`.
    ///
    /// `frames` must be the frames the track was produced from.
    pub fn diagnose(&self, frames: &[Frame], track: &Track) -> Option<ReprojectionReport> {
        reprojection_error(
            &self.detector,
            frames,
            &self.settings.board,
            &track.poses,
            &track.calibration,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cv_core::nalgebra::Vector3;
    use cv_core::{CorrespondenceSet, GridSize, KeyPoint, Skew3};
    use cv_pinhole::{BrownConrady, CameraIntrinsics, ImageSize, SolverError};
    use image::DynamicImage;

    struct Always;

    impl PatternDetector for Always {
        fn detect(&self, frame: &Frame, grid: GridSize) -> Option<Vec<KeyPoint>> {
            Some(vec![KeyPoint::new(frame.index() as f64, 0.0); grid.len()])
        }
    }

    /// Returns one fixed pose per view, with the view number as translation.
    struct Counting;

    impl CalibrationSolver for Counting {
        const MIN_VIEWS: usize = 2;

        fn calibrate(
            &self,
            views: &[CorrespondenceSet],
            image_size: ImageSize,
        ) -> Result<Calibration, SolverError> {
            Ok(Calibration {
                image_size,
                intrinsics: CameraIntrinsics::identity(),
                distortion: BrownConrady::none(),
                poses: (0..views.len())
                    .map(|i| {
                        BoardToCamera::new(Skew3::zeros(), Vector3::new(0.0, 0.0, i as f64))
                    })
                    .collect(),
            })
        }
    }

    fn frames(n: usize) -> Vec<Frame> {
        (0..n)
            .map(|i| Frame::new(i, DynamicImage::new_luma8(4, 3)))
            .collect()
    }

    fn settings(skip_interval: usize) -> TrackSettings {
        TrackSettings {
            skip_interval,
            ..TrackSettings::default()
        }
    }

    #[test]
    fn policy_can_be_swapped_after_tracking() {
        let tracker = Tracker::new(Always, Counting, settings(3));
        let track = tracker.track_frames(&frames(9), &CancelToken::new()).unwrap();
        assert_eq!(track.calibration().image_size, ImageSize::new(4, 3));
        assert_eq!(track.policy(), PropagationPolicy::Hold);
        assert_eq!(track.pose(6).unwrap().translation.z, 1.0);

        let interpolated = track.with_policy(PropagationPolicy::Interpolate).unwrap();
        assert_eq!(interpolated.pose(6).unwrap().translation.z, 1.5);
        assert_eq!(interpolated.pose(4), track.pose(4));
        assert_eq!(interpolated.keyframes(), track.keyframes());
        assert_eq!(interpolated.elapsed(), track.elapsed());
    }

    #[test]
    fn processing_time_is_measured_around_the_run() {
        let tracker = Tracker::new(Always, Counting, settings(1));
        let frames = frames(6);
        let started = Instant::now();
        let track = tracker.track_frames(&frames, &CancelToken::new()).unwrap();
        let wall = started.elapsed();
        assert!(track.elapsed() <= wall);
        let again = tracker.track_frames(&frames, &CancelToken::new()).unwrap();
        assert_eq!(again.poses(), track.poses());
    }

    #[test]
    fn too_few_keyframes_for_the_solver() {
        let tracker = Tracker::new(Always, Counting, settings(10));
        let result = tracker.track_frames(&frames(5), &CancelToken::new());
        assert!(matches!(
            result,
            Err(TrackError::InsufficientKeyframes {
                found: 1,
                required: 2
            })
        ));
    }

    #[test]
    fn degenerate_intrinsics_only_fail_view_conversion() {
        let tracker = Tracker::new(Always, Counting, settings(0));
        let track = tracker.track_frames(&frames(3), &CancelToken::new()).unwrap();
        // The identity intrinsics have the principal point at the origin.
        let views: Vec<_> = track.view_matrices(&ViewSettings::default()).collect();
        assert_eq!(views.len(), 3);
        assert!(views
            .iter()
            .all(|(_, result)| matches!(result, Err(TrackError::DegenerateIntrinsics(_)))));
        assert_eq!(track.poses().len(), 3);
    }
}
