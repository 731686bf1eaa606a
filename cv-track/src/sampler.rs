use crate::{detect_board, CancelToken, Frame, PatternDetector, TrackError};
use cv_core::{BoardLayout, CorrespondenceSet};
use log::{debug, info};
use std::ops::Range;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The contiguous range of frames `[start, end)` that tracking covers.
///
/// `start` is the first frame the pattern was found in; everything before it is dropped.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ScopeWindow {
    pub start: usize,
    pub end: usize,
}

impl ScopeWindow {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, frame: usize) -> bool {
        (self.start..self.end).contains(&frame)
    }

    pub fn frames(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// A frame where the whole pattern was detected.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Keyframe {
    pub frame: usize,
    pub correspondences: CorrespondenceSet,
}

/// The result of sampling a frame sequence for keyframes.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SampledSequence {
    scope: ScopeWindow,
    keyframes: Vec<Keyframe>,
    /// For every frame in scope, the position in `keyframes` of its keyframe.
    keyframe_of: Vec<usize>,
}

impl SampledSequence {
    pub fn scope(&self) -> ScopeWindow {
        self.scope
    }

    /// Keyframes in strictly increasing frame order.
    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    pub fn into_keyframes(self) -> Vec<Keyframe> {
        self.keyframes
    }

    /// Frame indices of the keyframes.
    pub fn keyframe_frames(&self) -> impl Iterator<Item = usize> + '_ {
        self.keyframes.iter().map(|keyframe| keyframe.frame)
    }

    /// The position in [`SampledSequence::keyframes`] of the most recent keyframe at or
    /// before `frame`, or `None` outside of the scope.
    pub fn keyframe_of(&self, frame: usize) -> Option<usize> {
        frame
            .checked_sub(self.scope.start)
            .and_then(|offset| self.keyframe_of.get(offset))
            .copied()
    }

    /// The correspondence sets of all keyframes, in order, as a calibration solver takes them.
    pub fn correspondence_sets(&self) -> Vec<CorrespondenceSet> {
        self.keyframes
            .iter()
            .map(|keyframe| keyframe.correspondences.clone())
            .collect()
    }
}

/// Walks a frame sequence and decides which frames to hand to the detector.
///
/// After a successful detection the next `skip_interval` frames are not examined and are
/// attributed to that keyframe. A failed detection is retried on the very next frame. Frames
/// before the first successful detection leave the scope for good.
pub struct KeyframeSampler<'a, D: ?Sized> {
    detector: &'a D,
    layout: BoardLayout,
    skip_interval: usize,
}

impl<'a, D> KeyframeSampler<'a, D>
where
    D: PatternDetector + ?Sized,
{
    pub fn new(detector: &'a D, layout: BoardLayout, skip_interval: usize) -> Self {
        Self {
            detector,
            layout,
            skip_interval,
        }
    }

    /// Samples `frames`, which must be numbered by their position in the slice.
    ///
    /// A frame whose [`Frame::index`] differs from its position fails the whole run with
    /// [`TrackError::FrameIndexMismatch`].
    pub fn sample(
        &self,
        frames: &[Frame],
        cancel: &CancelToken,
    ) -> Result<SampledSequence, TrackError> {
        if frames.is_empty() {
            return Err(TrackError::EmptyScope);
        }

        let mut start = 0;
        let mut next_candidate = 0;
        let mut keyframes: Vec<Keyframe> = Vec::new();
        let mut keyframe_of = Vec::with_capacity(frames.len());
        let mut attempts = 0;
        let mut skipped = 0;

        for (index, frame) in frames.iter().enumerate() {
            if frame.index() != index {
                return Err(TrackError::FrameIndexMismatch {
                    position: index,
                    index: frame.index(),
                });
            }
            if index < next_candidate {
                skipped += 1;
                keyframe_of.push(keyframes.len() - 1);
                continue;
            }

            cancel.check()?;
            attempts += 1;
            match detect_board(self.detector, frame, &self.layout) {
                Some(correspondences) => {
                    debug!("frame {}: keyframe {}", index, keyframes.len());
                    keyframes.push(Keyframe {
                        frame: index,
                        correspondences,
                    });
                    keyframe_of.push(keyframes.len() - 1);
                    next_candidate = index.saturating_add(self.skip_interval).saturating_add(1);
                }
                None if keyframes.is_empty() => {
                    debug!("frame {}: no pattern yet, dropping from scope", index);
                    start += 1;
                }
                None => {
                    debug!("frame {}: no pattern, holding keyframe", index);
                    keyframe_of.push(keyframes.len() - 1);
                }
            }
        }

        if keyframes.is_empty() {
            info!("pattern not found in any of {} frames", frames.len());
            return Err(TrackError::NoPatternDetected);
        }

        let scope = ScopeWindow {
            start,
            end: frames.len(),
        };
        info!(
            "sampled frames {}..{}: {} keyframes from {} detections, {} frames skipped, {} dropped",
            scope.start,
            scope.end,
            keyframes.len(),
            attempts,
            skipped,
            start
        );
        Ok(SampledSequence {
            scope,
            keyframes,
            keyframe_of,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cv_core::{GridSize, KeyPoint};
    use image::DynamicImage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Finds the pattern on frames where `hit(index)` holds and counts its calls.
    struct Scripted<F> {
        hit: F,
        calls: AtomicUsize,
    }

    impl<F: Fn(usize) -> bool + Sync> PatternDetector for Scripted<F> {
        fn detect(&self, frame: &Frame, grid: GridSize) -> Option<Vec<KeyPoint>> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if (self.hit)(frame.index()) {
                Some(vec![KeyPoint::new(frame.index() as f64, 0.0); grid.len()])
            } else {
                None
            }
        }
    }

    fn scripted<F: Fn(usize) -> bool + Sync>(hit: F) -> Scripted<F> {
        Scripted {
            hit,
            calls: AtomicUsize::new(0),
        }
    }

    fn frames(n: usize) -> Vec<Frame> {
        (0..n)
            .map(|i| Frame::new(i, DynamicImage::new_luma8(1, 1)))
            .collect()
    }

    fn layout() -> BoardLayout {
        BoardLayout::new(GridSize::new(2, 2), 1.0)
    }

    #[test]
    fn leading_failures_leave_the_scope() {
        let detector = scripted(|i| i >= 2);
        let sampled = KeyframeSampler::new(&detector, layout(), 0)
            .sample(&frames(5), &CancelToken::new())
            .unwrap();
        assert_eq!(sampled.scope(), ScopeWindow { start: 2, end: 5 });
        assert_eq!(sampled.keyframe_frames().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(sampled.keyframe_of(1), None);
        assert_eq!(sampled.keyframe_of(2), Some(0));
        assert_eq!(sampled.keyframe_of(4), Some(2));
        assert_eq!(sampled.keyframe_of(5), None);
    }

    #[test]
    fn skipped_frames_are_not_examined() {
        let detector = scripted(|_| true);
        let sampled = KeyframeSampler::new(&detector, layout(), 2)
            .sample(&frames(7), &CancelToken::new())
            .unwrap();
        assert_eq!(sampled.keyframe_frames().collect::<Vec<_>>(), vec![0, 3, 6]);
        assert_eq!(detector.calls.load(Ordering::Relaxed), 3);
        let mapping: Vec<_> = (0..7).map(|f| sampled.keyframe_of(f).unwrap()).collect();
        assert_eq!(mapping, vec![0, 0, 0, 1, 1, 1, 2]);
    }

    #[test]
    fn failure_after_first_keyframe_retries_next_frame() {
        let detector = scripted(|i| i != 3 && i != 4);
        let sampled = KeyframeSampler::new(&detector, layout(), 1)
            .sample(&frames(8), &CancelToken::new())
            .unwrap();
        // 0 hit, 1 skipped, 2 hit, 3 skipped, 4 miss, 5 hit, 6 skipped, 7 hit
        assert_eq!(sampled.keyframe_frames().collect::<Vec<_>>(), vec![0, 2, 5, 7]);
        let mapping: Vec<_> = (0..8).map(|f| sampled.keyframe_of(f).unwrap()).collect();
        assert_eq!(mapping, vec![0, 0, 1, 1, 1, 2, 2, 3]);
    }

    #[test]
    fn no_detection_at_all() {
        let detector = scripted(|_| false);
        let result =
            KeyframeSampler::new(&detector, layout(), 0).sample(&frames(4), &CancelToken::new());
        assert!(matches!(result, Err(TrackError::NoPatternDetected)));
        assert_eq!(detector.calls.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn empty_sequence() {
        let detector = scripted(|_| true);
        let result = KeyframeSampler::new(&detector, layout(), 0).sample(&[], &CancelToken::new());
        assert!(matches!(result, Err(TrackError::EmptyScope)));
    }

    #[test]
    fn huge_skip_interval_keeps_one_keyframe() {
        let detector = scripted(|_| true);
        let sampled = KeyframeSampler::new(&detector, layout(), usize::MAX)
            .sample(&frames(4), &CancelToken::new())
            .unwrap();
        assert_eq!(sampled.keyframe_frames().collect::<Vec<_>>(), vec![0]);
        assert_eq!(detector.calls.load(Ordering::Relaxed), 1);
        let mapping: Vec<_> = (0..4).map(|f| sampled.keyframe_of(f).unwrap()).collect();
        assert_eq!(mapping, vec![0, 0, 0, 0]);
    }

    #[test]
    fn renumbered_sub_slice_is_rejected() {
        let detector = scripted(|_| true);
        let frames = frames(5);
        let result =
            KeyframeSampler::new(&detector, layout(), 0).sample(&frames[2..], &CancelToken::new());
        assert!(matches!(
            result,
            Err(TrackError::FrameIndexMismatch {
                position: 0,
                index: 2
            })
        ));
        assert_eq!(detector.calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn cancelled_before_detection() {
        let detector = scripted(|_| true);
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = KeyframeSampler::new(&detector, layout(), 0).sample(&frames(3), &cancel);
        assert!(matches!(result, Err(TrackError::Cancelled)));
        assert_eq!(detector.calls.load(Ordering::Relaxed), 0);
    }
}
