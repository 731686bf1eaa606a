use crate::Frame;
use cv_core::{BoardLayout, CorrespondenceSet, GridSize, KeyPoint};
use log::{trace, warn};

/// Finds a planar grid pattern in a frame.
///
/// A detector must be deterministic: the same frame and grid always produce the same answer.
/// It is `Sync` because the reprojection diagnostic may call it from several threads at once.
pub trait PatternDetector: Sync {
    /// Returns the `grid.width * grid.height` grid points in row-major order (row by row,
    /// `x` varying fastest), or `None` when the pattern is not fully visible.
    fn detect(&self, frame: &Frame, grid: GridSize) -> Option<Vec<KeyPoint>>;
}

impl<D: PatternDetector + ?Sized> PatternDetector for &D {
    fn detect(&self, frame: &Frame, grid: GridSize) -> Option<Vec<KeyPoint>> {
        (**self).detect(frame, grid)
    }
}

impl<D: PatternDetector + ?Sized> PatternDetector for Box<D> {
    fn detect(&self, frame: &Frame, grid: GridSize) -> Option<Vec<KeyPoint>> {
        (**self).detect(frame, grid)
    }
}

/// Runs the detector and pairs its points with the board.
///
/// A detection with the wrong number of points counts as not found.
pub fn detect_board<D>(
    detector: &D,
    frame: &Frame,
    layout: &BoardLayout,
) -> Option<CorrespondenceSet>
where
    D: PatternDetector + ?Sized,
{
    let points = detector.detect(frame, layout.grid)?;
    let found = points.len();
    let set = CorrespondenceSet::from_detection(layout, &points);
    match &set {
        Some(_) => trace!("frame {}: detected {} grid points", frame.index(), found),
        None => warn!(
            "frame {}: detector returned {} points for a {}x{} grid, ignoring the detection",
            frame.index(),
            found,
            layout.grid.width,
            layout.grid.height
        ),
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;

    struct Fixed(usize);

    impl PatternDetector for Fixed {
        fn detect(&self, _: &Frame, _: GridSize) -> Option<Vec<KeyPoint>> {
            Some(vec![KeyPoint::new(1.0, 2.0); self.0])
        }
    }

    #[test]
    fn wrong_point_count_is_not_found() {
        let frame = Frame::new(0, DynamicImage::new_luma8(1, 1));
        let layout = BoardLayout::new(GridSize::new(3, 2), 1.0);
        assert!(detect_board(&Fixed(5), &frame, &layout).is_none());
        assert_eq!(detect_board(&Fixed(6), &frame, &layout).unwrap().len(), 6);
        let boxed: Box<dyn PatternDetector> = Box::new(Fixed(6));
        assert!(detect_board(&boxed, &frame, &layout).is_some());
    }
}
