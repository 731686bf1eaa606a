use crate::{BoardPoint, KeyPoint};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Number of inner corners of a grid pattern along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct GridSize {
    pub width: usize,
    pub height: usize,
}

impl GridSize {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Total number of points a full detection of this grid contains.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The physical description of a planar grid pattern.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct BoardLayout {
    pub grid: GridSize,
    /// Distance between neighbouring grid points, in pattern units.
    pub square_size: f64,
}

impl BoardLayout {
    pub fn new(grid: GridSize, square_size: f64) -> Self {
        Self { grid, square_size }
    }

    /// The known board points in detector order: row by row, `x` varying fastest, on `Z = 0`.
    pub fn points(&self) -> Vec<BoardPoint> {
        let s = self.square_size;
        (0..self.grid.height)
            .flat_map(|y| {
                (0..self.grid.width).map(move |x| BoardPoint::new(x as f64 * s, y as f64 * s, 0.0))
            })
            .collect()
    }
}

impl Default for BoardLayout {
    /// A 9 x 6 inner corner chessboard with unit spacing.
    fn default() -> Self {
        Self::new(GridSize::new(9, 6), 1.0)
    }
}

/// Pairs a known point on the board with where it was seen in the image.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Correspondence(pub BoardPoint, pub KeyPoint);

/// A full, ordered detection of a board in one image.
///
/// A set is all-or-nothing: it can only be built from exactly as many image points as the
/// layout has grid points, so a partial detection never makes it past construction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CorrespondenceSet {
    correspondences: Vec<Correspondence>,
}

impl CorrespondenceSet {
    /// Zips the layout's board points with detected image points.
    ///
    /// Returns `None` when the number of image points does not match the grid.
    pub fn from_detection(layout: &BoardLayout, image_points: &[KeyPoint]) -> Option<Self> {
        if layout.grid.is_empty() || image_points.len() != layout.grid.len() {
            return None;
        }
        let correspondences = layout
            .points()
            .into_iter()
            .zip(image_points.iter().copied())
            .map(|(board, image)| Correspondence(board, image))
            .collect();
        Some(Self { correspondences })
    }

    pub fn len(&self) -> usize {
        self.correspondences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.correspondences.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Correspondence> + Clone + '_ {
        self.correspondences.iter()
    }

    pub fn board_points(&self) -> impl Iterator<Item = BoardPoint> + Clone + '_ {
        self.correspondences.iter().map(|&Correspondence(board, _)| board)
    }

    pub fn image_points(&self) -> impl Iterator<Item = KeyPoint> + Clone + '_ {
        self.correspondences.iter().map(|&Correspondence(_, image)| image)
    }
}

impl<'a> IntoIterator for &'a CorrespondenceSet {
    type Item = &'a Correspondence;
    type IntoIter = core::slice::Iter<'a, Correspondence>;

    fn into_iter(self) -> Self::IntoIter {
        self.correspondences.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_points_are_row_major() {
        let layout = BoardLayout::new(GridSize::new(3, 2), 0.5);
        let points = layout.points();
        assert_eq!(points.len(), 6);
        assert_eq!(points[0], BoardPoint::new(0.0, 0.0, 0.0));
        assert_eq!(points[1], BoardPoint::new(0.5, 0.0, 0.0));
        assert_eq!(points[3], BoardPoint::new(0.0, 0.5, 0.0));
        assert_eq!(points[5], BoardPoint::new(1.0, 0.5, 0.0));
    }

    #[test]
    fn partial_detection_is_rejected() {
        let layout = BoardLayout::new(GridSize::new(2, 2), 1.0);
        let three = [KeyPoint::new(0.0, 0.0); 3];
        assert!(CorrespondenceSet::from_detection(&layout, &three).is_none());
        let four = [KeyPoint::new(0.0, 0.0); 4];
        assert_eq!(CorrespondenceSet::from_detection(&layout, &four).unwrap().len(), 4);
    }

    #[test]
    fn default_layout_matches_nine_by_six_board() {
        let layout = BoardLayout::default();
        assert_eq!(layout.grid.len(), 54);
        assert_eq!(layout.points()[53], BoardPoint::new(8.0, 5.0, 0.0));
    }
}
