use cv_core::{GridSize, KeyPoint};
use cv_track::{Frame, PatternDetector};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;

/// The grid points found in one frame, as a detector run elsewhere wrote them down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedDetection {
    pub frame: usize,
    /// Pixel coordinates in row-major grid order.
    pub points: Vec<[f64; 2]>,
}

/// Plays back recorded detections by frame index.
///
/// Frames without a recording are reported as not found.
#[derive(Debug, Clone, Default)]
pub struct ReplayDetector {
    detections: HashMap<usize, Vec<KeyPoint>>,
}

impl ReplayDetector {
    pub fn new(recording: impl IntoIterator<Item = RecordedDetection>) -> Self {
        let mut detections = HashMap::new();
        for RecordedDetection { frame, points } in recording {
            let points = points.iter().map(|&[x, y]| KeyPoint::new(x, y)).collect();
            if detections.insert(frame, points).is_some() {
                warn!("frame {} was recorded more than once, keeping the last", frame);
            }
        }
        Self { detections }
    }

    /// Reads a JSON array of [`RecordedDetection`].
    pub fn from_reader(reader: impl Read) -> serde_json::Result<Self> {
        let recording: Vec<RecordedDetection> = serde_json::from_reader(reader)?;
        let detector = Self::new(recording);
        info!("loaded detections for {} frames", detector.len());
        Ok(detector)
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

impl PatternDetector for ReplayDetector {
    fn detect(&self, frame: &Frame, _: GridSize) -> Option<Vec<KeyPoint>> {
        self.detections.get(&frame.index()).cloned()
    }
}
