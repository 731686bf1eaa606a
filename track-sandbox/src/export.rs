use cv_pinhole::{Calibration, DISTORTION_COEFFICIENTS};
use cv_track::{
    ImageSequence, PropagationPolicy, ReprojectionReport, ScopeWindow, Track, ViewSettings,
};
use log::warn;
use serde::Serialize;
use std::io::Write;

/// One frame of the export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameExport {
    pub frame: usize,
    /// Seconds from the start of the sequence.
    pub timestamp: Option<f64>,
    pub keyframe: bool,
    /// Axis-angle rotation, board to camera.
    pub rotation: [f64; 3],
    pub translation: [f64; 3],
    /// Column-major render matrices, missing when the intrinsics cannot be turned into a
    /// projection.
    pub view: Option<[f32; 16]>,
    pub projection: Option<[f32; 16]>,
}

/// Everything the sandbox writes out after tracking.
#[derive(Debug, Clone, Serialize)]
pub struct Export<'a> {
    pub calibration: &'a Calibration,
    /// Row-major 3x3 intrinsic matrix.
    pub intrinsic_matrix: [[f64; 3]; 3],
    /// `[k1, k2, p1, p2, k3]`
    pub distortion_coefficients: [f64; DISTORTION_COEFFICIENTS],
    pub policy: PropagationPolicy,
    pub scope: ScopeWindow,
    pub keyframes: Vec<usize>,
    pub frames: Vec<FrameExport>,
    /// Seconds spent sampling, calibrating and propagating.
    pub processing_seconds: f64,
    pub reprojection: Option<&'a ReprojectionReport>,
}

impl<'a> Export<'a> {
    pub fn new(
        track: &'a Track,
        sequence: &ImageSequence,
        view_settings: &ViewSettings,
        reprojection: Option<&'a ReprojectionReport>,
    ) -> Self {
        let calibration = track.calibration();
        let matrix = calibration.intrinsic_matrix();
        let mut intrinsic_matrix = [[0.0; 3]; 3];
        for (r, row) in intrinsic_matrix.iter_mut().enumerate() {
            for (c, value) in row.iter_mut().enumerate() {
                *value = matrix[(r, c)];
            }
        }

        let frames = track
            .view_matrices(view_settings)
            .filter_map(|(frame, matrices)| {
                let pose = track.pose(frame)?;
                let matrices = match matrices {
                    Ok(matrices) => Some(matrices),
                    Err(e) => {
                        warn!("frame {}: no render matrices: {}", frame, e);
                        None
                    }
                };
                Some(FrameExport {
                    frame,
                    timestamp: sequence.timestamp(frame),
                    keyframe: track.sampled().keyframe_frames().any(|k| k == frame),
                    rotation: pose.rotation.0.into(),
                    translation: pose.translation.into(),
                    view: matrices.map(|m| m.view_column_major()),
                    projection: matrices.map(|m| m.projection_column_major()),
                })
            })
            .collect();

        Self {
            calibration,
            intrinsic_matrix,
            distortion_coefficients: calibration.distortion.coefficients(),
            policy: track.policy(),
            scope: track.scope(),
            keyframes: track.sampled().keyframe_frames().collect(),
            frames,
            processing_seconds: track.elapsed().as_secs_f64(),
            reprojection,
        }
    }

    pub fn write(&self, writer: impl Write) -> serde_json::Result<()> {
        serde_json::to_writer_pretty(writer, self)
    }
}
