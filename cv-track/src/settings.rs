use crate::PropagationPolicy;
use cv_core::BoardLayout;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The settings for the tracking process.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TrackSettings {
    /// The number of frames skipped after every successful detection.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_skip_interval")
    )]
    pub skip_interval: usize,
    /// How frames between keyframes receive a pose.
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub policy: PropagationPolicy,
    /// The grid the detector looks for and its physical spacing.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_board"))]
    pub board: BoardLayout,
    /// Clip planes used when converting poses into projection matrices.
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub view: ViewSettings,
}

/// Clip planes for the projection matrix, in board units.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewSettings {
    /// The near clip plane.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_near"))]
    pub near: f64,
    /// The far clip plane.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_far"))]
    pub far: f64,
}

impl Default for TrackSettings {
    fn default() -> Self {
        Self {
            skip_interval: default_skip_interval(),
            policy: PropagationPolicy::default(),
            board: default_board(),
            view: ViewSettings::default(),
        }
    }
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            near: default_near(),
            far: default_far(),
        }
    }
}

fn default_skip_interval() -> usize {
    0
}

fn default_board() -> BoardLayout {
    BoardLayout::default()
}

fn default_near() -> f64 {
    0.1
}

fn default_far() -> f64 {
    100.0
}
