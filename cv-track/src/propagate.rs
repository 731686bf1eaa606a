use crate::{SampledSequence, ScopeWindow, TrackError};
use cv_core::BoardToCamera;
use log::debug;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// How a frame that is not a keyframe receives its pose.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde-serialize", serde(rename_all = "lowercase"))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PropagationPolicy {
    /// Keep the pose of the most recent keyframe.
    Hold,
    /// Blend the poses of the surrounding keyframes linearly by frame distance.
    ///
    /// Rotation vectors are blended component-wise, which is only an approximation of a
    /// rotation halfway between the two, good for the small steps between nearby keyframes.
    Interpolate,
}

impl Default for PropagationPolicy {
    fn default() -> Self {
        Self::Hold
    }
}

impl FromStr for PropagationPolicy {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hold" => Ok(Self::Hold),
            "interpolate" => Ok(Self::Interpolate),
            _ => Err(TrackError::UnknownPolicy(s.to_owned())),
        }
    }
}

impl fmt::Display for PropagationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hold => write!(f, "hold"),
            Self::Interpolate => write!(f, "interpolate"),
        }
    }
}

/// A pose for every frame in the scope, built once and only read afterwards.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct FramePoseMap {
    scope: ScopeWindow,
    poses: Vec<BoardToCamera>,
}

impl FramePoseMap {
    pub fn scope(&self) -> ScopeWindow {
        self.scope
    }

    /// The pose of `frame`, or `None` outside of the scope.
    pub fn get(&self, frame: usize) -> Option<BoardToCamera> {
        frame
            .checked_sub(self.scope.start)
            .and_then(|offset| self.poses.get(offset))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Frames and their poses in frame order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, BoardToCamera)> + '_ {
        self.scope.frames().zip(self.poses.iter().copied())
    }
}

/// Expands one solved pose per keyframe into a pose for every frame in the scope.
///
/// Keyframes receive their own pose unchanged under every policy. `poses` must hold exactly
/// one pose per keyframe, in keyframe order.
pub fn propagate(
    policy: PropagationPolicy,
    sampled: &SampledSequence,
    poses: &[BoardToCamera],
) -> Result<FramePoseMap, TrackError> {
    let keyframes: Vec<usize> = sampled.keyframe_frames().collect();
    if poses.len() != keyframes.len() {
        return Err(TrackError::PoseCountMismatch {
            poses: poses.len(),
            keyframes: keyframes.len(),
        });
    }
    // A successful sampling never has zero keyframes, but the map would not be total.
    let (first, last) = match (poses.first(), poses.last()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => return Err(TrackError::NoPatternDetected),
    };

    let scope = sampled.scope();
    let poses: Vec<BoardToCamera> = match policy {
        PropagationPolicy::Hold => scope
            .frames()
            .map(|frame| {
                sampled
                    .keyframe_of(frame)
                    .map_or(first, |keyframe| poses[keyframe])
            })
            .collect(),
        PropagationPolicy::Interpolate => scope
            .frames()
            .map(|frame| {
                let next = keyframes.partition_point(|&keyframe| keyframe < frame);
                if next == keyframes.len() {
                    return last;
                }
                if keyframes[next] == frame {
                    return poses[next];
                }
                if next == 0 {
                    return first;
                }
                let (p, n) = (keyframes[next - 1], keyframes[next]);
                let alpha = (frame - p) as f64 / (n - p) as f64;
                poses[next - 1].lerp(poses[next], alpha)
            })
            .collect(),
    };

    debug!(
        "propagated {} keyframe poses to {} frames with the {} policy",
        keyframes.len(),
        poses.len(),
        policy
    );
    Ok(FramePoseMap { scope, poses })
}
