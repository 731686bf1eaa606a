//! # Rust CV Core
//!
//! This library provides the common types shared by every crate that tracks a planar
//! calibration pattern through a video: image key points, points on the pattern (the "board"),
//! rotation vectors, board poses and the correspondences that tie them together.
//! The crate is kept small so that detectors, solvers and trackers can all speak the same
//! vocabulary without pulling in each other.
//!
//! ## Coordinate frames
//!
//! Three frames show up everywhere:
//!
//! * **Board space** ([`BoardPoint`]): the pattern lies on the `Z = 0` plane, with `x` running
//!   along a grid row and `y` down the grid columns. Units are whatever the
//!   [`BoardLayout::square_size`] is expressed in.
//! * **Camera space** ([`CameraPoint`]): origin at the optical center, `x` right, `y` down
//!   and `z` forwards. This is the usual right-handed vision convention.
//! * **Image space** ([`KeyPoint`]): pixel coordinates with the origin in the top left corner.
//!
//! A [`BoardToCamera`] pose maps board space into camera space, and a [`CameraModel`] maps
//! camera space onto the image.
//!
//! ```text
//!      board (Z = 0)              camera                image
//!   +--+--+--+--+            O------> x            +-------------> u
//!   |  |  |  |  |  pose      |\                    |   .  .  .
//!   +--+--+--+--+ -------->  | \  z               |   .  .  .
//!   |  |  |  |  |            v  \                  v v
//!   +--+--+--+--+            y
//! ```

mod camera;
mod correspondence;
mod point;
mod pose;
mod so3;

pub use camera::*;
pub use correspondence::*;
pub use nalgebra;
pub use point::*;
pub use pose::*;
pub use so3::*;
