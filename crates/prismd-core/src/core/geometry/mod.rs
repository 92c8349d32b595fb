//! Geometry of periodic simulation cells.
//!
//! The only component here is the cell-unfolding transform, which maps an
//! arbitrary (possibly skewed) 3x3 cell matrix onto the upper-triangular
//! prism representation required by the engine, together with the rotation
//! that re-expresses vector and tensor quantities between the two frames.

pub mod prism;

pub use prism::{PrismError, UnfoldingPrism, SKEW_TOLERANCE};
