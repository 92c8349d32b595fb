//! Atomic-configuration data structures.
//!
//! This module holds the structure model the session driver pushes into and
//! pulls out of the engine, plus the static element data and small bulk-lattice
//! factories used to build common starting configurations.

pub mod element;
pub mod factories;
pub mod structure;

pub use structure::{Structure, StructureError};
