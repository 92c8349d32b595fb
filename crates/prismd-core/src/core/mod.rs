//! # Core Module
//!
//! This module provides the fundamental building blocks for interactive
//! molecular-dynamics driving in prismd, serving as the stateless foundation
//! of the library.
//!
//! ## Architecture
//!
//! The module is organized into specialized submodules that handle different
//! aspects of the domain:
//!
//! - **Atomic Representation** ([`models`]) - Structures, elements, and bulk-lattice factories
//! - **Cell Geometry** ([`geometry`]) - The unfolding transform between an arbitrary
//!   simulation cell and the engine's canonical prism frame
//! - **Unit Systems** ([`units`]) - Explicit per-quantity conversion between
//!   engine-native and caller-native units
//! - **Text I/O** ([`io`]) - Engine-log scraping and nested input-group serialization

pub mod geometry;
pub mod io;
pub mod models;
pub mod units;
