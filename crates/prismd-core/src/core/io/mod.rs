//! Text I/O for the external engines.
//!
//! This module contains the scraper for the MD engine's textual run log and
//! the typed serializer for the brace-nested input-group dialect consumed by
//! the DFT engine. Neither component touches a live session; both operate on
//! plain strings.

pub mod input_groups;
pub mod log_parser;
