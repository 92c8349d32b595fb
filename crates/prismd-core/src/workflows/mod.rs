//! # Workflows Module
//!
//! This module provides high-level workflow implementations that orchestrate
//! complete interactive calculations against the MD engine.
//!
//! ## Overview
//!
//! Workflows are the top-level entry points for users of this crate. They
//! drive an open [`InteractiveSession`](crate::engine::session::InteractiveSession)
//! through a whole calculation: configuring the control input, registering
//! force hooks, stepping the engine, collecting observables, and leaving a
//! populated result store behind.
//!
//! ## Architecture
//!
//! The module is organized around two concerns:
//!
//! - **Run loops** ([`run`]) - Molecular-dynamics and minimization drivers
//!   that pair `execute_step` with `collect` over the configured step count.
//! - **Post-processing** ([`tables`]) - Summary extraction over a closed
//!   session's result store (final energies, mean temperature and pressure,
//!   step counts).

pub mod run;
pub mod tables;
