//! # Engine Module
//!
//! This module implements the stateful logic core of prismd: the lifecycle of
//! a live connection to an external molecular-dynamics engine.
//!
//! ## Architecture
//!
//! The module is organized into specialized submodules that handle different
//! aspects of the session:
//!
//! - **Session Driver** ([`session`]) - The `InteractiveSession` state machine:
//!   initialization, per-step state push/pull, step execution, teardown
//! - **Engine Abstraction** ([`handle`]) - The native call interface to the engine
//!   process, plus the configuration-driven launch branch
//! - **Control Input** ([`control`]) - Typed builder for the engine's textual
//!   command language and potential definitions
//! - **Force Callback** ([`fix_external`]) - The per-step force-modification
//!   protocol with its two calling conventions
//! - **Result Persistence** ([`store`], [`cache`]) - Per-step observable buffering
//!   and the hierarchical result namespace
//! - **Configuration** ([`config`]) - Server/run-mode settings
//! - **Session Events** ([`monitor`]) - Explicitly-threaded warning/event callback
//! - **Error Handling** ([`error`]) - Engine-specific error types

pub(crate) mod cache;
pub mod config;
pub mod control;
pub mod error;
pub mod fix_external;
pub mod handle;
pub mod monitor;
pub mod session;
pub mod state;
pub mod store;
