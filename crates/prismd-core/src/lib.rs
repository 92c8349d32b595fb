//! # prismd Core Library
//!
//! A library for driving external molecular-dynamics engines interactively:
//! it maintains a live bidirectional session with an engine process, translates
//! every geometry-bearing quantity between the caller's cell orientation and the
//! engine's canonical upper-triangular ("prism") frame, and buffers per-step
//! observables into a hierarchical result store.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict three-layer architecture to ensure a clear
//! separation of concerns, making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains stateless data models (`Structure`),
//!   the pure cell-unfolding transform (`UnfoldingPrism`), explicit unit systems,
//!   and text I/O utilities (engine-log scraping, nested input-group serialization).
//!
//! - **[`engine`]: The Logic Core.** This stateful layer owns the lifecycle of a live
//!   engine connection. It includes the `InteractiveSession` state machine, the
//!   `EngineHandle` abstraction over the engine's native call interface, the typed
//!   control-input builder, the per-step force-callback protocol, and the result
//!   cache/store pair.
//!
//! - **[`workflows`]: The Public API.** This is the highest-level, user-facing layer.
//!   It ties the `engine` and `core` together to execute complete simulation
//!   procedures, such as thermostatted MD runs and post-run tabular summaries.

pub mod core;
pub mod engine;
pub mod workflows;
