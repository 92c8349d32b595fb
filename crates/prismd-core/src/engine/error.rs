use std::path::PathBuf;

use thiserror::Error;

use super::state::SessionState;
use crate::core::geometry::prism::PrismError;
use crate::core::models::structure::StructureError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine initialization failed: {0}")]
    Initialization(String),

    #[error("invalid simulation cell: {source}")]
    Cell {
        #[from]
        source: PrismError,
    },

    #[error("invalid structure: {source}")]
    Structure {
        #[from]
        source: StructureError,
    },

    #[error("potential file not found: {path}")]
    PotentialFileMissing { path: PathBuf },

    #[error("malformed potential definition {path}: {message}")]
    PotentialFormat { path: PathBuf, message: String },

    #[error("species '{symbol}' is not covered by the potential's element list")]
    SpeciesNotInPotential { symbol: String },

    #[error("force callback may only be registered on an interactive session")]
    CallbackOutsideInteractive,

    #[error("session is {state:?} but the operation requires {required}")]
    InvalidState {
        state: SessionState,
        required: &'static str,
    },

    #[error("engine command '{command}' failed: {message}")]
    Command { command: String, message: String },

    #[error("engine returned {got} values for '{property}', expected {expected}")]
    UnexpectedWidth {
        property: String,
        expected: usize,
        got: usize,
    },

    #[error("i/o error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("internal logic error: {0}")]
    Internal(String),
}
