use std::path::PathBuf;

use nalgebra::Vector3;

use super::error::EngineError;

/// Engine-side per-step force hook.
///
/// Arguments: current engine timestep, per-atom engine IDs (tags) in the
/// engine's internal storage order, positions in the same order, and the
/// shared external-force buffer. The buffer is owned by the engine; callees
/// may mutate it in place during the invocation window but must never retain
/// a reference to it.
pub type RawForceCallback =
    Box<dyn FnMut(i64, &[i64], &[Vector3<f64>], &mut [Vector3<f64>]) + Send>;

/// Completion status of the most recent run command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunStatus {
    #[default]
    Normal,
    /// Non-converged or abnormally terminated run; the reason is the
    /// engine's own status text. Surfaced as a warning, never an error.
    Abnormal(String),
}

/// Native call interface of a live engine process or library instance.
///
/// Every call is a synchronous request/response: the engine executes one
/// blocking command at a time and the driver never issues the next before the
/// previous returned. Property names (`"x"`, `"f"`, `"type"`, thermo keywords)
/// follow the engine's own vocabulary; this trait treats them as opaque.
pub trait EngineHandle {
    /// Sends one line of the engine's textual command language.
    fn command(&mut self, text: &str) -> Result<(), EngineError>;

    /// Gathers a per-atom float property as a flat array of `width` values
    /// per atom, ordered by ascending atom ID.
    fn gather(&mut self, property: &str, width: usize) -> Result<Vec<f64>, EngineError>;

    /// Gathers a per-atom integer property ordered by ascending atom ID.
    fn gather_ints(&mut self, property: &str) -> Result<Vec<i64>, EngineError>;

    /// Scatters a per-atom float property from a flat array of `width`
    /// values per atom.
    fn scatter(&mut self, property: &str, width: usize, values: &[f64])
        -> Result<(), EngineError>;

    /// Scatters a per-atom integer property.
    fn scatter_ints(&mut self, property: &str, values: &[i64]) -> Result<(), EngineError>;

    /// Reads a thermodynamic scalar by name.
    fn get_scalar(&mut self, name: &str) -> Result<f64, EngineError>;

    /// Creates atoms inside the already-defined box from per-atom type
    /// indices and flat engine-frame positions.
    fn create_atoms(&mut self, types: &[i64], positions: &[f64]) -> Result<(), EngineError>;

    /// Extracts a per-atom compute as rows of `width` values, in the
    /// engine's internal atom ordering.
    fn extract_compute_per_atom(
        &mut self,
        name: &str,
        width: usize,
    ) -> Result<Vec<Vec<f64>>, EngineError>;

    /// Per-atom engine IDs (tags) in the engine's internal storage order.
    fn atom_ids(&mut self) -> Result<Vec<i64>, EngineError>;

    /// Installs the per-step force hook for the named external fix.
    fn set_force_callback(
        &mut self,
        name: &str,
        callback: RawForceCallback,
    ) -> Result<(), EngineError>;

    /// Completion status of the most recent run command.
    fn last_run_status(&self) -> RunStatus {
        RunStatus::Normal
    }

    /// Releases the engine process or library handle.
    fn close(&mut self) -> Result<(), EngineError>;
}

/// How the engine gets attached, decided purely by server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchSpec {
    /// Single-core run: an in-memory library instance logging to `log_file`.
    InProcess { log_file: PathBuf },
    /// Multi-core run: a remote/multi-process handle, treated as opaque.
    Distributed {
        cores: usize,
        working_directory: PathBuf,
    },
}

/// Factory for engine handles; injectable so embedders (and tests) control
/// how the engine process comes to life.
pub trait EngineLauncher {
    fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn EngineHandle>, EngineError>;
}
