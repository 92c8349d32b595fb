use std::path::{Path, PathBuf};

use itertools::Itertools;
use serde::Deserialize;

use super::error::EngineError;
use crate::core::units::{Quantity, UnitConverter, UnitSystem};

/// Seed used for velocity initialization and Langevin noise when the caller
/// does not provide one.
const DEFAULT_SEED: u64 = 4928459;

const THERMO_COLUMNS: &str = "step temp pe etotal pxx pxy pxz pyy pyz pzz vol";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtomStyle {
    #[default]
    Atomic,
    Charge,
    /// Bonded style; enables molecular topology (used by the bonded-water
    /// setup helper) and moves long-range/pair commands to setup time.
    Full,
}

impl AtomStyle {
    pub fn keyword(&self) -> &'static str {
        match self {
            AtomStyle::Atomic => "atomic",
            AtomStyle::Charge => "charge",
            AtomStyle::Full => "full",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MinimizeStyle {
    #[default]
    Cg,
    Sd,
    Fire,
}

impl MinimizeStyle {
    pub fn keyword(&self) -> &'static str {
        match self {
            MinimizeStyle::Cg => "cg",
            MinimizeStyle::Sd => "sd",
            MinimizeStyle::Fire => "fire",
        }
    }
}

/// Molecular-dynamics run settings in caller-native units (K, GPa, fs).
///
/// `None` temperature means a plain NVE integration; adding a pressure turns
/// the ensemble into NPT. `n_print` doubles as the interactive step granule:
/// each `execute_step` advances the engine by `n_print` steps.
#[derive(Debug, Clone, PartialEq)]
pub struct MdOptions {
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub n_ionic_steps: usize,
    pub time_step: f64,
    pub n_print: usize,
    pub temperature_damping_timescale: f64,
    pub pressure_damping_timescale: f64,
    pub seed: Option<u64>,
    pub initial_temperature: Option<f64>,
    pub langevin: bool,
}

impl Default for MdOptions {
    fn default() -> Self {
        Self {
            temperature: None,
            pressure: None,
            n_ionic_steps: 1000,
            time_step: 1.0,
            n_print: 100,
            temperature_damping_timescale: 100.0,
            pressure_damping_timescale: 1000.0,
            seed: None,
            initial_temperature: None,
            langevin: false,
        }
    }
}

/// Geometry-minimization settings in caller-native units (eV, eV/Angstrom).
#[derive(Debug, Clone, PartialEq)]
pub struct MinimizeOptions {
    pub ionic_energy_tolerance: f64,
    pub ionic_force_tolerance: f64,
    pub max_iter: usize,
    pub n_print: usize,
    pub style: MinimizeStyle,
}

impl Default for MinimizeOptions {
    fn default() -> Self {
        Self {
            ionic_energy_tolerance: 0.0,
            ionic_force_tolerance: 1.0e-4,
            max_iter: 100_000,
            n_print: 100,
            style: MinimizeStyle::Cg,
        }
    }
}

/// Ordered, typed representation of the engine's control input.
///
/// The header (units, dimension, boundary, atom style) is fixed at session
/// setup; the body holds the calculation-dependent commands and is replayed
/// by the driver whenever the structure is re-pushed. The pending run command
/// is kept separate because it is the one command `execute_step` repeats.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlInput {
    units: UnitSystem,
    boundary: [bool; 3],
    atom_style: AtomStyle,
    body: Vec<String>,
    run_command: String,
}

impl ControlInput {
    pub fn new(units: UnitSystem, atom_style: AtomStyle) -> Self {
        Self {
            units,
            boundary: [true; 3],
            atom_style,
            body: Vec::new(),
            run_command: "run 0".to_string(),
        }
    }

    pub fn set_boundary(&mut self, pbc: [bool; 3]) {
        self.boundary = pbc;
    }

    pub fn atom_style(&self) -> AtomStyle {
        self.atom_style
    }

    /// The fixed preamble pushed right after `clear`.
    pub fn header_commands(&self) -> Vec<String> {
        let boundary = self
            .boundary
            .iter()
            .map(|&p| if p { "p" } else { "f" })
            .join(" ");
        vec![
            format!("units {}", self.units.keyword()),
            "dimension 3".to_string(),
            format!("boundary {boundary}"),
            format!("atom_style {}", self.atom_style.keyword()),
            "atom_modify map array".to_string(),
        ]
    }

    /// Calculation-dependent commands, in issue order.
    pub fn body_commands(&self) -> &[String] {
        &self.body
    }

    pub fn run_command(&self) -> &str {
        &self.run_command
    }

    pub fn push_command(&mut self, command: String) {
        self.body.push(command);
    }

    /// Replaces the body with an MD setup. Caller units are converted to
    /// engine units exactly once, here.
    pub fn configure_md(&mut self, options: &MdOptions, converter: &UnitConverter) {
        self.body.clear();
        let time = converter.to_engine(Quantity::Time);
        let dt = options.time_step * time;
        let tdamp = options.temperature_damping_timescale * time;
        let pdamp = options.pressure_damping_timescale * time;
        let seed = options.seed.unwrap_or(DEFAULT_SEED);

        match (options.temperature, options.pressure) {
            (Some(t), Some(p)) => {
                let p_engine = p * converter.to_engine(Quantity::Pressure);
                self.body.push(format!(
                    "fix ensemble all npt temp {t} {t} {tdamp} iso {p_engine} {p_engine} {pdamp}"
                ));
            }
            (Some(t), None) if options.langevin => {
                self.body.push("fix ensemble all nve".to_string());
                self.body
                    .push(format!("fix langevin all langevin {t} {t} {tdamp} {seed}"));
            }
            (Some(t), None) => {
                self.body
                    .push(format!("fix ensemble all nvt temp {t} {t} {tdamp}"));
            }
            (None, _) => {
                self.body.push("fix ensemble all nve".to_string());
            }
        }

        let initial = options
            .initial_temperature
            .or(options.temperature.map(|t| 2.0 * t));
        if let Some(t0) = initial {
            self.body
                .push(format!("velocity all create {t0} {seed} dist gaussian"));
        }

        self.body.push(format!("timestep {dt}"));
        self.push_thermo(options.n_print);
        self.run_command = format!("run {}", options.n_print);
    }

    /// Replaces the body with a minimization setup.
    pub fn configure_minimize(&mut self, options: &MinimizeOptions, converter: &UnitConverter) {
        self.body.clear();
        let etol = options.ionic_energy_tolerance * converter.to_engine(Quantity::Energy);
        let ftol = options.ionic_force_tolerance * converter.to_engine(Quantity::Forces);
        self.body
            .push(format!("min_style {}", options.style.keyword()));
        self.push_thermo(options.n_print);
        self.run_command = format!(
            "minimize {etol} {ftol} {} {}",
            options.max_iter,
            options.max_iter * 10
        );
    }

    fn push_thermo(&mut self, n_print: usize) {
        self.body
            .push(format!("thermo_style custom {THERMO_COLUMNS}"));
        self.body
            .push("thermo_modify format float %20.15g".to_string());
        self.body.push(format!("thermo {n_print}"));
    }
}

/// An interatomic potential definition, loadable from a TOML file:
///
/// ```toml
/// name = "Fe-eam"
/// species = ["Fe"]
/// atom_style = "atomic"
/// config = [
///     "pair_style eam/alloy",
///     "pair_coeff * * Fe.eam.alloy Fe",
/// ]
/// files = ["/opt/potentials/Fe.eam.alloy"]
/// ```
///
/// `species` fixes the engine's type-index ordering; `files` are resolved and
/// substituted into the config lines at push time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Potential {
    pub name: String,
    pub species: Vec<String>,
    #[serde(default)]
    pub atom_style: AtomStyle,
    pub config: Vec<String>,
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

impl Potential {
    pub fn from_toml_file(path: &Path) -> Result<Self, EngineError> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| EngineError::PotentialFormat {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Element symbols in engine type-index order (type = position + 1).
    pub fn element_list(&self) -> &[String] {
        &self.species
    }

    /// Config lines with every referenced file name replaced by its full
    /// path. A file missing from disk is a fatal precondition violation.
    pub fn validated_commands(&self) -> Result<Vec<String>, EngineError> {
        let mut resolved = Vec::new();
        for file in &self.files {
            if !file.exists() {
                return Err(EngineError::PotentialFileMissing { path: file.clone() });
            }
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| EngineError::PotentialFormat {
                    path: file.clone(),
                    message: "file name is not valid UTF-8".to_string(),
                })?
                .to_string();
            resolved.push((name, file.display().to_string()));
        }
        Ok(self
            .config
            .iter()
            .map(|line| {
                let mut line = line.clone();
                for (name, full) in &resolved {
                    line = line.replace(&format!(" {name}"), &format!(" {full}"));
                }
                line
            })
            .collect())
    }
}
