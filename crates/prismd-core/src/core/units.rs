//! Explicit unit systems for the engine boundary.
//!
//! The engine speaks one of several self-consistent unit systems; callers
//! always see Angstrom / eV / eV per Angstrom / GPa / fs / K. The active
//! system is an explicit field on the session, never derived from ambient
//! state, and every value crosses the boundary through exactly one
//! conversion.

use serde::Deserialize;

/// 1 kcal/mol in eV.
const KCAL_PER_MOL_TO_EV: f64 = 0.043_364_104_241_800_934;
/// 1 bar in GPa.
const BAR_TO_GPA: f64 = 1.0e-4;
/// 1 atm in GPa.
const ATM_TO_GPA: f64 = 1.013_25e-4;
/// 1 bar * Angstrom^3 in eV (per-atom stress times volume).
const BAR_ANGSTROM3_TO_EV: f64 = 6.241_509_074_460_763e-7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    /// Angstrom, eV, picoseconds, bar.
    #[default]
    Metal,
    /// Angstrom, kcal/mol, femtoseconds, atmospheres.
    Real,
    /// Dimensionless reduced units.
    Lj,
}

impl UnitSystem {
    /// The keyword the engine's `units` command expects.
    pub fn keyword(&self) -> &'static str {
        match self {
            UnitSystem::Metal => "metal",
            UnitSystem::Real => "real",
            UnitSystem::Lj => "lj",
        }
    }
}

/// Physical quantity classes crossing the engine boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Positions,
    Energy,
    Forces,
    Pressure,
    Time,
    Temperature,
    Volume,
    /// Per-atom stress times volume, reported by the engine in
    /// pressure-unit * Angstrom^3 and exposed to callers in eV.
    StressVolume,
}

/// Multiplicative converter between engine-native and caller-native units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitConverter {
    units: UnitSystem,
}

impl UnitConverter {
    pub fn new(units: UnitSystem) -> Self {
        Self { units }
    }

    pub fn units(&self) -> UnitSystem {
        self.units
    }

    /// Factor taking an engine-native value to caller-native units.
    pub fn to_caller(&self, quantity: Quantity) -> f64 {
        match self.units {
            UnitSystem::Metal => match quantity {
                Quantity::Pressure => BAR_TO_GPA,
                Quantity::Time => 1.0e3, // ps -> fs
                Quantity::StressVolume => BAR_ANGSTROM3_TO_EV,
                _ => 1.0,
            },
            UnitSystem::Real => match quantity {
                Quantity::Energy | Quantity::Forces => KCAL_PER_MOL_TO_EV,
                Quantity::Pressure => ATM_TO_GPA,
                Quantity::StressVolume => 1.013_25 * BAR_ANGSTROM3_TO_EV,
                _ => 1.0,
            },
            UnitSystem::Lj => 1.0,
        }
    }

    /// Factor taking a caller-native value to engine-native units.
    ///
    /// Written as exact inverse constants (not `1.0 / to_caller`) so that
    /// round decimal factors stay round in generated command text.
    pub fn to_engine(&self, quantity: Quantity) -> f64 {
        match self.units {
            UnitSystem::Metal => match quantity {
                Quantity::Pressure => 1.0e4,
                Quantity::Time => 1.0e-3, // fs -> ps
                Quantity::StressVolume => 1.0 / BAR_ANGSTROM3_TO_EV,
                _ => 1.0,
            },
            UnitSystem::Real => match quantity {
                Quantity::Energy | Quantity::Forces => 1.0 / KCAL_PER_MOL_TO_EV,
                Quantity::Pressure => 1.0 / ATM_TO_GPA,
                Quantity::StressVolume => 1.0 / (1.013_25 * BAR_ANGSTROM3_TO_EV),
                _ => 1.0,
            },
            UnitSystem::Lj => 1.0,
        }
    }
}
