//! Post-processing helpers over a closed session's result store.
//!
//! All readers address the merged `generic` namespace and degrade to `None`
//! when a property was never collected; a sparse store is not an error.

use std::collections::BTreeMap;

use crate::engine::store::{ResultStore, StoreValue};

fn scalar_series<'a>(store: &'a ResultStore, key: &str) -> Option<&'a [f64]> {
    match store.get(&format!("generic/{key}")) {
        Some(StoreValue::ScalarSeries(series)) if !series.is_empty() => Some(series),
        _ => None,
    }
}

fn mean(series: &[f64]) -> f64 {
    series.iter().sum::<f64>() / series.len() as f64
}

/// The engine step count at the last collected frame.
pub fn total_steps(store: &ResultStore) -> Option<u64> {
    scalar_series(store, "steps").map(|s| s[s.len() - 1].round() as u64)
}

/// Potential energy (eV) at the last collected frame.
pub fn final_energy_pot(store: &ResultStore) -> Option<f64> {
    scalar_series(store, "energy_pot").map(|s| s[s.len() - 1])
}

/// Total energy (eV) at the last collected frame.
pub fn final_energy_tot(store: &ResultStore) -> Option<f64> {
    scalar_series(store, "energy_tot").map(|s| s[s.len() - 1])
}

/// Cell volume (cubic Angstrom) at the last collected frame.
pub fn final_volume(store: &ResultStore) -> Option<f64> {
    scalar_series(store, "volume").map(|s| s[s.len() - 1])
}

/// Temperature (K) averaged over every collected frame.
pub fn mean_temperature(store: &ResultStore) -> Option<f64> {
    scalar_series(store, "temperature").map(mean)
}

/// Hydrostatic pressure (GPa), i.e. one third of the pressure-tensor trace,
/// averaged over every collected frame.
pub fn mean_hydrostatic_pressure(store: &ResultStore) -> Option<f64> {
    match store.get("generic/pressures") {
        Some(StoreValue::TensorSeries(tensors)) if !tensors.is_empty() => {
            let traces: Vec<f64> = tensors.iter().map(|t| t.trace() / 3.0).collect();
            Some(mean(&traces))
        }
        _ => None,
    }
}

/// A flat name-to-value summary of the run, holding every property the
/// store can provide. Absent properties are simply left out.
pub fn summary(store: &ResultStore) -> BTreeMap<String, f64> {
    let mut table = BTreeMap::new();
    if let Some(steps) = total_steps(store) {
        table.insert("steps".to_string(), steps as f64);
    }
    if let Some(value) = final_energy_pot(store) {
        table.insert("energy_pot_final".to_string(), value);
    }
    if let Some(value) = final_energy_tot(store) {
        table.insert("energy_tot_final".to_string(), value);
    }
    if let Some(value) = final_volume(store) {
        table.insert("volume_final".to_string(), value);
    }
    if let Some(value) = mean_temperature(store) {
        table.insert("temperature_mean".to_string(), value);
    }
    if let Some(value) = mean_hydrostatic_pressure(store) {
        table.insert("pressure_mean".to_string(), value);
    }
    table
}
