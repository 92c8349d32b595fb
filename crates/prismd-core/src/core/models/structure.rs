use nalgebra::{Matrix3, Vector3};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StructureError {
    #[error("species list has {species} entries but positions list has {positions}")]
    LengthMismatch { species: usize, positions: usize },
}

/// A periodic atomic configuration: per-atom positions and species, the cell
/// matrix (rows = lattice vectors), and per-axis periodic-boundary flags.
///
/// Positions are always stored in the caller's frame and units (Angstrom);
/// any translation into the engine's frame happens in the session driver.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    species: Vec<String>,
    positions: Vec<Vector3<f64>>,
    cell: Matrix3<f64>,
    pbc: [bool; 3],
}

impl Structure {
    pub fn new(
        species: Vec<String>,
        positions: Vec<Vector3<f64>>,
        cell: Matrix3<f64>,
        pbc: [bool; 3],
    ) -> Result<Self, StructureError> {
        if species.len() != positions.len() {
            return Err(StructureError::LengthMismatch {
                species: species.len(),
                positions: positions.len(),
            });
        }
        Ok(Self {
            species,
            positions,
            cell,
            pbc,
        })
    }

    /// Crate-internal constructor for callers that build the species and
    /// position lists in lockstep.
    pub(crate) fn from_parts(
        species: Vec<String>,
        positions: Vec<Vector3<f64>>,
        cell: Matrix3<f64>,
        pbc: [bool; 3],
    ) -> Self {
        debug_assert_eq!(species.len(), positions.len());
        Self {
            species,
            positions,
            cell,
            pbc,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Vector3<f64>] {
        &self.positions
    }

    pub fn set_positions(&mut self, positions: Vec<Vector3<f64>>) -> Result<(), StructureError> {
        if positions.len() != self.species.len() {
            return Err(StructureError::LengthMismatch {
                species: self.species.len(),
                positions: positions.len(),
            });
        }
        self.positions = positions;
        Ok(())
    }

    pub fn cell(&self) -> &Matrix3<f64> {
        &self.cell
    }

    pub fn set_cell(&mut self, cell: Matrix3<f64>) {
        self.cell = cell;
    }

    pub fn pbc(&self) -> [bool; 3] {
        self.pbc
    }

    pub fn species(&self) -> &[String] {
        &self.species
    }

    /// Distinct species symbols in first-occurrence order.
    pub fn species_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = Vec::new();
        for symbol in &self.species {
            if !symbols.contains(symbol) {
                symbols.push(symbol.clone());
            }
        }
        symbols
    }

    /// Per-atom index into [`species_symbols`](Self::species_symbols).
    pub fn species_indices(&self) -> Vec<usize> {
        let symbols = self.species_symbols();
        self.species
            .iter()
            .map(|s| symbols.iter().position(|x| x == s).unwrap_or(0))
            .collect()
    }

    /// Indices of all atoms of the given species.
    pub fn select_indices(&self, symbol: &str) -> Vec<usize> {
        self.species
            .iter()
            .enumerate()
            .filter(|(_, s)| s.as_str() == symbol)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn volume(&self) -> f64 {
        self.cell.determinant().abs()
    }

    /// Minimum-image distance between two atoms, honoring the pbc flags.
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        let mut best = f64::INFINITY;
        let delta = self.positions[j] - self.positions[i];
        let shifts = |periodic: bool| if periodic { vec![-1.0, 0.0, 1.0] } else { vec![0.0] };
        for sa in shifts(self.pbc[0]) {
            for sb in shifts(self.pbc[1]) {
                for sc in shifts(self.pbc[2]) {
                    let shift = self.cell.row(0).transpose() * sa
                        + self.cell.row(1).transpose() * sb
                        + self.cell.row(2).transpose() * sc;
                    best = best.min((delta + shift).norm());
                }
            }
        }
        best
    }

    /// For every atom, the indices of all other atoms within `cutoff`,
    /// sorted by increasing minimum-image distance.
    ///
    /// Quadratic scan; intended for setup-time queries such as bond
    /// detection, not per-step use.
    pub fn neighbors_within(&self, cutoff: f64) -> Vec<Vec<usize>> {
        let n = self.len();
        let mut neighbors = vec![Vec::new(); n];
        for i in 0..n {
            let mut found: Vec<(f64, usize)> = Vec::new();
            for j in 0..n {
                if i == j {
                    continue;
                }
                let d = self.distance(i, j);
                if d <= cutoff {
                    found.push((d, j));
                }
            }
            found.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
            neighbors[i] = found.into_iter().map(|(_, j)| j).collect();
        }
        neighbors
    }
}
