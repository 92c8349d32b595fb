use nalgebra::{Matrix3, Vector3};

use super::structure::Structure;

/// Cubic Bravais lattices supported by the bulk factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CubicLattice {
    Simple,
    BodyCentered,
    FaceCentered,
}

impl CubicLattice {
    fn basis(&self) -> &'static [[f64; 3]] {
        match self {
            CubicLattice::Simple => &[[0.0, 0.0, 0.0]],
            CubicLattice::BodyCentered => &[[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]],
            CubicLattice::FaceCentered => &[
                [0.0, 0.0, 0.0],
                [0.5, 0.5, 0.0],
                [0.5, 0.0, 0.5],
                [0.0, 0.5, 0.5],
            ],
        }
    }
}

/// Builds a periodic bulk supercell of a single element on a cubic lattice
/// with lattice constant `a` (Angstrom), repeated `repeat` times per axis.
pub fn bulk(symbol: &str, lattice: CubicLattice, a: f64, repeat: [usize; 3]) -> Structure {
    let basis = lattice.basis();
    let mut species = Vec::new();
    let mut positions = Vec::new();
    for i in 0..repeat[0] {
        for j in 0..repeat[1] {
            for k in 0..repeat[2] {
                for frac in basis {
                    species.push(symbol.to_string());
                    positions.push(Vector3::new(
                        (i as f64 + frac[0]) * a,
                        (j as f64 + frac[1]) * a,
                        (k as f64 + frac[2]) * a,
                    ));
                }
            }
        }
    }
    let cell = Matrix3::from_diagonal(&Vector3::new(
        repeat[0] as f64 * a,
        repeat[1] as f64 * a,
        repeat[2] as f64 * a,
    ));
    Structure::from_parts(species, positions, cell, [true; 3])
}
