use nalgebra::{Matrix3, Vector3};
use thiserror::Error;

/// Deviation of `trace(R)` from 3 beyond which a cell counts as skewed.
pub const SKEW_TOLERANCE: f64 = 1.0e-8;

const VOLUME_TOLERANCE: f64 = 1.0e-10;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PrismError {
    #[error("cell volume {volume:.6e} is degenerate or left-handed")]
    DegenerateCell { volume: f64 },

    #[error("cell decomposition produced a non-positive prism diagonal ({axis} = {value:.6e})")]
    NonPositiveDiagonal { axis: &'static str, value: f64 },
}

/// The canonical decomposition of a simulation cell into an upper-triangular
/// prism plus the rotation between the caller's frame and the engine's frame.
///
/// For a cell matrix whose rows are the lattice vectors, the transform finds
/// the unique rotation `R` (orthogonal, det = +1) and six scalars
/// `(lx, ly, lz, xy, xz, yz)` such that `cell * R^T` equals the prism-row
/// matrix `[[lx, 0, 0], [xy, ly, 0], [xz, yz, lz]]` with a strictly positive
/// diagonal. Vector quantities are pushed into the engine frame with
/// [`fold_vector`](Self::fold_vector) and pulled back with
/// [`unfold_vector`](Self::unfold_vector); rank-2 tensors transform on both
/// indices via [`fold_tensor`](Self::fold_tensor) /
/// [`unfold_tensor`](Self::unfold_tensor).
///
/// The transform is immutable: a cell change means building a new prism, never
/// mutating an existing one.
#[derive(Debug, Clone, PartialEq)]
pub struct UnfoldingPrism {
    rotation: Matrix3<f64>,
    lengths: Vector3<f64>,
    tilts: Vector3<f64>,
}

impl UnfoldingPrism {
    /// Decomposes `cell` (rows = lattice vectors) into rotation plus prism scalars.
    ///
    /// Near-zero volume, left-handed cells, and decompositions that fail to
    /// produce a positive diagonal are fatal configuration errors.
    pub fn new(cell: &Matrix3<f64>) -> Result<Self, PrismError> {
        let a: Vector3<f64> = cell.row(0).transpose();
        let b: Vector3<f64> = cell.row(1).transpose();
        let c: Vector3<f64> = cell.row(2).transpose();

        let volume = a.dot(&b.cross(&c));
        if volume <= VOLUME_TOLERANCE {
            return Err(PrismError::DegenerateCell { volume });
        }

        let lx = a.norm();
        if lx <= VOLUME_TOLERANCE {
            return Err(PrismError::NonPositiveDiagonal {
                axis: "lx",
                value: lx,
            });
        }
        let a_hat = a / lx;

        let xy = b.dot(&a_hat);
        let ly_sq = b.norm_squared() - xy * xy;
        if ly_sq <= VOLUME_TOLERANCE {
            return Err(PrismError::NonPositiveDiagonal {
                axis: "ly",
                value: ly_sq,
            });
        }
        let ly = ly_sq.sqrt();

        let xz = c.dot(&a_hat);
        let yz = (b.dot(&c) - xy * xz) / ly;
        let lz_sq = c.norm_squared() - xz * xz - yz * yz;
        if lz_sq <= VOLUME_TOLERANCE {
            return Err(PrismError::NonPositiveDiagonal {
                axis: "lz",
                value: lz_sq,
            });
        }
        let lz = lz_sq.sqrt();

        #[rustfmt::skip]
        let prism_rows = Matrix3::new(
            lx,  0.0, 0.0,
            xy,  ly,  0.0,
            xz,  yz,  lz,
        );

        // cell * R^T = prism_rows, so R^T = cell^-1 * prism_rows.
        let inverse = cell
            .try_inverse()
            .ok_or(PrismError::DegenerateCell { volume })?;
        let rotation = (inverse * prism_rows).transpose();

        Ok(Self {
            rotation,
            lengths: Vector3::new(lx, ly, lz),
            tilts: Vector3::new(xy, xz, yz),
        })
    }

    pub fn rotation(&self) -> &Matrix3<f64> {
        &self.rotation
    }

    /// The six prism scalars `(lx, ly, lz, xy, xz, yz)`.
    pub fn prism(&self) -> (f64, f64, f64, f64, f64, f64) {
        (
            self.lengths.x,
            self.lengths.y,
            self.lengths.z,
            self.tilts.x,
            self.tilts.y,
            self.tilts.z,
        )
    }

    /// The prism as a row matrix, i.e. the cell expressed in the engine frame.
    pub fn prism_cell(&self) -> Matrix3<f64> {
        let (lx, ly, lz, xy, xz, yz) = self.prism();
        #[rustfmt::skip]
        let rows = Matrix3::new(
            lx,  0.0, 0.0,
            xy,  ly,  0.0,
            xz,  yz,  lz,
        );
        rows
    }

    /// Whether the rotation deviates from identity beyond [`SKEW_TOLERANCE`].
    pub fn is_skewed(&self) -> bool {
        (self.rotation.trace() - 3.0).abs() > SKEW_TOLERANCE
    }

    /// Pushes a caller-frame vector into the engine frame (`v' = v * R^T`).
    pub fn fold_vector(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * v
    }

    /// Pulls an engine-frame vector back into the caller frame (`v = v' * R`).
    pub fn unfold_vector(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.transpose() * v
    }

    pub fn fold_vectors(&self, vectors: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
        vectors.iter().map(|v| self.fold_vector(v)).collect()
    }

    pub fn unfold_vectors(&self, vectors: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
        vectors.iter().map(|v| self.unfold_vector(v)).collect()
    }

    /// Pushes a rank-2 tensor into the engine frame (`T' = R * T * R^T`).
    pub fn fold_tensor(&self, tensor: &Matrix3<f64>) -> Matrix3<f64> {
        self.rotation * tensor * self.rotation.transpose()
    }

    /// Pulls a rank-2 tensor back into the caller frame (`T = R^T * T' * R`).
    pub fn unfold_tensor(&self, tensor: &Matrix3<f64>) -> Matrix3<f64> {
        self.rotation.transpose() * tensor * self.rotation
    }

    /// Re-expresses an engine-frame cell (rows = lattice vectors) in the
    /// caller's original orientation.
    pub fn unfold_cell(&self, engine_cell: &Matrix3<f64>) -> Matrix3<f64> {
        // Row i of the result is v'_i * R.
        engine_cell * self.rotation
    }
}
