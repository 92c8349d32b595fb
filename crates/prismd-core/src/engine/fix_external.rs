use nalgebra::Vector3;
use tracing::warn;

use super::handle::RawForceCallback;

/// Simplified per-step force hook.
///
/// Receives positions sorted into ascending atom-ID order, the current
/// engine timestep, and the local atom count; returns one force per atom in
/// the same ID order. Reordering into the engine's internal layout, buffer
/// zeroing, and net-force debiasing are handled by the driver.
pub type SimplifiedForceFn =
    Box<dyn FnMut(&[Vector3<f64>], i64, usize) -> Vec<Vector3<f64>> + Send>;

/// The two calling conventions of the force-modification protocol, resolved
/// once at registration time.
pub enum ForceCallback {
    /// Convenience mode: the driver owns ordering and debiasing.
    Simplified(SimplifiedForceFn),
    /// Expert mode: the hook sees the engine's raw buffers directly and is
    /// fully responsible for mutating (never replacing) the shared force
    /// buffer. No reordering or debiasing is applied.
    Raw(RawForceCallback),
}

/// A registered force-modification hook plus its invocation cadence.
///
/// The engine invokes the hook every `n_call` steps and (re)applies its most
/// recent output every `n_apply` steps; with `n_call > n_apply` the last
/// computed forces persist across the skipped invocations.
pub struct FixExternal {
    callback: ForceCallback,
    pub n_call: usize,
    pub n_apply: usize,
}

impl FixExternal {
    pub fn new(callback: ForceCallback, n_call: usize, n_apply: usize) -> Self {
        Self {
            callback,
            n_call,
            n_apply,
        }
    }

    /// The engine-side fix definition for this hook.
    pub fn fix_command(&self) -> String {
        format!(
            "fix fix_external all external pf/callback {} {}",
            self.n_call, self.n_apply
        )
    }

    /// Splits the hook back into callback and cadence, for registration
    /// through the session driver.
    pub fn into_parts(self) -> (ForceCallback, usize, usize) {
        (self.callback, self.n_call, self.n_apply)
    }

    /// Resolves the tagged convention into the raw engine hook.
    pub fn into_engine_callback(self) -> RawForceCallback {
        match self.callback {
            ForceCallback::Raw(raw) => raw,
            ForceCallback::Simplified(mut f) => Box::new(
                move |timestep: i64,
                      ids: &[i64],
                      positions: &[Vector3<f64>],
                      forces: &mut [Vector3<f64>]| {
                    let order = argsort(ids);
                    let sorted: Vec<Vector3<f64>> =
                        order.iter().map(|&i| positions[i]).collect();
                    let user = f(&sorted, timestep, positions.len());

                    for slot in forces.iter_mut() {
                        *slot = Vector3::zeros();
                    }
                    // A short or long return cannot be applied safely inside
                    // the engine's invocation window; leave the buffer zeroed.
                    if user.len() != order.len() {
                        warn!(
                            "force callback returned {} forces for {} atoms; ignoring",
                            user.len(),
                            order.len()
                        );
                        return;
                    }
                    for (rank, &engine_idx) in order.iter().enumerate() {
                        forces[engine_idx] += user[rank];
                    }
                    // Remove the net translational force.
                    let n = forces.len().max(1) as f64;
                    let mean: Vector3<f64> = forces.iter().sum::<Vector3<f64>>() / n;
                    for slot in forces.iter_mut() {
                        *slot -= mean;
                    }
                },
            ),
        }
    }
}

/// Indices that sort `ids` ascending; index `k` is the engine slot of the
/// atom with the k-th smallest ID.
pub(crate) fn argsort(ids: &[i64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..ids.len()).collect();
    order.sort_by_key(|&i| ids[i]);
    order
}
