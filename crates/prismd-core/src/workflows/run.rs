use tracing::{info, instrument};

use crate::engine::control::{MdOptions, MinimizeOptions};
use crate::engine::error::EngineError;
use crate::engine::fix_external::FixExternal;
use crate::engine::session::InteractiveSession;

/// Drives a molecular-dynamics run over an open session.
///
/// The engine advances in chunks of `n_print` steps; observables are
/// collected after every chunk, so the result store ends up with one entry
/// per chunk for every tracked property. A force hook, when given, is
/// registered after the MD setup is live and before the first step.
///
/// Returns the engine's final step count. The session stays open; the caller
/// decides when to `close` it.
#[instrument(skip_all, name = "md_workflow")]
pub fn run_md(
    session: &mut InteractiveSession,
    options: &MdOptions,
    force_hook: Option<FixExternal>,
) -> Result<u64, EngineError> {
    session.calc_md(options)?;
    if let Some(hook) = force_hook {
        let (callback, n_call, n_apply) = hook.into_parts();
        session.set_force_callback(callback, n_call, n_apply)?;
    }

    let chunks = chunk_count(options.n_ionic_steps, options.n_print);
    info!(
        "Starting MD run: {} ionic steps in {} chunks of {}.",
        options.n_ionic_steps, chunks, options.n_print
    );
    for _ in 0..chunks {
        session.execute_step()?;
        session.collect()?;
    }
    session.steps()
}

/// Drives a geometry minimization over an open session.
///
/// The engine's minimize command runs to convergence in one blocking call,
/// so a single execute/collect pair covers the whole calculation.
#[instrument(skip_all, name = "minimize_workflow")]
pub fn run_minimize(
    session: &mut InteractiveSession,
    options: &MinimizeOptions,
) -> Result<u64, EngineError> {
    session.calc_minimize(options)?;
    info!(
        "Starting minimization: ftol {} over at most {} iterations.",
        options.ionic_force_tolerance, options.max_iter
    );
    session.execute_step()?;
    session.collect()?;
    session.steps()
}

/// Evaluates the current structure without moving any atom (a zero-step
/// run), collecting one frame of observables.
pub fn run_static(session: &mut InteractiveSession) -> Result<(), EngineError> {
    session.execute_step()?;
    session.collect()
}

fn chunk_count(n_ionic_steps: usize, n_print: usize) -> usize {
    if n_print == 0 {
        return 1;
    }
    n_ionic_steps.div_ceil(n_print).max(1)
}
