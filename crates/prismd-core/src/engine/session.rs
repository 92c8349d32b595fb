use nalgebra::{Matrix3, Vector3};
use tracing::{debug, warn};

use super::cache::StepCache;
use super::config::{RunMode, ServerConfig};
use super::control::{AtomStyle, ControlInput, MdOptions, MinimizeOptions, Potential};
use super::error::EngineError;
use super::fix_external::{argsort, FixExternal, ForceCallback};
use super::handle::{EngineHandle, EngineLauncher, RunStatus};
use super::monitor::{SessionEvent, SessionMonitor};
use super::state::SessionState;
use super::store::ResultStore;
use crate::core::geometry::prism::UnfoldingPrism;
use crate::core::models::element::atomic_mass;
use crate::core::models::structure::Structure;
use crate::core::units::{Quantity, UnitConverter};

use itertools::Itertools;

/// Voigt-to-tensor index map for the engine's 6-component per-atom stress
/// rows `(xx, yy, zz, xy, xz, yz)`.
const VOIGT: [usize; 9] = [0, 3, 4, 3, 1, 5, 4, 5, 2];

/// One live connection to the external MD engine.
///
/// The session owns the engine handle, the current structure, and the
/// cell-unfolding transform; every geometry-bearing getter and setter goes
/// through the transform and the unit converter exactly once. Per-step
/// observables are buffered in a cache and flushed into the permanent result
/// store when the session closes.
///
/// All calls are synchronous: one blocking engine command at a time, applied
/// in the exact sequence issued.
pub struct InteractiveSession {
    handle: Box<dyn EngineHandle>,
    structure: Structure,
    prism: UnfoldingPrism,
    previously_skewed: bool,
    control: ControlInput,
    potential: Potential,
    converter: UnitConverter,
    config: ServerConfig,
    monitor: SessionMonitor,
    cache: StepCache,
    store: ResultStore,
    state: SessionState,
    stress_compute_ready: bool,
    step_pending_fetch: bool,
    water_bonds: bool,
}

impl InteractiveSession {
    /// Creates the working area, attaches the engine per the configuration
    /// branch, and pushes the initial structure.
    pub fn open(
        structure: Structure,
        potential: Potential,
        config: ServerConfig,
        launcher: &dyn EngineLauncher,
        monitor: SessionMonitor,
    ) -> Result<Self, EngineError> {
        std::fs::create_dir_all(&config.working_directory)?;
        let handle = launcher.launch(&config.launch_spec())?;
        let prism = UnfoldingPrism::new(structure.cell())?;
        let previously_skewed = prism.is_skewed();
        let mut control = ControlInput::new(config.units, potential.atom_style);
        control.set_boundary(structure.pbc());

        let mut session = Self {
            handle,
            structure,
            prism,
            previously_skewed,
            control,
            potential,
            converter: UnitConverter::new(config.units),
            config,
            monitor,
            cache: StepCache::new(),
            store: ResultStore::new(),
            state: SessionState::Initialized,
            stress_compute_ready: false,
            step_pending_fetch: false,
            water_bonds: false,
        };
        session.push_structure()?;
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn is_skewed(&self) -> bool {
        self.prism.is_skewed()
    }

    /// Enables the bonded-water setup pass on the next structure push.
    /// Only meaningful with the `full` atom style.
    pub fn set_water_bonds(&mut self, enabled: bool) {
        self.water_bonds = enabled;
    }

    fn issue(&mut self, command: &str) -> Result<(), EngineError> {
        debug!("engine command: {command}");
        self.handle.command(command)
    }

    fn require_active(&self, required: &'static str) -> Result<(), EngineError> {
        if self.state.is_active() {
            Ok(())
        } else {
            Err(EngineError::InvalidState {
                state: self.state,
                required,
            })
        }
    }

    /// Replaces the engine-side structure: recomputes the transform and
    /// replays box, atoms, control body, and potential from scratch.
    pub fn set_structure(&mut self, structure: Structure) -> Result<(), EngineError> {
        self.prism = UnfoldingPrism::new(structure.cell())?;
        self.previously_skewed = self.prism.is_skewed();
        self.structure = structure;
        self.push_structure()
    }

    fn push_structure(&mut self) -> Result<(), EngineError> {
        self.require_active("an active session")?;
        // `clear` drops any compute definitions along with the atoms.
        self.stress_compute_ready = false;

        self.issue("clear")?;
        for command in self.control.header_commands() {
            self.issue(&command)?;
        }

        self.prism = UnfoldingPrism::new(self.structure.cell())?;
        self.previously_skewed = self.prism.is_skewed();
        if self.prism.is_skewed() {
            warn!("skewed cell: the engine will run in the slower triclinic mode");
            self.monitor.report(SessionEvent::SkewedCell);
        }

        let length = self.converter.to_engine(Quantity::Positions);
        let (lx, ly, lz, xy, xz, yz) = self.prism.prism();
        let (lx, ly, lz) = (lx * length, ly * length, lz * length);
        if self.prism.is_skewed() {
            let (xy, xz, yz) = (xy * length, xz * length, yz * length);
            self.issue(&format!(
                "region 1 prism 0.0 {lx} 0.0 {ly} 0.0 {lz} {xy} {xz} {yz} units box"
            ))?;
        } else {
            self.issue(&format!(
                "region 1 block 0.0 {lx} 0.0 {ly} 0.0 {lz} units box"
            ))?;
        }

        let n_types = self.potential.element_list().len();
        if self.control.atom_style() == AtomStyle::Full {
            self.issue(&format!(
                "create_box {n_types} 1 bond/types 1 angle/types 1 \
                 extra/bond/per/atom 2 extra/angle/per/atom 2"
            ))?;
        } else {
            self.issue(&format!("create_box {n_types} 1"))?;
        }
        for (index, element) in self.potential.element_list().to_vec().iter().enumerate() {
            let mass = atomic_mass(element).unwrap_or(1.0);
            self.issue(&format!("mass {:3} {:.6}", index + 1, mass))?;
        }

        let types = self.engine_types(&self.structure.species_indices())?;
        let mut positions = self.structure.positions().to_vec();
        if self.prism.is_skewed() {
            positions = self.prism.fold_vectors(&positions);
        }
        let flat: Vec<f64> = positions
            .iter()
            .flat_map(|p| [p.x * length, p.y * length, p.z * length])
            .collect();
        self.handle.create_atoms(&types, &flat)?;
        self.issue("change_box all remap")?;

        for command in self.control.body_commands().to_vec() {
            self.issue(&command)?;
        }

        let full = self.control.atom_style() == AtomStyle::Full;
        for line in self.potential.validated_commands()? {
            // With the bonded style, pair and long-range setup is deferred
            // until after the bonds exist.
            if full && (line.contains("kspace") || line.contains("pair")) {
                continue;
            }
            self.issue(&line)?;
        }
        if full && self.water_bonds {
            self.setup_water_bonds()?;
        }
        Ok(())
    }

    /// Maps per-atom species indices (into the structure's symbol list) to
    /// the engine's one-based type indices fixed by the potential.
    fn engine_types(&self, species_indices: &[usize]) -> Result<Vec<i64>, EngineError> {
        let symbols = self.structure.species_symbols();
        species_indices
            .iter()
            .map(|&idx| {
                let symbol = symbols.get(idx).ok_or_else(|| {
                    EngineError::Internal(format!("species index {idx} out of range"))
                })?;
                self.potential
                    .element_list()
                    .iter()
                    .position(|e| e == symbol)
                    .map(|p| p as i64 + 1)
                    .ok_or_else(|| EngineError::SpeciesNotInPotential {
                        symbol: symbol.clone(),
                    })
            })
            .collect()
    }

    /// Applies a new cell to the live engine session.
    ///
    /// Entering triclinic mode is an explicit transition issued before the
    /// new box dimensions; reverting to orthogonal happens after the tilt
    /// factors are zeroed. Dimension and mode-transition commands are never
    /// merged because the engine requires them ordered.
    pub fn set_cell(&mut self, cell: Matrix3<f64>) -> Result<(), EngineError> {
        self.require_active("an active session")?;
        let prism = UnfoldingPrism::new(&cell)?;
        let length = self.converter.to_engine(Quantity::Positions);
        let (lx, ly, lz, xy, xz, yz) = prism.prism();
        let (lx, ly, lz) = (lx * length, ly * length, lz * length);
        let (xy, xz, yz) = (xy * length, xz * length, yz * length);

        let is_skewed = prism.is_skewed();
        let was_skewed = self.previously_skewed;
        if is_skewed {
            warn!("skewed cell: the engine will run in the slower triclinic mode");
            self.monitor.report(SessionEvent::SkewedCell);
            if !was_skewed {
                self.issue("change_box all triclinic")?;
            }
            self.issue(&format!(
                "change_box all x final 0 {lx} y final 0 {ly} z final 0 {lz} \
                 xy final {xy} xz final {xz} yz final {yz} remap units box"
            ))?;
        } else if was_skewed {
            self.issue(&format!(
                "change_box all x final 0 {lx} y final 0 {ly} z final 0 {lz} \
                 xy final 0 xz final 0 yz final 0 remap units box"
            ))?;
            self.issue("change_box all ortho")?;
        } else {
            self.issue(&format!(
                "change_box all x final 0 {lx} y final 0 {ly} z final 0 {lz} remap units box"
            ))?;
        }

        self.structure.set_cell(cell);
        self.prism = prism;
        self.previously_skewed = is_skewed;
        Ok(())
    }

    /// The current cell pulled from the engine, re-expressed in the caller's
    /// original orientation and units.
    pub fn cell(&mut self) -> Result<Matrix3<f64>, EngineError> {
        let lx = self.handle.get_scalar("lx")?;
        let ly = self.handle.get_scalar("ly")?;
        let lz = self.handle.get_scalar("lz")?;
        let xy = self.handle.get_scalar("xy")?;
        let xz = self.handle.get_scalar("xz")?;
        let yz = self.handle.get_scalar("yz")?;
        #[rustfmt::skip]
        let engine_cell = Matrix3::new(
            lx,  0.0, 0.0,
            xy,  ly,  0.0,
            xz,  yz,  lz,
        );
        Ok(self.prism.unfold_cell(&engine_cell) * self.converter.to_caller(Quantity::Positions))
    }

    pub fn set_positions(&mut self, positions: &[Vector3<f64>]) -> Result<(), EngineError> {
        self.require_active("an active session")?;
        self.structure.set_positions(positions.to_vec())?;
        let mut engine_frame = positions.to_vec();
        if self.prism.is_skewed() {
            engine_frame = self.prism.fold_vectors(&engine_frame);
        }
        let length = self.converter.to_engine(Quantity::Positions);
        let flat: Vec<f64> = engine_frame
            .iter()
            .flat_map(|p| [p.x * length, p.y * length, p.z * length])
            .collect();
        self.handle.scatter("x", 3, &flat)?;
        self.issue("change_box all remap")
    }

    pub fn positions(&mut self) -> Result<Vec<Vector3<f64>>, EngineError> {
        self.per_atom_vectors("x", Quantity::Positions)
    }

    pub fn forces(&mut self) -> Result<Vec<Vector3<f64>>, EngineError> {
        self.per_atom_vectors("f", Quantity::Forces)
    }

    fn per_atom_vectors(
        &mut self,
        property: &str,
        quantity: Quantity,
    ) -> Result<Vec<Vector3<f64>>, EngineError> {
        let n = self.structure.len();
        let raw = self.handle.gather(property, 3)?;
        if raw.len() != 3 * n {
            return Err(EngineError::UnexpectedWidth {
                property: property.to_string(),
                expected: 3 * n,
                got: raw.len(),
            });
        }
        let factor = self.converter.to_caller(quantity);
        let mut vectors: Vec<Vector3<f64>> = raw
            .chunks_exact(3)
            .map(|c| Vector3::new(c[0], c[1], c[2]) * factor)
            .collect();
        if self.prism.is_skewed() {
            vectors = self.prism.unfold_vectors(&vectors);
        }
        Ok(vectors)
    }

    /// Per-atom type indices as zero-based positions in the potential's
    /// element list.
    pub fn indices(&mut self) -> Result<Vec<usize>, EngineError> {
        let n = self.structure.len();
        let raw = self.handle.gather_ints("type")?;
        if raw.len() != n {
            return Err(EngineError::UnexpectedWidth {
                property: "type".to_string(),
                expected: n,
                got: raw.len(),
            });
        }
        Ok(raw.iter().map(|&t| (t - 1).max(0) as usize).collect())
    }

    /// Reassigns per-atom species (indices into the structure's symbol
    /// list) on the live session.
    pub fn set_indices(&mut self, species_indices: &[usize]) -> Result<(), EngineError> {
        self.require_active("an active session")?;
        let types = self.engine_types(species_indices)?;
        self.handle.scatter_ints("type", &types)
    }

    pub fn energy_pot(&mut self) -> Result<f64, EngineError> {
        Ok(self.handle.get_scalar("pe")? * self.converter.to_caller(Quantity::Energy))
    }

    pub fn energy_tot(&mut self) -> Result<f64, EngineError> {
        Ok(self.handle.get_scalar("etotal")? * self.converter.to_caller(Quantity::Energy))
    }

    pub fn temperature(&mut self) -> Result<f64, EngineError> {
        Ok(self.handle.get_scalar("temp")? * self.converter.to_caller(Quantity::Temperature))
    }

    pub fn volume(&mut self) -> Result<f64, EngineError> {
        Ok(self.handle.get_scalar("vol")? * self.converter.to_caller(Quantity::Volume))
    }

    pub fn steps(&mut self) -> Result<u64, EngineError> {
        Ok(self.handle.get_scalar("step")?.round() as u64)
    }

    /// The full pressure tensor in caller units and orientation.
    pub fn pressure_tensor(&mut self) -> Result<Matrix3<f64>, EngineError> {
        let pxx = self.handle.get_scalar("pxx")?;
        let pyy = self.handle.get_scalar("pyy")?;
        let pzz = self.handle.get_scalar("pzz")?;
        let pxy = self.handle.get_scalar("pxy")?;
        let pxz = self.handle.get_scalar("pxz")?;
        let pyz = self.handle.get_scalar("pyz")?;
        #[rustfmt::skip]
        let mut tensor = Matrix3::new(
            pxx, pxy, pxz,
            pxy, pyy, pyz,
            pxz, pyz, pzz,
        );
        if self.prism.is_skewed() {
            tensor = self.prism.unfold_tensor(&tensor);
        }
        Ok(tensor * self.converter.to_caller(Quantity::Pressure))
    }

    /// Per-atom stress-times-volume tensors (eV), re-sorted from the
    /// engine's internal atom ordering into ascending-ID order before the
    /// rotation back into the caller frame.
    pub fn stress_per_atom(&mut self) -> Result<Vec<Matrix3<f64>>, EngineError> {
        self.require_active("an active session")?;
        if !self.stress_compute_ready {
            self.issue("compute st all stress/atom NULL")?;
            self.issue("run 0")?;
            self.stress_compute_ready = true;
        }
        let n = self.structure.len();
        let ids = self.handle.atom_ids()?;
        if ids.len() != n {
            return Err(EngineError::UnexpectedWidth {
                property: "id".to_string(),
                expected: n,
                got: ids.len(),
            });
        }
        let rows = self.handle.extract_compute_per_atom("st", 6)?;
        if rows.len() != n {
            return Err(EngineError::UnexpectedWidth {
                property: "st".to_string(),
                expected: n,
                got: rows.len(),
            });
        }

        let factor = self.converter.to_caller(Quantity::StressVolume);
        let order = argsort(&ids);
        let mut tensors = Vec::with_capacity(n);
        for &engine_idx in &order {
            let row = &rows[engine_idx];
            if row.len() != 6 {
                return Err(EngineError::UnexpectedWidth {
                    property: "st".to_string(),
                    expected: 6,
                    got: row.len(),
                });
            }
            let values: Vec<f64> = VOIGT.iter().map(|&v| row[v] * factor).collect();
            let tensor = Matrix3::from_row_slice(&values);
            tensors.push(if self.prism.is_skewed() {
                self.prism.unfold_tensor(&tensor)
            } else {
                tensor
            });
        }
        Ok(tensors)
    }

    /// Registers the per-step force-modification hook.
    ///
    /// Only an interactive session can host the callback; anything else is
    /// a fatal precondition violation.
    pub fn set_force_callback(
        &mut self,
        callback: ForceCallback,
        n_call: usize,
        n_apply: usize,
    ) -> Result<(), EngineError> {
        self.require_active("an active session")?;
        if self.config.run_mode != RunMode::Interactive {
            return Err(EngineError::CallbackOutsideInteractive);
        }
        let fix = FixExternal::new(callback, n_call, n_apply);
        self.issue(&fix.fix_command())?;
        self.handle
            .set_force_callback("fix_external", fix.into_engine_callback())
    }

    /// Configures an MD run and replays the structure so the new fixes are
    /// live.
    pub fn calc_md(&mut self, options: &MdOptions) -> Result<(), EngineError> {
        let converter = self.converter;
        self.control.configure_md(options, &converter);
        self.push_structure()
    }

    /// Configures a minimization and replays the structure.
    pub fn calc_minimize(&mut self, options: &MinimizeOptions) -> Result<(), EngineError> {
        let converter = self.converter;
        self.control.configure_minimize(options, &converter);
        self.push_structure()
    }

    /// Issues the pending run command. Allowed from `Initialized` or `Idle`;
    /// the session is `Running` for the duration and `Idle` afterwards.
    ///
    /// A non-converged or abnormally terminated run is surfaced as a
    /// warning, not an error; the caller decides whether that is fatal.
    pub fn execute_step(&mut self) -> Result<(), EngineError> {
        if !self.state.can_execute() {
            return Err(EngineError::InvalidState {
                state: self.state,
                required: "an initialized or idle session",
            });
        }
        self.state = SessionState::Running;
        let run = self.control.run_command().to_string();
        let result = self.issue(&run);
        self.state = SessionState::Idle;
        result?;

        if let RunStatus::Abnormal(status) = self.handle.last_run_status() {
            warn!("engine run terminated abnormally: {status}");
            self.monitor
                .report(SessionEvent::AbnormalTermination { status });
        }
        self.step_pending_fetch = true;
        let step = self.steps()?;
        self.monitor.report(SessionEvent::StepFinished { step });
        Ok(())
    }

    /// Pulls every tracked observable through transform and unit conversion
    /// into the step cache.
    ///
    /// Calling this without a prior `execute_step` yields stale data; that
    /// is deliberately a warning, not an error.
    pub fn collect(&mut self) -> Result<(), EngineError> {
        self.require_active("an active session")?;
        if !self.step_pending_fetch {
            warn!("collect called without a prior execute_step; values may be stale");
            self.monitor.report(SessionEvent::FetchBeforeRun);
        }

        let positions = self.positions()?;
        self.cache.push_vector_frame("positions", positions);
        let forces = self.forces()?;
        self.cache.push_vector_frame("forces", forces);
        let cell = self.cell()?;
        self.cache.push_tensor("cells", cell);
        let energy_pot = self.energy_pot()?;
        self.cache.push_scalar("energy_pot", energy_pot);
        let energy_tot = self.energy_tot()?;
        self.cache.push_scalar("energy_tot", energy_tot);
        let temperature = self.temperature()?;
        self.cache.push_scalar("temperature", temperature);
        let pressure = self.pressure_tensor()?;
        self.cache.push_tensor("pressures", pressure);
        let volume = self.volume()?;
        self.cache.push_scalar("volume", volume);
        let steps = self.steps()?;
        self.cache.push_scalar("steps", steps as f64);

        self.step_pending_fetch = false;
        Ok(())
    }

    /// Collects the per-atom stress frame into the cache under `stresses`.
    ///
    /// Deliberately not part of [`collect`](Self::collect)'s per-step set:
    /// stress extraction costs an extra compute pass, so callers opt in per
    /// step.
    pub fn collect_stress(&mut self) -> Result<(), EngineError> {
        let frame = self.stress_per_atom()?;
        self.cache.push_tensor_frame("stresses", frame);
        Ok(())
    }

    /// Flushes buffered interactive-phase results into the permanent store
    /// (merging `interactive` into `generic`) and releases the engine
    /// handle. Idempotent: closing a closed session is a no-op.
    pub fn close(&mut self) -> Result<(), EngineError> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.cache.flush_into(&mut self.store, "interactive");
        for key in self.store.list_nodes("interactive") {
            if let Some(value) = self.store.get(&format!("interactive/{key}")).cloned() {
                self.store.insert(&format!("generic/{key}"), value);
            }
        }
        self.handle.close()?;
        self.state = SessionState::Closed;
        Ok(())
    }

    /// Writes explicit bonds and angles for intact water molecules, then
    /// restores the real pair and long-range styles. Assumes every O atom
    /// has its two H atoms within 1.3 Angstrom.
    fn setup_water_bonds(&mut self) -> Result<(), EngineError> {
        let neighbors = self.structure.neighbors_within(1.3);
        let o_indices = self.structure.select_indices("O");
        let mut h1_indices = Vec::with_capacity(o_indices.len());
        let mut h2_indices = Vec::with_capacity(o_indices.len());
        for &o in &o_indices {
            let shell = &neighbors[o];
            if shell.len() < 2 {
                return Err(EngineError::Internal(format!(
                    "water setup: O atom {o} has fewer than two neighbors within 1.3 A"
                )));
            }
            h1_indices.push(shell[0]);
            h2_indices.push(shell[1]);
        }

        let id_list = |indices: &[usize]| indices.iter().map(|i| i + 1).join(" ");
        self.issue(&format!("group Oatoms id {}", id_list(&o_indices)))?;
        self.issue(&format!("group H1atoms id {}", id_list(&h1_indices)))?;
        self.issue(&format!("group H2atoms id {}", id_list(&h2_indices)))?;

        // A dummy non-Coulombic pair style has to exist before bonds can be
        // created.
        self.issue("kspace_style none")?;
        self.issue("pair_style lj/cut 2.5")?;
        self.issue("pair_coeff * * 0.0 0.0")?;
        self.issue("create_bonds many Oatoms H1atoms 1 0.7 1.4")?;
        self.issue("create_bonds many Oatoms H2atoms 1 0.7 1.4")?;
        for (i, &o) in o_indices.iter().enumerate() {
            self.issue(&format!(
                "create_bonds single/angle 1 {} {} {}",
                h1_indices[i] + 1,
                o + 1,
                h2_indices[i] + 1
            ))?;
        }

        for line in self.potential.validated_commands()? {
            if line.contains("pair") || line.contains("kspace") {
                self.issue(&line)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::factories::{bulk, CubicLattice};
    use crate::core::units::UnitSystem;
    use crate::engine::config::ServerConfigBuilder;
    use crate::engine::handle::testing::{FakeLauncher, FakeState};
    use crate::engine::handle::LaunchSpec;
    use std::sync::{Arc, Mutex};

    fn two_atom_structure() -> Structure {
        Structure::new(
            vec!["Fe".into(), "Fe".into()],
            vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.4, 1.4, 1.4)],
            Matrix3::from_diagonal(&Vector3::new(4.0, 4.0, 4.0)),
            [true; 3],
        )
        .unwrap()
    }

    #[rustfmt::skip]
    fn skewed_cell() -> Matrix3<f64> {
        Matrix3::new(
            4.0, 0.2, 0.0,
            0.1, 4.0, 0.1,
            0.0, 0.3, 4.0,
        )
    }

    fn fe_potential() -> Potential {
        Potential {
            name: "Fe-eam".into(),
            species: vec!["Fe".into()],
            atom_style: AtomStyle::Atomic,
            config: vec!["pair_style eam/alloy".into()],
            files: vec![],
        }
    }

    struct Fixture {
        session: InteractiveSession,
        state: Arc<Mutex<FakeState>>,
        events: Arc<Mutex<Vec<SessionEvent>>>,
        _workdir: tempfile::TempDir,
    }

    fn open_session(structure: Structure, units: UnitSystem, run_mode: RunMode) -> Fixture {
        let workdir = tempfile::tempdir().unwrap();
        let config = ServerConfigBuilder::new()
            .working_directory(workdir.path().to_path_buf())
            .run_mode(run_mode)
            .units(units)
            .build()
            .unwrap();
        let (launcher, state) = FakeLauncher::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let monitor =
            SessionMonitor::with_callback(Box::new(move |e| sink.lock().unwrap().push(e)));
        let session =
            InteractiveSession::open(structure, fe_potential(), config, &launcher, monitor)
                .unwrap();
        Fixture {
            session,
            state,
            events,
            _workdir: workdir,
        }
    }

    fn commands(state: &Arc<Mutex<FakeState>>) -> Vec<String> {
        state.lock().unwrap().commands.clone()
    }

    #[test]
    fn open_pushes_the_structure_through_the_engine() {
        let fixture = open_session(two_atom_structure(), UnitSystem::Metal, RunMode::Interactive);
        let cmds = commands(&fixture.state);
        assert_eq!(cmds[0], "clear");
        assert_eq!(cmds[1], "units metal");
        assert!(cmds.contains(&"boundary p p p".to_string()));
        assert!(cmds.contains(&"atom_modify map array".to_string()));
        assert!(cmds.contains(&"region 1 block 0.0 4 0.0 4 0.0 4 units box".to_string()));
        assert!(cmds.contains(&"create_box 1 1".to_string()));
        assert!(cmds.iter().any(|c| c.starts_with("mass   1 55.845")));
        assert!(cmds.contains(&"change_box all remap".to_string()));
        assert!(cmds.contains(&"pair_style eam/alloy".to_string()));

        let state = fixture.state.lock().unwrap();
        assert!(matches!(
            state.launch_spec,
            Some(LaunchSpec::InProcess { .. })
        ));
        assert_eq!(state.int_arrays["type"], vec![1, 1]);
        assert_eq!(state.arrays["x"].len(), 6);
        assert_eq!(fixture.session.state(), SessionState::Initialized);
    }

    #[test]
    fn unknown_species_is_rejected_at_push() {
        let workdir = tempfile::tempdir().unwrap();
        let config = ServerConfigBuilder::new()
            .working_directory(workdir.path().to_path_buf())
            .build()
            .unwrap();
        let (launcher, _state) = FakeLauncher::new();
        let structure = Structure::new(
            vec!["Cu".into()],
            vec![Vector3::zeros()],
            Matrix3::from_diagonal(&Vector3::new(4.0, 4.0, 4.0)),
            [true; 3],
        )
        .unwrap();
        let result = InteractiveSession::open(
            structure,
            fe_potential(),
            config,
            &launcher,
            SessionMonitor::new(),
        );
        assert!(matches!(
            result,
            Err(EngineError::SpeciesNotInPotential { symbol }) if symbol == "Cu"
        ));
    }

    #[test]
    fn skew_transitions_are_explicit_and_ordered() {
        let mut fixture =
            open_session(two_atom_structure(), UnitSystem::Metal, RunMode::Interactive);
        let before = commands(&fixture.state).len();

        // Orthogonal -> skewed: triclinic first, then the box dimensions.
        fixture.session.set_cell(skewed_cell()).unwrap();
        let cmds = commands(&fixture.state);
        assert_eq!(cmds[before], "change_box all triclinic");
        assert!(cmds[before + 1].starts_with("change_box all x final 0 "));
        assert!(cmds[before + 1].contains("xy final"));

        // Skewed -> skewed: no second transition command.
        fixture.session.set_cell(skewed_cell() * 1.01).unwrap();
        let cmds = commands(&fixture.state);
        assert_eq!(
            cmds.iter().filter(|c| *c == "change_box all triclinic").count(),
            1
        );

        // Skewed -> orthogonal: tilt zeroed before the mode revert.
        fixture
            .session
            .set_cell(Matrix3::from_diagonal(&Vector3::new(4.0, 4.0, 4.0)))
            .unwrap();
        let cmds = commands(&fixture.state);
        let last_two = &cmds[cmds.len() - 2..];
        assert!(last_two[0].contains("xy final 0 xz final 0 yz final 0"));
        assert_eq!(last_two[1], "change_box all ortho");

        // Orthogonal -> orthogonal: a bare dimension command.
        fixture
            .session
            .set_cell(Matrix3::from_diagonal(&Vector3::new(5.0, 5.0, 5.0)))
            .unwrap();
        let cmds = commands(&fixture.state);
        assert!(cmds.last().unwrap().ends_with("remap units box"));
        assert_eq!(
            cmds.iter().filter(|c| *c == "change_box all ortho").count(),
            1
        );
    }

    #[test]
    fn positions_round_trip_through_a_skewed_cell() {
        let mut structure = two_atom_structure();
        structure.set_cell(skewed_cell());
        let mut fixture = open_session(structure, UnitSystem::Metal, RunMode::Interactive);
        assert!(fixture.session.is_skewed());

        let originals = vec![Vector3::new(0.3, 0.2, 0.1), Vector3::new(1.5, 1.2, 2.0)];
        fixture.session.set_positions(&originals).unwrap();
        let fetched = fixture.session.positions().unwrap();
        for (a, b) in originals.iter().zip(fetched.iter()) {
            assert!((a - b).norm() < 1e-10);
        }
    }

    #[test]
    fn forces_round_trip_through_a_skewed_cell() {
        let mut structure = two_atom_structure();
        structure.set_cell(skewed_cell());
        let mut fixture = open_session(structure, UnitSystem::Metal, RunMode::Interactive);

        // Seed engine-frame forces by folding known caller-frame values.
        let caller = vec![Vector3::new(0.5, -0.25, 0.0), Vector3::new(-0.5, 0.25, 0.0)];
        let prism = UnfoldingPrism::new(&skewed_cell()).unwrap();
        let folded: Vec<f64> = prism
            .fold_vectors(&caller)
            .iter()
            .flat_map(|v| [v.x, v.y, v.z])
            .collect();
        fixture
            .state
            .lock()
            .unwrap()
            .arrays
            .insert("f".into(), folded);

        let fetched = fixture.session.forces().unwrap();
        for (a, b) in caller.iter().zip(fetched.iter()) {
            assert!((a - b).norm() < 1e-10);
        }
    }

    #[test]
    fn stress_getter_resorts_engine_rows_by_atom_id() {
        let structure = bulk("Fe", CubicLattice::Simple, 3.0, [3, 1, 1]);
        let mut fixture = open_session(structure, UnitSystem::Lj, RunMode::Interactive);
        {
            let mut state = fixture.state.lock().unwrap();
            // Engine storage order holds IDs [3, 1, 2].
            state.ids = vec![3, 1, 2];
            state.computes.insert(
                "st".into(),
                vec![
                    vec![30.0, 0.0, 0.0, 0.0, 0.0, 0.0], // ID 3
                    vec![10.0, 0.0, 0.0, 0.0, 0.0, 0.0], // ID 1
                    vec![20.0, 0.0, 0.0, 0.0, 0.0, 0.0], // ID 2
                ],
            );
        }
        let tensors = fixture.session.stress_per_atom().unwrap();
        assert!((tensors[0][(0, 0)] - 10.0).abs() < 1e-12);
        assert!((tensors[1][(0, 0)] - 20.0).abs() < 1e-12);
        assert!((tensors[2][(0, 0)] - 30.0).abs() < 1e-12);

        // The backing compute is defined exactly once.
        let cmds = commands(&fixture.state);
        assert_eq!(
            cmds.iter()
                .filter(|c| *c == "compute st all stress/atom NULL")
                .count(),
            1
        );
        fixture.session.stress_per_atom().unwrap();
        let cmds = commands(&fixture.state);
        assert_eq!(
            cmds.iter()
                .filter(|c| *c == "compute st all stress/atom NULL")
                .count(),
            1
        );
    }

    #[test]
    fn stress_round_trips_through_a_skewed_cell() {
        let mut structure = two_atom_structure();
        structure.set_cell(skewed_cell());
        let mut fixture = open_session(structure, UnitSystem::Lj, RunMode::Interactive);
        assert!(fixture.session.is_skewed());
        let prism = UnfoldingPrism::new(&skewed_cell()).unwrap();

        #[rustfmt::skip]
        let first = Matrix3::new(
            1.0, 0.2, 0.3,
            0.2, 2.0, 0.1,
            0.3, 0.1, 3.0,
        );
        #[rustfmt::skip]
        let second = Matrix3::new(
            -1.0, 0.4, 0.0,
             0.4, 5.0, 0.2,
             0.0, 0.2, -2.0,
        );
        // The engine reports Voigt rows in its own frame and storage order.
        let voigt_row = |t: &Matrix3<f64>| {
            let folded = prism.fold_tensor(t);
            vec![
                folded[(0, 0)],
                folded[(1, 1)],
                folded[(2, 2)],
                folded[(0, 1)],
                folded[(0, 2)],
                folded[(1, 2)],
            ]
        };
        {
            let mut state = fixture.state.lock().unwrap();
            // Engine storage order holds IDs [2, 1].
            state.ids = vec![2, 1];
            state
                .computes
                .insert("st".into(), vec![voigt_row(&second), voigt_row(&first)]);
        }

        let tensors = fixture.session.stress_per_atom().unwrap();
        assert!((tensors[0] - first).norm() < 1e-10);
        assert!((tensors[1] - second).norm() < 1e-10);
    }

    #[test]
    fn stress_frames_are_collected_on_request() {
        let structure = bulk("Fe", CubicLattice::Simple, 3.0, [1, 1, 1]);
        let mut fixture = open_session(structure, UnitSystem::Lj, RunMode::Interactive);
        fixture.state.lock().unwrap().computes.insert(
            "st".into(),
            vec![vec![1.0, 2.0, 3.0, 0.0, 0.0, 0.0]],
        );
        fixture.session.collect_stress().unwrap();
        fixture.session.close().unwrap();
        match fixture.session.store().get("generic/stresses") {
            Some(crate::engine::store::StoreValue::TensorFrames(frames)) => {
                assert_eq!(frames.len(), 1);
                assert!((frames[0][0][(0, 0)] - 1.0).abs() < 1e-12);
            }
            other => panic!("unexpected store value: {other:?}"),
        }
    }

    #[test]
    fn voigt_rows_expand_to_symmetric_tensors() {
        let structure = bulk("Fe", CubicLattice::Simple, 3.0, [1, 1, 1]);
        let mut fixture = open_session(structure, UnitSystem::Lj, RunMode::Interactive);
        fixture.state.lock().unwrap().computes.insert(
            "st".into(),
            vec![vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]],
        );
        let tensor = fixture.session.stress_per_atom().unwrap()[0];
        #[rustfmt::skip]
        let expected = Matrix3::new(
            1.0, 4.0, 5.0,
            4.0, 2.0, 6.0,
            5.0, 6.0, 3.0,
        );
        assert!((tensor - expected).norm() < 1e-12);
    }

    #[test]
    fn callback_registration_requires_interactive_mode() {
        let mut fixture =
            open_session(two_atom_structure(), UnitSystem::Metal, RunMode::NonModal);
        let result = fixture.session.set_force_callback(
            ForceCallback::Simplified(Box::new(|p, _, _| vec![Vector3::zeros(); p.len()])),
            1,
            1,
        );
        assert!(matches!(
            result,
            Err(EngineError::CallbackOutsideInteractive)
        ));

        let mut fixture =
            open_session(two_atom_structure(), UnitSystem::Metal, RunMode::Interactive);
        fixture
            .session
            .set_force_callback(
                ForceCallback::Simplified(Box::new(|p, _, _| vec![Vector3::zeros(); p.len()])),
                2,
                1,
            )
            .unwrap();
        let cmds = commands(&fixture.state);
        assert!(cmds.contains(&"fix fix_external all external pf/callback 2 1".to_string()));
        assert!(fixture.state.lock().unwrap().callback.is_some());
    }

    #[test]
    fn fetch_before_run_warns_but_proceeds() {
        let mut fixture =
            open_session(two_atom_structure(), UnitSystem::Metal, RunMode::Interactive);
        fixture.session.collect().unwrap();
        let events = fixture.events.lock().unwrap();
        assert!(events.contains(&SessionEvent::FetchBeforeRun));
    }

    #[test]
    fn abnormal_termination_is_a_warning_not_an_error() {
        let mut fixture =
            open_session(two_atom_structure(), UnitSystem::Metal, RunMode::Interactive);
        fixture.state.lock().unwrap().status = RunStatus::Abnormal("lost atoms".into());
        fixture.session.execute_step().unwrap();
        let events = fixture.events.lock().unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            SessionEvent::AbnormalTermination { status } if status == "lost atoms"
        )));
    }

    #[test]
    fn execute_is_rejected_after_close() {
        let mut fixture =
            open_session(two_atom_structure(), UnitSystem::Metal, RunMode::Interactive);
        fixture.session.close().unwrap();
        assert!(matches!(
            fixture.session.execute_step(),
            Err(EngineError::InvalidState { .. })
        ));
    }

    #[test]
    fn static_two_atom_run_round_trips_and_merges_namespaces() {
        let mut fixture =
            open_session(two_atom_structure(), UnitSystem::Metal, RunMode::Interactive);
        fixture.session.calc_md(&MdOptions::default()).unwrap();
        fixture.session.execute_step().unwrap();
        assert_eq!(fixture.session.state(), SessionState::Idle);
        fixture.session.collect().unwrap();
        fixture.session.close().unwrap();
        assert_eq!(fixture.session.state(), SessionState::Closed);
        assert!(fixture.state.lock().unwrap().closed);

        let store = fixture.session.store();
        let interactive = store.list_nodes("interactive");
        let generic = store.list_nodes("generic");
        assert_eq!(interactive, generic);
        assert!(interactive.contains(&"positions".to_string()));

        // Zero-force, zero-velocity static system: positions come back
        // unchanged.
        match store.get("generic/positions") {
            Some(crate::engine::store::StoreValue::VectorFrames(frames)) => {
                assert_eq!(frames.len(), 1);
                let expected = two_atom_structure();
                for (a, b) in frames[0].iter().zip(expected.positions().iter()) {
                    assert!((a - b).norm() < 1e-12);
                }
            }
            other => panic!("unexpected store value: {other:?}"),
        }

        // Closing again is a no-op.
        fixture.session.close().unwrap();
    }

    #[test]
    fn water_bonds_emit_groups_and_bond_commands() {
        let structure = Structure::new(
            vec!["O".into(), "H".into(), "H".into()],
            vec![
                Vector3::new(3.0, 3.0, 3.0),
                Vector3::new(3.96, 3.0, 3.0),
                Vector3::new(3.0, 3.96, 3.0),
            ],
            Matrix3::from_diagonal(&Vector3::new(8.0, 8.0, 8.0)),
            [true; 3],
        )
        .unwrap();
        let potential = Potential {
            name: "water".into(),
            species: vec!["O".into(), "H".into()],
            atom_style: AtomStyle::Full,
            config: vec![
                "pair_style lj/cut/coul/long 10.0".into(),
                "pair_coeff 1 1 0.1553 3.166".into(),
                "kspace_style pppm 1e-5".into(),
            ],
            files: vec![],
        };
        let workdir = tempfile::tempdir().unwrap();
        let config = ServerConfigBuilder::new()
            .working_directory(workdir.path().to_path_buf())
            .build()
            .unwrap();
        let (launcher, state) = FakeLauncher::new();
        let mut session = InteractiveSession::open(
            structure,
            potential,
            config,
            &launcher,
            SessionMonitor::new(),
        )
        .unwrap();
        session.set_water_bonds(true);
        let before = commands(&state).len();
        let structure = session.structure().clone();
        session.set_structure(structure).unwrap();
        let cmds = commands(&state)[before..].to_vec();
        assert!(cmds.iter().any(|c| c.starts_with("create_box 2 1 bond/types 1")));
        assert!(cmds.contains(&"group Oatoms id 1".to_string()));
        assert!(cmds.contains(&"group H1atoms id 2".to_string()));
        assert!(cmds.contains(&"create_bonds many Oatoms H1atoms 1 0.7 1.4".to_string()));
        assert!(cmds.contains(&"create_bonds single/angle 1 2 1 3".to_string()));
        // The real pair style is restored after bond creation.
        let dummy = cmds.iter().position(|c| c == "pair_style lj/cut 2.5").unwrap();
        let real = cmds
            .iter()
            .position(|c| c == "pair_style lj/cut/coul/long 10.0")
            .unwrap();
        assert!(real > dummy);
    }
}
