use std::path::PathBuf;

use thiserror::Error;

use super::handle::LaunchSpec;
use crate::core::units::UnitSystem;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
}

/// How the session talks to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Blocking request/response against a live engine handle.
    #[default]
    Interactive,
    /// Fire-and-fetch-later variant; steps are issued without waiting for
    /// the fetch, and the caller pairs `execute_step`/`collect` manually.
    NonModal,
}

/// Server-side settings of one interactive session.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub run_mode: RunMode,
    pub cores: usize,
    pub working_directory: PathBuf,
    /// Engine log location; defaults to `log.lammps` inside the working
    /// directory for in-process runs.
    pub log_file: Option<PathBuf>,
    pub units: UnitSystem,
}

impl ServerConfig {
    /// The launch branch: single-core interactive runs get an in-memory
    /// library instance, everything else a distributed handle.
    pub fn launch_spec(&self) -> LaunchSpec {
        if self.run_mode == RunMode::Interactive && self.cores == 1 {
            LaunchSpec::InProcess {
                log_file: self
                    .log_file
                    .clone()
                    .unwrap_or_else(|| self.working_directory.join("log.lammps")),
            }
        } else {
            LaunchSpec::Distributed {
                cores: self.cores,
                working_directory: self.working_directory.clone(),
            }
        }
    }
}

#[derive(Default)]
pub struct ServerConfigBuilder {
    run_mode: Option<RunMode>,
    cores: Option<usize>,
    working_directory: Option<PathBuf>,
    log_file: Option<PathBuf>,
    units: Option<UnitSystem>,
}

impl ServerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run_mode(mut self, mode: RunMode) -> Self {
        self.run_mode = Some(mode);
        self
    }

    pub fn cores(mut self, cores: usize) -> Self {
        self.cores = Some(cores);
        self
    }

    pub fn working_directory(mut self, path: PathBuf) -> Self {
        self.working_directory = Some(path);
        self
    }

    pub fn log_file(mut self, path: PathBuf) -> Self {
        self.log_file = Some(path);
        self
    }

    pub fn units(mut self, units: UnitSystem) -> Self {
        self.units = Some(units);
        self
    }

    pub fn build(self) -> Result<ServerConfig, ConfigError> {
        Ok(ServerConfig {
            run_mode: self.run_mode.unwrap_or_default(),
            cores: self.cores.unwrap_or(1),
            working_directory: self
                .working_directory
                .ok_or(ConfigError::MissingParameter("working_directory"))?,
            log_file: self.log_file,
            units: self.units.unwrap_or_default(),
        })
    }
}
