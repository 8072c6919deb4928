//! Configuração de um sweep lida de arquivo JSON.
//!
//! Todos os campos têm default, então `{}` é uma configuração válida e
//! reproduz os dois sweeps padrão.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::grid::GridSweepConfig;
use crate::guided::GuidedSweepConfig;
use crate::training::CommandTrainer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Diretório dos artefatos do sweep (CSVs de resultado)
    pub output_dir: PathBuf,
    /// Programa de treino chamado a cada trial
    pub trainer: CommandTrainer,
    pub grid: GridSweepConfig,
    pub guided: GuidedSweepConfig,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            trainer: CommandTrainer::default(),
            grid: GridSweepConfig::default(),
            guided: GuidedSweepConfig::default(),
        }
    }
}

impl SweepConfig {
    /// Lê e valida
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trainer.program.trim().is_empty() {
            return Err(ConfigError::Invalid("trainer.program is empty".to_string()));
        }
        self.grid.validate()?;
        self.guided.validate()
    }

    pub fn grid_results_path(&self) -> PathBuf {
        self.output_dir.join(&self.grid.results_file)
    }

    pub fn guided_trials_path(&self) -> PathBuf {
        self.output_dir.join(&self.guided.trials_file)
    }
}
