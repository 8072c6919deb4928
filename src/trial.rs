//! # Execução de um Trial
//!
//! Passos comuns às duas variantes de sweep:
//! 1. Monta o `TrainingRequest` (plano de recompensa, save handler, oponentes)
//! 2. Chama o ponto de entrada de treino
//! 3. Lê `monitor.csv` e calcula a recompensa média por episódio
//!
//! O resultado é um `TrialOutcome` explícito; cada variante decide como
//! transformá-lo em score.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{MonitorError, TrainingError};
use crate::monitor::mean_episode_reward;
use crate::reward_plan::RewardPlan;
use crate::training::{
    AgentKind, CameraResolution, OpponentsCfg, SaveHandlerConfig, SaveHandlerMode, TrainLogging,
    Trainer, TrainingRequest,
};

/// Parâmetros de treino fixos por sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialSettings {
    pub agent: AgentKind,
    pub train_timesteps: u64,
    pub save_freq: u64,
    pub save_mode: SaveHandlerMode,
    pub train_logging: TrainLogging,
    pub resolution: CameraResolution,
    pub opponents: OpponentsCfg,
}

impl TrialSettings {
    /// Treino curto com gráficos (busca em grade)
    pub fn grid() -> Self {
        Self {
            agent: AgentKind::RecurrentPpo,
            train_timesteps: 2_000,
            save_freq: 1_000,
            save_mode: SaveHandlerMode::Force,
            train_logging: TrainLogging::Plot,
            resolution: CameraResolution::Low,
            opponents: OpponentsCfg::single("based_agent"),
        }
    }

    /// Treino longo sem logging intermediário (busca guiada)
    pub fn guided() -> Self {
        Self {
            train_timesteps: 100_000,
            save_freq: 10_000,
            train_logging: TrainLogging::None,
            ..Self::grid()
        }
    }

    pub fn request(&self, reward: RewardPlan, save_path: PathBuf, run_name: String) -> TrainingRequest {
        TrainingRequest {
            agent: self.agent,
            reward,
            save_handler: SaveHandlerConfig {
                save_freq: self.save_freq,
                save_path,
                run_name,
                mode: self.save_mode,
            },
            opponents: self.opponents.clone(),
            resolution: self.resolution,
            train_timesteps: self.train_timesteps,
            train_logging: self.train_logging,
        }
    }
}

impl Default for TrialSettings {
    fn default() -> Self {
        Self::grid()
    }
}

/// Resultado de um trial antes de virar score
#[derive(Debug)]
pub enum TrialOutcome {
    /// Treino terminou e o log tem episódios
    Scored(f64),
    /// Treino terminou sem log, ou o log não tem episódios
    LogMissing,
    /// O log existe mas não pôde ser interpretado
    LogUnreadable(MonitorError),
    /// A chamada de treino falhou
    TrainingFailed(TrainingError),
}

impl TrialOutcome {
    pub fn score(&self) -> Option<f64> {
        match self {
            Self::Scored(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_training_failure(&self) -> bool {
        matches!(self, Self::TrainingFailed(_))
    }

    /// Falhas que tiram o trial da busca em grade
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::TrainingFailed(_) | Self::LogUnreadable(_))
    }

    /// Colapsa todas as falhas num único score sentinela
    pub fn objective_score(&self, failure_score: f64) -> f64 {
        self.score().unwrap_or(failure_score)
    }
}

impl fmt::Display for TrialOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scored(v) => write!(f, "mean_reward={:.2}", v),
            Self::LogMissing => f.write_str("log file not found"),
            Self::LogUnreadable(e) => write!(f, "{}", e),
            Self::TrainingFailed(e) => write!(f, "{}", e),
        }
    }
}

/// Treina e pontua um trial
pub fn execute<T: Trainer + ?Sized>(trainer: &mut T, request: &TrainingRequest) -> TrialOutcome {
    if let Err(e) = trainer.train(request) {
        return TrialOutcome::TrainingFailed(e);
    }
    score_from_log(&request.monitor_path())
}

/// Score a partir do log.
///
/// Log ausente ou sem episódios vira `LogMissing`; log ilegível vira
/// `LogUnreadable`.
pub fn score_from_log(path: &Path) -> TrialOutcome {
    if !path.exists() {
        return TrialOutcome::LogMissing;
    }

    match mean_episode_reward(path) {
        Ok(Some(mean)) => TrialOutcome::Scored(mean),
        Ok(None) => {
            warn!(log = %path.display(), "monitor log has no episodes");
            TrialOutcome::LogMissing
        }
        Err(e) => {
            warn!(error = %e, "could not read monitor log");
            TrialOutcome::LogUnreadable(e)
        }
    }
}
