//! # Interface com o Treino Externo
//!
//! O laço de treino, o agente e o ambiente vivem fora deste crate. Aqui fica
//! só o contrato: o que é entregue ao ponto de entrada de treino
//! (`TrainingRequest`) e o trait que o executa (`Trainer`).
//!
//! ## Implementações
//!
//! - `CommandTrainer`: grava o request como JSON no diretório do checkpoint e
//!   executa um programa externo passando o caminho do arquivo
//! - `DryRunTrainer`: só registra o request (nenhum log é produzido)

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ConfigError, TrainingError};
use crate::monitor::MONITOR_FILE;
use crate::reward_plan::RewardPlan;

/// Nome do arquivo de request gravado por `CommandTrainer`
pub const REQUEST_FILE: &str = "training_request.json";

/// Verbosidade de logging durante o treino
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainLogging {
    /// Sem logs intermediários (máximo throughput)
    None,
    /// Apenas arquivos de log
    ToFile,
    /// Logs + gráficos de progresso
    Plot,
}

/// Resolução da câmera do ambiente
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraResolution {
    #[default]
    Low,
    Medium,
    High,
}

/// Modo do save handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveHandlerMode {
    /// Sobrescreve o que existir em `save_path`
    #[default]
    Force,
    /// Continua a partir do último checkpoint em `save_path`
    Resume,
}

/// Arquitetura do agente
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    #[default]
    RecurrentPpo,
}

/// Configuração do save handler de um trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveHandlerConfig {
    /// Salva a cada N timesteps
    pub save_freq: u64,
    pub save_path: PathBuf,
    pub run_name: String,
    pub mode: SaveHandlerMode,
}

/// Oponentes e suas probabilidades de seleção
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpponentsCfg {
    pub opponents: BTreeMap<String, f64>,
}

impl OpponentsCfg {
    /// Um único tipo de oponente com peso 1.0
    pub fn single(name: &str) -> Self {
        let mut opponents = BTreeMap::new();
        opponents.insert(name.to_string(), 1.0);
        Self { opponents }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.opponents.is_empty() {
            return Err(ConfigError::Invalid("no opponents configured".to_string()));
        }
        for (name, p) in &self.opponents {
            if !p.is_finite() || *p < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "opponent '{}' has invalid probability {}",
                    name, p
                )));
            }
        }
        if self.opponents.values().sum::<f64>() <= 0.0 {
            return Err(ConfigError::Invalid("opponent probabilities sum to zero".to_string()));
        }
        Ok(())
    }
}

impl Default for OpponentsCfg {
    fn default() -> Self {
        Self::single("based_agent")
    }
}

/// Tudo que o ponto de entrada de treino recebe para um trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRequest {
    pub agent: AgentKind,
    pub reward: RewardPlan,
    pub save_handler: SaveHandlerConfig,
    pub opponents: OpponentsCfg,
    pub resolution: CameraResolution,
    pub train_timesteps: u64,
    pub train_logging: TrainLogging,
}

impl TrainingRequest {
    pub fn checkpoint_dir(&self) -> &Path {
        &self.save_handler.save_path
    }

    /// Onde o treino deixa o log por episódio
    pub fn monitor_path(&self) -> PathBuf {
        self.save_handler.save_path.join(MONITOR_FILE)
    }
}

/// Ponto de entrada de treino.
///
/// Bloqueia até o fim do treino. Sucesso não garante que o log exista.
pub trait Trainer {
    fn train(&mut self, request: &TrainingRequest) -> Result<(), TrainingError>;
}

impl<T: Trainer + ?Sized> Trainer for &mut T {
    fn train(&mut self, request: &TrainingRequest) -> Result<(), TrainingError> {
        (**self).train(request)
    }
}

impl<T: Trainer + ?Sized> Trainer for Box<T> {
    fn train(&mut self, request: &TrainingRequest) -> Result<(), TrainingError> {
        (**self).train(request)
    }
}

/// Executa um programa de treino externo por trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandTrainer {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandTrainer {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    fn write_request(&self, request: &TrainingRequest) -> Result<PathBuf, TrainingError> {
        let dir = request.checkpoint_dir();
        fs::create_dir_all(dir).map_err(|source| TrainingError::Checkpoint {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = dir.join(REQUEST_FILE);
        let body = serde_json::to_string_pretty(request)?;
        fs::write(&path, body).map_err(|source| TrainingError::Checkpoint {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

impl Default for CommandTrainer {
    fn default() -> Self {
        Self::new("python").with_args(["train_agent.py"])
    }
}

impl Trainer for CommandTrainer {
    fn train(&mut self, request: &TrainingRequest) -> Result<(), TrainingError> {
        let request_path = self.write_request(request)?;
        debug!(
            program = %self.program,
            request = %request_path.display(),
            "launching trainer"
        );

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(&request_path)
            .status()
            .map_err(|source| TrainingError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(TrainingError::ExitStatus(status))
        }
    }
}

/// Não treina nada; útil para conferir o plano de um sweep
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunTrainer;

impl Trainer for DryRunTrainer {
    fn train(&mut self, request: &TrainingRequest) -> Result<(), TrainingError> {
        info!(
            run = %request.save_handler.run_name,
            checkpoint = %request.checkpoint_dir().display(),
            timesteps = request.train_timesteps,
            "dry run: skipping training"
        );
        Ok(())
    }
}

// =============================================================================
// TESTES
// =============================================================================
