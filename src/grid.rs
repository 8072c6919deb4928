//! # Busca em Grade sobre Pesos de Recompensa
//!
//! Enumera o produto cartesiano das dimensões (primeira dimensão no laço mais
//! externo) e roda um treino completo por combinação.
//!
//! ## Política de falhas
//!
//! - Erro no treino ou log ilegível: o trial é registrado no log e
//!   **descartado** do resultado
//! - Log ausente: o trial **entra** no resultado com `mean_reward` vazio
//!
//! Ao final o conjunto de resultados é gravado como CSV e o melhor trial é o de
//! maior `mean_reward`, com valores ausentes tratados como −∞.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::ConfigError;
use crate::param_space::{format_weight, Assignment, ParameterDef, ParameterRange, ParameterSpace};
use crate::reward_plan::RewardTemplate;
use crate::trial::{self, TrialOutcome, TrialSettings};
use crate::training::Trainer;

/// Configuração da busca em grade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSweepConfig {
    /// Dimensões, em ordem de aninhamento
    pub dimensions: ParameterSpace,
    pub reward: RewardTemplate,
    pub training: TrialSettings,
    /// Diretório pai dos checkpoints
    pub checkpoint_root: PathBuf,
    /// Prefixo do diretório de checkpoint (`gridsearch_d.._z.._a..`)
    pub checkpoint_prefix: String,
    /// Prefixo do nome do run (`exp_d.._z.._a..`)
    pub run_prefix: String,
    /// Nome do CSV de resultados
    pub results_file: String,
}

impl Default for GridSweepConfig {
    fn default() -> Self {
        Self {
            dimensions: default_grid_space(),
            reward: RewardTemplate::grid_default(),
            training: TrialSettings::grid(),
            checkpoint_root: PathBuf::from("checkpoints"),
            checkpoint_prefix: "gridsearch".to_string(),
            run_prefix: "exp".to_string(),
            results_file: "gridsearch_results.csv".to_string(),
        }
    }
}

/// Espaço padrão: 2 × 2 × 2 combinações
pub fn default_grid_space() -> ParameterSpace {
    ParameterSpace::new()
        .with_parameter(
            ParameterDef::new("damage_interaction_reward", ParameterRange::discrete(vec![0.5, 1.0]))
                .with_label("d"),
        )
        .with_parameter(
            ParameterDef::new("danger_zone_reward", ParameterRange::discrete(vec![0.1, 0.5]))
                .with_label("z"),
        )
        .with_parameter(
            ParameterDef::new("penalize_attack_reward", ParameterRange::discrete(vec![-0.1, -0.04]))
                .with_label("a"),
        )
}

impl GridSweepConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.dimensions.validate()?;
        if let Some(p) = self
            .dimensions
            .parameters
            .iter()
            .find(|p| matches!(p.range, ParameterRange::Continuous { .. }))
        {
            return Err(ConfigError::Invalid(format!(
                "grid dimension '{}' needs a list of values",
                p.name
            )));
        }
        self.reward.check_space(&self.dimensions)?;
        self.training.opponents.validate()?;
        if self.training.train_timesteps == 0 {
            return Err(ConfigError::Invalid("train_timesteps must be positive".to_string()));
        }
        Ok(())
    }

    /// Sufixo com os valores literais: `_d0.5_z0.1_a-0.1`
    fn suffix(&self, assignment: &Assignment) -> String {
        self.dimensions
            .parameters
            .iter()
            .map(|def| {
                let value = assignment.get(&def.name).unwrap_or(f64::NAN);
                format!("_{}{}", def.tag(), format_weight(value))
            })
            .collect()
    }

    pub fn checkpoint_path(&self, assignment: &Assignment) -> PathBuf {
        self.checkpoint_root
            .join(format!("{}{}", self.checkpoint_prefix, self.suffix(assignment)))
    }

    pub fn run_name(&self, assignment: &Assignment) -> String {
        format!("{}{}", self.run_prefix, self.suffix(assignment))
    }
}

/// Combinação planejada (antes de treinar)
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedTrial {
    pub assignment: Assignment,
    pub checkpoint: PathBuf,
    pub run_name: String,
}

/// Trial concluído
#[derive(Debug, Clone, PartialEq)]
pub struct SweepTrial {
    pub assignment: Assignment,
    /// `None` quando o treino terminou sem log
    pub mean_reward: Option<f64>,
    pub checkpoint: PathBuf,
    pub run_name: String,
}

impl SweepTrial {
    /// Score para comparação: ausente vira −∞
    pub fn ranking_score(&self) -> f64 {
        self.mean_reward.unwrap_or(f64::NEG_INFINITY)
    }
}

/// Trials concluídos, na ordem de execução
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SweepResultSet {
    /// Nomes das dimensões (colunas do CSV)
    pub dimensions: Vec<String>,
    pub trials: Vec<SweepTrial>,
    /// Combinações tentadas, incluindo as descartadas por falha
    pub attempted: usize,
}

impl SweepResultSet {
    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    /// Trials descartados por erro de treino ou log ilegível
    pub fn failed(&self) -> usize {
        self.attempted - self.trials.len()
    }

    /// Melhor trial; em empate (inclusive todos ausentes) vence o primeiro.
    /// `None` só quando nenhum trial foi registrado.
    pub fn best_trial(&self) -> Option<&SweepTrial> {
        let mut best: Option<&SweepTrial> = None;
        for trial in &self.trials {
            match best {
                Some(b) if trial.ranking_score() <= b.ranking_score() => {}
                _ => best = Some(trial),
            }
        }
        best
    }

    /// Grava a tabela plana: dimensões, `mean_reward`, `checkpoint`
    pub fn write_csv(&self, path: &Path) -> Result<(), csv::Error> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;

        let mut header: Vec<&str> = self.dimensions.iter().map(String::as_str).collect();
        header.push("mean_reward");
        header.push("checkpoint");
        writer.write_record(&header)?;

        for trial in &self.trials {
            let mut row: Vec<String> = self
                .dimensions
                .iter()
                .map(|name| trial.assignment.get(name).map(format_weight).unwrap_or_default())
                .collect();
            row.push(trial.mean_reward.map(format_weight).unwrap_or_default());
            row.push(trial.checkpoint.display().to_string());
            writer.write_record(&row)?;
        }

        writer.flush()?;
        Ok(())
    }
}

/// Driver da busca em grade
pub struct GridSweep {
    config: GridSweepConfig,
}

impl GridSweep {
    pub fn new(config: GridSweepConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GridSweepConfig {
        &self.config
    }

    /// Todas as combinações na ordem em que serão treinadas
    pub fn plan(&self) -> Vec<PlannedTrial> {
        self.config
            .dimensions
            .generate_grid()
            .into_iter()
            .map(|assignment| PlannedTrial {
                checkpoint: self.config.checkpoint_path(&assignment),
                run_name: self.config.run_name(&assignment),
                assignment,
            })
            .collect()
    }

    /// Executa todas as combinações em sequência
    pub fn run<T: Trainer + ?Sized>(&self, trainer: &mut T) -> SweepResultSet {
        let planned = self.plan();
        let total = planned.len();
        let start = Instant::now();

        info!(
            trials = total,
            timesteps = self.config.training.train_timesteps,
            "starting grid sweep"
        );

        let mut results = SweepResultSet {
            dimensions: self.config.dimensions.names().map(String::from).collect(),
            trials: Vec::with_capacity(total),
            attempted: 0,
        };

        for (i, entry) in planned.into_iter().enumerate() {
            results.attempted += 1;
            info!("[{}/{}] Training with {}", i + 1, total, entry.assignment);

            let reward = match self.config.reward.instantiate(&entry.assignment) {
                Ok(plan) => plan,
                Err(e) => {
                    error!("Failed for {}: {}", entry.assignment, e);
                    continue;
                }
            };
            let request =
                self.config
                    .training
                    .request(reward, entry.checkpoint.clone(), entry.run_name.clone());

            let outcome = trial::execute(trainer, &request);
            let mean_reward = match outcome {
                TrialOutcome::TrainingFailed(e) => {
                    error!("Failed for {}: {}", entry.assignment, e);
                    continue;
                }
                TrialOutcome::LogUnreadable(e) => {
                    error!("Failed for {}: {}", entry.assignment, e);
                    continue;
                }
                TrialOutcome::Scored(mean) => {
                    info!("    └─ mean_reward={:.4} | {}", mean, entry.checkpoint.display());
                    Some(mean)
                }
                TrialOutcome::LogMissing => {
                    info!("    └─ no monitor log | {}", entry.checkpoint.display());
                    None
                }
            };

            results.trials.push(SweepTrial {
                assignment: entry.assignment,
                mean_reward,
                checkpoint: entry.checkpoint,
                run_name: entry.run_name,
            });
        }

        info!(
            completed = results.len(),
            failed = results.failed(),
            elapsed = ?start.elapsed(),
            "grid sweep finished"
        );

        results
    }
}

// =============================================================================
// TESTES
// =============================================================================
