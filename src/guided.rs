//! # Busca Guiada sobre Pesos de Recompensa
//!
//! Função objetivo chamada pelo serviço de sugestão: a cada trial sugere os
//! quatro pesos, treina e devolve a recompensa média por episódio.
//!
//! Checkpoints são nomeados pelo índice do trial (`optuna_trial_{n}`), não
//! pelos valores. Falha no treino, log ausente e log ilegível devolvem o
//! mesmo score sentinela (`FAILURE_SCORE`).

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{ConfigError, TrainingError};
use crate::param_space::{Assignment, ParameterDef, ParameterRange, ParameterSpace};
use crate::reward_plan::RewardTemplate;
use crate::study::{Objective, SamplerKind, Study, StudyDirection, TrialHandle};
use crate::trial::{execute, TrialOutcome, TrialSettings};
use crate::training::Trainer;

/// Score devolvido ao serviço quando o trial não produz resultado
pub const FAILURE_SCORE: f64 = -999.0;

/// Configuração da busca guiada
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidedSweepConfig {
    /// Intervalos contínuos, na ordem em que são sugeridos
    pub dimensions: ParameterSpace,
    pub reward: RewardTemplate,
    pub training: TrialSettings,
    pub checkpoint_root: PathBuf,
    /// Prefixo do checkpoint e do run (`{prefix}_{n}`)
    pub trial_prefix: String,
    pub failure_score: f64,
    pub study_name: String,
    pub n_trials: usize,
    pub seed: u64,
    pub sampler: SamplerKind,
    /// Nome do CSV com todos os trials do estudo
    pub trials_file: String,
}

impl Default for GuidedSweepConfig {
    fn default() -> Self {
        Self {
            dimensions: default_guided_space(),
            reward: RewardTemplate::guided_default(),
            training: TrialSettings::guided(),
            checkpoint_root: PathBuf::from("checkpoints"),
            trial_prefix: "optuna_trial".to_string(),
            failure_score: FAILURE_SCORE,
            study_name: "reward_weights".to_string(),
            n_trials: 50,
            seed: 42,
            sampler: SamplerKind::Bayesian,
            trials_file: "study_trials.csv".to_string(),
        }
    }
}

/// Intervalos padrão dos quatro pesos
pub fn default_guided_space() -> ParameterSpace {
    ParameterSpace::new()
        .with_parameter(ParameterDef::new(
            "damage_interaction_reward",
            ParameterRange::continuous(0.5, 2.0),
        ))
        .with_parameter(ParameterDef::new(
            "danger_zone_reward",
            ParameterRange::continuous(0.05, 0.5),
        ))
        .with_parameter(ParameterDef::new(
            "penalize_attack_reward",
            ParameterRange::continuous(-0.15, -0.02),
        ))
        .with_parameter(ParameterDef::new(
            "holding_more_than_3_keys",
            ParameterRange::continuous(-0.5, 0.5),
        ))
}

impl GuidedSweepConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.dimensions.validate()?;
        if let Some(p) = self
            .dimensions
            .parameters
            .iter()
            .find(|p| matches!(p.range, ParameterRange::Discrete { .. }))
        {
            return Err(ConfigError::Invalid(format!(
                "guided dimension '{}' needs low/high bounds",
                p.name
            )));
        }
        self.reward.check_space(&self.dimensions)?;
        self.training.opponents.validate()?;
        if !self.failure_score.is_finite() {
            return Err(ConfigError::Invalid("failure_score must be finite".to_string()));
        }
        if self.training.train_timesteps == 0 {
            return Err(ConfigError::Invalid("train_timesteps must be positive".to_string()));
        }
        Ok(())
    }

    pub fn checkpoint_path(&self, trial_number: usize) -> PathBuf {
        self.checkpoint_root.join(self.run_name(trial_number))
    }

    pub fn run_name(&self, trial_number: usize) -> String {
        format!("{}_{}", self.trial_prefix, trial_number)
    }
}

/// Registro de um trial avaliado pelo objetivo
#[derive(Debug, Clone, PartialEq)]
pub struct GuidedTrialRecord {
    pub number: usize,
    pub assignment: Assignment,
    pub checkpoint: PathBuf,
    /// Score devolvido ao serviço (sentinela em caso de falha)
    pub score: f64,
    /// `false` quando o score é o sentinela
    pub succeeded: bool,
}

/// Objetivo da busca guiada
pub struct GuidedObjective<'t, T: Trainer + ?Sized> {
    config: GuidedSweepConfig,
    trainer: &'t mut T,
    records: Vec<GuidedTrialRecord>,
}

impl<'t, T: Trainer + ?Sized> GuidedObjective<'t, T> {
    pub fn new(config: GuidedSweepConfig, trainer: &'t mut T) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            trainer,
            records: Vec::new(),
        })
    }

    pub fn config(&self) -> &GuidedSweepConfig {
        &self.config
    }

    pub fn records(&self) -> &[GuidedTrialRecord] {
        &self.records
    }

    /// Executa um trial e devolve o resultado explícito (sem colapsar falhas)
    pub fn run_trial(&mut self, trial: &mut dyn TrialHandle) -> (Assignment, TrialOutcome) {
        let number = trial.number();
        let mut assignment = Assignment::new();

        for def in &self.config.dimensions.parameters {
            let (low, high) = match def.range {
                ParameterRange::Continuous { low, high } => (low, high),
                ParameterRange::Discrete { .. } => continue,
            };
            match trial.suggest_float(&def.name, low, high) {
                Ok(value) => assignment.push(&def.name, value),
                Err(e) => {
                    let reason = TrainingError::Aborted(e.to_string());
                    return (assignment, TrialOutcome::TrainingFailed(reason));
                }
            }
        }

        let reward = match self.config.reward.instantiate(&assignment) {
            Ok(plan) => plan,
            Err(e) => {
                let reason = TrainingError::Aborted(e.to_string());
                return (assignment, TrialOutcome::TrainingFailed(reason));
            }
        };

        let save_path = self.config.checkpoint_path(number);
        if let Err(source) = fs::create_dir_all(&save_path) {
            let reason = TrainingError::Checkpoint {
                path: save_path,
                source,
            };
            return (assignment, TrialOutcome::TrainingFailed(reason));
        }

        info!("Trial {}: training with {}", number, assignment);
        let request = self
            .config
            .training
            .request(reward, save_path, self.config.run_name(number));

        let outcome = execute(&mut *self.trainer, &request);
        (assignment, outcome)
    }
}

impl<T: Trainer + ?Sized> Objective for GuidedObjective<'_, T> {
    fn evaluate(&mut self, trial: &mut dyn TrialHandle) -> f64 {
        let number = trial.number();
        let (assignment, outcome) = self.run_trial(trial);

        match &outcome {
            TrialOutcome::Scored(mean) => info!("Trial {}: mean_reward={:.2}", number, mean),
            TrialOutcome::LogMissing => error!("Trial {} failed: log file not found.", number),
            TrialOutcome::TrainingFailed(e) => error!("Trial {} failed: {}", number, e),
            TrialOutcome::LogUnreadable(e) => error!("Trial {} failed: {}", number, e),
        }

        let score = outcome.objective_score(self.config.failure_score);
        self.records.push(GuidedTrialRecord {
            number,
            assignment,
            checkpoint: self.config.checkpoint_path(number),
            score,
            succeeded: outcome.score().is_some(),
        });
        score
    }
}

/// Resumo de uma busca guiada
#[derive(Debug)]
pub struct GuidedSweepReport {
    pub study: Study,
    pub records: Vec<GuidedTrialRecord>,
}

impl GuidedSweepReport {
    /// Melhor registro segundo o estudo
    pub fn best_record(&self) -> Option<&GuidedTrialRecord> {
        let best = self.study.best_trial()?;
        self.records.iter().find(|r| r.number == best.number)
    }
}

/// Cria o estudo configurado e roda `n_trials` trials
pub fn run_guided_sweep<T: Trainer + ?Sized>(
    config: GuidedSweepConfig,
    trainer: &mut T,
) -> Result<GuidedSweepReport, ConfigError> {
    let mut study = Study::new(
        &config.study_name,
        StudyDirection::Maximize,
        config.sampler.build(config.seed),
    );
    let n_trials = config.n_trials;

    info!(
        study = %config.study_name,
        sampler = study.sampler_name(),
        trials = n_trials,
        timesteps = config.training.train_timesteps,
        "starting guided sweep"
    );

    let mut objective = GuidedObjective::new(config, trainer)?;
    study.optimize(n_trials, &mut objective);

    Ok(GuidedSweepReport {
        records: objective.records,
        study,
    })
}
