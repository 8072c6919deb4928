//! # Serviço de Sugestão de Trials
//!
//! Estudo sequencial no estilo "ask/tell": para cada trial o objetivo recebe um
//! `TrialHandle`, pede valores com `suggest_float` e devolve um score.
//!
//! Estratégias de amostragem:
//! - `RandomSampler`: amostragem uniforme em [low, high]
//! - `BayesianSampler`: fase inicial aleatória, depois UCB sobre um surrogate
//!   de kernel RBF, independente por parâmetro
//!
//! O algoritmo de otimização não faz parte do contrato dos drivers: qualquer
//! serviço que implemente `TrialHandle` serve.

use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::StudyError;
use crate::param_space::{format_weight, Assignment};

/// Direção da otimização
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyDirection {
    /// Maximizar (padrão para reward/score)
    #[default]
    Maximize,
    /// Minimizar (para loss/error)
    Minimize,
}

impl StudyDirection {
    /// Score orientado para "maior é melhor"
    fn oriented(&self, value: f64) -> f64 {
        match self {
            Self::Maximize => value,
            Self::Minimize => -value,
        }
    }
}

/// Estado final de um trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialState {
    Complete,
    /// O objetivo devolveu valor não finito
    Failed,
}

/// Trial já avaliado
#[derive(Debug, Clone, PartialEq)]
pub struct FrozenTrial {
    pub number: usize,
    pub params: Assignment,
    pub value: Option<f64>,
    pub state: TrialState,
    pub duration: Duration,
}

/// Handle entregue ao objetivo a cada trial
pub trait TrialHandle {
    /// Índice sequencial do trial no estudo (0, 1, 2, ...)
    fn number(&self) -> usize;

    /// Valor contínuo em [low, high]
    fn suggest_float(&mut self, name: &str, low: f64, high: f64) -> Result<f64, StudyError>;
}

/// Função objetivo avaliada pelo estudo
pub trait Objective {
    fn evaluate(&mut self, trial: &mut dyn TrialHandle) -> f64;
}

impl<F> Objective for F
where
    F: FnMut(&mut dyn TrialHandle) -> f64,
{
    fn evaluate(&mut self, trial: &mut dyn TrialHandle) -> f64 {
        self(trial)
    }
}

/// Estratégia de amostragem
pub trait Sampler {
    /// Propõe um valor para `name` em [low, high] dado o histórico
    fn sample(
        &mut self,
        history: &[FrozenTrial],
        direction: StudyDirection,
        name: &str,
        low: f64,
        high: f64,
    ) -> f64;

    /// Nome da estratégia
    fn name(&self) -> &str;
}

// =============================================================================
// RANDOM SAMPLER
// =============================================================================

/// Amostragem uniforme
pub struct RandomSampler {
    rng: StdRng,
}

impl RandomSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Sampler for RandomSampler {
    fn sample(&mut self, _: &[FrozenTrial], _: StudyDirection, _: &str, low: f64, high: f64) -> f64 {
        if low >= high {
            return low;
        }
        self.rng.gen_range(low..=high)
    }

    fn name(&self) -> &str {
        "RandomSampler"
    }
}

// =============================================================================
// BAYESIAN SAMPLER
// =============================================================================

/// Surrogate de kernel RBF com aquisição UCB, um parâmetro por vez
pub struct BayesianSampler {
    rng: StdRng,
    /// Trials aleatórios antes de usar o surrogate
    n_startup_trials: usize,
    /// Fator de exploração (kappa no UCB)
    exploration_factor: f64,
    /// Candidatos avaliados pela aquisição
    acquisition_samples: usize,
    length_scale: f64,
}

impl BayesianSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            n_startup_trials: 10,
            exploration_factor: 2.0,
            acquisition_samples: 256,
            length_scale: 0.2,
        }
    }

    pub fn with_startup_trials(mut self, n: usize) -> Self {
        self.n_startup_trials = n;
        self
    }

    pub fn with_exploration(mut self, kappa: f64) -> Self {
        self.exploration_factor = kappa;
        self
    }

    /// Predição (média, variância) em `x` a partir das observações
    /// normalizadas `(x, score)`.
    fn predict(&self, x: f64, observations: &[(f64, f64)]) -> (f64, f64) {
        let weights: Vec<f64> = observations
            .iter()
            .map(|(xi, _)| (-(x - xi).powi(2) / (2.0 * self.length_scale.powi(2))).exp())
            .collect();
        let total: f64 = weights.iter().sum();

        if total < 1e-10 {
            return (0.0, 1.0);
        }

        let mean = weights
            .iter()
            .zip(observations)
            .map(|(w, (_, score))| w * score)
            .sum::<f64>()
            / total;

        // distância ao ponto observado mais próximo como proxy da incerteza
        let nearest = weights.iter().fold(0.0f64, |a, &b| a.max(b));
        (mean, (1.0 - nearest).max(0.01))
    }

    fn ucb(&self, x: f64, observations: &[(f64, f64)]) -> f64 {
        let (mean, variance) = self.predict(x, observations);
        mean + self.exploration_factor * variance.sqrt()
    }
}

impl Sampler for BayesianSampler {
    fn sample(
        &mut self,
        history: &[FrozenTrial],
        direction: StudyDirection,
        name: &str,
        low: f64,
        high: f64,
    ) -> f64 {
        if low >= high {
            return low;
        }

        let span = high - low;
        let mut observations: Vec<(f64, f64)> = history
            .iter()
            .filter(|t| t.state == TrialState::Complete)
            .filter_map(|t| {
                let x = t.params.get(name)?;
                let value = t.value?;
                Some((((x - low) / span).clamp(0.0, 1.0), direction.oriented(value)))
            })
            .collect();

        if observations.len() < self.n_startup_trials.max(1) {
            return self.rng.gen_range(low..=high);
        }

        // scores padronizados para o kappa ter escala comparável
        let n = observations.len() as f64;
        let mean = observations.iter().map(|(_, s)| s).sum::<f64>() / n;
        let std = (observations.iter().map(|(_, s)| (s - mean).powi(2)).sum::<f64>() / n).sqrt();
        let std = if std < 1e-12 { 1.0 } else { std };
        for obs in &mut observations {
            obs.1 = (obs.1 - mean) / std;
        }

        let incumbent = observations
            .iter()
            .fold((0.5, f64::NEG_INFINITY), |best, &(x, s)| if s > best.1 { (x, s) } else { best })
            .0;
        let local = Normal::new(incumbent, 0.1).ok();

        let mut best_x = incumbent;
        let mut best_acq = self.ucb(best_x, &observations);

        for i in 0..self.acquisition_samples {
            // metade global, metade perturbações ao redor do melhor
            let x = match (&local, i % 2) {
                (Some(normal), 1) => normal.sample(&mut self.rng).clamp(0.0, 1.0),
                _ => self.rng.gen::<f64>(),
            };
            let acq = self.ucb(x, &observations);
            if acq > best_acq {
                best_acq = acq;
                best_x = x;
            }
        }

        low + best_x * span
    }

    fn name(&self) -> &str {
        "BayesianSampler"
    }
}

/// Escolha de sampler via configuração/CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplerKind {
    Random,
    #[default]
    Bayesian,
}

impl SamplerKind {
    pub fn build(&self, seed: u64) -> Box<dyn Sampler> {
        match self {
            Self::Random => Box::new(RandomSampler::new(seed)),
            Self::Bayesian => Box::new(BayesianSampler::new(seed)),
        }
    }
}

// =============================================================================
// STUDY
// =============================================================================

/// Trial em andamento
struct ActiveTrial<'a> {
    number: usize,
    params: Assignment,
    sampler: &'a mut dyn Sampler,
    history: &'a [FrozenTrial],
    direction: StudyDirection,
}

impl TrialHandle for ActiveTrial<'_> {
    fn number(&self) -> usize {
        self.number
    }

    fn suggest_float(&mut self, name: &str, low: f64, high: f64) -> Result<f64, StudyError> {
        if !low.is_finite() || !high.is_finite() || low > high {
            return Err(StudyError::InvalidBounds {
                name: name.to_string(),
                low,
                high,
            });
        }
        // o mesmo nome no mesmo trial devolve o valor já sugerido
        if let Some(v) = self.params.get(name) {
            return Ok(v);
        }

        let value = self
            .sampler
            .sample(self.history, self.direction, name, low, high)
            .clamp(low, high);
        self.params.push(name, value);
        Ok(value)
    }
}

/// Estudo sequencial
pub struct Study {
    name: String,
    direction: StudyDirection,
    sampler: Box<dyn Sampler>,
    trials: Vec<FrozenTrial>,
}

impl fmt::Debug for Study {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Study")
            .field("name", &self.name)
            .field("direction", &self.direction)
            .field("sampler", &self.sampler.name())
            .field("trials", &self.trials.len())
            .finish()
    }
}

impl Study {
    pub fn new(name: &str, direction: StudyDirection, sampler: Box<dyn Sampler>) -> Self {
        Self {
            name: name.to_string(),
            direction,
            sampler,
            trials: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> StudyDirection {
        self.direction
    }

    pub fn sampler_name(&self) -> &str {
        self.sampler.name()
    }

    pub fn trials(&self) -> &[FrozenTrial] {
        &self.trials
    }

    /// Avalia `n_trials` novos trials em sequência
    pub fn optimize<O: Objective + ?Sized>(&mut self, n_trials: usize, objective: &mut O) {
        for _ in 0..n_trials {
            let number = self.trials.len();
            let started = Instant::now();

            let mut handle = ActiveTrial {
                number,
                params: Assignment::new(),
                sampler: self.sampler.as_mut(),
                history: &self.trials,
                direction: self.direction,
            };
            let value = objective.evaluate(&mut handle);
            let params = handle.params;

            let (value, state) = if value.is_finite() {
                (Some(value), TrialState::Complete)
            } else {
                warn!(trial = number, value, "objective returned a non-finite value");
                (None, TrialState::Failed)
            };

            let trial = FrozenTrial {
                number,
                params,
                value,
                state,
                duration: started.elapsed(),
            };

            self.trials.push(trial);

            if let Some(line) = self.progress_line(number) {
                info!("{}", line);
            }
        }
    }

    /// Resumo de um trial já registrado, com o melhor até ele inclusive
    fn progress_line(&self, number: usize) -> Option<String> {
        let position = self.trials.iter().position(|t| t.number == number)?;
        let value = self.trials[position].value?;
        let best = self.best_among(&self.trials[..=position])?;
        Some(format!(
            "Trial {} finished with value {:.4} | best is trial {} with value {:.4}",
            number,
            value,
            best.number,
            best.value.unwrap_or(f64::NAN)
        ))
    }

    /// Melhor trial completo; em empate vence o primeiro
    pub fn best_trial(&self) -> Option<&FrozenTrial> {
        self.best_among(&self.trials)
    }

    fn best_among<'t>(&self, trials: &'t [FrozenTrial]) -> Option<&'t FrozenTrial> {
        let mut best: Option<(&FrozenTrial, f64)> = None;
        for trial in trials {
            let Some(value) = trial.value.filter(|_| trial.state == TrialState::Complete) else {
                continue;
            };
            let score = self.direction.oriented(value);
            match best {
                Some((_, b)) if score <= b => {}
                _ => best = Some((trial, score)),
            }
        }
        best.map(|(t, _)| t)
    }

    /// Grava `number, value, state, duration_ms, params_<nome>...`
    pub fn write_trials_csv(&self, path: &Path) -> Result<(), StudyError> {
        let write_err = |source: csv::Error| StudyError::Write {
            path: path.to_path_buf(),
            source,
        };

        let mut columns: Vec<&str> = Vec::new();
        for trial in &self.trials {
            for (name, _) in trial.params.iter() {
                if !columns.contains(&name) {
                    columns.push(name);
                }
            }
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| write_err(e.into()))?;
        }
        let mut writer = csv::Writer::from_path(path).map_err(write_err)?;

        let mut header = vec![
            "number".to_string(),
            "value".to_string(),
            "state".to_string(),
            "duration_ms".to_string(),
        ];
        header.extend(columns.iter().map(|c| format!("params_{}", c)));
        writer.write_record(&header).map_err(write_err)?;

        for trial in &self.trials {
            let mut row = vec![
                trial.number.to_string(),
                trial.value.map(format_weight).unwrap_or_default(),
                match trial.state {
                    TrialState::Complete => "COMPLETE".to_string(),
                    TrialState::Failed => "FAIL".to_string(),
                },
                trial.duration.as_millis().to_string(),
            ];
            row.extend(
                columns
                    .iter()
                    .map(|c| trial.params.get(c).map(format_weight).unwrap_or_default()),
            );
            writer.write_record(&row).map_err(write_err)?;
        }

        writer.flush().map_err(|e| write_err(e.into()))?;
        Ok(())
    }
}

// =============================================================================
// TESTES
// =============================================================================
