//! # reward_sweep: Busca de Pesos de Recompensa para Agentes RL
//!
//! Drivers de sweep que montam uma função de recompensa a partir de termos
//! ponderados, chamam o treino externo por um número fixo de timesteps, leem o
//! log de recompensa por episódio e reportam a configuração com maior
//! recompensa média.
//!
//! ## Módulos
//!
//! - **reward**: termos ponderados e o `RewardManager` (por passo + por evento)
//! - **reward_plan**: descrição serializável da recompensa e templates
//! - **param_space**: dimensões de busca (listas discretas ou intervalos)
//! - **training**: contrato com o ponto de entrada de treino (`Trainer`)
//! - **monitor**: leitura do `monitor.csv`
//! - **trial**: execução e pontuação de um trial
//! - **grid**: busca exaustiva em grade
//! - **guided**: objetivo para o serviço de sugestão de trials
//! - **study**: serviço de sugestão (random / bayesiano)
//! - **config**: configuração JSON
//!
//! ## Exemplo de Uso
//!
//! ```rust,no_run
//! use reward_sweep::grid::{GridSweep, GridSweepConfig};
//! use reward_sweep::training::CommandTrainer;
//!
//! let sweep = GridSweep::new(GridSweepConfig::default()).unwrap();
//! let mut trainer = CommandTrainer::new("python").with_args(["train_agent.py"]);
//!
//! let results = sweep.run(&mut trainer);
//! if let Some(best) = results.best_trial() {
//!     println!("best: {} -> {:?}", best.assignment, best.mean_reward);
//! }
//! ```

pub mod config;
pub mod error;
pub mod grid;
pub mod guided;
pub mod logging;
pub mod monitor;
pub mod param_space;
pub mod reward;
pub mod reward_plan;
pub mod study;
pub mod trial;
pub mod training;

// Re-exporta tipos comuns para conveniência
pub use config::SweepConfig;
pub use error::{ConfigError, MonitorError, StudyError, TrainingError};
pub use grid::{GridSweep, GridSweepConfig, SweepResultSet, SweepTrial};
pub use guided::{run_guided_sweep, GuidedObjective, GuidedSweepConfig, FAILURE_SCORE};
pub use param_space::{Assignment, ParameterDef, ParameterRange, ParameterSpace, ParameterValue};
pub use reward::{RewTerm, RewardManager, StepSignals};
pub use reward_plan::{RewardPlan, RewardTemplate, TermFunction};
pub use study::{Study, StudyDirection, TrialHandle};
pub use trial::{TrialOutcome, TrialSettings};
pub use training::{CommandTrainer, Trainer, TrainingRequest};
