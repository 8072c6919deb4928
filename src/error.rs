//! # Erros do Sistema de Sweep
//!
//! Cada camada tem seu próprio tipo de erro:
//! - `ConfigError`: configuração inválida (termos duplicados, pesos, espaços)
//! - `TrainingError`: falha da chamada externa de treino
//! - `MonitorError`: falha ao ler o log por episódio (`monitor.csv`)
//! - `StudyError`: uso inválido do serviço de sugestão de trials

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Configuração rejeitada na construção/validação
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("duplicate {group} reward term '{name}'")]
    DuplicateTerm { group: &'static str, name: String },

    #[error("reward term '{name}' has non-finite weight {weight}")]
    InvalidWeight { name: String, weight: f64 },

    #[error("no scoring function registered for '{function}' (term '{term}')")]
    UnknownFunction { term: String, function: String },

    #[error("duplicate search dimension '{0}'")]
    DuplicateDimension(String),

    #[error("search dimension '{0}' has no candidate values")]
    EmptyDimension(String),

    #[error("search dimension '{name}' has invalid range [{low}, {high}]")]
    InvalidRange { name: String, low: f64, high: f64 },

    #[error("search dimension '{name}' has non-finite value {value}")]
    NonFiniteValue { name: String, value: f64 },

    #[error("missing required search dimension '{0}'")]
    MissingDimension(String),

    #[error("invalid sweep setting: {0}")]
    Invalid(String),

    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Falha reportada pelo ponto de entrada de treino
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("failed to prepare checkpoint directory {}: {source}", .path.display())]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write training request: {0}")]
    Request(#[from] serde_json::Error),

    #[error("failed to launch trainer '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("trainer exited with {0}")]
    ExitStatus(std::process::ExitStatus),

    #[error("training aborted: {0}")]
    Aborted(String),
}

/// Falha ao interpretar o log por episódio
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("failed to read monitor log {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed monitor log {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("monitor log {} has no '{column}' column", .path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("monitor log {} row {row}: '{value}' is not a number", .path.display())]
    BadValue {
        path: PathBuf,
        row: usize,
        value: String,
    },
}

/// Uso inválido do estudo guiado
#[derive(Debug, Error)]
pub enum StudyError {
    #[error("invalid bounds for '{name}': [{low}, {high}]")]
    InvalidBounds { name: String, low: f64, high: f64 },

    #[error("failed to write study table {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}
