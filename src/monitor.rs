//! Leitura do log por episódio (`monitor.csv`) produzido pelo treino.
//!
//! Formato: uma linha de preâmbulo (metadados do monitor), depois um CSV com
//! cabeçalho contendo ao menos a coluna `r` (recompensa acumulada do episódio).

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::MonitorError;

/// Nome do log dentro do diretório de checkpoint
pub const MONITOR_FILE: &str = "monitor.csv";

/// Coluna com a recompensa por episódio
pub const REWARD_COLUMN: &str = "r";

/// Recompensas por episódio, na ordem do arquivo.
///
/// Células vazias e `nan` são ignoradas.
pub fn read_episode_rewards(path: &Path) -> Result<Vec<f64>, MonitorError> {
    let file = File::open(path).map_err(|source| MonitorError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);

    // preâmbulo
    let mut preamble = String::new();
    reader
        .read_line(&mut preamble)
        .map_err(|source| MonitorError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let csv_err = |source: csv::Error| MonitorError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let column = csv_reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .position(|h| h == REWARD_COLUMN)
        .ok_or_else(|| MonitorError::MissingColumn {
            path: path.to_path_buf(),
            column: REWARD_COLUMN.to_string(),
        })?;

    let mut rewards = Vec::new();
    for (row, record) in csv_reader.records().enumerate() {
        let record = record.map_err(csv_err)?;
        let cell = match record.get(column) {
            Some(cell) if !cell.is_empty() => cell,
            _ => continue,
        };
        let value: f64 = cell.parse().map_err(|_| MonitorError::BadValue {
            path: path.to_path_buf(),
            row: row + 1,
            value: cell.to_string(),
        })?;
        if !value.is_nan() {
            rewards.push(value);
        }
    }

    Ok(rewards)
}

/// Média aritmética da coluna `r`; `None` se o log não tem episódios
pub fn mean_episode_reward(path: &Path) -> Result<Option<f64>, MonitorError> {
    let rewards = read_episode_rewards(path)?;
    if rewards.is_empty() {
        return Ok(None);
    }
    Ok(Some(rewards.iter().sum::<f64>() / rewards.len() as f64))
}
