//! Inicialização do `tracing` para os binários.

use tracing_subscriber::EnvFilter;

/// Instala o subscriber `fmt`.
///
/// `RUST_LOG` tem precedência; sem ele o nível é `info` (ou `warn` com
/// `quiet`). Chamadas repetidas são ignoradas.
pub fn init(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
