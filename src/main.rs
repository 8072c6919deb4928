//! # reward_sweep
//!
//! ```bash
//! reward_sweep grid --config sweep.json
//! reward_sweep guided --trials 20 --sampler random --dry-run
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use reward_sweep::config::SweepConfig;
use reward_sweep::grid::GridSweep;
use reward_sweep::guided::run_guided_sweep;
use reward_sweep::logging;
use reward_sweep::param_space::format_weight;
use reward_sweep::study::SamplerKind;
use reward_sweep::training::{DryRunTrainer, Trainer};

#[derive(Parser)]
#[command(name = "reward_sweep", version, about = "Sweeps reward weights for RL training runs")]
struct Cli {
    /// Só avisos e erros no log
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Busca exaustiva em grade
    Grid {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Busca guiada pelo serviço de sugestão
    Guided {
        #[command(flatten)]
        common: CommonArgs,
        /// Número de trials
        #[arg(long)]
        trials: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, value_enum)]
        sampler: Option<SamplerArg>,
    },
}

#[derive(clap::Args)]
struct CommonArgs {
    /// Arquivo JSON de configuração
    #[arg(long)]
    config: Option<PathBuf>,
    /// Diretório dos CSVs de resultado
    #[arg(long)]
    output: Option<PathBuf>,
    /// Não chama o treino; apenas percorre o plano
    #[arg(long)]
    dry_run: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum SamplerArg {
    Random,
    Bayesian,
}

impl From<SamplerArg> for SamplerKind {
    fn from(arg: SamplerArg) -> Self {
        match arg {
            SamplerArg::Random => SamplerKind::Random,
            SamplerArg::Bayesian => SamplerKind::Bayesian,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.quiet);

    match cli.command {
        Command::Grid { common } => run_grid(&common),
        Command::Guided {
            common,
            trials,
            seed,
            sampler,
        } => {
            let mut config = load_config(&common)?;
            if let Some(n) = trials {
                config.guided.n_trials = n;
            }
            if let Some(seed) = seed {
                config.guided.seed = seed;
            }
            if let Some(sampler) = sampler {
                config.guided.sampler = sampler.into();
            }
            run_guided(config, common.dry_run)
        }
    }
}

fn load_config(common: &CommonArgs) -> Result<SweepConfig> {
    let mut config = match &common.config {
        Some(path) => SweepConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => SweepConfig::default(),
    };
    if let Some(dir) = &common.output {
        config.output_dir = dir.clone();
    }
    Ok(config)
}

fn select_trainer(config: &SweepConfig, dry_run: bool) -> Box<dyn Trainer> {
    if dry_run {
        warn!("dry run: no training will be launched");
        Box::new(DryRunTrainer)
    } else {
        Box::new(config.trainer.clone())
    }
}

// =============================================================================
// GRID
// =============================================================================

fn run_grid(common: &CommonArgs) -> Result<()> {
    let config = load_config(common)?;
    let mut trainer = select_trainer(&config, common.dry_run);

    let sweep = GridSweep::new(config.grid.clone()).context("invalid grid sweep configuration")?;
    let results = sweep.run(&mut trainer);

    let path = config.grid_results_path();
    results
        .write_csv(&path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("results saved to {}", path.display());

    print_banner("GRID SEARCH");
    match results.best_trial() {
        Some(best) => {
            println!("  Best configuration: {}", best.assignment);
            println!(
                "  Mean reward:        {}",
                best.mean_reward.map(format_weight).unwrap_or_else(|| "n/a".to_string())
            );
            println!("  Checkpoint:         {}", best.checkpoint.display());
        }
        None => println!("  No trial completed."),
    }
    println!(
        "  Trials:             {} recorded / {} attempted",
        results.len(),
        results.attempted
    );
    Ok(())
}

// =============================================================================
// GUIDED
// =============================================================================

fn run_guided(config: SweepConfig, dry_run: bool) -> Result<()> {
    let mut trainer = select_trainer(&config, dry_run);
    let path = config.guided_trials_path();

    let report = run_guided_sweep(config.guided.clone(), &mut trainer)
        .context("invalid guided sweep configuration")?;

    report
        .study
        .write_trials_csv(&path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("trials saved to {}", path.display());

    print_banner("GUIDED SEARCH");
    match report.best_record() {
        Some(best) => {
            println!("  Best trial:  {}", best.number);
            println!("  Parameters:  {}", best.assignment);
            println!("  Score:       {:.4}", best.score);
            println!("  Checkpoint:  {}", best.checkpoint.display());
        }
        None => println!("  No trial completed."),
    }
    let failed = report.records.iter().filter(|r| !r.succeeded).count();
    println!(
        "  Trials:      {} run / {} without score",
        report.records.len(),
        failed
    );
    Ok(())
}

fn print_banner(title: &str) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║  {:<64}║", format!("{} - BEST RESULT", title));
    println!("╚══════════════════════════════════════════════════════════════════╝");
}
