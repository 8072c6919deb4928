//! Testes de integração da busca em grade com um treino roteirizado

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use approx::assert_relative_eq;
use reward_sweep::error::TrainingError;
use reward_sweep::grid::{GridSweep, GridSweepConfig};
use reward_sweep::training::{TrainLogging, Trainer, TrainingRequest};

/// O que o treino roteirizado faz para um run
enum Step {
    /// Escreve um `monitor.csv` com estas recompensas
    Log(Vec<f64>),
    /// Termina sem log
    NoLog,
    /// Escreve um log sem a coluna `r`
    Malformed,
    /// Falha
    Fail,
}

struct ScriptedTrainer {
    script: HashMap<String, Step>,
    requests: Vec<TrainingRequest>,
}

impl ScriptedTrainer {
    fn new() -> Self {
        Self {
            script: HashMap::new(),
            requests: Vec::new(),
        }
    }

    fn on(mut self, run_name: &str, step: Step) -> Self {
        self.script.insert(run_name.to_string(), step);
        self
    }
}

fn write_monitor(dir: &Path, rewards: &[f64]) {
    fs::create_dir_all(dir).unwrap();
    let mut body = String::from("#{\"t_start\": 1700000000.0, \"env_id\": null}\nr,l,t\n");
    for (i, r) in rewards.iter().enumerate() {
        body.push_str(&format!("{},{},{}\n", r, 100 + i, i as f64 * 0.5));
    }
    fs::write(dir.join("monitor.csv"), body).unwrap();
}

impl Trainer for ScriptedTrainer {
    fn train(&mut self, request: &TrainingRequest) -> Result<(), TrainingError> {
        self.requests.push(request.clone());
        match self.script.get(&request.save_handler.run_name) {
            Some(Step::Fail) => Err(TrainingError::Aborted("scripted failure".to_string())),
            Some(Step::NoLog) => Ok(()),
            Some(Step::Malformed) => {
                fs::create_dir_all(request.checkpoint_dir()).unwrap();
                fs::write(request.monitor_path(), "#{}\nreward,l,t\n1.0,1,0\n").unwrap();
                Ok(())
            }
            Some(Step::Log(rewards)) => {
                write_monitor(request.checkpoint_dir(), rewards);
                Ok(())
            }
            None => {
                write_monitor(request.checkpoint_dir(), &[0.0]);
                Ok(())
            }
        }
    }
}

fn config_in(root: &Path) -> GridSweepConfig {
    GridSweepConfig {
        checkpoint_root: root.join("checkpoints"),
        ..GridSweepConfig::default()
    }
}

#[test]
fn test_grid_runs_every_combination_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let sweep = GridSweep::new(config_in(dir.path())).unwrap();
    let mut trainer = ScriptedTrainer::new();

    let results = sweep.run(&mut trainer);

    let runs: Vec<&str> = trainer
        .requests
        .iter()
        .map(|r| r.save_handler.run_name.as_str())
        .collect();
    assert_eq!(
        runs,
        vec![
            "exp_d0.5_z0.1_a-0.1",
            "exp_d0.5_z0.1_a-0.04",
            "exp_d0.5_z0.5_a-0.1",
            "exp_d0.5_z0.5_a-0.04",
            "exp_d1.0_z0.1_a-0.1",
            "exp_d1.0_z0.1_a-0.04",
            "exp_d1.0_z0.5_a-0.1",
            "exp_d1.0_z0.5_a-0.04",
        ]
    );
    assert_eq!(results.len(), 8);
    assert_eq!(results.attempted, 8);
    assert_eq!(
        results.trials[0].checkpoint,
        dir.path().join("checkpoints").join("gridsearch_d0.5_z0.1_a-0.1")
    );
}

#[test]
fn test_grid_request_carries_weights_and_settings() {
    let dir = tempfile::tempdir().unwrap();
    let sweep = GridSweep::new(config_in(dir.path())).unwrap();
    let mut trainer = ScriptedTrainer::new();
    sweep.run(&mut trainer);

    let last = trainer.requests.last().unwrap();
    assert_eq!(last.train_timesteps, 2000);
    assert_eq!(last.save_handler.save_freq, 1000);
    assert_eq!(last.train_logging, TrainLogging::Plot);
    assert_eq!(last.opponents.opponents.get("based_agent"), Some(&1.0));

    let reward = &last.reward;
    assert_eq!(reward.term("damage_interaction_reward").unwrap().weight, 1.0);
    assert_eq!(reward.term("danger_zone_reward").unwrap().weight, 0.5);
    assert_eq!(reward.term("penalize_attack_reward").unwrap().weight, -0.04);
    assert_eq!(
        reward.term("penalize_attack_reward").unwrap().params["desired_state"].as_str(),
        Some("AttackState")
    );
    let win = reward.event("on_win_reward").unwrap();
    assert_eq!(win.signal, "win_signal");
    assert_eq!(win.weight, 50.0);
}

#[test]
fn test_grid_failure_policy() {
    let dir = tempfile::tempdir().unwrap();
    let sweep = GridSweep::new(config_in(dir.path())).unwrap();
    let mut trainer = ScriptedTrainer::new()
        .on("exp_d0.5_z0.1_a-0.1", Step::Log(vec![1.0, 2.0]))
        .on("exp_d0.5_z0.5_a-0.1", Step::Fail)
        .on("exp_d0.5_z0.5_a-0.04", Step::NoLog)
        .on("exp_d1.0_z0.1_a-0.04", Step::Log(vec![4.0, 6.0, 8.0]));

    let results = sweep.run(&mut trainer);

    // falha de treino: descartado; log ausente: mantido sem score
    assert_eq!(trainer.requests.len(), 8);
    assert_eq!(results.len(), 7);
    assert_eq!(results.failed(), 1);
    assert!(results
        .trials
        .iter()
        .all(|t| t.run_name != "exp_d0.5_z0.5_a-0.1"));

    let missing = results
        .trials
        .iter()
        .find(|t| t.run_name == "exp_d0.5_z0.5_a-0.04")
        .unwrap();
    assert_eq!(missing.mean_reward, None);

    assert_relative_eq!(results.trials[0].mean_reward.unwrap(), 1.5);

    let best = results.best_trial().unwrap();
    assert_eq!(best.run_name, "exp_d1.0_z0.1_a-0.04");
    assert_relative_eq!(best.mean_reward.unwrap(), 6.0);
    assert_eq!(best.assignment.get("damage_interaction_reward"), Some(1.0));
}

#[test]
fn test_grid_results_csv() {
    let dir = tempfile::tempdir().unwrap();
    let sweep = GridSweep::new(config_in(dir.path())).unwrap();
    let mut trainer = ScriptedTrainer::new()
        .on("exp_d0.5_z0.1_a-0.1", Step::Log(vec![1.0, 2.0]))
        .on("exp_d0.5_z0.5_a-0.04", Step::NoLog);

    let results = sweep.run(&mut trainer);
    let path: PathBuf = dir.path().join("out").join("gridsearch_results.csv");
    results.write_csv(&path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 9);
    assert_eq!(
        lines[0],
        "damage_interaction_reward,danger_zone_reward,penalize_attack_reward,mean_reward,checkpoint"
    );
    assert!(lines[1].starts_with("0.5,0.1,-0.1,1.5,"));
    assert!(lines[1].ends_with("gridsearch_d0.5_z0.1_a-0.1"));
    assert!(lines[4].starts_with("0.5,0.5,-0.04,,"));
}

#[test]
fn test_grid_all_logs_missing_picks_first() {
    let dir = tempfile::tempdir().unwrap();
    let sweep = GridSweep::new(config_in(dir.path())).unwrap();
    let mut trainer = ScriptedTrainer::new();
    for planned in sweep.plan() {
        trainer = trainer.on(&planned.run_name, Step::NoLog);
    }

    let results = sweep.run(&mut trainer);

    assert_eq!(results.len(), 8);
    let best = results.best_trial().unwrap();
    assert_eq!(best.run_name, "exp_d0.5_z0.1_a-0.1");
    assert_eq!(best.mean_reward, None);
}

#[test]
fn test_grid_all_failed_has_no_best() {
    let dir = tempfile::tempdir().unwrap();
    let sweep = GridSweep::new(config_in(dir.path())).unwrap();
    let mut trainer = ScriptedTrainer::new();
    for planned in sweep.plan() {
        trainer = trainer.on(&planned.run_name, Step::Fail);
    }

    let results = sweep.run(&mut trainer);

    assert!(results.is_empty());
    assert_eq!(results.attempted, 8);
    assert!(results.best_trial().is_none());
}

#[test]
fn test_grid_unreadable_log_drops_trial() {
    let dir = tempfile::tempdir().unwrap();
    let sweep = GridSweep::new(config_in(dir.path())).unwrap();
    let mut trainer = ScriptedTrainer::new()
        .on("exp_d0.5_z0.1_a-0.1", Step::Malformed)
        .on("exp_d0.5_z0.1_a-0.04", Step::NoLog)
        .on("exp_d1.0_z0.5_a-0.04", Step::Log(vec![2.0]));

    let results = sweep.run(&mut trainer);

    assert_eq!(results.attempted, 8);
    assert_eq!(results.len(), 7);
    assert_eq!(results.failed(), 1);
    assert!(results
        .trials
        .iter()
        .all(|t| t.run_name != "exp_d0.5_z0.1_a-0.1"));
    // log ausente continua no resultado
    assert_eq!(results.trials[0].run_name, "exp_d0.5_z0.1_a-0.04");
    assert_eq!(results.trials[0].mean_reward, None);
    assert_eq!(results.best_trial().unwrap().run_name, "exp_d1.0_z0.5_a-0.04");
}

#[test]
fn test_grid_all_logs_unreadable_records_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let sweep = GridSweep::new(config_in(dir.path())).unwrap();
    let mut trainer = ScriptedTrainer::new();
    for planned in sweep.plan() {
        trainer = trainer.on(&planned.run_name, Step::Malformed);
    }

    let results = sweep.run(&mut trainer);

    assert_eq!(trainer.requests.len(), 8);
    assert!(results.is_empty());
    assert!(results.best_trial().is_none());
}
