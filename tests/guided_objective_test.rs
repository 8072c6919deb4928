//! Testes de integração do objetivo guiado e do estudo

use std::fs;
use std::path::Path;

use approx::assert_relative_eq;
use reward_sweep::error::TrainingError;
use reward_sweep::guided::{run_guided_sweep, GuidedObjective, GuidedSweepConfig, FAILURE_SCORE};
use reward_sweep::param_space::ParameterRange;
use reward_sweep::study::{SamplerKind, Study, StudyDirection, TrialState};
use reward_sweep::training::{TrainLogging, Trainer, TrainingRequest};

/// Roteiro por número de trial (ordem de chamada)
enum Step {
    Log(Vec<f64>),
    NoLog,
    Malformed,
    Fail,
}

struct ScriptedTrainer {
    script: Vec<Step>,
    requests: Vec<TrainingRequest>,
    /// Se o diretório do checkpoint já existia quando o treino começou
    dir_existed: Vec<bool>,
}

impl ScriptedTrainer {
    fn new(script: Vec<Step>) -> Self {
        Self {
            script,
            requests: Vec::new(),
            dir_existed: Vec::new(),
        }
    }
}

fn write_monitor(dir: &Path, rewards: &[f64]) {
    let mut body = String::from("#{\"t_start\": 1700000000.0}\nr,l,t\n");
    for r in rewards {
        body.push_str(&format!("{},50,1.0\n", r));
    }
    fs::write(dir.join("monitor.csv"), body).unwrap();
}

impl Trainer for ScriptedTrainer {
    fn train(&mut self, request: &TrainingRequest) -> Result<(), TrainingError> {
        let call = self.requests.len();
        self.requests.push(request.clone());
        self.dir_existed.push(request.checkpoint_dir().is_dir());

        match self.script.get(call) {
            Some(Step::Fail) => Err(TrainingError::Aborted("cuda out of memory".to_string())),
            Some(Step::NoLog) => Ok(()),
            Some(Step::Malformed) => {
                fs::write(request.monitor_path(), "#{}\nr,l,t\nabc,1,0\n").unwrap();
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

fn config_in(root: &Path, n_trials: usize) -> GuidedSweepConfig {
    GuidedSweepConfig {
        checkpoint_root: root.join("checkpoints"),
        n_trials,
        seed: 7,
        sampler: SamplerKind::Random,
        ..GuidedSweepConfig::default()
    }
}

#[test]
fn test_objective_scores_and_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let mut trainer = ScriptedTrainer::new(vec![
        Step::Log(vec![2.0, 4.0]),
        Step::Fail,
        Step::NoLog,
        Step::Log(vec![10.0]),
    ]);

    let report = run_guided_sweep(config_in(dir.path(), 4), &mut trainer).unwrap();

    let scores: Vec<f64> = report.records.iter().map(|r| r.score).collect();
    assert_relative_eq!(scores[0], 3.0);
    assert_eq!(scores[1], FAILURE_SCORE);
    assert_eq!(scores[2], FAILURE_SCORE);
    assert_relative_eq!(scores[3], 10.0);

    let succeeded: Vec<bool> = report.records.iter().map(|r| r.succeeded).collect();
    assert_eq!(succeeded, vec![true, false, false, true]);

    // o sentinela é finito: o estudo registra todos como completos
    assert!(report
        .study
        .trials()
        .iter()
        .all(|t| t.state == TrialState::Complete));

    let best = report.best_record().unwrap();
    assert_eq!(best.number, 3);
    assert_relative_eq!(best.score, 10.0);
}

#[test]
fn test_checkpoints_named_by_trial_and_created_first() {
    let dir = tempfile::tempdir().unwrap();
    let mut trainer = ScriptedTrainer::new(Vec::new());

    run_guided_sweep(config_in(dir.path(), 3), &mut trainer).unwrap();

    let root = dir.path().join("checkpoints");
    for (n, request) in trainer.requests.iter().enumerate() {
        assert_eq!(request.save_handler.save_path, root.join(format!("optuna_trial_{}", n)));
        assert_eq!(request.save_handler.run_name, format!("optuna_trial_{}", n));
    }
    assert_eq!(trainer.dir_existed, vec![true, true, true]);
}

#[test]
fn test_suggested_weights_within_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 6);
    let bounds: Vec<(String, f64, f64)> = config
        .dimensions
        .parameters
        .iter()
        .map(|p| match p.range {
            ParameterRange::Continuous { low, high } => (p.name.clone(), low, high),
            ParameterRange::Discrete { .. } => unreachable!(),
        })
        .collect();
    let mut trainer = ScriptedTrainer::new(Vec::new());

    run_guided_sweep(config, &mut trainer).unwrap();

    assert_eq!(trainer.requests.len(), 6);
    for request in &trainer.requests {
        assert_eq!(request.train_timesteps, 100_000);
        assert_eq!(request.save_handler.save_freq, 10_000);
        assert_eq!(request.train_logging, TrainLogging::None);
        assert_eq!(request.reward.terms.len(), 4);
        for (name, low, high) in &bounds {
            let weight = request.reward.term(name).unwrap().weight;
            assert!(weight >= *low && weight <= *high, "{} = {}", name, weight);
        }
    }
}

#[test]
fn test_same_seed_same_suggestions() {
    let run = || {
        let dir = tempfile::tempdir().unwrap();
        let mut trainer = ScriptedTrainer::new(Vec::new());
        let report = run_guided_sweep(config_in(dir.path(), 3), &mut trainer).unwrap();
        report
            .records
            .into_iter()
            .map(|r| r.assignment)
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_objective_with_external_study() {
    let dir = tempfile::tempdir().unwrap();
    let mut trainer = ScriptedTrainer::new(vec![Step::Log(vec![1.0]), Step::Log(vec![5.0])]);
    let mut objective = GuidedObjective::new(config_in(dir.path(), 2), &mut trainer).unwrap();

    let mut study = Study::new("external", StudyDirection::Maximize, SamplerKind::Random.build(1));
    study.optimize(2, &mut objective);

    assert_eq!(objective.records().len(), 2);
    let best = study.best_trial().unwrap();
    assert_eq!(best.number, 1);
    assert_eq!(best.value, Some(5.0));
    assert_eq!(best.params.len(), 4);
}

#[test]
fn test_trials_csv_written() {
    let dir = tempfile::tempdir().unwrap();
    let mut trainer = ScriptedTrainer::new(vec![Step::Fail]);
    let report = run_guided_sweep(config_in(dir.path(), 2), &mut trainer).unwrap();

    let path = dir.path().join("study_trials.csv");
    report.study.write_trials_csv(&path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next().unwrap(),
        "number,value,state,duration_ms,params_damage_interaction_reward,\
         params_danger_zone_reward,params_penalize_attack_reward,params_holding_more_than_3_keys"
    );
    assert!(lines.next().unwrap().starts_with("0,-999.0,COMPLETE,"));
    assert!(lines.next().unwrap().starts_with("1,0.0,COMPLETE,"));
}

#[test]
fn test_unreadable_log_gets_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let mut trainer = ScriptedTrainer::new(vec![Step::Malformed, Step::Log(vec![1.0])]);

    let report = run_guided_sweep(config_in(dir.path(), 2), &mut trainer).unwrap();

    assert_eq!(report.records[0].score, FAILURE_SCORE);
    assert!(!report.records[0].succeeded);
    assert_relative_eq!(report.records[1].score, 1.0);
    assert_eq!(report.best_record().unwrap().number, 1);
}
