use rand::{SeedableRng, rngs::StdRng};
use rebalancer::prelude::*;

mod common;

// ================================================================================================
// Episodes
// ================================================================================================

#[test]
fn all_hold_episode_ends_at_initial_investment() {
    // Arrange
    let mut env = common::scenario_env(1_000.0);
    let scaler = StandardScaler::fit_from_random_play(&env, &mut StdRng::seed_from_u64(1)).unwrap();
    let mut agent = HoldAgent::new(env.action_space());

    // Act
    let value = run_episode(&mut agent, &mut env, &scaler, RunMode::Test, 32).unwrap();

    // Assert
    assert_eq!(value, 1_000.0);
    assert_eq!(env.current_step(), 3);
    assert_eq!(env.units_owned().sum(), 0.0);
}

#[test]
fn random_play_never_overdraws_cash() {
    let mut env = common::scenario_env(1_000.0);
    let scaler = StandardScaler::fit_from_random_play(&env, &mut StdRng::seed_from_u64(2)).unwrap();
    let mut agent = RandomAgent::new(env.action_space().clone(), Some(3));

    let values = run_episodes(&mut agent, &mut env, &scaler, RunMode::Test, 50, 32).unwrap();

    assert_eq!(values.len(), 50);
    assert!(values.values().iter().all(|v| *v > 0.0));
    assert!(env.cash() >= 0.0);
}

#[test]
fn dqn_agent_learns_through_the_driver() {
    // Arrange
    let mut env = common::scenario_env(1_000.0);
    let scaler = StandardScaler::fit_from_random_play(&env, &mut StdRng::seed_from_u64(4)).unwrap();
    let cfg = DqnConfig::default().with_seed(5);
    let mut agent = DqnAgent::new(env.observation_dim(), env.action_space().len(), cfg).unwrap();

    // Act
    run_episodes(&mut agent, &mut env, &scaler, RunMode::Train, 10, 8).unwrap();

    // Assert: 10 episodes x 3 steps, replay starts once 8 transitions are stored
    assert_eq!(agent.memory().len(), 30);
    let replays = 30 - 8 + 1;
    let expected = DqnConfig::default().epsilon_decay.powi(replays);
    assert!((agent.epsilon() - expected).abs() < 1e-12);
}

// ================================================================================================
// Train / Test Runs
// ================================================================================================

#[test]
fn csv_fixture_loads_with_unit_names() {
    let valuations = Valuations::from_csv(&common::fixture_path()).unwrap();

    assert_eq!(valuations.n_steps(), 10);
    assert_eq!(valuations.n_units(), 3);
    assert_eq!(valuations.unit_names(), ["grid_a", "grid_b", "grid_c"]);

    let (train, test) = valuations.split(0.5).unwrap();
    assert_eq!(train.n_steps(), 5);
    assert_eq!(test.n_steps(), 5);
}

#[test]
fn test_run_without_artifacts_fails_before_any_work() {
    // Arrange
    let dir = common::scratch_dir("missing");
    let cfg = common::small_run_config(&dir);

    // Act
    let result = run(&cfg, RunMode::Test);

    // Assert
    assert!(matches!(
        result,
        Err(RebalancerError::Io(IoError::MissingArtifact(_)))
    ));
    assert!(!cfg.rewards_dir.exists(), "No report may be written");
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn train_then_test_round_trip() {
    // Arrange
    let dir = common::scratch_dir("round-trip");
    let cfg = common::small_run_config(&dir);
    let store = ArtifactStore::new(&cfg.models_dir);

    // Act: train
    let train_values = run(&cfg, RunMode::Train).unwrap();

    // Assert: artifacts and report exist
    assert_eq!(train_values.len(), 3);
    assert!(store.model_path().is_file());
    assert!(store.scaler_path().is_file());
    assert!(cfg.rewards_dir.join("train.csv").is_file());

    // Act: test on the held-out rows with the stored artifacts
    let test_values = run(&cfg, RunMode::Test).unwrap();

    // Assert
    assert_eq!(test_values.mode(), RunMode::Test);
    assert_eq!(test_values.len(), 3);
    assert!(cfg.rewards_dir.join("test.csv").is_file());
    assert!(test_values.values().iter().all(|v| v.is_finite() && *v > 0.0));

    let _ = std::fs::remove_dir_all(dir);
}
