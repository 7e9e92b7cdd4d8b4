#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use rebalancer::prelude::*;

pub const FIXTURE_CSV: &str = "tests/fixtures/valuations.csv";

/// Three units over four steps.
pub fn scenario_valuations() -> Arc<Valuations> {
    Arc::new(
        Valuations::from_rows(vec![
            vec![10.0, 20.0, 30.0],
            vec![12.0, 18.0, 32.0],
            vec![11.0, 19.0, 31.0],
            vec![13.0, 17.0, 33.0],
        ])
        .expect("scenario table is valid"),
    )
}

pub fn scenario_env(cash: f64) -> Environment {
    let cfg = EnvConfig::default().with_initial_investment(cash);
    Environment::new(scenario_valuations(), cfg).expect("scenario env is valid")
}

pub fn fixture_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(FIXTURE_CSV)
}

/// Fresh, empty scratch directory unique to this process and `name`.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rebalancer-it-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

/// Small, seeded run writing into `dir`.
pub fn small_run_config(dir: &Path) -> RunConfig {
    RunConfig::default()
        .with_data_path(fixture_path())
        .with_models_dir(dir.join("models"))
        .with_rewards_dir(dir.join("rewards"))
        .with_episodes(3)
        .with_batch_size(4)
        .with_initial_investment(1_000.0)
        .with_seed(17)
}
