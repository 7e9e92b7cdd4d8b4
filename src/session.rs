use std::{
    sync::Arc,
    time::Instant,
};

use indicatif::{ProgressBar, ProgressStyle};
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    agent::{Agent, RunMode, dqn::DqnAgent, replay_buffer::Transition},
    config::RunConfig,
    data::valuations::Valuations,
    error::{AgentError, EnvError, RebalancerResult},
    gym::{Env, Reward, rebalance::env::Environment},
    io::ArtifactStore,
    math::scaler::StandardScaler,
    report::PortfolioValues,
};

// ================================================================================================
// Episode Driver
// ================================================================================================

/// Play one full episode and return the final portfolio value.
///
/// Every observation passes through `scaler` before the agent sees it. In [`RunMode::Train`]
/// each transition is handed to [`Agent::observe`]; in [`RunMode::Test`] the agent only acts.
pub fn run_episode<A, E>(
    agent: &mut A,
    env: &mut E,
    scaler: &StandardScaler,
    mode: RunMode,
    batch_size: usize,
) -> RebalancerResult<f64>
where
    A: Agent + ?Sized,
    E: Env,
{
    let mut state = scaler.transform(&env.reset()?)?;
    let mut episode_reward = Reward::default();

    loop {
        let action = agent.act(&state)?;
        let (next_obs, reward, outcome, info) = env.step(action)?;
        let next_state = scaler.transform(&next_obs)?;
        episode_reward += reward;

        if mode.is_train() {
            let transition = Transition {
                state,
                action,
                reward,
                next_state: next_state.clone(),
                done: outcome.is_done(),
            };
            agent.observe(transition, batch_size)?;
        }

        if outcome.is_done() {
            tracing::debug!(
                steps = info.step,
                reward = episode_reward.0,
                units_bought = info.trade.units_bought,
                "Episode Done"
            );
            agent.reset();
            return Ok(info.current_value);
        }
        state = next_state;
    }
}

/// Play `episodes` episodes back to back, collecting each final portfolio value.
pub fn run_episodes<A, E>(
    agent: &mut A,
    env: &mut E,
    scaler: &StandardScaler,
    mode: RunMode,
    episodes: usize,
    batch_size: usize,
) -> RebalancerResult<PortfolioValues>
where
    A: Agent + ?Sized,
    E: Env,
{
    let bar = progress_bar(episodes as u64)?;
    let mut values = PortfolioValues::with_capacity(mode, episodes);
    let agent_id = agent.identifier();

    for episode in 0..episodes {
        let start = Instant::now();
        let value = run_episode(agent, env, scaler, mode, batch_size)?;
        let elapsed = start.elapsed();

        tracing::info!(
            agent = %agent_id,
            %mode,
            episode = episode + 1,
            episodes,
            portfolio_value = value,
            duration = %humantime::format_duration(elapsed),
            "Episode Finished"
        );
        values.push(value);
        bar.inc(1);
    }

    bar.finish_and_clear();
    Ok(values)
}

// ================================================================================================
// Train / Test Run
// ================================================================================================

/// A complete run: load data, prepare the agent and scaler for `mode`, play the configured
/// number of episodes and write the portfolio-value report.
///
/// - `Train` plays on the leading share of rows, fits the scaler on random play, and saves the
///   network and scaler afterwards.
/// - `Test` plays on the held-out rows and requires both artifacts from a previous training
///   run. Missing artifacts fail the run before any data is loaded.
#[tracing::instrument(skip_all, fields(mode = %mode))]
pub fn run(cfg: &RunConfig, mode: RunMode) -> RebalancerResult<PortfolioValues> {
    cfg.validate()?;
    let store = ArtifactStore::new(&cfg.models_dir);
    if !mode.is_train() {
        store.ensure_complete()?;
    }

    let valuations = Valuations::from_csv(&cfg.data_path)?;
    let (train, test) = valuations.split(cfg.train_fraction)?;
    let data = if mode.is_train() { train } else { test };
    tracing::info!(
        rows = data.n_steps(),
        units = data.n_units(),
        "Split Selected"
    );

    let mut env = Environment::new(Arc::new(data), cfg.env_config())?;
    let mut agent = DqnAgent::new(
        env.observation_dim(),
        env.action_space().len(),
        cfg.agent_config(),
    )?;

    let scaler = if mode.is_train() {
        let mut rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
            None => StdRng::from_os_rng(),
        };
        StandardScaler::fit_from_random_play(&env, &mut rng)?
    } else {
        let scaler = store.load_scaler()?;
        store.load_model(&mut agent)?;
        agent.set_mode(RunMode::Test);
        scaler
    };
    if scaler.dim() != env.observation_dim() {
        return Err(AgentError::ShapeMismatch {
            context: "scaler dimension",
            expected: env.observation_dim(),
            actual: scaler.dim(),
        }
        .into());
    }

    let values = run_episodes(
        &mut agent,
        &mut env,
        &scaler,
        mode,
        cfg.episodes,
        cfg.batch_size,
    )?;

    if mode.is_train() {
        store.save_model(&agent)?;
        store.save_scaler(&scaler)?;
        tracing::info!(dir = %store.dir().display(), "Artifacts Saved");
    }

    let report_path = values.to_csv(&cfg.rewards_dir)?;
    if let Some(summary) = values.summary() {
        tracing::info!(
            path = %report_path.display(),
            %summary,
            "Run Finished"
        );
    }
    Ok(values)
}

// ================================================================================================
// Helper Functions
// ================================================================================================
fn progress_bar(capacity: u64) -> RebalancerResult<ProgressBar> {
    let bar = ProgressBar::new(capacity);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta_precise}) {msg}")
            .map_err(EnvError::ProgressBar)?
            .progress_chars("#>-"));
    Ok(bar)
}
