use std::sync::Arc;

use ndarray::ArrayView1;
use serde::Serialize;

use crate::{
    data::valuations::Valuations,
    error::{EnvError, RebalancerResult},
    gym::{
        Env, EnvStatus, Reward, StepOutcome,
        rebalance::{
            action::ActionId,
            action_space::ActionSpace,
            config::EnvConfig,
            observation::Observation,
            portfolio::{Portfolio, TradeSummary},
        },
    },
};

/// Side information returned by every [`Env::step`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepInfo {
    /// Portfolio value after the trade, marked at the new valuation row.
    pub current_value: f64,
    /// Row index the environment advanced to.
    pub step: usize,
    /// What the rebalance executed.
    pub trade: TradeSummary,
}

/// Portfolio rebalancing over a fixed historical valuation series.
///
/// Every episode walks the series from row `0` to row `n_steps - 1`. At each step the agent
/// picks one joint [`ActionId`]; the environment moves to the next row, executes the decoded
/// per-unit orders at the new prices and rewards the change in portfolio value.
#[derive(Clone, Debug)]
pub struct Environment {
    // === Public (configurable) ===
    cfg: EnvConfig,

    // === Internal only ===
    /// Shared valuation table backing the environment.
    valuations: Arc<Valuations>,

    action_space: ActionSpace,

    portfolio: Portfolio,

    /// Row of `valuations` the portfolio is currently marked at.
    cur_step: usize,

    env_status: EnvStatus,
}

impl Environment {
    pub fn new(valuations: Arc<Valuations>, cfg: EnvConfig) -> RebalancerResult<Self> {
        cfg.validate()?;
        let n_units = valuations.n_units();
        let action_space = ActionSpace::new(n_units)?;

        Ok(Self {
            portfolio: Portfolio::new(n_units, cfg.initial_investment()),
            valuations,
            action_space,
            cfg,
            cur_step: 0,
            env_status: EnvStatus::Ready,
        })
    }

    /// A fresh environment over the same data and configuration, in [`EnvStatus::Ready`].
    pub fn fresh(&self) -> Self {
        Self {
            portfolio: Portfolio::new(self.n_units(), self.cfg.initial_investment()),
            valuations: self.valuations.clone(),
            action_space: self.action_space.clone(),
            cfg: self.cfg,
            cur_step: 0,
            env_status: EnvStatus::Ready,
        }
    }

    pub fn config(&self) -> &EnvConfig {
        &self.cfg
    }

    pub fn action_space(&self) -> &ActionSpace {
        &self.action_space
    }

    pub fn observation_dim(&self) -> usize {
        Observation::dim_for(self.n_units())
    }

    pub fn n_units(&self) -> usize {
        self.valuations.n_units()
    }

    pub fn n_steps(&self) -> usize {
        self.valuations.n_steps()
    }

    pub fn current_step(&self) -> usize {
        self.cur_step
    }

    pub fn status(&self) -> EnvStatus {
        self.env_status
    }

    pub fn units_owned(&self) -> ArrayView1<'_, f64> {
        self.portfolio.units_owned()
    }

    pub fn cash(&self) -> f64 {
        self.portfolio.cash()
    }

    pub fn current_valuations(&self) -> ArrayView1<'_, f64> {
        self.valuations.row(self.cur_step)
    }

    /// Portfolio value marked at the current valuation row.
    pub fn portfolio_value(&self) -> f64 {
        self.portfolio.value(self.current_valuations())
    }

    pub fn observation(&self) -> Observation {
        Observation::from_parts(
            self.portfolio.units_owned(),
            self.current_valuations(),
            self.portfolio.cash(),
        )
    }
}

impl Env for Environment {
    fn reset(&mut self) -> RebalancerResult<Observation> {
        self.cur_step = 0;
        self.portfolio = Portfolio::new(self.n_units(), self.cfg.initial_investment());
        self.env_status = EnvStatus::Running;

        tracing::trace!(
            n_steps = self.n_steps(),
            cash = self.cfg.initial_investment(),
            "Environment Reset"
        );
        Ok(self.observation())
    }

    fn step(
        &mut self,
        action: ActionId,
    ) -> RebalancerResult<(Observation, Reward, StepOutcome, StepInfo)> {
        self.check_step_status()?;
        let orders = self.action_space.decode(action)?;

        // 1. Value before the action, at the current row
        let value_before = self.portfolio.value(self.valuations.row(self.cur_step));

        // 2. Time passes: t -> t+1
        self.cur_step += 1;
        let prices = self.valuations.row(self.cur_step);

        // 3. Trade at the new prices, then mark to market
        let trade = self.portfolio.rebalance(orders, prices);
        let value_after = self.portfolio.value(prices);

        let outcome = if self.cur_step == self.valuations.n_steps() - 1 {
            self.env_status = EnvStatus::Done;
            StepOutcome::Done
        } else {
            StepOutcome::InProgress
        };

        let info = StepInfo {
            current_value: value_after,
            step: self.cur_step,
            trade,
        };

        Ok((
            self.observation(),
            Reward(value_after - value_before),
            outcome,
            info,
        ))
    }
}

impl Environment {
    fn check_step_status(&self) -> RebalancerResult<()> {
        use EnvStatus::*;
        match self.env_status {
            Running => Ok(()),
            Ready => Err(EnvError::InvalidState(
                "Environment is not started. Call `reset()` before stepping.".to_string(),
            )
            .into()),
            Done => Err(EnvError::InvalidState(
                "Episode is finished. No further steps allowed. Call `reset()` to restart."
                    .to_string(),
            )
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        error::RebalancerError,
        gym::rebalance::action::{Orders, TradeAction::*},
    };

    // ============================================================================================
    // Fixtures
    // ============================================================================================

    fn valuations() -> Arc<Valuations> {
        Arc::new(
            Valuations::from_rows(vec![
                vec![10.0, 20.0, 30.0],
                vec![12.0, 18.0, 32.0],
                vec![11.0, 19.0, 31.0],
                vec![13.0, 17.0, 33.0],
            ])
            .unwrap(),
        )
    }

    fn env(cash: f64) -> Environment {
        let cfg = EnvConfig::default().with_initial_investment(cash);
        Environment::new(valuations(), cfg).unwrap()
    }

    fn action(env: &Environment, orders: Vec<crate::gym::rebalance::action::TradeAction>) -> ActionId {
        env.action_space().encode(&Orders::from(orders)).unwrap()
    }

    // ============================================================================================
    // Lifecycle
    // ============================================================================================

    #[test]
    fn test_reset_returns_initial_observation() {
        let mut env = env(1_000.0);

        let obs = env.reset().unwrap();

        assert_eq!(obs.0, array![0.0, 0.0, 0.0, 10.0, 20.0, 30.0, 1_000.0]);
        assert_eq!(env.current_step(), 0);
        assert!(env.status().is_running());
    }

    #[test]
    fn test_step_before_reset_is_rejected() {
        let mut env = env(1_000.0);
        let hold = env.action_space().hold_all();

        let result = env.step(hold);

        assert!(matches!(
            result,
            Err(RebalancerError::Env(EnvError::InvalidState(_)))
        ));
    }

    #[test]
    fn test_done_on_last_row_and_no_further_steps() {
        let mut env = env(1_000.0);
        let hold = env.action_space().hold_all();
        env.reset().unwrap();

        let (_, _, o1, _) = env.step(hold).unwrap();
        let (_, _, o2, _) = env.step(hold).unwrap();
        let (_, _, o3, info) = env.step(hold).unwrap();

        assert_eq!(o1, StepOutcome::InProgress);
        assert_eq!(o2, StepOutcome::InProgress);
        assert_eq!(o3, StepOutcome::Done);
        assert_eq!(info.step, 3);
        assert!(env.status().is_done());
        assert!(env.step(hold).is_err());

        // reset() is valid from Done
        assert!(env.reset().is_ok());
    }

    #[test]
    fn test_invalid_action_is_rejected_without_side_effects() {
        let mut env = env(1_000.0);
        env.reset().unwrap();

        let result = env.step(ActionId(27));

        assert!(matches!(
            result,
            Err(RebalancerError::Env(EnvError::InvalidAction { action: 27, size: 27 }))
        ));
        assert_eq!(env.current_step(), 0);
        assert_eq!(env.cash(), 1_000.0);
    }

    // ============================================================================================
    // Transition Dynamics
    // ============================================================================================

    #[test]
    fn test_hold_only_keeps_holdings_and_cash() {
        let mut env = env(1_000.0);
        env.reset().unwrap();
        let buy_first = action(&env, vec![Buy, Hold, Hold]);
        env.step(buy_first).unwrap();

        let units = env.units_owned().to_owned();
        let cash = env.cash();
        let value_before = env.portfolio_value();

        // Act
        let hold = env.action_space().hold_all();
        let (_, reward, _, info) = env.step(hold).unwrap();

        // Assert: only the valuation change moves the portfolio value
        assert_eq!(env.units_owned(), units);
        assert_eq!(env.cash(), cash);
        let expected = units.dot(&array![11.0, 19.0, 31.0]) + cash;
        assert!((info.current_value - expected).abs() < 1e-9);
        assert!((reward.0 - (expected - value_before)).abs() < 1e-9);
    }

    #[test]
    fn test_trade_executes_at_the_new_row() {
        let mut env = env(100.0);
        env.reset().unwrap();

        // Buy unit 0: new price is 12 (row 1), not 10 (row 0).
        let (obs, reward, _, info) = env.step(action(&env, vec![Buy, Hold, Hold])).unwrap();

        // 100 -> 88 -> ... -> 4 : 8 units at 12
        assert_eq!(env.units_owned(), array![8.0, 0.0, 0.0]);
        assert!((env.cash() - 4.0).abs() < 1e-9);
        assert!((info.current_value - 100.0).abs() < 1e-9);
        assert!(reward.0.abs() < 1e-9);
        assert_eq!(obs.0[3], 12.0);
    }

    #[test]
    fn test_reward_is_change_in_portfolio_value() {
        let mut env = env(100.0);
        env.reset().unwrap();
        env.step(action(&env, vec![Buy, Hold, Hold])).unwrap();

        // Row 1 -> row 2: unit 0 falls from 12 to 11, 8 units held.
        let (_, reward, _, _) = env.step(env.action_space().hold_all()).unwrap();

        assert!((reward.0 - (-8.0)).abs() < 1e-9);
    }

    #[test]
    fn test_sell_then_buy_in_the_same_step() {
        let mut env = env(100.0);
        env.reset().unwrap();
        env.step(action(&env, vec![Buy, Hold, Hold])).unwrap();
        assert_eq!(env.units_owned(), array![8.0, 0.0, 0.0]);

        // Row 2 prices [11, 19, 31]. Selling 8 @ 11 = 88 (+4 cash) funds unit 1 @ 19.
        env.step(action(&env, vec![Sell, Buy, Hold])).unwrap();

        assert_eq!(env.units_owned(), array![0.0, 4.0, 0.0]);
        assert!((env.cash() - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_cash_stays_non_negative_under_random_play() {
        let mut env = env(1_000.0);
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..200 {
            env.reset().unwrap();
            loop {
                let a = env.action_space().sample(&mut rng);
                let (_, _, outcome, _) = env.step(a).unwrap();
                assert!(env.cash() >= 0.0, "Cash went negative: {}", env.cash());
                assert!(env.units_owned().iter().all(|u| *u >= 0.0));
                if outcome.is_done() {
                    break;
                }
            }
        }
    }

    #[test]
    fn test_fresh_copy_starts_ready() {
        let mut env = env(1_000.0);
        env.reset().unwrap();
        env.step(env.action_space().hold_all()).unwrap();

        let fresh = env.fresh();

        assert!(fresh.status().is_ready());
        assert_eq!(fresh.current_step(), 0);
        assert_eq!(fresh.cash(), 1_000.0);
    }
}
