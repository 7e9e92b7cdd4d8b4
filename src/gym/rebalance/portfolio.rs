use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::gym::rebalance::action::Orders;

/// Holdings of the agent: whole units per grid plus uninvested cash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    units_owned: Array1<f64>,
    cash: f64,
}

/// What a single rebalance actually executed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TradeSummary {
    pub units_sold: f64,
    pub units_bought: u64,
    pub proceeds: f64,
    pub spent: f64,
}

impl Portfolio {
    /// An empty portfolio holding only `cash`.
    pub fn new(n_units: usize, cash: f64) -> Self {
        Self {
            units_owned: Array1::zeros(n_units),
            cash,
        }
    }

    pub fn units_owned(&self) -> ArrayView1<'_, f64> {
        self.units_owned.view()
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn n_units(&self) -> usize {
        self.units_owned.len()
    }

    /// Mark-to-market value: `Σ units_owned[i] * prices[i] + cash`.
    pub fn value(&self, prices: ArrayView1<f64>) -> f64 {
        self.units_owned.dot(&prices) + self.cash
    }

    /// Execute `orders` at `prices`.
    ///
    /// # Execution Order
    ///
    /// 1. Every sell-marked unit is liquidated in full and the proceeds are credited.
    /// 2. Buy-marked units are bought one whole unit at a time, round-robin in ascending
    ///    unit index, as long as `cash > price`. The loop ends after the first full pass
    ///    in which nothing was affordable.
    ///
    /// The allocation is greedy and order-sensitive, but fully deterministic.
    /// Non-positive prices are never bought, so the loop always terminates.
    pub fn rebalance(&mut self, orders: &Orders, prices: ArrayView1<f64>) -> TradeSummary {
        let mut summary = TradeSummary::default();

        for i in orders.sells() {
            let proceeds = self.units_owned[i] * prices[i];
            summary.units_sold += self.units_owned[i];
            summary.proceeds += proceeds;
            self.cash += proceeds;
            self.units_owned[i] = 0.0;
        }

        let buys = orders.buys().collect::<Vec<_>>();
        if buys.is_empty() {
            return summary;
        }

        loop {
            let mut bought_in_pass = false;
            for &i in &buys {
                let price = prices[i];
                if price > 0.0 && self.cash > price {
                    self.units_owned[i] += 1.0;
                    self.cash -= price;
                    summary.units_bought += 1;
                    summary.spent += price;
                    bought_in_pass = true;
                }
            }
            if !bought_in_pass {
                break;
            }
        }

        summary
    }
}
