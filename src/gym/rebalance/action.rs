use serde::{Deserialize, Serialize};
use strum::{Display, EnumCount, EnumIter, EnumString, FromRepr};

use crate::impl_from_primitive;

// ================================================================================================
// Action Index
// ================================================================================================

/// Flat index of a joint action, in `[0, 3^G)` for `G` units.
///
/// This is what the Q-network outputs a value for and what the replay memory stores.
/// Use [`super::action_space::ActionSpace`] to translate it into per-unit orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActionId(pub usize);
impl_from_primitive!(ActionId, usize);

// ================================================================================================
// Per-Unit Trade Order
// ================================================================================================

/// What to do with a single unit during a rebalancing step.
///
/// The discriminants are the base-3 digits of an [`ActionId`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    EnumCount,
    Display,
    FromRepr,
)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum TradeAction {
    /// Liquidate every unit owned.
    Sell = 0,
    Hold = 1,
    /// Buy whole units one at a time while cash allows.
    Buy = 2,
}

impl TradeAction {
    pub fn digit(&self) -> usize {
        *self as usize
    }
}

// ================================================================================================
// Joint Orders
// ================================================================================================

/// One [`TradeAction`] per unit, indexed by unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Orders(pub Vec<TradeAction>);

impl Orders {
    /// Every unit held: the no-op rebalance.
    pub fn hold_all(n_units: usize) -> Self {
        Self(vec![TradeAction::Hold; n_units])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Unit indices marked for sale, in ascending order.
    pub fn sells(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices_of(TradeAction::Sell)
    }

    /// Unit indices marked for purchase, in ascending order.
    pub fn buys(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices_of(TradeAction::Buy)
    }

    fn indices_of(&self, kind: TradeAction) -> impl Iterator<Item = usize> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter(move |(_, a)| **a == kind)
            .map(|(i, _)| i)
    }
}

impl From<Vec<TradeAction>> for Orders {
    fn from(actions: Vec<TradeAction>) -> Self {
        Self(actions)
    }
}

impl FromIterator<TradeAction> for Orders {
    fn from_iter<T: IntoIterator<Item = TradeAction>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_trade_action_digits_match_discriminants() {
        assert_eq!(TradeAction::from_repr(0), Some(TradeAction::Sell));
        assert_eq!(TradeAction::from_repr(1), Some(TradeAction::Hold));
        assert_eq!(TradeAction::from_repr(2), Some(TradeAction::Buy));
        assert_eq!(TradeAction::from_repr(3), None);
        assert_eq!(TradeAction::Buy.digit(), 2);
    }

    #[test]
    fn test_trade_action_parses_lowercase() {
        assert_eq!(TradeAction::from_str("sell").unwrap(), TradeAction::Sell);
        assert_eq!(TradeAction::Hold.to_string(), "hold");
        assert!(TradeAction::from_str("short").is_err());
    }

    #[test]
    fn test_orders_split_into_sells_and_buys() {
        let orders = Orders::from(vec![
            TradeAction::Buy,
            TradeAction::Sell,
            TradeAction::Hold,
            TradeAction::Buy,
        ]);

        assert_eq!(orders.sells().collect::<Vec<_>>(), vec![1]);
        assert_eq!(orders.buys().collect::<Vec<_>>(), vec![0, 3]);
    }
}
