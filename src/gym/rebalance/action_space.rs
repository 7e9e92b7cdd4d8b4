use std::sync::Arc;

use itertools::Itertools;
use rand::Rng;
use strum::{EnumCount, IntoEnumIterator};

use crate::{
    error::{AgentError, EnvError, RebalancerResult},
    gym::rebalance::action::{ActionId, Orders, TradeAction},
};

/// Largest universe for which the joint action table is materialized (`3^10 = 59_049`).
pub const MAX_UNITS: usize = 10;

/// The finite enumeration of joint rebalancing actions.
///
/// Index `k` maps to the base-3 expansion of `k` over the units, most significant unit first:
/// for three units `0 -> [sell, sell, sell]`, `1 -> [sell, sell, hold]`, `5 -> [sell, hold, buy]`.
/// The table is built once and shared, so decoding is a lookup.
#[derive(Debug, Clone)]
pub struct ActionSpace {
    n_units: usize,
    table: Arc<[Orders]>,
}

impl ActionSpace {
    pub fn new(n_units: usize) -> RebalancerResult<Self> {
        if n_units == 0 || n_units > MAX_UNITS {
            return Err(EnvError::InvalidConfig(format!(
                "Action space supports 1..={MAX_UNITS} units, got {n_units}"
            ))
            .into());
        }

        let table = (0..n_units)
            .map(|_| TradeAction::iter())
            .multi_cartesian_product()
            .map(Orders)
            .collect::<Arc<[_]>>();

        Ok(Self { n_units, table })
    }

    /// Number of joint actions, `3^G`.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn n_units(&self) -> usize {
        self.n_units
    }

    pub fn contains(&self, action: ActionId) -> bool {
        action.0 < self.len()
    }

    /// Translate a flat index into per-unit orders.
    pub fn decode(&self, action: ActionId) -> RebalancerResult<&Orders> {
        self.table.get(action.0).ok_or_else(|| {
            EnvError::InvalidAction {
                action: action.0,
                size: self.len(),
            }
            .into()
        })
    }

    /// Inverse of [`ActionSpace::decode`].
    pub fn encode(&self, orders: &Orders) -> RebalancerResult<ActionId> {
        if orders.len() != self.n_units {
            return Err(AgentError::ShapeMismatch {
                context: "action encoding",
                expected: self.n_units,
                actual: orders.len(),
            }
            .into());
        }

        let index = orders
            .0
            .iter()
            .fold(0, |acc, a| acc * TradeAction::COUNT + a.digit());
        Ok(ActionId(index))
    }

    /// The joint action that holds every unit.
    pub fn hold_all(&self) -> ActionId {
        // Every digit is `Hold`, i.e. (3^G - 1) / 2.
        ActionId((self.len() - 1) / 2)
    }

    /// Draw a joint action uniformly at random.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> ActionId {
        ActionId(rng.random_range(0..self.len()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (ActionId, &Orders)> {
        self.table.iter().enumerate().map(|(i, o)| (ActionId(i), o))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::gym::rebalance::action::TradeAction::{Buy, Hold, Sell};

    #[test]
    fn test_size_is_three_to_the_power_of_units() {
        for g in 1..=5 {
            let space = ActionSpace::new(g).unwrap();
            assert_eq!(space.len(), 3usize.pow(g as u32));
            assert_eq!(space.n_units(), g);
        }
    }

    #[test]
    fn test_lexicographic_order_most_significant_unit_first() {
        let space = ActionSpace::new(3).unwrap();

        assert_eq!(space.decode(ActionId(0)).unwrap().0, vec![Sell, Sell, Sell]);
        assert_eq!(space.decode(ActionId(1)).unwrap().0, vec![Sell, Sell, Hold]);
        assert_eq!(space.decode(ActionId(2)).unwrap().0, vec![Sell, Sell, Buy]);
        assert_eq!(space.decode(ActionId(3)).unwrap().0, vec![Sell, Hold, Sell]);
        assert_eq!(space.decode(ActionId(21)).unwrap().0, vec![Buy, Sell, Sell]);
        assert_eq!(space.decode(ActionId(26)).unwrap().0, vec![Buy, Buy, Buy]);
    }

    #[test]
    fn test_encoding_is_a_bijection() {
        for g in 1..=4 {
            let space = ActionSpace::new(g).unwrap();
            let mut seen = HashSet::new();

            for (id, orders) in space.iter() {
                assert_eq!(orders.len(), g);
                assert!(seen.insert(orders.clone()), "Duplicate orders for {id:?}");
                assert_eq!(space.encode(orders).unwrap(), id, "Roundtrip failed");
            }

            assert_eq!(seen.len(), space.len());
        }
    }

    #[test]
    fn test_hold_all_index() {
        let space = ActionSpace::new(3).unwrap();
        let hold = space.hold_all();

        assert_eq!(hold, ActionId(13));
        assert_eq!(space.decode(hold).unwrap(), &Orders::hold_all(3));
    }

    #[test]
    fn test_decode_out_of_range_is_rejected() {
        let space = ActionSpace::new(2).unwrap();

        assert!(space.contains(ActionId(8)));
        assert!(!space.contains(ActionId(9)));
        assert!(space.decode(ActionId(9)).is_err());
    }

    #[test]
    fn test_encode_rejects_wrong_length() {
        let space = ActionSpace::new(3).unwrap();
        let orders = Orders::from(vec![Buy, Hold]);

        assert!(space.encode(&orders).is_err());
    }

    #[test]
    fn test_unit_count_bounds() {
        assert!(ActionSpace::new(0).is_err());
        assert!(ActionSpace::new(MAX_UNITS + 1).is_err());
    }

    #[test]
    fn test_sample_stays_in_range() {
        let space = ActionSpace::new(3).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..1_000 {
            assert!(space.contains(space.sample(&mut rng)));
        }
    }
}
