//! Multi-grid portfolio rebalancing environment.
//!
//! State is `[units_owned (G), valuations (G), cash]`; actions are the `3^G` joint
//! sell/hold/buy choices over the `G` units.

pub mod action;
pub mod action_space;
pub mod config;
pub mod env;
pub mod observation;
pub mod portfolio;
