//! backsim — historical daily-price backtesting engine.
//!
//! Hexagonal architecture: simulation core in [`domain`], port traits in
//! [`ports`], concrete implementations in [`adapters`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
