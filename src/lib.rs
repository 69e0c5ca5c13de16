//! valuesim — point-in-time backtester for a value-investing strategy.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in
//! [`ports`], concrete implementations in [`adapters`]. Every historical
//! data read passes through the temporal gate in [`domain::snapshot`], the
//! chronology boundary that keeps the simulation free of look-ahead bias.

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
