//! Off-chain pricing of on-chain liquidity.

pub mod baseline_solver;
pub mod conversions;
pub mod sources;
