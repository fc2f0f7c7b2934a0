//! Supported liquidity sources.

pub mod curve_twocrypto;
