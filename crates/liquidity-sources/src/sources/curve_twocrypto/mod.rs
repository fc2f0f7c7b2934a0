//! Curve twocrypto-ng: two coin cryptoswap pools with a concentrated
//! liquidity invariant and a repegging price scale.
//!
//! https://github.com/curvefi/twocrypto-ng

mod config;
pub mod pool_fetching;
pub mod swap;

pub use {
    config::Config,
    pool_fetching::{Pool, PoolRecord},
    swap::{CalcAmountInResult, CalcAmountOutResult, SwapError, SwapInfo},
};
