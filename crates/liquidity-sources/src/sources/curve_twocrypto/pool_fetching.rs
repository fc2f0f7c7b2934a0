//! Pool state of a twocrypto-ng pool and its decoding from the persisted
//! pool record produced by the indexer.

use {
    super::{Config, swap::math::N_COINS},
    anyhow::{Context, Result, anyhow, ensure},
    number::serialization::HexOrDecimalU256,
    primitive_types::{H160, U256},
    serde::Deserialize,
    serde_with::serde_as,
};

/// Tokens with more decimals can't be scaled up to 18 decimals.
const MAX_DECIMALS: u8 = 18;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token {
    pub address: H160,
    pub symbol: String,
    pub decimals: u8,
}

impl Token {
    /// `10**(18 - decimals)`, the factor scaling raw balances to 18 decimals.
    pub fn precision_multiplier(&self) -> Result<U256> {
        ensure!(
            self.decimals <= MAX_DECIMALS,
            "token {:?} has {} decimals",
            self.address,
            self.decimals
        );
        Ok(U256::exp10(usize::from(MAX_DECIMALS - self.decimals)))
    }
}

/// Parameters of a linear `A`/`gamma` ramp. Outside of a ramp the initial
/// and future values are equal.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AmpGamma {
    pub initial_a: U256,
    pub future_a: U256,
    pub initial_gamma: U256,
    pub future_gamma: U256,
    pub initial_time: u64,
    pub future_time: u64,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Invariant {
    pub d: U256,
    pub xcp_profit: U256,
    pub virtual_price: U256,
}

/// Price of coin 1 in terms of coin 0, all with 18 decimals.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PriceState {
    pub price_scale: U256,
    pub price_oracle: U256,
    pub last_prices: U256,
    pub last_prices_timestamp: u64,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Fees {
    pub fee_gamma: U256,
    pub mid_fee: U256,
    pub out_fee: U256,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Rebalancing {
    pub allowed_extra_profit: U256,
    pub adjustment_step: U256,
    /// `None` means the stored price oracle is used as is.
    pub ma_time: Option<U256>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PoolState {
    pub reserves: [U256; N_COINS],
    pub precision_multipliers: [U256; N_COINS],
    pub amp_gamma: AmpGamma,
    pub invariant: Invariant,
    pub price: PriceState,
    pub fees: Fees,
    pub rebalancing: Rebalancing,
    pub lp_supply: U256,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Pool {
    pub address: H160,
    pub tokens: [Token; N_COINS],
    pub state: PoolState,
    /// Static gas estimate of a swap.
    pub gas: usize,
}

/// A pool as persisted by the indexer.
#[serde_as]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PoolRecord {
    pub address: H160,
    #[serde_as(as = "Vec<HexOrDecimalU256>")]
    pub reserves: Vec<U256>,
    pub tokens: Vec<TokenRecord>,
    /// JSON encoded [`Extra`].
    pub extra: String,
    pub timestamp: u64,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct TokenRecord {
    pub address: H160,
    #[serde(default)]
    pub symbol: String,
    pub decimals: u8,
}

/// Mutable pool state. The price fields are single element arrays in the
/// record since the format is shared with pools of more than two coins.
#[serde_as]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Extra {
    #[serde_as(as = "HexOrDecimalU256")]
    pub initial_a: U256,
    #[serde_as(as = "HexOrDecimalU256")]
    pub future_a: U256,
    #[serde_as(as = "HexOrDecimalU256")]
    pub initial_gamma: U256,
    #[serde_as(as = "HexOrDecimalU256")]
    pub future_gamma: U256,
    pub initial_a_gamma_time: u64,
    pub future_a_gamma_time: u64,
    #[serde_as(as = "HexOrDecimalU256")]
    pub d: U256,
    #[serde_as(as = "[HexOrDecimalU256; 1]")]
    pub price_scale: [U256; 1],
    #[serde_as(as = "[HexOrDecimalU256; 1]")]
    pub price_oracle: [U256; 1],
    #[serde_as(as = "[HexOrDecimalU256; 1]")]
    pub last_prices: [U256; 1],
    pub last_prices_timestamp: u64,
    #[serde_as(as = "HexOrDecimalU256")]
    pub fee_gamma: U256,
    #[serde_as(as = "HexOrDecimalU256")]
    pub mid_fee: U256,
    #[serde_as(as = "HexOrDecimalU256")]
    pub out_fee: U256,
    #[serde_as(as = "HexOrDecimalU256")]
    pub lp_supply: U256,
    #[serde_as(as = "HexOrDecimalU256")]
    pub xcp_profit: U256,
    #[serde_as(as = "HexOrDecimalU256")]
    pub virtual_price: U256,
    #[serde_as(as = "HexOrDecimalU256")]
    pub allowed_extra_profit: U256,
    #[serde_as(as = "HexOrDecimalU256")]
    pub adjustment_step: U256,
    #[serde_as(as = "Option<HexOrDecimalU256>")]
    #[serde(default)]
    pub ma_time: Option<U256>,
}

impl Pool {
    pub fn try_from_record(record: PoolRecord, config: &Config) -> Result<Self> {
        let tokens: [TokenRecord; N_COINS] = record
            .tokens
            .try_into()
            .map_err(|tokens: Vec<_>| anyhow!("expected 2 tokens, got {}", tokens.len()))?;
        let reserves: [U256; N_COINS] = record
            .reserves
            .try_into()
            .map_err(|reserves: Vec<_>| anyhow!("expected 2 reserves, got {}", reserves.len()))?;
        let extra: Extra = serde_json::from_str(&record.extra)
            .with_context(|| format!("invalid extra of pool {:?}", record.address))?;

        let tokens = tokens.map(|token| Token {
            address: token.address,
            symbol: token.symbol,
            decimals: token.decimals,
        });
        let precision_multipliers = [
            tokens[0].precision_multiplier()?,
            tokens[1].precision_multiplier()?,
        ];
        let [price_scale] = extra.price_scale;
        let [price_oracle] = extra.price_oracle;
        let [last_prices] = extra.last_prices;

        Ok(Self {
            address: record.address,
            tokens,
            state: PoolState {
                reserves,
                precision_multipliers,
                amp_gamma: AmpGamma {
                    initial_a: extra.initial_a,
                    future_a: extra.future_a,
                    initial_gamma: extra.initial_gamma,
                    future_gamma: extra.future_gamma,
                    initial_time: extra.initial_a_gamma_time,
                    future_time: extra.future_a_gamma_time,
                },
                invariant: Invariant {
                    d: extra.d,
                    xcp_profit: extra.xcp_profit,
                    virtual_price: extra.virtual_price,
                },
                price: PriceState {
                    price_scale,
                    price_oracle,
                    last_prices,
                    last_prices_timestamp: extra.last_prices_timestamp,
                },
                fees: Fees {
                    fee_gamma: extra.fee_gamma,
                    mid_fee: extra.mid_fee,
                    out_fee: extra.out_fee,
                },
                rebalancing: Rebalancing {
                    allowed_extra_profit: extra.allowed_extra_profit,
                    adjustment_step: extra.adjustment_step,
                    ma_time: extra
                        .ma_time
                        .or_else(|| config.default_ma_time.map(U256::from)),
                },
                lp_supply: extra.lp_supply,
            },
            gas: config.exchange_gas_cost,
        })
    }

    /// Index of `token` in the pool.
    pub fn token_index(&self, token: H160) -> Option<usize> {
        self.tokens.iter().position(|t| t.address == token)
    }
}
