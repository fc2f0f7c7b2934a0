use {super::swap::EXCHANGE_GAS_COST, anyhow::Context, serde::Deserialize};

/// Settings of the twocrypto-ng liquidity source, usually read from a
/// `curve-twocrypto.toml` file.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Static gas estimate attached to every quote.
    #[serde(default = "default_exchange_gas_cost")]
    pub exchange_gas_cost: usize,

    /// EMA half-life in seconds (scaled by `1/ln(2)` like the contract's
    /// `ma_time`) for pools whose record doesn't carry one. Without it the
    /// stored price oracle is taken as current.
    #[serde(default)]
    pub default_ma_time: Option<u64>,
}

fn default_exchange_gas_cost() -> usize {
    EXCHANGE_GAS_COST
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exchange_gas_cost: EXCHANGE_GAS_COST,
            default_ma_time: None,
        }
    }
}

impl Config {
    pub fn from_toml(toml: &str) -> anyhow::Result<Self> {
        toml::from_str(toml).context("invalid curve twocrypto config")
    }
}
