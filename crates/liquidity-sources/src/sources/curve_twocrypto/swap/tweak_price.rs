//! Post-trade update of the price oracle, price scale and profit tracking.
//!
//! https://github.com/curvefi/twocrypto-ng/blob/d21b270/contracts/main/CurveTwocryptoOptimized.vy#L1129

use {
    super::{
        error::Error,
        fixed_point::{PRECISION, SafeMath, abs_diff},
        invariant::{get_p, newton_d},
        math::{N_COINS, n_coins, wad_exp},
        signed_fixed_point::I256,
    },
    crate::sources::curve_twocrypto::pool_fetching::{Invariant, PoolState, PriceState},
    primitive_types::U256,
};

/// Price and invariant state a pool would have after committing a trade.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TweakedState {
    pub price: PriceState,
    pub invariant: Invariant,
}

/// Runs the contract's `tweak_price` on the post-trade scaled balances `xp`.
/// `new_d` of zero means the invariant is recomputed from `xp`, using
/// `k0_prev` as a starting point.
pub fn tweak_price(
    a: U256,
    gamma: U256,
    xp: [U256; N_COINS],
    new_d: U256,
    k0_prev: U256,
    now: u64,
    state: &PoolState,
) -> Result<TweakedState, Error> {
    let PriceState {
        price_scale,
        mut price_oracle,
        last_prices_timestamp,
        ..
    } = state.price;
    let rebalancing = &state.rebalancing;

    // Update the moving average oracle at most once per block.
    let mut timestamp = last_prices_timestamp;
    if last_prices_timestamp < now {
        if let Some(ma_time) = rebalancing.ma_time {
            let elapsed = U256::from(now - last_prices_timestamp);
            // A zero `ma_time` divides to zero like the contract's `unsafe_div`,
            // which leaves the oracle where it was.
            let exponent = elapsed
                .safe_mul(*PRECISION)?
                .checked_div(ma_time)
                .unwrap_or_default();
            let alpha = wad_exp(&I256::from_u256(exponent)?.neg()?)?;
            let capped_last_prices = state
                .price
                .last_prices
                .min(price_scale.safe_mul(n_coins())?);
            price_oracle = capped_last_prices
                .safe_mul(PRECISION.safe_sub(alpha)?)?
                .safe_add(price_oracle.safe_mul(alpha)?)?
                / *PRECISION;
        }
        timestamp = now;
    }

    let d_unadjusted = if new_d.is_zero() {
        newton_d(a, gamma, xp, k0_prev)?
    } else {
        new_d
    };
    let last_prices = get_p(xp, d_unadjusted, a, gamma)?.safe_mul(price_scale)? / *PRECISION;

    let old_virtual_price = state.invariant.virtual_price;
    let (virtual_price, xcp_profit) = if old_virtual_price.is_zero() {
        (*PRECISION, *PRECISION)
    } else {
        let virtual_price = virtual_price_at(d_unadjusted, price_scale, state.lp_supply)?;
        let xcp_profit = state
            .invariant
            .xcp_profit
            .safe_mul(virtual_price)?
            .safe_div(old_virtual_price)?;
        if state.amp_gamma.future_time < now && virtual_price <= old_virtual_price {
            return Err(Error::Loss);
        }
        (virtual_price, xcp_profit)
    };

    let price = PriceState {
        price_scale,
        price_oracle,
        last_prices,
        last_prices_timestamp: timestamp,
    };
    let unadjusted = TweakedState {
        price: price.clone(),
        invariant: Invariant {
            d: d_unadjusted,
            xcp_profit,
            virtual_price,
        },
    };

    // Only rebalance when half of the profit above the baseline would be left
    // afterwards.
    let threshold = xcp_profit.safe_add(
        rebalancing
            .allowed_extra_profit
            .safe_mul(n_coins())?,
    )?;
    if virtual_price.safe_mul(n_coins())?.safe_sub(*PRECISION)? <= threshold {
        return Ok(unadjusted);
    }

    let norm = abs_diff(
        price_oracle.safe_mul(*PRECISION)?.safe_div(price_scale)?,
        *PRECISION,
    );
    let adjustment_step = rebalancing.adjustment_step.max(norm / 5);
    if norm <= adjustment_step {
        return Ok(unadjusted);
    }

    let p_new = price_scale
        .safe_mul(norm - adjustment_step)?
        .safe_add(adjustment_step.safe_mul(price_oracle)?)?
        .safe_div(norm)?;
    let xp = [xp[0], xp[1].safe_mul(p_new)?.safe_div(price_scale)?];
    let d = newton_d(a, gamma, xp, U256::zero())?;
    let new_virtual_price = virtual_price_at(d, p_new, state.lp_supply)?;

    if new_virtual_price > *PRECISION
        && new_virtual_price.safe_mul(n_coins())?.safe_sub(*PRECISION)? > xcp_profit
    {
        tracing::trace!(%price_scale, %p_new, "price scale adjusted");
        return Ok(TweakedState {
            price: PriceState {
                price_scale: p_new,
                ..price
            },
            invariant: Invariant {
                d,
                xcp_profit,
                virtual_price: new_virtual_price,
            },
        });
    }

    Ok(unadjusted)
}

/// `10**18 * xcp / supply` where `xcp` is the geometric mean of the balances
/// a pool with invariant `d` holds at `price_scale`.
fn virtual_price_at(d: U256, price_scale: U256, lp_supply: U256) -> Result<U256, Error> {
    let xcp_xp = [
        d / n_coins(),
        d.safe_mul(*PRECISION)?
            .safe_div(n_coins().safe_mul(price_scale)?)?,
    ];
    PRECISION
        .safe_mul(xcp_xp[0].safe_mul(xcp_xp[1])?.integer_sqrt())?
        .safe_div(lp_supply)
}
