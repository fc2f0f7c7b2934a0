//! The twocrypto-ng invariant `D` and the spot price derived from it.

use {
    super::{
        error::Error,
        fixed_point::{PRECISION, SafeMath, abs_diff},
        math::{
            A_MULTIPLIER,
            MAX_A,
            MAX_D,
            MAX_FRAC,
            MAX_GAMMA,
            MAX_X0,
            MIN_A,
            MIN_D,
            MIN_FRAC,
            MIN_GAMMA,
            MIN_X0,
            N_COINS,
            geometric_mean,
            n_coins,
            sort,
        },
    },
    primitive_types::U256,
};

const MAX_ITERATIONS: usize = 255;

pub(super) fn validate_a_gamma(ann: U256, gamma: U256) -> Result<(), Error> {
    if ann < MIN_A || ann > MAX_A {
        return Err(Error::UnsafeA);
    }
    if gamma < *MIN_GAMMA || gamma > *MAX_GAMMA {
        return Err(Error::UnsafeGamma);
    }
    Ok(())
}

pub(super) fn validate_d(d: U256) -> Result<(), Error> {
    if d < *MIN_D || d > *MAX_D {
        return Err(Error::UnsafeD);
    }
    Ok(())
}

/// Finds the invariant `D` with Newton's method.
///
/// `ann` is `A * N**N * A_MULTIPLIER`. `k0_prev` is the `K0` of a previous
/// `get_y` call, used for a better initial guess; zero means no hint.
///
/// https://github.com/curvefi/twocrypto-ng/blob/d21b270/contracts/main/CurveCryptoMathOptimized2.vy#L376
pub fn newton_d(
    ann: U256,
    gamma: U256,
    x_unsorted: [U256; N_COINS],
    k0_prev: U256,
) -> Result<U256, Error> {
    validate_a_gamma(ann, gamma)?;

    let x = sort(x_unsorted);
    if x[0] < *MIN_X0 || x[0] > *MAX_X0 {
        return Err(Error::UnsafeX0);
    }
    if x[1].safe_mul(*PRECISION)?.safe_div(x[0])? < U256::exp10(14) {
        return Err(Error::UnsafeXi);
    }

    let d = if k0_prev.is_zero() {
        n_coins().safe_mul(geometric_mean(x)?)?
    } else {
        let d = U256::from(4)
            .safe_mul(x[0])?
            .safe_mul(x[1])?
            .safe_div(k0_prev)?
            .safe_mul(*PRECISION)?
            .integer_sqrt();
        d.min(x[0].safe_add(x[1])?)
    };

    iterate_d(ann, gamma, x, d, MAX_ITERATIONS)
}

/// Newton's method on `D` for sorted balances `x`, starting from `d`.
fn iterate_d(
    ann: U256,
    gamma: U256,
    x: [U256; N_COINS],
    mut d: U256,
    max_iterations: usize,
) -> Result<U256, Error> {
    let s = x[0].safe_add(x[1])?;
    let g1k0_base = gamma.safe_add(*PRECISION)?;
    let four = n_coins().safe_mul(n_coins())?;

    for _ in 0..max_iterations {
        if d.is_zero() {
            return Err(Error::UnsafeD);
        }
        let d_prev = d;

        // collapsed for 2 coins
        let k0 = PRECISION
            .safe_mul(four)?
            .safe_mul(x[0])?
            .safe_div(d)?
            .safe_mul(x[1])?
            .safe_div(d)?;

        let g1k0 = abs_diff(g1k0_base, k0).safe_add(1.into())?;

        // D / (A * N**N) * g1k0**2 / gamma**2
        let mul1 = PRECISION
            .safe_mul(d)?
            .safe_div(gamma)?
            .safe_mul(g1k0)?
            .safe_div(gamma)?
            .safe_mul(g1k0)?
            .safe_mul(A_MULTIPLIER)?
            .safe_div(ann)?;

        // 2 * N * K0 / g1k0
        let mul2 = PRECISION
            .safe_mul(2.into())?
            .safe_mul(n_coins())?
            .safe_mul(k0)?
            .safe_div(g1k0)?;

        let neg_fprime = s
            .safe_add(s.safe_mul(mul2)?.safe_div(*PRECISION)?)?
            .safe_add(mul1.safe_mul(n_coins())?.safe_div(k0)?)?
            .safe_sub(mul2.safe_mul(d)?.safe_div(*PRECISION)?)?;

        let d_plus = d.safe_mul(neg_fprime.safe_add(s)?)?.safe_div(neg_fprime)?;
        let mut d_minus = d.safe_mul(d)?.safe_div(neg_fprime)?;
        let correction = d
            .safe_mul(mul1.safe_div(neg_fprime)?)?
            .safe_div(*PRECISION)?
            .safe_mul(abs_diff(*PRECISION, k0))?
            .safe_div(k0)?;
        d_minus = if *PRECISION > k0 {
            d_minus.safe_add(correction)?
        } else {
            d_minus.safe_sub(correction)?
        };

        d = if d_plus > d_minus {
            d_plus - d_minus
        } else {
            (d_minus - d_plus) / 2
        };

        let diff = abs_diff(d, d_prev);
        if diff.safe_mul(U256::exp10(14))? < d.max(U256::exp10(16)) {
            // Test that we are safe with the next get_y.
            let min_frac = *MIN_FRAC / n_coins();
            let max_frac = *MAX_FRAC / n_coins();
            for balance in x {
                let frac = balance.safe_mul(*PRECISION)?.safe_div(d)?;
                if frac < min_frac || frac > max_frac {
                    return Err(Error::UnsafeXi);
                }
            }
            return Ok(d);
        }
    }

    Err(Error::DDoesNotConverge)
}

/// Price of the second coin in terms of the first (dx/dy) at balances `xp`,
/// in `xp` space. Multiply by the price scale to get the real price.
///
/// https://github.com/curvefi/twocrypto-ng/blob/d21b270/contracts/main/CurveCryptoMathOptimized2.vy#L465
pub fn get_p(xp: [U256; N_COINS], d: U256, a: U256, gamma: U256) -> Result<U256, Error> {
    validate_d(d)?;
    let e36 = U256::exp10(36);

    // K0 = P * N**N / D**N, dimensionless with 36 decimals.
    let k0 = U256::from(4)
        .safe_mul(xp[0].safe_mul(xp[1])?)?
        .safe_div(d)?
        .safe_mul(e36)?
        .safe_div(d)?;

    // GK0 = 2 * K0**3 + (gamma + 1)**2 - K0**2 * (2 * gamma + 3), 36 decimals.
    let k0_squared = k0.safe_mul(k0)?.safe_div(e36)?;
    let gk0 = U256::from(2)
        .safe_mul(k0.safe_mul(k0)?)?
        .safe_div(e36)?
        .safe_mul(k0)?
        .safe_div(e36)?
        .safe_add(gamma.safe_add(*PRECISION)?.pow(2.into()))?
        .safe_sub(
            k0_squared
                .safe_mul(U256::from(2).safe_mul(gamma)?.safe_add(U256::exp10(18) * 3)?)?
                .safe_div(*PRECISION)?,
        )?;

    // N**N * A * gamma**2
    let nnag2 = a.safe_mul(gamma.safe_mul(gamma)?)?.safe_div(A_MULTIPLIER)?;

    let term = |balance: U256| -> Result<U256, Error> {
        nnag2
            .safe_mul(balance)?
            .safe_div(d)?
            .safe_mul(k0)?
            .safe_div(e36)
    };
    let denominator = gk0.safe_add(term(xp[0])?)?;

    xp[0]
        .safe_mul(gk0.safe_add(term(xp[1])?)?)?
        .safe_div(xp[1])?
        .safe_mul(*PRECISION)?
        .safe_div(denominator)
}
