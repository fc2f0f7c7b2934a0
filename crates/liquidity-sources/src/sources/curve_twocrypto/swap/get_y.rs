//! Solving the twocrypto-ng invariant for one balance given the other one
//! and `D`.
//!
//! For two coins the invariant is a cubic in `y`, so the contract first tries
//! the closed form solution and only runs Newton's method when the cubic's
//! discriminant is not positive.

use {
    super::{
        error::Error,
        fixed_point::{PRECISION, SafeMath, abs_diff},
        invariant::{validate_a_gamma, validate_d},
        math::{A_MULTIPLIER, MAX_GAMMA_SMALL, N_COINS, cbrt, n_coins},
        signed_fixed_point::I256,
    },
    primitive_types::U256,
};

const MAX_ITERATIONS: usize = 255;

/// Coefficient divider keyed by the magnitude of the cubic's terms, as
/// `(threshold exponent, divider exponent)` pairs. Below `1e20` nothing is
/// divided.
const DIVIDER_LADDER: [(u32, u32); 14] = [
    (48, 30),
    (46, 28),
    (44, 26),
    (42, 24),
    (40, 22),
    (38, 20),
    (36, 18),
    (34, 16),
    (32, 14),
    (30, 12),
    (28, 10),
    (26, 8),
    (24, 6),
    (20, 2),
];

/// Outcome of solving the cubic analytically.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CubicSolution {
    Analytic { y: U256, k0: U256 },
    /// The discriminant is not positive; `y` has to be found iteratively.
    NeedsIterativeFallback,
}

/// Computes the new balance of coin `i` given the balance of the other coin
/// and the invariant `d`. Also returns the `K0` value of the solution, to be
/// used as a hint for [`super::invariant::newton_d`]. `K0` is zero when the
/// iterative fallback was used.
///
/// https://github.com/curvefi/twocrypto-ng/blob/d21b270/contracts/main/CurveCryptoMathOptimized2.vy#L229
pub fn get_y(
    ann: U256,
    gamma: U256,
    x: [U256; N_COINS],
    d: U256,
    i: usize,
) -> Result<(U256, U256), Error> {
    validate_a_gamma(ann, gamma)?;
    validate_d(d)?;
    if i >= N_COINS {
        return Err(Error::CoinIndexOutOfRange);
    }
    let lim_mul = lim_mul(gamma)?;

    match solve_cubic(ann, gamma, x, d, i, lim_mul)? {
        CubicSolution::Analytic { y, k0 } => {
            check_y_fraction(y, d, lim_mul)?;
            Ok((y, k0))
        }
        CubicSolution::NeedsIterativeFallback => {
            tracing::trace!(%ann, %gamma, %d, i, "cubic has no real root, solving with newton");
            Ok((newton_y_unchecked(ann, gamma, x, d, i, lim_mul)?, U256::zero()))
        }
    }
}

/// Computes the new balance of coin `i` with Newton's method only.
///
/// https://github.com/curvefi/twocrypto-ng/blob/d21b270/contracts/main/CurveCryptoMathOptimized2.vy#L210
pub fn newton_y(
    ann: U256,
    gamma: U256,
    x: [U256; N_COINS],
    d: U256,
    i: usize,
) -> Result<U256, Error> {
    validate_a_gamma(ann, gamma)?;
    validate_d(d)?;
    if i >= N_COINS {
        return Err(Error::CoinIndexOutOfRange);
    }
    let lim_mul = lim_mul(gamma)?;
    let y = newton_y_unchecked(ann, gamma, x, d, i, lim_mul)?;
    check_y_fraction(y, d, lim_mul)?;
    Ok(y)
}

/// `100.0`, shrinking as gamma grows past `MAX_GAMMA_SMALL`.
fn lim_mul(gamma: U256) -> Result<U256, Error> {
    let lim_mul = U256::exp10(20);
    if gamma > *MAX_GAMMA_SMALL {
        return lim_mul.safe_mul(*MAX_GAMMA_SMALL)?.safe_div(gamma);
    }
    Ok(lim_mul)
}

/// Balance of the coin that is not `i`.
fn other_balance(x: [U256; N_COINS], i: usize) -> Result<U256, Error> {
    match i {
        0 => Ok(x[1]),
        1 => Ok(x[0]),
        _ => Err(Error::CoinIndexOutOfRange),
    }
}

fn check_k0_i(x_j: U256, d: U256, lim_mul: U256) -> Result<(), Error> {
    let k0_i = PRECISION
        .safe_mul(n_coins())?
        .safe_mul(x_j)?
        .safe_div(d)?;
    if k0_i < U256::exp10(36).safe_div(lim_mul)? || k0_i > lim_mul {
        return Err(Error::UnsafeXi);
    }
    Ok(())
}

fn check_y_fraction(y: U256, d: U256, lim_mul: U256) -> Result<(), Error> {
    let frac = y.safe_mul(*PRECISION)?.safe_div(d)?;
    let lower = (U256::exp10(36) / n_coins()).safe_div(lim_mul)?;
    let upper = lim_mul / n_coins();
    if frac < lower || frac > upper {
        return Err(Error::UnsafeY);
    }
    Ok(())
}

/// Solves `a*y**3 + b*y**2 + c*y + d = 0` for the normalised balance.
pub fn solve_cubic(
    ann: U256,
    gamma: U256,
    x: [U256; N_COINS],
    d: U256,
    i: usize,
    lim_mul: U256,
) -> Result<CubicSolution, Error> {
    let x_j = other_balance(x, i)?;
    check_k0_i(x_j, d, lim_mul)?;

    let ann = I256::from_u256(ann)?;
    let gamma = I256::from_u256(gamma)?;
    let big_d = I256::from_u256(d)?;
    let x_j = I256::from_u256(x_j)?;
    let gamma2 = gamma.safe_mul(&gamma)?;
    let ann_gamma2 = ann.safe_mul(&gamma2)?;
    let e4 = I256::exp10(4);
    let e8_4 = I256::from(400_000_000);

    // a = 10**36 / N_COINS**2
    let mut a = I256::exp10(32);

    // b = ANN*D*gamma2/4/10000/x_j/10**4 - 10**32*3 - 2*gamma*10**14
    let mut b = big_d
        .safe_mul(&ann_gamma2)?
        .safe_div(&e8_4)?
        .safe_div(&x_j)?
        .safe_sub(&I256::exp10(32).safe_mul(&I256::from(3))?)?
        .safe_sub(&gamma.safe_mul(&I256::from(2 * 10_i128.pow(14)))?)?;

    // c = 10**32*3 + 4*gamma*10**14 + gamma2/10**4 + 4*ANN*gamma2*x_j/D/10000/4/10**4 - 4*ANN*gamma2/10000/4/10**4
    let four_ann_gamma2 = I256::from(4).safe_mul(&ann_gamma2)?.safe_div(&e8_4)?;
    let mut c = I256::exp10(32)
        .safe_mul(&I256::from(3))?
        .safe_add(&gamma.safe_mul(&I256::from(4 * 10_i128.pow(14)))?)?
        .safe_add(&gamma2.safe_div(&e4)?)?
        .safe_add(&four_ann_gamma2.safe_mul(&x_j)?.safe_div(&big_d)?)?
        .safe_sub(&four_ann_gamma2)?;

    // d = -(10**18+gamma)**2 / 10**4
    let g1 = I256::exp10(18).safe_add(&gamma)?;
    let mut dd = g1.safe_mul(&g1)?.safe_div(&e4)?.neg()?;

    let (delta0, delta1) = deltas(&a, &b, &c, &dd)?;

    let threshold = delta0.abs()?.min(delta1.abs()?).min(a.clone());
    let divider = DIVIDER_LADDER
        .iter()
        .find(|(threshold_exp, _)| threshold > I256::exp10(*threshold_exp))
        .map(|(_, divider_exp)| I256::exp10(*divider_exp))
        .unwrap_or_else(|| I256::from(1));
    a = a.safe_div(&divider)?;
    b = b.safe_div(&divider)?;
    c = c.safe_div(&divider)?;
    dd = dd.safe_div(&divider)?;

    let (delta0, delta1) = deltas(&a, &b, &c, &dd)?;

    // delta1**2 + 4*delta0**2/b*delta0
    let sqrt_arg = delta1.safe_mul(&delta1)?.safe_add(
        &I256::from(4)
            .safe_mul(&delta0.safe_mul(&delta0)?)?
            .safe_div(&b)?
            .safe_mul(&delta0)?,
    )?;
    if !sqrt_arg.is_positive() {
        return Ok(CubicSolution::NeedsIterativeFallback);
    }
    let sqrt_val = sqrt_arg.isqrt()?;

    let b_cbrt = signed_cbrt(&b)?;
    let second_cbrt = if delta1.is_positive() {
        let sum = delta1.safe_add(&sqrt_val)?.into_u256()?;
        I256::from_u256(cbrt(sum / 2)?)?
    } else {
        let difference = sqrt_val.safe_sub(&delta1)?.into_u256()?;
        I256::from_u256(cbrt(difference / 2)?)?.neg()?
    };

    let e18 = I256::exp10(18);
    // C1 = b_cbrt**2/10**18*second_cbrt/10**18
    let c1 = b_cbrt
        .safe_mul(&b_cbrt)?
        .safe_div(&e18)?
        .safe_mul(&second_cbrt)?
        .safe_div(&e18)?;

    // root = (10**18*C1 - 10**18*b - 10**18*b/C1*delta0)/(3*a)
    let root = e18
        .safe_mul(&c1)?
        .safe_sub(&e18.safe_mul(&b)?)?
        .safe_sub(&e18.safe_mul(&b)?.safe_div(&c1)?.safe_mul(&delta0)?)?
        .safe_div(&I256::from(3).safe_mul(&a)?)?;

    let y = big_d
        .safe_mul(&big_d)?
        .safe_div(&x_j)?
        .safe_mul(&root)?
        .safe_div(&I256::from(4 * 10_i128.pow(18)))?
        .into_u256()?;
    Ok(CubicSolution::Analytic {
        y,
        k0: root.into_u256()?,
    })
}

/// `delta0 = 3*a*c/b - b` and `delta1 = 9*a*c/b - 2*b - 27*a**2/b*d/b`.
fn deltas(a: &I256, b: &I256, c: &I256, d: &I256) -> Result<(I256, I256), Error> {
    let three_ac = I256::from(3).safe_mul(a)?.safe_mul(c)?;
    let delta0 = three_ac.safe_div(b)?.safe_sub(b)?;
    let delta1 = I256::from(3)
        .safe_mul(&three_ac)?
        .safe_div(b)?
        .safe_sub(&I256::from(2).safe_mul(b)?)?
        .safe_sub(
            &I256::from(27)
                .safe_mul(&a.safe_mul(a)?)?
                .safe_div(b)?
                .safe_mul(d)?
                .safe_div(b)?,
        )?;
    Ok((delta0, delta1))
}

fn signed_cbrt(value: &I256) -> Result<I256, Error> {
    if value.is_negative() {
        I256::from_u256(cbrt(value.neg()?.into_u256()?)?)?.neg()
    } else {
        I256::from_u256(cbrt(value.clone().into_u256()?)?)
    }
}

/// Newton's method on `y` without the bounds checks of the public entry
/// points.
///
/// https://github.com/curvefi/twocrypto-ng/blob/d21b270/contracts/main/CurveCryptoMathOptimized2.vy#L143
fn newton_y_unchecked(
    ann: U256,
    gamma: U256,
    x: [U256; N_COINS],
    d: U256,
    i: usize,
    lim_mul: U256,
) -> Result<U256, Error> {
    let x_j = other_balance(x, i)?;
    check_k0_i(x_j, d, lim_mul)?;
    let n_squared = n_coins().safe_mul(n_coins())?;
    let y = d.safe_mul(d)?.safe_div(x_j.safe_mul(n_squared)?)?;
    iterate_y(ann, gamma, x_j, d, y, MAX_ITERATIONS)
}

/// Newton iterations on `y` starting from `y`. Steps overshooting below zero
/// are replaced by halving the previous value.
fn iterate_y(
    ann: U256,
    gamma: U256,
    x_j: U256,
    d: U256,
    mut y: U256,
    max_iterations: usize,
) -> Result<U256, Error> {
    let k0_i = PRECISION
        .safe_mul(n_coins())?
        .safe_mul(x_j)?
        .safe_div(d)?;
    let e14 = U256::exp10(14);
    let convergence_limit = (x_j / e14).max(d / e14).max(100.into());
    let d_e18 = d.safe_mul(*PRECISION)?;
    let g1k0_base = gamma.safe_add(*PRECISION)?;

    for _ in 0..max_iterations {
        let y_prev = y;
        let k0 = k0_i.safe_mul(y)?.safe_mul(n_coins())?.safe_div(d)?;
        let s = x_j.safe_add(y)?;
        let g1k0 = abs_diff(g1k0_base, k0).safe_add(1.into())?;

        // 10**18 * D / gamma * g1k0 / gamma * g1k0 * A_MULTIPLIER / ANN
        let mul1 = d_e18
            .safe_div(gamma)?
            .safe_mul(g1k0)?
            .safe_div(gamma)?
            .safe_mul(g1k0.safe_mul(A_MULTIPLIER)?)?
            .safe_div(ann)?;

        // 10**18 + 2 * 10**18 * K0 / g1k0
        let mul2 = PRECISION.safe_add(
            PRECISION
                .safe_mul(2.into())?
                .safe_mul(k0)?
                .safe_div(g1k0)?,
        )?;

        let mut yfprime = PRECISION
            .safe_mul(y)?
            .safe_add(s.safe_mul(mul2)?)?
            .safe_add(mul1)?;
        let dyfprime = d.safe_mul(mul2)?;
        if yfprime < dyfprime {
            y = y_prev / 2;
            continue;
        }
        yfprime -= dyfprime;

        if y.is_zero() {
            return Err(Error::Zero);
        }
        let fprime = yfprime / y;
        if fprime.is_zero() {
            return Err(Error::Zero);
        }

        // y -= f / f_prime; y = (y * fprime - f) / fprime
        let mut y_minus = mul1 / fprime;
        let y_plus = yfprime
            .safe_add(d_e18)?
            .safe_div(fprime)?
            .safe_add(y_minus.safe_mul(*PRECISION)?.safe_div(k0)?)?;
        y_minus = y_minus.safe_add(PRECISION.safe_mul(s)?.safe_div(fprime)?)?;

        y = if y_plus < y_minus {
            y_prev / 2
        } else {
            y_plus - y_minus
        };

        if abs_diff(y, y_prev) < convergence_limit.max(y / e14) {
            return Ok(y);
        }
    }

    Err(Error::YDoesNotConverge)
}

#[cfg(test)]
mod tests {
    use {super::*, crate::sources::curve_twocrypto::swap::invariant::newton_d};

    const ANNS: [u64; 4] = [4_000, 400_000, 20_000_000, 40_000_000];

    fn gammas() -> [U256; 3] {
        [U256::exp10(16) * 2, U256::exp10(17), U256::exp10(17) * 3]
    }

    /// Asserts `|actual - expected| <= expected / 1e15`.
    fn assert_close(actual: U256, expected: U256, context: &str) {
        assert!(
            abs_diff(actual, expected) <= expected / U256::exp10(15),
            "{context}: {actual} != {expected}"
        );
    }

    #[test]
    fn recovers_balances_from_invariant() {
        for ann in ANNS {
            for gamma in gammas() {
                for ratio in [1_u64, 2, 10] {
                    let x = [U256::exp10(21) * ratio, U256::exp10(21)];
                    let d = newton_d(ann.into(), gamma, x, U256::zero()).unwrap();
                    for i in 0..N_COINS {
                        let context = format!("ann={ann} gamma={gamma} ratio={ratio} i={i}");
                        let (y, _) = get_y(ann.into(), gamma, x, d, i).unwrap();
                        assert_close(y, x[i], &context);
                        let y = newton_y(ann.into(), gamma, x, d, i).unwrap();
                        assert_close(y, x[i], &context);
                    }
                }
            }
        }
    }

    #[test]
    fn analytic_solution_returns_k0_hint() {
        let ann = U256::from(20_000_000);
        let gamma = U256::exp10(16) * 2;
        let x = [U256::exp10(21), U256::exp10(21) * 2];
        let d = newton_d(ann, gamma, x, U256::zero()).unwrap();
        let solution = solve_cubic(ann, gamma, x, d, 0, lim_mul(gamma).unwrap()).unwrap();
        let CubicSolution::Analytic { y, k0 } = solution else {
            panic!("expected analytic solution, got {solution:?}");
        };
        assert!(!k0.is_zero());
        assert_eq!(get_y(ann, gamma, x, d, 0), Ok((y, k0)));
    }

    #[test]
    fn falls_back_to_newton_without_real_root() {
        let ann = U256::from(400_000);
        let gamma = U256::exp10(17) * 3;
        let x = [U256::exp10(22), U256::exp10(21)];
        let d = newton_d(ann, gamma, x, U256::zero()).unwrap();
        assert_eq!(
            solve_cubic(ann, gamma, x, d, 0, lim_mul(gamma).unwrap()),
            Ok(CubicSolution::NeedsIterativeFallback)
        );
        let (y, k0) = get_y(ann, gamma, x, d, 0).unwrap();
        assert_eq!(k0, U256::zero());
        assert_eq!(y, newton_y(ann, gamma, x, d, 0).unwrap());
        assert_close(y, x[0], "fallback");
    }

    #[test]
    fn halves_overshooting_steps() {
        let ann = U256::from(20_000_000);
        let gamma = U256::exp10(16) * 2;
        let x_j = U256::exp10(20) * 4;
        let d = U256::exp10(21);
        // The first two steps from here would go negative.
        let y = iterate_y(ann, gamma, x_j, d, U256::exp10(20) * 5, MAX_ITERATIONS).unwrap();
        assert_eq!(y, U256::from_dec_str("637500000000006646374").unwrap());

        let y = newton_y(ann, gamma, [U256::zero(), x_j], d, 0).unwrap();
        assert_eq!(y, U256::from_dec_str("600184237343942822094").unwrap());
    }

    #[test]
    fn reports_missing_convergence() {
        let ann = U256::from(20_000_000);
        let x_j = U256::exp10(20) * 2;
        let d = U256::exp10(21);
        // Halving all the way down to zero never satisfies the tolerance.
        assert_eq!(
            iterate_y(ann, U256::exp10(17) * 3, x_j, d, U256::exp10(17) * 2, MAX_ITERATIONS),
            Err(Error::YDoesNotConverge)
        );

        let gamma = U256::exp10(16) * 2;
        let y = d * d / (x_j * 4);
        assert_eq!(
            iterate_y(ann, gamma, x_j, d, y, 3),
            Err(Error::YDoesNotConverge)
        );
        assert!(iterate_y(ann, gamma, x_j, d, y, MAX_ITERATIONS).is_ok());
    }

    #[test]
    fn lim_mul_shrinks_with_gamma() {
        assert_eq!(lim_mul(U256::exp10(16)), Ok(U256::exp10(20)));
        assert_eq!(lim_mul(U256::exp10(16) * 2), Ok(U256::exp10(20)));
        assert_eq!(lim_mul(U256::exp10(17) * 2), Ok(U256::exp10(19)));
    }

    #[test]
    fn validates_inputs() {
        let ann = U256::from(400_000);
        let gamma = U256::exp10(16) * 2;
        let x = [U256::exp10(21), U256::exp10(21)];
        let d = U256::exp10(21) * 2;
        assert_eq!(get_y(ann, gamma, x, U256::exp10(17) - 1, 0), Err(Error::UnsafeD));
        assert_eq!(get_y(ann, gamma, x, U256::exp10(33) + 1, 0), Err(Error::UnsafeD));
        assert_eq!(get_y(3_999.into(), gamma, x, d, 0), Err(Error::UnsafeA));
        assert_eq!(get_y(ann, U256::exp10(9), x, d, 0), Err(Error::UnsafeGamma));
        assert_eq!(get_y(ann, gamma, x, d, 2), Err(Error::CoinIndexOutOfRange));
        // the other balance is far too small relative to D
        let skewed = [U256::exp10(21), U256::exp10(15)];
        assert_eq!(get_y(ann, gamma, skewed, d, 0), Err(Error::UnsafeXi));
        assert_eq!(newton_y(ann, gamma, skewed, d, 0), Err(Error::UnsafeXi));
    }
}
