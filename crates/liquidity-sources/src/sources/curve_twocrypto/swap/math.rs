//! Fixed point helpers of the twocrypto-ng math contract.
//! https://github.com/curvefi/twocrypto-ng/blob/d21b270/contracts/main/CurveCryptoMathOptimized2.vy

use {
    super::{
        error::Error,
        fixed_point::{PRECISION, SafeMath},
        signed_fixed_point::I256,
    },
    primitive_types::U256,
    std::sync::LazyLock,
};

pub const N_COINS: usize = 2;
pub const A_MULTIPLIER: U256 = U256([10_000, 0, 0, 0]);

pub static MIN_GAMMA: LazyLock<U256> = LazyLock::new(|| U256::exp10(10));
pub static MAX_GAMMA_SMALL: LazyLock<U256> = LazyLock::new(|| U256::exp10(16) * 2);
pub static MAX_GAMMA: LazyLock<U256> = LazyLock::new(|| U256::exp10(17) * 3);

// N_COINS**N_COINS * A_MULTIPLIER / 10 and N_COINS**N_COINS * A_MULTIPLIER * 1000
pub const MIN_A: U256 = U256([4_000, 0, 0, 0]);
pub const MAX_A: U256 = U256([40_000_000, 0, 0, 0]);

pub static MIN_D: LazyLock<U256> = LazyLock::new(|| U256::exp10(17));
pub static MAX_D: LazyLock<U256> = LazyLock::new(|| U256::exp10(33));

pub static MIN_X0: LazyLock<U256> = LazyLock::new(|| U256::exp10(9));
pub static MAX_X0: LazyLock<U256> = LazyLock::new(|| U256::exp10(33));

pub static MIN_FRAC: LazyLock<U256> = LazyLock::new(|| U256::exp10(16));
pub static MAX_FRAC: LazyLock<U256> = LazyLock::new(|| U256::exp10(20));

/// 115792089237316195423570985008687907853269
const CBRT_CONST_2: U256 = U256([0xca17a3aba173d3d5, 0x484932d2e725a5bb, 0x154, 0]);
/// 115792089237316195423570985008687907853269 * 10**18
const CBRT_CONST_1: U256 = U256([
    0x4d542c5db2340000,
    0x5fe645cc4873f9e6,
    0x725dd1d243aba0e7,
    0x12,
]);

/// 3822833074963236453042738258902158003155416615667
const WAD_EXP_SCALE: U256 = U256([0xee70ef65f9978af3, 0x63c32e5c2f6dc192, 0x29d9dc385, 0]);

pub fn n_coins() -> U256 {
    U256::from(N_COINS)
}

/// Sorts the two balances in descending order.
pub fn sort(x: [U256; N_COINS]) -> [U256; N_COINS] {
    if x[0] < x[1] { [x[1], x[0]] } else { x }
}

pub fn geometric_mean(x: [U256; N_COINS]) -> Result<U256, Error> {
    Ok(x[0].safe_mul(x[1])?.integer_sqrt())
}

/// Base 2 logarithm of `x`, rounding down unless `roundup` is set. Returns 0
/// for 0.
///
/// Derived from Snekmate's `_log_2`: https://github.com/pcaversaccio/snekmate
pub fn log2(x: U256, roundup: bool) -> u32 {
    let mut value = x;
    let mut result = 0;
    for shift in [128, 64, 32, 16, 8, 4, 2] {
        if !(value >> shift).is_zero() {
            value = value >> shift;
            result += shift;
        }
    }
    if !(value >> 1).is_zero() {
        result += 1;
    }
    if roundup && (U256::one() << result) < x {
        result += 1;
    }
    result
}

/// Cube root of `x` where `x` and the result carry 18 decimals.
pub fn cbrt(x: U256) -> Result<U256, Error> {
    // The contract divides by a zero guess here, which the EVM turns into 0.
    if x.is_zero() {
        return Ok(U256::zero());
    }

    let xx = if x >= CBRT_CONST_1 {
        x
    } else if x >= CBRT_CONST_2 {
        x.safe_mul(*PRECISION)?
    } else {
        x.safe_mul(U256::exp10(36))?
    };

    // Initial guess is 2**(log2(xx)/3) * cbrt(2)**(log2(xx)%3) with
    // cbrt(2) approximated as 1260/1000.
    let log2x = log2(xx, false);
    let remainder = log2x % 3;
    let mut a = (U256::one() << (log2x / 3))
        .safe_mul(U256::from(1260).pow(remainder.into()))?
        .safe_div(U256::from(1000).pow(remainder.into()))?;

    // Exactly seven iterations.
    for _ in 0..7 {
        a = U256::from(2)
            .safe_mul(a)?
            .safe_add(xx.safe_div(a.safe_mul(a)?)?)?
            .safe_div(3.into())?;
    }

    if x >= CBRT_CONST_1 {
        a.safe_mul(U256::exp10(12))
    } else if x >= CBRT_CONST_2 {
        a.safe_mul(U256::exp10(6))
    } else {
        Ok(a)
    }
}

/// Natural exponential of a signed 18 decimals fixed point number.
///
/// Derived from Snekmate's `wad_exp`, itself based on Remco Bloemen's
/// https://xn--2-umb.com/22/exp-ln.
pub fn wad_exp(x: &I256) -> Result<U256, Error> {
    // Results below 0.5 round to zero.
    if *x <= I256::from(-42_139_678_854_452_767_551) {
        return Ok(U256::zero());
    }
    // Results above (2**255 - 1) / 1e18 are not representable.
    if *x >= I256::from(135_305_999_368_893_231_589) {
        return Err(Error::WadExpOverflow);
    }

    // Convert to (-42, 136) * 2**96, i.e. multiply by 1e18 / 2**96 = 5**18 / 2**78.
    let mut value = x.shl(78)?.safe_div(&I256::from(3_814_697_265_625))?;

    // Reduce to (-½ ln 2, ½ ln 2) * 2**96 with exp(x) = exp(x') * 2**k.
    let ln2 = I256::from(54_916_777_467_707_473_351_141_471_128);
    let k = value
        .shl(96)?
        .safe_div(&ln2)?
        .safe_add(&I256::from(1).shl(95)?)?
        .sar(96);
    value = value.safe_sub(&k.safe_mul(&ln2)?)?;

    // (6, 7)-term rational approximation; `p` is monic and stays in 2**192 base.
    let y = value
        .safe_add(&I256::from(1_346_386_616_545_796_478_920_950_773_328))?
        .safe_mul(&value)?
        .sar(96)
        .safe_add(&I256::from(57_155_421_227_552_351_082_224_309_758_442))?;
    let p = y
        .safe_add(&value)?
        .safe_sub(&I256::from(94_201_549_194_550_492_254_356_042_504_812))?
        .safe_mul(&y)?
        .sar(96)
        .safe_add(&I256::from(28_719_021_644_029_726_153_956_944_680_412_240))?
        .safe_mul(&value)?
        .safe_add(&I256::from(4_385_272_521_454_847_904_659_076_985_693_276).shl(96)?)?;

    let mut q = value
        .safe_sub(&I256::from(2_855_989_394_907_223_263_936_484_059_900))?
        .safe_mul(&value)?
        .sar(96)
        .safe_add(&I256::from(50_020_603_652_535_783_019_961_831_881_945))?;
    for (coefficient, add) in [
        (533_845_033_583_426_703_283_633_433_725_380, false),
        (3_604_857_256_930_695_427_073_651_918_091_429, true),
        (14_423_608_567_350_463_180_887_372_962_807_573, false),
        (26_449_188_498_355_588_339_934_803_723_976_023, true),
    ] {
        let shifted = q.safe_mul(&value)?.sar(96);
        let coefficient = I256::from(coefficient);
        q = if add {
            shifted.safe_add(&coefficient)?
        } else {
            shifted.safe_sub(&coefficient)?
        };
    }

    // `q` has no real roots, `r` ends up in (0.09, 0.25) * 2**96.
    let r = p.safe_div(&q)?;

    // Multiply by the scale factor s ~ 6.031367120, 2**k and 1e18 / 2**96 in
    // one go, with an intermediate result in 2**213 base.
    let k = k.to_i64().ok_or(Error::ArithmeticOverflow)?;
    let shift = usize::try_from(195 - k).map_err(|_| Error::ArithmeticOverflow)?;
    Ok(r.to_raw_u256()?.safe_mul(WAD_EXP_SCALE)? >> shift)
}

/// Fee reduction coefficient: 1 for a balanced pool, falling towards 0 as
/// the balances get skewed, at a speed controlled by `fee_gamma`.
pub fn reduction_coefficient(x: [U256; N_COINS], fee_gamma: U256) -> Result<U256, Error> {
    let s = x[0].safe_add(x[1])?;
    if s.is_zero() {
        return Err(Error::Zero);
    }
    let k = PRECISION
        .safe_mul(n_coins().pow(n_coins()))?
        .safe_mul(x[0])?
        .safe_div(s)?
        .safe_mul(x[1])?
        .safe_div(s)?;
    fee_gamma
        .safe_mul(*PRECISION)?
        .safe_div(fee_gamma.safe_add(*PRECISION)?.safe_sub(k)?)
}
