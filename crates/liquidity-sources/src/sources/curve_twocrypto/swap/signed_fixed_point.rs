//! Module emulating the EVM `int256` type as used by the Vyper cryptoswap
//! math. Values are held as `BigInt` and every operation checks that its
//! result still fits into 256 signed bits.

use {
    super::error::Error,
    crate::conversions::U256Ext,
    num::{BigInt, Integer, One, Signed, ToPrimitive, Zero},
    number::conversions::big_int_to_u256,
    primitive_types::U256,
    std::{
        fmt::{self, Debug, Display, Formatter},
        sync::LazyLock,
    },
};

static MAX: LazyLock<BigInt> = LazyLock::new(|| (BigInt::one() << 255_usize) - 1);
static MIN: LazyLock<BigInt> = LazyLock::new(|| -(BigInt::one() << 255_usize));
static MODULUS: LazyLock<BigInt> = LazyLock::new(|| BigInt::one() << 256_usize);

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct I256(BigInt);

impl I256 {
    pub fn zero() -> Self {
        Self(BigInt::zero())
    }

    /// `10**n`, for `n <= 76`.
    pub fn exp10(n: u32) -> Self {
        debug_assert!(n <= 76);
        Self(BigInt::from(10).pow(n))
    }

    /// Equivalent of Vyper's `convert(x, int256)`; fails for values above
    /// `2**255 - 1`.
    pub fn from_u256(value: U256) -> Result<Self, Error> {
        Self::checked(value.to_big_int())
    }

    /// Equivalent of Vyper's `convert(x, uint256)`; fails for negative values.
    pub fn into_u256(self) -> Result<U256, Error> {
        big_int_to_u256(&self.0).map_err(|_| Error::ArithmeticOverflow)
    }

    /// Reinterprets the two's complement bit pattern as an unsigned value.
    pub fn to_raw_u256(&self) -> Result<U256, Error> {
        let raw = if self.is_negative() {
            &*MODULUS + &self.0
        } else {
            self.0.clone()
        };
        big_int_to_u256(&raw).map_err(|_| Error::ArithmeticOverflow)
    }

    fn checked(value: BigInt) -> Result<Self, Error> {
        if value > *MAX || value < *MIN {
            return Err(Error::ArithmeticOverflow);
        }
        Ok(Self(value))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_positive()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    pub fn to_i64(&self) -> Option<i64> {
        self.0.to_i64()
    }

    pub fn safe_add(&self, rhs: &Self) -> Result<Self, Error> {
        Self::checked(&self.0 + &rhs.0)
    }

    pub fn safe_sub(&self, rhs: &Self) -> Result<Self, Error> {
        Self::checked(&self.0 - &rhs.0)
    }

    pub fn safe_mul(&self, rhs: &Self) -> Result<Self, Error> {
        Self::checked(&self.0 * &rhs.0)
    }

    /// Division truncating toward zero, like `sdiv`.
    pub fn safe_div(&self, rhs: &Self) -> Result<Self, Error> {
        if rhs.is_zero() {
            return Err(Error::DivisionByZero);
        }
        Self::checked(&self.0 / &rhs.0)
    }

    pub fn neg(&self) -> Result<Self, Error> {
        Self::checked(-&self.0)
    }

    pub fn abs(&self) -> Result<Self, Error> {
        Self::checked(self.0.abs())
    }

    pub fn shl(&self, bits: usize) -> Result<Self, Error> {
        Self::checked(&self.0 << bits)
    }

    /// Arithmetic shift right, rounding toward negative infinity like `sar`.
    pub fn sar(&self, bits: usize) -> Self {
        Self(self.0.div_floor(&(BigInt::one() << bits)))
    }

    /// Integer square root of a non-negative value.
    pub fn isqrt(&self) -> Result<Self, Error> {
        if self.is_negative() {
            return Err(Error::ArithmeticOverflow);
        }
        Ok(Self(self.0.sqrt()))
    }
}

impl From<i128> for I256 {
    fn from(value: i128) -> Self {
        Self(BigInt::from(value))
    }
}

impl Debug for I256 {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, formatter)
    }
}

impl Display for I256 {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, formatter)
    }
}
