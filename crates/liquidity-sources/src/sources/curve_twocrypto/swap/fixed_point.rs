//! Checked unsigned 256-bit arithmetic.
//!
//! The contract uses `unsafe_*` (wrapping) operations inside ranges it
//! validated beforehand. Here every operation is checked and reports an
//! [`Error`] instead of wrapping.

use {super::error::Error, primitive_types::U256, std::sync::LazyLock};

pub static PRECISION: LazyLock<U256> = LazyLock::new(|| U256::exp10(18));

pub trait SafeMath: Sized {
    fn safe_add(self, rhs: Self) -> Result<Self, Error>;
    fn safe_sub(self, rhs: Self) -> Result<Self, Error>;
    fn safe_mul(self, rhs: Self) -> Result<Self, Error>;
    /// Truncating division.
    fn safe_div(self, rhs: Self) -> Result<Self, Error>;
}

impl SafeMath for U256 {
    fn safe_add(self, rhs: Self) -> Result<Self, Error> {
        self.checked_add(rhs).ok_or(Error::ArithmeticOverflow)
    }

    fn safe_sub(self, rhs: Self) -> Result<Self, Error> {
        self.checked_sub(rhs).ok_or(Error::ArithmeticOverflow)
    }

    fn safe_mul(self, rhs: Self) -> Result<Self, Error> {
        self.checked_mul(rhs).ok_or(Error::ArithmeticOverflow)
    }

    fn safe_div(self, rhs: Self) -> Result<Self, Error> {
        self.checked_div(rhs).ok_or(Error::DivisionByZero)
    }
}

/// `|a - b|` for unsigned values.
pub fn abs_diff(a: U256, b: U256) -> U256 {
    if a > b { a - b } else { b - a }
}
