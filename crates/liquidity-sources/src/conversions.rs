use {
    num::BigInt,
    number::conversions::u256_to_big_int,
    primitive_types::U256,
};

/// Extension for converting `U256` into arbitrary precision integers.
pub trait U256Ext: Sized {
    fn to_big_int(&self) -> BigInt;
}

impl U256Ext for U256 {
    fn to_big_int(&self) -> BigInt {
        u256_to_big_int(self)
    }
}
