//! Errors raised by the twocrypto-ng pricing kernel. Variants carry the same
//! meaning as the `dev:` revert reasons of the contract they mirror.

#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("unsafe values A")]
    UnsafeA,
    #[error("unsafe values gamma")]
    UnsafeGamma,
    #[error("unsafe values D")]
    UnsafeD,
    #[error("unsafe values x[0]")]
    UnsafeX0,
    #[error("unsafe values x[i]")]
    UnsafeXi,
    #[error("unsafe value for y")]
    UnsafeY,
    #[error("coin index out of range")]
    CoinIndexOutOfRange,
    #[error("token is not part of the pool")]
    UnknownToken,
    #[error("D did not converge")]
    DDoesNotConverge,
    #[error("y did not converge")]
    YDoesNotConverge,
    #[error("zero")]
    Zero,
    #[error("loss")]
    Loss,
    #[error("do not exchange 0 coins")]
    Exchange0Coins,
    #[error("arithmetic overflow")]
    ArithmeticOverflow,
    #[error("division by zero")]
    DivisionByZero,
    #[error("wad_exp overflow")]
    WadExpOverflow,
}
