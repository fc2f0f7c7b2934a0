//! Interface the baseline router uses to quote a single piece of liquidity.

use primitive_types::{H160, U256};

pub trait BaselineSolvable {
    // Given the desired output token, the amount and token input, return the
    // expected amount of output token.
    fn get_amount_out(
        &self,
        out_token: H160,
        input: (U256, H160),
    ) -> impl Future<Output = Option<U256>> + Send;

    // Given the input token, the amount and token we want output, return the
    // required amount of input token that needs to be provided.
    fn get_amount_in(
        &self,
        in_token: H160,
        output: (U256, H160),
    ) -> impl Future<Output = Option<U256>> + Send;

    // Returns the approximate amount of gas that using this piece of liquidity
    // would incur
    fn gas_cost(&self) -> impl Future<Output = usize> + Send;
}
