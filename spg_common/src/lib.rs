mod helpers;
mod money;

pub mod op;
mod secret;

pub use helpers::{parse_boolean_flag, parse_number_or};
pub use money::{parse_decimal_amount, AmountParseError, MinorUnits};
pub use secret::Secret;
