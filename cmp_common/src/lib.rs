mod money;

pub mod helpers;
pub mod op;
mod secret;

pub use money::{Money, MoneyConversionError, MARKET_CURRENCY_CODE, MARKET_CURRENCY_CODE_LOWER};
pub use secret::Secret;
