//! Market quote types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::Price;
use crate::order::OrderSide;

/// Quote for a currency pair, including the daily swap points that drive
/// the carry strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketQuote {
    pub pair: String,
    pub bid: Price,
    pub ask: Price,
    /// Daily swap points credited to a long position.
    pub swap_long_per_day: Decimal,
    /// Daily swap points credited to a short position.
    pub swap_short_per_day: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl MarketQuote {
    /// Price used when entering on the given side (ask for buys, bid for sells).
    #[must_use]
    pub fn entry_price(&self, side: OrderSide) -> Price {
        match side {
            OrderSide::Buy => self.ask,
            OrderSide::Sell => self.bid,
        }
    }

    /// Mid price, for display and sanity checks only.
    #[must_use]
    pub fn mid(&self) -> Price {
        Price::new((self.bid.inner() + self.ask.inner()) / Decimal::from(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn quote() -> MarketQuote {
        MarketQuote {
            pair: "MXN_JPY".to_string(),
            bid: Price::new(dec!(8.50)),
            ask: Price::new(dec!(8.52)),
            swap_long_per_day: dec!(18),
            swap_short_per_day: dec!(-21),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_entry_price_by_side() {
        let q = quote();
        assert_eq!(q.entry_price(OrderSide::Buy), q.ask);
        assert_eq!(q.entry_price(OrderSide::Sell), q.bid);
    }

    #[test]
    fn test_mid() {
        assert_eq!(quote().mid(), Price::new(dec!(8.51)));
    }
}
