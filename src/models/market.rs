use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Best bid/ask update for the engine's instrument.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    pub bid: Decimal,
    pub ask: Decimal,
    pub time: DateTime<Utc>,
}

impl Quote {
    pub fn new(bid: Decimal, ask: Decimal, time: DateTime<Utc>) -> Self {
        Self { bid, ask, time }
    }

    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }

    /// A quote is usable once both sides are positive and not crossed.
    pub fn is_valid(&self) -> bool {
        self.bid > Decimal::ZERO && self.ask > Decimal::ZERO && self.ask >= self.bid
    }
}

/// A single OHLCV candle/bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    /// Close price seen as a zero-spread quote.
    pub fn close_quote(&self) -> Quote {
        Quote::new(self.close, self.close, self.time)
    }
}
