use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Point-in-time view of the basket, for host logging and export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BasketSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,

    // Exposure
    pub long_volume: Decimal,
    pub short_volume: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_average_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_average_price: Option<Decimal>,
    pub entry_count: usize,
    pub hedged: bool,

    // P&L
    pub floating_pnl: Decimal,
    pub floating_pips: Decimal,
    /// Realized by the open basket's partial closes.
    pub basket_realized_pnl: Decimal,
    pub session_realized_pnl: Decimal,

    // Ladder & protection
    pub layer_index: u32,
    pub ladder_exhausted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equity_lock: Option<Decimal>,

    // Orders & sizing
    pub orders_in_flight: usize,
    pub next_long_volume: Decimal,
    pub next_short_volume: Decimal,
}
