use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::order::Direction;

/// Reason basket volume was closed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CloseReason {
    /// Floating loss reached the hard cutoff.
    MaxFloatLoss,
    TakeProfit,
    /// Profit pulled back to the equity lock.
    EquityLock,
    /// Loss threshold with `LossMode::CloseFirst`.
    LossCloseFirst,
    /// Loss threshold with `LossMode::CloseAll`.
    LossCloseAll,
    /// Offset by a fill the engine did not originate.
    External,
}

/// One FIFO offset chunk: part or all of an entry matched against an exit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RealizedTrade {
    pub id: String,
    pub direction: Direction,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub volume: Decimal,
    /// Price delta times volume, sign-adjusted for direction.
    pub pnl: Decimal,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub reason: CloseReason,
}

impl RealizedTrade {
    pub fn is_loss(&self) -> bool {
        self.pnl < Decimal::ZERO
    }
}
