use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::trade::CloseReason;

/// Side of an order or fill.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Direction of the exposure this side opens.
    pub fn direction(self) -> Direction {
        match self {
            Side::Buy => Direction::Long,
            Side::Sell => Direction::Short,
        }
    }
}

/// Direction of a basket leg.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    /// Order side that adds to this direction.
    pub fn open_side(self) -> Side {
        match self {
            Direction::Long => Side::Buy,
            Direction::Short => Side::Sell,
        }
    }

    /// Order side that reduces this direction.
    pub fn close_side(self) -> Side {
        self.open_side().opposite()
    }

    /// +1 for long, -1 for short. Multiplies a raw price delta into P&L.
    pub fn sign(self) -> Decimal {
        match self {
            Direction::Long => Decimal::ONE,
            Direction::Short => Decimal::NEGATIVE_ONE,
        }
    }
}

/// How an order is priced at the venue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderType {
    Market,
    /// Rests until price trades at or through the level in the favorable direction.
    Limit(Decimal),
    /// Triggers once price breaks through the level.
    Stop(Decimal),
}

/// What the engine intends an order to do to the basket.
///
/// Fills are routed through the ledger according to the intent of the order
/// they belong to, so a hedge leg is never netted against the leg it protects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderIntent {
    /// First entry of a new basket.
    Open { direction: Direction },
    /// Ladder layer `layer` (1-indexed) on top of the existing basket.
    Layer { direction: Direction, layer: u32 },
    /// Offsetting order that reduces `direction`.
    Close {
        direction: Direction,
        reason: CloseReason,
    },
    /// Hedge leg that opens `direction` without netting.
    Hedge { direction: Direction },
}

impl OrderIntent {
    pub fn side(&self) -> Side {
        match *self {
            OrderIntent::Open { direction }
            | OrderIntent::Layer { direction, .. }
            | OrderIntent::Hedge { direction } => direction.open_side(),
            OrderIntent::Close { direction, .. } => direction.close_side(),
        }
    }

    pub fn is_close(&self) -> bool {
        matches!(self, OrderIntent::Close { .. })
    }

    /// Open and Layer orders are steps of the ladder; hedges and closes are not.
    pub fn opens_ladder_step(&self) -> bool {
        matches!(self, OrderIntent::Open { .. } | OrderIntent::Layer { .. })
    }
}

/// An order handed to the execution gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRequest {
    pub id: Uuid,
    pub side: Side,
    pub volume: Decimal,
    pub order_type: OrderType,
    pub intent: OrderIntent,
    pub created_at: DateTime<Utc>,
}

impl OrderRequest {
    pub fn new(
        intent: OrderIntent,
        volume: Decimal,
        order_type: OrderType,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            side: intent.side(),
            volume,
            order_type,
            intent,
            created_at,
        }
    }
}

/// Execution report delivered by the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fill {
    /// Order the fill belongs to. `None` for fills the engine did not originate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
    pub side: Side,
    pub price: Decimal,
    pub volume: Decimal,
    pub time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_sides() {
        let close_long = OrderIntent::Close {
            direction: Direction::Long,
            reason: CloseReason::TakeProfit,
        };
        assert_eq!(close_long.side(), Side::Sell);
        assert!(close_long.is_close());

        let hedge_short = OrderIntent::Hedge {
            direction: Direction::Short,
        };
        assert_eq!(hedge_short.side(), Side::Sell);
        assert!(!hedge_short.opens_ladder_step());
        assert!(!close_long.opens_ladder_step());

        let layer = OrderIntent::Layer {
            direction: Direction::Long,
            layer: 2,
        };
        assert_eq!(layer.side(), Side::Buy);
        assert!(!layer.is_close());
        assert!(layer.opens_ladder_step());
    }

    #[test]
    fn test_direction_sign() {
        assert_eq!(Direction::Long.sign(), Decimal::ONE);
        assert_eq!(Direction::Short.sign(), Decimal::NEGATIVE_ONE);
        assert_eq!(Side::Sell.direction(), Direction::Short);
        assert_eq!(Direction::Short.close_side(), Side::Buy);
    }
}
