use std::collections::{BTreeMap, VecDeque};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::models::config::EngineConfig;
use crate::models::order::{OrderIntent, OrderRequest, OrderType};
use crate::models::trade::RealizedTrade;

use super::ladder::GridStepState;
use super::ledger::BasketLedger;
use super::streak::LossStreakSizer;

/// Profit floor protecting a winning basket. Only ever raised while set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EquityLock {
    pub level: Decimal,
}

/// Fully filled order ids remembered for duplicate detection.
const COMPLETED_CAPACITY: usize = 512;

/// Price and volume of the most recent ladder step, across all its fills.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LadderBase {
    pub price: Decimal,
    pub volume: Decimal,
}

/// An order sent to the gateway and not yet fully filled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InFlightOrder {
    pub request: OrderRequest,
    pub filled: Decimal,
    /// Sum of price times volume over the fills so far.
    #[serde(default)]
    pub notional: Decimal,
}

impl InFlightOrder {
    pub fn remaining(&self) -> Decimal {
        (self.request.volume - self.filled).max(Decimal::ZERO)
    }

    pub fn record(&mut self, price: Decimal, volume: Decimal) {
        self.filled += volume;
        self.notional += price * volume;
    }

    /// Volume-weighted fill price and filled volume, `None` before any fill.
    pub fn filled_base(&self) -> Option<LadderBase> {
        if self.filled <= Decimal::ZERO {
            return None;
        }
        Some(LadderBase {
            price: self.notional / self.filled,
            volume: self.filled,
        })
    }

    /// Resting ladder order waiting at its target price.
    pub fn is_resting_layer(&self) -> bool {
        matches!(self.request.intent, OrderIntent::Layer { .. })
            && self.request.order_type != OrderType::Market
    }
}

/// Orders in flight, plus cancelled orders that may still report fills.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderBook {
    live: BTreeMap<Uuid, InFlightOrder>,
    cancelled: BTreeMap<Uuid, InFlightOrder>,
    /// Recently completed orders, oldest first; repeated reports for them are ignored.
    completed: VecDeque<Uuid>,
}

impl OrderBook {
    pub fn insert(&mut self, request: OrderRequest) {
        self.live.insert(
            request.id,
            InFlightOrder {
                request,
                filled: Decimal::ZERO,
                notional: Decimal::ZERO,
            },
        );
    }

    pub fn live(&self) -> impl Iterator<Item = &InFlightOrder> {
        self.live.values()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn cancelled_count(&self) -> usize {
        self.cancelled.len()
    }

    /// Look up a live or cancelled order.
    pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut InFlightOrder> {
        match self.live.get_mut(id) {
            Some(order) => Some(order),
            None => self.cancelled.get_mut(id),
        }
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.live.contains_key(id) || self.cancelled.contains_key(id)
    }

    pub fn is_cancelled(&self, id: &Uuid) -> bool {
        self.cancelled.contains_key(id)
    }

    /// Move a live order to the cancelled set; its late fills stay attributable.
    pub fn mark_cancelled(&mut self, id: &Uuid) -> Option<&InFlightOrder> {
        let order = self.live.remove(id)?;
        self.cancelled.insert(*id, order);
        self.cancelled.get(id)
    }

    /// Drop an order from both sets.
    pub fn remove(&mut self, id: &Uuid) -> Option<InFlightOrder> {
        self.live.remove(id).or_else(|| self.cancelled.remove(id))
    }

    /// Retire a fully filled order.
    pub fn complete(&mut self, id: &Uuid) -> Option<InFlightOrder> {
        let order = self.remove(id)?;
        self.completed.push_back(*id);
        while self.completed.len() > COMPLETED_CAPACITY {
            self.completed.pop_front();
        }
        Some(order)
    }

    pub fn is_completed(&self, id: &Uuid) -> bool {
        self.completed.contains(id)
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// An open, close or hedge order is on its way.
    pub fn has_basket_order(&self) -> bool {
        self.live.values().any(|o| {
            matches!(
                o.request.intent,
                OrderIntent::Open { .. } | OrderIntent::Close { .. } | OrderIntent::Hedge { .. }
            )
        })
    }

    /// Live ladder order of any type.
    pub fn layer_order(&self) -> Option<&InFlightOrder> {
        self.live
            .values()
            .find(|o| matches!(o.request.intent, OrderIntent::Layer { .. }))
    }

    pub fn resting_layer_ids(&self) -> Vec<Uuid> {
        self.live
            .values()
            .filter(|o| o.is_resting_layer())
            .map(|o| o.request.id)
            .collect()
    }

    pub fn clear(&mut self) {
        self.live.clear();
        self.cancelled.clear();
        self.completed.clear();
    }
}

/// Everything the engine knows about the current basket.
///
/// Evaluation reads this record and returns what should change; only fills and
/// the engine's own bookkeeping mutate it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BasketState {
    pub ledger: BasketLedger,
    pub grid: GridStepState,
    pub equity_lock: Option<EquityLock>,
    /// Volume of the basket's first entry, base of the multiplier ceiling.
    pub first_volume: Option<Decimal>,
    /// Last completed ladder step; the next layer is priced and sized from it.
    pub ladder_base: Option<LadderBase>,
    /// Set once a layer sized to zero; cleared when the basket flattens.
    pub ladder_exhausted: bool,
    pub orders: OrderBook,
    pub sizer: LossStreakSizer,
    /// Offset chunks realized since the host last drained the journal.
    pub journal: Vec<RealizedTrade>,
    session_realized_pnl: Decimal,
}

impl BasketState {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            ledger: BasketLedger::new(),
            grid: GridStepState::new(config.grid_step_pips, config.progression_mode),
            equity_lock: None,
            first_volume: None,
            ladder_base: None,
            ladder_exhausted: false,
            orders: OrderBook::default(),
            sizer: LossStreakSizer::from_config(config),
            journal: Vec::new(),
            session_realized_pnl: Decimal::ZERO,
        }
    }

    /// Apply an evaluated lock, refusing to lower a lock that stays set.
    pub fn set_equity_lock(&mut self, next: Option<EquityLock>) {
        self.equity_lock = match (self.equity_lock, next) {
            (Some(current), Some(proposed)) if proposed.level < current.level => {
                debug!(
                    "Ignoring lock decrease {} -> {}",
                    current.level, proposed.level
                );
                Some(current)
            }
            (_, next) => next,
        };
    }

    /// Forget the flattened basket. Trade history and sizing windows survive.
    pub fn reset_basket(&mut self) {
        self.ledger.clear();
        self.grid.reset();
        self.equity_lock = None;
        self.first_volume = None;
        self.ladder_base = None;
        self.ladder_exhausted = false;
    }

    /// Back to the state of a freshly constructed engine.
    pub fn reset_all(&mut self) {
        self.reset_basket();
        self.orders.clear();
        self.sizer.reset();
        self.journal.clear();
        self.session_realized_pnl = Decimal::ZERO;
    }

    /// Journal a realized chunk and feed its outcome to the sizer.
    pub fn record_trade(&mut self, trade: RealizedTrade) {
        self.sizer.record_outcome(trade.direction, trade.is_loss());
        self.session_realized_pnl += trade.pnl;
        self.journal.push(trade);
    }

    /// Hand the journal over, leaving it empty. Session totals are kept.
    pub fn take_journal(&mut self) -> Vec<RealizedTrade> {
        std::mem::take(&mut self.journal)
    }

    /// Realized P&L since construction or the last full reset, in price units.
    pub fn session_realized_pnl(&self) -> Decimal {
        self.session_realized_pnl
    }
}
