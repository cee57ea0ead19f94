use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::models::config::{
    EngineConfig, GridDirection, InstrumentSpec, LadderOrderKind, LossMode, ProfitUnit,
};
use crate::models::order::{Direction, OrderType};
use crate::models::trade::CloseReason;

use super::ladder::{LadderBuilder, LayerPlan};
use super::pips;
use super::state::{BasketState, EquityLock, LadderBase};

/// Market and account inputs of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketSnapshot {
    pub bid: Decimal,
    pub ask: Decimal,
    pub time: DateTime<Utc>,
    /// Account balance in account currency.
    pub balance: Decimal,
}

/// Action chosen by an evaluation. At most one per event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Decision {
    /// Flatten every entry of both directions.
    CloseBasket { reason: CloseReason },
    /// Close the oldest entry of each populated direction.
    CloseOldest { reason: CloseReason },
    /// Open `volume` on `direction` without netting.
    Hedge { direction: Direction, volume: Decimal },
    /// Send the next ladder layer, cancelling `replaces` first when set.
    AddLayer {
        plan: LayerPlan,
        order_type: OrderType,
        replaces: Option<Uuid>,
    },
}

/// Outcome of one evaluation: the decision plus the state changes it implies.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub decision: Option<Decision>,
    pub equity_lock: Option<EquityLock>,
    /// The next layer sized to zero; stop laddering this basket.
    pub ladder_exhausted: bool,
    pub floating_pnl: Decimal,
    pub floating_pips: Decimal,
}

impl Evaluation {
    fn idle(state: &BasketState) -> Self {
        Self {
            decision: None,
            equity_lock: state.equity_lock,
            ladder_exhausted: false,
            floating_pnl: Decimal::ZERO,
            floating_pips: Decimal::ZERO,
        }
    }
}

/// Result of one equity-lock step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LockStep {
    pub lock: Option<EquityLock>,
    pub close: bool,
}

/// Basket exit, hedge and ladder admission rules.
#[derive(Debug)]
pub struct BasketRiskController {
    config: EngineConfig,
    instrument: InstrumentSpec,
    ladder: LadderBuilder,
}

impl BasketRiskController {
    pub fn new(config: &EngineConfig, instrument: &InstrumentSpec) -> Self {
        Self {
            config: config.clone(),
            instrument: instrument.clone(),
            ladder: LadderBuilder::new(config, instrument),
        }
    }

    pub fn ladder(&self) -> &LadderBuilder {
        &self.ladder
    }

    /// Evaluate the basket against one market snapshot.
    ///
    /// Rules run in priority order and the first one that fires wins:
    /// hard loss cutoff, take-profit, equity lock, loss mode, hedge, new layer.
    /// Nothing is decided while an open, close or hedge order is in flight.
    pub fn evaluate(&self, state: &BasketState, snapshot: &MarketSnapshot) -> Evaluation {
        let ledger = &state.ledger;
        if ledger.is_flat() {
            return Evaluation::idle(state);
        }

        let pip = self.instrument.pip_size();
        let floating_pnl = ledger.floating_pnl_at(snapshot.bid, snapshot.ask);
        let floating_currency = floating_pnl * self.instrument.contract_size;
        let floating_pips = ledger.floating_pips_at(snapshot.bid, snapshot.ask, pip);
        let profit = match self.config.close_target_mode {
            ProfitUnit::Pips => floating_pips,
            ProfitUnit::Currency => floating_currency,
        };

        let mut eval = Evaluation {
            decision: None,
            equity_lock: state.equity_lock,
            ladder_exhausted: false,
            floating_pnl,
            floating_pips,
        };

        if state.orders.has_basket_order() {
            debug!("Basket order in flight, skipping evaluation");
            return eval;
        }

        // 1. Hard loss cutoff
        if let Some(max_loss) = self.config.max_float_loss {
            if floating_currency <= -max_loss {
                eval.decision = Some(Decision::CloseBasket {
                    reason: CloseReason::MaxFloatLoss,
                });
                return eval;
            }
        }

        // 2. Take-profit
        if let Some(target) = self.config.take_profit_target {
            if profit >= target {
                eval.decision = Some(Decision::CloseBasket {
                    reason: CloseReason::TakeProfit,
                });
                return eval;
            }
        }

        // 3. Equity lock
        let step = self.ratchet(state.equity_lock, profit);
        eval.equity_lock = step.lock;
        if step.close {
            eval.decision = Some(Decision::CloseBasket {
                reason: CloseReason::EquityLock,
            });
            return eval;
        }

        // 4. Loss mode
        let threshold = self.config.loss_threshold_pips;
        if threshold > Decimal::ZERO && floating_pips <= -threshold {
            let decision = match self.config.loss_mode {
                LossMode::DoNothing => None,
                LossMode::CloseFirst => Some(Decision::CloseOldest {
                    reason: CloseReason::LossCloseFirst,
                }),
                LossMode::CloseAll => Some(Decision::CloseBasket {
                    reason: CloseReason::LossCloseAll,
                }),
            };
            if decision.is_some() {
                eval.decision = decision;
                return eval;
            }
        }

        // 5. Hedge
        if let Some(decision) = self.hedge(state, floating_currency, snapshot.balance) {
            eval.decision = Some(decision);
            return eval;
        }

        // 6. New layer
        match self.admit_layer(state, snapshot) {
            LayerAdmission::Add(decision) => eval.decision = Some(decision),
            LayerAdmission::Exhausted => eval.ladder_exhausted = true,
            LayerAdmission::Wait => {}
        }
        eval
    }

    /// One-way profit ratchet.
    ///
    /// Arms at `trigger - breakeven_offset` once profit exceeds the trigger,
    /// trails forward by `trail_distance` each time profit clears
    /// `level + trail_distance * trail_trigger_multiplier`, and asks for a close
    /// when profit pulls back to the level while still positive.
    pub fn ratchet(&self, lock: Option<EquityLock>, profit: Decimal) -> LockStep {
        let Some(trigger) = self.config.equity_trigger_level else {
            return LockStep {
                lock: None,
                close: false,
            };
        };

        let Some(current) = lock else {
            let lock = (profit > trigger).then(|| EquityLock {
                level: trigger - self.config.equity_breakeven_offset,
            });
            return LockStep { lock, close: false };
        };

        if profit <= current.level {
            let close =
                profit > Decimal::ZERO && current.level > self.config.equity_breakeven_floor;
            return LockStep {
                // The lock stays until the close completes; a fall through it otherwise clears it.
                lock: close.then_some(current),
                close,
            };
        }

        let trail = self.config.equity_trail_distance;
        if trail > Decimal::ZERO
            && profit > current.level + trail * self.config.equity_trail_trigger_multiplier
        {
            return LockStep {
                lock: Some(EquityLock {
                    level: current.level + trail,
                }),
                close: false,
            };
        }

        LockStep {
            lock: Some(current),
            close: false,
        }
    }

    fn hedge(
        &self,
        state: &BasketState,
        floating_currency: Decimal,
        balance: Decimal,
    ) -> Option<Decision> {
        if !self.config.hedge_enabled || state.ledger.is_hedged() {
            return None;
        }
        if balance <= Decimal::ZERO || floating_currency >= Decimal::ZERO {
            return None;
        }
        let loss_pct = -floating_currency / balance * Decimal::ONE_HUNDRED;
        if loss_pct <= self.config.hedge_loss_threshold_percent {
            return None;
        }

        let long = state.ledger.volume(Direction::Long);
        let short = state.ledger.volume(Direction::Short);
        let direction = if long > short {
            Direction::Short
        } else {
            Direction::Long
        };
        let requested = (long - short).abs() * self.config.hedge_volume_multiplier;
        let volume = self.instrument.normalize_volume(requested);
        if volume.is_zero() {
            debug!("Hedge volume {} normalizes to zero", requested);
            return None;
        }
        Some(Decision::Hedge { direction, volume })
    }

    fn admit_layer(&self, state: &BasketState, snapshot: &MarketSnapshot) -> LayerAdmission {
        let Some(direction) = state.ledger.single_direction() else {
            return LayerAdmission::Wait;
        };
        let side = state.ledger.side(direction);
        // Open step plus filled layers; partial fills of one order count once.
        let steps = state.grid.layer_index.saturating_add(1);
        if state.ladder_exhausted || steps >= self.config.max_orders {
            return LayerAdmission::Wait;
        }
        if let Some(max_spread) = self.config.max_spread_pips {
            let spread = pips::to_pips(snapshot.ask - snapshot.bid, self.instrument.pip_size());
            if spread > max_spread {
                debug!("Spread {} pips above {}, no new layer", spread, max_spread);
                return LayerAdmission::Wait;
            }
        }
        let Some(base) = state.ladder_base.or_else(|| {
            side.last().map(|e| LadderBase {
                price: e.price,
                volume: e.volume,
            })
        }) else {
            return LayerAdmission::Wait;
        };
        let first_volume = state
            .first_volume
            .or_else(|| side.first().map(|e| e.volume))
            .unwrap_or(base.volume);

        let Some(plan) =
            self.ladder
                .next_layer(&state.grid, base.price, direction, base.volume, first_volume)
        else {
            return LayerAdmission::Exhausted;
        };

        let existing = state.orders.layer_order();
        if existing.is_some_and(|o| o.filled > Decimal::ZERO) {
            // A layer mid-fill is the current step; let it finish first.
            return LayerAdmission::Wait;
        }
        match self.config.ladder_order_kind {
            LadderOrderKind::Market => {
                if existing.is_some() || !self.price_reached(&plan, snapshot) {
                    return LayerAdmission::Wait;
                }
                LayerAdmission::Add(Decision::AddLayer {
                    plan,
                    order_type: OrderType::Market,
                    replaces: None,
                })
            }
            LadderOrderKind::Pending => {
                let order_type = match self.ladder.grid_direction() {
                    GridDirection::AgainstTrend => OrderType::Limit(plan.price),
                    GridDirection::WithTrend => OrderType::Stop(plan.price),
                };
                let replaces = match existing {
                    Some(order)
                        if order.request.order_type == order_type
                            && order.request.volume == plan.volume =>
                    {
                        return LayerAdmission::Wait;
                    }
                    Some(order) => Some(order.request.id),
                    None => None,
                };
                LayerAdmission::Add(Decision::AddLayer {
                    plan,
                    order_type,
                    replaces,
                })
            }
        }
    }

    /// Has the executable side of the market travelled to the layer price?
    fn price_reached(&self, plan: &LayerPlan, snapshot: &MarketSnapshot) -> bool {
        match (self.ladder.grid_direction(), plan.direction) {
            (GridDirection::AgainstTrend, Direction::Long) => snapshot.ask <= plan.price,
            (GridDirection::AgainstTrend, Direction::Short) => snapshot.bid >= plan.price,
            (GridDirection::WithTrend, Direction::Long) => snapshot.ask >= plan.price,
            (GridDirection::WithTrend, Direction::Short) => snapshot.bid <= plan.price,
        }
    }
}

enum LayerAdmission {
    Add(Decision),
    Exhausted,
    Wait,
}
