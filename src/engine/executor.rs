use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::EngineError;
use crate::models::config::{EngineConfig, InstrumentSpec};
use crate::models::market::{Candle, Quote};
use crate::models::order::{Direction, Fill, OrderIntent, OrderRequest, OrderType};
use crate::models::result::BasketSnapshot;
use crate::models::trade::{CloseReason, RealizedTrade};

use super::ledger::FillOutcome;
use super::risk::{BasketRiskController, Decision, MarketSnapshot};
use super::state::{BasketState, LadderBase};

/// Order entry point of the host's execution venue.
pub trait ExecutionGateway {
    /// Hand an order to the venue. An error means the venue refused it.
    fn submit(&mut self, order: &OrderRequest) -> Result<(), EngineError>;

    fn cancel(&mut self, order_id: Uuid) -> Result<(), EngineError>;
}

/// Account state used for percentage thresholds.
pub trait AccountSource {
    fn balance(&self) -> Decimal;
}

/// A fixed balance.
impl AccountSource for Decimal {
    fn balance(&self) -> Decimal {
        *self
    }
}

/// What one event did. Errors are reported here, never raised.
#[derive(Debug, Default, Serialize)]
pub struct EventReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    pub submitted: Vec<OrderRequest>,
    pub cancelled: Vec<Uuid>,
    pub realized: Vec<RealizedTrade>,
    pub basket_closed: bool,
    pub errors: Vec<EngineError>,
}

impl EventReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Host-facing basket engine for one instrument.
///
/// Every event runs to completion: the ledger is updated from confirmed fills,
/// the basket is evaluated, and at most one decision is turned into orders.
/// Submitted orders only reach the ledger once their fills come back.
pub struct GridEngine<G, A> {
    config: EngineConfig,
    instrument: InstrumentSpec,
    controller: BasketRiskController,
    state: BasketState,
    gateway: G,
    account: A,
    last_quote: Option<Quote>,
}

impl<G: ExecutionGateway, A: AccountSource> GridEngine<G, A> {
    pub fn new(
        config: EngineConfig,
        instrument: InstrumentSpec,
        gateway: G,
        account: A,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        instrument.validate()?;
        info!(
            "Grid engine ready: step={} pips, mode={:?}, max_orders={}, pip={}",
            config.grid_step_pips,
            config.progression_mode,
            config.max_orders,
            instrument.pip_size()
        );

        Ok(Self {
            controller: BasketRiskController::new(&config, &instrument),
            state: BasketState::new(&config),
            config,
            instrument,
            gateway,
            account,
            last_quote: None,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn instrument(&self) -> &InstrumentSpec {
        &self.instrument
    }

    pub fn state(&self) -> &BasketState {
        &self.state
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    pub fn last_quote(&self) -> Option<&Quote> {
        self.last_quote.as_ref()
    }

    /// Open a new basket with a market order sized by the loss-streak sizer.
    pub fn start_basket(
        &mut self,
        direction: Direction,
        time: DateTime<Utc>,
    ) -> Result<OrderRequest, EngineError> {
        if !self.state.ledger.is_flat() {
            return Err(EngineError::BasketAlreadyOpen(format!(
                "{} entries open",
                self.state.ledger.entry_count()
            )));
        }
        if let Some(order) = self.state.orders.live().find(|o| !o.is_resting_layer()) {
            return Err(EngineError::OrderInFlight(order.request.id));
        }

        let requested = self.state.sizer.next_volume(direction);
        let volume = self.instrument.normalize_volume(requested);
        if volume.is_zero() {
            return Err(EngineError::ZeroVolume { requested });
        }

        let order = OrderRequest::new(
            OrderIntent::Open { direction },
            volume,
            OrderType::Market,
            time,
        );
        self.gateway.submit(&order)?;
        info!("Basket start: {:?} {}", direction, volume);
        self.state.orders.insert(order.clone());
        Ok(order)
    }

    pub fn on_quote(&mut self, quote: Quote) -> EventReport {
        let mut report = EventReport::default();
        if !quote.is_valid() {
            warn!("Ignoring invalid quote bid={} ask={}", quote.bid, quote.ask);
            return report;
        }
        self.last_quote = Some(quote);
        self.evaluate(&quote, &mut report);
        report
    }

    /// Evaluate on a closed candle, its close standing in for both sides.
    pub fn on_candle_close(&mut self, candle: &Candle) -> EventReport {
        self.on_quote(candle.close_quote())
    }

    pub fn on_fill(&mut self, fill: Fill) -> EventReport {
        let mut report = EventReport::default();
        let was_open = !self.state.ledger.is_flat();

        match fill.order_id {
            Some(id) if self.state.orders.is_completed(&id) => {
                warn!("Duplicate fill for completed order {}, ignored", id);
                report.errors.push(EngineError::InconsistentFill {
                    requested: fill.volume,
                    unmatched: fill.volume,
                });
                return report;
            }
            Some(id) if self.state.orders.contains(&id) => {
                self.apply_order_fill(id, &fill, &mut report);
            }
            other => {
                if let Some(id) = other {
                    warn!("Fill for unknown order {}, netting into ledger", id);
                }
                let outcome = self.state.ledger.record_fill(
                    fill.side,
                    fill.price,
                    fill.volume,
                    fill.time,
                    CloseReason::External,
                );
                if let Some(entry) = &outcome.opened {
                    self.state.first_volume.get_or_insert(entry.volume);
                    self.state.ladder_base = Some(LadderBase {
                        price: entry.price,
                        volume: entry.volume,
                    });
                }
                self.absorb(outcome, &mut report);
            }
        }

        self.after_fill(was_open, &mut report);
        report
    }

    /// The venue refused an order after accepting it for submission.
    pub fn on_order_rejected(&mut self, order_id: Uuid, reason: &str) -> EventReport {
        let mut report = EventReport::default();
        if self.state.orders.remove(&order_id).is_some() {
            warn!("Order {} rejected by venue: {}", order_id, reason);
            report.errors.push(EngineError::ExecutionRejected {
                order_id,
                reason: reason.to_string(),
            });
        } else {
            debug!("Rejection for untracked order {}", order_id);
        }
        report
    }

    /// The venue confirmed a cancel; no more fills are expected for the order.
    pub fn on_order_cancelled(&mut self, order_id: Uuid) {
        let Some(order) = self.state.orders.remove(&order_id) else {
            return;
        };
        debug!("Order {} cancel confirmed", order_id);
        if order.request.intent.opens_ladder_step() && !self.state.ledger.is_flat() {
            if let Some(base) = order.filled_base() {
                debug!("Partially filled step {} becomes ladder base", order_id);
                self.state.ladder_base = Some(base);
            }
        }
    }

    /// Drain the realized-trade journal, e.g. after exporting it.
    pub fn take_journal(&mut self) -> Vec<RealizedTrade> {
        self.state.take_journal()
    }

    /// Cancel resting orders and forget every basket, order and outcome.
    pub fn reset(&mut self) -> EventReport {
        let mut report = EventReport::default();
        self.cancel_resting_layers(&mut report);
        self.state.reset_all();
        self.last_quote = None;
        info!("Engine reset");
        report
    }

    pub fn snapshot(&self) -> BasketSnapshot {
        let ledger = &self.state.ledger;
        let (floating_pnl, floating_pips) = match &self.last_quote {
            Some(q) => (
                ledger.floating_pnl_at(q.bid, q.ask) * self.instrument.contract_size,
                ledger.floating_pips_at(q.bid, q.ask, self.instrument.pip_size()),
            ),
            None => (Decimal::ZERO, Decimal::ZERO),
        };

        BasketSnapshot {
            time: self.last_quote.map(|q| q.time),
            long_volume: ledger.volume(Direction::Long),
            short_volume: ledger.volume(Direction::Short),
            long_average_price: ledger.side(Direction::Long).average_price(),
            short_average_price: ledger.side(Direction::Short).average_price(),
            entry_count: ledger.entry_count(),
            hedged: ledger.is_hedged(),
            floating_pnl,
            floating_pips,
            basket_realized_pnl: ledger.realized_pnl() * self.instrument.contract_size,
            session_realized_pnl: self.state.session_realized_pnl()
                * self.instrument.contract_size,
            layer_index: self.state.grid.layer_index,
            ladder_exhausted: self.state.ladder_exhausted,
            equity_lock: self.state.equity_lock.map(|l| l.level),
            orders_in_flight: self.state.orders.live_count(),
            next_long_volume: self.state.sizer.next_volume(Direction::Long),
            next_short_volume: self.state.sizer.next_volume(Direction::Short),
        }
    }

    fn evaluate(&mut self, quote: &Quote, report: &mut EventReport) {
        let snapshot = MarketSnapshot {
            bid: quote.bid,
            ask: quote.ask,
            time: quote.time,
            balance: self.account.balance(),
        };
        let eval = self.controller.evaluate(&self.state, &snapshot);
        debug!(
            "Floating {} ({} pips), lock {:?}",
            eval.floating_pnl, eval.floating_pips, eval.equity_lock
        );

        self.state.set_equity_lock(eval.equity_lock);
        if eval.ladder_exhausted && !self.state.ladder_exhausted {
            info!("Ladder exhausted at layer {}", self.state.grid.layer_index);
            self.state.ladder_exhausted = true;
        }

        if let Some(decision) = eval.decision {
            info!("Decision: {:?}", decision);
            self.execute(&decision, quote.time, report);
            report.decision = Some(decision);
        }
    }

    fn execute(&mut self, decision: &Decision, time: DateTime<Utc>, report: &mut EventReport) {
        match decision {
            Decision::CloseBasket { reason } => {
                self.cancel_resting_layers(report);
                for direction in [Direction::Long, Direction::Short] {
                    let volume = self.state.ledger.volume(direction);
                    if volume > Decimal::ZERO {
                        let intent = OrderIntent::Close {
                            direction,
                            reason: *reason,
                        };
                        self.submit(intent, volume, OrderType::Market, time, report);
                    }
                }
            }
            Decision::CloseOldest { reason } => {
                for direction in [Direction::Long, Direction::Short] {
                    let oldest = self.state.ledger.side(direction).first().map(|e| e.volume);
                    if let Some(volume) = oldest {
                        let intent = OrderIntent::Close {
                            direction,
                            reason: *reason,
                        };
                        self.submit(intent, volume, OrderType::Market, time, report);
                    }
                }
            }
            Decision::Hedge { direction, volume } => {
                let intent = OrderIntent::Hedge {
                    direction: *direction,
                };
                self.submit(intent, *volume, OrderType::Market, time, report);
            }
            Decision::AddLayer {
                plan,
                order_type,
                replaces,
            } => {
                if let Some(id) = replaces {
                    info!("Replacing ladder order {} with target {}", id, plan.price);
                    self.cancel(*id, report);
                }
                let intent = OrderIntent::Layer {
                    direction: plan.direction,
                    layer: plan.layer,
                };
                self.submit(intent, plan.volume, *order_type, time, report);
            }
        }
    }

    fn submit(
        &mut self,
        intent: OrderIntent,
        volume: Decimal,
        order_type: OrderType,
        time: DateTime<Utc>,
        report: &mut EventReport,
    ) {
        let order = OrderRequest::new(intent, volume, order_type, time);
        match self.gateway.submit(&order) {
            Ok(()) => {
                info!(
                    "Submitted {:?} {} {:?} ({:?})",
                    order.side, order.volume, order.order_type, order.intent
                );
                self.state.orders.insert(order.clone());
                report.submitted.push(order);
            }
            Err(err) => {
                warn!("Order {:?} {} not accepted: {}", order.side, order.volume, err);
                report.errors.push(err);
            }
        }
    }

    /// Cancel without waiting for acknowledgment. The order stays attributable
    /// so a fill racing the cancel is still applied exactly once.
    fn cancel(&mut self, order_id: Uuid, report: &mut EventReport) {
        match self.gateway.cancel(order_id) {
            Ok(()) => report.cancelled.push(order_id),
            Err(err) => {
                warn!("Cancel of {} failed: {}", order_id, err);
                report.errors.push(EngineError::CancelFailed {
                    order_id,
                    reason: err.to_string(),
                });
            }
        }
        self.state.orders.mark_cancelled(&order_id);
    }

    fn cancel_resting_layers(&mut self, report: &mut EventReport) {
        for id in self.state.orders.resting_layer_ids() {
            self.cancel(id, report);
        }
    }

    fn apply_order_fill(&mut self, order_id: Uuid, fill: &Fill, report: &mut EventReport) {
        let Some(order) = self.state.orders.get_mut(&order_id) else {
            return;
        };
        let intent = order.request.intent;
        let expected_side = order.request.side;
        let remaining = order.remaining();
        let first_fill = order.filled.is_zero();

        let volume = fill.volume.min(remaining);
        if fill.volume > remaining {
            warn!(
                "Fill of {} exceeds remaining {} on order {}, clamped",
                fill.volume, remaining, order_id
            );
            report.errors.push(EngineError::InconsistentFill {
                requested: fill.volume,
                unmatched: fill.volume - remaining,
            });
        }
        if volume <= Decimal::ZERO {
            return;
        }
        order.record(fill.price, volume);
        let complete = order.remaining().is_zero();
        if self.state.orders.is_cancelled(&order_id) {
            warn!("Cancelled order {} filled {}", order_id, volume);
        }

        if fill.side != expected_side {
            warn!(
                "Fill side {:?} differs from order {} side {:?}, netting",
                fill.side, order_id, expected_side
            );
            let outcome = self.state.ledger.record_fill(
                fill.side,
                fill.price,
                volume,
                fill.time,
                CloseReason::External,
            );
            self.absorb(outcome, report);
        } else {
            match intent {
                OrderIntent::Open { direction } => {
                    self.state
                        .ledger
                        .apply_open(direction, fill.price, volume, fill.time);
                    *self.state.first_volume.get_or_insert(Decimal::ZERO) += volume;
                }
                OrderIntent::Layer { direction, layer } => {
                    self.state
                        .ledger
                        .apply_open(direction, fill.price, volume, fill.time);
                    self.state.first_volume.get_or_insert(volume);
                    if first_fill {
                        self.state.grid.advance();
                        info!(
                            "Layer {} filled {} @ {} (index {})",
                            layer, volume, fill.price, self.state.grid.layer_index
                        );
                    }
                }
                OrderIntent::Hedge { direction } => {
                    self.state
                        .ledger
                        .apply_open(direction, fill.price, volume, fill.time);
                    info!("Hedge {:?} filled {} @ {}", direction, volume, fill.price);
                }
                OrderIntent::Close { direction, reason } => {
                    let outcome = self.state.ledger.apply_close(
                        direction,
                        fill.price,
                        volume,
                        fill.time,
                        reason,
                    );
                    if outcome.unmatched > Decimal::ZERO {
                        report.errors.push(EngineError::InconsistentFill {
                            requested: volume,
                            unmatched: outcome.unmatched,
                        });
                    }
                    self.absorb(outcome, report);
                }
            }
        }

        if complete {
            let done = self.state.orders.complete(&order_id);
            if fill.side == expected_side && intent.opens_ladder_step() {
                self.state.ladder_base = done.and_then(|o| o.filled_base());
            }
        }
    }

    fn absorb(&mut self, outcome: FillOutcome, report: &mut EventReport) {
        for trade in outcome.realized {
            self.state.record_trade(trade.clone());
            report.realized.push(trade);
        }
    }

    fn after_fill(&mut self, was_open: bool, report: &mut EventReport) {
        if self.state.ledger.is_flat() {
            if was_open {
                info!(
                    "Basket flattened after {} layers, realized {}",
                    self.state.grid.layer_index,
                    self.state.ledger.realized_pnl() * self.instrument.contract_size
                );
                self.cancel_resting_layers(report);
                self.state.reset_basket();
                report.basket_closed = true;
            }
            return;
        }

        if let Some(quote) = self.last_quote {
            self.evaluate(&quote, report);
        }
    }
}
