use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::order::{Direction, Side};
use crate::models::trade::{CloseReason, RealizedTrade};

use super::pips;

/// One confirmed fill held in the basket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entry {
    pub id: Uuid,
    pub price: Decimal,
    pub volume: Decimal,
    pub side: Side,
    pub opened_at: DateTime<Utc>,
}

impl Entry {
    pub fn direction(&self) -> Direction {
        self.side.direction()
    }

    fn pnl_at(&self, price: Decimal) -> Decimal {
        (price - self.price) * self.volume * self.direction().sign()
    }
}

/// FIFO queue of entries for one direction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DirectionLedger {
    entries: VecDeque<Entry>,
}

impl DirectionLedger {
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest entry, next in line for offset.
    pub fn first(&self) -> Option<&Entry> {
        self.entries.front()
    }

    /// Most recent entry, the base of the next ladder layer.
    pub fn last(&self) -> Option<&Entry> {
        self.entries.back()
    }

    pub fn total_volume(&self) -> Decimal {
        self.entries.iter().map(|e| e.volume).sum()
    }

    /// Volume-weighted entry price, `None` when empty.
    pub fn average_price(&self) -> Option<Decimal> {
        let volume = self.total_volume();
        if volume <= Decimal::ZERO {
            return None;
        }
        let notional: Decimal = self.entries.iter().map(|e| e.price * e.volume).sum();
        Some(notional / volume)
    }

    pub fn floating_pnl(&self, price: Decimal) -> Decimal {
        self.entries.iter().map(|e| e.pnl_at(price)).sum()
    }
}

/// Result of applying a fill to the ledger.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FillOutcome {
    /// Offset chunks realized by this fill, oldest entry first.
    pub realized: Vec<RealizedTrade>,
    /// Entry appended by the fill's leftover volume.
    pub opened: Option<Entry>,
    /// Offset volume that had nothing on record to match.
    pub unmatched: Decimal,
}

impl FillOutcome {
    pub fn realized_pnl(&self) -> Decimal {
        self.realized.iter().map(|t| t.pnl).sum()
    }
}

/// Open entries of one basket, long and short.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BasketLedger {
    long: DirectionLedger,
    short: DirectionLedger,
    realized_pnl: Decimal,
}

impl BasketLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn side(&self, direction: Direction) -> &DirectionLedger {
        match direction {
            Direction::Long => &self.long,
            Direction::Short => &self.short,
        }
    }

    fn side_mut(&mut self, direction: Direction) -> &mut DirectionLedger {
        match direction {
            Direction::Long => &mut self.long,
            Direction::Short => &mut self.short,
        }
    }

    pub fn volume(&self, direction: Direction) -> Decimal {
        self.side(direction).total_volume()
    }

    /// Gross volume across both directions.
    pub fn total_volume(&self) -> Decimal {
        self.long.total_volume() + self.short.total_volume()
    }

    pub fn entry_count(&self) -> usize {
        self.long.len() + self.short.len()
    }

    pub fn is_flat(&self) -> bool {
        self.long.is_empty() && self.short.is_empty()
    }

    /// Both directions populated with equal volume.
    pub fn is_hedged(&self) -> bool {
        !self.long.is_empty()
            && !self.short.is_empty()
            && self.long.total_volume() == self.short.total_volume()
    }

    /// The only populated direction, `None` when flat or two-sided.
    pub fn single_direction(&self) -> Option<Direction> {
        match (self.long.is_empty(), self.short.is_empty()) {
            (false, true) => Some(Direction::Long),
            (true, false) => Some(Direction::Short),
            _ => None,
        }
    }

    /// Direction carrying the larger volume, `None` when flat or balanced.
    pub fn dominant_direction(&self) -> Option<Direction> {
        let long = self.long.total_volume();
        let short = self.short.total_volume();
        if long > short {
            Some(Direction::Long)
        } else if short > long {
            Some(Direction::Short)
        } else {
            None
        }
    }

    /// P&L realized by offsets since the last `clear`.
    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    /// Floating P&L of every entry marked at a single price.
    pub fn floating_pnl(&self, price: Decimal) -> Decimal {
        self.long.floating_pnl(price) + self.short.floating_pnl(price)
    }

    /// Floating P&L marking longs at the bid and shorts at the ask.
    pub fn floating_pnl_at(&self, bid: Decimal, ask: Decimal) -> Decimal {
        self.long.floating_pnl(bid) + self.short.floating_pnl(ask)
    }

    /// Floating P&L in pips per unit of open volume.
    pub fn floating_pips(&self, price: Decimal, pip_size: Decimal) -> Decimal {
        self.pips_of(self.floating_pnl(price), pip_size)
    }

    pub fn floating_pips_at(&self, bid: Decimal, ask: Decimal, pip_size: Decimal) -> Decimal {
        self.pips_of(self.floating_pnl_at(bid, ask), pip_size)
    }

    fn pips_of(&self, pnl: Decimal, pip_size: Decimal) -> Decimal {
        let volume = self.total_volume();
        if volume <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        pips::to_pips(pnl / volume, pip_size)
    }

    /// Apply a fill with netting semantics.
    ///
    /// A fill against the dominant direction offsets that direction oldest
    /// first; whatever volume is left opens a new entry on the fill's own
    /// direction. A fill on the dominant direction, or on a flat or balanced
    /// basket, only appends.
    pub fn record_fill(
        &mut self,
        side: Side,
        price: Decimal,
        volume: Decimal,
        time: DateTime<Utc>,
        reason: CloseReason,
    ) -> FillOutcome {
        if !is_usable(price, volume) {
            warn!("Ignoring fill with price {} volume {}", price, volume);
            return FillOutcome::default();
        }

        let mut outcome = FillOutcome::default();
        let mut remaining = volume;
        let opposite = side.direction().opposite();
        if self.dominant_direction() == Some(opposite) {
            remaining = self.offset(opposite, price, volume, time, reason, &mut outcome.realized);
        }
        if remaining > Decimal::ZERO {
            outcome.opened = Some(self.push(side, price, remaining, time));
        }
        outcome
    }

    /// Append an entry to `direction` without netting.
    pub fn apply_open(
        &mut self,
        direction: Direction,
        price: Decimal,
        volume: Decimal,
        time: DateTime<Utc>,
    ) -> Option<Entry> {
        if !is_usable(price, volume) {
            warn!("Ignoring open with price {} volume {}", price, volume);
            return None;
        }
        Some(self.push(direction.open_side(), price, volume, time))
    }

    /// Offset `volume` from `direction` only, oldest entry first.
    ///
    /// Volume beyond what is on record is clamped away and reported in
    /// [`FillOutcome::unmatched`].
    pub fn apply_close(
        &mut self,
        direction: Direction,
        price: Decimal,
        volume: Decimal,
        time: DateTime<Utc>,
        reason: CloseReason,
    ) -> FillOutcome {
        let mut outcome = FillOutcome::default();
        if !is_usable(price, volume) {
            warn!("Ignoring close with price {} volume {}", price, volume);
            return outcome;
        }
        let remaining = self.offset(direction, price, volume, time, reason, &mut outcome.realized);
        if remaining > Decimal::ZERO {
            warn!(
                "Close of {} {:?} exceeds ledger, {} unmatched",
                volume, direction, remaining
            );
            outcome.unmatched = remaining;
        }
        outcome
    }

    /// Remove every entry and the realized total.
    pub fn clear(&mut self) {
        self.long.entries.clear();
        self.short.entries.clear();
        self.realized_pnl = Decimal::ZERO;
    }

    fn push(&mut self, side: Side, price: Decimal, volume: Decimal, time: DateTime<Utc>) -> Entry {
        let entry = Entry {
            id: Uuid::new_v4(),
            price,
            volume,
            side,
            opened_at: time,
        };
        debug!("Entry {:?} {} @ {}", side, volume, price);
        self.side_mut(side.direction()).entries.push_back(entry.clone());
        entry
    }

    /// FIFO offset against `direction`. Returns the volume left unmatched.
    fn offset(
        &mut self,
        direction: Direction,
        exit_price: Decimal,
        volume: Decimal,
        time: DateTime<Utc>,
        reason: CloseReason,
        realized: &mut Vec<RealizedTrade>,
    ) -> Decimal {
        let mut remaining = volume;
        let mut realized_total = Decimal::ZERO;
        {
            let queue = &mut self.side_mut(direction).entries;
            while remaining > Decimal::ZERO {
                let Some(front) = queue.front_mut() else {
                    break;
                };
                let chunk = remaining.min(front.volume);
                let pnl = (exit_price - front.price) * chunk * direction.sign();
                realized.push(RealizedTrade {
                    id: Uuid::new_v4().to_string(),
                    direction,
                    entry_price: front.price,
                    exit_price,
                    volume: chunk,
                    pnl,
                    opened_at: front.opened_at,
                    closed_at: time,
                    reason,
                });
                realized_total += pnl;
                remaining -= chunk;
                front.volume -= chunk;
                if front.volume <= Decimal::ZERO {
                    queue.pop_front();
                }
            }
        }
        self.realized_pnl += realized_total;
        remaining
    }
}

fn is_usable(price: Decimal, volume: Decimal) -> bool {
    price > Decimal::ZERO && volume > Decimal::ZERO
}
