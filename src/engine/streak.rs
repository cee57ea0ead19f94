use std::collections::VecDeque;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::config::EngineConfig;
use crate::models::order::Direction;

/// Most recent trade outcomes of one direction, oldest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LossStreakWindow {
    outcomes: VecDeque<bool>,
}

impl LossStreakWindow {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn loss_count(&self) -> usize {
        self.outcomes.iter().filter(|&&is_loss| is_loss).count()
    }

    fn push(&mut self, is_loss: bool, capacity: usize) {
        self.outcomes.push_back(is_loss);
        while self.outcomes.len() > capacity {
            self.outcomes.pop_front();
        }
    }
}

/// Loss-streak volume selector.
///
/// Switches a direction to the reduced volume while its recent window holds
/// `loss_trigger` or more losses; wins entering the window restore the
/// normal volume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LossStreakSizer {
    normal_volume: Decimal,
    reduced_volume: Decimal,
    total_trigger: usize,
    loss_trigger: usize,
    long: LossStreakWindow,
    short: LossStreakWindow,
}

impl LossStreakSizer {
    pub fn new(
        normal_volume: Decimal,
        reduced_volume: Decimal,
        total_trigger: usize,
        loss_trigger: usize,
    ) -> Self {
        Self {
            normal_volume,
            reduced_volume,
            total_trigger,
            loss_trigger,
            long: LossStreakWindow::default(),
            short: LossStreakWindow::default(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.normal_volume,
            config.reduced_volume,
            config.loss_streak_total_trigger,
            config.loss_streak_loss_trigger,
        )
    }

    pub fn window(&self, direction: Direction) -> &LossStreakWindow {
        match direction {
            Direction::Long => &self.long,
            Direction::Short => &self.short,
        }
    }

    pub fn record_outcome(&mut self, direction: Direction, is_loss: bool) {
        let capacity = self.total_trigger;
        let before = self.is_reduced(direction);
        let window = match direction {
            Direction::Long => &mut self.long,
            Direction::Short => &mut self.short,
        };
        window.push(is_loss, capacity);
        let after = self.is_reduced(direction);
        if before != after {
            info!(
                "{:?} sizing switched to {} volume",
                direction,
                if after { "reduced" } else { "normal" }
            );
        }
    }

    pub fn is_reduced(&self, direction: Direction) -> bool {
        // A zero loss trigger would reduce on an empty window.
        self.loss_trigger > 0 && self.window(direction).loss_count() >= self.loss_trigger
    }

    pub fn next_volume(&self, direction: Direction) -> Decimal {
        if self.is_reduced(direction) {
            self.reduced_volume
        } else {
            self.normal_volume
        }
    }

    pub fn reset(&mut self) {
        self.long = LossStreakWindow::default();
        self.short = LossStreakWindow::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rust_decimal_macros::dec;

    fn sizer() -> LossStreakSizer {
        LossStreakSizer::new(dec!(0.1), dec!(0.01), 5, 3)
    }

    #[test]
    fn test_recent_losses_reduce_then_heal() {
        let mut s = sizer();
        for is_loss in [true, true, true, false, false] {
            s.record_outcome(Direction::Long, is_loss);
        }
        assert_eq!(s.next_volume(Direction::Long), dec!(0.01));

        s.record_outcome(Direction::Long, false);
        assert_eq!(s.window(Direction::Long).loss_count(), 2);
        assert_eq!(s.next_volume(Direction::Long), dec!(0.1));
    }

    #[test]
    fn test_directions_are_independent() {
        let mut s = sizer();
        for _ in 0..3 {
            s.record_outcome(Direction::Short, true);
        }
        assert_eq!(s.next_volume(Direction::Short), dec!(0.01));
        assert_eq!(s.next_volume(Direction::Long), dec!(0.1));
    }

    #[test]
    fn test_window_never_exceeds_capacity() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut s = sizer();
        for _ in 0..1000 {
            s.record_outcome(Direction::Long, rng.gen_bool(0.4));
            assert!(s.window(Direction::Long).len() <= 5);
        }
        assert_eq!(s.window(Direction::Long).len(), 5);
    }

    #[test]
    fn test_reset() {
        let mut s = sizer();
        for _ in 0..4 {
            s.record_outcome(Direction::Long, true);
        }
        s.reset();
        assert!(s.window(Direction::Long).is_empty());
        assert_eq!(s.next_volume(Direction::Long), dec!(0.1));
    }
}
