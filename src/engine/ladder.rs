use std::fmt::Debug;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::config::{EngineConfig, GridDirection, InstrumentSpec, ProgressionMode};
use crate::models::order::Direction;

/// Spacing and sizing rule for successive ladder layers.
pub trait ProgressionPolicy: Debug + Send + Sync {
    /// Distance in pips between layer `layer - 1` and layer `layer` (1-indexed).
    fn distance_pips(&self, layer: u32) -> Decimal;

    /// Requested volume for the layer after one sized `previous`.
    fn next_volume(&self, previous: Decimal) -> Decimal;

    fn mode(&self) -> ProgressionMode;
}

/// Every layer sits `step` pips from the previous one.
#[derive(Debug, Clone)]
pub struct StaticProgression {
    pub step_pips: Decimal,
    pub multiplier: Decimal,
}

impl ProgressionPolicy for StaticProgression {
    fn distance_pips(&self, _layer: u32) -> Decimal {
        self.step_pips
    }

    fn next_volume(&self, previous: Decimal) -> Decimal {
        previous * self.multiplier
    }

    fn mode(&self) -> ProgressionMode {
        ProgressionMode::Static
    }
}

/// Layer `n` sits `step * n` pips from the previous one.
#[derive(Debug, Clone)]
pub struct GeometricProgression {
    pub step_pips: Decimal,
    pub multiplier: Decimal,
}

impl ProgressionPolicy for GeometricProgression {
    fn distance_pips(&self, layer: u32) -> Decimal {
        self.step_pips
            .checked_mul(Decimal::from(layer.max(1)))
            .unwrap_or(Decimal::MAX)
    }

    fn next_volume(&self, previous: Decimal) -> Decimal {
        previous * self.multiplier
    }

    fn mode(&self) -> ProgressionMode {
        ProgressionMode::Geometric
    }
}

/// Layer `n` sits `step * 2^(n-1)` pips from the previous one.
#[derive(Debug, Clone)]
pub struct ExponentialProgression {
    pub step_pips: Decimal,
    pub multiplier: Decimal,
}

impl ProgressionPolicy for ExponentialProgression {
    fn distance_pips(&self, layer: u32) -> Decimal {
        let two = Decimal::TWO;
        let mut distance = self.step_pips;
        for _ in 1..layer.max(1) {
            distance = match distance.checked_mul(two) {
                Some(d) => d,
                None => return Decimal::MAX,
            };
        }
        distance
    }

    fn next_volume(&self, previous: Decimal) -> Decimal {
        previous * self.multiplier
    }

    fn mode(&self) -> ProgressionMode {
        ProgressionMode::Exponential
    }
}

/// Select the progression policy once, at construction.
pub fn progression_for(
    mode: ProgressionMode,
    step_pips: Decimal,
    multiplier: Decimal,
) -> Box<dyn ProgressionPolicy> {
    match mode {
        ProgressionMode::Static => Box::new(StaticProgression {
            step_pips,
            multiplier,
        }),
        ProgressionMode::Geometric => Box::new(GeometricProgression {
            step_pips,
            multiplier,
        }),
        ProgressionMode::Exponential => Box::new(ExponentialProgression {
            step_pips,
            multiplier,
        }),
    }
}

/// Ladder position of the current basket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridStepState {
    pub base_step_pips: Decimal,
    pub progression_mode: ProgressionMode,
    /// Number of ladder layers opened on top of the first entry.
    pub layer_index: u32,
}

impl GridStepState {
    pub fn new(base_step_pips: Decimal, progression_mode: ProgressionMode) -> Self {
        Self {
            base_step_pips,
            progression_mode,
            layer_index: 0,
        }
    }

    /// 1-indexed number of the layer that would open next.
    pub fn next_layer(&self) -> u32 {
        self.layer_index.saturating_add(1)
    }

    pub fn advance(&mut self) {
        self.layer_index = self.layer_index.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.layer_index = 0;
    }
}

/// Target of the next ladder layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LayerPlan {
    pub layer: u32,
    pub direction: Direction,
    pub price: Decimal,
    pub volume: Decimal,
    pub distance_pips: Decimal,
}

/// Computes price and size of the next grid layer.
///
/// Stateless apart from the configuration it is built with; the layer counter
/// comes in through [`GridStepState`]. Order-count limits are the caller's job.
#[derive(Debug)]
pub struct LadderBuilder {
    policy: Box<dyn ProgressionPolicy>,
    grid_direction: GridDirection,
    max_volume: Option<Decimal>,
    max_multiplier_lot: Option<Decimal>,
    instrument: InstrumentSpec,
}

impl LadderBuilder {
    pub fn new(config: &EngineConfig, instrument: &InstrumentSpec) -> Self {
        Self {
            policy: progression_for(
                config.progression_mode,
                config.grid_step_pips,
                config.lot_multiplier,
            ),
            grid_direction: config.grid_direction,
            max_volume: config.max_volume,
            max_multiplier_lot: config.max_multiplier_lot,
            instrument: instrument.clone(),
        }
    }

    pub fn grid_direction(&self) -> GridDirection {
        self.grid_direction
    }

    pub fn mode(&self) -> ProgressionMode {
        self.policy.mode()
    }

    pub fn distance_pips(&self, layer: u32) -> Decimal {
        self.policy.distance_pips(layer)
    }

    /// Price `distance_pips` away from `base_price` on the side the grid extends.
    ///
    /// `None` when the distance overflows or the target would not be a
    /// positive price.
    pub fn target_price(
        &self,
        base_price: Decimal,
        direction: Direction,
        distance_pips: Decimal,
    ) -> Option<Decimal> {
        let distance = distance_pips.checked_mul(self.instrument.pip_size())?;
        // Against-trend long layers sit below the base, short layers above.
        let below = match (self.grid_direction, direction) {
            (GridDirection::AgainstTrend, Direction::Long) => true,
            (GridDirection::AgainstTrend, Direction::Short) => false,
            (GridDirection::WithTrend, Direction::Long) => false,
            (GridDirection::WithTrend, Direction::Short) => true,
        };
        let price = if below {
            base_price.checked_sub(distance)?
        } else {
            base_price.checked_add(distance)?
        };
        (price > Decimal::ZERO).then_some(price)
    }

    /// Volume for the next layer before normalization, with both caps applied.
    pub fn capped_volume(&self, previous_volume: Decimal, first_volume: Decimal) -> Decimal {
        let mut volume = self.policy.next_volume(previous_volume);
        if let Some(max) = self.max_volume {
            volume = volume.min(max);
        }
        if let Some(ceiling) = self.max_multiplier_lot {
            volume = volume.min(first_volume * ceiling);
        }
        volume
    }

    /// Plan the next layer, or `None` when its volume normalizes to zero or
    /// its target price is out of range.
    pub fn next_layer(
        &self,
        state: &GridStepState,
        base_price: Decimal,
        direction: Direction,
        previous_volume: Decimal,
        first_volume: Decimal,
    ) -> Option<LayerPlan> {
        let layer = state.next_layer();
        let distance_pips = self.distance_pips(layer);
        let requested = self.capped_volume(previous_volume, first_volume);
        let volume = self.instrument.normalize_volume(requested);
        if volume.is_zero() {
            debug!(
                "Layer {} volume {} normalizes to zero, ladder stops",
                layer, requested
            );
            return None;
        }
        let Some(price) = self.target_price(base_price, direction, distance_pips) else {
            debug!(
                "Layer {} at {} pips from {} is out of range, ladder stops",
                layer, distance_pips, base_price
            );
            return None;
        };

        Some(LayerPlan {
            layer,
            direction,
            price,
            volume,
            distance_pips,
        })
    }
}
