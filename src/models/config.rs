use std::path::Path;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::engine::{pips, volume};
use crate::errors::EngineError;

/// Instrument metadata supplied by the host. Set once per engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstrumentSpec {
    /// Minimum price movement (e.g. 0.00001 for a 5-digit EUR/USD quote)
    pub price_step: Decimal,
    /// Number of decimal places in the quote
    pub decimal_digits: u32,
    /// Volume increment accepted by the venue
    pub volume_step: Decimal,
    pub min_volume: Decimal,
    pub max_volume: Decimal,
    /// Account currency per 1.0 of price movement per 1.0 of volume
    #[serde(default = "default_contract_size")]
    pub contract_size: Decimal,
}

fn default_contract_size() -> Decimal {
    Decimal::ONE
}

impl InstrumentSpec {
    pub fn pip_size(&self) -> Decimal {
        pips::pip_size(self.price_step, self.decimal_digits)
    }

    /// Volume rounded to this instrument's step and limits. `0` means do not trade.
    pub fn normalize_volume(&self, requested: Decimal) -> Decimal {
        volume::normalize(requested, self.volume_step, self.min_volume, self.max_volume)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.price_step <= Decimal::ZERO {
            return Err(EngineError::InvalidInstrument(format!(
                "price_step must be positive, got {}",
                self.price_step
            )));
        }
        if self.volume_step < Decimal::ZERO {
            return Err(EngineError::InvalidInstrument(format!(
                "volume_step must not be negative, got {}",
                self.volume_step
            )));
        }
        if self.max_volume > Decimal::ZERO && self.min_volume > self.max_volume {
            return Err(EngineError::InvalidInstrument(format!(
                "min_volume {} exceeds max_volume {}",
                self.min_volume, self.max_volume
            )));
        }
        if self.contract_size <= Decimal::ZERO {
            return Err(EngineError::InvalidInstrument(
                "contract_size must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// How the distance between ladder layers grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProgressionMode {
    #[default]
    Static,
    Geometric,
    Exponential,
}

/// Unit used by the take-profit target and the equity lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProfitUnit {
    #[default]
    Pips,
    Currency,
}

/// Defensive action once floating loss reaches `loss_threshold_pips`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LossMode {
    #[default]
    DoNothing,
    CloseFirst,
    CloseAll,
}

/// Which way the ladder extends relative to price movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GridDirection {
    /// Add to the basket as price moves against it (averaging).
    #[default]
    AgainstTrend,
    /// Add to the basket as price moves in its favor (pyramiding).
    WithTrend,
}

/// How ladder layers are sent to the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LadderOrderKind {
    /// Market order once price has travelled the layer distance.
    #[default]
    Market,
    /// Resting limit/stop order at the next layer price.
    Pending,
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    // ── Ladder ──
    pub grid_step_pips: Decimal,
    pub progression_mode: ProgressionMode,
    pub grid_direction: GridDirection,
    pub ladder_order_kind: LadderOrderKind,
    /// Maximum open entries per direction, first entry included.
    pub max_orders: u32,
    pub lot_multiplier: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_volume: Option<Decimal>,
    /// Ceiling on a layer's volume as a multiple of the first entry's volume.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_multiplier_lot: Option<Decimal>,
    /// New layers are not admitted while the spread is wider than this.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_spread_pips: Option<Decimal>,

    // ── Exits ──
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit_target: Option<Decimal>,
    pub close_target_mode: ProfitUnit,
    /// Hard floating-loss cutoff in account currency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_float_loss: Option<Decimal>,
    pub loss_threshold_pips: Decimal,
    pub loss_mode: LossMode,

    // ── Hedge ──
    pub hedge_enabled: bool,
    pub hedge_loss_threshold_percent: Decimal,
    pub hedge_volume_multiplier: Decimal,

    // ── Equity lock (in `close_target_mode` units) ──
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equity_trigger_level: Option<Decimal>,
    pub equity_breakeven_offset: Decimal,
    pub equity_trail_distance: Decimal,
    pub equity_breakeven_floor: Decimal,
    pub equity_trail_trigger_multiplier: Decimal,

    // ── Loss-streak sizing ──
    pub normal_volume: Decimal,
    pub reduced_volume: Decimal,
    pub loss_streak_total_trigger: usize,
    pub loss_streak_loss_trigger: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grid_step_pips: dec!(30),
            progression_mode: ProgressionMode::Static,
            grid_direction: GridDirection::AgainstTrend,
            ladder_order_kind: LadderOrderKind::Market,
            max_orders: 10,
            lot_multiplier: dec!(2),
            max_volume: None,
            max_multiplier_lot: None,
            max_spread_pips: None,
            take_profit_target: Some(dec!(20)),
            close_target_mode: ProfitUnit::Pips,
            max_float_loss: None,
            loss_threshold_pips: Decimal::ZERO,
            loss_mode: LossMode::DoNothing,
            hedge_enabled: false,
            hedge_loss_threshold_percent: dec!(10),
            hedge_volume_multiplier: Decimal::ONE,
            equity_trigger_level: None,
            equity_breakeven_offset: Decimal::ZERO,
            equity_trail_distance: Decimal::ZERO,
            equity_breakeven_floor: Decimal::ZERO,
            equity_trail_trigger_multiplier: dec!(2),
            normal_volume: dec!(0.1),
            reduced_volume: dec!(0.01),
            loss_streak_total_trigger: 5,
            loss_streak_loss_trigger: 3,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::FileRead(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&raw)
    }

    /// Startup validation. The engine itself fails safe on bad values; this
    /// lets the host refuse to start instead.
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |msg: String| Err(EngineError::InvalidConfig(msg));

        if self.grid_step_pips <= Decimal::ZERO {
            return invalid(format!(
                "grid_step_pips must be positive, got {}",
                self.grid_step_pips
            ));
        }
        if self.max_orders == 0 {
            return invalid("max_orders must be at least 1".into());
        }
        if self.lot_multiplier <= Decimal::ZERO {
            return invalid(format!(
                "lot_multiplier must be positive, got {}",
                self.lot_multiplier
            ));
        }
        if self.normal_volume <= Decimal::ZERO {
            return invalid("normal_volume must be positive".into());
        }
        if self.reduced_volume < Decimal::ZERO || self.reduced_volume > self.normal_volume {
            return invalid(format!(
                "reduced_volume {} must be within [0, normal_volume {}]",
                self.reduced_volume, self.normal_volume
            ));
        }
        if self.loss_streak_total_trigger == 0 {
            return invalid("loss_streak_total_trigger must be at least 1".into());
        }
        if self.loss_streak_loss_trigger > self.loss_streak_total_trigger {
            return invalid(format!(
                "loss_streak_loss_trigger {} exceeds window of {}",
                self.loss_streak_loss_trigger, self.loss_streak_total_trigger
            ));
        }
        if self.loss_threshold_pips < Decimal::ZERO {
            return invalid("loss_threshold_pips must not be negative".into());
        }
        if self.loss_mode != LossMode::DoNothing && self.loss_threshold_pips.is_zero() {
            return invalid("loss_mode requires a positive loss_threshold_pips".into());
        }
        if self.hedge_enabled
            && (self.hedge_loss_threshold_percent <= Decimal::ZERO
                || self.hedge_volume_multiplier <= Decimal::ZERO)
        {
            return invalid("hedge thresholds and multiplier must be positive".into());
        }
        for (name, value) in [
            ("take_profit_target", self.take_profit_target),
            ("max_float_loss", self.max_float_loss),
            ("max_volume", self.max_volume),
            ("max_multiplier_lot", self.max_multiplier_lot),
            ("max_spread_pips", self.max_spread_pips),
            ("equity_trigger_level", self.equity_trigger_level),
        ] {
            if let Some(v) = value {
                if v <= Decimal::ZERO {
                    return invalid(format!("{} must be positive when set, got {}", name, v));
                }
            }
        }
        if self.equity_breakeven_offset < Decimal::ZERO
            || self.equity_trail_distance < Decimal::ZERO
        {
            return invalid("equity lock offsets must not be negative".into());
        }
        if let Some(trigger) = self.equity_trigger_level {
            if self.equity_breakeven_offset >= trigger {
                return invalid(format!(
                    "equity_breakeven_offset {} must be below equity_trigger_level {}",
                    self.equity_breakeven_offset, trigger
                ));
            }
        }
        if self.equity_trail_trigger_multiplier < Decimal::ONE {
            return invalid("equity_trail_trigger_multiplier must be at least 1".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn eurusd() -> InstrumentSpec {
        InstrumentSpec {
            price_step: dec!(0.00001),
            decimal_digits: 5,
            volume_step: dec!(0.01),
            min_volume: dec!(0.01),
            max_volume: dec!(5),
            contract_size: Decimal::ONE,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_instrument_helpers() {
        let inst = eurusd();
        assert!(inst.validate().is_ok());
        assert_eq!(inst.pip_size(), dec!(0.0001));
        assert_eq!(inst.normalize_volume(dec!(0.127)), dec!(0.12));
    }

    #[test]
    fn test_instrument_rejects_zero_step() {
        let mut inst = eurusd();
        inst.price_step = Decimal::ZERO;
        assert!(matches!(inst.validate(), Err(EngineError::InvalidInstrument(_))));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{
                "grid_step_pips": "25",
                "progression_mode": "geometric",
                "loss_mode": "close_all",
                "loss_threshold_pips": 80
            }"#,
        )
        .unwrap();
        assert_eq!(config.grid_step_pips, dec!(25));
        assert_eq!(config.progression_mode, ProgressionMode::Geometric);
        assert_eq!(config.loss_mode, LossMode::CloseAll);
        assert_eq!(config.loss_threshold_pips, dec!(80));
        assert_eq!(config.max_orders, 10);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = EngineConfig {
            grid_step_pips: Decimal::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.grid_step_pips = dec!(10);
        config.loss_streak_loss_trigger = 6;
        assert!(config.validate().is_err());

        config.loss_streak_loss_trigger = 3;
        config.equity_trigger_level = Some(dec!(10));
        config.equity_breakeven_offset = dec!(10);
        assert!(config.validate().is_err());

        config.equity_breakeven_offset = dec!(2);
        assert!(config.validate().is_ok());

        config.loss_mode = LossMode::CloseFirst;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "max_orders": 4, "hedge_enabled": true }}"#).unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.max_orders, 4);
        assert!(config.hedge_enabled);
    }

    #[test]
    fn test_load_missing_file() {
        let result = EngineConfig::load(Path::new("/nonexistent/grid.json"));
        assert!(matches!(result, Err(EngineError::FileRead(_))));
    }
}
