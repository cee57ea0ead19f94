use rust_decimal::Decimal;

/// Size of one pip for an instrument quoted with `decimal_digits` decimals.
///
/// 3- and 5-digit quotes carry a fractional pip, so the pip is ten price
/// steps. A non-positive step yields `1` so downstream divisions stay defined.
pub fn pip_size(price_step: Decimal, decimal_digits: u32) -> Decimal {
    if price_step <= Decimal::ZERO {
        return Decimal::ONE;
    }
    match decimal_digits {
        3 | 5 => price_step * Decimal::TEN,
        _ => price_step,
    }
}

/// Convert a distance in pips to a price distance.
pub fn to_price(pips: Decimal, pip_size: Decimal) -> Decimal {
    pips * pip_size
}

/// Convert a price distance to pips. Returns 0 for a non-positive pip size.
pub fn to_pips(price_delta: Decimal, pip_size: Decimal) -> Decimal {
    if pip_size <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    price_delta / pip_size
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_pip_size_fractional_quotes() {
        assert_eq!(pip_size(dec!(0.00001), 5), dec!(0.0001));
        assert_eq!(pip_size(dec!(0.001), 3), dec!(0.01));
    }

    #[test]
    fn test_pip_size_whole_quotes() {
        assert_eq!(pip_size(dec!(0.0001), 4), dec!(0.0001));
        assert_eq!(pip_size(dec!(0.01), 2), dec!(0.01));
    }

    #[test]
    fn test_pip_size_invalid_step_fails_safe() {
        assert_eq!(pip_size(Decimal::ZERO, 5), Decimal::ONE);
        assert_eq!(pip_size(dec!(-0.01), 2), Decimal::ONE);
    }

    #[test]
    fn test_take_profit_to_price() {
        let pip = pip_size(dec!(0.00001), 5);
        assert_eq!(to_price(dec!(10), pip), dec!(0.001));
    }

    #[test]
    fn test_to_pips() {
        assert_eq!(to_pips(dec!(0.0050), dec!(0.0001)), dec!(50));
        assert_eq!(to_pips(dec!(-0.0025), dec!(0.0001)), dec!(-25));
        assert_eq!(to_pips(dec!(0.0050), Decimal::ZERO), Decimal::ZERO);
    }
}
