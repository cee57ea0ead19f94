use rust_decimal::Decimal;

/// Round `volume` down to the volume step and clamp it into `[min, max]`.
///
/// Rounding is always toward zero so a sized order never exceeds the
/// requested risk. A floored result that is not positive is `0`, which callers
/// treat as "do not trade"; anything else lands in `[min, max]`. Bounds that
/// are not positive are ignored.
pub fn normalize(volume: Decimal, step: Decimal, min: Decimal, max: Decimal) -> Decimal {
    let mut result = if step > Decimal::ZERO {
        (volume / step).floor() * step
    } else {
        volume
    };

    if result <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    if max > Decimal::ZERO && result > max {
        result = max;
        // Max need not sit on the step grid.
        if step > Decimal::ZERO {
            result = (result / step).floor() * step;
        }
    }

    if min > Decimal::ZERO && result < min {
        result = min;
    }

    result.normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rust_decimal_macros::dec;

    #[test]
    fn test_floor_to_step() {
        assert_eq!(normalize(dec!(0.127), dec!(0.01), dec!(0.01), dec!(5)), dec!(0.12));
        assert_eq!(normalize(dec!(0.12), dec!(0.01), dec!(0.01), dec!(5)), dec!(0.12));
    }

    #[test]
    fn test_never_rounds_up() {
        assert_eq!(normalize(dec!(0.199), dec!(0.1), Decimal::ZERO, Decimal::ZERO), dec!(0.1));
    }

    #[test]
    fn test_clamped_to_max() {
        assert_eq!(normalize(dec!(12.34), dec!(0.01), dec!(0.01), dec!(5)), dec!(5));
        assert_eq!(normalize(dec!(12), dec!(0.5), dec!(0.5), dec!(4.8)), dec!(4.5));
    }

    #[test]
    fn test_below_step_is_zero() {
        assert_eq!(normalize(dec!(0.005), dec!(0.01), dec!(0.01), dec!(5)), Decimal::ZERO);
    }

    #[test]
    fn test_below_min_clamps_up() {
        assert_eq!(normalize(dec!(0.05), dec!(0.01), dec!(0.1), dec!(5)), dec!(0.1));
        assert_eq!(normalize(dec!(0.099), Decimal::ZERO, dec!(0.1), Decimal::ZERO), dec!(0.1));
    }

    #[test]
    fn test_non_positive_input() {
        assert_eq!(normalize(Decimal::ZERO, dec!(0.01), dec!(0.01), dec!(5)), Decimal::ZERO);
        assert_eq!(normalize(dec!(-1), dec!(0.01), dec!(0.01), dec!(5)), Decimal::ZERO);
    }

    #[test]
    fn test_zero_step_keeps_volume() {
        let v = normalize(dec!(0.127), Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);
        assert_eq!(v, dec!(0.127));
    }

    #[test]
    fn test_result_is_zero_or_at_least_min() {
        let mut rng = StdRng::seed_from_u64(7);
        let step = dec!(0.01);
        let min = dec!(0.05);
        let max = dec!(3);
        for _ in 0..2000 {
            let raw = Decimal::new(rng.gen_range(-500..50_000), 4);
            let v = normalize(raw, step, min, max);
            assert!(v.is_zero() || v >= min, "{} -> {}", raw, v);
            assert!(v <= max);
            assert!(v.is_zero() || v <= raw.max(min));
        }
    }
}
