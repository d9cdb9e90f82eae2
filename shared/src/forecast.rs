//! Rolling-average consumption forecast

use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

use crate::rounding::round_internal;

/// Expected consumption per article over `horizon_days`
///
/// `consumed` holds each article's total consumption over the last
/// `lookback_days`. Articles with no positive forecast are left out.
pub fn rolling_average_forecast(
    consumed: &HashMap<Uuid, Decimal>,
    lookback_days: u32,
    horizon_days: Decimal,
) -> HashMap<Uuid, Decimal> {
    if lookback_days == 0 || horizon_days <= Decimal::ZERO {
        return HashMap::new();
    }
    let lookback = Decimal::from(lookback_days);

    consumed
        .iter()
        .filter_map(|(article_id, total)| {
            let forecast = round_internal(*total / lookback * horizon_days);
            (forecast > Decimal::ZERO).then_some((*article_id, forecast))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_daily_average_times_horizon() {
        let id = Uuid::new_v4();
        let consumed = HashMap::from([(id, dec("3000"))]);
        let forecast = rolling_average_forecast(&consumed, 30, dec("7"));
        assert_eq!(forecast.get(&id), Some(&dec("700")));
    }

    #[test]
    fn test_zero_history_is_omitted() {
        let consumed = HashMap::from([(Uuid::new_v4(), Decimal::ZERO)]);
        assert!(rolling_average_forecast(&consumed, 30, dec("7")).is_empty());
    }

    #[test]
    fn test_empty_horizon() {
        let consumed = HashMap::from([(Uuid::new_v4(), dec("10"))]);
        assert!(rolling_average_forecast(&consumed, 30, Decimal::ZERO).is_empty());
    }
}
