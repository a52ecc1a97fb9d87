//! Key-level derivation from daily candles

use crate::shared::types::{Candle, KeyLevels};

const FIB_618: f64 = 0.618;
const FIB_786: f64 = 0.786;

impl KeyLevels {
    /// Derive reference levels from daily candles ordered oldest to newest.
    ///
    /// The second-to-last candle is the last closed day ("yesterday"), the
    /// last one is the currently open day ("today"). Needs at least two
    /// valid candles; returns `None` otherwise so callers never see a
    /// half-filled record.
    pub fn from_daily_candles(candles: &[Candle]) -> Option<KeyLevels> {
        let valid: Vec<&Candle> = candles.iter().filter(|c| c.is_valid()).collect();
        if valid.len() < 2 {
            return None;
        }

        let yesterday = valid[valid.len() - 2];
        let today = valid[valid.len() - 1];

        let high = yesterday.high;
        let low = yesterday.low;
        let range = high - low;

        Some(KeyLevels {
            yesterday_high: high,
            yesterday_low: low,
            yesterday_close: yesterday.close,
            today_open: today.open,
            fib618: high - range * FIB_618,
            fib786: high - range * FIB_786,
        })
    }
}

impl Candle {
    /// Upstreams return null fields on closed markets and holidays; those
    /// rows arrive as NaN and must not feed level math.
    pub fn is_valid(&self) -> bool {
        self.open.is_finite() && self.high.is_finite() && self.low.is_finite() && self.close.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn candle(day: u32, open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            time: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            open,
            high,
            low,
            close,
        }
    }

    #[test]
    fn fewer_than_two_candles_yields_none() {
        assert!(KeyLevels::from_daily_candles(&[]).is_none());
        assert!(KeyLevels::from_daily_candles(&[candle(1, 1.0, 2.0, 0.5, 1.5)]).is_none());
    }

    #[test]
    fn invalid_candles_do_not_count() {
        let rows = vec![
            candle(1, 1.0, 2.0, 0.5, 1.5),
            candle(2, f64::NAN, f64::NAN, f64::NAN, f64::NAN),
        ];
        assert!(KeyLevels::from_daily_candles(&rows).is_none());
    }

    #[test]
    fn levels_come_from_last_closed_and_open_candle() {
        let rows = vec![
            candle(1, 90.0, 95.0, 85.0, 92.0),
            candle(2, 92.0, 110.0, 90.0, 100.0),
            candle(3, 101.0, 103.0, 99.0, 102.0),
        ];
        let levels = KeyLevels::from_daily_candles(&rows).unwrap();
        assert_eq!(levels.yesterday_high, 110.0);
        assert_eq!(levels.yesterday_low, 90.0);
        assert_eq!(levels.yesterday_close, 100.0);
        assert_eq!(levels.today_open, 101.0);
        // range 20: 110 - 20*0.618, 110 - 20*0.786
        assert!((levels.fib618 - 97.64).abs() < 1e-9);
        assert!((levels.fib786 - 94.28).abs() < 1e-9);
    }
}
