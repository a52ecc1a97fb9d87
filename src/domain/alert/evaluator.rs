//! Alert evaluation - pure diff of previous instrument state against a new price

use crate::shared::types::{Instrument, LevelFlags};

/// Outcome of evaluating one tick: messages to dispatch plus the alert
/// state the store must apply (cleared one-shot flags, moved baseline).
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub messages: Vec<String>,
    pub flags: LevelFlags,
    pub interval_baseline: Option<f64>,
}

impl Evaluation {
    fn unchanged(prev: &Instrument) -> Self {
        Self {
            messages: Vec::new(),
            flags: prev.alerts.flags,
            interval_baseline: prev.alerts.interval.as_ref().and_then(|i| i.baseline),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Evaluate all configured alerts for one price update.
///
/// Pure and synchronous: the caller merges the price and applies the
/// returned state. Evaluation is suppressed entirely until the instrument
/// has seen a real price, so the 0 -> first-quote transition never fires.
///
/// Static high/low thresholds are edge-triggered but NOT one-shot: the
/// configuration persists, so the alert re-fires on every re-crossing.
/// Key-level flags are one-shot and clear after firing. This asymmetry is
/// intentional.
pub fn evaluate(prev: &Instrument, new_price: f64) -> Evaluation {
    let mut eval = Evaluation::unchanged(prev);

    if !prev.is_initialized || prev.price <= 0.0 {
        return eval;
    }

    check_thresholds(prev, new_price, &mut eval);
    check_key_levels(prev, new_price, &mut eval);
    check_interval(prev, new_price, &mut eval);

    eval
}

fn check_thresholds(prev: &Instrument, new_price: f64, eval: &mut Evaluation) {
    if let Some(high) = prev.alerts.high {
        if new_price >= high && prev.price < high {
            eval.messages.push(format!(
                "🚀 {} surged above {:.2} (now {:.2})",
                prev.name, high, new_price
            ));
        }
    }

    if let Some(low) = prev.alerts.low {
        if new_price <= low && prev.price > low {
            eval.messages.push(format!(
                "🔻 {} dropped below {:.2} (now {:.2})",
                prev.name, low, new_price
            ));
        }
    }
}

fn check_key_levels(prev: &Instrument, new_price: f64, eval: &mut Evaluation) {
    let levels = match &prev.key_levels {
        Some(levels) => levels,
        None => return,
    };
    if !prev.alerts.flags.any() {
        return;
    }

    let crossed = |level: f64| {
        (prev.price < level && new_price >= level) || (prev.price > level && new_price <= level)
    };

    let mut hits: Vec<String> = Vec::new();
    let flags = &mut eval.flags;

    if flags.touch_high && crossed(levels.yesterday_high) {
        hits.push(format!("yesterday's high {:.2}", levels.yesterday_high));
        flags.touch_high = false;
    }
    if flags.touch_low && crossed(levels.yesterday_low) {
        hits.push(format!("yesterday's low {:.2}", levels.yesterday_low));
        flags.touch_low = false;
    }
    if flags.touch_close && crossed(levels.yesterday_close) {
        hits.push(format!("yesterday's close {:.2}", levels.yesterday_close));
        flags.touch_close = false;
    }
    if flags.touch_open && crossed(levels.today_open) {
        hits.push(format!("today's open {:.2}", levels.today_open));
        flags.touch_open = false;
    }
    if flags.touch_fib618 && crossed(levels.fib618) {
        hits.push(format!("0.618 retracement {:.2}", levels.fib618));
        flags.touch_fib618 = false;
    }
    if flags.touch_fib786 && crossed(levels.fib786) {
        hits.push(format!("0.786 retracement {:.2}", levels.fib786));
        flags.touch_fib786 = false;
    }

    // All crossings from one tick batch into a single message.
    if !hits.is_empty() {
        eval.messages.push(format!(
            "📍 {} crossed {} (prev {:.2} -> now {:.2})",
            prev.name,
            hits.join(", "),
            prev.price,
            new_price
        ));
    }
}

fn check_interval(prev: &Instrument, new_price: f64, eval: &mut Evaluation) {
    let interval = match &prev.alerts.interval {
        Some(interval) => interval,
        None => return,
    };
    if !interval.enabled || interval.step <= 0.0 {
        return;
    }

    match interval.baseline {
        None => {
            // First observed price seeds the baseline without firing.
            eval.interval_baseline = Some(new_price);
        }
        Some(baseline) => {
            let diff = new_price - baseline;
            if diff.abs() >= interval.step {
                let direction = if diff > 0.0 { "up" } else { "down" };
                eval.messages.push(format!(
                    "🔔 {} moved {} {:.2} (now {:.2})",
                    prev.name,
                    direction,
                    diff.abs(),
                    new_price
                ));
                eval.interval_baseline = Some(new_price);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::types::{InstrumentKind, IntervalAlert, KeyLevels};

    fn instrument(price: f64) -> Instrument {
        let mut inst = Instrument::new(
            "btc",
            "BTC",
            "Bitcoin",
            "BTCUSDT",
            InstrumentKind::Crypto,
            "spot",
        );
        inst.price = price;
        inst.is_initialized = true;
        inst
    }

    fn levels() -> KeyLevels {
        KeyLevels {
            yesterday_high: 50_000.0,
            yesterday_low: 48_000.0,
            yesterday_close: 49_500.0,
            today_open: 49_600.0,
            fib618: 48_764.0,
            fib786: 48_428.0,
        }
    }

    #[test]
    fn uninitialized_instrument_never_fires() {
        let mut inst = instrument(100.0);
        inst.is_initialized = false;
        inst.alerts.high = Some(50.0);
        inst.alerts.low = Some(200.0);
        inst.alerts.flags.touch_high = true;
        inst.key_levels = Some(levels());
        inst.alerts.interval = Some(IntervalAlert {
            step: 1.0,
            enabled: true,
            baseline: None,
        });

        let eval = evaluate(&inst, 60_000.0);
        assert!(eval.is_empty());
        assert!(eval.flags.touch_high);
        assert_eq!(eval.interval_baseline, None);
    }

    #[test]
    fn zero_previous_price_never_fires() {
        let mut inst = instrument(0.0);
        inst.alerts.high = Some(50.0);
        assert!(evaluate(&inst, 100.0).is_empty());
    }

    #[test]
    fn high_threshold_fires_on_rising_edge_only() {
        let mut inst = instrument(100.0);
        inst.alerts.high = Some(110.0);

        assert_eq!(evaluate(&inst, 111.0).messages.len(), 1);
        assert!(evaluate(&inst, 109.0).is_empty());

        // Already above: no re-fire while staying above.
        inst.price = 111.0;
        assert!(evaluate(&inst, 112.0).is_empty());
    }

    #[test]
    fn high_threshold_refires_after_recrossing() {
        let mut inst = instrument(100.0);
        inst.alerts.high = Some(110.0);

        assert_eq!(evaluate(&inst, 111.0).messages.len(), 1);
        inst.price = 111.0;
        assert!(evaluate(&inst, 105.0).is_empty());
        inst.price = 105.0;
        assert_eq!(evaluate(&inst, 111.0).messages.len(), 1);
    }

    #[test]
    fn low_threshold_fires_on_falling_edge() {
        let mut inst = instrument(100.0);
        inst.alerts.low = Some(95.0);

        assert_eq!(evaluate(&inst, 94.0).messages.len(), 1);
        assert!(evaluate(&inst, 96.0).is_empty());
    }

    #[test]
    fn level_crossing_fires_once_and_clears_flag() {
        let mut inst = instrument(49_990.0);
        inst.key_levels = Some(levels());
        inst.alerts.flags.touch_high = true;

        let eval = evaluate(&inst, 50_010.0);
        assert_eq!(eval.messages.len(), 1);
        assert!(eval.messages[0].contains("yesterday's high"));
        assert!(!eval.flags.touch_high);

        // Flag cleared: crossing back does not refire.
        inst.alerts.flags = eval.flags;
        inst.price = 50_010.0;
        assert!(evaluate(&inst, 49_990.0).is_empty());
    }

    #[test]
    fn crossing_fires_in_both_directions() {
        let mut inst = instrument(50_010.0);
        inst.key_levels = Some(levels());
        inst.alerts.flags.touch_high = true;

        let eval = evaluate(&inst, 49_990.0);
        assert_eq!(eval.messages.len(), 1);
        assert!(!eval.flags.touch_high);
    }

    #[test]
    fn multiple_level_crossings_batch_into_one_message() {
        let mut inst = instrument(49_400.0);
        inst.key_levels = Some(levels());
        inst.alerts.flags.touch_close = true;
        inst.alerts.flags.touch_open = true;

        // 49_400 -> 49_700 crosses both close (49_500) and open (49_600).
        let eval = evaluate(&inst, 49_700.0);
        assert_eq!(eval.messages.len(), 1);
        assert!(eval.messages[0].contains("yesterday's close"));
        assert!(eval.messages[0].contains("today's open"));
        assert!(!eval.flags.touch_close);
        assert!(!eval.flags.touch_open);
    }

    #[test]
    fn interval_baseline_seeds_without_firing() {
        let mut inst = instrument(100.0);
        inst.alerts.interval = Some(IntervalAlert {
            step: 10.0,
            enabled: true,
            baseline: None,
        });

        let eval = evaluate(&inst, 100.0);
        assert!(eval.is_empty());
        assert_eq!(eval.interval_baseline, Some(100.0));
    }

    #[test]
    fn interval_fires_and_resets_baseline() {
        let mut inst = instrument(100.0);
        inst.alerts.interval = Some(IntervalAlert {
            step: 10.0,
            enabled: true,
            baseline: Some(100.0),
        });

        let eval = evaluate(&inst, 112.0);
        assert_eq!(eval.messages.len(), 1);
        assert!(eval.messages[0].contains("up 12.00"));
        assert_eq!(eval.interval_baseline, Some(112.0));

        // Small move from the new baseline stays silent.
        inst.price = 112.0;
        inst.alerts.interval.as_mut().unwrap().baseline = Some(112.0);
        let eval = evaluate(&inst, 118.0);
        assert!(eval.is_empty());
        assert_eq!(eval.interval_baseline, Some(112.0));
    }

    #[test]
    fn disabled_interval_is_ignored() {
        let mut inst = instrument(100.0);
        inst.alerts.interval = Some(IntervalAlert {
            step: 10.0,
            enabled: false,
            baseline: Some(100.0),
        });
        let eval = evaluate(&inst, 200.0);
        assert!(eval.is_empty());
        assert_eq!(eval.interval_baseline, Some(100.0));
    }

    #[test]
    fn threshold_and_level_alerts_are_independent_messages() {
        let mut inst = instrument(49_990.0);
        inst.alerts.high = Some(50_005.0);
        inst.key_levels = Some(levels());
        inst.alerts.flags.touch_high = true;

        let eval = evaluate(&inst, 50_010.0);
        assert_eq!(eval.messages.len(), 2);
    }
}
