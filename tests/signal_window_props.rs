use ctalab::{Decision, Direction, SignalWindow, StrategyError};
use proptest::prelude::*;

fn events() -> impl Strategy<Value = Vec<(u64, bool)>> {
    prop::collection::vec((1u64..20, any::<bool>()), 1..60)
}

fn direction(long: bool) -> Direction {
    if long {
        Direction::Long
    } else {
        Direction::Short
    }
}

proptest! {
    #[test]
    fn retained_events_match_model(gaps in events(), limit in 0u64..40) {
        let mut window = SignalWindow::new();
        let mut all: Vec<(u64, i64)> = Vec::new();
        let mut index = 0u64;

        for (gap, long) in gaps {
            index += gap;
            all.push((index, if long { 1 } else { -1 }));
            window.record_and_evict(index, direction(long), limit).unwrap();

            // Every event within the limit of the newest survives, nothing older does
            let expected: Vec<(u64, i64)> = all
                .iter()
                .copied()
                .filter(|(i, _)| index - i <= limit)
                .collect();
            let retained: Vec<(u64, i64)> = window.indices().zip(window.signals()).collect();
            prop_assert_eq!(&retained, &expected);

            prop_assert!(window.span() <= limit);
            prop_assert_eq!(window.net_signal(), expected.iter().map(|(_, s)| s).sum::<i64>());
        }
    }

    #[test]
    fn decision_follows_net_signal(gaps in events(), limit in 0u64..40, threshold in 0i64..6) {
        let mut window = SignalWindow::new();
        let mut index = 0u64;

        for (gap, long) in gaps {
            index += gap;
            window.record_and_evict(index, direction(long), limit).unwrap();

            let net = window.net_signal();
            let expected = if net > threshold {
                Decision::Long
            } else if net < -threshold {
                Decision::Short
            } else {
                Decision::Neutral
            };
            prop_assert_eq!(window.decide(threshold), expected);
        }
    }

    #[test]
    fn stale_index_rejected_without_change(gaps in events(), back in 0u64..5) {
        let mut window = SignalWindow::new();
        let mut index = 0u64;
        for (gap, long) in gaps {
            index += gap;
            window.record(index, direction(long)).unwrap();
        }

        let len = window.len();
        let net = window.net_signal();
        let stale = index.saturating_sub(back);

        let err = window.record(stale, Direction::Long).unwrap_err();
        let is_non_monotonic = matches!(err, StrategyError::NonMonotonicIndex { .. });
        prop_assert!(is_non_monotonic);
        prop_assert_eq!(window.len(), len);
        prop_assert_eq!(window.net_signal(), net);
    }
}
