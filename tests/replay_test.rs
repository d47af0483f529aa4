use std::collections::BTreeMap;

use chrono::NaiveDate;
use ctalab::config::StrategyDefinition;
use ctalab::portfolio::{InMemoryRankSource, OiConcentrationConfig, OiConcentrationStrategy, RankSnapshot};
use ctalab::replay::{
    read_bars, write_bars, MarketScenario, PortfolioReplayRunner, ReplayRunner,
    SyntheticBarGenerator, BARS_PER_DAY,
};
use ctalab::strategy::{build_strategy, default_setting, STRATEGY_CLASSES};
use ctalab::{Bar, TradeData};

fn create_definition(class_name: &str) -> StrategyDefinition {
    StrategyDefinition {
        strategy_name: format!("{class_name}_test"),
        vt_symbol: "RB888.SHFE".to_string(),
        setting: default_setting(class_name).unwrap(),
    }
}

fn net_traded(trades: &[TradeData], symbol: &str) -> i64 {
    trades
        .iter()
        .filter(|t| t.symbol == symbol)
        .map(TradeData::signed_volume)
        .sum()
}

#[test]
fn test_every_strategy_replays_cleanly() {
    let bars = SyntheticBarGenerator::new(7).generate(MarketScenario::Volatile, 40);

    for class_name in STRATEGY_CLASSES
        .iter()
        .filter(|c| **c != "OiConcentrationStrategy")
    {
        let mut strategy = build_strategy(&create_definition(class_name)).unwrap();
        let report = ReplayRunner::new().run(strategy.as_mut(), &bars).unwrap();

        assert_eq!(report.class_name, *class_name);
        assert_eq!(report.warmup_bars + report.bars_replayed, bars.len());
        assert_eq!(report.warmup_bars % BARS_PER_DAY, 0);
        assert_eq!(report.final_pos, net_traded(&report.trades, "RB888.SHFE"));

        if let Some(first_live) = bars.get(report.warmup_bars) {
            assert!(report
                .orders
                .iter()
                .all(|o| o.datetime.is_some_and(|dt| dt >= first_live.datetime)));
        } else {
            assert!(report.orders.is_empty());
        }
    }
}

#[test]
fn test_replay_from_csv_matches_in_memory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bars.csv");

    let bars = SyntheticBarGenerator::new(11).generate(MarketScenario::Uptrend, 15);
    write_bars(&path, &bars, true).unwrap();
    let loaded = read_bars(&path, "UNUSED").unwrap();
    assert_eq!(loaded, bars);

    let definition = create_definition("ContinuousBreakthroughsStrategy");
    let runner = ReplayRunner::new();

    let mut first = build_strategy(&definition).unwrap();
    let mut second = build_strategy(&definition).unwrap();
    let a = runner.run(first.as_mut(), &bars).unwrap();
    let b = runner.run(second.as_mut(), &loaded).unwrap();

    let fills = |trades: &[TradeData]| {
        trades
            .iter()
            .map(|t| (t.datetime, t.direction, t.offset, t.price, t.volume))
            .collect::<Vec<_>>()
    };
    assert_eq!(fills(&a.trades), fills(&b.trades));
    assert_eq!(a.final_pos, b.final_pos);
}

#[test]
fn test_replay_without_warmup_trades_from_first_bar() {
    let bars = SyntheticBarGenerator::new(3).generate(MarketScenario::Sideways, 3);
    let mut strategy = build_strategy(&create_definition("RumiStrategy")).unwrap();

    let report = ReplayRunner::new()
        .with_warmup(false)
        .run(strategy.as_mut(), &bars)
        .unwrap();

    assert_eq!(report.warmup_bars, 0);
    assert_eq!(report.bars_replayed, bars.len());
}

fn create_rank_source(symbols: &[String], dates: &[NaiveDate]) -> InMemoryRankSource {
    let mut source = InMemoryRankSource::new();
    for (d, date) in dates.iter().enumerate() {
        for (i, symbol) in symbols.iter().enumerate() {
            let weighted_long = 500.0 + 10.0 * i as f64 + ((d * 7 + i * 3) % 11) as f64 * 5.0;
            source.insert(
                symbol.clone(),
                *date,
                RankSnapshot {
                    long: weighted_long,
                    short: 450.0,
                    weighted_long,
                    weighted_short: 450.0,
                    total_oi: 2000.0,
                },
            );
        }
    }
    source
}

#[test]
fn test_portfolio_replay_rebalances_daily() {
    let symbols: Vec<String> = ["A888.DCE", "C888.DCE", "M888.DCE", "P888.DCE", "Y888.DCE"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let bars: Vec<Bar> = symbols
        .iter()
        .enumerate()
        .flat_map(|(i, symbol)| {
            SyntheticBarGenerator::new(100 + i as u64)
                .with_symbol(symbol.clone())
                .generate(MarketScenario::Sideways, 10)
        })
        .collect();

    let mut dates: Vec<NaiveDate> = bars.iter().map(Bar::date).collect();
    dates.sort();
    dates.dedup();
    assert_eq!(dates.len(), 10);

    let source = create_rank_source(&symbols, &dates);
    let mut strategy =
        OiConcentrationStrategy::new("oi", OiConcentrationConfig::default(), Box::new(source))
            .unwrap();

    let report = PortfolioReplayRunner::new()
        .run(&mut strategy, &symbols, &bars)
        .unwrap();

    // One day of warm-up, then one slice per minute
    assert_eq!(report.warmup_slices, BARS_PER_DAY);
    assert_eq!(report.slices_replayed, 9 * BARS_PER_DAY);
    assert!(!report.trades.is_empty());

    let first_live = dates[1].and_hms_opt(0, 0, 0).unwrap();
    assert!(report
        .orders
        .iter()
        .all(|o| o.datetime.is_some_and(|dt| dt >= first_live)));

    let positions: BTreeMap<String, i64> = report.positions.clone();
    for symbol in &symbols {
        let held = positions.get(symbol).copied().unwrap_or(0);
        assert_eq!(held, net_traded(&report.trades, symbol));
    }

    // One long and one short survive the last rebalance
    let open: Vec<i64> = positions.values().copied().filter(|p| *p != 0).collect();
    assert_eq!(open.len(), 2);
    assert!(open.iter().any(|p| *p > 0));
    assert!(open.iter().any(|p| *p < 0));
}
