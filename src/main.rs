use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use ctalab::config::{load_config, AppConfig};
use ctalab::portfolio::{CsvRankSource, OiConcentrationStrategy};
use ctalab::replay::{
    read_bars, MarketScenario, PortfolioReplayRunner, ReplayRunner, SyntheticBarGenerator,
};
use ctalab::strategy::{build_strategy, STRATEGY_CLASSES};
use ctalab::Bar;
use serde_json::json;

#[derive(Parser)]
#[command(name = "ctalab", about = "Replay CTA strategies over minute bars")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay every configured strategy and print a JSON report
    Run {
        /// Strategy settings (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Minute bars CSV; synthetic bars are generated when omitted
        #[arg(short, long)]
        bars: Option<PathBuf>,

        /// Synthetic market scenario
        #[arg(long, default_value = "volatile")]
        scenario: MarketScenario,

        /// Synthetic trading days
        #[arg(long, default_value_t = 60)]
        days: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the strategy classes that can be configured
    List,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    match Cli::parse().command {
        Command::Run {
            config,
            bars,
            scenario,
            days,
            seed,
            output,
        } => {
            let app = load_config(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            let bars = match bars {
                Some(path) => {
                    // Files without a symbol column belong to the first strategy
                    let default_symbol = app
                        .strategies
                        .first()
                        .map(|d| d.vt_symbol.as_str())
                        .unwrap_or_default();
                    read_bars(&path, default_symbol)
                        .with_context(|| format!("reading {}", path.display()))?
                }
                None => synthetic_bars(&app, scenario, days, seed),
            };

            let report = run(&app, &bars)?;
            let text = serde_json::to_string_pretty(&report)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, text)
                        .with_context(|| format!("writing {}", path.display()))?;
                    tracing::info!(path = %path.display(), "report written");
                }
                None => println!("{text}"),
            }
        }
        Command::List => {
            for class_name in STRATEGY_CLASSES {
                println!("{class_name}");
            }
        }
    }

    Ok(())
}

fn run(app: &AppConfig, bars: &[Bar]) -> anyhow::Result<serde_json::Value> {
    let runner = ReplayRunner::new().with_warmup(app.replay.warmup);
    let mut strategy_reports = Vec::new();

    for definition in &app.strategies {
        let symbol_bars: Vec<Bar> = bars
            .iter()
            .filter(|b| b.symbol == definition.vt_symbol)
            .cloned()
            .collect();
        if symbol_bars.is_empty() {
            tracing::warn!(
                strategy = %definition.strategy_name,
                symbol = %definition.vt_symbol,
                "no bars for symbol, skipping"
            );
            continue;
        }

        let mut strategy = build_strategy(definition)?;
        let report = runner
            .run(strategy.as_mut(), &symbol_bars)
            .with_context(|| format!("replaying {}", definition.strategy_name))?;
        strategy_reports.push(report);
    }

    let portfolio_runner = PortfolioReplayRunner::new().with_warmup(app.replay.warmup);
    let mut portfolio_reports = Vec::new();

    for definition in &app.portfolios {
        if definition.vt_symbols.is_empty() {
            bail!("portfolio {} has no symbols", definition.strategy_name);
        }
        let source = CsvRankSource::load(&definition.rank_data_dir, &definition.vt_symbols)?;
        let mut strategy = OiConcentrationStrategy::new(
            definition.strategy_name.clone(),
            definition.setting.clone(),
            Box::new(source),
        )?;
        let report = portfolio_runner
            .run(&mut strategy, &definition.vt_symbols, bars)
            .with_context(|| format!("replaying {}", definition.strategy_name))?;
        portfolio_reports.push(report);
    }

    Ok(json!({
        "strategies": strategy_reports,
        "portfolios": portfolio_reports,
    }))
}

/// One synthetic series per configured symbol, seeded apart
fn synthetic_bars(app: &AppConfig, scenario: MarketScenario, days: usize, seed: u64) -> Vec<Bar> {
    let symbols: BTreeSet<&str> = app
        .strategies
        .iter()
        .map(|d| d.vt_symbol.as_str())
        .chain(
            app.portfolios
                .iter()
                .flat_map(|p| p.vt_symbols.iter().map(String::as_str)),
        )
        .collect();

    tracing::info!(
        scenario = scenario.as_str(),
        days,
        symbols = symbols.len(),
        "generating synthetic bars"
    );

    symbols
        .into_iter()
        .enumerate()
        .flat_map(|(i, symbol)| {
            SyntheticBarGenerator::new(seed + i as u64)
                .with_symbol(symbol)
                .generate(scenario, days)
        })
        .collect()
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter("ctalab=info,ctalab::strategy=debug")
        .with_writer(std::io::stderr)
        .init();
}
