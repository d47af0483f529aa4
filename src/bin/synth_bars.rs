use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use ctalab::replay::{write_bars, MarketScenario, SyntheticBarGenerator};

/// Write synthetic minute bars to CSV
#[derive(Parser)]
#[command(name = "synth_bars")]
struct Args {
    /// Output CSV path
    #[arg(short, long)]
    output: PathBuf,

    /// Symbols to generate, one series each
    #[arg(short, long, default_value = "RB888.SHFE")]
    symbols: Vec<String>,

    #[arg(long, default_value = "volatile")]
    scenario: MarketScenario,

    #[arg(long, default_value_t = 60)]
    days: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value_t = 3500.0)]
    base_price: f64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("ctalab=info")
        .init();

    let args = Args::parse();

    let mut bars = Vec::new();
    for (i, symbol) in args.symbols.iter().enumerate() {
        let mut generator = SyntheticBarGenerator::new(args.seed + i as u64)
            .with_symbol(symbol.clone())
            .with_base_price(args.base_price);
        bars.extend(generator.generate(args.scenario, args.days));
    }
    bars.sort_by(|a, b| a.datetime.cmp(&b.datetime).then_with(|| a.symbol.cmp(&b.symbol)));

    write_bars(&args.output, &bars, true)
        .with_context(|| format!("writing {}", args.output.display()))?;

    tracing::info!(
        path = %args.output.display(),
        bars = bars.len(),
        scenario = args.scenario.as_str(),
        "synthetic bars written"
    );

    Ok(())
}
