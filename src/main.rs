use anyhow::{anyhow, Context, Result};
use clap::Parser;
use optstrat::chain::ChainSnapshot;
use optstrat::config::{AppConfig, Cli, Command, PortfolioConfig};
use optstrat::payoff::PayoffModel;
use optstrat::portfolio::{self, PortfolioFile};
use optstrat::render;
use optstrat::scan::StrategyScanner;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    match cli.command {
        Command::Scan(args) => run_scan(AppConfig::from_cli(args)?),
        Command::Portfolio(args) => run_portfolio(PortfolioConfig::from_cli(args)?),
    }
}

fn run_scan(config: AppConfig) -> Result<()> {
    let snapshot = ChainSnapshot::load(&config.chain_path)?;
    let (expiry, chain) = snapshot
        .expiry(config.expiry)
        .ok_or_else(|| anyhow!("expiry {:?} not found in {}", config.expiry, snapshot.symbol))?;
    let spot = config
        .spot
        .or(snapshot.underlying_price)
        .ok_or_else(|| anyhow!("no spot price: pass --spot or set underlying_price"))?;
    info!(target: "scan", symbol = %snapshot.symbol, expiry = %expiry, spot, "scanning expiry");

    let report = StrategyScanner::new(&config).scan(chain, spot)?;
    if report.ranked.is_empty() {
        info!(
            target: "scan",
            enumerated = report.enumerated(),
            "no candidates within budget at this snapshot"
        );
        return Ok(());
    }

    render::print_table(&report.ranked, config.top)?;
    if let Some(path) = &config.export_csv {
        render::export_csv(&report.ranked, path)?;
    }
    Ok(())
}

fn run_portfolio(config: PortfolioConfig) -> Result<()> {
    let book = PortfolioFile::from_json_path(&config.file)?;
    let grid = config.grid.build(config.spot)?;
    let model = PayoffModel::new(config.multiplier);

    let results = book
        .strategies
        .iter()
        .map(|definition| {
            model
                .evaluate(definition, &grid)
                .with_context(|| format!("evaluating {}", definition.describe()))
        })
        .collect::<Result<Vec<_>>>()?;
    let total = portfolio::aggregate(&results, &book.positions, &grid)?;
    let breakevens = portfolio::crossings(&grid, &total);
    let worst = total.iter().copied().fold(f64::INFINITY, f64::min);
    let best = total.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    info!(
        target: "portfolio",
        breakevens = ?breakevens,
        worst,
        best,
        "combined curve"
    );

    render::print_curve(&grid, &total, 21)?;
    if let Some(path) = &config.export_csv {
        render::export_curve(&grid, &total, path)?;
    }
    Ok(())
}
