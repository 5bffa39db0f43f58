use crate::enumerate::EnumeratorSettings;
use crate::grid::PriceGrid;
use crate::model::{StrategyError, StrategyKind};
use crate::payoff::{GridFraction, NormalTerminal, ProbabilityModel, DEFAULT_MULTIPLIER};
use crate::pricing::LegPricer;
use crate::rank::{MissingScorePolicy, RankKey};
use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser, Clone)]
#[command(name = "optstrat", author, version, about = "Option strategy payoff scanner", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Enumerate, evaluate and rank strategies from a chain snapshot
    Scan(ScanArgs),
    /// Combine the payoff curves of a saved portfolio
    Portfolio(PortfolioArgs),
}

#[derive(Debug, Args, Clone)]
pub struct ScanArgs {
    /// Chain snapshot, `.json` or `.csv`
    #[arg(long, env = "CHAIN_PATH")]
    pub chain: PathBuf,

    /// Expiry (YYYY-MM-DD); nearest when omitted
    #[arg(long, env = "EXPIRY")]
    pub expiry: Option<NaiveDate>,

    /// Overrides the underlying price stored in the snapshot
    #[arg(long, env = "SPOT")]
    pub spot: Option<f64>,

    #[arg(
        long,
        env = "STRATEGIES",
        default_value = "sell-put,sell-call,bull-call,bear-put,straddle,iron-condor,covered-call",
        value_delimiter = ','
    )]
    pub strategies: Vec<String>,

    #[arg(long, env = "BUDGET", default_value_t = 500.0)]
    pub budget: f64,

    #[arg(long, env = "MULTIPLIER", default_value_t = DEFAULT_MULTIPLIER)]
    pub multiplier: f64,

    #[arg(long, env = "QUANTITY", default_value_t = 1u32)]
    pub quantity: u32,

    #[arg(long, env = "FEE_PER_LEG", default_value_t = 0.0)]
    pub fee_per_leg: f64,

    #[arg(long, env = "MIN_STRIKE")]
    pub min_strike: Option<f64>,

    #[arg(long, env = "MAX_STRIKE")]
    pub max_strike: Option<f64>,

    /// Stepped grid lower bound; needs --grid-max and --grid-step
    #[arg(long)]
    pub grid_min: Option<f64>,

    #[arg(long)]
    pub grid_max: Option<f64>,

    #[arg(long)]
    pub grid_step: Option<f64>,

    /// Half-width of the grid around spot, as a fraction of spot
    #[arg(long, env = "GRID_WIDTH", default_value_t = 0.3)]
    pub grid_width: f64,

    #[arg(long, env = "GRID_POINTS", default_value_t = 200usize)]
    pub grid_points: usize,

    #[arg(long, env = "RANK_BY", default_value = "avg-return")]
    pub rank_by: String,

    /// `last` keeps unscored candidates at the bottom, `exclude` drops them
    #[arg(long, env = "MISSING_SCORE", default_value = "last")]
    pub missing_score: String,

    /// `grid` (uniform over grid points) or `normal`
    #[arg(long, env = "PROBABILITY", default_value = "grid")]
    pub probability: String,

    /// Annualised implied volatility for the normal model
    #[arg(long, env = "IV")]
    pub iv: Option<f64>,

    /// Calendar days to expiry for the normal model
    #[arg(long, env = "DAYS")]
    pub days: Option<f64>,

    #[arg(long, env = "MAX_CANDIDATES", default_value_t = 50_000usize)]
    pub max_candidates: usize,

    #[arg(long, env = "TOP", default_value_t = 10usize)]
    pub top: usize,

    #[arg(long)]
    pub export_csv: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct PortfolioArgs {
    /// Portfolio JSON with `strategies` and `positions`
    #[arg(long)]
    pub file: PathBuf,

    #[arg(long)]
    pub spot: f64,

    #[arg(long, default_value_t = 0.3)]
    pub grid_width: f64,

    #[arg(long, default_value_t = 200usize)]
    pub grid_points: usize,

    #[arg(long, default_value_t = DEFAULT_MULTIPLIER)]
    pub multiplier: f64,

    #[arg(long)]
    pub export_csv: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum GridSpec {
    Around { width: f64, points: usize },
    Stepped { min: f64, max: f64, step: f64 },
}

impl GridSpec {
    pub fn build(&self, spot: f64) -> Result<PriceGrid, StrategyError> {
        match *self {
            GridSpec::Around { width, points } => PriceGrid::around(spot, width, points),
            GridSpec::Stepped { min, max, step } => PriceGrid::stepped(min, max, step),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ProbabilitySpec {
    GridFraction,
    Normal { iv: f64, days: f64 },
}

impl ProbabilitySpec {
    pub fn model(&self, spot: f64) -> Result<Box<dyn ProbabilityModel>, StrategyError> {
        match *self {
            ProbabilitySpec::GridFraction => Ok(Box::new(GridFraction)),
            ProbabilitySpec::Normal { iv, days } => NormalTerminal::from_implied_vol(spot, iv, days)
                .map(|model| Box::new(model) as Box<dyn ProbabilityModel>)
                .ok_or_else(|| {
                    StrategyError::range(format!(
                        "no terminal distribution for spot {spot}, iv {iv}, days {days}"
                    ))
                }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    pub chain_path: PathBuf,
    pub expiry: Option<NaiveDate>,
    pub spot: Option<f64>,
    pub strategies: Vec<StrategyKind>,
    pub budget: f64,
    pub multiplier: f64,
    pub quantity: u32,
    pub fee_per_leg: f64,
    pub min_strike: Option<f64>,
    pub max_strike: Option<f64>,
    pub grid: GridSpec,
    pub rank_key: RankKey,
    pub missing_score: MissingScorePolicy,
    pub probability: ProbabilitySpec,
    pub max_candidates: usize,
    pub top: usize,
    pub export_csv: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chain_path: PathBuf::new(),
            expiry: None,
            spot: None,
            strategies: StrategyKind::ALL.to_vec(),
            budget: 500.0,
            multiplier: DEFAULT_MULTIPLIER,
            quantity: 1,
            fee_per_leg: 0.0,
            min_strike: None,
            max_strike: None,
            grid: GridSpec::Around {
                width: 0.3,
                points: 200,
            },
            rank_key: RankKey::default(),
            missing_score: MissingScorePolicy::default(),
            probability: ProbabilitySpec::GridFraction,
            max_candidates: 50_000,
            top: 10,
            export_csv: None,
        }
    }
}

impl AppConfig {
    pub fn from_cli(args: ScanArgs) -> Result<Self> {
        if !(args.budget > 0.0) {
            return Err(anyhow!("budget must be > 0"));
        }
        if !(args.multiplier > 0.0) {
            return Err(anyhow!("multiplier must be > 0"));
        }
        if args.quantity == 0 {
            return Err(anyhow!("quantity must be >= 1"));
        }
        if !(args.fee_per_leg >= 0.0) {
            return Err(anyhow!("fee per leg must be >= 0"));
        }
        if let Some(spot) = args.spot {
            if !(spot > 0.0) {
                return Err(anyhow!("spot must be > 0"));
            }
        }
        if let (Some(lo), Some(hi)) = (args.min_strike, args.max_strike) {
            if lo > hi {
                return Err(anyhow!("min strike {lo} is above max strike {hi}"));
            }
        }

        let mut strategies = Vec::new();
        for name in &args.strategies {
            let kind: StrategyKind = name.parse()?;
            if !strategies.contains(&kind) {
                strategies.push(kind);
            }
        }
        if strategies.is_empty() {
            return Err(anyhow!("must enable at least one strategy"));
        }

        let grid = match (args.grid_min, args.grid_max, args.grid_step) {
            (Some(min), Some(max), Some(step)) => {
                if !(min < max) || !(step > 0.0) {
                    return Err(anyhow!("stepped grid needs min < max and step > 0"));
                }
                GridSpec::Stepped { min, max, step }
            }
            (None, None, None) => {
                if !(args.grid_width > 0.0 && args.grid_width < 1.0) {
                    return Err(anyhow!("grid width must lie in (0, 1)"));
                }
                if args.grid_points < 2 {
                    return Err(anyhow!("grid needs at least 2 points"));
                }
                GridSpec::Around {
                    width: args.grid_width,
                    points: args.grid_points,
                }
            }
            _ => return Err(anyhow!("--grid-min, --grid-max and --grid-step go together")),
        };

        let probability = match args.probability.trim().to_ascii_lowercase().as_str() {
            "grid" | "uniform" => ProbabilitySpec::GridFraction,
            "normal" => match (args.iv, args.days) {
                (Some(iv), Some(days)) if iv > 0.0 && days > 0.0 => {
                    ProbabilitySpec::Normal { iv, days }
                }
                _ => return Err(anyhow!("normal probability needs positive --iv and --days")),
            },
            other => return Err(anyhow!("unknown probability model: {other}")),
        };

        if args.max_candidates == 0 {
            return Err(anyhow!("max candidates must be >= 1"));
        }

        let config = AppConfig {
            chain_path: args.chain,
            expiry: args.expiry,
            spot: args.spot,
            strategies,
            budget: args.budget,
            multiplier: args.multiplier,
            quantity: args.quantity,
            fee_per_leg: args.fee_per_leg,
            min_strike: args.min_strike,
            max_strike: args.max_strike,
            grid,
            rank_key: args.rank_by.parse()?,
            missing_score: args.missing_score.parse()?,
            probability,
            max_candidates: args.max_candidates,
            top: args.top,
            export_csv: args.export_csv,
        };

        info!(
            target: "config",
            config = %serde_json::to_string(&config).unwrap_or_default(),
            "configuration loaded"
        );
        Ok(config)
    }

    pub fn enumerator_settings(&self) -> EnumeratorSettings {
        EnumeratorSettings {
            budget: self.budget,
            multiplier: self.multiplier,
            quantity: self.quantity,
            pricer: LegPricer::with_fee(self.fee_per_leg),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioConfig {
    pub file: PathBuf,
    pub spot: f64,
    pub grid: GridSpec,
    pub multiplier: f64,
    pub export_csv: Option<PathBuf>,
}

impl PortfolioConfig {
    pub fn from_cli(args: PortfolioArgs) -> Result<Self> {
        if !(args.spot > 0.0) {
            return Err(anyhow!("spot must be > 0"));
        }
        if !(args.multiplier > 0.0) {
            return Err(anyhow!("multiplier must be > 0"));
        }
        if !(args.grid_width > 0.0 && args.grid_width < 1.0) || args.grid_points < 2 {
            return Err(anyhow!("grid needs width in (0, 1) and at least 2 points"));
        }
        let config = PortfolioConfig {
            file: args.file,
            spot: args.spot,
            grid: GridSpec::Around {
                width: args.grid_width,
                points: args.grid_points,
            },
            multiplier: args.multiplier,
            export_csv: args.export_csv,
        };
        info!(
            target: "config",
            config = %serde_json::to_string(&config).unwrap_or_default(),
            "configuration loaded"
        );
        Ok(config)
    }
}
