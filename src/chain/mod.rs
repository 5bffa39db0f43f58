use crate::model::OptionKind;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use tracing::{info, warn};

/// One strike for one side of the chain. NaN or absent bid/ask means unquoted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptionQuote {
    pub strike: f64,
    #[serde(default)]
    pub bid: Option<f64>,
    #[serde(default)]
    pub ask: Option<f64>,
    #[serde(default)]
    pub last_price: Option<f64>,
    #[serde(default)]
    pub implied_volatility: Option<f64>,
    #[serde(default)]
    pub delta: Option<f64>,
    #[serde(default)]
    pub gamma: Option<f64>,
}

impl OptionQuote {
    pub fn new(strike: f64, bid: Option<f64>, ask: Option<f64>) -> Self {
        Self {
            strike,
            bid,
            ask,
            last_price: None,
            implied_volatility: None,
            delta: None,
            gamma: None,
        }
    }

    pub fn bid(&self) -> Option<f64> {
        self.bid.filter(|v| v.is_finite())
    }

    pub fn ask(&self) -> Option<f64> {
        self.ask.filter(|v| v.is_finite())
    }
}

/// Calls and puts of a single expiration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExpiryChain {
    #[serde(default)]
    pub calls: Vec<OptionQuote>,
    #[serde(default)]
    pub puts: Vec<OptionQuote>,
}

impl ExpiryChain {
    pub fn new(calls: Vec<OptionQuote>, puts: Vec<OptionQuote>) -> Self {
        Self { calls, puts }
    }

    pub fn quotes(&self, kind: OptionKind) -> &[OptionQuote] {
        match kind {
            OptionKind::Call => &self.calls,
            OptionKind::Put => &self.puts,
        }
    }

    pub fn find(&self, kind: OptionKind, strike: f64) -> Option<&OptionQuote> {
        self.quotes(kind).iter().find(|q| q.strike == strike)
    }

    /// Rows with `lo <= strike <= hi`. Enumeration cost grows with the fourth power of
    /// the strike count, so callers narrow the chain before enumerating.
    pub fn within_strikes(&self, lo: f64, hi: f64) -> ExpiryChain {
        let keep = |rows: &[OptionQuote]| {
            rows.iter()
                .filter(|q| q.strike >= lo && q.strike <= hi)
                .cloned()
                .collect::<Vec<_>>()
        };
        ExpiryChain {
            calls: keep(&self.calls),
            puts: keep(&self.puts),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChainStats {
    pub expiries: usize,
    pub rows: usize,
    pub two_sided: usize,
    pub missing_bid: usize,
    pub missing_ask: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainSnapshot {
    pub symbol: String,
    #[serde(default)]
    pub underlying_price: Option<f64>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    pub expiries: BTreeMap<NaiveDate, ExpiryChain>,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    expiry: NaiveDate,
    kind: String,
    strike: f64,
    bid: Option<f64>,
    ask: Option<f64>,
    #[serde(default)]
    last_price: Option<f64>,
    #[serde(default)]
    implied_volatility: Option<f64>,
}

impl ChainSnapshot {
    pub fn new(symbol: impl Into<String>, underlying_price: Option<f64>) -> Self {
        Self {
            symbol: symbol.into(),
            underlying_price,
            timestamp: Utc::now(),
            expiries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, expiry: NaiveDate, chain: ExpiryChain) {
        self.expiries.insert(expiry, chain);
    }

    /// The requested expiry, or the nearest one when none is given.
    pub fn expiry(&self, date: Option<NaiveDate>) -> Option<(NaiveDate, &ExpiryChain)> {
        match date {
            Some(date) => self.expiries.get(&date).map(|chain| (date, chain)),
            None => self.expiries.iter().next().map(|(d, c)| (*d, c)),
        }
    }

    pub fn stats(&self) -> ChainStats {
        self.expiries.values().fold(
            ChainStats {
                expiries: self.expiries.len(),
                rows: 0,
                two_sided: 0,
                missing_bid: 0,
                missing_ask: 0,
            },
            |mut acc, chain| {
                for quote in chain.calls.iter().chain(chain.puts.iter()) {
                    acc.rows += 1;
                    acc.missing_bid += quote.bid().is_none() as usize;
                    acc.missing_ask += quote.ask().is_none() as usize;
                    acc.two_sided += (quote.bid().is_some() && quote.ask().is_some()) as usize;
                }
                acc
            },
        )
    }

    /// Loads a snapshot, picking the format from the file extension.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let snapshot = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_path(path)?,
            Some("csv") => Self::from_csv_path(path)?,
            other => return Err(anyhow!("unsupported chain format: {other:?}")),
        };
        let stats = snapshot.stats();
        info!(
            target: "chain.load",
            symbol = %snapshot.symbol,
            expiries = stats.expiries,
            rows = stats.rows,
            two_sided = stats.two_sided,
            missing_bid = stats.missing_bid,
            missing_ask = stats.missing_ask,
            "loaded option chain"
        );
        Ok(snapshot)
    }

    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("opening {path:?}"))?;
        serde_json::from_reader(file).with_context(|| format!("parsing chain json {path:?}"))
    }

    /// Rows of `expiry,kind,strike,bid,ask,last_price,implied_volatility`; the symbol
    /// is taken from the file stem.
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let symbol = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("UNKNOWN")
            .to_ascii_uppercase();
        let mut reader = csv::Reader::from_path(path).with_context(|| format!("opening {path:?}"))?;
        let mut snapshot = Self::new(symbol, None);
        for (line, row) in reader.deserialize::<CsvRow>().enumerate() {
            let row = row.with_context(|| format!("parsing csv row {}", line + 1))?;
            let kind: OptionKind = match row.kind.parse() {
                Ok(kind) => kind,
                Err(err) => {
                    warn!(target: "chain.load", line = line + 1, error = %err, "skipping row");
                    continue;
                }
            };
            let quote = OptionQuote {
                strike: row.strike,
                bid: row.bid,
                ask: row.ask,
                last_price: row.last_price,
                implied_volatility: row.implied_volatility,
                delta: None,
                gamma: None,
            };
            let chain = snapshot.expiries.entry(row.expiry).or_default();
            match kind {
                OptionKind::Call => chain.calls.push(quote),
                OptionKind::Put => chain.puts.push(quote),
            }
        }
        Ok(snapshot)
    }
}
