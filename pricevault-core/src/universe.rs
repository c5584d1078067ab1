//! Symbol universe: the symbols a sync run covers.
//!
//! The universe arrives as a CSV file with a `symbol` column, produced by an
//! external discovery step. Loading validates each symbol against the
//! `<base>-<quote>` shape, keeps only the configured quote currency, and
//! deduplicates by base (first occurrence wins, order preserved).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::domain::split_symbol;

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("universe file not found: {0} (run symbol discovery first)")]
    NotFound(String),

    #[error("universe file {path} has no 'symbol' column")]
    MissingSymbolColumn { path: String },

    #[error("read universe: {0}")]
    Csv(#[from] csv::Error),
}

/// Rules applied when loading a universe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseRules {
    /// Required quote currency suffix, e.g. `USD` for `BTC-USD`.
    pub quote_suffix: String,
    /// Keep at most this many symbols.
    pub limit: Option<usize>,
}

impl Default for UniverseRules {
    fn default() -> Self {
        Self {
            quote_suffix: "USD".into(),
            limit: None,
        }
    }
}

/// An ordered, deduplicated list of symbols.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    symbols: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct UniverseRecord {
    symbol: String,
}

impl Universe {
    /// Load and validate a universe CSV.
    pub fn from_csv(path: &Path, rules: &UniverseRules) -> Result<Self, UniverseError> {
        if !path.exists() {
            return Err(UniverseError::NotFound(path.display().to_string()));
        }
        let mut reader = csv::Reader::from_path(path)?;
        let has_symbol = reader.headers()?.iter().any(|h| h.trim() == "symbol");
        if !has_symbol {
            return Err(UniverseError::MissingSymbolColumn {
                path: path.display().to_string(),
            });
        }

        let mut raw = Vec::new();
        for record in reader.deserialize::<UniverseRecord>() {
            raw.push(record?.symbol);
        }
        Ok(Self::from_symbols(raw, rules))
    }

    /// Build a universe from raw symbols, applying validation and dedup.
    pub fn from_symbols<I, S>(raw: I, rules: &UniverseRules) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen_bases: HashSet<String> = HashSet::new();
        let mut symbols = Vec::new();

        for sym in raw {
            let sym = sym.as_ref().trim();
            if !is_valid_symbol(sym, &rules.quote_suffix) {
                continue;
            }
            let Some((base, _)) = split_symbol(sym) else {
                continue;
            };
            if !seen_bases.insert(base.to_string()) {
                continue;
            }
            symbols.push(sym.to_string());
            if rules.limit.is_some_and(|limit| symbols.len() >= limit) {
                break;
            }
        }

        Self { symbols }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// `<base>-<quote>` with the given quote and a purely alphabetic base.
pub fn is_valid_symbol(symbol: &str, quote_suffix: &str) -> bool {
    let Some((base, quote)) = split_symbol(symbol) else {
        return false;
    };
    let base = base.trim();
    quote == quote_suffix && !base.is_empty() && base.chars().all(char::is_alphabetic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn validates_shape_and_quote() {
        assert!(is_valid_symbol("BTC-USD", "USD"));
        assert!(!is_valid_symbol("BTC-EUR", "USD"));
        assert!(!is_valid_symbol("BTCUSD", "USD"));
        assert!(!is_valid_symbol("-USD", "USD"));
        assert!(!is_valid_symbol("1INCH-USD", "USD"));
    }

    #[test]
    fn dedups_by_base_keeping_first() {
        let u = Universe::from_symbols(
            ["BTC-USD", "ETH-USD", "BTC-USD", "SOL-USD"],
            &UniverseRules::default(),
        );
        assert_eq!(u.symbols(), &["BTC-USD", "ETH-USD", "SOL-USD"]);
    }

    #[test]
    fn limit_caps_valid_symbols() {
        let rules = UniverseRules {
            limit: Some(2),
            ..UniverseRules::default()
        };
        let u = Universe::from_symbols(["X1-USD", "BTC-USD", "ETH-USD", "SOL-USD"], &rules);
        assert_eq!(u.symbols(), &["BTC-USD", "ETH-USD"]);
    }

    #[test]
    fn loads_csv_with_extra_columns() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "rank,symbol").unwrap();
        writeln!(file, "1,BTC-USD").unwrap();
        writeln!(file, "2,ETH-USD").unwrap();
        writeln!(file, "3,USDT-EUR").unwrap();
        let u = Universe::from_csv(file.path(), &UniverseRules::default()).unwrap();
        assert_eq!(u.len(), 2);
    }

    #[test]
    fn missing_symbol_column_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ticker").unwrap();
        writeln!(file, "BTC-USD").unwrap();
        let err = Universe::from_csv(file.path(), &UniverseRules::default()).unwrap_err();
        assert!(matches!(err, UniverseError::MissingSymbolColumn { .. }));
    }

    #[test]
    fn missing_file_is_fatal() {
        let path = Path::new("/nonexistent/symbols.csv");
        let err = Universe::from_csv(path, &UniverseRules::default()).unwrap_err();
        assert!(matches!(err, UniverseError::NotFound(_)));
    }
}
