//! Ticker lookup with a bounded LRU cache and an offline fallback list.

use crate::data::MemoryPriceStore;
use crate::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Symbols offered when the source is unavailable or the query is empty.
pub const FALLBACK_SYMBOLS: [&str; 22] = [
    "AAPL", "MSFT", "NVDA", "GOOGL", "AMZN", "META", "TSLA", "SPY", "QQQ", "DIA", "IWM", "VTI",
    "GLD", "TLT", "BTC-USD", "ETH-USD", "EURUSD=X", "USDJPY=X", "^GSPC", "^IXIC", "^DJI", "^VIX",
];

/// How many fallback suggestions to return.
const FALLBACK_LIMIT: usize = 12;

/// One suggestion for a ticker picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMatch {
    pub label: String,
    pub value: String,
}

impl SymbolMatch {
    /// A bare symbol labelled with itself.
    pub fn plain(symbol: &str) -> Self {
        Self {
            label: symbol.to_string(),
            value: symbol.to_string(),
        }
    }

    /// Symbol with display name and exchange, e.g. `AAPL - Apple Inc. [NASDAQ]`.
    pub fn described(symbol: &str, name: &str, exchange: &str) -> Self {
        if name.is_empty() && exchange.is_empty() {
            return Self::plain(symbol);
        }
        Self {
            label: format!("{} - {} [{}]", symbol, name, exchange),
            value: symbol.to_string(),
        }
    }
}

/// Where suggestions come from (a vendor search endpoint, a local index).
pub trait SymbolSource {
    fn search(&self, query: &str) -> Result<Vec<SymbolMatch>>;
}

/// Stored symbols containing the query, case-insensitively.
impl SymbolSource for MemoryPriceStore {
    fn search(&self, query: &str) -> Result<Vec<SymbolMatch>> {
        let needle = query.to_lowercase();
        Ok(self
            .symbols()
            .iter()
            .filter(|s| s.to_lowercase().contains(&needle))
            .map(|s| SymbolMatch::plain(s))
            .collect())
    }
}

fn fallback(query: &str) -> Vec<SymbolMatch> {
    let needle = query.to_lowercase();
    let matches: Vec<SymbolMatch> = FALLBACK_SYMBOLS
        .iter()
        .filter(|s| s.to_lowercase().contains(&needle))
        .take(FALLBACK_LIMIT)
        .map(|s| SymbolMatch::plain(s))
        .collect();

    if matches.is_empty() {
        default_suggestions()
    } else {
        matches
    }
}

fn default_suggestions() -> Vec<SymbolMatch> {
    FALLBACK_SYMBOLS
        .iter()
        .take(FALLBACK_LIMIT)
        .map(|s| SymbolMatch::plain(s))
        .collect()
}

/// Caller-owned search front end.
///
/// Results are cached per trimmed query, fallbacks included. The least
/// recently used entry is evicted once `capacity` is reached.
#[derive(Debug)]
pub struct SymbolSearch<S> {
    source: S,
    cache: IndexMap<String, Vec<SymbolMatch>>,
    capacity: usize,
}

impl<S: SymbolSource> SymbolSearch<S> {
    pub fn new(source: S, capacity: usize) -> Self {
        Self {
            source,
            cache: IndexMap::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Suggestions for `query`.
    pub fn search(&mut self, query: &str) -> Vec<SymbolMatch> {
        let key = query.trim();

        if let Some(idx) = self.cache.get_index_of(key) {
            // Touch: move to the most recently used end.
            if let Some((k, v)) = self.cache.shift_remove_index(idx) {
                self.cache.insert(k, v.clone());
                return v;
            }
        }

        let results = if key.is_empty() {
            default_suggestions()
        } else {
            match self.source.search(key) {
                Ok(found) => found,
                Err(e) => {
                    tracing::debug!("Symbol search for '{}' failed: {}", key, e);
                    fallback(key)
                }
            }
        };

        if self.cache.len() >= self.capacity {
            self.cache.shift_remove_index(0);
        }
        self.cache.insert(key.to_string(), results.clone());
        results
    }
}
