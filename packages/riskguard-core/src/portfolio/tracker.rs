//! Portfolio position tracking and persistence.

use crate::types::{Portfolio, Position};
use crate::{Error, Result};
use chrono::Utc;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Schema version written by [`PortfolioTracker::save`].
pub const CURRENT_VERSION: u32 = 1;

/// Positions seeded into an empty portfolio by [`PortfolioTracker::seed_defaults`].
pub const SEED_POSITIONS: [(&str, f64, f64); 3] =
    [("AAPL", 10.0, 150.0), ("MSFT", 8.0, 300.0), ("SPY", 5.0, 430.0)];

/// Source of the current holdings.
pub trait PositionProvider {
    /// Holdings ordered by symbol.
    fn list_positions(&self) -> Vec<Position>;
}

impl PositionProvider for Vec<Position> {
    fn list_positions(&self) -> Vec<Position> {
        let mut positions = self.clone();
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        positions
    }
}

/// Portfolio tracker that manages positions and persists to JSON.
#[derive(Debug)]
pub struct PortfolioTracker {
    /// Path to the portfolio JSON file
    path: PathBuf,
    /// In-memory portfolio state
    portfolio: Portfolio,
}

impl PortfolioTracker {
    /// Create a new portfolio tracker with the default path.
    ///
    /// Default path: `~/.riskguard/portfolio.json`
    /// Can be overridden with `RISKGUARD_PORTFOLIO_FILE` environment variable.
    pub fn new() -> Result<Self> {
        Self::with_path(Self::default_path())
    }

    /// Create a tracker with a custom path.
    pub fn with_path(path: PathBuf) -> Result<Self> {
        let portfolio = Self::load_from_path(&path)?;
        Ok(Self { path, portfolio })
    }

    /// Create an in-memory tracker (no persistence).
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::new(),
            portfolio: Portfolio {
                version: CURRENT_VERSION,
                ..Portfolio::default()
            },
        }
    }

    /// Get the default portfolio file path.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = env::var("RISKGUARD_PORTFOLIO_FILE") {
            return PathBuf::from(path);
        }

        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".riskguard/portfolio.json"))
            .unwrap_or_else(|| PathBuf::from("portfolio.json"))
    }

    /// Get the current path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load portfolio from a specific path, migrating older layouts.
    fn load_from_path(path: &Path) -> Result<Portfolio> {
        if !path.exists() {
            return Ok(Portfolio {
                version: CURRENT_VERSION,
                ..Portfolio::default()
            });
        }

        let content = fs::read_to_string(path)?;
        let data: serde_json::Value = serde_json::from_str(&content)?;
        migrate(data)
    }

    /// Save the current portfolio to disk.
    pub fn save(&mut self) -> Result<()> {
        // Skip if in-memory only
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        if self.portfolio.created_at.is_none() {
            self.portfolio.created_at = Some(Utc::now());
        }
        self.portfolio.updated_at = Some(Utc::now());
        self.portfolio.version = CURRENT_VERSION;

        let content = serde_json::to_string_pretty(&self.portfolio)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    /// Reload the portfolio from disk.
    pub fn reload(&mut self) -> Result<()> {
        self.portfolio = Self::load_from_path(&self.path)?;
        Ok(())
    }

    /// Get a reference to the current portfolio.
    pub fn get(&self) -> &Portfolio {
        &self.portfolio
    }

    /// Get all positions.
    pub fn positions(&self) -> &[Position] {
        &self.portfolio.positions
    }

    /// Find a position by symbol.
    pub fn find_position(&self, symbol: &str) -> Option<&Position> {
        let symbol_upper = symbol.trim().to_uppercase();
        self.portfolio
            .positions
            .iter()
            .find(|p| p.symbol == symbol_upper)
    }

    fn index_of(&self, symbol: &str) -> Option<usize> {
        self.portfolio
            .positions
            .iter()
            .position(|p| p.symbol == symbol)
    }

    /// Add to a position, averaging the cost of the combined holding.
    ///
    /// - New quantity = old quantity + added quantity
    /// - New avg cost = (old_qty * old_cost + qty * cost) / total_qty
    ///
    /// Returns the resulting position and whether it was an update (true) or add (false).
    pub fn add_position(
        &mut self,
        symbol: &str,
        quantity: f64,
        cost_basis: f64,
    ) -> (Position, bool) {
        let symbol_upper = symbol.trim().to_uppercase();

        if let Some(idx) = self.index_of(&symbol_upper) {
            let existing = &self.portfolio.positions[idx];
            let total = existing.quantity + quantity;
            let avg_cost = if total > 0.0 {
                (existing.quantity * existing.cost_basis + quantity * cost_basis) / total
            } else {
                0.0
            };

            let position = Position::new(&symbol_upper, total, avg_cost);
            self.portfolio.positions[idx] = position.clone();
            (position, true)
        } else {
            let position = Position::new(&symbol_upper, quantity, cost_basis);
            self.portfolio.positions.push(position.clone());
            (position, false)
        }
    }

    /// Insert or overwrite a position with exactly this quantity and cost.
    pub fn set_position(
        &mut self,
        symbol: &str,
        quantity: f64,
        cost_basis: f64,
    ) -> Result<Position> {
        if !quantity.is_finite() || !cost_basis.is_finite() {
            return Err(Error::InvalidOperation(
                "Quantity and cost must be finite numbers".to_string(),
            ));
        }

        let position = Position::new(symbol, quantity, cost_basis);
        if position.symbol.is_empty() {
            return Err(Error::InvalidOperation("Symbol is empty".to_string()));
        }

        match self.index_of(&position.symbol) {
            Some(idx) => self.portfolio.positions[idx] = position.clone(),
            None => self.portfolio.positions.push(position.clone()),
        }
        Ok(position)
    }

    /// Remove a position from the portfolio.
    ///
    /// Returns the removed position if found.
    pub fn remove_position(&mut self, symbol: &str) -> Result<Position> {
        let symbol_upper = symbol.trim().to_uppercase();

        match self.index_of(&symbol_upper) {
            Some(idx) => Ok(self.portfolio.positions.remove(idx)),
            None => Err(Error::PositionNotFound(symbol_upper)),
        }
    }

    /// Seed the starter portfolio when no positions exist.
    ///
    /// Returns whether anything was added.
    pub fn seed_defaults(&mut self) -> bool {
        if !self.portfolio.positions.is_empty() {
            return false;
        }
        for (symbol, quantity, cost) in SEED_POSITIONS {
            self.portfolio
                .positions
                .push(Position::new(symbol, quantity, cost));
        }
        true
    }

    /// Calculate the total cost basis of all positions.
    pub fn total_cost(&self) -> f64 {
        self.portfolio.total_cost()
    }
}

impl PositionProvider for PortfolioTracker {
    fn list_positions(&self) -> Vec<Position> {
        self.portfolio.positions.list_positions()
    }
}

/// Bring a stored document up to [`CURRENT_VERSION`].
///
/// Version 0 is the legacy layout: a bare array of positions, or an object
/// without a `version` key whose positions may say `shares`.
fn migrate(data: serde_json::Value) -> Result<Portfolio> {
    if data.is_array() {
        let positions: Vec<Position> = serde_json::from_value(data)?;
        tracing::debug!("Migrating legacy position list ({} entries)", positions.len());
        return Ok(Portfolio {
            version: CURRENT_VERSION,
            positions,
            created_at: None,
            updated_at: None,
        });
    }

    let mut portfolio: Portfolio = serde_json::from_value(data)?;
    match portfolio.version {
        0 => {
            tracing::debug!("Migrating portfolio schema 0 -> {}", CURRENT_VERSION);
            portfolio.version = CURRENT_VERSION;
            Ok(portfolio)
        }
        CURRENT_VERSION => Ok(portfolio),
        newer => Err(Error::InvalidOperation(format!(
            "Portfolio schema version {} is newer than supported {}",
            newer, CURRENT_VERSION
        ))),
    }
}
