//! Per-model virtual portfolio: an isolated in-memory ledger tracking
//! cash, positions, trade history, the equity curve and win/loss counters
//! independently of every other model in the arena.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::domain::entities::fill::{Fill, FillSide};
use crate::domain::errors::LedgerError;

/// An open long position. Portfolios never hold zero-quantity positions:
/// a position that closes is removed from the map.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub qty: u32,
    pub avg_cost: f64,
}

/// One applied fill, as recorded in the portfolio history.
#[derive(Debug, Clone, Serialize)]
pub struct TradeRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub side: FillSide,
    pub qty: u32,
    pub price: f64,
    pub remaining_cash: f64,
    pub realized_pnl: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

pub struct VirtualPortfolio {
    id: String,
    model_name: String,
    starting_cash: f64,
    cash: f64,
    positions: HashMap<String, Position>,
    history: Vec<TradeRecord>,
    equity_curve: Vec<EquityPoint>,
    trades: u32,
    closed_trades: u32,
    wins: u32,
    realized_pnl: f64,
}

impl VirtualPortfolio {
    pub fn new(id: impl Into<String>, model_name: impl Into<String>, starting_cash: f64) -> Self {
        Self {
            id: id.into(),
            model_name: model_name.into(),
            starting_cash,
            cash: starting_cash,
            positions: HashMap::new(),
            history: Vec::new(),
            equity_curve: Vec::new(),
            trades: 0,
            closed_trades: 0,
            wins: 0,
            realized_pnl: 0.0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn starting_cash(&self) -> f64 {
        self.starting_cash
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn positions(&self) -> &HashMap<String, Position> {
        &self.positions
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn position_qty(&self, symbol: &str) -> u32 {
        self.positions.get(symbol).map(|p| p.qty).unwrap_or(0)
    }

    pub fn history(&self) -> &[TradeRecord] {
        &self.history
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn trades(&self) -> u32 {
        self.trades
    }

    pub fn closed_trades(&self) -> u32 {
        self.closed_trades
    }

    pub fn wins(&self) -> u32 {
        self.wins
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    /// Market value of open positions; unknown symbols fall back to their
    /// average cost.
    pub fn market_value(&self, last_prices: &HashMap<String, f64>) -> f64 {
        self.positions
            .iter()
            .map(|(symbol, position)| {
                let price = last_prices
                    .get(symbol)
                    .copied()
                    .filter(|p| *p > 0.0)
                    .unwrap_or(position.avg_cost);
                position.qty as f64 * price
            })
            .sum()
    }

    /// `equity = cash + sum(qty * price)`.
    pub fn equity(&self, last_prices: &HashMap<String, f64>) -> f64 {
        self.cash + self.market_value(last_prices)
    }

    /// Apply a fill to the ledger. Returns the realised P&L of the closed
    /// portion (zero for buys).
    pub fn apply_fill(&mut self, fill: &Fill) -> Result<f64, LedgerError> {
        let realized = match fill.side {
            FillSide::Buy => self.apply_buy(fill)?,
            FillSide::Sell => self.apply_sell(fill)?,
        };
        Ok(realized)
    }

    fn apply_buy(&mut self, fill: &Fill) -> Result<f64, LedgerError> {
        let cost = fill.qty as f64 * fill.price;
        if cost > self.cash {
            return Err(LedgerError::InsufficientCash {
                required: cost,
                available: self.cash,
            });
        }

        let position = self.positions.entry(fill.symbol.clone()).or_insert(Position {
            qty: 0,
            avg_cost: 0.0,
        });
        let new_qty = position.qty + fill.qty;
        position.avg_cost =
            (position.qty as f64 * position.avg_cost + cost) / new_qty as f64;
        position.qty = new_qty;

        self.cash -= cost;
        self.trades += 1;
        self.record(fill, fill.qty, 0.0);
        Ok(0.0)
    }

    fn apply_sell(&mut self, fill: &Fill) -> Result<f64, LedgerError> {
        let position = self
            .positions
            .get_mut(&fill.symbol)
            .ok_or_else(|| LedgerError::NoPosition(fill.symbol.clone()))?;

        let qty_sold = if fill.qty > position.qty {
            warn!(
                symbol = %fill.symbol,
                requested = fill.qty,
                held = position.qty,
                "Sell fill exceeds open position; closing the position"
            );
            position.qty
        } else {
            fill.qty
        };

        let proceeds = qty_sold as f64 * fill.price;
        let realized = (fill.price - position.avg_cost) * qty_sold as f64;

        position.qty -= qty_sold;
        if position.qty == 0 {
            self.positions.remove(&fill.symbol);
        }

        self.cash += proceeds;
        self.realized_pnl += realized;
        self.trades += 1;
        self.closed_trades += 1;
        if realized > 0.0 {
            self.wins += 1;
        }
        self.record(fill, qty_sold, realized);
        Ok(realized)
    }

    fn record(&mut self, fill: &Fill, qty: u32, realized_pnl: f64) {
        self.history.push(TradeRecord {
            id: fill.id.clone(),
            timestamp: fill.timestamp,
            symbol: fill.symbol.clone(),
            side: fill.side,
            qty,
            price: fill.price,
            remaining_cash: self.cash,
            realized_pnl,
        });
    }

    /// Append the current equity to the curve.
    pub fn snapshot_equity(&mut self, last_prices: &HashMap<String, f64>) {
        let equity = self.equity(last_prices);
        self.equity_curve.push(EquityPoint {
            timestamp: Utc::now(),
            equity,
        });
    }

    /// Ledger invariants, checked by tests after every mutation:
    /// non-negative cash, no zero-quantity positions, and conservation of
    /// `cash + inventory_at_cost - realized_pnl`.
    pub fn validate_invariants(&self) -> Result<(), String> {
        if self.cash < 0.0 {
            return Err(format!("cash {} < 0", self.cash));
        }
        for (symbol, position) in &self.positions {
            if position.qty == 0 {
                return Err(format!("position {} held with qty 0", symbol));
            }
            if position.avg_cost <= 0.0 {
                return Err(format!(
                    "position {} has non-positive avg_cost {}",
                    symbol, position.avg_cost
                ));
            }
        }
        let inventory_at_cost: f64 = self
            .positions
            .values()
            .map(|p| p.qty as f64 * p.avg_cost)
            .sum();
        let balance = self.cash + inventory_at_cost - self.realized_pnl;
        if (balance - self.starting_cash).abs() > self.starting_cash.max(1.0) * 1e-4 {
            return Err(format!(
                "conservation violated: cash {} + inventory {} - realized {} != starting {}",
                self.cash, inventory_at_cost, self.realized_pnl, self.starting_cash
            ));
        }
        Ok(())
    }
}
