//! Leaderboard snapshots and portfolio risk metrics.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::fill::TradeMode;
use crate::domain::services::portfolio_router::PortfolioRouter;
use crate::domain::services::virtual_portfolio::{EquityPoint, VirtualPortfolio};

const MIN_SAMPLES: usize = 5;
const ANNUALISATION: f64 = 252.0;

/// Worst peak-to-trough fraction over the equity curve, in `[0, 1]`.
/// `None` with fewer than two points.
pub fn max_drawdown(curve: &[EquityPoint]) -> Option<f64> {
    if curve.len() < 2 {
        return None;
    }
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for point in curve {
        peak = peak.max(point.equity);
        if peak > 0.0 {
            worst = worst.max((peak - point.equity) / peak);
        }
    }
    Some(worst)
}

/// Annualised Sortino ratio: mean return over downside deviation.
/// `None` with insufficient samples or no downside volatility.
pub fn sortino(returns: &[f64]) -> Option<f64> {
    if returns.len() < MIN_SAMPLES {
        return None;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let downside: f64 = returns
        .iter()
        .map(|r| r.min(0.0).powi(2))
        .sum::<f64>()
        / n;
    let downside_std = downside.sqrt();
    if downside_std == 0.0 {
        return None;
    }
    Some((mean / downside_std) * ANNUALISATION.sqrt())
}

/// Calmar ratio: total return over maximum drawdown. `None` when the
/// drawdown is zero (nothing to normalise against).
pub fn calmar(total_return: f64, max_drawdown: f64) -> Option<f64> {
    if max_drawdown <= 0.0 {
        return None;
    }
    Some(total_return / max_drawdown)
}

fn equity_returns(curve: &[EquityPoint]) -> Vec<f64> {
    curve
        .windows(2)
        .filter(|w| w[0].equity > 0.0)
        .map(|w| w[1].equity / w[0].equity - 1.0)
        .collect()
}

/// One leaderboard entry: the rich dashboard schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub model_id: String,
    pub model_name: String,
    pub cash: f64,
    pub equity: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub realized_pnl: f64,
    pub trades: u32,
    pub wins: u32,
    pub closed_trades: u32,
    pub win_rate: f64,
    pub open_positions: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_drawdown: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sortino: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calmar: Option<f64>,
}

/// The periodic leaderboard payload, sorted by equity descending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardUpdate {
    pub timestamp: DateTime<Utc>,
    pub mode: TradeMode,
    pub best_model: Option<String>,
    pub models: Vec<LeaderboardRow>,
}

/// Snapshot one portfolio against the latest prices.
pub fn snapshot(portfolio: &VirtualPortfolio, last_prices: &HashMap<String, f64>) -> LeaderboardRow {
    let equity = portfolio.equity(last_prices);
    let starting = portfolio.starting_cash();
    let pnl = equity - starting;
    let pnl_pct = if starting > 0.0 { pnl / starting * 100.0 } else { 0.0 };
    let win_rate = if portfolio.closed_trades() > 0 {
        portfolio.wins() as f64 / portfolio.closed_trades() as f64
    } else {
        0.0
    };

    let curve = portfolio.equity_curve();
    let dd = max_drawdown(curve);
    let returns = equity_returns(curve);

    LeaderboardRow {
        model_id: portfolio.id().to_string(),
        model_name: portfolio.model_name().to_string(),
        cash: portfolio.cash(),
        equity,
        pnl,
        pnl_pct,
        realized_pnl: portfolio.realized_pnl(),
        trades: portfolio.trades(),
        wins: portfolio.wins(),
        closed_trades: portfolio.closed_trades(),
        win_rate,
        open_positions: portfolio.positions().len(),
        max_drawdown: dd,
        sortino: sortino(&returns),
        calmar: dd.and_then(|d| calmar(pnl / starting.max(1.0), d)),
    }
}

/// Build the full leaderboard, sorted by equity descending.
pub fn build_leaderboard(
    router: &PortfolioRouter,
    last_prices: &HashMap<String, f64>,
    mode: TradeMode,
) -> LeaderboardUpdate {
    let mut models: Vec<LeaderboardRow> = router
        .portfolios()
        .map(|p| snapshot(p, last_prices))
        .collect();
    models.sort_by(|a, b| b.equity.partial_cmp(&a.equity).unwrap_or(std::cmp::Ordering::Equal));

    LeaderboardUpdate {
        timestamp: Utc::now(),
        mode,
        best_model: models.first().map(|row| row.model_id.clone()),
        models,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::fill::{Fill, FillSide, FILL_STATUS};

    fn point(equity: f64) -> EquityPoint {
        EquityPoint {
            timestamp: Utc::now(),
            equity,
        }
    }

    #[test]
    fn test_max_drawdown_flat_curve_is_zero() {
        let curve = vec![point(100.0), point(100.0), point(100.0)];
        assert_eq!(max_drawdown(&curve), Some(0.0));
    }

    #[test]
    fn test_max_drawdown_peak_to_trough() {
        let curve = vec![point(100.0), point(120.0), point(90.0), point(110.0)];
        let dd = max_drawdown(&curve).unwrap();
        assert!((dd - 0.25).abs() < 1e-12);
        assert!(dd >= 0.0 && dd <= 1.0);
    }

    #[test]
    fn test_max_drawdown_needs_two_points() {
        assert!(max_drawdown(&[point(100.0)]).is_none());
    }

    #[test]
    fn test_sortino_none_without_downside() {
        let returns = vec![0.01, 0.02, 0.01, 0.03, 0.02];
        assert!(sortino(&returns).is_none());
    }

    #[test]
    fn test_sortino_negative_for_losing_series() {
        let returns = vec![-0.01, -0.02, 0.005, -0.015, -0.01, 0.002];
        let value = sortino(&returns).unwrap();
        assert!(value < 0.0);
    }

    #[test]
    fn test_calmar_none_for_zero_drawdown() {
        assert!(calmar(0.1, 0.0).is_none());
        assert_eq!(calmar(0.1, 0.05), Some(2.0));
    }

    #[test]
    fn test_leaderboard_sorted_by_equity_descending() {
        let mut router = PortfolioRouter::new(100_000.0);
        router.get_or_create("winner", "Winner");
        router.get_or_create("loser", "Loser");

        // Hand the loser a losing round trip.
        let buy = Fill {
            id: "f1".into(),
            order_id: "o1".into(),
            model_id: "loser".into(),
            strategy_id: None,
            symbol: "SPY".into(),
            side: FillSide::Buy,
            qty: 100,
            price: 100.0,
            timestamp: Utc::now(),
            status: FILL_STATUS.into(),
            mode: TradeMode::Paper,
            slippage: 0.0,
            explanation: vec![],
        };
        let mut sell = buy.clone();
        sell.side = FillSide::Sell;
        sell.price = 90.0;
        router.apply(&buy);
        router.apply(&sell);

        let board = build_leaderboard(&router, &HashMap::new(), TradeMode::Paper);
        assert_eq!(board.models.len(), 2);
        assert_eq!(board.models[0].model_id, "winner");
        assert_eq!(board.best_model.as_deref(), Some("winner"));
        assert_eq!(board.models[1].pnl, -1_000.0);
        assert_eq!(board.models[1].win_rate, 0.0);
    }

    #[test]
    fn test_snapshot_win_rate_and_counters() {
        let mut router = PortfolioRouter::new(100_000.0);
        router.get_or_create("model_a", "Model A");
        let buy = Fill {
            id: "f1".into(),
            order_id: "o1".into(),
            model_id: "model_a".into(),
            strategy_id: None,
            symbol: "SPY".into(),
            side: FillSide::Buy,
            qty: 10,
            price: 100.0,
            timestamp: Utc::now(),
            status: FILL_STATUS.into(),
            mode: TradeMode::Paper,
            slippage: 0.0,
            explanation: vec![],
        };
        let mut sell = buy.clone();
        sell.side = FillSide::Sell;
        sell.price = 110.0;
        router.apply(&buy);
        router.apply(&sell);

        let row = snapshot(router.portfolio("model_a").unwrap(), &HashMap::new());
        assert_eq!(row.trades, 2);
        assert_eq!(row.closed_trades, 1);
        assert_eq!(row.wins, 1);
        assert_eq!(row.win_rate, 1.0);
        assert_eq!(row.realized_pnl, 100.0);
        assert_eq!(row.open_positions, 0);
    }
}
