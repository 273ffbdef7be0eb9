//! Routes execution fills to the correct virtual portfolio.
//!
//! Resolution order: the order-id registry first, then the fill's
//! strategy id, then its model id. A fill that matches none of these is
//! an orphan: it is logged and discarded, never applied to an arbitrary
//! portfolio.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::domain::entities::fill::Fill;
use crate::domain::services::virtual_portfolio::VirtualPortfolio;

pub struct PortfolioRouter {
    starting_cash: f64,
    portfolios: HashMap<String, VirtualPortfolio>,
    order_map: HashMap<String, String>,
}

impl PortfolioRouter {
    pub fn new(starting_cash: f64) -> Self {
        Self {
            starting_cash,
            portfolios: HashMap::new(),
            order_map: HashMap::new(),
        }
    }

    pub fn get_or_create(&mut self, model_id: &str, model_name: &str) -> &mut VirtualPortfolio {
        let starting_cash = self.starting_cash;
        self.portfolios.entry(model_id.to_string()).or_insert_with(|| {
            info!(model_id, starting_cash, "Created portfolio");
            VirtualPortfolio::new(model_id, model_name, starting_cash)
        })
    }

    pub fn portfolio(&self, id: &str) -> Option<&VirtualPortfolio> {
        self.portfolios.get(id)
    }

    pub fn portfolios(&self) -> impl Iterator<Item = &VirtualPortfolio> {
        self.portfolios.values()
    }

    pub fn portfolios_mut(&mut self) -> impl Iterator<Item = &mut VirtualPortfolio> {
        self.portfolios.values_mut()
    }

    pub fn len(&self) -> usize {
        self.portfolios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.portfolios.is_empty()
    }

    /// Map an outgoing order id to its portfolio so the eventual fill
    /// routes deterministically.
    pub fn register_order(&mut self, order_id: impl Into<String>, portfolio_id: impl Into<String>) {
        self.order_map.insert(order_id.into(), portfolio_id.into());
    }

    fn resolve(&self, fill: &Fill) -> Option<String> {
        if let Some(id) = self.order_map.get(&fill.order_id) {
            if self.portfolios.contains_key(id) {
                return Some(id.clone());
            }
        }
        if let Some(strategy_id) = &fill.strategy_id {
            if self.portfolios.contains_key(strategy_id) {
                return Some(strategy_id.clone());
            }
        }
        if self.portfolios.contains_key(&fill.model_id) {
            return Some(fill.model_id.clone());
        }
        None
    }

    /// Route and apply a fill. Returns the realised P&L on success, or
    /// `None` when the fill was orphaned or the ledger rejected it.
    pub fn apply(&mut self, fill: &Fill) -> Option<f64> {
        let Some(portfolio_id) = self.resolve(fill) else {
            warn!(
                order_id = %fill.order_id,
                model_id = %fill.model_id,
                "Orphan fill: no matching portfolio, discarding"
            );
            return None;
        };

        let Some(portfolio) = self.portfolios.get_mut(&portfolio_id) else {
            return None;
        };
        match portfolio.apply_fill(fill) {
            Ok(realized) => {
                info!(
                    portfolio = %portfolio_id,
                    cash = portfolio.cash(),
                    "Portfolio updated from fill"
                );
                Some(realized)
            }
            Err(e) => {
                warn!(portfolio = %portfolio_id, error = %e, "Fill rejected by ledger");
                None
            }
        }
    }
}
