//! Pre-trade order validator: the last gate before a simulated fill or a
//! live submission, enforcing buying power and hard notional caps.

use tracing::warn;

use crate::domain::entities::fill::FillSide;
use crate::domain::errors::ExecutionError;
use crate::domain::services::virtual_portfolio::VirtualPortfolio;
use crate::domain::value_objects::price::Price;
use crate::domain::value_objects::quantity::Quantity;

/// Maximum notional per order.
pub const MAX_ORDER_VALUE: f64 = 50_000.0;
/// Maximum projected value of a single position after a BUY. The tighter
/// position cap is the effective single-order BUY ceiling.
pub const MAX_POSITION_VALUE: f64 = 25_000.0;

pub struct OrderValidator {
    max_order_value: f64,
    max_position_value: f64,
}

impl OrderValidator {
    pub fn new(max_order_value: f64, max_position_value: f64) -> Self {
        Self {
            max_order_value,
            max_position_value,
        }
    }

    /// Accept or reject an order against the owning portfolio. Price and
    /// quantity positivity are guaranteed by their types; this checks
    /// buying power, the per-order notional cap, and the projected
    /// position cap on buys.
    pub fn validate(
        &self,
        portfolio: &VirtualPortfolio,
        symbol: &str,
        price: Price,
        qty: Quantity,
        side: FillSide,
    ) -> Result<(), ExecutionError> {
        let estimated_cost = qty.notional(price.value());

        if side == FillSide::Buy && portfolio.cash() < estimated_cost {
            warn!(
                symbol,
                required = estimated_cost,
                available = portfolio.cash(),
                "Order rejected: insufficient cash"
            );
            return Err(ExecutionError::Rejected(format!(
                "insufficient cash: need {:.2}, have {:.2}",
                estimated_cost,
                portfolio.cash()
            )));
        }

        if estimated_cost > self.max_order_value {
            warn!(
                symbol,
                notional = estimated_cost,
                limit = self.max_order_value,
                "Order rejected: order value cap"
            );
            return Err(ExecutionError::Rejected(format!(
                "order value {:.2} exceeds limit {:.2}",
                estimated_cost, self.max_order_value
            )));
        }

        if side == FillSide::Buy {
            let existing_qty = portfolio.position_qty(symbol);
            let projected_value = (existing_qty + qty.value()) as f64 * price.value();
            if projected_value > self.max_position_value {
                warn!(
                    symbol,
                    projected = projected_value,
                    limit = self.max_position_value,
                    "Order rejected: position size cap"
                );
                return Err(ExecutionError::Rejected(format!(
                    "position value {:.2} would exceed limit {:.2}",
                    projected_value, self.max_position_value
                )));
            }
        }

        Ok(())
    }
}

impl Default for OrderValidator {
    fn default() -> Self {
        Self::new(MAX_ORDER_VALUE, MAX_POSITION_VALUE)
    }
}
