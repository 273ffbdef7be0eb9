pub mod features;
pub mod indicators;
pub mod latency;
pub mod order_validator;
pub mod performance;
pub mod portfolio_router;
pub mod predictors;
pub mod risk_engine;
pub mod slippage;
pub mod strategies;
pub mod virtual_portfolio;
