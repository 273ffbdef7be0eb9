//! Execution engine: consumes risk-approved execution requests, simulates
//! fills against per-model virtual portfolios in paper mode or routes to
//! the brokerage connector in live mode, reacts to risk commands, and
//! publishes periodic leaderboard snapshots.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::actors::{Heartbeat, HEARTBEAT_INTERVAL, RECONNECT_BACKOFF};
use crate::application::bus::{topics, MessageBus};
use crate::domain::entities::command::{RiskCommand, RiskCommandKind};
use crate::domain::entities::fill::{Fill, FillSide, TradeMode, FILL_STATUS};
use crate::domain::entities::market::{Tick, TickKind};
use crate::domain::entities::order::ExecutionRequest;
use crate::domain::errors::ExecutionError;
use crate::domain::services::latency::LatencySimulator;
use crate::domain::services::order_validator::OrderValidator;
use crate::domain::services::performance::build_leaderboard;
use crate::domain::services::portfolio_router::PortfolioRouter;
use crate::domain::services::slippage::SlippageModel;
use crate::domain::value_objects::price::Price;
use crate::domain::value_objects::quantity::Quantity;
use crate::infrastructure::connector::BrokerageConnector;
use crate::persistence::audit_log::{AuditLogger, DEFAULT_MODEL_VERSION};

pub struct ExecutionEngineSettings {
    pub mode: TradeMode,
    pub starting_cash: f64,
    pub publish_interval: Duration,
}

impl Default for ExecutionEngineSettings {
    fn default() -> Self {
        Self {
            mode: TradeMode::Paper,
            starting_cash: 100_000.0,
            publish_interval: Duration::from_secs(2),
        }
    }
}

pub struct ExecutionEngine {
    bus: MessageBus,
    audit: AuditLogger,
    mode: TradeMode,
    publish_interval: Duration,
    validator: OrderValidator,
    latency: LatencySimulator,
    slippage: SlippageModel,
    router: PortfolioRouter,
    last_prices: HashMap<String, f64>,
    halted: bool,
    halt_reason: Option<String>,
    connector: Option<BrokerageConnector>,
    heartbeat: Heartbeat,
}

impl ExecutionEngine {
    pub fn new(
        bus: MessageBus,
        audit: AuditLogger,
        settings: ExecutionEngineSettings,
        latency: LatencySimulator,
        slippage: SlippageModel,
        connector: Option<BrokerageConnector>,
    ) -> Self {
        Self {
            bus,
            audit,
            mode: settings.mode,
            publish_interval: settings.publish_interval,
            validator: OrderValidator::default(),
            latency,
            slippage,
            router: PortfolioRouter::new(settings.starting_cash),
            last_prices: HashMap::new(),
            halted: false,
            halt_reason: None,
            connector,
            heartbeat: Heartbeat::new("execution_engine"),
        }
    }

    pub fn heartbeat(&self) -> Heartbeat {
        self.heartbeat.clone()
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run(shutdown).await;
        })
    }

    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(mode = %self.mode, "Execution engine started");

        'outer: loop {
            let requests = self.bus.subscribe(topics::EXECUTION_REQUESTS);
            let market = self.bus.subscribe(topics::MARKET_DATA);
            let commands = self.bus.subscribe(topics::RISK_COMMANDS);
            let (mut requests, mut market, mut commands) = match (requests, market, commands) {
                (Ok(r), Ok(m), Ok(c)) => (r, m, c),
                _ => {
                    error!("Execution engine subscribe failed; retrying");
                    tokio::time::sleep(RECONNECT_BACKOFF).await;
                    continue;
                }
            };
            info!("Subscribed to execution_requests, market_data and risk_commands");

            let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
            let mut leaderboard = tokio::time::interval(self.publish_interval);
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break 'outer;
                        }
                    }
                    _ = heartbeat.tick() => {
                        self.heartbeat.beat();
                        debug!("Execution engine heartbeat");
                    }
                    _ = leaderboard.tick() => {
                        self.publish_leaderboard();
                    }
                    message = market.recv() => match message {
                        Ok(raw) => self.handle_market_data(&raw),
                        Err(e) => {
                            error!(error = %e, "market_data subscription lost; resubscribing");
                            tokio::time::sleep(RECONNECT_BACKOFF).await;
                            continue 'outer;
                        }
                    },
                    message = commands.recv() => match message {
                        Ok(raw) => self.handle_command(&raw).await,
                        Err(e) => {
                            error!(error = %e, "risk_commands subscription lost; resubscribing");
                            tokio::time::sleep(RECONNECT_BACKOFF).await;
                            continue 'outer;
                        }
                    },
                    message = requests.recv() => match message {
                        Ok(raw) => self.handle_request(&raw).await,
                        Err(e) => {
                            error!(error = %e, "execution_requests subscription lost; resubscribing");
                            tokio::time::sleep(RECONNECT_BACKOFF).await;
                            continue 'outer;
                        }
                    },
                }
            }
        }

        info!("Execution engine stopped");
    }

    /// The per-symbol price cache is mutated only here, by the
    /// `market_data` handler.
    fn handle_market_data(&mut self, raw: &str) {
        let Ok(tick) = serde_json::from_str::<Tick>(raw) else {
            debug!("Dropping undecodable market data message");
            return;
        };
        if tick.kind == TickKind::Trade && tick.price > 0.0 && tick.price.is_finite() {
            self.last_prices.insert(tick.symbol, tick.price);
        }
    }

    async fn handle_command(&mut self, raw: &str) {
        let command: RiskCommand = match serde_json::from_str(raw) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "Dropping undecodable risk command");
                return;
            }
        };
        info!(command = %command.command, reason = %command.reason, "Risk command received");

        match command.command {
            RiskCommandKind::LiquidateAll => {
                // Paper-mode liquidation halts order intake; open positions
                // are an operator decision. Live mode closes them out.
                self.halted = true;
                self.halt_reason = Some(command.reason.clone());
                if let Some(connector) = &self.connector {
                    connector.activate_kill_switch();
                    if let Err(e) = connector.liquidate_all().await {
                        error!(error = %e, "Brokerage liquidation failed");
                    }
                }
                warn!("Order intake halted by LIQUIDATE_ALL");
            }
            RiskCommandKind::ActivateManualApproval => {
                self.halted = true;
                self.halt_reason = Some(command.reason.clone());
                if let Some(connector) = &self.connector {
                    connector.activate_manual_approval();
                }
                warn!("Order intake halted by manual approval mode");
            }
            RiskCommandKind::ResetKillSwitch => {
                self.halted = false;
                self.halt_reason = None;
                if let Some(connector) = &self.connector {
                    connector.deactivate_kill_switch();
                    connector.deactivate_manual_approval();
                }
                info!("Order intake resumed by operator reset");
            }
        }
    }

    async fn handle_request(&mut self, raw: &str) {
        // The decode IS the risk gate: a payload without `side` and `qty`
        // (a raw trade signal) fails here and can never produce a fill.
        let request: ExecutionRequest = match serde_json::from_str(raw) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Dropping non-conforming execution request");
                return;
            }
        };

        if self.halted {
            warn!(
                model_id = %request.model_id,
                reason = self.halt_reason.as_deref().unwrap_or("halted"),
                "Order blocked: engine halted"
            );
            return;
        }

        match self.mode {
            TradeMode::Paper => self.execute_paper(request).await,
            TradeMode::Live => self.execute_live(request).await,
        }
    }

    async fn execute_paper(&mut self, request: ExecutionRequest) {
        self.router
            .get_or_create(&request.model_id, &request.model_id);

        let fill = match self.simulate_fill(&request).await {
            Ok(fill) => fill,
            Err(e) => {
                info!(model_id = %request.model_id, error = %e, "Request rejected");
                return;
            }
        };

        self.router
            .register_order(fill.order_id.clone(), fill.model_id.clone());
        if self.router.apply(&fill).is_none() {
            warn!(order_id = %fill.order_id, "Fill could not be applied to a ledger");
            return;
        }

        self.audit.log_fill(&fill, DEFAULT_MODEL_VERSION).await;
        if let Err(e) = self.bus.publish(topics::EXECUTION_FILLED, &fill) {
            error!(error = %e, "Failed to publish fill");
        }
        info!(
            side = %fill.side,
            qty = fill.qty,
            symbol = %fill.symbol,
            price = fill.price,
            "Executed paper trade"
        );
    }

    /// The simulated-fill pipeline: price resolution, quantity
    /// resolution, validation, latency, slippage, fill construction.
    async fn simulate_fill(&self, request: &ExecutionRequest) -> Result<Fill, ExecutionError> {
        // 1. Decision price: request hint, else the cached tick price.
        let decision_price = request
            .price
            .filter(|p| *p > 0.0)
            .or_else(|| self.last_prices.get(&request.symbol).copied())
            .ok_or_else(|| ExecutionError::NoMarketPrice(request.symbol.clone()))?;
        let price = Price::new(decision_price)?;

        let portfolio = self
            .router
            .portfolio(&request.model_id)
            .ok_or_else(|| ExecutionError::UnknownPortfolio(request.model_id.clone()))?;

        // 2. Quantity: honour the risk-calculated qty; a sell without an
        // open position is rejected, and a sell is capped at the position.
        let side = request.side.to_fill_side();
        let resolved_qty = match side {
            FillSide::Buy => request.qty,
            FillSide::Sell => {
                let held = portfolio.position_qty(&request.symbol);
                if held == 0 {
                    return Err(ExecutionError::NoPosition(request.symbol.clone()));
                }
                request.qty.min(held)
            }
        };
        let qty = Quantity::new(resolved_qty)?;

        // 3. Validator gate.
        self.validator
            .validate(portfolio, &request.symbol, price, qty, side)?;

        // 4. Latency: the cooperative suspension that keeps one slow
        // request from monopolising the engine.
        self.latency.delay().await;

        // 5. Slippage, always adverse.
        let executed_price = self.slippage.execution_price(price.value(), side, qty.value());
        let slippage = SlippageModel::adverse_move(price.value(), executed_price, side);

        Ok(Fill {
            id: uuid::Uuid::new_v4().to_string(),
            order_id: uuid::Uuid::new_v4().to_string(),
            model_id: request.model_id.clone(),
            strategy_id: None,
            symbol: request.symbol.clone(),
            side,
            qty: qty.value(),
            price: executed_price,
            timestamp: Utc::now(),
            status: FILL_STATUS.to_string(),
            mode: self.mode,
            slippage,
            explanation: request.explanation.clone(),
        })
    }

    async fn execute_live(&mut self, request: ExecutionRequest) {
        let Some(connector) = &self.connector else {
            error!("Live mode without a brokerage connector; dropping request");
            return;
        };
        match connector
            .submit_market_order(&request.symbol, request.qty, request.side.to_fill_side())
            .await
        {
            Ok(ack) => {
                info!(
                    order_id = %ack.order_id,
                    status = %ack.status,
                    side = %request.side,
                    qty = request.qty,
                    symbol = %request.symbol,
                    "Live order submitted"
                );
                self.router
                    .register_order(ack.order_id.clone(), request.model_id.clone());
                self.audit
                    .log_order(
                        &request,
                        &ack.order_id,
                        &ack.status,
                        TradeMode::Live,
                        DEFAULT_MODEL_VERSION,
                    )
                    .await;
            }
            Err(e) => {
                // Submission failures are logged and the loop continues;
                // they do not trip the kill switch.
                error!(error = %e, symbol = %request.symbol, "Broker submission failed");
            }
        }
    }

    fn publish_leaderboard(&mut self) {
        if self.router.is_empty() {
            return;
        }
        let prices = self.last_prices.clone();
        for portfolio in self.router.portfolios_mut() {
            portfolio.snapshot_equity(&prices);
        }
        let update = build_leaderboard(&self.router, &prices, self.mode);
        if let Err(e) = self.bus.publish(topics::LEADERBOARD, &update) {
            error!(error = %e, "Failed to publish leaderboard");
        }
    }
}
