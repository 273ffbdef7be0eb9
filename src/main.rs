use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, routing::get, Json, Router};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quantarena::application::actors::account_monitor::AccountMonitor;
use quantarena::application::actors::execution_engine::{ExecutionEngine, ExecutionEngineSettings};
use quantarena::application::actors::risk_governor::RiskGovernor;
use quantarena::application::actors::signal_engine::SignalEngine;
use quantarena::application::actors::Heartbeat;
use quantarena::application::bus::MessageBus;
use quantarena::config::{ExecutionMode, Settings};
use quantarena::domain::entities::fill::TradeMode;
use quantarena::domain::services::latency::LatencySimulator;
use quantarena::domain::services::risk_engine::RiskEngine;
use quantarena::domain::services::slippage::SlippageModel;
use quantarena::domain::services::strategies::{
    BoostedTrees, RsiReversion, SequenceStrategy, SmaCrossover, StrategyKind,
};
use quantarena::infrastructure::alpaca_client::{AlpacaClient, AlpacaConfig};
use quantarena::infrastructure::connector::BrokerageConnector;
use quantarena::infrastructure::synthetic_feed::SyntheticFeed;
use quantarena::persistence::audit_log::AuditLogger;

fn build_strategies(symbols: &[String]) -> Result<Vec<StrategyKind>, String> {
    let mut strategies = Vec::new();
    for symbol in symbols {
        let symbol = symbol.as_str();
        let tag = symbol.to_lowercase();
        strategies.push(StrategyKind::SmaCrossover(SmaCrossover::new(
            symbol,
            format!("sma_{tag}"),
            10,
            30,
        )?));
        strategies.push(StrategyKind::RsiReversion(RsiReversion::new(
            symbol,
            format!("rsi_{tag}"),
            14,
            30.0,
            70.0,
        )));
        strategies.push(StrategyKind::BoostedTrees(BoostedTrees::new(
            symbol,
            format!("gb_{tag}_v1"),
            0.6,
        )));
        strategies.push(StrategyKind::Sequence(SequenceStrategy::recurrent(
            symbol,
            format!("rnn_{tag}_v1"),
        )));
        strategies.push(StrategyKind::Sequence(SequenceStrategy::attention(
            symbol,
            format!("attn_{tag}_v1"),
        )));
    }
    Ok(strategies)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quantarena=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Quantarena starting...");

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    info!(
        mode = ?settings.execution_mode,
        symbols = ?settings.symbols,
        "Configuration loaded"
    );

    let bus = MessageBus::new();
    let audit = AuditLogger::new(&settings.audit_log_path, bus.clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut heartbeats: Vec<Heartbeat> = Vec::new();

    // Signal engine with the full strategy set per symbol.
    let strategies = build_strategies(&settings.symbols)?;
    info!(
        strategies = strategies.len(),
        symbols = settings.symbols.len(),
        "Strategy roster built"
    );
    let signal_engine = SignalEngine::new(bus.clone(), audit.clone(), strategies);
    heartbeats.push(signal_engine.heartbeat());
    signal_engine.spawn(shutdown_rx.clone());

    // Risk governor, its equity anchored to the paper starting cash so
    // position sizing has an account to work against from the first tick.
    let mut risk_engine = RiskEngine::new((&settings.risk).into());
    risk_engine.update_account_state(settings.paper.starting_cash, 0.0);
    let governor = RiskGovernor::new(
        bus.clone(),
        audit.clone(),
        risk_engine,
        settings.risk.perf_check_interval,
    );
    heartbeats.push(governor.heartbeat());
    governor.spawn(shutdown_rx.clone());

    // Execution engine, plus the brokerage connector and account monitor
    // in live mode.
    let (mode, connector) = match settings.execution_mode {
        ExecutionMode::Paper => (TradeMode::Paper, None),
        ExecutionMode::Live => {
            let Some(broker) = settings.broker.as_ref() else {
                error!("Live mode requires brokerage credentials");
                return Err("missing brokerage configuration".into());
            };
            let client = Arc::new(AlpacaClient::new(AlpacaConfig {
                base_url: broker.base_url.clone(),
                api_key: broker.api_key.clone(),
                secret_key: broker.secret_key.clone(),
            }));
            let connector = BrokerageConnector::new(client);

            let monitor = AccountMonitor::new(
                connector.clone(),
                audit.clone(),
                broker.account_poll_interval,
                broker.circuit_breaker_drawdown_pct,
            );
            heartbeats.push(monitor.heartbeat());
            monitor.spawn(shutdown_rx.clone());

            (TradeMode::Live, Some(connector))
        }
    };
    let engine = ExecutionEngine::new(
        bus.clone(),
        audit.clone(),
        ExecutionEngineSettings {
            mode,
            starting_cash: settings.paper.starting_cash,
            publish_interval: settings.paper.publish_interval,
        },
        LatencySimulator::default(),
        SlippageModel::default(),
        connector,
    );
    heartbeats.push(engine.heartbeat());
    engine.spawn(shutdown_rx.clone());

    // Development feed: paper mode runs against a synthetic random walk.
    if settings.execution_mode == ExecutionMode::Paper {
        let feed = SyntheticFeed::new(bus.clone(), &settings.symbols, Duration::from_millis(250));
        feed.spawn(shutdown_rx.clone());
    }

    // Liveness endpoint.
    let app = Router::new()
        .route("/", get(|| async { "Quantarena is running" }))
        .route("/health", get(health_check))
        .with_state(Arc::new(heartbeats));

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    let shutdown_signal = async {
        let ctrl_c = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C signal"),
                Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                    info!("Received SIGTERM signal");
                }
                Err(e) => error!("Failed to install SIGTERM handler: {}", e),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    };

    info!("Startup complete. Press Ctrl+C to stop.");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Shutting down service loops...");
    let _ = shutdown_tx.send(true);
    tokio::time::sleep(Duration::from_millis(200)).await;

    info!("Shutdown complete");
    Ok(())
}

/// Health endpoint: reports per-loop heartbeat freshness.
async fn health_check(
    State(heartbeats): State<Arc<Vec<Heartbeat>>>,
) -> Json<HashMap<String, serde_json::Value>> {
    let max_age = Duration::from_secs(90);
    let mut response = HashMap::new();
    response.insert("status".to_string(), serde_json::json!("running"));

    let loops: HashMap<&str, bool> = heartbeats
        .iter()
        .map(|hb| (hb.name(), hb.is_healthy(max_age)))
        .collect();
    let all_healthy = loops.values().all(|&healthy| healthy);

    response.insert("loops".to_string(), serde_json::json!(loops));
    response.insert("all_healthy".to_string(), serde_json::json!(all_healthy));
    Json(response)
}
