//! Risk-gating contract tests: the execution path only ever acts on
//! risk-approved payloads, the kill switch halts the pipeline, and model
//! rollback suspends auto-execution.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use quantarena::application::actors::execution_engine::{ExecutionEngine, ExecutionEngineSettings};
use quantarena::application::actors::risk_governor::RiskGovernor;
use quantarena::application::bus::{topics, MessageBus};
use quantarena::domain::entities::command::{RiskCommand, RiskCommandKind};
use quantarena::domain::entities::fill::{Fill, FillSide, TradeMode, FILL_STATUS};
use quantarena::domain::entities::order::ExecutionRequest;
use quantarena::domain::entities::signal::{SignalAction, TradeSignal};
use quantarena::domain::services::latency::LatencySimulator;
use quantarena::domain::services::risk_engine::{RiskEngine, RiskEngineConfig};
use quantarena::domain::services::slippage::SlippageModel;
use quantarena::persistence::audit_log::AuditLogger;

fn temp_audit(bus: &MessageBus) -> AuditLogger {
    let path = std::env::temp_dir().join(format!("audit_{}.jsonl", uuid::Uuid::new_v4()));
    AuditLogger::new(path, bus.clone())
}

fn signal(model_id: &str, action: SignalAction) -> TradeSignal {
    TradeSignal {
        model_id: model_id.into(),
        model_name: model_id.into(),
        symbol: "SPY".into(),
        action,
        confidence: 0.8,
        price: 150.0,
        timestamp: Utc::now(),
        explanation: vec![],
    }
}

fn fill(side: FillSide, slippage: f64) -> Fill {
    Fill {
        id: uuid::Uuid::new_v4().to_string(),
        order_id: uuid::Uuid::new_v4().to_string(),
        model_id: "sma_spy".into(),
        strategy_id: None,
        symbol: "SPY".into(),
        side,
        qty: 10,
        price: 150.0,
        timestamp: Utc::now(),
        status: FILL_STATUS.into(),
        mode: TradeMode::Paper,
        slippage,
        explanation: vec![],
    }
}

fn spawn_engine(bus: &MessageBus, shutdown_rx: watch::Receiver<bool>) {
    ExecutionEngine::new(
        bus.clone(),
        temp_audit(bus),
        ExecutionEngineSettings {
            mode: TradeMode::Paper,
            starting_cash: 100_000.0,
            publish_interval: Duration::from_secs(60),
        },
        LatencySimulator::new(1, 5),
        SlippageModel::new(5.0),
        None,
    )
    .spawn(shutdown_rx);
}

fn spawn_governor(bus: &MessageBus, config: RiskEngineConfig, shutdown_rx: watch::Receiver<bool>) {
    let mut engine = RiskEngine::new(config);
    engine.update_account_state(100_000.0, 0.0);
    RiskGovernor::new(bus.clone(), temp_audit(bus), engine, 10).spawn(shutdown_rx);
}

#[tokio::test]
async fn test_raw_signal_payload_never_produces_a_fill() {
    let bus = MessageBus::new();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_engine(&bus, shutdown_rx);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut fills = bus.subscribe(topics::EXECUTION_FILLED).unwrap();

    // A trade_signals-shaped payload pushed straight at the execution
    // topic: no `side`, no `qty`. It must be dropped at decode.
    let raw_signal = serde_json::json!({
        "model_id": "sma_spy",
        "model_name": "SMA Crossover",
        "symbol": "SPY",
        "signal": "BUY",
        "confidence": 0.8,
        "price": 150.0,
        "timestamp": Utc::now(),
    });
    bus.publish(topics::EXECUTION_REQUESTS, &raw_signal).unwrap();

    let result = fills.recv_timeout(Duration::from_millis(500)).await.unwrap();
    assert!(result.is_none(), "raw signal payload produced a fill");

    // Sanity: a conforming request on the same engine does fill.
    let request = ExecutionRequest {
        model_id: "sma_spy".into(),
        symbol: "SPY".into(),
        side: quantarena::domain::entities::order::RequestSide::Buy,
        qty: 10,
        order_type: "market".into(),
        price: Some(150.0),
        confidence: 0.8,
        explanation: vec![],
        timestamp: Utc::now(),
    };
    bus.publish(topics::EXECUTION_REQUESTS, &request).unwrap();
    let raw = tokio::time::timeout(Duration::from_secs(2), fills.recv())
        .await
        .expect("conforming request fills")
        .unwrap();
    assert!(raw.contains("FILLED"));
}

#[tokio::test]
async fn test_kill_switch_trip_halts_pipeline_and_liquidates_once() {
    let bus = MessageBus::new();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_governor(
        &bus,
        RiskEngineConfig {
            max_consecutive_losses: 3,
            ..Default::default()
        },
        shutdown_rx.clone(),
    );
    spawn_engine(&bus, shutdown_rx);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut requests = bus.subscribe(topics::EXECUTION_REQUESTS).unwrap();
    let mut fills = bus.subscribe(topics::EXECUTION_FILLED).unwrap();
    let mut commands = bus.subscribe(topics::RISK_COMMANDS).unwrap();

    // Three losing fills (positive slippage -> negative proxy return).
    for _ in 0..3 {
        bus.publish(topics::EXECUTION_FILLED, &fill(FillSide::Buy, 0.09))
            .unwrap();
    }
    // Drain our own echoes of those fills.
    for _ in 0..3 {
        let _ = fills.recv_timeout(Duration::from_millis(200)).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The next signal trips the switch: exactly one LIQUIDATE_ALL, no
    // request, no fill.
    bus.publish(topics::TRADE_SIGNALS, &signal("sma_spy", SignalAction::Buy))
        .unwrap();

    let raw = tokio::time::timeout(Duration::from_secs(2), commands.recv())
        .await
        .expect("command within deadline")
        .unwrap();
    let command: RiskCommand = serde_json::from_str(&raw).unwrap();
    assert_eq!(command.command, RiskCommandKind::LiquidateAll);

    assert!(requests
        .recv_timeout(Duration::from_millis(300))
        .await
        .unwrap()
        .is_none());
    assert!(fills
        .recv_timeout(Duration::from_millis(300))
        .await
        .unwrap()
        .is_none());
    assert!(commands
        .recv_timeout(Duration::from_millis(300))
        .await
        .unwrap()
        .is_none());

    // The engine is now halted: even a conforming request is refused.
    let request = ExecutionRequest {
        model_id: "sma_spy".into(),
        symbol: "SPY".into(),
        side: quantarena::domain::entities::order::RequestSide::Buy,
        qty: 10,
        order_type: "market".into(),
        price: Some(150.0),
        confidence: 0.8,
        explanation: vec![],
        timestamp: Utc::now(),
    };
    bus.publish(topics::EXECUTION_REQUESTS, &request).unwrap();
    assert!(fills
        .recv_timeout(Duration::from_millis(400))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_model_rollback_blocks_subsequent_signals() {
    let bus = MessageBus::new();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_governor(
        &bus,
        RiskEngineConfig {
            // Keep the loss-count breaker out of the way; this test is
            // about the rollback state machine.
            max_consecutive_losses: 1_000,
            rollback_min_accuracy: 0.5,
            ..Default::default()
        },
        shutdown_rx,
    );
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut requests = bus.subscribe(topics::EXECUTION_REQUESTS).unwrap();
    let mut commands = bus.subscribe(topics::RISK_COMMANDS).unwrap();

    // 10 prediction outcomes: 2 correct (SELL with slippage cost reads as
    // a correct short call), 8 wrong (BUY with slippage cost).
    for i in 0..10 {
        let side = if i < 2 { FillSide::Sell } else { FillSide::Buy };
        bus.publish(
            topics::EXECUTION_FILLED,
            &fill(side, 0.05 + 0.01 * i as f64),
        )
        .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    // 10 approved signals bring the governor to its performance check.
    for _ in 0..10 {
        bus.publish(topics::TRADE_SIGNALS, &signal("sma_spy", SignalAction::Buy))
            .unwrap();
    }
    for _ in 0..10 {
        let raw = tokio::time::timeout(Duration::from_secs(2), requests.recv())
            .await
            .expect("approved request")
            .unwrap();
        assert!(raw.contains("\"side\":\"buy\""));
    }

    let raw = tokio::time::timeout(Duration::from_secs(2), commands.recv())
        .await
        .expect("rollback command")
        .unwrap();
    let command: RiskCommand = serde_json::from_str(&raw).unwrap();
    assert_eq!(command.command, RiskCommandKind::ActivateManualApproval);
    let accuracy = command.rolling_accuracy.expect("metrics attached");
    assert!((accuracy - 0.2).abs() < 1e-9);

    // A subsequent signal is queued, not forwarded.
    bus.publish(topics::TRADE_SIGNALS, &signal("sma_spy", SignalAction::Buy))
        .unwrap();
    assert!(requests
        .recv_timeout(Duration::from_millis(400))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_validator_rejects_oversized_order() {
    let bus = MessageBus::new();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_engine(&bus, shutdown_rx);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut fills = bus.subscribe(topics::EXECUTION_FILLED).unwrap();

    // $50,000 notional clears the order cap but projects past the
    // $25,000 position cap.
    let request = ExecutionRequest {
        model_id: "whale".into(),
        symbol: "SPY".into(),
        side: quantarena::domain::entities::order::RequestSide::Buy,
        qty: 500,
        order_type: "market".into(),
        price: Some(100.0),
        confidence: 0.9,
        explanation: vec![],
        timestamp: Utc::now(),
    };
    bus.publish(topics::EXECUTION_REQUESTS, &request).unwrap();

    let result = fills.recv_timeout(Duration::from_millis(500)).await.unwrap();
    assert!(result.is_none(), "oversized order must be rejected");
}
