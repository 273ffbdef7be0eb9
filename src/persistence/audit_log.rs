//! Append-only JSONL audit trail.
//!
//! Every SIGNAL / ORDER / FILL / KILL_SWITCH / MANUAL_APPROVAL_MODE event
//! is written as one self-contained JSON line and simultaneously published
//! on the `audit_events` topic. This stream is the only mechanism linking
//! a downstream fill back to the upstream signal that caused it, so audit
//! failures are loud in the logs but never propagate: a disk or publish
//! error must never block a fill.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{error, warn};

use crate::application::bus::{topics, MessageBus};
use crate::domain::entities::fill::{Fill, TradeMode};
use crate::domain::entities::order::ExecutionRequest;
use crate::domain::entities::signal::TradeSignal;

pub const DEFAULT_MODEL_VERSION: &str = "v1.0";

#[derive(Clone)]
pub struct AuditLogger {
    path: Arc<PathBuf>,
    bus: MessageBus,
}

impl AuditLogger {
    pub fn new(path: impl AsRef<Path>, bus: MessageBus) -> Self {
        Self {
            path: Arc::new(path.as_ref().to_path_buf()),
            bus,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path.as_ref())
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await
    }

    /// Write the record to disk and publish it on `audit_events`. Both
    /// halves are best-effort.
    async fn emit(&self, event_type: &str, fields: Value) {
        let mut record = json!({
            "event_type": event_type,
            "logged_at": Utc::now().to_rfc3339(),
        });
        if let (Some(target), Some(source)) = (record.as_object_mut(), fields.as_object()) {
            for (key, value) in source {
                target.insert(key.clone(), value.clone());
            }
        }
        let line = record.to_string();

        if let Err(e) = self.append(&line).await {
            error!(path = %self.path.display(), error = %e, "Audit log disk write failed");
        }
        if let Err(e) = self.bus.publish_raw(topics::AUDIT_EVENTS, line) {
            warn!(error = %e, "Audit publish failed (non-fatal)");
        }
    }

    /// Record an inbound signal before any execution gate is applied.
    pub async fn log_signal(&self, signal: &TradeSignal, model_version: &str) {
        self.emit(
            "SIGNAL",
            json!({
                "model_id": signal.model_id,
                "model_version": model_version,
                "symbol": signal.symbol,
                "signal": signal.action,
                "confidence": signal.confidence,
                "price": signal.price,
                "explanation": signal.explanation,
            }),
        )
        .await;
    }

    /// Record a submitted order (live mode).
    pub async fn log_order(
        &self,
        request: &ExecutionRequest,
        order_id: &str,
        status: &str,
        mode: TradeMode,
        model_version: &str,
    ) {
        self.emit(
            "ORDER",
            json!({
                "model_id": request.model_id,
                "model_version": model_version,
                "symbol": request.symbol,
                "side": request.side,
                "qty": request.qty,
                "price": request.price,
                "confidence": request.confidence,
                "order_id": order_id,
                "status": status,
                "mode": mode,
            }),
        )
        .await;
    }

    /// Record a trade fill, paper or live.
    pub async fn log_fill(&self, fill: &Fill, model_version: &str) {
        let mut fields = serde_json::to_value(fill).unwrap_or_else(|_| json!({}));
        if let Some(object) = fields.as_object_mut() {
            object.insert("model_version".to_string(), json!(model_version));
        }
        self.emit("FILL", fields).await;
    }

    /// Record a kill-switch activation.
    pub async fn log_kill_switch(&self, trigger: &str, drawdown_pct: f64, equity: f64) {
        self.emit(
            "KILL_SWITCH",
            json!({
                "model_id": "system",
                "model_version": DEFAULT_MODEL_VERSION,
                "trigger": trigger,
                "drawdown_pct": drawdown_pct,
                "equity": equity,
            }),
        )
        .await;
    }

    /// Record a rollback into manual-approval mode.
    pub async fn log_manual_approval_mode(
        &self,
        trigger: &str,
        reason: &str,
        rolling_sharpe: Option<f64>,
        rolling_accuracy: Option<f64>,
    ) {
        self.emit(
            "MANUAL_APPROVAL_MODE",
            json!({
                "model_id": "system",
                "model_version": DEFAULT_MODEL_VERSION,
                "trigger": trigger,
                "reason": reason,
                "rolling_sharpe": rolling_sharpe,
                "rolling_accuracy": rolling_accuracy,
            }),
        )
        .await;
    }
}
