//! Per-call cost/latency telemetry.
//!
//! Telemetry is an injected capability: the gateway and the stages receive
//! an `Arc<dyn TelemetrySink>` at construction.  Transport is out of scope;
//! [`LogTelemetry`] writes through the `log` facade and [`MemoryTelemetry`]
//! collects records in memory.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

use crate::pipeline::CascadeStage;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Success,
    Timeout,
    Failure,
    Refusal,
}

/// One model call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallRecord {
    pub stage: Option<CascadeStage>,
    pub model: String,
    pub latency: Duration,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub estimated_cost_usd: f64,
    pub outcome: CallOutcome,
}

/// One stage run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRecord {
    pub stage: CascadeStage,
    pub elapsed: Duration,
    /// Reason when the stage degraded.
    pub degraded: Option<String>,
}

/// Rough token estimate (≈4 characters per token).
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.chars().count() as u32;
    chars.div_ceil(4)
}

// ---------------------------------------------------------------------------
// TelemetrySink trait
// ---------------------------------------------------------------------------

pub trait TelemetrySink: Send + Sync {
    fn record_call(&self, record: &CallRecord);

    fn record_stage(&self, _record: &StageRecord) {}
}

/// Discards everything.
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn record_call(&self, _record: &CallRecord) {}
}

/// Writes records through the `log` facade.
pub struct LogTelemetry;

impl TelemetrySink for LogTelemetry {
    fn record_call(&self, r: &CallRecord) {
        let stage = r.stage.map(|s| s.label()).unwrap_or("-");
        log::info!(
            "telemetry: call stage={stage} model={} outcome={:?} latency_ms={} in_tokens={} out_tokens={} cost_usd={:.6}",
            r.model,
            r.outcome,
            r.latency.as_millis(),
            r.input_tokens,
            r.output_tokens,
            r.estimated_cost_usd
        );
    }

    fn record_stage(&self, r: &StageRecord) {
        match &r.degraded {
            Some(reason) => log::warn!(
                "telemetry: stage={} elapsed_ms={} degraded: {reason}",
                r.stage.label(),
                r.elapsed.as_millis()
            ),
            None => log::info!(
                "telemetry: stage={} elapsed_ms={}",
                r.stage.label(),
                r.elapsed.as_millis()
            ),
        }
    }
}

/// Collects records; used by tests and the CLI summary.
#[derive(Default)]
pub struct MemoryTelemetry {
    calls: Mutex<Vec<CallRecord>>,
    stages: Mutex<Vec<StageRecord>>,
}

impl MemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn stages(&self) -> Vec<StageRecord> {
        self.stages.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn total_cost_usd(&self) -> f64 {
        self.calls().iter().map(|c| c.estimated_cost_usd).sum()
    }
}

impl TelemetrySink for MemoryTelemetry {
    fn record_call(&self, record: &CallRecord) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
    }

    fn record_stage(&self, record: &StageRecord) {
        self.stages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn record(cost: f64) -> CallRecord {
        CallRecord {
            stage: Some(CascadeStage::Triage),
            model: "m".into(),
            latency: Duration::from_millis(10),
            input_tokens: 4,
            output_tokens: 1,
            estimated_cost_usd: cost,
            outcome: CallOutcome::Success,
        }
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens("ñandú"), 2);
    }

    #[test]
    fn memory_sink_collects_and_sums() {
        let sink = MemoryTelemetry::new();
        sink.record_call(&record(0.5));
        sink.record_call(&record(0.25));
        sink.record_stage(&StageRecord {
            stage: CascadeStage::Triage,
            elapsed: Duration::from_millis(3),
            degraded: None,
        });
        assert_eq!(sink.calls().len(), 2);
        assert_eq!(sink.stages().len(), 1);
        assert!((sink.total_cost_usd() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn sinks_are_object_safe() {
        let sinks: Vec<Box<dyn TelemetrySink>> = vec![
            Box::new(NoopTelemetry),
            Box::new(LogTelemetry),
            Box::new(MemoryTelemetry::new()),
        ];
        for sink in &sinks {
            sink.record_call(&record(0.0));
        }
    }
}
