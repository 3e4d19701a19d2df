//! Per-exchange summary log

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use uuid::Uuid;

use crate::config::StatsFormat;
use crate::proxy::{ExchangeOutcome, ExchangeStats};

/// What happened during one client request
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeSummary {
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub streaming: bool,
    /// Upstream requests issued
    pub rounds: usize,
    pub tools_executed: usize,
    pub tools_failed: usize,
    pub outcome: String,
    pub duration_ms: f64,
}

/// Started when a request arrives; turned into a summary when it ends
#[derive(Debug, Clone)]
pub struct ExchangeTimer {
    request_id: Uuid,
    timestamp: DateTime<Utc>,
    started: Instant,
    model: String,
    streaming: bool,
}

impl ExchangeTimer {
    pub fn start(model: &str, streaming: bool) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            started: Instant::now(),
            model: model.to_string(),
            streaming,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn finish(self, stats: ExchangeStats, outcome: ExchangeOutcome) -> ExchangeSummary {
        ExchangeSummary {
            request_id: self.request_id,
            timestamp: self.timestamp,
            model: self.model,
            streaming: self.streaming,
            rounds: stats.rounds,
            tools_executed: stats.tools_executed,
            tools_failed: stats.tools_failed,
            outcome: outcome.to_string(),
            duration_ms: self.started.elapsed().as_secs_f64() * 1000.0,
        }
    }
}

pub fn format_summary(summary: &ExchangeSummary, format: StatsFormat) -> String {
    match format {
        StatsFormat::Pretty => format_pretty(summary),
        StatsFormat::Json => serde_json::to_string(summary).unwrap_or_else(|_| "{}".to_string()),
        StatsFormat::Compact => format_compact(summary),
    }
}

fn format_pretty(s: &ExchangeSummary) -> String {
    format!(
        r#"┌──────────────────────────────────────────────────────────────────┐
│ Exchange {:56}│
├──────────────────────────────────────────────────────────────────┤
│ Model:    {:55}│
│ Time:     {:55}│
│ Mode:     {:55}│
├──────────────────────────────────────────────────────────────────┤
│ Rounds: {:4} │ Tools ok: {:4} │ Tools failed: {:4}              │
├──────────────────────────────────────────────────────────────────┤
│ Outcome:  {:55}│
│ Duration: {:53.1}ms│
└──────────────────────────────────────────────────────────────────┘
"#,
        s.request_id,
        truncate(&s.model, 55),
        s.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        if s.streaming { "stream" } else { "sync" },
        s.rounds,
        s.tools_executed,
        s.tools_failed,
        s.outcome,
        s.duration_ms,
    )
}

fn format_compact(s: &ExchangeSummary) -> String {
    format!(
        "[{}] id={} model={} {} rounds={} tools={}/{} outcome={} dur={:.1}ms",
        s.timestamp.format("%H:%M:%S"),
        s.request_id,
        s.model,
        if s.streaming { "stream" } else { "sync" },
        s.rounds,
        s.tools_executed,
        s.tools_executed + s.tools_failed,
        s.outcome,
        s.duration_ms,
    )
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
