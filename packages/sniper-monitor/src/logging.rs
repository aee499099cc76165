//! `tracing`-backed [`LogSink`] (spec.md §6). Grounded on the teacher's
//! `service/middleware/metrics.rs` use of `tracing`'s leveled macros with
//! structured fields rather than formatted strings.

use sniper_core::{LogLevel, LogSink, TraceId};

/// Forwards every log line to `tracing`, attaching `trace_id` and
/// `category` as structured fields instead of folding them into the
/// message text.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, level: LogLevel, message: &str, category: &str, trace_id: Option<TraceId>) {
        let trace_id = trace_id.map(|id| id.to_string()).unwrap_or_default();
        match level {
            LogLevel::Debug => tracing::debug!(category, trace_id = %trace_id, "{message}"),
            LogLevel::Info => tracing::info!(category, trace_id = %trace_id, "{message}"),
            LogLevel::Warning => tracing::warn!(category, trace_id = %trace_id, "{message}"),
            LogLevel::Error => tracing::error!(category, trace_id = %trace_id, "{message}"),
        }
    }
}
