//! Injected-dependency traits (spec.md §6): the three functions the core
//! receives at construction time. Concrete HTTP/logging implementations
//! live in `sniper-monitor`; fakes for tests live alongside their callers.

use async_trait::async_trait;

use crate::model::FetchedAvailability;
use crate::trace::TraceId;

/// Log level, mirroring the `(level, message, category)` shape of spec.md §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Sink for log lines emitted by the engine. Implementations may forward to
/// `tracing`, to an external chat-bot process, or to an in-memory buffer in
/// tests.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str, category: &str, trace_id: Option<TraceId>);
}

/// Fetches current availability for a plan. Returns `None` when the
/// upstream catalog fetcher has nothing (treated as a fetch failure: warn
/// and skip, no state mutation).
#[async_trait]
pub trait FetchAvailability: Send + Sync {
    async fn fetch(&self, plan_code: &str) -> Option<FetchedAvailability>;
}

/// One button in an interactive reply markup.
#[derive(Debug, Clone)]
pub struct Button {
    pub text: String,
    pub callback_data: String,
}

/// A 2-D button grid, at most two buttons per row (spec.md §4.C7).
#[derive(Debug, Clone, Default)]
pub struct ButtonGrid {
    pub rows: Vec<Vec<Button>>,
}

impl ButtonGrid {
    /// Builds rows of at most two buttons each from a flat list.
    #[must_use]
    pub fn from_buttons(buttons: Vec<Button>) -> Self {
        let rows = buttons.chunks(2).map(<[Button]>::to_vec).collect();
        Self { rows }
    }
}

/// Sends a notification, optionally with a button layout. Returns whether
/// delivery succeeded; a transport failure is logged by the caller but
/// never replays the transition.
#[async_trait]
pub trait SendNotification: Send + Sync {
    async fn send(&self, text: &str, markup: Option<&ButtonGrid>) -> bool;
}
