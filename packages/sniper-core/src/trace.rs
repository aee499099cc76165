//! Trace IDs threaded explicitly through evaluator and formatter calls.
//!
//! The reference implementation carried a thread-local trace id set on
//! worker entry and cleared on exit; that pattern doesn't survive a
//! cooperatively-scheduled runtime where one OS thread interleaves many
//! tasks, so trace ids are explicit values here instead -- minted per
//! subscription per tick and per configuration per tick, then passed down
//! and attached to a `tracing::Span` for the scope of one evaluation.

use std::fmt;

use uuid::Uuid;

/// Correlation id minted per subscription (or per configuration) per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(Uuid);

impl TraceId {
    /// Mints a fresh trace id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_ids_are_unique() {
        assert_ne!(TraceId::new(), TraceId::new());
    }

    #[test]
    fn display_is_uuid_text() {
        let id = TraceId::new();
        assert_eq!(id.to_string().len(), 36);
    }
}
