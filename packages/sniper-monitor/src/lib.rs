//! Server-sniper monitor -- the HTTP-backed collaborators and the scheduler
//! that wires them to `sniper_core`'s evaluator.
//!
//! - **Config** ([`config`]): tunables for one running engine instance.
//! - **Errors** ([`errors`]): leaf error types for the two HTTP calls.
//! - **Verifier** ([`verifier`]): price-verification client (spec.md §4.C4).
//! - **Dispatcher** ([`dispatcher`]): auto-order client (spec.md §4.C8).
//! - **Notifier** ([`notifier`]): notification formatter (spec.md §4.C7).
//! - **Scheduler** ([`scheduler`]): the per-tick fan-out loop (spec.md §4.C9).
//! - **Logging** ([`logging`]): `tracing`-backed [`sniper_core::LogSink`].
//! - **Fetch** ([`fetch`]): stub/fixture [`sniper_core::FetchAvailability`]
//!   implementations for the demonstration binary.

pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod fetch;
pub mod logging;
pub mod notifier;
pub mod scheduler;
pub mod verifier;

pub use config::EngineConfig;
pub use dispatcher::{dispatch_all, OrderDispatcher, ReqwestOrderDispatcher};
pub use errors::{DispatchError, VerifierError};
pub use fetch::{FileFetchAvailability, NullFetchAvailability};
pub use logging::TracingLogSink;
pub use notifier::{notify_tick, NotificationText};
pub use scheduler::Scheduler;
pub use verifier::{PriceVerifier, ReqwestPriceVerifier};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {}
}
