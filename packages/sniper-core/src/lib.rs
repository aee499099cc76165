//! Server-sniper core -- data model, transition evaluator, token cache, and
//! the small pieces of ambient infrastructure (clock, trace IDs) that the
//! evaluator and formatter depend on.
//!
//! - **Clock** ([`clock`]): wall-clock in a fixed display zone, elapsed
//!   duration formatting.
//! - **Trace** ([`trace`]): per-subscription / per-configuration trace IDs.
//! - **Model** ([`model`]): `Subscription`, `EffectiveStatus`, the fetched
//!   availability shapes, transition records, token entries.
//! - **Store** ([`store`]): in-memory subscription store with copy-on-iterate
//!   snapshotting.
//! - **Token cache** ([`token_cache`]): TTL-bounded token -> order intent map.
//! - **Evaluator** ([`evaluator`]): the per-tick transition algorithm.
//! - **Ports** ([`ports`]): injected-dependency traits (`FetchAvailability`,
//!   `SendNotification`, `LogSink`).

pub mod clock;
pub mod evaluator;
pub mod model;
pub mod ports;
pub mod store;
pub mod token_cache;
pub mod trace;

pub use clock::{format_elapsed, now_shanghai, DISPLAY_TZ};
pub use evaluator::{
    candidates, evaluate, Candidate, EvaluationOutcome, OrderIntent, PriceHint, TransitionEmission,
    VerifierOutcome,
};
pub use model::{
    ConfigDescriptor, ConfigRow, EffectiveStatus, FetchedAvailability, ListedStatus, Subscription,
    SubscriptionSpec, TokenEntry, TransitionRecord,
};
pub use ports::{Button, ButtonGrid, FetchAvailability, LogLevel, LogSink, SendNotification};
pub use store::SubscriptionStore;
pub use token_cache::{TokenCache, TokenLookupError};
pub use trace::TraceId;
