//! Streamed answer relay pipeline
//!
//! Decides what part of a growing answer to hand to the speech service, and
//! when.
//!
//! ## Architecture
//!
//! ```text
//! notify ──▶ ChangeTracker ──Changed──▶ DebounceTimer ──fire──▶ DispatchGate ──▶ SpeechTransport
//!                 ▲                                                  │                 │
//!                 │                                                  ▼                 │
//!                 └──────────────────── Stream (watermark / finalized) ◀───outcome─────┘
//! ```
//!
//! `RelayCore` is the synchronous state machine (no clock, no I/O) and
//! `RelaySession` is the single-task event loop that drives it.

pub mod debounce;
pub mod events;
pub mod gate;
pub mod relay;
pub mod session;
pub mod stream;
pub mod tracker;

pub use debounce::DebounceTimer;
pub use events::RelayEvent;
pub use gate::{Dispatch, DispatchGate, GateDecision, SkipReason};
pub use relay::{RelayCore, Settlement, StreamSnapshot, TimerAction};
pub use session::{Notifier, RelaySession, SessionConfig, StatusHandle};
pub use stream::{InFlight, Stream, StreamPhase};
pub use tracker::{ChangeTracker, Observation, TrackerDecision};
