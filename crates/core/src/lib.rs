//! Core types and traits for the speech relay
//!
//! This crate defines the vocabulary shared by every other crate:
//! - Region identity and dispatch policy
//! - Transport outcomes and dispatch tickets
//! - The two external collaborators (`TextSource`, `SpeechTransport`)
//! - The error taxonomy

pub mod error;
pub mod outcome;
pub mod traits;
pub mod types;

pub use error::RelayError;
pub use outcome::{StatusInfo, TransportOutcome};
pub use traits::{SpeechTransport, TextSource};
pub use types::{DispatchPolicy, RegionId, Ticket};
