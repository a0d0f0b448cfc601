//! Identity and policy types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::RelayError;

/// Opaque identity of the region rendering the latest answer.
///
/// Identity is assigned by the text source from a stable handle, never
/// recomputed from content. Two regions with identical text are still
/// different regions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(String);

impl RegionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RegionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// How newly observed text is turned into payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DispatchPolicy {
    /// Send each new suffix after the confirmed watermark, retrying on failure
    #[default]
    Incremental,
    /// Send the whole stable text exactly once per region, never retrying
    FinalizeOnce,
}

impl DispatchPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchPolicy::Incremental => "incremental",
            DispatchPolicy::FinalizeOnce => "finalize-once",
        }
    }
}

impl fmt::Display for DispatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DispatchPolicy {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "incremental" => Ok(DispatchPolicy::Incremental),
            "finalize-once" | "finalize_once" | "finalizeonce" => Ok(DispatchPolicy::FinalizeOnce),
            other => Err(RelayError::Config(format!(
                "unknown dispatch policy '{}', expected 'incremental' or 'finalize-once'",
                other
            ))),
        }
    }
}

/// Identifies a single dispatch.
///
/// `epoch` names the stream the dispatch belongs to and changes on every
/// reset, so an outcome arriving after a new region appeared can be told
/// apart from one for the current stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ticket {
    pub epoch: u64,
    pub seq: u64,
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.epoch, self.seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "incremental".parse::<DispatchPolicy>().unwrap(),
            DispatchPolicy::Incremental
        );
        assert_eq!(
            "Finalize-Once".parse::<DispatchPolicy>().unwrap(),
            DispatchPolicy::FinalizeOnce
        );
        assert!("sometimes".parse::<DispatchPolicy>().is_err());
    }

    #[test]
    fn test_policy_serde_names() {
        let json = serde_json::to_string(&DispatchPolicy::FinalizeOnce).unwrap();
        assert_eq!(json, "\"finalize-once\"");

        let policy: DispatchPolicy = serde_json::from_str("\"incremental\"").unwrap();
        assert_eq!(policy, DispatchPolicy::Incremental);
    }

    #[test]
    fn test_region_identity_is_not_content() {
        let a = RegionId::new("turn-1");
        let b = RegionId::new("turn-2");
        assert_ne!(a, b);
        assert_eq!(a, RegionId::from("turn-1"));
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"turn-1\"");
    }
}
