//! Deterministic event identity digests.
//!
//! The identity of a reading is the SHA-256 digest of the ordered tuple
//! `(device_id, canonical UTC timestamp, metric_type, value as received)`.
//! Arrival time, unit, building and any extra payload fields do not take
//! part, so a retransmitted reading always maps to the same identity.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::Error;

/// 32-byte SHA-256 identity of a reading.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventIdentity([u8; 32]);

impl EventIdentity {
    /// Length of the hex representation.
    pub const HEX_LEN: usize = 64;

    /// Derive the identity of a reading.
    ///
    /// Each field is length-prefixed before hashing so that separators
    /// inside identifiers cannot make two distinct tuples collide.
    pub fn derive(
        device_id: &str,
        timestamp: &DateTime<Utc>,
        metric_type: &str,
        value: f64,
    ) -> Self {
        let timestamp = timestamp.to_rfc3339_opts(SecondsFormat::Micros, true);
        let value = value.to_string();

        let mut hasher = Sha256::new();
        for field in [device_id, timestamp.as_str(), metric_type, value.as_str()] {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field.as_bytes());
        }
        Self(hasher.finalize().into())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for EventIdentity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)
            .map_err(|e| Error::validation("event_id", format!("not valid hex: {e}")))?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            Error::validation("event_id", format!("expected 32 bytes, got {}", b.len()))
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for EventIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for EventIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventIdentity({})", self.to_hex())
    }
}

impl Serialize for EventIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for EventIdentity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
