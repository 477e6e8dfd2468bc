//! Quality flags attached to normalized measurements.
//!
//! Flags form a small closed set stored as a bitset. They are additive
//! annotations: no flag ever causes a stored value to be corrected.

use std::fmt;
use std::str::FromStr;

use serde::de::Deserializer;
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

/// A single anomaly or context tag.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    /// No earlier measurement exists for the stream.
    FirstReading = 0b0001,
    /// The value dropped below its predecessor; the delta is unknown.
    CounterReset = 0b0010,
    /// The reading arrived after a later-timestamped reading of the same stream.
    OutOfOrder = 0b0100,
    /// The delta exceeds the configured jump threshold.
    SuspiciousJump = 0b1000,
}

impl QualityFlag {
    /// All flags, in display order.
    pub const ALL: [QualityFlag; 4] = [
        Self::FirstReading,
        Self::CounterReset,
        Self::OutOfOrder,
        Self::SuspiciousJump,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstReading => "first_reading",
            Self::CounterReset => "counter_reset",
            Self::OutOfOrder => "out_of_order",
            Self::SuspiciousJump => "suspicious_jump",
        }
    }

    fn bit(self) -> u8 {
        self as u8
    }
}

impl FromStr for QualityFlag {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|f| f.as_str() == s).ok_or(())
    }
}

impl fmt::Display for QualityFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unordered, de-duplicated set of [`QualityFlag`]s.
///
/// Serializes as a JSON array of flag names in [`QualityFlag::ALL`] order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct QualityFlags(u8);

impl QualityFlags {
    /// Bits that correspond to a known flag.
    const MASK: u8 = 0b1111;

    pub const fn empty() -> Self {
        Self(0)
    }

    /// Rebuild a set from its stored bit representation.
    ///
    /// Returns `None` when unknown bits are set.
    pub fn from_bits(bits: u8) -> Option<Self> {
        (bits & !Self::MASK == 0).then_some(Self(bits))
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn insert(&mut self, flag: QualityFlag) {
        self.0 |= flag.bit();
    }

    pub fn remove(&mut self, flag: QualityFlag) {
        self.0 &= !flag.bit();
    }

    pub fn contains(self, flag: QualityFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Builder-style insert.
    pub fn with(mut self, flag: QualityFlag) -> Self {
        self.insert(flag);
        self
    }

    pub fn iter(self) -> impl Iterator<Item = QualityFlag> {
        QualityFlag::ALL.into_iter().filter(move |f| self.contains(*f))
    }
}

impl From<QualityFlag> for QualityFlags {
    fn from(flag: QualityFlag) -> Self {
        Self::empty().with(flag)
    }
}

impl FromIterator<QualityFlag> for QualityFlags {
    fn from_iter<I: IntoIterator<Item = QualityFlag>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), QualityFlags::with)
    }
}

impl fmt::Display for QualityFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(QualityFlag::as_str).collect();
        write!(f, "[{}]", names.join(","))
    }
}

impl Serialize for QualityFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for flag in self.iter() {
            seq.serialize_element(&flag)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for QualityFlags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let flags = Vec::<QualityFlag>::deserialize(deserializer)?;
        Ok(flags.into_iter().collect())
    }
}
