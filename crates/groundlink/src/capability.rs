//! Drone capability enumeration and capability sets.
//!
//! A capability describes a piece of hardware or a performance envelope a
//! drone was built with. The set is declared once at registration and never
//! changes for the lifetime of the session; mode gating and payload commands
//! consult it as a read-only predicate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A hardware or performance capability a drone can be equipped with.
///
/// Each variant maps to one bit so a full set packs into a [`CapabilitySet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum Capability {
    /// Daylight video camera (bitmask: 0x0001)
    Video = 0x0001,
    /// Thermal imaging camera (bitmask: 0x0002)
    Thermal = 0x0002,
    /// Infrared illuminator (bitmask: 0x0004)
    Infrared = 0x0004,
    /// Steerable searchlight (bitmask: 0x0008)
    SearchLight = 0x0008,
    /// Loudspeaker (bitmask: 0x0010)
    Speaker = 0x0010,
    /// Releasable payload bay (bitmask: 0x0020)
    PayloadBay = 0x0020,
    /// Rated for high-altitude operation (bitmask: 0x0040)
    HighAltitude = 0x0040,
    /// Extended-range airframe (bitmask: 0x0080)
    LongRange = 0x0080,
    /// High-speed airframe (bitmask: 0x0100)
    FastSpeed = 0x0100,
    /// Heavy-lift airframe (bitmask: 0x0200)
    HeavyLift = 0x0200,
}

impl Capability {
    /// Every capability, in bit order.
    pub const ALL: [Capability; 10] = [
        Capability::Video,
        Capability::Thermal,
        Capability::Infrared,
        Capability::SearchLight,
        Capability::Speaker,
        Capability::PayloadBay,
        Capability::HighAltitude,
        Capability::LongRange,
        Capability::FastSpeed,
        Capability::HeavyLift,
    ];

    /// The bit this capability occupies in a packed set.
    #[must_use]
    pub fn bit(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Video => "Video",
            Capability::Thermal => "Thermal",
            Capability::Infrared => "Infrared",
            Capability::SearchLight => "SearchLight",
            Capability::Speaker => "Speaker",
            Capability::PayloadBay => "PayloadBay",
            Capability::HighAltitude => "HighAltitude",
            Capability::LongRange => "LongRange",
            Capability::FastSpeed => "FastSpeed",
            Capability::HeavyLift => "HeavyLift",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Capability {
    type Err = String;

    /// Parse a capability name, case-insensitively, with `_`/`-` ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match folded.as_str() {
            "video" => Ok(Capability::Video),
            "thermal" => Ok(Capability::Thermal),
            "infrared" => Ok(Capability::Infrared),
            "searchlight" => Ok(Capability::SearchLight),
            "speaker" => Ok(Capability::Speaker),
            "payloadbay" => Ok(Capability::PayloadBay),
            "highaltitude" => Ok(Capability::HighAltitude),
            "longrange" => Ok(Capability::LongRange),
            "fastspeed" => Ok(Capability::FastSpeed),
            "heavylift" => Ok(Capability::HeavyLift),
            _ => Err(format!("unknown capability {s:?}")),
        }
    }
}

/// An immutable set of [`Capability`] values, packed into one word.
///
/// The set is fixed when a drone is registered. Serialized form is a list of
/// capability names rather than the raw bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "Vec<Capability>", from = "Vec<Capability>")]
pub struct CapabilitySet {
    bits: u16,
}

impl CapabilitySet {
    /// The empty set.
    pub const EMPTY: CapabilitySet = CapabilitySet { bits: 0 };

    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::EMPTY
    }

    /// Return a copy of this set with `capability` added.
    #[must_use]
    pub fn with(self, capability: Capability) -> Self {
        Self {
            bits: self.bits | capability.bit(),
        }
    }

    /// Whether the set contains `capability`.
    #[must_use]
    pub fn contains(&self, capability: Capability) -> bool {
        self.bits & capability.bit() != 0
    }

    /// Number of capabilities in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Iterate the capabilities in the set, in bit order.
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL
            .into_iter()
            .filter(|capability| self.contains(*capability))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, CapabilitySet::with)
    }
}

impl From<CapabilitySet> for Vec<Capability> {
    fn from(set: CapabilitySet) -> Self {
        set.iter().collect()
    }
}

impl From<Vec<Capability>> for CapabilitySet {
    fn from(capabilities: Vec<Capability>) -> Self {
        capabilities.into_iter().collect()
    }
}

impl fmt::Display for CapabilitySet {
    /// Formats as `{Video, Thermal}`, or `{}` for the empty set.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (index, capability) in self.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{capability}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_bits_are_distinct() {
        let mut seen = 0u16;
        for capability in Capability::ALL {
            assert_eq!(seen & capability.bit(), 0, "{capability} overlaps");
            seen |= capability.bit();
        }
    }

    #[test]
    fn test_set_contains_only_inserted() {
        let set: CapabilitySet = [Capability::Video, Capability::HeavyLift]
            .into_iter()
            .collect();

        assert!(set.contains(Capability::Video));
        assert!(set.contains(Capability::HeavyLift));
        assert!(!set.contains(Capability::Thermal));
        assert!(!set.contains(Capability::PayloadBay));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_empty_set() {
        let set = CapabilitySet::EMPTY;
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
        for capability in Capability::ALL {
            assert!(!set.contains(capability));
        }
    }

    #[test]
    fn test_with_is_idempotent() {
        let set = CapabilitySet::new()
            .with(Capability::Speaker)
            .with(Capability::Speaker);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_iter_returns_bit_order() {
        let set: CapabilitySet = [
            Capability::HeavyLift,
            Capability::Video,
            Capability::Speaker,
        ]
        .into_iter()
        .collect();

        let listed: Vec<Capability> = set.iter().collect();
        assert_eq!(
            listed,
            vec![
                Capability::Video,
                Capability::Speaker,
                Capability::HeavyLift
            ]
        );
    }

    #[test]
    fn test_from_str_accepts_loose_spelling() {
        assert_eq!(
            "search-light".parse::<Capability>().unwrap(),
            Capability::SearchLight
        );
        assert_eq!(
            "PAYLOAD_BAY".parse::<Capability>().unwrap(),
            Capability::PayloadBay
        );
        assert_eq!("video".parse::<Capability>().unwrap(), Capability::Video);
    }

    #[test]
    fn test_from_str_rejects_unknown() {
        assert!("warp-drive".parse::<Capability>().is_err());
    }

    #[test]
    fn test_display() {
        let set: CapabilitySet = [Capability::Video, Capability::Thermal]
            .into_iter()
            .collect();
        assert_eq!(set.to_string(), "{Video, Thermal}");
        assert_eq!(CapabilitySet::EMPTY.to_string(), "{}");
    }

    #[test]
    fn test_serde_round_trip_as_names() {
        let set: CapabilitySet = [Capability::Infrared, Capability::LongRange]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["Infrared","LongRange"]"#);

        let back: CapabilitySet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
