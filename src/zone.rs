use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Highest zone number on one half of the court.
pub const ZONES_PER_SIDE: u8 = 6;

/// Offset between a primary zone and its partner zone in doubles.
pub const MIRROR_OFFSET: u8 = ZONES_PER_SIDE;

/// A numbered target region on the court.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Zone(u8);

impl Zone {
    /// Returns `None` unless `n` is a zone on either layout (1..=12).
    pub fn new(n: u8) -> Option<Self> {
        (1..=ZONES_PER_SIDE * 2).contains(&n).then_some(Self(n))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// True for the partner-side zones 7..=12.
    pub fn is_partner(self) -> bool {
        self.0 > ZONES_PER_SIDE
    }

    /// Partner zone paired with this one: 1..=6 maps to 7..=12 and back.
    pub fn mirrored(self) -> Zone {
        if self.is_partner() {
            Zone(self.0 - MIRROR_OFFSET)
        } else {
            Zone(self.0 + MIRROR_OFFSET)
        }
    }

    /// Text handed to speech output when the zone is called.
    pub fn spoken(self) -> String {
        if self.is_partner() {
            format!("partner {}", self.0)
        } else {
            self.0.to_string()
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for Zone {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Zone::new(n).ok_or_else(|| format!("zone {n} is outside 1..=12"))
    }
}

impl From<Zone> for u8 {
    fn from(z: Zone) -> Self {
        z.0
    }
}

/// Singles uses one half of the court, doubles adds the mirrored partner half.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CourtLayout {
    #[default]
    Singles,
    Doubles,
}

impl CourtLayout {
    /// Highest zone number that may appear in a custom order for this layout.
    pub fn max_zone(self) -> u8 {
        match self {
            CourtLayout::Singles => ZONES_PER_SIDE,
            CourtLayout::Doubles => ZONES_PER_SIDE * 2,
        }
    }

    pub fn contains(self, zone: Zone) -> bool {
        zone.number() <= self.max_zone()
    }

    /// Every zone drawn on the court for this layout, ascending.
    pub fn zones(self) -> impl Iterator<Item = Zone> {
        (1..=self.max_zone()).map(Zone)
    }

    /// Zones the random and sequential pools draw from. Doubles still picks
    /// on the primary half and derives the partner zone by mirroring.
    pub fn primary_zones(self) -> impl Iterator<Item = Zone> {
        (1..=ZONES_PER_SIDE).map(Zone)
    }

    pub fn toggled(self) -> Self {
        match self {
            CourtLayout::Singles => CourtLayout::Doubles,
            CourtLayout::Doubles => CourtLayout::Singles,
        }
    }
}

/// Enabled/disabled flag for each of the twelve zones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneSet {
    enabled: BTreeMap<Zone, bool>,
}

impl Default for ZoneSet {
    fn default() -> Self {
        Self::all_enabled()
    }
}

impl ZoneSet {
    pub fn all_enabled() -> Self {
        Self {
            enabled: CourtLayout::Doubles.zones().map(|z| (z, true)).collect(),
        }
    }

    pub fn none_enabled() -> Self {
        Self {
            enabled: CourtLayout::Doubles.zones().map(|z| (z, false)).collect(),
        }
    }

    /// Only the listed zones enabled.
    pub fn only<I: IntoIterator<Item = Zone>>(zones: I) -> Self {
        let mut set = Self::none_enabled();
        for z in zones {
            set.set(z, true);
        }
        set
    }

    pub fn is_enabled(&self, zone: Zone) -> bool {
        self.enabled.get(&zone).copied().unwrap_or(false)
    }

    pub fn set(&mut self, zone: Zone, enabled: bool) {
        self.enabled.insert(zone, enabled);
    }

    pub fn toggle(&mut self, zone: Zone) -> bool {
        let now = !self.is_enabled(zone);
        self.set(zone, now);
        now
    }

    /// Enabled zones among the layout's primary pool, ascending.
    pub fn enabled_primary(&self, layout: CourtLayout) -> Vec<Zone> {
        layout
            .primary_zones()
            .filter(|z| self.is_enabled(*z))
            .collect()
    }
}
