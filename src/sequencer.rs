use crate::error::EmptyZoneSetError;
use crate::zone::{CourtLayout, Zone, ZoneSet};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How the next zone is picked.
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
pub enum SequenceMode {
    #[default]
    Random,
    Sequential,
    Custom,
}

/// Sequencing settings for one operating mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceConfig {
    pub mode: SequenceMode,
    #[serde(default)]
    pub custom_order: Vec<Zone>,
}

impl SequenceConfig {
    pub fn new(mode: SequenceMode) -> Self {
        Self {
            mode,
            custom_order: Vec::new(),
        }
    }

    pub fn custom(order: Vec<Zone>) -> Self {
        Self {
            mode: SequenceMode::Custom,
            custom_order: order,
        }
    }
}

/// Position state for ordered selection. Sequential and custom orders keep
/// independent indices; `None` means "before the first step".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequencerCursor {
    pub last_zone: Option<Zone>,
    pub sequential_index: Option<usize>,
    pub custom_index: Option<usize>,
}

impl SequencerCursor {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Enabled zones a single selection may draw from.
pub struct SelectionPool<'a> {
    pub zones: &'a ZoneSet,
    pub layout: CourtLayout,
    /// Enabled primary zones, ascending.
    pub enabled: Vec<Zone>,
}

impl<'a> SelectionPool<'a> {
    pub fn new(zones: &'a ZoneSet, layout: CourtLayout) -> Self {
        Self {
            zones,
            layout,
            enabled: zones.enabled_primary(layout),
        }
    }
}

/// Strategy for choosing the next zone from a non-empty pool.
pub trait ZoneSelector {
    fn select<R: Rng + ?Sized>(
        &self,
        pool: &SelectionPool<'_>,
        cursor: &mut SequencerCursor,
        rng: &mut R,
    ) -> Zone;
}

/// Uniform pick that avoids repeating the previous zone when it can.
pub struct RandomSelector;

impl ZoneSelector for RandomSelector {
    fn select<R: Rng + ?Sized>(
        &self,
        pool: &SelectionPool<'_>,
        cursor: &mut SequencerCursor,
        rng: &mut R,
    ) -> Zone {
        let fresh: Vec<Zone> = pool
            .enabled
            .iter()
            .copied()
            .filter(|z| Some(*z) != cursor.last_zone)
            .collect();
        let candidates = if fresh.is_empty() {
            &pool.enabled
        } else {
            &fresh
        };
        // The pool is non-empty, so there is always a candidate.
        *candidates.choose(rng).unwrap_or(&pool.enabled[0])
    }
}

/// Ascending cycle over the enabled zones.
pub struct SequentialSelector;

impl ZoneSelector for SequentialSelector {
    fn select<R: Rng + ?Sized>(
        &self,
        pool: &SelectionPool<'_>,
        cursor: &mut SequencerCursor,
        _rng: &mut R,
    ) -> Zone {
        let idx = advance(&mut cursor.sequential_index, pool.enabled.len());
        pool.enabled[idx]
    }
}

/// Cycle over a configured order, skipping disabled zones. Falls back to
/// [`RandomSelector`] when nothing in the order is enabled.
pub struct CustomSelector<'a> {
    pub order: &'a [Zone],
}

impl ZoneSelector for CustomSelector<'_> {
    fn select<R: Rng + ?Sized>(
        &self,
        pool: &SelectionPool<'_>,
        cursor: &mut SequencerCursor,
        rng: &mut R,
    ) -> Zone {
        let playable: Vec<Zone> = self
            .order
            .iter()
            .copied()
            .filter(|z| pool.layout.contains(*z) && pool.zones.is_enabled(*z))
            .collect();

        if playable.is_empty() {
            return RandomSelector.select(pool, cursor, rng);
        }

        let idx = advance(&mut cursor.custom_index, playable.len());
        playable[idx]
    }
}

fn advance(index: &mut Option<usize>, len: usize) -> usize {
    let next = match *index {
        Some(i) if i + 1 < len => i + 1,
        _ => 0,
    };
    *index = Some(next);
    next
}

/// Picks the next zone for `config`, recording it as the cursor's last zone.
///
/// Fails when no primary zone is enabled; a running session treats that as
/// terminal rather than retrying.
pub fn next_zone<R: Rng + ?Sized>(
    zones: &ZoneSet,
    layout: CourtLayout,
    cursor: &mut SequencerCursor,
    config: &SequenceConfig,
    rng: &mut R,
) -> Result<Zone, EmptyZoneSetError> {
    let pool = SelectionPool::new(zones, layout);
    if pool.enabled.is_empty() {
        return Err(EmptyZoneSetError);
    }

    let zone = match config.mode {
        SequenceMode::Random => RandomSelector.select(&pool, cursor, rng),
        SequenceMode::Sequential => SequentialSelector.select(&pool, cursor, rng),
        SequenceMode::Custom => CustomSelector {
            order: &config.custom_order,
        }
        .select(&pool, cursor, rng),
    };

    cursor.last_zone = Some(zone);
    Ok(zone)
}
