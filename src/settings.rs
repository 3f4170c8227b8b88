use crate::error::ConfigError;
use crate::sequencer::SequenceConfig;
use crate::zone::{CourtLayout, Zone, ZoneSet};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing knobs for both operating modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Practice cadence between zone calls.
    pub pause_time_ms: u64,
    /// Nominal burst length; each rally varies it by up to 30%.
    pub shots_per_rally: u32,
    /// Countdown between rallies.
    pub rally_pause_sec: u32,
    /// Cadence between shots inside a burst.
    pub rally_speed_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            pause_time_ms: 2500,
            shots_per_rally: 15,
            rally_pause_sec: 10,
            rally_speed_ms: 600,
        }
    }
}

/// Upper limits for each setting. Anything beyond these is a typo.
pub const MAX_PAUSE_TIME_MS: u64 = 60 * 60 * 1000;
pub const MAX_SHOTS_PER_RALLY: u32 = 1000;
pub const MAX_RALLY_PAUSE_SEC: u32 = 60 * 60;
pub const MAX_RALLY_SPEED_MS: u64 = 60 * 1000;

impl SessionSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("pause_time_ms", self.pause_time_ms, MAX_PAUSE_TIME_MS),
            (
                "shots_per_rally",
                u64::from(self.shots_per_rally),
                u64::from(MAX_SHOTS_PER_RALLY),
            ),
            (
                "rally_pause_sec",
                u64::from(self.rally_pause_sec),
                u64::from(MAX_RALLY_PAUSE_SEC),
            ),
            ("rally_speed_ms", self.rally_speed_ms, MAX_RALLY_SPEED_MS),
        ];
        for (field, value, max) in checks {
            if value == 0 {
                return Err(ConfigError::NonPositive { field });
            }
            if value > max {
                return Err(ConfigError::TooLarge { field, max });
            }
        }
        Ok(())
    }

    pub fn pause_time(&self) -> Duration {
        Duration::from_millis(self.pause_time_ms)
    }

    pub fn rally_speed(&self) -> Duration {
        Duration::from_millis(self.rally_speed_ms)
    }

    /// Delay from a practice highlight to its confirmation cue.
    pub fn confirmation_delay(&self) -> Duration {
        let ms = self.pause_time_ms;
        Duration::from_millis(ms / 5 * 4 + ms % 5 * 4 / 5)
    }
}

/// Converts the seconds value users type into whole milliseconds.
pub fn secs_to_ms(secs: f64) -> Result<u64, ConfigError> {
    let ms = (secs * 1000.0).round();
    if !ms.is_finite() || ms < 1.0 {
        return Err(ConfigError::NonPositive {
            field: "pause_time_ms",
        });
    }
    Ok(ms as u64)
}

/// Parses a comma separated custom order such as `"1, 3, 2"`.
///
/// Numbers outside the layout's range are dropped; anything that is not a
/// number is rejected.
pub fn parse_custom_sequence(text: &str, layout: CourtLayout) -> Result<Vec<Zone>, ConfigError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let mut order = Vec::new();
    for token in text.split(',').map(str::trim) {
        let n: i64 = token
            .parse()
            .map_err(|_| ConfigError::MalformedSequence {
                token: token.to_string(),
            })?;
        if let Some(zone) = u8::try_from(n).ok().and_then(Zone::new) {
            if layout.contains(zone) {
                order.push(zone);
            }
        }
    }
    Ok(order)
}

/// Everything the scheduler needs before a session can start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainerConfig {
    #[serde(default)]
    pub layout: CourtLayout,
    #[serde(default)]
    pub zones: ZoneSet,
    #[serde(default)]
    pub settings: SessionSettings,
    #[serde(default)]
    pub practice: SequenceConfig,
    #[serde(default)]
    pub rally: SequenceConfig,
}

impl TrainerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.settings.validate()?;
        for seq in [&self.practice, &self.rally] {
            if let Some(zone) = seq.custom_order.iter().find(|z| !self.layout.contains(**z)) {
                return Err(ConfigError::ZoneOutOfRange {
                    zone: zone.number(),
                    layout: self.layout,
                });
            }
        }
        Ok(())
    }

    /// Switches layout, dropping custom entries the new court does not have.
    pub fn with_layout(mut self, layout: CourtLayout) -> Self {
        self.layout = layout;
        for seq in [&mut self.practice, &mut self.rally] {
            seq.custom_order.retain(|z| layout.contains(*z));
        }
        self
    }
}
