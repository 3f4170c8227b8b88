use crate::zone::Zone;

/// Why a session returned to idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum EndReason {
    #[strum(serialize = "stopped")]
    UserStop,
    #[strum(serialize = "no zones enabled")]
    EmptyZoneSet,
}

/// Output side of the trainer: highlights, checkmarks, counters and speech.
///
/// The scheduler calls these synchronously from its own timer callbacks; an
/// implementation must not call back into the scheduler.
pub trait CueSink {
    /// A zone was called. `is_primary` is false for the delayed doubles
    /// partner cue, which arrives once per primary call while the session
    /// runs (early, just before the next clear, when the cadence is shorter
    /// than the partner delay).
    fn zone_selected(&mut self, zone: Zone, is_primary: bool);

    /// Drop every highlight and indicator.
    fn zone_cleared(&mut self);

    /// Practice confirmation point for the current zone.
    fn confirmation_cue(&mut self, zone: Zone);

    /// Shot `shot_in_burst` of the current rally, against the configured
    /// (not randomized) burst length.
    fn rally_progress(&mut self, shot_in_burst: u32, configured_shots: u32);

    fn countdown_tick(&mut self, seconds_remaining: u32);

    fn session_ended(&mut self, reason: EndReason);
}

/// One collaborator call, as recorded by [`RecordingCues`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cue {
    Selected { zone: Zone, is_primary: bool },
    Cleared,
    Confirmation(Zone),
    RallyProgress { shot: u32, of: u32 },
    Countdown(u32),
    Ended(EndReason),
}

/// Keeps every cue in call order. Used by headless runs and tests.
#[derive(Debug, Default)]
pub struct RecordingCues {
    pub cues: Vec<Cue>,
}

impl RecordingCues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&mut self) -> Vec<Cue> {
        std::mem::take(&mut self.cues)
    }

    /// Zones called as primaries, in order.
    pub fn primary_zones(&self) -> Vec<Zone> {
        self.cues
            .iter()
            .filter_map(|c| match c {
                Cue::Selected {
                    zone,
                    is_primary: true,
                } => Some(*zone),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Cue) -> bool) -> usize {
        self.cues.iter().filter(|c| pred(c)).count()
    }
}

impl CueSink for RecordingCues {
    fn zone_selected(&mut self, zone: Zone, is_primary: bool) {
        self.cues.push(Cue::Selected { zone, is_primary });
    }

    fn zone_cleared(&mut self) {
        self.cues.push(Cue::Cleared);
    }

    fn confirmation_cue(&mut self, zone: Zone) {
        self.cues.push(Cue::Confirmation(zone));
    }

    fn rally_progress(&mut self, shot_in_burst: u32, configured_shots: u32) {
        self.cues.push(Cue::RallyProgress {
            shot: shot_in_burst,
            of: configured_shots,
        });
    }

    fn countdown_tick(&mut self, seconds_remaining: u32) {
        self.cues.push(Cue::Countdown(seconds_remaining));
    }

    fn session_ended(&mut self, reason: EndReason) {
        self.cues.push(Cue::Ended(reason));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_call_order() {
        let mut rec = RecordingCues::new();
        let z3 = Zone::new(3).unwrap();
        rec.zone_cleared();
        rec.zone_selected(z3, true);
        rec.zone_selected(z3.mirrored(), false);
        rec.session_ended(EndReason::UserStop);

        assert_eq!(rec.primary_zones(), vec![z3]);
        assert_eq!(rec.count(|c| matches!(c, Cue::Selected { .. })), 2);
        let cues = rec.take();
        assert_eq!(cues.len(), 4);
        assert_eq!(cues[3], Cue::Ended(EndReason::UserStop));
        assert!(rec.cues.is_empty());
    }

    #[test]
    fn end_reason_display() {
        assert_eq!(EndReason::UserStop.to_string(), "stopped");
        assert_eq!(EndReason::EmptyZoneSet.to_string(), "no zones enabled");
    }
}
