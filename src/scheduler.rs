//! Session lifecycle: practice cadence, rally bursts and the countdown
//! between them.
//!
//! ```text
//!            start(Practice)                 start(Rally)
//!   Idle ───────────────────► Practice      Idle ─────────► Rally
//!    ▲                           │                 ┌─────────────────────┐
//!    │        stop / empty set   │                 │ ShotBurst ──N shots─► InterRallyCountdown
//!    └───────────────────────────┘                 │     ▲                        │
//!                                                  │     └──────── 0 s ───────────┘
//!                                                  └─── stop / empty set ───► Idle
//! ```
//!
//! Every timer the session arms is held in [`SessionRunState`] and cancelled
//! inside [`Scheduler::stop`] before it returns; each callback additionally
//! checks that it belongs to the session that is still running.

use crate::cues::{CueSink, EndReason};
use crate::error::ConfigError;
use crate::sequencer::{next_zone, SequencerCursor};
use crate::settings::TrainerConfig;
use crate::timer::{TimerId, TimerQueue};
use crate::zone::{CourtLayout, Zone};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Delay between a doubles primary cue and its partner cue.
pub const MIRROR_DELAY: Duration = Duration::from_millis(200);

/// Step between countdown announcements.
pub const COUNTDOWN_STEP: Duration = Duration::from_secs(1);

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
pub enum Mode {
    #[default]
    Practice,
    Rally,
}

impl Mode {
    pub fn toggled(self) -> Self {
        match self {
            Mode::Practice => Mode::Rally,
            Mode::Rally => Mode::Practice,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RallyPhase {
    ShotBurst,
    InterRallyCountdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    PracticeRunning,
    RallyRunning(RallyPhase),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub rally_count: u32,
    pub shot_count: u32,
}

/// Burst length for one rally: `shots_per_rally` varied by up to 30% either
/// way, inclusive.
pub fn rally_length<R: Rng + ?Sized>(shots_per_rally: u32, rng: &mut R) -> u32 {
    let variation = shots_per_rally / 10 * 3 + shots_per_rally % 10 * 3 / 10;
    (shots_per_rally - variation).saturating_add(rng.gen_range(0..=variation * 2))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerAction {
    PracticeCycle,
    Confirmation(Zone),
    Mirror(Zone),
    Shot,
    CountdownTick,
}

#[derive(Debug, Clone, Copy)]
struct TimerEvent {
    session: u64,
    action: TimerAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Practice,
    Burst { length: u32, fired: u32 },
    Countdown { remaining: u32 },
}

#[derive(Debug)]
struct SessionRunState {
    id: u64,
    mode: Mode,
    phase: Phase,
    stats: SessionStats,
    /// Practice interval, next shot, or next countdown tick.
    cadence: Option<TimerId>,
    confirmation: Option<TimerId>,
    /// Pending doubles partner cue and the zone it will call.
    mirror: Option<(TimerId, Zone)>,
}

/// Drives one trainer session at a time against a [`CueSink`].
pub struct Scheduler<C, R = StdRng> {
    config: TrainerConfig,
    cursor: SequencerCursor,
    timers: TimerQueue<TimerEvent>,
    run: Option<SessionRunState>,
    sessions_started: u64,
    sink: C,
    rng: R,
}

impl<C: CueSink> Scheduler<C, StdRng> {
    pub fn new(sink: C) -> Self {
        Self::with_rng(sink, StdRng::from_entropy())
    }
}

impl<C: CueSink, R: Rng> Scheduler<C, R> {
    pub fn with_rng(sink: C, rng: R) -> Self {
        Self {
            config: TrainerConfig::default(),
            cursor: SequencerCursor::default(),
            timers: TimerQueue::new(),
            run: None,
            sessions_started: 0,
            sink,
            rng,
        }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn sink(&self) -> &C {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut C {
        &mut self.sink
    }

    /// Replaces the whole configuration. Only allowed while idle.
    pub fn configure(&mut self, config: TrainerConfig) -> Result<(), ConfigError> {
        if self.is_running() {
            return Err(ConfigError::SessionRunning);
        }
        config.validate()?;
        debug!(layout = %config.layout, "configured");
        self.config = config;
        Ok(())
    }

    pub fn set_zone_enabled(&mut self, zone: Zone, enabled: bool) -> Result<(), ConfigError> {
        self.check_zone_edit(zone)?;
        self.config.zones.set(zone, enabled);
        Ok(())
    }

    /// Flips a zone and returns its new state.
    pub fn toggle_zone(&mut self, zone: Zone) -> Result<bool, ConfigError> {
        self.check_zone_edit(zone)?;
        Ok(self.config.zones.toggle(zone))
    }

    fn check_zone_edit(&self, zone: Zone) -> Result<(), ConfigError> {
        if self.is_running() {
            return Err(ConfigError::SessionRunning);
        }
        if !self.config.layout.contains(zone) {
            return Err(ConfigError::ZoneOutOfRange {
                zone: zone.number(),
                layout: self.config.layout,
            });
        }
        Ok(())
    }

    /// Changes court layout, stopping any running session first.
    pub fn set_layout(&mut self, layout: CourtLayout) {
        self.stop();
        self.config = std::mem::take(&mut self.config).with_layout(layout);
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    pub fn mode(&self) -> Option<Mode> {
        self.run.as_ref().map(|r| r.mode)
    }

    pub fn state(&self) -> SchedulerState {
        match self.run.as_ref().map(|r| r.phase) {
            None => SchedulerState::Idle,
            Some(Phase::Practice) => SchedulerState::PracticeRunning,
            Some(Phase::Burst { .. }) => SchedulerState::RallyRunning(RallyPhase::ShotBurst),
            Some(Phase::Countdown { .. }) => {
                SchedulerState::RallyRunning(RallyPhase::InterRallyCountdown)
            }
        }
    }

    /// Counters of the running session; zero while idle.
    pub fn stats(&self) -> SessionStats {
        self.run.as_ref().map(|r| r.stats).unwrap_or_default()
    }

    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn start(&mut self, mode: Mode) -> Result<(), ConfigError> {
        if self.is_running() {
            return Err(ConfigError::SessionRunning);
        }
        self.config.validate()?;

        self.cursor.reset();
        self.sessions_started += 1;
        let initial_phase = match mode {
            Mode::Practice => Phase::Practice,
            Mode::Rally => Phase::Burst {
                length: 0,
                fired: 0,
            },
        };
        self.run = Some(SessionRunState {
            id: self.sessions_started,
            mode,
            phase: initial_phase,
            stats: SessionStats::default(),
            cadence: None,
            confirmation: None,
            mirror: None,
        });
        info!(
            %mode,
            layout = %self.config.layout,
            session = self.sessions_started,
            "session started"
        );

        match mode {
            Mode::Practice => {
                let cadence = self.timers.schedule_interval(
                    self.config.settings.pause_time(),
                    self.event(TimerAction::PracticeCycle),
                );
                if let Some(run) = self.run.as_mut() {
                    run.cadence = Some(cadence);
                }
                self.practice_cycle();
            }
            Mode::Rally => self.begin_rally(),
        }
        Ok(())
    }

    /// Ends the running session and returns its final counters. Does
    /// nothing when idle.
    pub fn stop(&mut self) -> Option<SessionStats> {
        self.end(EndReason::UserStop)
    }

    fn end(&mut self, reason: EndReason) -> Option<SessionStats> {
        let run = self.run.take()?;
        let mirror = run.mirror.map(|(id, _)| id);
        for id in [run.cadence, run.confirmation, mirror].into_iter().flatten() {
            self.timers.cancel(id);
        }
        debug_assert!(self.timers.is_empty(), "session left timers behind");
        self.cursor.reset();

        self.sink.zone_cleared();
        self.sink.session_ended(reason);
        info!(
            session = run.id,
            %reason,
            rallies = run.stats.rally_count,
            shots = run.stats.shot_count,
            "session ended"
        );
        Some(run.stats)
    }

    /// Delivers every timer due up to `now`, in order.
    pub fn advance_to(&mut self, now: Duration) {
        while let Some((_, event)) = self.timers.pop_due(now) {
            self.dispatch(event);
        }
        self.timers.set_now(now);
    }

    pub fn advance_by(&mut self, delta: Duration) {
        self.advance_to(self.timers.now() + delta);
    }

    fn event(&self, action: TimerAction) -> TimerEvent {
        TimerEvent {
            session: self.sessions_started,
            action,
        }
    }

    fn dispatch(&mut self, event: TimerEvent) {
        let Some(run) = self.run.as_mut() else {
            return;
        };
        if run.id != event.session {
            debug!(session = event.session, "dropping stale timer");
            return;
        }
        debug!(action = ?event.action, at = ?self.timers.now(), "timer fired");

        match event.action {
            TimerAction::PracticeCycle => self.practice_cycle(),
            TimerAction::Confirmation(zone) => {
                run.confirmation = None;
                self.sink.confirmation_cue(zone);
            }
            TimerAction::Mirror(zone) => {
                run.mirror = None;
                self.sink.zone_selected(zone, false);
            }
            TimerAction::Shot => {
                run.cadence = None;
                self.fire_shot();
            }
            TimerAction::CountdownTick => {
                run.cadence = None;
                self.countdown_tick();
            }
        }
    }

    fn practice_cycle(&mut self) {
        self.clear_cues();
        let Some(zone) = self.select() else {
            return;
        };
        self.announce(zone);

        let confirmation = self.timers.schedule_once(
            self.config.settings.confirmation_delay(),
            self.event(TimerAction::Confirmation(zone)),
        );
        if let Some(run) = self.run.as_mut() {
            run.confirmation = Some(confirmation);
        }
    }

    fn begin_rally(&mut self) {
        let length = rally_length(self.config.settings.shots_per_rally, &mut self.rng);
        debug!(length, "rally burst");
        if let Some(run) = self.run.as_mut() {
            run.phase = Phase::Burst { length, fired: 0 };
        }
        self.fire_shot();
    }

    fn fire_shot(&mut self) {
        let Some(Phase::Burst { length, fired }) = self.run.as_ref().map(|r| r.phase) else {
            return;
        };

        self.clear_cues();
        if fired >= length {
            if let Some(run) = self.run.as_mut() {
                run.stats.rally_count += 1;
            }
            self.begin_countdown();
            return;
        }

        let Some(zone) = self.select() else {
            return;
        };
        self.announce(zone);

        let configured = self.config.settings.shots_per_rally;
        let next = self
            .timers
            .schedule_once(self.config.settings.rally_speed(), self.event(TimerAction::Shot));
        if let Some(run) = self.run.as_mut() {
            run.stats.shot_count += 1;
            run.phase = Phase::Burst {
                length,
                fired: fired + 1,
            };
            run.cadence = Some(next);
        }
        self.sink.rally_progress(fired + 1, configured);
    }

    fn begin_countdown(&mut self) {
        if let Some(run) = self.run.as_mut() {
            run.phase = Phase::Countdown {
                remaining: self.config.settings.rally_pause_sec,
            };
        }
        self.countdown_tick();
    }

    fn countdown_tick(&mut self) {
        let Some(Phase::Countdown { remaining }) = self.run.as_ref().map(|r| r.phase) else {
            return;
        };
        if remaining == 0 {
            self.begin_rally();
            return;
        }

        self.sink.countdown_tick(remaining);
        let next = self
            .timers
            .schedule_once(COUNTDOWN_STEP, self.event(TimerAction::CountdownTick));
        if let Some(run) = self.run.as_mut() {
            run.phase = Phase::Countdown {
                remaining: remaining - 1,
            };
            run.cadence = Some(next);
        }
    }

    /// Next zone for the running mode. An empty zone set ends the session.
    fn select(&mut self) -> Option<Zone> {
        let mode = self.mode()?;
        let sequence = match mode {
            Mode::Practice => &self.config.practice,
            Mode::Rally => &self.config.rally,
        };
        match next_zone(
            &self.config.zones,
            self.config.layout,
            &mut self.cursor,
            sequence,
            &mut self.rng,
        ) {
            Ok(zone) => Some(zone),
            Err(err) => {
                warn!(%err, "ending session");
                self.end(EndReason::EmptyZoneSet);
                None
            }
        }
    }

    fn announce(&mut self, zone: Zone) {
        debug!(%zone, "zone called");
        self.sink.zone_selected(zone, true);
        if self.config.layout == CourtLayout::Doubles {
            let partner = zone.mirrored();
            let mirror = self
                .timers
                .schedule_once(MIRROR_DELAY, self.event(TimerAction::Mirror(partner)));
            if let Some(run) = self.run.as_mut() {
                run.mirror = Some((mirror, partner));
            }
        }
    }

    /// Drops the current highlight. A partner cue that has not fired yet is
    /// delivered early so every doubles call still gets its mirror; a
    /// pending confirmation is dropped.
    fn clear_cues(&mut self) {
        let mut partner = None;
        if let Some(run) = self.run.as_mut() {
            if let Some(id) = run.confirmation.take() {
                self.timers.cancel(id);
            }
            if let Some((id, zone)) = run.mirror.take() {
                self.timers.cancel(id);
                partner = Some(zone);
            }
        }
        if let Some(zone) = partner {
            self.sink.zone_selected(zone, false);
        }
        self.sink.zone_cleared();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cues::{Cue, RecordingCues};
    use crate::sequencer::{SequenceConfig, SequenceMode};
    use crate::zone::ZoneSet;
    use assert_matches::assert_matches;

    fn z(n: u8) -> Zone {
        Zone::new(n).unwrap()
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn scheduler(config: TrainerConfig) -> Scheduler<RecordingCues> {
        let mut s = Scheduler::with_rng(RecordingCues::new(), StdRng::seed_from_u64(11));
        s.configure(config).unwrap();
        s
    }

    fn sequential() -> TrainerConfig {
        TrainerConfig {
            practice: SequenceConfig::new(SequenceMode::Sequential),
            rally: SequenceConfig::new(SequenceMode::Sequential),
            ..Default::default()
        }
    }

    #[test]
    fn rally_length_stays_within_thirty_percent() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            let n = rally_length(15, &mut rng);
            assert!((11..=19).contains(&n), "{n}");
        }
        assert_eq!(rally_length(1, &mut rng), 1);
        assert_eq!(rally_length(3, &mut rng), 3);
    }

    #[test]
    fn rally_length_handles_huge_counts() {
        let mut rng = StdRng::seed_from_u64(5);
        for shots in [2_000_000_000, u32::MAX] {
            let n = rally_length(shots, &mut rng);
            assert!(n >= shots - shots / 10 * 3 - 1);
        }
    }

    #[test]
    fn oversized_settings_never_reach_start() {
        let mut cfg = TrainerConfig::default();
        cfg.settings.pause_time_ms = u64::MAX / 2;
        let mut s = Scheduler::with_rng(RecordingCues::new(), StdRng::seed_from_u64(1));
        assert_matches!(s.configure(cfg), Err(ConfigError::TooLarge { .. }));
        s.start(Mode::Practice).unwrap();
        assert_eq!(s.sink().primary_zones().len(), 1);
        s.stop();
    }

    #[test]
    fn practice_selects_immediately_then_on_interval() {
        let mut s = scheduler(sequential());
        s.start(Mode::Practice).unwrap();
        assert_eq!(s.state(), SchedulerState::PracticeRunning);
        assert_eq!(s.sink().primary_zones(), vec![z(1)]);

        s.advance_to(ms(2499));
        assert_eq!(s.sink().primary_zones(), vec![z(1)]);
        s.advance_to(ms(2500));
        assert_eq!(s.sink().primary_zones(), vec![z(1), z(2)]);
        s.advance_to(ms(5000));
        assert_eq!(s.sink().primary_zones(), vec![z(1), z(2), z(3)]);
    }

    #[test]
    fn practice_confirmation_at_eighty_percent() {
        let mut s = scheduler(sequential());
        s.start(Mode::Practice).unwrap();
        s.sink_mut().take();

        s.advance_to(ms(1999));
        assert!(s.sink().cues.is_empty());
        s.advance_to(ms(2000));
        assert_eq!(s.sink().cues, vec![Cue::Confirmation(z(1))]);
    }

    #[test]
    fn start_while_running_is_rejected() {
        let mut s = scheduler(sequential());
        s.start(Mode::Practice).unwrap();
        assert_eq!(s.start(Mode::Rally), Err(ConfigError::SessionRunning));
        assert_eq!(s.mode(), Some(Mode::Practice));
    }

    #[test]
    fn configure_and_zone_edits_rejected_while_running() {
        let mut s = scheduler(sequential());
        s.start(Mode::Practice).unwrap();
        assert_eq!(s.configure(TrainerConfig::default()), Err(ConfigError::SessionRunning));
        assert_eq!(s.set_zone_enabled(z(1), false), Err(ConfigError::SessionRunning));
        assert_eq!(s.toggle_zone(z(2)), Err(ConfigError::SessionRunning));
        assert!(s.config().zones.is_enabled(z(1)));
    }

    #[test]
    fn stop_cancels_everything_and_is_idempotent() {
        let mut s = scheduler(sequential());
        s.start(Mode::Practice).unwrap();
        assert!(s.pending_timers() > 0);

        assert_eq!(s.stop(), Some(SessionStats::default()));
        assert_eq!(s.pending_timers(), 0);
        assert_eq!(s.state(), SchedulerState::Idle);
        assert_eq!(s.sink().cues.last(), Some(&Cue::Ended(EndReason::UserStop)));

        let seen = s.sink().cues.len();
        assert_eq!(s.stop(), None);
        s.advance_by(Duration::from_secs(60));
        assert_eq!(s.sink().cues.len(), seen);
    }

    #[test]
    fn rally_progress_uses_configured_shot_count() {
        let mut cfg = sequential();
        cfg.settings.shots_per_rally = 10;
        let mut s = scheduler(cfg);
        s.start(Mode::Rally).unwrap();
        s.advance_by(ms(600));
        let progress: Vec<_> = s
            .sink()
            .cues
            .iter()
            .filter_map(|c| match c {
                Cue::RallyProgress { shot, of } => Some((*shot, *of)),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![(1, 10), (2, 10)]);
        assert_eq!(s.stats().shot_count, 2);
    }

    #[test]
    fn rally_counts_down_then_starts_next_burst() {
        let mut cfg = sequential();
        cfg.settings.shots_per_rally = 2; // variation 0
        cfg.settings.rally_pause_sec = 3;
        let mut s = scheduler(cfg);
        s.start(Mode::Rally).unwrap();

        // shots at 0 and 600, burst ends at 1200
        s.advance_to(ms(1200));
        assert_eq!(s.state(), SchedulerState::RallyRunning(RallyPhase::InterRallyCountdown));
        assert_eq!(s.stats(), SessionStats { rally_count: 1, shot_count: 2 });

        // ticks at 1200, 2200 and 3200; next burst one second after the last
        s.advance_to(ms(3200));
        let ticks: Vec<_> = s
            .sink()
            .cues
            .iter()
            .filter_map(|c| match c {
                Cue::Countdown(n) => Some(*n),
                _ => None,
            })
            .collect();
        assert_eq!(ticks, vec![3, 2, 1]);
        s.advance_to(ms(4199));
        assert_eq!(s.state(), SchedulerState::RallyRunning(RallyPhase::InterRallyCountdown));

        s.advance_to(ms(4200));
        assert_eq!(s.state(), SchedulerState::RallyRunning(RallyPhase::ShotBurst));
        assert_eq!(s.sink().primary_zones(), vec![z(1), z(2), z(3)]);
    }

    #[test]
    fn doubles_mirrors_after_delay_without_moving_cursor() {
        let cfg = sequential().with_layout(CourtLayout::Doubles);
        let mut s = scheduler(cfg);
        s.start(Mode::Practice).unwrap();
        assert_eq!(
            s.sink().cues,
            vec![Cue::Cleared, Cue::Selected { zone: z(1), is_primary: true }]
        );
        s.advance_to(ms(200));
        assert_eq!(
            s.sink().cues.last(),
            Some(&Cue::Selected { zone: z(7), is_primary: false })
        );
        s.advance_to(ms(2500));
        assert_eq!(s.sink().primary_zones(), vec![z(1), z(2)]);
    }

    #[test]
    fn fast_rally_delivers_pending_mirror_before_next_shot() {
        let mut cfg = sequential().with_layout(CourtLayout::Doubles);
        cfg.settings.rally_speed_ms = 150;
        let mut s = scheduler(cfg);
        s.start(Mode::Rally).unwrap();
        s.advance_to(ms(299));

        let selected: Vec<Cue> = s
            .sink()
            .cues
            .iter()
            .filter(|c| matches!(c, Cue::Selected { .. }))
            .cloned()
            .collect();
        assert_eq!(
            selected,
            vec![
                Cue::Selected { zone: z(1), is_primary: true },
                Cue::Selected { zone: z(7), is_primary: false },
                Cue::Selected { zone: z(2), is_primary: true },
            ]
        );

        // the second shot's partner is still pending and dies with the session
        s.stop();
        s.advance_by(ms(1000));
        assert_eq!(
            s.sink().count(|c| matches!(c, Cue::Selected { is_primary: false, .. })),
            1
        );
    }

    #[test]
    fn empty_zone_set_ends_session_once() {
        let cfg = TrainerConfig {
            zones: ZoneSet::none_enabled(),
            ..Default::default()
        };
        let mut s = scheduler(cfg);
        assert_matches!(s.start(Mode::Rally), Ok(()));
        assert!(!s.is_running());
        assert_eq!(s.pending_timers(), 0);
        assert_eq!(
            s.sink().count(|c| *c == Cue::Ended(EndReason::EmptyZoneSet)),
            1
        );
        assert_eq!(s.sink().count(|c| matches!(c, Cue::Ended(_))), 1);
    }

    #[test]
    fn set_layout_stops_running_session() {
        let mut s = scheduler(sequential());
        s.start(Mode::Practice).unwrap();
        s.set_layout(CourtLayout::Doubles);
        assert!(!s.is_running());
        assert_eq!(s.config().layout, CourtLayout::Doubles);
        assert_eq!(s.pending_timers(), 0);
    }

    #[test]
    fn zone_edit_outside_layout_is_rejected() {
        let mut s = scheduler(TrainerConfig::default());
        assert_eq!(
            s.toggle_zone(z(9)),
            Err(ConfigError::ZoneOutOfRange {
                zone: 9,
                layout: CourtLayout::Singles
            })
        );
        assert_eq!(s.toggle_zone(z(2)), Ok(false));
    }
}
