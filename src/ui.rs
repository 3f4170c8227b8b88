use std::collections::BTreeSet;

use itertools::Itertools;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};
use zonedrill::{
    cues::{CueSink, EndReason},
    scheduler::{Mode, RallyPhase, SchedulerState},
    sequencer::SequenceMode,
    zone::{CourtLayout, Zone, ZONES_PER_SIDE},
};

use crate::App;

const HORIZONTAL_MARGIN: u16 = 2;
const COURT_COLUMNS: u8 = 2;

/// Display state fed by the scheduler's cues.
#[derive(Debug, Default)]
pub struct CourtView {
    pub active: BTreeSet<Zone>,
    pub confirmed: Option<Zone>,
    pub rally_progress: Option<(u32, u32)>,
    pub countdown: Option<u32>,
    pub announcement: Option<String>,
    pub muted: bool,
    pub ended: Option<EndReason>,
}

impl CourtView {
    pub fn new(muted: bool) -> Self {
        Self {
            muted,
            ..Default::default()
        }
    }

    fn announce(&mut self, text: String) {
        self.announcement = (!self.muted).then_some(text);
    }
}

impl CueSink for CourtView {
    fn zone_selected(&mut self, zone: Zone, is_primary: bool) {
        self.active.insert(zone);
        self.countdown = None;
        self.ended = None;
        if is_primary {
            self.announce(zone.spoken());
        }
    }

    fn zone_cleared(&mut self) {
        self.active.clear();
        self.confirmed = None;
    }

    fn confirmation_cue(&mut self, zone: Zone) {
        self.confirmed = Some(zone);
    }

    fn rally_progress(&mut self, shot_in_burst: u32, configured_shots: u32) {
        self.rally_progress = Some((shot_in_burst, configured_shots));
    }

    fn countdown_tick(&mut self, seconds_remaining: u32) {
        self.rally_progress = None;
        self.countdown = Some(seconds_remaining);
        self.announce(seconds_remaining.to_string());
    }

    fn session_ended(&mut self, reason: EndReason) {
        self.active.clear();
        self.confirmed = None;
        self.rally_progress = None;
        self.countdown = None;
        self.announcement = None;
        self.ended = Some(reason);
    }
}

fn zone_cell(app: &App, zone: Zone, area: Rect, buf: &mut Buffer) {
    let view = app.scheduler.sink();
    let enabled = app.scheduler.config().zones.is_enabled(zone);

    let (style, label) = if view.active.contains(&zone) {
        let check = if view.confirmed == Some(zone) { " ✓" } else { "" };
        (
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
            format!("{zone}{check}"),
        )
    } else if enabled {
        (Style::default().fg(Color::Green), zone.to_string())
    } else {
        (
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::DIM),
            format!("{zone} off"),
        )
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(if zone.is_partner() {
            BorderType::Plain
        } else {
            BorderType::Rounded
        })
        .style(style);
    let inner = block.inner(area);
    block.render(area, buf);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(50),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(inner);
    Paragraph::new(label)
        .style(style)
        .alignment(Alignment::Center)
        .render(rows[1], buf);
}

/// One half of the court: three rows of two zones starting at `first`.
fn court_half(app: &App, first: u8, area: Rect, buf: &mut Buffer) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Ratio(1, 3); 3])
        .split(area);
    for (r, row_area) in rows.iter().enumerate() {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, 2); 2])
            .split(*row_area);
        for (c, cell) in cols.iter().enumerate() {
            let n = first + r as u8 * COURT_COLUMNS + c as u8;
            if let Some(zone) = Zone::new(n) {
                zone_cell(app, zone, *cell, buf);
            }
        }
    }
}

fn status_line(app: &App) -> Line<'static> {
    let sched = &app.scheduler;
    let cfg = sched.config();
    let view = sched.sink();
    let stats = sched.stats();

    let state = match sched.state() {
        SchedulerState::Idle => "idle".to_string(),
        SchedulerState::PracticeRunning => "practice".to_string(),
        SchedulerState::RallyRunning(RallyPhase::ShotBurst) => match view.rally_progress {
            Some((shot, of)) => format!("rally {shot} / {of}"),
            None => "rally".to_string(),
        },
        SchedulerState::RallyRunning(RallyPhase::InterRallyCountdown) => {
            format!("next rally in {}", view.countdown.unwrap_or(0))
        }
    };
    let sequence_cfg = match app.mode {
        Mode::Practice => &cfg.practice,
        Mode::Rally => &cfg.rally,
    };
    let sequence = match sequence_cfg.mode {
        SequenceMode::Custom if !sequence_cfg.custom_order.is_empty() => {
            format!("custom [{}]", sequence_cfg.custom_order.iter().join(","))
        }
        mode => mode.to_string(),
    };

    let mut spans = vec![
        Span::styled(
            format!(" {} ", app.mode).to_uppercase(),
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(" {} · {} · {state}", cfg.layout, sequence)),
        Span::styled(
            format!("  rallies {}  shots {}", stats.rally_count, stats.shot_count),
            Style::default().fg(Color::Magenta),
        ),
    ];
    if let Some(text) = &view.announcement {
        spans.push(Span::styled(
            format!("  ▶ {text}"),
            Style::default().add_modifier(Modifier::BOLD),
        ));
    }
    if view.muted {
        spans.push(Span::styled("  (muted)", Style::default().fg(Color::DarkGray)));
    }
    Line::from(spans)
}

fn notice_line(app: &App) -> Line<'static> {
    match app.scheduler.sink().ended {
        Some(EndReason::EmptyZoneSet) => Line::from(Span::styled(
            "Please enable at least one zone!",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        _ => Line::from(Span::styled(
            "(space) start/stop  (tab) practice/rally  (c)ourt  (m)ute  1-9 0 - = toggle zone  (esc)",
            Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::ITALIC),
        )),
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints([
                Constraint::Min(6),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(area);

        let court = Block::default()
            .borders(Borders::ALL)
            .title(" zonedrill ")
            .title_alignment(Alignment::Center);
        let court_area = court.inner(chunks[0]);
        court.render(chunks[0], buf);

        match self.scheduler.config().layout {
            CourtLayout::Singles => court_half(self, 1, court_area, buf),
            CourtLayout::Doubles => {
                let halves = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([
                        Constraint::Percentage(50),
                        Constraint::Length(1),
                        Constraint::Percentage(50),
                    ])
                    .split(court_area);
                court_half(self, ZONES_PER_SIDE + 1, halves[0], buf);
                Paragraph::new("─ net ─")
                    .alignment(Alignment::Center)
                    .style(Style::default().fg(Color::DarkGray))
                    .render(halves[1], buf);
                court_half(self, 1, halves[2], buf);
            }
        }

        Paragraph::new(status_line(self)).render(chunks[1], buf);
        Paragraph::new(notice_line(self))
            .alignment(Alignment::Center)
            .render(chunks[2], buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn z(n: u8) -> Zone {
        Zone::new(n).unwrap()
    }

    #[test]
    fn selection_highlights_and_announces() {
        let mut view = CourtView::new(false);
        view.zone_selected(z(4), true);
        view.zone_selected(z(10), false);
        assert!(view.active.contains(&z(4)) && view.active.contains(&z(10)));
        assert_eq!(view.announcement.as_deref(), Some("4"));

        view.confirmation_cue(z(4));
        assert_eq!(view.confirmed, Some(z(4)));
        view.zone_cleared();
        assert!(view.active.is_empty());
        assert_eq!(view.confirmed, None);
    }

    #[test]
    fn muted_view_keeps_highlights_but_drops_speech() {
        let mut view = CourtView::new(true);
        view.zone_selected(z(2), true);
        view.countdown_tick(5);
        assert!(view.active.contains(&z(2)));
        assert_eq!(view.countdown, Some(5));
        assert_eq!(view.announcement, None);
    }

    #[test]
    fn countdown_hides_rally_counter_and_end_resets() {
        let mut view = CourtView::new(false);
        view.rally_progress(3, 15);
        view.countdown_tick(9);
        assert_eq!(view.rally_progress, None);
        assert_eq!(view.announcement.as_deref(), Some("9"));

        view.session_ended(EndReason::EmptyZoneSet);
        assert_eq!(view.countdown, None);
        assert_eq!(view.ended, Some(EndReason::EmptyZoneSet));
        view.zone_selected(z(1), true);
        assert_eq!(view.ended, None);
    }
}
