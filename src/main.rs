pub mod ui;

use crate::ui::CourtView;
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::Duration,
};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use zonedrill::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    error::ConfigError,
    runtime::{CrosstermEventSource, DrillEvent, FixedTicker, Runner},
    scheduler::{Mode, Scheduler},
    sequencer::SequenceMode,
    settings::{parse_custom_sequence, secs_to_ms},
    zone::{CourtLayout, Zone, ZoneSet},
};

const TICK_RATE_MS: u64 = 100;

/// terminal drill trainer that calls out court zones
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Calls out court zones at a fixed pace (practice) or in randomized bursts separated by a countdown (rally). Flags override the saved configuration."
)]
pub struct Cli {
    /// mode selected when the trainer opens
    #[clap(long, value_enum)]
    mode: Option<Mode>,

    /// court layout; doubles also calls the mirrored partner zone
    #[clap(short = 'c', long, value_enum)]
    court: Option<CourtLayout>,

    /// seconds between zone calls in practice mode
    #[clap(short = 'p', long)]
    pause_time: Option<f64>,

    /// nominal shots per rally (each rally varies by up to 30%)
    #[clap(short = 'n', long)]
    shots_per_rally: Option<u32>,

    /// seconds of countdown between rallies
    #[clap(long)]
    rally_pause: Option<u32>,

    /// milliseconds between shots in a rally
    #[clap(long)]
    rally_speed: Option<u64>,

    /// zone sequencing in practice mode
    #[clap(short = 's', long, value_enum)]
    sequence: Option<SequenceMode>,

    /// custom practice order, e.g. "1,3,2,4,6"
    #[clap(long)]
    custom_sequence: Option<String>,

    /// zone sequencing in rally mode
    #[clap(long, value_enum)]
    rally_sequence: Option<SequenceMode>,

    /// custom rally order, e.g. "1,3,7,9"
    #[clap(long)]
    rally_custom_sequence: Option<String>,

    /// zones to enable, e.g. "1,2,5"; every other zone is disabled
    #[clap(short = 'z', long)]
    zones: Option<String>,

    /// start with announcements muted
    #[clap(long)]
    mute: bool,

    /// write the resulting configuration back to the config file
    #[clap(long)]
    save: bool,

    /// log file (defaults to the state directory)
    #[clap(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    /// Layers explicit flags over a stored configuration.
    fn apply(&self, mut cfg: Config) -> Result<Config, ConfigError> {
        if let Some(mode) = self.mode {
            cfg.mode = mode;
        }
        cfg.muted |= self.mute;

        let mut trainer = cfg.trainer;
        if let Some(court) = self.court {
            trainer = trainer.with_layout(court);
        }
        let layout = trainer.layout;

        let settings = &mut trainer.settings;
        if let Some(secs) = self.pause_time {
            settings.pause_time_ms = secs_to_ms(secs)?;
        }
        if let Some(n) = self.shots_per_rally {
            settings.shots_per_rally = n;
        }
        if let Some(n) = self.rally_pause {
            settings.rally_pause_sec = n;
        }
        if let Some(ms) = self.rally_speed {
            settings.rally_speed_ms = ms;
        }

        if let Some(mode) = self.sequence {
            trainer.practice.mode = mode;
        }
        if let Some(text) = &self.custom_sequence {
            trainer.practice.custom_order = parse_custom_sequence(text, layout)?;
        }
        if let Some(mode) = self.rally_sequence {
            trainer.rally.mode = mode;
        }
        if let Some(text) = &self.rally_custom_sequence {
            trainer.rally.custom_order = parse_custom_sequence(text, layout)?;
        }
        if let Some(text) = &self.zones {
            trainer.zones = ZoneSet::only(parse_custom_sequence(text, CourtLayout::Doubles)?);
        }

        trainer.validate()?;
        cfg.trainer = trainer;
        Ok(cfg)
    }
}

pub struct App {
    pub scheduler: Scheduler<CourtView>,
    /// Mode the next start uses.
    pub mode: Mode,
}

impl App {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let mut scheduler = Scheduler::new(CourtView::new(config.muted));
        scheduler.configure(config.trainer)?;
        Ok(Self {
            scheduler,
            mode: config.mode,
        })
    }

    fn toggle_running(&mut self) {
        if self.scheduler.is_running() {
            self.scheduler.stop();
        } else if let Err(err) = self.scheduler.start(self.mode) {
            warn!(%err, "could not start session");
        }
    }

    fn switch_mode(&mut self) {
        self.scheduler.stop();
        self.mode = self.mode.toggled();
    }
}

#[derive(Debug, PartialEq)]
enum KeyOutcome {
    Continue,
    Quit,
}

fn zone_for_key(c: char) -> Option<Zone> {
    let n = match c {
        '1'..='9' => c as u8 - b'0',
        '0' => 10,
        '-' => 11,
        '=' => 12,
        _ => return None,
    };
    Zone::new(n)
}

fn handle_key(app: &mut App, key: KeyEvent) -> KeyOutcome {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.scheduler.stop();
        return KeyOutcome::Quit;
    }

    match key.code {
        KeyCode::Esc => {
            if app.scheduler.stop().is_none() {
                return KeyOutcome::Quit;
            }
        }
        KeyCode::Char(' ') => app.toggle_running(),
        KeyCode::Tab | KeyCode::BackTab => app.switch_mode(),
        KeyCode::Char('c') => {
            let layout = app.scheduler.config().layout.toggled();
            app.scheduler.set_layout(layout);
        }
        KeyCode::Char('m') => {
            let view = app.scheduler.sink_mut();
            view.muted = !view.muted;
            if view.muted {
                view.announcement = None;
            }
        }
        KeyCode::Char(c) => {
            if let Some(zone) = zone_for_key(c) {
                // rejected while running or off the current court
                let _ = app.scheduler.toggle_zone(zone);
            }
        }
        _ => {}
    }
    KeyOutcome::Continue
}

fn init_logging(path: Option<PathBuf>) -> Option<WorkerGuard> {
    let path = path.or_else(AppDirs::log_path)?;
    let dir = path.parent()?.to_path_buf();
    let file = path.file_name()?.to_owned();
    std::fs::create_dir_all(&dir).ok()?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file));
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let _log_guard = init_logging(cli.log_file.clone());

    let store = FileConfigStore::new();
    let config = match cli.apply(store.load()) {
        Ok(config) => config,
        Err(err) => Cli::command().error(ErrorKind::ValueValidation, err).exit(),
    };
    if cli.save {
        store.save(&config)?;
        info!(path = %store.path().display(), "configuration saved");
    }
    let mut app = App::new(config)?;

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    loop {
        terminal.draw(|f| ui(app, f))?;

        let event = runner.step(app.scheduler.next_deadline());
        app.scheduler.advance_to(runner.elapsed());

        match event {
            DrillEvent::Key(key) => {
                if handle_key(app, key) == KeyOutcome::Quit {
                    break;
                }
            }
            DrillEvent::Resize | DrillEvent::Tick => {}
        }
    }

    Ok(())
}

fn ui(app: &mut App, f: &mut Frame) {
    f.render_widget(&*app, f.area());
}
