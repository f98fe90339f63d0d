mod audio;
mod audio_api;
mod config;
mod loader;
mod middle;
mod pipeline;
mod player;
mod shared;
mod tui;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::terminal;
use env_logger::{Builder, Env, Target};
use log::{info, warn};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use audio::CpalHost;
use config::{CONFIG_ENV, Config};
use loader::sample_loader::DirectorySource;
use middle::{Middle, PlayerAction};
use pipeline::persistence;
use pipeline::score::TimeSlice;
use player::Player;
use shared::{InputEvent, Instrument};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

// The terminal belongs to the UI, so logs go to a file in the project.
fn init_logging(project_dir: &Path) -> anyhow::Result<()> {
    let dir = project_dir.join(persistence::APP_DIR);
    std::fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("beatchannel.log"))
        .context("failed to open log file")?;

    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .target(Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn run() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let project_dir: PathBuf = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
    init_logging(&project_dir)?;

    let config = Config::load(&project_dir, std::env::var_os(CONFIG_ENV).map(PathBuf::from))?;
    let channel = args.next().unwrap_or_else(|| config.channel.clone());
    info!("opening channel {channel} in {}", project_dir.display());

    let doc = persistence::load_channel(&project_dir, &channel);
    let mut middle = Middle::new(&channel, doc);

    let player = Player::new(
        config.look_ahead,
        Instrument::ALL.to_vec(),
        DirectorySource {
            dir: config.sounds_path(&project_dir),
        },
        CpalHost {
            gain: config.gain,
            base_latency: config.base_latency,
        },
    )?;

    // tick announcements come in on the player thread; the UI picks them up
    // once per frame
    let (tick_tx, tick_rx) = crossbeam_channel::unbounded::<(usize, Option<TimeSlice>)>();
    player.set_time_callback(Some(Box::new(move |index: usize, slice: Option<&TimeSlice>| {
        let _ = tick_tx.send((index, slice.cloned()));
    })));
    for action in middle.initial_actions() {
        apply(&player, &mut middle, action);
    }

    terminal::enable_raw_mode()?;
    // Enable keyboard enhancement for real press/release detection.
    // Falls back gracefully if the terminal doesn't support it.
    let _ = crossterm::execute!(
        std::io::stdout(),
        crossterm::event::PushKeyboardEnhancementFlags(
            crossterm::event::KeyboardEnhancementFlags::REPORT_EVENT_TYPES
        )
    );
    let _guard = RawModeGuard; // auto drops when out of scope

    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let tick_rate = Duration::from_millis(16); // ~60fps

    loop {
        let now = Instant::now();
        for (index, slice) in tick_rx.try_iter() {
            middle.on_tick(index, slice.as_ref(), now);
        }

        let ds = middle.display_state(now);
        term.draw(|frame| {
            tui::view::render(frame, frame.area(), &ds);
        })?;

        let events = tui::input::poll_input(tick_rate)?;
        for event in events {
            if event == InputEvent::Quit {
                // save before quitting
                persistence::save_channel(&project_dir, &channel, middle.doc())?;
                drop(term);
                drop(player);
                return Ok(());
            }
            for action in middle.handle_input(event) {
                apply(&player, &mut middle, action);
            }
        }

        if middle.take_dirty() {
            if let Err(e) = persistence::save_channel(&project_dir, &channel, middle.doc()) {
                warn!("could not save channel: {e:#}");
                middle.set_status("save failed, see log");
            }
        }
    }
}

fn apply(player: &Player, middle: &mut Middle, action: PlayerAction) {
    match action {
        PlayerAction::Play => match player.play() {
            Ok(()) => {
                middle.set_playing(player.is_playing());
                middle.set_status("");
            }
            Err(e) => {
                middle.set_playing(false);
                middle.set_status(e.to_string());
            }
        },
        PlayerAction::Pause => {
            player.pause();
            middle.set_playing(player.is_playing());
        }
        PlayerAction::SetScore(score) => player.set_score(score),
        PlayerAction::SetTickDuration(seconds) => player.set_tick_duration(seconds),
    }
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::execute!(
            std::io::stdout(),
            crossterm::event::PopKeyboardEnhancementFlags
        );
        let _ = terminal::disable_raw_mode();
    }
}
