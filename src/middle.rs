// Sits between the terminal front-end and the player: applies input events to
// the channel document and says what the player should do about them.

use std::sync::Arc;
use std::time::Instant;

use log::debug;

use crate::pipeline::channel::ChannelDoc;
use crate::pipeline::score::{Score, TimeSlice};
use crate::pipeline::settings::SettingName;
use crate::shared::{CellState, Direction, DisplayState, InputEvent, Instrument, NUM_INSTRUMENTS};
use crate::tui::grid::GridView;

#[derive(Clone, Debug, PartialEq)]
pub enum PlayerAction {
    Play,
    Pause,
    SetScore(Arc<Score>),
    SetTickDuration(f64),
}

pub struct Middle {
    doc: ChannelDoc,
    channel_name: String,
    score: Arc<Score>,
    selected: (usize, usize), // (instrument row, tick)
    selected_setting: SettingName,
    grid: GridView,
    playing: bool,
    status: String,
    dirty: bool,
}

impl Middle {
    pub fn new(channel_name: &str, doc: ChannelDoc) -> Self {
        let score = doc.score();
        Self {
            doc,
            channel_name: channel_name.to_string(),
            score,
            selected: (0, 0),
            selected_setting: SettingName::BeatsPerMinute,
            grid: GridView::default(),
            playing: false,
            status: String::new(),
            dirty: false,
        }
    }

    pub fn doc(&self) -> &ChannelDoc {
        &self.doc
    }

    // Unsaved edits since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    // What the player needs before it can play this channel.
    pub fn initial_actions(&self) -> Vec<PlayerAction> {
        vec![
            PlayerAction::SetScore(self.score.clone()),
            PlayerAction::SetTickDuration(self.doc.tick_duration()),
        ]
    }

    pub fn handle_input(&mut self, event: InputEvent) -> Vec<PlayerAction> {
        match event {
            InputEvent::MoveCursor(direction) => {
                self.move_cursor(direction);
                vec![]
            }
            InputEvent::ToggleNote => self.toggle_selected(),
            InputEvent::PlayPress => {
                if self.playing {
                    vec![PlayerAction::Pause]
                } else {
                    vec![PlayerAction::Play]
                }
            }
            InputEvent::NextSetting => {
                self.selected_setting = self.selected_setting.next();
                vec![]
            }
            InputEvent::AdjustSetting(delta) => self.adjust_setting(delta),
            InputEvent::Quit => vec![],
        }
    }

    // Result of a Play/Pause action, as reported by the player.
    pub fn set_playing(&mut self, playing: bool) {
        if self.playing && !playing {
            self.grid.clear();
        }
        self.playing = playing;
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    // A tick announcement from the player. Ticks queued before a pause still
    // arrive afterwards; they are dropped.
    pub fn on_tick(&mut self, index: usize, slice: Option<&TimeSlice>, now: Instant) {
        if !self.playing {
            return;
        }
        let instruments: Vec<Instrument> = slice.map(|s| s.instruments().collect()).unwrap_or_default();
        self.grid.on_tick(index, instruments, now);
    }

    pub fn display_state(&mut self, now: Instant) -> DisplayState {
        let geometry = self.doc.geometry();
        let len = geometry.loop_len();
        self.grid.expire(now, len);

        let rows = Instrument::ALL
            .iter()
            .map(|&instrument| {
                let cells = (0..len)
                    .map(|index| {
                        if !self.score.has_note(instrument, index) {
                            CellState::Rest
                        } else if self.grid.is_flashing(instrument, index, now) {
                            CellState::Hit
                        } else {
                            CellState::Note
                        }
                    })
                    .collect();
                (instrument.name(), cells)
            })
            .collect();

        DisplayState {
            channel_name: self.channel_name.clone(),
            rows,
            emphasis: (0..len).map(|i| geometry.emphasis(i)).collect(),
            playing_tick: self.grid.playing_tick(),
            selected: self.selected,
            playing: self.playing,
            settings: SettingName::ALL
                .iter()
                .map(|&name| (name, self.doc.settings.get(name)))
                .collect(),
            selected_setting: self.selected_setting,
            status: self.status.clone(),
        }
    }

    fn move_cursor(&mut self, direction: Direction) {
        let len = self.doc.geometry().loop_len();
        let (row, col) = &mut self.selected;
        match direction {
            Direction::Up => *row = row.saturating_sub(1),
            Direction::Down => *row = (*row + 1).min(NUM_INSTRUMENTS - 1),
            Direction::Left => *col = col.saturating_sub(1),
            Direction::Right => *col = (*col + 1).min(len.saturating_sub(1)),
        }
    }

    fn toggle_selected(&mut self) -> Vec<PlayerAction> {
        let (row, col) = self.selected;
        let instrument = Instrument::ALL[row];
        match self.doc.toggle_note(instrument, col) {
            Some(write) => {
                debug!("toggled {} at {col}: {write:?}", instrument.code());
                self.dirty = true;
                self.refresh_score()
            }
            None => vec![],
        }
    }

    fn adjust_setting(&mut self, delta: i32) -> Vec<PlayerAction> {
        let name = self.selected_setting;
        let before = self.doc.settings.get(name);
        let after = self.doc.adjust_setting(name, delta);
        if before == after {
            return vec![];
        }
        self.dirty = true;
        self.status = format!("{} {after}", name.label());

        let len = self.doc.geometry().loop_len();
        self.selected.1 = self.selected.1.min(len - 1);

        let mut actions = vec![PlayerAction::SetTickDuration(self.doc.tick_duration())];
        if name != SettingName::BeatsPerMinute {
            actions.extend(self.refresh_score());
        }
        actions
    }

    fn refresh_score(&mut self) -> Vec<PlayerAction> {
        self.score = self.doc.score();
        vec![PlayerAction::SetScore(self.score.clone())]
    }
}

#[cfg(test)]
mod test {
    use std::time::Instant;

    use super::{Middle, PlayerAction};
    use crate::pipeline::channel::ChannelDoc;
    use crate::pipeline::score::TimeSlice;
    use crate::pipeline::settings::SettingName;
    use crate::shared::{CellState, Direction, Emphasis, InputEvent, Instrument};

    fn middle() -> Middle {
        Middle::new("test", ChannelDoc::default())
    }

    #[test]
    fn initial_actions_carry_score_and_tempo() {
        let m = middle();
        let actions = m.initial_actions();
        assert!(matches!(&actions[0], PlayerAction::SetScore(s) if s.len() == 32));
        // 100 bpm, 4 ticks per beat
        assert_eq!(actions[1], PlayerAction::SetTickDuration(0.15));
    }

    #[test]
    fn cursor_stays_on_the_grid() {
        let mut m = middle();
        m.handle_input(InputEvent::MoveCursor(Direction::Up));
        m.handle_input(InputEvent::MoveCursor(Direction::Left));
        assert_eq!(m.selected, (0, 0));
        for _ in 0..50 {
            m.handle_input(InputEvent::MoveCursor(Direction::Down));
            m.handle_input(InputEvent::MoveCursor(Direction::Right));
        }
        assert_eq!(m.selected, (9, 31));
    }

    #[test]
    fn toggling_sends_a_new_score() {
        let mut m = middle();
        m.handle_input(InputEvent::MoveCursor(Direction::Right));
        let actions = m.handle_input(InputEvent::ToggleNote);
        match &actions[..] {
            [PlayerAction::SetScore(score)] => assert!(score.has_note(Instrument::A, 1)),
            other => panic!("unexpected actions {other:?}"),
        }
        assert!(m.take_dirty());
        assert!(!m.take_dirty());
        assert!(m.doc().notes.contains_key("001"));
    }

    #[test]
    fn play_press_follows_player_state() {
        let mut m = middle();
        assert_eq!(m.handle_input(InputEvent::PlayPress), vec![PlayerAction::Play]);
        // play failed
        assert_eq!(m.handle_input(InputEvent::PlayPress), vec![PlayerAction::Play]);
        m.set_playing(true);
        assert_eq!(m.handle_input(InputEvent::PlayPress), vec![PlayerAction::Pause]);
    }

    #[test]
    fn tempo_change_only_sets_tick_duration() {
        let mut m = middle();
        let actions = m.handle_input(InputEvent::AdjustSetting(20));
        assert_eq!(actions, vec![PlayerAction::SetTickDuration(0.125)]);
        assert_eq!(m.doc().settings.get(SettingName::BeatsPerMinute), 120);
    }

    #[test]
    fn geometry_change_rebuilds_score_and_clamps_cursor() {
        let mut m = middle();
        for _ in 0..31 {
            m.handle_input(InputEvent::MoveCursor(Direction::Right));
        }
        m.handle_input(InputEvent::NextSetting);
        m.handle_input(InputEvent::NextSetting);
        m.handle_input(InputEvent::NextSetting);
        assert_eq!(m.selected_setting, SettingName::NumBars);

        let actions = m.handle_input(InputEvent::AdjustSetting(-1));
        assert_eq!(actions.len(), 2);
        assert!(matches!(&actions[1], PlayerAction::SetScore(s) if s.len() == 16));
        assert_eq!(m.selected.1, 15);

        // already at the minimum
        assert!(m.handle_input(InputEvent::AdjustSetting(-1)).is_empty());
    }

    #[test]
    fn display_marks_hits_and_bars() {
        let mut m = middle();
        m.handle_input(InputEvent::MoveCursor(Direction::Right));
        m.handle_input(InputEvent::MoveCursor(Direction::Right));
        m.handle_input(InputEvent::ToggleNote);
        m.set_playing(true);

        let now = Instant::now();
        let slice = TimeSlice::new().with(Instrument::A);
        m.on_tick(2, Some(&slice), now);

        let ds = m.display_state(now);
        assert_eq!(ds.rows.len(), 10);
        assert_eq!(ds.rows[0].0, "Snap");
        assert_eq!(ds.rows[0].1[2], CellState::Hit);
        assert_eq!(ds.rows[0].1[3], CellState::Rest);
        assert_eq!(ds.playing_tick, Some(2));
        assert_eq!(ds.emphasis[0], Emphasis::Bar);
        assert_eq!(ds.emphasis[4], Emphasis::Beat);
        assert_eq!(ds.emphasis[16], Emphasis::Bar);

        m.set_playing(false);
        assert_eq!(m.display_state(now).playing_tick, None);
    }

    #[test]
    fn ticks_after_pause_are_ignored() {
        let mut m = middle();
        m.handle_input(InputEvent::ToggleNote);
        m.set_playing(true);
        m.set_playing(false);

        let now = Instant::now();
        m.on_tick(0, Some(&TimeSlice::new().with(Instrument::A)), now);
        let ds = m.display_state(now);
        assert_eq!(ds.playing_tick, None);
        assert_eq!(ds.rows[0].1[0], CellState::Note);
    }
}
