// Types shared between the terminal front-end, the middle layer and the player.
//
// Keys:
//   arrows / h j k l   //  MoveCursor
//   Enter / x          //  ToggleNote under the cursor
//   Space              //  PlayPress (play/pause)
//   Tab                //  NextSetting (bpm -> ticks/beat -> beats/bar -> bars)
//   - / = (_ / +)      //  AdjustSetting(-1 / +1, or by ten) on the selected setting
//   Esc / q            //  Quit (the channel is saved first)
//
// Only the middle layer owns the channel and transport state; the
// TUI just renders whatever `DisplayState` it is handed each frame.

use crate::pipeline::settings::SettingName;

pub const NUM_INSTRUMENTS: usize = 10;

// The ten drum sounds. The single-letter codes are the ids used in channel
// documents and the sample file names (A.wav .. J.wav).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Instrument {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
}

impl Instrument {
    pub const ALL: [Instrument; NUM_INSTRUMENTS] = [
        Instrument::A,
        Instrument::B,
        Instrument::C,
        Instrument::D,
        Instrument::E,
        Instrument::F,
        Instrument::G,
        Instrument::H,
        Instrument::I,
        Instrument::J,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Instrument::A => "A",
            Instrument::B => "B",
            Instrument::C => "C",
            Instrument::D => "D",
            Instrument::E => "E",
            Instrument::F => "F",
            Instrument::G => "G",
            Instrument::H => "H",
            Instrument::I => "I",
            Instrument::J => "J",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            Instrument::A => "Snap",
            Instrument::B => "Cowbell",
            Instrument::C => "Splash",
            Instrument::D => "Hat",
            Instrument::E => "High Tom",
            Instrument::F => "Med Tom",
            Instrument::G => "Low Tom",
            Instrument::H => "Snare",
            Instrument::I => "Soft Snare",
            Instrument::J => "Kick",
        }
    }

    pub fn row(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    MoveCursor(Direction),
    ToggleNote,
    PlayPress,
    NextSetting,
    AdjustSetting(i32),
    Quit,
}

// How heavy the column separator should look at a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Emphasis {
    Bar,
    Beat,
    Tick,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellState {
    Rest,
    Note,
    Hit, // note that is sounding right now
}

#[derive(Clone, Debug)]
pub struct DisplayState {
    pub channel_name: String,
    pub rows: Vec<(&'static str, Vec<CellState>)>, // one row per instrument
    pub emphasis: Vec<Emphasis>, // one per column
    pub playing_tick: Option<usize>,
    pub selected: (usize, usize), // (row, column) of the edit cursor
    pub playing: bool,
    pub settings: Vec<(SettingName, u32)>,
    pub selected_setting: SettingName,
    pub status: String,
}
