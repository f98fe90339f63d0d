// Channel settings as stored in a channel document. Every field is optional on
// the wire so that documents written before a field existed still load.

use serde::{Deserialize, Serialize};

use super::geometry::Geometry;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SettingName {
    BeatsPerMinute,
    TicksPerBeat,
    BeatsPerBar,
    NumBars,
}

impl SettingName {
    pub const ALL: [SettingName; 4] = [
        SettingName::BeatsPerMinute,
        SettingName::TicksPerBeat,
        SettingName::BeatsPerBar,
        SettingName::NumBars,
    ];

    pub fn next(self) -> Self {
        match self {
            SettingName::BeatsPerMinute => SettingName::TicksPerBeat,
            SettingName::TicksPerBeat => SettingName::BeatsPerBar,
            SettingName::BeatsPerBar => SettingName::NumBars,
            SettingName::NumBars => SettingName::BeatsPerMinute,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SettingName::BeatsPerMinute => "BPM",
            SettingName::TicksPerBeat => "TICKS/BEAT",
            SettingName::BeatsPerBar => "BEATS/BAR",
            SettingName::NumBars => "BARS",
        }
    }

    pub fn default_value(self) -> u32 {
        match self {
            SettingName::BeatsPerMinute => 100,
            SettingName::TicksPerBeat => 4,
            SettingName::BeatsPerBar => 4,
            SettingName::NumBars => 2,
        }
    }

    pub fn min(self) -> u32 {
        match self {
            SettingName::BeatsPerMinute => 20,
            _ => 1,
        }
    }

    pub fn max(self) -> u32 {
        match self {
            SettingName::BeatsPerMinute => 300,
            _ => 8,
        }
    }

    pub fn clamp(self, value: u32) -> u32 {
        value.clamp(self.min(), self.max())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beats_per_minute: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticks_per_beat: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beats_per_bar: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_bars: Option<u32>,
}

impl ChannelSettings {
    fn field(&self, name: SettingName) -> Option<u32> {
        match name {
            SettingName::BeatsPerMinute => self.beats_per_minute,
            SettingName::TicksPerBeat => self.ticks_per_beat,
            SettingName::BeatsPerBar => self.beats_per_bar,
            SettingName::NumBars => self.num_bars,
        }
    }

    // Resolved value: the stored one clamped into bounds, or the default.
    pub fn get(&self, name: SettingName) -> u32 {
        self.field(name)
            .map(|v| name.clamp(v))
            .unwrap_or_else(|| name.default_value())
    }

    pub fn set(&mut self, name: SettingName, value: u32) {
        let value = Some(name.clamp(value));
        match name {
            SettingName::BeatsPerMinute => self.beats_per_minute = value,
            SettingName::TicksPerBeat => self.ticks_per_beat = value,
            SettingName::BeatsPerBar => self.beats_per_bar = value,
            SettingName::NumBars => self.num_bars = value,
        }
    }

    pub fn adjust(&mut self, name: SettingName, delta: i32) -> u32 {
        let current = self.get(name) as i64;
        let target = (current + delta as i64).max(0) as u32;
        self.set(name, target);
        self.get(name)
    }

    pub fn geometry(&self) -> Geometry {
        // Clamped values are always inside the geometry's accepted range.
        Geometry::new(
            self.get(SettingName::TicksPerBeat),
            self.get(SettingName::BeatsPerBar),
            self.get(SettingName::NumBars),
        )
        .unwrap_or_default()
    }

    pub fn seconds_per_tick(&self) -> f64 {
        60.0 / self.get(SettingName::BeatsPerMinute) as f64
            / self.get(SettingName::TicksPerBeat) as f64
    }
}
