// Loop geometry and the bar/beat/tick key encoding used by channel documents.
//
// A key is three ASCII digits: bar, beat, tick. "100" is bar 1, beat 0, tick 0.
// Keys are always decoded against an explicit geometry: the geometry may have
// shrunk since the key was written, and such keys just don't map anywhere.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::shared::Emphasis;

// The key encoding has one decimal digit per component.
pub const MAX_DIMENSION: u32 = 9;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("{name} must be between 1 and {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: u32,
        max: u32,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    ticks_per_beat: u32,
    beats_per_bar: u32,
    num_bars: u32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            ticks_per_beat: 4,
            beats_per_bar: 4,
            num_bars: 2,
        }
    }
}

impl Geometry {
    pub fn new(ticks_per_beat: u32, beats_per_bar: u32, num_bars: u32) -> Result<Self, GeometryError> {
        check("ticks_per_beat", ticks_per_beat)?;
        check("beats_per_bar", beats_per_bar)?;
        check("num_bars", num_bars)?;
        Ok(Self {
            ticks_per_beat,
            beats_per_bar,
            num_bars,
        })
    }

    pub fn ticks_per_bar(&self) -> usize {
        (self.ticks_per_beat * self.beats_per_bar) as usize
    }

    pub fn loop_len(&self) -> usize {
        self.ticks_per_bar() * self.num_bars as usize
    }

    pub fn position_of(&self, index: usize) -> Option<TickPosition> {
        if index >= self.loop_len() {
            return None;
        }
        let ticks_per_bar = self.ticks_per_bar();
        let ticks_per_beat = self.ticks_per_beat as usize;
        let in_bar = index % ticks_per_bar;
        Some(TickPosition {
            bar: (index / ticks_per_bar) as u8,
            beat: (in_bar / ticks_per_beat) as u8,
            tick: (in_bar % ticks_per_beat) as u8,
        })
    }

    pub fn index_of(&self, pos: TickPosition) -> Option<usize> {
        if pos.bar as u32 >= self.num_bars
            || pos.beat as u32 >= self.beats_per_bar
            || pos.tick as u32 >= self.ticks_per_beat
        {
            return None;
        }
        Some(
            pos.bar as usize * self.ticks_per_bar()
                + pos.beat as usize * self.ticks_per_beat as usize
                + pos.tick as usize,
        )
    }

    pub fn emphasis(&self, index: usize) -> Emphasis {
        if index % self.ticks_per_bar() == 0 {
            Emphasis::Bar
        } else if index % self.ticks_per_beat as usize == 0 {
            Emphasis::Beat
        } else {
            Emphasis::Tick
        }
    }
}

fn check(name: &'static str, value: u32) -> Result<(), GeometryError> {
    if value == 0 || value > MAX_DIMENSION {
        return Err(GeometryError::OutOfRange {
            name,
            value,
            max: MAX_DIMENSION,
        });
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickPosition {
    pub bar: u8,
    pub beat: u8,
    pub tick: u8,
}

impl fmt::Display for TickPosition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}{}", self.bar, self.beat, self.tick)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed tick key {0:?}")]
pub struct MalformedKey(pub String);

impl FromStr for TickPosition {
    type Err = MalformedKey;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        let digits: Vec<u8> = key
            .chars()
            .map(|c| c.to_digit(10).map(|d| d as u8))
            .collect::<Option<_>>()
            .ok_or_else(|| MalformedKey(key.to_string()))?;
        match digits.as_slice() {
            [bar, beat, tick] => Ok(TickPosition {
                bar: *bar,
                beat: *beat,
                tick: *tick,
            }),
            _ => Err(MalformedKey(key.to_string())),
        }
    }
}

pub fn key_from_index(geometry: &Geometry, index: usize) -> Option<String> {
    geometry.position_of(index).map(|pos| pos.to_string())
}

// None for malformed keys and for keys outside the geometry.
pub fn index_from_key(geometry: &Geometry, key: &str) -> Option<usize> {
    let pos: TickPosition = key.parse().ok()?;
    geometry.index_of(pos)
}
