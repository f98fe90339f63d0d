// A channel document: name, settings and the sparse note entries, keyed by
// bar/beat/tick. This mirrors what the shared document store holds; edits
// always replace a whole entry so concurrent writers never see half a slice.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::geometry::{Geometry, key_from_index};
use super::score::{NoteProperties, Score, TimeSlice, build_score};
use super::settings::{ChannelSettings, SettingName};
use crate::shared::Instrument;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub settings: ChannelSettings,
    #[serde(default)]
    pub notes: BTreeMap<String, TimeSlice>,
}

// One whole-entry write, as it would be sent to the document store.
#[derive(Clone, Debug, PartialEq)]
pub enum EntryWrite {
    Put { key: String, slice: TimeSlice },
    Delete { key: String },
}

impl ChannelDoc {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.settings.geometry()
    }

    pub fn tick_duration(&self) -> f64 {
        self.settings.seconds_per_tick()
    }

    pub fn score(&self) -> Arc<Score> {
        let geometry = self.geometry();
        Arc::new(build_score(
            &geometry,
            self.notes.iter().map(|(k, v)| (k.as_str(), v)),
        ))
    }

    // Add the note if it's missing, remove it if it's there. Returns the write
    // that was applied, or None if the index isn't on the current loop.
    pub fn toggle_note(&mut self, instrument: Instrument, index: usize) -> Option<EntryWrite> {
        let key = key_from_index(&self.geometry(), index)?;
        let mut slice = self.notes.get(&key).cloned().unwrap_or_default();
        if slice.remove(instrument).is_none() {
            slice.insert(instrument, NoteProperties::default());
        }
        let write = if slice.is_empty() {
            EntryWrite::Delete { key }
        } else {
            EntryWrite::Put { key, slice }
        };
        self.apply(write.clone());
        Some(write)
    }

    pub fn apply(&mut self, write: EntryWrite) {
        match write {
            EntryWrite::Put { key, slice } => {
                self.notes.insert(key, slice);
            }
            EntryWrite::Delete { key } => {
                self.notes.remove(&key);
            }
        }
    }

    pub fn adjust_setting(&mut self, name: SettingName, delta: i32) -> u32 {
        self.settings.adjust(name, delta)
    }
}

#[cfg(test)]
mod test {
    use super::{ChannelDoc, EntryWrite};
    use crate::pipeline::settings::SettingName;
    use crate::shared::Instrument;

    #[test]
    fn toggle_adds_then_removes() {
        let mut doc = ChannelDoc::named("test");
        let write = doc.toggle_note(Instrument::J, 16).unwrap();
        assert!(matches!(write, EntryWrite::Put { ref key, .. } if key == "100"));
        assert!(doc.score().has_note(Instrument::J, 16));

        doc.toggle_note(Instrument::H, 16);
        assert_eq!(doc.notes["100"].len(), 2);

        doc.toggle_note(Instrument::J, 16);
        doc.toggle_note(Instrument::H, 16);
        assert!(doc.notes.is_empty());
        assert!(!doc.score().has_note(Instrument::J, 16));
    }

    #[test]
    fn toggle_off_the_loop_is_ignored() {
        let mut doc = ChannelDoc::default();
        assert_eq!(doc.toggle_note(Instrument::A, 32), None);
        assert!(doc.notes.is_empty());
    }

    #[test]
    fn shrinking_hides_entries_and_growing_restores_them() {
        let mut doc = ChannelDoc::default();
        doc.adjust_setting(SettingName::NumBars, 2); // 4 bars
        doc.toggle_note(Instrument::B, 63);
        assert!(doc.notes.contains_key("333"));

        doc.adjust_setting(SettingName::NumBars, -2);
        let score = doc.score();
        assert_eq!(score.len(), 32);
        assert!((0..score.len()).all(|i| score.get(i).is_none()));

        doc.adjust_setting(SettingName::NumBars, 2);
        assert!(doc.score().has_note(Instrument::B, 63));
    }

    #[test]
    fn document_json_shape() {
        let json = r#"{
            "name": "jam",
            "settings": {"beatsPerMinute": 120},
            "notes": {"000": {"J": {}}, "010": {"D": {}}, "900": {"A": {}}}
        }"#;
        let doc: ChannelDoc = serde_json::from_str(json).unwrap();
        assert_eq!(doc.name.as_deref(), Some("jam"));
        assert!((doc.tick_duration() - 0.125).abs() < 1e-12);
        let score = doc.score();
        assert!(score.has_note(Instrument::J, 0));
        assert!(score.has_note(Instrument::D, 4));
        assert_eq!((0..score.len()).filter(|&i| score.get(i).is_some()).count(), 2);
    }
}
