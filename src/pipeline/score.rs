// The playable score: a dense, fixed-length snapshot built from the sparse
// entries of a channel document. A Score is never mutated once built; whoever
// owns it replaces it wholesale.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use super::geometry::{Geometry, index_from_key};
use crate::shared::Instrument;

// Properties of one note. Nothing is defined yet (velocity and friends would go
// here), but unknown fields are kept so newer documents survive a round trip.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteProperties {
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

type RawSlice = BTreeMap<String, NoteProperties>;

// The notes played at one tick. Unknown instrument codes are dropped on load.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSlice", into = "RawSlice")]
pub struct TimeSlice(BTreeMap<Instrument, NoteProperties>);

impl From<RawSlice> for TimeSlice {
    fn from(raw: RawSlice) -> Self {
        let notes = raw
            .into_iter()
            .filter_map(|(code, props)| match Instrument::from_code(&code) {
                Some(instrument) => Some((instrument, props)),
                None => {
                    debug!("dropping note for unknown instrument {:?}", code);
                    None
                }
            })
            .collect();
        TimeSlice(notes)
    }
}

impl From<TimeSlice> for RawSlice {
    fn from(slice: TimeSlice) -> Self {
        slice
            .0
            .into_iter()
            .map(|(instrument, props)| (instrument.code().to_string(), props))
            .collect()
    }
}

impl TimeSlice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, instrument: Instrument) -> Self {
        self.insert(instrument, NoteProperties::default());
        self
    }

    pub fn insert(&mut self, instrument: Instrument, props: NoteProperties) {
        self.0.insert(instrument, props);
    }

    pub fn remove(&mut self, instrument: Instrument) -> Option<NoteProperties> {
        self.0.remove(&instrument)
    }

    pub fn contains(&self, instrument: Instrument) -> bool {
        self.0.contains_key(&instrument)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn instruments(&self) -> impl Iterator<Item = Instrument> + '_ {
        self.0.keys().copied()
    }

    pub fn notes(&self) -> impl Iterator<Item = (Instrument, &NoteProperties)> + '_ {
        self.0.iter().map(|(i, p)| (*i, p))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Score {
    slices: Vec<Option<TimeSlice>>,
}

impl Default for Score {
    // One silent tick, so a fresh player has something to loop over.
    fn default() -> Self {
        Self {
            slices: vec![Some(TimeSlice::new())],
        }
    }
}

impl From<Vec<Option<TimeSlice>>> for Score {
    fn from(slices: Vec<Option<TimeSlice>>) -> Self {
        Self { slices }
    }
}

impl Score {
    pub fn silent(len: usize) -> Self {
        Self {
            slices: vec![None; len],
        }
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TimeSlice> {
        self.slices.get(index).and_then(|s| s.as_ref())
    }

    // Has a note for this instrument at this tick?
    pub fn has_note(&self, instrument: Instrument, index: usize) -> bool {
        self.get(index).is_some_and(|s| s.contains(instrument))
    }
}

// Lay the sparse entries out on the dense loop. Entries whose key doesn't fit
// the geometry are skipped.
pub fn build_score<'a, I>(geometry: &Geometry, entries: I) -> Score
where
    I: IntoIterator<Item = (&'a str, &'a TimeSlice)>,
{
    let mut score = Score::silent(geometry.loop_len());
    for (key, slice) in entries {
        match index_from_key(geometry, key) {
            Some(index) => score.slices[index] = Some(slice.clone()),
            None => debug!("skipping entry {:?}, outside {:?}", key, geometry),
        }
    }
    score
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use super::{NoteProperties, Score, TimeSlice, build_score};
    use crate::pipeline::geometry::Geometry;
    use crate::shared::Instrument;

    fn entries(pairs: &[(&str, TimeSlice)]) -> BTreeMap<String, TimeSlice> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn build(geometry: &Geometry, entries: &BTreeMap<String, TimeSlice>) -> Score {
        build_score(geometry, entries.iter().map(|(k, v)| (k.as_str(), v)))
    }

    #[test]
    fn length_matches_geometry() {
        for (tpb, bpb, bars) in [(1, 1, 1), (4, 4, 2), (3, 7, 5), (8, 8, 8)] {
            let g = Geometry::new(tpb, bpb, bars).unwrap();
            let score = build(&g, &BTreeMap::new());
            assert_eq!(score.len(), (tpb * bpb * bars) as usize);
            assert!((0..score.len()).all(|i| score.get(i).is_none()));
        }
    }

    #[test]
    fn places_entries_and_drops_out_of_range() {
        let g = Geometry::new(4, 4, 2).unwrap();
        let kick = TimeSlice::new().with(Instrument::J);
        let snare = TimeSlice::new().with(Instrument::H);
        let e = entries(&[("000", kick.clone()), ("100", snare.clone()), ("800", kick.clone())]);
        let score = build(&g, &e);
        assert_eq!(score.len(), 32);
        assert_eq!(score.get(0), Some(&kick));
        assert_eq!(score.get(16), Some(&snare));
        assert_eq!((0..score.len()).filter(|&i| score.get(i).is_some()).count(), 2);
        assert!(score.has_note(Instrument::H, 16));
        assert!(!score.has_note(Instrument::J, 16));
    }

    #[test]
    fn minimum_geometry_is_schedulable() {
        let g = Geometry::new(1, 1, 1).unwrap();
        let e = entries(&[("000", TimeSlice::new().with(Instrument::A))]);
        let score = build(&g, &e);
        assert_eq!(score.len(), 1);
        assert!(score.has_note(Instrument::A, 0));
    }

    #[test]
    fn slice_keeps_unknown_note_fields() {
        let json = r#"{"J": {"velocity": 0.5}, "A": {}}"#;
        let slice: TimeSlice = serde_json::from_str(json).unwrap();
        assert_eq!(slice.len(), 2);
        let (_, props) = slice.notes().find(|(i, _)| *i == Instrument::J).unwrap();
        assert_eq!(props.extra.get("velocity"), Some(&serde_json::json!(0.5)));
        let back = serde_json::to_value(&slice).unwrap();
        assert_eq!(back, serde_json::json!({"A": {}, "J": {"velocity": 0.5}}));
    }

    #[test]
    fn slice_drops_unknown_instruments() {
        let slice: TimeSlice = serde_json::from_str(r#"{"Z": {}, "B": {}}"#).unwrap();
        assert_eq!(slice.instruments().collect::<Vec<_>>(), vec![Instrument::B]);
    }

    #[test]
    fn default_score_is_one_silent_tick() {
        let score = Score::default();
        assert_eq!(score.len(), 1);
        assert_eq!(score.get(0), Some(&TimeSlice::new()));
        let mut slice = TimeSlice::new();
        slice.insert(Instrument::C, NoteProperties::default());
        assert_eq!(slice.remove(Instrument::C), Some(NoteProperties::default()));
        assert!(slice.is_empty());
    }
}
