use std::path::PathBuf;
use std::thread;

use anyhow::Context;
use crossbeam_channel::Receiver;
use log::{debug, warn};

use crate::shared::Instrument;

// Where raw sample files come from. Decoding happens later, once the output
// sample rate is known.
pub trait SampleSource: Send + 'static {
    fn fetch(&self, instrument: Instrument) -> anyhow::Result<Vec<u8>>;
}

// <dir>/<code>.wav
pub struct DirectorySource {
    pub dir: PathBuf,
}

impl SampleSource for DirectorySource {
    fn fetch(&self, instrument: Instrument) -> anyhow::Result<Vec<u8>> {
        let path = self.dir.join(format!("{}.wav", instrument.code()));
        std::fs::read(&path).with_context(|| format!("reading {}", path.display()))
    }
}

pub type Fetched = (Instrument, anyhow::Result<Vec<u8>>);

// Sample fetches running in the background, started as soon as the player
// exists so they overlap with everything else.
pub struct SampleFetch {
    rx: Receiver<Fetched>,
    expected: usize,
}

impl SampleFetch {
    pub fn spawn<S: SampleSource>(source: S, instruments: Vec<Instrument>) -> Self {
        let expected = instruments.len();
        let (tx, rx) = crossbeam_channel::bounded::<Fetched>(expected.max(1));
        let spawned = thread::Builder::new()
            .name("sample-fetch".into())
            .spawn(move || {
                for instrument in instruments {
                    let result = source.fetch(instrument);
                    debug!("fetched sample for {}: ok={}", instrument.code(), result.is_ok());
                    if tx.send((instrument, result)).is_err() {
                        break; // nobody is waiting anymore
                    }
                }
            });
        if let Err(e) = spawned {
            warn!("could not start sample fetch thread: {e}");
        }
        Self { rx, expected }
    }

    // Block until every fetch has reported. Fetches that never report (the
    // thread died) simply don't show up.
    pub fn wait(self) -> Vec<Fetched> {
        self.rx.iter().take(self.expected).collect()
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use super::{DirectorySource, SampleFetch, SampleSource};
    use crate::shared::Instrument;

    struct MapSource(BTreeMap<Instrument, Vec<u8>>);

    impl SampleSource for MapSource {
        fn fetch(&self, instrument: Instrument) -> anyhow::Result<Vec<u8>> {
            self.0
                .get(&instrument)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no sample for {}", instrument.code()))
        }
    }

    #[test]
    fn reports_every_instrument() {
        let source = MapSource(BTreeMap::from([(Instrument::A, vec![1, 2, 3])]));
        let fetched = SampleFetch::spawn(source, vec![Instrument::A, Instrument::B]).wait();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].0, Instrument::A);
        assert_eq!(fetched[0].1.as_ref().unwrap(), &vec![1, 2, 3]);
        assert!(fetched[1].1.is_err());
    }

    #[test]
    fn missing_directory_is_an_error_per_instrument() {
        let source = DirectorySource {
            dir: std::env::temp_dir().join("beatchannel-no-such-sounds-dir"),
        };
        assert!(source.fetch(Instrument::J).is_err());
    }

    #[test]
    fn nothing_to_fetch() {
        let source = MapSource(BTreeMap::new());
        assert!(SampleFetch::spawn(source, vec![]).wait().is_empty());
    }
}
