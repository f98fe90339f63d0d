// Local stand-in for the shared document store: each channel is one JSON file.
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::{debug, warn};

use crate::pipeline::channel::ChannelDoc;

pub const APP_DIR: &str = ".beatchannel";

// <project_dir>/.beatchannel/<channel>.json
pub fn channel_file_path(project_dir: &Path, channel: &str) -> PathBuf {
    project_dir.join(APP_DIR).join(format!("{channel}.json"))
}

// Where an unreadable channel file is moved before starting over.
pub fn corrupt_file_path(project_dir: &Path, channel: &str) -> PathBuf {
    project_dir.join(APP_DIR).join(format!("{channel}.json.corrupt"))
}

// A missing file is a new channel. An unreadable one is moved aside, so the
// next save doesn't overwrite it, and the channel starts fresh.
pub fn load_channel(project_dir: &Path, channel: &str) -> ChannelDoc {
    let path = channel_file_path(project_dir, channel);
    let data = match std::fs::read_to_string(&path) {
        Ok(data) => data,
        Err(_) => {
            debug!("no channel file at {}, starting fresh", path.display());
            return ChannelDoc::named(channel);
        }
    };
    match serde_json::from_str(&data) {
        Ok(doc) => doc,
        Err(e) => {
            let aside = corrupt_file_path(project_dir, channel);
            warn!("could not parse {}: {e}, moving it to {}", path.display(), aside.display());
            if let Err(e) = std::fs::rename(&path, &aside) {
                warn!("could not move {} aside: {e}", path.display());
            }
            ChannelDoc::named(channel)
        }
    }
}

// Save the channel, making the directory if it doesn't exist already
pub fn save_channel(project_dir: &Path, channel: &str, doc: &ChannelDoc) -> anyhow::Result<()> {
    let path = channel_file_path(project_dir, channel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(doc)?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    debug!("saved channel to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod test {
    use super::{load_channel, save_channel};
    use crate::pipeline::channel::ChannelDoc;
    use crate::pipeline::settings::SettingName;
    use crate::shared::Instrument;

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("beatchannel-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn save_then_load() {
        let dir = scratch_dir("save");
        let mut doc = ChannelDoc::named("jam");
        doc.adjust_setting(SettingName::BeatsPerMinute, 20);
        doc.toggle_note(Instrument::E, 5);
        save_channel(&dir, "jam", &doc).unwrap();

        let loaded = load_channel(&dir, "jam");
        assert_eq!(loaded, doc);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_or_corrupt_file_gives_fresh_channel() {
        let dir = scratch_dir("corrupt");
        assert_eq!(load_channel(&dir, "nope"), ChannelDoc::named("nope"));

        std::fs::create_dir_all(dir.join(super::APP_DIR)).unwrap();
        std::fs::write(super::channel_file_path(&dir, "bad"), "{not json").unwrap();
        assert_eq!(load_channel(&dir, "bad"), ChannelDoc::named("bad"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_file_survives_the_next_save() {
        let dir = scratch_dir("keep-corrupt");
        std::fs::create_dir_all(dir.join(super::APP_DIR)).unwrap();
        let path = super::channel_file_path(&dir, "jam");
        std::fs::write(&path, "{\"notes\": {\"000\": ").unwrap();

        let doc = load_channel(&dir, "jam");
        assert_eq!(doc, ChannelDoc::named("jam"));
        assert!(!path.exists());
        save_channel(&dir, "jam", &doc).unwrap();

        let kept = std::fs::read_to_string(super::corrupt_file_path(&dir, "jam")).unwrap();
        assert_eq!(kept, "{\"notes\": {\"000\": ");
        assert_eq!(load_channel(&dir, "jam"), doc);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
