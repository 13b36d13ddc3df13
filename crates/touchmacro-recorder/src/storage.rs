//! Macro storage - JSON lines, one file per macro
//!
//! `<dir>/<id>.jsonl`: the first line is the [`Macro`] metadata, every
//! following line one [`TouchEvent`].

use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use touchmacro_core::{Config, Error, Macro, MacroStore, Result, TouchEvent};

const EXT: &str = "jsonl";

pub struct MacroStorage {
    dir: PathBuf,
    // Serialises writers; readers go straight to the filesystem.
    write_lock: Mutex<()>,
}

impl MacroStorage {
    /// Open the default storage directory.
    pub fn new() -> Result<Self> {
        let dir = Config::default()
            .storage_dir()
            .ok_or_else(|| Error::storage("open storage", "no data directory on this host"))?;
        Self::with_dir(dir)
    }

    pub fn with_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| Error::storage("create storage dir", e))?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, id: &str) -> Result<PathBuf> {
        // Ids become file names; anything that could escape the dir is unknown.
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(Error::macro_not_found(id));
        }
        Ok(self.dir.join(format!("{}.{}", id, EXT)))
    }

    fn open(&self, id: &str) -> Result<io::Lines<BufReader<File>>> {
        let path = self.file_for(id)?;
        match File::open(&path) {
            Ok(file) => Ok(BufReader::new(file).lines()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::macro_not_found(id)),
            Err(e) => Err(Error::storage("open macro", e)),
        }
    }

    fn read_meta(&self, id: &str) -> Result<Macro> {
        let mut lines = self.open(id)?;
        let meta_line = lines
            .next()
            .ok_or_else(|| Error::storage("read macro", format!("{} is empty", id)))??;
        Ok(serde_json::from_str(&meta_line)?)
    }

    /// Write metadata plus event lines to a temp file, then swap it in.
    fn write_file(&self, meta: &Macro, events: impl Iterator<Item = String>) -> Result<()> {
        let path = self.file_for(&meta.id)?;
        let tmp = path.with_extension(format!("{}.tmp", EXT));

        let written = (|| -> Result<()> {
            let mut w = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer(&mut w, meta)?;
            writeln!(w)?;
            for line in events {
                writeln!(w, "{}", line)?;
            }
            w.flush()?;
            drop(w);
            fs::rename(&tmp, &path)?;
            Ok(())
        })();

        if written.is_err() && tmp.exists() {
            if let Err(e) = fs::remove_file(&tmp) {
                warn!(path = %tmp.display(), error = %e, "could not remove partial write");
            }
        }
        written
    }
}

impl MacroStore for MacroStorage {
    fn list_macros(&self) -> Result<Vec<Macro>> {
        let mut macros = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXT) {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match self.read_meta(id) {
                Ok(m) => macros.push(m),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable macro"),
            }
        }
        macros.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
        Ok(macros)
    }

    fn get_macro(&self, id: &str) -> Result<Macro> {
        self.read_meta(id)
    }

    fn load_events(&self, id: &str) -> Result<Vec<TouchEvent>> {
        let mut lines = self.open(id)?;
        // Metadata line.
        lines.next().transpose()?;

        let mut events = Vec::new();
        for line in lines {
            let line = line?;
            if !line.is_empty() {
                events.push(serde_json::from_str(&line)?);
            }
        }
        Ok(events)
    }

    fn save_macro(&self, macro_: &Macro, events: &[TouchEvent]) -> Result<()> {
        let mut meta = macro_.clone();
        meta.event_count = events.len();
        let lines = events
            .iter()
            .map(serde_json::to_string)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let _guard = self.write_lock.lock();
        self.write_file(&meta, lines.into_iter())?;
        debug!(id = %meta.id, events = meta.event_count, "macro saved");
        Ok(())
    }

    fn update_macro(&self, macro_: &Macro) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut lines = self.open(&macro_.id)?;
        lines.next().transpose()?;
        let events = lines.collect::<io::Result<Vec<String>>>()?;

        let mut meta = macro_.clone();
        meta.event_count = events.iter().filter(|l| !l.is_empty()).count();
        self.write_file(&meta, events.into_iter().filter(|l| !l.is_empty()))?;
        debug!(id = %meta.id, "macro metadata updated");
        Ok(())
    }

    fn delete_macro(&self, id: &str) -> Result<()> {
        let path = self.file_for(id)?;
        let _guard = self.write_lock.lock();
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(id, "macro deleted");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::macro_not_found(id)),
            Err(e) => Err(Error::storage("delete macro", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use touchmacro_core::{ErrorCode, PlaybackSettings, TouchAction};

    fn events() -> Vec<TouchEvent> {
        vec![
            TouchEvent::new(0, 10.0, 20.0, TouchAction::Down, 1.0, 0),
            TouchEvent::new(30, 15.0, 25.0, TouchAction::Move, 0.8, 0),
            TouchEvent::new(60, 20.0, 30.0, TouchAction::Up, 0.5, 0),
        ]
    }

    fn storage() -> (tempfile::TempDir, MacroStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = MacroStorage::with_dir(dir.path().join("macros")).unwrap();
        (dir, storage)
    }

    #[test]
    fn save_and_load() {
        let (_dir, storage) = storage();
        let mut m = Macro::new("abc", "swipe", 1_000);
        m.duration_ms = 60;
        storage.save_macro(&m, &events()).unwrap();

        let loaded = storage.get_macro("abc").unwrap();
        assert_eq!(loaded.name, "swipe");
        assert_eq!(loaded.event_count, 3);
        assert_eq!(loaded.duration_ms, 60);
        assert_eq!(storage.load_events("abc").unwrap(), events());

        let raw = fs::read_to_string(storage.path().join("abc.jsonl")).unwrap();
        assert_eq!(raw.lines().count(), 4);
    }

    #[test]
    fn list_is_newest_first() {
        let (_dir, storage) = storage();
        storage.save_macro(&Macro::new("old", "a", 1), &events()).unwrap();
        storage.save_macro(&Macro::new("new", "b", 5), &events()).unwrap();
        storage.save_macro(&Macro::new("mid", "c", 3), &events()).unwrap();
        fs::write(storage.path().join("junk.jsonl"), "not json\n").unwrap();
        fs::write(storage.path().join("notes.txt"), "ignored").unwrap();

        let ids: Vec<String> = storage
            .list_macros()
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn update_keeps_events() {
        let (_dir, storage) = storage();
        let m = Macro::new("abc", "swipe", 1_000);
        storage.save_macro(&m, &events()).unwrap();

        let edited = m.with_settings(PlaybackSettings {
            repeat_count: 4,
            interval_minutes: Some(15),
            ..Default::default()
        });
        storage.update_macro(&edited).unwrap();

        let loaded = storage.get_macro("abc").unwrap();
        assert_eq!(loaded.settings.repeat_count, 4);
        assert_eq!(loaded.event_count, 3);
        assert_eq!(storage.load_events("abc").unwrap(), events());
        assert_eq!(storage.scheduled_macros(0).unwrap().len(), 1);
    }

    #[test]
    fn missing_macro_is_not_found() {
        let (_dir, storage) = storage();
        assert_eq!(storage.get_macro("nope").unwrap_err().code, ErrorCode::NotFound);
        assert!(storage.load_events("nope").unwrap_err().is_not_found());
        assert!(storage.delete_macro("nope").unwrap_err().is_not_found());
        assert!(storage.update_macro(&Macro::new("nope", "x", 0)).is_err());
        assert!(storage.get_macro("../etc/passwd").unwrap_err().is_not_found());
    }

    #[test]
    fn macro_without_events_loads_empty() {
        let (_dir, storage) = storage();
        storage.save_macro(&Macro::new("empty", "e", 0), &[]).unwrap();
        assert!(storage.load_events("empty").unwrap().is_empty());
    }

    #[test]
    fn failed_write_leaves_no_temp_file() {
        let (_dir, storage) = storage();
        // A directory where the macro file belongs makes the final rename fail.
        fs::create_dir(storage.path().join("blocked.jsonl")).unwrap();

        assert!(storage.save_macro(&Macro::new("blocked", "x", 0), &events()).is_err());
        assert!(!storage.path().join("blocked.jsonl.tmp").exists());
        assert!(storage.path().join("blocked.jsonl").is_dir());
    }

    #[test]
    fn delete_removes_file() {
        let (_dir, storage) = storage();
        storage.save_macro(&Macro::new("abc", "x", 0), &events()).unwrap();
        storage.delete_macro("abc").unwrap();
        assert!(storage.list_macros().unwrap().is_empty());
    }
}
