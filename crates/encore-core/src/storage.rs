//! Recording storage - one pretty JSON document per recording
//!
//! Documents are `{"metadata": {...}, "events": [...]}`. A bare event array
//! (the older flat format) still loads, with metadata filled in from defaults.

use crate::error::{Error, Result};
use crate::events::{Event, Metadata, Recording, FORMAT_VERSION, LEGACY_FORMAT_VERSION};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const EXTENSION: &str = "json";

#[derive(Deserialize)]
struct Document {
    #[serde(default = "default_metadata")]
    metadata: Metadata,
    events: Vec<Event>,
}

fn default_metadata() -> Metadata {
    Metadata {
        version: LEGACY_FORMAT_VERSION,
        name: "untitled".to_string(),
        event_count: 0,
        duration: 0.0,
        recorded_at: DateTime::<Utc>::default(),
        mouse_moves_included: false,
    }
}

/// Parse either document shape. Count and duration are always re-derived
/// from the events.
pub fn parse_document(text: &str) -> Result<Recording> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let mut recording = match value {
        serde_json::Value::Array(_) => {
            let events: Vec<Event> = serde_json::from_value(value)?;
            let mut metadata = default_metadata();
            metadata.mouse_moves_included = events.iter().any(Event::is_move);
            Recording { metadata, events }
        }
        serde_json::Value::Object(_) => {
            let doc: Document = serde_json::from_value(value)?;
            Recording {
                metadata: doc.metadata,
                events: doc.events,
            }
        }
        other => {
            return Err(Error::malformed(format!(
                "expected an object or an array, found {}",
                kind_of(&other)
            )))
        }
    };

    if recording.metadata.event_count != 0
        && recording.metadata.event_count != recording.events.len()
    {
        warn!(
            declared = recording.metadata.event_count,
            actual = recording.events.len(),
            "event count mismatch, using actual"
        );
    }
    recording.refresh_metadata();
    Ok(recording)
}

/// Serialize as the current document format
pub fn to_document(recording: &Recording) -> Result<String> {
    let mut out = recording.clone();
    out.metadata.version = FORMAT_VERSION;
    out.refresh_metadata();
    Ok(serde_json::to_string_pretty(&out)?)
}

fn kind_of(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

pub struct RecordingStorage {
    dir: PathBuf,
}

impl RecordingStorage {
    /// `$ENCORE_DIR`, or `~/.encore`
    pub fn new() -> Result<Self> {
        let dir = match std::env::var_os("ENCORE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => {
                let home = std::env::var_os("HOME").ok_or_else(|| {
                    Error::new(crate::error::ErrorCode::Io, "HOME not set")
                        .with_suggestions(vec!["Set ENCORE_DIR".to_string()])
                })?;
                PathBuf::from(home).join(".encore")
            }
        };
        Self::with_dir(dir)
    }

    pub fn with_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn save(&self, recording: &Recording) -> Result<PathBuf> {
        let ts = Utc::now().format("%Y%m%d_%H%M%S");
        let name = sanitize(recording.name());
        let mut path = self.dir.join(format!("{}_{}.{}", name, ts, EXTENSION));
        let mut n = 1;
        while path.exists() {
            path = self.dir.join(format!("{}_{}_{}.{}", name, ts, n, EXTENSION));
            n += 1;
        }
        self.save_path(recording, &path)?;
        Ok(path)
    }

    pub fn save_path(&self, recording: &Recording, path: &Path) -> Result<()> {
        fs::write(path, to_document(recording)?)?;
        debug!(path = %path.display(), events = recording.len(), "recording saved");
        Ok(())
    }

    /// Load by file name inside the storage directory, or by an explicit path
    pub fn load(&self, file: &str) -> Result<Recording> {
        let in_dir = self.dir.join(file);
        if in_dir.is_file() {
            return self.load_path(&in_dir);
        }
        let direct = Path::new(file);
        if direct.is_file() {
            return self.load_path(direct);
        }
        Err(Error::not_found(file).with_suggestions(vec!["Run `encore list`".to_string()]))
    }

    pub fn load_path(&self, path: &Path) -> Result<Recording> {
        let text = fs::read_to_string(path)?;
        parse_document(&text).map_err(|e| {
            e.with_context(serde_json::json!({ "path": path.display().to_string() }))
        })
    }

    pub fn list(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(s) = name.to_str() {
                if s.ends_with(".json") {
                    files.push(s.to_string());
                }
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn delete(&self, file: &str) -> Result<()> {
        fs::remove_file(self.dir.join(file))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::events::{Button, KeyDirection, MouseKind, Point};

    fn sample() -> Recording {
        Recording::new(
            "my macro",
            vec![
                Event::key(0.0, KeyDirection::Down, Some("a"), 0),
                Event::hold(0.5, Button::Left, Point::new(1.0, 2.0), 0.25),
            ],
            false,
        )
    }

    #[test]
    fn document_has_metadata_wrapper() {
        let v: serde_json::Value = serde_json::from_str(&to_document(&sample()).unwrap()).unwrap();
        assert_eq!(v["metadata"]["name"], "my macro");
        assert_eq!(v["metadata"]["eventCount"], 2);
        assert_eq!(v["metadata"]["duration"], 0.75);
        assert_eq!(v["metadata"]["version"], FORMAT_VERSION);
        assert!(v["metadata"]["recordedAt"].is_string());
        assert_eq!(v["metadata"]["mouseMovesIncluded"], false);
        assert_eq!(v["events"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn legacy_flat_array_gets_defaults() {
        let text = r#"[
            {"type":"mouse","offset":0.0,"kind":"move","point":{"x":1,"y":1}},
            {"type":"mouse","offset":0.2,"kind":"leftDown","point":{"x":1,"y":1}},
            {"type":"mouse","offset":0.6,"kind":"leftUp","point":{"x":1,"y":1}}
        ]"#;
        let r = parse_document(text).unwrap();
        assert_eq!(r.name(), "untitled");
        assert_eq!(r.metadata.version, LEGACY_FORMAT_VERSION);
        assert_eq!(r.metadata.event_count, 3);
        assert_eq!(r.metadata.duration, 0.6);
        assert!(r.metadata.mouse_moves_included);
        assert!(matches!(&r.events[1], Event::Mouse(m) if m.kind == MouseKind::LeftDown));
    }

    #[test]
    fn stale_count_is_rederived() {
        let text = r#"{"metadata":{"name":"x","eventCount":9},"events":[
            {"type":"scroll","offset":1.5,"point":{"x":0,"y":0},"delta":{"dx":0,"dy":-2}}
        ]}"#;
        let r = parse_document(text).unwrap();
        assert_eq!(r.metadata.event_count, 1);
        assert_eq!(r.metadata.duration, 1.5);
    }

    #[test]
    fn malformed_inputs_are_reported() {
        for text in [
            "not json",
            "42",
            r#"{"metadata":{}}"#,
            r#"[{"type":"mouse","offset":0.0}]"#,
            r#"[{"type":"teleport","offset":0.0}]"#,
        ] {
            let err = parse_document(text).unwrap_err();
            assert_eq!(err.code, ErrorCode::MalformedData, "input: {}", text);
        }
    }

    #[test]
    fn save_load_list_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = RecordingStorage::with_dir(dir.path()).unwrap();
        let path = storage.save(&sample()).unwrap();
        let file = path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(file.starts_with("my_macro_"));

        assert_eq!(storage.list().unwrap(), vec![file.clone()]);
        let loaded = storage.load(&file).unwrap();
        assert_eq!(loaded.events, sample().events);

        storage.delete(&file).unwrap();
        assert!(storage.list().unwrap().is_empty());
        assert_eq!(storage.load(&file).unwrap_err().code, ErrorCode::NotFound);
    }

    #[test]
    fn second_save_in_same_second_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let storage = RecordingStorage::with_dir(dir.path()).unwrap();
        let a = storage.save(&sample()).unwrap();
        let b = storage.save(&sample()).unwrap();
        assert_ne!(a, b);
        assert_eq!(storage.list().unwrap().len(), 2);
    }
}
