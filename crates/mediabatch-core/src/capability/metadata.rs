//! Per-file tag stores.
//!
//! The engine addresses tags by their Exiv2-style keys
//! (`Exif.Photo.DateTimeOriginal`, `Iptc.Application2.Keywords`, ...). The
//! default store reads EXIF times and orientation with `kamadak-exif`;
//! keyword lists are read lazily and all writes are flushed through
//! `exiftool`, since there is no pure Rust IPTC/XMP writer.

use async_trait::async_trait;
use exif::{In, Reader, Tag, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::OnceLock;
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::error::MetadataError;
use crate::types::{TimeKey, ORIENTATION_KEY, TAG_KEYS};

/// Read/write access to the tags of one file.
#[async_trait]
pub trait TagStore: Send + Sync {
    fn has_tag(&self, key: &str) -> bool;

    fn get_string(&self, key: &str) -> Option<String>;

    fn set_string(&mut self, key: &str, value: &str);

    /// Integer tag such as the orientation.
    fn get_long(&self, key: &str) -> Option<i64>;

    /// Multi-valued tag such as a keyword list.
    fn get_multiple(&self, key: &str) -> Vec<String>;

    fn set_multiple(&mut self, key: &str, values: &[String]);

    /// Persist pending changes to the file.
    async fn save(&mut self) -> Result<(), MetadataError>;
}

/// Opens tag stores for files.
pub trait MetadataProvider: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn TagStore>, MetadataError>;
}

/// exiftool names of the keys the engine uses.
const EXIFTOOL_NAMES: [(&str, &str); 6] = [
    ("Exif.Photo.DateTimeOriginal", "EXIF:DateTimeOriginal"),
    ("Exif.Photo.DateTimeDigitized", "EXIF:CreateDate"),
    ("Exif.Image.DateTime", "EXIF:ModifyDate"),
    ("Exif.Image.Orientation", "EXIF:Orientation"),
    ("Iptc.Application2.Keywords", "IPTC:Keywords"),
    ("Xmp.dc.subject", "XMP-dc:Subject"),
];

fn exiftool_name(key: &str) -> Option<&'static str> {
    EXIFTOOL_NAMES
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, name)| *name)
}

/// Default provider: `kamadak-exif` for reading, `exiftool` for the rest.
#[derive(Debug, Clone)]
pub struct ExifMetadata {
    exiftool: String,
}

impl ExifMetadata {
    pub fn new(exiftool: impl Into<String>) -> Self {
        Self {
            exiftool: exiftool.into(),
        }
    }
}

impl MetadataProvider for ExifMetadata {
    fn open(&self, path: &Path) -> Result<Box<dyn TagStore>, MetadataError> {
        let file = File::open(path).map_err(|e| MetadataError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut store = ExifStore {
            path: path.to_path_buf(),
            exiftool: self.exiftool.clone(),
            strings: BTreeMap::new(),
            longs: BTreeMap::new(),
            lists: OnceLock::new(),
            pending_strings: BTreeMap::new(),
            pending_lists: BTreeMap::new(),
        };

        let mut reader = BufReader::new(file);
        match Reader::new().read_from_container(&mut reader) {
            Ok(exif) => {
                for (key, tag) in [
                    (TimeKey::DateTimeOriginal, Tag::DateTimeOriginal),
                    (TimeKey::DateTimeDigitized, Tag::DateTimeDigitized),
                    (TimeKey::DateTime, Tag::DateTime),
                ] {
                    if let Some(value) = get_ascii(&exif, tag) {
                        store.strings.insert(key.tag().to_string(), value);
                    }
                }
                if let Some(orientation) = get_long(&exif, Tag::Orientation) {
                    store.longs.insert(ORIENTATION_KEY.to_string(), orientation);
                }
            }
            Err(e) => tracing::debug!("No EXIF data in {}: {}", path.display(), e),
        }

        Ok(Box::new(store))
    }
}

fn get_ascii(exif: &exif::Exif, tag: Tag) -> Option<String> {
    exif.get_field(tag, In::PRIMARY)
        .and_then(|f| match &f.value {
            Value::Ascii(v) => v.first().map(|s| {
                String::from_utf8_lossy(s)
                    .trim_end_matches('\0')
                    .trim()
                    .to_string()
            }),
            _ => None,
        })
        .filter(|s| !s.is_empty())
}

fn get_long(exif: &exif::Exif, tag: Tag) -> Option<i64> {
    exif.get_field(tag, In::PRIMARY).and_then(|f| match &f.value {
        Value::Short(v) => v.first().map(|&x| i64::from(x)),
        Value::Long(v) => v.first().map(|&x| i64::from(x)),
        _ => None,
    })
}

struct ExifStore {
    path: PathBuf,
    exiftool: String,
    strings: BTreeMap<String, String>,
    longs: BTreeMap<String, i64>,
    lists: OnceLock<BTreeMap<String, Vec<String>>>,
    pending_strings: BTreeMap<String, String>,
    pending_lists: BTreeMap<String, Vec<String>>,
}

impl ExifStore {
    fn lists(&self) -> &BTreeMap<String, Vec<String>> {
        self.lists.get_or_init(|| match self.read_lists() {
            Ok(lists) => lists,
            Err(e) => {
                tracing::warn!("{}", e);
                BTreeMap::new()
            }
        })
    }

    fn read_lists(&self) -> Result<BTreeMap<String, Vec<String>>, MetadataError> {
        let read_error = |message: String| MetadataError::Read {
            path: self.path.clone(),
            message,
        };

        let mut command = Command::new(&self.exiftool);
        command.args(["-j", "-G1"]);
        for key in TAG_KEYS {
            if let Some(name) = exiftool_name(key) {
                command.arg(format!("-{name}"));
            }
        }
        command.arg(&self.path);
        let output = output_blocking(&mut command)
            .map_err(|e| read_error(format!("{}: {}", self.exiftool, e)))?;
        if !output.status.success() {
            return Err(read_error(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let parsed: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| read_error(format!("unexpected exiftool output: {e}")))?;
        let record = parsed.get(0).cloned().unwrap_or_default();

        let mut lists = BTreeMap::new();
        for key in TAG_KEYS {
            let Some(name) = exiftool_name(key) else {
                continue;
            };
            let values = match record.get(name) {
                Some(serde_json::Value::Array(items)) => items.iter().map(json_text).collect(),
                Some(value) => vec![json_text(value)],
                None => Vec::new(),
            };
            lists.insert(key.to_string(), values);
        }
        Ok(lists)
    }
}

/// Keyword lists are read from synchronous getters, so the lazy exiftool
/// call moves off the async workers when a multi-threaded runtime runs us.
fn output_blocking(command: &mut Command) -> io::Result<Output> {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| command.output())
        }
        _ => command.output(),
    }
}

fn json_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl TagStore for ExifStore {
    fn has_tag(&self, key: &str) -> bool {
        if TAG_KEYS.contains(&key) {
            return !self.get_multiple(key).is_empty();
        }
        self.strings.contains_key(key) || self.longs.contains_key(key)
    }

    fn get_string(&self, key: &str) -> Option<String> {
        self.strings.get(key).cloned()
    }

    fn set_string(&mut self, key: &str, value: &str) {
        self.strings.insert(key.to_string(), value.to_string());
        self.pending_strings
            .insert(key.to_string(), value.to_string());
    }

    fn get_long(&self, key: &str) -> Option<i64> {
        self.longs.get(key).copied()
    }

    fn get_multiple(&self, key: &str) -> Vec<String> {
        if let Some(values) = self.pending_lists.get(key) {
            return values.clone();
        }
        self.lists().get(key).cloned().unwrap_or_default()
    }

    fn set_multiple(&mut self, key: &str, values: &[String]) {
        self.pending_lists.insert(key.to_string(), values.to_vec());
    }

    async fn save(&mut self) -> Result<(), MetadataError> {
        if self.pending_strings.is_empty() && self.pending_lists.is_empty() {
            return Ok(());
        }
        let write_error = |message: String| MetadataError::Write {
            path: self.path.clone(),
            message,
        };

        let mut args = vec!["-overwrite_original".to_string(), "-P".to_string()];
        for (key, value) in &self.pending_strings {
            let name = exiftool_name(key)
                .ok_or_else(|| write_error(format!("unsupported tag {key}")))?;
            args.push(format!("-{name}={value}"));
        }
        for (key, values) in &self.pending_lists {
            let name = exiftool_name(key)
                .ok_or_else(|| write_error(format!("unsupported tag {key}")))?;
            if values.is_empty() {
                args.push(format!("-{name}="));
            }
            for value in values {
                args.push(format!("-{name}={value}"));
            }
        }

        tracing::debug!("Writing {} tag(s) to {}", args.len() - 2, self.path.display());
        let output = tokio::process::Command::new(&self.exiftool)
            .args(&args)
            .arg(&self.path)
            .output()
            .await
            .map_err(|e| write_error(format!("{}: {}", self.exiftool, e)))?;
        if !output.status.success() {
            return Err(write_error(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        self.pending_strings.clear();
        let written = std::mem::take(&mut self.pending_lists);
        if let Some(lists) = self.lists.get_mut() {
            lists.extend(written);
        } else {
            let _ = self.lists.set(written);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file() {
        let provider = ExifMetadata::new("exiftool");
        let result = provider.open(Path::new("/nonexistent/file.jpg"));
        assert!(matches!(result, Err(MetadataError::Read { .. })));
    }

    #[test]
    fn test_open_file_without_exif() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.jpg");
        std::fs::write(&path, b"not really a jpeg").unwrap();

        let store = ExifMetadata::new("exiftool").open(&path).unwrap();
        assert!(!store.has_tag("Exif.Photo.DateTimeOriginal"));
        assert_eq!(store.get_long(ORIENTATION_KEY), None);
    }

    #[test]
    fn test_set_string_is_visible_before_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.jpg");
        std::fs::write(&path, b"x").unwrap();

        let mut store = ExifMetadata::new("exiftool").open(&path).unwrap();
        store.set_string("Exif.Image.DateTime", "2020:01:01 00:00:00");
        assert!(store.has_tag("Exif.Image.DateTime"));
        assert_eq!(
            store.get_string("Exif.Image.DateTime").as_deref(),
            Some("2020:01:01 00:00:00")
        );
    }

    /// Stand-in exiftool: logs its arguments next to itself and prints
    /// `stdout`.
    #[cfg(unix)]
    fn fake_exiftool(dir: &Path, stdout: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("exiftool");
        let log = dir.join("exiftool.log");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\nfor a in \"$@\"; do echo \"$a\" >> '{}'; done\nprintf '%s' '{}'\n",
                log.display(),
                stdout
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_save_writes_pending_tags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.jpg");
        std::fs::write(&path, b"x").unwrap();
        let exiftool = fake_exiftool(dir.path(), "");
        let log = dir.path().join("exiftool.log");

        let mut store = ExifMetadata::new(exiftool.to_string_lossy()).open(&path).unwrap();
        store.save().await.unwrap();
        assert!(!log.exists());

        store.set_string("Exif.Image.DateTime", "2020:01:01 00:00:00");
        store.set_multiple("Xmp.dc.subject", &["Trip".to_string()]);
        store.save().await.unwrap();

        let args = std::fs::read_to_string(&log).unwrap();
        let args: Vec<&str> = args.lines().collect();
        assert_eq!(args[..2], ["-overwrite_original", "-P"]);
        assert!(args.contains(&"-EXIF:ModifyDate=2020:01:01 00:00:00"));
        assert!(args.contains(&"-XMP-dc:Subject=Trip"));
        assert_eq!(args.last().copied(), Some(path.to_str().unwrap()));
        // Written lists are served without asking exiftool again
        assert_eq!(store.get_multiple("Xmp.dc.subject"), vec!["Trip"]);
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn test_keywords_read_inside_multi_thread_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.jpg");
        std::fs::write(&path, b"x").unwrap();
        let exiftool = fake_exiftool(dir.path(), r#"[{"IPTC:Keywords":["Beach","Sun"]}]"#);

        let store = ExifMetadata::new(exiftool.to_string_lossy()).open(&path).unwrap();
        assert_eq!(store.get_multiple("Iptc.Application2.Keywords"), vec!["Beach", "Sun"]);
        assert!(store.get_multiple("Xmp.dc.subject").is_empty());
        assert!(store.has_tag("Iptc.Application2.Keywords"));
    }

    #[test]
    fn test_exiftool_names_cover_engine_keys() {
        for key in TimeKey::ALL {
            assert!(exiftool_name(key.tag()).is_some());
        }
        for key in TAG_KEYS {
            assert!(exiftool_name(key).is_some());
        }
        assert!(exiftool_name(ORIENTATION_KEY).is_some());
    }
}
