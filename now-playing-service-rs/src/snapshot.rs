use std::{
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
};

use serde::Serialize;
use serde_json::{json, ser::PrettyFormatter, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::{logging::logger, model::StationRecord};

/// Every station's record, keyed and serialized in station-name order.
pub type Snapshot = BTreeMap<String, StationRecord>;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {path}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("snapshot {path} is not valid JSON")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode snapshot")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write snapshot {path}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// The encoded snapshot plus its content hash, ready to serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSnapshot {
    pub body: Vec<u8>,
    pub etag: String,
}

impl EncodedSnapshot {
    pub fn new(snapshot: &Snapshot) -> Result<Self, SnapshotError> {
        let body = encode(snapshot)?;
        let etag = etag(&body);
        Ok(Self { body, etag })
    }
}

/// 4-space indented JSON, keys in struct (alphabetical) order.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, SnapshotError> {
    let mut body = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut body, formatter);
    value.serialize(&mut serializer)?;
    Ok(body)
}

/// Strong ETag over the encoded bytes.
pub fn etag(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    format!("\"{}\"", hex::encode(hasher.finalize()))
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored snapshot. A missing file is `Ok(None)`.
    pub async fn read(&self) -> Result<Option<Snapshot>, SnapshotError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SnapshotError::Read {
                    path: self.display(),
                    source,
                })
            }
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|source| SnapshotError::Parse {
                path: self.display(),
                source,
            })
    }

    /// Like [`SnapshotStore::read`], but an unreadable file counts as empty.
    pub async fn load(&self) -> Snapshot {
        match self.read().await {
            Ok(snapshot) => snapshot.unwrap_or_default(),
            Err(err) => {
                logger().warn(
                    "snapshot.load_failed",
                    json!({
                        "path": self.display(),
                        "error": crate::logging::error_chain(&err),
                    }),
                );
                Snapshot::new()
            }
        }
    }

    /// Writes the encoded snapshot next to the target and renames it into place.
    pub async fn save(&self, encoded: &EncodedSnapshot) -> Result<(), SnapshotError> {
        let staging = self.staging_path();
        tokio::fs::write(&staging, &encoded.body)
            .await
            .map_err(|source| SnapshotError::Write {
                path: staging.display().to_string(),
                source,
            })?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|source| SnapshotError::Write {
                path: self.display(),
                source,
            })
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn display(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StationConfig;
    use pretty_assertions::assert_eq;

    fn record(name: &str) -> StationRecord {
        let station: StationConfig =
            serde_json::from_value(json!({"name": name, "logo": "https://example.com/logo.png"}))
                .unwrap();
        StationRecord::initial(&station)
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("info.json"));
        assert_eq!(store.read().await.unwrap(), None);
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("info.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = SnapshotStore::new(&path);
        assert!(matches!(
            store.read().await,
            Err(SnapshotError::Parse { .. })
        ));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn save_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("info.json"));
        let mut snapshot = Snapshot::new();
        snapshot.insert("NTS 1".into(), record("NTS 1"));
        snapshot.insert("Dublab".into(), record("Dublab"));

        let encoded = EncodedSnapshot::new(&snapshot).unwrap();
        store.save(&encoded).await.unwrap();

        assert_eq!(store.read().await.unwrap(), Some(snapshot));
        assert_eq!(std::fs::read(store.path()).unwrap(), encoded.body);
        assert!(!dir.path().join("info.json.tmp").exists());
    }

    #[test]
    fn encoding_is_sorted_and_indented() {
        let mut snapshot = Snapshot::new();
        snapshot.insert("b".into(), record("b"));
        snapshot.insert("a".into(), record("a"));
        let text = String::from_utf8(encode(&snapshot).unwrap()).unwrap();
        assert!(text.starts_with("{\n    \"a\": {\n        \"about\": null,"));
        assert!(text.find("\"a\":").unwrap() < text.find("\"b\":").unwrap());
    }

    #[test]
    fn etag_tracks_content() {
        let first = etag(b"{}");
        assert_eq!(first, etag(b"{}"));
        assert_ne!(first, etag(b"{ }"));
        assert!(first.starts_with('"') && first.ends_with('"'));
        assert_eq!(first.len(), 66);
    }
}
