//! Filesystem persistence for trained classifier artifacts.
//!
//! Versioned single-owner store. Each save writes a new
//! `classifier-<seq>.bin` (temp file -> fsync -> rename), then atomically
//! repoints `classifier.current` at it and prunes old versions down to the
//! retention limit. Readers follow the pointer, so a predict racing a train
//! sees either the previous complete artifact or the new one, never a
//! partial write. No locking across processes.
//!
//! Artifact layout (little-endian):
//!
//! Header (53 bytes):
//! - version: u8 (1)
//! - model_id: [u8; 32] (SHA-256 of the embedding model name)
//! - dimensions: u32 (feature count = 2 x embedding dim)
//! - created_at: i64 (unix seconds)
//! - accuracy: f32 (held-out accuracy at train time)
//! - checksum: u32 (CRC32 of header bytes before this field)
//!
//! Payload:
//! - weights: [f32; dimensions]
//! - bias: f32
//! - checksum: u32 (CRC32 of payload bytes before this field)

use std::path::{Path, PathBuf};

/// Current artifact format version
const FORMAT_VERSION: u8 = 1;

/// Header size: version(1) + model_id(32) + dimensions(4) + created_at(8)
/// + accuracy(4) + checksum(4)
const HEADER_SIZE: usize = 53;

/// Pointer file naming the current artifact
const CURRENT_POINTER: &str = "classifier.current";

/// Errors from artifact persistence.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no classifier artifact saved")]
    NotFound,

    #[error("invalid artifact format: {0}")]
    InvalidFormat(String),

    #[error("artifact version {0} unsupported (max {1})")]
    VersionMismatch(u8, u8),

    #[error("artifact was trained against a different embedding model")]
    ModelMismatch,

    #[error("checksum mismatch: artifact may be corrupted")]
    ChecksumMismatch,
}

/// A trained classifier as persisted: fitted parameters plus metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredArtifact {
    pub weights: Vec<f32>,
    pub bias: f32,
    pub accuracy: f32,
    pub created_at: i64,
}

/// Versioned artifact store rooted at one directory.
pub struct ModelStore {
    dir: PathBuf,
    model_id: [u8; 32],
    retention: usize,
}

impl ModelStore {
    /// `retention` is the number of artifact versions kept on disk;
    /// values below 1 are treated as 1.
    pub fn new(dir: PathBuf, model_id: [u8; 32], retention: usize) -> Self {
        Self {
            dir,
            model_id,
            retention: retention.max(1),
        }
    }

    /// Whether a loadable current artifact exists, without reading it.
    pub fn exists(&self) -> bool {
        self.current_target()
            .map(|path| path.exists())
            .unwrap_or(false)
    }

    /// Path of the current artifact, if any.
    pub fn current_ref(&self) -> Option<PathBuf> {
        self.current_target().filter(|path| path.exists())
    }

    /// Persist a new artifact version and swap the current pointer to it.
    /// Returns the new artifact's path.
    pub fn save(&self, artifact: &StoredArtifact) -> Result<PathBuf, StoreError> {
        std::fs::create_dir_all(&self.dir)?;

        let seq = self.next_sequence()?;
        let name = format!("classifier-{seq:06}.bin");
        let path = self.dir.join(&name);

        write_atomic(&path, &encode(artifact, &self.model_id))?;
        write_atomic(&self.dir.join(CURRENT_POINTER), name.as_bytes())?;

        self.prune(seq)?;

        log::info!("saved classifier artifact {}", path.display());
        Ok(path)
    }

    /// Load the artifact the current pointer names.
    pub fn load_current(&self) -> Result<StoredArtifact, StoreError> {
        let path = self.current_target().ok_or(StoreError::NotFound)?;
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound)
            }
            Err(e) => return Err(e.into()),
        };
        decode(&bytes, &self.model_id)
    }

    fn current_target(&self) -> Option<PathBuf> {
        let pointer = self.dir.join(CURRENT_POINTER);
        let name = std::fs::read_to_string(pointer).ok()?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(self.dir.join(name))
    }

    fn next_sequence(&self) -> Result<u64, StoreError> {
        Ok(self.list_versions()?.last().map(|(seq, _)| seq + 1).unwrap_or(1))
    }

    /// Artifact versions on disk, ascending by sequence number.
    fn list_versions(&self) -> Result<Vec<(u64, PathBuf)>, StoreError> {
        let mut versions = Vec::new();
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(versions),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(seq) = name
                .strip_prefix("classifier-")
                .and_then(|rest| rest.strip_suffix(".bin"))
                .and_then(|digits| digits.parse::<u64>().ok())
            {
                versions.push((seq, entry.path()));
            }
        }

        versions.sort_by_key(|(seq, _)| *seq);
        Ok(versions)
    }

    /// Delete versions older than the retention window. `newest` is the
    /// sequence just written and is always kept.
    fn prune(&self, newest: u64) -> Result<(), StoreError> {
        let versions = self.list_versions()?;
        let keep_from = versions.len().saturating_sub(self.retention);

        for (seq, path) in &versions[..keep_from] {
            if *seq == newest {
                continue;
            }
            if let Err(e) = std::fs::remove_file(path) {
                log::warn!("failed to prune old artifact {}: {e}", path.display());
            }
        }
        Ok(())
    }
}

/// Write bytes via temp file, fsync, atomic rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let temp_path = path.with_extension("tmp");

    let result = (|| -> Result<(), StoreError> {
        std::fs::write(&temp_path, bytes)?;
        let file = std::fs::File::open(&temp_path)?;
        file.sync_all()?;
        std::fs::rename(&temp_path, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    result
}

fn encode(artifact: &StoredArtifact, model_id: &[u8; 32]) -> Vec<u8> {
    let dim = artifact.weights.len() as u32;
    let mut bytes = Vec::with_capacity(HEADER_SIZE + artifact.weights.len() * 4 + 8);

    bytes.push(FORMAT_VERSION);
    bytes.extend_from_slice(model_id);
    bytes.extend_from_slice(&dim.to_le_bytes());
    bytes.extend_from_slice(&artifact.created_at.to_le_bytes());
    bytes.extend_from_slice(&artifact.accuracy.to_le_bytes());
    let header_checksum = crc32fast::hash(&bytes);
    bytes.extend_from_slice(&header_checksum.to_le_bytes());

    let payload_start = bytes.len();
    for w in &artifact.weights {
        bytes.extend_from_slice(&w.to_le_bytes());
    }
    bytes.extend_from_slice(&artifact.bias.to_le_bytes());
    let payload_checksum = crc32fast::hash(&bytes[payload_start..]);
    bytes.extend_from_slice(&payload_checksum.to_le_bytes());

    bytes
}

fn decode(bytes: &[u8], expected_model_id: &[u8; 32]) -> Result<StoredArtifact, StoreError> {
    if bytes.len() < HEADER_SIZE {
        return Err(StoreError::InvalidFormat("artifact truncated".to_string()));
    }

    let version = bytes[0];
    if version > FORMAT_VERSION {
        return Err(StoreError::VersionMismatch(version, FORMAT_VERSION));
    }

    let stored_header_checksum = read_u32(&bytes[49..53]);
    if crc32fast::hash(&bytes[..49]) != stored_header_checksum {
        return Err(StoreError::ChecksumMismatch);
    }

    let mut model_id = [0u8; 32];
    model_id.copy_from_slice(&bytes[1..33]);
    if model_id != *expected_model_id {
        return Err(StoreError::ModelMismatch);
    }

    let dim = read_u32(&bytes[33..37]) as usize;
    let created_at = i64::from_le_bytes(bytes[37..45].try_into().expect("8-byte slice"));
    let accuracy = f32::from_le_bytes(bytes[45..49].try_into().expect("4-byte slice"));

    let expected_len = HEADER_SIZE + dim * 4 + 4 + 4;
    if bytes.len() != expected_len {
        return Err(StoreError::InvalidFormat(format!(
            "expected {expected_len} bytes for {dim} weights, got {}",
            bytes.len()
        )));
    }

    let payload = &bytes[HEADER_SIZE..bytes.len() - 4];
    let stored_payload_checksum = read_u32(&bytes[bytes.len() - 4..]);
    if crc32fast::hash(payload) != stored_payload_checksum {
        return Err(StoreError::ChecksumMismatch);
    }

    let mut weights = Vec::with_capacity(dim);
    for chunk in payload[..dim * 4].chunks_exact(4) {
        weights.push(f32::from_le_bytes(chunk.try_into().expect("4-byte chunk")));
    }
    let bias = f32::from_le_bytes(
        payload[dim * 4..].try_into().expect("4-byte bias"),
    );

    Ok(StoredArtifact {
        weights,
        bias,
        accuracy,
        created_at,
    })
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes(bytes.try_into().expect("4-byte slice"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_model_id() -> [u8; 32] {
        let mut id = [0u8; 32];
        id[0] = 0xAB;
        id[31] = 0xCD;
        id
    }

    fn test_artifact() -> StoredArtifact {
        StoredArtifact {
            weights: vec![0.5, -1.25, 3.0, 0.0],
            bias: 0.125,
            accuracy: 0.75,
            created_at: 1_700_000_000,
        }
    }

    #[test]
    fn test_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path().to_path_buf(), test_model_id(), 3);

        assert!(!store.exists());
        assert!(store.current_ref().is_none());
        assert!(matches!(store.load_current(), Err(StoreError::NotFound)));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path().to_path_buf(), test_model_id(), 3);

        let artifact = test_artifact();
        let path = store.save(&artifact).unwrap();
        assert!(path.exists());
        assert!(store.exists());

        let loaded = store.load_current().unwrap();
        assert_eq!(loaded, artifact);
    }

    #[test]
    fn test_pointer_follows_latest_save() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path().to_path_buf(), test_model_id(), 3);

        let mut first = test_artifact();
        first.accuracy = 0.5;
        let mut second = test_artifact();
        second.accuracy = 0.9;

        store.save(&first).unwrap();
        let second_path = store.save(&second).unwrap();

        assert_eq!(store.current_ref().unwrap(), second_path);
        let loaded = store.load_current().unwrap();
        assert!((loaded.accuracy - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn test_retention_prunes_oldest() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path().to_path_buf(), test_model_id(), 2);

        store.save(&test_artifact()).unwrap();
        store.save(&test_artifact()).unwrap();
        store.save(&test_artifact()).unwrap();

        let versions = store.list_versions().unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].0, 2);
        assert_eq!(versions[1].0, 3);

        // Current still loads after pruning
        assert!(store.load_current().is_ok());
    }

    #[test]
    fn test_model_mismatch_detected() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path().to_path_buf(), test_model_id(), 3);
        store.save(&test_artifact()).unwrap();

        let mut other_id = [0u8; 32];
        other_id[0] = 0xFF;
        let other = ModelStore::new(dir.path().to_path_buf(), other_id, 3);

        assert!(matches!(other.load_current(), Err(StoreError::ModelMismatch)));
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path().to_path_buf(), test_model_id(), 3);
        let path = store.save(&test_artifact()).unwrap();

        // Flip a payload byte
        let mut bytes = std::fs::read(&path).unwrap();
        let offset = bytes.len() - 6;
        bytes[offset] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            store.load_current(),
            Err(StoreError::ChecksumMismatch)
        ));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path().to_path_buf(), test_model_id(), 3);
        let path = store.save(&test_artifact()).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[0] = 99;
        std::fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            store.load_current(),
            Err(StoreError::VersionMismatch(99, FORMAT_VERSION))
        ));
    }

    #[test]
    fn test_truncated_artifact_rejected() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path().to_path_buf(), test_model_id(), 3);
        let path = store.save(&test_artifact()).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 8]).unwrap();

        assert!(matches!(
            store.load_current(),
            Err(StoreError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path().to_path_buf(), test_model_id(), 3);
        store.save(&test_artifact()).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
