//! File-backed [`ContextStore`].
//!
//! One JSON file per model identity, `state--{model}.json`, inside the data
//! directory. Saves write a uniquely named temp file next to the target,
//! fsync it, then rename it over the target.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use parley_core::store::ContextStore;
use parley_types::checkpoint::{Checkpoint, Watermarks};
use parley_types::error::StoreError;
use parley_types::event::RoomId;
use parley_types::model::RecurrentState;

use crate::codec::{decode_f32, encode_f32};

const FORMAT_VERSION: u32 = 1;

/// On-disk layout. State vectors are base64 of little-endian `f32`.
#[derive(Debug, Serialize, Deserialize)]
struct CheckpointFile {
    version: u32,
    model: String,
    saved_at: DateTime<Utc>,
    state: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    room_states: BTreeMap<RoomId, String>,
    #[serde(default)]
    watermarks: Watermarks,
}

impl CheckpointFile {
    fn from_checkpoint(checkpoint: &Checkpoint) -> Self {
        Self {
            version: FORMAT_VERSION,
            model: checkpoint.model.clone(),
            saved_at: checkpoint.saved_at,
            state: encode_f32(checkpoint.state.as_slice()),
            room_states: checkpoint
                .room_states
                .iter()
                .map(|(room, state)| (room.clone(), encode_f32(state.as_slice())))
                .collect(),
            watermarks: checkpoint.watermarks.clone(),
        }
    }

    fn into_checkpoint(self) -> Result<Checkpoint, StoreError> {
        if self.version != FORMAT_VERSION {
            return Err(StoreError::Corrupt(format!(
                "unsupported format version {}",
                self.version
            )));
        }

        let state = decode_f32(&self.state).map_err(StoreError::Corrupt)?;
        let mut room_states = BTreeMap::new();
        for (room, encoded) in self.room_states {
            let decoded = decode_f32(&encoded)
                .map_err(|e| StoreError::Corrupt(format!("room {room}: {e}")))?;
            room_states.insert(room, RecurrentState(decoded));
        }

        Ok(Checkpoint {
            model: self.model,
            state: RecurrentState(state),
            room_states,
            watermarks: self.watermarks,
            saved_at: self.saved_at,
        })
    }
}

/// Stores checkpoints as JSON files in one directory.
#[derive(Debug, Clone)]
pub struct FileContextStore {
    dir: PathBuf,
}

impl FileContextStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the checkpoint file for `key`.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.dir.join(format!("state--{key}.json")))
    }
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    let bad = key.is_empty()
        || key == "."
        || key == ".."
        || key.contains(['/', '\\', '\0']);
    if bad {
        return Err(StoreError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid checkpoint key {key:?}"),
        )));
    }
    Ok(())
}

impl ContextStore for FileContextStore {
    async fn load(&self, key: &str) -> Result<Checkpoint, StoreError> {
        let path = self.path_for(key)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(StoreError::NotFound),
            Err(err) => return Err(StoreError::Io(err)),
        };

        let file: CheckpointFile = serde_json::from_str(&content)
            .map_err(|e| StoreError::Corrupt(format!("{}: {e}", path.display())))?;
        let checkpoint = file.into_checkpoint()?;
        tracing::debug!(path = %path.display(), rooms = checkpoint.watermarks.len(), "loaded checkpoint");
        Ok(checkpoint)
    }

    async fn save(&self, key: &str, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let content = serde_json::to_string_pretty(&CheckpointFile::from_checkpoint(checkpoint))
            .map_err(|e| StoreError::Corrupt(format!("serialize: {e}")))?;

        let tmp_path = self.dir.join(format!(
            ".state--{key}.{}.tmp",
            uuid::Uuid::now_v7().simple()
        ));

        let write_result = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(content.as_bytes()).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            match tokio::fs::rename(&tmp_path, &path).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    tokio::fs::remove_file(&path).await?;
                    tokio::fs::rename(&tmp_path, &path).await?;
                }
                Err(e) => return Err(e),
            }
            sync_dir(&self.dir).await
        }
        .await;

        if let Err(e) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(e));
        }
        tracing::debug!(path = %path.display(), bytes = content.len(), "saved checkpoint");
        Ok(())
    }
}

/// Flush a directory entry so a completed rename survives a crash.
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> io::Result<()> {
    tokio::fs::File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
