use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{DqnError, Result};

/// Name of the index file that records the most recent snapshots.
pub const INDEX_FILE: &str = "checkpoint";

/// Configuration for the checkpoint store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    pub path: PathBuf,
    /// Restore the most recent snapshot before training.
    pub load_model: bool,
    /// Save a snapshot every this many episodes.
    pub save_every: usize,
    /// Number of snapshots kept on disk.
    pub keep_last: usize,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        CheckpointConfig {
            path: PathBuf::from("./dqn"),
            load_model: false,
            save_every: 1000,
            keep_last: 5,
        }
    }
}

/// Everything needed to resume training.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSnapshot<Q> {
    pub episode: usize,
    pub total_steps: usize,
    pub epsilon: f32,
    pub online: Q,
    pub target: Q,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CheckpointIndex {
    latest: String,
    retained: Vec<String>,
}

/// Directory of `model-{episode}.ckpt` snapshots plus a JSON index.
pub struct CheckpointStore {
    dir: PathBuf,
    keep_last: usize,
}

impl CheckpointStore {
    pub fn new(config: &CheckpointConfig) -> Result<Self> {
        fs::create_dir_all(&config.path)?;
        Ok(CheckpointStore {
            dir: config.path.clone(),
            keep_last: config.keep_last.max(1),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot_name(episode: usize) -> String {
        format!("model-{}.ckpt", episode)
    }

    /// Write a snapshot tagged with its episode index and prune old ones.
    pub fn save<Q: Serialize>(&self, snapshot: &TrainingSnapshot<Q>) -> Result<PathBuf> {
        let name = Self::snapshot_name(snapshot.episode);
        let path = self.dir.join(&name);
        let bytes = bincode::serialize(snapshot)?;
        write_atomic(&path, &bytes)?;

        let mut index = self.read_index().unwrap_or_default();
        index.retained.retain(|existing| existing != &name);
        index.retained.push(name.clone());
        while index.retained.len() > self.keep_last {
            let stale = index.retained.remove(0);
            match fs::remove_file(self.dir.join(&stale)) {
                Ok(()) => debug!(snapshot = %stale, "pruned old checkpoint"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        index.latest = name;
        write_atomic(&self.dir.join(INDEX_FILE), serde_json::to_string_pretty(&index)?.as_bytes())?;

        info!(path = %path.display(), episode = snapshot.episode, "saved model");
        Ok(path)
    }

    /// Load the snapshot named by the index.
    pub fn load_latest<Q: DeserializeOwned>(&self) -> Result<TrainingSnapshot<Q>> {
        let index = self.read_index()?;
        let path = self.dir.join(&index.latest);
        let bytes = fs::read(&path)
            .map_err(|e| DqnError::checkpoint(path.clone(), format!("cannot read snapshot: {}", e)))?;
        let snapshot: TrainingSnapshot<Q> = bincode::deserialize(&bytes)
            .map_err(|e| DqnError::checkpoint(path.clone(), format!("corrupt snapshot: {}", e)))?;
        info!(path = %path.display(), episode = snapshot.episode, "loaded model");
        Ok(snapshot)
    }

    /// Snapshot file names currently tracked by the index, oldest first.
    pub fn retained(&self) -> Result<Vec<String>> {
        Ok(self.read_index()?.retained)
    }

    fn read_index(&self) -> Result<CheckpointIndex> {
        let path = self.dir.join(INDEX_FILE);
        let content = fs::read_to_string(&path)
            .map_err(|e| DqnError::checkpoint(path.clone(), format!("no checkpoint index: {}", e)))?;
        let index: CheckpointIndex = serde_json::from_str(&content)
            .map_err(|e| DqnError::checkpoint(path.clone(), format!("unreadable index: {}", e)))?;
        if index.latest.is_empty() {
            return Err(DqnError::checkpoint(path, "index names no snapshot"));
        }
        Ok(index)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
