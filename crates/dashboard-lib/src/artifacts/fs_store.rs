//! Filesystem artifact store
//!
//! Layout under the store root:
//!
//! ```text
//! CURRENT                         generation id of the live set
//! generations/gen-000007/         one immutable directory per training run
//!     scaler.json kmeans.json test_set.json manifest.json
//! ```
//!
//! A new generation is written into a temporary directory, fsynced, and
//! renamed into place. Only then is `CURRENT` swapped, again through a
//! temp file and rename, so a reader never observes a partial set.
//!
//! Writers may live in different processes (the server and `dashctl train`
//! pointed at the same root), so `replace` holds an exclusive OS file lock
//! on `.writer.lock` from numbering the generation through pruning.

use super::{blobs, ArtifactSet, ArtifactStore, ModelInfo, StoredArtifacts, TestPartition};
use crate::error::{PipelineError, Result};
use crate::pipeline::{matches_feature_order, KMeans, StandardScaler};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Name of the pointer file naming the live generation
pub const CURRENT_POINTER: &str = "CURRENT";

const GENERATIONS_DIR: &str = "generations";
const GENERATION_PREFIX: &str = "gen-";
const TEMP_PREFIX: &str = ".tmp-";
const WRITER_LOCK: &str = ".writer.lock";

/// Configuration for the filesystem store
#[derive(Debug, Clone)]
pub struct FsStoreConfig {
    /// Root directory for all artifacts
    pub root: PathBuf,
    /// Number of generations to keep on disk, including the live one
    pub generations_to_keep: usize,
}

impl Default for FsStoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("artifacts"),
            generations_to_keep: 3,
        }
    }
}

/// Checksums and training facts for one generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub generation: String,
    pub info: ModelInfo,
    /// SHA-256 hex digest per blob name
    pub checksums: BTreeMap<String, String>,
}

pub struct FsArtifactStore {
    config: FsStoreConfig,
    // serializes writers within this process; other processes are kept
    // out by the file lock
    write_lock: Mutex<()>,
}

/// Exclusive advisory lock on the store root, released on drop
struct WriterLock {
    file: File,
}

impl WriterLock {
    fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .map_err(|e| PipelineError::artifact(path, e))?;
        file.lock_exclusive()
            .map_err(|e| PipelineError::artifact(path, format!("failed to acquire writer lock: {}", e)))?;
        Ok(Self { file })
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl FsArtifactStore {
    pub fn new(config: FsStoreConfig) -> Result<Self> {
        let generations = config.root.join(GENERATIONS_DIR);
        fs::create_dir_all(&generations)
            .map_err(|e| PipelineError::artifact(&generations, format!("create failed: {}", e)))?;

        Ok(Self {
            config,
            write_lock: Mutex::new(()),
        })
    }

    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        Self::new(FsStoreConfig {
            root: root.into(),
            ..Default::default()
        })
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    fn generations_dir(&self) -> PathBuf {
        self.config.root.join(GENERATIONS_DIR)
    }

    fn pointer_path(&self) -> PathBuf {
        self.config.root.join(CURRENT_POINTER)
    }

    /// Scratch name unique to this writer process
    fn temp_name(&self, base: &str) -> String {
        format!("{}{}-{}", TEMP_PREFIX, base, std::process::id())
    }

    /// Remove scratch directories left behind by writers that died mid-write.
    /// Only called with the writer lock held.
    fn clear_stale_temps(&self) {
        let entries = match fs::read_dir(self.generations_dir()) {
            Ok(entries) => entries,
            Err(_) => return,
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let is_temp = entry
                .file_name()
                .to_str()
                .map(|name| name.starts_with(TEMP_PREFIX))
                .unwrap_or(false);
            if is_temp {
                let path = entry.path();
                if let Err(e) = fs::remove_dir_all(&path) {
                    warn!(path = %path.display(), error = %e, "Failed to remove stale temp directory");
                }
            }
        }
    }

    /// Generation directories on disk, oldest first
    pub fn list_generations(&self) -> Vec<String> {
        let mut names: Vec<String> = match fs::read_dir(self.generations_dir()) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .filter_map(|e| e.file_name().into_string().ok())
                .filter(|name| parse_generation(name).is_some())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort_by_key(|name| parse_generation(name).unwrap_or(0));
        names
    }

    /// Read the manifest of the live generation without loading the blobs
    pub fn manifest(&self) -> Result<ArtifactManifest> {
        let generation = self.read_pointer()?;
        self.read_manifest(&self.generations_dir().join(&generation))
    }

    fn next_generation(&self) -> String {
        let next = self
            .list_generations()
            .iter()
            .filter_map(|name| parse_generation(name))
            .max()
            .map(|n| n + 1)
            .unwrap_or(1);
        format!("{}{:06}", GENERATION_PREFIX, next)
    }

    fn read_pointer(&self) -> Result<String> {
        let path = self.pointer_path();
        let content = fs::read_to_string(&path)
            .map_err(|e| PipelineError::model_unavailable(format!("{:?}: {}", path, e)))?;
        let generation = content.trim().to_string();
        if parse_generation(&generation).is_none() {
            return Err(PipelineError::artifact(
                &path,
                format!("invalid generation id {:?}", generation),
            ));
        }
        Ok(generation)
    }

    fn read_manifest(&self, dir: &Path) -> Result<ArtifactManifest> {
        let path = dir.join(blobs::MANIFEST);
        let bytes = fs::read(&path).map_err(|e| PipelineError::artifact(&path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| PipelineError::artifact(&path, e))
    }

    fn read_blob<T: DeserializeOwned>(&self, dir: &Path, name: &str, manifest: &ArtifactManifest) -> Result<T> {
        let path = dir.join(name);
        let bytes = fs::read(&path).map_err(|e| PipelineError::artifact(&path, e))?;

        let expected = manifest
            .checksums
            .get(name)
            .ok_or_else(|| PipelineError::artifact(&path, "no checksum in manifest"))?;
        let computed = compute_checksum(&bytes);
        if &computed != expected {
            return Err(PipelineError::artifact(
                &path,
                format!("checksum mismatch: expected {}, got {}", expected, computed),
            ));
        }

        serde_json::from_slice(&bytes).map_err(|e| PipelineError::artifact(&path, e))
    }

    fn write_generation(&self, dir: &Path, generation: &str, artifacts: &ArtifactSet) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| PipelineError::artifact(dir, e))?;

        let mut checksums = BTreeMap::new();
        let payloads = [
            (blobs::SCALER, to_json(dir, &artifacts.scaler)?),
            (blobs::KMEANS, to_json(dir, &artifacts.kmeans)?),
            (blobs::TEST_SET, to_json(dir, &artifacts.test_set)?),
        ];
        for (name, bytes) in payloads.iter() {
            write_synced(&dir.join(name), bytes)?;
            checksums.insert(name.to_string(), compute_checksum(bytes));
        }

        let manifest = ArtifactManifest {
            generation: generation.to_string(),
            info: artifacts.info.clone(),
            checksums,
        };
        write_synced(&dir.join(blobs::MANIFEST), &to_json(dir, &manifest)?)?;
        Ok(())
    }

    fn swap_pointer(&self, generation: &str) -> Result<()> {
        let path = self.pointer_path();
        let temp_path = self.config.root.join(self.temp_name(CURRENT_POINTER));
        write_synced(&temp_path, generation.as_bytes())?;
        fs::rename(&temp_path, &path).map_err(|e| {
            PipelineError::artifact(&path, format!("rename from {:?} failed: {}", temp_path, e))
        })
    }

    fn prune(&self, live: &str) {
        let generations = self.list_generations();
        let keep = self.config.generations_to_keep.max(1);
        if generations.len() <= keep {
            return;
        }

        // whatever CURRENT names right now is never removed
        let pointed = self.read_pointer().ok();
        let excess = generations.len() - keep;
        for name in generations.iter().take(excess) {
            if name == live || pointed.as_deref() == Some(name.as_str()) {
                continue;
            }
            let path = self.generations_dir().join(name);
            match fs::remove_dir_all(&path) {
                Ok(()) => debug!(generation = %name, "Pruned old artifact generation"),
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to remove old artifact generation"
                ),
            }
        }
    }
}

impl ArtifactStore for FsArtifactStore {
    fn load(&self) -> Result<StoredArtifacts> {
        let generation = self.read_pointer()?;
        let dir = self.generations_dir().join(&generation);
        let manifest = self.read_manifest(&dir)?;

        if !matches_feature_order(&manifest.info.feature_order) {
            return Err(PipelineError::artifact(
                dir.join(blobs::MANIFEST),
                format!("feature order mismatch: {:?}", manifest.info.feature_order),
            ));
        }

        let scaler: StandardScaler = self.read_blob(&dir, blobs::SCALER, &manifest)?;
        let kmeans: KMeans = self.read_blob(&dir, blobs::KMEANS, &manifest)?;
        let test_set: TestPartition = self.read_blob(&dir, blobs::TEST_SET, &manifest)?;

        if !scaler.is_valid() {
            return Err(PipelineError::artifact(dir.join(blobs::SCALER), "non-finite or zero scale"));
        }
        if !kmeans.is_valid(manifest.info.n_clusters) {
            return Err(PipelineError::artifact(
                dir.join(blobs::KMEANS),
                format!("expected {} finite centroids", manifest.info.n_clusters),
            ));
        }

        Ok(StoredArtifacts {
            generation,
            artifacts: ArtifactSet {
                scaler,
                kmeans,
                test_set,
                info: manifest.info,
            },
        })
    }

    fn replace(&self, artifacts: &ArtifactSet) -> Result<String> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| PipelineError::artifact(self.root(), format!("lock poisoned: {}", e)))?;
        let _writer = WriterLock::acquire(&self.config.root.join(WRITER_LOCK))?;

        self.clear_stale_temps();
        let generation = self.next_generation();
        let final_dir = self.generations_dir().join(&generation);
        let temp_dir = self.generations_dir().join(self.temp_name(&generation));

        if let Err(e) = self.write_generation(&temp_dir, &generation, artifacts) {
            let _ = fs::remove_dir_all(&temp_dir);
            return Err(e);
        }

        fs::rename(&temp_dir, &final_dir).map_err(|e| {
            PipelineError::artifact(&final_dir, format!("rename from {:?} failed: {}", temp_dir, e))
        })?;
        self.swap_pointer(&generation)?;

        info!(
            generation = %generation,
            path = %final_dir.display(),
            "Artifact generation published"
        );

        self.prune(&generation);
        Ok(generation)
    }

    fn current_generation(&self) -> Option<String> {
        self.read_pointer().ok()
    }
}

fn parse_generation(name: &str) -> Option<u64> {
    name.strip_prefix(GENERATION_PREFIX)?.parse().ok()
}

fn to_json<T: Serialize>(dir: &Path, value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|e| PipelineError::artifact(dir, e))
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| PipelineError::artifact(path, e))?;
    file.write_all(bytes)
        .map_err(|e| PipelineError::artifact(path, e))?;
    file.sync_all().map_err(|e| PipelineError::artifact(path, e))
}

/// Compute SHA256 checksum of data
fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::TestEntry;
    use crate::pipeline::{feature_order_owned, FeatureVector};
    use tempfile::TempDir;

    fn sample_set(seed: u64) -> ArtifactSet {
        let v = FeatureVector::new([1.0, 2.0, 3.0, 4.0, 5.0]);
        ArtifactSet {
            scaler: StandardScaler {
                mean: [1.0; 5],
                scale: [2.0; 5],
                samples_seen: 8,
            },
            kmeans: KMeans {
                centroids: vec![v, v, v],
                inertia: 0.5,
                iterations: 2,
                seed,
            },
            test_set: TestPartition {
                entries: vec![TestEntry {
                    vm_id: "vm-9".to_string(),
                    features: v,
                }],
            },
            info: ModelInfo {
                seed,
                n_clusters: 3,
                feature_order: feature_order_owned(),
                train_size: 8,
                test_size: 1,
                trained_at: 1_700_000_000,
            },
        }
    }

    fn store(dir: &TempDir, keep: usize) -> FsArtifactStore {
        FsArtifactStore::new(FsStoreConfig {
            root: dir.path().to_path_buf(),
            generations_to_keep: keep,
        })
        .unwrap()
    }

    #[test]
    fn test_compute_checksum() {
        let checksum = compute_checksum(b"scaler");
        assert_eq!(checksum.len(), 64);
        assert_eq!(checksum, compute_checksum(b"scaler"));
    }

    #[test]
    fn test_empty_store_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 3);

        assert!(!store.exists());
        assert!(store.current_generation().is_none());
        assert!(store.load().unwrap_err().is_model_unavailable());
    }

    #[test]
    fn test_replace_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 3);
        let set = sample_set(42);

        let generation = store.replace(&set).unwrap();
        assert_eq!(generation, "gen-000001");
        assert_eq!(store.current_generation(), Some(generation.clone()));

        let loaded = store.load().unwrap();
        assert_eq!(loaded.generation, generation);
        assert_eq!(loaded.artifacts, set);
        assert_eq!(store.manifest().unwrap().checksums.len(), 3);
    }

    #[test]
    fn test_missing_blob_invalidates_set() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 3);
        let generation = store.replace(&sample_set(42)).unwrap();

        fs::remove_file(dir.path().join(GENERATIONS_DIR).join(&generation).join(blobs::SCALER))
            .unwrap();

        assert!(!store.exists());
        assert!(store.load().unwrap_err().is_model_unavailable());
    }

    #[test]
    fn test_tampered_blob_fails_checksum() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 3);
        let generation = store.replace(&sample_set(42)).unwrap();

        let path = dir.path().join(GENERATIONS_DIR).join(&generation).join(blobs::KMEANS);
        let mut content = fs::read_to_string(&path).unwrap();
        content = content.replace("0.5", "0.25");
        fs::write(&path, content).unwrap();

        let err = store.load().unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"), "{}", err);
    }

    #[test]
    fn test_wrong_feature_order_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 3);
        let mut set = sample_set(42);
        set.info.feature_order.swap(0, 1);
        store.replace(&set).unwrap();

        let err = store.load().unwrap_err();
        assert!(err.to_string().contains("feature order"), "{}", err);
    }

    #[test]
    fn test_replace_swaps_whole_set_and_prunes() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 2);

        store.replace(&sample_set(1)).unwrap();
        store.replace(&sample_set(2)).unwrap();
        let latest = store.replace(&sample_set(3)).unwrap();

        assert_eq!(latest, "gen-000003");
        assert_eq!(store.list_generations(), vec!["gen-000002", "gen-000003"]);
        assert_eq!(store.load().unwrap().artifacts.info.seed, 3);
    }

    #[test]
    fn test_concurrent_writers_on_same_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();

        let writers: Vec<_> = (0..2u64)
            .map(|w| {
                let root = root.clone();
                std::thread::spawn(move || {
                    let store = FsArtifactStore::open(root).unwrap();
                    (0..25u64)
                        .map(|i| store.replace(&sample_set(w * 100 + i)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut published = Vec::new();
        for handle in writers {
            for result in handle.join().unwrap() {
                published.push(result.unwrap());
            }
        }
        published.sort();
        published.dedup();
        assert_eq!(published.len(), 50);

        let store = FsArtifactStore::open(dir.path()).unwrap();
        let current = store.current_generation().unwrap();
        assert_eq!(current, "gen-000050");
        assert!(store.list_generations().contains(&current));
        assert_eq!(store.list_generations().len(), 3);
        assert!(store.load().is_ok());

        let leftovers: Vec<String> = fs::read_dir(dir.path().join(GENERATIONS_DIR))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| name.starts_with(TEMP_PREFIX))
            .collect();
        assert!(leftovers.is_empty(), "{:?}", leftovers);
    }

    #[test]
    fn test_stale_temp_directory_is_cleared() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 3);
        let stale = dir.path().join(GENERATIONS_DIR).join(".tmp-gen-000001-1");
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join(blobs::MANIFEST), b"{}").unwrap();

        assert_eq!(store.replace(&sample_set(42)).unwrap(), "gen-000001");
        assert!(!stale.exists());
    }

    #[test]
    fn test_prune_keeps_pointed_generation() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 1);
        store.replace(&sample_set(1)).unwrap();
        store.replace(&sample_set(2)).unwrap();

        // another writer moved CURRENT back to an older generation
        fs::create_dir_all(dir.path().join(GENERATIONS_DIR).join("gen-000001")).unwrap();
        fs::write(dir.path().join(CURRENT_POINTER), "gen-000001").unwrap();
        store.prune("gen-000002");

        assert_eq!(store.list_generations(), vec!["gen-000001", "gen-000002"]);
    }

    #[test]
    fn test_reopen_sees_existing_generation() {
        let dir = TempDir::new().unwrap();
        let generation = store(&dir, 3).replace(&sample_set(42)).unwrap();

        let reopened = FsArtifactStore::open(dir.path()).unwrap();
        assert!(reopened.exists());
        assert_eq!(reopened.current_generation(), Some(generation));
    }
}
