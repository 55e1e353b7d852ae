//! Whole-kernel image serialization, compression, encryption and
//! rotation, plus restore-on-startup. Grounded on the teacher's
//! `fs4::FileExt` exclusive-lock usage in `storage::log::Log::new_with_lock`
//! (`kv/src/storage/log.rs`) for file-level locking during emission, with
//! compression/encryption crates pulled in from the wider pack
//! (`flate2`, `aes-gcm`) since the teacher never needed either.

mod codec;
mod crypto;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use fs4::FileExt;
use serde_derive::{Deserialize, Serialize};

use crate::config::Configuration;
use crate::entry::{Entry, KeyMetric};
use crate::error::Error;
use crate::kernel::Kernel;

const IMAGE_VERSION: u32 = 1;

/// Logical image layout: version tag, a digest of the config that
/// produced it (for a coarse compatibility check on restore), the
/// per-key-metric table, and the entries table, key-name ordered for
/// deterministic encoding.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotImage {
    pub version: u32,
    pub config_digest: u64,
    pub entries: Vec<Entry>,
    pub key_metrics: Vec<(String, KeyMetric)>,
}

impl SnapshotImage {
    pub fn from_kernel(kernel: &Kernel) -> Self {
        let (mut entries, metrics) = kernel.snapshot_view();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        let mut key_metrics: Vec<(String, KeyMetric)> = metrics.into_iter().collect();
        key_metrics.sort_by(|a, b| a.0.cmp(&b.0));
        SnapshotImage {
            version: IMAGE_VERSION,
            config_digest: config_digest(kernel.config()),
            entries,
            key_metrics,
        }
    }

    pub fn apply_to(self, kernel: &Kernel) {
        let metrics = self.key_metrics.into_iter().collect();
        kernel.restore(self.entries, metrics);
    }

    /// Coarse compatibility check: the image must have been produced by
    /// the same on-disk layout version and a kernel configured the same
    /// way along the axes that affect the key semantics (revision limit,
    /// capacity, key length, reserved prefix).
    fn is_compatible(&self, config: &Configuration) -> bool {
        self.version == IMAGE_VERSION && self.config_digest == config_digest(config)
    }
}

fn config_digest(config: &Configuration) -> u64 {
    let fingerprint_input = format!(
        "{}|{}|{}|{}",
        config.revision_limit(),
        config.max_keys(),
        config.max_key_length(),
        config.reserved_prefix()
    );
    crate::hash::fingerprint(fingerprint_input.as_bytes())
}

pub struct SnapshotEngine {
    dir: PathBuf,
    limit: usize,
    encrypt: bool,
    secret_key: Option<[u8; 32]>,
}

impl SnapshotEngine {
    pub fn from_config(config: &Configuration) -> Option<Self> {
        if !config.snapshot.is_enabled() {
            return None;
        }
        let dir = config.snapshot.dir.clone()?;
        let secret_key = config
            .snapshot
            .secret_key
            .as_ref()
            .map(|s| crypto::derive_key(s.as_bytes()));
        Some(SnapshotEngine {
            dir,
            limit: config.snapshot.limit(),
            encrypt: config.snapshot.is_encrypted(),
            secret_key,
        })
    }

    fn extension(&self) -> &'static str {
        if self.encrypt {
            "json.aes.gz"
        } else {
            "json.gz"
        }
    }

    /// Produces a full new image and rotates the directory to keep at
    /// most `limit` most-recent files.
    pub fn emit(&self, kernel: &Kernel) -> Result<PathBuf, Error> {
        fs::create_dir_all(&self.dir)?;
        let image = SnapshotImage::from_kernel(kernel);
        let json = codec::encode(&image)?;
        let compressed = codec::compress(&json)?;
        let payload = if self.encrypt {
            let key = self.secret_key.ok_or_else(|| {
                Error::Internal("encryption enabled without a secret key".to_string())
            })?;
            crypto::encrypt(&key, &compressed)?
        } else {
            compressed
        };

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let filename = format!("{timestamp:020}.{}", self.extension());
        let path = self.dir.join(filename);

        let mut file = fs::File::create(&path)?;
        file.lock_exclusive()?;
        file.write_all(&payload)?;
        file.unlock()?;

        self.rotate()?;
        Ok(path)
    }

    fn rotate(&self) -> Result<(), Error> {
        let mut files = self.list_snapshot_files()?;
        files.sort();
        while files.len() > self.limit {
            let oldest = files.remove(0);
            let _ = fs::remove_file(oldest);
        }
        Ok(())
    }

    fn list_snapshot_files(&self) -> Result<Vec<PathBuf>, Error> {
        let mut files = Vec::new();
        if !self.dir.exists() {
            return Ok(files);
        }
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.ends_with(".json") || name.ends_with(".json.gz") || name.ends_with(".json.aes.gz") {
                files.push(entry.path());
            }
        }
        Ok(files)
    }

    /// Selects the newest readable, compatible snapshot and rebuilds the
    /// kernel. Corrupt, unreadable, or version/config-incompatible
    /// snapshots fall back to the next-newest; if none succeeds, returns
    /// `Ok(false)` (startup should treat this as fatal unless
    /// `StartFresh` is set).
    pub fn restore(&self, kernel: &Kernel) -> Result<bool, Error> {
        let mut files = self.list_snapshot_files()?;
        files.sort();
        files.reverse();
        for path in files {
            match self.read_image(&path) {
                Ok(image) if image.is_compatible(kernel.config()) => {
                    image.apply_to(kernel);
                    return Ok(true);
                }
                Ok(image) => log::warn!(
                    "skipping {}: image version {} / config digest {:#x} incompatible with this kernel",
                    path.display(),
                    image.version,
                    image.config_digest
                ),
                Err(e) => log::warn!("skipping {}: {e}", path.display()),
            }
        }
        Ok(false)
    }

    fn read_image(&self, path: &Path) -> Result<SnapshotImage, Error> {
        let raw = fs::read(path)?;
        let name = path.to_string_lossy();
        let compressed = if name.ends_with(".aes.gz") {
            let key = self
                .secret_key
                .ok_or_else(|| Error::Internal("no secret key configured to decrypt".to_string()))?;
            crypto::decrypt(&key, &raw)?
        } else {
            raw
        };
        let json = if name.ends_with(".gz") || name.ends_with(".aes.gz") {
            codec::decompress(&compressed)?
        } else {
            compressed
        };
        codec::decode(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::ops::SetOptions;

    fn config_with_dir(dir: &Path) -> Configuration {
        let mut cfg = Configuration::default();
        cfg.snapshot.enabled = Some(true);
        cfg.snapshot.dir = Some(dir.to_path_buf());
        cfg.snapshot.limit = Some(3);
        cfg
    }

    #[tokio::test]
    async fn emit_and_restore_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_with_dir(dir.path());
        let kernel = Kernel::new(cfg.clone());
        kernel.set("c1", "foo", b"bar".to_vec(), SetOptions::default()).await.unwrap();

        let engine = SnapshotEngine::from_config(&cfg).unwrap();
        engine.emit(&kernel).unwrap();

        let restored_kernel = Kernel::new(cfg);
        assert!(engine.restore(&restored_kernel).unwrap());
        let value = restored_kernel.get("c1", "foo").await.unwrap();
        assert_eq!(value.value, b"bar");
    }

    #[tokio::test]
    async fn rotation_keeps_only_the_limit() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_with_dir(dir.path());
        let kernel = Kernel::new(cfg.clone());
        let engine = SnapshotEngine::from_config(&cfg).unwrap();
        for i in 0..5 {
            kernel.set("c1", &format!("k{i}"), b"v".to_vec(), SetOptions::default()).await.unwrap();
            engine.emit(&kernel).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        assert_eq!(engine.list_snapshot_files().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn restore_skips_image_with_mismatched_config_digest() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_with_dir(dir.path());
        let kernel = Kernel::new(cfg.clone());
        kernel.set("c1", "foo", b"bar".to_vec(), SetOptions::default()).await.unwrap();
        let engine = SnapshotEngine::from_config(&cfg).unwrap();
        engine.emit(&kernel).unwrap();

        let mut other_cfg = config_with_dir(dir.path());
        other_cfg.max_keys = Some(999);
        let other_kernel = Kernel::new(other_cfg);
        assert!(!engine.restore(&other_kernel).unwrap());
        assert!(other_kernel.get("c1", "foo").await.is_err());
    }

    #[tokio::test]
    async fn encrypted_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config_with_dir(dir.path());
        cfg.snapshot.encrypt = Some(true);
        cfg.snapshot.secret_key = Some("correct horse battery staple".to_string());
        let kernel = Kernel::new(cfg.clone());
        kernel.set("c1", "foo", b"bar".to_vec(), SetOptions::default()).await.unwrap();

        let engine = SnapshotEngine::from_config(&cfg).unwrap();
        let path = engine.emit(&kernel).unwrap();
        assert!(path.to_string_lossy().ends_with(".json.aes.gz"));

        let restored = Kernel::new(cfg);
        assert!(engine.restore(&restored).unwrap());
        assert_eq!(restored.get("c1", "foo").await.unwrap().value, b"bar");
    }
}
