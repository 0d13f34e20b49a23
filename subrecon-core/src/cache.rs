//! On-disk result cache with cross-process locking and integrity checks.
//!
//! Entries live as `<ascii-target>-<plugin-hash>.json` files next to
//! sibling `.lock` files. The lock is advisory and cross-process; any
//! contention degrades to a live scan rather than blocking. The payload
//! carries its own SHA-256 checksum over the canonical serialization, so a
//! torn or tampered entry reads as a miss.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use fs2::FileExt;
use md5::Md5;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::task::spawn_blocking;
use tracing::{debug, warn};

use crate::orchestrator::TargetReport;

/// How long to poll for the advisory lock before skipping the cache.
const LOCK_WAIT: Duration = Duration::from_secs(1);
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Cache key component tying entries to the engine version and the
/// selected source set: the first 8 hex digits of MD5 over the version
/// concatenated with the sorted source names.
pub fn plugin_hash(engine_version: &str, selected: &[String]) -> String {
    let mut names = selected.to_vec();
    names.sort();
    let digest = Md5::digest(format!("{engine_version}{}", names.join("")).as_bytes());
    let mut hex = format!("{digest:x}");
    hex.truncate(8);
    hex
}

/// The cache layer for one run: a directory plus the plugin-hash key.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
    hash: String,
}

impl CacheStore {
    /// Opens the cache directory, creating it if needed.
    pub fn open(dir: PathBuf, engine_version: &str, selected: &[String]) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating cache directory {}", dir.display()))?;
        Ok(Self {
            dir,
            hash: plugin_hash(engine_version, selected),
        })
    }

    pub fn entry_path(&self, ascii_target: &str) -> PathBuf {
        self.dir.join(format!("{ascii_target}-{}.json", self.hash))
    }

    fn lock_path(&self, ascii_target: &str) -> PathBuf {
        self.dir.join(format!("{ascii_target}-{}.lock", self.hash))
    }

    /// Reads the cached report for a target. Lock contention, a missing
    /// entry, and a corrupt entry all read as a miss.
    pub async fn read(&self, ascii_target: &str) -> Option<TargetReport> {
        let payload_path = self.entry_path(ascii_target);
        let lock_path = self.lock_path(ascii_target);
        let target = ascii_target.to_string();
        match spawn_blocking(move || read_entry(&payload_path, &lock_path, &target)).await {
            Ok(report) => report,
            Err(err) => {
                warn!(error = %err, "cache read worker failed");
                None
            }
        }
    }

    /// Persists a report. Never fatal: contention and I/O trouble degrade
    /// to a warning, and the caller still has the live scan result.
    pub async fn write(&self, ascii_target: &str, report: &TargetReport) {
        let payload_path = self.entry_path(ascii_target);
        let lock_path = self.lock_path(ascii_target);
        let target = ascii_target.to_string();
        let report = report.clone();
        let outcome =
            spawn_blocking(move || write_entry(&payload_path, &lock_path, &target, &report)).await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(domain = ascii_target, error = %err, "cache write failed"),
            Err(err) => warn!(domain = ascii_target, error = %err, "cache write worker failed"),
        }
    }
}

fn read_entry(payload_path: &Path, lock_path: &Path, target: &str) -> Option<TargetReport> {
    let _lock = match acquire_lock(lock_path) {
        Ok(Some(lock)) => lock,
        Ok(None) => {
            warn!(domain = target, "cache lock contended, scanning live");
            return None;
        }
        Err(err) => {
            warn!(domain = target, error = %err, "cache lock unavailable");
            return None;
        }
    };
    let raw = std::fs::read(payload_path).ok()?;
    match decode_entry(&raw) {
        Ok(report) => {
            debug!(domain = target, "cache hit");
            Some(report)
        }
        Err(err) => {
            warn!(domain = target, error = %err, "discarding corrupt cache entry");
            None
        }
    }
}

fn write_entry(
    payload_path: &Path,
    lock_path: &Path,
    target: &str,
    report: &TargetReport,
) -> Result<()> {
    let _lock = match acquire_lock(lock_path)? {
        Some(lock) => lock,
        None => {
            warn!(domain = target, "cache lock contended, skipping cache write");
            return Ok(());
        }
    };
    let data = serde_json::to_value(report).context("serializing the report")?;
    let entry = json!({
        "data": data,
        "checksum": sha256_hex(&canonical_bytes(&data)?),
    });
    let tmp_path = payload_path.with_extension("tmp");
    std::fs::write(&tmp_path, serde_json::to_vec(&entry)?)
        .with_context(|| format!("writing {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, payload_path)
        .with_context(|| format!("renaming into {}", payload_path.display()))?;
    debug!(domain = target, "cache entry written");
    Ok(())
}

/// Polls the advisory lock for about a second. `Ok(None)` means contention;
/// the lock is released when the returned handle drops.
fn acquire_lock(lock_path: &Path) -> Result<Option<File>> {
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(lock_path)
        .with_context(|| format!("opening lock file {}", lock_path.display()))?;
    let deadline = Instant::now() + LOCK_WAIT;
    loop {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(Some(file)),
            Err(_) if Instant::now() < deadline => std::thread::sleep(LOCK_POLL_INTERVAL),
            Err(_) => return Ok(None),
        }
    }
}

fn decode_entry(raw: &[u8]) -> Result<TargetReport> {
    let envelope: Value = serde_json::from_slice(raw).context("cache entry is not valid JSON")?;
    let data = envelope
        .get("data")
        .context("cache entry has no data field")?;
    let stored = envelope
        .get("checksum")
        .and_then(Value::as_str)
        .context("cache entry has no checksum field")?;
    let computed = sha256_hex(&canonical_bytes(data)?);
    if !computed.eq_ignore_ascii_case(stored) {
        bail!("checksum mismatch: stored {stored}, computed {computed}");
    }
    serde_json::from_value(data.clone()).context("cache data does not decode as a report")
}

/// Canonical serialization: compact JSON with object keys sorted, the byte
/// form the checksum is computed over. `serde_json` objects iterate in key
/// order, so encoding a `Value` is already canonical.
fn canonical_bytes(data: &Value) -> Result<Vec<u8>> {
    serde_json::to_vec(data).context("canonicalizing cache data")
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
