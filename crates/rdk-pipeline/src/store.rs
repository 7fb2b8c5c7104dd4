//! Append-only persistence of validation responses keyed by
//! `(strategy_id, run_timestamp)`.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::request::ValidationResponse;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreKey {
    pub strategy_id: String,
    pub run_timestamp: DateTime<Utc>,
    pub run_id: Uuid,
}

impl StoreKey {
    pub fn of(response: &ValidationResponse) -> Self {
        Self {
            strategy_id: response.strategy_id().to_string(),
            run_timestamp: response.run_timestamp,
            run_id: response.run_id,
        }
    }
}

pub trait ResultStore: Send + Sync {
    /// Persist a response. Saving the same run twice is an error.
    fn save(&self, response: &ValidationResponse) -> Result<StoreKey>;

    fn load(&self, strategy_id: &str, run_timestamp: DateTime<Utc>) -> Result<Option<ValidationResponse>>;

    /// Keys oldest first, optionally for one strategy.
    fn list(&self, strategy_id: Option<&str>) -> Result<Vec<StoreKey>>;

    fn latest(&self, strategy_id: &str) -> Result<Option<ValidationResponse>> {
        match self.list(Some(strategy_id))?.pop() {
            Some(key) => self.load(&key.strategy_id, key.run_timestamp),
            None => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// JSON directory
// ---------------------------------------------------------------------------

/// `<root>/<strategy_id>/<run_timestamp_nanos>_<run_id>.json`
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn strategy_dir(&self, strategy_id: &str) -> Result<PathBuf> {
        if strategy_id.is_empty()
            || strategy_id.starts_with('.')
            || strategy_id.contains(['/', '\\'])
        {
            anyhow::bail!("strategy_id not usable as a directory name: {strategy_id:?}");
        }
        Ok(self.root.join(strategy_id))
    }

    fn file_name(ts: DateTime<Utc>, run_id: Uuid) -> Result<String> {
        let nanos = ts
            .timestamp_nanos_opt()
            .with_context(|| format!("run_timestamp out of range: {ts}"))?;
        Ok(format!("{nanos}_{run_id}.json"))
    }

    fn parse_file_name(strategy_id: &str, name: &str) -> Option<StoreKey> {
        let stem = name.strip_suffix(".json")?;
        let (nanos, run_id) = stem.split_once('_')?;
        let nanos: i64 = nanos.parse().ok()?;
        Some(StoreKey {
            strategy_id: strategy_id.to_string(),
            run_timestamp: DateTime::<Utc>::from_timestamp(
                nanos.div_euclid(1_000_000_000),
                nanos.rem_euclid(1_000_000_000) as u32,
            )?,
            run_id: run_id.parse().ok()?,
        })
    }

    fn keys_in(&self, strategy_id: &str) -> Result<Vec<StoreKey>> {
        let dir = self.strategy_dir(strategy_id)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("read store dir failed: {}", dir.display()))? {
            let entry = entry.with_context(|| format!("read store dir failed: {}", dir.display()))?;
            if let Some(key) = entry
                .file_name()
                .to_str()
                .and_then(|n| Self::parse_file_name(strategy_id, n))
            {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

impl ResultStore for JsonDirStore {
    fn save(&self, response: &ValidationResponse) -> Result<StoreKey> {
        let key = StoreKey::of(response);
        let dir = self.strategy_dir(&key.strategy_id)?;
        fs::create_dir_all(&dir).with_context(|| format!("create store dir failed: {}", dir.display()))?;

        let path = dir.join(Self::file_name(key.run_timestamp, key.run_id)?);
        let json = serde_json::to_string_pretty(response).context("serialize validation response failed")?;
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .with_context(|| format!("results are append-only; cannot create {}", path.display()))?;
        file.write_all(format!("{json}\n").as_bytes())
            .with_context(|| format!("write validation response failed: {}", path.display()))?;
        Ok(key)
    }

    fn load(&self, strategy_id: &str, run_timestamp: DateTime<Utc>) -> Result<Option<ValidationResponse>> {
        let Some(key) = self
            .keys_in(strategy_id)?
            .into_iter()
            .find(|k| k.run_timestamp == run_timestamp)
        else {
            return Ok(None);
        };
        let path = self
            .strategy_dir(strategy_id)?
            .join(Self::file_name(key.run_timestamp, key.run_id)?);
        let raw = fs::read_to_string(&path).with_context(|| format!("read validation response failed: {}", path.display()))?;
        let response = serde_json::from_str(&raw).with_context(|| format!("parse validation response failed: {}", path.display()))?;
        Ok(Some(response))
    }

    fn list(&self, strategy_id: Option<&str>) -> Result<Vec<StoreKey>> {
        let mut keys = match strategy_id {
            Some(id) => self.keys_in(id)?,
            None => {
                if !self.root.is_dir() {
                    return Ok(Vec::new());
                }
                let mut all = Vec::new();
                for entry in fs::read_dir(&self.root).with_context(|| format!("read store root failed: {}", self.root.display()))? {
                    let entry = entry.with_context(|| format!("read store root failed: {}", self.root.display()))?;
                    if !entry.path().is_dir() {
                        continue;
                    }
                    if let Some(id) = entry.file_name().to_str() {
                        all.extend(self.keys_in(id)?);
                    }
                }
                all
            }
        };
        keys.sort_by(|a, b| {
            a.run_timestamp
                .cmp(&b.run_timestamp)
                .then_with(|| a.strategy_id.cmp(&b.strategy_id))
        });
        Ok(keys)
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryStore {
    runs: RwLock<BTreeMap<(String, DateTime<Utc>), ValidationResponse>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultStore for MemoryStore {
    fn save(&self, response: &ValidationResponse) -> Result<StoreKey> {
        let key = StoreKey::of(response);
        let mut runs = self.runs.write();
        let slot = (key.strategy_id.clone(), key.run_timestamp);
        if runs.contains_key(&slot) {
            anyhow::bail!(
                "results are append-only; {} at {} already stored",
                key.strategy_id,
                key.run_timestamp
            );
        }
        runs.insert(slot, response.clone());
        Ok(key)
    }

    fn load(&self, strategy_id: &str, run_timestamp: DateTime<Utc>) -> Result<Option<ValidationResponse>> {
        Ok(self
            .runs
            .read()
            .get(&(strategy_id.to_string(), run_timestamp))
            .cloned())
    }

    fn list(&self, strategy_id: Option<&str>) -> Result<Vec<StoreKey>> {
        let mut keys: Vec<StoreKey> = self
            .runs
            .read()
            .values()
            .filter(|r| strategy_id.map_or(true, |id| r.strategy_id() == id))
            .map(StoreKey::of)
            .collect();
        keys.sort_by(|a, b| {
            a.run_timestamp
                .cmp(&b.run_timestamp)
                .then_with(|| a.strategy_id.cmp(&b.strategy_id))
        });
        Ok(keys)
    }
}
