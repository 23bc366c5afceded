//! Deterministic per-journey visual parameters.
//!
//! A journey key always maps to the same parameter bundle. Lookup goes
//! through the override table, the in-memory cache and the persisted store
//! before falling back to deriving values from a checksum of the key.
//! Persistence is an optimisation: store failures are logged and the derived
//! bundle is still returned.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Errors from a parameter store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored data could not be (de)serialised
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store cannot be reached
    #[error("Parameter store unavailable: {0}")]
    Unavailable(String),
}

/// Decorative spiral parameters for one journey
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualParams {
    /// First spiral coefficient
    pub coeff_a: f32,
    /// Second spiral coefficient
    pub coeff_b: f32,
    /// Third spiral coefficient
    pub coeff_c: f32,
    /// First oscillation frequency
    pub freq_a: f32,
    /// Second oscillation frequency
    pub freq_b: f32,
    /// Third oscillation frequency
    pub freq_c: f32,
    /// Stroke colour as `rgb(r, g, b)`
    pub color: String,
    /// Stroke opacity (0-1)
    pub opacity: f32,
    /// Stroke width
    pub stroke_weight: f32,
    /// Number of cycles drawn
    pub max_cycles: u32,
    /// Animation speed
    pub speed: f32,
}

/// Order-independent checksum: the sum of the key's UTF-16 code units
pub fn checksum(key: &str) -> u64 {
    key.encode_utf16().map(u64::from).sum()
}

/// `base + ((hash * multiplier) % range) * scale`
#[derive(Debug, Clone, Copy)]
struct Rule {
    multiplier: u64,
    range: u64,
    base: f32,
    scale: f32,
}

impl Rule {
    const fn new(multiplier: u64, range: u64, base: f32, scale: f32) -> Self {
        Self {
            multiplier,
            range,
            base,
            scale,
        }
    }

    fn step(&self, hash: u64) -> u64 {
        hash.wrapping_mul(self.multiplier) % self.range
    }

    fn apply(&self, hash: u64) -> f32 {
        self.base + self.step(hash) as f32 * self.scale
    }
}

// Each parameter has its own multiplier so they do not move in lockstep
const COEFF_A: Rule = Rule::new(7, 50, 1.0, 0.1);
const COEFF_B: Rule = Rule::new(11, 50, 1.0, 0.1);
const COEFF_C: Rule = Rule::new(13, 50, 1.0, 0.1);
const FREQ_A: Rule = Rule::new(17, 40, 0.5, 0.05);
const FREQ_B: Rule = Rule::new(19, 40, 0.5, 0.05);
const FREQ_C: Rule = Rule::new(23, 40, 0.5, 0.05);
const RED: Rule = Rule::new(29, 156, 100.0, 1.0);
const GREEN: Rule = Rule::new(31, 156, 100.0, 1.0);
const BLUE: Rule = Rule::new(37, 156, 100.0, 1.0);
const OPACITY: Rule = Rule::new(41, 50, 0.3, 0.01);
const STROKE_WEIGHT: Rule = Rule::new(43, 20, 0.5, 0.1);
const MAX_CYCLES: Rule = Rule::new(47, 8, 3.0, 1.0);
const SPEED: Rule = Rule::new(53, 10, 0.001, 0.0005);

/// Derive a bundle from the key's checksum
pub fn derive_params(key: &str) -> VisualParams {
    let hash = checksum(key);
    VisualParams {
        coeff_a: COEFF_A.apply(hash),
        coeff_b: COEFF_B.apply(hash),
        coeff_c: COEFF_C.apply(hash),
        freq_a: FREQ_A.apply(hash),
        freq_b: FREQ_B.apply(hash),
        freq_c: FREQ_C.apply(hash),
        color: format!(
            "rgb({}, {}, {})",
            100 + RED.step(hash),
            100 + GREEN.step(hash),
            100 + BLUE.step(hash)
        ),
        opacity: OPACITY.apply(hash),
        stroke_weight: STROKE_WEIGHT.apply(hash),
        max_cycles: 3 + MAX_CYCLES.step(hash) as u32,
        speed: SPEED.apply(hash),
    }
}

/// Persisted key-value storage for bundles
pub trait ParamStore {
    /// Fetch the bundle for `key`
    fn get(&self, key: &str) -> Result<Option<VisualParams>, StoreError>;

    /// Insert or replace the bundle for `key`
    fn upsert(&mut self, key: &str, params: &VisualParams) -> Result<(), StoreError>;
}

/// Shared stores, so a caller can keep inspecting a store it handed over
impl<S: ParamStore + ?Sized> ParamStore for Arc<Mutex<S>> {
    fn get(&self, key: &str) -> Result<Option<VisualParams>, StoreError> {
        self.lock().get(key)
    }

    fn upsert(&mut self, key: &str, params: &VisualParams) -> Result<(), StoreError> {
        self.lock().upsert(key, params)
    }
}

/// In-process store. Can be switched offline to simulate an outage.
#[derive(Debug, Clone, Default)]
pub struct MemoryParamStore {
    entries: HashMap<String, VisualParams>,
    offline: bool,
    writes: usize,
}

impl MemoryParamStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail (or succeed again)
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    /// Successful upserts so far
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Number of stored bundles
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ParamStore for MemoryParamStore {
    fn get(&self, key: &str) -> Result<Option<VisualParams>, StoreError> {
        if self.offline {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(self.entries.get(key).cloned())
    }

    fn upsert(&mut self, key: &str, params: &VisualParams) -> Result<(), StoreError> {
        if self.offline {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        self.entries.insert(key.to_string(), params.clone());
        self.writes += 1;
        Ok(())
    }
}

/// Store backed by a pretty-printed JSON map on disk
#[derive(Debug, Clone)]
pub struct JsonFileParamStore {
    path: PathBuf,
    entries: BTreeMap<String, VisualParams>,
}

impl JsonFileParamStore {
    /// Open `path`, starting empty if the file does not exist yet
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            BTreeMap::new()
        };
        debug!("Opened param store {:?} ({} entries)", path, entries.len());
        Ok(Self { path, entries })
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Default store location (in the user data directory)
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|p| p.join("SacredShifter").join("visual_params.json"))
    }

    fn save(&self) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(&self.entries)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl ParamStore for JsonFileParamStore {
    fn get(&self, key: &str) -> Result<Option<VisualParams>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn upsert(&mut self, key: &str, params: &VisualParams) -> Result<(), StoreError> {
        let previous = self.entries.insert(key.to_string(), params.clone());
        if let Err(e) = self.save() {
            // Keep memory consistent with disk
            match previous {
                Some(p) => self.entries.insert(key.to_string(), p),
                None => self.entries.remove(key),
            };
            return Err(e);
        }
        info!("Saved visual params for '{}' to {:?}", key, self.path);
        Ok(())
    }
}

/// Hand-tuned bundles that bypass derivation entirely
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamOverrides {
    entries: BTreeMap<String, VisualParams>,
}

impl ParamOverrides {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, params: VisualParams) -> Self {
        self.insert(key, params);
        self
    }

    /// Add or replace an override
    pub fn insert(&mut self, key: impl Into<String>, params: VisualParams) {
        self.entries.insert(key.into(), params);
    }

    /// Override for `key`
    pub fn get(&self, key: &str) -> Option<&VisualParams> {
        self.entries.get(key)
    }

    /// Number of overrides
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Where a resolved bundle came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    /// Override table
    Override,
    /// In-memory cache
    Cache,
    /// Persisted store
    Store,
    /// Derived from the key's checksum
    Derived,
}

/// A bundle and its provenance
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParams {
    /// The bundle
    pub params: VisualParams,
    /// Where it came from
    pub source: ParamSource,
}

/// Resolves journey keys to visual parameters
pub struct VisualParamGenerator {
    overrides: ParamOverrides,
    cache: HashMap<String, VisualParams>,
    store: Option<Box<dyn ParamStore>>,
    write_attempted: HashSet<String>,
}

impl VisualParamGenerator {
    /// Generator without persistence
    pub fn new(overrides: ParamOverrides) -> Self {
        Self {
            overrides,
            cache: HashMap::new(),
            store: None,
            write_attempted: HashSet::new(),
        }
    }

    /// Generator backed by `store`
    pub fn with_store(overrides: ParamOverrides, store: Box<dyn ParamStore>) -> Self {
        Self {
            store: Some(store),
            ..Self::new(overrides)
        }
    }

    /// Bundle for `key`
    pub fn params_for(&mut self, key: &str) -> VisualParams {
        self.resolve(key).params
    }

    /// Bundle for `key` plus where it came from
    pub fn resolve(&mut self, key: &str) -> ResolvedParams {
        if let Some(params) = self.overrides.get(key) {
            return ResolvedParams {
                params: params.clone(),
                source: ParamSource::Override,
            };
        }

        if let Some(params) = self.cache.get(key) {
            return ResolvedParams {
                params: params.clone(),
                source: ParamSource::Cache,
            };
        }

        let mut read_failed = false;
        if let Some(store) = &self.store {
            match store.get(key) {
                Ok(Some(params)) => {
                    debug!("Visual params for '{}' loaded from store", key);
                    self.cache.insert(key.to_string(), params.clone());
                    return ResolvedParams {
                        params,
                        source: ParamSource::Store,
                    };
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Param store read failed for '{}': {}", key, e);
                    read_failed = true;
                }
            }
        }

        let params = derive_params(key);
        debug!("Derived visual params for '{}' (checksum {})", key, checksum(key));
        self.cache.insert(key.to_string(), params.clone());
        // The store may still hold a bundle we could not read; never clobber it
        if !read_failed {
            self.write_back(key, &params);
        }

        ResolvedParams {
            params,
            source: ParamSource::Derived,
        }
    }

    /// Drop cached bundles so the next lookup consults the store again
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Override table in use
    pub fn overrides(&self) -> &ParamOverrides {
        &self.overrides
    }

    /// One best-effort write per key
    fn write_back(&mut self, key: &str, params: &VisualParams) {
        let Some(store) = self.store.as_mut() else {
            return;
        };
        if !self.write_attempted.insert(key.to_string()) {
            return;
        }
        if let Err(e) = store.upsert(key, params) {
            warn!("Param store write failed for '{}': {}", key, e);
        }
    }
}
