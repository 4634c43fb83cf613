//! Path-based configuration facade.
//!
//! The store keeps the merged tree as JSON so that keys written by other
//! tools survive a load/save cycle, while core code reads the typed
//! [`RenderConfig`] snapshot. Writes are validated against the typed schema
//! before they are accepted.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use crate::config::RenderConfig;
use crate::error::{ModelError, ModelResult};

/// Directory under the user's home holding the persisted config.
pub const CONFIG_DIR_NAME: &str = ".t7md_vision";

/// Persisted config file name.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Recursively merge `overlay` into `base`.
///
/// Objects merge key by key; any other value in `overlay` replaces the one in
/// `base`.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn split_path(path: &str) -> ModelResult<Vec<&str>> {
    let keys: Vec<&str> = path.split('.').collect();
    if keys.iter().any(|k| k.is_empty()) {
        return Err(ModelError::InvalidPath(path.to_string()));
    }
    Ok(keys)
}

/// Set `value` at `keys` under `tree`, replacing non-object intermediates.
/// Returns false for an empty key list.
fn insert_at(tree: &mut Value, keys: &[&str], value: Value) -> bool {
    let Some((last, parents)) = keys.split_last() else {
        return false;
    };
    let mut node = tree;
    for key in parents {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            return false;
        };
        node = map
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        map.insert(last.to_string(), value);
    }
    true
}

/// Leaf values of `value` with their dotted paths. Arrays and empty
/// objects count as leaves.
fn collect_leaves(prefix: &str, value: Value, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key
                } else {
                    format!("{}.{}", prefix, key)
                };
                collect_leaves(&path, child, out);
            }
        }
        leaf => out.push((prefix.to_string(), leaf)),
    }
}

/// Hierarchical key/value configuration with defaulted schema merge.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    tree: Value,
    typed: RenderConfig,
    path: Option<PathBuf>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore {
    /// Store holding only the defaults, not bound to a file.
    pub fn new() -> Self {
        let typed = RenderConfig::default();
        let tree = serde_json::to_value(&typed).unwrap_or_else(|_| Value::Object(Map::new()));
        Self {
            tree,
            typed,
            path: None,
        }
    }

    /// `<home>/.t7md_vision/config.json`
    pub fn default_path() -> ModelResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ModelError::NoHomeDir)?;
        Ok(home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from `path`, deep-merging the persisted tree over the defaults.
    ///
    /// A missing file yields the defaults. A file that is not valid JSON, or
    /// whose values do not fit the schema, is logged and ignored.
    pub fn load(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let mut store = Self::new();
        store.path = Some(path.to_path_buf());

        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(store);
        }

        let contents = std::fs::read_to_string(path)?;
        let persisted: Value = match serde_json::from_str(&contents) {
            Ok(value) => value,
            Err(e) => {
                warn!(path = %path.display(), "Ignoring corrupt config file: {}", e);
                return Ok(store);
            }
        };

        let mut merged = store.tree.clone();
        deep_merge(&mut merged, persisted.clone());
        match serde_json::from_value::<RenderConfig>(merged.clone()) {
            Ok(typed) => {
                store.tree = merged;
                store.typed = typed;
                info!(path = %path.display(), "Loaded config");
            }
            Err(e) => {
                warn!(path = %path.display(), "Config file does not fit schema, loading valid keys only: {}", e);
                let rejected = store.merge_valid_leaves(persisted);
                info!(path = %path.display(), rejected, "Loaded config");
            }
        }

        Ok(store)
    }

    /// Apply each leaf of `persisted` on its own, skipping the ones that do
    /// not fit the schema. Returns how many were skipped.
    fn merge_valid_leaves(&mut self, persisted: Value) -> usize {
        let mut leaves = Vec::new();
        collect_leaves("", persisted, &mut leaves);

        let mut rejected = 0;
        for (path, value) in leaves {
            let keys: Vec<&str> = path.split('.').collect();
            let mut candidate = self.tree.clone();
            if !insert_at(&mut candidate, &keys, value) {
                continue;
            }
            match serde_json::from_value::<RenderConfig>(candidate.clone()) {
                Ok(typed) => {
                    self.tree = candidate;
                    self.typed = typed;
                }
                Err(e) => {
                    rejected += 1;
                    warn!(key = %path, "Ignoring config value that does not fit schema: {}", e);
                }
            }
        }
        rejected
    }

    /// Load from the default location.
    pub fn load_default() -> ModelResult<Self> {
        Self::load(Self::default_path()?)
    }

    /// File this store persists to, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = Some(path.into());
    }

    /// Raw merged tree.
    pub fn tree(&self) -> &Value {
        &self.tree
    }

    /// Value at a dotted path such as `modules.stats.scale`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let keys = split_path(path).ok()?;
        keys.iter().try_fold(&self.tree, |node, key| node.get(*key))
    }

    /// Value at a dotted path, or `default` when absent.
    pub fn get_or(&self, path: &str, default: Value) -> Value {
        self.get(path).cloned().unwrap_or(default)
    }

    /// Typed value at a dotted path.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        self.get(path)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Set the value at a dotted path, creating intermediate objects.
    ///
    /// The change is rejected, leaving the store untouched, when the result
    /// no longer fits the typed schema.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> ModelResult<()> {
        let keys = split_path(path)?;
        let mut candidate = self.tree.clone();
        if !insert_at(&mut candidate, &keys, value.into()) {
            return Err(ModelError::InvalidPath(path.to_string()));
        }

        let typed: RenderConfig = serde_json::from_value(candidate.clone())
            .map_err(|e| ModelError::invalid_value(path, e.to_string()))?;

        self.tree = candidate;
        self.typed = typed;
        Ok(())
    }

    /// Typed view of the current tree.
    pub fn snapshot(&self) -> RenderConfig {
        self.typed.clone()
    }

    /// Persist to the bound path.
    pub fn save(&self) -> ModelResult<()> {
        match &self.path {
            Some(path) => self.save_to(path),
            None => Err(ModelError::InvalidPath("<unbound config store>".to_string())),
        }
    }

    /// Persist as pretty JSON via a temp file and rename.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ModelResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ModelError::Persist {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let contents = serde_json::to_string_pretty(&self.tree)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, contents).map_err(|source| ModelError::Persist {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, path).map_err(|source| {
            let _ = std::fs::remove_file(&tmp);
            ModelError::Persist {
                path: path.to_path_buf(),
                source,
            }
        })?;

        debug!(path = %path.display(), "Saved config");
        Ok(())
    }
}

/// Configuration shared between a control surface and a running worker.
///
/// Writers go through [`SharedConfig::set`]; the worker takes one
/// [`RenderConfig`] snapshot per frame.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<ConfigStore>>,
}

impl SharedConfig {
    pub fn new(store: ConfigStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    pub fn snapshot(&self) -> RenderConfig {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .snapshot()
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(path)
            .cloned()
    }

    pub fn set(&self, path: &str, value: impl Into<Value>) -> ModelResult<()> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .set(path, value)
    }

    pub fn save(&self) -> ModelResult<()> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .save()
    }
}

impl From<ConfigStore> for SharedConfig {
    fn from(store: ConfigStore) -> Self {
        Self::new(store)
    }
}
