//! Per-user session state and the stores that persist it.
//!
//! A session is a schema-less key/value blob. The engine reserves exactly
//! one key, [`SCENE_KEY`], for the scene cursor; every other field is
//! handler-defined payload the engine never interprets.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reserved session field holding the scene cursor.
pub const SCENE_KEY: &str = "__scene";

/// Where a user currently is inside a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneCursor {
    pub scene_id: String,
    pub step_index: usize,
    #[serde(default)]
    pub data: Value,
}

impl SceneCursor {
    pub fn start(scene_id: impl Into<String>) -> Self {
        SceneCursor {
            scene_id: scene_id.into(),
            step_index: 0,
            data: Value::Object(Map::new()),
        }
    }
}

/// A user's session blob for the duration of one update's processing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    values: Map<String, Value>,
}

impl Session {
    /// Rebuild a session from a stored blob. Anything that is not a JSON
    /// object falls back to an empty session.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(values) => Session { values },
            other => {
                warn!("discarding malformed session blob: {other}");
                Session::default()
            }
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The active scene cursor, if any. A malformed cursor value reads as
    /// absent rather than failing dispatch.
    pub fn cursor(&self) -> Option<SceneCursor> {
        let value = self.values.get(SCENE_KEY)?;
        match serde_json::from_value(value.clone()) {
            Ok(cursor) => Some(cursor),
            Err(e) => {
                warn!("discarding malformed scene cursor: {e}");
                None
            }
        }
    }

    pub fn set_cursor(&mut self, cursor: &SceneCursor) {
        // SceneCursor serialization cannot fail; it is a plain struct.
        if let Ok(value) = serde_json::to_value(cursor) {
            self.values.insert(SCENE_KEY.to_string(), value);
        }
    }

    pub fn clear_cursor(&mut self) {
        self.values.remove(SCENE_KEY);
    }
}

/// Durable or in-memory key -> blob mapping, keyed by session identity.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;
    async fn set(&self, key: &str, value: Value);
    async fn delete(&self, key: &str);
}

// A shared store handle is itself a store, so embeddings can keep one
// side of an `Arc` and hand the other to the bot.
#[async_trait]
impl<S: SessionStore + ?Sized> SessionStore for Arc<S> {
    async fn get(&self, key: &str) -> Option<Value> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Value) {
        (**self).set(key, value).await
    }

    async fn delete(&self, key: &str) {
        (**self).delete(key).await
    }
}

/// Process-lifetime store with no persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    async fn set(&self, key: &str, value: Value) {
        self.entries.lock().unwrap().insert(key.to_string(), value);
    }

    async fn delete(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }
}

/// Whole-file JSON document store: one object keyed by session key,
/// read-modify-written on every call. No file locking — dispatch is
/// sequential, so there is at most one writer per process.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        FileStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    async fn read_document(&self) -> Map<String, Value> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            // Missing file is the empty document.
            Err(_) => return Map::new(),
        };
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!(
                    "session file {} is not a JSON object, starting empty",
                    self.path.display()
                );
                Map::new()
            }
        }
    }

    async fn write_document(&self, document: &Map<String, Value>) {
        let rendered = match serde_json::to_vec_pretty(&Value::Object(document.clone())) {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!("failed to render session file: {e}");
                return;
            }
        };
        if let Err(e) = tokio::fs::write(&self.path, rendered).await {
            warn!("failed to write session file {}: {e}", self.path.display());
        }
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn get(&self, key: &str) -> Option<Value> {
        self.read_document().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: Value) {
        let mut document = self.read_document().await;
        document.insert(key.to_string(), value);
        self.write_document(&document).await;
    }

    async fn delete(&self, key: &str) {
        let mut document = self.read_document().await;
        if document.remove(key).is_some() {
            self.write_document(&document).await;
        }
    }
}
