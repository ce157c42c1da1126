//! Storage traits — local key-value persistence and the remote user-data store.
//!
//! Local storage is synchronous and string-valued: callers serialize their
//! own JSON. Remote storage is async and holds one JSON document per
//! [`DataKind`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StorageError;
use crate::format::CustomFormat;

/// A local string key-value store.
///
/// Implementations: file-backed (one JSON file per key), in-memory (tests).
/// Single writer, last write wins.
pub trait KeyValueStore: Send + Sync {
    /// The backend name (e.g., "file", "memory").
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a key. Returns whether it existed.
    fn remove(&self, key: &str) -> Result<bool, StorageError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        (**self).remove(key)
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        (**self).remove(key)
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        (**self).remove(key)
    }
}

/// In-memory store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StorageError::Other(format!("Lock poisoned: {e}")))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StorageError::Other(format!("Lock poisoned: {e}")))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StorageError::Other(format!("Lock poisoned: {e}")))?;
        Ok(entries.remove(key).is_some())
    }
}

/// The documents kept in the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataKind {
    Chats,
    CustomFormats,
    UserPreferences,
}

impl DataKind {
    pub const ALL: [DataKind; 3] = [
        DataKind::Chats,
        DataKind::CustomFormats,
        DataKind::UserPreferences,
    ];

    /// Remote file name for this kind.
    pub fn file_name(self) -> &'static str {
        match self {
            DataKind::Chats => "chats.json",
            DataKind::CustomFormats => "customFormats.json",
            DataKind::UserPreferences => "userPreferences.json",
        }
    }

    /// Empty document for this kind, used when the remote file is missing.
    pub fn empty_document(self) -> serde_json::Value {
        match self {
            DataKind::Chats | DataKind::CustomFormats => serde_json::Value::Array(Vec::new()),
            DataKind::UserPreferences => serde_json::Value::Object(Default::default()),
        }
    }
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Per-user preferences synced alongside formats and chats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    #[serde(default = "default_target_model")]
    pub default_target_model: String,

    /// Template ids rendered by default.
    #[serde(default = "default_template_ids")]
    pub template_ids: Vec<String>,

    #[serde(default)]
    pub auto_enhance: bool,
}

fn default_target_model() -> String {
    "midjourney".into()
}

fn default_template_ids() -> Vec<String> {
    vec!["midjourney".into(), "stable-diffusion".into()]
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            default_target_model: default_target_model(),
            template_ids: default_template_ids(),
            auto_enhance: false,
        }
    }
}

/// Everything the remote store holds for one user.
///
/// Chats are kept as opaque JSON; nothing here interprets them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    #[serde(default)]
    pub chats: Vec<serde_json::Value>,
    #[serde(default)]
    pub custom_formats: Vec<CustomFormat>,
    #[serde(default)]
    pub user_preferences: UserPreferences,
}

impl UserData {
    /// Split into one document per kind.
    pub fn to_documents(&self) -> Result<Vec<(DataKind, serde_json::Value)>, StorageError> {
        let encode = |value: serde_json::Result<serde_json::Value>| {
            value.map_err(|e| StorageError::Other(format!("Serialization failed: {e}")))
        };
        Ok(vec![
            (DataKind::Chats, encode(serde_json::to_value(&self.chats))?),
            (
                DataKind::CustomFormats,
                encode(serde_json::to_value(&self.custom_formats))?,
            ),
            (
                DataKind::UserPreferences,
                encode(serde_json::to_value(&self.user_preferences))?,
            ),
        ])
    }

    /// Fill the field for `kind` from a document. A document that does not
    /// decode leaves that field at its default.
    pub fn apply_document(&mut self, kind: DataKind, document: serde_json::Value) {
        match kind {
            DataKind::Chats => self.chats = decode_or_default(kind, document),
            DataKind::CustomFormats => self.custom_formats = decode_or_default(kind, document),
            DataKind::UserPreferences => {
                self.user_preferences = decode_or_default(kind, document)
            }
        }
    }
}

fn decode_or_default<T: DeserializeOwned + Default>(kind: DataKind, document: serde_json::Value) -> T {
    serde_json::from_value(document).unwrap_or_else(|e| {
        warn!(file = kind.file_name(), error = %e, "Discarding malformed remote document");
        T::default()
    })
}

/// A remote per-user document store.
///
/// Implementations: Google Drive AppData folder.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// The backend name (e.g., "drive").
    fn name(&self) -> &str;

    /// Load one document. A missing remote file yields the empty document.
    async fn load(&self, kind: DataKind) -> Result<serde_json::Value, StorageError>;

    /// Create or replace one document.
    async fn save(&self, kind: DataKind, document: &serde_json::Value) -> Result<(), StorageError>;

    /// Load every document into a [`UserData`].
    async fn load_all(&self) -> Result<UserData, StorageError> {
        let mut data = UserData::default();
        for kind in DataKind::ALL {
            let document = self.load(kind).await?;
            data.apply_document(kind, document);
        }
        Ok(data)
    }

    /// Save every document of a [`UserData`].
    async fn save_all(&self, data: &UserData) -> Result<(), StorageError> {
        for (kind, document) in data.to_documents()? {
            self.save(kind, &document).await?;
        }
        Ok(())
    }
}
