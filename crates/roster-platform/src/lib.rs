use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use thiserror::Error;

mod file_store;
mod settings;

pub use file_store::JsonFileSettingsStore;
pub use settings::StoredSettings;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettingsStoreError {
    #[error("setting not found")]
    NotFound,
    #[error("settings store unavailable: {0}")]
    Unavailable(String),
    #[error("settings store backend failure: {0}")]
    Backend(String),
}

/// String key/value persistence behind the settings service.
pub trait SettingsStore: Send + Sync {
    fn get_value(&self, key: &str) -> Result<String, SettingsStoreError>;

    fn set_value(&self, key: &str, value: &str) -> Result<(), SettingsStoreError>;

    fn remove_value(&self, key: &str) -> Result<(), SettingsStoreError>;
}

/// Process-lifetime store; clones share the same map.
#[derive(Clone, Default)]
pub struct InMemorySettingsStore {
    data: Arc<RwLock<HashMap<String, String>>>,
}

impl SettingsStore for InMemorySettingsStore {
    fn get_value(&self, key: &str) -> Result<String, SettingsStoreError> {
        let data = self
            .data
            .read()
            .map_err(|_| SettingsStoreError::Backend("poisoned lock".to_owned()))?;
        data.get(key).cloned().ok_or(SettingsStoreError::NotFound)
    }

    fn set_value(&self, key: &str, value: &str) -> Result<(), SettingsStoreError> {
        let mut data = self
            .data
            .write()
            .map_err(|_| SettingsStoreError::Backend("poisoned lock".to_owned()))?;
        data.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_value(&self, key: &str) -> Result<(), SettingsStoreError> {
        let mut data = self
            .data
            .write()
            .map_err(|_| SettingsStoreError::Backend("poisoned lock".to_owned()))?;
        if data.remove(key).is_none() {
            return Err(SettingsStoreError::NotFound);
        }
        Ok(())
    }
}

/// Namespaces every key of an inner store under `<scope>.`.
#[derive(Clone)]
pub struct ScopedSettingsStore<S: SettingsStore> {
    inner: S,
    scope: String,
}

impl<S: SettingsStore> ScopedSettingsStore<S> {
    pub fn new(inner: S, scope: impl Into<String>) -> Self {
        Self {
            inner,
            scope: scope.into(),
        }
    }

    fn scoped_key(&self, key: &str) -> String {
        format!("{}.{key}", self.scope)
    }
}

impl<S: SettingsStore> SettingsStore for ScopedSettingsStore<S> {
    fn get_value(&self, key: &str) -> Result<String, SettingsStoreError> {
        self.inner.get_value(&self.scoped_key(key))
    }

    fn set_value(&self, key: &str, value: &str) -> Result<(), SettingsStoreError> {
        self.inner.set_value(&self.scoped_key(key), value)
    }

    fn remove_value(&self, key: &str) -> Result<(), SettingsStoreError> {
        self.inner.remove_value(&self.scoped_key(key))
    }
}
