//! JSON-file settings store that survives restarts.

use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Mutex,
    time::{SystemTime, UNIX_EPOCH},
};

use tracing::{debug, warn};

use crate::{SettingsStore, SettingsStoreError};

/// Keeps the whole settings map in memory and rewrites the file on every change.
pub struct JsonFileSettingsStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl JsonFileSettingsStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsStoreError> {
        let path = path.into();
        let values = load_values(&path)?;
        debug!(path = %path.display(), entries = values.len(), "settings file loaded");
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update<F>(&self, change: F) -> Result<(), SettingsStoreError>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> Result<(), SettingsStoreError>,
    {
        let mut values = self
            .values
            .lock()
            .map_err(|_| SettingsStoreError::Backend("poisoned lock".to_owned()))?;
        let mut next = values.clone();
        change(&mut next)?;
        save_values(&self.path, &next)?;
        *values = next;
        Ok(())
    }
}

impl SettingsStore for JsonFileSettingsStore {
    fn get_value(&self, key: &str) -> Result<String, SettingsStoreError> {
        let values = self
            .values
            .lock()
            .map_err(|_| SettingsStoreError::Backend("poisoned lock".to_owned()))?;
        values.get(key).cloned().ok_or(SettingsStoreError::NotFound)
    }

    fn set_value(&self, key: &str, value: &str) -> Result<(), SettingsStoreError> {
        self.update(|values| {
            values.insert(key.to_owned(), value.to_owned());
            Ok(())
        })
    }

    fn remove_value(&self, key: &str) -> Result<(), SettingsStoreError> {
        self.update(|values| {
            values
                .remove(key)
                .map(|_| ())
                .ok_or(SettingsStoreError::NotFound)
        })
    }
}

fn load_values(path: &Path) -> Result<BTreeMap<String, String>, SettingsStoreError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(err) => {
            return Err(SettingsStoreError::Unavailable(format!(
                "failed reading settings {}: {err}",
                path.display()
            )));
        }
    };

    serde_json::from_str(&raw).map_err(|err| {
        SettingsStoreError::Backend(format!(
            "failed parsing settings {}: {err}",
            path.display()
        ))
    })
}

fn save_values(path: &Path, values: &BTreeMap<String, String>) -> Result<(), SettingsStoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|err| {
            SettingsStoreError::Unavailable(format!(
                "failed creating settings directory {}: {err}",
                parent.display()
            ))
        })?;
    }

    let encoded = serde_json::to_vec_pretty(values)
        .map_err(|err| SettingsStoreError::Backend(err.to_string()))?;
    let temp_path = temp_path_for(path);
    fs::write(&temp_path, encoded).map_err(|err| {
        SettingsStoreError::Unavailable(format!(
            "failed writing temp settings {}: {err}",
            temp_path.display()
        ))
    })?;

    if let Err(rename_err) = fs::rename(&temp_path, path) {
        // Windows does not allow replacing existing files via rename.
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                let _ = fs::remove_file(&temp_path);
                return Err(SettingsStoreError::Unavailable(format!(
                    "failed replacing settings {} after rename error ({rename_err}): {err}",
                    path.display()
                )));
            }
        }
        fs::rename(&temp_path, path).map_err(|err| {
            let _ = fs::remove_file(&temp_path);
            warn!(path = %path.display(), error = %err, "settings write failed after temp write");
            SettingsStoreError::Unavailable(format!(
                "failed writing settings {}: {err}",
                path.display()
            ))
        })?;
    }

    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("settings.json");
    let now_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos())
        .unwrap_or(0);
    parent.join(format!(".{file_name}.{now_nanos}.tmp"))
}
