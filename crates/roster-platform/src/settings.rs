use std::{fmt::Display, str::FromStr};

use roster_core::{
    AppIcon, LocationIntegration, RosterError, RosterErrorCategory, SettingsService,
    settings::{
        DEFAULT_AUTOMATIC_BACKUPS_ENABLED, DEFAULT_BACKUP_REMINDER_INTERVAL_DAYS,
        DEFAULT_CONTACT_SORT_BY_LAST_NAME, DEFAULT_LOCATION_SHARE_DURATION_MS,
        DEFAULT_LOCATION_SHARE_INTERVAL_MS, DEFAULT_WEBCLIENT_KEEP_SCREEN_ON,
        DEFAULT_WEBCLIENT_NOTIFICATIONS_IN_BROWSER,
    },
};
use tracing::{trace, warn};

use crate::{SettingsStore, SettingsStoreError};

const KEY_AUTOMATIC_BACKUPS: &str = "backup.automatic";
const KEY_BACKUP_REMINDER_DAYS: &str = "backup.reminder_interval_days";
const KEY_LOCATION_INTEGRATION: &str = "location.integration";
const KEY_LOCATION_SHARE_DURATION: &str = "location.share_duration_ms";
const KEY_LOCATION_SHARE_INTERVAL: &str = "location.share_interval_ms";
const KEY_CUSTOM_OSM_SERVER: &str = "location.custom_osm_server";
const KEY_WEBCLIENT_KEEP_SCREEN_ON: &str = "webclient.keep_screen_on";
const KEY_WEBCLIENT_BROWSER_NOTIFICATIONS: &str = "webclient.notifications_in_browser";
const KEY_APP_ICON: &str = "app.icon";
const KEY_CONTACT_SORT_LAST_NAME: &str = "contacts.sort_by_last_name";

/// [`SettingsService`] backed by any [`SettingsStore`].
#[derive(Clone)]
pub struct StoredSettings<S: SettingsStore> {
    store: S,
}

impl<S: SettingsStore> StoredSettings<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn read<T>(&self, key: &'static str, default: T) -> T
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.store.get_value(key) {
            Ok(raw) => match raw.parse::<T>() {
                Ok(value) => value,
                Err(err) => {
                    warn!(key, value = %raw, error = %err, "unreadable setting; using default");
                    default
                }
            },
            Err(SettingsStoreError::NotFound) => default,
            Err(err) => {
                warn!(key, error = %err, "settings store read failed; using default");
                default
            }
        }
    }

    fn write(&self, key: &'static str, value: impl Display) -> Result<(), RosterError> {
        let value = value.to_string();
        trace!(key, %value, "writing setting");
        self.store
            .set_value(key, &value)
            .map_err(|err| map_store_error(key, err))
    }
}

impl<S: SettingsStore> SettingsService for StoredSettings<S> {
    fn automatic_backups_enabled(&self) -> bool {
        self.read(KEY_AUTOMATIC_BACKUPS, DEFAULT_AUTOMATIC_BACKUPS_ENABLED)
    }

    fn set_automatic_backups_enabled(&self, enabled: bool) -> Result<(), RosterError> {
        self.write(KEY_AUTOMATIC_BACKUPS, enabled)
    }

    fn backup_reminder_interval_days(&self) -> u32 {
        self.read(KEY_BACKUP_REMINDER_DAYS, DEFAULT_BACKUP_REMINDER_INTERVAL_DAYS)
    }

    fn set_backup_reminder_interval_days(&self, days: u32) -> Result<(), RosterError> {
        self.write(KEY_BACKUP_REMINDER_DAYS, days)
    }

    fn location_integration(&self) -> LocationIntegration {
        self.read(KEY_LOCATION_INTEGRATION, LocationIntegration::default())
    }

    fn set_location_integration(
        &self,
        integration: LocationIntegration,
    ) -> Result<(), RosterError> {
        self.write(KEY_LOCATION_INTEGRATION, integration.as_str())
    }

    fn location_share_duration_ms(&self) -> u64 {
        self.read(KEY_LOCATION_SHARE_DURATION, DEFAULT_LOCATION_SHARE_DURATION_MS)
    }

    fn set_location_share_duration_ms(&self, duration_ms: u64) -> Result<(), RosterError> {
        self.write(KEY_LOCATION_SHARE_DURATION, duration_ms)
    }

    fn location_share_interval_ms(&self) -> u64 {
        self.read(KEY_LOCATION_SHARE_INTERVAL, DEFAULT_LOCATION_SHARE_INTERVAL_MS)
    }

    fn set_location_share_interval_ms(&self, interval_ms: u64) -> Result<(), RosterError> {
        self.write(KEY_LOCATION_SHARE_INTERVAL, interval_ms)
    }

    fn custom_osm_server_url(&self) -> Option<String> {
        match self.store.get_value(KEY_CUSTOM_OSM_SERVER) {
            Ok(url) => Some(url).filter(|url| !url.trim().is_empty()),
            Err(SettingsStoreError::NotFound) => None,
            Err(err) => {
                warn!(key = KEY_CUSTOM_OSM_SERVER, error = %err, "settings store read failed");
                None
            }
        }
    }

    fn set_custom_osm_server_url(&self, url: Option<&str>) -> Result<(), RosterError> {
        match url.map(str::trim).filter(|url| !url.is_empty()) {
            Some(url) => self.write(KEY_CUSTOM_OSM_SERVER, url),
            None => match self.store.remove_value(KEY_CUSTOM_OSM_SERVER) {
                Ok(()) | Err(SettingsStoreError::NotFound) => Ok(()),
                Err(err) => Err(map_store_error(KEY_CUSTOM_OSM_SERVER, err)),
            },
        }
    }

    fn webclient_keep_screen_on(&self) -> bool {
        self.read(KEY_WEBCLIENT_KEEP_SCREEN_ON, DEFAULT_WEBCLIENT_KEEP_SCREEN_ON)
    }

    fn set_webclient_keep_screen_on(&self, keep_on: bool) -> Result<(), RosterError> {
        self.write(KEY_WEBCLIENT_KEEP_SCREEN_ON, keep_on)
    }

    fn webclient_notifications_in_browser(&self) -> bool {
        self.read(
            KEY_WEBCLIENT_BROWSER_NOTIFICATIONS,
            DEFAULT_WEBCLIENT_NOTIFICATIONS_IN_BROWSER,
        )
    }

    fn set_webclient_notifications_in_browser(&self, enabled: bool) -> Result<(), RosterError> {
        self.write(KEY_WEBCLIENT_BROWSER_NOTIFICATIONS, enabled)
    }

    fn app_icon(&self) -> AppIcon {
        self.read(KEY_APP_ICON, AppIcon::default())
    }

    fn set_app_icon(&self, icon: AppIcon) -> Result<(), RosterError> {
        self.write(KEY_APP_ICON, icon.as_str())
    }

    fn contact_sort_by_last_name(&self) -> bool {
        self.read(KEY_CONTACT_SORT_LAST_NAME, DEFAULT_CONTACT_SORT_BY_LAST_NAME)
    }

    fn set_contact_sort_by_last_name(&self, by_last_name: bool) -> Result<(), RosterError> {
        self.write(KEY_CONTACT_SORT_LAST_NAME, by_last_name)
    }
}

fn map_store_error(key: &str, err: SettingsStoreError) -> RosterError {
    RosterError::new(
        RosterErrorCategory::Storage,
        "settings_write_failed",
        format!("failed writing setting '{key}': {err}"),
    )
}

#[cfg(test)]
mod tests {
    use std::{
        env, fs,
        path::PathBuf,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;
    use crate::{InMemorySettingsStore, JsonFileSettingsStore};

    #[test]
    fn unset_options_report_defaults() {
        let settings = StoredSettings::new(InMemorySettingsStore::default());
        assert!(!settings.automatic_backups_enabled());
        assert_eq!(settings.backup_reminder_interval_days(), 7);
        assert_eq!(settings.location_integration(), LocationIntegration::None);
        assert_eq!(settings.location_share_duration_ms(), 3_600_000);
        assert_eq!(settings.location_share_interval_ms(), 60_000);
        assert_eq!(settings.custom_osm_server_url(), None);
        assert!(settings.webclient_keep_screen_on());
        assert!(settings.webclient_notifications_in_browser());
        assert_eq!(settings.app_icon(), AppIcon::Default);
        assert!(!settings.contact_sort_by_last_name());
    }

    #[test]
    fn set_values_are_read_back() {
        let settings = StoredSettings::new(InMemorySettingsStore::default());
        settings.set_automatic_backups_enabled(true).expect("set");
        settings
            .set_location_integration(LocationIntegration::CustomOsm)
            .expect("set");
        settings
            .set_custom_osm_server_url(Some(" https://tiles.example.org "))
            .expect("set");
        settings.set_app_icon(AppIcon::Dark).expect("set");

        assert!(settings.automatic_backups_enabled());
        assert_eq!(
            settings.location_integration(),
            LocationIntegration::CustomOsm
        );
        assert_eq!(
            settings.custom_osm_server_url().as_deref(),
            Some("https://tiles.example.org")
        );
        assert_eq!(settings.app_icon(), AppIcon::Dark);

        settings.set_custom_osm_server_url(None).expect("clear");
        settings.set_custom_osm_server_url(None).expect("clear twice");
        assert_eq!(settings.custom_osm_server_url(), None);
    }

    #[test]
    fn unreadable_value_falls_back_to_default() {
        let store = InMemorySettingsStore::default();
        store.set_value(KEY_BACKUP_REMINDER_DAYS, "weekly").expect("raw set");
        store.set_value(KEY_APP_ICON, "neon").expect("raw set");

        let settings = StoredSettings::new(store);
        assert_eq!(settings.backup_reminder_interval_days(), 7);
        assert_eq!(settings.app_icon(), AppIcon::Default);
    }

    #[test]
    fn file_backed_settings_survive_restart() {
        let now_nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let dir: PathBuf = env::temp_dir().join(format!("roster-settings-{now_nanos}"));
        let path = dir.join("settings.json");

        {
            let store = JsonFileSettingsStore::open(&path).expect("open");
            let settings = StoredSettings::new(store);
            settings.set_location_share_interval_ms(15_000).expect("set");
            settings.set_contact_sort_by_last_name(true).expect("set");
        }

        let settings = StoredSettings::new(JsonFileSettingsStore::open(&path).expect("reopen"));
        assert_eq!(settings.location_share_interval_ms(), 15_000);
        assert!(settings.contact_sort_by_last_name());
        assert!(settings.webclient_keep_screen_on());

        let _ = fs::remove_dir_all(dir);
    }
}
