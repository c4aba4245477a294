//! Application settings contract.
//!
//! Consumers receive a `SettingsService` explicitly instead of reaching for
//! process-wide state. Getters never fail: a missing or unreadable value
//! yields the documented default. Values live as long as the backing store
//! does, so a file-backed service keeps them across restarts.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::RosterError;

pub const DEFAULT_AUTOMATIC_BACKUPS_ENABLED: bool = false;
pub const DEFAULT_BACKUP_REMINDER_INTERVAL_DAYS: u32 = 7;
pub const DEFAULT_LOCATION_SHARE_DURATION_MS: u64 = 3_600_000;
pub const DEFAULT_LOCATION_SHARE_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_WEBCLIENT_KEEP_SCREEN_ON: bool = true;
pub const DEFAULT_WEBCLIENT_NOTIFICATIONS_IN_BROWSER: bool = true;
pub const DEFAULT_CONTACT_SORT_BY_LAST_NAME: bool = false;

/// Map provider used when rendering shared locations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum LocationIntegration {
    /// Location sharing disabled until the user picks a provider.
    #[default]
    None,
    /// Built-in OpenStreetMap tiles.
    Osm,
    /// Platform maps application.
    Maps,
    /// Plain links to an external map site.
    BasicLinks,
    /// OpenStreetMap tiles from a user-provided server.
    CustomOsm,
}

/// Launcher icon variant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum AppIcon {
    #[default]
    Default,
    Dark,
    Mono,
    Classic,
}

/// Error returned when a stored setting value does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown variant '{0}'")]
pub struct UnknownVariant(pub String);

impl LocationIntegration {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Osm => "osm",
            Self::Maps => "maps",
            Self::BasicLinks => "basic_links",
            Self::CustomOsm => "custom_osm",
        }
    }

    /// Whether the user has enabled any provider.
    pub fn is_enabled(self) -> bool {
        self != Self::None
    }
}

impl FromStr for LocationIntegration {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "none" => Ok(Self::None),
            "osm" => Ok(Self::Osm),
            "maps" => Ok(Self::Maps),
            "basic_links" => Ok(Self::BasicLinks),
            "custom_osm" => Ok(Self::CustomOsm),
            other => Err(UnknownVariant(other.to_owned())),
        }
    }
}

impl AppIcon {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Dark => "dark",
            Self::Mono => "mono",
            Self::Classic => "classic",
        }
    }
}

impl FromStr for AppIcon {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "default" => Ok(Self::Default),
            "dark" => Ok(Self::Dark),
            "mono" => Ok(Self::Mono),
            "classic" => Ok(Self::Classic),
            other => Err(UnknownVariant(other.to_owned())),
        }
    }
}

/// Typed access to every user-facing option.
pub trait SettingsService: Send + Sync {
    fn automatic_backups_enabled(&self) -> bool;
    fn set_automatic_backups_enabled(&self, enabled: bool) -> Result<(), RosterError>;

    fn backup_reminder_interval_days(&self) -> u32;
    fn set_backup_reminder_interval_days(&self, days: u32) -> Result<(), RosterError>;

    fn location_integration(&self) -> LocationIntegration;
    fn set_location_integration(&self, integration: LocationIntegration)
    -> Result<(), RosterError>;

    fn location_share_duration_ms(&self) -> u64;
    fn set_location_share_duration_ms(&self, duration_ms: u64) -> Result<(), RosterError>;

    fn location_share_interval_ms(&self) -> u64;
    fn set_location_share_interval_ms(&self, interval_ms: u64) -> Result<(), RosterError>;

    /// Tile server used by [`LocationIntegration::CustomOsm`].
    fn custom_osm_server_url(&self) -> Option<String>;
    /// `None` clears the stored URL.
    fn set_custom_osm_server_url(&self, url: Option<&str>) -> Result<(), RosterError>;

    fn webclient_keep_screen_on(&self) -> bool;
    fn set_webclient_keep_screen_on(&self, keep_on: bool) -> Result<(), RosterError>;

    fn webclient_notifications_in_browser(&self) -> bool;
    fn set_webclient_notifications_in_browser(&self, enabled: bool) -> Result<(), RosterError>;

    fn app_icon(&self) -> AppIcon;
    fn set_app_icon(&self, icon: AppIcon) -> Result<(), RosterError>;

    fn contact_sort_by_last_name(&self) -> bool;
    fn set_contact_sort_by_last_name(&self, by_last_name: bool) -> Result<(), RosterError>;
}
