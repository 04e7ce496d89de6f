//! User preferences stored under their own keys, independent of match progress.

use std::{fmt, str::FromStr, sync::Arc};

use anyhow::{anyhow, Error};
use serde::{Deserialize, Serialize};

use crate::storage::{read_json, write_json, KeyValueStore};

/// Key holding the selected interface language.
pub const LANGUAGE_STORAGE_KEY: &str = "terrorscape.preferences.language";
/// Key holding the menu animation flag.
pub const MENU_ANIMATION_STORAGE_KEY: &str = "terrorscape.preferences.menuAnimation";
/// Key holding the sound flag.
pub const SOUND_ENABLED_STORAGE_KEY: &str = "terrorscape.preferences.soundEnabled";

/// Supported interface languages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// Russian, the default.
    #[default]
    Ru,
    /// English.
    En,
}

impl Locale {
    /// Short language code.
    pub fn code(self) -> &'static str {
        match self {
            Locale::Ru => "ru",
            Locale::En => "en",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Locale {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ru" => Ok(Locale::Ru),
            "en" => Ok(Locale::En),
            other => Err(anyhow!("unsupported locale '{other}'")),
        }
    }
}

/// Reads and writes the preference keys through a shared store.
#[derive(Clone)]
pub struct Preferences {
    storage: Arc<dyn KeyValueStore>,
}

impl Preferences {
    /// Wrap a storage backend.
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Stored language, falling back to the default locale.
    pub fn locale(&self) -> Locale {
        read_json(self.storage.as_ref(), LANGUAGE_STORAGE_KEY).unwrap_or_default()
    }

    /// Persist the language.
    pub fn set_locale(&self, locale: Locale) {
        write_json(self.storage.as_ref(), LANGUAGE_STORAGE_KEY, &locale);
    }

    /// Whether menu animations are enabled. Defaults to true.
    pub fn menu_animation(&self) -> bool {
        read_json(self.storage.as_ref(), MENU_ANIMATION_STORAGE_KEY).unwrap_or(true)
    }

    /// Persist the menu animation flag.
    pub fn set_menu_animation(&self, enabled: bool) {
        write_json(self.storage.as_ref(), MENU_ANIMATION_STORAGE_KEY, &enabled);
    }

    /// Whether sound effects are enabled. Defaults to true.
    pub fn sound_enabled(&self) -> bool {
        read_json(self.storage.as_ref(), SOUND_ENABLED_STORAGE_KEY).unwrap_or(true)
    }

    /// Flip the sound flag, persist it, and return the new value.
    pub fn toggle_sound(&self) -> bool {
        let enabled = !self.sound_enabled();
        write_json(self.storage.as_ref(), SOUND_ENABLED_STORAGE_KEY, &enabled);
        enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn defaults_apply_without_stored_values() {
        let prefs = Preferences::new(Arc::new(MemoryStorage::new()));
        assert_eq!(prefs.locale(), Locale::Ru);
        assert!(prefs.menu_animation());
        assert!(prefs.sound_enabled());
    }

    #[test]
    fn values_persist_under_their_own_keys() {
        let storage = MemoryStorage::new();
        let prefs = Preferences::new(Arc::new(storage.clone()));

        prefs.set_locale(Locale::En);
        prefs.set_menu_animation(false);
        assert!(!prefs.toggle_sound());
        assert!(prefs.toggle_sound());
        assert!(!prefs.toggle_sound());

        assert_eq!(
            storage.read(LANGUAGE_STORAGE_KEY).ok().flatten().as_deref(),
            Some("\"en\"")
        );
        let reopened = Preferences::new(Arc::new(storage));
        assert_eq!(reopened.locale(), Locale::En);
        assert!(!reopened.menu_animation());
        assert!(!reopened.sound_enabled());
    }

    #[test]
    fn parses_locale_codes() {
        assert_eq!("EN".parse::<Locale>().ok(), Some(Locale::En));
        assert!("de".parse::<Locale>().is_err());
    }
}
