use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::prefs::PreferenceStore;

const DAILY_GOAL_KEY: &str = "dailyGoal";
const LANGUAGE_KEY: &str = "appLanguage";
const THEME_KEY: &str = "appTheme";
const NOTIFICATIONS_KEY: &str = "notificationsEnabled";

const DEFAULT_DAILY_GOAL: i64 = 20;
const MAX_DAILY_GOAL: i64 = 200;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AppLanguage {
    #[default]
    En,
    Fr,
    Es,
}

impl AppLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppLanguage::En => "en",
            AppLanguage::Fr => "fr",
            AppLanguage::Es => "es",
        }
    }

    fn from_str(value: &str) -> Option<Self> {
        match value {
            "en" => Some(AppLanguage::En),
            "fr" => Some(AppLanguage::Fr),
            "es" => Some(AppLanguage::Es),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AppTheme {
    #[default]
    System,
    Light,
    Dark,
    Sepia,
}

impl AppTheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppTheme::System => "system",
            AppTheme::Light => "light",
            AppTheme::Dark => "dark",
            AppTheme::Sepia => "sepia",
        }
    }

    fn from_str(value: &str) -> Option<Self> {
        match value {
            "system" => Some(AppTheme::System),
            "light" => Some(AppTheme::Light),
            "dark" => Some(AppTheme::Dark),
            "sepia" => Some(AppTheme::Sepia),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    /// Pages per day; 0 means no goal.
    pub daily_goal: i64,
    pub language: AppLanguage,
    pub theme: AppTheme,
    pub notifications_enabled: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            daily_goal: DEFAULT_DAILY_GOAL,
            language: AppLanguage::default(),
            theme: AppTheme::default(),
            notifications_enabled: false,
        }
    }
}

/// Typed view over the user-facing entries of the preference store.
#[derive(Clone)]
pub struct SettingsStore {
    prefs: Arc<PreferenceStore>,
}

impl SettingsStore {
    pub fn new(prefs: Arc<PreferenceStore>) -> Self {
        Self { prefs }
    }

    pub fn current(&self) -> UserSettings {
        UserSettings {
            daily_goal: self.daily_goal(),
            language: self.language(),
            theme: self.theme(),
            notifications_enabled: self.prefs.get_bool(NOTIFICATIONS_KEY),
        }
    }

    pub fn daily_goal(&self) -> i64 {
        self.prefs
            .get_i64(DAILY_GOAL_KEY)
            .filter(|goal| (0..=MAX_DAILY_GOAL).contains(goal))
            .unwrap_or(DEFAULT_DAILY_GOAL)
    }

    pub fn language(&self) -> AppLanguage {
        self.prefs
            .get_string(LANGUAGE_KEY)
            .and_then(|raw| AppLanguage::from_str(&raw))
            .unwrap_or_default()
    }

    pub fn theme(&self) -> AppTheme {
        self.prefs
            .get_string(THEME_KEY)
            .and_then(|raw| AppTheme::from_str(&raw))
            .unwrap_or_default()
    }

    pub fn update(&self, settings: UserSettings) -> Result<UserSettings> {
        if !(0..=MAX_DAILY_GOAL).contains(&settings.daily_goal) {
            bail!(
                "daily goal must be between 0 and {MAX_DAILY_GOAL}, got {}",
                settings.daily_goal
            );
        }

        self.prefs.update(|entries| {
            entries.insert(DAILY_GOAL_KEY.into(), settings.daily_goal.into());
            entries.insert(LANGUAGE_KEY.into(), settings.language.as_str().into());
            entries.insert(THEME_KEY.into(), settings.theme.as_str().into());
            entries.insert(NOTIFICATIONS_KEY.into(), settings.notifications_enabled.into());
        })?;

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, SettingsStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let prefs = PreferenceStore::new(dir.path().join("preferences.json")).expect("prefs");
        (dir, SettingsStore::new(Arc::new(prefs)))
    }

    #[test]
    fn defaults_when_nothing_stored() {
        let (_dir, settings) = store();
        assert_eq!(settings.current(), UserSettings::default());
        assert_eq!(settings.daily_goal(), 20);
    }

    #[test]
    fn update_round_trips_through_prefs() {
        let (_dir, settings) = store();
        let wanted = UserSettings {
            daily_goal: 0,
            language: AppLanguage::Fr,
            theme: AppTheme::Sepia,
            notifications_enabled: true,
        };
        settings.update(wanted.clone()).expect("update");
        assert_eq!(settings.current(), wanted);
    }

    #[test]
    fn rejects_goal_out_of_range() {
        let (_dir, settings) = store();
        let result = settings.update(UserSettings {
            daily_goal: 201,
            ..UserSettings::default()
        });
        assert!(result.is_err());
        assert_eq!(settings.daily_goal(), 20);
    }

    #[test]
    fn unknown_theme_falls_back_to_system() {
        let (_dir, settings) = store();
        settings.prefs.set(THEME_KEY, "neon").expect("set");
        assert_eq!(settings.theme(), AppTheme::System);
    }
}
