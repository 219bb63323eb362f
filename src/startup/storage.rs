use std::sync::Arc;

use anyhow::Result;

use crate::prefs::PreferenceStore;

const ENABLE_LOGS: bool = true;

use crate::log_warn;

pub const MENU_KEY: &str = "StartMenu.Menu";
/// Key used by earlier releases; migrated to [`MENU_KEY`] on first read.
pub const LEGACY_MENU_KEY: &str = "StartMenu.finalLink";
pub const ALWAYS_APP_MODE_KEY: &str = "StartMenu.AlwaysAppMode";

/// Durable state of the startup flow: the resolved link and the always-app switch.
#[derive(Clone)]
pub struct LinkStore {
    prefs: Arc<PreferenceStore>,
}

impl LinkStore {
    pub fn new(prefs: Arc<PreferenceStore>) -> Self {
        Self { prefs }
    }

    pub fn save_menu(&self, link: &str) -> Result<()> {
        self.prefs.update(|entries| {
            entries.insert(MENU_KEY.into(), link.into());
            entries.remove(LEGACY_MENU_KEY);
        })
    }

    /// Saved link, migrating it from the legacy key if only that one is set.
    pub fn load_menu(&self) -> Option<String> {
        if let Some(link) = self.prefs.get_string(MENU_KEY).filter(|v| !v.is_empty()) {
            return Some(link);
        }

        let legacy = self
            .prefs
            .get_string(LEGACY_MENU_KEY)
            .filter(|v| !v.is_empty())?;

        if let Err(err) = self.save_menu(&legacy) {
            log_warn!("failed to migrate legacy menu link: {err:#}");
        }
        Some(legacy)
    }

    pub fn clear_menu(&self) -> Result<()> {
        self.prefs.update(|entries| {
            entries.remove(MENU_KEY);
            entries.remove(LEGACY_MENU_KEY);
        })
    }

    pub fn set_always_app_mode(&self, on: bool) -> Result<()> {
        self.prefs.set(ALWAYS_APP_MODE_KEY, on)
    }

    pub fn is_always_app_mode(&self) -> bool {
        self.prefs.get_bool(ALWAYS_APP_MODE_KEY)
    }
}
