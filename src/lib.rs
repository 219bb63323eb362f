pub mod db;
pub mod prefs;
pub mod reminders;
pub mod settings;
pub mod startup;
mod utils;

#[cfg(feature = "app")]
mod books;

#[cfg(feature = "app")]
pub use app::run;

#[cfg(feature = "app")]
mod app {
    use std::sync::Arc;

    use tauri::{Emitter, Manager, State};

    use crate::books::commands::{
        create_book, delete_book, delete_reading_session, get_book, get_daily_stats,
        get_today_progress, list_books, list_favorites, list_reading_sessions, log_reading,
        set_favorite, update_book,
    };
    use crate::db::Database;
    use crate::prefs::PreferenceStore;
    use crate::reminders::{self, ReadingReminder};
    use crate::settings::{SettingsStore, UserSettings};
    use crate::startup::{
        commands::{close_web_view, register_tap, resolve_startup},
        LinkStore, RatePrompt, StartupConfig, StartupCoordinator,
    };

    pub(crate) struct AppState {
        pub(crate) db: Database,
        pub(crate) settings: SettingsStore,
        pub(crate) startup: StartupCoordinator,
        pub(crate) rate_prompt: RatePrompt,
    }

    #[tauri::command]
    fn get_settings(state: State<AppState>) -> Result<UserSettings, String> {
        Ok(state.settings.current())
    }

    #[tauri::command]
    fn update_settings(
        settings: UserSettings,
        state: State<AppState>,
        app_handle: tauri::AppHandle,
    ) -> Result<UserSettings, String> {
        let saved = state.settings.update(settings).map_err(|e| e.to_string())?;

        app_handle
            .emit("settings-updated", &saved)
            .map_err(|e| e.to_string())?;

        Ok(saved)
    }

    /// Reminder the shell should (re)schedule; `None` means cancel any pending one.
    #[tauri::command]
    fn get_reading_reminder(state: State<AppState>) -> Result<Option<ReadingReminder>, String> {
        let now = chrono::Local::now().naive_local();
        Ok(reminders::plan(&state.settings.current(), now))
    }

    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        // Initialize logging (reads RUST_LOG env var)
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();

        log::info!("Reading Coach starting up...");

        tauri::Builder::default()
            .plugin(tauri_plugin_opener::init())
            .setup(|app| {
                let result = (|| -> anyhow::Result<()> {
                    let app_data_dir = app
                        .path()
                        .app_data_dir()
                        .map_err(|err| anyhow::anyhow!(err))?;
                    std::fs::create_dir_all(&app_data_dir)?;

                    let database = Database::new(app_data_dir.join("readingcoach.sqlite3"))?;
                    let prefs = Arc::new(PreferenceStore::new(
                        app_data_dir.join("preferences.json"),
                    )?);

                    let config = StartupConfig::from_env();
                    let startup =
                        StartupCoordinator::from_config(&config, LinkStore::new(prefs.clone()))?;

                    app.manage(AppState {
                        db: database,
                        settings: SettingsStore::new(prefs),
                        startup,
                        rate_prompt: RatePrompt::default(),
                    });

                    Ok(())
                })();

                result.map_err(|err| err.into())
            })
            .invoke_handler(tauri::generate_handler![
                resolve_startup,
                close_web_view,
                register_tap,
                create_book,
                get_book,
                list_books,
                update_book,
                set_favorite,
                list_favorites,
                delete_book,
                log_reading,
                list_reading_sessions,
                delete_reading_session,
                get_daily_stats,
                get_today_progress,
                get_settings,
                update_settings,
                get_reading_reminder,
            ])
            .run(tauri::generate_context!())
            .expect("error while running tauri application");
    }
}

#[cfg(feature = "app")]
pub(crate) use app::AppState;
