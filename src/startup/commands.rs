use tauri::{Emitter, State};

use super::{StartupOutcome, TapSource};
use crate::AppState;

/// Resolves where the app should open. Safe to call repeatedly; the flow runs once.
#[tauri::command]
pub async fn resolve_startup(
    state: State<'_, AppState>,
    app_handle: tauri::AppHandle,
) -> Result<StartupOutcome, String> {
    let outcome = state.startup.resolve().await;
    app_handle
        .emit("startup-state-changed", &outcome.state)
        .map_err(|e| e.to_string())?;
    Ok(outcome)
}

#[tauri::command]
pub async fn close_web_view(
    state: State<'_, AppState>,
    app_handle: tauri::AppHandle,
) -> Result<(), String> {
    state.startup.close_web_view();
    app_handle
        .emit("startup-state-changed", state.startup.state())
        .map_err(|e| e.to_string())
}

/// Returns `true` when the frontend should show the store review prompt.
#[tauri::command]
pub fn register_tap(state: State<'_, AppState>, source: TapSource) -> bool {
    state.rate_prompt.register_tap(source)
}
