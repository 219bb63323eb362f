use chrono::{DateTime, Utc};
use tauri::State;

use crate::{
    db::{BookSummary, BookUpdate, DayStat, NewBook, ReadingSession, StatsRange, TodayProgress},
    AppState,
};

#[tauri::command]
pub async fn create_book(state: State<'_, AppState>, input: NewBook) -> Result<BookSummary, String> {
    let db = &state.db;
    db.create_book(input).await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn get_book(
    state: State<'_, AppState>,
    book_id: String,
) -> Result<Option<BookSummary>, String> {
    let db = &state.db;
    db.get_book(&book_id).await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn list_books(
    state: State<'_, AppState>,
    search: Option<String>,
) -> Result<Vec<BookSummary>, String> {
    let db = &state.db;
    db.list_books(search).await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn update_book(
    state: State<'_, AppState>,
    book_id: String,
    update: BookUpdate,
) -> Result<BookSummary, String> {
    let db = &state.db;
    db.update_book(&book_id, update)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn set_favorite(
    state: State<'_, AppState>,
    book_id: String,
    is_favorite: bool,
) -> Result<BookSummary, String> {
    let db = &state.db;
    db.set_favorite(&book_id, is_favorite)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn list_favorites(state: State<'_, AppState>) -> Result<Vec<BookSummary>, String> {
    let db = &state.db;
    db.list_favorites().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn delete_book(state: State<'_, AppState>, book_id: String) -> Result<(), String> {
    let db = &state.db;
    db.delete_book(&book_id).await.map_err(|e| e.to_string())
}

/// `date` defaults to now; the frontend passes it when backfilling a past day.
#[tauri::command]
pub async fn log_reading(
    state: State<'_, AppState>,
    book_id: String,
    pages_read: i64,
    date: Option<DateTime<Utc>>,
) -> Result<ReadingSession, String> {
    let db = &state.db;
    db.log_reading(&book_id, pages_read, date.unwrap_or_else(Utc::now))
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn list_reading_sessions(
    state: State<'_, AppState>,
    book_id: String,
) -> Result<Vec<ReadingSession>, String> {
    let db = &state.db;
    db.list_sessions_for_book(&book_id)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn delete_reading_session(
    state: State<'_, AppState>,
    session_id: String,
) -> Result<(), String> {
    let db = &state.db;
    db.delete_reading_session(&session_id)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn get_daily_stats(
    state: State<'_, AppState>,
    range: StatsRange,
) -> Result<Vec<DayStat>, String> {
    let db = &state.db;
    db.daily_stats(range, Utc::now().date_naive())
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn get_today_progress(state: State<'_, AppState>) -> Result<TodayProgress, String> {
    let goal = state.settings.daily_goal();
    let db = &state.db;
    db.today_progress(Utc::now().date_naive(), goal)
        .await
        .map_err(|e| e.to_string())
}
