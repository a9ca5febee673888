use crate::dataset::{self, DatasetFormat};
use crate::db::{Db, Preferences};
use crate::grid::{Direction, GridController, GridKey, GridSnapshot, UiAction};
use crate::print;
use crate::row::RowId;
use crate::types::ManualField;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tauri::{AppHandle, Manager, State};

const MAX_DATASET_BYTES: u64 = 100 * 1024 * 1024;

#[derive(Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyResponse {
    pub handled: bool,
    pub snapshot: GridSnapshot,
}

pub struct AppState {
    pub grid: Mutex<GridController>,
    pub db: Mutex<Option<Db>>,
}

fn with_grid<T>(
    state: &State<AppState>,
    f: impl FnOnce(&mut GridController) -> T,
) -> Result<T, String> {
    let mut grid = state.grid.lock().map_err(|e| e.to_string())?;
    Ok(f(&mut grid))
}

fn snapshot_after(
    state: &State<AppState>,
    f: impl FnOnce(&mut GridController),
) -> Result<GridSnapshot, String> {
    with_grid(state, |g| {
        f(g);
        g.snapshot()
    })
}

fn preferences(state: &State<AppState>) -> Result<Preferences, String> {
    let db = state.db.lock().map_err(|e| e.to_string())?;
    let db = db.as_ref().ok_or("Database not initialized")?;
    db.load_preferences().map_err(|e| e.to_string())
}

#[tauri::command]
pub fn get_app_data_path(app: AppHandle) -> Result<String, String> {
    let path = app.path().app_data_dir().map_err(|e| e.to_string())?;
    path.to_str()
        .map(String::from)
        .ok_or_else(|| "Invalid path".to_string())
}

#[tauri::command]
pub fn get_app_version(app: AppHandle) -> String {
    app.package_info().version.to_string()
}

#[tauri::command]
pub fn open_app_data_folder(app: AppHandle) -> Result<(), String> {
    let path = app.path().app_data_dir().map_err(|e| e.to_string())?;
    opener::open(&path).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn validate_dataset_file(path: String) -> Result<ValidationResult, String> {
    let path = Path::new(&path);
    if !path.exists() {
        return Ok(ValidationResult {
            valid: false,
            error: Some("File not found.".to_string()),
        });
    }
    let metadata = fs::metadata(path).map_err(|e| e.to_string())?;
    if metadata.len() > MAX_DATASET_BYTES {
        return Ok(ValidationResult {
            valid: false,
            error: Some("File too large (max 100MB).".to_string()),
        });
    }
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if let Err(e) = DatasetFormat::from_file_name(name) {
        return Ok(ValidationResult {
            valid: false,
            error: Some(e.to_string()),
        });
    }
    Ok(ValidationResult {
        valid: true,
        error: None,
    })
}

/// Parse on a background thread, then swap the store into the grid.
#[tauri::command]
pub async fn load_dataset_file(state: State<'_, AppState>, path: String) -> Result<GridSnapshot, String> {
    let store = tauri::async_runtime::spawn_blocking(move || dataset::load_path(Path::new(&path)))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())?;
    snapshot_after(&state, |g| g.replace_store(store))
}

/// File picked in the webview's upload control, sent as base64.
#[tauri::command]
pub async fn load_dataset_upload(
    state: State<'_, AppState>,
    file_name: String,
    base64_content: String,
) -> Result<GridSnapshot, String> {
    let bytes = BASE64
        .decode(&base64_content)
        .map_err(|e| format!("Invalid base64: {}", e))?;
    let store = tauri::async_runtime::spawn_blocking(move || dataset::load_bytes(&file_name, bytes))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())?;
    snapshot_after(&state, |g| g.replace_store(store))
}

#[tauri::command]
pub fn load_dataset_text(state: State<AppState>, text: String) -> Result<GridSnapshot, String> {
    let store = dataset::load_pasted_text(&text).map_err(|e| e.to_string())?;
    snapshot_after(&state, |g| g.replace_store(store))
}

#[tauri::command]
pub fn grid_snapshot(state: State<AppState>) -> Result<GridSnapshot, String> {
    with_grid(&state, |g| g.snapshot())
}

#[tauri::command]
pub fn grid_edit_query(state: State<AppState>, row_id: RowId, text: String) -> Result<GridSnapshot, String> {
    snapshot_after(&state, |g| {
        g.edit_query(row_id, text);
    })
}

#[tauri::command]
pub fn grid_key(state: State<AppState>, row_id: RowId, key: GridKey) -> Result<KeyResponse, String> {
    with_grid(&state, |g| KeyResponse {
        handled: g.handle_key(row_id, key),
        snapshot: g.snapshot(),
    })
}

#[tauri::command]
pub fn grid_manual_key(
    state: State<AppState>,
    row_id: RowId,
    field: ManualField,
    key: GridKey,
) -> Result<KeyResponse, String> {
    with_grid(&state, |g| KeyResponse {
        handled: g.handle_manual_key(row_id, field, key),
        snapshot: g.snapshot(),
    })
}

#[tauri::command]
pub fn grid_select_candidate(state: State<AppState>, row_id: RowId, index: usize) -> Result<GridSnapshot, String> {
    snapshot_after(&state, |g| {
        g.select_candidate(row_id, index);
    })
}

#[tauri::command]
pub fn grid_choose_manual_entry(state: State<AppState>, row_id: RowId) -> Result<GridSnapshot, String> {
    snapshot_after(&state, |g| {
        g.choose_manual_entry(row_id);
    })
}

#[tauri::command]
pub fn grid_set_manual_field(
    state: State<AppState>,
    row_id: RowId,
    field: ManualField,
    value: String,
) -> Result<GridSnapshot, String> {
    snapshot_after(&state, |g| {
        g.set_manual_field(row_id, field, value);
    })
}

#[tauri::command]
pub fn grid_complete_manual(state: State<AppState>, row_id: RowId) -> Result<GridSnapshot, String> {
    snapshot_after(&state, |g| {
        g.complete_manual(row_id);
    })
}

#[tauri::command]
pub fn grid_cancel_manual(state: State<AppState>, row_id: RowId) -> Result<GridSnapshot, String> {
    snapshot_after(&state, |g| {
        g.cancel_manual(row_id);
    })
}

#[tauri::command]
pub fn grid_clear_row(state: State<AppState>, row_id: RowId) -> Result<GridSnapshot, String> {
    snapshot_after(&state, |g| {
        g.clear_row(row_id);
    })
}

#[tauri::command]
pub fn grid_remove_row(state: State<AppState>, row_id: RowId) -> Result<GridSnapshot, String> {
    snapshot_after(&state, |g| {
        g.remove_row(row_id);
    })
}

#[tauri::command]
pub fn grid_append_row(state: State<AppState>) -> Result<GridSnapshot, String> {
    snapshot_after(&state, |g| {
        g.append_row();
    })
}

#[tauri::command]
pub fn grid_focus_row(state: State<AppState>, row_id: RowId) -> Result<GridSnapshot, String> {
    snapshot_after(&state, |g| g.focus_row(row_id))
}

#[tauri::command]
pub fn grid_advance_focus(
    state: State<AppState>,
    row_id: RowId,
    direction: Direction,
) -> Result<GridSnapshot, String> {
    snapshot_after(&state, |g| {
        g.advance_focus(row_id, direction);
    })
}

/// Called from the front end's post-render hook; returns the focus and scroll work to run.
#[tauri::command]
pub fn grid_after_render(state: State<AppState>) -> Result<Vec<UiAction>, String> {
    with_grid(&state, |g| g.after_render())
}

#[tauri::command]
pub fn get_preferences(state: State<AppState>) -> Result<Preferences, String> {
    preferences(&state)
}

#[tauri::command]
pub fn set_manager_name(state: State<AppState>, name: String) -> Result<Preferences, String> {
    {
        let db = state.db.lock().map_err(|e| e.to_string())?;
        let db = db.as_ref().ok_or("Database not initialized")?;
        db.set_manager_name(name.trim()).map_err(|e| e.to_string())?;
    }
    preferences(&state)
}

#[tauri::command]
pub fn set_max_rows_per_page(state: State<AppState>, rows: i64) -> Result<Preferences, String> {
    {
        let db = state.db.lock().map_err(|e| e.to_string())?;
        let db = db.as_ref().ok_or("Database not initialized")?;
        db.set_max_rows_per_page(rows).map_err(|e| e.to_string())?;
    }
    preferences(&state)
}

fn print_document(state: &State<AppState>, book_number: &str) -> Result<print::PrintDocument, String> {
    let prefs = preferences(state)?;
    let rows = with_grid(state, |g| g.committed_rows())?;
    print::build_document(&rows, &prefs, book_number).map_err(|e| e.to_string())
}

/// HTML for the print window.
#[tauri::command]
pub fn render_print_html(state: State<AppState>, book_number: String) -> Result<String, String> {
    let doc = print_document(&state, &book_number)?;
    Ok(print::render_html(&doc))
}

#[tauri::command]
pub async fn export_print_xlsx(
    state: State<'_, AppState>,
    book_number: String,
    path: Option<String>,
) -> Result<String, String> {
    let doc = print_document(&state, &book_number)?;
    tauri::async_runtime::spawn_blocking(move || {
        print::export_xlsx(&doc, path.as_deref()).map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| e.to_string())?
}
