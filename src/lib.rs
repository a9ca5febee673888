pub mod dataset;
pub mod db;
pub mod error;
pub mod grid;
pub mod logging;
pub mod print;
pub mod row;
pub mod search;
pub mod store;
pub mod types;

#[cfg(feature = "desktop")]
mod commands;

#[cfg(feature = "desktop")]
pub use desktop::run;

#[cfg(feature = "desktop")]
mod desktop {
    use crate::commands::{self, AppState};
    use crate::{db, grid::GridController, logging, store::RecordStore};
    use std::sync::Mutex;
    use tauri::{Emitter, Manager};

    pub const GRID_CHANGED_EVENT: &str = "grid-changed";

    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        tauri::Builder::default()
            .plugin(tauri_plugin_dialog::init())
            .plugin(tauri_plugin_opener::init())
            .setup(|app| {
                let app_data_dir = app.path().app_data_dir().map_err(|e| e.to_string())?;
                // .env in the app data dir may set ACCIDENT_INTAKE_LOG for field diagnostics
                let env_path = app_data_dir.join(".env");
                if env_path.exists() {
                    let _ = dotenvy::from_path(&env_path);
                }
                logging::init(tracing::Level::WARN);
                let db = db::Db::new(app_data_dir.join(db::DB_FILE_NAME))?;

                let mut grid = GridController::new(RecordStore::default());
                let handle = app.handle().clone();
                grid.subscribe(move |snapshot| {
                    if let Err(e) = handle.emit(GRID_CHANGED_EVENT, snapshot) {
                        tracing::warn!(error = %e, "could not emit grid snapshot");
                    }
                });
                app.manage(AppState {
                    grid: Mutex::new(grid),
                    db: Mutex::new(Some(db)),
                });
                Ok(())
            })
            .invoke_handler(tauri::generate_handler![
                commands::get_app_data_path,
                commands::open_app_data_folder,
                commands::get_app_version,
                commands::validate_dataset_file,
                commands::load_dataset_file,
                commands::load_dataset_upload,
                commands::load_dataset_text,
                commands::grid_snapshot,
                commands::grid_edit_query,
                commands::grid_key,
                commands::grid_manual_key,
                commands::grid_select_candidate,
                commands::grid_choose_manual_entry,
                commands::grid_set_manual_field,
                commands::grid_complete_manual,
                commands::grid_cancel_manual,
                commands::grid_clear_row,
                commands::grid_remove_row,
                commands::grid_append_row,
                commands::grid_focus_row,
                commands::grid_advance_focus,
                commands::grid_after_render,
                commands::get_preferences,
                commands::set_manager_name,
                commands::set_max_rows_per_page,
                commands::render_print_html,
                commands::export_print_xlsx,
            ])
            .run(tauri::generate_context!())
            .expect("error while running tauri application");
    }
}
