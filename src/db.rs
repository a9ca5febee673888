use crate::error::SettingsError;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, info};

pub const DB_FILE_NAME: &str = "accident_intake.db";

pub const DEFAULT_MANAGER_NAME: &str = "홍길동";
pub const MIN_ROWS_PER_PAGE: u32 = 30;
pub const MAX_ROWS_PER_PAGE: u32 = 40;
pub const DEFAULT_ROWS_PER_PAGE: u32 = MAX_ROWS_PER_PAGE;

const KEY_MANAGER_NAME: &str = "managerName";
const KEY_MAX_ROWS_PER_PAGE: &str = "maxRowsPerPage";

/// Operator preferences consumed by the print layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub manager_name: String,
    pub max_rows_per_page: u32,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            manager_name: DEFAULT_MANAGER_NAME.to_string(),
            max_rows_per_page: DEFAULT_ROWS_PER_PAGE,
        }
    }
}

pub fn clamp_rows_per_page(n: i64) -> u32 {
    n.clamp(MIN_ROWS_PER_PAGE as i64, MAX_ROWS_PER_PAGE as i64) as u32
}

pub struct Db {
    conn: Mutex<Connection>,
}

impl Db {
    pub fn new(db_path: PathBuf) -> Result<Self, SettingsError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&db_path)?;
        debug!(path = %db_path.display(), "preferences database opened");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, SettingsError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, SettingsError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT DEFAULT CURRENT_TIMESTAMP
            );
            INSERT INTO schema_version (version) SELECT 1 WHERE NOT EXISTS (SELECT 1 FROM schema_version LIMIT 1);
            CREATE TABLE IF NOT EXISTS preferences (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(Db {
            conn: Mutex::new(conn),
        })
    }

    /// Stored preferences with defaults for anything missing or unreadable.
    pub fn load_preferences(&self) -> Result<Preferences, SettingsError> {
        let manager_name = self
            .get(KEY_MANAGER_NAME)?
            .unwrap_or_else(|| DEFAULT_MANAGER_NAME.to_string());
        let max_rows_per_page = self
            .get(KEY_MAX_ROWS_PER_PAGE)?
            .and_then(|v| v.trim().parse::<i64>().ok())
            .map(clamp_rows_per_page)
            .unwrap_or(DEFAULT_ROWS_PER_PAGE);
        Ok(Preferences {
            manager_name,
            max_rows_per_page,
        })
    }

    pub fn set_manager_name(&self, name: &str) -> Result<(), SettingsError> {
        self.put(KEY_MANAGER_NAME, name)
    }

    /// Stores the value clamped to the supported range and returns what was stored.
    pub fn set_max_rows_per_page(&self, rows: i64) -> Result<u32, SettingsError> {
        let clamped = clamp_rows_per_page(rows);
        self.put(KEY_MAX_ROWS_PER_PAGE, &clamped.to_string())?;
        Ok(clamped)
    }

    fn get(&self, key: &str) -> Result<Option<String>, SettingsError> {
        let conn = self.conn.lock().map_err(|_| SettingsError::Poisoned)?;
        let value = conn
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                params![key],
                |r| r.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        let updated_at = chrono::Utc::now().to_rfc3339();
        let conn = self.conn.lock().map_err(|_| SettingsError::Poisoned)?;
        conn.execute(
            "INSERT INTO preferences (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, updated_at],
        )?;
        info!(key, value, "preference saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_nothing_stored() {
        let db = Db::open_in_memory().unwrap();
        assert_eq!(db.load_preferences().unwrap(), Preferences::default());
    }

    #[test]
    fn rows_per_page_is_clamped() {
        let db = Db::open_in_memory().unwrap();
        assert_eq!(db.set_max_rows_per_page(12).unwrap(), 30);
        assert_eq!(db.load_preferences().unwrap().max_rows_per_page, 30);
        assert_eq!(db.set_max_rows_per_page(99).unwrap(), 40);
        assert_eq!(db.set_max_rows_per_page(35).unwrap(), 35);
        assert_eq!(db.load_preferences().unwrap().max_rows_per_page, 35);
    }

    #[test]
    fn garbage_rows_value_falls_back_to_default() {
        let db = Db::open_in_memory().unwrap();
        db.put(KEY_MAX_ROWS_PER_PAGE, "lots").unwrap();
        assert_eq!(db.load_preferences().unwrap().max_rows_per_page, DEFAULT_ROWS_PER_PAGE);
    }

    #[test]
    fn preferences_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(DB_FILE_NAME);
        {
            let db = Db::new(path.clone()).unwrap();
            db.set_manager_name("김철수").unwrap();
            db.set_max_rows_per_page(32).unwrap();
        }
        let db = Db::new(path).unwrap();
        let prefs = db.load_preferences().unwrap();
        assert_eq!(prefs.manager_name, "김철수");
        assert_eq!(prefs.max_rows_per_page, 32);
    }
}
