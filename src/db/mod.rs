pub mod models;
pub mod queries;

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration failed: {0}")]
    Migration(String),
    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Corrupt row {id}: {reason}")]
    Decode { id: i64, reason: String },
}

pub type Result<T> = std::result::Result<T, DbError>;

pub struct Database {
    pub conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        // WAL mode for better concurrent read performance
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        self.migrate()?;
        Ok(())
    }

    fn migrate(&self) -> Result<()> {
        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        if version > SCHEMA_VERSION {
            return Err(DbError::Migration(format!(
                "database schema v{version} is newer than this build (v{SCHEMA_VERSION})"
            )));
        }

        if version < 1 {
            self.migrate_v1()?;
        }
        if version < 2 {
            self.migrate_v2()?;
        }

        self.conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
    }

    /// V1: one row per performance attempt, insertion-ordered by id
    fn migrate_v1(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS scale_results (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                scale           TEXT NOT NULL,
                created_at      TEXT NOT NULL,

                intonation      INTEGER NOT NULL,
                cv_evenness     REAL NOT NULL,
                tempo_slope     REAL NOT NULL,
                tempo_r         REAL NOT NULL,
                mean_tempo      REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_results_scale ON scale_results(scale);
            ",
        )?;
        Ok(())
    }

    /// V2: per-session detail kept alongside the summary metrics
    fn migrate_v2(&self) -> Result<()> {
        let new_columns = [
            "evenness_category TEXT",
            "mismatches TEXT",        // JSON [{played, correct}]
            "outlier_intervals TEXT", // JSON [usize]
            "source TEXT",
        ];

        for col in &new_columns {
            // SQLite doesn't have IF NOT EXISTS for ALTER TABLE ADD COLUMN,
            // so we ignore "duplicate column" errors
            let sql = format!("ALTER TABLE scale_results ADD COLUMN {col}");
            match self.conn.execute(&sql, []) {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == rusqlite::ffi::ErrorCode::Unknown
                        || err.extended_code == 1 =>
                {
                    // Column already exists
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }
}

const SCHEMA_VERSION: i32 = 2;

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(db: &Database) -> Vec<String> {
        let mut stmt = db.conn.prepare("PRAGMA table_info(scale_results)").unwrap();
        stmt.query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_fresh_database_is_current() {
        let db = Database::open_in_memory().unwrap();
        let version: i32 = db
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);

        let cols = columns(&db);
        for expected in ["scale", "intonation", "mean_tempo", "mismatches", "source"] {
            assert!(cols.iter().any(|c| c == expected), "missing column {expected}");
        }
    }

    #[test]
    fn test_migration_is_rerunnable() {
        let db = Database::open_in_memory().unwrap();
        db.conn.pragma_update(None, "user_version", 0).unwrap();
        db.migrate().unwrap();
        assert_eq!(columns(&db).len(), 12);
    }

    #[test]
    fn test_newer_schema_is_refused() {
        let db = Database::open_in_memory().unwrap();
        db.conn.pragma_update(None, "user_version", 99).unwrap();
        assert!(matches!(db.migrate(), Err(DbError::Migration(_))));
    }
}
