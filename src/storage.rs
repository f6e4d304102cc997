use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

use crate::nav::NavigationMode;
use crate::puzzle::{PuzzleLog, PuzzleRecord};

const MODE_KEY: &str = "mode";
const AUTO_NAV_KEY: &str = "autoNavActive";

/// Durable key-value state: the puzzle log, the navigation mode and the
/// auto-navigation flag.
pub struct StateStore {
    conn: Connection,
}

impl StateStore {
    pub fn new(path: &str) -> Result<Self> {
        Ok(Self { conn: Connection::open(path)? })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self { conn: Connection::open_in_memory()? })
    }

    pub fn init(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS puzzles (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL UNIQUE,
                time TEXT
            );
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            COMMIT;",
        )?;
        Ok(())
    }

    pub fn load_log(&self) -> Result<PuzzleLog> {
        let mut stmt = self.conn.prepare("SELECT date, time FROM puzzles ORDER BY seq")?;
        let rows = stmt.query_map([], |row| {
            Ok(PuzzleRecord {
                date: row.get(0)?,
                time: row.get(1)?,
            })
        })?;
        let mut records = Vec::new();
        for r in rows {
            records.push(r?);
        }
        Ok(PuzzleLog::from_records(records))
    }

    /// Replace the stored log wholesale, preserving its order.
    pub fn save_log(&mut self, log: &PuzzleLog) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM puzzles", [])?;
        {
            let mut stmt = tx.prepare("INSERT INTO puzzles (date, time) VALUES (?1, ?2)")?;
            for r in log.records() {
                stmt.execute(params![r.date, r.time])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn mode(&self) -> Result<NavigationMode> {
        match self.setting(MODE_KEY)? {
            Some(v) => Ok(NavigationMode::try_from(v.parse::<u8>()?)?),
            None => Ok(NavigationMode::AutoBack),
        }
    }

    pub fn set_mode(&mut self, mode: NavigationMode) -> Result<()> {
        self.put_setting(MODE_KEY, &u8::from(mode).to_string())
    }

    pub fn auto_nav_active(&self) -> Result<bool> {
        Ok(self.setting(AUTO_NAV_KEY)?.as_deref() == Some("true"))
    }

    pub fn set_auto_nav_active(&mut self, active: bool) -> Result<()> {
        self.put_setting(AUTO_NAV_KEY, if active { "true" } else { "false" })
    }

    fn setting(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT value FROM settings WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?)
    }

    fn put_setting(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> StateStore {
        let mut s = StateStore::in_memory().unwrap();
        s.init().unwrap();
        s
    }

    #[test]
    fn defaults_on_fresh_store() {
        let s = store();
        assert!(s.load_log().unwrap().is_empty());
        assert_eq!(s.mode().unwrap(), NavigationMode::AutoBack);
        assert!(!s.auto_nav_active().unwrap());
    }

    #[test]
    fn log_round_trips_in_order() {
        let mut s = store();
        let mut log = PuzzleLog::new();
        log.upsert("6/2/2024", Some("0:50".into()));
        log.upsert("6/1/2024", None);
        s.save_log(&log).unwrap();
        assert_eq!(s.load_log().unwrap(), log);

        log.upsert("6/1/2024", Some("1:10".into()));
        s.save_log(&log).unwrap();
        let loaded = s.load_log().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get("6/1/2024").unwrap().time.as_deref(), Some("1:10"));
    }

    #[test]
    fn settings_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.sqlite");
        let path = path.to_str().unwrap();
        {
            let mut s = StateStore::new(path).unwrap();
            s.init().unwrap();
            s.set_mode(NavigationMode::Scrape).unwrap();
            s.set_auto_nav_active(true).unwrap();
        }
        let mut s = StateStore::new(path).unwrap();
        s.init().unwrap();
        assert_eq!(s.mode().unwrap(), NavigationMode::Scrape);
        assert!(s.auto_nav_active().unwrap());
    }
}
