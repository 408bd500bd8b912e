use crate::Result;
use rusqlite::Connection;
use std::path::Path;

pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(&path)?;
        conn.execute_batch(include_str!("schema.sql"))?;
        log::info!("created note store at {}", path.as_ref().display());
        Ok(Self { conn })
    }

    /// Opens a throwaway database that lives only as long as this value.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(Self { conn })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(&path)?;

        // Validate database structure
        let table_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE type='table'
             AND name IN ('notes', 'users')",
            [],
            |row| row.get(0),
        )?;

        if table_count != 2 {
            return Err(crate::NoteGroveError::InvalidStore(
                "Not a valid Notegrove database".to_string(),
            ));
        }

        // Migrate: add content column if it doesn't exist
        let column_exists: bool = conn.query_row(
            "SELECT COUNT(*) FROM pragma_table_info('notes') WHERE name='content'",
            [],
            |row| row.get::<_, i64>(0).map(|count| count > 0),
        )?;

        if !column_exists {
            log::info!("migrating notes table: adding content column");
            conn.execute(
                "ALTER TABLE notes ADD COLUMN content TEXT NOT NULL DEFAULT ''",
                [],
            )?;
        }

        log::info!("opened note store at {}", path.as_ref().display());
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}
