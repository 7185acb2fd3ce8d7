use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::model::{GroceryItem, ItemUpdate};

/// SQLite-backed list storage, cheaply cloneable across request handlers.
#[derive(Clone)]
pub struct GroceryStore {
    conn: Arc<Mutex<Connection>>,
}

impl GroceryStore {
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Private throwaway database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS groceries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                quantity INTEGER DEFAULT 1,
                checked INTEGER DEFAULT 0
            )",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Full list, newest first.
    pub fn list(&self) -> Result<Vec<GroceryItem>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT id, name, quantity, checked FROM groceries ORDER BY id DESC")?;
        let items = stmt.query_map([], row_to_item)?;
        Ok(items.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn insert(&self, name: &str, quantity: u32) -> Result<GroceryItem> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO groceries (name, quantity) VALUES (?1, ?2)",
            params![name, quantity],
        )?;

        Ok(GroceryItem {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            quantity,
            checked: false,
        })
    }

    pub fn get(&self, id: i64) -> Result<Option<GroceryItem>> {
        let conn = self.conn.lock();
        fetch(&conn, id)
    }

    /// Apply a partial update. `None` means no row with that id exists.
    pub fn update(&self, id: i64, update: &ItemUpdate) -> Result<Option<GroceryItem>> {
        let conn = self.conn.lock();
        let Some(mut item) = fetch(&conn, id)? else {
            return Ok(None);
        };

        if let Some(name) = &update.name {
            item.name = name.clone();
        }
        if let Some(quantity) = update.quantity {
            item.quantity = quantity;
        }
        if let Some(checked) = update.checked {
            item.checked = checked;
        }

        conn.execute(
            "UPDATE groceries SET name = ?1, quantity = ?2, checked = ?3 WHERE id = ?4",
            params![item.name, item.quantity, item.checked, id],
        )?;
        Ok(Some(item))
    }

    /// Returns whether a row was removed.
    pub fn delete(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute("DELETE FROM groceries WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}

fn fetch(conn: &Connection, id: i64) -> Result<Option<GroceryItem>> {
    conn.query_row(
        "SELECT id, name, quantity, checked FROM groceries WHERE id = ?1",
        params![id],
        row_to_item,
    )
    .optional()
    .map_err(Into::into)
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<GroceryItem> {
    Ok(GroceryItem {
        id: row.get(0)?,
        name: row.get(1)?,
        quantity: row.get(2)?,
        checked: row.get(3)?,
    })
}
