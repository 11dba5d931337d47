// 🗄️ SQLite Store - Server-backed expense persistence
//
// Free functions over a `Connection` do the work; `SqliteStore` wraps a
// connection to satisfy the `ExpenseStore` contract. Every mutation is
// recorded in the `events` audit table.

use crate::error::{ExpenseError, Result};
use crate::expense::{Expense, ExpensePatch, NewExpense};
use crate::store::{new_id, ExpenseStore};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Event for audit trail
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS expenses (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            amount REAL NOT NULL CHECK (amount > 0),
            category TEXT,
            date TEXT NOT NULL,
            created_at TEXT NOT NULL,
            recurring INTEGER NOT NULL DEFAULT 0,
            recurring_key TEXT,
            user_id TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute("CREATE INDEX IF NOT EXISTS idx_date ON expenses(date)", [])?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_user ON expenses(user_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

const EXPENSE_COLUMNS: &str =
    "id, title, amount, category, date, created_at, recurring, recurring_key, user_id";

fn expense_from_row(row: &Row<'_>) -> rusqlite::Result<Expense> {
    let created_at_str: String = row.get(5)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Expense {
        id: row.get(0)?,
        title: row.get(1)?,
        amount: row.get(2)?,
        category: row.get(3)?,
        date: row.get(4)?,
        created_at,
        recurring: row.get(6)?,
        recurring_key: row.get(7)?,
        user_id: row.get(8)?,
    })
}

pub fn insert_expense(conn: &Connection, expense: &Expense) -> Result<()> {
    conn.execute(
        "INSERT INTO expenses (
            id, title, amount, category, date, created_at, recurring, recurring_key, user_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            expense.id,
            expense.title,
            expense.amount,
            expense.category,
            expense.date,
            expense.created_at.to_rfc3339(),
            expense.recurring,
            expense.recurring_key,
            expense.user_id,
        ],
    )?;
    Ok(())
}

pub fn get_expense(conn: &Connection, id: &str) -> Result<Option<Expense>> {
    let sql = format!("SELECT {} FROM expenses WHERE id = ?1", EXPENSE_COLUMNS);
    let expense = conn.query_row(&sql, [id], expense_from_row).optional()?;
    Ok(expense)
}

pub fn get_all_expenses(conn: &Connection) -> Result<Vec<Expense>> {
    let sql = format!(
        "SELECT {} FROM expenses ORDER BY date DESC, created_at DESC",
        EXPENSE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let expenses = stmt
        .query_map([], expense_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(expenses)
}

pub fn get_expenses_by_user(conn: &Connection, user_id: &str) -> Result<Vec<Expense>> {
    let sql = format!(
        "SELECT {} FROM expenses WHERE user_id = ?1 ORDER BY date DESC, created_at DESC",
        EXPENSE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let expenses = stmt
        .query_map([user_id], expense_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(expenses)
}

pub fn update_expense(conn: &Connection, expense: &Expense) -> Result<()> {
    let changed = conn.execute(
        "UPDATE expenses
         SET title = ?2, amount = ?3, category = ?4, date = ?5, user_id = ?6
         WHERE id = ?1",
        params![
            expense.id,
            expense.title,
            expense.amount,
            expense.category,
            expense.date,
            expense.user_id,
        ],
    )?;
    if changed == 0 {
        return Err(ExpenseError::NotFound(format!("expense {}", expense.id)));
    }
    Ok(())
}

pub fn delete_expense(conn: &Connection, id: &str) -> Result<()> {
    let changed = conn.execute("DELETE FROM expenses WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(ExpenseError::NotFound(format!("expense {}", id)));
    }
    Ok(())
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM expenses", [], |row| row.get(0))?;
    Ok(count)
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id DESC",
    )?;

    let rows = stmt
        .query_map(params![entity_type, entity_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut events = Vec::with_capacity(rows.len());
    for (event_id, timestamp, event_type, entity_type, entity_id, data, actor) in rows {
        let timestamp = DateTime::parse_from_rfc3339(&timestamp)
            .map_err(|e| ExpenseError::Store(format!("bad event timestamp: {}", e)))?
            .with_timezone(&Utc);
        events.push(Event {
            event_id,
            timestamp,
            event_type,
            entity_type,
            entity_id,
            data: serde_json::from_str(&data)?,
            actor,
        });
    }

    Ok(events)
}

// ============================================================================
// SQLITE STORE
// ============================================================================

pub struct SqliteStore {
    conn: Connection,
    actor: String,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(SqliteStore {
            conn,
            actor: "expense-ledger".to_string(),
        })
    }

    /// Name written to the audit trail for mutations through this store
    pub fn with_actor(mut self, actor: &str) -> Self {
        self.actor = actor.to_string();
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn list_for_user(&self, user_id: &str) -> Result<Vec<Expense>> {
        get_expenses_by_user(&self.conn, user_id)
    }

    pub fn get(&self, id: &str) -> Result<Option<Expense>> {
        get_expense(&self.conn, id)
    }

    fn event(&self, event_type: &str, expense_id: &str, data: serde_json::Value) -> Event {
        Event::new(event_type, "expense", expense_id, data, &self.actor)
    }
}

impl ExpenseStore for SqliteStore {
    fn list(&self) -> Result<Vec<Expense>> {
        get_all_expenses(&self.conn)
    }

    fn create(&mut self, new: NewExpense) -> Result<Expense> {
        let expense = Expense::from_new(new_id(), new.normalize()?);

        let event = self.event(
            "expense_created",
            &expense.id,
            serde_json::json!({
                "amount": expense.amount,
                "date": expense.date,
                "recurring_key": expense.recurring_key,
            }),
        );

        let tx = self.conn.transaction()?;
        insert_expense(&tx, &expense)?;
        insert_event(&tx, &event)?;
        tx.commit()?;

        debug!(id = %expense.id, date = %expense.date, "Inserted expense");
        Ok(expense)
    }

    fn update(&mut self, id: &str, patch: &ExpensePatch) -> Result<Expense> {
        let current = get_expense(&self.conn, id)?
            .ok_or_else(|| ExpenseError::NotFound(format!("expense {}", id)))?;
        let updated = patch.apply(&current)?;
        let event = self.event("expense_updated", id, serde_json::to_value(patch)?);

        // row change and audit event commit together or not at all
        let tx = self.conn.transaction()?;
        update_expense(&tx, &updated)?;
        insert_event(&tx, &event)?;
        tx.commit()?;
        Ok(updated)
    }

    fn delete(&mut self, id: &str) -> Result<()> {
        let event = self.event("expense_deleted", id, serde_json::json!({}));

        let tx = self.conn.transaction()?;
        delete_expense(&tx, id)?;
        insert_event(&tx, &event)?;
        tx.commit()?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
