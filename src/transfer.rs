// 📦 Transfer - JSON export/import, CSV export, wipe

use crate::clock::Clock;
use crate::error::{ExpenseError, Result};
use crate::expense::{Expense, NewExpense};
use crate::store::ExpenseStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use tracing::info;

/// Pretty-printed JSON array of every expense in the store
pub fn export_json<S: ExpenseStore + ?Sized>(store: &S) -> Result<String> {
    let expenses = store.list()?;
    Ok(serde_json::to_string_pretty(&expenses)?)
}

/// `expenses-YYYY-MM-DD.json`
pub fn export_file_name<C: Clock>(clock: &C) -> String {
    format!("expenses-{}.json", clock.today_iso())
}

#[derive(Serialize)]
struct CsvRow<'a> {
    id: &'a str,
    date: &'a str,
    title: &'a str,
    category: &'a str,
    amount: f64,
    recurring: bool,
    recurring_key: &'a str,
}

impl<'a> From<&'a Expense> for CsvRow<'a> {
    fn from(e: &'a Expense) -> Self {
        CsvRow {
            id: &e.id,
            date: &e.date,
            title: &e.title,
            category: e.category_or_empty(),
            amount: e.amount,
            recurring: e.recurring,
            recurring_key: e.recurring_key.as_deref().unwrap_or(""),
        }
    }
}

/// Write every expense as CSV with a header row
pub fn export_csv<S, W>(store: &S, writer: W) -> Result<usize>
where
    S: ExpenseStore + ?Sized,
    W: Write,
{
    let expenses = store.list()?;
    let mut wtr = csv::Writer::from_writer(writer);
    for e in &expenses {
        wtr.serialize(CsvRow::from(e))?;
    }
    wtr.flush()?;
    Ok(expenses.len())
}

/// Parse an exported JSON array into validated drafts
///
/// The whole document is checked before anything is returned, so a bad
/// record aborts the import with nothing written. Incoming ids are dropped;
/// the store assigns fresh ones.
pub fn parse_import(json: &str) -> Result<Vec<NewExpense>> {
    let parsed: Value = serde_json::from_str(json)?;
    let records = parsed
        .as_array()
        .ok_or_else(|| ExpenseError::Import("Invalid format".to_string()))?;

    let mut drafts = Vec::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        let title = record.get("title").and_then(Value::as_str).filter(|t| !t.is_empty());
        let amount = record.get("amount").and_then(Value::as_f64);
        let date = record.get("date").and_then(Value::as_str).filter(|d| !d.is_empty());

        let (title, amount, date) = match (title, amount, date) {
            (Some(t), Some(a), Some(d)) => (t, a, d),
            _ => {
                return Err(ExpenseError::Import(format!("Missing fields in record {}", i)));
            }
        };

        let text = |field: &str| {
            record
                .get(field)
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        let draft = NewExpense {
            title: title.to_string(),
            amount,
            category: text("category"),
            date: date.to_string(),
            created_at: text("createdAt")
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            recurring: record.get("recurring").and_then(Value::as_bool).unwrap_or(false),
            recurring_key: text("recurringKey"),
            user_id: text("user_id"),
        }
        .normalize()
        .map_err(|e| ExpenseError::Import(format!("record {}: {}", i, e)))?;

        drafts.push(draft);
    }

    Ok(drafts)
}

/// Import an exported JSON array; returns how many were created
pub fn import_json<S: ExpenseStore + ?Sized>(store: &mut S, json: &str) -> Result<usize> {
    let drafts = parse_import(json)?;
    let count = drafts.len();
    for draft in drafts {
        store.create(draft)?;
    }
    info!("Imported {} expenses", count);
    Ok(count)
}

/// Delete every expense; returns how many were removed
pub fn wipe<S: ExpenseStore + ?Sized>(store: &mut S) -> Result<usize> {
    let all = store.list()?;
    for e in &all {
        store.delete(&e.id)?;
    }
    info!("Wiped {} expenses", all.len());
    Ok(all.len())
}
