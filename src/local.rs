// 💾 Local Store - Expenses kept in a single JSON file
//
// The offline variant: the whole collection is one JSON array in the same
// shape as an export, rewritten on every mutation.

use crate::clock::Clock;
use crate::error::{ExpenseError, Result};
use crate::expense::{Expense, ExpensePatch, NewExpense};
use crate::store::{new_id, sort_newest_first, ExpenseStore};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

pub struct JsonFileStore {
    path: PathBuf,
    expenses: Vec<Expense>,
}

impl JsonFileStore {
    /// Open `path`, starting empty if the file does not exist yet
    pub fn open(path: &Path) -> Result<Self> {
        let expenses = if path.exists() {
            let raw = fs::read_to_string(path)?;
            if raw.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            Vec::new()
        };

        debug!(path = %path.display(), count = expenses.len(), "Opened local expense file");
        Ok(JsonFileStore {
            path: path.to_path_buf(),
            expenses,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_empty(&self) -> bool {
        self.expenses.is_empty()
    }

    fn save(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        // the previous file stays intact until the new one is complete;
        // a failed persist drops the temp file, which deletes it
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(serde_json::to_string_pretty(&self.expenses)?.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| ExpenseError::Io(e.error))?;
        Ok(())
    }
}

impl ExpenseStore for JsonFileStore {
    fn list(&self) -> Result<Vec<Expense>> {
        let mut all = self.expenses.clone();
        sort_newest_first(&mut all);
        Ok(all)
    }

    fn create(&mut self, new: NewExpense) -> Result<Expense> {
        let expense = Expense::from_new(new_id(), new.normalize()?);
        self.expenses.push(expense.clone());
        if let Err(e) = self.save() {
            self.expenses.pop();
            return Err(e);
        }
        Ok(expense)
    }

    fn update(&mut self, id: &str, patch: &ExpensePatch) -> Result<Expense> {
        let idx = self
            .expenses
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| ExpenseError::NotFound(format!("expense {}", id)))?;

        let updated = patch.apply(&self.expenses[idx])?;
        let previous = std::mem::replace(&mut self.expenses[idx], updated.clone());
        if let Err(e) = self.save() {
            self.expenses[idx] = previous;
            return Err(e);
        }
        Ok(updated)
    }

    fn delete(&mut self, id: &str) -> Result<()> {
        let idx = self
            .expenses
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| ExpenseError::NotFound(format!("expense {}", id)))?;

        let removed = self.expenses.remove(idx);
        if let Err(e) = self.save() {
            self.expenses.insert(idx, removed);
            return Err(e);
        }
        Ok(())
    }
}

// ============================================================================
// DEMO DATA
// ============================================================================

/// Seed the four demo expenses, dated today, if `store` is empty
///
/// Returns how many were created (0 when the store already had data).
pub fn seed_demo<S, C>(store: &mut S, clock: &C) -> Result<usize>
where
    S: ExpenseStore + ?Sized,
    C: Clock,
{
    if !store.list()?.is_empty() {
        return Ok(0);
    }

    let today = clock.today_iso();
    let demo = vec![
        NewExpense::new("Groceries", 24.50, &today).with_category("Food"),
        NewExpense::new("Bus pass", 18.00, &today).with_category("Transport"),
        NewExpense::new("Coffee", 3.20, &today).with_category("Food"),
        NewExpense::new("Rent", 600.00, &today)
            .with_category("Housing")
            .recurring(Some("Rent|600|Housing")),
    ];

    let count = demo.len();
    for new in demo {
        store.create(new)?;
    }

    info!("Seeded {} demo expenses", count);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    #[test]
    fn test_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("expenses.json");

        let created = {
            let mut store = JsonFileStore::open(&path).unwrap();
            assert!(store.is_empty());
            store
                .create(NewExpense::new("Coffee", 3.2, "2024-01-02").with_category("Food"))
                .unwrap()
        };

        let mut store = JsonFileStore::open(&path).unwrap();
        let all = store.list().unwrap();
        assert_eq!(all, vec![created.clone()]);

        let patch = ExpensePatch {
            title: Some("Flat white".to_string()),
            ..Default::default()
        };
        store.update(&created.id, &patch).unwrap();
        store.delete(&created.id).unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        assert!(reopened.is_empty());
    }

    #[test]
    fn test_reads_client_export_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("expenses.json");
        fs::write(
            &path,
            r#"[{"id":"k3j2h1","title":"Rent","amount":600,"category":"Housing",
                "date":"2024-01-01","createdAt":"2024-01-01T09:00:00.000Z",
                "recurring":true,"recurringKey":"Rent|600|Housing"}]"#,
        )
        .unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        let all = store.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].recurring_key.as_deref(), Some("Rent|600|Housing"));
        assert_eq!(all[0].amount, 600.0);
    }

    #[test]
    fn test_missing_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::open(&dir.path().join("e.json")).unwrap();

        assert!(matches!(store.delete("nope"), Err(ExpenseError::NotFound(_))));
        assert!(matches!(
            store.update("nope", &ExpensePatch::default()),
            Err(ExpenseError::NotFound(_))
        ));
    }

    #[test]
    fn test_failed_save_rolls_back_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("expenses.json");
        let mut store = JsonFileStore::open(&path).unwrap();

        // a directory in the file's place makes the final rename fail
        fs::create_dir(&path).unwrap();

        let result = store.create(NewExpense::new("Coffee", 3.2, "2024-01-02"));
        assert!(result.is_err());
        assert!(store.is_empty());

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("expenses.json")]);
    }

    #[test]
    fn test_seed_demo_only_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::open(&dir.path().join("e.json")).unwrap();
        let clock = FixedClock::ymd(2024, 5, 20);

        assert_eq!(seed_demo(&mut store, &clock).unwrap(), 4);
        assert_eq!(seed_demo(&mut store, &clock).unwrap(), 0);

        let all = store.list().unwrap();
        assert!(all.iter().all(|e| e.date == "2024-05-20"));
        let rent = all.iter().find(|e| e.title == "Rent").unwrap();
        assert!(rent.recurring);
        assert_eq!(rent.group_key(), "Rent|600|Housing");
    }
}
