// 🗃️ Expense Store - Persistence contract
//
// Every mutation either succeeds or returns an error; no partial writes are
// visible through `list`.

use crate::error::{ExpenseError, Result};
use crate::expense::{Expense, ExpensePatch, NewExpense};
use std::collections::HashSet;

pub trait ExpenseStore {
    /// All expenses, newest date first
    fn list(&self) -> Result<Vec<Expense>>;

    /// Validate, assign an id, and persist
    fn create(&mut self, new: NewExpense) -> Result<Expense>;

    fn update(&mut self, id: &str, patch: &ExpensePatch) -> Result<Expense>;

    fn delete(&mut self, id: &str) -> Result<()>;
}

/// Newest date first; ties broken by creation time, newest first
pub fn sort_newest_first(expenses: &mut [Expense]) {
    expenses.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ============================================================================
// MEMORY STORE
// ============================================================================

/// In-process store
///
/// `fail_on_date` makes `create` reject drafts with the given date, which is
/// how partial backfill failures are exercised.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    expenses: Vec<Expense>,
    failing_dates: HashSet<String>,
    create_calls: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_expenses(expenses: Vec<Expense>) -> Self {
        MemoryStore {
            expenses,
            ..Default::default()
        }
    }

    pub fn fail_on_date(&mut self, date: &str) {
        self.failing_dates.insert(date.to_string());
    }

    pub fn clear_failures(&mut self) {
        self.failing_dates.clear();
    }

    /// Number of `create` calls, successful or not
    pub fn create_calls(&self) -> usize {
        self.create_calls
    }

    pub fn len(&self) -> usize {
        self.expenses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expenses.is_empty()
    }
}

impl ExpenseStore for MemoryStore {
    fn list(&self) -> Result<Vec<Expense>> {
        let mut all = self.expenses.clone();
        sort_newest_first(&mut all);
        Ok(all)
    }

    fn create(&mut self, new: NewExpense) -> Result<Expense> {
        self.create_calls += 1;
        let new = new.normalize()?;
        if self.failing_dates.contains(&new.date) {
            return Err(ExpenseError::Store(format!("create rejected for {}", new.date)));
        }
        let expense = Expense::from_new(new_id(), new);
        self.expenses.push(expense.clone());
        Ok(expense)
    }

    fn update(&mut self, id: &str, patch: &ExpensePatch) -> Result<Expense> {
        let slot = self
            .expenses
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| ExpenseError::NotFound(format!("expense {}", id)))?;
        let updated = patch.apply(slot)?;
        *slot = updated.clone();
        Ok(updated)
    }

    fn delete(&mut self, id: &str) -> Result<()> {
        let before = self.expenses.len();
        self.expenses.retain(|e| e.id != id);
        if self.expenses.len() == before {
            return Err(ExpenseError::NotFound(format!("expense {}", id)));
        }
        Ok(())
    }
}
