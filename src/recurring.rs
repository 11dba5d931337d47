// 🔁 Recurring Reconciler - Backfill monthly recurring expenses
//
// Groups recurring expenses by key, finds each group's earliest month, and
// creates an entry for every month from there through the current month
// that has none yet.
//
// Groups are a projection of the snapshot passed in. Nothing is retained
// between passes, so a pass interrupted by store failures is completed by
// the next one.

use crate::clock::Clock;
use crate::error::Result;
use crate::expense::{Expense, NewExpense};
use crate::month::{missing_months, YearMonth};
use crate::store::ExpenseStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

// ============================================================================
// RECURRING GROUP
// ============================================================================

#[derive(Debug, Clone)]
pub struct RecurringGroup {
    pub key: String,

    /// First member seen with a parseable date
    pub template: Expense,

    /// Distinct months that already have an entry
    pub months: BTreeSet<YearMonth>,
}

impl RecurringGroup {
    fn new(key: String, template: Expense, month: YearMonth) -> Self {
        let mut months = BTreeSet::new();
        months.insert(month);
        RecurringGroup {
            key,
            template,
            months,
        }
    }

    /// Earliest recorded month
    pub fn start_month(&self) -> YearMonth {
        // a group is only ever built with one month already in the set
        self.months
            .first()
            .copied()
            .unwrap_or_else(|| YearMonth::from_date(chrono::NaiveDate::MIN))
    }

    /// Months from the start through `current` with no entry, in calendar order
    pub fn missing_through(&self, current: YearMonth) -> Vec<YearMonth> {
        missing_months(self.start_month(), current, &self.months)
    }

    /// Draft for `month`: template fields, dated the first of the month
    pub fn backfill_for(&self, month: YearMonth) -> NewExpense {
        NewExpense {
            title: self.template.title.clone(),
            amount: self.template.amount,
            category: self.template.category.clone(),
            date: month.first_day_iso(),
            created_at: None,
            recurring: true,
            recurring_key: Some(self.key.clone()),
            user_id: self.template.user_id.clone(),
        }
    }
}

/// Entry left out of grouping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub id: String,
    pub date: String,
    pub reason: String,
}

/// Partition the recurring members of `expenses` into groups
///
/// Non-recurring entries are ignored. Recurring entries whose date does not
/// parse are returned as skipped. Groups come back in first-seen order.
pub fn detect_groups(expenses: &[Expense]) -> (Vec<RecurringGroup>, Vec<SkippedEntry>) {
    let mut groups: Vec<RecurringGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut skipped = Vec::new();

    for expense in expenses.iter().filter(|e| e.recurring) {
        let month = match expense.month() {
            Ok(month) => month,
            Err(e) => {
                skipped.push(SkippedEntry {
                    id: expense.id.clone(),
                    date: expense.date.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let key = expense.group_key();
        match index.get(&key) {
            Some(&i) => {
                groups[i].months.insert(month);
            }
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(RecurringGroup::new(key, expense.clone(), month));
            }
        }
    }

    (groups, skipped)
}

// ============================================================================
// RECONCILE REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillFailure {
    pub group_key: String,
    pub month: YearMonth,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub current_month: YearMonth,
    pub group_count: usize,
    pub created: Vec<Expense>,
    pub failures: Vec<BackfillFailure>,
    pub skipped: Vec<SkippedEntry>,
}

impl ReconcileReport {
    pub fn created_count(&self) -> usize {
        self.created.len()
    }

    /// True when every missing month was created
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// The caller's snapshot is stale once anything was written
    pub fn needs_refresh(&self) -> bool {
        !self.created.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Recurring reconcile through {}: {} groups, {} created, {} failed, {} skipped",
            self.current_month,
            self.group_count,
            self.created.len(),
            self.failures.len(),
            self.skipped.len()
        )
    }
}

// ============================================================================
// RECURRING ENGINE
// ============================================================================

pub struct RecurringEngine<C: Clock> {
    clock: C,
}

impl<C: Clock> RecurringEngine<C> {
    pub fn new(clock: C) -> Self {
        RecurringEngine { clock }
    }

    /// Fill every month gap of every recurring group in `expenses`
    ///
    /// Creations run one at a time, earliest month first within a group. A
    /// failed creation is recorded and the pass moves on; the month stays
    /// missing in the store and is retried by the next pass. `expenses` is
    /// not modified, so callers re-read the store afterwards.
    pub fn reconcile<S>(&self, expenses: &[Expense], store: &mut S) -> ReconcileReport
    where
        S: ExpenseStore + ?Sized,
    {
        let current = self.clock.current_month();
        let (groups, skipped) = detect_groups(expenses);

        for entry in &skipped {
            warn!(id = %entry.id, date = %entry.date, "Skipping recurring entry: {}", entry.reason);
        }

        let mut created = Vec::new();
        let mut failures = Vec::new();

        for group in &groups {
            for month in group.missing_through(current) {
                match store.create(group.backfill_for(month)) {
                    Ok(expense) => {
                        debug!(key = %group.key, month = %month, id = %expense.id, "Backfilled recurring expense");
                        created.push(expense);
                    }
                    Err(e) => {
                        warn!(key = %group.key, month = %month, "Backfill failed: {}", e);
                        failures.push(BackfillFailure {
                            group_key: group.key.clone(),
                            month,
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        let report = ReconcileReport {
            current_month: current,
            group_count: groups.len(),
            created,
            failures,
            skipped,
        };
        info!("{}", report.summary());
        report
    }

    /// Read a fresh snapshot from `store` and reconcile it
    pub fn reconcile_store<S>(&self, store: &mut S) -> Result<ReconcileReport>
    where
        S: ExpenseStore + ?Sized,
    {
        let snapshot = store.list()?;
        Ok(self.reconcile(&snapshot, store))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::MemoryStore;

    fn seed(store: &mut MemoryStore, title: &str, amount: f64, category: &str, date: &str, key: Option<&str>) -> Expense {
        let mut new = NewExpense::new(title, amount, date).with_category(category);
        if let Some(key) = key {
            new = new.recurring(Some(key));
        }
        store.create(new).unwrap()
    }

    fn recurring_dates(store: &MemoryStore, key: &str) -> Vec<String> {
        let mut dates: Vec<String> = store
            .list()
            .unwrap()
            .into_iter()
            .filter(|e| e.recurring && e.group_key() == key)
            .map(|e| e.date)
            .collect();
        dates.sort();
        dates
    }

    #[test]
    fn test_backfills_to_current_month() {
        let mut store = MemoryStore::new();
        seed(&mut store, "Rent", 600.0, "Housing", "2024-01-01", Some("Rent|600|Housing"));

        let engine = RecurringEngine::new(FixedClock::ymd(2024, 4, 10));
        let report = engine.reconcile_store(&mut store).unwrap();

        assert_eq!(report.created_count(), 3);
        let dates: Vec<&str> = report.created.iter().map(|e| e.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-02-01", "2024-03-01", "2024-04-01"]);

        for e in &report.created {
            assert_eq!(e.title, "Rent");
            assert_eq!(e.amount, 600.0);
            assert_eq!(e.category.as_deref(), Some("Housing"));
            assert!(e.recurring);
            assert_eq!(e.recurring_key.as_deref(), Some("Rent|600|Housing"));
        }

        println!("✅ {}", report.summary());
    }

    #[test]
    fn test_fills_only_the_gap() {
        let mut store = MemoryStore::new();
        seed(&mut store, "Rent", 600.0, "Housing", "2024-01-01", Some("Rent|600|Housing"));
        seed(&mut store, "Rent", 600.0, "Housing", "2024-03-01", Some("Rent|600|Housing"));

        let engine = RecurringEngine::new(FixedClock::ymd(2024, 3, 31));
        let report = engine.reconcile_store(&mut store).unwrap();

        assert_eq!(report.created_count(), 1);
        assert_eq!(report.created[0].date, "2024-02-01");
    }

    #[test]
    fn test_year_rollover() {
        let mut store = MemoryStore::new();
        seed(&mut store, "Gym", 30.0, "Health", "2023-11-14", Some("gym"));

        let engine = RecurringEngine::new(FixedClock::ymd(2024, 2, 1));
        engine.reconcile_store(&mut store).unwrap();

        assert_eq!(
            recurring_dates(&store, "gym"),
            vec!["2023-11-14", "2023-12-01", "2024-01-01", "2024-02-01"]
        );
    }

    #[test]
    fn test_second_pass_creates_nothing() {
        let mut store = MemoryStore::new();
        seed(&mut store, "Rent", 600.0, "Housing", "2023-06-01", Some("Rent|600|Housing"));
        seed(&mut store, "Netflix", 9.99, "Fun", "2024-01-20", None);
        seed(&mut store, "Coffee", 3.2, "Food", "2024-01-20", None);

        let engine = RecurringEngine::new(FixedClock::ymd(2024, 5, 5));
        let first = engine.reconcile_store(&mut store).unwrap();
        let second = engine.reconcile_store(&mut store).unwrap();

        assert_eq!(first.created_count(), 11);
        assert_eq!(second.created_count(), 0);
        assert!(!second.needs_refresh());
    }

    #[test]
    fn test_every_month_covered_after_pass() {
        let mut store = MemoryStore::new();
        seed(&mut store, "Rent", 600.0, "Housing", "2023-10-05", Some("rent"));
        seed(&mut store, "Phone", 25.0, "Bills", "2024-02-11", Some("phone"));

        let clock = FixedClock::ymd(2024, 6, 30);
        RecurringEngine::new(clock).reconcile_store(&mut store).unwrap();

        let (groups, _) = detect_groups(&store.list().unwrap());
        for group in groups {
            assert!(
                group.missing_through(clock.current_month()).is_empty(),
                "group {} still has gaps",
                group.key
            );
        }
    }

    #[test]
    fn test_non_recurring_untouched() {
        let mut store = MemoryStore::new();
        let coffee = seed(&mut store, "Coffee", 3.2, "Food", "2023-01-03", None);
        seed(&mut store, "Rent", 600.0, "Housing", "2024-01-01", Some("rent"));

        let engine = RecurringEngine::new(FixedClock::ymd(2024, 2, 1));
        let report = engine.reconcile_store(&mut store).unwrap();

        assert_eq!(report.group_count, 1);
        assert!(report.created.iter().all(|e| e.recurring));

        let after = store.list().unwrap();
        let coffees: Vec<&Expense> = after.iter().filter(|e| e.title == "Coffee").collect();
        assert_eq!(coffees.len(), 1);
        assert_eq!(coffees[0], &coffee);
    }

    #[test]
    fn test_template_is_first_member() {
        let mut store = MemoryStore::new();
        seed(&mut store, "Rent", 600.0, "Housing", "2024-01-01", Some("rent"));
        seed(&mut store, "Rent (new landlord)", 650.0, "Housing", "2024-02-01", Some("rent"));

        let mut snapshot = store.list().unwrap();
        snapshot.sort_by(|a, b| a.date.cmp(&b.date));

        let engine = RecurringEngine::new(FixedClock::ymd(2024, 3, 1));
        let report = engine.reconcile(&snapshot, &mut store);

        assert_eq!(report.created_count(), 1);
        assert_eq!(report.created[0].title, "Rent");
        assert_eq!(report.created[0].amount, 600.0);
    }

    #[test]
    fn test_derived_key_groups_without_explicit_key() {
        let mut store = MemoryStore::new();
        let mut a = NewExpense::new("Rent", 600.0, "2024-01-01").with_category("Housing");
        a.recurring = true;
        let mut b = a.clone();
        b.date = "2024-03-01".to_string();
        store.create(a).unwrap();
        store.create(b).unwrap();

        let (groups, _) = detect_groups(&store.list().unwrap());
        assert_eq!(groups.len(), 1, "same title/amount/category collapse into one group");
        assert_eq!(groups[0].key, "Rent|600|Housing");
        assert_eq!(groups[0].months.len(), 2);
    }

    #[test]
    fn test_failed_creation_continues_and_heals() {
        let mut store = MemoryStore::new();
        seed(&mut store, "Rent", 600.0, "Housing", "2024-01-01", Some("rent"));
        store.fail_on_date("2024-02-01");

        let engine = RecurringEngine::new(FixedClock::ymd(2024, 4, 1));
        let first = engine.reconcile_store(&mut store).unwrap();

        assert_eq!(first.created_count(), 2);
        assert_eq!(first.failures.len(), 1);
        assert_eq!(first.failures[0].month.to_string(), "2024-02");
        assert!(!first.is_complete());

        store.clear_failures();
        let second = engine.reconcile_store(&mut store).unwrap();

        assert_eq!(second.created_count(), 1);
        assert_eq!(second.created[0].date, "2024-02-01");
        assert!(second.is_complete());
    }

    #[test]
    fn test_malformed_date_is_skipped() {
        let mut store = MemoryStore::new();
        let good = seed(&mut store, "Rent", 600.0, "Housing", "2024-01-01", Some("rent"));

        let mut broken = good.clone();
        broken.id = "broken".to_string();
        broken.date = "someday".to_string();

        let snapshot = vec![broken, good];
        let engine = RecurringEngine::new(FixedClock::ymd(2024, 2, 1));
        let report = engine.reconcile(&snapshot, &mut store);

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].id, "broken");
        assert_eq!(report.created_count(), 1);
    }

    #[test]
    fn test_future_start_creates_nothing() {
        let mut store = MemoryStore::new();
        seed(&mut store, "Rent", 600.0, "Housing", "2024-09-01", Some("rent"));

        let engine = RecurringEngine::new(FixedClock::ymd(2024, 6, 1));
        let report = engine.reconcile_store(&mut store).unwrap();

        assert_eq!(report.created_count(), 0);
        assert_eq!(report.group_count, 1);
    }

    #[test]
    fn test_snapshot_not_mutated() {
        let mut store = MemoryStore::new();
        seed(&mut store, "Rent", 600.0, "Housing", "2024-01-01", Some("rent"));
        let snapshot = store.list().unwrap();

        let engine = RecurringEngine::new(FixedClock::ymd(2024, 3, 1));
        let report = engine.reconcile(&snapshot, &mut store);

        assert_eq!(snapshot.len(), 1);
        assert!(report.needs_refresh());
        assert_eq!(store.len(), 3);
    }
}
