// Expense Ledger - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod error;
pub mod expense;
pub mod month;
pub mod clock;
pub mod store;
pub mod db;         // SQLite store (server-backed variant)
pub mod local;      // JSON file store (offline variant)
pub mod recurring;  // Recurring reconciler
pub mod query;
pub mod summary;
pub mod transfer;
pub mod settings;
pub mod config;

// Re-export commonly used types
pub use error::{ExpenseError, Result};
pub use expense::{derived_group_key, Expense, ExpensePatch, NewExpense};
pub use month::{missing_months, YearMonth};
pub use clock::{Clock, FixedClock, SystemClock};
pub use store::{ExpenseStore, MemoryStore};
pub use db::{setup_database, Event, SqliteStore};
pub use local::{seed_demo, JsonFileStore};
pub use recurring::{
    detect_groups, BackfillFailure, ReconcileReport, RecurringEngine, RecurringGroup,
    SkippedEntry,
};
pub use query::{
    categories, paginate, query, ExpenseFilter, Page, SortDir, SortKey, SortOrder,
    DEFAULT_PAGE_SIZE,
};
pub use summary::{category_breakdown, CategoryTotal, Summary};
pub use transfer::{export_csv, export_file_name, export_json, import_json, wipe};
pub use settings::{format_money, Settings};
pub use config::AppConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
