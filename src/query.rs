// 🔎 Query - Filter, sort and paginate expense lists

use crate::expense::Expense;
use crate::month::YearMonth;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_PAGE_SIZE: usize = 20;

// ============================================================================
// FILTER
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpenseFilter {
    /// Only expenses dated in this month
    pub month: Option<YearMonth>,

    /// Exact category match
    pub category: Option<String>,

    /// Case-insensitive substring of the title
    pub search: Option<String>,

    pub user_id: Option<String>,
}

impl ExpenseFilter {
    pub fn matches(&self, expense: &Expense) -> bool {
        if let Some(month) = self.month {
            // unparseable dates never match a month filter
            if expense.month().ok() != Some(month) {
                return false;
            }
        }

        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            if expense.category.as_deref() != Some(category) {
                return false;
            }
        }

        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            if !expense.title.to_lowercase().contains(&search.to_lowercase()) {
                return false;
            }
        }

        if let Some(user_id) = self.user_id.as_deref() {
            if expense.user_id.as_deref() != Some(user_id) {
                return false;
            }
        }

        true
    }

    pub fn apply<'a>(&self, expenses: &'a [Expense]) -> Vec<&'a Expense> {
        expenses.iter().filter(|e| self.matches(e)).collect()
    }
}

// ============================================================================
// SORT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Date,
    Title,
    Category,
    Amount,
}

impl SortKey {
    /// Text columns start ascending, date and amount descending
    pub fn default_dir(&self) -> SortDir {
        match self {
            SortKey::Title | SortKey::Category => SortDir::Asc,
            SortKey::Date | SortKey::Amount => SortDir::Desc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Date => "date",
            SortKey::Title => "title",
            SortKey::Category => "category",
            SortKey::Amount => "amount",
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "date" => Ok(SortKey::Date),
            "title" => Ok(SortKey::Title),
            "category" => Ok(SortKey::Category),
            "amount" => Ok(SortKey::Amount),
            other => Err(format!("unknown sort key '{}'", other)),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    pub fn flip(&self) -> SortDir {
        match self {
            SortDir::Asc => SortDir::Desc,
            SortDir::Desc => SortDir::Asc,
        }
    }
}

impl FromStr for SortDir {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortDir::Asc),
            "desc" => Ok(SortDir::Desc),
            other => Err(format!("unknown sort direction '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub key: SortKey,
    pub dir: SortDir,
}

impl SortOrder {
    pub fn new(key: SortKey) -> Self {
        SortOrder {
            key,
            dir: key.default_dir(),
        }
    }

    /// Column-header click: same key flips, a new key starts at its default
    pub fn toggle(self, key: SortKey) -> SortOrder {
        if self.key == key {
            SortOrder {
                key,
                dir: self.dir.flip(),
            }
        } else {
            SortOrder::new(key)
        }
    }

    pub fn compare(&self, a: &Expense, b: &Expense) -> Ordering {
        let ord = match self.key {
            SortKey::Amount => a.amount.partial_cmp(&b.amount).unwrap_or(Ordering::Equal),
            SortKey::Date => a.date.cmp(&b.date),
            SortKey::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortKey::Category => a
                .category_or_empty()
                .to_lowercase()
                .cmp(&b.category_or_empty().to_lowercase()),
        };
        match self.dir {
            SortDir::Asc => ord,
            SortDir::Desc => ord.reverse(),
        }
    }

    /// Stable sort, so equal rows keep their incoming order
    pub fn sort(&self, rows: &mut [&Expense]) {
        rows.sort_by(|a, b| self.compare(a, b));
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::new(SortKey::Date)
    }
}

// ============================================================================
// PAGINATION
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub rows: Vec<T>,
    /// 1-based, after clamping
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

impl<T: Clone> Page<&T> {
    /// Owned copy of a borrowed page
    pub fn cloned(self) -> Page<T> {
        Page {
            rows: self.rows.into_iter().cloned().collect(),
            page: self.page,
            page_size: self.page_size,
            total: self.total,
            total_pages: self.total_pages,
        }
    }
}

/// Slice out one page; the page number is clamped into `1..=total_pages`
pub fn paginate<T: Clone>(rows: &[T], page: usize, page_size: usize) -> Page<T> {
    let page_size = if page_size == 0 { DEFAULT_PAGE_SIZE } else { page_size };
    let total = rows.len();
    let total_pages = total.div_ceil(page_size).max(1);
    let page = page.clamp(1, total_pages);

    let start = (page - 1) * page_size;
    let end = (start + page_size).min(total);
    let rows = if start < total {
        rows[start..end].to_vec()
    } else {
        Vec::new()
    };

    Page {
        rows,
        page,
        page_size,
        total,
        total_pages,
    }
}

/// Filter, sort and paginate in one go
pub fn query<'a>(
    expenses: &'a [Expense],
    filter: &ExpenseFilter,
    order: SortOrder,
    page: usize,
    page_size: usize,
) -> Page<&'a Expense> {
    let mut rows = filter.apply(expenses);
    order.sort(&mut rows);
    paginate(&rows, page, page_size)
}

/// Distinct non-empty categories, sorted
pub fn categories(expenses: &[Expense]) -> Vec<String> {
    expenses
        .iter()
        .filter_map(|e| e.category.as_deref())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
