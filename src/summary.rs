// 📊 Summary - Headline totals and per-category breakdown
//
// The breakdown feeds the category pie chart: one slice per category with
// its share of the filtered total.

use crate::expense::Expense;
use crate::month::YearMonth;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub current_month: YearMonth,
    /// Sum of all expenses dated in the current month
    pub month_total: f64,
    pub all_total: f64,
    pub count: usize,
    /// Sum of the rows on the page being shown
    pub page_total: f64,
}

impl Summary {
    pub fn compute<'a, I>(all: &[Expense], page_rows: I, current_month: YearMonth) -> Self
    where
        I: IntoIterator<Item = &'a Expense>,
    {
        let month_total = all
            .iter()
            .filter(|e| e.month().ok() == Some(current_month))
            .map(|e| e.amount)
            .sum();

        Summary {
            current_month,
            month_total,
            all_total: all.iter().map(|e| e.amount).sum(),
            count: all.len(),
            page_total: page_rows.into_iter().map(|e| e.amount).sum(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
    pub count: usize,
    /// 0.0 - 100.0
    pub share: f64,
}

/// Totals per category, largest first (ties by name)
///
/// Missing and empty categories are pooled under "Uncategorized".
pub fn category_breakdown<'a, I>(rows: I) -> Vec<CategoryTotal>
where
    I: IntoIterator<Item = &'a Expense>,
{
    let mut sums: HashMap<String, (f64, usize)> = HashMap::new();
    for e in rows {
        let label = match e.category.as_deref() {
            Some(c) if !c.is_empty() => c,
            _ => UNCATEGORIZED,
        };
        let entry = sums.entry(label.to_string()).or_insert((0.0, 0));
        entry.0 += e.amount;
        entry.1 += 1;
    }

    let grand_total: f64 = sums.values().map(|(total, _)| total).sum();

    let mut breakdown: Vec<CategoryTotal> = sums
        .into_iter()
        .map(|(category, (total, count))| CategoryTotal {
            share: if grand_total > 0.0 {
                total / grand_total * 100.0
            } else {
                0.0
            },
            category,
            total,
            count,
        })
        .collect();

    breakdown.sort_by(|a, b| {
        b.total
            .partial_cmp(&a.total)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.category.cmp(&b.category))
    });
    breakdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expense::NewExpense;

    fn expense(title: &str, amount: f64, category: Option<&str>, date: &str) -> Expense {
        let mut new = NewExpense::new(title, amount, date);
        new.category = category.map(str::to_string);
        Expense::from_new(title.to_string(), new)
    }

    fn sample() -> Vec<Expense> {
        vec![
            expense("Groceries", 24.5, Some("Food"), "2024-03-02"),
            expense("Coffee", 3.5, Some("Food"), "2024-02-27"),
            expense("Rent", 600.0, Some("Housing"), "2024-03-01"),
            expense("Stamps", 2.0, None, "2024-03-15"),
            expense("Gift", 20.0, Some(""), "2024-01-15"),
        ]
    }

    #[test]
    fn test_summary_totals() {
        let all = sample();
        let current = "2024-03".parse().unwrap();
        let summary = Summary::compute(&all, all.iter().take(2), current);

        assert_eq!(summary.count, 5);
        assert_eq!(summary.month_total, 626.5);
        assert_eq!(summary.all_total, 650.0);
        assert_eq!(summary.page_total, 28.0);

        println!("✅ Summary: {:?}", summary);
    }

    #[test]
    fn test_category_breakdown() {
        let all = sample();
        let breakdown = category_breakdown(&all);

        let labels: Vec<&str> = breakdown.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(labels, vec!["Housing", "Food", "Uncategorized"]);

        assert_eq!(breakdown[1].total, 28.0);
        assert_eq!(breakdown[1].count, 2);
        assert_eq!(breakdown[2].total, 22.0);

        let share_sum: f64 = breakdown.iter().map(|c| c.share).sum();
        assert!((share_sum - 100.0).abs() < 1e-9);
        assert!((breakdown[0].share - 600.0 / 650.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_breakdown_empty() {
        let none: Vec<Expense> = Vec::new();
        assert!(category_breakdown(&none).is_empty());
    }
}
