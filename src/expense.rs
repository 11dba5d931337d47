// 💸 Expense - The single record type
//
// Wire format (JSON export, REST API) uses the camelCase field names of the
// browser client: `createdAt`, `recurringKey`. `user_id` keeps its backend
// spelling.

use crate::error::{ExpenseError, Result};
use crate::month::YearMonth;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// EXPENSE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    /// Stable identity assigned by the store
    pub id: String,

    pub title: String,

    /// Always > 0
    pub amount: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// ISO calendar date `YYYY-MM-DD`
    pub date: String,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub recurring: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_key: Option<String>,

    #[serde(default, rename = "user_id", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

fn is_false(val: &bool) -> bool {
    !*val
}

impl Expense {
    /// Build a stored expense from a validated draft
    pub fn from_new(id: String, new: NewExpense) -> Self {
        Expense {
            id,
            title: new.title,
            amount: new.amount,
            category: new.category,
            date: new.date,
            created_at: new.created_at.unwrap_or_else(Utc::now),
            recurring: new.recurring,
            recurring_key: new.recurring_key,
            user_id: new.user_id,
        }
    }

    /// Month key of `date`
    pub fn month(&self) -> Result<YearMonth> {
        YearMonth::from_iso_date(&self.date)
    }

    pub fn category_or_empty(&self) -> &str {
        self.category.as_deref().unwrap_or("")
    }

    /// Recurring group key: the explicit key if set, else `title|amount|category`
    ///
    /// The derived form is plain concatenation. Two series sharing title,
    /// amount and category without an explicit key land in the same group.
    pub fn group_key(&self) -> String {
        match self.recurring_key.as_deref() {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => derived_group_key(&self.title, self.amount, self.category.as_deref()),
        }
    }
}

/// `title|amount|category`, with the amount in its shortest decimal form
/// (`600`, `24.5`) and a missing category rendered empty
pub fn derived_group_key(title: &str, amount: f64, category: Option<&str>) -> String {
    format!("{}|{}|{}", title, amount, category.unwrap_or(""))
}

// ============================================================================
// NEW EXPENSE (draft passed to ExpenseStore::create)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExpense {
    pub title: String,
    pub amount: f64,
    #[serde(default)]
    pub category: Option<String>,
    /// Empty until the caller fills it; `normalize` rejects an empty date
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub recurring: bool,
    #[serde(default)]
    pub recurring_key: Option<String>,
    #[serde(default, rename = "user_id")]
    pub user_id: Option<String>,
}

impl NewExpense {
    pub fn new(title: &str, amount: f64, date: &str) -> Self {
        NewExpense {
            title: title.to_string(),
            amount,
            category: None,
            date: date.to_string(),
            created_at: None,
            recurring: false,
            recurring_key: None,
            user_id: None,
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn with_user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    /// Mark as recurring; `None` falls back to the derived key on normalize
    pub fn recurring(mut self, key: Option<&str>) -> Self {
        self.recurring = true;
        self.recurring_key = key.map(str::to_string);
        self
    }

    /// Trim text fields, check invariants, and fill in a missing recurring key
    pub fn normalize(mut self) -> Result<Self> {
        self.title = self.title.trim().to_string();
        self.category = self.category.map(|c| c.trim().to_string());
        self.date = self.date.trim().to_string();

        validate_fields(&self.title, self.amount, &self.date)?;

        if self.recurring && self.recurring_key.as_deref().map_or(true, str::is_empty) {
            self.recurring_key = Some(derived_group_key(
                &self.title,
                self.amount,
                self.category.as_deref(),
            ));
        }

        Ok(self)
    }
}

// ============================================================================
// EXPENSE PATCH (partial update)
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpensePatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    /// `Some(None)` clears the category (`"category": null` on the wire)
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub category: Option<Option<String>>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, rename = "user_id")]
    pub user_id: Option<String>,
}

/// Absent field stays `None` via `default`; a present `null` becomes `Some(None)`
fn explicit_null<'de, D>(deserializer: D) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl ExpensePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.amount.is_none()
            && self.category.is_none()
            && self.date.is_none()
            && self.user_id.is_none()
    }

    /// Patched copy of `expense`; fails if the result breaks an invariant
    pub fn apply(&self, expense: &Expense) -> Result<Expense> {
        let mut updated = expense.clone();

        if let Some(title) = &self.title {
            updated.title = title.trim().to_string();
        }
        if let Some(amount) = self.amount {
            updated.amount = amount;
        }
        if let Some(category) = &self.category {
            updated.category = category.as_deref().map(|c| c.trim().to_string());
        }
        if let Some(date) = &self.date {
            updated.date = date.trim().to_string();
        }
        if let Some(user_id) = &self.user_id {
            updated.user_id = Some(user_id.clone());
        }

        validate_fields(&updated.title, updated.amount, &updated.date)?;
        Ok(updated)
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

fn validate_fields(title: &str, amount: f64, date: &str) -> Result<()> {
    if title.is_empty() {
        return Err(ExpenseError::Validation("title must not be empty".to_string()));
    }
    if !amount.is_finite() || amount <= 0.0 {
        return Err(ExpenseError::Validation(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
        return Err(ExpenseError::Validation(format!(
            "date must be YYYY-MM-DD, got '{}'",
            date
        )));
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(title: &str, amount: f64, category: Option<&str>) -> Expense {
        let mut new = NewExpense::new(title, amount, "2024-01-15");
        new.category = category.map(str::to_string);
        Expense::from_new("e1".to_string(), new)
    }

    #[test]
    fn test_derived_group_key_formats_amount_like_the_client() {
        assert_eq!(derived_group_key("Rent", 600.0, Some("Housing")), "Rent|600|Housing");
        assert_eq!(derived_group_key("Groceries", 24.5, Some("Food")), "Groceries|24.5|Food");
        assert_eq!(derived_group_key("Gym", 30.0, None), "Gym|30|");
    }

    #[test]
    fn test_group_key_prefers_explicit_key() {
        let mut e = stored("Rent", 600.0, Some("Housing"));
        assert_eq!(e.group_key(), "Rent|600|Housing");

        e.recurring_key = Some("flat-rent".to_string());
        assert_eq!(e.group_key(), "flat-rent");

        e.recurring_key = Some(String::new());
        assert_eq!(e.group_key(), "Rent|600|Housing");
    }

    #[test]
    fn test_normalize_trims_and_defaults_key() {
        let new = NewExpense::new("  Rent ", 600.0, "2024-01-01")
            .with_category(" Housing ")
            .recurring(None)
            .normalize()
            .unwrap();

        assert_eq!(new.title, "Rent");
        assert_eq!(new.category.as_deref(), Some("Housing"));
        assert_eq!(new.recurring_key.as_deref(), Some("Rent|600|Housing"));
    }

    #[test]
    fn test_normalize_rejects_invalid() {
        assert!(NewExpense::new("   ", 10.0, "2024-01-01").normalize().is_err());
        assert!(NewExpense::new("Coffee", 0.0, "2024-01-01").normalize().is_err());
        assert!(NewExpense::new("Coffee", -3.2, "2024-01-01").normalize().is_err());
        assert!(NewExpense::new("Coffee", f64::NAN, "2024-01-01").normalize().is_err());
        assert!(NewExpense::new("Coffee", 3.2, "2024-13-01").normalize().is_err());
        assert!(NewExpense::new("Coffee", 3.2, "").normalize().is_err());
    }

    #[test]
    fn test_patch_apply() {
        let e = stored("Coffee", 3.2, Some("Food"));
        let patch = ExpensePatch {
            amount: Some(4.0),
            category: Some(Some("Drinks".to_string())),
            ..Default::default()
        };

        let updated = patch.apply(&e).unwrap();
        assert_eq!(updated.amount, 4.0);
        assert_eq!(updated.category.as_deref(), Some("Drinks"));
        assert_eq!(updated.title, "Coffee");
        assert_eq!(updated.id, e.id);

        let bad = ExpensePatch {
            title: Some(" ".to_string()),
            ..Default::default()
        };
        assert!(bad.apply(&e).is_err());
    }

    #[test]
    fn test_patch_null_category_clears_it() {
        let e = stored("Coffee", 3.2, Some("Food"));

        let clear: ExpensePatch = serde_json::from_str(r#"{"category": null}"#).unwrap();
        assert_eq!(clear.category, Some(None));
        assert!(!clear.is_empty());
        assert_eq!(clear.apply(&e).unwrap().category, None);

        let untouched: ExpensePatch = serde_json::from_str(r#"{"amount": 4.0}"#).unwrap();
        assert_eq!(untouched.category, None);
        assert_eq!(untouched.apply(&e).unwrap().category.as_deref(), Some("Food"));
    }

    #[test]
    fn test_json_uses_client_field_names() {
        let mut e = stored("Rent", 600.0, Some("Housing"));
        e.recurring = true;
        e.recurring_key = Some("Rent|600|Housing".to_string());
        e.user_id = Some("u1".to_string());

        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["recurringKey"], "Rent|600|Housing");
        assert_eq!(json["user_id"], "u1");
        assert!(json.get("createdAt").is_some());

        let plain = stored("Coffee", 3.2, None);
        let json = serde_json::to_value(&plain).unwrap();
        assert!(json.get("recurring").is_none());
        assert!(json.get("category").is_none());
    }
}
