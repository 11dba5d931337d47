// ⚙️ Display Settings - Currency and locale for money formatting

use crate::error::{ExpenseError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CURRENCIES: &[&str] = &["GBP", "USD", "EUR", "JPY", "CAD", "AUD", "NGN", "INR", "ZAR"];

pub const LOCALES: &[&str] = &[
    "en-GB", "en-US", "en-CA", "en-AU", "en-NG", "en-IN", "en-ZA", "fr-FR", "de-DE", "es-ES",
    "it-IT",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_locale")]
    pub locale: String,
}

fn default_currency() -> String {
    "GBP".to_string()
}

fn default_locale() -> String {
    "en-GB".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            currency: default_currency(),
            locale: default_locale(),
        }
    }
}

impl Settings {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Settings::default());
        }
        let raw = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn set_currency(&mut self, currency: &str) -> Result<()> {
        if !CURRENCIES.contains(&currency) {
            return Err(ExpenseError::UnsupportedSetting(format!("currency {}", currency)));
        }
        self.currency = currency.to_string();
        Ok(())
    }

    pub fn set_locale(&mut self, locale: &str) -> Result<()> {
        if !LOCALES.contains(&locale) {
            return Err(ExpenseError::UnsupportedSetting(format!("locale {}", locale)));
        }
        self.locale = locale.to_string();
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let mut probe = Settings::default();
        probe.set_currency(&self.currency)?;
        probe.set_locale(&self.locale)
    }

    /// Decimal and grouping separators for the locale
    fn separators(&self) -> (char, char) {
        match self.locale.split('-').next().unwrap_or("en") {
            "fr" => (',', ' '),
            "de" | "es" | "it" => (',', '.'),
            _ => ('.', ','),
        }
    }

    /// Currency symbol and whether it follows the number
    fn symbol(&self) -> (&str, bool) {
        let symbol = match self.currency.as_str() {
            "GBP" => "£",
            "USD" => "$",
            "EUR" => "€",
            "JPY" => "¥",
            "CAD" => "CA$",
            "AUD" => "A$",
            "NGN" => "₦",
            "INR" => "₹",
            "ZAR" => "R",
            other => other,
        };
        let trailing = matches!(self.separators().0, ',');
        (symbol, trailing)
    }

    fn fraction_digits(&self) -> usize {
        if self.currency == "JPY" {
            0
        } else {
            2
        }
    }
}

/// Format `amount` as money for `settings`, e.g. `£1,234.50` or `1.234,50 €`
pub fn format_money(amount: f64, settings: &Settings) -> String {
    let (decimal_sep, group_sep) = settings.separators();
    let digits = settings.fraction_digits();

    let fixed = format!("{:.*}", digits, amount.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (fixed.clone(), None),
    };

    let mut grouped = String::new();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(group_sep);
        }
        grouped.push(ch);
    }
    if let Some(frac) = frac_part {
        grouped.push(decimal_sep);
        grouped.push_str(&frac);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    let (symbol, trailing) = settings.symbol();
    if trailing {
        format!("{}{} {}", sign, grouped, symbol)
    } else {
        format!("{}{}{}", sign, symbol, grouped)
    }
}
