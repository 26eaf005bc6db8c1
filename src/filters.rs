// src/filters.rs
//! Value-formatting filters available to templates.
//!
//! Filters are pure functions over [`CellValue`]. Every render call gets
//! its own explicitly constructed [`FilterTable`]; there is no global
//! registry and workers share no filter state. A filter that cannot make
//! sense of its input passes the value through as display text, so a
//! misapplied filter degrades instead of failing the record.

use crate::value::{CellValue, smart_datetime_string};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A named formatting function.
pub type FilterFn = Arc<dyn Fn(&CellValue) -> String + Send + Sync>;

/// Named formatting functions passed into each render call.
#[derive(Clone, Default)]
pub struct FilterTable {
    filters: BTreeMap<String, FilterFn>,
}

impl FilterTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The filter set templates written for this engine expect.
    pub fn standard() -> Self {
        let mut table = Self::empty();
        table.register("date", date_only);
        table.register("dateonly", date_only);
        table.register("dateformat", date_only);
        table.register("datetime_full", date_time_full);
        table.register("datetime_full_no_sec", date_time_no_seconds);
        table.register("number_thousands", number_thousands);
        table.register("currency_uah", currency("₴"));
        table.register("currency_usd", currency("$"));
        table.register("floatformat", float_format(2));
        table
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        filter: impl Fn(&CellValue) -> String + Send + Sync + 'static,
    ) {
        self.filters.insert(name.into(), Arc::new(filter));
    }

    pub fn get(&self, name: &str) -> Option<&FilterFn> {
        self.filters.get(name)
    }

    /// Apply a named filter; `None` when the name is unknown.
    pub fn apply(&self, name: &str, value: &CellValue) -> Option<String> {
        self.filters.get(name).map(|filter| filter(value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl fmt::Debug for FilterTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterTable")
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// `DD.MM.YYYY`, dropping any time-of-day part.
pub fn date_only(value: &CellValue) -> String {
    match value.as_date() {
        Some(dt) => dt.format("%d.%m.%Y").to_string(),
        None => passthrough(value),
    }
}

/// Full timestamp that degrades with the precision present: zero seconds
/// drop the seconds field and midnight renders date-only.
pub fn date_time_full(value: &CellValue) -> String {
    match value.as_date() {
        Some(dt) => smart_datetime_string(&dt, true),
        None => passthrough(value),
    }
}

/// Like [`date_time_full`] but never shows seconds.
pub fn date_time_no_seconds(value: &CellValue) -> String {
    match value.as_date() {
        Some(dt) => smart_datetime_string(&dt, false),
        None => passthrough(value),
    }
}

/// Two decimals, comma decimal mark, space-grouped thousands: `16 500,00`.
pub fn number_thousands(value: &CellValue) -> String {
    match numeric_input(value) {
        Some(n) => group_thousands(n, 2),
        None => passthrough(value),
    }
}

/// [`number_thousands`] plus a trailing currency symbol.
pub fn currency(symbol: &str) -> impl Fn(&CellValue) -> String + Send + Sync + 'static {
    let symbol = symbol.to_string();
    move |value| match numeric_input(value) {
        Some(n) => format!("{} {}", group_thousands(n, 2), symbol),
        None => passthrough(value),
    }
}

/// Comma-decimal fixed precision, no grouping.
pub fn float_format(precision: usize) -> impl Fn(&CellValue) -> String + Send + Sync + 'static {
    move |value| match numeric_input(value) {
        Some(n) => format!("{:.*}", precision, n).replace('.', ","),
        None => passthrough(value),
    }
}

fn passthrough(value: &CellValue) -> String {
    value.to_display_string()
}

/// Numbers directly, or numeric text in local notation: spaces (plain or
/// non-breaking) as group separators and a comma decimal mark.
fn numeric_input(value: &CellValue) -> Option<f64> {
    match value {
        CellValue::Number(n) => Some(*n),
        CellValue::Text(s) => {
            let cleaned = s.trim().replace([' ', '\u{a0}'], "").replace(',', ".");
            cleaned.parse().ok()
        }
        _ => None,
    }
}

fn group_thousands(n: f64, precision: usize) -> String {
    let formatted = format!("{:.*}", precision, n.abs());
    let (int_part, frac_part) = formatted
        .split_once('.')
        .unwrap_or((formatted.as_str(), ""));

    let mut reversed = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            reversed.push(' ');
        }
        reversed.push(digit);
    }
    let grouped: String = reversed.chars().rev().collect();

    let sign = if n < 0.0 { "-" } else { "" };
    if frac_part.is_empty() {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{},{}", sign, grouped, frac_part)
    }
}
