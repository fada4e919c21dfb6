use chrono::NaiveDate;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Raw value supplied by the data layer for one domain key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldValue {
    #[default]
    Null,
    Text(String),
    Bool(bool),
    Date(NaiveDate),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    /// Display text before slot splitting. Booleans become Yes/No, dates dd/mm/yyyy.
    pub fn display(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Text(text) => text.clone(),
            FieldValue::Bool(flag) => yes_no(*flag).to_string(),
            FieldValue::Date(date) => date.format("%d/%m/%Y").to_string(),
        }
    }

    /// Truthiness used when the destination is a checkbox.
    pub fn is_checked(&self) -> bool {
        match self {
            FieldValue::Null | FieldValue::Date(_) => false,
            FieldValue::Bool(flag) => *flag,
            FieldValue::Text(text) => is_truthy(text),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(text) => text.trim().is_empty(),
            FieldValue::Bool(_) | FieldValue::Date(_) => false,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(flag) => FieldValue::Bool(flag),
            Value::Number(number) => FieldValue::Text(number.to_string()),
            Value::String(text) => FieldValue::Text(text),
            Value::Array(items) => FieldValue::Text(
                items
                    .into_iter()
                    .map(|item| FieldValue::from(item).display())
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            Value::Object(_) => FieldValue::Null,
        }
    }
}

/// Domain key -> raw value for one render. Unknown keys are ignored downstream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    values: BTreeMap<String, FieldValue>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Missing keys read as `Null`.
    pub fn get(&self, key: &str) -> &FieldValue {
        static NULL: FieldValue = FieldValue::Null;
        self.values.get(key).unwrap_or(&NULL)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.values.iter()
    }

    /// Accepts a flat JSON object; nested objects resolve to `Null`.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let parsed: BTreeMap<String, Value> = serde_json::from_str(raw)?;
        Ok(Self {
            values: parsed
                .into_iter()
                .map(|(key, value)| (key, FieldValue::from(value)))
                .collect(),
        })
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = FieldMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

pub fn is_truthy(raw: &str) -> bool {
    let v = raw.trim().to_ascii_lowercase();
    matches!(v.as_str(), "true" | "yes" | "y" | "1" | "on")
}

pub fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

/// How a value is turned into text before slot splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueFormat {
    #[default]
    Plain,
    /// Any non-blank value is normalized through the truthiness predicate.
    YesNo,
}

pub fn format_value(value: &FieldValue, format: ValueFormat) -> String {
    match format {
        ValueFormat::Plain => value.display(),
        ValueFormat::YesNo if value.is_blank() => String::new(),
        ValueFormat::YesNo => yes_no(value.is_checked()).to_string(),
    }
}

/// Resolves a raw value into one line per destination slot.
///
/// A single slot receives the whole display text. With several slots the text
/// is split on newlines and commas; surplus parts are folded into the last
/// slot joined by ", " and unused slots come back empty.
pub fn resolve(value: &FieldValue, slots: usize) -> Vec<String> {
    resolve_as(value, slots, ValueFormat::Plain)
}

pub fn resolve_as(value: &FieldValue, slots: usize, format: ValueFormat) -> Vec<String> {
    if slots == 0 {
        return Vec::new();
    }
    let text = format_value(value, format);
    if slots == 1 {
        return vec![text];
    }
    let parts: Vec<String> = text
        .split(['\n', ','])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect();
    let mut out = Vec::with_capacity(slots);
    if parts.len() <= slots {
        out.extend(parts);
    } else {
        out.extend(parts[..slots - 1].iter().cloned());
        out.push(parts[slots - 1..].join(", "));
    }
    out.resize(slots, String::new());
    out
}

/// First-writer-wins bookkeeping for physical destinations.
#[derive(Debug, Clone, Default)]
pub struct FilledSet {
    names: BTreeSet<String>,
}

impl FilledSet {
    pub fn is_filled(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Returns false when the destination was already claimed.
    pub fn claim(&mut self, name: &str) -> bool {
        self.names.insert(name.to_string())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_values_resolve_to_yes() {
        for raw in ["yes", "Y", "true", "1", "ON"] {
            assert!(is_truthy(raw), "{raw} should be truthy");
            assert_eq!(
                resolve_as(&FieldValue::text(raw), 1, ValueFormat::YesNo),
                vec!["Yes"]
            );
        }
        assert_eq!(resolve(&FieldValue::Bool(true), 1), vec!["Yes"]);
    }

    #[test]
    fn falsy_values_resolve_to_no_or_blank() {
        for raw in ["no", "false", "0"] {
            assert!(!is_truthy(raw), "{raw} should be falsy");
            assert_eq!(
                resolve_as(&FieldValue::text(raw), 1, ValueFormat::YesNo),
                vec!["No"]
            );
        }
        assert_eq!(resolve(&FieldValue::Bool(false), 1), vec!["No"]);
        assert_eq!(resolve_as(&FieldValue::text(""), 1, ValueFormat::YesNo), vec![""]);
        assert_eq!(resolve_as(&FieldValue::Null, 1, ValueFormat::YesNo), vec![""]);
        assert!(!FieldValue::Null.is_checked());
        assert!(!FieldValue::text("").is_checked());
    }

    #[test]
    fn multi_slot_exact_split_places_one_part_per_slot() {
        let value = FieldValue::text("12 High Street, Leeds, LS1 4AB");
        assert_eq!(
            resolve(&value, 3),
            vec!["12 High Street", "Leeds", "LS1 4AB"]
        );
    }

    #[test]
    fn multi_slot_overflow_folds_into_last_slot() {
        let value = FieldValue::text("a, b, c, d, e");
        assert_eq!(resolve(&value, 3), vec!["a", "b", "c, d, e"]);
    }

    #[test]
    fn multi_slot_short_value_leaves_trailing_slots_empty() {
        let value = FieldValue::text("Flat 2\nRiverside Court");
        assert_eq!(resolve(&value, 3), vec!["Flat 2", "Riverside Court", ""]);
        assert_eq!(resolve(&FieldValue::Null, 2), vec!["", ""]);
    }

    #[test]
    fn resolve_is_idempotent() {
        let value = FieldValue::text("x, y, z, w");
        assert_eq!(resolve(&value, 2), resolve(&value, 2));
    }

    #[test]
    fn dates_render_day_first() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).expect("date");
        assert_eq!(resolve(&FieldValue::Date(date), 1), vec!["09/03/2026"]);
    }

    #[test]
    fn field_map_from_json_normalizes_scalars() {
        let map = FieldMap::from_json(
            r#"{"landlord_name":"A. Patel","co_alarm_fitted":true,"co_ppm":12,"notes":null}"#,
        )
        .expect("json");
        assert_eq!(map.get("landlord_name"), &FieldValue::text("A. Patel"));
        assert_eq!(map.get("co_alarm_fitted"), &FieldValue::Bool(true));
        assert_eq!(map.get("co_ppm"), &FieldValue::text("12"));
        assert_eq!(map.get("notes"), &FieldValue::Null);
        assert_eq!(map.get("absent"), &FieldValue::Null);
    }

    #[test]
    fn filled_set_is_first_writer_wins() {
        let mut filled = FilledSet::default();
        assert!(filled.claim("landlord_name"));
        assert!(!filled.claim("landlord_name"));
        assert!(filled.is_filled("landlord_name"));
    }
}
