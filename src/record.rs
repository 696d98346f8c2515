use chrono::NaiveDateTime;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{trace, warn};

use crate::editor::CellUpdater;
use crate::logging::redact;

pub const FIRST_NAME: &str = "firstName";
pub const LAST_NAME: &str = "lastName";
pub const TEMPERATURE: &str = "temperature";
pub const RESTING_HR: &str = "resting_hr";
pub const SPO2: &str = "spo2";
pub const STATUS: &str = "status";
pub const SYMPTOMS: &str = "symptoms";
pub const NOTES: &str = "notes";
pub const LAST_CONTACT_DATE: &str = "lastContactDate";

/// Storage format of contact dates, both in generated data and in files.
pub const DATE_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

static MISSING: Value = Value::Missing;

#[derive(Debug, Clone, PartialEq)]
pub struct TagEntry {
    pub label: String,
    pub value: Option<f64>,
}

impl TagEntry {
    pub fn new(label: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }

    /// Parses `label` or `label:value`. A value that is not a number stays
    /// part of the label.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        if let Some((label, value)) = s.rsplit_once(':')
            && let Ok(v) = value.trim().parse::<f64>()
        {
            return Some(TagEntry::new(label.trim(), Some(v)));
        }
        Some(TagEntry::new(s, None))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    Number(f64),
    Text(String),
    Date(NaiveDateTime),
    Tags(Vec<TagEntry>),
    #[default]
    Missing,
}

impl Value {
    /// Finite numbers only; everything else fails the numeric check.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Parses `label[:value]` entries separated by `;`.
    pub fn parse_tags(s: &str) -> Value {
        Value::Tags(s.split(';').filter_map(TagEntry::parse).collect())
    }

    pub fn parse_date(s: &str) -> Value {
        let s = s.trim();
        for fmt in [DATE_FORMAT, "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
            if let Ok(d) = NaiveDateTime::parse_from_str(s, fmt) {
                return Value::Date(d);
            }
        }
        Value::Text(s.to_string())
    }

    /// Ordering used by column sorting. Missing values sort last, values of
    /// different kinds are compared by their text.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Missing, Value::Missing) => Ordering::Equal,
            (Value::Missing, _) => Ordering::Greater,
            (_, Value::Missing) => Ordering::Less,
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (a, b) => a.to_string().cmp(&b.to_string()),
        }
    }
}

pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Text(s) => write!(f, "{s}"),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::Tags(tags) => {
                let parts = tags
                    .iter()
                    .map(|t| match t.value {
                        Some(v) => format!("{}:{}", t.label, format_number(v)),
                        None => t.label.clone(),
                    })
                    .collect::<Vec<String>>();
                write!(f, "{}", parts.join(";"))
            }
            Value::Missing => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: BTreeMap<String, Value>,
    pub sub_rows: Vec<Row>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
        self.set(field, value);
        self
    }

    pub fn get(&self, field: &str) -> &Value {
        self.fields.get(field).unwrap_or(&MISSING)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }
}

/// The row collection. Every mutation replaces the shared vector, so a view
/// holding an older `Arc` never observes a partial write.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    rows: Arc<Vec<Row>>,
}

impl Dataset {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: Arc::new(rows),
        }
    }

    pub fn rows(&self) -> Arc<Vec<Row>> {
        Arc::clone(&self.rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Row> {
        self.rows.get(idx)
    }

    pub fn set_data(&mut self, rows: Vec<Row>) {
        trace!("Replacing dataset with {} rows", rows.len());
        self.rows = Arc::new(rows);
    }

    pub fn push(&mut self, row: Row) {
        let mut rows = (*self.rows).clone();
        rows.push(row);
        self.set_data(rows);
    }

    pub fn remove_indices(&mut self, indices: &[usize]) -> usize {
        let before = self.rows.len();
        let rows: Vec<Row> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(i, _)| !indices.contains(i))
            .map(|(_, r)| r.clone())
            .collect();
        self.set_data(rows);
        before - self.rows.len()
    }
}

impl CellUpdater for Dataset {
    fn update_cell(&mut self, row_index: usize, field: &str, value: Value) {
        if row_index >= self.rows.len() {
            warn!("Ignoring update of {field} for unknown row {row_index}");
            return;
        }
        trace!(
            "Update cell {row_index}:{field} = {}",
            redact(&value.to_string())
        );
        let mut rows = (*self.rows).clone();
        rows[row_index].set(field, value);
        self.set_data(rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_read_as_missing() {
        let row = Row::new().with(TEMPERATURE, Value::Number(98.6));
        assert_eq!(row.get(TEMPERATURE), &Value::Number(98.6));
        assert!(row.get(SPO2).is_missing());
    }

    #[test]
    fn tags_parse_with_and_without_values() {
        let v = Value::parse_tags("cough:3; fever ;note: high");
        assert_eq!(
            v,
            Value::Tags(vec![
                TagEntry::new("cough", Some(3.0)),
                TagEntry::new("fever", None),
                TagEntry::new("note: high", None),
            ])
        );
        assert_eq!(v.to_string(), "cough:3;fever;note: high");
    }

    #[test]
    fn dates_parse_from_storage_and_iso_format() {
        assert!(matches!(
            Value::parse_date("2020/04/01 10:30:00"),
            Value::Date(_)
        ));
        assert!(matches!(
            Value::parse_date("2020-04-01 10:30:00.000"),
            Value::Date(_)
        ));
        assert_eq!(
            Value::parse_date("yesterday"),
            Value::Text("yesterday".into())
        );
    }

    #[test]
    fn compare_sorts_missing_last_and_numbers_numerically() {
        assert_eq!(
            Value::Number(9.0).compare(&Value::Number(10.0)),
            Ordering::Less
        );
        assert_eq!(Value::Missing.compare(&Value::Number(1.0)), Ordering::Greater);
        assert_eq!(
            Value::Text("b".into()).compare(&Value::Text("a".into())),
            Ordering::Greater
        );
    }

    #[test]
    fn dataset_mutations_replace_the_shared_rows() {
        let mut data = Dataset::new(vec![Row::new(), Row::new(), Row::new()]);
        let before = data.rows();

        data.update_cell(1, NOTES, Value::Text("call back".into()));
        assert!(before[1].get(NOTES).is_missing());
        assert_eq!(data.get(1).unwrap().get(NOTES), &Value::Text("call back".into()));

        assert_eq!(data.remove_indices(&[0, 2]), 2);
        assert_eq!(data.len(), 1);
        assert_eq!(before.len(), 3);

        data.push(Row::new());
        assert_eq!(data.len(), 2);
    }

    #[test]
    fn out_of_range_update_is_ignored() {
        let mut data = Dataset::new(vec![Row::new()]);
        data.update_cell(5, NOTES, Value::Text("x".into()));
        assert_eq!(data.len(), 1);
        assert!(data.get(0).unwrap().get(NOTES).is_missing());
    }
}
