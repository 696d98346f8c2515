use derive_setters::Setters;

use crate::record::{
    FIRST_NAME, LAST_CONTACT_DATE, LAST_NAME, NOTES, RESTING_HR, SPO2, STATUS, SYMPTOMS,
    TEMPERATURE, Value,
};
use crate::renderer::format_reading;

pub type Formatter = fn(&Value) -> String;

/// Static configuration of one displayed field.
#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct ColumnDescriptor {
    #[setters(skip)]
    pub id: String,
    #[setters(skip)]
    pub header: String,
    #[setters(strip_option, into)]
    pub group: Option<String>,
    pub tags: bool,
    #[setters(strip_option)]
    pub formatter: Option<Formatter>,
}

impl ColumnDescriptor {
    pub fn new(id: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            header: header.into(),
            group: None,
            tags: false,
            formatter: None,
        }
    }

    /// Cells of this column fall back to the editable renderer.
    pub fn is_editable(&self) -> bool {
        !self.tags && self.formatter.is_none()
    }
}

fn plain(v: &Value) -> String {
    v.to_string()
}

fn temperature(v: &Value) -> String {
    format_reading(TEMPERATURE, v)
}

fn spo2(v: &Value) -> String {
    format_reading(SPO2, v)
}

fn resting_hr(v: &Value) -> String {
    format_reading(RESTING_HR, v)
}

fn contact_date(v: &Value) -> String {
    match v {
        Value::Date(d) => d.format("%a, %b %-d %Y").to_string(),
        other => other.to_string(),
    }
}

pub fn patient_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::new(FIRST_NAME, "First Name")
            .with_group("Patient")
            .with_formatter(plain),
        ColumnDescriptor::new(LAST_NAME, "Last Name")
            .with_group("Patient")
            .with_formatter(plain),
        ColumnDescriptor::new(TEMPERATURE, "Last Temp")
            .with_group("Status")
            .with_formatter(temperature),
        ColumnDescriptor::new(SPO2, "Last SpO2")
            .with_group("Status")
            .with_formatter(spo2),
        ColumnDescriptor::new(RESTING_HR, "Last Resting HR % increase")
            .with_group("Status")
            .with_formatter(resting_hr),
        ColumnDescriptor::new(SYMPTOMS, "Last Symptoms")
            .with_group("Status")
            .with_tags(true),
        ColumnDescriptor::new(STATUS, "Status")
            .with_group("Status")
            .with_tags(true),
        ColumnDescriptor::new(LAST_CONTACT_DATE, "Last Contacted")
            .with_group("Status")
            .with_formatter(contact_date),
        ColumnDescriptor::new(NOTES, "Notes").with_group("Status"),
    ]
}

/// Appends a plain editable column for every field of `fields` that has no
/// descriptor yet.
pub fn extend_with_fields<'a>(
    columns: &mut Vec<ColumnDescriptor>,
    fields: impl IntoIterator<Item = &'a str>,
) {
    for field in fields {
        if !columns.iter().any(|c| c.id == field) {
            columns.push(ColumnDescriptor::new(field, field));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn column(id: &str) -> ColumnDescriptor {
        patient_columns()
            .into_iter()
            .find(|c| c.id == id)
            .unwrap()
    }

    #[test]
    fn only_notes_is_editable_by_default() {
        let editable: Vec<String> = patient_columns()
            .into_iter()
            .filter(ColumnDescriptor::is_editable)
            .map(|c| c.id)
            .collect();
        assert_eq!(editable, vec![NOTES.to_string()]);
    }

    #[test]
    fn formatters_add_units() {
        let temp = column(TEMPERATURE).formatter.unwrap();
        let spo2 = column(SPO2).formatter.unwrap();
        assert_eq!(temp(&Value::Number(98.64)), "98.6°F");
        assert_eq!(spo2(&Value::Number(88.1)), "88.1%");
    }

    #[test]
    fn contact_date_is_human_readable() {
        let d = NaiveDate::from_ymd_opt(2020, 4, 7)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap();
        let fmt = column(LAST_CONTACT_DATE).formatter.unwrap();
        assert_eq!(fmt(&Value::Date(d)), "Tue, Apr 7 2020");
    }

    #[test]
    fn unknown_fields_become_editable_columns() {
        let mut columns = patient_columns();
        extend_with_fields(&mut columns, [NOTES, "ward"]);
        assert_eq!(columns.len(), 10);
        assert!(columns.last().unwrap().is_editable());
    }
}
