use chrono::{Duration, NaiveDateTime};
use tracing::debug;

use crate::record::{
    FIRST_NAME, LAST_CONTACT_DATE, LAST_NAME, NOTES, RESTING_HR, Row, SPO2, STATUS, SYMPTOMS,
    TEMPERATURE, TagEntry, Value,
};

const FIRST_NAMES: &[&str] = &[
    "Ada", "Ben", "Carla", "Dmitri", "Elena", "Farid", "Grace", "Hiro", "Ines", "Jonas", "Kemal",
    "Lena", "Mateo", "Nadia", "Oskar", "Priya", "Quinn", "Rosa", "Sven", "Tamar", "Umar", "Vera",
    "Wen", "Yusuf", "Zoe",
];

const LAST_NAMES: &[&str] = &[
    "Adler", "Brandt", "Costa", "Dubois", "Eriksen", "Fischer", "Garcia", "Hansen", "Ivanova",
    "Jensen", "Kowalski", "Lindqvist", "Moreau", "Novak", "Okafor", "Petrov", "Quint", "Rossi",
    "Schmidt", "Tanaka", "Urban", "Vargas", "Weber", "Young", "Zimmer",
];

const CONTACT_WINDOW_DAYS: i64 = 14;

/// Seeded generator of synthetic patient rows.
pub struct MockGenerator {
    state: u64,
}

impl MockGenerator {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    // splitmix64
    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform in `[0, 1)`.
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[(self.next_f64() * items.len() as f64) as usize]
    }

    fn severity_score(&mut self) -> f64 {
        (self.next_f64() * 9.0).floor() + 1.0
    }

    pub fn new_person(&mut self, now: NaiveDateTime) -> Row {
        let severity = self.next_f64();
        let temperature = 97.0 + self.next_f64() * 5.0;
        let fever = temperature > 99.0;

        let mut symptoms = vec![
            TagEntry::new("cough", Some(self.severity_score())),
            TagEntry::new("shortness of breath", Some(self.severity_score())),
        ];
        if fever {
            symptoms.push(TagEntry::new("fever", Some(self.severity_score())));
        }
        let status = if fever && severity > 0.5 {
            "In-patient"
        } else {
            "Out-patient"
        };

        let window = Duration::days(CONTACT_WINDOW_DAYS).num_seconds() as f64;
        let last_contact = now - Duration::seconds((self.next_f64() * window) as i64);

        Row::new()
            .with(FIRST_NAME, Value::Text(self.pick(FIRST_NAMES).to_string()))
            .with(LAST_NAME, Value::Text(self.pick(LAST_NAMES).to_string()))
            .with(TEMPERATURE, Value::Number(temperature))
            .with(RESTING_HR, Value::Number(self.next_f64() * 20.0))
            .with(SPO2, Value::Number(80.0 + (self.next_f64() * 20.0).floor()))
            .with(STATUS, Value::Tags(vec![TagEntry::new(status, None)]))
            .with(SYMPTOMS, Value::Tags(symptoms))
            .with(NOTES, Value::Text(String::new()))
            .with(LAST_CONTACT_DATE, Value::Date(last_contact))
    }

    /// Generates `lens[0]` patients, each with `lens[1]` sub records, and so on.
    pub fn make_data(&mut self, lens: &[usize], now: NaiveDateTime) -> Vec<Row> {
        let rows = self.make_level(lens, now);
        debug!("Generated {} patients", rows.len());
        rows
    }

    fn make_level(&mut self, lens: &[usize], now: NaiveDateTime) -> Vec<Row> {
        let Some((&len, rest)) = lens.split_first() else {
            return Vec::new();
        };
        (0..len)
            .map(|_| {
                let mut person = self.new_person(now);
                person.sub_rows = self.make_level(rest, now);
                person
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 4, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn same_seed_same_patients() {
        let a = MockGenerator::new(7).make_data(&[5], now());
        let b = MockGenerator::new(7).make_data(&[5], now());
        assert_eq!(a, b);
        let c = MockGenerator::new(8).make_data(&[5], now());
        assert_ne!(a, c);
    }

    #[test]
    fn values_stay_in_generated_ranges() {
        let rows = MockGenerator::new(42).make_data(&[200], now());
        for row in &rows {
            let temp = row.get(TEMPERATURE).as_number().unwrap();
            let hr = row.get(RESTING_HR).as_number().unwrap();
            let spo2 = row.get(SPO2).as_number().unwrap();
            assert!((97.0..102.0).contains(&temp));
            assert!((0.0..20.0).contains(&hr));
            assert!((80.0..=99.0).contains(&spo2) && spo2.fract() == 0.0);

            let Value::Tags(symptoms) = row.get(SYMPTOMS) else {
                panic!("symptoms are tags");
            };
            assert_eq!(symptoms.len(), if temp > 99.0 { 3 } else { 2 });
            assert!(
                symptoms
                    .iter()
                    .all(|t| matches!(t.value, Some(v) if (1.0..=9.0).contains(&v)))
            );

            let Value::Tags(status) = row.get(STATUS) else {
                panic!("status is tags");
            };
            if temp <= 99.0 {
                assert_eq!(status[0].label, "Out-patient");
            }

            let Value::Date(d) = row.get(LAST_CONTACT_DATE) else {
                panic!("contact date is a date");
            };
            assert!(*d <= now() && *d >= now() - Duration::days(CONTACT_WINDOW_DAYS));
        }
    }

    #[test]
    fn nested_levels_create_sub_rows() {
        let rows = MockGenerator::new(1).make_data(&[3, 2], now());
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.sub_rows.len() == 2));
        assert!(rows[0].sub_rows[0].sub_rows.is_empty());
    }
}
