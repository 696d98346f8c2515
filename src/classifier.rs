use crate::record::{RESTING_HR, SPO2, TEMPERATURE, Value};

#[derive(Debug, Clone, Copy)]
enum Bound {
    Above(f64),
    AtMost(f64),
}

impl Bound {
    fn violated_by(self, v: f64) -> bool {
        match self {
            Bound::Above(limit) => v > limit,
            Bound::AtMost(limit) => v <= limit,
        }
    }
}

// Fields not listed here are never negative.
const THRESHOLDS: &[(&str, Bound)] = &[
    (TEMPERATURE, Bound::Above(99.0)), // °F
    (SPO2, Bound::AtMost(88.0)),       // %
    (RESTING_HR, Bound::Above(5.0)),   // % increase
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Classification {
    pub is_negative: bool,
}

/// Decides whether a cell value lies outside its field's acceptable range.
///
/// Values that fail the numeric check (text, tags, missing, NaN) are never
/// negative.
pub fn classify(field: &str, value: &Value) -> Classification {
    let is_negative = THRESHOLDS
        .iter()
        .find(|(id, _)| *id == field)
        .and_then(|(_, bound)| value.as_number().map(|v| bound.violated_by(v)))
        .unwrap_or(false);
    Classification { is_negative }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{NOTES, TagEntry};
    use proptest::prelude::*;

    fn negative(field: &str, v: f64) -> bool {
        classify(field, &Value::Number(v)).is_negative
    }

    #[test]
    fn thresholds_match_at_the_boundary() {
        assert!(negative(SPO2, 88.0));
        assert!(!negative(SPO2, 89.0));
        assert!(!negative(SPO2, 88.1));
        assert!(!negative(TEMPERATURE, 99.0));
        assert!(negative(TEMPERATURE, 99.1));
        assert!(!negative(RESTING_HR, 5.0));
        assert!(negative(RESTING_HR, 5.1));
    }

    #[test]
    fn non_numeric_values_fail_open() {
        for value in [
            Value::Text("102".into()),
            Value::Missing,
            Value::Number(f64::NAN),
            Value::Tags(vec![TagEntry::new("fever", Some(9.0))]),
        ] {
            assert!(!classify(TEMPERATURE, &value).is_negative, "{value:?}");
        }
    }

    #[test]
    fn unknown_fields_are_never_negative() {
        assert!(!negative(NOTES, 1000.0));
        assert!(!negative("heart_rate", -1.0));
    }

    proptest! {
        #[test]
        fn temperature_is_negative_above_99(v in -50.0f64..200.0) {
            prop_assert_eq!(negative(TEMPERATURE, v), v > 99.0);
        }

        #[test]
        fn spo2_is_negative_at_or_below_88(v in 0.0f64..100.0) {
            prop_assert_eq!(negative(SPO2, v), v <= 88.0);
        }

        #[test]
        fn resting_hr_is_negative_above_5(v in -20.0f64..40.0) {
            prop_assert_eq!(negative(RESTING_HR, v), v > 5.0);
        }

        #[test]
        fn other_fields_never_negative(field in "[a-z_]{1,12}", v in proptest::num::f64::ANY) {
            prop_assume!(![TEMPERATURE, SPO2, RESTING_HR].contains(&field.as_str()));
            prop_assert!(!negative(&field, v));
        }

        #[test]
        fn classification_is_pure(v in 80.0f64..110.0) {
            prop_assert_eq!(
                classify(TEMPERATURE, &Value::Number(v)),
                classify(TEMPERATURE, &Value::Number(v))
            );
        }
    }
}
