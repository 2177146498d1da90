use crate::schema::{FieldDescriptor, FieldRules, FieldType};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Per-field error messages for a submission, in schema order.
/// Fields without an entry are valid; an empty set means the submission is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    entries: Vec<(String, String)>,
}

impl ValidationErrors {
    pub fn is_ok(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The message recorded for a field, if it failed
    pub fn get(&self, field_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(id, _)| id == field_id)
            .map(|(_, message)| message.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(id, msg)| (id.as_str(), msg.as_str()))
    }

    fn insert(&mut self, field_id: &str, message: String) {
        self.entries.push((field_id.to_string(), message));
    }
}

impl Serialize for ValidationErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, message) in &self.entries {
            map.serialize_entry(id, message)?;
        }
        map.end()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (id, message)) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{id}: {message}")?;
        }
        Ok(())
    }
}

/// Validate every field of the schema against a submission payload.
/// Keys in `data` that the schema does not declare are ignored.
pub fn validate_submission(fields: &[FieldDescriptor], data: &Map<String, Value>) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    for field in fields {
        if let Some(message) = validate_field(field, data.get(&field.id)) {
            errors.insert(&field.id, message);
        }
    }

    errors
}

/// Validate a single value against its field descriptor.
/// `None` means the key was absent from the payload. Returns the first
/// failing rule's message, or `None` when the value is valid.
pub fn validate_field(field: &FieldDescriptor, value: Option<&Value>) -> Option<String> {
    let label = &field.label;

    if field.required {
        if is_blank(value) {
            return Some(format!("{label} is required"));
        }
        if field.field_type == FieldType::MultiSelect
            && !matches!(value, Some(Value::Array(items)) if !items.is_empty())
        {
            return Some(format!("{label} is required"));
        }
    }

    // Optional and left empty: nothing else to check
    let value = match value {
        Some(v) if !is_blank(Some(v)) => v,
        _ => return None,
    };

    let unset = FieldRules::default();
    let rules = field.validation.as_ref().unwrap_or(&unset);

    match field.field_type {
        FieldType::Text | FieldType::Textarea => check_text(label, rules, value),
        FieldType::Number => check_number(label, rules, value),
        FieldType::Date => check_date(label, rules, value),
        FieldType::MultiSelect => check_selection(label, rules, value),
        // No domain check against `options`
        FieldType::Select | FieldType::Switch => None,
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

fn check_text(label: &str, rules: &FieldRules, value: &Value) -> Option<String> {
    let text = coerce_string(value);
    let len = text.chars().count();

    // A zero length bound counts as unset
    if let Some(min) = rules.min_length.filter(|n| *n > 0) {
        if len < min {
            return Some(format!("{label} must be at least {min} characters"));
        }
    }

    if let Some(max) = rules.max_length.filter(|n| *n > 0) {
        if len > max {
            return Some(format!("{label} must not exceed {max} characters"));
        }
    }

    if let Some(pattern) = &rules.regex {
        if !pattern.is_match(&text) {
            return Some(format!("{label} format is invalid"));
        }
    }

    None
}

fn check_number(label: &str, rules: &FieldRules, value: &Value) -> Option<String> {
    let number = match coerce_number(value) {
        Some(n) => n,
        None => return Some(format!("{label} must be a valid number")),
    };

    if let Some(min) = &rules.min {
        if min.as_f64().is_some_and(|m| number < m) {
            return Some(format!("{label} must be at least {min}"));
        }
    }

    if let Some(max) = &rules.max {
        if max.as_f64().is_some_and(|m| number > m) {
            return Some(format!("{label} must not exceed {max}"));
        }
    }

    None
}

fn check_date(label: &str, rules: &FieldRules, value: &Value) -> Option<String> {
    let date = match parse_date(value) {
        Some(d) => d,
        None => return Some(format!("{label} must be a valid date")),
    };

    if let Some(min_date) = &rules.min_date {
        let min = parse_date(&Value::String(min_date.clone()));
        if min.is_some_and(|m| date < m) {
            return Some(format!("{label} must be on or after {min_date}"));
        }
    }

    None
}

fn check_selection(label: &str, rules: &FieldRules, value: &Value) -> Option<String> {
    let items = match value.as_array() {
        Some(items) => items,
        None => return Some(format!("{label} must be an array")),
    };

    if let Some(min) = rules.min_selected.filter(|n| *n > 0) {
        if items.len() < min {
            return Some(format!("{label} must have at least {min} selection(s)"));
        }
    }

    if let Some(max) = rules.max_selected.filter(|n| *n > 0) {
        if items.len() > max {
            return Some(format!("{label} must not exceed {max} selection(s)"));
        }
    }

    None
}

/// Text form of a value as a browser form would render it
fn coerce_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{f:.0}"),
            _ => n.to_string(),
        },
        Value::Array(items) => items
            .iter()
            .map(coerce_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Null => Some(0.0),
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Some(0.0);
            }
            parse_numeric(trimmed)
        }
        Value::Array(items) => match items.as_slice() {
            [] => Some(0.0),
            [only] => coerce_number(&Value::String(coerce_string(only))),
            _ => None,
        },
        Value::Object(_) => None,
    }
}

/// Numeric text as a form value: decimal with optional exponent, `Infinity`,
/// or an unsigned `0x`/`0o`/`0b` integer literal.
fn parse_numeric(s: &str) -> Option<f64> {
    const RADIX_PREFIXES: [(&str, u32); 6] =
        [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)];

    for (prefix, radix) in RADIX_PREFIXES {
        if let Some(digits) = s.strip_prefix(prefix) {
            if digits.is_empty() {
                return None;
            }
            return digits.chars().try_fold(0f64, |acc, c| {
                c.to_digit(radix).map(|d| acc * f64::from(radix) + f64::from(d))
            });
        }
    }

    match s {
        "Infinity" | "+Infinity" => return Some(f64::INFINITY),
        "-Infinity" => return Some(f64::NEG_INFINITY),
        _ => {}
    }

    // `str::parse` also takes "inf" and "nan" spellings
    if s.bytes().any(|b| b.is_ascii_alphabetic() && !matches!(b, b'e' | b'E')) {
        return None;
    }
    s.parse::<f64>().ok()
}

/// Parse a date value. Accepts `YYYY-MM-DD` (midnight UTC), RFC 3339
/// timestamps, zone-less `YYYY-MM-DDTHH:MM[:SS]` (read as UTC) and epoch
/// milliseconds. Booleans count as millisecond 0 or 1.
pub(crate) fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
            }
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|naive| Utc.from_utc_datetime(&naive))
        }
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| {
                n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)
            })?;
            Utc.timestamp_millis_opt(millis).single()
        }
        Value::Bool(b) => Utc.timestamp_millis_opt(i64::from(*b)).single(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{parse_schema_str, FormSchema};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn field(yaml: &str) -> FieldDescriptor {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn check(field: &FieldDescriptor, value: Value) -> Option<String> {
        validate_field(field, Some(&value))
    }

    fn valid_payload() -> Map<String, Value> {
        json!({
            "email": "a@b.com",
            "fullName": "A B",
            "age": 20,
            "department": "Engineering",
            "skills": ["SQL"],
            "startDate": "2024-02-01",
            "agreeToTerms": true
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn test_required_rejects_absent_null_and_empty() {
        let schema = FormSchema::builtin().unwrap();
        for f in schema.fields.iter().filter(|f| f.required) {
            let expected = Some(format!("{} is required", f.label));
            assert_eq!(validate_field(f, None), expected);
            assert_eq!(check(f, Value::Null), expected);
            assert_eq!(check(f, json!("")), expected);
        }
    }

    #[test]
    fn test_optional_absent_skips_other_rules() {
        let f = field("{ id: code, type: text, label: Code, validation: { minLength: 5, regex: '^x' } }");
        assert_eq!(validate_field(&f, None), None);
        assert_eq!(check(&f, Value::Null), None);
        assert_eq!(check(&f, json!("")), None);
        assert_eq!(check(&f, json!("ab")), Some("Code must be at least 5 characters".into()));
    }

    #[test]
    fn test_text_length_bounds_inclusive() {
        let f = field("{ id: name, type: text, label: Name, required: true, validation: { minLength: 2, maxLength: 4 } }");
        assert_eq!(check(&f, json!("A")), Some("Name must be at least 2 characters".into()));
        assert_eq!(check(&f, json!("AB")), None);
        assert_eq!(check(&f, json!("ABCD")), None);
        assert_eq!(check(&f, json!("ABCDE")), Some("Name must not exceed 4 characters".into()));
    }

    #[test]
    fn test_text_length_counts_characters() {
        let f = field("{ id: name, type: text, label: Name, validation: { maxLength: 3 } }");
        assert_eq!(check(&f, json!("äöü")), None);
    }

    #[test]
    fn test_text_coerces_non_strings() {
        let f = field("{ id: code, type: textarea, label: Code, validation: { minLength: 3 } }");
        assert_eq!(check(&f, json!(12)), Some("Code must be at least 3 characters".into()));
        assert_eq!(check(&f, json!(123)), None);
        assert_eq!(check(&f, json!(true)), None);
    }

    #[test]
    fn test_regex_format() {
        let schema = FormSchema::builtin().unwrap();
        let email = schema.field("email").unwrap();
        assert_eq!(check(email, json!("bad")), Some("Email Address format is invalid".into()));
        assert_eq!(check(email, json!("a b@c.d")), Some("Email Address format is invalid".into()));
        assert_eq!(check(email, json!("a@b.com")), None);
    }

    #[test]
    fn test_number_bounds_inclusive() {
        let schema = FormSchema::builtin().unwrap();
        let age = schema.field("age").unwrap();
        assert_eq!(check(age, json!(18)), None);
        assert_eq!(check(age, json!(100)), None);
        assert_eq!(check(age, json!(17)), Some("Age must be at least 18".into()));
        assert_eq!(check(age, json!(101)), Some("Age must not exceed 100".into()));
        assert_eq!(check(age, json!(17.5)), Some("Age must be at least 18".into()));
    }

    #[test]
    fn test_number_coercion() {
        let schema = FormSchema::builtin().unwrap();
        let age = schema.field("age").unwrap();
        assert_eq!(check(age, json!("42")), None);
        assert_eq!(check(age, json!(" 42 ")), None);
        assert_eq!(check(age, json!("forty")), Some("Age must be a valid number".into()));
        assert_eq!(check(age, json!({"n": 1})), Some("Age must be a valid number".into()));
        assert_eq!(check(age, json!([30])), None);
        assert_eq!(check(age, json!([30, 40])), Some("Age must be a valid number".into()));
    }

    #[test]
    fn test_number_literal_forms() {
        let schema = FormSchema::builtin().unwrap();
        let age = schema.field("age").unwrap();
        assert_eq!(check(age, json!("0x1A")), None);
        assert_eq!(check(age, json!("0b11111")), None);
        assert_eq!(check(age, json!("2.5e1")), None);
        assert_eq!(check(age, json!("Infinity")), Some("Age must not exceed 100".into()));
        assert_eq!(check(age, json!("-Infinity")), Some("Age must be at least 18".into()));
        assert_eq!(check(age, json!("inf")), Some("Age must be a valid number".into()));
        assert_eq!(check(age, json!("NaN")), Some("Age must be a valid number".into()));
        assert_eq!(check(age, json!("0x")), Some("Age must be a valid number".into()));
        assert_eq!(check(age, json!("-0x1A")), Some("Age must be a valid number".into()));
    }

    #[test]
    fn test_number_without_rules_still_checks_type() {
        let f = field("{ id: qty, type: number, label: Quantity }");
        assert_eq!(check(&f, json!("abc")), Some("Quantity must be a valid number".into()));
        assert_eq!(check(&f, json!(-3)), None);
    }

    #[test]
    fn test_date_rules() {
        let schema = FormSchema::builtin().unwrap();
        let start = schema.field("startDate").unwrap();
        assert_eq!(check(start, json!("2024-01-01")), None);
        assert_eq!(check(start, json!("2024-02-01")), None);
        assert_eq!(check(start, json!("2024-03-05T09:30:00Z")), None);
        assert_eq!(
            check(start, json!("2023-12-31")),
            Some("Start Date must be on or after 2024-01-01".into())
        );
        assert_eq!(check(start, json!("not a date")), Some("Start Date must be a valid date".into()));
        assert_eq!(check(start, json!([1])), Some("Start Date must be a valid date".into()));
    }

    #[test]
    fn test_date_reads_booleans_as_epoch_millis() {
        let schema = FormSchema::builtin().unwrap();
        let start = schema.field("startDate").unwrap();
        assert_eq!(
            check(start, json!(true)),
            Some("Start Date must be on or after 2024-01-01".into())
        );

        let f = field("{ id: at, type: date, label: At }");
        assert_eq!(check(&f, json!(false)), None);
    }

    #[test]
    fn test_date_accepts_epoch_millis() {
        let f = field("{ id: at, type: date, label: At, validation: { minDate: '2024-01-01' } }");
        // 2024-06-01T00:00:00Z
        assert_eq!(check(&f, json!(1_717_200_000_000i64)), None);
        // 2001-09-09T01:46:40Z
        assert_eq!(check(&f, json!(1_000_000_000_000i64)), Some("At must be on or after 2024-01-01".into()));
    }

    #[test]
    fn test_multi_select_counts() {
        let schema = FormSchema::builtin().unwrap();
        let skills = schema.field("skills").unwrap();
        assert_eq!(check(skills, json!([])), Some("Skills is required".into()));
        assert_eq!(check(skills, json!("SQL")), Some("Skills is required".into()));
        assert_eq!(check(skills, json!(["SQL"])), None);
        assert_eq!(check(skills, json!(["a", "b", "c", "d", "e"])), None);
        assert_eq!(
            check(skills, json!(["a", "b", "c", "d", "e", "f"])),
            Some("Skills must not exceed 5 selection(s)".into())
        );
    }

    #[test]
    fn test_optional_multi_select_requires_array() {
        let f = field("{ id: tags, type: multi-select, label: Tags, validation: { minSelected: 2 } }");
        assert_eq!(check(&f, json!("x")), Some("Tags must be an array".into()));
        assert_eq!(check(&f, json!(["x"])), Some("Tags must have at least 2 selection(s)".into()));
        assert_eq!(check(&f, json!([])), Some("Tags must have at least 2 selection(s)".into()));
    }

    #[test]
    fn test_select_and_switch_accept_any_present_value() {
        let schema = FormSchema::builtin().unwrap();
        let department = schema.field("department").unwrap();
        assert_eq!(check(department, json!("Astronomy")), None);
        let terms = schema.field("agreeToTerms").unwrap();
        assert_eq!(check(terms, json!(false)), None);
    }

    #[test]
    fn test_valid_submission_has_no_errors() {
        let schema = FormSchema::builtin().unwrap();
        let errors = validate_submission(&schema.fields, &valid_payload());
        assert!(errors.is_ok(), "Errors: {errors}");
    }

    #[test]
    fn test_errors_follow_schema_order() {
        let schema = FormSchema::builtin().unwrap();
        let data = json!({ "email": "bad", "bio": "" }).as_object().cloned().unwrap();
        let errors = validate_submission(&schema.fields, &data);

        let ids: Vec<&str> = errors.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, ["fullName", "email", "age", "department", "skills", "startDate", "agreeToTerms"]);
        assert_eq!(errors.get("email"), Some("Email Address format is invalid"));
        assert_eq!(errors.get("bio"), None);

        let json = serde_json::to_string(&errors).unwrap();
        assert!(json.starts_with(r#"{"fullName":"Full Name is required","email":"#));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let schema = parse_schema_str("title: T\nfields:\n  - { id: a, type: text, label: A }\n").unwrap();
        let data = json!({ "zzz": 1 }).as_object().cloned().unwrap();
        assert!(validate_submission(&schema.fields, &data).is_empty());
    }
}
