mod parser;
mod types;

pub use parser::{parse_schema, parse_schema_str};
pub use types::{FieldDescriptor, FieldRules, FieldType, FormSchema, Pattern};

use crate::error::{FormDbError, Result};
use crate::validation::parse_date;
use std::collections::HashSet;

const BUILTIN_SCHEMA: &str = include_str!("../../schema/employee_onboarding.yaml");

impl FormSchema {
    /// The default "Employee Onboarding Form" shipped with the library.
    pub fn builtin() -> Result<Self> {
        parse_schema_str(BUILTIN_SCHEMA)
    }

    /// Look up a field by id
    pub fn field(&self, id: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Structural checks that serde cannot express: unique non-empty ids,
    /// parseable dates and bounds that are not inverted.
    pub fn check(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for field in &self.fields {
            if field.id.is_empty() {
                return Err(FormDbError::Schema(format!(
                    "Field '{}' has an empty id",
                    field.label
                )));
            }
            if !seen.insert(field.id.as_str()) {
                return Err(FormDbError::Schema(format!(
                    "Duplicate field id '{}'",
                    field.id
                )));
            }

            if matches!(field.field_type, FieldType::Select | FieldType::MultiSelect)
                && field.options.is_empty()
            {
                log::warn!("Field '{}' is a {} with no options", field.id, field.field_type.as_str());
            }

            if let Some(rules) = &field.validation {
                check_rules(&field.id, rules)?;
            }
        }

        Ok(())
    }
}

fn check_rules(id: &str, rules: &FieldRules) -> Result<()> {
    if let (Some(min), Some(max)) = (rules.min_length, rules.max_length) {
        if min > max {
            return Err(FormDbError::Schema(format!(
                "Field '{id}': minLength {min} exceeds maxLength {max}"
            )));
        }
    }

    if let (Some(min), Some(max)) = (&rules.min, &rules.max) {
        if let (Some(lo), Some(hi)) = (min.as_f64(), max.as_f64()) {
            if lo > hi {
                return Err(FormDbError::Schema(format!(
                    "Field '{id}': min {min} exceeds max {max}"
                )));
            }
        }
    }

    if let (Some(min), Some(max)) = (rules.min_selected, rules.max_selected) {
        if min > max {
            return Err(FormDbError::Schema(format!(
                "Field '{id}': minSelected {min} exceeds maxSelected {max}"
            )));
        }
    }

    if let Some(min_date) = &rules.min_date {
        if parse_date(&serde_json::Value::String(min_date.clone())).is_none() {
            return Err(FormDbError::Schema(format!(
                "Field '{id}': minDate '{min_date}' is not a valid date"
            )));
        }
    }

    Ok(())
}
