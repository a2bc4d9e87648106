use std::collections::BTreeMap;
use tracing::warn;

use crate::error::ValidationError;
use crate::models::{ParameterField, ParameterSet};

/// Raw text for the four parameters. Nothing is checked until submission.
#[derive(Clone, Debug, Default)]
pub struct ParameterForm {
    values: BTreeMap<ParameterField, String>,
}

impl ParameterForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_field(&mut self, field: ParameterField, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }

    pub fn set_field_by_name(
        &mut self,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), ValidationError> {
        let field = name.parse::<ParameterField>()?;
        self.set_field(field, value);
        Ok(())
    }

    pub fn clear_field(&mut self, field: ParameterField) {
        self.values.remove(&field);
    }

    pub fn get(&self, field: ParameterField) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    fn is_present(&self, field: ParameterField) -> bool {
        self.get(field).is_some_and(|value| !value.is_empty())
    }

    pub fn missing_fields(&self) -> Vec<ParameterField> {
        ParameterField::ALL
            .into_iter()
            .filter(|field| !self.is_present(*field))
            .collect()
    }

    /// Presence check only; `"0"` counts as present.
    pub fn validate_complete(&self) -> Result<(), ValidationError> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::MissingParameters { missing })
        }
    }

    /// Coerces every field, sending unparseable text as `null`.
    pub fn coerce(&self) -> ParameterSet {
        let mut set = ParameterSet::default();
        for field in ParameterField::ALL {
            let raw = self.get(field).unwrap_or_default();
            let value = coerce_number(raw);
            if value.is_none() {
                warn!("[params] {}={:?} is not a number, sending null", field, raw);
            }
            set.set(field, value);
        }
        set
    }

    /// Like [`coerce`](Self::coerce) but rejects text that is not a finite number.
    pub fn coerce_strict(&self) -> Result<ParameterSet, ValidationError> {
        let mut set = ParameterSet::default();
        for field in ParameterField::ALL {
            let raw = self.get(field).unwrap_or_default();
            let value = coerce_number(raw).ok_or_else(|| ValidationError::NotNumeric {
                field,
                value: raw.to_string(),
            })?;
            set.set(field, Some(value));
        }
        Ok(set)
    }
}

/// Locale-independent number parse. Blank text is 0, non-finite is `None`.
/// Unsigned `0x`, `0o` and `0b` literals are read in their radix.
pub fn coerce_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    if let Some(value) = parse_prefixed(trimmed) {
        return value;
    }
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// `None` when `text` has no radix prefix, `Some(None)` when the digits are bad.
fn parse_prefixed(text: &str) -> Option<Option<f64>> {
    let radix = match text.get(..2)? {
        "0x" | "0X" => 16,
        "0o" | "0O" => 8,
        "0b" | "0B" => 2,
        _ => return None,
    };
    let digits = &text[2..];
    if digits.is_empty() {
        return Some(None);
    }
    Some(digits.chars().try_fold(0.0_f64, |acc, c| {
        c.to_digit(radix)
            .map(|digit| acc * f64::from(radix) + f64::from(digit))
    }))
}
