//! Input schema expected by the scoring service, and the manual form state
//! that collects values against it.
//!
//! Allowed values and numeric bounds are enforced here, when a value enters
//! the form. The normalizer trusts whatever the form holds.

use crate::error::PipelineError;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Two-valued choice used for boolean attributes on the form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YesNo {
    Yes,
    No,
}

impl YesNo {
    pub fn as_bool(self) -> bool {
        self == YesNo::Yes
    }
}

impl FromStr for YesNo {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" => Ok(YesNo::Yes),
            "no" => Ok(YesNo::No),
            other => Err(format!("expected Yes or No, got '{}'", other)),
        }
    }
}

impl fmt::Display for YesNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YesNo::Yes => f.write_str("Yes"),
            YesNo::No => f.write_str("No"),
        }
    }
}

/// Collection-point constraint for one attribute
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Categorical {
        options: &'static [&'static str],
        default: usize,
    },
    Integer {
        min: i64,
        max: Option<i64>,
        step: i64,
        default: i64,
    },
    Float {
        min: f64,
        max: f64,
        step: f64,
        default: f64,
    },
    YesNo {
        default: YesNo,
    },
}

/// One attribute of the scoring service's input schema
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn default_value(&self) -> FormValue {
        match self.kind {
            FieldKind::Categorical { options, default } => FormValue::Text(options[default].to_string()),
            FieldKind::Integer { default, .. } => FormValue::Integer(default),
            FieldKind::Float { default, .. } => FormValue::Float(default),
            FieldKind::YesNo { default } => FormValue::Choice(default),
        }
    }

    /// Check a value against this field's allowed values or bounds
    pub fn check(&self, value: &FormValue) -> Result<(), PipelineError> {
        match (self.kind, value) {
            (FieldKind::Categorical { options, .. }, FormValue::Text(text)) => {
                if options.contains(&text.as_str()) {
                    Ok(())
                } else {
                    Err(PipelineError::invalid_field(
                        self.name,
                        format!("value '{}' is not one of {:?}", text, options),
                    ))
                }
            }
            (FieldKind::Integer { min, max, .. }, FormValue::Integer(v)) => {
                let above_max = max.map(|m| *v > m).unwrap_or(false);
                if *v < min || above_max {
                    Err(PipelineError::invalid_field(
                        self.name,
                        format!("value {} is outside [{}, {}]", v, min, fmt_max(max)),
                    ))
                } else {
                    Ok(())
                }
            }
            (FieldKind::Float { min, max, .. }, FormValue::Float(v)) => {
                if (min..=max).contains(v) {
                    Ok(())
                } else {
                    Err(PipelineError::invalid_field(
                        self.name,
                        format!("value {} is outside [{}, {}]", v, min, max),
                    ))
                }
            }
            (FieldKind::YesNo { .. }, FormValue::Choice(_)) => Ok(()),
            (kind, value) => Err(PipelineError::invalid_field(
                self.name,
                format!("value {:?} does not fit field kind {:?}", value, kind),
            )),
        }
    }

    /// Parse a raw string (e.g. from the command line) into this field's value type
    pub fn parse(&self, raw: &str) -> Result<FormValue, PipelineError> {
        let raw = raw.trim();
        let value = match self.kind {
            FieldKind::Categorical { .. } => FormValue::Text(raw.to_string()),
            FieldKind::Integer { .. } => raw
                .parse::<i64>()
                .map(FormValue::Integer)
                .map_err(|e| PipelineError::invalid_field(self.name, format!("'{}': {}", raw, e)))?,
            FieldKind::Float { .. } => raw
                .parse::<f64>()
                .map(FormValue::Float)
                .map_err(|e| PipelineError::invalid_field(self.name, format!("'{}': {}", raw, e)))?,
            FieldKind::YesNo { .. } => raw
                .parse::<YesNo>()
                .map(FormValue::Choice)
                .map_err(|e| PipelineError::invalid_field(self.name, e))?,
        };
        self.check(&value)?;
        Ok(value)
    }
}

fn fmt_max(max: Option<i64>) -> String {
    max.map(|m| m.to_string()).unwrap_or_else(|| "inf".to_string())
}

const fn categorical(name: &'static str, label: &'static str, options: &'static [&'static str], default: usize) -> FieldSpec {
    FieldSpec {
        name,
        label,
        kind: FieldKind::Categorical { options, default },
    }
}

const fn integer(name: &'static str, min: i64, max: Option<i64>, default: i64) -> FieldSpec {
    FieldSpec {
        name,
        label: name,
        kind: FieldKind::Integer {
            min,
            max,
            step: 1,
            default,
        },
    }
}

const fn float(name: &'static str, max: f64, step: f64, default: f64) -> FieldSpec {
    FieldSpec {
        name,
        label: name,
        kind: FieldKind::Float {
            min: 0.0,
            max,
            step,
            default,
        },
    }
}

const fn yes_no(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        label: name,
        kind: FieldKind::YesNo { default: YesNo::Yes },
    }
}

/// Every attribute the scoring service requires, in wire order
pub static FIELD_SPECS: [FieldSpec; 21] = [
    categorical("device_os", "Device OS", &["windows", "other", "linux", "macintosh", "x11"], 2),
    categorical("source", "Source", &["INTERNET", "TELEAPP"], 0),
    categorical("housing_status", "Housing Status", &["BA", "BB", "BC", "BD", "BE", "BF", "BG"], 0),
    categorical("employment_status", "Employment Status", &["CA", "CB", "CC", "CD", "CE", "CF", "CG"], 0),
    categorical("payment_type", "Payment type", &["AA", "AB", "AC", "AD", "AE"], 0),
    integer("date_of_birth_distinct_emails_4w", 0, None, 0),
    float("name_email_similarity", 1.0, 0.0001, 0.0),
    integer("credit_risk_score", -1000, Some(1000), 1),
    integer("customer_age", 1, Some(100), 18),
    integer("month", 0, Some(7), 1),
    integer("has_other_cards", 0, Some(1), 0),
    integer("proposed_credit_limit", 0, Some(1_000_000), 1),
    integer("prev_address_months_count", 0, Some(1000), 0),
    integer("zip_count_4w", 1, Some(10_000), 1),
    float("income", 1.0, 0.1, 0.1),
    integer("device_distinct_emails_8w", 0, Some(10), 0),
    integer("bank_months_count", 0, Some(1200), 0),
    yes_no("phone_home_valid"),
    yes_no("foreign_request"),
    yes_no("keep_alive_session"),
    yes_no("email_is_free"),
];

/// Look up a field by its wire name
pub fn field_spec(name: &str) -> Option<&'static FieldSpec> {
    FIELD_SPECS.iter().find(|spec| spec.name == name)
}

/// Required attribute names, in wire order
pub fn required_fields() -> impl Iterator<Item = &'static str> {
    FIELD_SPECS.iter().map(|spec| spec.name)
}

/// A value as collected by the manual form
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Choice(YesNo),
}

impl fmt::Display for FormValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormValue::Text(v) => write!(f, "{}", v),
            FormValue::Integer(v) => write!(f, "{}", v),
            FormValue::Float(v) => write!(f, "{}", v),
            FormValue::Choice(v) => write!(f, "{}", v),
        }
    }
}

/// Manual-entry form state: field name to collected value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormState {
    values: HashMap<String, FormValue>,
}

impl FormState {
    /// An empty form; nothing collected yet
    pub fn new() -> Self {
        Self::default()
    }

    /// The form as first shown to the user, every field at its default
    pub fn with_defaults() -> Self {
        let values = FIELD_SPECS
            .iter()
            .map(|spec| (spec.name.to_string(), spec.default_value()))
            .collect();
        Self { values }
    }

    /// Collect a value, rejecting unknown fields and values outside the field's constraint
    pub fn set(&mut self, name: &str, value: FormValue) -> Result<(), PipelineError> {
        let spec = field_spec(name)
            .ok_or_else(|| PipelineError::invalid_field(name, "is not part of the input schema"))?;
        spec.check(&value)?;
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Collect a value from its string form
    pub fn set_raw(&mut self, name: &str, raw: &str) -> Result<(), PipelineError> {
        let spec = field_spec(name)
            .ok_or_else(|| PipelineError::invalid_field(name, "is not part of the input schema"))?;
        let value = spec.parse(raw)?;
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<FormValue> {
        self.values.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Collected values in schema order, for the input summary table
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        FIELD_SPECS
            .iter()
            .filter_map(|spec| self.values.get(spec.name).map(|v| (spec.label, v.to_string())))
            .collect()
    }
}
