//! Record normalization for scoring requests.
//!
//! The manual form and the batch upload collect data differently but both
//! end up as [`CanonicalRecord`]s with the attribute names the scoring
//! service expects. Anything that can produce such records implements
//! [`RecordSource`].

use crate::error::PipelineError;
use crate::schema::{required_fields, FormState, FormValue, FIELD_SPECS};
use crate::types::record::CanonicalRecord;
use serde_json::{Map, Value};

/// A producer of canonical records, one per scored applicant
pub trait RecordSource {
    /// Produce the records in submission order
    fn records(&self) -> Result<Vec<CanonicalRecord>, PipelineError>;
}

/// Convert a manual form into one record.
///
/// Values are not re-validated here: allowed values and bounds are the
/// form's concern. Yes/No choices become booleans.
pub fn normalize_form(form: &FormState) -> Result<CanonicalRecord, PipelineError> {
    let mut record = CanonicalRecord::new();

    for spec in FIELD_SPECS.iter() {
        let value = form
            .get(spec.name)
            .ok_or_else(|| PipelineError::missing_field(spec.name))?;

        let value = match value {
            FormValue::Text(text) => Value::from(text.as_str()),
            FormValue::Integer(v) => Value::from(*v),
            FormValue::Float(v) => Value::from(*v),
            FormValue::Choice(choice) => Value::Bool(choice.as_bool()),
        };
        record.insert(spec.name, value);
    }

    Ok(record)
}

/// Convert one parsed tabular row into a record.
///
/// The row keeps its own column order and any extra columns; only the
/// presence of every required attribute is checked.
pub fn normalize_row(row: &Map<String, Value>) -> Result<CanonicalRecord, PipelineError> {
    if let Some(missing) = required_fields().find(|name| !row.contains_key(*name)) {
        return Err(PipelineError::missing_field(missing));
    }
    Ok(CanonicalRecord::from(row.clone()))
}

impl RecordSource for FormState {
    fn records(&self) -> Result<Vec<CanonicalRecord>, PipelineError> {
        Ok(vec![normalize_form(self)?])
    }
}

impl RecordSource for CanonicalRecord {
    fn records(&self) -> Result<Vec<CanonicalRecord>, PipelineError> {
        Ok(vec![self.clone()])
    }
}
