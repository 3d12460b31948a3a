//! Canonical record and request payload structures sent to the scoring service

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Normalized attribute mapping matching the scoring service's input schema.
///
/// Attribute order is insertion order and is kept on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalRecord(Map<String, Value>);

impl CanonicalRecord {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Insert an attribute, keeping its first insertion position
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Attribute names in wire order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl From<Map<String, Value>> for CanonicalRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Ordered batch of records submitted in one scoring call: `{"data": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestPayload {
    pub data: Vec<CanonicalRecord>,
}

impl RequestPayload {
    pub fn new(data: Vec<CanonicalRecord>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Exact wire bytes of the payload. The cache keys on these same bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PipelineError> {
        serde_json::to_vec(self)
            .map_err(|e| PipelineError::Protocol(format!("failed to serialize payload: {}", e)))
    }
}

/// Position-aligned probabilities returned for a [`RequestPayload`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    probabilities: Vec<f64>,
}

impl PredictionResult {
    pub fn new(probabilities: Vec<f64>) -> Self {
        Self { probabilities }
    }

    /// Extract the `probability` array from a raw response body.
    ///
    /// The array must hold exactly `expected` numbers; anything else is a
    /// protocol error (no truncation or padding).
    pub fn from_response_body(body: &[u8], expected: usize) -> Result<Self, PipelineError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| PipelineError::Protocol(format!("response is not valid JSON: {}", e)))?;

        let field = value
            .get("probability")
            .ok_or_else(|| PipelineError::Protocol("response has no 'probability' field".into()))?;

        let items = field.as_array().ok_or_else(|| {
            PipelineError::Protocol(format!("'probability' is not an array: {}", field))
        })?;

        if items.len() != expected {
            return Err(PipelineError::Protocol(format!(
                "'probability' has {} entries, expected {}",
                items.len(),
                expected
            )));
        }

        let probabilities = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                item.as_f64().ok_or_else(|| {
                    PipelineError::Protocol(format!("'probability[{}]' is not a number: {}", i, item))
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;

        Ok(Self { probabilities })
    }

    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }

    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.probabilities
    }
}
