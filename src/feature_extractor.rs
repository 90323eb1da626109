//! Form input collection and feature vector assembly.
//!
//! The collector turns raw form strings into typed numbers, one per schema
//! field. The assembler lays those numbers out in the exact column order the
//! model was trained on and checks the arity before anything reaches the
//! model.

use crate::error::{PredictError, Result};
use crate::types::schema::{BoundsPolicy, FeatureSchema, FieldKind, FieldSpec};
use std::collections::HashMap;
use tracing::debug;

/// Collects and coerces form values according to a feature schema.
#[derive(Debug, Clone)]
pub struct InputCollector {
    schema: FeatureSchema,
    policy: BoundsPolicy,
}

impl InputCollector {
    pub fn new(schema: FeatureSchema, policy: BoundsPolicy) -> Self {
        Self { schema, policy }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Collect one value per schema field from the submitted form.
    ///
    /// Absent or blank fields take their declared default unless marked
    /// required. Fields not in the schema are ignored.
    pub fn collect(&self, form: &HashMap<String, String>) -> Result<HashMap<String, f64>> {
        let mut values = HashMap::with_capacity(self.schema.len());

        for field in self.schema.fields() {
            let raw = form.get(&field.name).map(|s| s.trim()).filter(|s| !s.is_empty());
            let value = match raw {
                Some(raw) => self.coerce(field, raw)?,
                None if field.required => {
                    return Err(PredictError::invalid(&field.name, "missing required field"))
                }
                None => field.default,
            };
            values.insert(field.name.clone(), value);
        }

        let ignored = form
            .keys()
            .filter(|k| !values.contains_key(k.as_str()))
            .count();
        if ignored > 0 {
            debug!(ignored = ignored, "Ignoring form fields outside the schema");
        }

        Ok(values)
    }

    fn coerce(&self, field: &FieldSpec, raw: &str) -> Result<f64> {
        let value: f64 = raw
            .parse()
            .map_err(|_| PredictError::invalid(&field.name, format!("'{}' is not a number", raw)))?;

        if !value.is_finite() {
            return Err(PredictError::invalid(&field.name, "value must be finite"));
        }
        if field.kind == FieldKind::Integer && value.fract() != 0.0 {
            return Err(PredictError::invalid(
                &field.name,
                format!("'{}' is not an integer", raw),
            ));
        }

        if field.within_bounds(value) {
            return Ok(value);
        }
        match self.policy {
            BoundsPolicy::Clamp => Ok(field.clamp(value)),
            BoundsPolicy::Reject => Err(PredictError::invalid(
                &field.name,
                format!(
                    "{} is outside [{}, {}]",
                    value,
                    field.min.map_or("-inf".to_string(), |v| v.to_string()),
                    field.max.map_or("inf".to_string(), |v| v.to_string()),
                ),
            )),
        }
    }
}

/// Arranges collected values into the model's column order.
#[derive(Debug, Clone)]
pub struct FeatureAssembler {
    order: Vec<String>,
    expected: Option<usize>,
}

impl FeatureAssembler {
    /// `expected` is the arity the model artifact declares, if it declares one.
    pub fn new(schema: &FeatureSchema, expected: Option<usize>) -> Self {
        Self {
            order: schema.names().into_iter().map(String::from).collect(),
            expected,
        }
    }

    pub fn feature_count(&self) -> usize {
        self.order.len()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.order
    }

    /// Build the feature vector in schema order.
    pub fn assemble(&self, values: &HashMap<String, f64>) -> Result<Vec<f64>> {
        let features = self
            .order
            .iter()
            .map(|name| {
                values
                    .get(name)
                    .copied()
                    .ok_or_else(|| PredictError::invalid(name, "no value collected"))
            })
            .collect::<Result<Vec<f64>>>()?;

        self.check_arity(&features)?;
        Ok(features)
    }

    /// Fail before invocation when the vector cannot match the model.
    pub fn check_arity(&self, features: &[f64]) -> Result<()> {
        let expected = self.expected.unwrap_or(self.order.len());
        if features.len() != expected {
            return Err(PredictError::SchemaMismatch {
                expected,
                actual: features.len(),
            });
        }
        Ok(())
    }
}
