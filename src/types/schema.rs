//! Feature schema: the ordered, typed inputs a model was fit on

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Numeric type of a form field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Integer,
    #[default]
    Float,
}

/// What to do with a value outside a field's bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BoundsPolicy {
    #[default]
    Reject,
    Clamp,
}

/// One named model input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Column name the model was trained with (also the form key)
    pub name: String,
    /// Human-readable label for the form; falls back to `name`
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub kind: FieldKind,
    /// Value used when the form omits the field
    #[serde(default)]
    pub default: f64,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    /// Reject the request instead of applying the default
    #[serde(default)]
    pub required: bool,
    /// Input step for integer fields; float inputs always accept any value
    #[serde(default)]
    pub step: Option<f64>,
}

impl FieldSpec {
    pub fn float(name: &str) -> Self {
        Self {
            name: name.to_string(),
            label: None,
            kind: FieldKind::Float,
            default: 0.0,
            min: None,
            max: None,
            required: false,
            step: None,
        }
    }

    pub fn integer(name: &str) -> Self {
        Self {
            kind: FieldKind::Integer,
            ..Self::float(name)
        }
    }

    pub fn with_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_default(mut self, default: f64) -> Self {
        self.default = default;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    pub fn within_bounds(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }

    pub fn clamp(&self, value: f64) -> f64 {
        let value = self.min.map_or(value, |min| value.max(min));
        self.max.map_or(value, |max| value.min(max))
    }

    /// Check the field definition itself is coherent
    pub fn check(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("field name must not be empty".to_string());
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(format!("field '{}': min {} exceeds max {}", self.name, min, max));
            }
        }
        if !self.default.is_finite() {
            return Err(format!("field '{}': default must be finite", self.name));
        }
        if self.kind == FieldKind::Integer && self.default.fract() != 0.0 {
            return Err(format!(
                "field '{}': integer field has fractional default {}",
                self.name, self.default
            ));
        }
        if !self.required && !self.within_bounds(self.default) {
            return Err(format!(
                "field '{}': default {} is outside its bounds",
                self.name, self.default
            ));
        }
        Ok(())
    }
}

/// Ordered field list matching the model's column order
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct FeatureSchema {
    fields: Vec<FieldSpec>,
}

impl FeatureSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.fields.is_empty() {
            return Err("schema has no fields".to_string());
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            field.check()?;
            if !seen.insert(field.name.as_str()) {
                return Err(format!("duplicate field '{}'", field.name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_and_clamp() {
        let field = FieldSpec::integer("color").with_bounds(Some(0.0), Some(10.0));
        assert!(field.within_bounds(0.0));
        assert!(field.within_bounds(10.0));
        assert!(!field.within_bounds(11.0));
        assert_eq!(field.clamp(-3.0), 0.0);
        assert_eq!(field.clamp(42.0), 10.0);
        assert_eq!(field.clamp(4.0), 4.0);

        let open = FieldSpec::float("budget");
        assert!(open.within_bounds(-1e12));
        assert_eq!(open.clamp(7.5), 7.5);
    }

    #[test]
    fn test_schema_validation() {
        let schema = FeatureSchema::new(vec![FieldSpec::float("a"), FieldSpec::float("a")]);
        assert!(schema.validate().unwrap_err().contains("duplicate"));

        let schema = FeatureSchema::new(vec![
            FieldSpec::float("a").with_bounds(Some(2.0), Some(1.0))
        ]);
        assert!(schema.validate().is_err());

        let schema = FeatureSchema::new(vec![FieldSpec::integer("n").with_default(0.5)]);
        assert!(schema.validate().is_err());

        let schema = FeatureSchema::new(vec![
            FieldSpec::integer("flag").with_bounds(Some(0.0), Some(1.0)).with_default(3.0),
        ]);
        assert!(schema.validate().is_err());

        assert!(FeatureSchema::default().validate().is_err());
    }

    #[test]
    fn test_schema_deserializes_in_order() {
        let schema: FeatureSchema = serde_json::from_str(
            r#"[{"name": "Balance"}, {"name": "Tenure", "kind": "integer", "label": "Tenure (months)"}]"#,
        )
        .unwrap();
        assert_eq!(schema.names(), vec!["Balance", "Tenure"]);
        assert_eq!(schema.fields()[1].kind, FieldKind::Integer);
        assert_eq!(schema.fields()[1].display_label(), "Tenure (months)");
        assert_eq!(schema.fields()[0].display_label(), "Balance");
        assert!(schema.validate().is_ok());
    }
}
