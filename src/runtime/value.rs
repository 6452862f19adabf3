use serde::{Deserialize, Serialize};
use std::fmt;

/// A value travelling along a data link at run time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    None,
    Scalar(f64),
    Quantity {
        value: f64,
        units: String,
    },
    Property {
        values: Vec<f64>,
        property_id: String,
        units: String,
    },
    Text(String),
    /// Opaque field data, passed through untouched.
    Field(serde_json::Value),
}

impl Value {
    pub fn quantity(value: f64, units: impl Into<String>) -> Self {
        Value::Quantity {
            value,
            units: units.into(),
        }
    }

    /// The numeric magnitude, if the value has one. Properties yield their first component.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            Value::Quantity { value, .. } => Some(*value),
            Value::Property { values, .. } => values.first().copied(),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "None",
            Value::Scalar(_) => "Scalar",
            Value::Quantity { .. } => "PhysicalQuantity",
            Value::Property { .. } => "Property",
            Value::Text(_) => "String",
            Value::Field(_) => "Field",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Scalar(v) => write!(f, "{}", v),
            Value::Quantity { value, units } => write!(f, "{} {}", value, units),
            Value::Property {
                values,
                property_id,
                units,
            } => write!(f, "{} {:?} {}", property_id, values, units),
            Value::Text(text) => write!(f, "{}", text),
            Value::Field(data) => write!(f, "{}", data),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Scalar(value)
    }
}
