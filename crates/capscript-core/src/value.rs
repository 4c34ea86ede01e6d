//! The script-side value model.
//!
//! Script runtimes are dynamically typed; at the native boundary every value
//! is narrowed into [`ScriptValue`], a closed tagged union. JSON is the
//! canonical intermediate representation for structured data, so the union
//! converts losslessly to and from [`serde_json::Value`] (modulo `undefined`,
//! which JSON cannot represent).

use std::collections::BTreeMap;

use crate::marshal::MarshalError;

/// A value exchanged between script code and native capabilities.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    /// The script runtime's `undefined`.
    Undefined,
    /// The script runtime's `null`.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// String value.
    String(String),
    /// Ordered sequence of values.
    Array(Vec<ScriptValue>),
    /// String-keyed mapping.
    Object(BTreeMap<String, ScriptValue>),
}

impl ScriptValue {
    /// Human-readable name of this value's runtime type, used in
    /// conversion diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ScriptValue::Undefined => "undefined",
            ScriptValue::Null => "null",
            ScriptValue::Bool(_) => "bool",
            ScriptValue::Int(_) => "int",
            ScriptValue::Float(_) => "float",
            ScriptValue::String(_) => "string",
            ScriptValue::Array(_) => "array",
            ScriptValue::Object(_) => "object",
        }
    }

    /// Whether this is `undefined`.
    pub fn is_undefined(&self) -> bool {
        matches!(self, ScriptValue::Undefined)
    }

    /// Decode this value into any [`serde::Deserialize`] type by way of the
    /// JSON intermediate representation.
    ///
    /// An `undefined` source reports [`MarshalError::MissingReturnValue`];
    /// any decode failure reports [`MarshalError::TypeConversionFailed`].
    pub fn decode<T: serde::de::DeserializeOwned>(self) -> Result<T, MarshalError> {
        if self.is_undefined() {
            return Err(MarshalError::MissingReturnValue);
        }
        let found = self.kind_name();
        let json = serde_json::Value::from(self);
        serde_json::from_value(json).map_err(|err| MarshalError::TypeConversionFailed {
            expected: std::any::type_name::<T>().to_string(),
            found: format!("{found} ({err})"),
        })
    }

    /// Encode any [`serde::Serialize`] value into a [`ScriptValue`] by way
    /// of the JSON intermediate representation.
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<ScriptValue, MarshalError> {
        let json =
            serde_json::to_value(value).map_err(|err| MarshalError::TypeConversionFailed {
                expected: "a JSON-representable value".to_string(),
                found: err.to_string(),
            })?;
        Ok(json.into())
    }
}

impl From<serde_json::Value> for ScriptValue {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => ScriptValue::Null,
            serde_json::Value::Bool(b) => ScriptValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ScriptValue::Int(i)
                } else {
                    ScriptValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => ScriptValue::String(s),
            serde_json::Value::Array(items) => {
                ScriptValue::Array(items.into_iter().map(Into::into).collect())
            }
            serde_json::Value::Object(map) => ScriptValue::Object(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

impl From<ScriptValue> for serde_json::Value {
    fn from(value: ScriptValue) -> Self {
        match value {
            // JSON has no undefined; collapse to null like JSON.stringify does.
            ScriptValue::Undefined | ScriptValue::Null => serde_json::Value::Null,
            ScriptValue::Bool(b) => serde_json::Value::Bool(b),
            ScriptValue::Int(i) => serde_json::Value::Number(i.into()),
            ScriptValue::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ScriptValue::String(s) => serde_json::Value::String(s),
            ScriptValue::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            ScriptValue::Object(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

impl std::fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptValue::Undefined => write!(f, "undefined"),
            ScriptValue::String(s) => write!(f, "{s}"),
            other => {
                let json = serde_json::Value::from(other.clone());
                write!(f, "{json}")
            }
        }
    }
}
