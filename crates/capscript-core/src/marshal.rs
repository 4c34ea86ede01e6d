//! Marshalling between script values and typed native values.
//!
//! Conversion dispatches on the *requested* native type: implementing
//! [`FromScript`] (or deriving it through [`impl_from_script_decode!`]) is
//! all that is needed to hand a new native type to the engine, with no
//! script-side changes.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::value::ScriptValue;

/// Errors produced while narrowing a script value into a native type or
/// widening a native value back.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarshalError {
    /// The script produced no value where one was required.
    #[error("script returned no value where one was required")]
    MissingReturnValue,

    /// The value cannot be represented as the requested native type.
    #[error("type conversion failed: cannot convert {found} into {expected}")]
    TypeConversionFailed {
        /// The requested native type.
        expected: String,
        /// What the script actually produced.
        found: String,
    },
}

impl MarshalError {
    pub(crate) fn mismatch(expected: &str, value: &ScriptValue) -> Self {
        MarshalError::TypeConversionFailed {
            expected: expected.to_string(),
            found: value.kind_name().to_string(),
        }
    }
}

/// Convert a [`ScriptValue`] into a native type.
pub trait FromScript: Sized {
    /// Narrow `value` into `Self`, reporting a [`MarshalError`] if the
    /// value does not fit.
    fn from_script(value: ScriptValue) -> Result<Self, MarshalError>;
}

/// Convert a native type into a [`ScriptValue`].
pub trait IntoScript {
    /// Widen `self` into a script value.
    fn into_script(self) -> ScriptValue;
}

/// Derive [`FromScript`] for serde-deserializable types by decoding through
/// the JSON intermediate representation.
#[macro_export]
macro_rules! impl_from_script_decode {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::marshal::FromScript for $ty {
            fn from_script(
                value: $crate::value::ScriptValue,
            ) -> std::result::Result<Self, $crate::marshal::MarshalError> {
                value.decode()
            }
        }
    )+};
}

impl FromScript for ScriptValue {
    fn from_script(value: ScriptValue) -> Result<Self, MarshalError> {
        Ok(value)
    }
}

impl FromScript for () {
    fn from_script(_value: ScriptValue) -> Result<Self, MarshalError> {
        Ok(())
    }
}

impl FromScript for bool {
    fn from_script(value: ScriptValue) -> Result<Self, MarshalError> {
        match value {
            ScriptValue::Bool(b) => Ok(b),
            ScriptValue::Undefined => Err(MarshalError::MissingReturnValue),
            other => Err(MarshalError::mismatch("bool", &other)),
        }
    }
}

impl FromScript for i64 {
    fn from_script(value: ScriptValue) -> Result<Self, MarshalError> {
        match value {
            ScriptValue::Int(i) => Ok(i),
            // Script numbers are doubles; accept integral floats.
            ScriptValue::Float(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
                Ok(f as i64)
            }
            ScriptValue::Undefined => Err(MarshalError::MissingReturnValue),
            other => Err(MarshalError::mismatch("integer", &other)),
        }
    }
}

impl FromScript for i32 {
    fn from_script(value: ScriptValue) -> Result<Self, MarshalError> {
        let wide = i64::from_script(value.clone())?;
        i32::try_from(wide).map_err(|_| MarshalError::mismatch("32-bit integer", &value))
    }
}

impl FromScript for f64 {
    fn from_script(value: ScriptValue) -> Result<Self, MarshalError> {
        match value {
            ScriptValue::Float(f) => Ok(f),
            ScriptValue::Int(i) => Ok(i as f64),
            ScriptValue::Undefined => Err(MarshalError::MissingReturnValue),
            other => Err(MarshalError::mismatch("number", &other)),
        }
    }
}

impl FromScript for String {
    fn from_script(value: ScriptValue) -> Result<Self, MarshalError> {
        match value {
            ScriptValue::String(s) => Ok(s),
            ScriptValue::Undefined => Err(MarshalError::MissingReturnValue),
            other => Err(MarshalError::mismatch("string", &other)),
        }
    }
}

impl<T: FromScript> FromScript for Option<T> {
    fn from_script(value: ScriptValue) -> Result<Self, MarshalError> {
        match value {
            ScriptValue::Undefined | ScriptValue::Null => Ok(None),
            other => T::from_script(other).map(Some),
        }
    }
}

impl<T: FromScript> FromScript for Vec<T> {
    fn from_script(value: ScriptValue) -> Result<Self, MarshalError> {
        match value {
            ScriptValue::Array(items) => items.into_iter().map(T::from_script).collect(),
            ScriptValue::Undefined => Err(MarshalError::MissingReturnValue),
            other => Err(MarshalError::mismatch("array", &other)),
        }
    }
}

impl<T: FromScript> FromScript for BTreeMap<String, T> {
    fn from_script(value: ScriptValue) -> Result<Self, MarshalError> {
        match value {
            ScriptValue::Object(map) => map
                .into_iter()
                .map(|(k, v)| T::from_script(v).map(|v| (k, v)))
                .collect(),
            ScriptValue::Undefined => Err(MarshalError::MissingReturnValue),
            other => Err(MarshalError::mismatch("object", &other)),
        }
    }
}

impl<T: FromScript> FromScript for HashMap<String, T> {
    fn from_script(value: ScriptValue) -> Result<Self, MarshalError> {
        Ok(BTreeMap::<String, T>::from_script(value)?
            .into_iter()
            .collect())
    }
}

impl FromScript for serde_json::Value {
    fn from_script(value: ScriptValue) -> Result<Self, MarshalError> {
        Ok(value.into())
    }
}

impl IntoScript for ScriptValue {
    fn into_script(self) -> ScriptValue {
        self
    }
}

impl IntoScript for () {
    fn into_script(self) -> ScriptValue {
        ScriptValue::Undefined
    }
}

impl IntoScript for bool {
    fn into_script(self) -> ScriptValue {
        ScriptValue::Bool(self)
    }
}

impl IntoScript for i32 {
    fn into_script(self) -> ScriptValue {
        ScriptValue::Int(self as i64)
    }
}

impl IntoScript for i64 {
    fn into_script(self) -> ScriptValue {
        ScriptValue::Int(self)
    }
}

impl IntoScript for f64 {
    fn into_script(self) -> ScriptValue {
        ScriptValue::Float(self)
    }
}

impl IntoScript for String {
    fn into_script(self) -> ScriptValue {
        ScriptValue::String(self)
    }
}

impl IntoScript for &str {
    fn into_script(self) -> ScriptValue {
        ScriptValue::String(self.to_string())
    }
}

impl<T: IntoScript> IntoScript for Option<T> {
    fn into_script(self) -> ScriptValue {
        match self {
            Some(v) => v.into_script(),
            None => ScriptValue::Null,
        }
    }
}

impl<T: IntoScript> IntoScript for Vec<T> {
    fn into_script(self) -> ScriptValue {
        ScriptValue::Array(self.into_iter().map(IntoScript::into_script).collect())
    }
}

impl<T: IntoScript> IntoScript for BTreeMap<String, T> {
    fn into_script(self) -> ScriptValue {
        ScriptValue::Object(
            self.into_iter()
                .map(|(k, v)| (k, v.into_script()))
                .collect(),
        )
    }
}

impl<T: IntoScript> IntoScript for HashMap<String, T> {
    fn into_script(self) -> ScriptValue {
        ScriptValue::Object(
            self.into_iter()
                .map(|(k, v)| (k, v.into_script()))
                .collect(),
        )
    }
}

impl IntoScript for serde_json::Value {
    fn into_script(self) -> ScriptValue {
        self.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives() {
        assert_eq!(
            String::from_script(ScriptValue::String("hi".to_string())).unwrap(),
            "hi"
        );
        assert_eq!(i64::from_script(ScriptValue::Int(7)).unwrap(), 7);
        assert_eq!(i64::from_script(ScriptValue::Float(7.0)).unwrap(), 7);
        assert_eq!(f64::from_script(ScriptValue::Int(2)).unwrap(), 2.0);
        assert!(bool::from_script(ScriptValue::Bool(true)).unwrap());
    }

    #[test]
    fn test_fractional_float_is_not_an_integer() {
        let err = i64::from_script(ScriptValue::Float(1.5)).unwrap_err();
        assert!(matches!(err, MarshalError::TypeConversionFailed { .. }));
    }

    #[test]
    fn test_i32_range_check() {
        let err = i32::from_script(ScriptValue::Int(i64::MAX)).unwrap_err();
        assert!(matches!(err, MarshalError::TypeConversionFailed { .. }));
        assert_eq!(i32::from_script(ScriptValue::Int(41)).unwrap(), 41);
    }

    #[test]
    fn test_missing_value() {
        assert_eq!(
            String::from_script(ScriptValue::Undefined).unwrap_err(),
            MarshalError::MissingReturnValue
        );
        // Unit and Option absorb a missing value.
        assert_eq!(<()>::from_script(ScriptValue::Undefined).unwrap(), ());
        assert_eq!(
            Option::<String>::from_script(ScriptValue::Undefined).unwrap(),
            None
        );
    }

    #[test]
    fn test_unsupported_conversion_never_panics() {
        for value in [
            ScriptValue::Null,
            ScriptValue::Bool(true),
            ScriptValue::Array(vec![]),
            ScriptValue::Object(BTreeMap::new()),
        ] {
            assert!(matches!(
                String::from_script(value.clone()),
                Err(MarshalError::TypeConversionFailed { .. })
            ));
            assert!(matches!(
                i64::from_script(value),
                Err(MarshalError::TypeConversionFailed { .. })
            ));
        }
    }

    #[test]
    fn test_homogeneous_sequence() {
        let value = ScriptValue::Array(vec![
            ScriptValue::String("a".to_string()),
            ScriptValue::String("b".to_string()),
        ]);
        assert_eq!(
            Vec::<String>::from_script(value).unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_heterogeneous_sequence() {
        let value = ScriptValue::Array(vec![ScriptValue::Int(1), ScriptValue::Bool(false)]);
        let items = Vec::<ScriptValue>::from_script(value).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_mapping_with_generic_values() {
        let value = ScriptValue::Object(BTreeMap::from([
            ("a".to_string(), ScriptValue::Int(1)),
            ("b".to_string(), ScriptValue::Int(2)),
        ]));
        let map = HashMap::<String, i64>::from_script(value).unwrap();
        assert_eq!(map["a"], 1);
        assert_eq!(map["b"], 2);
    }

    #[test]
    fn test_decode_macro() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct Color {
            name: String,
            hex: String,
        }
        crate::impl_from_script_decode!(Color);

        let value = ScriptValue::Object(BTreeMap::from([
            ("name".to_string(), ScriptValue::String("red".to_string())),
            ("hex".to_string(), ScriptValue::String("#ff0000".to_string())),
        ]));
        let color = Color::from_script(value).unwrap();
        assert_eq!(color.name, "red");
        assert_eq!(color.hex, "#ff0000");
    }

    #[test]
    fn test_into_script_round_trip() {
        let original = vec!["x".to_string(), "y".to_string()];
        let widened = original.clone().into_script();
        assert_eq!(Vec::<String>::from_script(widened).unwrap(), original);
    }
}
