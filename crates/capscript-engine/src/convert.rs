//! Conversion between QuickJS values and the [`ScriptValue`] union.
//!
//! These are the engine-boundary counterparts of the native-boundary
//! marshalling in `capscript-core`: every value crossing into or out of the
//! script runtime passes through here.

use std::collections::BTreeMap;

use capscript_core::ScriptValue;
use rquickjs::{Array, Ctx, Exception, IntoJs, Object, Type, Value};

/// Values nested deeper than this fail conversion instead of recursing
/// forever on cyclic structures.
const MAX_DEPTH: usize = 64;

/// Narrow a QuickJS value into the closed value union.
pub(crate) fn js_to_value<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> rquickjs::Result<ScriptValue> {
    js_to_value_at(ctx, value, 0)
}

fn js_to_value_at<'js>(
    ctx: &Ctx<'js>,
    value: Value<'js>,
    depth: usize,
) -> rquickjs::Result<ScriptValue> {
    if depth > MAX_DEPTH {
        return Err(Exception::throw_message(
            ctx,
            "script value nesting exceeds supported depth",
        ));
    }

    match value.type_of() {
        Type::Uninitialized | Type::Undefined => Ok(ScriptValue::Undefined),
        Type::Null => Ok(ScriptValue::Null),
        Type::Bool => Ok(ScriptValue::Bool(value.as_bool().unwrap_or_default())),
        Type::Int => Ok(ScriptValue::Int(i64::from(value.as_int().unwrap_or_default()))),
        Type::Float => Ok(ScriptValue::Float(value.as_float().unwrap_or_default())),
        Type::String => match value.into_string() {
            Some(s) => Ok(ScriptValue::String(s.to_string()?)),
            None => Ok(ScriptValue::Undefined),
        },
        Type::Array => {
            let Some(array) = value.into_array() else {
                return Ok(ScriptValue::Undefined);
            };
            let mut items = Vec::with_capacity(array.len());
            for index in 0..array.len() {
                items.push(js_to_value_at(ctx, array.get::<Value>(index)?, depth + 1)?);
            }
            Ok(ScriptValue::Array(items))
        }
        Type::Function | Type::Symbol => Ok(ScriptValue::Undefined),
        _ => {
            // Functions masquerading as other object types (constructors,
            // proxies) have no counterpart in the value union either.
            if value.is_function() {
                return Ok(ScriptValue::Undefined);
            }
            let Some(object) = value.into_object() else {
                return Ok(ScriptValue::Undefined);
            };
            let mut map = BTreeMap::new();
            for prop in object.props::<String, Value>() {
                let (key, value) = prop?;
                map.insert(key, js_to_value_at(ctx, value, depth + 1)?);
            }
            Ok(ScriptValue::Object(map))
        }
    }
}

/// Widen a [`ScriptValue`] into a QuickJS value.
pub(crate) fn value_to_js<'js>(
    ctx: &Ctx<'js>,
    value: ScriptValue,
) -> rquickjs::Result<Value<'js>> {
    match value {
        ScriptValue::Undefined => Ok(Value::new_undefined(ctx.clone())),
        ScriptValue::Null => Ok(Value::new_null(ctx.clone())),
        ScriptValue::Bool(b) => b.into_js(ctx),
        ScriptValue::Int(i) => match i32::try_from(i) {
            Ok(small) => small.into_js(ctx),
            // QuickJS stores wider integers as doubles.
            Err(_) => (i as f64).into_js(ctx),
        },
        ScriptValue::Float(f) => f.into_js(ctx),
        ScriptValue::String(s) => s.into_js(ctx),
        ScriptValue::Array(items) => {
            let array = Array::new(ctx.clone())?;
            for (index, item) in items.into_iter().enumerate() {
                array.set(index, value_to_js(ctx, item)?)?;
            }
            Ok(array.into_value())
        }
        ScriptValue::Object(map) => {
            let object = Object::new(ctx.clone())?;
            for (key, item) in map {
                object.set(key, value_to_js(ctx, item)?)?;
            }
            Ok(object.into_value())
        }
    }
}
