//! Lenient conversion of raw values into the shape a [`Type`] requires.
//!
//! | Type     | Accepted source                                              |
//! |----------|--------------------------------------------------------------|
//! | Boolean  | `"true"` / `"false"` (any case) from the value's text form    |
//! | Integer  | signed 64-bit integer parsed from the value's text form       |
//! | Decimal  | float parsed from the value's text form                       |
//! | Text     | the value's text form                                         |
//! | Enum     | ordinal (integer values) or constant name (text form)          |
//! | Binary   | raw bytes, or a base64 / `data:` URI string                   |
//! | List     | an array, element by element                                  |
//! | Map      | a map, key by key and value by value; keys must stay distinct |
//! | Form     | a map, validated as the nested form                           |
//! | Nullable | `Null`, or whatever the wrapped type accepts                  |
//!
//! Values whose shape already matches are returned unchanged. Containers
//! are walked so every element is located precisely on failure.

use crate::binary::{parse_binary, BinaryValue};
use crate::config::ValidationConfig;
use crate::error::FormError;
use crate::path::FieldPath;
use crate::schema::FormType;
use crate::types::{Type, TypeKind};
use crate::validator;
use crate::value::{Value, ValueMap};

/// Casts `value` to `ty`.
///
/// Element types of lists and maps are cast recursively; nested forms are
/// validated with `config` (its `parent_path` replaced by `path`).
///
/// # Errors
///
/// Returns [`FormError::FieldValueTypeMismatch`] when the value cannot be
/// converted, or any error raised while validating a nested form.
pub fn cast(
    ty: &Type,
    value: Value,
    path: Option<&FieldPath>,
    config: &ValidationConfig,
) -> Result<Value, FormError> {
    convert(
        ty,
        value,
        path,
        config,
        true,
        &|element: &Type, item: Value, at: Option<&FieldPath>| cast(element, item, at, config),
    )
}

/// Reconciles a supplied value with its declared type during validation.
///
/// Matching scalars pass through; containers are walked with every element
/// fully processed (cast, pre-processed, checked). Mismatches are cast only
/// when `config.lenient_types` is set.
pub(crate) fn reconcile(
    ty: &Type,
    value: Value,
    path: Option<&FieldPath>,
    config: &ValidationConfig,
) -> Result<Value, FormError> {
    convert(
        ty,
        value,
        path,
        config,
        config.lenient_types,
        &|element: &Type, item: Value, at: Option<&FieldPath>| {
            validator::process(element, item, at, config)
        },
    )
}

type ElementFn<'a> = dyn Fn(&Type, Value, Option<&FieldPath>) -> Result<Value, FormError> + 'a;

fn convert(
    ty: &Type,
    value: Value,
    path: Option<&FieldPath>,
    config: &ValidationConfig,
    lenient: bool,
    element: &ElementFn<'_>,
) -> Result<Value, FormError> {
    match ty.kind() {
        TypeKind::Nullable(inner) => {
            if value.is_null() {
                Ok(Value::Null)
            } else {
                convert(inner, value, path, config, lenient, element)
            }
        }
        TypeKind::List(element_type) => match value {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    let at = path.map(|p| p.index(i));
                    element(element_type, item, at.as_ref())
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Err(FormError::mismatch(path, &other, ty)),
        },
        TypeKind::Map(key_type, value_type) => match value {
            Value::Map(map) => {
                let mut out = ValueMap::with_capacity(map.len());
                for (k, v) in map {
                    let key_at = path.map(|p| p.map_key(&k));
                    let value_at = path.map(|p| p.map_value(&k));
                    let raw_kind = k.kind();
                    let key = element(key_type, k, key_at.as_ref())?;
                    let value = element(value_type, v, value_at.as_ref())?;
                    // Two raw keys converting to one key would silently drop an entry.
                    if out.insert(key, value).is_some() {
                        return Err(FormError::FieldValueTypeMismatch {
                            path: key_at,
                            actual: raw_kind,
                            expected: key_type.clone(),
                        });
                    }
                }
                Ok(Value::Map(out))
            }
            other => Err(FormError::mismatch(path, &other, ty)),
        },
        TypeKind::Form(form) => match value {
            Value::Form(data) if form.matches(data.schema()) => Ok(Value::Form(data)),
            Value::Map(map) if lenient => cast_form(form, &map, path, config),
            Value::Form(data) if lenient => cast_form(form, &data.snapshot(), path, config),
            other => Err(FormError::mismatch(path, &other, ty)),
        },
        _ if ty.accepts(&value) => Ok(value),
        _ if lenient => coerce_scalar(ty, value, path),
        _ => Err(FormError::mismatch(path, &value, ty)),
    }
}

fn cast_form(
    form: &FormType,
    map: &ValueMap,
    path: Option<&FieldPath>,
    config: &ValidationConfig,
) -> Result<Value, FormError> {
    let schema = form.schema()?;
    let nested = config.nested(path.cloned());
    validator::validate_schema(&schema, map, &nested).map(Value::Form)
}

fn coerce_scalar(ty: &Type, value: Value, path: Option<&FieldPath>) -> Result<Value, FormError> {
    let coerced = match ty.kind() {
        TypeKind::Boolean => value.text_form().and_then(|s| parse_bool(&s)).map(Value::Bool),
        TypeKind::Integer => value
            .text_form()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .map(Value::Int),
        TypeKind::Decimal => value
            .text_form()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .map(Value::Float),
        TypeKind::Text => value.text_form().map(Value::String),
        TypeKind::Enum(enum_type) => match &value {
            Value::Int(ordinal) => enum_type.by_ordinal(*ordinal),
            other => other.text_form().and_then(|name| enum_type.by_name(&name)),
        }
        .map(Value::Enum),
        TypeKind::Binary => match &value {
            Value::Bytes(bytes) => Some(BinaryValue::octet_stream(bytes.clone())),
            Value::String(text) => parse_binary(text),
            _ => None,
        }
        .map(Value::Binary),
        TypeKind::List(_) | TypeKind::Map(..) | TypeKind::Form(_) | TypeKind::Nullable(_) => None,
    };
    coerced.ok_or_else(|| FormError::mismatch(path, &value, ty))
}

fn parse_bool(text: &str) -> Option<bool> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
