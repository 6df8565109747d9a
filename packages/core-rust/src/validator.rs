//! Recursive form validation.
//!
//! Per field, in schema order:
//!
//! 1. fields the caller's access scope does not grant are dropped;
//! 2. absent fields (an explicit `Null` for a non-nullable field counts as
//!    absent) take their default in `Full` mode, are omitted in `Provided`
//!    and `None` modes, and raise `MissingFieldValue` when required in `Full`
//!    mode. Defaults are stored as declared, unchecked;
//! 3. in `None` mode supplied values are stored verbatim;
//! 4. otherwise the value is reconciled with the declared type (cast when
//!    lenient), pre-processed, and checked against the type's requirement.
//!
//! The first failure aborts the whole call.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, debug_span, trace};

use crate::caster;
use crate::config::{ValidationConfig, ValidationMode};
use crate::data::FormData;
use crate::error::FormError;
use crate::path::FieldPath;
use crate::schema::{schema_of, Field, Form, FormSchema};
use crate::scope;
use crate::types::Type;
use crate::value::{Value, ValueMap};

/// Validates `input` as form `F`.
///
/// # Errors
///
/// Returns [`FormError::FormDeclaration`] if `F`'s schema is malformed,
/// otherwise the first missing, mistyped or invalid field.
pub fn validate<F: Form>(input: &ValueMap, config: &ValidationConfig) -> Result<FormData, FormError> {
    validate_schema(&schema_of::<F>()?, input, config)
}

/// Validates `input` against an already resolved schema.
///
/// Input keys that are not text, or that name no declared field, are
/// ignored.
///
/// # Errors
///
/// The first missing, mistyped or invalid field, located by path when
/// `config.detailed_location` is set.
pub fn validate_schema(
    schema: &Arc<FormSchema>,
    input: &ValueMap,
    config: &ValidationConfig,
) -> Result<FormData, FormError> {
    let span = debug_span!("validate_form", form = schema.name(), mode = ?config.mode);
    let _guard = span.enter();

    let base = config.base_path();
    let supplied: HashMap<&str, &Value> = input
        .iter()
        .filter_map(|(key, value)| key.as_str().map(|key| (key, value)))
        .collect();

    let mut values = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        if !scope::is_visible(config.access_scope.as_ref(), field.access_scope()) {
            trace!(field = field.id(), "field hidden by access scope");
            values.push(None);
            continue;
        }

        let path = base.as_ref().map(|p| p.field(field.id()));
        let raw = supplied
            .get(field.id())
            .copied()
            .filter(|v| !v.is_null() || field.field_type().is_nullable());

        let value = match raw {
            Some(raw) if config.mode == ValidationMode::None => Some(raw.clone()),
            Some(raw) => {
                let processed = process(field.field_type(), raw.clone(), path.as_ref(), config)
                    .map_err(|err| log_failure(schema, field, err))?;
                Some(processed)
            }
            None => absent(field, path, config).map_err(|err| log_failure(schema, field, err))?,
        };
        values.push(value);
    }

    Ok(FormData::new(Arc::clone(schema), values))
}

fn absent(
    field: &Field,
    path: Option<FieldPath>,
    config: &ValidationConfig,
) -> Result<Option<Value>, FormError> {
    match config.mode {
        ValidationMode::None | ValidationMode::Provided => {
            trace!(field = field.id(), "absent field omitted");
            Ok(None)
        }
        ValidationMode::Full => match field.effective_default() {
            Some(default) => {
                trace!(field = field.id(), "absent field defaulted");
                Ok(Some(default))
            }
            None => Err(FormError::MissingFieldValue { path }),
        },
    }
}

/// Reconciles, pre-processes and checks one supplied value.
pub(crate) fn process(
    ty: &Type,
    value: Value,
    path: Option<&FieldPath>,
    config: &ValidationConfig,
) -> Result<Value, FormError> {
    if value.is_null() && ty.is_nullable() {
        return Ok(Value::Null);
    }

    let value = caster::reconcile(ty, value, path, config)?;
    let inner = ty.non_null();
    let value = match inner.pre_processor() {
        Some(pre_process) => pre_process(value),
        None => value,
    };
    if let Some(requirement) = inner.requirement() {
        requirement.ensure_valid(path, &value, config.optimized_requirement_checks)?;
    }
    Ok(value)
}

fn log_failure(schema: &FormSchema, field: &Field, err: FormError) -> FormError {
    debug!(
        form = schema.name(),
        field = field.id(),
        sensitive = field.is_sensitive(),
        error = %err,
        "field validation failed"
    );
    err
}
