//! Validated form data.
//!
//! A [`FormData`] is only ever produced by the validator: every value it
//! holds conforms to its field's type and requirement (or was trusted
//! verbatim under `ValidationMode::None`). Values are stored by field
//! position so snapshots come out in declaration order.

use std::fmt;
use std::sync::Arc;

use crate::binary::BinaryValue;
use crate::config::ValidationConfig;
use crate::error::FormError;
use crate::path::FieldPath;
use crate::schema::{FieldRef, FormSchema};
use crate::validator;
use crate::value::{EnumConstant, Value, ValueMap};

const REDACTED: &str = "***";

#[derive(Clone)]
pub struct FormData {
    schema: Arc<FormSchema>,
    values: Vec<Option<Value>>,
}

impl FormData {
    pub(crate) fn new(schema: Arc<FormSchema>, values: Vec<Option<Value>>) -> Self {
        debug_assert_eq!(schema.fields().len(), values.len());
        Self { schema, values }
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<FormSchema> {
        &self.schema
    }

    #[must_use]
    pub fn form_name(&self) -> &'static str {
        self.schema.name()
    }

    /// Number of fields holding a value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the field `id` holds a value. Undeclared ids hold nothing.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.schema
            .position(id)
            .is_some_and(|i| self.values[i].is_some())
    }

    /// Value of field `id`, or `None` when it was omitted.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::FieldNotFound`] if the form declares no such field.
    pub fn get(&self, id: &str) -> Result<Option<&Value>, FormError> {
        let position = self
            .schema
            .position(id)
            .ok_or_else(|| FormError::FieldNotFound {
                form: self.schema.name(),
                id: id.to_owned(),
            })?;
        Ok(self.values[position].as_ref())
    }

    /// Typed value of the field behind `field`, or `None` when omitted.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::UnexpectedField`] if `field` belongs to another
    /// form, and [`FormError::FieldValueTypeMismatch`] if the stored value
    /// does not convert to `T`.
    pub fn get_as<T: FromValue>(&self, field: &FieldRef<T>) -> Result<Option<T>, FormError> {
        let descriptor = self.schema.fields().get(field.index);
        let descriptor = match descriptor {
            Some(descriptor) if field.form == self.schema.type_id() => descriptor,
            _ => {
                return Err(FormError::UnexpectedField {
                    id: field.id().to_owned(),
                    expected: field.form_name,
                    actual: self.schema.name(),
                })
            }
        };
        let Some(value) = &self.values[field.index] else {
            return Ok(None);
        };
        T::from_value(value).map(Some).ok_or_else(|| {
            FormError::mismatch(
                Some(&FieldPath::root().field(descriptor.id())),
                value,
                descriptor.field_type(),
            )
        })
    }

    /// `(field id, value)` pairs of the fields holding a value, in
    /// declaration order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.schema
            .fields()
            .iter()
            .zip(&self.values)
            .filter_map(|(field, value)| value.as_ref().map(|v| (field.id(), v)))
    }

    /// Primitive-safe copy of this data keyed by field id, in declaration
    /// order. Omitted fields are absent from the snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ValueMap {
        self.values()
            .map(|(id, value)| (id, value.to_snapshot()))
            .collect()
    }

    /// [`snapshot`](Self::snapshot) with sensitive values replaced by `"***"`.
    #[must_use]
    pub fn redacted_snapshot(&self) -> ValueMap {
        self.schema
            .fields()
            .iter()
            .zip(&self.values)
            .filter_map(|(field, value)| {
                value.as_ref().map(|v| {
                    let shown = if field.is_sensitive() {
                        Value::from(REDACTED)
                    } else {
                        v.to_snapshot()
                    };
                    (field.id(), shown)
                })
            })
            .collect()
    }

    /// Stored values keyed by field id, without snapshot conversion.
    #[must_use]
    pub fn to_input(&self) -> ValueMap {
        self.values().map(|(id, value)| (id, value.clone())).collect()
    }

    /// Validates the current values again under `config`.
    ///
    /// # Errors
    ///
    /// Any error the validator raises for this form.
    pub fn revalidate(&self, config: &ValidationConfig) -> Result<Self, FormError> {
        validator::validate_schema(&self.schema, &self.to_input(), config)
    }

    /// Current values overlaid with `patch`, validated under `config`.
    ///
    /// Patch entries replace the stored value of the same field id. An
    /// explicit `Null` for a non-nullable field counts as absence.
    ///
    /// # Errors
    ///
    /// Any error the validator raises for the patched input.
    pub fn patched(&self, patch: &ValueMap, config: &ValidationConfig) -> Result<Self, FormError> {
        let mut input = self.to_input();
        for (key, value) in patch.iter() {
            input.insert(key.clone(), value.clone());
        }
        validator::validate_schema(&self.schema, &input, config)
    }
}

impl PartialEq for FormData {
    fn eq(&self, other: &Self) -> bool {
        self.schema.type_id() == other.schema.type_id() && self.values == other.values
    }
}

impl fmt::Debug for FormData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct(self.form_name());
        for (field, value) in self.schema.fields().iter().zip(&self.values) {
            match value {
                Some(_) if field.is_sensitive() => out.field(field.id(), &REDACTED),
                Some(v) => out.field(field.id(), v),
                None => continue,
            };
        }
        out.finish()
    }
}

// ---------------------------------------------------------------------------
// FromValue
// ---------------------------------------------------------------------------

/// Extraction of a Rust value from a stored [`Value`].
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64()
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_owned)
    }
}

impl FromValue for EnumConstant {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Enum(constant) => Some(constant.clone()),
            _ => None,
        }
    }
}

impl FromValue for BinaryValue {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Binary(binary) => Some(binary.clone()),
            _ => None,
        }
    }
}

impl FromValue for FormData {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_form().cloned()
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_array()?.iter().map(T::from_value).collect()
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Option<Self> {
        if value.is_null() {
            Some(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{schema_of, Field, Form};
    use crate::types::Type;
    use crate::validator::validate;

    struct Account;

    impl Form for Account {
        const NAME: &'static str = "Account";

        fn declare() -> Vec<Field> {
            vec![
                Field::new("login", Type::text()),
                Field::new("password", Type::text()).sensitive(),
                Field::new("age", Type::nullable(Type::integer())),
                Field::new("roles", Type::list(Type::text())).default_value(Value::Array(vec![])),
            ]
        }
    }

    struct Other;

    impl Form for Other {
        const NAME: &'static str = "Other";

        fn declare() -> Vec<Field> {
            vec![Field::new("login", Type::text())]
        }
    }

    fn account() -> FormData {
        let input = ValueMap::from([("login", "ada"), ("password", "hunter2")]);
        validate::<Account>(&input, &ValidationConfig::default()).expect("valid account")
    }

    // ---- Access ----

    #[test]
    fn get_by_id() {
        let data = account();
        assert_eq!(data.form_name(), "Account");
        assert_eq!(data.get("login").expect("declared"), Some(&Value::from("ada")));
        assert_eq!(data.get("age").expect("declared"), Some(&Value::Null));
        assert!(data.contains("roles"));
        assert!(!data.contains("nope"));
        assert!(matches!(
            data.get("nope"),
            Err(FormError::FieldNotFound { form: "Account", .. })
        ));
    }

    #[test]
    fn typed_handles() {
        let schema = schema_of::<Account>().expect("valid declaration");
        let data = account();

        let login = schema.handle::<String>("login").expect("declared");
        assert_eq!(data.get_as(&login).expect("text"), Some("ada".to_owned()));

        let age = schema.handle::<Option<i64>>("age").expect("declared");
        assert_eq!(data.get_as(&age).expect("nullable"), Some(None));

        let roles = schema.handle::<Vec<String>>("roles").expect("declared");
        assert_eq!(data.get_as(&roles).expect("list"), Some(Vec::new()));

        let wrong = schema.handle::<i64>("login").expect("declared");
        assert!(matches!(
            data.get_as(&wrong),
            Err(FormError::FieldValueTypeMismatch { .. })
        ));
    }

    #[test]
    fn handle_from_other_form_is_rejected() {
        let other = schema_of::<Other>().expect("valid declaration");
        let login = other.handle::<String>("login").expect("declared");
        let err = account().get_as(&login).expect_err("foreign handle");
        assert!(matches!(
            err,
            FormError::UnexpectedField {
                expected: "Other",
                actual: "Account",
                ..
            }
        ));
    }

    // ---- Snapshots ----

    #[test]
    fn snapshot_is_in_declaration_order() {
        let keys: Vec<_> = account()
            .snapshot()
            .keys()
            .filter_map(|k| k.as_str().map(str::to_owned))
            .collect();
        assert_eq!(keys, vec!["login", "password", "age", "roles"]);
    }

    #[test]
    fn redaction_masks_sensitive_fields() {
        let data = account();
        let redacted = data.redacted_snapshot();
        assert_eq!(redacted.get_str("password"), Some(&Value::from("***")));
        assert_eq!(redacted.get_str("login"), Some(&Value::from("ada")));
        assert_eq!(data.snapshot().get_str("password"), Some(&Value::from("hunter2")));

        let debug = format!("{data:?}");
        assert!(debug.contains("***"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let json = serde_json::to_value(account().snapshot()).expect("serializable");
        assert_eq!(
            json,
            serde_json::json!({"login": "ada", "password": "hunter2", "age": null, "roles": []})
        );
    }

    // ---- Revalidation ----

    #[test]
    fn revalidate_is_stable() {
        let data = account();
        let again = data.revalidate(&ValidationConfig::default()).expect("still valid");
        assert_eq!(again, data);
    }

    #[test]
    fn patched_overlays_values() {
        let data = account();
        let patch = ValueMap::from([("age", Value::Int(36))]);
        let patched = data.patched(&patch, &ValidationConfig::default()).expect("valid patch");
        assert_eq!(patched.get("age").expect("declared"), Some(&Value::Int(36)));
        assert_eq!(patched.get("login").expect("declared"), Some(&Value::from("ada")));
        assert_eq!(data.get("age").expect("declared"), Some(&Value::Null));

        let bad = ValueMap::from([("age", "old")]);
        assert!(data.patched(&bad, &ValidationConfig::default()).is_err());
    }
}
