//! Form schemas: field descriptors, explicit form registration and the
//! process-wide schema cache.
//!
//! A form type implements [`Form`], returning its ordered field descriptors
//! from [`Form::declare`]. [`schema_of`] resolves that declaration once per
//! type (ordering, declaration checks) and caches the resulting
//! [`FormSchema`] in a concurrent map keyed by `TypeId`; every later lookup
//! shares the same `Arc`.
//!
//! ```
//! use formgate_core::{schema_of, Field, Form, Requirement, Type};
//!
//! struct Address;
//!
//! impl Form for Address {
//!     const NAME: &'static str = "Address";
//!
//!     fn declare() -> Vec<Field> {
//!         vec![
//!             Field::new("street", Type::text()),
//!             Field::new("zip", Type::integer().requires(Requirement::range(100, 999))),
//!         ]
//!     }
//! }
//!
//! let schema = schema_of::<Address>().unwrap();
//! assert_eq!(schema.fields().len(), 2);
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tracing::debug;

use crate::error::{DeclarationError, FormError};
use crate::scope::{self, AccessScope};
use crate::types::{Type, TypeKind};
use crate::value::Value;

/// Explicit schema registration for a form type.
pub trait Form: 'static {
    /// Human-readable form name used in errors and logs.
    const NAME: &'static str;

    /// Ordered field descriptors. Called at most once per successful
    /// resolution; the result is cached for the process lifetime.
    fn declare() -> Vec<Field>;
}

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

/// Static metadata for one field of a form.
#[derive(Clone)]
pub struct Field {
    id: String,
    ty: Type,
    default: Option<Value>,
    order: Option<i32>,
    access_scope: Option<AccessScope>,
    enabled_rules: Vec<String>,
    sensitive: bool,
    examples: Vec<Value>,
    doc: Option<String>,
}

impl Field {
    #[must_use]
    pub fn new(id: impl Into<String>, ty: Type) -> Self {
        Self {
            id: id.into(),
            ty,
            default: None,
            order: None,
            access_scope: None,
            enabled_rules: Vec::new(),
            sensitive: false,
            examples: Vec::new(),
            doc: None,
        }
    }

    /// Value substituted when the field is absent. Makes the field optional.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Explicit ordering key; fields without one keep declaration order.
    #[must_use]
    pub fn order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    /// Restricts visibility to callers whose scope grants `scope`.
    #[must_use]
    pub fn scope(mut self, scope: AccessScope) -> Self {
        self.access_scope = Some(scope);
        self
    }

    /// Enables a named caller-defined rule for this field.
    #[must_use]
    pub fn rule(mut self, name: impl Into<String>) -> Self {
        self.enabled_rules.push(name.into());
        self
    }

    /// Marks the value as sensitive: masked in debug output and redacted
    /// snapshots, never logged.
    #[must_use]
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    #[must_use]
    pub fn example(mut self, value: impl Into<Value>) -> Self {
        self.examples.push(value.into());
        self
    }

    #[must_use]
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn field_type(&self) -> &Type {
        &self.ty
    }

    #[must_use]
    pub fn declared_default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    #[must_use]
    pub fn order_key(&self) -> Option<i32> {
        self.order
    }

    #[must_use]
    pub fn access_scope(&self) -> Option<&AccessScope> {
        self.access_scope.as_ref()
    }

    #[must_use]
    pub fn enabled_rules(&self) -> &[String] {
        &self.enabled_rules
    }

    #[must_use]
    pub fn is_rule_enabled(&self, name: &str) -> bool {
        self.enabled_rules.iter().any(|r| r == name)
    }

    #[must_use]
    pub fn is_sensitive(&self) -> bool {
        self.sensitive
    }

    #[must_use]
    pub fn examples(&self) -> &[Value] {
        &self.examples
    }

    #[must_use]
    pub fn documentation(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// A field is optional when it has a default or a nullable type.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.default.is_some() || self.ty.is_nullable()
    }

    /// The value used when the field is absent: the declared default, else
    /// `Null` for nullable types.
    #[must_use]
    pub fn effective_default(&self) -> Option<Value> {
        match &self.default {
            Some(value) => Some(value.clone()),
            None if self.ty.is_nullable() => Some(Value::Null),
            None => None,
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("id", &self.id)
            .field("type", &format_args!("{}", self.ty))
            .field("optional", &self.is_optional())
            .field("order", &self.order)
            .field("access_scope", &self.access_scope)
            .field("sensitive", &self.sensitive)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// FormType
// ---------------------------------------------------------------------------

/// Lazy reference to a form type, carried by `Type::Form`.
///
/// Holding a resolver instead of the schema lets forms reference each other
/// (or themselves) without resolving at declaration time.
#[derive(Clone, Copy)]
pub struct FormType {
    type_id: TypeId,
    name: &'static str,
    resolve: fn() -> Result<Arc<FormSchema>, FormError>,
}

impl FormType {
    #[must_use]
    pub fn of<F: Form>() -> Self {
        Self {
            type_id: TypeId::of::<F>(),
            name: F::NAME,
            resolve: schema_of::<F>,
        }
    }

    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Resolves (or fetches the cached) schema of this form type.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::FormDeclaration`] if the declaration is malformed.
    pub fn schema(&self) -> Result<Arc<FormSchema>, FormError> {
        (self.resolve)()
    }

    /// Whether `schema` was resolved from this form type.
    #[must_use]
    pub fn matches(&self, schema: &FormSchema) -> bool {
        schema.type_id == self.type_id
    }
}

impl PartialEq for FormType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for FormType {}

impl fmt::Debug for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FormType({})", self.name)
    }
}

// ---------------------------------------------------------------------------
// FormSchema
// ---------------------------------------------------------------------------

/// Resolved, ordered field descriptors of one form type.
pub struct FormSchema {
    type_id: TypeId,
    name: &'static str,
    fields: Vec<Field>,
    index: HashMap<String, usize>,
}

impl FormSchema {
    /// Orders and checks a declaration.
    ///
    /// Fields are sorted by their order key (stable, so ties and unkeyed
    /// fields keep declaration order; unkeyed fields sort after keyed ones).
    ///
    /// # Errors
    ///
    /// Returns [`DeclarationError`] for empty or duplicate ids, defaults that
    /// do not conform to their type, and map key types that cannot be keys.
    pub fn resolve(
        type_id: TypeId,
        name: &'static str,
        mut fields: Vec<Field>,
    ) -> Result<Self, DeclarationError> {
        fields.sort_by_key(|field| field.order.map_or((1, 0), |order| (0, order)));

        let mut index = HashMap::with_capacity(fields.len());
        for (position, field) in fields.iter().enumerate() {
            if field.id.is_empty() {
                return Err(DeclarationError::EmptyFieldId { form: name });
            }
            if index.insert(field.id.clone(), position).is_some() {
                return Err(DeclarationError::DuplicateField {
                    form: name,
                    id: field.id.clone(),
                });
            }
            check_key_types(name, field, &field.ty)?;
            if let Some(default) = &field.default {
                if !field.ty.conforms(default) {
                    return Err(DeclarationError::DefaultTypeMismatch {
                        form: name,
                        id: field.id.clone(),
                        expected: field.ty.to_string(),
                    });
                }
            }
        }

        Ok(Self {
            type_id,
            name,
            fields,
            index,
        })
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fields in resolved order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Looks up a field descriptor by id.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::FieldNotFound`] if the form declares no such field.
    pub fn field(&self, id: &str) -> Result<&Field, FormError> {
        self.position(id)
            .map(|i| &self.fields[i])
            .ok_or_else(|| FormError::FieldNotFound {
                form: self.name,
                id: id.to_owned(),
            })
    }

    /// Typed handle to a field, for use with
    /// [`FormData::get_as`](crate::FormData::get_as).
    ///
    /// # Errors
    ///
    /// Returns [`FormError::FieldNotFound`] if the form declares no such field.
    pub fn handle<T>(&self, id: &str) -> Result<FieldRef<T>, FormError> {
        let index = self.position(id).ok_or_else(|| FormError::FieldNotFound {
            form: self.name,
            id: id.to_owned(),
        })?;
        Ok(FieldRef {
            form: self.type_id,
            form_name: self.name,
            id: Arc::from(id),
            index,
            _marker: PhantomData,
        })
    }

    /// Fields a caller holding `scope` may see.
    pub fn visible_fields<'a>(
        &'a self,
        scope: Option<&'a AccessScope>,
    ) -> impl Iterator<Item = &'a Field> + 'a {
        self.fields
            .iter()
            .filter(move |field| scope::is_visible(scope, field.access_scope()))
    }

    /// Whether this schema was resolved from form type `F`.
    #[must_use]
    pub fn is<F: Form>(&self) -> bool {
        self.type_id == TypeId::of::<F>()
    }
}

impl fmt::Debug for FormSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormSchema")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

fn check_key_types(form: &'static str, field: &Field, ty: &Type) -> Result<(), DeclarationError> {
    match ty.kind() {
        TypeKind::List(element) | TypeKind::Nullable(element) => check_key_types(form, field, element),
        TypeKind::Map(key, value) => {
            if !key.is_key_type() {
                return Err(DeclarationError::UnsupportedMapKey {
                    form,
                    id: field.id.clone(),
                    key_type: key.to_string(),
                });
            }
            check_key_types(form, field, value)
        }
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// FieldRef
// ---------------------------------------------------------------------------

/// Typed handle to one field of one form: a form identity plus a position in
/// its descriptor list.
pub struct FieldRef<T> {
    pub(crate) form: TypeId,
    pub(crate) form_name: &'static str,
    pub(crate) id: Arc<str>,
    pub(crate) index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> FieldRef<T> {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl<T> Clone for FieldRef<T> {
    fn clone(&self) -> Self {
        Self {
            form: self.form,
            form_name: self.form_name,
            id: Arc::clone(&self.id),
            index: self.index,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for FieldRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldRef({}.{})", self.form_name, self.id)
    }
}

// ---------------------------------------------------------------------------
// Schema cache
// ---------------------------------------------------------------------------

fn schemas() -> &'static DashMap<TypeId, Arc<FormSchema>> {
    static SCHEMAS: OnceLock<DashMap<TypeId, Arc<FormSchema>>> = OnceLock::new();
    SCHEMAS.get_or_init(DashMap::new)
}

/// Resolved schema of form type `F`, cached for the process lifetime.
///
/// The declaration runs outside the map's locks so a declaration may itself
/// look up other schemas. If two threads race on first use, the first
/// published schema wins and both receive it.
///
/// # Errors
///
/// Returns [`FormError::FormDeclaration`] if `F`'s declaration is malformed.
/// Failed resolutions are not cached.
pub fn schema_of<F: Form>() -> Result<Arc<FormSchema>, FormError> {
    let type_id = TypeId::of::<F>();
    if let Some(cached) = schemas().get(&type_id) {
        return Ok(Arc::clone(cached.value()));
    }

    let resolved = Arc::new(FormSchema::resolve(type_id, F::NAME, F::declare())?);
    let published = Arc::clone(schemas().entry(type_id).or_insert(resolved).value());
    debug!(form = F::NAME, fields = published.fields().len(), "form schema registered");
    Ok(published)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;
    use crate::requirement::Requirement;

    struct Address;

    impl Form for Address {
        const NAME: &'static str = "Address";

        fn declare() -> Vec<Field> {
            vec![
                Field::new("street", Type::text()).doc("Street and number"),
                Field::new("city", Type::text()).default_value("Springfield"),
                Field::new("zip", Type::integer().requires(Requirement::range(100, 999)))
                    .example(123),
            ]
        }
    }

    struct Ordered;

    impl Form for Ordered {
        const NAME: &'static str = "Ordered";

        fn declare() -> Vec<Field> {
            vec![
                Field::new("c", Type::text()),
                Field::new("b", Type::text()).order(2),
                Field::new("a", Type::text()).order(1),
                Field::new("d", Type::text()),
            ]
        }
    }

    static COUNTED_DECLARATIONS: AtomicUsize = AtomicUsize::new(0);

    struct Counted;

    impl Form for Counted {
        const NAME: &'static str = "Counted";

        fn declare() -> Vec<Field> {
            COUNTED_DECLARATIONS.fetch_add(1, Ordering::SeqCst);
            vec![Field::new("x", Type::boolean())]
        }
    }

    fn resolve(fields: Vec<Field>) -> Result<FormSchema, DeclarationError> {
        FormSchema::resolve(TypeId::of::<()>(), "Test", fields)
    }

    // ---- Resolution ----

    #[test]
    fn schema_keeps_declaration_order() {
        let schema = schema_of::<Address>().expect("valid declaration");
        let ids: Vec<_> = schema.fields().iter().map(Field::id).collect();
        assert_eq!(ids, vec!["street", "city", "zip"]);
        assert_eq!(schema.name(), "Address");
        assert!(schema.is::<Address>());
    }

    #[test]
    fn order_keys_sort_before_unkeyed_fields() {
        let schema = schema_of::<Ordered>().expect("valid declaration");
        let ids: Vec<_> = schema.fields().iter().map(Field::id).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn field_lookup() {
        let schema = schema_of::<Address>().expect("valid declaration");
        let city = schema.field("city").expect("declared");
        assert!(city.is_optional());
        assert_eq!(city.effective_default(), Some(Value::from("Springfield")));
        assert_eq!(schema.field("street").expect("declared").documentation(), Some("Street and number"));
        assert_eq!(schema.field("zip").expect("declared").examples(), &[Value::Int(123)]);

        let err = schema.field("country").expect_err("undeclared");
        assert!(matches!(err, FormError::FieldNotFound { form: "Address", .. }));
        assert!(schema.handle::<String>("country").is_err());
    }

    #[test]
    fn nullable_field_defaults_to_null() {
        let field = Field::new("note", Type::nullable(Type::text()));
        assert!(field.is_optional());
        assert_eq!(field.effective_default(), Some(Value::Null));
        assert!(!Field::new("n", Type::integer()).is_optional());
    }

    #[test]
    fn schema_is_cached_per_type() {
        let first = schema_of::<Address>().expect("valid declaration");
        let second = schema_of::<Address>().expect("valid declaration");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn concurrent_lookups_share_one_schema() {
        let handles: Vec<_> = (0..8)
            .map(|_| thread::spawn(|| schema_of::<Counted>().expect("valid declaration")))
            .collect();
        let schemas: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("thread panicked"))
            .collect();
        for schema in &schemas[1..] {
            assert!(Arc::ptr_eq(&schemas[0], schema));
        }
        let declared = COUNTED_DECLARATIONS.load(Ordering::SeqCst);
        assert!((1..=8).contains(&declared));
        let _ = schema_of::<Counted>().expect("valid declaration");
        assert_eq!(COUNTED_DECLARATIONS.load(Ordering::SeqCst), declared);
    }

    // ---- Declaration errors ----

    #[test]
    fn rejects_duplicate_ids() {
        let err = resolve(vec![
            Field::new("a", Type::text()),
            Field::new("a", Type::integer()),
        ])
        .expect_err("duplicate");
        assert_eq!(
            err,
            DeclarationError::DuplicateField {
                form: "Test",
                id: "a".to_owned()
            }
        );
    }

    #[test]
    fn rejects_empty_id() {
        let err = resolve(vec![Field::new("", Type::text())]).expect_err("empty id");
        assert_eq!(err, DeclarationError::EmptyFieldId { form: "Test" });
    }

    #[test]
    fn rejects_nonconforming_default() {
        let err = resolve(vec![Field::new("n", Type::integer()).default_value("ten")])
            .expect_err("bad default");
        assert!(matches!(err, DeclarationError::DefaultTypeMismatch { .. }));

        let err = resolve(vec![Field::new("tags", Type::list(Type::text()))
            .default_value(Value::Array(vec![Value::Int(1)]))])
        .expect_err("bad element");
        assert!(matches!(err, DeclarationError::DefaultTypeMismatch { .. }));
    }

    #[test]
    fn rejects_container_map_keys() {
        let err = resolve(vec![Field::new(
            "lookup",
            Type::list(Type::map(Type::list(Type::text()), Type::integer())),
        )])
        .expect_err("list key");
        assert!(matches!(err, DeclarationError::UnsupportedMapKey { .. }));
    }

    // ---- Visibility ----

    #[test]
    fn visible_fields_respect_scope() {
        let public = AccessScope::root("public");
        let admin = public.child("admin");
        let schema = resolve(vec![
            Field::new("name", Type::text()),
            Field::new("salary", Type::integer()).scope(admin.clone()),
        ])
        .expect("valid");

        let ids = |scope: Option<&AccessScope>| -> Vec<String> {
            schema.visible_fields(scope).map(|f| f.id().to_owned()).collect()
        };
        assert_eq!(ids(Some(&public)), vec!["name"]);
        assert_eq!(ids(Some(&admin)), vec!["name", "salary"]);
        assert_eq!(ids(None), vec!["name", "salary"]);
    }

    #[test]
    fn rules_are_queryable() {
        let field = Field::new("email", Type::text()).rule("unique").rule("lowercase");
        assert!(field.is_rule_enabled("unique"));
        assert!(!field.is_rule_enabled("trim"));
        assert_eq!(field.enabled_rules().len(), 2);
    }
}
