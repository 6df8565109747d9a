//! Value type descriptors.
//!
//! [`Type`] is a closed, recursively composable description of a field's
//! value shape. Each descriptor may carry a pre-processor (a pure
//! `Value -> Value` transform applied after casting) and a [`Requirement`].
//! Descriptors are immutable and cheap to clone.
//!
//! # Tags
//!
//! Every variant has a stable numeric [`TypeTag`] for external serialization:
//! `Boolean = 1` through `Form = 9`. A nullable type's tag is its inner tag
//! plus [`NULLABLE_TAG_OFFSET`]. Tags are never reused.

use std::fmt;
use std::sync::Arc;

use crate::requirement::Requirement;
use crate::schema::FormType;
use crate::value::{EnumConstant, Value, ValueKind};

/// Offset added to a type's tag when it is wrapped in `Nullable`.
pub const NULLABLE_TAG_OFFSET: u8 = 10;

/// Stable external identifier of a type variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(u8);

impl TypeTag {
    pub const BOOLEAN: Self = Self(1);
    pub const INTEGER: Self = Self(2);
    pub const DECIMAL: Self = Self(3);
    pub const TEXT: Self = Self(4);
    pub const BINARY: Self = Self(5);
    pub const ENUM: Self = Self(6);
    pub const LIST: Self = Self(7);
    pub const MAP: Self = Self(8);
    pub const FORM: Self = Self(9);

    /// Decodes an external tag; `None` for unassigned numbers.
    #[must_use]
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            1..=9 | 11..=19 => Some(Self(tag)),
            _ => None,
        }
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn is_nullable(self) -> bool {
        self.0 > NULLABLE_TAG_OFFSET
    }

    /// The tag of the nullable wrapper of this tag's type.
    #[must_use]
    pub fn nullable(self) -> Self {
        if self.is_nullable() {
            self
        } else {
            Self(self.0 + NULLABLE_TAG_OFFSET)
        }
    }

    /// The tag with any nullable offset removed.
    #[must_use]
    pub fn base(self) -> Self {
        if self.is_nullable() {
            Self(self.0 - NULLABLE_TAG_OFFSET)
        } else {
            self
        }
    }
}

/// Pure transform applied to a value after casting and before requirements.
pub type PreProcessor = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Named, ordered set of enum constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    name: Arc<str>,
    constants: Arc<[Arc<str>]>,
}

impl EnumType {
    #[must_use]
    pub fn new<I, S>(name: &str, constants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Self {
            name: name.into(),
            constants: constants.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.constants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    /// Constants in declaration order.
    pub fn constants(&self) -> impl Iterator<Item = EnumConstant> + '_ {
        self.constants.iter().enumerate().filter_map(|(i, name)| {
            u32::try_from(i)
                .ok()
                .map(|ordinal| EnumConstant::new(ordinal, Arc::clone(name)))
        })
    }

    #[must_use]
    pub fn by_ordinal(&self, ordinal: i64) -> Option<EnumConstant> {
        let index = usize::try_from(ordinal).ok()?;
        let name = self.constants.get(index)?;
        Some(EnumConstant::new(u32::try_from(index).ok()?, Arc::clone(name)))
    }

    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<EnumConstant> {
        self.constants().find(|c| c.name() == name)
    }

    /// Whether `constant` is a member of this set (same ordinal and name).
    #[must_use]
    pub fn contains(&self, constant: &EnumConstant) -> bool {
        usize::try_from(constant.ordinal())
            .ok()
            .and_then(|i| self.constants.get(i))
            .is_some_and(|name| &**name == constant.name())
    }
}

/// Shape of a [`Type`].
#[derive(Clone)]
pub enum TypeKind {
    Boolean,
    Integer,
    Decimal,
    Text,
    Binary,
    Enum(EnumType),
    List(Type),
    Map(Type, Type),
    Form(FormType),
    Nullable(Type),
}

struct TypeInner {
    kind: TypeKind,
    pre_processor: Option<PreProcessor>,
    requirement: Option<Requirement>,
}

/// Immutable value type descriptor.
#[derive(Clone)]
pub struct Type(Arc<TypeInner>);

impl Type {
    fn of(kind: TypeKind) -> Self {
        Self(Arc::new(TypeInner {
            kind,
            pre_processor: None,
            requirement: None,
        }))
    }

    #[must_use]
    pub fn boolean() -> Self {
        Self::of(TypeKind::Boolean)
    }

    #[must_use]
    pub fn integer() -> Self {
        Self::of(TypeKind::Integer)
    }

    #[must_use]
    pub fn decimal() -> Self {
        Self::of(TypeKind::Decimal)
    }

    #[must_use]
    pub fn text() -> Self {
        Self::of(TypeKind::Text)
    }

    #[must_use]
    pub fn binary() -> Self {
        Self::of(TypeKind::Binary)
    }

    #[must_use]
    pub fn enumeration(enum_type: EnumType) -> Self {
        Self::of(TypeKind::Enum(enum_type))
    }

    #[must_use]
    pub fn list(element: Type) -> Self {
        Self::of(TypeKind::List(element))
    }

    #[must_use]
    pub fn map(key: Type, value: Type) -> Self {
        Self::of(TypeKind::Map(key, value))
    }

    /// Nested form of type `F`. The schema is resolved lazily, on first use.
    #[must_use]
    pub fn form<F: crate::schema::Form>() -> Self {
        Self::of(TypeKind::Form(FormType::of::<F>()))
    }

    /// Wraps `inner` so that `Null` is accepted. Wrapping twice is a no-op.
    #[must_use]
    pub fn nullable(inner: Type) -> Self {
        if inner.is_nullable() {
            inner
        } else {
            Self::of(TypeKind::Nullable(inner))
        }
    }

    /// Attaches a requirement, AND-ing it with any existing one.
    ///
    /// On a nullable type the requirement applies to the wrapped type.
    #[must_use]
    pub fn requires(self, requirement: Requirement) -> Self {
        if let TypeKind::Nullable(inner) = &self.0.kind {
            return Self::nullable(inner.clone().requires(requirement));
        }
        let requirement = match &self.0.requirement {
            Some(existing) => existing.clone().and(requirement),
            None => requirement,
        };
        self.rebuild(|inner| inner.requirement = Some(requirement))
    }

    /// Attaches a pre-processor, composed after any existing one.
    ///
    /// On a nullable type the pre-processor applies to the wrapped type.
    #[must_use]
    pub fn pre_process<F>(self, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        if let TypeKind::Nullable(inner) = &self.0.kind {
            return Self::nullable(inner.clone().pre_process(f));
        }
        let processor: PreProcessor = match &self.0.pre_processor {
            Some(existing) => {
                let existing = Arc::clone(existing);
                Arc::new(move |v| f(existing(v)))
            }
            None => Arc::new(f),
        };
        self.rebuild(|inner| inner.pre_processor = Some(processor))
    }

    fn rebuild(self, edit: impl FnOnce(&mut TypeInner)) -> Self {
        let mut inner = TypeInner {
            kind: self.0.kind.clone(),
            pre_processor: self.0.pre_processor.clone(),
            requirement: self.0.requirement.clone(),
        };
        edit(&mut inner);
        Self(Arc::new(inner))
    }

    #[must_use]
    pub fn kind(&self) -> &TypeKind {
        &self.0.kind
    }

    #[must_use]
    pub fn tag(&self) -> TypeTag {
        match &self.0.kind {
            TypeKind::Boolean => TypeTag::BOOLEAN,
            TypeKind::Integer => TypeTag::INTEGER,
            TypeKind::Decimal => TypeTag::DECIMAL,
            TypeKind::Text => TypeTag::TEXT,
            TypeKind::Binary => TypeTag::BINARY,
            TypeKind::Enum(_) => TypeTag::ENUM,
            TypeKind::List(_) => TypeTag::LIST,
            TypeKind::Map(..) => TypeTag::MAP,
            TypeKind::Form(_) => TypeTag::FORM,
            TypeKind::Nullable(inner) => inner.tag().nullable(),
        }
    }

    /// Runtime shape a conforming non-null value has. Nullable delegates to
    /// the wrapped type.
    #[must_use]
    pub fn runtime_kind(&self) -> ValueKind {
        match &self.0.kind {
            TypeKind::Boolean => ValueKind::Bool,
            TypeKind::Integer => ValueKind::Int,
            TypeKind::Decimal => ValueKind::Float,
            TypeKind::Text => ValueKind::String,
            TypeKind::Binary => ValueKind::Binary,
            TypeKind::Enum(_) => ValueKind::Enum,
            TypeKind::List(_) => ValueKind::Array,
            TypeKind::Map(..) => ValueKind::Map,
            TypeKind::Form(_) => ValueKind::Form,
            TypeKind::Nullable(inner) => inner.runtime_kind(),
        }
    }

    #[must_use]
    pub fn is_nullable(&self) -> bool {
        matches!(self.0.kind, TypeKind::Nullable(_))
    }

    /// The type with any nullable wrapper removed.
    #[must_use]
    pub fn non_null(&self) -> &Type {
        match &self.0.kind {
            TypeKind::Nullable(inner) => inner,
            _ => self,
        }
    }

    #[must_use]
    pub fn pre_processor(&self) -> Option<&PreProcessor> {
        self.0.pre_processor.as_ref()
    }

    /// The type's own requirement. Always `None` for nullable wrappers.
    #[must_use]
    pub fn requirement(&self) -> Option<&Requirement> {
        self.0.requirement.as_ref()
    }

    /// Whether `value`'s top-level shape already matches this type.
    ///
    /// Containers are not inspected element-wise; see [`Type::conforms`].
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match (&self.0.kind, value) {
            (TypeKind::Nullable(_), Value::Null)
            | (TypeKind::Boolean, Value::Bool(_))
            | (TypeKind::Integer, Value::Int(_))
            | (TypeKind::Decimal, Value::Float(_))
            | (TypeKind::Text, Value::String(_))
            | (TypeKind::Binary, Value::Binary(_))
            | (TypeKind::List(_), Value::Array(_))
            | (TypeKind::Map(..), Value::Map(_)) => true,
            (TypeKind::Nullable(inner), other) => inner.accepts(other),
            (TypeKind::Enum(enum_type), Value::Enum(constant)) => enum_type.contains(constant),
            (TypeKind::Form(form), Value::Form(data)) => form.matches(data.schema()),
            _ => false,
        }
    }

    /// Whether `value` matches this type all the way down.
    #[must_use]
    pub fn conforms(&self, value: &Value) -> bool {
        match (&self.0.kind, value) {
            (TypeKind::Nullable(_), Value::Null) => true,
            (TypeKind::Nullable(inner), other) => inner.conforms(other),
            (TypeKind::List(element), Value::Array(items)) => {
                items.iter().all(|item| element.conforms(item))
            }
            (TypeKind::Map(key, val), Value::Map(map)) => map
                .iter()
                .all(|(k, v)| key.conforms(k) && val.conforms(v)),
            _ => self.accepts(value),
        }
    }

    /// Whether values of this type can serve as map keys.
    #[must_use]
    pub fn is_key_type(&self) -> bool {
        matches!(
            self.0.kind,
            TypeKind::Boolean
                | TypeKind::Integer
                | TypeKind::Decimal
                | TypeKind::Text
                | TypeKind::Enum(_)
        )
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            TypeKind::Boolean => f.write_str("Boolean"),
            TypeKind::Integer => f.write_str("Integer"),
            TypeKind::Decimal => f.write_str("Decimal"),
            TypeKind::Text => f.write_str("Text"),
            TypeKind::Binary => f.write_str("Binary"),
            TypeKind::Enum(e) => write!(f, "Enum<{}>", e.name()),
            TypeKind::List(element) => write!(f, "List<{element}>"),
            TypeKind::Map(key, value) => write!(f, "Map<{key}, {value}>"),
            TypeKind::Form(form) => write!(f, "Form<{}>", form.name()),
            TypeKind::Nullable(inner) => write!(f, "{inner}?"),
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Type");
        out.field("type", &format_args!("{self}"));
        out.field("tag", &self.tag().value());
        if let Some(requirement) = &self.0.requirement {
            out.field("requirement", &format_args!("{requirement}"));
        }
        if self.0.pre_processor.is_some() {
            out.field("pre_processor", &true);
        }
        out.finish()
    }
}
