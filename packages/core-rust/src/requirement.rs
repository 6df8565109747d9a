//! Predicates over validated values and their boolean combinations.
//!
//! A [`Requirement`] is attached to a [`Type`](crate::Type) and checked after
//! casting and pre-processing. Leaf requirements test one property of one
//! value shape; a value of any other shape fails them. Composite requirements
//! combine sub-requirements with AND, OR or XOR.
//!
//! # Failure reporting
//!
//! [`Requirement::ensure_valid`] reports the violated requirement:
//!
//! - AND, optimized: the first failing sub-requirement in declaration order,
//!   as declared (a nested composite is reported whole).
//! - AND, exhaustive: an AND composite of every failing sub-requirement, each
//!   as declared.
//! - OR / XOR: the composite itself, as one unit.

use std::fmt;

use regex::Regex;

use crate::error::FormError;
use crate::path::FieldPath;
use crate::value::Value;

/// How a composite requirement combines its sub-requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositeMode {
    /// Every sub-requirement must pass.
    And,
    /// At least one sub-requirement must pass.
    Or,
    /// Exactly one sub-requirement must pass.
    Xor,
}

/// A text pattern that must match the whole value.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compiles `source` anchored at both ends.
    ///
    /// # Errors
    ///
    /// Returns the regex compilation error for an invalid pattern.
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            source: source.to_owned(),
            regex: Regex::new(&format!("^(?:{source})$"))?,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({:?})", self.source)
    }
}

/// A predicate a validated value must satisfy.
///
/// Bounds of all range variants are inclusive; `None` leaves a side open.
#[derive(Debug, Clone, PartialEq)]
pub enum Requirement {
    /// Negation of the inner requirement.
    Not(Box<Requirement>),
    /// Value equals one of the listed values.
    OneOf(Vec<Value>),
    IntRange { min: Option<i64>, max: Option<i64> },
    DecimalRange { min: Option<f64>, max: Option<f64> },
    /// Integer divisible by the given factor.
    MultipleOf(i64),
    /// Number whose quotient by the given factor is integral.
    DecimalMultipleOf(f64),
    /// Number strictly less than the bound.
    LessThan(f64),
    /// Number strictly greater than the bound.
    GreaterThan(f64),
    /// Text length in characters.
    TextLength { min: Option<usize>, max: Option<usize> },
    TextPattern(Pattern),
    /// Binary payload size in bytes.
    BinarySize { min: Option<usize>, max: Option<usize> },
    /// Binary mime type is listed; `type/*` entries match any subtype.
    MimeType(Vec<String>),
    ListSize { min: Option<usize>, max: Option<usize> },
    /// No two list elements are equal.
    UniqueItems,
    MapSize { min: Option<usize>, max: Option<usize> },
    /// No two map values are equal.
    UniqueValues,
    Composite {
        requirements: Vec<Requirement>,
        mode: CompositeMode,
    },
}

impl Requirement {
    // ---- Constructors ----

    #[must_use]
    pub fn range(min: i64, max: i64) -> Self {
        Self::IntRange {
            min: Some(min),
            max: Some(max),
        }
    }

    #[must_use]
    pub fn at_least(min: i64) -> Self {
        Self::IntRange {
            min: Some(min),
            max: None,
        }
    }

    #[must_use]
    pub fn at_most(max: i64) -> Self {
        Self::IntRange {
            min: None,
            max: Some(max),
        }
    }

    #[must_use]
    pub fn decimal_range(min: f64, max: f64) -> Self {
        Self::DecimalRange {
            min: Some(min),
            max: Some(max),
        }
    }

    #[must_use]
    pub fn multiple_of(factor: i64) -> Self {
        Self::MultipleOf(factor)
    }

    #[must_use]
    pub fn even() -> Self {
        Self::MultipleOf(2)
    }

    #[must_use]
    pub fn odd() -> Self {
        Self::even().negate()
    }

    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    #[must_use]
    pub fn one_of<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::OneOf(values.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn length(min: usize, max: usize) -> Self {
        Self::TextLength {
            min: Some(min),
            max: Some(max),
        }
    }

    #[must_use]
    pub fn max_length(max: usize) -> Self {
        Self::TextLength {
            min: None,
            max: Some(max),
        }
    }

    #[must_use]
    pub fn non_empty() -> Self {
        Self::TextLength {
            min: Some(1),
            max: None,
        }
    }

    /// Whole-value text pattern.
    ///
    /// # Errors
    ///
    /// Returns the regex compilation error for an invalid pattern.
    pub fn pattern(source: &str) -> Result<Self, regex::Error> {
        Pattern::new(source).map(Self::TextPattern)
    }

    #[must_use]
    pub fn binary_size(min: usize, max: usize) -> Self {
        Self::BinarySize {
            min: Some(min),
            max: Some(max),
        }
    }

    #[must_use]
    pub fn mime_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::MimeType(types.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn list_size(min: usize, max: usize) -> Self {
        Self::ListSize {
            min: Some(min),
            max: Some(max),
        }
    }

    #[must_use]
    pub fn map_size(min: usize, max: usize) -> Self {
        Self::MapSize {
            min: Some(min),
            max: Some(max),
        }
    }

    #[must_use]
    pub fn all(requirements: Vec<Requirement>) -> Self {
        Self::Composite {
            requirements,
            mode: CompositeMode::And,
        }
    }

    #[must_use]
    pub fn any(requirements: Vec<Requirement>) -> Self {
        Self::Composite {
            requirements,
            mode: CompositeMode::Or,
        }
    }

    #[must_use]
    pub fn exactly_one(requirements: Vec<Requirement>) -> Self {
        Self::Composite {
            requirements,
            mode: CompositeMode::Xor,
        }
    }

    /// Conjunction of `self` and `other`, flattening into an existing AND.
    #[must_use]
    pub fn and(self, other: Requirement) -> Self {
        match self {
            Self::Composite {
                mut requirements,
                mode: CompositeMode::And,
            } => {
                requirements.push(other);
                Self::all(requirements)
            }
            first => Self::all(vec![first, other]),
        }
    }

    // ---- Evaluation ----

    /// Whether `value` satisfies this requirement.
    #[must_use]
    pub fn check_valid(&self, value: &Value) -> bool {
        match self {
            Self::Not(inner) => !inner.check_valid(value),
            Self::OneOf(allowed) => allowed.contains(value),
            Self::IntRange { min, max } => value
                .as_i64()
                .is_some_and(|v| within(v, *min, *max)),
            Self::DecimalRange { min, max } => {
                value.as_f64().is_some_and(|v| within(v, *min, *max))
            }
            Self::MultipleOf(factor) => value.as_i64().is_some_and(|v| match factor {
                0 => v == 0,
                f => v.checked_rem(*f).map_or(true, |r| r == 0),
            }),
            Self::DecimalMultipleOf(factor) => value.as_f64().is_some_and(|v| {
                if *factor == 0.0 {
                    return v == 0.0;
                }
                let quotient = v / factor;
                (quotient - quotient.round()).abs() < 1e-9
            }),
            Self::LessThan(bound) => value.as_f64().is_some_and(|v| v < *bound),
            Self::GreaterThan(bound) => value.as_f64().is_some_and(|v| v > *bound),
            Self::TextLength { min, max } => value
                .as_str()
                .is_some_and(|s| within(s.chars().count(), *min, *max)),
            Self::TextPattern(pattern) => value.as_str().is_some_and(|s| pattern.is_match(s)),
            Self::BinarySize { min, max } => binary_len(value).is_some_and(|len| within(len, *min, *max)),
            Self::MimeType(allowed) => match value {
                Value::Binary(binary) => allowed.iter().any(|m| mime_matches(m, binary.mime_type())),
                _ => false,
            },
            Self::ListSize { min, max } => value
                .as_array()
                .is_some_and(|items| within(items.len(), *min, *max)),
            Self::UniqueItems => value.as_array().is_some_and(all_distinct),
            Self::MapSize { min, max } => value
                .as_map()
                .is_some_and(|map| within(map.len(), *min, *max)),
            Self::UniqueValues => value
                .as_map()
                .is_some_and(|map| all_distinct(&map.values().collect::<Vec<_>>())),
            Self::Composite { requirements, mode } => {
                let mut passing = requirements.iter().filter(|r| r.check_valid(value));
                match mode {
                    CompositeMode::And => requirements.iter().all(|r| r.check_valid(value)),
                    CompositeMode::Or => passing.next().is_some(),
                    CompositeMode::Xor => passing.next().is_some() && passing.next().is_none(),
                }
            }
        }
    }

    /// Returns `Ok(())` when `value` satisfies this requirement.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::InvalidFieldValue`] carrying `path` and the
    /// violated requirement, narrowed as described in the module docs.
    pub fn ensure_valid(
        &self,
        path: Option<&FieldPath>,
        value: &Value,
        optimized: bool,
    ) -> Result<(), FormError> {
        match self.violation(value, optimized) {
            None => Ok(()),
            Some(requirement) => Err(FormError::InvalidFieldValue {
                path: path.cloned(),
                requirement,
            }),
        }
    }

    /// The violated unit for `value`, or `None` when satisfied.
    fn violation(&self, value: &Value, optimized: bool) -> Option<Requirement> {
        match self {
            Self::Composite {
                requirements,
                mode: CompositeMode::And,
            } => {
                let mut failing = requirements.iter().filter(|r| !r.check_valid(value));
                if optimized {
                    return failing.next().cloned();
                }
                let failing: Vec<_> = failing.cloned().collect();
                (!failing.is_empty()).then(|| Self::all(failing))
            }
            other => (!other.check_valid(value)).then(|| other.clone()),
        }
    }
}

fn within<T: PartialOrd + Copy>(v: T, min: Option<T>, max: Option<T>) -> bool {
    min.map_or(true, |lo| v >= lo) && max.map_or(true, |hi| v <= hi)
}

fn binary_len(value: &Value) -> Option<usize> {
    match value {
        Value::Binary(binary) => Some(binary.len()),
        Value::Bytes(bytes) => Some(bytes.len()),
        _ => None,
    }
}

fn mime_matches(allowed: &str, actual: &str) -> bool {
    match allowed.strip_suffix("/*") {
        Some(major) => actual
            .split_once('/')
            .is_some_and(|(m, _)| m.eq_ignore_ascii_case(major)),
        None => allowed.eq_ignore_ascii_case(actual),
    }
}

fn all_distinct<T: PartialEq>(items: &[T]) -> bool {
    items
        .iter()
        .enumerate()
        .all(|(i, item)| !items[i + 1..].contains(item))
}

fn write_bounds<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    what: &str,
    min: Option<T>,
    max: Option<T>,
) -> fmt::Result {
    match (min, max) {
        (Some(lo), Some(hi)) => write!(f, "{what} in [{lo}, {hi}]"),
        (Some(lo), None) => write!(f, "{what} >= {lo}"),
        (None, Some(hi)) => write!(f, "{what} <= {hi}"),
        (None, None) => write!(f, "any {what}"),
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Not(inner) => write!(f, "not ({inner})"),
            Self::OneOf(values) => {
                f.write_str("one of [")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Self::IntRange { min, max } => write_bounds(f, "value", *min, *max),
            Self::DecimalRange { min, max } => write_bounds(f, "value", *min, *max),
            Self::MultipleOf(factor) => write!(f, "multiple of {factor}"),
            Self::DecimalMultipleOf(factor) => write!(f, "multiple of {factor}"),
            Self::LessThan(bound) => write!(f, "value < {bound}"),
            Self::GreaterThan(bound) => write!(f, "value > {bound}"),
            Self::TextLength { min, max } => write_bounds(f, "length", *min, *max),
            Self::TextPattern(pattern) => write!(f, "matches /{}/", pattern.as_str()),
            Self::BinarySize { min, max } => write_bounds(f, "size", *min, *max),
            Self::MimeType(types) => write!(f, "mime type in [{}]", types.join(", ")),
            Self::ListSize { min, max } => write_bounds(f, "item count", *min, *max),
            Self::UniqueItems => f.write_str("unique items"),
            Self::MapSize { min, max } => write_bounds(f, "entry count", *min, *max),
            Self::UniqueValues => f.write_str("unique values"),
            Self::Composite { requirements, mode } => {
                let label = match mode {
                    CompositeMode::And => "all of",
                    CompositeMode::Or => "any of",
                    CompositeMode::Xor => "exactly one of",
                };
                write!(f, "{label} (")?;
                for (i, r) in requirements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{r}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::binary::BinaryValue;
    use crate::value::ValueMap;

    fn violation_of(result: Result<(), FormError>) -> Requirement {
        match result {
            Err(FormError::InvalidFieldValue { requirement, .. }) => requirement,
            other => panic!("expected InvalidFieldValue, got {other:?}"),
        }
    }

    // ---- Leaf requirements ----

    #[test]
    fn int_range_is_inclusive() {
        let r = Requirement::range(100, 999);
        assert!(r.check_valid(&Value::Int(100)));
        assert!(r.check_valid(&Value::Int(999)));
        assert!(!r.check_valid(&Value::Int(99)));
        assert!(!r.check_valid(&Value::Int(1000)));
        assert!(!r.check_valid(&Value::Float(150.0)));
    }

    #[test]
    fn decimal_bounds() {
        assert!(Requirement::decimal_range(0.0, 1.0).check_valid(&Value::Float(1.0)));
        assert!(!Requirement::LessThan(1.0).check_valid(&Value::Float(1.0)));
        assert!(Requirement::GreaterThan(1.0).check_valid(&Value::Float(1.5)));
        assert!(Requirement::DecimalMultipleOf(0.5).check_valid(&Value::Float(2.5)));
        assert!(!Requirement::DecimalMultipleOf(0.5).check_valid(&Value::Float(2.4)));
    }

    #[test]
    fn even_and_odd() {
        assert!(Requirement::even().check_valid(&Value::Int(124)));
        assert!(!Requirement::even().check_valid(&Value::Int(123)));
        assert!(Requirement::odd().check_valid(&Value::Int(11)));
        assert!(Requirement::odd().check_valid(&Value::Int(-3)));
    }

    #[test]
    fn multiple_of_zero_only_accepts_zero() {
        assert!(Requirement::multiple_of(0).check_valid(&Value::Int(0)));
        assert!(!Requirement::multiple_of(0).check_valid(&Value::Int(4)));
        assert!(Requirement::multiple_of(-1).check_valid(&Value::Int(i64::MIN)));
    }

    #[test]
    fn one_of_compares_values() {
        let r = Requirement::one_of(["a", "b"]);
        assert!(r.check_valid(&Value::from("b")));
        assert!(!r.check_valid(&Value::from("c")));
    }

    #[test]
    fn text_length_counts_characters() {
        let r = Requirement::length(2, 3);
        assert!(r.check_valid(&Value::from("äöü")));
        assert!(!r.check_valid(&Value::from("a")));
        assert!(!r.check_valid(&Value::Int(12)));
    }

    #[test]
    fn pattern_matches_whole_text() {
        let r = Requirement::pattern("[0-9]{3}").expect("valid regex");
        assert!(r.check_valid(&Value::from("123")));
        assert!(!r.check_valid(&Value::from("1234")));
        assert!(!r.check_valid(&Value::from("a123")));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        assert!(Requirement::pattern("(").is_err());
    }

    #[test]
    fn binary_size_and_mime() {
        let png = Value::Binary(BinaryValue::new("image/png", vec![0_u8; 10]));
        assert!(Requirement::binary_size(1, 10).check_valid(&png));
        assert!(!Requirement::binary_size(11, 20).check_valid(&png));
        assert!(Requirement::mime_types(["image/*"]).check_valid(&png));
        assert!(Requirement::mime_types(["IMAGE/PNG"]).check_valid(&png));
        assert!(!Requirement::mime_types(["application/pdf"]).check_valid(&png));
    }

    #[test]
    fn list_and_map_constraints() {
        let dup = Value::Array(vec![Value::from("a"), Value::from("a")]);
        assert!(!Requirement::UniqueItems.check_valid(&dup));
        assert!(Requirement::list_size(2, 2).check_valid(&dup));

        let map = Value::Map(ValueMap::from([("x", 1), ("y", 1)]));
        assert!(!Requirement::UniqueValues.check_valid(&map));
        assert!(Requirement::map_size(1, 2).check_valid(&map));
    }

    #[test]
    fn leaf_fails_on_other_shapes() {
        assert!(!Requirement::UniqueItems.check_valid(&Value::from("aa")));
        assert!(!Requirement::even().check_valid(&Value::Null));
    }

    // ---- Composites ----

    #[test]
    fn and_optimized_reports_first_failure() {
        let r = Requirement::all(vec![
            Requirement::range(0, 10),
            Requirement::even(),
            Requirement::multiple_of(3),
        ]);
        let violated = violation_of(r.ensure_valid(None, &Value::Int(13), true));
        assert_eq!(violated, Requirement::range(0, 10));
    }

    #[test]
    fn and_exhaustive_reports_failing_subset() {
        let r = Requirement::all(vec![
            Requirement::range(0, 10),
            Requirement::even(),
            Requirement::multiple_of(3),
        ]);
        let violated = violation_of(r.ensure_valid(None, &Value::Int(13), false));
        assert_eq!(
            violated,
            Requirement::all(vec![
                Requirement::range(0, 10),
                Requirement::even(),
                Requirement::multiple_of(3),
            ])
        );

        let violated = violation_of(r.ensure_valid(None, &Value::Int(4), false));
        assert_eq!(violated, Requirement::all(vec![Requirement::multiple_of(3)]));
    }

    #[test]
    fn nested_and_is_reported_as_declared() {
        let inner = Requirement::all(vec![Requirement::at_least(0), Requirement::even()]);
        let r = Requirement::all(vec![inner.clone(), Requirement::at_most(100)]);
        let violated = violation_of(r.ensure_valid(None, &Value::Int(5), true));
        assert_eq!(violated, inner);

        let violated = violation_of(r.ensure_valid(None, &Value::Int(105), false));
        assert_eq!(
            violated,
            Requirement::all(vec![inner, Requirement::at_most(100)])
        );
    }

    #[test]
    fn or_fails_as_one_unit() {
        let r = Requirement::any(vec![Requirement::at_most(0), Requirement::at_least(10)]);
        assert!(r.ensure_valid(None, &Value::Int(11), true).is_ok());
        let violated = violation_of(r.ensure_valid(None, &Value::Int(5), false));
        assert_eq!(violated, r);
    }

    #[test]
    fn xor_requires_exactly_one() {
        let r = Requirement::exactly_one(vec![Requirement::even(), Requirement::multiple_of(3)]);
        assert!(r.check_valid(&Value::Int(4)));
        assert!(r.check_valid(&Value::Int(9)));
        assert!(!r.check_valid(&Value::Int(6)));
        assert!(!r.check_valid(&Value::Int(5)));
        assert_eq!(violation_of(r.ensure_valid(None, &Value::Int(6), true)), r);
    }

    #[test]
    fn and_flattens_into_existing_conjunction() {
        let r = Requirement::range(1, 9).and(Requirement::even()).and(Requirement::non_empty());
        match r {
            Requirement::Composite { requirements, mode } => {
                assert_eq!(mode, CompositeMode::And);
                assert_eq!(requirements.len(), 3);
            }
            other => panic!("expected composite, got {other:?}"),
        }
    }

    #[test]
    fn ensure_valid_carries_path() {
        let path = FieldPath::root().field("zip");
        let err = Requirement::even()
            .ensure_valid(Some(&path), &Value::Int(3), true)
            .expect_err("odd value");
        assert_eq!(err.path(), Some(&path));
    }

    #[test]
    fn display_is_readable() {
        let r = Requirement::all(vec![Requirement::range(100, 999), Requirement::even()]);
        assert_eq!(r.to_string(), "all of (value in [100, 999], multiple of 2)");
        assert_eq!(Requirement::odd().to_string(), "not (multiple of 2)");
    }

    // ---- Properties ----

    proptest! {
        #[test]
        fn xor_matches_exactly_one_passing(n in -1000_i64..1000) {
            let subs = vec![Requirement::even(), Requirement::multiple_of(3), Requirement::at_least(0)];
            let passing = subs.iter().filter(|r| r.check_valid(&Value::Int(n))).count();
            let xor = Requirement::exactly_one(subs);
            prop_assert_eq!(xor.check_valid(&Value::Int(n)), passing == 1);
        }

        #[test]
        fn exhaustive_and_reports_exact_failing_subset(n in -1000_i64..1000) {
            let subs = vec![Requirement::even(), Requirement::multiple_of(5), Requirement::range(-10, 10)];
            let expected: Vec<_> = subs.iter().filter(|r| !r.check_valid(&Value::Int(n))).cloned().collect();
            let and = Requirement::all(subs);
            match and.ensure_valid(None, &Value::Int(n), false) {
                Ok(()) => prop_assert!(expected.is_empty()),
                Err(FormError::InvalidFieldValue { requirement, .. }) => {
                    prop_assert_eq!(requirement, Requirement::all(expected));
                }
                Err(other) => prop_assert!(false, "unexpected error {other:?}"),
            }
        }
    }
}
