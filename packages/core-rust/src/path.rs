//! Error locations inside nested form data.
//!
//! A [`FieldPath`] is a persistent linked list of segments: extending a path
//! shares its prefix, so building child locations while descending nested
//! forms, lists and maps costs one small allocation per level. Paths are only
//! used for reporting and are only built when `detailed_location` is enabled.

use std::fmt;
use std::sync::Arc;

use crate::value::Value;

/// Which side of a map entry a location refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapSide {
    Key,
    Value,
}

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// A field of a form, by id.
    Field(String),
    /// An element of a list, by position.
    Index(usize),
    /// An entry of a map, identified by the rendered key.
    MapEntry { key: String, side: MapSide },
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(id) => f.write_str(id),
            Self::Index(i) => write!(f, "[{i}]"),
            Self::MapEntry { key, side: MapSide::Value } => write!(f, "{{{key}}}"),
            Self::MapEntry { key, side: MapSide::Key } => write!(f, "{{{key}}}.<key>"),
        }
    }
}

#[derive(Debug)]
struct Node {
    parent: Option<Arc<Node>>,
    segment: PathSegment,
}

/// Location of a value inside nested form data.
#[derive(Clone, Default)]
pub struct FieldPath {
    tail: Option<Arc<Node>>,
    len: usize,
}

impl FieldPath {
    /// The empty path, denoting the root form.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns a new path extended by one segment. `self` is left untouched.
    #[must_use]
    pub fn child(&self, segment: PathSegment) -> Self {
        Self {
            tail: Some(Arc::new(Node {
                parent: self.tail.clone(),
                segment,
            })),
            len: self.len + 1,
        }
    }

    #[must_use]
    pub fn field(&self, id: &str) -> Self {
        self.child(PathSegment::Field(id.to_owned()))
    }

    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        self.child(PathSegment::Index(index))
    }

    /// Location of the key side of the map entry keyed by `key`.
    #[must_use]
    pub fn map_key(&self, key: &Value) -> Self {
        self.child(PathSegment::MapEntry {
            key: render_key(key),
            side: MapSide::Key,
        })
    }

    /// Location of the value side of the map entry keyed by `key`.
    #[must_use]
    pub fn map_value(&self, key: &Value) -> Self {
        self.child(PathSegment::MapEntry {
            key: render_key(key),
            side: MapSide::Value,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn last(&self) -> Option<&PathSegment> {
        self.tail.as_deref().map(|node| &node.segment)
    }

    /// Segments from the root outwards.
    #[must_use]
    pub fn segments(&self) -> Vec<PathSegment> {
        let mut out = Vec::with_capacity(self.len);
        let mut cursor = self.tail.as_deref();
        while let Some(node) = cursor {
            out.push(node.segment.clone());
            cursor = node.parent.as_deref();
        }
        out.reverse();
        out
    }
}

fn render_key(key: &Value) -> String {
    key.text_form().unwrap_or_else(|| key.to_string())
}

impl PartialEq for FieldPath {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.segments() == other.segments()
    }
}

impl Eq for FieldPath {}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("$");
        }
        for (i, segment) in self.segments().iter().enumerate() {
            if i > 0 && matches!(segment, PathSegment::Field(_)) {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldPath({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_empty() {
        let root = FieldPath::root();
        assert!(root.is_empty());
        assert_eq!(root.to_string(), "$");
        assert!(root.last().is_none());
    }

    #[test]
    fn renders_nested_segments() {
        let path = FieldPath::root()
            .field("orders")
            .index(2)
            .field("lines")
            .map_value(&Value::from("sku-1"));
        assert_eq!(path.to_string(), "orders[2].lines{sku-1}");
        assert_eq!(path.len(), 4);
    }

    #[test]
    fn renders_key_side() {
        let path = FieldPath::root().field("scores").map_key(&Value::Int(7));
        assert_eq!(path.to_string(), "scores{7}.<key>");
        assert_eq!(
            path.last(),
            Some(&PathSegment::MapEntry {
                key: "7".to_owned(),
                side: MapSide::Key
            })
        );
    }

    #[test]
    fn child_shares_prefix_without_mutating_parent() {
        let parent = FieldPath::root().field("a");
        let left = parent.field("b");
        let right = parent.index(0);
        assert_eq!(parent.to_string(), "a");
        assert_eq!(left.to_string(), "a.b");
        assert_eq!(right.to_string(), "a[0]");
    }

    #[test]
    fn equality_is_structural() {
        let a = FieldPath::root().field("x").index(1);
        let b = FieldPath::root().field("x").index(1);
        assert_eq!(a, b);
        assert_ne!(a, FieldPath::root().field("x").index(2));
    }
}
