//! Edges of a symbolic memory graph.

use std::fmt;

use crate::types::{ObjectId, ValueId};

/// A has-value edge: the bits `[offset, offset + size)` of `object` hold `value`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct HasValueEdge {
    pub object: ObjectId,
    /// Offset in bits.
    pub offset: u64,
    /// Size in bits.
    pub size: u64,
    pub value: ValueId,
}

impl HasValueEdge {
    pub fn new(object: ObjectId, offset: u64, size: u64, value: ValueId) -> Self {
        Self {
            object,
            offset,
            size,
            value,
        }
    }

    /// End of the covered range (exclusive), saturating at `u64::MAX`.
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.size)
    }

    /// Checks whether the ranges of two edges intersect.
    pub fn overlaps(&self, offset: u64, size: u64) -> bool {
        self.offset < offset.saturating_add(size) && offset < self.end()
    }

    /// Checks whether this edge covers `[offset, offset + size)` entirely.
    pub fn covers(&self, offset: u64, size: u64) -> bool {
        self.offset <= offset && offset.saturating_add(size) <= self.end()
    }
}

impl fmt::Display for HasValueEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}b-{}b] -> {}", self.object, self.offset, self.end(), self.value)
    }
}

/// Which concrete region(s) of an abstracted object a pointer refers to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum TargetSpecifier {
    /// A concrete region.
    Region,
    /// The first node of a list segment.
    First,
    /// The last node of a list segment.
    Last,
    /// Every node of a list segment (used by nested objects).
    All,
}

impl fmt::Display for TargetSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TargetSpecifier::Region => "REGION",
            TargetSpecifier::First => "FIRST",
            TargetSpecifier::Last => "LAST",
            TargetSpecifier::All => "ALL",
        };
        write!(f, "{}", s)
    }
}

/// A points-to edge: `value` is the address `object + offset`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PointsToEdge {
    pub value: ValueId,
    pub object: ObjectId,
    pub offset: u64,
    pub specifier: TargetSpecifier,
}

impl PointsToEdge {
    pub fn new(value: ValueId, object: ObjectId, offset: u64, specifier: TargetSpecifier) -> Self {
        Self {
            value,
            object,
            offset,
            specifier,
        }
    }

    /// The edge of the zero value.
    pub fn null() -> Self {
        Self::new(ValueId::ZERO, ObjectId::NULL, 0, TargetSpecifier::Region)
    }

    /// Checks whether two edges denote the same address (ignoring the value).
    pub fn same_target(&self, other: &PointsToEdge) -> bool {
        self.object == other.object && self.offset == other.offset && self.specifier == other.specifier
    }
}

impl fmt::Display for PointsToEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}+{}b, {}", self.value, self.object, self.offset, self.specifier)
    }
}

/// Selects has-value edges by object, offset, size and value.
///
/// # Examples
///
/// ```
/// use smg_rs::edge::{HasValueEdge, HasValueFilter};
/// use smg_rs::types::{ObjectId, ValueId};
///
/// let object = ObjectId::fresh();
/// let edge = HasValueEdge::new(object, 32, 32, ValueId::ZERO);
/// assert!(HasValueFilter::object(object).at_offset(32).matches(&edge));
/// assert!(!HasValueFilter::object(object).at_offset(0).matches(&edge));
/// ```
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct HasValueFilter {
    pub object: Option<ObjectId>,
    pub offset: Option<u64>,
    pub size: Option<u64>,
    pub value: Option<ValueId>,
}

impl HasValueFilter {
    /// Matches every edge.
    pub fn any() -> Self {
        Self::default()
    }

    /// Matches the edges of `object`.
    pub fn object(object: ObjectId) -> Self {
        Self {
            object: Some(object),
            ..Self::default()
        }
    }

    pub fn at_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_value(mut self, value: ValueId) -> Self {
        self.value = Some(value);
        self
    }

    pub fn matches(&self, edge: &HasValueEdge) -> bool {
        self.object.map_or(true, |o| o == edge.object)
            && self.offset.map_or(true, |o| o == edge.offset)
            && self.size.map_or(true, |s| s == edge.size)
            && self.value.map_or(true, |v| v == edge.value)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_overlaps() {
        let o = ObjectId::fresh();
        let e = HasValueEdge::new(o, 32, 32, ValueId::ZERO);
        assert!(e.overlaps(0, 64));
        assert!(e.overlaps(40, 8));
        assert!(!e.overlaps(0, 32));
        assert!(!e.overlaps(64, 32));
        assert!(e.covers(40, 8));
        assert!(!e.covers(0, 64));

        let far = HasValueEdge::new(o, u64::MAX - 4, 8, ValueId::ZERO);
        assert_eq!(far.end(), u64::MAX);
        assert!(far.overlaps(u64::MAX - 1, 8));
        assert!(!e.overlaps(u64::MAX, 8));
    }

    #[test]
    fn test_filter() {
        let o1 = ObjectId::fresh();
        let o2 = ObjectId::fresh();
        let v = ValueId::fresh();
        let e = HasValueEdge::new(o1, 0, 64, v);

        assert!(HasValueFilter::any().matches(&e));
        assert!(HasValueFilter::object(o1).matches(&e));
        assert!(!HasValueFilter::object(o2).matches(&e));
        assert!(HasValueFilter::any().with_value(v).with_size(64).matches(&e));
        assert!(!HasValueFilter::any().with_value(ValueId::ZERO).matches(&e));
    }

    #[test]
    fn test_same_target() {
        let o = ObjectId::fresh();
        let a = PointsToEdge::new(ValueId::fresh(), o, 0, TargetSpecifier::Region);
        let b = PointsToEdge::new(ValueId::fresh(), o, 0, TargetSpecifier::Region);
        let c = PointsToEdge::new(ValueId::fresh(), o, 0, TargetSpecifier::First);
        assert!(a.same_target(&b));
        assert!(!a.same_target(&c));
        assert_eq!(PointsToEdge::null().to_string(), "#0 -> NULL+0b, REGION");
    }
}
