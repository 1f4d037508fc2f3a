//! Type-safe handles for SMG objects, values and abstraction levels.
//!
//! Objects and values are identified by small integer handles drawn from one
//! process-wide counter, so that an id is never reused for a different entity,
//! even across independent graphs.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Id 0 is reserved for [`ObjectId::NULL`] and [`ValueId::ZERO`].
static NEXT_ID: AtomicU32 = AtomicU32::new(1);

/// Returns a fresh id, unique within the process.
///
/// The counter is never reset, so ids are unique but carry no meaning across runs.
pub fn fresh_id() -> u32 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// An object (memory region) identifier.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ObjectId(u32);

impl ObjectId {
    /// The NULL object, target of the zero value.
    pub const NULL: ObjectId = ObjectId(0);

    /// Allocates a fresh object id.
    pub fn fresh() -> Self {
        ObjectId(fresh_id())
    }

    /// Returns the raw id.
    pub fn id(self) -> u32 {
        self.0
    }

    pub fn is_null(self) -> bool {
        self == Self::NULL
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "NULL")
        } else {
            write!(f, "o{}", self.0)
        }
    }
}

/// A symbolic value identifier.
///
/// Values carry no payload; explicit numbers are tracked by the graph in a side map.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ValueId(u32);

impl ValueId {
    /// The distinguished zero value (NULL / 0).
    pub const ZERO: ValueId = ValueId(0);

    /// Allocates a fresh value id.
    pub fn fresh() -> Self {
        ValueId(fresh_id())
    }

    /// Returns the raw id.
    pub fn id(self) -> u32 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self == Self::ZERO
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Nesting level of an object inside summarized (list-segment) structures.
///
/// # Invariants
///
/// - Level 0 is a concrete object outside of any abstraction
/// - Objects hanging off every node of a list segment at level `n` live at level `n + 1`
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Level(u32);

impl Level {
    pub const ZERO: Level = Level(0);

    pub fn new(index: u32) -> Self {
        Level(index)
    }

    /// Returns the raw level index.
    pub fn index(self) -> u32 {
        self.0
    }

    /// Returns the next level down (index + 1).
    pub fn next(self) -> Self {
        Level(self.0 + 1)
    }

    /// Returns the previous level up (index - 1), or None if at level 0.
    pub fn prev(self) -> Option<Self> {
        if self.0 > 0 {
            Some(Level(self.0 - 1))
        } else {
            None
        }
    }

    /// Checks if this is the level of concrete objects.
    pub fn is_concrete(self) -> bool {
        self.0 == 0
    }

    /// Signed difference `self - other`.
    pub fn diff(self, other: Level) -> i64 {
        self.0 as i64 - other.0 as i64
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

impl From<u32> for Level {
    fn from(index: u32) -> Self {
        Level(index)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use std::collections::HashSet;
    use std::thread;

    use super::*;

    #[test]
    fn test_fresh_ids_are_unique() {
        let a = ValueId::fresh();
        let b = ValueId::fresh();
        let o = ObjectId::fresh();
        assert_ne!(a, b);
        assert_ne!(a.id(), o.id());
        assert!(!a.is_zero());
        assert!(!o.is_null());
    }

    #[test]
    fn test_fresh_ids_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| thread::spawn(|| (0..1000).map(|_| fresh_id()).collect::<Vec<_>>()))
            .collect();
        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "id {} allocated twice", id);
            }
        }
        assert!(!seen.contains(&0));
    }

    #[test]
    fn test_level_navigation() {
        let l0 = Level::ZERO;
        let l1 = l0.next();

        assert_eq!(l1.prev(), Some(l0));
        assert_eq!(l0.prev(), None);
        assert!(l0.is_concrete());
        assert!(!l1.is_concrete());
        assert_eq!(l1.diff(l0), 1);
        assert_eq!(l0.diff(l1), -1);
    }

    #[test]
    fn test_display() {
        assert_eq!(ObjectId::NULL.to_string(), "NULL");
        assert_eq!(ValueId::ZERO.to_string(), "#0");
        assert_eq!(Level::new(2).to_string(), "L2");
    }
}
