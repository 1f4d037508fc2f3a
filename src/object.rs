use std::fmt;

use crate::types::{Level, ObjectId};

/// The closed set of object kinds.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum ObjectKind {
    /// A concrete memory region (variable or heap block).
    Region,
    /// A summarized list segment of at least `min_length` nodes, linked through the
    /// pointer field at `next_offset` (and `prev_offset` for doubly-linked lists).
    ListSegment {
        head_offset: u64,
        next_offset: u64,
        prev_offset: Option<u64>,
        min_length: u32,
    },
    /// A region that may or may not exist.
    Optional,
    /// A user-defined abstraction, identified by `id`.
    GenericAbstraction { id: u32 },
    /// The NULL sentinel, target of the zero value.
    Null,
}

impl ObjectKind {
    pub fn is_abstract(&self) -> bool {
        !matches!(self, ObjectKind::Region | ObjectKind::Null)
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            ObjectKind::Region => "region",
            ObjectKind::ListSegment { prev_offset: None, .. } => "sll",
            ObjectKind::ListSegment { .. } => "dll",
            ObjectKind::Optional => "opt",
            ObjectKind::GenericAbstraction { .. } => "abstraction",
            ObjectKind::Null => "null",
        }
    }
}

/// An abstract memory object.
///
/// Objects are immutable once placed into a graph; joins build new objects in a
/// fresh destination graph.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Object {
    pub id: ObjectId,
    /// Size in bits.
    pub size: u64,
    pub level: Level,
    pub kind: ObjectKind,
    pub label: String,
}

impl Object {
    /// The NULL object.
    pub fn null() -> Self {
        Self {
            id: ObjectId::NULL,
            size: 0,
            level: Level::ZERO,
            kind: ObjectKind::Null,
            label: "NULL".to_string(),
        }
    }

    /// A concrete region with a fresh id.
    pub fn region(size: u64, label: impl Into<String>) -> Self {
        Self::new(ObjectId::fresh(), size, Level::ZERO, ObjectKind::Region, label)
    }

    /// A singly-linked list segment with a fresh id.
    pub fn sll(size: u64, head_offset: u64, next_offset: u64, min_length: u32, label: impl Into<String>) -> Self {
        let kind = ObjectKind::ListSegment {
            head_offset,
            next_offset,
            prev_offset: None,
            min_length,
        };
        Self::new(ObjectId::fresh(), size, Level::ZERO, kind, label)
    }

    pub fn new(id: ObjectId, size: u64, level: Level, kind: ObjectKind, label: impl Into<String>) -> Self {
        Self {
            id,
            size,
            level,
            kind,
            label: label.into(),
        }
    }

    /// Returns a copy at the given nesting level.
    pub fn at_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind, ObjectKind::Null)
    }

    pub fn is_list_segment(&self) -> bool {
        matches!(self.kind, ObjectKind::ListSegment { .. })
    }

    /// Minimum number of concrete regions this object stands for.
    pub fn min_length(&self) -> u32 {
        match self.kind {
            ObjectKind::ListSegment { min_length, .. } => min_length,
            ObjectKind::Optional => 0,
            ObjectKind::Null => 0,
            _ => 1,
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ObjectKind::Null => write!(f, "NULL"),
            ObjectKind::Region => write!(f, "{}({}, {}b)", self.label, self.id, self.size),
            ObjectKind::ListSegment {
                next_offset,
                min_length,
                prev_offset,
                ..
            } => {
                write!(f, "{}({}, {}b, next={}", self.kind.short_name(), self.id, self.size, next_offset)?;
                if let Some(prev) = prev_offset {
                    write!(f, ", prev={}", prev)?;
                }
                write!(f, ", len>={}, {})", min_length, self.level)
            }
            kind => write!(f, "{}({}, {}b, {})", kind.short_name(), self.id, self.size, self.level),
        }
    }
}
