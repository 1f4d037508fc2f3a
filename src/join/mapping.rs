//! Node and level mappings of one join run.

use std::collections::BTreeMap;

use log::trace;

use crate::error::{Result, SmgError};
use crate::types::{Level, ObjectId, ValueId};

/// Maps the objects and values of one input graph to their destination counterparts.
///
/// Every source node has at most one counterpart; remapping to a different one is
/// a consistency violation.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct NodeMapping {
    objects: BTreeMap<ObjectId, ObjectId>,
    values: BTreeMap<ValueId, ValueId>,
}

impl NodeMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(&self, source: ObjectId) -> Option<ObjectId> {
        self.objects.get(&source).copied()
    }

    pub fn value(&self, source: ValueId) -> Option<ValueId> {
        self.values.get(&source).copied()
    }

    pub fn map_object(&mut self, source: ObjectId, dest: ObjectId) -> Result<()> {
        match self.objects.get(&source) {
            Some(&existing) if existing != dest => Err(SmgError::ConflictingNodeMapping {
                source_node: source.to_string(),
                existing: existing.to_string(),
                requested: dest.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.objects.insert(source, dest);
                Ok(())
            }
        }
    }

    pub fn map_value(&mut self, source: ValueId, dest: ValueId) -> Result<()> {
        match self.values.get(&source) {
            Some(&existing) if existing != dest => Err(SmgError::ConflictingNodeMapping {
                source_node: source.to_string(),
                existing: existing.to_string(),
                requested: dest.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.values.insert(source, dest);
                Ok(())
            }
        }
    }

    /// Source objects mapped to `dest`.
    pub fn objects_mapped_to(&self, dest: ObjectId) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects.iter().filter(move |&(_, &d)| d == dest).map(|(&s, _)| s)
    }

    /// Redirects every source object mapped to `old` onto `new`.
    pub fn retarget_object(&mut self, old: ObjectId, new: ObjectId) {
        for dest in self.objects.values_mut() {
            if *dest == old {
                *dest = new;
            }
        }
    }

    pub fn mapped_values(&self) -> impl Iterator<Item = (ValueId, ValueId)> + '_ {
        self.values.iter().map(|(&s, &d)| (s, d))
    }
}

/// The Level Mapper: a function from pairs of input levels to destination levels.
///
/// Grows monotonically during one join run; the pair `(L0, L0)` maps to `L0` from
/// the start.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LevelMapping {
    map: BTreeMap<(Level, Level), Level>,
}

impl Default for LevelMapping {
    fn default() -> Self {
        let mut map = BTreeMap::new();
        map.insert((Level::ZERO, Level::ZERO), Level::ZERO);
        Self { map }
    }
}

impl LevelMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, level1: Level, level2: Level) -> Option<Level> {
        self.map.get(&(level1, level2)).copied()
    }

    /// Like [`LevelMapping::get`], but a missing entry is a consistency violation.
    pub fn require(&self, level1: Level, level2: Level) -> Result<Level> {
        self.get(level1, level2)
            .ok_or(SmgError::MissingLevelMapping { level1, level2 })
    }

    /// Records `(level1, level2) -> merged`.
    ///
    /// Repeating an existing entry is fine; contradicting it is a consistency violation.
    pub fn insert(&mut self, level1: Level, level2: Level, merged: Level) -> Result<()> {
        match self.map.get(&(level1, level2)) {
            Some(&existing) if existing != merged => Err(SmgError::LevelMappingContradiction {
                level1,
                level2,
                existing,
                requested: merged,
            }),
            Some(_) => Ok(()),
            None => {
                trace!("level map ({},{}) -> {}", level1, level2, merged);
                self.map.insert((level1, level2), merged);
                Ok(())
            }
        }
    }

    /// Maps the levels of a value pair joined as a field of an object pair.
    ///
    /// With object levels `(o1, o2)` mapped to `p`:
    /// - a value one level deeper on either side maps to `p + 1`,
    /// - values at the object levels map to `p`,
    /// - values one level up on both sides map to `p - 1`.
    ///
    /// Returns `Ok(None)` if no rule applies; the join is then incomparable.
    pub fn update(&mut self, values: (Level, Level), objects: (Level, Level)) -> Result<Option<Level>> {
        let (v1, v2) = values;
        let (o1, o2) = objects;

        if let Some(level) = self.get(v1, v2) {
            return Ok(Some(level));
        }

        let parent = self.require(o1, o2)?;

        let merged = if v1 == o1.next() || v2 == o2.next() {
            Some(parent.next())
        } else if v1 == o1 && v2 == o2 {
            Some(parent)
        } else if Some(v1) == o1.prev() && Some(v2) == o2.prev() {
            parent.prev()
        } else {
            None
        };

        match merged {
            Some(level) => {
                self.insert(v1, v2, level)?;
                Ok(Some(level))
            }
            None => Ok(None),
        }
    }
}
