//! Abstract states of the shape domain.
//!
//! An [`SmgState`] is a memory graph plus the memory-safety findings recorded while
//! building it. Findings (invalid reads, writes and frees, leaks) are results of the
//! analysis, not engine errors: they never surface as [`SmgError`][crate::error::SmgError].

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

use log::{debug, info};

use crate::edge::{HasValueEdge, HasValueFilter, PointsToEdge, TargetSpecifier};
use crate::error::Result;
use crate::join::{JoinStatus, SmgJoin};
use crate::object::Object;
use crate::options::{MachineModel, SmgOptions};
use crate::smg::{Smg, StackFrame};
use crate::types::{ObjectId, ValueId};

/// Memory-safety violations found on the path to a state.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct MemoryErrors {
    pub invalid_read: bool,
    pub invalid_write: bool,
    pub invalid_free: bool,
    pub memory_leak: bool,
}

impl MemoryErrors {
    pub fn any(&self) -> bool {
        self.invalid_read || self.invalid_write || self.invalid_free || self.memory_leak
    }
}

impl fmt::Display for MemoryErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (self.invalid_read, "invalid-read"),
            (self.invalid_write, "invalid-write"),
            (self.invalid_free, "invalid-free"),
            (self.memory_leak, "memory-leak"),
        ];
        let set: Vec<&str> = names.iter().filter(|(flag, _)| *flag).map(|(_, name)| *name).collect();
        if set.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", set.join(", "))
        }
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct SmgState {
    smg: Smg,
    errors: MemoryErrors,
}

impl SmgState {
    pub fn new(machine_model: MachineModel) -> Self {
        Self {
            smg: Smg::new(machine_model),
            errors: MemoryErrors::default(),
        }
    }

    /// Wraps an existing graph with no findings.
    pub fn from_smg(smg: Smg) -> Self {
        Self {
            smg,
            errors: MemoryErrors::default(),
        }
    }

    pub fn smg(&self) -> &Smg {
        &self.smg
    }

    pub fn into_smg(self) -> Smg {
        self.smg
    }

    pub fn errors(&self) -> MemoryErrors {
        self.errors
    }

    /// A state is a target (error) state iff a memory-safety violation was found.
    pub fn is_target(&self) -> bool {
        self.errors.any()
    }

    // ---------------------------------------------------------------- scopes

    pub fn push_stack_frame(&mut self, function: impl Into<String>) {
        self.smg.push_stack_frame(function);
    }

    pub fn add_global_variable(&mut self, name: &str, size: u64) -> ObjectId {
        let object = Object::region(size, name);
        let id = object.id;
        self.smg.add_global_object(name, object);
        id
    }

    pub fn add_local_variable(&mut self, name: &str, size: u64) -> Result<ObjectId> {
        let object = Object::region(size, name);
        let id = object.id;
        self.smg.add_local_object(name, object)?;
        Ok(id)
    }

    /// Drops the topmost frame and the heap objects no longer reachable.
    pub fn drop_stack_frame(&mut self) -> Option<StackFrame> {
        let frame = self.smg.pop_stack_frame()?;
        self.prune_unreachable();
        Some(frame)
    }

    // ------------------------------------------------------------------- heap

    /// Allocates a heap region of `size` bits and returns its address.
    pub fn malloc(&mut self, size: u64, label: &str) -> Result<ValueId> {
        let object = Object::region(size, label);
        let id = object.id;
        self.smg.add_heap_object(object);
        debug!("malloc {}b -> {}", size, id);
        self.address_of(id, 0)
    }

    /// Frees the heap region `address` points to.
    ///
    /// Freeing NULL is a no-op. Freeing a non-heap object, an interior pointer or an
    /// already freed region records an invalid free.
    pub fn free(&mut self, address: ValueId) -> Result<()> {
        if address.is_zero() {
            return Ok(());
        }
        let target = match self.smg.pointer(address) {
            Some(pt) if pt.offset == 0 && self.smg.is_heap_object(pt.object) && self.smg.is_valid(pt.object) => {
                pt.object
            }
            _ => {
                info!("invalid free of {}", address);
                self.errors.invalid_free = true;
                return Ok(());
            }
        };
        for edge in self.smg.has_value_edges(&HasValueFilter::object(target)) {
            self.smg.remove_has_value_edge(&edge);
        }
        self.smg.set_validity(target, false)?;
        debug!("free {}", target);
        Ok(())
    }

    /// Returns the value denoting `object + offset`, creating it if needed.
    pub fn address_of(&mut self, object: ObjectId, offset: u64) -> Result<ValueId> {
        if let Some(value) = self.smg.address_value(object, offset, TargetSpecifier::Region) {
            return Ok(value);
        }
        let value = self.smg.new_value();
        self.smg
            .add_points_to_edge(PointsToEdge::new(value, object, offset, TargetSpecifier::Region))?;
        Ok(value)
    }

    /// The object `address` points to, with the offset.
    pub fn dereference(&self, address: ValueId) -> Option<(ObjectId, u64)> {
        self.smg.pointer(address).map(|pt| (pt.object, pt.offset))
    }

    fn accessible(&self, object: ObjectId, offset: u64, size: u64) -> bool {
        match self.smg.object(object) {
            Some(o) => {
                !o.is_null()
                    && self.smg.is_valid(object)
                    && offset.checked_add(size).map_or(false, |end| end <= o.size)
            }
            None => false,
        }
    }

    // ---------------------------------------------------------------- memory

    /// Reads `size` bits at `offset` of `object`.
    ///
    /// Reading from NULL, a freed object or out of bounds records an invalid read and
    /// yields a fresh unknown value. Reading inside zeroed memory yields zero. Reading
    /// untouched memory stores a fresh value there, so that later reads agree.
    pub fn read_value(&mut self, object: ObjectId, offset: u64, size: u64) -> Result<ValueId> {
        if !self.accessible(object, offset, size) {
            info!("invalid read of {}b at {}+{}b", size, object, offset);
            self.errors.invalid_read = true;
            return Ok(self.smg.new_value());
        }
        if let Some(value) = self.smg.field_value(object, offset, size) {
            return Ok(value);
        }

        let overlapping = self.smg.overlapping_edges(object, offset, size);
        if overlapping.is_empty() {
            let value = self.smg.new_value();
            self.smg.add_has_value_edge(HasValueEdge::new(object, offset, size, value))?;
            return Ok(value);
        }
        let zeroed = overlapping.iter().all(|edge| edge.value.is_zero())
            && covered(&overlapping, offset, offset.saturating_add(size));
        if zeroed {
            Ok(ValueId::ZERO)
        } else {
            Ok(self.smg.new_value())
        }
    }

    /// Writes `value` to `size` bits at `offset` of `object`.
    ///
    /// Writing to NULL, a freed object or out of bounds records an invalid write and
    /// leaves the graph unchanged. Fields partly overwritten are dropped, except that
    /// the untouched remainders of zero fields stay zero.
    pub fn write_value(&mut self, object: ObjectId, offset: u64, size: u64, value: ValueId) -> Result<()> {
        if !self.accessible(object, offset, size) {
            info!("invalid write of {}b at {}+{}b", size, object, offset);
            self.errors.invalid_write = true;
            return Ok(());
        }
        let end = offset.saturating_add(size);
        for edge in self.smg.overlapping_edges(object, offset, size) {
            self.smg.remove_has_value_edge(&edge);
            if edge.value.is_zero() {
                if edge.offset < offset {
                    self.smg
                        .add_has_value_edge(HasValueEdge::new(object, edge.offset, offset - edge.offset, ValueId::ZERO))?;
                }
                if edge.end() > end {
                    self.smg
                        .add_has_value_edge(HasValueEdge::new(object, end, edge.end() - end, ValueId::ZERO))?;
                }
            }
        }
        self.smg.add_value(value);
        self.smg.add_has_value_edge(HasValueEdge::new(object, offset, size, value))
    }

    /// Records an explicit number for `value`.
    pub fn assign_explicit(&mut self, value: ValueId, number: i64) {
        self.smg.set_explicit(value, number);
    }

    /// Removes heap objects unreachable from any variable.
    ///
    /// Losing a valid heap object is a memory leak.
    pub fn prune_unreachable(&mut self) {
        let reachable = reachable_objects(&self.smg);
        let garbage: Vec<ObjectId> = self.smg.heap_objects().filter(|o| !reachable.contains(o)).collect();
        for object in garbage {
            if self.smg.is_valid(object) {
                info!("memory leak: {} unreachable", object);
                self.errors.memory_leak = true;
            }
            self.smg.remove_object(object);
        }
    }

    // --------------------------------------------------------------- lattice

    /// The state with unreachable heap objects removed and their leaks recorded.
    fn collected(&self) -> Cow<'_, SmgState> {
        let reachable = reachable_objects(&self.smg);
        if self.smg.heap_objects().all(|o| reachable.contains(&o)) {
            return Cow::Borrowed(self);
        }
        let mut state = self.clone();
        state.prune_unreachable();
        Cow::Owned(state)
    }

    /// Checks whether `self` is subsumed by `reached`.
    ///
    /// Unreachable heap objects are collected first. Holds iff both then carry the
    /// same findings and the join of the two graphs is defined with `self` no more
    /// general than `reached`.
    pub fn is_less_or_equal(&self, reached: &SmgState, options: &SmgOptions) -> Result<bool> {
        let (state, reached) = (self.collected(), reached.collected());
        if state.errors != reached.errors {
            return Ok(false);
        }
        let result = SmgJoin::new(options).run(&state.smg, &reached.smg)?;
        Ok(result.is_defined() && result.status().is_left_covered())
    }

    /// Joins two states with the same findings, after collecting unreachable heap objects.
    ///
    /// Returns `None` if the findings differ or the join is undefined.
    pub fn join(&self, other: &SmgState, options: &SmgOptions) -> Result<Option<(SmgState, JoinStatus)>> {
        let (state, other) = (self.collected(), other.collected());
        if state.errors != other.errors {
            return Ok(None);
        }
        let result = SmgJoin::new(options).run(&state.smg, &other.smg)?;
        let status = result.status();
        let errors = state.errors;
        Ok(result.into_destination().map(|smg| (SmgState { smg, errors }, status)))
    }
}

/// Checks whether `edges` (sorted by offset) cover `[start, end)` without holes.
fn covered(edges: &[HasValueEdge], start: u64, end: u64) -> bool {
    let mut reached = start;
    for edge in edges {
        if edge.offset > reached {
            return false;
        }
        reached = reached.max(edge.end());
    }
    reached >= end
}

fn reachable_objects(smg: &Smg) -> BTreeSet<ObjectId> {
    let mut seen = BTreeSet::new();
    let mut stack: Vec<ObjectId> = smg
        .globals()
        .values()
        .chain(smg.stack_frames().iter().flat_map(|frame| frame.variables.values()))
        .copied()
        .collect();
    while let Some(object) = stack.pop() {
        if !seen.insert(object) {
            continue;
        }
        for edge in smg.has_value_edges(&HasValueFilter::object(object)) {
            if let Some(pt) = smg.pointer(edge.value) {
                if !seen.contains(&pt.object) {
                    stack.push(pt.object);
                }
            }
        }
    }
    seen
}

impl fmt::Display for SmgState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SmgState({} objects, {} values, errors: {})",
            self.smg.objects().count(),
            self.smg.values().count(),
            self.errors
        )
    }
}
