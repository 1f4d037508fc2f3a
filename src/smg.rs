//! The Memory-Graph Store.
//!
//! An [`Smg`] (symbolic memory graph) is one heap snapshot: a set of objects
//! and symbolic values connected by has-value edges (object field → value),
//! points-to edges (pointer value → object) and an inequality relation over
//! values. Explicit numbers known for values live in a side map.
//!
//! On top of the raw graph the store keeps the C-language scopes: a stack of
//! frames mapping variable names to objects, a table of global variables, and
//! the set of heap objects.
//!
//! ## Invariants
//!
//! - The NULL object and the zero value always exist; zero points to NULL.
//! - Fields of one object never overlap and always lie within the object.
//! - Each value has at most one points-to edge.
//!
//! Graphs are plain values: cloning produces an independent snapshot, which is
//! how the join engine keeps its inputs untouched.

use std::collections::{BTreeMap, BTreeSet};

use log::trace;
use num_bigint::BigInt;

use crate::edge::{HasValueEdge, HasValueFilter, PointsToEdge, TargetSpecifier};
use crate::error::{Result, SmgError};
use crate::object::Object;
use crate::options::MachineModel;
use crate::types::{ObjectId, ValueId};

/// One stack frame: the local variables of a function invocation.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct StackFrame {
    pub function: String,
    pub variables: BTreeMap<String, ObjectId>,
}

impl StackFrame {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            variables: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Smg {
    objects: BTreeMap<ObjectId, Object>,
    validity: BTreeMap<ObjectId, bool>,
    values: BTreeSet<ValueId>,
    /// Has-value edges per object, keyed by offset.
    fields: BTreeMap<ObjectId, BTreeMap<u64, HasValueEdge>>,
    pointers: BTreeMap<ValueId, PointsToEdge>,
    neq: BTreeMap<ValueId, BTreeSet<ValueId>>,
    explicit: BTreeMap<ValueId, BigInt>,
    stack: Vec<StackFrame>,
    globals: BTreeMap<String, ObjectId>,
    heap: BTreeSet<ObjectId>,
    machine_model: MachineModel,
}

impl Default for Smg {
    fn default() -> Self {
        Smg::new(MachineModel::default())
    }
}

impl Smg {
    pub fn new(machine_model: MachineModel) -> Self {
        let mut smg = Self {
            objects: BTreeMap::new(),
            validity: BTreeMap::new(),
            values: BTreeSet::new(),
            fields: BTreeMap::new(),
            pointers: BTreeMap::new(),
            neq: BTreeMap::new(),
            explicit: BTreeMap::new(),
            stack: Vec::new(),
            globals: BTreeMap::new(),
            heap: BTreeSet::new(),
            machine_model,
        };
        smg.objects.insert(ObjectId::NULL, Object::null());
        smg.validity.insert(ObjectId::NULL, false);
        smg.values.insert(ValueId::ZERO);
        smg.pointers.insert(ValueId::ZERO, PointsToEdge::null());
        smg.explicit.insert(ValueId::ZERO, BigInt::from(0));
        smg
    }

    pub fn machine_model(&self) -> &MachineModel {
        &self.machine_model
    }

    // ---------------------------------------------------------------- objects

    /// Adds an object without placing it in any scope.
    pub fn add_object(&mut self, object: Object) {
        trace!("add object {}", object);
        self.validity.entry(object.id).or_insert(true);
        self.objects.insert(object.id, object);
    }

    pub fn add_heap_object(&mut self, object: Object) {
        self.heap.insert(object.id);
        self.add_object(object);
    }

    pub fn add_global_object(&mut self, name: impl Into<String>, object: Object) {
        self.globals.insert(name.into(), object.id);
        self.add_object(object);
    }

    /// Adds a local variable to the topmost stack frame.
    pub fn add_local_object(&mut self, name: impl Into<String>, object: Object) -> Result<()> {
        let frame = self
            .stack
            .last_mut()
            .ok_or_else(|| SmgError::UnsupportedConstruct("local variable without a stack frame".to_string()))?;
        frame.variables.insert(name.into(), object.id);
        self.add_object(object);
        Ok(())
    }

    pub fn push_stack_frame(&mut self, function: impl Into<String>) {
        self.stack.push(StackFrame::new(function));
    }

    /// Removes the topmost frame together with its variables and their fields.
    pub fn pop_stack_frame(&mut self) -> Option<StackFrame> {
        let frame = self.stack.pop()?;
        for &object in frame.variables.values() {
            self.remove_object(object);
        }
        Some(frame)
    }

    /// Removes an object, its scope entry and every edge from or to it.
    ///
    /// Pointers into the removed object are kept as plain values.
    pub fn remove_object(&mut self, object: ObjectId) {
        if object.is_null() {
            return;
        }
        self.objects.remove(&object);
        self.validity.remove(&object);
        self.fields.remove(&object);
        self.heap.remove(&object);
        self.globals.retain(|_, id| *id != object);
        for frame in &mut self.stack {
            frame.variables.retain(|_, id| *id != object);
        }
        self.pointers.retain(|_, pt| pt.object != object);
    }

    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(&id)
    }

    /// Like [`Smg::object`], but a missing object is a consistency violation.
    pub fn get_object(&self, id: ObjectId) -> Result<&Object> {
        self.objects.get(&id).ok_or(SmgError::UnknownObject(id))
    }

    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.objects.values()
    }

    pub fn contains_object(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn is_valid(&self, id: ObjectId) -> bool {
        self.validity.get(&id).copied().unwrap_or(false)
    }

    pub fn set_validity(&mut self, id: ObjectId, valid: bool) -> Result<()> {
        if !self.objects.contains_key(&id) {
            return Err(SmgError::UnknownObject(id));
        }
        self.validity.insert(id, valid);
        Ok(())
    }

    pub fn is_heap_object(&self, id: ObjectId) -> bool {
        self.heap.contains(&id)
    }

    pub fn heap_objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.heap.iter().copied()
    }

    // ----------------------------------------------------------------- scopes

    pub fn stack_frames(&self) -> &[StackFrame] {
        &self.stack
    }

    pub fn globals(&self) -> &BTreeMap<String, ObjectId> {
        &self.globals
    }

    /// Finds a variable in the topmost frame, falling back to the globals.
    pub fn lookup_variable(&self, name: &str) -> Option<ObjectId> {
        self.stack
            .last()
            .and_then(|frame| frame.variables.get(name))
            .or_else(|| self.globals.get(name))
            .copied()
    }

    // ----------------------------------------------------------------- values

    pub fn add_value(&mut self, value: ValueId) {
        self.values.insert(value);
    }

    /// Adds a fresh symbolic value and returns it.
    pub fn new_value(&mut self) -> ValueId {
        let value = ValueId::fresh();
        self.values.insert(value);
        value
    }

    pub fn contains_value(&self, value: ValueId) -> bool {
        self.values.contains(&value)
    }

    pub fn values(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.values.iter().copied()
    }

    pub fn set_explicit(&mut self, value: ValueId, number: impl Into<BigInt>) {
        self.values.insert(value);
        self.explicit.insert(value, number.into());
    }

    pub fn explicit(&self, value: ValueId) -> Option<&BigInt> {
        self.explicit.get(&value)
    }

    // -------------------------------------------------------- has-value edges

    /// Adds a has-value edge.
    ///
    /// Adding an edge identical to an existing one is a no-op. An edge overlapping an
    /// existing field, or not fitting its object, is a consistency violation.
    pub fn add_has_value_edge(&mut self, edge: HasValueEdge) -> Result<()> {
        let object = self.get_object(edge.object)?;
        if edge.offset.checked_add(edge.size).map_or(true, |end| end > object.size) {
            return Err(SmgError::FieldOutOfBounds {
                object: edge.object,
                offset: edge.offset,
                size: edge.size,
                object_size: object.size,
            });
        }
        let fields = self.fields.entry(edge.object).or_default();
        if fields.get(&edge.offset) == Some(&edge) {
            return Ok(());
        }
        // Only the last field starting before the new end can reach into it.
        if let Some((_, other)) = fields.range(..edge.end()).next_back() {
            if other.overlaps(edge.offset, edge.size) {
                return Err(SmgError::OverlappingField {
                    object: edge.object,
                    offset: edge.offset,
                    size: edge.size,
                });
            }
        }
        trace!("add has-value edge {}", edge);
        self.values.insert(edge.value);
        fields.insert(edge.offset, edge);
        Ok(())
    }

    pub fn remove_has_value_edge(&mut self, edge: &HasValueEdge) -> bool {
        match self.fields.get_mut(&edge.object) {
            Some(fields) if fields.get(&edge.offset) == Some(edge) => {
                fields.remove(&edge.offset);
                true
            }
            _ => false,
        }
    }

    /// Edges matching `filter`, ordered by object and offset.
    pub fn has_value_edges(&self, filter: &HasValueFilter) -> Vec<HasValueEdge> {
        match filter.object {
            Some(object) => self
                .fields
                .get(&object)
                .into_iter()
                .flat_map(|fields| fields.values())
                .filter(|edge| filter.matches(edge))
                .copied()
                .collect(),
            None => self
                .fields
                .values()
                .flat_map(|fields| fields.values())
                .filter(|edge| filter.matches(edge))
                .copied()
                .collect(),
        }
    }

    /// The edges of `object` intersecting `[offset, offset + size)`.
    pub fn overlapping_edges(&self, object: ObjectId, offset: u64, size: u64) -> Vec<HasValueEdge> {
        self.fields
            .get(&object)
            .into_iter()
            .flat_map(|fields| fields.range(..offset.saturating_add(size)).map(|(_, e)| e))
            .filter(|edge| edge.overlaps(offset, size))
            .copied()
            .collect()
    }

    /// The value of the field exactly at `[offset, offset + size)`, if any.
    pub fn field_value(&self, object: ObjectId, offset: u64, size: u64) -> Option<ValueId> {
        self.fields
            .get(&object)
            .and_then(|fields| fields.get(&offset))
            .filter(|edge| edge.size == size)
            .map(|edge| edge.value)
    }

    // ------------------------------------------------------- points-to edges

    /// Adds a points-to edge. A value pointing elsewhere already is a consistency violation.
    pub fn add_points_to_edge(&mut self, edge: PointsToEdge) -> Result<()> {
        if !self.objects.contains_key(&edge.object) {
            return Err(SmgError::UnknownObject(edge.object));
        }
        if let Some(existing) = self.pointers.get(&edge.value) {
            if *existing == edge {
                return Ok(());
            }
            return Err(SmgError::ConflictingPointsTo {
                value: edge.value,
                existing: existing.object,
                requested: edge.object,
            });
        }
        trace!("add points-to edge {}", edge);
        self.values.insert(edge.value);
        self.pointers.insert(edge.value, edge);
        Ok(())
    }

    pub fn remove_points_to_edge(&mut self, value: ValueId) -> Option<PointsToEdge> {
        if value.is_zero() {
            return None;
        }
        self.pointers.remove(&value)
    }

    pub fn pointer(&self, value: ValueId) -> Option<&PointsToEdge> {
        self.pointers.get(&value)
    }

    pub fn is_pointer(&self, value: ValueId) -> bool {
        self.pointers.contains_key(&value)
    }

    pub fn points_to_edges(&self) -> impl Iterator<Item = &PointsToEdge> {
        self.pointers.values()
    }

    /// Points-to edges targeting `object`.
    pub fn pointers_to(&self, object: ObjectId) -> Vec<PointsToEdge> {
        self.pointers.values().filter(|pt| pt.object == object).copied().collect()
    }

    /// Finds the value already denoting `object + offset` with `specifier`.
    pub fn address_value(&self, object: ObjectId, offset: u64, specifier: TargetSpecifier) -> Option<ValueId> {
        self.pointers
            .values()
            .find(|pt| pt.object == object && pt.offset == offset && pt.specifier == specifier)
            .map(|pt| pt.value)
    }

    // ------------------------------------------------------------ inequality

    pub fn add_neq(&mut self, a: ValueId, b: ValueId) {
        if a == b {
            return;
        }
        self.neq.entry(a).or_default().insert(b);
        self.neq.entry(b).or_default().insert(a);
    }

    pub fn is_neq(&self, a: ValueId, b: ValueId) -> bool {
        self.neq.get(&a).map_or(false, |set| set.contains(&b))
    }

    pub fn neqs(&self, value: ValueId) -> impl Iterator<Item = ValueId> + '_ {
        self.neq.get(&value).into_iter().flat_map(|set| set.iter().copied())
    }

    /// Each inequality once, as `(a, b)` with `a < b`.
    pub fn neq_pairs(&self) -> Vec<(ValueId, ValueId)> {
        self.neq
            .iter()
            .flat_map(|(&a, set)| set.iter().filter(move |&&b| a < b).map(move |&b| (a, b)))
            .collect()
    }

    // ----------------------------------------------------------- consistency

    /// Verifies the store invariants.
    pub fn check_consistency(&self) -> Result<()> {
        if self.pointer(ValueId::ZERO) != Some(&PointsToEdge::null()) {
            return Err(SmgError::UnknownValue(ValueId::ZERO));
        }
        for (&object, fields) in &self.fields {
            let size = self.get_object(object)?.size;
            let mut end = 0;
            for edge in fields.values() {
                if edge.offset < end {
                    return Err(SmgError::OverlappingField {
                        object,
                        offset: edge.offset,
                        size: edge.size,
                    });
                }
                if edge.end() > size {
                    return Err(SmgError::FieldOutOfBounds {
                        object,
                        offset: edge.offset,
                        size: edge.size,
                        object_size: size,
                    });
                }
                if !self.values.contains(&edge.value) {
                    return Err(SmgError::UnknownValue(edge.value));
                }
                end = edge.end();
            }
        }
        for pt in self.pointers.values() {
            self.get_object(pt.object)?;
            if !self.values.contains(&pt.value) {
                return Err(SmgError::UnknownValue(pt.value));
            }
        }
        let scoped = self
            .globals
            .values()
            .chain(self.stack.iter().flat_map(|frame| frame.variables.values()))
            .chain(self.heap.iter());
        for &object in scoped {
            self.get_object(object)?;
        }
        Ok(())
    }
}
