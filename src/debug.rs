//! Debug utilities for inspecting memory graphs.
//!
//! These are primarily useful in tests and during development.

use std::fmt::Write;

use crate::edge::{HasValueEdge, HasValueFilter, PointsToEdge};
use crate::object::Object;
use crate::smg::Smg;
use crate::types::ObjectId;

/// Detailed information about a single object.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub object: Object,
    /// Variable name, if the object is a variable
    pub variable: Option<String>,
    pub is_heap: bool,
    pub is_valid: bool,
    /// Outgoing has-value edges, ordered by offset
    pub fields: Vec<HasValueEdge>,
    /// Incoming points-to edges
    pub pointers: Vec<PointsToEdge>,
}

impl std::fmt::Display for ObjectInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(variable) = &self.variable {
            write!(f, "{}: ", variable)?;
        }
        write!(f, "{}", self.object)?;
        if self.is_heap {
            write!(f, " heap")?;
        }
        if !self.is_valid && !self.object.is_null() {
            write!(f, " invalid")?;
        }
        write!(f, ", {} fields, {} pointers", self.fields.len(), self.pointers.len())
    }
}

impl Smg {
    /// Get detailed information about a single object.
    pub fn object_info(&self, id: ObjectId) -> Option<ObjectInfo> {
        let object = self.object(id)?.clone();
        let variable = self
            .globals()
            .iter()
            .chain(self.stack_frames().iter().flat_map(|frame| frame.variables.iter()))
            .find(|&(_, &o)| o == id)
            .map(|(name, _)| name.clone());

        Some(ObjectInfo {
            object,
            variable,
            is_heap: self.is_heap_object(id),
            is_valid: self.is_valid(id),
            fields: self.has_value_edges(&HasValueFilter::object(id)),
            pointers: self.pointers_to(id),
        })
    }

    /// Print a compact representation of the graph, one object per line, with its fields.
    pub fn debug_string(&self) -> String {
        let mut result = String::new();
        writeln!(
            &mut result,
            "SMG ({} objects, {} values):",
            self.objects().count(),
            self.values().count()
        )
        .ok();
        for object in self.objects() {
            let Some(info) = self.object_info(object.id) else {
                continue;
            };
            writeln!(&mut result, "  {}", info).ok();
            for field in &info.fields {
                let explicit = self
                    .explicit(field.value)
                    .map_or(String::new(), |n| format!(" = {}", n));
                writeln!(&mut result, "    {}{}", field, explicit).ok();
            }
        }
        for (a, b) in self.neq_pairs() {
            writeln!(&mut result, "  {} != {}", a, b).ok();
        }
        result
    }
}
