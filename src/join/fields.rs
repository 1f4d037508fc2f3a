//! The Field Joiner: aligns the field layouts of an object pair.
//!
//! After [`join_fields`] both objects expose the same set of `[offset, offset + size)`
//! ranges, so the caller can walk the fields of one object and find exactly one
//! counterpart in the other.

use std::collections::BTreeSet;

use log::{debug, trace};

use crate::edge::{HasValueEdge, HasValueFilter};
use crate::error::{Result, SmgError};
use crate::join::status::JoinStatus;
use crate::smg::Smg;
use crate::types::{ObjectId, ValueId};

/// Joins the field layouts of `object1` in `smg1` and `object2` in `smg2`.
///
/// Both graphs are modified in place: fields crossing a boundary of the other side
/// are split, and ranges present on one side only get a filler field on the other.
///
/// Returns the status contribution of the layout change: a side whose non-zero field
/// was split into independent pieces lost information, so the other side is more
/// specific.
pub fn join_fields(smg1: &mut Smg, smg2: &mut Smg, object1: ObjectId, object2: ObjectId) -> Result<JoinStatus> {
    let size1 = smg1.get_object(object1)?.size;
    let size2 = smg2.get_object(object2)?.size;
    if size1 != size2 {
        debug!("field join of {} and {}: sizes {}b and {}b differ", object1, object2, size1, size2);
        return Ok(JoinStatus::Incomparable);
    }

    let edges1 = smg1.has_value_edges(&HasValueFilter::object(object1));
    let edges2 = smg2.has_value_edges(&HasValueFilter::object(object2));

    let mut cuts = BTreeSet::new();
    for edge in edges1.iter().chain(edges2.iter()) {
        cuts.insert(edge.offset);
        cuts.insert(edge.end());
    }

    let mut status = JoinStatus::Equal;
    if split_fields(smg1, &edges1, &cuts)? {
        status = status.update_with(JoinStatus::RightEntail);
    }
    if split_fields(smg2, &edges2, &cuts)? {
        status = status.update_with(JoinStatus::LeftEntail);
    }

    fill_gaps(smg1, object1, smg2, object2)?;
    fill_gaps(smg2, object2, smg1, object1)?;

    if status != JoinStatus::Equal {
        debug!("field join of {} and {}: {}", object1, object2, status);
    }
    Ok(status)
}

/// Splits every edge at the cut points strictly inside it.
///
/// Zero fields split into zero pieces. Any other field splits into pieces holding
/// fresh unknown values; returns whether that happened.
fn split_fields(smg: &mut Smg, edges: &[HasValueEdge], cuts: &BTreeSet<u64>) -> Result<bool> {
    let mut coarsened = false;
    for edge in edges {
        let inner: Vec<u64> = cuts.range(edge.offset + 1..edge.end()).copied().collect();
        if inner.is_empty() {
            continue;
        }
        trace!("split {} at {:?}", edge, inner);
        smg.remove_has_value_edge(edge);

        let bounds = std::iter::once(edge.offset)
            .chain(inner.iter().copied())
            .chain(std::iter::once(edge.end()))
            .collect::<Vec<_>>();
        for piece in bounds.windows(2) {
            let value = if edge.value.is_zero() {
                ValueId::ZERO
            } else {
                coarsened = true;
                smg.new_value()
            };
            smg.add_has_value_edge(HasValueEdge::new(edge.object, piece[0], piece[1] - piece[0], value))?;
        }
    }
    Ok(coarsened)
}

/// Adds a filler field to `target` for every field of `source` without counterpart.
///
/// Fillers are zero in valid objects and unknown in invalid ones.
fn fill_gaps(target: &mut Smg, target_object: ObjectId, source: &Smg, source_object: ObjectId) -> Result<()> {
    let valid = target.is_valid(target_object);
    for edge in source.has_value_edges(&HasValueFilter::object(source_object)) {
        if target.field_value(target_object, edge.offset, edge.size).is_some() {
            continue;
        }
        let value = if valid { ValueId::ZERO } else { target.new_value() };
        trace!("fill {}[{}b+{}b] with {}", target_object, edge.offset, edge.size, value);
        target.add_has_value_edge(HasValueEdge::new(target_object, edge.offset, edge.size, value))?;
    }
    Ok(())
}

/// Verifies that two objects expose identical field layouts.
pub fn check_result_consistency(smg1: &Smg, smg2: &Smg, object1: ObjectId, object2: ObjectId) -> Result<()> {
    let layout = |smg: &Smg, object| {
        smg.has_value_edges(&HasValueFilter::object(object))
            .iter()
            .map(|edge| (edge.offset, edge.size))
            .collect::<Vec<_>>()
    };
    if layout(smg1, object1) != layout(smg2, object2) {
        return Err(SmgError::FieldSetsDiffer { object1, object2 });
    }
    Ok(())
}
