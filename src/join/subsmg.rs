//! The Sub-graph Joiner: joins the sub-graphs reachable from one object pair.

use std::collections::BTreeMap;

use log::{debug, trace};

use crate::edge::{HasValueEdge, HasValueFilter, TargetSpecifier};
use crate::error::{Result, SmgError};
use crate::join::candidate::AbstractionCandidate;
use crate::join::fields::{check_result_consistency, join_fields};
use crate::join::status::JoinStatus;
use crate::join::values::join_values;
use crate::join::JoinContext;
use crate::object::Object;
use crate::smg::Smg;
use crate::types::{Level, ObjectId, ValueId};

/// Joins `object1` of the first input and `object2` of the second into `dest_object`.
///
/// The fields of both objects are aligned first; then every field pair is joined
/// through the Value Joiner, and the joined value is stored at the same range of
/// `dest_object`. Abstraction candidates reported for a value are executed on the
/// destination once all fields are done, the first one per value.
///
/// Returns whether the join is defined; if not, the context status is
/// [`JoinStatus::Incomparable`].
pub(crate) fn join_sub_smgs(
    ctx: &mut JoinContext<'_>,
    object1: ObjectId,
    object2: ObjectId,
    dest_object: ObjectId,
    level_diff: i64,
) -> Result<bool> {
    debug!("join sub-graphs of {} and {} into {}", object1, object2, dest_object);

    let size1 = ctx.smg1.get_object(object1)?.size;
    let size2 = ctx.smg2.get_object(object2)?.size;
    if size1 != size2 {
        debug!("objects {} and {} differ in size", object1, object2);
        ctx.status = JoinStatus::Incomparable;
        return Ok(false);
    }
    let field_status = join_fields(&mut ctx.smg1, &mut ctx.smg2, object1, object2)?;
    ctx.status = ctx.status.update_with(field_status);
    if ctx.options.perform_checks {
        check_result_consistency(&ctx.smg1, &ctx.smg2, object1, object2)?;
    }

    let source1 = ctx.smg1.get_object(object1)?.clone();
    let source2 = ctx.smg2.get_object(object2)?.clone();
    let object_levels = (source1.level, source2.level);
    let parent_level = ctx.levels.require(source1.level, source2.level)?;

    let mut value_candidates: BTreeMap<ValueId, Vec<AbstractionCandidate>> = BTreeMap::new();
    let mut all_defined = true;

    for field1 in ctx.smg1.has_value_edges(&HasValueFilter::object(object1)) {
        let value2 = ctx
            .smg2
            .field_value(object2, field1.offset, field1.size)
            .ok_or(SmgError::MissingCounterpart {
                object: object2,
                offset: field1.offset,
            })?;

        let level1 = value_level(&ctx.smg1, &source1, field1.value)?;
        let level2 = value_level(&ctx.smg2, &source2, value2)?;
        let diff = level_diff + level1.diff(source1.level) - level2.diff(source2.level);

        if ctx.levels.update((level1, level2), object_levels)?.is_none() {
            debug!(
                "no level mapping for values at ({},{}) below objects at ({},{})",
                level1, level2, source1.level, source2.level
            );
            ctx.status = JoinStatus::Incomparable;
            return Ok(false);
        }

        let join = join_values(ctx, field1.value, value2, field1.size, diff, parent_level)?;
        if !join.is_defined() && !join.recoverable {
            ctx.status = JoinStatus::Incomparable;
            return Ok(false);
        }

        match join.value {
            Some(value) => {
                // A self-referential field may already be in place.
                if ctx.dest.field_value(dest_object, field1.offset, field1.size) != Some(value) {
                    let edge = HasValueEdge::new(dest_object, field1.offset, field1.size, value);
                    trace!("dest field {}", edge);
                    ctx.dest.add_has_value_edge(edge)?;
                }
                if !join.candidates.is_empty() {
                    value_candidates.insert(value, join.candidates);
                }
            }
            None => all_defined = false,
        }
    }

    if !all_defined {
        ctx.status = JoinStatus::Incomparable;
        return Ok(false);
    }

    for candidates in value_candidates.values() {
        let Some(candidate) = candidates.first() else {
            continue;
        };
        match candidate.execute(&mut ctx.dest)? {
            Some(folded) => {
                let AbstractionCandidate::FoldListSegment { head, successor, .. } = *candidate;
                for old in [head, successor] {
                    ctx.mapping1.retarget_object(old, folded);
                    ctx.mapping2.retarget_object(old, folded);
                }
            }
            None => {
                ctx.status = JoinStatus::Incomparable;
                return Ok(false);
            }
        }
    }

    Ok(true)
}

/// Nesting level a field value leads to: the level of its target for pointers
/// (one below the owner for pointers to all nodes of a segment), level 0 otherwise.
fn value_level(smg: &Smg, owner: &Object, value: ValueId) -> Result<Level> {
    match smg.pointer(value) {
        Some(pt) if pt.specifier == TargetSpecifier::All => Ok(owner.level.next()),
        Some(pt) => Ok(smg.get_object(pt.object)?.level),
        None => Ok(Level::ZERO),
    }
}
