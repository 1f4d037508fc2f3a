//! The Value Joiner.
//!
//! Decides, for one pair of values (one per input), which destination value stands
//! for both. Pointer pairs pull their target objects into the destination and join
//! them recursively through the Sub-graph Joiner.

use log::{debug, trace};
use num_bigint::BigInt;

use crate::edge::{PointsToEdge, TargetSpecifier};
use crate::error::{Result, SmgError};
use crate::join::candidate::AbstractionCandidate;
use crate::join::status::JoinStatus;
use crate::join::subsmg::join_sub_smgs;
use crate::join::JoinContext;
use crate::object::{Object, ObjectKind};
use crate::smg::Smg;
use crate::types::{Level, ObjectId, ValueId};

/// Outcome of joining one value pair.
#[derive(Debug, Clone, Default)]
pub(crate) struct ValueJoin {
    /// The destination value, if the join is defined.
    pub value: Option<ValueId>,
    /// An undefined join that a list abstraction might still reconcile.
    pub recoverable: bool,
    /// Abstractions that should run on the destination once the enclosing object is joined.
    pub candidates: Vec<AbstractionCandidate>,
}

impl ValueJoin {
    fn defined(value: ValueId) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    fn undefined() -> Self {
        Self::default()
    }

    pub fn is_defined(&self) -> bool {
        self.value.is_some()
    }
}

/// Joins `value1` of the first input with `value2` of the second.
///
/// `size` is the width of the field both values are read from, `level_diff` the
/// accumulated level difference of the two sides, and `parent_level` the
/// destination level of the object owning the field.
pub(crate) fn join_values(
    ctx: &mut JoinContext<'_>,
    value1: ValueId,
    value2: ValueId,
    size: u64,
    level_diff: i64,
    parent_level: Level,
) -> Result<ValueJoin> {
    if value1.is_zero() && value2.is_zero() {
        return Ok(ValueJoin::defined(ValueId::ZERO));
    }

    if let Some(&value) = ctx.joined_values.get(&(value1, value2)) {
        return Ok(ValueJoin::defined(value));
    }

    // Zero is never mapped: it may pair with many values.
    let mapped1 = (!value1.is_zero()).then(|| ctx.mapping1.value(value1)).flatten();
    let mapped2 = (!value2.is_zero()).then(|| ctx.mapping2.value(value2)).flatten();
    if mapped1.is_some() || mapped2.is_some() {
        debug!(
            "values {} and {} already joined with other counterparts ({:?}, {:?})",
            value1, value2, mapped1, mapped2
        );
        return Ok(ValueJoin::undefined());
    }

    match (is_address(&ctx.smg1, value1), is_address(&ctx.smg2, value2)) {
        (false, false) => join_scalars(ctx, value1, value2, size, level_diff),
        (true, true) => join_pointers(ctx, value1, value2, level_diff, parent_level),
        _ => Ok(mismatch(ctx, value1, value2)),
    }
}

/// A value with a points-to edge other than the zero value.
fn is_address(smg: &Smg, value: ValueId) -> bool {
    !value.is_zero() && smg.is_pointer(value)
}

fn points_to_list(smg: &Smg, value: ValueId) -> bool {
    smg.pointer(value)
        .and_then(|pt| smg.object(pt.object))
        .map_or(false, Object::is_list_segment)
}

/// An undefined join, recoverable if a list segment could absorb the difference.
fn mismatch(ctx: &JoinContext<'_>, value1: ValueId, value2: ValueId) -> ValueJoin {
    let recoverable = ctx.options.heap_abstraction
        && (points_to_list(&ctx.smg1, value1) || points_to_list(&ctx.smg2, value2));
    debug!(
        "values {} and {} not joinable{}",
        value1,
        value2,
        if recoverable { " (recoverable)" } else { "" }
    );
    ValueJoin {
        recoverable,
        ..ValueJoin::default()
    }
}

fn record(ctx: &mut JoinContext<'_>, value1: ValueId, value2: ValueId, dest: ValueId) -> Result<()> {
    if !value1.is_zero() {
        ctx.mapping1.map_value(value1, dest)?;
    }
    if !value2.is_zero() {
        ctx.mapping2.map_value(value2, dest)?;
    }
    ctx.joined_values.insert((value1, value2), dest);
    ctx.dest.add_value(dest);
    trace!("value pair ({}, {}) -> {}", value1, value2, dest);
    Ok(())
}

/// Status of joining two unconstrained values across differing nesting depths.
fn level_status(level_diff: i64) -> JoinStatus {
    match level_diff {
        d if d < 0 => JoinStatus::LeftEntail,
        d if d > 0 => JoinStatus::RightEntail,
        _ => JoinStatus::Equal,
    }
}

fn join_scalars(ctx: &mut JoinContext<'_>, value1: ValueId, value2: ValueId, size: u64, level_diff: i64) -> Result<ValueJoin> {
    let explicit1 = ctx.smg1.explicit(value1).cloned();
    let explicit2 = ctx.smg2.explicit(value2).cloned();
    let model = *ctx.dest.machine_model();

    let shared = value1 == value2;
    let (dest, status) = match (explicit1, explicit2) {
        (Some(a), Some(b)) if model.same_bits(&a, &b, size) => {
            let dest = if shared {
                value1
            } else if model.normalize(&a, size, false) == BigInt::from(0) {
                ValueId::ZERO
            } else {
                ValueId::fresh()
            };
            if !dest.is_zero() {
                ctx.dest.set_explicit(dest, a);
            }
            (dest, JoinStatus::Equal)
        }
        (Some(a), Some(b)) => {
            debug!("values {} = {} and {} = {} differ", value1, a, value2, b);
            return Ok(ValueJoin::undefined());
        }
        // Only one side knows the number: the destination keeps the symbol without it.
        (Some(_), None) => (if shared { value1 } else { ValueId::fresh() }, JoinStatus::LeftEntail),
        (None, Some(_)) => (if shared { value1 } else { ValueId::fresh() }, JoinStatus::RightEntail),
        (None, None) if shared => (value1, JoinStatus::Equal),
        (None, None) => (ValueId::fresh(), level_status(level_diff)),
    };

    record(ctx, value1, value2, dest)?;
    ctx.status = ctx.status.update_with(status);
    Ok(ValueJoin::defined(dest))
}

fn join_pointers(
    ctx: &mut JoinContext<'_>,
    value1: ValueId,
    value2: ValueId,
    level_diff: i64,
    parent_level: Level,
) -> Result<ValueJoin> {
    let pt1 = *ctx.smg1.pointer(value1).ok_or(SmgError::UnknownValue(value1))?;
    let pt2 = *ctx.smg2.pointer(value2).ok_or(SmgError::UnknownValue(value2))?;
    if pt1.offset != pt2.offset {
        debug!("pointers {} and {} differ in offset", pt1, pt2);
        return Ok(mismatch(ctx, value1, value2));
    }

    let target1 = pt1.object;
    let target2 = pt2.object;
    let (dest_object, fresh) = match (ctx.mapping1.object(target1), ctx.mapping2.object(target2)) {
        _ if target1.is_null() && target2.is_null() => (ObjectId::NULL, false),
        (Some(d1), Some(d2)) if d1 == d2 => (d1, false),
        (None, None) if !target1.is_null() && !target2.is_null() => match join_target_objects(ctx, target1, target2)? {
            Some(dest) => (dest, true),
            None => return Ok(mismatch(ctx, value1, value2)),
        },
        _ => return Ok(mismatch(ctx, value1, value2)),
    };

    let target = ctx.dest.get_object(dest_object)?;
    let specifier = match combine_specifiers(pt1.specifier, pt2.specifier, target.is_list_segment()) {
        Some(TargetSpecifier::All) if target.level != parent_level.next() => None,
        s => s,
    };
    let Some(specifier) = specifier else {
        debug!("target specifiers of {} and {} do not combine", pt1, pt2);
        return Ok(mismatch(ctx, value1, value2));
    };

    let existing = ctx.dest.address_value(dest_object, pt1.offset, specifier);
    let dest_value = match existing {
        Some(value) if value1 != value2 => value,
        _ => {
            let value = if value1 == value2 { value1 } else { ValueId::fresh() };
            ctx.dest
                .add_points_to_edge(PointsToEdge::new(value, dest_object, pt1.offset, specifier))?;
            value
        }
    };
    record(ctx, value1, value2, dest_value)?;

    if !fresh {
        return Ok(ValueJoin::defined(dest_value));
    }

    if !join_sub_smgs(ctx, target1, target2, dest_object, level_diff)? {
        return Ok(ValueJoin::undefined());
    }

    let mut join = ValueJoin::defined(dest_value);
    if ctx.options.heap_abstraction && !ctx.identical_inputs {
        join.candidates = AbstractionCandidate::find(&ctx.dest, dest_object);
    }
    Ok(join)
}

/// Places the counterpart of the target pair `(target1, target2)` into the destination.
///
/// Returns `None` if the targets cannot stand for the same memory.
fn join_target_objects(ctx: &mut JoinContext<'_>, target1: ObjectId, target2: ObjectId) -> Result<Option<ObjectId>> {
    let object1 = ctx.smg1.get_object(target1)?.clone();
    let object2 = ctx.smg2.get_object(target2)?.clone();

    if object1.size != object2.size {
        debug!("targets {} and {} differ in size", object1, object2);
        return Ok(None);
    }
    let valid = ctx.smg1.is_valid(target1);
    if valid != ctx.smg2.is_valid(target2) {
        debug!("targets {} and {} differ in validity", object1, object2);
        return Ok(None);
    }
    let Some((kind, status)) = join_kinds(&object1.kind, &object2.kind) else {
        debug!("targets {} and {} have incompatible kinds", object1, object2);
        return Ok(None);
    };
    let Some(level) = ctx.levels.get(object1.level, object2.level) else {
        debug!("no level mapping for targets {} and {}", object1, object2);
        return Ok(None);
    };

    let id = if target1 == target2 { target1 } else { ObjectId::fresh() };
    let object = Object::new(id, object1.size, level, kind, object1.label.clone());
    debug!("join targets {} and {} into {} ({})", target1, target2, object, status);

    if ctx.smg1.is_heap_object(target1) || ctx.smg2.is_heap_object(target2) {
        ctx.dest.add_heap_object(object);
    } else {
        ctx.dest.add_object(object);
    }
    ctx.dest.set_validity(id, valid)?;
    ctx.mapping1.map_object(target1, id)?;
    ctx.mapping2.map_object(target2, id)?;
    ctx.status = ctx.status.update_with(status);
    Ok(Some(id))
}

/// Combines two object kinds; the status says which side was more specific.
pub fn join_kinds(kind1: &ObjectKind, kind2: &ObjectKind) -> Option<(ObjectKind, JoinStatus)> {
    use ObjectKind::*;

    match (kind1, kind2) {
        (Region, Region) => Some((Region, JoinStatus::Equal)),
        (
            ListSegment {
                head_offset: h1,
                next_offset: n1,
                prev_offset: p1,
                min_length: m1,
            },
            ListSegment {
                head_offset: h2,
                next_offset: n2,
                prev_offset: p2,
                min_length: m2,
            },
        ) if h1 == h2 && n1 == n2 && p1 == p2 => {
            let status = match m1.cmp(m2) {
                std::cmp::Ordering::Less => JoinStatus::RightEntail,
                std::cmp::Ordering::Greater => JoinStatus::LeftEntail,
                std::cmp::Ordering::Equal => JoinStatus::Equal,
            };
            let kind = ListSegment {
                head_offset: *h1,
                next_offset: *n1,
                prev_offset: *p1,
                min_length: (*m1).min(*m2),
            };
            Some((kind, status))
        }
        (Region, segment @ ListSegment { min_length, .. }) if *min_length <= 1 => {
            Some((segment.clone(), JoinStatus::LeftEntail))
        }
        (segment @ ListSegment { min_length, .. }, Region) if *min_length <= 1 => {
            Some((segment.clone(), JoinStatus::RightEntail))
        }
        (Region, Optional) => Some((Optional, JoinStatus::LeftEntail)),
        (Optional, Region) => Some((Optional, JoinStatus::RightEntail)),
        (Optional, Optional) => Some((Optional, JoinStatus::Equal)),
        (GenericAbstraction { id: a }, GenericAbstraction { id: b }) if a == b => {
            Some((GenericAbstraction { id: *a }, JoinStatus::Equal))
        }
        _ => None,
    }
}

/// Combines the target specifiers of two pointers to the same destination object.
pub fn combine_specifiers(
    specifier1: TargetSpecifier,
    specifier2: TargetSpecifier,
    to_list_segment: bool,
) -> Option<TargetSpecifier> {
    use TargetSpecifier::*;

    match (specifier1, specifier2) {
        (Region, Region) if to_list_segment => Some(First),
        (a, b) if a == b => Some(a),
        (Region, s @ (First | Last)) | (s @ (First | Last), Region) if to_list_segment => Some(s),
        _ => None,
    }
}
