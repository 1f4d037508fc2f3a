//! Abstraction candidates found while joining.
//!
//! A candidate is a summarization of the destination graph that the join may run
//! once the object pair owning it is fully joined. The only kind so far folds a
//! concrete list node and its successor into one list segment.

use std::fmt;

use log::debug;

use crate::edge::{HasValueEdge, HasValueFilter, PointsToEdge, TargetSpecifier};
use crate::error::Result;
use crate::object::{Object, ObjectKind};
use crate::smg::Smg;
use crate::types::ObjectId;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum AbstractionCandidate {
    /// Fold `head` and `successor` (linked through the field at `next_offset`) into a
    /// singly-linked list segment.
    FoldListSegment {
        head: ObjectId,
        successor: ObjectId,
        next_offset: u64,
    },
}

/// The parts of a foldable node pair.
struct Fold {
    head: Object,
    successor: Object,
    link: HasValueEdge,
}

impl AbstractionCandidate {
    /// Finds the candidates rooted at `object` in `smg`.
    pub fn find(smg: &Smg, object: ObjectId) -> Vec<AbstractionCandidate> {
        smg.has_value_edges(&HasValueFilter::object(object))
            .into_iter()
            .filter_map(|edge| {
                let successor = smg.pointer(edge.value)?.object;
                let candidate = AbstractionCandidate::FoldListSegment {
                    head: object,
                    successor,
                    next_offset: edge.offset,
                };
                candidate.check(smg).map(|_| candidate)
            })
            .collect()
    }

    /// Runs the abstraction on `smg`.
    ///
    /// Returns the new object, or `None` if the preconditions no longer hold.
    pub fn execute(&self, smg: &mut Smg) -> Result<Option<ObjectId>> {
        let Some(fold) = self.check(smg) else {
            debug!("candidate {} no longer applies", self);
            return Ok(None);
        };
        let Fold { head, successor, link } = fold;

        let kind = ObjectKind::ListSegment {
            head_offset: 0,
            next_offset: link.offset,
            prev_offset: None,
            min_length: 1 + successor.min_length(),
        };
        let segment = Object::new(ObjectId::fresh(), head.size, head.level, kind, head.label.clone());
        let id = segment.id;

        let mut fields: Vec<HasValueEdge> = smg
            .has_value_edges(&HasValueFilter::object(head.id))
            .into_iter()
            .filter(|edge| edge.offset != link.offset)
            .collect();
        fields.extend(smg.has_value_edges(&HasValueFilter::object(successor.id).at_offset(link.offset)));
        let incoming = smg.pointers_to(head.id);
        let valid = smg.is_valid(head.id);

        smg.remove_points_to_edge(link.value);
        smg.remove_object(head.id);
        smg.remove_object(successor.id);

        smg.add_heap_object(segment);
        smg.set_validity(id, valid)?;
        for edge in fields {
            smg.add_has_value_edge(HasValueEdge::new(id, edge.offset, edge.size, edge.value))?;
        }
        for pt in incoming {
            let specifier = match pt.specifier {
                TargetSpecifier::Region => TargetSpecifier::First,
                s => s,
            };
            smg.add_points_to_edge(PointsToEdge::new(pt.value, id, pt.offset, specifier))?;
        }

        debug!("folded {} and {} into {}", head.id, successor.id, id);
        Ok(Some(id))
    }

    fn check(&self, smg: &Smg) -> Option<Fold> {
        let AbstractionCandidate::FoldListSegment {
            head,
            successor,
            next_offset,
        } = *self;

        if head == successor || !smg.is_heap_object(head) || !smg.is_heap_object(successor) {
            return None;
        }
        let head_object = smg.object(head)?;
        let successor_object = smg.object(successor)?;
        if head_object.kind != ObjectKind::Region
            || head_object.size != successor_object.size
            || head_object.level != successor_object.level
            || smg.is_valid(head) != smg.is_valid(successor)
        {
            return None;
        }
        match successor_object.kind {
            ObjectKind::Region => {}
            ObjectKind::ListSegment {
                head_offset: 0,
                next_offset: n,
                prev_offset: None,
                ..
            } if n == next_offset => {}
            _ => return None,
        }

        let link = *smg
            .has_value_edges(&HasValueFilter::object(head).at_offset(next_offset))
            .first()?;
        let pt = smg.pointer(link.value)?;
        if pt.object != successor || pt.offset != 0 {
            return None;
        }
        // The link must be the only way into the successor.
        if smg.pointers_to(successor).len() != 1
            || smg.has_value_edges(&HasValueFilter::any().with_value(link.value)).len() != 1
        {
            return None;
        }

        let others = |object| {
            smg.has_value_edges(&HasValueFilter::object(object))
                .into_iter()
                .filter(|edge| edge.offset != next_offset)
                .map(|edge| (edge.offset, edge.size, edge.value))
                .collect::<Vec<_>>()
        };
        if others(head) != others(successor) {
            return None;
        }

        Some(Fold {
            head: head_object.clone(),
            successor: successor_object.clone(),
            link,
        })
    }
}

impl fmt::Display for AbstractionCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbstractionCandidate::FoldListSegment {
                head,
                successor,
                next_offset,
            } => write!(f, "fold({} -> {} at {}b)", head, successor, next_offset),
        }
    }
}
