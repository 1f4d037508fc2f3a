//! Abstract reachability graph and its coverage-aware stop operator.
//!
//! The [`Arg`] records which state was derived from which, which states cover which,
//! and into which state a state was merged. Nodes live in an arena and are addressed
//! by [`ArgStateId`]; removing a node detaches it without freeing its slot.
//!
//! [`ArgStopSep`] wraps the stop operator of the underlying domain and keeps the
//! graph in sync with its coverage decisions.

use std::collections::BTreeSet;
use std::fmt;
use std::slice;

use log::{debug, warn};

use crate::cpa::{AbstractState, StopOperator};
use crate::error::{Result, SmgError};
use crate::options::SmgOptions;

/// Index of a node in an [`Arg`]. Smaller ids were created earlier.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ArgStateId(usize);

impl ArgStateId {
    pub fn index(self) -> usize {
        self.0
    }

    /// Checks whether `self` was created before `other`.
    pub fn is_older_than(self, other: ArgStateId) -> bool {
        self.0 < other.0
    }
}

impl fmt::Display for ArgStateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct ArgState<S> {
    state: S,
    parents: Vec<ArgStateId>,
    children: Vec<ArgStateId>,
    covered_by: Option<ArgStateId>,
    covers: BTreeSet<ArgStateId>,
    merged_with: Option<ArgStateId>,
    may_cover: bool,
    destroyed: bool,
}

impl<S> ArgState<S> {
    fn new(state: S) -> Self {
        Self {
            state,
            parents: Vec::new(),
            children: Vec::new(),
            covered_by: None,
            covers: BTreeSet::new(),
            merged_with: None,
            may_cover: true,
            destroyed: false,
        }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn parents(&self) -> &[ArgStateId] {
        &self.parents
    }

    pub fn children(&self) -> &[ArgStateId] {
        &self.children
    }

    pub fn covered_by(&self) -> Option<ArgStateId> {
        self.covered_by
    }

    pub fn is_covered(&self) -> bool {
        self.covered_by.is_some()
    }

    pub fn covers(&self) -> impl Iterator<Item = ArgStateId> + '_ {
        self.covers.iter().copied()
    }

    pub fn merged_with(&self) -> Option<ArgStateId> {
        self.merged_with
    }

    /// Whether this state may cover others: not excluded, not covered itself, not removed.
    pub fn may_cover(&self) -> bool {
        self.may_cover && !self.is_covered() && !self.destroyed
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

#[derive(Debug, Clone)]
pub struct Arg<S> {
    nodes: Vec<ArgState<S>>,
}

impl<S> Default for Arg<S> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

impl<S> Arg<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: ArgStateId) -> &ArgState<S> {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: ArgStateId) -> &mut ArgState<S> {
        &mut self.nodes[id.0]
    }

    /// Nodes still attached to the graph.
    pub fn live_nodes(&self) -> impl Iterator<Item = ArgStateId> + '_ {
        (0..self.nodes.len())
            .map(ArgStateId)
            .filter(|&id| !self.node(id).destroyed)
    }

    pub fn add_root(&mut self, state: S) -> ArgStateId {
        let id = ArgStateId(self.nodes.len());
        self.nodes.push(ArgState::new(state));
        id
    }

    /// Adds `state` as a successor of `parent`.
    pub fn add_child(&mut self, parent: ArgStateId, state: S) -> ArgStateId {
        let id = self.add_root(state);
        self.add_parent(id, parent);
        id
    }

    pub fn add_parent(&mut self, child: ArgStateId, parent: ArgStateId) {
        if !self.node(child).parents.contains(&parent) {
            self.node_mut(child).parents.push(parent);
            self.node_mut(parent).children.push(child);
        }
    }

    pub fn set_merged_with(&mut self, id: ArgStateId, merged_with: ArgStateId) {
        self.node_mut(id).merged_with = Some(merged_with);
    }

    pub fn set_may_cover(&mut self, id: ArgStateId, may_cover: bool) {
        self.node_mut(id).may_cover = may_cover;
    }

    /// Marks `id` as covered by `covering`.
    pub fn set_covered(&mut self, id: ArgStateId, covering: ArgStateId) -> Result<()> {
        if self.node(id).is_covered() || self.node(covering).is_covered() {
            return Err(SmgError::InvalidCoverage(format!(
                "cannot cover {} by {}: already covered",
                id, covering
            )));
        }
        self.node_mut(id).covered_by = Some(covering);
        self.node_mut(covering).covers.insert(id);
        Ok(())
    }

    /// Detaches `id` from the graph.
    ///
    /// States covered by `id` become uncovered.
    pub fn remove_from_arg(&mut self, id: ArgStateId) {
        debug!("remove {} from ARG", id);
        let parents = std::mem::take(&mut self.node_mut(id).parents);
        for parent in parents {
            self.node_mut(parent).children.retain(|&c| c != id);
        }
        let children = std::mem::take(&mut self.node_mut(id).children);
        for child in children {
            self.node_mut(child).parents.retain(|&p| p != id);
        }
        let covers = std::mem::take(&mut self.node_mut(id).covers);
        for covered in covers {
            self.node_mut(covered).covered_by = None;
        }
        if let Some(covering) = self.node_mut(id).covered_by.take() {
            self.node_mut(covering).covers.remove(&id);
        }
        self.node_mut(id).destroyed = true;
    }
}

/// Stop operator that records coverage in an [`Arg`].
///
/// A new state is first checked against the state it was merged into; if covered
/// there it leaves the graph. Otherwise it is checked against every reached state
/// older than itself; on success it is marked covered, and it is dropped from the
/// graph when its only parent is also a parent of the covering state.
#[derive(Debug, Clone)]
pub struct ArgStopSep<O> {
    wrapped: O,
    keep_covered_states_in_reached: bool,
    cover_target_states: bool,
    in_cpa_enabled_analysis: bool,
}

impl<O> ArgStopSep<O> {
    pub fn new(wrapped: O, options: &SmgOptions) -> Self {
        Self {
            wrapped,
            keep_covered_states_in_reached: options.keep_covered_states_in_reached,
            cover_target_states: options.cover_target_states,
            in_cpa_enabled_analysis: options.in_cpa_enabled_analysis,
        }
    }

    pub fn wrapped(&self) -> &O {
        &self.wrapped
    }

    /// Decides whether `element` is covered by one of `reached`.
    ///
    /// Returns `true` iff `element` need not be explored further and need not be
    /// added to the reached set.
    pub fn stop<S>(&self, arg: &mut Arg<S>, element: ArgStateId, reached: &[ArgStateId]) -> Result<bool>
    where
        S: AbstractState,
        O: StopOperator<S>,
    {
        if arg.node(element).is_covered() {
            return Err(SmgError::InvalidCoverage(format!(
                "stop on already covered state {}",
                element
            )));
        }

        if let Some(merged_with) = arg.node(element).merged_with {
            if reached.contains(&merged_with) {
                let covered = self.wrapped.stop(
                    arg.node(element).state(),
                    slice::from_ref(arg.node(merged_with).state()),
                )?;
                if covered {
                    if self.in_cpa_enabled_analysis {
                        arg.set_covered(element, merged_with)?;
                    } else {
                        arg.remove_from_arg(element);
                    }
                    debug!("{} covered by {} it was merged into", element, merged_with);
                    return Ok(true);
                }
                warn!("{} was merged into {} but is not covered by it", element, merged_with);
            } else {
                warn!("{} was merged into {} which is not reached", element, merged_with);
            }
        }

        if !self.cover_target_states && arg.node(element).state().is_target() {
            return Ok(false);
        }

        let parent = match arg.node(element).parents() {
            [parent] => Some(*parent),
            _ => None,
        };

        for &other in reached {
            if self.covered_by(arg, element, other)? {
                if let Some(parent) = parent {
                    if arg.node(other).parents().contains(&parent) {
                        arg.remove_from_arg(element);
                        return Ok(true);
                    }
                }
                return Ok(!self.keep_covered_states_in_reached);
            }
        }
        Ok(false)
    }

    fn covered_by<S>(&self, arg: &mut Arg<S>, element: ArgStateId, other: ArgStateId) -> Result<bool>
    where
        S: AbstractState,
        O: StopOperator<S>,
    {
        if !arg.node(other).may_cover() || element == other || element.is_older_than(other) {
            return Ok(false);
        }
        let covered = self
            .wrapped
            .stop(arg.node(element).state(), slice::from_ref(arg.node(other).state()))?;
        if covered {
            arg.set_covered(element, other)?;
        }
        Ok(covered)
    }

    /// Checks whether `element` could be forced to be covered by `reached`.
    pub fn is_forced_covering_possible<S>(&self, arg: &Arg<S>, element: ArgStateId, reached: ArgStateId) -> Result<bool>
    where
        S: AbstractState,
        O: StopOperator<S>,
    {
        let other = arg.node(reached);
        if !other.may_cover() || element.is_older_than(reached) {
            return Ok(false);
        }
        self.wrapped
            .is_forced_covering_possible(arg.node(element).state(), other.state())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    /// Toy domain: a closed interval, covered by any enclosing one. The flag marks targets.
    #[derive(Debug, Clone, PartialEq)]
    struct Interval(i32, i32, bool);

    impl AbstractState for Interval {
        fn is_target(&self) -> bool {
            self.2
        }
    }

    struct Contains;

    impl StopOperator<Interval> for Contains {
        fn stop(&self, state: &Interval, reached: &[Interval]) -> Result<bool> {
            Ok(reached.iter().any(|r| r.0 <= state.0 && state.1 <= r.1))
        }

        fn is_forced_covering_possible(&self, _state: &Interval, _reached: &Interval) -> Result<bool> {
            Ok(true)
        }
    }

    fn stop_op(options: &SmgOptions) -> ArgStopSep<Contains> {
        ArgStopSep::new(Contains, options)
    }

    #[test]
    fn test_arg_structure() {
        let mut arg = Arg::new();
        let root = arg.add_root(Interval(0, 10, false));
        let a = arg.add_child(root, Interval(0, 5, false));
        let b = arg.add_child(root, Interval(5, 10, false));
        assert_eq!(arg.node(root).children(), &[a, b]);
        assert!(root.is_older_than(a));

        arg.set_covered(b, a).unwrap();
        assert!(arg.set_covered(b, a).is_err());
        assert_eq!(arg.node(a).covers().collect::<Vec<_>>(), vec![b]);

        arg.remove_from_arg(a);
        assert!(arg.node(a).is_destroyed());
        assert!(!arg.node(b).is_covered());
        assert_eq!(arg.node(root).children(), &[b]);
        assert_eq!(arg.live_nodes().collect::<Vec<_>>(), vec![root, b]);
    }

    #[test]
    fn test_covered_by_sibling_is_removed() {
        let options = SmgOptions::default();
        let mut arg = Arg::new();
        let root = arg.add_root(Interval(0, 10, false));
        let wide = arg.add_child(root, Interval(0, 5, false));
        let narrow = arg.add_child(root, Interval(1, 2, false));

        assert!(stop_op(&options).stop(&mut arg, narrow, &[wide, root]).unwrap());
        assert!(arg.node(narrow).is_destroyed());
        assert_eq!(arg.node(root).children(), &[wide]);
    }

    #[test]
    fn test_covered_by_non_sibling_stays_covered() {
        let options = SmgOptions::default();
        let mut arg = Arg::new();
        let root = arg.add_root(Interval(0, 10, false));
        let left = arg.add_child(root, Interval(0, 5, false));
        let right = arg.add_child(root, Interval(0, 10, false));
        let deep = arg.add_child(right, Interval(1, 2, false));

        assert!(stop_op(&options).stop(&mut arg, deep, &[root, left]).unwrap());
        assert_eq!(arg.node(deep).covered_by(), Some(root));
        assert!(!arg.node(deep).is_destroyed());

        let keep = SmgOptions::default().with_keep_covered_states_in_reached(true);
        let other = arg.add_child(right, Interval(1, 3, false));
        assert!(!stop_op(&keep).stop(&mut arg, other, &[left]).unwrap());
        assert_eq!(arg.node(other).covered_by(), Some(left));
    }

    #[test]
    fn test_newer_or_non_covering_states_do_not_cover() {
        let options = SmgOptions::default();
        let mut arg = Arg::new();
        let root = arg.add_root(Interval(1, 2, false));
        let child = arg.add_child(root, Interval(0, 10, false));
        assert!(!stop_op(&options).stop(&mut arg, root, &[root, child]).unwrap());

        let other = arg.add_child(root, Interval(0, 10, false));
        let late = arg.add_child(other, Interval(2, 3, false));
        arg.set_may_cover(child, false);
        assert!(!stop_op(&options).stop(&mut arg, late, &[child]).unwrap());
    }

    #[test]
    fn test_covered_states_kept_in_reached_do_not_cover() {
        let keep = SmgOptions::default().with_keep_covered_states_in_reached(true);
        let mut arg = Arg::new();
        let root = arg.add_root(Interval(0, 10, false));
        let a = arg.add_child(root, Interval(0, 5, false));
        let b = arg.add_child(a, Interval(1, 2, false));

        assert!(!stop_op(&keep).stop(&mut arg, a, &[root]).unwrap());
        assert_eq!(arg.node(a).covered_by(), Some(root));
        assert!(!arg.node(a).may_cover());

        assert!(!stop_op(&keep).stop(&mut arg, b, &[a, root]).unwrap());
        assert_eq!(arg.node(b).covered_by(), Some(root));
        assert!(!stop_op(&keep).is_forced_covering_possible(&arg, b, a).unwrap());
    }

    #[test]
    fn test_target_states() {
        let mut arg = Arg::new();
        let root = arg.add_root(Interval(0, 10, false));
        let error = arg.add_child(root, Interval(1, 2, true));
        assert!(!stop_op(&SmgOptions::default()).stop(&mut arg, error, &[root]).unwrap());

        let cover = SmgOptions::default().with_cover_target_states(true);
        assert!(stop_op(&cover).stop(&mut arg, error, &[root]).unwrap());
    }

    #[test]
    fn test_merged_shortcut() {
        let options = SmgOptions::default();
        let mut arg = Arg::new();
        let root = arg.add_root(Interval(0, 10, false));
        let merged = arg.add_child(root, Interval(0, 5, false));
        let element = arg.add_child(root, Interval(1, 2, false));
        arg.set_merged_with(element, merged);
        assert!(stop_op(&options).stop(&mut arg, element, &[merged]).unwrap());
        assert!(arg.node(element).is_destroyed());

        let enabled = SmgOptions::default().with_in_cpa_enabled_analysis(true);
        let again = arg.add_child(root, Interval(1, 3, false));
        arg.set_merged_with(again, merged);
        assert!(stop_op(&enabled).stop(&mut arg, again, &[merged]).unwrap());
        assert_eq!(arg.node(again).covered_by(), Some(merged));

        // Merged-with state outside the reached set: fall back to the usual checks.
        let third = arg.add_child(root, Interval(6, 7, false));
        arg.set_merged_with(third, merged);
        assert!(!stop_op(&options).stop(&mut arg, third, &[]).unwrap());
    }

    #[test]
    fn test_forced_covering() {
        let options = SmgOptions::default();
        let mut arg = Arg::new();
        let root = arg.add_root(Interval(0, 1, false));
        let child = arg.add_child(root, Interval(5, 6, false));
        let op = stop_op(&options);
        assert!(op.is_forced_covering_possible(&arg, child, root).unwrap());
        assert!(!op.is_forced_covering_possible(&arg, root, child).unwrap());

        let never = ArgStopSep::new(crate::cpa::StopNever, &options);
        assert!(!never.is_forced_covering_possible(&arg, child, root).unwrap());
    }
}
