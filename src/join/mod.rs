//! The join engine.
//!
//! [`SmgJoin`] computes a common abstraction of two memory graphs. Variables are
//! paired by scope and name, then the sub-graphs reachable from every pair are
//! joined recursively into a fresh destination graph. The [`JoinStatus`] of the
//! result tells how the two inputs relate:
//!
//! - `Equal`: both inputs denote the same memory,
//! - `LeftEntail` / `RightEntail`: one input is more specific than the other,
//! - `Incomparable`: neither covers the other; an undefined join is always incomparable.
//!
//! The engine is single-threaded. One run owns its copies of the inputs (field joins
//! split edges in place), the destination, and the node and level mappings.
//!
//! # Examples
//!
//! ```
//! use smg_rs::edge::HasValueEdge;
//! use smg_rs::join::{JoinStatus, SmgJoin};
//! use smg_rs::object::Object;
//! use smg_rs::options::SmgOptions;
//! use smg_rs::smg::Smg;
//! use smg_rs::types::ValueId;
//!
//! let mut smg = Smg::default();
//! let x = Object::region(64, "x");
//! let id = x.id;
//! smg.add_global_object("x", x);
//! smg.add_has_value_edge(HasValueEdge::new(id, 0, 64, ValueId::ZERO)).unwrap();
//!
//! let options = SmgOptions::default();
//! let result = SmgJoin::new(&options).run(&smg, &smg.clone()).unwrap();
//! assert!(result.is_defined());
//! assert_eq!(result.status(), JoinStatus::Equal);
//! ```

pub mod candidate;
pub mod fields;
pub mod mapping;
pub mod status;
mod subsmg;
pub mod values;

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

pub use self::candidate::AbstractionCandidate;
pub use self::mapping::{LevelMapping, NodeMapping};
pub use self::status::JoinStatus;

use crate::error::{Result, SmgError};
use crate::object::{Object, ObjectKind};
use crate::options::SmgOptions;
use crate::smg::Smg;
use crate::types::{Level, ObjectId, ValueId};

use self::subsmg::join_sub_smgs;

/// State threaded through one join run.
#[derive(Debug)]
pub(crate) struct JoinContext<'a> {
    pub options: &'a SmgOptions,
    pub smg1: Smg,
    pub smg2: Smg,
    pub dest: Smg,
    pub mapping1: NodeMapping,
    pub mapping2: NodeMapping,
    pub levels: LevelMapping,
    /// Destination values of already joined value pairs, zero included.
    pub joined_values: BTreeMap<(ValueId, ValueId), ValueId>,
    pub status: JoinStatus,
    pub identical_inputs: bool,
}

impl<'a> JoinContext<'a> {
    pub fn new(options: &'a SmgOptions, smg1: Smg, smg2: Smg) -> Self {
        let identical_inputs = smg1 == smg2;
        let dest = Smg::new(*smg1.machine_model());
        Self {
            options,
            smg1,
            smg2,
            dest,
            mapping1: NodeMapping::new(),
            mapping2: NodeMapping::new(),
            levels: LevelMapping::new(),
            joined_values: BTreeMap::new(),
            status: JoinStatus::Equal,
            identical_inputs,
        }
    }

    /// Creates the destination counterpart of a variable pair, or `None` if the
    /// variables cannot be joined.
    fn pair_variable(&self, object1: ObjectId, object2: ObjectId) -> Result<Option<Object>> {
        let source1 = self.smg1.get_object(object1)?;
        let source2 = self.smg2.get_object(object2)?;
        if source1.size != source2.size || self.smg1.is_valid(object1) != self.smg2.is_valid(object2) {
            debug!("variables {} and {} differ", source1, source2);
            return Ok(None);
        }
        let id = if object1 == object2 { object1 } else { ObjectId::fresh() };
        Ok(Some(Object::new(
            id,
            source1.size,
            Level::ZERO,
            ObjectKind::Region,
            source1.label.clone(),
        )))
    }

    fn map_variable(&mut self, object1: ObjectId, object2: ObjectId, dest: ObjectId) -> Result<()> {
        self.dest.set_validity(dest, self.smg1.is_valid(object1))?;
        self.mapping1.map_object(object1, dest)?;
        self.mapping2.map_object(object2, dest)
    }

    /// Pairs globals by name and stack frames by position, placing every pair's
    /// counterpart into the destination.
    fn pair_variables(&mut self) -> Result<Option<Vec<(ObjectId, ObjectId, ObjectId)>>> {
        let mut pairs = Vec::new();

        let globals1 = self.smg1.globals().clone();
        let globals2 = self.smg2.globals().clone();
        if !globals1.keys().eq(globals2.keys()) {
            debug!("global variables differ");
            return Ok(None);
        }
        for ((name, &object1), &object2) in globals1.iter().zip(globals2.values()) {
            let Some(object) = self.pair_variable(object1, object2)? else {
                return Ok(None);
            };
            let id = object.id;
            self.dest.add_global_object(name.clone(), object);
            self.map_variable(object1, object2, id)?;
            pairs.push((object1, object2, id));
        }

        let frames1 = self.smg1.stack_frames().to_vec();
        let frames2 = self.smg2.stack_frames().to_vec();
        if frames1.len() != frames2.len() {
            debug!("stack depths {} and {} differ", frames1.len(), frames2.len());
            return Ok(None);
        }
        for (frame1, frame2) in frames1.iter().zip(&frames2) {
            if frame1.function != frame2.function || !frame1.variables.keys().eq(frame2.variables.keys()) {
                debug!("stack frames of {} and {} differ", frame1.function, frame2.function);
                return Ok(None);
            }
            self.dest.push_stack_frame(frame1.function.clone());
            for ((name, &object1), &object2) in frame1.variables.iter().zip(frame2.variables.values()) {
                let Some(object) = self.pair_variable(object1, object2)? else {
                    return Ok(None);
                };
                let id = object.id;
                self.dest.add_local_object(name.clone(), object)?;
                self.map_variable(object1, object2, id)?;
                pairs.push((object1, object2, id));
            }
        }

        Ok(Some(pairs))
    }

    /// Keeps the inequalities both inputs agree on.
    fn join_inequalities(&mut self) {
        fn mapped_pairs(smg: &Smg, mapping: &NodeMapping) -> BTreeSet<(ValueId, ValueId)> {
            let map = |value: ValueId| {
                if value.is_zero() {
                    Some(ValueId::ZERO)
                } else {
                    mapping.value(value)
                }
            };
            smg.neq_pairs()
                .into_iter()
                .filter_map(|(a, b)| Some((map(a)?, map(b)?)))
                .filter(|(a, b)| a != b)
                .map(|(a, b)| (a.min(b), a.max(b)))
                .collect()
        }

        let neq1 = mapped_pairs(&self.smg1, &self.mapping1);
        let neq2 = mapped_pairs(&self.smg2, &self.mapping2);
        for &(a, b) in neq1.intersection(&neq2) {
            self.dest.add_neq(a, b);
        }
        if neq1.difference(&neq2).next().is_some() {
            self.status = self.status.update_with(JoinStatus::LeftEntail);
        }
        if neq2.difference(&neq1).next().is_some() {
            self.status = self.status.update_with(JoinStatus::RightEntail);
        }
    }
}

/// Outcome of a whole-graph join.
#[derive(Debug, Clone)]
pub struct JoinResult {
    status: JoinStatus,
    destination: Option<Smg>,
}

impl JoinResult {
    fn undefined() -> Self {
        Self {
            status: JoinStatus::Incomparable,
            destination: None,
        }
    }

    pub fn is_defined(&self) -> bool {
        self.destination.is_some()
    }

    pub fn status(&self) -> JoinStatus {
        self.status
    }

    /// The joined graph, if the join is defined.
    pub fn destination(&self) -> Option<&Smg> {
        self.destination.as_ref()
    }

    pub fn into_destination(self) -> Option<Smg> {
        self.destination
    }
}

/// Joins whole memory graphs.
#[derive(Debug, Copy, Clone)]
pub struct SmgJoin<'a> {
    options: &'a SmgOptions,
}

impl<'a> SmgJoin<'a> {
    pub fn new(options: &'a SmgOptions) -> Self {
        Self { options }
    }

    /// Joins `smg1` and `smg2`; the inputs are left untouched.
    ///
    /// Only memory reachable from variables takes part. Heap objects no variable
    /// reaches are left out of the destination; [`SmgState`][crate::state::SmgState]
    /// collects them, recording leaks, before joining.
    ///
    /// An undefined join is an `Ok` result; errors are consistency violations only.
    pub fn run(&self, smg1: &Smg, smg2: &Smg) -> Result<JoinResult> {
        let mut ctx = JoinContext::new(self.options, smg1.clone(), smg2.clone());
        debug!("join graphs (identical inputs: {})", ctx.identical_inputs);

        let Some(pairs) = ctx.pair_variables()? else {
            return Ok(JoinResult::undefined());
        };
        for (object1, object2, dest) in pairs {
            if !join_sub_smgs(&mut ctx, object1, object2, dest, 0)? {
                if ctx.status != JoinStatus::Incomparable {
                    return Err(SmgError::UndefinedJoinStatus(ctx.status.to_string()));
                }
                debug!("join undefined at variables {} and {}", object1, object2);
                return Ok(JoinResult::undefined());
            }
        }
        ctx.join_inequalities();

        if self.options.perform_checks {
            ctx.dest.check_consistency()?;
        }
        debug!("join defined: {}", ctx.status);
        Ok(JoinResult {
            status: ctx.status,
            destination: Some(ctx.dest),
        })
    }
}
