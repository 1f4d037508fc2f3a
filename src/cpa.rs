//! Coverage and merge operators of the shape domain.
//!
//! The domain plugs into a reachability analysis through two operators:
//!
//! - a [`StopOperator`] decides whether a new state is covered by the reached set,
//! - a [`MergeOperator`] combines a new state with a reached one.
//!
//! [`SmgCpa`] builds both from [`SmgOptions`] and provides the initial state.

use log::debug;

use crate::error::Result;
use crate::options::{MergeKind, SmgOptions, StopKind};
use crate::state::SmgState;

/// A state an analysis explores.
pub trait AbstractState: Clone {
    /// Checks whether the state is a target (error) state.
    fn is_target(&self) -> bool;
}

impl AbstractState for SmgState {
    fn is_target(&self) -> bool {
        SmgState::is_target(self)
    }
}

pub trait StopOperator<S> {
    /// Checks whether `state` is covered by one of `reached`.
    fn stop(&self, state: &S, reached: &[S]) -> Result<bool>;

    /// Checks whether `state` could be forced to be covered by `reached`.
    fn is_forced_covering_possible(&self, _state: &S, _reached: &S) -> Result<bool> {
        Ok(false)
    }
}

pub trait MergeOperator<S> {
    /// Merges `state` into `reached`.
    ///
    /// Returning a state equal to `reached` means nothing was merged.
    fn merge(&self, state: &S, reached: &S) -> Result<S>;
}

/// Covers a state iff a single reached state subsumes it.
#[derive(Debug, Clone)]
pub struct StopSep {
    options: SmgOptions,
}

impl StopSep {
    pub fn new(options: SmgOptions) -> Self {
        Self { options }
    }
}

impl StopOperator<SmgState> for StopSep {
    fn stop(&self, state: &SmgState, reached: &[SmgState]) -> Result<bool> {
        for other in reached {
            if state.is_less_or_equal(other, &self.options)? {
                debug!("{} covered by {}", state, other);
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct StopNever;

impl<S> StopOperator<S> for StopNever {
    fn stop(&self, _state: &S, _reached: &[S]) -> Result<bool> {
        Ok(false)
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct MergeSep;

impl<S: Clone> MergeOperator<S> for MergeSep {
    fn merge(&self, _state: &S, reached: &S) -> Result<S> {
        Ok(reached.clone())
    }
}

/// Merges by joining the memory graphs of states with equal findings.
#[derive(Debug, Clone)]
pub struct MergeJoin {
    options: SmgOptions,
}

impl MergeJoin {
    pub fn new(options: SmgOptions) -> Self {
        Self { options }
    }
}

impl MergeOperator<SmgState> for MergeJoin {
    fn merge(&self, state: &SmgState, reached: &SmgState) -> Result<SmgState> {
        match state.join(reached, &self.options)? {
            Some((joined, status)) => {
                debug!("merged with status {}", status);
                Ok(joined)
            }
            None => Ok(reached.clone()),
        }
    }
}

/// The shape domain as seen by a reachability analysis.
///
/// # Examples
///
/// ```
/// use smg_rs::cpa::{SmgCpa, StopOperator};
/// use smg_rs::options::SmgOptions;
///
/// let cpa = SmgCpa::new(SmgOptions::default());
/// let initial = cpa.initial_state(Some("main"));
/// assert!(cpa.stop_operator().stop(&initial, &[initial.clone()]).unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct SmgCpa {
    options: SmgOptions,
}

impl SmgCpa {
    pub fn new(options: SmgOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SmgOptions {
        &self.options
    }

    pub fn stop_operator(&self) -> Box<dyn StopOperator<SmgState>> {
        match self.options.stop {
            StopKind::Sep => Box::new(StopSep::new(self.options.clone())),
            StopKind::Never => Box::new(StopNever),
        }
    }

    pub fn merge_operator(&self) -> Box<dyn MergeOperator<SmgState>> {
        match self.options.merge {
            MergeKind::Sep => Box::new(MergeSep),
            MergeKind::Join => Box::new(MergeJoin::new(self.options.clone())),
        }
    }

    /// The empty state, with a frame for `entry` if given.
    pub fn initial_state(&self, entry: Option<&str>) -> SmgState {
        let mut state = SmgState::new(self.options.machine_model);
        if let Some(function) = entry {
            state.push_stack_frame(function);
        }
        state
    }
}
