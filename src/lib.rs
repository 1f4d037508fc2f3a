//! # smg-rs: Symbolic Memory Graphs in Rust
//!
//! **`smg-rs`** implements the shape domain of a static analyser for C programs: **Symbolic Memory Graphs (SMGs)**
//! and the **join** that merges two of them into one graph covering both.
//!
//! ## What is an SMG?
//!
//! A Symbolic Memory Graph is an abstract heap snapshot. Memory *objects* (variables, heap blocks, summarized
//! list segments) own *fields*: has-value edges from a bit range of the object to a symbolic *value*. A value may
//! be the address of an object (points-to edge), may carry a known number, and may be known to differ from
//! other values. List segments summarize chains of equal nodes of unknown length, which keeps the state space
//! finite on programs that build lists in loops.
//!
//! ## Key Features
//!
//! - **Join with entailment**: [`SmgJoin`][crate::join::SmgJoin] builds a destination graph covering both inputs
//!   and reports which input is more general as a [`JoinStatus`][crate::join::JoinStatus].
//! - **Heap abstraction**: chains of equal list nodes are folded into list segments while joining.
//! - **Coverage**: the join doubles as the subsumption test behind the stop and merge operators of
//!   [`cpa`], and behind the ARG coverage operator of [`arg`].
//! - **Memory safety**: [`SmgState`][crate::state::SmgState] records invalid reads, writes, frees and leaks.
//!
//! ## Basic Usage
//!
//! ```rust
//! use smg_rs::join::{JoinStatus, SmgJoin};
//! use smg_rs::options::SmgOptions;
//! use smg_rs::state::SmgState;
//! use smg_rs::types::ValueId;
//!
//! // 1. Build two states: `x == 1` and `x` unknown
//! let build = |explicit: Option<i64>| {
//!     let mut state = SmgState::default();
//!     state.push_stack_frame("main");
//!     let x = state.add_local_variable("x", 32).unwrap();
//!     let value = ValueId::fresh();
//!     if let Some(n) = explicit {
//!         state.assign_explicit(value, n);
//!     }
//!     state.write_value(x, 0, 32, value).unwrap();
//!     state
//! };
//! let one = build(Some(1));
//! let unknown = build(None);
//!
//! // 2. Join them
//! let options = SmgOptions::default();
//! let result = SmgJoin::new(&options).run(one.smg(), unknown.smg()).unwrap();
//!
//! // 3. The first input is more specific
//! assert!(result.is_defined());
//! assert_eq!(result.status(), JoinStatus::LeftEntail);
//! assert!(one.is_less_or_equal(&unknown, &options).unwrap());
//! ```
//!
//! ## Core Components
//!
//! - **[`smg`]**: The memory-graph store.
//! - **[`join`]**: The join engine: field, value and sub-graph joiners, level mapping, abstraction candidates.
//! - **[`state`]**: States with memory-safety findings.
//! - **[`cpa`]** and **[`arg`]**: Stop and merge operators, and the ARG coverage operator.
//! - **[`dot`]**: Utilities for visualizing memory graphs using Graphviz.
//!
//! For a deep dive into the join algorithm, check the [`join`] module documentation.

pub mod arg;
pub mod cpa;
pub mod debug;
pub mod dot;
pub mod edge;
pub mod error;
pub mod join;
pub mod object;
pub mod options;
pub mod smg;
pub mod state;
pub mod types;
