//! Configuration knobs of the shape domain and the target machine model.

use num_bigint::BigInt;

/// Which stop operator the shape domain uses.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum StopKind {
    /// Covered iff some reached state subsumes the new one.
    #[default]
    Sep,
    /// Never cover.
    Never,
}

/// Which merge operator the shape domain uses.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum MergeKind {
    /// Never merge.
    #[default]
    Sep,
    /// Merge by joining the memory graphs.
    Join,
}

/// Options of the shape domain and its coverage operator.
///
/// The join engine validates but does not interpret most of these; they are
/// consumed by the operators built on top of it.
///
/// # Examples
///
/// ```
/// use smg_rs::options::{MergeKind, SmgOptions};
///
/// let options = SmgOptions::default()
///     .with_perform_checks(true)
///     .with_merge(MergeKind::Join);
/// assert!(options.heap_abstraction);
/// ```
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SmgOptions {
    /// Re-verify field-join post-conditions during every sub-graph join (default: false).
    pub perform_checks: bool,
    /// Consider list-folding abstraction candidates during join (default: true).
    pub heap_abstraction: bool,
    /// Stop operator of the shape domain (default: [`StopKind::Sep`]).
    pub stop: StopKind,
    /// Merge operator of the shape domain (default: [`MergeKind::Sep`]).
    pub merge: MergeKind,
    /// Keep covered states in the reached set (default: false).
    pub keep_covered_states_in_reached: bool,
    /// Allow target (error) states to be covered (default: false).
    pub cover_target_states: bool,
    /// Mark merged-and-covered states as covered instead of removing them (default: false).
    pub in_cpa_enabled_analysis: bool,
    /// Machine model used to interpret explicit values.
    pub machine_model: MachineModel,
}

impl Default for SmgOptions {
    fn default() -> Self {
        Self {
            perform_checks: false,
            heap_abstraction: true,
            stop: StopKind::Sep,
            merge: MergeKind::Sep,
            keep_covered_states_in_reached: false,
            cover_target_states: false,
            in_cpa_enabled_analysis: false,
            machine_model: MachineModel::LINUX64,
        }
    }
}

impl SmgOptions {
    pub fn with_perform_checks(mut self, perform_checks: bool) -> Self {
        self.perform_checks = perform_checks;
        self
    }

    pub fn with_heap_abstraction(mut self, heap_abstraction: bool) -> Self {
        self.heap_abstraction = heap_abstraction;
        self
    }

    pub fn with_stop(mut self, stop: StopKind) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_merge(mut self, merge: MergeKind) -> Self {
        self.merge = merge;
        self
    }

    pub fn with_keep_covered_states_in_reached(mut self, keep: bool) -> Self {
        self.keep_covered_states_in_reached = keep;
        self
    }

    pub fn with_cover_target_states(mut self, cover: bool) -> Self {
        self.cover_target_states = cover;
        self
    }

    pub fn with_in_cpa_enabled_analysis(mut self, enabled: bool) -> Self {
        self.in_cpa_enabled_analysis = enabled;
        self
    }

    pub fn with_machine_model(mut self, machine_model: MachineModel) -> Self {
        self.machine_model = machine_model;
        self
    }
}

/// Integer and pointer widths of the analysed program's target.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MachineModel {
    pub pointer_bits: u64,
    pub int_bits: u64,
    pub long_bits: u64,
    pub char_signed: bool,
}

impl MachineModel {
    pub const LINUX32: MachineModel = MachineModel {
        pointer_bits: 32,
        int_bits: 32,
        long_bits: 32,
        char_signed: true,
    };

    pub const LINUX64: MachineModel = MachineModel {
        pointer_bits: 64,
        int_bits: 32,
        long_bits: 64,
        char_signed: true,
    };

    /// Wraps `value` to a field of `bits` width, as the target would store it.
    ///
    /// Signed fields use two's complement. A zero width leaves the value untouched.
    pub fn normalize(&self, value: &BigInt, bits: u64, signed: bool) -> BigInt {
        if bits == 0 {
            return value.clone();
        }
        let modulus = BigInt::from(1) << bits;
        let mut wrapped = value % &modulus;
        if wrapped < BigInt::from(0) {
            wrapped += &modulus;
        }
        if signed && wrapped >= (&modulus >> 1usize) {
            wrapped -= &modulus;
        }
        wrapped
    }

    /// Checks whether two explicit values denote the same bits in a field of `bits` width.
    pub fn same_bits(&self, a: &BigInt, b: &BigInt, bits: u64) -> bool {
        self.normalize(a, bits, false) == self.normalize(b, bits, false)
    }
}

impl Default for MachineModel {
    fn default() -> Self {
        Self::LINUX64
    }
}
