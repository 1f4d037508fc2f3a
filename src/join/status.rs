use std::fmt;

/// Relative generality of the two inputs of a join.
///
/// ```text
///             Equal
///            /     \
///   LeftEntail     RightEntail
///            \     /
///          Incomparable
/// ```
///
/// - `LeftEntail`: the first input is more specific (it is covered by the second).
/// - `RightEntail`: the second input is more specific (it is covered by the first).
///
/// Combining outcomes only ever moves down the lattice.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum JoinStatus {
    #[default]
    Equal,
    LeftEntail,
    RightEntail,
    Incomparable,
}

impl JoinStatus {
    /// Lattice meet: the combined status of two independent outcomes.
    pub fn update_with(self, other: JoinStatus) -> JoinStatus {
        match (self, other) {
            (JoinStatus::Equal, s) | (s, JoinStatus::Equal) => s,
            (a, b) if a == b => a,
            _ => JoinStatus::Incomparable,
        }
    }

    /// The status of the join with swapped inputs.
    pub fn mirrored(self) -> JoinStatus {
        match self {
            JoinStatus::LeftEntail => JoinStatus::RightEntail,
            JoinStatus::RightEntail => JoinStatus::LeftEntail,
            s => s,
        }
    }

    /// Checks whether the first input is covered by the second.
    pub fn is_left_covered(self) -> bool {
        matches!(self, JoinStatus::Equal | JoinStatus::LeftEntail)
    }

    /// Checks whether `self` is no better than `other` in the lattice.
    pub fn is_no_better_than(self, other: JoinStatus) -> bool {
        other.update_with(self) == self
    }

    /// Combines many outcomes; the empty combination is `Equal`.
    pub fn combine<I>(statuses: I) -> JoinStatus
    where
        I: IntoIterator<Item = JoinStatus>,
    {
        statuses.into_iter().fold(JoinStatus::Equal, JoinStatus::update_with)
    }
}

impl fmt::Display for JoinStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JoinStatus::Equal => "EQUAL",
            JoinStatus::LeftEntail => "LEFT_ENTAIL",
            JoinStatus::RightEntail => "RIGHT_ENTAIL",
            JoinStatus::Incomparable => "INCOMPARABLE",
        };
        write!(f, "{}", s)
    }
}
