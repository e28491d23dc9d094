use std::fmt::{Display, Formatter};
use std::ops::{BitOr, BitOrAssign};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// How well a value fits a parameter. Ranks are single bits so that costs
/// of several parameters combine with `|` and still compare by their worst
/// component.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ConversionCost(u16);

impl ConversionCost {
    pub const PASS: Self = Self(0);
    /// Exact match through an upcast or numeric widening.
    pub const PASS_COSTLY: Self = Self(1);
    pub const IMPLICIT_CAST: Self = Self(1 << 1);
    pub const LOOSING_PRECISION: Self = Self(1 << 2);
    /// Converts, but the hosted language reports a warning.
    pub const WARNING: Self = Self(1 << 3);
    /// Parameter takes its default value.
    pub const DEFAULT_VALUE: Self = Self(1 << 4);
    pub const TOO_MANY_ARGS: Self = Self(1 << 5);
    pub const MISSING_ARGS: Self = Self(1 << 6);
    pub const NO_CONVERSION: Self = Self(1 << 7);
    pub const ERROR: Self = Self(1 << 8);

    const NAMES: [(ConversionCost, &'static str); 10] = [
        (Self::PASS_COSTLY, "PassCostly"),
        (Self::IMPLICIT_CAST, "ImplicitCast"),
        (Self::LOOSING_PRECISION, "LoosingPrecision"),
        (Self::WARNING, "Warning"),
        (Self::DEFAULT_VALUE, "DefaultValue"),
        (Self::TOO_MANY_ARGS, "TooManyArgs"),
        (Self::MISSING_ARGS, "MissingArgs"),
        (Self::NO_CONVERSION, "NoConversion"),
        (Self::ERROR, "Error"),
        (Self::PASS, "Pass"),
    ];

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn contains(self, flag: ConversionCost) -> bool {
        flag.0 != 0 && self.0 & flag.0 == flag.0
    }

    /// A routine with this cost may be invoked.
    pub fn is_applicable(self) -> bool {
        self < Self::NO_CONVERSION
    }

    /// The highest rank present.
    pub fn rank(self) -> ConversionCost {
        if self.0 == 0 {
            Self::PASS
        } else {
            Self(1 << (15 - self.0.leading_zeros()))
        }
    }
}

impl BitOr for ConversionCost {
    type Output = ConversionCost;

    fn bitor(self, rhs: Self) -> Self::Output {
        ConversionCost(self.0 | rhs.0)
    }
}

impl BitOrAssign for ConversionCost {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl Display for ConversionCost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.0 == 0 {
            return write!(f, "Pass");
        }
        let names = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .join("|");
        write!(f, "{}", names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_are_ordered() {
        let ordered = [
            ConversionCost::PASS,
            ConversionCost::PASS_COSTLY,
            ConversionCost::IMPLICIT_CAST,
            ConversionCost::LOOSING_PRECISION,
            ConversionCost::WARNING,
            ConversionCost::DEFAULT_VALUE,
            ConversionCost::TOO_MANY_ARGS,
            ConversionCost::MISSING_ARGS,
            ConversionCost::NO_CONVERSION,
            ConversionCost::ERROR,
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0] < pair[1], "{} < {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn combined_cost_is_dominated_by_its_worst_rank() {
        let combined = ConversionCost::WARNING | ConversionCost::PASS_COSTLY;
        assert!(combined > ConversionCost::WARNING);
        assert!(combined < ConversionCost::DEFAULT_VALUE);
        assert_eq!(combined.rank(), ConversionCost::WARNING);
        assert_eq!(combined.to_string(), "PassCostly|Warning");
        assert!(!(ConversionCost::NO_CONVERSION | ConversionCost::PASS).is_applicable());
    }
}
