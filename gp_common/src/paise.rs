use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const INR_CURRENCY_CODE: &str = "INR";
pub const INR_CURRENCY_CODE_LOWER: &str = "inr";

//--------------------------------------       Paise         ---------------------------------------------------------
/// An amount of Indian rupees, stored as an integer number of paise (minor units).
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Paise(i64);

op!(binary Paise, Add, add);
op!(binary Paise, Sub, sub);
op!(inplace Paise, SubAssign, sub_assign);
op!(unary Paise, Neg, neg);

impl Mul<i64> for Paise {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Paise {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in paise: {0}")]
pub struct PaiseConversionError(String);

impl From<i64> for Paise {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Paise {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Paise {}

impl TryFrom<u64> for Paise {
    type Error = PaiseConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(PaiseConversionError(format!("Value {} is too large to convert to Paise", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Paise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rupees = self.0 as f64 / 100.0;
        write!(f, "₹{rupees:0.2}")
    }
}

impl Paise {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_rupees(rupees: i64) -> Self {
        Self(rupees * 100)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// The given integer percentage of this amount, rounded down to the nearest paisa.
    pub fn percent(&self, pct: u32) -> Self {
        Self(self.0 * i64::from(pct) / 100)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn percent_rounds_down() {
        assert_eq!(Paise::from(101).percent(50), Paise::from(50));
        assert_eq!(Paise::from(100).percent(50), Paise::from(50));
        assert_eq!(Paise::from(9_999).percent(33), Paise::from(3_299));
        assert_eq!(Paise::from(0).percent(50), Paise::from(0));
    }

    #[test]
    fn display_formats_rupees() {
        assert_eq!(Paise::from_rupees(120).to_string(), "₹120.00");
        assert_eq!(Paise::from(12_345).to_string(), "₹123.45");
    }

    #[test]
    fn arithmetic() {
        let a = Paise::from(500);
        let b = Paise::from(125);
        assert_eq!(a - b, Paise::from(375));
        assert_eq!(a + b, Paise::from(625));
        assert_eq!(a * 3, Paise::from(1500));
        assert_eq!([a, b].into_iter().sum::<Paise>(), Paise::from(625));
    }
}
