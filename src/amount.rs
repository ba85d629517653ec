use std::fmt;

use serde::Deserialize;

/// Non-negative quantity of a single currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);
    pub const MAX: Amount = Amount(u64::MAX);

    pub const fn new(value: u64) -> Self {
        Amount(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Subtraction clamped at zero, used for every "how much is missing" computation.
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Amount(self.0.saturating_sub(rhs.0))
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Amount)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Amount(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturating_sub_clamps_at_zero() {
        assert_eq!(Amount::new(80).saturating_sub(Amount::new(100)), Amount::ZERO);
        assert_eq!(Amount::new(100).saturating_sub(Amount::new(80)), Amount::new(20));
    }

    #[test]
    fn checked_sub_refuses_underflow() {
        assert_eq!(Amount::new(5).checked_sub(Amount::new(6)), None);
        assert_eq!(Amount::new(6).checked_sub(Amount::new(5)), Some(Amount::new(1)));
    }

    #[test]
    fn display_is_plain_integer() {
        assert_eq!(Amount::new(1_500).to_string(), "1500");
        assert_eq!(Amount::ZERO.to_string(), "0");
    }

    #[test]
    fn default_is_zero() {
        assert_eq!(Amount::default(), Amount::ZERO);
        assert!(Amount::default().is_zero());
    }

    #[test]
    fn add_saturates() {
        assert_eq!(Amount::MAX + Amount::new(1), Amount::MAX);
        let mut a = Amount::new(100);
        a += Amount::new(50);
        assert_eq!(a, Amount::new(150));
    }

    #[test]
    fn ordering() {
        assert!(Amount::new(20) < Amount::new(30));
        assert!(Amount::MAX > Amount::new(20));
    }
}
