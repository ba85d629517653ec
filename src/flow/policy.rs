use serde::Deserialize;

use crate::Amount;

/// When to ask the player to confirm a premium spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationMode {
    /// Ask when the amount is above the threshold, unless the player opted out.
    #[default]
    Threshold,
    /// Always ask. The opt-out control is hidden.
    Force,
    /// Ask for any amount, unless the player opted out.
    IgnoreThreshold,
    DontShow,
}

pub fn requires_confirmation(
    mode: ConfirmationMode,
    amount: Amount,
    threshold: Amount,
    opted_out: bool,
) -> bool {
    match mode {
        ConfirmationMode::Threshold => !opted_out && amount > threshold,
        ConfirmationMode::Force => true,
        ConfirmationMode::IgnoreThreshold => !opted_out,
        ConfirmationMode::DontShow => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: Amount = Amount::new(20);

    #[test]
    fn threshold_is_exclusive() {
        use ConfirmationMode::Threshold;
        assert!(!requires_confirmation(Threshold, Amount::new(20), THRESHOLD, false));
        assert!(requires_confirmation(Threshold, Amount::new(21), THRESHOLD, false));
        assert!(!requires_confirmation(Threshold, Amount::new(21), THRESHOLD, true));
    }

    #[test]
    fn force_ignores_opt_out_and_amount() {
        use ConfirmationMode::Force;
        assert!(requires_confirmation(Force, Amount::ZERO, THRESHOLD, true));
        assert!(requires_confirmation(Force, Amount::new(1), THRESHOLD, false));
    }

    #[test]
    fn ignore_threshold_only_respects_opt_out() {
        use ConfirmationMode::IgnoreThreshold;
        assert!(requires_confirmation(IgnoreThreshold, Amount::new(1), THRESHOLD, false));
        assert!(!requires_confirmation(IgnoreThreshold, Amount::new(100), THRESHOLD, true));
    }

    #[test]
    fn dont_show_never_asks() {
        use ConfirmationMode::DontShow;
        assert!(!requires_confirmation(DontShow, Amount::MAX, THRESHOLD, false));
    }
}
