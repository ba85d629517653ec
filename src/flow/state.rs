use super::ConfirmationMode;
use crate::popup::{PopupHandle, StepKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowState {
    #[default]
    Init,
    ShowingMissingPrimary,
    ShowingMissingPremium,
    ShowingPremiumShop,
    AskingBigAmountConfirmation,
    FinishedSuccess,
    FinishedCanceled,
    FinishedError,
}

impl FlowState {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            FlowState::FinishedSuccess | FlowState::FinishedCanceled | FlowState::FinishedError
        )
    }
}

/// Work scheduled by a step outcome, executed on the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAction {
    /// Run a new evaluation pass with the given confirmation mode.
    Evaluate(ConfirmationMode),
    /// The player agreed to cover the primary shortfall with premium.
    AcceptExchange,
    ShowMissingPremium,
    ShowShop,
    ShopClosed { packs_purchased: u32 },
    Commit,
    Cancel,
}

/// A step opened by the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenStep {
    pub kind: StepKind,
    pub handle: PopupHandle,
    /// Follow-up for an accepted confirmation step.
    pub on_accept: Option<PendingAction>,
}

/// Steps opened by a flow, in opening order, at most one per kind.
#[derive(Debug, Default)]
pub struct OpenSteps {
    steps: Vec<OpenStep>,
}

impl OpenSteps {
    /// Track a new step. Returns the handle of a step of the same kind it replaces.
    pub fn push(&mut self, step: OpenStep) -> Option<PopupHandle> {
        let replaced = self.remove_kind(step.kind);
        self.steps.push(step);
        replaced
    }

    pub fn find(&self, handle: PopupHandle) -> Option<&OpenStep> {
        self.steps.iter().find(|step| step.handle == handle)
    }

    pub fn contains(&self, handle: PopupHandle) -> bool {
        self.find(handle).is_some()
    }

    pub fn remove(&mut self, handle: PopupHandle) -> Option<OpenStep> {
        let idx = self.steps.iter().position(|step| step.handle == handle)?;
        Some(self.steps.remove(idx))
    }

    fn remove_kind(&mut self, kind: StepKind) -> Option<PopupHandle> {
        let idx = self.steps.iter().position(|step| step.kind == kind)?;
        Some(self.steps.remove(idx).handle)
    }

    /// Take every step, most recently opened first.
    pub fn drain_reverse(&mut self) -> std::vec::IntoIter<OpenStep> {
        let mut steps = std::mem::take(&mut self.steps);
        steps.reverse();
        steps.into_iter()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OpenStep> + '_ {
        self.steps.iter()
    }
}
