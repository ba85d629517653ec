//! Purchase flow state machine.
//!
//! A [`ResourcesFlow`] takes one [`TransactionRequest`], works out what the
//! player is missing, walks them through the UI steps needed to get it and
//! finally debits the ledger in one go.
//!
//! Step outcomes never re-enter the flow directly: [`ResourcesFlow::on_outcome`]
//! only queues a [`PendingAction`], which [`ResourcesFlow::tick`] executes.

use std::collections::VecDeque;

use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::Amount;
use crate::catalog::{PackCatalog, Recommender};
use crate::config::FlowConfig;
use crate::ledger::CurrencyLedger;
use crate::model::{CurrencyKind, CurrencyPack, TransactionRequest};
use crate::popup::{ErrorNotice, PopupHandle, PopupOrchestrator, StepInit, StepKind, StepOutcome};
use crate::tracking::Tracker;

pub mod commit;
pub mod policy;
pub mod shortfall;

mod state;
pub use state::{FlowState, OpenStep, OpenSteps, PendingAction};

mod error;
pub use error::{CommitError, FlowError};

pub use policy::{ConfirmationMode, requires_confirmation};
pub use shortfall::Shortfall;

/// Everything a flow talks to, borrowed for the duration of one call.
pub struct Collaborators<'a> {
    pub ledger: &'a mut dyn CurrencyLedger,
    pub popups: &'a mut dyn PopupOrchestrator,
    pub catalog: &'a dyn PackCatalog,
    pub tracker: &'a mut dyn Tracker,
}

type Listener = Box<dyn FnMut(&ResourcesFlow)>;

#[derive(Debug, Clone, Copy)]
enum FlowEvent {
    Success,
    Cancel,
    Finished,
}

/// One purchase attempt, from `begin` to a finished state. Not reusable.
pub struct ResourcesFlow {
    name: String,
    config: FlowConfig,
    request: Option<TransactionRequest>,
    state: FlowState,
    previous_state: FlowState,
    shortfall: Shortfall,
    recommended_pack: Option<CurrencyPack>,
    /// The player agreed to pay the primary shortfall with premium.
    exchange_accepted: bool,
    steps: OpenSteps,
    pending: VecDeque<(PopupHandle, PendingAction)>,
    recommender: Recommender,
    on_success: Vec<Listener>,
    on_cancel: Vec<Listener>,
    on_finished: Vec<Listener>,
}

/// Public API
impl ResourcesFlow {
    pub fn new(name: impl Into<String>, config: FlowConfig) -> Self {
        Self {
            name: name.into(),
            config,
            request: None,
            state: FlowState::Init,
            previous_state: FlowState::Init,
            shortfall: Shortfall::default(),
            recommended_pack: None,
            exchange_accepted: false,
            steps: OpenSteps::default(),
            pending: VecDeque::new(),
            recommender: Recommender::new(),
            on_success: Vec::new(),
            on_cancel: Vec::new(),
            on_finished: Vec::new(),
        }
    }

    /// Only honored before `begin`.
    pub fn set_confirmation_mode(&mut self, mode: ConfirmationMode) {
        if self.request.is_some() {
            warn!(flow = %self.name, ?mode, "confirmation mode changed after begin, ignored");
            return;
        }
        self.config.confirmation_mode = mode;
    }

    pub fn on_success(&mut self, listener: impl FnMut(&ResourcesFlow) + 'static) {
        self.on_success.push(Box::new(listener));
    }

    pub fn on_cancel(&mut self, listener: impl FnMut(&ResourcesFlow) + 'static) {
        self.on_cancel.push(Box::new(listener));
    }

    /// Fires once, last, whatever the result.
    pub fn on_finished(&mut self, listener: impl FnMut(&ResourcesFlow) + 'static) {
        self.on_finished.push(Box::new(listener));
    }

    /// Start the flow with the configured confirmation mode.
    pub fn begin(
        &mut self,
        request: TransactionRequest,
        ctx: &mut Collaborators<'_>,
    ) -> Result<(), FlowError> {
        if self.request.is_some() || self.state != FlowState::Init {
            return Err(FlowError::AlreadyBegun(self.state));
        }

        info!(
            flow = %self.name,
            currency = %request.currency,
            amount = %request.original_amount,
            "flow begun"
        );
        self.request = Some(request);
        self.evaluate(self.config.confirmation_mode, ctx);
        Ok(())
    }

    /// Run a fresh evaluation pass. No-op before `begin` or once finished.
    pub fn try_transaction(&mut self, ctx: &mut Collaborators<'_>) {
        if self.request.is_none() || self.state.is_finished() {
            return;
        }
        self.evaluate(self.config.confirmation_mode, ctx);
    }

    /// Record the outcome of an open step. Returns whether it was queued.
    ///
    /// Outcomes from unknown or closed steps, outcomes a step kind doesn't
    /// produce and anything arriving after the flow finished are dropped.
    pub fn on_outcome(&mut self, handle: PopupHandle, outcome: StepOutcome) -> bool {
        if self.state.is_finished() {
            debug!(flow = %self.name, %handle, ?outcome, "flow finished, outcome ignored");
            return false;
        }
        let Some(step) = self.steps.find(handle) else {
            debug!(flow = %self.name, %handle, ?outcome, "unknown step, outcome ignored");
            return false;
        };

        use PendingAction::*;
        let action = match (step.kind, outcome) {
            (StepKind::MissingPrimary, StepOutcome::Accept) => AcceptExchange,
            (StepKind::MissingPremium, StepOutcome::PackPurchased { .. }) => {
                Evaluate(ConfirmationMode::DontShow)
            }
            (StepKind::MissingPremium, StepOutcome::GoToShop) => ShowShop,
            // can't be bought, whatever the player does ends the flow
            (StepKind::MissingSecondary, _) => Cancel,
            (StepKind::PremiumShop, StepOutcome::Closed { packs_purchased }) => {
                ShopClosed { packs_purchased }
            }
            (StepKind::BigAmountConfirmation, StepOutcome::Accept) => step
                .on_accept
                .unwrap_or(Evaluate(ConfirmationMode::DontShow)),
            (_, StepOutcome::Cancel | StepOutcome::Closed { .. }) => Cancel,
            (kind, outcome) => {
                debug!(flow = %self.name, %handle, ?kind, ?outcome, "outcome not handled by step");
                return false;
            }
        };

        debug!(flow = %self.name, %handle, ?action, "action queued");
        self.pending.push_back((handle, action));
        true
    }

    /// Execute queued actions in order.
    pub fn tick(&mut self, ctx: &mut Collaborators<'_>) {
        while let Some((handle, action)) = self.pending.pop_front() {
            if self.state.is_finished() {
                self.pending.clear();
                break;
            }
            // an earlier action may have closed the step
            if !self.steps.contains(handle) {
                debug!(flow = %self.name, %handle, ?action, "step closed, action dropped");
                continue;
            }
            self.apply(handle, action, ctx);
        }
    }

    /// `on_outcome` followed by `tick`.
    pub fn handle_outcome(
        &mut self,
        handle: PopupHandle,
        outcome: StepOutcome,
        ctx: &mut Collaborators<'_>,
    ) {
        if self.on_outcome(handle, outcome) {
            self.tick(ctx);
        }
    }

    /// Cancel from outside the UI steps, e.g. when the owning screen goes away.
    /// Closes every step the flow opened.
    pub fn cancel(&mut self, ctx: &mut Collaborators<'_>) {
        if self.state.is_finished() {
            return;
        }
        self.cancel_flow(ctx);
    }

    /// Feed outcomes from an asynchronous UI, one at a time, until the flow
    /// finishes or the stream ends.
    pub async fn drive(
        &mut self,
        ctx: &mut Collaborators<'_>,
        mut outcomes: impl Stream<Item = (PopupHandle, StepOutcome)> + Unpin,
    ) {
        while !self.state.is_finished() {
            let Some((handle, outcome)) = outcomes.next().await else {
                break;
            };
            self.handle_outcome(handle, outcome, ctx);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn successful(&self) -> bool {
        self.state == FlowState::FinishedSuccess
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    pub fn request(&self) -> Option<&TransactionRequest> {
        self.request.as_ref()
    }

    pub fn confirmation_mode(&self) -> ConfirmationMode {
        self.config.confirmation_mode
    }

    pub fn shortfall(&self) -> Shortfall {
        self.shortfall
    }

    pub fn missing_primary(&self) -> Amount {
        self.shortfall.missing_primary
    }

    pub fn final_amount(&self) -> Amount {
        self.shortfall.final_amount
    }

    pub fn premium_cost(&self) -> Amount {
        self.shortfall.premium_cost
    }

    pub fn missing_premium(&self) -> Amount {
        self.shortfall.missing_premium
    }

    pub fn recommended_pack(&self) -> Option<&CurrencyPack> {
        self.recommended_pack.as_ref()
    }

    pub fn open_steps(&self) -> impl Iterator<Item = &OpenStep> + '_ {
        self.steps.iter()
    }

    pub fn open_step_count(&self) -> usize {
        self.steps.len()
    }
}

/// Private API
impl ResourcesFlow {
    /// One evaluation pass:
    /// - Close every open step
    /// - Recompute the shortfall
    /// - Open the step resolving it, or ask for confirmation, or commit
    fn evaluate(&mut self, mode: ConfirmationMode, ctx: &mut Collaborators<'_>) {
        self.close_steps(ctx.popups);

        let conversion = self.config.conversion();
        let (currency, original) = match &self.request {
            Some(request) => {
                self.shortfall = shortfall::evaluate(request, &*ctx.ledger, conversion);
                (request.currency, request.original_amount)
            }
            None => return,
        };
        let s = self.shortfall;
        debug!(
            flow = %self.name,
            ?mode,
            missing = %s.missing_primary,
            final_amount = %s.final_amount,
            premium_cost = %s.premium_cost,
            missing_premium = %s.missing_premium,
            "evaluating"
        );

        if !s.missing_primary.is_zero() {
            match currency {
                CurrencyKind::Primary if !self.exchange_accepted => {
                    let init = StepInit::MissingPrimary {
                        missing: s.missing_primary,
                        premium_cost: conversion.map(|_| s.premium_cost),
                    };
                    self.open_step(init, None, FlowState::ShowingMissingPrimary, ctx.popups);
                    return;
                }
                CurrencyKind::Primary => {
                    if conversion.is_none() {
                        warn!(flow = %self.name, "no exchange rate for primary currency");
                        self.cancel_flow(ctx);
                        return;
                    }
                    if !s.missing_premium.is_zero() {
                        self.open_missing_premium(s.missing_premium, ctx);
                        return;
                    }
                    // shortfall covered by premium, carry on to commit
                }
                CurrencyKind::Premium => {
                    if self.confirm(mode, original) {
                        self.ask_confirmation(original, PendingAction::ShowMissingPremium, ctx.popups);
                    } else {
                        self.open_missing_premium(s.missing_primary, ctx);
                    }
                    return;
                }
                CurrencyKind::Secondary => {
                    let init = StepInit::MissingSecondary {
                        missing: s.missing_primary,
                    };
                    self.open_step(init, None, FlowState::ShowingMissingPrimary, ctx.popups);
                    return;
                }
            }
        }

        let premium_spend = match currency {
            CurrencyKind::Premium => s.final_amount,
            _ => s.premium_cost,
        };
        // the pass mode gates, the configured mode decides on the amount
        if !premium_spend.is_zero()
            && self.confirm(mode, Amount::MAX)
            && self.confirm(self.config.confirmation_mode, premium_spend)
        {
            self.ask_confirmation(premium_spend, PendingAction::Commit, ctx.popups);
            return;
        }

        self.complete(ctx);
    }

    fn apply(&mut self, handle: PopupHandle, action: PendingAction, ctx: &mut Collaborators<'_>) {
        match action {
            PendingAction::Evaluate(mode) => self.evaluate(mode, ctx),
            PendingAction::AcceptExchange => {
                self.exchange_accepted = true;
                self.evaluate(ConfirmationMode::DontShow, ctx);
            }
            PendingAction::ShowMissingPremium => {
                self.close_steps(ctx.popups);
                let Some(request) = &self.request else {
                    return;
                };
                self.shortfall =
                    shortfall::evaluate(request, &*ctx.ledger, self.config.conversion());
                let missing = match request.currency {
                    CurrencyKind::Premium => self.shortfall.missing_primary,
                    _ => self.shortfall.missing_premium,
                };
                if missing.is_zero() {
                    // got the premium some other way meanwhile, already confirmed
                    self.evaluate(ConfirmationMode::DontShow, ctx);
                } else {
                    self.open_missing_premium(missing, ctx);
                }
            }
            PendingAction::ShowShop => {
                self.open_step(StepInit::PremiumShop, None, FlowState::ShowingPremiumShop, ctx.popups);
            }
            PendingAction::ShopClosed { packs_purchased } => {
                self.steps.remove(handle);
                ctx.popups.close(handle);
                if packs_purchased > 0 {
                    self.evaluate(ConfirmationMode::DontShow, ctx);
                } else {
                    // nothing bought, back to where we were
                    self.state = self.previous_state;
                }
            }
            PendingAction::Commit => self.complete(ctx),
            PendingAction::Cancel => self.cancel_flow(ctx),
        }
    }

    fn confirm(&self, mode: ConfirmationMode, amount: Amount) -> bool {
        requires_confirmation(
            mode,
            amount,
            self.config.confirmation_threshold,
            self.config.confirmation_opt_out,
        )
    }

    fn change_state(&mut self, state: FlowState) {
        debug!(flow = %self.name, from = ?self.state, to = ?state, "state changed");
        self.previous_state = self.state;
        self.state = state;
    }

    fn open_step(
        &mut self,
        init: StepInit,
        on_accept: Option<PendingAction>,
        state: FlowState,
        popups: &mut dyn PopupOrchestrator,
    ) {
        let kind = init.kind();
        let handle = popups.open(init);
        debug!(flow = %self.name, %handle, ?kind, "step opened");
        if let Some(replaced) = self.steps.push(OpenStep {
            kind,
            handle,
            on_accept,
        }) {
            popups.close(replaced);
        }
        self.change_state(state);
    }

    fn open_missing_premium(&mut self, missing: Amount, ctx: &mut Collaborators<'_>) {
        self.recommended_pack = self.recommender.recommend(ctx.catalog, missing);
        if self.recommended_pack.is_none() {
            warn!(flow = %self.name, "premium pack catalog is empty");
        }
        let init = StepInit::MissingPremium {
            missing,
            recommended: self.recommended_pack.clone(),
        };
        self.open_step(init, None, FlowState::ShowingMissingPremium, ctx.popups);
    }

    fn ask_confirmation(
        &mut self,
        amount: Amount,
        then: PendingAction,
        popups: &mut dyn PopupOrchestrator,
    ) {
        let init = StepInit::BigAmountConfirmation {
            amount,
            allow_opt_out: self.config.confirmation_mode != ConfirmationMode::Force,
        };
        self.open_step(init, Some(then), FlowState::AskingBigAmountConfirmation, popups);
    }

    fn close_steps(&mut self, popups: &mut dyn PopupOrchestrator) {
        for step in self.steps.drain_reverse() {
            popups.close(step.handle);
        }
    }

    /// Resources are available: commit, or just succeed when not asked to.
    fn complete(&mut self, ctx: &mut Collaborators<'_>) {
        let Some(request) = &self.request else {
            return;
        };
        if !request.commit_on_success {
            self.succeed(ctx);
            return;
        }

        match commit::commit(request, &self.shortfall, ctx.ledger, ctx.tracker) {
            Ok(()) => self.succeed(ctx),
            Err(e) => {
                warn!(flow = %self.name, reason = %e, "transaction failed");
                self.change_state(FlowState::FinishedError);
                ctx.popups.show_error(ErrorNotice::UnknownError);
                self.finish(ctx);
            }
        }
    }

    fn succeed(&mut self, ctx: &mut Collaborators<'_>) {
        self.change_state(FlowState::FinishedSuccess);
        self.emit(FlowEvent::Success);
        self.finish(ctx);
    }

    fn cancel_flow(&mut self, ctx: &mut Collaborators<'_>) {
        self.change_state(FlowState::FinishedCanceled);
        self.emit(FlowEvent::Cancel);
        self.finish(ctx);
    }

    fn finish(&mut self, ctx: &mut Collaborators<'_>) {
        self.close_steps(ctx.popups);
        self.pending.clear();
        info!(flow = %self.name, state = ?self.state, "flow finished");
        self.emit(FlowEvent::Finished);
    }

    fn listeners(&mut self, event: FlowEvent) -> &mut Vec<Listener> {
        match event {
            FlowEvent::Success => &mut self.on_success,
            FlowEvent::Cancel => &mut self.on_cancel,
            FlowEvent::Finished => &mut self.on_finished,
        }
    }

    fn emit(&mut self, event: FlowEvent) {
        let mut listeners = std::mem::take(self.listeners(event));
        for listener in listeners.iter_mut() {
            listener(self);
        }
        // keep listeners registered while emitting
        listeners.append(self.listeners(event));
        *self.listeners(event) = listeners;
    }
}

impl Drop for ResourcesFlow {
    fn drop(&mut self) {
        if !self.steps.is_empty() {
            warn!(
                flow = %self.name,
                open = self.steps.len(),
                "flow dropped with open steps, call cancel first"
            );
        }
    }
}
