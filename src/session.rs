//! Scripted purchase sessions.
//!
//! A [`Session`] replays grants and purchase attempts against one wallet. Each
//! attempt gets a [`ScriptedPopups`] that answers every step the same way.

use std::collections::VecDeque;

use serde::Deserialize;
use thiserror::Error;
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use crate::Amount;
use crate::catalog::StaticCatalog;
use crate::config::FlowConfig;
use crate::flow::{Collaborators, FlowError, FlowState, ResourcesFlow};
use crate::ledger::{CurrencyLedger, Wallet};
use crate::model::{CurrencyKind, EconomyGroup, TransactionRequest};
use crate::popup::{ErrorNotice, PopupHandle, PopupOrchestrator, StepInit, StepOutcome};
use crate::tracking::TrackingLog;

/// Outcomes exchanged before an attempt is given up.
const MAX_STEPS: usize = 64;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("attempt {0}: {1}")]
    Flow(usize, FlowError),

    #[error("attempt {0}: unknown pack sku '{1}'")]
    UnknownSku(usize, String),

    #[error("attempt {0}: no answer left for open steps")]
    Stalled(usize),

    #[error("attempt {0}: gave up after {1} steps")]
    TooManySteps(usize, usize),
}

/// How the scripted player answers every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Answer {
    /// Agree to everything that doesn't cost real money.
    #[default]
    Accept,
    /// Like `Accept`, and buy every recommended pack.
    Buy,
    Cancel,
}

/// Input of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Credit the wallet, outside of any flow.
    Grant {
        currency: CurrencyKind,
        amount: Amount,
    },
    Purchase {
        currency: CurrencyKind,
        amount: Amount,
        group: Option<EconomyGroup>,
        answer: Answer,
    },
}

/// Orchestrator answering each step as soon as it opens.
#[derive(Debug)]
pub struct ScriptedPopups {
    answer: Answer,
    next: u64,
    open: Vec<PopupHandle>,
    outbox: VecDeque<(PopupHandle, StepOutcome)>,
    errors: Vec<ErrorNotice>,
}

impl ScriptedPopups {
    pub fn new(answer: Answer) -> Self {
        Self {
            answer,
            next: 0,
            open: Vec::new(),
            outbox: VecDeque::new(),
            errors: Vec::new(),
        }
    }

    pub fn next_outcome(&mut self) -> Option<(PopupHandle, StepOutcome)> {
        self.outbox.pop_front()
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn errors(&self) -> &[ErrorNotice] {
        &self.errors
    }

    fn respond(&self, init: &StepInit) -> StepOutcome {
        match (self.answer, init) {
            (_, StepInit::PremiumShop) => StepOutcome::Closed { packs_purchased: 0 },
            (Answer::Cancel, _) => StepOutcome::Cancel,
            (
                Answer::Buy,
                StepInit::MissingPremium {
                    recommended: Some(pack),
                    ..
                },
            ) => StepOutcome::PackPurchased {
                sku: pack.sku.clone(),
            },
            (_, StepInit::MissingPremium { .. }) => StepOutcome::Cancel,
            _ => StepOutcome::Accept,
        }
    }
}

impl PopupOrchestrator for ScriptedPopups {
    fn open(&mut self, init: StepInit) -> PopupHandle {
        self.next += 1;
        let handle = PopupHandle(self.next);
        let outcome = self.respond(&init);
        self.open.push(handle);
        self.outbox.push_back((handle, outcome));
        handle
    }

    fn close(&mut self, handle: PopupHandle) {
        self.open.retain(|h| *h != handle);
        self.outbox.retain(|(h, _)| *h != handle);
    }

    fn show_error(&mut self, notice: ErrorNotice) {
        warn!(?notice, "flow error shown");
        self.errors.push(notice);
    }
}

/// Result of one purchase attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub currency: CurrencyKind,
    pub amount: Amount,
    pub state: FlowState,
}

pub struct Session {
    wallet: Wallet,
    catalog: StaticCatalog,
    config: FlowConfig,
    tracker: TrackingLog,
    attempts: Vec<Attempt>,
}

/// Public API
impl Session {
    pub fn new(catalog: StaticCatalog, config: FlowConfig) -> Self {
        Self {
            wallet: Wallet::new(),
            catalog,
            config,
            tracker: TrackingLog::new(),
            attempts: Vec::new(),
        }
    }

    /// Run the session over the given command stream.
    pub async fn run(&mut self, mut stream: impl Stream<Item = Command> + Unpin) {
        while let Some(command) = stream.next().await {
            // a failed attempt doesn't stop the session
            if let Err(e) = self.apply(command) {
                warn!("{e}");
            }
        }
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn tracker(&self) -> &TrackingLog {
        &self.tracker
    }

    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    /// Apply one command. Purchases return the state their flow ended in.
    pub fn apply(&mut self, command: Command) -> Result<Option<FlowState>, SessionError> {
        match command {
            Command::Grant { currency, amount } => {
                self.wallet.credit(currency, amount, false, None);
                info!(%currency, %amount, "granted");
                Ok(None)
            }
            Command::Purchase {
                currency,
                amount,
                group,
                answer,
            } => {
                let mut request = TransactionRequest::new(amount, currency);
                request.economy_group = group;
                let state = self.purchase(request, answer)?;
                self.attempts.push(Attempt {
                    currency,
                    amount,
                    state,
                });
                Ok(Some(state))
            }
        }
    }
}

/// Private API
impl Session {
    fn purchase(
        &mut self,
        request: TransactionRequest,
        answer: Answer,
    ) -> Result<FlowState, SessionError> {
        let attempt = self.attempts.len() + 1;
        let mut popups = ScriptedPopups::new(answer);
        let mut flow = ResourcesFlow::new(format!("attempt-{attempt}"), self.config.clone());

        let mut ctx = Collaborators {
            ledger: &mut self.wallet,
            popups: &mut popups,
            catalog: &self.catalog,
            tracker: &mut self.tracker,
        };
        flow.begin(request, &mut ctx)
            .map_err(|e| SessionError::Flow(attempt, e))?;

        let mut steps = 0;
        while !flow.is_finished() {
            steps += 1;
            let next = popups.next_outcome();
            let mut ctx = Collaborators {
                ledger: &mut self.wallet,
                popups: &mut popups,
                catalog: &self.catalog,
                tracker: &mut self.tracker,
            };

            let Some((handle, outcome)) = next else {
                flow.cancel(&mut ctx);
                return Err(SessionError::Stalled(attempt));
            };
            if steps > MAX_STEPS {
                flow.cancel(&mut ctx);
                return Err(SessionError::TooManySteps(attempt, MAX_STEPS));
            }

            // the store credits the pack before the popup reports it
            if let StepOutcome::PackPurchased { sku } = &outcome {
                let Some(pack) = self.catalog.find_sku(sku) else {
                    flow.cancel(&mut ctx);
                    return Err(SessionError::UnknownSku(attempt, sku.clone()));
                };
                ctx.ledger.credit(
                    CurrencyKind::Premium,
                    pack.amount,
                    true,
                    Some(&EconomyGroup::premium_shop()),
                );
            }

            flow.handle_outcome(handle, outcome, &mut ctx);
        }

        info!(
            attempt,
            state = ?flow.state(),
            steps,
            "attempt finished"
        );
        Ok(flow.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CurrencyPack;
    use crate::tracking::TrackedEvent;

    fn session(config: FlowConfig) -> Session {
        Session::new(
            StaticCatalog::new(vec![
                CurrencyPack::new("small", 10),
                CurrencyPack::new("large", 50),
            ]),
            config,
        )
    }

    fn grant(currency: CurrencyKind, amount: u64) -> Command {
        Command::Grant {
            currency,
            amount: Amount::new(amount),
        }
    }

    fn purchase(currency: CurrencyKind, amount: u64, answer: Answer) -> Command {
        Command::Purchase {
            currency,
            amount: Amount::new(amount),
            group: Some(EconomyGroup::new("test")),
            answer,
        }
    }

    #[test]
    fn grant_credits_wallet() {
        let mut session = session(FlowConfig::default());
        assert_eq!(session.apply(grant(CurrencyKind::Primary, 100)).unwrap(), None);
        assert_eq!(session.wallet().balance(CurrencyKind::Primary), Amount::new(100));
    }

    #[test]
    fn affordable_purchase_succeeds() {
        let mut session = session(FlowConfig::default());
        session.apply(grant(CurrencyKind::Primary, 100)).unwrap();

        let state = session
            .apply(purchase(CurrencyKind::Primary, 60, Answer::Accept))
            .unwrap();

        assert_eq!(state, Some(FlowState::FinishedSuccess));
        assert_eq!(session.wallet().balance(CurrencyKind::Primary), Amount::new(40));
        assert!(matches!(
            session.tracker().events(),
            [TrackedEvent::Purchase(_)]
        ));
    }

    #[test]
    fn accept_without_premium_cancels() {
        let mut session = session(FlowConfig::default().with_conversion(10));
        session.apply(grant(CurrencyKind::Primary, 50)).unwrap();

        let state = session
            .apply(purchase(CurrencyKind::Primary, 100, Answer::Accept))
            .unwrap();

        assert_eq!(state, Some(FlowState::FinishedCanceled));
        assert_eq!(session.wallet().balance(CurrencyKind::Primary), Amount::new(50));
    }

    #[test]
    fn buying_packs_until_affordable() {
        let mut session = session(FlowConfig::default());

        // 120 premium needed, largest pack is 50
        let state = session
            .apply(purchase(CurrencyKind::Premium, 120, Answer::Buy))
            .unwrap();

        assert_eq!(state, Some(FlowState::FinishedSuccess));
        // 50 + 50 + 50, the last recommendation covers the remaining 20 with "large"
        assert_eq!(session.wallet().balance(CurrencyKind::Premium), Amount::new(30));
        assert_eq!(session.wallet().earnings().len(), 3);
    }

    #[test]
    fn exchange_buys_missing_premium_first() {
        let mut session = session(FlowConfig::default().with_conversion(10));
        session.apply(grant(CurrencyKind::Primary, 50)).unwrap();

        // 50 primary missing, costing 5 premium, recommended pack "small"
        let state = session
            .apply(purchase(CurrencyKind::Primary, 100, Answer::Buy))
            .unwrap();

        assert_eq!(state, Some(FlowState::FinishedSuccess));
        assert_eq!(session.wallet().balance(CurrencyKind::Primary), Amount::ZERO);
        assert_eq!(session.wallet().balance(CurrencyKind::Premium), Amount::new(5));
    }

    #[test]
    fn cancel_answer_cancels() {
        let mut session = session(FlowConfig::default());
        session.apply(grant(CurrencyKind::Premium, 100)).unwrap();

        let state = session
            .apply(purchase(CurrencyKind::Premium, 30, Answer::Cancel))
            .unwrap();

        assert_eq!(state, Some(FlowState::FinishedCanceled));
        assert_eq!(session.wallet().balance(CurrencyKind::Premium), Amount::new(100));
    }

    #[test]
    fn scripted_close_drops_pending_answer() {
        let mut popups = ScriptedPopups::new(Answer::Accept);
        let handle = popups.open(StepInit::PremiumShop);
        assert_eq!(popups.open_count(), 1);

        popups.close(handle);
        assert_eq!(popups.open_count(), 0);
        assert!(popups.next_outcome().is_none());
    }

    #[tokio::test]
    async fn run_processes_all_commands() {
        let mut session = session(FlowConfig::default());
        let commands = vec![
            grant(CurrencyKind::Premium, 15),
            purchase(CurrencyKind::Premium, 10, Answer::Accept),
            purchase(CurrencyKind::Premium, 10, Answer::Accept),
        ];

        session.run(tokio_stream::iter(commands)).await;

        let states: Vec<_> = session.attempts().iter().map(|a| a.state).collect();
        assert_eq!(
            states,
            [FlowState::FinishedSuccess, FlowState::FinishedCanceled]
        );
        assert_eq!(session.wallet().balance(CurrencyKind::Premium), Amount::new(5));
    }
}
