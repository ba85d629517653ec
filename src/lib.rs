pub mod amount;
pub mod catalog;
pub mod config;
pub mod csv;
pub mod flow;
pub mod ledger;
pub mod model;
pub mod popup;
pub mod session;
pub mod tracking;

pub use amount::Amount;
pub use catalog::{PackCatalog, StaticCatalog};
pub use config::FlowConfig;
pub use flow::{Collaborators, ConfirmationMode, FlowState, ResourcesFlow};
pub use ledger::{CurrencyLedger, Wallet};
pub use model::{CurrencyKind, CurrencyPack, EconomyGroup, TransactionRequest};
pub use popup::{PopupHandle, PopupOrchestrator, StepInit, StepOutcome};
pub use session::{Answer, Command, Session};
pub use tracking::{Tracker, TrackingLog};
