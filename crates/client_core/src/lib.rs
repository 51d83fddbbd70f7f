//! Client-side orchestration for the lending pool: transaction lifecycle,
//! approve-then-act sequencing, and read aggregation for display.

pub mod action;
pub mod market;
pub mod preview;
pub mod status;
pub mod transaction;

pub use action::{
    needs_approval, ActionCoordinator, ActionPlan, ActionStatus, ActionStep, AssetPrice,
    CoordinatorError, Effect, MarketStatusSequence, SequenceError,
};
pub use market::{has_stale_price, AssetReadings, MarketReader, ProtocolStats, UserPosition};
pub use preview::{max_liquidatable, projected_debt, AmountLimits, DebtChange};
pub use status::{status_line, TxStatusLine};
pub use transaction::{
    ControllerError, TransactionController, TransactionError, TransactionEvent, TransactionState,
};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
