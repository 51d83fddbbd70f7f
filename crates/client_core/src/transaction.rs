use std::{sync::Arc, time::Duration};

use contract_gateway::{ContractGateway, ReadCache};
use serde::Serialize;
use shared::{
    error::TxFailure,
    protocol::{Receipt, TransactionRequest, TxHandle},
    B256,
};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum TransactionState {
    Idle,
    /// Waiting on the wallet/user to sign.
    Submitting,
    /// Broadcast; waiting for inclusion.
    Confirming(TxHandle),
    Confirmed(Receipt),
    Failed(TxFailure),
}

impl TransactionState {
    pub const fn name(&self) -> &'static str {
        match self {
            TransactionState::Idle => "idle",
            TransactionState::Submitting => "submitting",
            TransactionState::Confirming(_) => "confirming",
            TransactionState::Confirmed(_) => "confirmed",
            TransactionState::Failed(_) => "failed",
        }
    }

    pub const fn is_idle(&self) -> bool {
        matches!(self, TransactionState::Idle)
    }

    pub const fn is_in_flight(&self) -> bool {
        matches!(
            self,
            TransactionState::Submitting | TransactionState::Confirming(_)
        )
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::Confirmed(_) | TransactionState::Failed(_)
        )
    }

    pub const fn is_confirmed(&self) -> bool {
        matches!(self, TransactionState::Confirmed(_))
    }
}

/// External resolutions fed into a controller, one per wallet or chain outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionEvent {
    WalletAccepted(TxHandle),
    WalletRejected(TxFailure),
    Included(Receipt),
    InclusionFailed(TxFailure),
}

impl TransactionEvent {
    const fn name(&self) -> &'static str {
        match self {
            TransactionEvent::WalletAccepted(_) => "wallet_accepted",
            TransactionEvent::WalletRejected(_) => "wallet_rejected",
            TransactionEvent::Included(_) => "included",
            TransactionEvent::InclusionFailed(_) => "inclusion_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("{label}: a transaction is already in flight ({state})")]
    AlreadyInFlight { label: String, state: &'static str },
    #[error("{label}: {event} is not valid while {state}")]
    InvalidTransition {
        label: String,
        state: &'static str,
        event: &'static str,
    },
    #[error("{label}: receipt {found} does not belong to pending transaction {expected}")]
    ForeignReceipt {
        label: String,
        expected: TxHandle,
        found: B256,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error(transparent)]
    Controller(#[from] ControllerError),
    #[error(transparent)]
    Failed(#[from] TxFailure),
}

/// Lifecycle of a single write.
///
/// `Idle -> Submitting -> Confirming -> Confirmed | Failed`. Terminal states stay
/// put until `reset`; there is no retry. Reaching `Confirmed` invalidates the
/// whole read cache exactly once.
pub struct TransactionController {
    label: String,
    state: TransactionState,
    request: Option<TransactionRequest>,
    cache: Arc<dyn ReadCache>,
    invalidated: bool,
}

impl TransactionController {
    pub fn new(label: impl Into<String>, cache: Arc<dyn ReadCache>) -> Self {
        Self {
            label: label.into(),
            state: TransactionState::Idle,
            request: None,
            cache,
            invalidated: false,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> &TransactionState {
        &self.state
    }

    pub fn request(&self) -> Option<&TransactionRequest> {
        self.request.as_ref()
    }

    pub fn submit(&mut self, request: TransactionRequest) -> Result<(), ControllerError> {
        if !self.state.is_idle() {
            return Err(ControllerError::AlreadyInFlight {
                label: self.label.clone(),
                state: self.state.name(),
            });
        }
        info!(
            controller = %self.label,
            entry_point = %request.entry_point,
            target = %request.target,
            "transaction submitting"
        );
        self.request = Some(request);
        self.state = TransactionState::Submitting;
        Ok(())
    }

    pub fn apply(&mut self, event: TransactionEvent) -> Result<&TransactionState, ControllerError> {
        let next = match (&self.state, event) {
            (TransactionState::Submitting, TransactionEvent::WalletAccepted(handle)) => {
                info!(controller = %self.label, tx = %handle, "transaction broadcast");
                TransactionState::Confirming(handle)
            }
            (TransactionState::Submitting, TransactionEvent::WalletRejected(failure)) => {
                warn!(controller = %self.label, error = %failure, "wallet rejected transaction");
                TransactionState::Failed(failure)
            }
            (TransactionState::Confirming(handle), TransactionEvent::Included(receipt)) => {
                if receipt.tx_hash != handle.0 {
                    return Err(ControllerError::ForeignReceipt {
                        label: self.label.clone(),
                        expected: *handle,
                        found: receipt.tx_hash,
                    });
                }
                info!(
                    controller = %self.label,
                    tx = %handle,
                    block = receipt.block_number,
                    "transaction confirmed"
                );
                TransactionState::Confirmed(receipt)
            }
            (TransactionState::Confirming(handle), TransactionEvent::InclusionFailed(failure)) => {
                warn!(controller = %self.label, tx = %handle, error = %failure, "transaction failed");
                TransactionState::Failed(failure)
            }
            (state, event) => {
                return Err(ControllerError::InvalidTransition {
                    label: self.label.clone(),
                    state: state.name(),
                    event: event.name(),
                });
            }
        };

        self.state = next;
        if self.state.is_confirmed() {
            self.signal_invalidation();
        }
        Ok(&self.state)
    }

    /// Returns a finished controller to `Idle` for a new logical action.
    pub fn reset(&mut self) -> Result<(), ControllerError> {
        if self.state.is_in_flight() {
            return Err(ControllerError::AlreadyInFlight {
                label: self.label.clone(),
                state: self.state.name(),
            });
        }
        self.state = TransactionState::Idle;
        self.request = None;
        self.invalidated = false;
        Ok(())
    }

    /// Drives `request` through the gateway to a terminal state. With a
    /// `timeout`, an inclusion wait that outlives it ends in `Failed(Timeout)`.
    pub async fn execute(
        &mut self,
        gateway: &dyn ContractGateway,
        request: TransactionRequest,
        timeout: Option<Duration>,
    ) -> Result<Receipt, TransactionError> {
        self.submit(request.clone())?;

        let handle = match gateway.write(&request).await {
            Ok(handle) => {
                self.apply(TransactionEvent::WalletAccepted(handle))?;
                handle
            }
            Err(failure) => {
                self.apply(TransactionEvent::WalletRejected(failure.clone()))?;
                return Err(failure.into());
            }
        };

        let inclusion = match timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, gateway.wait_for_inclusion(handle)).await {
                    Ok(result) => result,
                    Err(_) => Err(TxFailure::Timeout {
                        waited_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    }),
                }
            }
            None => gateway.wait_for_inclusion(handle).await,
        };

        match inclusion {
            Ok(receipt) => match self.apply(TransactionEvent::Included(receipt)).map(|_| ()) {
                Ok(()) => Ok(receipt),
                // The gateway answered for some other transaction; nothing else will
                // arrive for this handle, so settle as failed instead of hanging.
                Err(err @ ControllerError::ForeignReceipt { .. }) => {
                    let failure = TxFailure::NetworkError(err.to_string());
                    self.apply(TransactionEvent::InclusionFailed(failure.clone()))?;
                    Err(failure.into())
                }
                Err(err) => Err(err.into()),
            },
            Err(failure) => {
                self.apply(TransactionEvent::InclusionFailed(failure.clone()))?;
                Err(failure.into())
            }
        }
    }

    fn signal_invalidation(&mut self) {
        if self.invalidated {
            return;
        }
        self.invalidated = true;
        self.cache.invalidate_all();
        info!(controller = %self.label, "read cache invalidated after confirmation");
    }
}

#[cfg(test)]
#[path = "tests/transaction_tests.rs"]
mod tests;
