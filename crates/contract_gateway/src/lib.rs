use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures::future::join_all;
use shared::{
    error::{CallError, TxFailure},
    protocol::{CallValue, ReadCall, Receipt, TransactionRequest, TxHandle},
};
use tracing::debug;

/// Read and write access to the protocol contracts. Implementations hold no
/// state the core depends on; every call stands alone.
#[async_trait]
pub trait ContractGateway: Send + Sync {
    async fn read(&self, call: &ReadCall) -> Result<CallValue, CallError>;

    /// Hands the request to the wallet. Resolves with a handle once the wallet
    /// has broadcast it, or with the rejection/simulation failure.
    async fn write(&self, request: &TransactionRequest) -> Result<TxHandle, TxFailure>;

    async fn wait_for_inclusion(&self, handle: TxHandle) -> Result<Receipt, TxFailure>;

    /// Issues every call concurrently. Results line up with `calls` by position
    /// regardless of completion order, and each carries its own outcome.
    async fn read_batch(&self, calls: &[ReadCall]) -> Vec<Result<CallValue, CallError>> {
        debug!(calls = calls.len(), "issuing read batch");
        join_all(calls.iter().map(|call| self.read(call))).await
    }
}

/// The shared read cache as seen by the core: it can only be dropped wholesale.
pub trait ReadCache: Send + Sync {
    fn invalidate_all(&self);
}

/// Generation counter for read results. Consumers tag what they fetched with
/// `current()` and refetch once it moves.
#[derive(Debug, Default)]
pub struct CacheEpoch {
    epoch: AtomicU64,
}

impl CacheEpoch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn is_stale(&self, fetched_at: u64) -> bool {
        fetched_at != self.current()
    }
}

impl ReadCache for CacheEpoch {
    fn invalidate_all(&self) {
        let next = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(epoch = next, "read cache invalidated");
    }
}

pub struct MissingContractGateway;

#[async_trait]
impl ContractGateway for MissingContractGateway {
    async fn read(&self, call: &ReadCall) -> Result<CallValue, CallError> {
        Err(CallError::transport(
            call.entry_point,
            "no contract gateway configured",
        ))
    }

    async fn write(&self, request: &TransactionRequest) -> Result<TxHandle, TxFailure> {
        Err(TxFailure::NetworkError(format!(
            "no wallet connected to submit {}",
            request.entry_point
        )))
    }

    async fn wait_for_inclusion(&self, handle: TxHandle) -> Result<Receipt, TxFailure> {
        Err(TxFailure::NetworkError(format!(
            "no contract gateway configured to track {handle}"
        )))
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
