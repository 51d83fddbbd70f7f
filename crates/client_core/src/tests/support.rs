use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use contract_gateway::{ContractGateway, ReadCache};
use shared::{
    domain::{ProtocolAddresses, TokenInfo},
    error::{CallError, TxFailure},
    protocol::{CallValue, ReadCall, Receipt, TransactionRequest, TxHandle},
    Address, B256, U256,
};
use tokio::sync::Mutex;

#[derive(Default)]
pub struct RecordingCache {
    invalidations: AtomicUsize,
}

impl RecordingCache {
    pub fn count(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }
}

impl ReadCache for RecordingCache {
    fn invalidate_all(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn recording_cache() -> (Arc<RecordingCache>, Arc<dyn ReadCache>) {
    let cache = Arc::new(RecordingCache::default());
    let shared: Arc<dyn ReadCache> = cache.clone();
    (cache, shared)
}

pub enum Inclusion {
    Mined,
    Fail(TxFailure),
    Hang,
    /// Answers with a receipt for the given handle instead of the one awaited.
    ReceiptFor(TxHandle),
}

/// Gateway with canned reads and scripted write/inclusion outcomes. Writes
/// without a script are accepted and mined.
#[derive(Default)]
pub struct ScriptedGateway {
    reads: HashMap<ReadCall, Result<CallValue, CallError>>,
    write_outcomes: Mutex<VecDeque<Result<(), TxFailure>>>,
    inclusions: Mutex<VecDeque<Inclusion>>,
    pub submitted: Mutex<Vec<TransactionRequest>>,
    pub reads_issued: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_read(mut self, call: ReadCall, result: Result<CallValue, CallError>) -> Self {
        self.reads.insert(call, result);
        self
    }

    pub fn reject_next_write(self, failure: TxFailure) -> Self {
        self.write_outcomes.try_lock().expect("unshared").push_back(Err(failure));
        self
    }

    pub fn accept_next_write(self) -> Self {
        self.write_outcomes.try_lock().expect("unshared").push_back(Ok(()));
        self
    }

    pub fn then_inclusion(self, inclusion: Inclusion) -> Self {
        self.inclusions.try_lock().expect("unshared").push_back(inclusion);
        self
    }

    pub async fn submitted(&self) -> Vec<TransactionRequest> {
        self.submitted.lock().await.clone()
    }
}

#[async_trait]
impl ContractGateway for ScriptedGateway {
    async fn read(&self, call: &ReadCall) -> Result<CallValue, CallError> {
        self.reads_issued.fetch_add(1, Ordering::SeqCst);
        self.reads
            .get(call)
            .cloned()
            .unwrap_or_else(|| Err(CallError::transport(call.entry_point, "unscripted read")))
    }

    async fn write(&self, request: &TransactionRequest) -> Result<TxHandle, TxFailure> {
        let outcome = self.write_outcomes.lock().await.pop_front().unwrap_or(Ok(()));
        outcome?;
        let mut submitted = self.submitted.lock().await;
        submitted.push(request.clone());
        Ok(handle_for(submitted.len()))
    }

    async fn wait_for_inclusion(&self, handle: TxHandle) -> Result<Receipt, TxFailure> {
        let next = self.inclusions.lock().await.pop_front().unwrap_or(Inclusion::Mined);
        match next {
            Inclusion::Mined => Ok(receipt_for(handle)),
            Inclusion::Fail(failure) => Err(failure),
            Inclusion::Hang => std::future::pending().await,
            Inclusion::ReceiptFor(other) => Ok(receipt_for(other)),
        }
    }
}

pub fn handle_for(n: usize) -> TxHandle {
    TxHandle(B256::repeat_byte(n as u8))
}

pub fn receipt_for(handle: TxHandle) -> Receipt {
    Receipt {
        tx_hash: handle.0,
        block_number: 100,
    }
}

pub fn addresses() -> ProtocolAddresses {
    ProtocolAddresses {
        lending_pool: Address::repeat_byte(0x10),
        price_oracle: Address::repeat_byte(0x20),
        liquidation_engine: Address::repeat_byte(0x30),
        debt_asset: Address::repeat_byte(0xee),
    }
}

pub fn tokens() -> Vec<TokenInfo> {
    ["TSLA", "AMZN", "PLTR", "NFLX", "AMD", "WETH"]
        .into_iter()
        .enumerate()
        .map(|(i, symbol)| TokenInfo {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            address: if symbol == "WETH" {
                Address::repeat_byte(0xee)
            } else {
                Address::repeat_byte(0xa0 + i as u8)
            },
            reference_price: U256::from((i as u64 + 1) * 100_000_000),
        })
        .collect()
}
