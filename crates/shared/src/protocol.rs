use std::fmt;

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{LiquidationQuote, RiskParams},
    error::CallError,
};

/// Named contract entry points. Serialized with their Solidity names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryPoint {
    // ERC-20
    Approve,
    Allowance,
    BalanceOf,
    // lending pool writes
    Deposit,
    Withdraw,
    Borrow,
    Repay,
    Liquidate,
    // lending pool reads
    GetHealthFactor,
    GetUserDebt,
    GetUserCollateral,
    GetMaxBorrow,
    BorrowIndex,
    TotalBorrowAmount,
    TotalBorrowShares,
    Reserves,
    ReserveFactor,
    RiskRegistry,
    // oracle
    GetPrice,
    IsMarketOpen,
    SetPrices,
    SetMarketStatus,
    // risk registry / liquidation engine
    GetRiskParams,
    IsLiquidationProfitable,
}

impl EntryPoint {
    pub const fn name(self) -> &'static str {
        match self {
            EntryPoint::Approve => "approve",
            EntryPoint::Allowance => "allowance",
            EntryPoint::BalanceOf => "balanceOf",
            EntryPoint::Deposit => "deposit",
            EntryPoint::Withdraw => "withdraw",
            EntryPoint::Borrow => "borrow",
            EntryPoint::Repay => "repay",
            EntryPoint::Liquidate => "liquidate",
            EntryPoint::GetHealthFactor => "getHealthFactor",
            EntryPoint::GetUserDebt => "getUserDebt",
            EntryPoint::GetUserCollateral => "getUserCollateral",
            EntryPoint::GetMaxBorrow => "getMaxBorrow",
            EntryPoint::BorrowIndex => "borrowIndex",
            EntryPoint::TotalBorrowAmount => "totalBorrowAmount",
            EntryPoint::TotalBorrowShares => "totalBorrowShares",
            EntryPoint::Reserves => "reserves",
            EntryPoint::ReserveFactor => "reserveFactor",
            EntryPoint::RiskRegistry => "riskRegistry",
            EntryPoint::GetPrice => "getPrice",
            EntryPoint::IsMarketOpen => "isMarketOpen",
            EntryPoint::SetPrices => "setPrices",
            EntryPoint::SetMarketStatus => "setMarketStatus",
            EntryPoint::GetRiskParams => "getRiskParams",
            EntryPoint::IsLiquidationProfitable => "isLiquidationProfitable",
        }
    }

    pub const fn is_write(self) -> bool {
        matches!(
            self,
            EntryPoint::Approve
                | EntryPoint::Deposit
                | EntryPoint::Withdraw
                | EntryPoint::Borrow
                | EntryPoint::Repay
                | EntryPoint::Liquidate
                | EntryPoint::SetPrices
                | EntryPoint::SetMarketStatus
        )
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CallArg {
    Address(Address),
    Uint(U256),
    Bool(bool),
    AddressList(Vec<Address>),
    UintList(Vec<U256>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReadCall {
    pub target: Address,
    pub entry_point: EntryPoint,
    pub args: Vec<CallArg>,
}

impl ReadCall {
    pub fn new(target: Address, entry_point: EntryPoint, args: Vec<CallArg>) -> Self {
        Self {
            target,
            entry_point,
            args,
        }
    }
}

/// One write call. Never mutated after it is handed to a controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub target: Address,
    pub entry_point: EntryPoint,
    pub args: Vec<CallArg>,
}

impl TransactionRequest {
    pub fn new(target: Address, entry_point: EntryPoint, args: Vec<CallArg>) -> Self {
        Self {
            target,
            entry_point,
            args,
        }
    }
}

/// Decoded result of a read call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CallValue {
    Uint(U256),
    Bool(bool),
    Address(Address),
    RiskParams(RiskParams),
    LiquidationQuote(LiquidationQuote),
}

impl CallValue {
    fn kind(&self) -> &'static str {
        match self {
            CallValue::Uint(_) => "uint",
            CallValue::Bool(_) => "bool",
            CallValue::Address(_) => "address",
            CallValue::RiskParams(_) => "risk_params",
            CallValue::LiquidationQuote(_) => "liquidation_quote",
        }
    }

    pub fn into_uint(self, entry_point: EntryPoint) -> Result<U256, CallError> {
        match self {
            CallValue::Uint(value) => Ok(value),
            other => Err(CallError::decode(entry_point, "uint", other.kind())),
        }
    }

    pub fn into_bool(self, entry_point: EntryPoint) -> Result<bool, CallError> {
        match self {
            CallValue::Bool(value) => Ok(value),
            other => Err(CallError::decode(entry_point, "bool", other.kind())),
        }
    }

    pub fn into_address(self, entry_point: EntryPoint) -> Result<Address, CallError> {
        match self {
            CallValue::Address(value) => Ok(value),
            other => Err(CallError::decode(entry_point, "address", other.kind())),
        }
    }

    pub fn into_risk_params(self, entry_point: EntryPoint) -> Result<RiskParams, CallError> {
        match self {
            CallValue::RiskParams(value) => Ok(value),
            other => Err(CallError::decode(entry_point, "risk_params", other.kind())),
        }
    }

    pub fn into_liquidation_quote(
        self,
        entry_point: EntryPoint,
    ) -> Result<LiquidationQuote, CallError> {
        match self {
            CallValue::LiquidationQuote(value) => Ok(value),
            other => Err(CallError::decode(
                entry_point,
                "liquidation_quote",
                other.kind(),
            )),
        }
    }
}

/// Hash of a transaction the wallet accepted for broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHandle(pub B256);

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: B256,
    pub block_number: u64,
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
