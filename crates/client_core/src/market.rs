//! Read aggregation over `ContractGateway::read_batch`.
//!
//! Every per-asset result is keyed by the asset address and carries its own
//! `Result`, so one failed sub-read leaves the rest of the batch usable.

use std::collections::BTreeMap;

use contract_gateway::ContractGateway;
use shared::{
    domain::{LiquidationQuote, ProtocolAddresses, RiskParams, TokenInfo},
    error::CallError,
    protocol::{CallArg, CallValue, EntryPoint, ReadCall},
    Address, U256,
};
use tracing::warn;

pub type Reading<T> = Result<T, CallError>;
pub type AssetReadings<T> = BTreeMap<Address, Reading<T>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPosition {
    pub debt: Reading<U256>,
    /// 18 decimals; `U256::MAX` or zero when there is no debt.
    pub health_factor: Reading<U256>,
    pub max_borrow: Reading<U256>,
    pub collaterals: AssetReadings<U256>,
}

impl UserPosition {
    /// Collateral for display math; unavailable or unknown assets count as zero.
    pub fn collateral_or_zero(&self, asset: &Address) -> U256 {
        match self.collaterals.get(asset) {
            Some(Ok(amount)) => *amount,
            _ => U256::ZERO,
        }
    }

    pub fn debt_or_zero(&self) -> U256 {
        self.debt.as_ref().copied().unwrap_or(U256::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolStats {
    pub total_borrow_amount: Reading<U256>,
    pub total_borrow_shares: Reading<U256>,
    /// RAY.
    pub borrow_index: Reading<U256>,
    pub reserves: Reading<U256>,
    /// WAD.
    pub reserve_factor: Reading<U256>,
}

/// Oracle prices need a refresh when any read failed or came back zero.
pub fn has_stale_price(prices: &AssetReadings<U256>) -> bool {
    prices
        .values()
        .any(|price| price.as_ref().map_or(true, |p| p.is_zero()))
}

pub struct MarketReader<'a> {
    gateway: &'a dyn ContractGateway,
    addresses: ProtocolAddresses,
    tokens: &'a [TokenInfo],
}

impl<'a> MarketReader<'a> {
    pub fn new(
        gateway: &'a dyn ContractGateway,
        addresses: ProtocolAddresses,
        tokens: &'a [TokenInfo],
    ) -> Self {
        Self {
            gateway,
            addresses,
            tokens,
        }
    }

    async fn read_per_asset<T>(
        &self,
        make_call: impl Fn(&TokenInfo) -> ReadCall,
        decode: impl Fn(CallValue, EntryPoint) -> Reading<T>,
    ) -> AssetReadings<T> {
        let calls: Vec<ReadCall> = self.tokens.iter().map(make_call).collect();
        let results = self.gateway.read_batch(&calls).await;
        self.tokens
            .iter()
            .zip(calls.iter().zip(results))
            .map(|(token, (call, result))| {
                let reading = result.and_then(|value| decode(value, call.entry_point));
                if let Err(err) = &reading {
                    warn!(asset = %token.address, symbol = %token.symbol, error = %err, "read unavailable");
                }
                (token.address, reading)
            })
            .collect()
    }

    async fn read_one(&self, call: ReadCall) -> Reading<CallValue> {
        let entry_point = call.entry_point;
        let result = self.gateway.read(&call).await;
        if let Err(err) = &result {
            warn!(%entry_point, error = %err, "read unavailable");
        }
        result
    }

    /// Oracle prices, 8 decimals.
    pub async fn token_prices(&self) -> AssetReadings<U256> {
        let oracle = self.addresses.price_oracle;
        self.read_per_asset(
            |token| {
                ReadCall::new(
                    oracle,
                    EntryPoint::GetPrice,
                    vec![CallArg::Address(token.address)],
                )
            },
            CallValue::into_uint,
        )
        .await
    }

    pub async fn market_status(&self) -> AssetReadings<bool> {
        let oracle = self.addresses.price_oracle;
        self.read_per_asset(
            |token| {
                ReadCall::new(
                    oracle,
                    EntryPoint::IsMarketOpen,
                    vec![CallArg::Address(token.address)],
                )
            },
            CallValue::into_bool,
        )
        .await
    }

    pub async fn risk_registry(&self) -> Reading<Address> {
        self.read_one(ReadCall::new(
            self.addresses.lending_pool,
            EntryPoint::RiskRegistry,
            Vec::new(),
        ))
        .await?
        .into_address(EntryPoint::RiskRegistry)
    }

    pub async fn risk_params(&self, registry: Address) -> AssetReadings<RiskParams> {
        self.read_per_asset(
            |token| {
                ReadCall::new(
                    registry,
                    EntryPoint::GetRiskParams,
                    vec![CallArg::Address(token.address)],
                )
            },
            CallValue::into_risk_params,
        )
        .await
    }

    pub async fn token_balances(&self, user: Address) -> AssetReadings<U256> {
        self.read_per_asset(
            |token| {
                ReadCall::new(
                    token.address,
                    EntryPoint::BalanceOf,
                    vec![CallArg::Address(user)],
                )
            },
            CallValue::into_uint,
        )
        .await
    }

    /// Debt asset held by the pool.
    pub async fn pool_liquidity(&self) -> Reading<U256> {
        self.read_one(ReadCall::new(
            self.addresses.debt_asset,
            EntryPoint::BalanceOf,
            vec![CallArg::Address(self.addresses.lending_pool)],
        ))
        .await?
        .into_uint(EntryPoint::BalanceOf)
    }

    pub async fn allowance(&self, token: Address, owner: Address) -> Reading<U256> {
        self.read_one(ReadCall::new(
            token,
            EntryPoint::Allowance,
            vec![
                CallArg::Address(owner),
                CallArg::Address(self.addresses.lending_pool),
            ],
        ))
        .await?
        .into_uint(EntryPoint::Allowance)
    }

    pub async fn user_position(&self, user: Address) -> UserPosition {
        let pool = self.addresses.lending_pool;
        let account_calls = [
            EntryPoint::GetUserDebt,
            EntryPoint::GetHealthFactor,
            EntryPoint::GetMaxBorrow,
        ]
        .map(|entry_point| ReadCall::new(pool, entry_point, vec![CallArg::Address(user)]));

        let (account, collaterals) = futures::join!(
            self.gateway.read_batch(&account_calls),
            self.read_per_asset(
                |token| {
                    ReadCall::new(
                        pool,
                        EntryPoint::GetUserCollateral,
                        vec![CallArg::Address(user), CallArg::Address(token.address)],
                    )
                },
                CallValue::into_uint,
            )
        );

        let mut account = account_calls
            .iter()
            .zip(account)
            .map(|(call, result)| result.and_then(|value| value.into_uint(call.entry_point)));
        let mut next = || {
            account.next().unwrap_or_else(|| {
                Err(CallError::transport(
                    EntryPoint::GetUserDebt,
                    "missing batch result",
                ))
            })
        };

        UserPosition {
            debt: next(),
            health_factor: next(),
            max_borrow: next(),
            collaterals,
        }
    }

    pub async fn protocol_stats(&self) -> ProtocolStats {
        let pool = self.addresses.lending_pool;
        let calls = [
            EntryPoint::TotalBorrowAmount,
            EntryPoint::TotalBorrowShares,
            EntryPoint::BorrowIndex,
            EntryPoint::Reserves,
            EntryPoint::ReserveFactor,
        ]
        .map(|entry_point| ReadCall::new(pool, entry_point, Vec::new()));

        let mut results = self
            .gateway
            .read_batch(&calls)
            .await
            .into_iter()
            .zip(calls.iter())
            .map(|(result, call)| {
                let reading = result.and_then(|value| value.into_uint(call.entry_point));
                if let Err(err) = &reading {
                    warn!(entry_point = %call.entry_point, error = %err, "read unavailable");
                }
                reading
            });
        let mut next = |entry_point: EntryPoint| {
            results
                .next()
                .unwrap_or_else(|| Err(CallError::transport(entry_point, "missing batch result")))
        };

        ProtocolStats {
            total_borrow_amount: next(EntryPoint::TotalBorrowAmount),
            total_borrow_shares: next(EntryPoint::TotalBorrowShares),
            borrow_index: next(EntryPoint::BorrowIndex),
            reserves: next(EntryPoint::Reserves),
            reserve_factor: next(EntryPoint::ReserveFactor),
        }
    }

    /// Liquidation engine's profitability estimate for a prospective call.
    pub async fn liquidation_quote(
        &self,
        borrower: Address,
        collateral_asset: Address,
        debt_to_repay: U256,
    ) -> Reading<LiquidationQuote> {
        self.read_one(ReadCall::new(
            self.addresses.liquidation_engine,
            EntryPoint::IsLiquidationProfitable,
            vec![
                CallArg::Address(borrower),
                CallArg::Address(collateral_asset),
                CallArg::Uint(debt_to_repay),
            ],
        ))
        .await?
        .into_liquidation_quote(EntryPoint::IsLiquidationProfitable)
    }
}

#[cfg(test)]
#[path = "tests/market_tests.rs"]
mod tests;
