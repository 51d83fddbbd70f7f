use std::{sync::Arc, time::Duration};

use contract_gateway::{ContractGateway, ReadCache};
use serde::{Deserialize, Serialize};
use shared::{
    domain::{EffectKind, ProtocolAddresses, TokenInfo},
    error::TxFailure,
    protocol::{CallArg, EntryPoint, Receipt, TransactionRequest},
    Address, U256,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::transaction::{
    ControllerError, TransactionController, TransactionError, TransactionEvent, TransactionState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPrice {
    pub asset: Address,
    /// 8 decimals.
    pub price: U256,
}

/// A user-initiated protocol action with its arguments already scaled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    Deposit {
        asset: Address,
        amount: U256,
    },
    Withdraw {
        asset: Address,
        receipt_amount: U256,
    },
    Borrow {
        amount: U256,
    },
    Repay {
        amount: U256,
    },
    Liquidate {
        borrower: Address,
        collateral_asset: Address,
        debt_to_repay: U256,
    },
    RefreshPrices {
        prices: Vec<AssetPrice>,
    },
    SetMarketStatus {
        asset: Address,
        open: bool,
    },
}

impl Effect {
    /// Every configured asset at its reference price, in one call.
    pub fn refresh_prices(tokens: &[TokenInfo]) -> Self {
        Effect::RefreshPrices {
            prices: tokens
                .iter()
                .map(|token| AssetPrice {
                    asset: token.address,
                    price: token.reference_price,
                })
                .collect(),
        }
    }

    pub fn kind(&self) -> EffectKind {
        match self {
            Effect::Deposit { .. } => EffectKind::Deposit,
            Effect::Withdraw { .. } => EffectKind::Withdraw,
            Effect::Borrow { .. } => EffectKind::Borrow,
            Effect::Repay { .. } => EffectKind::Repay,
            Effect::Liquidate { .. } => EffectKind::Liquidate,
            Effect::RefreshPrices { .. } => EffectKind::RefreshPrices,
            Effect::SetMarketStatus { .. } => EffectKind::SetMarketStatus,
        }
    }

    /// Token and amount the pool pulls from the caller, if any.
    pub fn transfer(&self, addresses: &ProtocolAddresses) -> Option<(Address, U256)> {
        match self {
            Effect::Deposit { asset, amount } => Some((*asset, *amount)),
            Effect::Repay { amount } => Some((addresses.debt_asset, *amount)),
            Effect::Liquidate { debt_to_repay, .. } => Some((addresses.debt_asset, *debt_to_repay)),
            _ => None,
        }
    }

    pub fn request(&self, addresses: &ProtocolAddresses) -> TransactionRequest {
        let pool = addresses.lending_pool;
        let oracle = addresses.price_oracle;
        match self {
            Effect::Deposit { asset, amount } => TransactionRequest::new(
                pool,
                EntryPoint::Deposit,
                vec![CallArg::Address(*asset), CallArg::Uint(*amount)],
            ),
            Effect::Withdraw {
                asset,
                receipt_amount,
            } => TransactionRequest::new(
                pool,
                EntryPoint::Withdraw,
                vec![CallArg::Address(*asset), CallArg::Uint(*receipt_amount)],
            ),
            Effect::Borrow { amount } => {
                TransactionRequest::new(pool, EntryPoint::Borrow, vec![CallArg::Uint(*amount)])
            }
            Effect::Repay { amount } => {
                TransactionRequest::new(pool, EntryPoint::Repay, vec![CallArg::Uint(*amount)])
            }
            Effect::Liquidate {
                borrower,
                collateral_asset,
                debt_to_repay,
            } => TransactionRequest::new(
                pool,
                EntryPoint::Liquidate,
                vec![
                    CallArg::Address(*borrower),
                    CallArg::Address(*collateral_asset),
                    CallArg::Uint(*debt_to_repay),
                ],
            ),
            Effect::RefreshPrices { prices } => {
                let (assets, values): (Vec<Address>, Vec<U256>) =
                    prices.iter().map(|p| (p.asset, p.price)).unzip();
                TransactionRequest::new(
                    oracle,
                    EntryPoint::SetPrices,
                    vec![CallArg::AddressList(assets), CallArg::UintList(values)],
                )
            }
            Effect::SetMarketStatus { asset, open } => TransactionRequest::new(
                oracle,
                EntryPoint::SetMarketStatus,
                vec![CallArg::Address(*asset), CallArg::Bool(*open)],
            ),
        }
    }
}

/// `true` when the effect pulls tokens and the current allowance does not
/// cover a non-zero amount.
pub fn needs_approval(kind: EffectKind, amount: U256, allowance: U256) -> bool {
    kind.requires_transfer_from() && !amount.is_zero() && allowance < amount
}

/// At most two writes: an optional `approve` and exactly one effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionPlan {
    pub kind: EffectKind,
    pub approve: Option<TransactionRequest>,
    pub effect: TransactionRequest,
}

impl ActionPlan {
    /// `allowance` is the current on-chain allowance of the pool over the
    /// transferred token. It is ignored for effects that move no tokens.
    pub fn build(effect: &Effect, addresses: &ProtocolAddresses, allowance: U256) -> Self {
        let kind = effect.kind();
        let approve = effect
            .transfer(addresses)
            .filter(|(_, amount)| needs_approval(kind, *amount, allowance))
            .map(|(token, amount)| {
                TransactionRequest::new(
                    token,
                    EntryPoint::Approve,
                    vec![
                        CallArg::Address(addresses.lending_pool),
                        CallArg::Uint(amount),
                    ],
                )
            });
        Self {
            kind,
            approve,
            effect: effect.request(addresses),
        }
    }

    pub fn steps(&self) -> impl Iterator<Item = &TransactionRequest> {
        self.approve.iter().chain(std::iter::once(&self.effect))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStep {
    Approve,
    Effect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionStatus<'a> {
    pub step: ActionStep,
    pub state: &'a TransactionState,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    #[error("approval must be confirmed before submitting {0:?}")]
    ApprovalPending(EffectKind),
    #[error("{0:?} needs no approval step")]
    NoApprovalStep(EffectKind),
    #[error("{0:?} action already finished")]
    AlreadyFinished(EffectKind),
    #[error(transparent)]
    Controller(#[from] ControllerError),
    #[error("{step:?} step failed: {failure}")]
    Failed {
        step: ActionStep,
        failure: TxFailure,
    },
}

/// Runs an `ActionPlan`: the approve controller (when present) must reach
/// `Confirmed` before the effect controller accepts a submission.
pub struct ActionCoordinator {
    plan: ActionPlan,
    approve: Option<TransactionController>,
    effect: TransactionController,
}

impl ActionCoordinator {
    pub fn new(plan: ActionPlan, cache: Arc<dyn ReadCache>) -> Self {
        let approve = plan
            .approve
            .as_ref()
            .map(|_| TransactionController::new(format!("approve:{:?}", plan.kind), cache.clone()));
        let effect = TransactionController::new(format!("{:?}", plan.kind), cache);
        Self {
            plan,
            approve,
            effect,
        }
    }

    pub fn plan(&self) -> &ActionPlan {
        &self.plan
    }

    pub fn needs_approval(&self) -> bool {
        self.approve.is_some()
    }

    fn approval_settled(&self) -> bool {
        self.approve
            .as_ref()
            .map_or(true, |controller| controller.state().is_confirmed())
    }

    pub fn can_submit_effect(&self) -> bool {
        self.approval_settled() && self.effect.state().is_idle()
    }

    /// The step the UI should offer next; `None` once nothing is submittable.
    pub fn next_step(&self) -> Option<ActionStep> {
        match &self.approve {
            Some(approve) if approve.state().is_idle() => Some(ActionStep::Approve),
            _ if self.can_submit_effect() => Some(ActionStep::Effect),
            _ => None,
        }
    }

    /// The state of the step actually in flight. Approval takes precedence until
    /// the effect has left `Idle`, which it cannot do before approval confirms.
    pub fn status(&self) -> ActionStatus<'_> {
        if !self.effect.state().is_idle() {
            return ActionStatus {
                step: ActionStep::Effect,
                state: self.effect.state(),
            };
        }
        match &self.approve {
            Some(approve) if !approve.state().is_idle() => ActionStatus {
                step: ActionStep::Approve,
                state: approve.state(),
            },
            _ => ActionStatus {
                step: self.next_step().unwrap_or(ActionStep::Effect),
                state: self.effect.state(),
            },
        }
    }

    /// Either controller non-idle and not finished; the UI disables the trigger.
    pub fn is_busy(&self) -> bool {
        self.effect.state().is_in_flight()
            || self
                .approve
                .as_ref()
                .is_some_and(|approve| approve.state().is_in_flight())
    }

    pub fn is_finished(&self) -> bool {
        self.effect.state().is_terminal()
            || self
                .approve
                .as_ref()
                .is_some_and(|approve| matches!(approve.state(), TransactionState::Failed(_)))
    }

    /// Moves `step` to `Submitting` and returns the request to hand to the wallet.
    pub fn submit(&mut self, step: ActionStep) -> Result<TransactionRequest, CoordinatorError> {
        match step {
            ActionStep::Approve => {
                let request = self
                    .plan
                    .approve
                    .clone()
                    .ok_or(CoordinatorError::NoApprovalStep(self.plan.kind))?;
                let controller = self
                    .approve
                    .as_mut()
                    .ok_or(CoordinatorError::NoApprovalStep(self.plan.kind))?;
                controller.submit(request.clone())?;
                Ok(request)
            }
            ActionStep::Effect => {
                if !self.approval_settled() {
                    return Err(CoordinatorError::ApprovalPending(self.plan.kind));
                }
                let request = self.plan.effect.clone();
                self.effect.submit(request.clone())?;
                Ok(request)
            }
        }
    }

    pub fn apply(
        &mut self,
        step: ActionStep,
        event: TransactionEvent,
    ) -> Result<&TransactionState, CoordinatorError> {
        let controller = match step {
            ActionStep::Approve => self
                .approve
                .as_mut()
                .ok_or(CoordinatorError::NoApprovalStep(self.plan.kind))?,
            ActionStep::Effect => &mut self.effect,
        };
        Ok(controller.apply(event)?)
    }

    /// Runs the remaining steps in order against `gateway`.
    pub async fn execute(
        &mut self,
        gateway: &dyn ContractGateway,
        timeout: Option<Duration>,
    ) -> Result<Receipt, CoordinatorError> {
        let kind = self.plan.kind;
        if self.is_finished() {
            return Err(CoordinatorError::AlreadyFinished(kind));
        }
        if let (Some(controller), Some(request)) = (self.approve.as_mut(), self.plan.approve.clone())
        {
            if !controller.state().is_confirmed() {
                debug!(effect = ?kind, "running approval step");
                controller
                    .execute(gateway, request, timeout)
                    .await
                    .map_err(|err| step_error(ActionStep::Approve, err))?;
            }
        }

        let receipt = self
            .effect
            .execute(gateway, self.plan.effect.clone(), timeout)
            .await
            .map_err(|err| step_error(ActionStep::Effect, err))?;
        info!(effect = ?kind, block = receipt.block_number, "action confirmed");
        Ok(receipt)
    }
}

fn step_error(step: ActionStep, err: TransactionError) -> CoordinatorError {
    match err {
        TransactionError::Controller(err) => CoordinatorError::Controller(err),
        TransactionError::Failed(failure) => CoordinatorError::Failed { step, failure },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("market status change stopped at {asset} after {completed} confirmed: {source}")]
pub struct SequenceError {
    pub asset: Address,
    pub completed: usize,
    #[source]
    pub source: CoordinatorError,
}

/// Sets the market status of every listed asset. `setMarketStatus` takes one
/// asset per call, so each asset gets a fresh coordinator that must confirm
/// before the next one is submitted. The chain covers all assets and halts
/// only on a failure.
pub struct MarketStatusSequence {
    addresses: ProtocolAddresses,
    assets: Vec<Address>,
    open: bool,
    cache: Arc<dyn ReadCache>,
    confirmed: Vec<(Address, Receipt)>,
}

impl MarketStatusSequence {
    pub fn new(
        addresses: ProtocolAddresses,
        assets: Vec<Address>,
        open: bool,
        cache: Arc<dyn ReadCache>,
    ) -> Self {
        Self {
            addresses,
            assets,
            open,
            cache,
            confirmed: Vec::new(),
        }
    }

    pub fn plans(&self) -> Vec<ActionPlan> {
        self.assets
            .iter()
            .map(|asset| {
                let effect = Effect::SetMarketStatus {
                    asset: *asset,
                    open: self.open,
                };
                ActionPlan::build(&effect, &self.addresses, U256::ZERO)
            })
            .collect()
    }

    pub fn confirmed(&self) -> &[(Address, Receipt)] {
        &self.confirmed
    }

    /// Continues after the last confirmed asset, so a halted sequence can be
    /// resumed with a new call.
    pub async fn execute(
        &mut self,
        gateway: &dyn ContractGateway,
        timeout: Option<Duration>,
    ) -> Result<Vec<Receipt>, SequenceError> {
        let plans = self.plans();
        for (asset, plan) in self.assets.clone().into_iter().zip(plans).skip(self.confirmed.len()) {
            let mut coordinator = ActionCoordinator::new(plan, self.cache.clone());
            match coordinator.execute(gateway, timeout).await {
                Ok(receipt) => {
                    info!(%asset, open = self.open, "market status updated");
                    self.confirmed.push((asset, receipt));
                }
                Err(source) => {
                    return Err(SequenceError {
                        asset,
                        completed: self.confirmed.len(),
                        source,
                    });
                }
            }
        }
        Ok(self.confirmed.iter().map(|(_, receipt)| *receipt).collect())
    }
}

#[cfg(test)]
#[path = "tests/action_tests.rs"]
mod tests;
