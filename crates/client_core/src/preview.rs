//! Display-only projections. Nothing here feeds a transaction amount.

use serde::Serialize;
use shared::{domain::EffectKind, U256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtChange {
    Borrow,
    Repay,
}

/// Debt after the pending action; repaying more than is owed bottoms out at zero.
pub fn projected_debt(current: U256, amount: U256, change: DebtChange) -> U256 {
    match change {
        DebtChange::Borrow => current.saturating_add(amount),
        DebtChange::Repay => current.saturating_sub(amount),
    }
}

/// 50% close factor.
pub fn max_liquidatable(debt: U256) -> U256 {
    debt / U256::from(2u8)
}

/// Balances behind the "max" shortcut of each action form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AmountLimits {
    pub wallet_balance: U256,
    pub collateral: U256,
    pub max_borrow: U256,
    pub debt: U256,
}

impl AmountLimits {
    /// `None` for oracle administration, which moves no user amount.
    pub fn max_for(&self, kind: EffectKind) -> Option<U256> {
        if kind.is_oracle_admin() {
            return None;
        }
        match kind {
            EffectKind::Deposit => Some(self.wallet_balance),
            EffectKind::Withdraw => Some(self.collateral),
            EffectKind::Borrow => Some(self.max_borrow),
            EffectKind::Repay => Some(self.debt),
            EffectKind::Liquidate => Some(max_liquidatable(self.debt)),
            EffectKind::RefreshPrices | EffectKind::SetMarketStatus => None,
        }
    }
}

#[cfg(test)]
#[path = "tests/preview_tests.rs"]
mod tests;
