use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Decimal places carried by each on-chain numeric kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    TokenAmount,
    Price,
    HealthFactor,
    Wad,
    Ray,
}

impl Scale {
    pub const fn decimals(self) -> u8 {
        match self {
            Scale::TokenAmount | Scale::HealthFactor | Scale::Wad => 18,
            Scale::Price => 8,
            Scale::Ray => 27,
        }
    }
}

/// Basis points, 10_000 = 100%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Bps(pub u16);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub symbol: String,
    pub name: String,
    pub address: Address,
    /// Oracle reference price, 8 decimals.
    pub reference_price: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolAddresses {
    pub lending_pool: Address,
    pub price_oracle: Address,
    pub liquidation_engine: Address,
    /// The borrowable base asset; repay and liquidate pull it from the caller.
    pub debt_asset: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskParams {
    pub ltv_bps: Bps,
    pub liquidation_threshold_bps: Bps,
    pub liquidation_bonus_bps: Bps,
    pub decimals: u8,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationQuote {
    pub is_profitable: bool,
    pub estimated_profit: U256,
    pub gas_cost: U256,
    pub bonus_value: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Deposit,
    Withdraw,
    Borrow,
    Repay,
    Liquidate,
    RefreshPrices,
    SetMarketStatus,
}

impl EffectKind {
    /// Effects whose on-chain call pulls tokens from the caller via `transferFrom`.
    pub const fn requires_transfer_from(self) -> bool {
        matches!(
            self,
            EffectKind::Deposit | EffectKind::Repay | EffectKind::Liquidate
        )
    }

    pub const fn is_oracle_admin(self) -> bool {
        matches!(self, EffectKind::RefreshPrices | EffectKind::SetMarketStatus)
    }
}
