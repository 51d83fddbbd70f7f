mod config;

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{ActionPlan, Effect, MarketStatusSequence};
use config::{load_settings, ProtocolConfig, Settings, SettingsError};
use contract_gateway::CacheEpoch;
use fixed_point::{
    format_bps, format_health_factor, format_price, format_ray, format_token_amount,
    format_wad_percent, parse_decimal, TOKEN_DECIMALS,
};
use shared::{domain::Scale, Address, U256};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Prepares lending-pool payloads without a wallet attached.
#[derive(Parser, Debug)]
#[command(name = "lendctl")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Kind {
    Token,
    Price,
    Health,
    Wad,
    Ray,
    Bps,
}

impl Kind {
    fn scale(self) -> Option<Scale> {
        match self {
            Kind::Token => Some(Scale::TokenAmount),
            Kind::Price => Some(Scale::Price),
            Kind::Health => Some(Scale::HealthFactor),
            Kind::Wad => Some(Scale::Wad),
            Kind::Ray => Some(Scale::Ray),
            Kind::Bps => None,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decimal text to a scaled integer.
    Parse {
        #[arg(allow_hyphen_values = true)]
        amount: String,
        #[arg(long, value_enum, default_value_t = Kind::Token)]
        kind: Kind,
    },
    /// Scaled integer to display text.
    Format {
        raw: String,
        #[arg(long, value_enum, default_value_t = Kind::Token)]
        kind: Kind,
        #[arg(long, default_value_t = 4)]
        digits: usize,
    },
    /// Approve/effect requests for one action, as JSON.
    Plan {
        /// Current allowance of the pool over the transferred token, raw units.
        #[arg(long, default_value = "0")]
        allowance: String,
        #[command(subcommand)]
        action: PlanAction,
    },
    /// The single setPrices call resetting every asset to its reference price.
    RefreshPrices,
    /// One setMarketStatus call per configured asset.
    OpenMarkets {
        #[arg(long)]
        close: bool,
    },
    /// Effective settings after file and environment overrides.
    Config,
}

#[derive(Subcommand, Debug)]
enum PlanAction {
    Deposit { symbol: String, amount: String },
    Withdraw { symbol: String, amount: String },
    Borrow { amount: String },
    Repay { amount: String },
    Liquidate {
        borrower: String,
        symbol: String,
        amount: String,
    },
}

fn token_amount(input: &str) -> Result<U256> {
    parse_decimal(input, TOKEN_DECIMALS).with_context(|| format!("invalid amount {input:?}"))
}

fn raw_integer(input: &str) -> Result<U256> {
    input
        .trim()
        .parse::<U256>()
        .map_err(|err| anyhow!("invalid raw integer {input:?}: {err}"))
}

fn asset(config: &ProtocolConfig, symbol: &str) -> Result<Address> {
    config
        .token(symbol)
        .map(|token| token.address)
        .ok_or_else(|| anyhow!("unknown asset {symbol}"))
}

fn effect_for(action: &PlanAction, config: &ProtocolConfig) -> Result<Effect> {
    Ok(match action {
        PlanAction::Deposit { symbol, amount } => Effect::Deposit {
            asset: asset(config, symbol)?,
            amount: token_amount(amount)?,
        },
        PlanAction::Withdraw { symbol, amount } => Effect::Withdraw {
            asset: asset(config, symbol)?,
            receipt_amount: token_amount(amount)?,
        },
        PlanAction::Borrow { amount } => Effect::Borrow {
            amount: token_amount(amount)?,
        },
        PlanAction::Repay { amount } => Effect::Repay {
            amount: token_amount(amount)?,
        },
        PlanAction::Liquidate {
            borrower,
            symbol,
            amount,
        } => Effect::Liquidate {
            borrower: borrower
                .trim()
                .parse()
                .map_err(|_| anyhow!("invalid borrower address {borrower:?}"))?,
            collateral_asset: asset(config, symbol)?,
            debt_to_repay: token_amount(amount)?,
        },
    })
}

fn resolved(load: impl FnOnce() -> Result<Settings, SettingsError>) -> Result<ProtocolConfig> {
    let settings = load().context("failed to load settings")?;
    let config = settings.resolve().context("invalid settings")?;
    debug!(
        tokens = config.tokens.len(),
        timeout = ?config.confirmation_timeout,
        "settings resolved"
    );
    Ok(config)
}

fn run(command: Command, load: impl FnOnce() -> Result<Settings, SettingsError>) -> Result<String> {
    match command {
        Command::Parse { amount, kind } => {
            let Some(scale) = kind.scale() else {
                bail!("basis points are already integers");
            };
            let value = parse_decimal(&amount, scale.decimals())
                .with_context(|| format!("invalid {kind:?} amount"))?;
            Ok(value.to_string())
        }
        Command::Format { raw, kind, digits } => Ok(match kind {
            Kind::Bps => format_bps(
                raw.trim()
                    .parse::<u16>()
                    .with_context(|| format!("invalid basis points {raw:?}"))?,
            ),
            Kind::Token => format_token_amount(raw_integer(&raw)?, digits),
            Kind::Price => format_price(raw_integer(&raw)?),
            Kind::Health => format_health_factor(raw_integer(&raw)?),
            Kind::Wad => format_wad_percent(raw_integer(&raw)?),
            Kind::Ray => format_ray(raw_integer(&raw)?),
        }),
        Command::Plan { allowance, action } => {
            let config = resolved(load)?;
            let effect = effect_for(&action, &config)?;
            let plan = ActionPlan::build(&effect, &config.addresses, raw_integer(&allowance)?);
            info!(effect = ?plan.kind, steps = plan.steps().count(), "prepared action plan");
            Ok(serde_json::to_string_pretty(&plan)?)
        }
        Command::RefreshPrices => {
            let config = resolved(load)?;
            let plan = ActionPlan::build(
                &Effect::refresh_prices(&config.tokens),
                &config.addresses,
                U256::ZERO,
            );
            Ok(serde_json::to_string_pretty(&plan)?)
        }
        Command::OpenMarkets { close } => {
            let config = resolved(load)?;
            let assets = config.tokens.iter().map(|token| token.address).collect();
            let sequence = MarketStatusSequence::new(
                config.addresses,
                assets,
                !close,
                Arc::new(CacheEpoch::new()),
            );
            Ok(serde_json::to_string_pretty(&sequence.plans())?)
        }
        Command::Config => {
            let settings = load().context("failed to load settings")?;
            settings.resolve().context("invalid settings")?;
            Ok(serde_json::to_string_pretty(&settings)?)
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let output = run(cli.command, load_settings)?;
    println!("{output}");
    Ok(())
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
