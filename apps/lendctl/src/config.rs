use std::{fs, io, path::Path, time::Duration};

use fixed_point::{parse_decimal, CodecError, PRICE_DECIMALS};
use serde::{Deserialize, Serialize};
use shared::{
    domain::{ProtocolAddresses, TokenInfo},
    Address,
};
use thiserror::Error;

pub const SETTINGS_FILE: &str = "lendctl.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSetting {
    pub symbol: String,
    pub name: String,
    pub address: String,
    /// Whole-unit decimal string, e.g. `"250.5"`.
    pub reference_price: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub lending_pool: String,
    pub price_oracle: String,
    pub liquidation_engine: String,
    /// Symbol of the borrowable asset; must be listed in `tokens`.
    pub debt_asset: String,
    pub tokens: Vec<TokenSetting>,
    pub confirmation_timeout_secs: Option<u64>,
}

fn token(symbol: &str, name: &str, address: &str, reference_price: &str) -> TokenSetting {
    TokenSetting {
        symbol: symbol.into(),
        name: name.into(),
        address: address.into(),
        reference_price: reference_price.into(),
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            lending_pool: "0x8E5F63D90B459f71a94FD86901A17a81a8F1e4AE".into(),
            price_oracle: "0x6954b1F86A2c1615F8dc41969Cef57D558969e2c".into(),
            liquidation_engine: "0x79129F69544ca67920eAc0a269817C1E79cfE7C1".into(),
            debt_asset: "WETH".into(),
            tokens: vec![
                token("TSLA", "Tesla", "0xC9f9c86933092BbbfFF3CCb4b105A4A94bf3Bd4E", "250"),
                token("AMZN", "Amazon", "0x5884aD2f920c162CFBbACc88C9C51AA75eC09E02", "185"),
                token("PLTR", "Palantir", "0x1FBE1a0e43594b3455993B5dE5Fd0A7A266298d0", "25"),
                token("NFLX", "Netflix", "0x3b8262A63d25f0477c4DDE23F83cfe22Cb768C93", "650"),
                token("AMD", "AMD", "0x71178BAc73cBeb415514eB542a8995b82669778d", "160"),
                token("WETH", "Wrapped Ether", "0x7943e237c7F95DA44E0301572D358911207852Fa", "3000"),
            ],
            confirmation_timeout_secs: None,
        }
    }
}

/// Keys a settings file may set; anything absent keeps its default.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    lending_pool: Option<String>,
    price_oracle: Option<String>,
    liquidation_engine: Option<String>,
    debt_asset: Option<String>,
    tokens: Option<Vec<TokenSetting>>,
    confirmation_timeout_secs: Option<u64>,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("{field} is not a valid address: {value:?}")]
    InvalidAddress { field: String, value: String },
    #[error("reference price for {symbol} is invalid: {source}")]
    InvalidPrice {
        symbol: String,
        #[source]
        source: CodecError,
    },
    #[error("debt asset {0} is not in the token list")]
    UnknownDebtAsset(String),
    #[error("{0} must be a whole number of seconds")]
    InvalidTimeout(String),
}

/// Validated, typed view of `Settings`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    pub addresses: ProtocolAddresses,
    pub tokens: Vec<TokenInfo>,
    pub confirmation_timeout: Option<Duration>,
}

impl ProtocolConfig {
    pub fn token(&self, symbol: &str) -> Option<&TokenInfo> {
        self.tokens
            .iter()
            .find(|token| token.symbol.eq_ignore_ascii_case(symbol))
    }
}

pub fn load_settings() -> Result<Settings, SettingsError> {
    let mut settings = Settings::default();
    apply_file(&mut settings, Path::new(SETTINGS_FILE))?;
    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

/// Missing file is not an error; a present but malformed one is.
pub fn apply_file(settings: &mut Settings, path: &Path) -> Result<(), SettingsError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.display().to_string(),
                source,
            })
        }
    };
    let file_cfg: FileSettings = toml::from_str(&raw).map_err(|source| SettingsError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    if let Some(v) = file_cfg.lending_pool {
        settings.lending_pool = v;
    }
    if let Some(v) = file_cfg.price_oracle {
        settings.price_oracle = v;
    }
    if let Some(v) = file_cfg.liquidation_engine {
        settings.liquidation_engine = v;
    }
    if let Some(v) = file_cfg.debt_asset {
        settings.debt_asset = v;
    }
    if let Some(v) = file_cfg.tokens {
        settings.tokens = v;
    }
    if let Some(v) = file_cfg.confirmation_timeout_secs {
        settings.confirmation_timeout_secs = Some(v);
    }
    Ok(())
}

/// Plain names first, then `APP__` names, so the prefixed form wins.
pub fn apply_env(
    settings: &mut Settings,
    var: impl Fn(&str) -> Option<String>,
) -> Result<(), SettingsError> {
    for key in ["LENDING_POOL", "APP__LENDING_POOL"] {
        if let Some(v) = var(key) {
            settings.lending_pool = v;
        }
    }
    for key in ["PRICE_ORACLE", "APP__PRICE_ORACLE"] {
        if let Some(v) = var(key) {
            settings.price_oracle = v;
        }
    }
    for key in ["LIQUIDATION_ENGINE", "APP__LIQUIDATION_ENGINE"] {
        if let Some(v) = var(key) {
            settings.liquidation_engine = v;
        }
    }
    for key in ["DEBT_ASSET", "APP__DEBT_ASSET"] {
        if let Some(v) = var(key) {
            settings.debt_asset = v;
        }
    }
    if let Some(v) = var("APP__CONFIRMATION_TIMEOUT_SECS") {
        let secs = v
            .trim()
            .parse::<u64>()
            .map_err(|_| SettingsError::InvalidTimeout("APP__CONFIRMATION_TIMEOUT_SECS".into()))?;
        settings.confirmation_timeout_secs = Some(secs);
    }
    Ok(())
}

fn parse_address(field: &str, value: &str) -> Result<Address, SettingsError> {
    value
        .trim()
        .parse::<Address>()
        .map_err(|_| SettingsError::InvalidAddress {
            field: field.to_string(),
            value: value.to_string(),
        })
}

impl Settings {
    pub fn resolve(&self) -> Result<ProtocolConfig, SettingsError> {
        let tokens = self
            .tokens
            .iter()
            .map(|token| {
                Ok(TokenInfo {
                    symbol: token.symbol.clone(),
                    name: token.name.clone(),
                    address: parse_address(&format!("tokens.{}", token.symbol), &token.address)?,
                    reference_price: parse_decimal(&token.reference_price, PRICE_DECIMALS)
                        .map_err(|source| SettingsError::InvalidPrice {
                            symbol: token.symbol.clone(),
                            source,
                        })?,
                })
            })
            .collect::<Result<Vec<_>, SettingsError>>()?;

        let debt_asset = tokens
            .iter()
            .find(|token| token.symbol.eq_ignore_ascii_case(&self.debt_asset))
            .map(|token| token.address)
            .ok_or_else(|| SettingsError::UnknownDebtAsset(self.debt_asset.clone()))?;

        Ok(ProtocolConfig {
            addresses: ProtocolAddresses {
                lending_pool: parse_address("lending_pool", &self.lending_pool)?,
                price_oracle: parse_address("price_oracle", &self.price_oracle)?,
                liquidation_engine: parse_address("liquidation_engine", &self.liquidation_engine)?,
                debt_asset,
            },
            tokens,
            confirmation_timeout: self.confirmation_timeout_secs.map(Duration::from_secs),
        })
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
