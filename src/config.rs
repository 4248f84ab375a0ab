use crate::signing::Credentials;
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::fs;

pub const KNOWN_EXCHANGES: [&str; 5] = ["binance", "okx", "bigone", "coinex", "lbank"];

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_BOOK_DEPTH: u32 = 20;

pub fn default_base_url(exchange: &str) -> Option<&'static str> {
    match exchange {
        "binance" => Some("https://api.binance.com"),
        "okx" => Some("https://www.okx.com"),
        "bigone" => Some("https://big.one"),
        "coinex" => Some("https://api.coinex.com"),
        "lbank" => Some("https://api.lbkex.com"),
        _ => None,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExchangeConfig {
    pub name: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub passphrase: Option<String>,
    pub timeout_secs: u64,
    pub book_depth: u32,
}

impl ExchangeConfig {
    pub fn defaults_for(name: &str) -> Result<Self> {
        let base_url = default_base_url(name)
            .ok_or_else(|| Error::Config(format!("unknown exchange {name:?}")))?;
        Ok(Self {
            name: name.to_string(),
            base_url: base_url.to_string(),
            api_key: None,
            api_secret: None,
            passphrase: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            book_depth: DEFAULT_BOOK_DEPTH,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_credentials(
        mut self,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        self.api_key = Some(api_key.into());
        self.api_secret = Some(api_secret.into());
        self
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            api_key: self.api_key.clone().unwrap_or_default(),
            api_secret: self.api_secret.clone().unwrap_or_default(),
            passphrase: self.passphrase.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if default_base_url(&self.name).is_none() {
            return Err(Error::Config(format!("unknown exchange {:?}", self.name)));
        }
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(Error::Config(format!("{}.base_url must be set", self.name)));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "{}.base_url must start with http:// or https://",
                self.name
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config(format!(
                "{}.timeout_secs must be positive",
                self.name
            )));
        }
        if !(1..=1000).contains(&self.book_depth) {
            return Err(Error::Config(format!(
                "{}.book_depth must be in [1, 1000]",
                self.name
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub exchanges: BTreeMap<String, ExchangeConfig>,
}

#[derive(Clone, Debug, Deserialize)]
struct ExchangeConfigFile {
    base_url: Option<String>,
    api_key: Option<String>,
    api_secret: Option<String>,
    passphrase: Option<String>,
    timeout_secs: Option<u64>,
    book_depth: Option<u32>,
}

#[derive(Clone, Debug, Deserialize)]
struct ConfigFile {
    exchanges: Option<BTreeMap<String, ExchangeConfigFile>>,
}

impl Default for Config {
    fn default() -> Self {
        let exchanges = KNOWN_EXCHANGES
            .iter()
            .filter_map(|name| {
                ExchangeConfig::defaults_for(name)
                    .ok()
                    .map(|config| (name.to_string(), config))
            })
            .collect();
        Self { exchanges }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|err| Error::Config(format!("failed to read config: {err}")))?;
        let mut config = Self::parse(&content)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)
            .map_err(|err| Error::Config(format!("failed to parse config: {err}")))?;
        Config::from_file(file)
    }

    fn from_file(file: ConfigFile) -> Result<Self> {
        let mut config = Config::default();

        for (name, section) in file.exchanges.unwrap_or_default() {
            let name = name.to_lowercase();
            let mut exchange = match config.exchanges.remove(&name) {
                Some(existing) => existing,
                None => ExchangeConfig::defaults_for(&name)?,
            };
            if let Some(value) = section.base_url {
                exchange.base_url = value;
            }
            if let Some(value) = section.api_key {
                exchange.api_key = Some(value);
            }
            if let Some(value) = section.api_secret {
                exchange.api_secret = Some(value);
            }
            if let Some(value) = section.passphrase {
                exchange.passphrase = Some(value);
            }
            if let Some(value) = section.timeout_secs {
                exchange.timeout_secs = value;
            }
            if let Some(value) = section.book_depth {
                exchange.book_depth = value;
            }
            config.exchanges.insert(name, exchange);
        }

        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        for (name, exchange) in self.exchanges.iter_mut() {
            let prefix = format!("TRADEBRIDGE_{}", name.to_uppercase());
            if let Some(value) = read_string_env(&format!("{prefix}_BASE_URL"))? {
                exchange.base_url = value;
            }
            if let Some(value) = read_string_env(&format!("{prefix}_API_KEY"))? {
                exchange.api_key = Some(value);
            }
            if let Some(value) = read_string_env(&format!("{prefix}_API_SECRET"))? {
                exchange.api_secret = Some(value);
            }
            if let Some(value) = read_string_env(&format!("{prefix}_PASSPHRASE"))? {
                exchange.passphrase = Some(value);
            }
            if let Some(value) = read_u64_env(&format!("{prefix}_TIMEOUT_SECS"))? {
                exchange.timeout_secs = value;
            }
            if let Some(value) = read_u32_env(&format!("{prefix}_BOOK_DEPTH"))? {
                exchange.book_depth = value;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for exchange in self.exchanges.values() {
            exchange.validate()?;
        }
        Ok(())
    }

    pub fn exchange(&self, name: &str) -> Result<&ExchangeConfig> {
        self.exchanges
            .get(&name.to_lowercase())
            .ok_or_else(|| Error::Config(format!("exchange {name:?} is not configured")))
    }
}

fn read_string_env(key: &str) -> Result<Option<String>> {
    match env::var(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(Error::Config(format!("failed to read {key}: {err}"))),
    }
}

fn read_u32_env(key: &str) -> Result<Option<u32>> {
    match read_string_env(key)? {
        Some(value) => value
            .parse::<u32>()
            .map(Some)
            .map_err(|err| Error::Config(format!("{key} must be u32: {err}"))),
        None => Ok(None),
    }
}

fn read_u64_env(key: &str) -> Result<Option<u64>> {
    match read_string_env(key)? {
        Some(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|err| Error::Config(format!("{key} must be u64: {err}"))),
        None => Ok(None),
    }
}
