// Configuration management module
// Service settings come from the environment; the initial ledger and module
// deployment come from a YAML genesis file
//

use crate::signing::{address_from_public_key, public_key_from_hex};
use crate::state::{Address, Asset};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const BUILTIN_GENESIS: &str = include_str!("../config/genesis.yaml");

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Socket address for the HTTP API, defaults to 0.0.0.0:8080
    pub listen_addr: Option<String>,
    /// Hex-encoded 32-byte Ed25519 public key of the administrator
    pub admin_pubkey_hex: String,
    /// Genesis YAML; the bundled demo deployment is used when unset
    pub genesis_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;
        Ok(cfg.try_deserialize()?)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let raw = self.listen_addr.as_deref().unwrap_or(DEFAULT_LISTEN_ADDR);
        raw.parse()
            .with_context(|| format!("invalid listen address: {raw}"))
    }

    pub fn admin_address(&self) -> Result<Address> {
        let key = public_key_from_hex(&self.admin_pubkey_hex)
            .context("parse APP__ADMIN_PUBKEY_HEX")?;
        Ok(address_from_public_key(&key.to_bytes()))
    }

    pub fn genesis(&self) -> Result<Genesis> {
        match &self.genesis_path {
            Some(path) => Genesis::load(path),
            None => Genesis::from_yaml(BUILTIN_GENESIS).context("parse bundled genesis"),
        }
    }
}

/// Initial deployment: ledger balances, pools and swap modules.
#[derive(Debug, Clone, Deserialize)]
pub struct Genesis {
    pub wrapped_native: Address,
    pub router: Address,
    pub registry: Address,
    #[serde(default)]
    pub balances: Vec<BalanceSpec>,
    #[serde(default)]
    pub modules: Vec<ModuleSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BalanceSpec {
    pub asset: Asset,
    pub holder: Address,
    pub amount: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    ConstantProduct,
    Stable,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModuleSpec {
    pub kind: ModuleKind,
    pub name: String,
    pub address: Address,
    pub fee_bps: u32,
    #[serde(default)]
    pub pools: Vec<PoolSpec>,
    /// Deployed modules are only authorized when this is set
    #[serde(default = "default_register")]
    pub register: bool,
}

fn default_register() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolSpec {
    pub a: Asset,
    pub b: Asset,
    pub address: Address,
    pub reserve_a: u128,
    pub reserve_b: u128,
}

impl Genesis {
    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).context("decode genesis yaml")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read genesis file {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("genesis file {}", path.display()))
    }

    /// The bundled demo deployment.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_GENESIS)
    }
}
