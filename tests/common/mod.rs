#![allow(dead_code)]

use trade_router::bootstrap::Deployment;
use trade_router::config::Genesis;
use trade_router::state::{Address, Asset};

pub const UNISWAP: &str = "0x2000000000000000000000000000000000000001";
pub const CURVE: &str = "0x2000000000000000000000000000000000000002";
pub const SUSHISWAP: &str = "0x2000000000000000000000000000000000000003";
pub const DAI: &str = "0x6b175474e89094c44da98b954eedeac495271d0f";
pub const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
pub const WETH_DAI_POOL: &str = "0x3000000000000000000000000000000000000001";

pub struct Fixture {
    pub deployment: Deployment,
    pub admin: Address,
    pub trader: Address,
    pub attacker: Address,
    pub weth: Asset,
    pub dai: Asset,
    pub usdc: Asset,
}

pub fn addr(s: &str) -> Address {
    s.parse().unwrap()
}

pub fn asset(s: &str) -> Asset {
    s.parse().unwrap()
}

/// Bundled deployment plus funded trader and attacker accounts.
pub fn fixture() -> Fixture {
    let genesis = Genesis::builtin().unwrap();
    let admin = Address::derive("admin");
    let mut deployment = Deployment::from_genesis(&genesis, admin).unwrap();
    let trader = Address::derive("trader");
    let attacker = Address::derive("attacker");
    let usdc = asset(USDC);
    let dai = asset(DAI);
    for who in [trader, attacker] {
        deployment.ledger.mint(Asset::Native, who, 1_000_000_000).unwrap();
        deployment.ledger.mint(usdc, who, 1_000_000_000).unwrap();
        deployment.ledger.mint(dai, who, 1_000_000_000).unwrap();
    }
    Fixture {
        deployment,
        admin,
        trader,
        attacker,
        weth: Asset::Token(genesis.wrapped_native),
        dai,
        usdc,
    }
}
