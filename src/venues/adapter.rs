// Venue adapter module
// This file defines the capability contract every swap module implements,
// the common swap call carried in a trade leg's payload, and the context a
// module uses to move funds on the router's behalf
//

use crate::errors::ModuleError;
use crate::state::{Address, Asset, Ledger};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Basis-point denominator for module fees.
pub const BPS: u128 = 10_000;

/// Share of an amount left after a fee of `fee_bps`, in basis points.
/// A fee of the whole amount or more is rejected.
pub fn fee_complement(fee_bps: u32) -> Result<u128, ModuleError> {
    BPS.checked_sub(u128::from(fee_bps))
        .filter(|net| *net > 0)
        .ok_or(ModuleError::InvalidFee { fee_bps })
}

/// Common swap capability call: `swap(amount, path, min_out, max_in, exact_input, trade_all)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapCall {
    /// Input amount (exact-input) or desired output amount (exact-output).
    pub amount: u128,
    /// Assets traversed by this leg, input first.
    pub path: Vec<Asset>,
    /// Minimum acceptable output for this leg.
    pub min_out: u128,
    /// Maximum input the leg may consume in exact-output mode.
    pub max_in: u128,
    /// `true` = exact-input swap, `false` = exact-output swap.
    pub exact_input: bool,
    /// Trade the whole custody balance of the input asset available to this call.
    pub trade_all: bool,
}

impl SwapCall {
    pub fn exact_input(amount: u128, path: Vec<Asset>, min_out: u128) -> Self {
        Self {
            amount,
            path,
            min_out,
            max_in: 0,
            exact_input: true,
            trade_all: false,
        }
    }

    pub fn exact_output(amount_out: u128, path: Vec<Asset>, max_in: u128) -> Self {
        Self {
            amount: amount_out,
            path,
            min_out: 0,
            max_in,
            exact_input: false,
            trade_all: false,
        }
    }

    pub fn with_trade_all(mut self) -> Self {
        self.trade_all = true;
        self
    }

    pub fn input_asset(&self) -> Option<Asset> {
        self.path.first().copied()
    }

    pub fn output_asset(&self) -> Option<Asset> {
        self.path.last().copied()
    }

    pub fn encode(&self) -> Result<Vec<u8>, ModuleError> {
        bcs::to_bytes(self).map_err(|e| ModuleError::MalformedPayload(e.to_string()))
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ModuleError> {
        bcs::from_bytes(payload).map_err(|e| ModuleError::MalformedPayload(e.to_string()))
    }
}

/// Guarantees a module makes about its own flag handling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModuleContract {
    /// With `trade_all` set, the amount parameter is ignored in both modes and
    /// the full received balance is consumed as input.
    pub trade_all_ignores_amount: bool,
}

/// Swap module capability. Implementations are composed by reference
/// (`Arc<dyn SwapModule>`) and registered with the module registry.
pub trait SwapModule: Send + Sync {
    fn name(&self) -> &str;

    fn address(&self) -> Address;

    fn contract(&self) -> ModuleContract;

    /// Decode the opaque leg payload into the common swap call.
    fn decode(&self, payload: &[u8]) -> Result<SwapCall, ModuleError> {
        SwapCall::decode(payload)
    }

    /// Execute one leg. Funds move through `ctx` as the router; the return
    /// value is the output amount the module claims to have produced.
    fn swap(&self, ctx: &mut ModuleContext<'_>, call: &SwapCall) -> Result<u128, ModuleError>;
}

/// Execution context for a delegated leg. Movements are attributed to the
/// custodian (the router), and spending is limited to what the current call
/// brought into custody.
pub struct ModuleContext<'a> {
    ledger: &'a mut Ledger,
    custodian: Address,
    baseline: &'a BTreeMap<Asset, u128>,
}

impl<'a> ModuleContext<'a> {
    pub fn new(
        ledger: &'a mut Ledger,
        custodian: Address,
        baseline: &'a BTreeMap<Asset, u128>,
    ) -> Self {
        Self {
            ledger,
            custodian,
            baseline,
        }
    }

    pub fn custodian(&self) -> Address {
        self.custodian
    }

    /// Custody balance of `asset` attributable to the current call.
    pub fn available(&self, asset: Asset) -> u128 {
        let held = self.ledger.balance_of(asset, self.custodian);
        let before = self.baseline.get(&asset).copied().unwrap_or(0);
        held.saturating_sub(before)
    }

    /// Balance of any holder, e.g. a pool's reserves.
    pub fn balance_of(&self, asset: Asset, holder: Address) -> u128 {
        self.ledger.balance_of(asset, holder)
    }

    /// Pay `amount` of `asset` out of custody.
    pub fn pay(&mut self, asset: Asset, to: Address, amount: u128) -> Result<(), ModuleError> {
        let available = self.available(asset);
        if amount > available {
            return Err(ModuleError::InsufficientCustody {
                asset,
                needed: amount,
                available,
            });
        }
        self.ledger.transfer(asset, self.custodian, to, amount)?;
        Ok(())
    }

    /// Venue payout from `from` into custody.
    pub fn collect(&mut self, asset: Asset, from: Address, amount: u128) -> Result<(), ModuleError> {
        self.ledger.transfer(asset, from, self.custodian, amount)?;
        Ok(())
    }

    pub fn ledger(&self) -> &Ledger {
        self.ledger
    }

    /// Raw ledger access for nested calls into other contracts.
    pub fn ledger_mut(&mut self) -> &mut Ledger {
        self.ledger
    }
}

/// Pool addresses keyed by unordered asset pair.
#[derive(Debug, Clone, Default)]
pub struct PoolBook {
    pools: BTreeMap<(Asset, Asset), Address>,
}

impl PoolBook {
    pub fn insert(&mut self, a: Asset, b: Asset, pool: Address) {
        self.pools.insert(Self::key(a, b), pool);
    }

    pub fn get(&self, a: Asset, b: Asset) -> Result<Address, ModuleError> {
        self.pools
            .get(&Self::key(a, b))
            .copied()
            .ok_or(ModuleError::PoolNotFound(a, b))
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    fn key(a: Asset, b: Asset) -> (Asset, Asset) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}
