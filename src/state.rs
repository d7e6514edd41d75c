// Ledger state substrate
//
// In-memory balances, allowances and the wrapped-native token that the router
// and swap modules operate on. Every externally observable call runs inside
// `Ledger::atomic`, which restores the pre-call snapshot on failure.

use crate::errors::LedgerError;
use blake2::{Blake2b512, Digest};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 20-byte account or contract identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

/// Address standing in for the native network currency.
pub const NATIVE_SENTINEL: Address = Address([0xee; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Deterministic address for a label (deployments, fixtures).
    pub fn derive(label: &str) -> Self {
        let mut hasher = Blake2b512::new();
        hasher.update(b"trade-router/address");
        hasher.update(label.as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&hash[..20]);
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let raw = hex::decode(trimmed).map_err(|e| LedgerError::InvalidAddress(format!("{s}: {e}")))?;
        let bytes: [u8; 20] = raw
            .try_into()
            .map_err(|_| LedgerError::InvalidAddress(format!("{s}: expected 20 bytes")))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Fungible asset handle: the native currency or a token contract.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Asset {
    Native,
    Token(Address),
}

impl Asset {
    /// Maps the native sentinel address to `Asset::Native`.
    pub fn from_address(address: Address) -> Self {
        if address == NATIVE_SENTINEL {
            Asset::Native
        } else {
            Asset::Token(address)
        }
    }

    pub fn address(&self) -> Address {
        match self {
            Asset::Native => NATIVE_SENTINEL,
            Asset::Token(address) => *address,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Asset::Native)
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native => write!(f, "native"),
            Asset::Token(address) => write!(f, "{address}"),
        }
    }
}

impl fmt::Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Asset {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("native") {
            return Ok(Asset::Native);
        }
        Ok(Asset::from_address(s.parse()?))
    }
}

impl Serialize for Asset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.address().to_string())
    }
}

impl<'de> Deserialize<'de> for Asset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Balances and allowances for every asset and holder.
#[derive(Debug, Clone)]
pub struct Ledger {
    balances: BTreeMap<(Asset, Address), u128>,
    allowances: BTreeMap<(Address, Address, Address), u128>,
    wrapped_native: Address,
}

impl Ledger {
    pub fn new(wrapped_native: Address) -> Self {
        Self {
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
            wrapped_native,
        }
    }

    /// Token contract holding native currency one-for-one.
    pub fn wrapped_native(&self) -> Address {
        self.wrapped_native
    }

    pub fn wrapped_asset(&self) -> Asset {
        Asset::Token(self.wrapped_native)
    }

    /// Maps native to its wrapped token; tokens map to themselves.
    pub fn tokenized(&self, asset: Asset) -> Asset {
        match asset {
            Asset::Native => self.wrapped_asset(),
            token => token,
        }
    }

    pub fn balance_of(&self, asset: Asset, holder: Address) -> u128 {
        self.balances.get(&(asset, holder)).copied().unwrap_or(0)
    }

    /// Nonzero balances held by `holder`, keyed by asset.
    pub fn holdings(&self, holder: Address) -> BTreeMap<Asset, u128> {
        self.balances
            .iter()
            .filter(|((_, who), amount)| *who == holder && **amount > 0)
            .map(|((asset, _), amount)| (*asset, *amount))
            .collect()
    }

    pub fn allowance(&self, token: Address, owner: Address, spender: Address) -> u128 {
        self.allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or(0)
    }

    /// Credit new supply. Minting the wrapped token also locks the backing
    /// native currency in the wrapper contract.
    pub fn mint(&mut self, asset: Asset, to: Address, amount: u128) -> Result<(), LedgerError> {
        if asset == self.wrapped_asset() {
            self.credit(Asset::Native, self.wrapped_native, amount)?;
        }
        self.credit(asset, to, amount)
    }

    pub fn transfer(
        &mut self,
        asset: Asset,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        if amount == 0 || from == to {
            return self.ensure_balance(asset, from, amount);
        }
        self.debit(asset, from, amount)?;
        self.credit(asset, to, amount)
    }

    pub fn approve(&mut self, token: Address, owner: Address, spender: Address, amount: u128) {
        if amount == 0 {
            self.allowances.remove(&(token, owner, spender));
        } else {
            self.allowances.insert((token, owner, spender), amount);
        }
    }

    /// Move `amount` of `token` from `from` to `to`, spending `spender`'s allowance.
    pub fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        let allowed = self.allowance(token, from, spender);
        if spender != from && allowed < amount {
            return Err(LedgerError::InsufficientAllowance {
                token,
                owner: from,
                spender,
                needed: amount,
                allowed,
            });
        }
        self.transfer(Asset::Token(token), from, to, amount)?;
        if spender != from {
            self.approve(token, from, spender, allowed - amount);
        }
        Ok(())
    }

    /// Convert `holder`'s native currency into the wrapped token.
    pub fn wrap(&mut self, holder: Address, amount: u128) -> Result<(), LedgerError> {
        self.transfer(Asset::Native, holder, self.wrapped_native, amount)?;
        self.credit(self.wrapped_asset(), holder, amount)
    }

    /// Burn `holder`'s wrapped token and release the native currency.
    pub fn unwrap(&mut self, holder: Address, amount: u128) -> Result<(), LedgerError> {
        self.debit(self.wrapped_asset(), holder, amount)?;
        self.transfer(Asset::Native, self.wrapped_native, holder, amount)
    }

    /// Run `f` against the ledger, restoring the prior state if it fails.
    pub fn atomic<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Ledger) -> Result<T, E>,
    {
        let snapshot = self.clone();
        let result = f(self);
        if result.is_err() {
            *self = snapshot;
        }
        result
    }

    fn ensure_balance(&self, asset: Asset, holder: Address, amount: u128) -> Result<(), LedgerError> {
        let available = self.balance_of(asset, holder);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                asset,
                holder,
                needed: amount,
                available,
            });
        }
        Ok(())
    }

    fn debit(&mut self, asset: Asset, holder: Address, amount: u128) -> Result<(), LedgerError> {
        self.ensure_balance(asset, holder, amount)?;
        let entry = self.balances.entry((asset, holder)).or_insert(0);
        *entry -= amount;
        if *entry == 0 {
            self.balances.remove(&(asset, holder));
        }
        Ok(())
    }

    fn credit(&mut self, asset: Asset, holder: Address, amount: u128) -> Result<(), LedgerError> {
        if amount == 0 {
            return Ok(());
        }
        let entry = self.balances.entry((asset, holder)).or_insert(0);
        *entry = entry
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { asset })?;
        Ok(())
    }
}
