// Error types and error handling module
// This file defines the error taxonomy for the ledger substrate, swap modules,
// the router itself, and request authentication
//

use crate::state::{Address, Asset};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("insufficient balance of {asset} for {holder}: need {needed}, have {available}")]
    InsufficientBalance {
        asset: Asset,
        holder: Address,
        needed: u128,
        available: u128,
    },
    #[error("insufficient allowance on {token}: {spender} may spend {allowed} of {owner}, needs {needed}")]
    InsufficientAllowance {
        token: Address,
        owner: Address,
        spender: Address,
        needed: u128,
        allowed: u128,
    },
    #[error("balance overflow for {asset}")]
    Overflow { asset: Asset },
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("no pool for {0} -> {1}")]
    PoolNotFound(Asset, Asset),
    #[error("insufficient liquidity")]
    InsufficientLiquidity,
    #[error("swap amount must be nonzero")]
    ZeroAmount,
    #[error("output {actual} below minimum {minimum}")]
    SlippageExceeded { minimum: u128, actual: u128 },
    #[error("required input {required} exceeds maximum {maximum}")]
    ExcessiveInput { maximum: u128, required: u128 },
    #[error("custody holds {available} of {asset} for this call, {needed} requested")]
    InsufficientCustody {
        asset: Asset,
        needed: u128,
        available: u128,
    },
    #[error("arithmetic overflow in swap math")]
    Overflow,
    #[error("fee of {fee_bps} bps leaves nothing to trade")]
    InvalidFee { fee_bps: u32 },
    #[error("rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("caller {caller} is not the administrator")]
    Unauthorized { caller: Address },
    #[error("module {0} is not authorized by the registry")]
    UnauthorizedModule(Address),
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("output {actual} below minimum {minimum}")]
    InsufficientOutput { minimum: u128, actual: u128 },
    #[error("residual custody balance of {asset}: expected {expected}, found {actual}")]
    ResidualBalance {
        asset: Asset,
        expected: u128,
        actual: u128,
    },
    #[error("arithmetic overflow aggregating amounts")]
    Overflow,
    #[error("reentrant call rejected while a batch is in flight")]
    Reentrancy,
    #[error("already initialized")]
    AlreadyInitialized,
    #[error("not initialized: {0}")]
    NotInitialized(&'static str),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("module {module} failed: {source}")]
    Module {
        module: Address,
        #[source]
        source: ModuleError,
    },
}

impl RouterError {
    /// Stable label used for metrics and API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            RouterError::Unauthorized { .. } => "unauthorized",
            RouterError::UnauthorizedModule(_) => "unauthorized_module",
            RouterError::InvalidParameters(_) => "invalid_parameters",
            RouterError::InsufficientOutput { .. } => "insufficient_output",
            RouterError::ResidualBalance { .. } => "residual_balance",
            RouterError::Overflow => "overflow",
            RouterError::Reentrancy => "reentrancy",
            RouterError::AlreadyInitialized => "already_initialized",
            RouterError::NotInitialized(_) => "not_initialized",
            RouterError::Ledger(_) => "ledger",
            RouterError::Module { .. } => "module",
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing header: {0}")]
    MissingHeader(&'static str),
    #[error("bad key: {0}")]
    BadKey(String),
    #[error("bad signature encoding: {0}")]
    BadSignature(String),
    #[error("signature verification failed")]
    VerificationFailed,
    #[error("bad request stamp: {0}")]
    BadStamp(String),
    #[error("signature expired at {expires_at}, now {now}")]
    Expired { expires_at: u64, now: u64 },
    #[error("nonce {nonce} already used; last accepted nonce is {last}")]
    Replayed { nonce: u64, last: u64 },
}
