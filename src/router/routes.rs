// Trade batch types
// This file defines trade legs, trade requests, and the receipts returned
// by a settled batch
//

use crate::errors::ModuleError;
use crate::state::{Address, Asset};
use crate::venues::SwapCall;
use serde::{Deserialize, Serialize};

/// One delegated swap instruction: a module and its opaque payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeLeg {
    pub module: Address,
    #[serde(with = "hex_payload")]
    pub payload: Vec<u8>,
}

impl TradeLeg {
    pub fn new(module: Address, payload: Vec<u8>) -> Self {
        Self { module, payload }
    }

    /// Leg carrying an encoded common swap call.
    pub fn swap(module: Address, call: &SwapCall) -> Result<Self, ModuleError> {
        Ok(Self::new(module, call.encode()?))
    }
}

/// Ordered batch of legs executed as one all-or-nothing unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRequest {
    pub source: Asset,
    pub destination: Asset,
    pub amount_in: u128,
    pub legs: Vec<TradeLeg>,
    pub min_out: u128,
    pub recipient: Address,
}

/// What a single leg did, as observed by the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegOutcome {
    pub module: Address,
    pub input: Asset,
    pub output: Asset,
    /// Output amount the module returned.
    pub reported: u128,
    /// Output amount measured from the router's own balance change.
    pub observed: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeReceipt {
    /// Net destination amount disbursed to the recipient.
    pub amount_out: u128,
    /// Destination output summed over legs, including any a later leg spent again.
    pub produced: u128,
    pub legs: Vec<LegOutcome>,
}

mod hex_payload {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
    }
}
