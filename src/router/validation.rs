// Pre-trade validation module
// Validates a trade batch and each leg's swap call before any funds move or
// any module is delegated to
//

use crate::errors::RouterError;
use crate::router::routes::TradeRequest;
use crate::venues::{ModuleContract, SwapCall};
use std::collections::BTreeSet;

/// Pre-trade validation result
#[derive(Debug)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn into_result(self) -> Result<(), RouterError> {
        if self.is_valid {
            Ok(())
        } else {
            Err(RouterError::InvalidParameters(self.errors.join("; ")))
        }
    }
}

/// Validate batch-level parameters against the native value attached to the call.
pub fn validate_request(request: &TradeRequest, value: u128) -> ValidationResult {
    let mut result = ValidationResult::new();

    if request.amount_in == 0 {
        result.add_error("input amount must be nonzero".to_string());
    }
    if request.legs.is_empty() {
        result.add_error("batch has no trade legs".to_string());
    }
    if request.recipient.is_zero() {
        result.add_error("recipient cannot be the zero address".to_string());
    }

    // Attached value must match a native input exactly; anything attached to a
    // token-funded batch would stay behind in custody.
    if request.source.is_native() {
        if value != request.amount_in {
            result.add_error(format!(
                "attached value {} does not match native input amount {}",
                value, request.amount_in
            ));
        }
    } else if value != 0 {
        result.add_error(format!(
            "native value {value} attached to a batch funded with {}",
            request.source
        ));
    }

    result
}

/// Validate one leg's swap call against the module's declared contract.
pub fn validate_swap_call(call: &SwapCall, contract: ModuleContract) -> ValidationResult {
    let mut result = ValidationResult::new();

    if call.path.len() < 2 {
        result.add_error(format!("path has {} assets, needs at least 2", call.path.len()));
    }
    if call.path.iter().any(|asset| asset.is_native()) {
        result.add_error("path contains the native sentinel; modules trade wrapped assets only".to_string());
    }
    let mut seen = BTreeSet::new();
    for asset in &call.path {
        if !seen.insert(*asset) {
            result.add_error(format!("path visits {asset} more than once"));
            break;
        }
    }

    if !call.trade_all && call.amount == 0 {
        result.add_error("swap amount must be nonzero".to_string());
    }
    if !call.exact_input && !call.trade_all && call.max_in == 0 {
        result.add_error("exact-output leg requires a nonzero max_in".to_string());
    }
    if call.trade_all && !call.exact_input && !contract.trade_all_ignores_amount {
        result.add_error(
            "trade_all with exact-output is unsupported by this module: the amount parameter would not track the received balance"
                .to_string(),
        );
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::routes::TradeLeg;
    use crate::state::{Address, Asset};

    fn weth() -> Asset {
        Asset::Token(Address::derive("weth"))
    }

    fn dai() -> Asset {
        Asset::Token(Address::derive("dai"))
    }

    fn request(source: Asset, amount_in: u128) -> TradeRequest {
        TradeRequest {
            source,
            destination: dai(),
            amount_in,
            legs: vec![TradeLeg::new(Address::derive("uniswap"), vec![])],
            min_out: 0,
            recipient: Address::derive("user"),
        }
    }

    #[test]
    fn native_value_must_match_amount() {
        assert!(validate_request(&request(Asset::Native, 100), 100).is_valid);
        let mismatch = validate_request(&request(Asset::Native, 100), 99);
        assert!(!mismatch.is_valid);
        assert!(mismatch.errors[0].contains("does not match"));
    }

    #[test]
    fn value_attached_to_token_batch_is_rejected() {
        let result = validate_request(&request(weth(), 100), 1);
        assert!(matches!(result.into_result(), Err(RouterError::InvalidParameters(_))));
    }

    #[test]
    fn empty_batch_and_zero_recipient_collect_all_errors() {
        let mut req = request(weth(), 0);
        req.legs.clear();
        req.recipient = Address::ZERO;
        let result = validate_request(&req, 0);
        assert_eq!(result.errors.len(), 3);
    }

    #[test]
    fn trade_all_exact_output_requires_module_guarantee() {
        let call = SwapCall::exact_output(1, vec![weth(), dai()], 1).with_trade_all();
        let rejected = validate_swap_call(&call, ModuleContract::default());
        assert!(!rejected.is_valid);
        assert!(rejected.errors[0].contains("trade_all"));

        let guaranteed = ModuleContract {
            trade_all_ignores_amount: true,
        };
        assert!(validate_swap_call(&call, guaranteed).is_valid);
    }

    #[test]
    fn trade_all_exact_input_is_accepted_without_amount() {
        let call = SwapCall::exact_input(0, vec![weth(), dai()], 0).with_trade_all();
        assert!(validate_swap_call(&call, ModuleContract::default()).is_valid);
    }

    #[test]
    fn path_shape_is_checked() {
        let native_path = SwapCall::exact_input(1, vec![Asset::Native, dai()], 0);
        assert!(!validate_swap_call(&native_path, ModuleContract::default()).is_valid);

        let circular = SwapCall::exact_input(1, vec![weth(), dai(), weth()], 0);
        assert!(!validate_swap_call(&circular, ModuleContract::default()).is_valid);

        let short = SwapCall::exact_input(1, vec![weth()], 0);
        assert!(!validate_swap_call(&short, ModuleContract::default()).is_valid);
    }
}
