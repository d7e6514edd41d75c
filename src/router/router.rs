// Router core
// Orchestrates a batch of trade legs: custody intake, delegated execution,
// aggregation, minimum-output enforcement, disbursement, and the closing
// check that custody is exactly as the call found it
//

use crate::control::{self, AdminSlot, SingleFlight};
use crate::errors::RouterError;
use crate::metrics::{RESIDUAL_VIOLATIONS, TRADES, TRADE_LATENCY};
use crate::router::execution::{execute_leg, prepare_leg, ExecutionCounters, ExecutionStats};
use crate::router::registry::ModuleRegistry;
use crate::router::routes::{TradeReceipt, TradeRequest};
use crate::router::validation::validate_request;
use crate::state::{Address, Asset, Ledger};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{error, info, warn};

pub struct Router {
    address: Address,
    admin: RwLock<AdminSlot>,
    registry: RwLock<Option<Arc<ModuleRegistry>>>,
    flight: SingleFlight,
    counters: ExecutionCounters,
}

impl Router {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            admin: RwLock::new(AdminSlot::default()),
            registry: RwLock::new(None),
            flight: SingleFlight::default(),
            counters: ExecutionCounters::default(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// One-time initialization binding the administrator.
    pub fn post_upgrade(&self, admin: Address) -> Result<(), RouterError> {
        control::write(&self.admin).initialize(admin)?;
        info!(router = %self.address, admin = %admin, "router initialized");
        Ok(())
    }

    pub fn admin(&self) -> Option<Address> {
        control::read(&self.admin).admin()
    }

    /// Bind the module registry. The registry must already be bound to this router.
    pub fn set_module_registry(
        &self,
        caller: Address,
        registry: Arc<ModuleRegistry>,
    ) -> Result<(), RouterError> {
        control::read(&self.admin).ensure(caller)?;
        if registry.admin() != self.admin() {
            return Err(RouterError::InvalidParameters(format!(
                "registry {} is administered by a different identity",
                registry.address()
            )));
        }
        if registry.router() != Some(self.address) {
            return Err(RouterError::InvalidParameters(format!(
                "registry {} is not bound to router {}",
                registry.address(),
                self.address
            )));
        }
        info!(router = %self.address, registry = %registry.address(), "module registry bound");
        *control::write(&self.registry) = Some(registry);
        Ok(())
    }

    pub fn module_registry(&self) -> Option<Arc<ModuleRegistry>> {
        control::read(&self.registry).clone()
    }

    pub fn stats(&self) -> ExecutionStats {
        self.counters.snapshot()
    }

    /// Execute a batch of trade legs atomically on behalf of `caller`.
    ///
    /// `value` is the native currency attached to the call; it moves into
    /// custody before anything else and is reverted with everything else on
    /// failure.
    #[tracing::instrument(
        skip_all,
        fields(
            caller = %caller,
            source = %request.source,
            destination = %request.destination,
            amount_in = request.amount_in,
            legs = request.legs.len()
        )
    )]
    pub fn execute_trades(
        &self,
        ledger: &mut Ledger,
        caller: Address,
        value: u128,
        request: &TradeRequest,
    ) -> Result<TradeReceipt, RouterError> {
        let _flight = self.flight.enter()?;
        let started = Instant::now();

        let result = ledger.atomic(|ledger| self.settle(ledger, caller, value, request));

        let elapsed = started.elapsed();
        self.counters.record(result.is_ok(), elapsed);
        TRADE_LATENCY.observe(elapsed.as_secs_f64());
        match &result {
            Ok(receipt) => {
                TRADES.with_label_values(&["settled"]).inc();
                info!(
                    amount_out = receipt.amount_out,
                    recipient = %request.recipient,
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    "batch settled"
                );
            }
            Err(err) => {
                TRADES.with_label_values(&[err.kind()]).inc();
                warn!(error = %err, kind = err.kind(), "batch reverted");
            }
        }
        result
    }

    fn settle(
        &self,
        ledger: &mut Ledger,
        caller: Address,
        value: u128,
        request: &TradeRequest,
    ) -> Result<TradeReceipt, RouterError> {
        let registry = self
            .module_registry()
            .ok_or(RouterError::NotInitialized("module registry"))?;

        validate_request(request, value).into_result()?;
        if let Some(leg) = request
            .legs
            .iter()
            .find(|leg| !registry.is_authorized(leg.module))
        {
            return Err(RouterError::UnauthorizedModule(leg.module));
        }
        // Every leg is decoded and checked before the first one is delegated.
        let prepared = request
            .legs
            .iter()
            .enumerate()
            .map(|(index, leg)| prepare_leg(&registry, index, leg))
            .collect::<Result<Vec<_>, _>>()?;

        // Whatever custody held before this call is not the caller's to trade.
        let baseline = ledger.holdings(self.address);

        ledger.transfer(Asset::Native, caller, self.address, value)?;
        match request.source {
            Asset::Native => ledger.wrap(self.address, request.amount_in)?,
            Asset::Token(token) => {
                ledger.transfer_from(token, self.address, caller, self.address, request.amount_in)?
            }
        }
        let destination = ledger.tokenized(request.destination);

        let mut legs = Vec::with_capacity(prepared.len());
        let mut produced: u128 = 0;
        for leg in &prepared {
            let outcome = execute_leg(ledger, self.address, &baseline, leg)?;
            if outcome.output == destination {
                produced = produced
                    .checked_add(outcome.observed)
                    .ok_or(RouterError::Overflow)?;
            }
            legs.push(outcome);
        }

        // Later legs may re-spend destination output, so the batch yields the
        // net destination custody gained over the call.
        let held_before = baseline.get(&destination).copied().unwrap_or(0);
        let amount_out = ledger
            .balance_of(destination, self.address)
            .saturating_sub(held_before);

        if amount_out < request.min_out {
            return Err(RouterError::InsufficientOutput {
                minimum: request.min_out,
                actual: amount_out,
            });
        }

        if request.destination.is_native() {
            ledger.unwrap(self.address, amount_out)?;
        }
        ledger.transfer(request.destination, self.address, request.recipient, amount_out)?;

        self.ensure_custody_restored(ledger, &baseline)?;
        Ok(TradeReceipt {
            amount_out,
            produced,
            legs,
        })
    }

    /// Every asset in custody must be back at its pre-call balance.
    fn ensure_custody_restored(
        &self,
        ledger: &Ledger,
        baseline: &BTreeMap<Asset, u128>,
    ) -> Result<(), RouterError> {
        let after = ledger.holdings(self.address);
        for asset in baseline.keys().chain(after.keys()) {
            let expected = baseline.get(asset).copied().unwrap_or(0);
            let actual = after.get(asset).copied().unwrap_or(0);
            if expected != actual {
                RESIDUAL_VIOLATIONS.inc();
                error!(
                    router = %self.address,
                    asset = %asset,
                    expected = expected,
                    actual = actual,
                    "custody balance changed across batch"
                );
                return Err(RouterError::ResidualBalance {
                    asset: *asset,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Move a balance stranded in custody to `recipient`. Administrator only.
    pub fn rescue_funds(
        &self,
        ledger: &mut Ledger,
        caller: Address,
        asset: Asset,
        amount: u128,
        recipient: Address,
    ) -> Result<(), RouterError> {
        let _flight = self.flight.enter()?;
        control::read(&self.admin).ensure(caller)?;
        if recipient.is_zero() || amount == 0 {
            return Err(RouterError::InvalidParameters(
                "rescue needs a nonzero amount and recipient".to_string(),
            ));
        }
        ledger.atomic(|ledger| ledger.transfer(asset, self.address, recipient, amount))?;
        info!(
            asset = %asset,
            amount = amount,
            recipient = %recipient,
            "stranded custody balance rescued"
        );
        Ok(())
    }
}
