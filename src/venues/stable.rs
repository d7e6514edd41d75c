// Stable pool venue adapter
// Constant-sum swap module for pegged pairs: output equals input less the fee,
// capped by the pool's reserve. With trade_all set it always trades the full
// received balance as input, whatever the mode flag says.
//

use crate::errors::ModuleError;
use crate::state::{Address, Asset};
use crate::venues::adapter::{
    fee_complement, ModuleContext, ModuleContract, PoolBook, SwapCall, SwapModule, BPS,
};
use tracing::debug;

pub struct StablePoolModule {
    name: String,
    address: Address,
    fee_bps: u32,
    pools: PoolBook,
}

impl StablePoolModule {
    pub fn new(name: impl Into<String>, address: Address, fee_bps: u32) -> Self {
        Self {
            name: name.into(),
            address,
            fee_bps,
            pools: PoolBook::default(),
        }
    }

    pub fn with_pool(mut self, a: Asset, b: Asset, pool: Address) -> Self {
        self.pools.insert(a, b, pool);
        self
    }

    pub fn quote_out(&self, amount_in: u128) -> Result<u128, ModuleError> {
        let gross = amount_in
            .checked_mul(fee_complement(self.fee_bps)?)
            .ok_or(ModuleError::Overflow)?;
        Ok(gross / BPS)
    }

    pub fn quote_in(&self, amount_out: u128) -> Result<u128, ModuleError> {
        let scaled = amount_out.checked_mul(BPS).ok_or(ModuleError::Overflow)?;
        Ok(scaled.div_ceil(fee_complement(self.fee_bps)?))
    }

    fn hop(
        &self,
        ctx: &mut ModuleContext<'_>,
        from: Asset,
        to: Asset,
        amount_in: u128,
    ) -> Result<u128, ModuleError> {
        let pool = self.pools.get(from, to)?;
        let out = self.quote_out(amount_in)?;
        if out == 0 {
            return Err(ModuleError::ZeroAmount);
        }
        if out > ctx.balance_of(to, pool) {
            return Err(ModuleError::InsufficientLiquidity);
        }
        ctx.pay(from, pool, amount_in)?;
        ctx.collect(to, pool, out)?;
        Ok(out)
    }
}

impl SwapModule for StablePoolModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn address(&self) -> Address {
        self.address
    }

    fn contract(&self) -> ModuleContract {
        ModuleContract {
            trade_all_ignores_amount: true,
        }
    }

    fn swap(&self, ctx: &mut ModuleContext<'_>, call: &SwapCall) -> Result<u128, ModuleError> {
        if call.path.len() < 2 {
            return Err(ModuleError::MalformedPayload("path needs two assets".to_string()));
        }

        let amount_in = if call.trade_all {
            ctx.available(call.path[0])
        } else if call.exact_input {
            call.amount
        } else {
            // Constant-sum hops compose, so the input for the final output can
            // be computed backwards hop by hop.
            let mut needed = call.amount;
            for _ in 1..call.path.len() {
                needed = self.quote_in(needed)?;
            }
            if needed > call.max_in {
                return Err(ModuleError::ExcessiveInput {
                    maximum: call.max_in,
                    required: needed,
                });
            }
            needed
        };
        if amount_in == 0 {
            return Err(ModuleError::ZeroAmount);
        }

        let mut amount = amount_in;
        for hop in call.path.windows(2) {
            amount = self.hop(ctx, hop[0], hop[1], amount)?;
        }
        if (call.exact_input || call.trade_all) && amount < call.min_out {
            return Err(ModuleError::SlippageExceeded {
                minimum: call.min_out,
                actual: amount,
            });
        }

        debug!(
            module = %self.name,
            amount_in = amount_in,
            amount_out = amount,
            "stable swap settled"
        );
        Ok(amount)
    }
}
