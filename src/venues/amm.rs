// AMM venue adapter module
// Constant-product (x * y = k) swap module with Uniswap-v2 style exact-input
// and exact-output paths. Pool reserves are ledger balances of the pool
// address, so a reverted batch also reverts pool state.
//

use crate::errors::ModuleError;
use crate::state::{Address, Asset, Ledger};
use crate::venues::adapter::{
    fee_complement, ModuleContext, ModuleContract, PoolBook, SwapCall, SwapModule, BPS,
};
use tracing::debug;

pub struct ConstantProductModule {
    name: String,
    address: Address,
    fee_bps: u32,
    pools: PoolBook,
}

impl ConstantProductModule {
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

    pub fn fee_bps(&self) -> u32 {
        self.fee_bps
    }

    /// Output for `amount_in` against the given reserves, after the fee.
    pub fn amount_out(
        amount_in: u128,
        reserve_in: u128,
        reserve_out: u128,
        fee_bps: u32,
    ) -> Result<u128, ModuleError> {
        if amount_in == 0 {
            return Err(ModuleError::ZeroAmount);
        }
        if reserve_in == 0 || reserve_out == 0 {
            return Err(ModuleError::InsufficientLiquidity);
        }
        let in_with_fee = amount_in
            .checked_mul(fee_complement(fee_bps)?)
            .ok_or(ModuleError::Overflow)?;
        let numerator = in_with_fee
            .checked_mul(reserve_out)
            .ok_or(ModuleError::Overflow)?;
        let denominator = reserve_in
            .checked_mul(BPS)
            .and_then(|r| r.checked_add(in_with_fee))
            .ok_or(ModuleError::Overflow)?;
        Ok(numerator / denominator)
    }

    /// Input required to receive exactly `amount_out`, rounded up.
    pub fn amount_in(
        amount_out: u128,
        reserve_in: u128,
        reserve_out: u128,
        fee_bps: u32,
    ) -> Result<u128, ModuleError> {
        if amount_out == 0 {
            return Err(ModuleError::ZeroAmount);
        }
        if reserve_in == 0 || amount_out >= reserve_out {
            return Err(ModuleError::InsufficientLiquidity);
        }
        let numerator = reserve_in
            .checked_mul(amount_out)
            .and_then(|n| n.checked_mul(BPS))
            .ok_or(ModuleError::Overflow)?;
        let denominator = (reserve_out - amount_out)
            .checked_mul(fee_complement(fee_bps)?)
            .ok_or(ModuleError::Overflow)?;
        Ok(numerator / denominator + 1)
    }

    /// Per-hop amounts for an exact-input swap along `path`.
    pub fn amounts_out(
        &self,
        ledger: &Ledger,
        amount_in: u128,
        path: &[Asset],
    ) -> Result<Vec<u128>, ModuleError> {
        let mut amounts = Vec::with_capacity(path.len());
        amounts.push(amount_in);
        for hop in path.windows(2) {
            let (reserve_in, reserve_out) = self.reserves(ledger, hop[0], hop[1])?;
            let prev = amounts[amounts.len() - 1];
            amounts.push(Self::amount_out(prev, reserve_in, reserve_out, self.fee_bps)?);
        }
        Ok(amounts)
    }

    /// Per-hop amounts for an exact-output swap along `path`.
    pub fn amounts_in(
        &self,
        ledger: &Ledger,
        amount_out: u128,
        path: &[Asset],
    ) -> Result<Vec<u128>, ModuleError> {
        let mut amounts = vec![0u128; path.len()];
        let last = amounts.len() - 1;
        amounts[last] = amount_out;
        for i in (1..path.len()).rev() {
            let (reserve_in, reserve_out) = self.reserves(ledger, path[i - 1], path[i])?;
            amounts[i - 1] = Self::amount_in(amounts[i], reserve_in, reserve_out, self.fee_bps)?;
        }
        Ok(amounts)
    }

    fn reserves(&self, ledger: &Ledger, a: Asset, b: Asset) -> Result<(u128, u128), ModuleError> {
        let pool = self.pools.get(a, b)?;
        Ok((ledger.balance_of(a, pool), ledger.balance_of(b, pool)))
    }

    fn settle_hops(
        &self,
        ctx: &mut ModuleContext<'_>,
        path: &[Asset],
        amounts: &[u128],
    ) -> Result<(), ModuleError> {
        for (i, hop) in path.windows(2).enumerate() {
            let pool = self.pools.get(hop[0], hop[1])?;
            ctx.pay(hop[0], pool, amounts[i])?;
            ctx.collect(hop[1], pool, amounts[i + 1])?;
        }
        Ok(())
    }
}

impl SwapModule for ConstantProductModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn address(&self) -> Address {
        self.address
    }

    fn contract(&self) -> ModuleContract {
        // trade_all only replaces the amount parameter; in exact-output mode
        // that balance becomes the requested output.
        ModuleContract {
            trade_all_ignores_amount: false,
        }
    }

    fn swap(&self, ctx: &mut ModuleContext<'_>, call: &SwapCall) -> Result<u128, ModuleError> {
        if call.path.len() < 2 {
            return Err(ModuleError::MalformedPayload("path needs two assets".to_string()));
        }
        let amount = if call.trade_all {
            ctx.available(call.path[0])
        } else {
            call.amount
        };

        let amounts = if call.exact_input {
            let amounts = self.amounts_out(ctx.ledger(), amount, &call.path)?;
            let out = amounts[amounts.len() - 1];
            if out < call.min_out {
                return Err(ModuleError::SlippageExceeded {
                    minimum: call.min_out,
                    actual: out,
                });
            }
            amounts
        } else {
            let amounts = self.amounts_in(ctx.ledger(), amount, &call.path)?;
            if amounts[0] > call.max_in {
                return Err(ModuleError::ExcessiveInput {
                    maximum: call.max_in,
                    required: amounts[0],
                });
            }
            amounts
        };

        if amounts.iter().skip(1).any(|a| *a == 0) {
            return Err(ModuleError::InsufficientLiquidity);
        }
        self.settle_hops(ctx, &call.path, &amounts)?;

        let out = amounts[amounts.len() - 1];
        debug!(
            module = %self.name,
            amount_in = amounts[0],
            amount_out = out,
            hops = call.path.len() - 1,
            "constant-product swap settled"
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    struct Fixture {
        ledger: Ledger,
        router: Address,
        weth: Asset,
        dai: Asset,
        usdc: Asset,
        module: ConstantProductModule,
    }

    fn fixture() -> Fixture {
        let weth_addr = Address::derive("weth");
        let weth = Asset::Token(weth_addr);
        let dai = Asset::Token(Address::derive("dai"));
        let usdc = Asset::Token(Address::derive("usdc"));
        let weth_dai = Address::derive("pool/weth-dai");
        let dai_usdc = Address::derive("pool/dai-usdc");
        let mut ledger = Ledger::new(weth_addr);
        ledger.mint(weth, weth_dai, 1_000_000).unwrap();
        ledger.mint(dai, weth_dai, 2_000_000_000).unwrap();
        ledger.mint(dai, dai_usdc, 5_000_000).unwrap();
        ledger.mint(usdc, dai_usdc, 5_000_000).unwrap();
        let module = ConstantProductModule::new("uniswap", Address::derive("uniswap"), 30)
            .with_pool(weth, dai, weth_dai)
            .with_pool(dai, usdc, dai_usdc);
        Fixture {
            ledger,
            router: Address::derive("router"),
            weth,
            dai,
            usdc,
            module,
        }
    }

    #[test]
    fn amount_out_applies_fee() {
        // 1000 in against 1:1 reserves of 1_000_000 with 30 bps
        let out = ConstantProductModule::amount_out(1_000, 1_000_000, 1_000_000, 30).unwrap();
        assert_eq!(out, 996);
        assert!(ConstantProductModule::amount_out(0, 1, 1, 30).is_err());
    }

    #[test]
    fn fees_of_the_whole_amount_are_rejected() {
        assert!(matches!(
            ConstantProductModule::amount_out(1_000, 1_000_000, 1_000_000, 20_000),
            Err(ModuleError::InvalidFee { fee_bps: 20_000 })
        ));
        assert!(matches!(
            ConstantProductModule::amount_in(10, 1_000_000, 1_000_000, 10_000),
            Err(ModuleError::InvalidFee { fee_bps: 10_000 })
        ));
    }

    #[test]
    fn amount_in_inverts_amount_out() {
        let needed = ConstantProductModule::amount_in(996, 1_000_000, 1_000_000, 30).unwrap();
        let out = ConstantProductModule::amount_out(needed, 1_000_000, 1_000_000, 30).unwrap();
        assert!(out >= 996);
        assert!(matches!(
            ConstantProductModule::amount_in(1_000_000, 1_000_000, 1_000_000, 30),
            Err(ModuleError::InsufficientLiquidity)
        ));
    }

    #[test]
    fn exact_input_multi_hop_moves_funds_through_custody() {
        let mut f = fixture();
        let baseline = BTreeMap::new();
        f.ledger.mint(f.weth, f.router, 1_000).unwrap();
        let call = SwapCall::exact_input(1_000, vec![f.weth, f.dai, f.usdc], 1);

        let mut ctx = ModuleContext::new(&mut f.ledger, f.router, &baseline);
        let out = f.module.swap(&mut ctx, &call).unwrap();

        assert!(out > 0);
        assert_eq!(f.ledger.balance_of(f.weth, f.router), 0);
        assert_eq!(f.ledger.balance_of(f.dai, f.router), 0);
        assert_eq!(f.ledger.balance_of(f.usdc, f.router), out);
    }

    #[test]
    fn exact_output_respects_max_in() {
        let mut f = fixture();
        let baseline = BTreeMap::new();
        f.ledger.mint(f.weth, f.router, 1_000).unwrap();
        let call = SwapCall::exact_output(1_000_000, vec![f.weth, f.dai], 10);

        let mut ctx = ModuleContext::new(&mut f.ledger, f.router, &baseline);
        let err = f.module.swap(&mut ctx, &call).unwrap_err();
        assert!(matches!(err, ModuleError::ExcessiveInput { maximum: 10, .. }));
    }

    #[test]
    fn trade_all_with_exact_output_under_consumes_input() {
        // The flag combination the router refuses for this module: the
        // received balance is read as the desired output instead of the input.
        let mut f = fixture();
        let baseline = BTreeMap::new();
        f.ledger.mint(f.weth, f.router, 1_000).unwrap();
        let call = SwapCall::exact_output(0, vec![f.weth, f.dai], 1_000).with_trade_all();

        let mut ctx = ModuleContext::new(&mut f.ledger, f.router, &baseline);
        let out = f.module.swap(&mut ctx, &call).unwrap();

        assert_eq!(out, 1_000);
        assert!(f.ledger.balance_of(f.weth, f.router) > 990);
        assert!(!f.module.contract().trade_all_ignores_amount);
    }

    #[test]
    fn missing_pool_is_reported() {
        let mut f = fixture();
        let baseline = BTreeMap::new();
        f.ledger.mint(f.weth, f.router, 1_000).unwrap();
        let call = SwapCall::exact_input(1_000, vec![f.weth, f.usdc], 0);
        let mut ctx = ModuleContext::new(&mut f.ledger, f.router, &baseline);
        assert!(matches!(
            f.module.swap(&mut ctx, &call),
            Err(ModuleError::PoolNotFound(_, _))
        ));
    }
}
