//! Balances already sitting in router custody belong to nobody's batch: a
//! caller can only trade what the same call deposited, and only the
//! administrator can move stranded funds out.

mod common;

use common::*;
use trade_router::errors::{ModuleError, RouterError};
use trade_router::router::{TradeLeg, TradeRequest};
use trade_router::state::Asset;
use trade_router::venues::{ConstantProductModule, SwapCall};

const STRANDED: u128 = 1_000_000;

fn strand_weth(f: &mut Fixture) {
    let router = f.deployment.router.address();
    let ledger = &mut f.deployment.ledger;
    ledger.wrap(f.trader, STRANDED).unwrap();
    ledger.transfer(f.weth, f.trader, router, STRANDED).unwrap();
}

fn sweep_request(f: &Fixture, call: SwapCall, deposit: u128) -> TradeRequest {
    TradeRequest {
        source: Asset::Native,
        destination: f.dai,
        amount_in: deposit,
        legs: vec![TradeLeg::swap(addr(UNISWAP), &call).unwrap()],
        min_out: 0,
        recipient: f.attacker,
    }
}

#[test]
fn trade_all_only_sees_the_callers_deposit() {
    let mut f = fixture();
    strand_weth(&mut f);
    let router = f.deployment.router.clone();
    let pool = addr(WETH_DAI_POOL);
    let reserve_in = f.deployment.ledger.balance_of(f.weth, pool);
    let reserve_out = f.deployment.ledger.balance_of(f.dai, pool);
    let dai_before = f.deployment.ledger.balance_of(f.dai, f.attacker);

    let call = SwapCall::exact_input(0, vec![f.weth, f.dai], 0).with_trade_all();
    let request = sweep_request(&f, call, 1_000);
    let receipt = router
        .execute_trades(&mut f.deployment.ledger, f.attacker, 1_000, &request)
        .unwrap();

    let fair = ConstantProductModule::amount_out(1_000, reserve_in, reserve_out, 30).unwrap();
    assert_eq!(receipt.amount_out, fair);
    assert_eq!(
        f.deployment.ledger.balance_of(f.dai, f.attacker),
        dai_before + fair
    );
    assert_eq!(
        f.deployment.ledger.balance_of(f.weth, router.address()),
        STRANDED
    );
}

#[test]
fn explicit_amount_beyond_deposit_is_refused() {
    let mut f = fixture();
    strand_weth(&mut f);
    let router = f.deployment.router.clone();

    let call = SwapCall::exact_input(STRANDED, vec![f.weth, f.dai], 0);
    let request = sweep_request(&f, call, 1);
    let err = router
        .execute_trades(&mut f.deployment.ledger, f.attacker, 1, &request)
        .unwrap_err();

    assert!(
        matches!(
            err,
            RouterError::Module {
                source: ModuleError::InsufficientCustody { available: 1, .. },
                ..
            }
        ),
        "{err}"
    );
    assert_eq!(
        f.deployment.ledger.balance_of(f.weth, router.address()),
        STRANDED
    );
    assert_eq!(
        f.deployment.ledger.balance_of(Asset::Native, f.attacker),
        1_000_000_000
    );
}

#[test]
fn only_admin_can_rescue_stranded_funds() {
    let mut f = fixture();
    strand_weth(&mut f);
    let router = f.deployment.router.clone();

    let err = router
        .rescue_funds(
            &mut f.deployment.ledger,
            f.attacker,
            f.weth,
            STRANDED,
            f.attacker,
        )
        .unwrap_err();
    assert!(matches!(err, RouterError::Unauthorized { caller } if caller == f.attacker));

    router
        .rescue_funds(
            &mut f.deployment.ledger,
            f.admin,
            f.weth,
            STRANDED,
            f.trader,
        )
        .unwrap();
    assert_eq!(f.deployment.ledger.balance_of(f.weth, f.trader), STRANDED);
    assert!(f.deployment.ledger.holdings(router.address()).is_empty());
}

#[test]
fn value_attached_to_token_batch_is_refused() {
    let mut f = fixture();
    let router = f.deployment.router.clone();
    f.deployment
        .ledger
        .approve(f.dai.address(), f.attacker, router.address(), 10_000);
    let call = SwapCall::exact_input(10_000, vec![f.dai, f.weth], 0);
    let request = TradeRequest {
        source: f.dai,
        destination: f.weth,
        amount_in: 10_000,
        legs: vec![TradeLeg::swap(addr(UNISWAP), &call).unwrap()],
        min_out: 0,
        recipient: f.attacker,
    };

    let err = router
        .execute_trades(&mut f.deployment.ledger, f.attacker, 5, &request)
        .unwrap_err();
    assert!(matches!(err, RouterError::InvalidParameters(_)));
    assert!(f.deployment.ledger.holdings(router.address()).is_empty());
}
