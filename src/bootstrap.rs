// Deployment bootstrap
// Builds the ledger, swap modules, router and registry from a genesis
// description and wires router and registry to each other
//

use crate::config::{Genesis, ModuleKind, ModuleSpec};
use crate::errors::RouterError;
use crate::router::{ModuleRegistry, Router};
use crate::state::{Address, Ledger};
use crate::venues::{fee_complement, ConstantProductModule, StablePoolModule, SwapModule};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Everything a running service operates on.
pub struct Deployment {
    pub ledger: Ledger,
    pub router: Arc<Router>,
    pub registry: Arc<ModuleRegistry>,
    /// Modules that exist on the ledger, authorized or not.
    deployed: BTreeMap<Address, Arc<dyn SwapModule>>,
}

impl Deployment {
    pub fn from_genesis(genesis: &Genesis, admin: Address) -> Result<Self, RouterError> {
        let mut ledger = Ledger::new(genesis.wrapped_native);
        for entry in &genesis.balances {
            ledger.mint(entry.asset, entry.holder, entry.amount)?;
        }

        let mut deployed: BTreeMap<Address, Arc<dyn SwapModule>> = BTreeMap::new();
        let mut authorize = Vec::new();
        for spec in &genesis.modules {
            let module = deploy_module(&mut ledger, spec)?;
            if spec.register {
                authorize.push(module.clone());
            }
            deployed.insert(spec.address, module);
        }

        let router = Arc::new(Router::new(genesis.router));
        let registry = Arc::new(ModuleRegistry::new(genesis.registry));
        router.post_upgrade(admin)?;
        registry.post_upgrade(admin)?;
        registry.set_router(admin, router.address())?;
        router.set_module_registry(admin, registry.clone())?;
        for module in authorize {
            registry.register_swap_module(admin, module)?;
        }

        info!(
            router = %router.address(),
            registry = %registry.address(),
            admin = %admin,
            deployed = deployed.len(),
            authorized = registry.authorized_modules().len(),
            "deployment ready"
        );

        Ok(Self {
            ledger,
            router,
            registry,
            deployed,
        })
    }

    pub fn deployed_module(&self, address: Address) -> Option<Arc<dyn SwapModule>> {
        self.deployed.get(&address).cloned()
    }
}

fn deploy_module(
    ledger: &mut Ledger,
    spec: &ModuleSpec,
) -> Result<Arc<dyn SwapModule>, RouterError> {
    fee_complement(spec.fee_bps).map_err(|e| {
        RouterError::InvalidParameters(format!("module {}: {e}", spec.name))
    })?;
    for pool in &spec.pools {
        if pool.a.is_native() || pool.b.is_native() {
            return Err(RouterError::InvalidParameters(format!(
                "pool {} of module {} holds the native sentinel; pools trade wrapped assets",
                pool.address, spec.name
            )));
        }
        ledger.mint(pool.a, pool.address, pool.reserve_a)?;
        ledger.mint(pool.b, pool.address, pool.reserve_b)?;
    }

    let module: Arc<dyn SwapModule> = match spec.kind {
        ModuleKind::ConstantProduct => Arc::new(spec.pools.iter().fold(
            ConstantProductModule::new(spec.name.clone(), spec.address, spec.fee_bps),
            |module, pool| module.with_pool(pool.a, pool.b, pool.address),
        )),
        ModuleKind::Stable => Arc::new(spec.pools.iter().fold(
            StablePoolModule::new(spec.name.clone(), spec.address, spec.fee_bps),
            |module, pool| module.with_pool(pool.a, pool.b, pool.address),
        )),
    };
    Ok(module)
}
