// Module registry
// Authorization source of truth for which swap modules the router may
// delegate to. Mutations are gated on the registry's administrator.
//

use crate::control::{self, AdminSlot};
use crate::errors::RouterError;
use crate::state::Address;
use crate::venues::{ModuleContract, SwapModule};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct ModuleInfo {
    pub address: Address,
    pub name: String,
    pub contract: ModuleContract,
}

pub struct ModuleRegistry {
    address: Address,
    admin: RwLock<AdminSlot>,
    router: RwLock<Option<Address>>,
    modules: RwLock<BTreeMap<Address, Arc<dyn SwapModule>>>,
}

impl ModuleRegistry {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            admin: RwLock::new(AdminSlot::default()),
            router: RwLock::new(None),
            modules: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// One-time initialization binding the administrator.
    pub fn post_upgrade(&self, admin: Address) -> Result<(), RouterError> {
        control::write(&self.admin).initialize(admin)?;
        info!(registry = %self.address, admin = %admin, "module registry initialized");
        Ok(())
    }

    pub fn admin(&self) -> Option<Address> {
        control::read(&self.admin).admin()
    }

    /// Bind the one router this registry serves. Settable once per deployment.
    pub fn set_router(&self, caller: Address, router: Address) -> Result<(), RouterError> {
        control::read(&self.admin).ensure(caller)?;
        let mut slot = control::write(&self.router);
        if slot.is_some() {
            return Err(RouterError::AlreadyInitialized);
        }
        if router.is_zero() {
            return Err(RouterError::InvalidParameters(
                "router cannot be the zero address".to_string(),
            ));
        }
        *slot = Some(router);
        info!(registry = %self.address, router = %router, "registry bound to router");
        Ok(())
    }

    pub fn router(&self) -> Option<Address> {
        *control::read(&self.router)
    }

    /// Authorize a module. Returns `false` when it was already registered.
    pub fn register_swap_module(
        &self,
        caller: Address,
        module: Arc<dyn SwapModule>,
    ) -> Result<bool, RouterError> {
        control::read(&self.admin).ensure(caller)?;
        let address = module.address();
        let mut modules = control::write(&self.modules);
        if let Some(existing) = modules.get(&address) {
            if existing.name() != module.name() {
                warn!(
                    module = %address,
                    registered = existing.name(),
                    offered = module.name(),
                    "module address already registered under another name; keeping existing"
                );
            }
            return Ok(false);
        }
        info!(module = %address, name = module.name(), "swap module registered");
        modules.insert(address, module);
        Ok(true)
    }

    /// Revoke a module. Returns `false` when it was not registered.
    pub fn unregister_swap_module(
        &self,
        caller: Address,
        module: Address,
    ) -> Result<bool, RouterError> {
        control::read(&self.admin).ensure(caller)?;
        let removed = control::write(&self.modules).remove(&module).is_some();
        if removed {
            info!(module = %module, "swap module unregistered");
        }
        Ok(removed)
    }

    pub fn is_authorized(&self, module: Address) -> bool {
        control::read(&self.modules).contains_key(&module)
    }

    pub fn module(&self, module: Address) -> Option<Arc<dyn SwapModule>> {
        control::read(&self.modules).get(&module).cloned()
    }

    pub fn authorized_modules(&self) -> Vec<ModuleInfo> {
        control::read(&self.modules)
            .values()
            .map(|m| ModuleInfo {
                address: m.address(),
                name: m.name().to_string(),
                contract: m.contract(),
            })
            .collect()
    }
}
