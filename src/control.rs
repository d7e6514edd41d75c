// Control plane: administrator binding, single-flight execution guard and
// signed-request replay protection
//
// The administrator is an explicit single-writer slot set once at
// initialization and checked on every privileged call. The single-flight
// guard rejects reentrant calls while a batch holds router custody. The
// replay guard accepts each caller's nonces in strictly increasing order.

use crate::errors::{AuthError, RouterError};
use crate::signing::RequestStamp;
use crate::state::Address;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

#[derive(Debug, Default)]
pub struct AdminSlot {
    admin: Option<Address>,
}

impl AdminSlot {
    /// One-shot binding of the administrator identity.
    pub fn initialize(&mut self, admin: Address) -> Result<(), RouterError> {
        if self.admin.is_some() {
            return Err(RouterError::AlreadyInitialized);
        }
        if admin.is_zero() {
            return Err(RouterError::InvalidParameters(
                "administrator cannot be the zero address".to_string(),
            ));
        }
        self.admin = Some(admin);
        Ok(())
    }

    pub fn admin(&self) -> Option<Address> {
        self.admin
    }

    pub fn ensure(&self, caller: Address) -> Result<(), RouterError> {
        match self.admin {
            None => Err(RouterError::NotInitialized("administrator")),
            Some(admin) if admin == caller => Ok(()),
            Some(_) => {
                debug!(caller = %caller, "privileged call rejected");
                Err(RouterError::Unauthorized { caller })
            }
        }
    }
}

/// Per-instance guard allowing one call in flight at a time.
#[derive(Debug, Default)]
pub struct SingleFlight {
    busy: AtomicBool,
}

impl SingleFlight {
    pub fn enter(&self) -> Result<FlightGuard<'_>, RouterError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| RouterError::Reentrancy)?;
        Ok(FlightGuard { busy: &self.busy })
    }

    pub fn in_flight(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

pub struct FlightGuard<'a> {
    busy: &'a AtomicBool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Last accepted nonce per authenticated caller.
#[derive(Debug, Default)]
pub struct ReplayGuard {
    last_nonce: Mutex<HashMap<Address, u64>>,
}

impl ReplayGuard {
    /// Accept `stamp` for `caller` at unix time `now` and consume its nonce.
    /// Call only after the signature over the stamp has verified.
    pub fn admit(&self, caller: Address, stamp: RequestStamp, now: u64) -> Result<(), AuthError> {
        if stamp.expires_at <= now {
            return Err(AuthError::Expired {
                expires_at: stamp.expires_at,
                now,
            });
        }
        let mut seen = self.last_nonce.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(&last) = seen.get(&caller) {
            if stamp.nonce <= last {
                debug!(caller = %caller, nonce = stamp.nonce, last, "stale nonce rejected");
                return Err(AuthError::Replayed {
                    nonce: stamp.nonce,
                    last,
                });
            }
        }
        seen.insert(caller, stamp.nonce);
        Ok(())
    }

    pub fn last_nonce(&self, caller: Address) -> Option<u64> {
        self.last_nonce
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&caller)
            .copied()
    }
}

// A panic while holding one of these locks cannot leave the data half-written:
// every writer replaces whole values.
pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
