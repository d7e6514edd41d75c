// Library root module for trade-router
// This file defines the public API and module structure: the ledger the
// router operates on, swap modules, the registry, the router itself and
// the service layer around them
//

pub mod bootstrap;
pub mod config;
pub mod control;
pub mod errors;
pub mod metrics;
pub mod router;
pub mod signing;
pub mod state;
pub mod venues;
