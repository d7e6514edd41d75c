// Router module - trade execution plane
// This file wires the module registry, leg execution, the router core and
// its HTTP API together
//

pub mod api;
pub mod execution;
pub mod registry;
pub mod routes;
pub mod validation;

#[allow(clippy::module_inception)]
pub mod router;

pub use execution::ExecutionStats;
pub use registry::{ModuleInfo, ModuleRegistry};
pub use router::Router;
pub use routes::{LegOutcome, TradeLeg, TradeReceipt, TradeRequest};
