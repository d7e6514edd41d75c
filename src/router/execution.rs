// Leg execution
// Delegates one trade leg to its module under the router's custody and
// measures what the leg actually produced. Also keeps the router's running
// execution statistics.
//

use crate::errors::{ModuleError, RouterError};
use crate::metrics::LEG_EXECUTIONS;
use crate::router::registry::ModuleRegistry;
use crate::router::routes::{LegOutcome, TradeLeg};
use crate::router::validation::validate_swap_call;
use crate::state::{Address, Asset, Ledger};
use crate::venues::{ModuleContext, SwapCall, SwapModule};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Execution statistics for monitoring
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionStats {
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    pub avg_execution_time_ms: Option<f64>,
    pub success_rate: f64,
}

#[derive(Debug, Default)]
pub struct ExecutionCounters {
    total_executions: AtomicU64,
    successful_executions: AtomicU64,
    failed_executions: AtomicU64,
    total_execution_time_us: AtomicU64,
}

impl ExecutionCounters {
    pub fn record(&self, success: bool, elapsed: Duration) {
        self.total_executions.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_executions.fetch_add(1, Ordering::Relaxed);
            let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
            self.total_execution_time_us
                .fetch_add(micros, Ordering::Relaxed);
        } else {
            self.failed_executions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> ExecutionStats {
        let total = self.total_executions.load(Ordering::Relaxed);
        let successful = self.successful_executions.load(Ordering::Relaxed);
        let failed = self.failed_executions.load(Ordering::Relaxed);
        let total_ms = self.total_execution_time_us.load(Ordering::Relaxed) as f64 / 1000.0;

        ExecutionStats {
            total_executions: total,
            successful_executions: successful,
            failed_executions: failed,
            avg_execution_time_ms: if successful > 0 {
                Some(total_ms / successful as f64)
            } else {
                None
            },
            success_rate: if total > 0 {
                successful as f64 / total as f64
            } else {
                0.0
            },
        }
    }
}

/// A leg whose module is authorized and whose payload decoded and passed
/// validation. Nothing has been delegated yet.
pub(crate) struct PreparedLeg {
    pub index: usize,
    pub address: Address,
    pub module: Arc<dyn SwapModule>,
    pub call: SwapCall,
    pub input: Asset,
    pub output: Asset,
}

/// Resolve, decode and validate leg `index` against its module's own contract.
pub(crate) fn prepare_leg(
    registry: &ModuleRegistry,
    index: usize,
    leg: &TradeLeg,
) -> Result<PreparedLeg, RouterError> {
    let module = registry
        .module(leg.module)
        .ok_or(RouterError::UnauthorizedModule(leg.module))?;

    let call = module
        .decode(&leg.payload)
        .map_err(|e| RouterError::InvalidParameters(format!("leg {index}: {e}")))?;
    validate_swap_call(&call, module.contract())
        .into_result()
        .map_err(|e| match e {
            RouterError::InvalidParameters(msg) => {
                RouterError::InvalidParameters(format!("leg {index}: {msg}"))
            }
            other => other,
        })?;
    let (input, output) = match (call.input_asset(), call.output_asset()) {
        (Some(input), Some(output)) => (input, output),
        _ => {
            return Err(RouterError::InvalidParameters(format!(
                "leg {index}: empty path"
            )))
        }
    };

    Ok(PreparedLeg {
        index,
        address: leg.module,
        module,
        call,
        input,
        output,
    })
}

/// Delegate a prepared leg on behalf of `custodian`.
///
/// The leg's output is the custodian's measured balance change of the output
/// asset; the module's return value is only compared against it.
pub(crate) fn execute_leg(
    ledger: &mut Ledger,
    custodian: Address,
    baseline: &BTreeMap<Asset, u128>,
    leg: &PreparedLeg,
) -> Result<LegOutcome, RouterError> {
    let PreparedLeg {
        index,
        address,
        module,
        call,
        input,
        output,
    } = leg;

    let before = ledger.balance_of(*output, custodian);
    let reported = {
        let mut ctx = ModuleContext::new(ledger, custodian, baseline);
        module.swap(&mut ctx, call)
    };
    let reported = match reported {
        Ok(amount) => amount,
        Err(source) => {
            LEG_EXECUTIONS
                .with_label_values(&[module.name(), "failed"])
                .inc();
            return Err(RouterError::Module {
                module: *address,
                source,
            });
        }
    };

    let after = ledger.balance_of(*output, custodian);
    let observed = after.checked_sub(before).ok_or_else(|| RouterError::Module {
        module: *address,
        source: ModuleError::Rejected(format!("custody balance of {output} decreased")),
    })?;
    if observed != reported {
        warn!(
            leg = index,
            module = %address,
            reported = reported,
            observed = observed,
            "module-reported output differs from observed custody change; using observed"
        );
    }

    LEG_EXECUTIONS
        .with_label_values(&[module.name(), "settled"])
        .inc();
    debug!(leg = index, module = %address, input = %input, output = %output, observed, "leg settled");

    Ok(LegOutcome {
        module: *address,
        input: *input,
        output: *output,
        reported,
        observed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_track_success_rate_and_average_time() {
        let counters = ExecutionCounters::default();
        assert_eq!(counters.snapshot().avg_execution_time_ms, None);

        counters.record(true, Duration::from_millis(4));
        counters.record(true, Duration::from_millis(2));
        counters.record(false, Duration::from_millis(100));

        let stats = counters.snapshot();
        assert_eq!(stats.total_executions, 3);
        assert_eq!(stats.failed_executions, 1);
        assert_eq!(stats.avg_execution_time_ms, Some(3.0));
        assert!((stats.success_rate - 2.0 / 3.0).abs() < 1e-9);
    }
}
