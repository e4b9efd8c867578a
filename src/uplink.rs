use thiserror::Error;
use tracing::{info, warn};

/// Reconnect attempts allowed before the node gives up and leaves a
/// restart to the process supervisor.
pub const DEFAULT_RECONNECT_BUDGET: u32 = 60;

/// Wireless uplink collaborator: association and reconnection live
/// outside this crate, the acquisition loop only needs a liveness
/// predicate and a blocking reconnect entry point.
pub trait Uplink {
    /// Whether the uplink currently carries traffic.
    fn is_up(&self) -> bool;

    /// One blocking reconnection attempt. Returns `true` once the link
    /// is associated again.
    fn reconnect(&mut self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UplinkError {
    /// The bounded reconnect budget ran out; the node must restart
    /// rather than continue degraded.
    #[error("uplink reconnect budget exhausted after {attempts} attempts")]
    RetryBudgetExhausted { attempts: u32 },
}

/// Blocks until the uplink is up, reconnecting within `budget` attempts.
/// Checked before every acquisition cycle: cycle work is delayed while
/// the link recovers, never lost.
pub fn ensure_up<U: Uplink>(uplink: &mut U, budget: u32) -> Result<(), UplinkError> {
    if uplink.is_up() {
        return Ok(());
    }

    warn!("uplink down, reconnecting");
    for attempt in 1..=budget {
        if uplink.reconnect() {
            info!(attempt, "uplink reassociated");
            return Ok(());
        }
    }
    Err(UplinkError::RetryBudgetExhausted { attempts: budget })
}

/// Loopback uplink for bench runs and tests.
#[derive(Debug, Default)]
pub struct AlwaysUp;

impl Uplink for AlwaysUp {
    fn is_up(&self) -> bool {
        true
    }

    fn reconnect(&mut self) -> bool {
        true
    }
}
