use crate::bus::BusTransaction;
use crate::config::{ConfigError, NodeConfig};
use crate::display::TemperatureDisplay;
use crate::registry::SensorRegistry;
use crate::scheduler::RoundRobinScheduler;
use crate::sensor::{self, MeasureError};
use crate::telemetry::{DatagramSink, TelemetryPublisher, UdpSink};
use crate::uplink::{self, Uplink, UplinkError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NodeStats {
    pub cycles_run: u32,
    pub readings_ok: u32,
    pub bus_absent: u32,
    pub checksum_failures: u32,
    pub last_error: Option<String>,
}

/// What one completed cycle produced. A skipped cycle is a normal
/// outcome, not a node failure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    Measured { slot: usize, celsius: f32 },
    Skipped { slot: usize, error: MeasureError },
}

#[derive(Debug, Error)]
pub enum NodeError {
    /// The reconnect collaborator gave up; restarting the process is the
    /// supervisor's job, not ours.
    #[error(transparent)]
    UplinkLost(#[from] UplinkError),
    /// A scheduled slot has no registered descriptor. Startup validation
    /// makes this unreachable in a correctly deployed node.
    #[error("no descriptor registered for slot {slot}")]
    MissingDescriptor { slot: usize },
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to open telemetry socket: {0}")]
    Socket(#[from] std::io::Error),
}

/// The acquisition node: an explicit state machine with one transition
/// per cycle (select, measure, publish, advance).
///
/// Single-threaded by design: exactly one bus transaction is ever in
/// flight, which is what makes the exclusively-owned line safe without
/// locking. Bus-level errors stay local to their cycle; the scheduler
/// advances regardless, so one dark sensor cannot starve the others.
pub struct SensorNode<B, S, U, D>
where
    B: BusTransaction,
    S: DatagramSink,
    U: Uplink,
    D: TemperatureDisplay,
{
    registry: SensorRegistry,
    scheduler: RoundRobinScheduler,
    bus: B,
    publisher: TelemetryPublisher<S>,
    uplink: U,
    display: D,
    reconnect_budget: u32,
    stats: NodeStats,
}

impl<B, S, U, D> SensorNode<B, S, U, D>
where
    B: BusTransaction,
    S: DatagramSink,
    U: Uplink,
    D: TemperatureDisplay,
{
    pub fn new(
        registry: SensorRegistry,
        bus: B,
        publisher: TelemetryPublisher<S>,
        uplink: U,
        display: D,
        reconnect_budget: u32,
    ) -> Self {
        debug_assert!(!registry.is_empty(), "registry validated at startup");
        let scheduler = RoundRobinScheduler::new(registry.len());
        Self {
            registry,
            scheduler,
            bus,
            publisher,
            uplink,
            display,
            reconnect_budget,
            stats: NodeStats::default(),
        }
    }

    /// Runs one acquisition cycle: check the uplink, measure the slot
    /// under the cursor, publish on success, advance unconditionally.
    pub fn run_cycle(&mut self) -> Result<CycleOutcome, NodeError> {
        // Connectivity loss delays the cycle, it never skips it.
        uplink::ensure_up(&mut self.uplink, self.reconnect_budget)?;

        let slot = self.scheduler.current();
        let descriptor = self
            .registry
            .descriptor_for_slot(slot)
            .ok_or(NodeError::MissingDescriptor { slot })?;

        let outcome = match sensor::measure(&mut self.bus, descriptor) {
            Ok(temperature) => {
                self.display
                    .show_reading(&descriptor.display_label, &temperature);
                self.publisher
                    .publish(&descriptor.telemetry_path, temperature.celsius());
                self.stats.readings_ok = self.stats.readings_ok.wrapping_add(1);
                info!(
                    slot,
                    label = %descriptor.display_label,
                    celsius = temperature.celsius(),
                    "reading acquired"
                );
                CycleOutcome::Measured {
                    slot,
                    celsius: temperature.celsius(),
                }
            }
            Err(error) => {
                match error {
                    MeasureError::NoDevicePresent => {
                        self.stats.bus_absent = self.stats.bus_absent.wrapping_add(1);
                    }
                    MeasureError::ChecksumMismatch { .. } => {
                        self.stats.checksum_failures =
                            self.stats.checksum_failures.wrapping_add(1);
                    }
                }
                self.stats.last_error = Some(error.to_string());
                warn!(slot, %error, "cycle yielded no reading");
                CycleOutcome::Skipped { slot, error }
            }
        };

        // Exactly once per completed cycle, success or not.
        self.scheduler.advance();
        self.stats.cycles_run = self.stats.cycles_run.wrapping_add(1);

        Ok(outcome)
    }

    pub fn stats(&self) -> &NodeStats {
        &self.stats
    }

    pub fn scheduler(&self) -> &RoundRobinScheduler {
        &self.scheduler
    }

    pub fn registry(&self) -> &SensorRegistry {
        &self.registry
    }

    pub fn publisher(&self) -> &TelemetryPublisher<S> {
        &self.publisher
    }

    pub fn publisher_mut(&mut self) -> &mut TelemetryPublisher<S> {
        &mut self.publisher
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}

impl<B, U, D> SensorNode<B, UdpSink, U, D>
where
    B: BusTransaction,
    U: Uplink,
    D: TemperatureDisplay,
{
    /// Wires a node from validated configuration, with telemetry going
    /// out over UDP to the configured collector.
    pub fn from_config(
        config: &NodeConfig,
        bus: B,
        uplink: U,
        display: D,
    ) -> Result<Self, BuildError> {
        let registry = config.build_registry()?;
        let sink = UdpSink::new(config.collector)?;
        let publisher = TelemetryPublisher::new(sink, &config.source, config.transmit_enabled);
        Ok(Self::new(
            registry,
            bus,
            publisher,
            uplink,
            display,
            config.uplink.reconnect_budget,
        ))
    }
}
