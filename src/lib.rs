//! # Temperature Sensor Node
//!
//! An embedded-style temperature acquisition node: a fixed set of 1-Wire
//! thermometers on one shared line, sampled round-robin, decoded and
//! published as SignalK delta datagrams to a fixed collector.
//!
//! ## Architecture
//!
//! - [`bus`] - shared-line transaction primitive, bit-banged GPIO driver
//!   and the Dallas CRC-8
//! - [`registry`] - static slot-to-sensor descriptor table
//! - [`scheduler`] - round-robin slot selection, one sensor per cycle
//! - [`sensor`] - conversion transaction and scratchpad decoding
//! - [`telemetry`] - delta envelope construction and datagram transmission
//! - [`node`] - the per-cycle state machine tying it all together
//! - [`uplink`] / [`display`] - interfaces to the external collaborators
//! - [`config`] - immutable startup configuration
//! - [`sim`] - behavioural bus model for bench runs and tests
//!
//! ## Quick Start
//!
//! ```rust
//! use tempnode::config::NodeConfig;
//! use tempnode::display::NullDisplay;
//! use tempnode::node::SensorNode;
//! use tempnode::sensor::Resolution;
//! use tempnode::sim::SimulatedBus;
//! use tempnode::uplink::AlwaysUp;
//!
//! let mut config = NodeConfig::default();
//! config.collector = "127.0.0.1:55561".parse().unwrap();
//! config.transmit_enabled = false; // bench run, no datagrams
//!
//! let mut bus = SimulatedBus::new();
//! for sensor in config.build_registry().unwrap().descriptors() {
//!     bus.add_device(sensor.address, 25.0, Resolution::Bits12);
//! }
//!
//! let mut node = SensorNode::from_config(&config, bus, AlwaysUp, NullDisplay).unwrap();
//! let outcome = node.run_cycle().unwrap();
//! println!("cycle outcome: {outcome:?}");
//! ```

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bus;
pub mod config;
pub mod display;
pub mod node;
pub mod registry;
pub mod scheduler;
pub mod sensor;
pub mod sim;
pub mod telemetry;
pub mod uplink;

// Re-export the main public types for convenience
pub use config::NodeConfig;
pub use node::{CycleOutcome, NodeError, SensorNode};
pub use registry::{SensorAddress, SensorDescriptor, SensorRegistry};
pub use sensor::{MeasureError, Resolution, Temperature};
pub use telemetry::{Delta, TelemetryPublisher};
