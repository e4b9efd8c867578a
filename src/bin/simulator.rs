use clap::{App, Arg};
use std::time::Duration;
use tempnode::config::NodeConfig;
use tempnode::display::LogDisplay;
use tempnode::node::SensorNode;
use tempnode::sensor::Resolution;
use tempnode::sim::SimulatedBus;
use tempnode::uplink::AlwaysUp;
use tokio::time;
use tracing::{error, info};

/// Plausible engine-compartment base temperatures for the simulated
/// sensors, cycled by slot: coolant, exhaust, oil.
const BASE_CELSIUS: [f32; 3] = [82.5, 104.0, 68.0];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let matches = App::new("tempnode-simulator")
        .version("0.1.0")
        .about("Temperature sensor node against a simulated 1-Wire bus")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("Node configuration file (JSON); defaults to the built-in engine sensor table")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("collector")
                .long("collector")
                .value_name("ADDR:PORT")
                .help("Override the SignalK collector endpoint")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("interval")
                .short("i")
                .long("interval-ms")
                .value_name("MS")
                .help("Acquisition cycle period in milliseconds")
                .takes_value(true)
                .default_value("1000"),
        )
        .arg(
            Arg::with_name("cycles")
                .short("n")
                .long("cycles")
                .value_name("COUNT")
                .help("Stop after this many cycles (0 = run until Ctrl-C)")
                .takes_value(true)
                .default_value("0"),
        )
        .arg(
            Arg::with_name("no-transmit")
                .long("no-transmit")
                .help("Disable telemetry transmission (bench mode)"),
        )
        .get_matches();

    let mut config = match matches.value_of("config") {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::default(),
    };
    if let Some(collector) = matches.value_of("collector") {
        config.collector = collector.parse()?;
    }
    if matches.is_present("no-transmit") {
        config.transmit_enabled = false;
    }
    let interval_ms: u64 = matches.value_of("interval").unwrap_or("1000").parse()?;
    let max_cycles: u64 = matches.value_of("cycles").unwrap_or("0").parse()?;

    // Populate the simulated line with one device per configured slot.
    let registry = config.build_registry()?;
    let mut bus = SimulatedBus::new();
    for (slot, descriptor) in registry.descriptors().iter().enumerate() {
        bus.add_device(
            descriptor.address,
            BASE_CELSIUS[slot % BASE_CELSIUS.len()],
            Resolution::Bits12,
        );
    }

    let mut node = SensorNode::from_config(&config, bus, AlwaysUp, LogDisplay)?;
    info!(
        collector = %config.collector,
        sensors = node.registry().len(),
        transmit = config.transmit_enabled,
        "sensor node starting"
    );

    let mut ticker = time::interval(Duration::from_millis(interval_ms));
    let mut completed: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                node.bus_mut().advance_model(interval_ms);
                match node.run_cycle() {
                    Ok(outcome) => info!(?outcome, "cycle complete"),
                    Err(e) => {
                        error!("node stopped: {e}");
                        break;
                    }
                }
                completed += 1;
                if max_cycles > 0 && completed >= max_cycles {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        }
    }

    let stats = node.stats();
    info!(
        cycles = stats.cycles_run,
        readings = stats.readings_ok,
        bus_absent = stats.bus_absent,
        checksum_failures = stats.checksum_failures,
        datagrams_sent = node.publisher().stats().datagrams_sent,
        "sensor node stopped"
    );

    Ok(())
}
