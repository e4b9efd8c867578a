use std::net::UdpSocket;
use std::time::Duration;

use tempnode::config::NodeConfig;
use tempnode::display::NullDisplay;
use tempnode::node::{CycleOutcome, SensorNode};
use tempnode::sensor::Resolution;
use tempnode::sim::SimulatedBus;
use tempnode::telemetry::Delta;
use tempnode::uplink::AlwaysUp;

fn local_collector() -> (UdpSocket, std::net::SocketAddr) {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    let addr = socket.local_addr().unwrap();
    (socket, addr)
}

fn simulated_node(
    config: &NodeConfig,
    celsius: f32,
) -> SensorNode<SimulatedBus, tempnode::telemetry::UdpSink, AlwaysUp, NullDisplay> {
    let mut bus = SimulatedBus::new();
    for descriptor in config.build_registry().unwrap().descriptors() {
        bus.add_device(descriptor.address, celsius, Resolution::Bits12);
    }
    SensorNode::from_config(config, bus, AlwaysUp, NullDisplay).unwrap()
}

#[test]
fn datagram_reaches_local_collector() {
    let (collector, addr) = local_collector();
    let mut config = NodeConfig::default();
    config.collector = addr;

    let mut node = simulated_node(&config, 25.0);
    let outcome = node.run_cycle().unwrap();
    assert!(matches!(outcome, CycleOutcome::Measured { slot: 0, .. }));

    let mut buf = [0u8; 1024];
    let (len, _) = collector.recv_from(&mut buf).unwrap();
    let delta: Delta = serde_json::from_slice(&buf[..len]).unwrap();

    assert_eq!(delta.updates.len(), 1);
    assert_eq!(delta.updates[0].source, "EngineSensors");
    assert_eq!(
        delta.updates[0].values[0].path,
        "propulsion.main.coolantTemperature"
    );
    assert!((delta.updates[0].values[0].value - 298.15).abs() < 1e-4);
}

#[test]
fn full_rotation_sends_one_datagram_per_slot() {
    let (collector, addr) = local_collector();
    let mut config = NodeConfig::default();
    config.collector = addr;

    let mut node = simulated_node(&config, 40.0);
    for _ in 0..6 {
        node.run_cycle().unwrap();
    }

    let mut paths = Vec::new();
    let mut buf = [0u8; 1024];
    for _ in 0..6 {
        let (len, _) = collector.recv_from(&mut buf).unwrap();
        let delta: Delta = serde_json::from_slice(&buf[..len]).unwrap();
        paths.push(delta.updates[0].values[0].path.clone());
    }

    assert_eq!(
        paths,
        vec![
            "propulsion.main.coolantTemperature",
            "propulsion.main.exhaustTemperature",
            "propulsion.main.oilTemperature",
            "propulsion.main.coolantTemperature",
            "propulsion.main.exhaustTemperature",
            "propulsion.main.oilTemperature",
        ]
    );
    assert_eq!(node.publisher().stats().datagrams_sent, 6);
}

#[test]
fn bench_mode_stays_silent_on_the_network() {
    let (collector, addr) = local_collector();
    let mut config = NodeConfig::default();
    config.collector = addr;
    config.transmit_enabled = false;

    let mut node = simulated_node(&config, 25.0);
    for _ in 0..3 {
        node.run_cycle().unwrap();
    }

    collector
        .set_read_timeout(Some(Duration::from_millis(200)))
        .unwrap();
    let mut buf = [0u8; 1024];
    assert!(collector.recv_from(&mut buf).is_err());
    assert_eq!(node.publisher().stats().serializations, 0);
    assert_eq!(node.stats().readings_ok, 3);
}
