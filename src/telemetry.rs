use serde::{Deserialize, Serialize};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use tracing::{debug, warn};

/// Kelvin offset: the SignalK wire contract fixes the unit regardless of
/// the path's semantic name.
const KELVIN_OFFSET: f64 = 273.15;

/// Default source tag identifying this node in the delta envelope.
pub const DEFAULT_SOURCE: &str = "EngineSensors";

/// One `{path, value}` pair inside a delta update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathValue {
    pub path: String,
    pub value: f64,
}

/// One update block: a source tag and its changed values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    #[serde(rename = "Source")]
    pub source: String,
    pub values: Vec<PathValue>,
}

/// The SignalK delta envelope. The shape never varies here: one update
/// carrying one value per datagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub updates: Vec<Update>,
}

impl Delta {
    /// Builds the fixed single-update, single-value envelope.
    pub fn single(source: &str, path: &str, value: f64) -> Self {
        Self {
            updates: vec![Update {
                source: source.to_string(),
                values: vec![PathValue {
                    path: path.to_string(),
                    value,
                }],
            }],
        }
    }
}

/// Connectionless transport seam: hand one serialized delta to the
/// collector. No acknowledgment, no session, no delivery guarantee.
pub trait DatagramSink {
    fn send(&mut self, payload: &[u8]) -> io::Result<()>;
}

/// UDP datagram sink bound to an ephemeral local port, targeting the
/// fixed collector endpoint.
#[derive(Debug)]
pub struct UdpSink {
    socket: UdpSocket,
    collector: SocketAddr,
}

impl UdpSink {
    pub fn new(collector: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        Ok(Self { socket, collector })
    }

    pub fn collector(&self) -> SocketAddr {
        self.collector
    }
}

impl DatagramSink for UdpSink {
    fn send(&mut self, payload: &[u8]) -> io::Result<()> {
        self.socket.send_to(payload, self.collector).map(|_| ())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct PublisherStats {
    pub serializations: u32,
    pub datagrams_sent: u32,
    pub send_failures: u32,
    pub suppressed: u32,
}

/// Builds, serializes and transmits one delta per reading.
///
/// Transmission is fire-and-forget: a failed send is counted and logged,
/// never retried. The enable flag suppresses both serialization and the
/// send, which keeps bench runs free of network side effects.
#[derive(Debug)]
pub struct TelemetryPublisher<S: DatagramSink> {
    sink: S,
    source: String,
    enabled: bool,
    stats: PublisherStats,
}

impl<S: DatagramSink> TelemetryPublisher<S> {
    pub fn new(sink: S, source: &str, enabled: bool) -> Self {
        Self {
            sink,
            source: source.to_string(),
            enabled,
            stats: PublisherStats::default(),
        }
    }

    /// Runtime toggle for transmission.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Converts `celsius` to the wire unit, wraps it in the delta
    /// envelope and sends it as a single datagram.
    pub fn publish(&mut self, path: &str, celsius: f32) {
        if !self.enabled {
            self.stats.suppressed = self.stats.suppressed.wrapping_add(1);
            return;
        }

        let kelvin = f64::from(celsius) + KELVIN_OFFSET;
        let delta = Delta::single(&self.source, path, kelvin);

        self.stats.serializations = self.stats.serializations.wrapping_add(1);
        let payload = match serde_json::to_vec(&delta) {
            Ok(payload) => payload,
            Err(e) => {
                // The envelope shape is fixed, so this indicates a bug
                // rather than bad data.
                warn!("delta serialization failed: {e}");
                return;
            }
        };

        match self.sink.send(&payload) {
            Ok(()) => {
                self.stats.datagrams_sent = self.stats.datagrams_sent.wrapping_add(1);
                debug!(path, kelvin, "delta sent");
            }
            Err(e) => {
                self.stats.send_failures = self.stats.send_failures.wrapping_add(1);
                warn!(path, "delta send failed: {e}");
            }
        }
    }

    pub fn stats(&self) -> &PublisherStats {
        &self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
