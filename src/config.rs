use crate::registry::{AddressParseError, RegistryError, SensorAddress, SensorDescriptor, SensorRegistry};
use crate::sensor::FAMILY_CODE;
use crate::telemetry::DEFAULT_SOURCE;
use crate::uplink::DEFAULT_RECONNECT_BUDGET;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// One sensor slot as written in the configuration file. The address is
/// kept textual here and parsed during validation so a typo is reported
/// with its slot number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    pub address: String,
    pub telemetry_path: String,
    pub display_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UplinkConfig {
    pub ssid: String,
    pub password: String,
    #[serde(default = "default_reconnect_budget")]
    pub reconnect_budget: u32,
}

fn default_reconnect_budget() -> u32 {
    DEFAULT_RECONNECT_BUDGET
}

/// Whole-node configuration: immutable after startup, passed by
/// reference to the components that need it. There is no runtime
/// mutation API; rewiring means redeploying this file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Source tag stamped into every delta envelope.
    #[serde(default = "default_source")]
    pub source: String,
    /// Fixed collector endpoint for telemetry datagrams.
    pub collector: SocketAddr,
    /// Transmission enable flag (bench runs set this false).
    #[serde(default = "default_transmit_enabled")]
    pub transmit_enabled: bool,
    pub uplink: UplinkConfig,
    pub sensors: Vec<SensorConfig>,
}

fn default_source() -> String {
    DEFAULT_SOURCE.to_string()
}

fn default_transmit_enabled() -> bool {
    true
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no sensors configured")]
    NoSensors,
    #[error("slot {slot}: bad sensor address: {source}")]
    InvalidAddress {
        slot: usize,
        #[source]
        source: AddressParseError,
    },
    #[error("slot {slot}: family code {family:#04x} is not a supported temperature sensor")]
    WrongFamily { slot: usize, family: u8 },
    #[error("slot {slot}: ROM checksum invalid for address {address}")]
    RomChecksum { slot: usize, address: SensorAddress },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl NodeConfig {
    /// Loads and parses a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Validates the sensor table and builds the immutable registry.
    ///
    /// Any failure here is fatal at startup: it indicates a deployment
    /// mistake, not a runtime condition.
    pub fn build_registry(&self) -> Result<SensorRegistry, ConfigError> {
        if self.sensors.is_empty() {
            return Err(ConfigError::NoSensors);
        }

        let mut descriptors = Vec::with_capacity(self.sensors.len());
        for (slot, sensor) in self.sensors.iter().enumerate() {
            let address: SensorAddress = sensor
                .address
                .parse()
                .map_err(|source| ConfigError::InvalidAddress { slot, source })?;

            if address.family_code() != FAMILY_CODE {
                return Err(ConfigError::WrongFamily {
                    slot,
                    family: address.family_code(),
                });
            }
            if !address.rom_crc_valid() {
                return Err(ConfigError::RomChecksum { slot, address });
            }

            descriptors.push(SensorDescriptor {
                address,
                telemetry_path: sensor.telemetry_path.clone(),
                display_label: sensor.display_label.clone(),
            });
        }

        Ok(SensorRegistry::new(descriptors)?)
    }
}

impl Default for NodeConfig {
    /// The node's as-built engine sensor wiring.
    fn default() -> Self {
        Self {
            source: default_source(),
            collector: "10.10.10.1:55561".parse().unwrap(),
            transmit_enabled: true,
            uplink: UplinkConfig {
                ssid: "openplotter".to_string(),
                password: "margaritaville".to_string(),
                reconnect_budget: DEFAULT_RECONNECT_BUDGET,
            },
            sensors: vec![
                SensorConfig {
                    address: "28ff68aa851604a5".to_string(),
                    telemetry_path: "propulsion.main.coolantTemperature".to_string(),
                    display_label: "Coolant".to_string(),
                },
                SensorConfig {
                    address: "28ffb15f8516037b".to_string(),
                    telemetry_path: "propulsion.main.exhaustTemperature".to_string(),
                    display_label: "Exhaust".to_string(),
                },
                SensorConfig {
                    address: "28fff71d821704d4".to_string(),
                    telemetry_path: "propulsion.main.oilTemperature".to_string(),
                    display_label: "Oil".to_string(),
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds_three_slot_registry() {
        let registry = NodeConfig::default().build_registry().unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.descriptor_for_slot(0).unwrap().telemetry_path,
            "propulsion.main.coolantTemperature"
        );
        assert_eq!(registry.descriptor_for_slot(2).unwrap().display_label, "Oil");
    }

    #[test]
    fn empty_sensor_table_is_fatal() {
        let mut config = NodeConfig::default();
        config.sensors.clear();
        assert!(matches!(
            config.build_registry(),
            Err(ConfigError::NoSensors)
        ));
    }

    #[test]
    fn malformed_address_reports_slot() {
        let mut config = NodeConfig::default();
        config.sensors[1].address = "28ff".to_string();
        assert!(matches!(
            config.build_registry(),
            Err(ConfigError::InvalidAddress { slot: 1, .. })
        ));
    }

    #[test]
    fn wrong_family_code_is_rejected() {
        let mut config = NodeConfig::default();
        // 0x01 is an iButton family, not a thermometer.
        config.sensors[0].address = "01228ff908000168".to_string();
        assert!(matches!(
            config.build_registry(),
            Err(ConfigError::WrongFamily { slot: 0, .. })
        ));
    }

    #[test]
    fn corrupted_rom_checksum_is_rejected() {
        let mut config = NodeConfig::default();
        config.sensors[2].address = "28fff71d821704d5".to_string();
        assert!(matches!(
            config.build_registry(),
            Err(ConfigError::RomChecksum { slot: 2, .. })
        ));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = NodeConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: NodeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.collector, config.collector);
        assert_eq!(parsed.sensors.len(), 3);
        assert!(parsed.transmit_enabled);
        assert_eq!(parsed.uplink.reconnect_budget, DEFAULT_RECONNECT_BUDGET);
    }
}
