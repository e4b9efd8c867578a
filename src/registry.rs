use crate::bus::crc8;
use heapless::Vec;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Upper bound on configured sensor slots; the descriptor table is a
/// fixed-capacity vector and never grows after startup.
pub const MAX_SENSORS: usize = 8;

/// 64-bit ROM code of one device on the bus: family code, 48-bit serial,
/// and a CRC-8 over the first seven bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorAddress {
    raw: [u8; Self::BYTES],
}

impl SensorAddress {
    /// The length of a device address in bytes.
    pub const BYTES: usize = 8;

    pub fn new(raw: [u8; Self::BYTES]) -> Self {
        Self { raw }
    }

    pub fn as_bytes(&self) -> &[u8; Self::BYTES] {
        &self.raw
    }

    /// First ROM byte, identifying the device family.
    pub fn family_code(&self) -> u8 {
        self.raw[0]
    }

    /// Checks the device-lasered checksum byte against the first seven
    /// ROM bytes.
    pub fn rom_crc_valid(&self) -> bool {
        crc8(&self.raw[..7]) == self.raw[7]
    }
}

impl From<[u8; SensorAddress::BYTES]> for SensorAddress {
    fn from(raw: [u8; SensorAddress::BYTES]) -> Self {
        Self::new(raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("address shorter than 8 bytes")]
    NotEnough,
    #[error("address contains a non-hex digit")]
    InvalidDigit,
    #[error("trailing characters after 8 bytes")]
    TrailingInput,
}

impl FromStr for SensorAddress {
    type Err = AddressParseError;

    /// Parses 16 hex digits, ignoring whitespace and `:` separators,
    /// e.g. `"28ff68aa851604a5"` or `"28:ff:68:aa:85:16:04:a5"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut digits = s.chars().filter(|c| !c.is_whitespace() && *c != ':');
        let mut raw = [0u8; Self::BYTES];

        for byte in raw.iter_mut() {
            match (digits.next(), digits.next()) {
                (Some(hi), Some(lo)) => {
                    let hi = hi.to_digit(16).ok_or(AddressParseError::InvalidDigit)?;
                    let lo = lo.to_digit(16).ok_or(AddressParseError::InvalidDigit)?;
                    *byte = ((hi as u8) << 4) | lo as u8;
                }
                _ => return Err(AddressParseError::NotEnough),
            }
        }

        if digits.next().is_some() {
            return Err(AddressParseError::TrailingInput);
        }

        Ok(Self { raw })
    }
}

impl fmt::Display for SensorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.raw[0],
            self.raw[1],
            self.raw[2],
            self.raw[3],
            self.raw[4],
            self.raw[5],
            self.raw[6],
            self.raw[7],
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("sensor table full (capacity {MAX_SENSORS})")]
    CapacityExceeded,
}

/// One configured sensor slot: where it lives on the bus and how its
/// readings are named, on the wire and on the local display.
#[derive(Debug, Clone)]
pub struct SensorDescriptor {
    pub address: SensorAddress,
    pub telemetry_path: String,
    pub display_label: String,
}

/// Immutable slot-to-descriptor table, fixed for the node's lifetime.
/// Rewiring a sensor means redeploying configuration, not a runtime API.
#[derive(Debug)]
pub struct SensorRegistry {
    sensors: Vec<SensorDescriptor, MAX_SENSORS>,
}

impl SensorRegistry {
    /// Builds the registry from an ordered descriptor list. Capacity
    /// overflow is reported, emptiness is checked by the configuration
    /// layer before the node starts.
    pub fn new(
        descriptors: impl IntoIterator<Item = SensorDescriptor>,
    ) -> Result<Self, RegistryError> {
        let mut sensors: Vec<SensorDescriptor, MAX_SENSORS> = Vec::new();
        for descriptor in descriptors {
            sensors
                .push(descriptor)
                .map_err(|_| RegistryError::CapacityExceeded)?;
        }
        Ok(Self { sensors })
    }

    /// Pure lookup; `None` means the slot was never configured.
    pub fn descriptor_for_slot(&self, slot: usize) -> Option<&SensorDescriptor> {
        self.sensors.get(slot)
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn descriptors(&self) -> &[SensorDescriptor] {
        &self.sensors
    }
}
