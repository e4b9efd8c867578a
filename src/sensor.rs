use crate::bus::{crc8, BusTransaction};
use crate::registry::SensorDescriptor;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// ROM family code of the supported temperature sensor family.
pub const FAMILY_CODE: u8 = 0x28;

/// Scratchpad length returned by a read command.
pub const SCRATCHPAD_LEN: usize = 9;

/// Worst-case conversion latency (12-bit resolution). The engine always
/// waits this long rather than polling, so a sensor configured for a
/// lower resolution simply finishes early.
pub const MAX_CONVERSION_TIME: Duration = Duration::from_millis(750);

/// Function commands consumed on the bus after device selection.
#[derive(Debug, Clone, Copy)]
#[repr(u8)]
pub enum Command {
    Convert = 0x44,
    ReadScratchpad = 0xBE,
}

impl Command {
    pub fn op_code(self) -> u8 {
        self as u8
    }
}

/// Active measurement resolution, encoded in bits 5-6 of scratchpad
/// byte 4. Lower resolutions leave the corresponding low-order raw bits
/// undefined, so they are masked to zero before scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Bits9,
    Bits10,
    Bits11,
    Bits12,
}

impl Resolution {
    /// Decodes the configuration register byte (scratchpad byte 4).
    pub fn from_config_byte(config: u8) -> Self {
        match config & 0x60 {
            0x00 => Resolution::Bits9,
            0x20 => Resolution::Bits10,
            0x40 => Resolution::Bits11,
            _ => Resolution::Bits12,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Resolution::Bits9 => 9,
            Resolution::Bits10 => 10,
            Resolution::Bits11 => 11,
            Resolution::Bits12 => 12,
        }
    }

    /// Configuration register value announcing this resolution
    /// (scratchpad byte 4, unused bits reading as ones).
    pub fn config_byte(self) -> u8 {
        match self {
            Resolution::Bits9 => 0x1F,
            Resolution::Bits10 => 0x3F,
            Resolution::Bits11 => 0x5F,
            Resolution::Bits12 => 0x7F,
        }
    }

    /// Typical conversion time at this resolution.
    pub fn conversion_time_ms(self) -> u16 {
        match self {
            Resolution::Bits9 => 94,
            Resolution::Bits10 => 188,
            Resolution::Bits11 => 375,
            Resolution::Bits12 => 750,
        }
    }

    /// Clears the undefined low-order bits of a raw conversion result.
    pub fn truncate(self, raw: i16) -> i16 {
        match self {
            Resolution::Bits9 => raw & !0x7,
            Resolution::Bits10 => raw & !0x3,
            Resolution::Bits11 => raw & !0x1,
            Resolution::Bits12 => raw,
        }
    }
}

/// A decoded temperature. Celsius is canonical; Kelvin (the wire unit)
/// and Fahrenheit (display only) are derived on demand and never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Temperature {
    celsius: f32,
    resolution: Resolution,
}

impl Temperature {
    /// Reconstructs a temperature from the 16-bit raw conversion result
    /// and the resolution it was taken at. The raw value is truncated to
    /// the resolution before scaling by the fixed 1/16 C step.
    pub fn from_raw(raw: i16, resolution: Resolution) -> Self {
        Self {
            celsius: f32::from(resolution.truncate(raw)) / 16.0,
            resolution,
        }
    }

    pub fn celsius(&self) -> f32 {
        self.celsius
    }

    /// Wire unit for SignalK deltas.
    pub fn kelvin(&self) -> f32 {
        self.celsius + 273.15
    }

    /// Display-only derivation; must never feed the transmitted value.
    pub fn fahrenheit(&self) -> f32 {
        self.celsius * 1.8 + 32.0
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MeasureError {
    /// Reset found no presence pulse on the line.
    #[error("no device present on the bus")]
    NoDevicePresent,
    /// Scratchpad integrity check failed; the reading is discarded, not
    /// corrected or retried.
    #[error("scratchpad checksum mismatch (computed {computed:#04x}, received {received:#04x})")]
    ChecksumMismatch { computed: u8, received: u8 },
}

/// Decodes a full 9-byte scratchpad: checksum over bytes 0-7 against
/// byte 8, then signed raw reconstruction (byte 1 high, byte 0 low) at
/// the resolution announced in byte 4.
pub fn decode_scratchpad(scratchpad: &[u8; SCRATCHPAD_LEN]) -> Result<Temperature, MeasureError> {
    let computed = crc8(&scratchpad[..8]);
    let received = scratchpad[8];
    if computed != received {
        return Err(MeasureError::ChecksumMismatch { computed, received });
    }

    let raw = i16::from_le_bytes([scratchpad[0], scratchpad[1]]);
    let resolution = Resolution::from_config_byte(scratchpad[4]);
    Ok(Temperature::from_raw(raw, resolution))
}

/// Runs one full measurement transaction for `descriptor`'s device:
/// start a conversion, block for the worst-case conversion latency, read
/// the scratchpad back and decode it.
///
/// Errors are terminal for this cycle only; the caller's next rotation
/// will resample the sensor in due course.
pub fn measure<B: BusTransaction>(
    bus: &mut B,
    descriptor: &SensorDescriptor,
) -> Result<Temperature, MeasureError> {
    if !bus.reset() {
        return Err(MeasureError::NoDevicePresent);
    }
    bus.select(&descriptor.address);
    bus.write_byte(Command::Convert.op_code());

    bus.wait(MAX_CONVERSION_TIME);

    if !bus.reset() {
        return Err(MeasureError::NoDevicePresent);
    }
    bus.select(&descriptor.address);
    bus.write_byte(Command::ReadScratchpad.op_code());

    let mut scratchpad = [0u8; SCRATCHPAD_LEN];
    for byte in scratchpad.iter_mut() {
        *byte = bus.read_byte();
    }

    debug!(
        address = %descriptor.address,
        scratchpad = ?scratchpad,
        crc = format_args!("{:#04x}", crc8(&scratchpad[..8])),
        "scratchpad read"
    );

    decode_scratchpad(&scratchpad)
}
