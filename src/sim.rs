use crate::bus::{crc8, BusTransaction, MATCH_ROM};
use crate::registry::SensorAddress;
use crate::sensor::{Command, Resolution, SCRATCHPAD_LEN};
use std::collections::VecDeque;
use std::time::Duration;

/// Power-on reset value of the temperature register (85 C), served until
/// a conversion has been commanded.
const POWER_ON_RAW: i16 = 0x0550;

/// One modelled device hanging off the simulated line.
#[derive(Debug)]
pub struct SimulatedDevice {
    address: SensorAddress,
    base_celsius: f32,
    celsius: f32,
    resolution: Resolution,
    present: bool,
    corrupt_next_crc: bool,
    converted_raw: Option<i16>,
}

impl SimulatedDevice {
    /// Current modelled temperature.
    pub fn celsius(&self) -> f32 {
        self.celsius
    }

    /// Pins the modelled temperature (disabled drift follows from
    /// never calling [`SimulatedBus::advance_model`]).
    pub fn set_celsius(&mut self, celsius: f32) {
        self.base_celsius = celsius;
        self.celsius = celsius;
    }

    /// Simulates unplugging or rewiring the device.
    pub fn set_present(&mut self, present: bool) {
        self.present = present;
    }

    /// Corrupts the checksum byte of the next scratchpad served.
    pub fn corrupt_next_crc(&mut self) {
        self.corrupt_next_crc = true;
    }

    pub fn set_resolution(&mut self, resolution: Resolution) {
        self.resolution = resolution;
    }

    fn current_raw(&self) -> i16 {
        let clamped = self.celsius.clamp(-55.0, 125.0);
        self.resolution.truncate((clamped * 16.0).round() as i16)
    }

    fn scratchpad(&mut self) -> [u8; SCRATCHPAD_LEN] {
        let raw = self.converted_raw.unwrap_or(POWER_ON_RAW);
        let [lsb, msb] = raw.to_le_bytes();
        let mut scratchpad = [
            lsb,
            msb,
            0x4B,
            0x46,
            self.resolution.config_byte(),
            0xFF,
            0x0C,
            0x10,
            0,
        ];
        scratchpad[8] = crc8(&scratchpad[..8]);
        if self.corrupt_next_crc {
            scratchpad[8] ^= 0xFF;
            self.corrupt_next_crc = false;
        }
        scratchpad
    }
}

/// Shared-line state of the simulated bus protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineState {
    /// Waiting for a ROM command after a reset.
    Idle,
    /// MATCH ROM seen, collecting the 8 address bytes.
    Addressing,
    /// A selection attempt finished; function commands go to the
    /// selected device, if any answered.
    Selected,
}

/// Behavioural model of the sensor bus: devices are addressed through
/// the same reset / MATCH ROM / function-command byte sequences a real
/// line would carry, so the node drives it through [`BusTransaction`]
/// exactly as it would drive hardware.
///
/// An addressed device that is not present simply never drives the line,
/// which reads back as all ones.
#[derive(Debug)]
pub struct SimulatedBus {
    devices: Vec<SimulatedDevice>,
    line: LineState,
    rom_buffer: Vec<u8>,
    selected: Option<usize>,
    read_queue: VecDeque<u8>,
    waited: Duration,
    model_time_ms: u64,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
            line: LineState::Idle,
            rom_buffer: Vec::new(),
            selected: None,
            read_queue: VecDeque::new(),
            waited: Duration::ZERO,
            model_time_ms: 0,
        }
    }

    pub fn add_device(
        &mut self,
        address: SensorAddress,
        base_celsius: f32,
        resolution: Resolution,
    ) {
        self.devices.push(SimulatedDevice {
            address,
            base_celsius,
            celsius: base_celsius,
            resolution,
            present: true,
            corrupt_next_crc: false,
            converted_raw: None,
        });
    }

    pub fn device_mut(&mut self, address: &SensorAddress) -> Option<&mut SimulatedDevice> {
        self.devices.iter_mut().find(|d| d.address == *address)
    }

    /// Advances the thermal model: each device drifts slowly around its
    /// base temperature with its own phase.
    pub fn advance_model(&mut self, dt_ms: u64) {
        self.model_time_ms += dt_ms;
        let t = self.model_time_ms as f32 * 0.001;
        for (index, device) in self.devices.iter_mut().enumerate() {
            device.celsius = device.base_celsius + (t * 0.05 + index as f32).sin() * 2.0;
        }
    }

    /// Total time callers have blocked in [`BusTransaction::wait`].
    pub fn total_waited(&self) -> Duration {
        self.waited
    }
}

impl Default for SimulatedBus {
    fn default() -> Self {
        Self::new()
    }
}

impl BusTransaction for SimulatedBus {
    fn reset(&mut self) -> bool {
        self.line = LineState::Idle;
        self.rom_buffer.clear();
        self.selected = None;
        self.read_queue.clear();
        self.devices.iter().any(|d| d.present)
    }

    fn write_byte(&mut self, byte: u8) {
        match self.line {
            LineState::Idle => {
                if byte == MATCH_ROM {
                    self.line = LineState::Addressing;
                    self.rom_buffer.clear();
                }
            }
            LineState::Addressing => {
                self.rom_buffer.push(byte);
                if self.rom_buffer.len() == SensorAddress::BYTES {
                    let mut raw = [0u8; SensorAddress::BYTES];
                    raw.copy_from_slice(&self.rom_buffer);
                    let address = SensorAddress::new(raw);
                    self.selected = self
                        .devices
                        .iter()
                        .position(|d| d.present && d.address == address);
                    self.line = LineState::Selected;
                }
            }
            LineState::Selected => {
                let Some(index) = self.selected else { return };
                if byte == Command::Convert.op_code() {
                    let raw = self.devices[index].current_raw();
                    self.devices[index].converted_raw = Some(raw);
                } else if byte == Command::ReadScratchpad.op_code() {
                    let scratchpad = self.devices[index].scratchpad();
                    self.read_queue.extend(scratchpad);
                }
            }
        }
    }

    fn read_byte(&mut self) -> u8 {
        // A released line with nobody driving it reads as ones.
        self.read_queue.pop_front().unwrap_or(0xFF)
    }

    fn wait(&mut self, duration: Duration) {
        self.waited += duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SensorDescriptor;
    use crate::sensor::{self, MeasureError, MAX_CONVERSION_TIME};

    fn address(serial: u8) -> SensorAddress {
        let mut raw = [0x28, 0xFF, serial, 0xAA, 0x85, 0x16, 0x04, 0x00];
        raw[7] = crc8(&raw[..7]);
        SensorAddress::new(raw)
    }

    fn descriptor(serial: u8) -> SensorDescriptor {
        SensorDescriptor {
            address: address(serial),
            telemetry_path: format!("propulsion.main.sensor{serial}"),
            display_label: format!("Sensor {serial}"),
        }
    }

    #[test]
    fn measure_reads_modelled_temperature() {
        let mut bus = SimulatedBus::new();
        bus.add_device(address(1), 25.0625, Resolution::Bits12);

        let t = sensor::measure(&mut bus, &descriptor(1)).unwrap();
        assert!((t.celsius() - 25.0625).abs() < 1e-4);
        assert_eq!(bus.total_waited(), MAX_CONVERSION_TIME);
    }

    #[test]
    fn low_resolution_device_truncates_through_full_stack() {
        let mut bus = SimulatedBus::new();
        bus.add_device(address(1), 25.0625, Resolution::Bits9);

        let t = sensor::measure(&mut bus, &descriptor(1)).unwrap();
        assert_eq!(t.resolution(), Resolution::Bits9);
        assert!((t.celsius() - 25.0).abs() < 1e-4);
    }

    #[test]
    fn all_resolutions_serve_crc_valid_scratchpads() {
        for resolution in [
            Resolution::Bits9,
            Resolution::Bits10,
            Resolution::Bits11,
            Resolution::Bits12,
        ] {
            let mut bus = SimulatedBus::new();
            bus.add_device(address(7), -10.125, resolution);
            let t = sensor::measure(&mut bus, &descriptor(7)).unwrap();
            assert_eq!(t.resolution(), resolution);
        }
    }

    #[test]
    fn empty_bus_reports_no_presence() {
        let mut bus = SimulatedBus::new();
        assert_eq!(
            sensor::measure(&mut bus, &descriptor(1)),
            Err(MeasureError::NoDevicePresent)
        );
    }

    #[test]
    fn unplugged_device_on_live_bus_fails_checksum() {
        // Another device keeps the presence pulse alive, but the
        // addressed one never drives the line: all-ones scratchpad.
        let mut bus = SimulatedBus::new();
        bus.add_device(address(1), 25.0, Resolution::Bits12);
        bus.add_device(address(2), 40.0, Resolution::Bits12);
        bus.device_mut(&address(2)).unwrap().set_present(false);

        assert!(matches!(
            sensor::measure(&mut bus, &descriptor(2)),
            Err(MeasureError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn corrupted_scratchpad_fails_checksum_once() {
        let mut bus = SimulatedBus::new();
        bus.add_device(address(1), 25.0, Resolution::Bits12);
        bus.device_mut(&address(1)).unwrap().corrupt_next_crc();

        assert!(matches!(
            sensor::measure(&mut bus, &descriptor(1)),
            Err(MeasureError::ChecksumMismatch { .. })
        ));
        // The corruption is one-shot; the next transaction is clean.
        assert!(sensor::measure(&mut bus, &descriptor(1)).is_ok());
    }

    #[test]
    fn thermal_model_drifts_around_base() {
        let mut bus = SimulatedBus::new();
        bus.add_device(address(1), 80.0, Resolution::Bits12);

        for _ in 0..100 {
            bus.advance_model(1000);
            let celsius = bus.device_mut(&address(1)).unwrap().celsius();
            assert!((celsius - 80.0).abs() <= 2.0 + 1e-3);
        }
    }
}
