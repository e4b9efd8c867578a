use crate::sensor::Temperature;
use tracing::info;

/// Local display collaborator. Rendering is out of scope; the cycle
/// only pushes the labelled reading at it. The panel shows Fahrenheit,
/// a display-only derivation that never touches the transmitted value.
pub trait TemperatureDisplay {
    fn show_reading(&mut self, label: &str, temperature: &Temperature);
}

/// Display stand-in that renders readings to the log, the way the
/// node's LCD would show them.
#[derive(Debug, Default)]
pub struct LogDisplay;

impl TemperatureDisplay for LogDisplay {
    fn show_reading(&mut self, label: &str, temperature: &Temperature) {
        info!(
            label,
            fahrenheit = format_args!("{:.1}", temperature.fahrenheit()),
            "display update"
        );
    }
}

/// Headless display for benches and tests.
#[derive(Debug, Default)]
pub struct NullDisplay;

impl TemperatureDisplay for NullDisplay {
    fn show_reading(&mut self, _label: &str, _temperature: &Temperature) {}
}
