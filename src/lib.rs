// src/lib.rs
//
// balancebridge: streams a host's motion sensor readings to a self-balancing
// robot controller over USB serial, and relays the controller's text back.

#[macro_use]
mod logging;

pub mod bridge;
pub mod display;
pub mod io;
pub mod sensors;
pub mod settings;
pub mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;

use crate::io::serial::{DeviceMatcher, SystemTransport, Transport};
use crate::io::ProtocolVariant;
use crate::sensors::SourceKind;

/// Command-line overrides on top of the settings file
#[derive(Debug, Default)]
pub struct RunOptions {
    pub config: Option<PathBuf>,
    pub protocol: Option<ProtocolVariant>,
    pub replay: Option<PathBuf>,
    pub list: bool,
    pub verbose: bool,
}

fn apply_overrides(settings: &mut settings::BridgeSettings, options: &RunOptions) {
    if let Some(protocol) = options.protocol {
        settings.protocol = protocol;
    }
    if let Some(path) = &options.replay {
        settings.sensor.source = SourceKind::Replay;
        settings.sensor.replay_path = Some(path.clone());
    }
}

/// One line per attached USB serial device, marking allow-listed ones
pub fn describe_devices(transport: &dyn Transport, matcher: &DeviceMatcher) -> Result<Vec<String>, String> {
    let devices = transport.enumerate()?;
    let chosen = matcher.find_match(&devices);
    Ok(devices
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let mark = if chosen == Some(i) { "*" } else { " " };
            let label = matcher
                .identify(d)
                .map(|id| format!("  [{}]", id.label))
                .unwrap_or_default();
            format!("{} {:<16} {}  {}{}", mark, d.port_name, d.usb_id(), d.display_line(), label)
        })
        .collect())
}

pub fn run(options: RunOptions) -> Result<(), String> {
    logging::set_verbose(options.verbose);

    let mut settings = settings::load_settings(options.config.as_deref())?;
    apply_overrides(&mut settings, &options);
    settings.validate()?;

    let transport: Arc<dyn Transport> = Arc::new(SystemTransport);

    if options.list {
        let lines = describe_devices(transport.as_ref(), &DeviceMatcher::new(settings.devices.clone()))?;
        if lines.is_empty() {
            println!("{}", display::NO_DEVICES);
        }
        for line in lines {
            println!("{}", line);
        }
        return Ok(());
    }

    if let Some(dir) = &settings.log_dir {
        if let Err(e) = logging::init_file_logging(dir) {
            tlog!("[logging] {}", e);
        }
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start runtime: {}", e))?;
    let result = runtime.block_on(bridge::run_bridge(transport, settings));

    logging::stop_file_logging();
    result.map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::serial::mock::{arduino_uno, usb_keyboard, MockTransport};

    #[test]
    fn test_overrides() {
        let mut settings = settings::BridgeSettings::default();
        let options = RunOptions {
            protocol: Some(ProtocolVariant::DerivedAngle),
            replay: Some(PathBuf::from("run.jsonl")),
            ..Default::default()
        };
        apply_overrides(&mut settings, &options);
        assert_eq!(settings.protocol, ProtocolVariant::DerivedAngle);
        assert_eq!(settings.sensor.source, SourceKind::Replay);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_describe_devices_marks_match() {
        let transport = MockTransport::new();
        transport.attach(usb_keyboard("/dev/ttyUSB0"));
        transport.attach(arduino_uno("/dev/ttyACM0"));
        let lines = describe_devices(&transport, &DeviceMatcher::default()).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("  /dev/ttyUSB0"));
        assert!(lines[1].starts_with("* /dev/ttyACM0"));
        assert!(lines[1].ends_with("[Arduino Uno]"));
    }
}
