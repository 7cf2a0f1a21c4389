// src/bridge.rs
//
// Event loop tying the pieces together.
//
// Every producer (device watcher, sensor source, console commands, Ctrl-C and
// the serial read loop) sends a BridgeEvent into one channel. The loop owns
// the ConnectionSupervisor, the TelemetryDispatcher and the display, so none
// of them need locking; writes happen synchronously on this task, each bounded
// by the port write timeout.

use std::ops::ControlFlow;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::display::{ConsoleDisplay, Display};
use crate::io::serial::{DeviceMatcher, Transport};
use crate::io::{Command, ConnectionSupervisor, FrameSink, SensorReading, Transition};
use crate::sensors::{MotionSource, ReplaySource, SimulatedImu, SourceKind};
use crate::settings::BridgeSettings;
use crate::telemetry::{DispatchTotals, TelemetryDispatcher};

#[derive(Clone, Debug, PartialEq)]
pub enum BridgeEvent {
    /// Something was attached or detached
    DeviceSetChanged,
    Sensor(SensorReading),
    /// From the command surface
    Command(Command),
    /// Raw chunk from the read loop
    Received(Vec<u8>),
    Shutdown,
}

pub struct Bridge {
    supervisor: ConnectionSupervisor,
    dispatcher: TelemetryDispatcher,
    display: Box<dyn Display>,
}

impl Bridge {
    /// `events` is where the read loop posts inbound chunks
    pub fn new(
        transport: Arc<dyn Transport>,
        settings: &BridgeSettings,
        display: Box<dyn Display>,
        events: UnboundedSender<BridgeEvent>,
    ) -> Self {
        let supervisor = ConnectionSupervisor::new(
            transport,
            DeviceMatcher::new(settings.devices.clone()),
            settings.serial.to_serial_config(),
            Arc::new(move |chunk: &[u8]| {
                // Receiver gone means we are shutting down
                let _ = events.send(BridgeEvent::Received(chunk.to_vec()));
            }),
        );
        Self {
            supervisor,
            dispatcher: TelemetryDispatcher::new(settings.protocol),
            display,
        }
    }

    pub fn supervisor(&self) -> &ConnectionSupervisor {
        &self.supervisor
    }

    /// Handle one event. `Break` once the bridge should stop.
    pub fn handle(&mut self, event: BridgeEvent) -> ControlFlow<()> {
        match event {
            BridgeEvent::DeviceSetChanged => {
                let transition = self.supervisor.handle_device_set_changed();
                if transition != Transition::Unchanged {
                    tlog!("[bridge] {:?}", transition);
                }
                self.display.show_devices(self.supervisor.devices());
            }
            BridgeEvent::Sensor(reading) => {
                self.dispatcher.dispatch(reading, &mut self.supervisor);
            }
            BridgeEvent::Command(command) => match self.supervisor.writer() {
                Some(mut writer) => match writer.send_frame(&command.into()) {
                    Ok(()) => tlog!("[bridge] Sent {} to {}", command, writer.port_name()),
                    Err(e) => tlog!("[bridge] {} dropped: {}", command, e),
                },
                None => tlog!("[bridge] Not connected, {} not sent", command),
            },
            BridgeEvent::Received(bytes) => {
                vlog!("[bridge] <- {}", hex::encode(&bytes));
                self.display.append_received(&bytes);
            }
            BridgeEvent::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    /// Process events until Shutdown (or every sender is gone), then close
    /// the link.
    pub async fn run(mut self, mut events: UnboundedReceiver<BridgeEvent>) -> DispatchTotals {
        while let Some(event) = events.recv().await {
            if self.handle(event).is_break() {
                break;
            }
        }
        self.shutdown()
    }

    fn shutdown(&mut self) -> DispatchTotals {
        self.supervisor.teardown();
        let totals = self.dispatcher.totals();
        tlog!(
            "[bridge] Stopped: {} readings, {} frames written, {} dropped",
            totals.readings,
            totals.emitted,
            totals.dropped
        );
        totals
    }
}

// ============================================================================
// Producers
// ============================================================================

/// Identity of the attached set, for change detection
fn device_set_key(transport: &dyn Transport) -> Option<Vec<(String, u16, u16)>> {
    transport.enumerate().ok().map(|devices| {
        devices
            .into_iter()
            .map(|d| (d.port_name, d.vendor_id, d.product_id))
            .collect()
    })
}

/// Poll enumeration and post DeviceSetChanged whenever the set differs,
/// plus once at start-up.
pub fn spawn_device_watcher(
    transport: Arc<dyn Transport>,
    period: Duration,
    tx: UnboundedSender<BridgeEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last: Option<Vec<(String, u16, u16)>> = None;
        let mut first = true;

        loop {
            ticker.tick().await;
            let current = device_set_key(transport.as_ref());
            // A failed enumeration is not a change; the next tick retries
            if current.is_none() && !first {
                continue;
            }
            if first || current != last {
                first = false;
                last = current;
                if tx.send(BridgeEvent::DeviceSetChanged).is_err() {
                    break;
                }
            }
        }
    })
}

pub fn spawn_sensor_task(mut source: Box<dyn MotionSource>, tx: UnboundedSender<BridgeEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        tlog!("[sensors] Streaming from {}", source.name());
        loop {
            match source.next_reading().await {
                Ok(Some(reading)) => {
                    if tx.send(BridgeEvent::Sensor(reading)).is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    tlog!("[sensors] {} exhausted", source.name());
                    break;
                }
                Err(e) => {
                    tlog!("[sensors] {} failed: {}", source.name(), e);
                    break;
                }
            }
        }
    })
}

/// Map one console line to an event. `None` for blank lines.
pub fn parse_console_line(line: &str) -> Option<Result<BridgeEvent, String>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
        return Some(Ok(BridgeEvent::Shutdown));
    }
    Some(Command::from_str(line).map(BridgeEvent::Command))
}

/// Console command surface: `high`, `low`, `read`, `quit`
pub fn spawn_command_reader(tx: UnboundedSender<BridgeEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match parse_console_line(&line) {
                    Some(Ok(event)) => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => tlog!("[bridge] {}", e),
                    None => {}
                },
                // stdin closed: keep running until Ctrl-C
                Ok(None) => break,
                Err(e) => {
                    tlog!("[bridge] stdin read failed: {}", e);
                    break;
                }
            }
        }
    })
}

pub fn spawn_ctrl_c(tx: UnboundedSender<BridgeEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tlog!("[bridge] Ctrl-C");
            let _ = tx.send(BridgeEvent::Shutdown);
        }
    })
}

fn open_source(settings: &BridgeSettings) -> Result<Box<dyn MotionSource>, String> {
    match settings.sensor.source {
        SourceKind::Simulated => Ok(Box::new(SimulatedImu::new(settings.sensor.rate_hz))),
        SourceKind::Replay => {
            let path = settings
                .sensor
                .replay_path
                .as_deref()
                .ok_or_else(|| "sensor.replay_path is not set".to_string())?;
            Ok(Box::new(ReplaySource::from_path(path, settings.sensor.rate_hz)?))
        }
    }
}

/// Run the bridge until Shutdown. Must be called inside a tokio runtime.
pub async fn run_bridge(transport: Arc<dyn Transport>, settings: BridgeSettings) -> Result<DispatchTotals, String> {
    let (tx, rx) = mpsc::unbounded_channel();

    let source = open_source(&settings)?;
    tlog!(
        "[bridge] Protocol {}, serial {}, {} allow-listed device(s)",
        settings.protocol,
        settings.serial.to_serial_config().summary(),
        settings.devices.len()
    );

    let bridge = Bridge::new(
        transport.clone(),
        &settings,
        Box::new(ConsoleDisplay::stdout()),
        tx.clone(),
    );

    let producers = [
        spawn_device_watcher(transport, Duration::from_millis(settings.device_poll_ms), tx.clone()),
        spawn_sensor_task(source, tx.clone()),
        spawn_command_reader(tx.clone()),
        spawn_ctrl_c(tx),
    ];

    let totals = bridge.run(rx).await;

    // Unsubscribe from everything before returning
    for task in producers {
        task.abort();
    }
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::serial::mock::{arduino_uno, MockTransport};
    use crate::io::serial::SerialDeviceDescriptor;
    use crate::io::ConnectionState;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct RecordingDisplay {
        device_lists: Arc<Mutex<Vec<String>>>,
        received: Arc<Mutex<Vec<u8>>>,
    }

    impl Display for RecordingDisplay {
        fn show_devices(&mut self, devices: &[SerialDeviceDescriptor]) {
            self.device_lists
                .lock()
                .unwrap()
                .push(crate::display::format_device_list(devices));
        }

        fn append_received(&mut self, bytes: &[u8]) {
            self.received.lock().unwrap().extend_from_slice(bytes);
        }
    }

    fn bridge(transport: &MockTransport, display: &RecordingDisplay) -> (Bridge, UnboundedReceiver<BridgeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let bridge = Bridge::new(
            Arc::new(transport.clone()),
            &BridgeSettings::default(),
            Box::new(display.clone()),
            tx,
        );
        (bridge, rx)
    }

    #[test]
    fn test_parse_console_line() {
        assert_eq!(parse_console_line("  high "), Some(Ok(BridgeEvent::Command(Command::High))));
        assert_eq!(parse_console_line("LOW"), Some(Ok(BridgeEvent::Command(Command::Low))));
        assert_eq!(parse_console_line("read"), Some(Ok(BridgeEvent::Command(Command::Read))));
        assert_eq!(parse_console_line("quit"), Some(Ok(BridgeEvent::Shutdown)));
        assert_eq!(parse_console_line(""), None);
        assert!(matches!(parse_console_line("blink"), Some(Err(_))));
    }

    #[test]
    fn test_device_list_shown_on_every_change() {
        let transport = MockTransport::new();
        let display = RecordingDisplay::default();
        let (mut bridge, _rx) = bridge(&transport, &display);

        bridge.handle(BridgeEvent::DeviceSetChanged);
        transport.attach(arduino_uno("/dev/ttyACM0"));
        bridge.handle(BridgeEvent::DeviceSetChanged);

        assert_eq!(
            *display.device_lists.lock().unwrap(),
            vec![
                "No devices found".to_string(),
                "Arduino (www.arduino.cc) : Arduino Uno".to_string(),
            ]
        );
        assert_eq!(
            bridge.supervisor().state(),
            ConnectionState::Connected("/dev/ttyACM0".to_string())
        );
    }

    #[test]
    fn test_received_goes_to_display() {
        let transport = MockTransport::new();
        let display = RecordingDisplay::default();
        let (mut bridge, _rx) = bridge(&transport, &display);
        bridge.handle(BridgeEvent::Received(b"LED ON\r\n".to_vec()));
        assert_eq!(display.received.lock().unwrap().as_slice(), b"LED ON\r\n");
    }

    #[test]
    fn test_command_while_disconnected_is_dropped() {
        let transport = MockTransport::new();
        let display = RecordingDisplay::default();
        let (mut bridge, _rx) = bridge(&transport, &display);
        assert!(bridge.handle(BridgeEvent::Command(Command::High)).is_continue());
        assert!(transport.writes().is_empty());
    }

    #[tokio::test]
    async fn test_event_loop_end_to_end() {
        let transport = MockTransport::new();
        transport.attach(arduino_uno("/dev/ttyACM0"));
        let display = RecordingDisplay::default();
        let (tx, rx) = mpsc::unbounded_channel();
        let bridge = Bridge::new(
            Arc::new(transport.clone()),
            &BridgeSettings::default(),
            Box::new(display.clone()),
            tx.clone(),
        );

        for event in [
            BridgeEvent::DeviceSetChanged,
            BridgeEvent::Sensor(SensorReading::accel([0.0, 0.5, 0.0])),
            BridgeEvent::Sensor(SensorReading::gyro([0.0, -0.25, 0.0])),
            BridgeEvent::Command(Command::High),
            BridgeEvent::Shutdown,
            // Never processed
            BridgeEvent::Command(Command::Low),
        ] {
            tx.send(event).unwrap();
        }

        let totals = bridge.run(rx).await;
        assert_eq!(totals.emitted, 1);
        assert_eq!(
            transport.writes(),
            vec![
                b"READ\n".to_vec(),
                vec![b'V', 0x01, 0xF4, 0x80, 0xFA, b'\n'],
                b"HIGH\n".to_vec(),
            ]
        );
        // Shutdown closed the link
        assert_eq!(transport.ready_line(), Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_watcher_reports_changes_only() {
        let transport = MockTransport::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let watcher = spawn_device_watcher(Arc::new(transport.clone()), Duration::from_millis(100), tx);

        // Start-up notification
        assert_eq!(rx.recv().await, Some(BridgeEvent::DeviceSetChanged));

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert!(rx.try_recv().is_err());

        transport.attach(arduino_uno("/dev/ttyACM0"));
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(rx.try_recv(), Ok(BridgeEvent::DeviceSetChanged));
        assert!(rx.try_recv().is_err());

        watcher.abort();
    }
}
