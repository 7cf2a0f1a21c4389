// src/telemetry.rs
//
// Turns motion sensor readings into outgoing frames.
//
// Only the latest reading of each sensor is kept. There is no queue and no
// retry: a frame that fails to write is dropped and the next sensor event
// produces the next one.

use crate::io::{Cadence, FrameCodec, FrameSink, MotionSample, ProtocolVariant, SensorKind, SensorReading};

/// What one reading produced
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Frames written
    pub emitted: usize,
    /// Frames built but not written (disconnected, timeout, I/O error)
    pub dropped: usize,
}

/// Running totals since start-up
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchTotals {
    pub readings: u64,
    pub emitted: u64,
    pub dropped: u64,
}

pub struct TelemetryDispatcher {
    codec: &'static dyn FrameCodec,
    /// Zero until the first accelerometer reading
    latest: MotionSample,
    fresh_accel: bool,
    fresh_gyro: bool,
    totals: DispatchTotals,
}

impl TelemetryDispatcher {
    pub fn new(variant: ProtocolVariant) -> Self {
        Self {
            codec: variant.codec(),
            latest: MotionSample::default(),
            fresh_accel: false,
            fresh_gyro: false,
            totals: DispatchTotals::default(),
        }
    }

    pub fn latest(&self) -> &MotionSample {
        &self.latest
    }

    pub fn totals(&self) -> DispatchTotals {
        self.totals
    }

    /// Record one reading and, if the cadence says so, write the resulting
    /// frames to `sink`.
    pub fn dispatch<S: FrameSink + ?Sized>(&mut self, reading: SensorReading, sink: &mut S) -> DispatchReport {
        self.totals.readings += 1;
        match reading.kind {
            SensorKind::Accelerometer => {
                self.latest.accel = reading.values;
                self.fresh_accel = true;
            }
            SensorKind::Gyroscope => {
                self.latest.gyro = reading.values;
                self.fresh_gyro = true;
            }
        }

        let ready = match self.codec.cadence() {
            Cadence::AccumulateAndPair => reading.kind == SensorKind::Gyroscope,
            Cadence::FreshPair => self.fresh_accel && self.fresh_gyro,
        };
        if !ready {
            return DispatchReport::default();
        }
        self.fresh_accel = false;
        self.fresh_gyro = false;

        let mut report = DispatchReport::default();
        for frame in self.codec.frames(&self.latest) {
            match sink.send_frame(&frame) {
                Ok(()) => report.emitted += 1,
                Err(e) => {
                    if !e.is_ignorable() {
                        tlog!("[telemetry] Unexpected write error: {}", e);
                    }
                    report.dropped += 1;
                }
            }
        }

        self.totals.emitted += report.emitted as u64;
        self.totals.dropped += report.dropped as u64;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{Frame, WriteError};

    /// Records frames; optionally fails every write
    #[derive(Default)]
    struct RecordingSink {
        frames: Vec<Frame>,
        fail: bool,
    }

    impl FrameSink for RecordingSink {
        fn send_frame(&mut self, frame: &Frame) -> Result<(), WriteError> {
            if self.fail {
                return Err(WriteError::TimedOut);
            }
            self.frames.push(frame.clone());
            Ok(())
        }
    }

    #[test]
    fn test_accel_alone_emits_nothing() {
        let mut dispatcher = TelemetryDispatcher::new(ProtocolVariant::CombinedBinary);
        let mut sink = RecordingSink::default();
        let report = dispatcher.dispatch(SensorReading::accel([0.5, 1.0, -0.25]), &mut sink);
        assert_eq!(report, DispatchReport::default());
        assert!(sink.frames.is_empty());
    }

    #[test]
    fn test_accel_then_gyro_emits_one_combined_frame() {
        let mut dispatcher = TelemetryDispatcher::new(ProtocolVariant::CombinedBinary);
        let mut sink = RecordingSink::default();
        dispatcher.dispatch(SensorReading::accel([0.5, 1.0, -0.25]), &mut sink);
        let report = dispatcher.dispatch(SensorReading::gyro([2.0, -1.5, 0.125]), &mut sink);

        assert_eq!(report.emitted, 1);
        assert_eq!(
            sink.frames,
            vec![Frame::CombinedBinary {
                accel: [500, 1000, -250],
                gyro: [2000, -1500, 125],
            }]
        );
    }

    #[test]
    fn test_gyro_without_accel_uses_zero_vector() {
        let mut dispatcher = TelemetryDispatcher::new(ProtocolVariant::PitchBinary);
        let mut sink = RecordingSink::default();
        dispatcher.dispatch(SensorReading::gyro([0.0, 0.75, 0.0]), &mut sink);
        assert_eq!(dispatcher.latest().accel, [0.0; 3]);
        assert_eq!(
            sink.frames,
            vec![Frame::AxisBinary {
                axis: crate::io::Axis::Y,
                accel: 0,
                gyro: 750,
            }]
        );
    }

    #[test]
    fn test_every_gyro_reuses_last_accel() {
        let mut dispatcher = TelemetryDispatcher::new(ProtocolVariant::PitchBinary);
        let mut sink = RecordingSink::default();
        dispatcher.dispatch(SensorReading::accel([0.0, 0.25, 0.0]), &mut sink);
        dispatcher.dispatch(SensorReading::gyro([0.0, 1.0, 0.0]), &mut sink);
        dispatcher.dispatch(SensorReading::gyro([0.0, 2.0, 0.0]), &mut sink);
        let accels: Vec<i32> = sink
            .frames
            .iter()
            .map(|f| match f {
                Frame::AxisBinary { accel, .. } => *accel,
                other => panic!("unexpected frame {:?}", other),
            })
            .collect();
        assert_eq!(accels, vec![250, 250]);
    }

    #[test]
    fn test_per_axis_variant_writes_all_axes_in_order() {
        let mut dispatcher = TelemetryDispatcher::new(ProtocolVariant::PerAxisBinary);
        let mut sink = RecordingSink::default();
        let report = dispatcher.dispatch(SensorReading::gyro([1.0, 2.0, 3.0]), &mut sink);
        assert_eq!(report.emitted, 3);
        let tags: Vec<u8> = sink.frames.iter().map(Frame::tag).collect();
        assert_eq!(tags, b"UVW".to_vec());
    }

    #[test]
    fn test_fresh_pair_waits_for_both() {
        let mut dispatcher = TelemetryDispatcher::new(ProtocolVariant::DerivedAngle);
        let mut sink = RecordingSink::default();

        // Gyro first, then accel completes the pair
        dispatcher.dispatch(SensorReading::gyro([0.5, 0.0, 0.0]), &mut sink);
        assert!(sink.frames.is_empty());
        dispatcher.dispatch(SensorReading::accel([0.0, 1.0, 0.0]), &mut sink);
        assert_eq!(sink.frames.len(), 1);

        // A second gyro alone is not a fresh pair
        dispatcher.dispatch(SensorReading::gyro([0.25, 0.0, 0.0]), &mut sink);
        assert_eq!(sink.frames.len(), 1);
        dispatcher.dispatch(SensorReading::accel([0.0, 1.0, 0.0]), &mut sink);
        assert_eq!(sink.frames.len(), 2);
        assert_eq!(
            sink.frames[1],
            Frame::TiltAngle {
                centi_degrees: 0,
                rate: 250,
            }
        );
    }

    #[test]
    fn test_failed_writes_are_dropped() {
        let mut dispatcher = TelemetryDispatcher::new(ProtocolVariant::HumanReadable);
        let mut sink = RecordingSink {
            fail: true,
            ..Default::default()
        };
        let report = dispatcher.dispatch(SensorReading::gyro([1.0, 1.0, 1.0]), &mut sink);
        assert_eq!(report, DispatchReport { emitted: 0, dropped: 3 });

        // Next event goes through once the sink recovers; nothing is replayed
        sink.fail = false;
        let report = dispatcher.dispatch(SensorReading::gyro([1.0, 1.0, 1.0]), &mut sink);
        assert_eq!(report.emitted, 3);
        assert_eq!(sink.frames.len(), 3);
        assert_eq!(
            dispatcher.totals(),
            DispatchTotals {
                readings: 2,
                emitted: 3,
                dropped: 3,
            }
        );
    }
}
