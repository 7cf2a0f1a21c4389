// src/sensors.rs
//
// Motion sensor sources.
//
// A desktop host has no IMU of its own, so readings come either from a
// simulated rocking robot or from a JSON Lines recording. Both deliver
// accelerometer (g) and angular-rate (deg/s) readings as 3-axis vectors at a
// fixed nominal rate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::f32::consts::PI;
use std::path::Path;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};

use crate::io::{IoError, SensorReading};

/// Where readings come from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Simulated,
    Replay,
}

#[async_trait]
pub trait MotionSource: Send {
    fn name(&self) -> &str;

    /// Wait for the next reading. `None` once the source is exhausted.
    async fn next_reading(&mut self) -> Result<Option<SensorReading>, IoError>;
}

fn tick_interval(rate_hz: u32) -> Interval {
    // tokio panics on a zero period
    let period = Duration::from_micros((1_000_000 / u64::from(rate_hz.max(1))).max(1));
    let mut ticker = interval(period);
    // Late ticks are skipped, not bunched: stale readings are worthless
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

// ============================================================================
// Simulated IMU
// ============================================================================

/// Robot rocking about the roll axis.
///
/// Every tick yields an accelerometer reading followed by an angular-rate
/// reading, the order the platform sensor stack delivers them in.
pub struct SimulatedImu {
    ticker: Interval,
    period_s: f32,
    tick: u64,
    /// Peak tilt, radians
    amplitude: f32,
    /// Rocking frequency, Hz
    frequency: f32,
    pending: Option<SensorReading>,
}

impl SimulatedImu {
    pub fn new(rate_hz: u32) -> Self {
        Self {
            ticker: tick_interval(rate_hz),
            period_s: 1.0 / rate_hz.max(1) as f32,
            tick: 0,
            amplitude: 0.2,
            frequency: 0.5,
            pending: None,
        }
    }

    /// Accelerometer and gyro readings at time `t` seconds
    fn sample_at(&self, t: f32) -> (SensorReading, SensorReading) {
        let omega = 2.0 * PI * self.frequency;
        let tilt = self.amplitude * (omega * t).sin();
        let tilt_rate = self.amplitude * omega * (omega * t).cos();
        (
            SensorReading::accel([0.0, tilt.cos(), tilt.sin()]),
            SensorReading::gyro([tilt_rate.to_degrees(), 0.0, 0.0]),
        )
    }
}

#[async_trait]
impl MotionSource for SimulatedImu {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn next_reading(&mut self) -> Result<Option<SensorReading>, IoError> {
        if let Some(reading) = self.pending.take() {
            return Ok(Some(reading));
        }
        self.ticker.tick().await;
        let t = self.tick as f32 * self.period_s;
        self.tick += 1;
        let (accel, gyro) = self.sample_at(t);
        self.pending = Some(gyro);
        Ok(Some(accel))
    }
}

// ============================================================================
// Replay
// ============================================================================

/// Readings recorded one JSON object per line, e.g.
/// `{"kind":"accelerometer","values":[0.0,0.98,0.05]}`. Blank lines and lines
/// starting with `#` are skipped. Replayed at the configured rate.
pub struct ReplaySource {
    name: String,
    ticker: Interval,
    readings: VecDeque<SensorReading>,
}

impl ReplaySource {
    pub fn from_path(path: &Path, rate_hz: u32) -> Result<Self, IoError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            IoError::configuration(format!("Failed to read replay file {}: {}", path.display(), e))
        })?;
        let readings = Self::parse(&text)?;
        tlog!(
            "[sensors] Loaded {} readings from {}",
            readings.len(),
            path.display()
        );
        Ok(Self {
            name: path.display().to_string(),
            ticker: tick_interval(rate_hz),
            readings,
        })
    }

    pub fn parse(text: &str) -> Result<VecDeque<SensorReading>, IoError> {
        text.lines()
            .enumerate()
            .filter(|(_, line)| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with('#')
            })
            .map(|(i, line)| {
                serde_json::from_str::<SensorReading>(line)
                    .map_err(|e| IoError::protocol("replay", format!("line {}: {}", i + 1, e)))
            })
            .collect()
    }

    pub fn remaining(&self) -> usize {
        self.readings.len()
    }
}

#[async_trait]
impl MotionSource for ReplaySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_reading(&mut self) -> Result<Option<SensorReading>, IoError> {
        if self.readings.is_empty() {
            return Ok(None);
        }
        self.ticker.tick().await;
        Ok(self.readings.pop_front())
    }
}
