// src/io/frames/command.rs
//
// Bare text command frames understood by the controller sketch:
//   HIGH\n   drive the on-board indicator LED high
//   LOW\n    drive it low
//   READ\n   ask the controller for a diagnostic readback

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    High,
    Low,
    Read,
}

impl Command {
    pub const ALL: [Command; 3] = [Command::High, Command::Low, Command::Read];

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::High => "HIGH",
            Command::Low => "LOW",
            Command::Read => "READ",
        }
    }

    /// First byte on the wire; unique among command and telemetry tags
    pub fn tag(&self) -> u8 {
        self.as_str().as_bytes()[0]
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.as_str().len() + 1);
        out.extend_from_slice(self.as_str().as_bytes());
        out.push(b'\n');
        out
    }

    /// Match a frame body (no terminator) exactly
    pub fn from_wire(body: &[u8]) -> Option<Command> {
        Command::ALL.into_iter().find(|c| c.as_str().as_bytes() == body)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses console input: case-insensitive, surrounding whitespace ignored
impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HIGH" => Ok(Command::High),
            "LOW" => Ok(Command::Low),
            "READ" => Ok(Command::Read),
            other => Err(format!("Unknown command: {:?} (expected high, low or read)", other)),
        }
    }
}
