//! Stick axis model shared by both ends of the link.
//!
//! Every channel carries a signed integer in the closed range
//! [`AXIS_MIN`]..=[`AXIS_MAX`] with a neutral [`AXIS_MID`]. Values are
//! clamped at the final stage before they are encoded or applied to a
//! device; intermediate arithmetic (pattern offsets, input deltas) may
//! overshoot freely.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Constants ────────────────────────────────────────────────────

/// Lowest representable channel value.
pub const AXIS_MIN: i32 = 1;
/// Highest representable channel value.
pub const AXIS_MAX: i32 = 32768;
/// Neutral (centred stick) channel value.
pub const AXIS_MID: i32 = 16384;

/// Clamp `value` into `[AXIS_MIN, AXIS_MAX]`.
pub const fn clamp_axis(value: i32) -> i32 {
    if value < AXIS_MIN {
        AXIS_MIN
    } else if value > AXIS_MAX {
        AXIS_MAX
    } else {
        value
    }
}

/// Clamp a floating-point intermediate (pattern arithmetic) and truncate.
pub fn clamp_axis_f64(value: f64) -> i32 {
    value.clamp(AXIS_MIN as f64, AXIS_MAX as f64) as i32
}

// ── Channel ──────────────────────────────────────────────────────

/// One of the four logical control dimensions, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Roll,
    Pitch,
    Yaw,
    Throttle,
}

impl Channel {
    /// All channels in wire order.
    pub const ALL: [Channel; 4] = [
        Channel::Roll,
        Channel::Pitch,
        Channel::Yaw,
        Channel::Throttle,
    ];

    /// Position of this channel inside a control packet.
    pub const fn index(self) -> usize {
        match self {
            Channel::Roll => 0,
            Channel::Pitch => 1,
            Channel::Yaw => 2,
            Channel::Throttle => 3,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Channel::Roll => "roll",
            Channel::Pitch => "pitch",
            Channel::Yaw => "yaw",
            Channel::Throttle => "throttle",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── AxisSample ───────────────────────────────────────────────────

/// A complete snapshot of all four stick channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AxisSample {
    pub roll: i32,
    pub pitch: i32,
    pub yaw: i32,
    pub throttle: i32,
}

impl AxisSample {
    pub const fn new(roll: i32, pitch: i32, yaw: i32, throttle: i32) -> Self {
        Self {
            roll,
            pitch,
            yaw,
            throttle,
        }
    }

    /// Every channel at [`AXIS_MID`] (calibration centre).
    pub const fn centered() -> Self {
        Self::new(AXIS_MID, AXIS_MID, AXIS_MID, AXIS_MID)
    }

    /// Sticks centred with throttle fully down.
    pub const fn disarmed() -> Self {
        Self::new(AXIS_MID, AXIS_MID, AXIS_MID, AXIS_MIN)
    }

    /// Value of a single channel.
    pub const fn get(&self, channel: Channel) -> i32 {
        match channel {
            Channel::Roll => self.roll,
            Channel::Pitch => self.pitch,
            Channel::Yaw => self.yaw,
            Channel::Throttle => self.throttle,
        }
    }

    /// Overwrite a single channel (unclamped).
    pub fn set(&mut self, channel: Channel, value: i32) {
        match channel {
            Channel::Roll => self.roll = value,
            Channel::Pitch => self.pitch = value,
            Channel::Yaw => self.yaw = value,
            Channel::Throttle => self.throttle = value,
        }
    }

    /// Copy of `self` with one channel replaced.
    pub fn with(mut self, channel: Channel, value: i32) -> Self {
        self.set(channel, value);
        self
    }

    /// Copy of `self` with every channel clamped into range.
    pub const fn clamped(&self) -> Self {
        Self::new(
            clamp_axis(self.roll),
            clamp_axis(self.pitch),
            clamp_axis(self.yaw),
            clamp_axis(self.throttle),
        )
    }

    /// Whether every channel already lies within range.
    pub const fn in_range(&self) -> bool {
        let s = self.clamped();
        s.roll == self.roll
            && s.pitch == self.pitch
            && s.yaw == self.yaw
            && s.throttle == self.throttle
    }

    /// Channels as an array in wire order.
    pub const fn to_array(&self) -> [i32; 4] {
        [self.roll, self.pitch, self.yaw, self.throttle]
    }

    pub const fn from_array(values: [i32; 4]) -> Self {
        Self::new(values[0], values[1], values[2], values[3])
    }
}

impl Default for AxisSample {
    fn default() -> Self {
        Self::centered()
    }
}

impl fmt::Display for AxisSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "R={} P={} Y={} T={}",
            self.roll, self.pitch, self.yaw, self.throttle
        )
    }
}

// ── Tests ────────────────────────────────────────────────────────
