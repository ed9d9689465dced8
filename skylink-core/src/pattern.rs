//! Stick pattern generators for calibration and link testing.
//!
//! Every pattern is a pure function of elapsed time, advanced in
//! 10 ms steps. [`run_pattern`] drives one into a [`SessionState`]
//! until cancelled and re-centres the sticks on the way out.
//!
//! | Pattern         | Motion                                                 |
//! |-----------------|--------------------------------------------------------|
//! | `center`        | All channels at mid                                    |
//! | `disarm`        | Throttle at minimum, others at mid                     |
//! | `circles`       | Both sticks trace full circles, 0.1 rad per step       |
//! | `throttle-up`   | Throttle ramps to max, holds, returns to mid, repeats  |
//! | `pitch-up`      | Same ramp on pitch                                     |
//! | `roll-right`    | Same ramp on roll                                      |
//! | `yaw-left`      | Yaw ramps to min                                       |
//! | `throttle-down` | Throttle ramps to min                                  |
//! | `throttle-drop` | Throttle falls slowly from mid to min, then holds      |

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::axis::{AXIS_MAX, AXIS_MID, AXIS_MIN, AxisSample, Channel, clamp_axis, clamp_axis_f64};
use crate::error::LinkError;
use crate::session_state::SessionState;

/// Pattern time base.
pub const PATTERN_STEP: Duration = Duration::from_millis(10);

/// Circle radius in axis units.
const CIRCLE_RADIUS: f64 = 16_000.0;
/// Angle advanced per step (radians).
const CIRCLE_STEP_RAD: f64 = 0.1;

/// Ramp increment per step.
const RAMP_STEP: i32 = 1_000;
/// Steps in one ramp: mid, mid±1000, … while short of the extreme.
const RAMP_STEPS: u64 = ((AXIS_MAX - AXIS_MID) as u64).div_ceil(RAMP_STEP as u64);
const RAMP_HOLD_MS: u64 = 500;
const RAMP_REST_MS: u64 = 500;

/// Throttle-drop decrement per step.
const DROP_STEP: i32 = 100;
const DROP_STEPS: u64 = ((AXIS_MID - AXIS_MIN) as u64).div_ceil(DROP_STEP as u64);

// ── Pattern ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pattern {
    #[default]
    Center,
    Disarm,
    Circles,
    ThrottleUp,
    PitchUp,
    RollRight,
    YawLeft,
    ThrottleDown,
    ThrottleDrop,
}

impl Pattern {
    pub const ALL: [Pattern; 9] = [
        Pattern::Center,
        Pattern::Disarm,
        Pattern::Circles,
        Pattern::ThrottleUp,
        Pattern::PitchUp,
        Pattern::RollRight,
        Pattern::YawLeft,
        Pattern::ThrottleDown,
        Pattern::ThrottleDrop,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Pattern::Center => "center",
            Pattern::Disarm => "disarm",
            Pattern::Circles => "circles",
            Pattern::ThrottleUp => "throttle-up",
            Pattern::PitchUp => "pitch-up",
            Pattern::RollRight => "roll-right",
            Pattern::YawLeft => "yaw-left",
            Pattern::ThrottleDown => "throttle-down",
            Pattern::ThrottleDrop => "throttle-drop",
        }
    }

    /// Stick positions `elapsed` after the pattern started.
    pub fn sample_at(self, elapsed: Duration) -> AxisSample {
        let step = (elapsed.as_millis() / PATTERN_STEP.as_millis()) as u64;
        match self {
            Pattern::Center => AxisSample::centered(),
            Pattern::Disarm => AxisSample::disarmed(),
            Pattern::Circles => circle_sample(step as f64 * CIRCLE_STEP_RAD),
            Pattern::ThrottleUp => ramp(Channel::Throttle, 1, elapsed),
            Pattern::PitchUp => ramp(Channel::Pitch, 1, elapsed),
            Pattern::RollRight => ramp(Channel::Roll, 1, elapsed),
            Pattern::YawLeft => ramp(Channel::Yaw, -1, elapsed),
            Pattern::ThrottleDown => ramp(Channel::Throttle, -1, elapsed),
            Pattern::ThrottleDrop => {
                let throttle = if step < DROP_STEPS {
                    AXIS_MID - DROP_STEP * step as i32
                } else {
                    AXIS_MIN
                };
                AxisSample::centered().with(Channel::Throttle, clamp_axis(throttle))
            }
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Pattern {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pattern::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let known: Vec<_> = Pattern::ALL.iter().map(|p| p.name()).collect();
                LinkError::Config(format!("unknown pattern `{s}` (expected one of {})", known.join(", ")))
            })
    }
}

// ── Generators ───────────────────────────────────────────────────

/// Both sticks on the circle at `angle`: the left stick (yaw, throttle)
/// counter-clockwise, the right stick (roll, pitch) clockwise.
pub fn circle_sample(angle: f64) -> AxisSample {
    let (sin, cos) = angle.sin_cos();
    let mid = AXIS_MID as f64;
    AxisSample {
        roll: clamp_axis_f64(mid + cos * CIRCLE_RADIUS),
        pitch: clamp_axis_f64(mid - sin * CIRCLE_RADIUS),
        yaw: clamp_axis_f64(mid + cos * CIRCLE_RADIUS),
        throttle: clamp_axis_f64(mid + sin * CIRCLE_RADIUS),
    }
}

/// Ramp `channel` from mid toward the extreme in `direction`, hold it,
/// rest at mid, repeat. Other channels stay centred.
fn ramp(channel: Channel, direction: i32, elapsed: Duration) -> AxisSample {
    let step_ms = PATTERN_STEP.as_millis() as u64;
    let ramp_ms = RAMP_STEPS * step_ms;
    let period_ms = ramp_ms + RAMP_HOLD_MS + RAMP_REST_MS;
    let t = elapsed.as_millis() as u64 % period_ms;

    let extreme = if direction > 0 { AXIS_MAX } else { AXIS_MIN };
    let value = if t < ramp_ms {
        AXIS_MID + direction * RAMP_STEP * (t / step_ms) as i32
    } else if t < ramp_ms + RAMP_HOLD_MS {
        extreme
    } else {
        AXIS_MID
    };
    AxisSample::centered().with(channel, clamp_axis(value))
}

// ── Driver ───────────────────────────────────────────────────────

/// Write `pattern` into `state` every `tick` until `cancel` fires, then
/// centre the sticks.
pub async fn run_pattern(
    pattern: Pattern,
    state: SessionState,
    tick: Duration,
    cancel: CancellationToken,
) {
    info!(%pattern, "pattern started");
    let mut ticker = tokio::time::interval(tick.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let started = tokio::time::Instant::now();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let sample = pattern.sample_at(started.elapsed());
        if sample != state.snapshot() {
            state.set(sample);
        }
    }

    state.center();
    info!(%pattern, "pattern stopped, sticks centred");
}

// ── Tests ────────────────────────────────────────────────────────
