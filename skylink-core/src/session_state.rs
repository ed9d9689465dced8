//! Client-side "last known" stick state.
//!
//! A [`SessionState`] is a cheap, cloneable handle to a mutex-guarded
//! [`AxisSample`]. Pattern generators and input handlers write it; the
//! control sender reads it once per tick. Each write bumps a generation
//! counter so the sender can tell fresh state from an idle stick.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::axis::{AxisSample, Channel, clamp_axis};

#[derive(Debug)]
struct Inner {
    sample: AxisSample,
    generation: u64,
}

/// Shared, lock-protected stick snapshot.
#[derive(Debug, Clone)]
pub struct SessionState {
    inner: Arc<Mutex<Inner>>,
}

impl SessionState {
    /// Create a state initialised to `initial` (clamped).
    pub fn new(initial: AxisSample) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                sample: initial.clamped(),
                generation: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Writers never leave the sample half-updated, so a poisoned lock
        // still holds a usable value.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current sample.
    pub fn snapshot(&self) -> AxisSample {
        self.lock().sample
    }

    /// Current sample together with its generation.
    pub fn snapshot_with_generation(&self) -> (AxisSample, u64) {
        let inner = self.lock();
        (inner.sample, inner.generation)
    }

    /// Generation counter; increases on every write.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Replace the whole sample. Values are clamped.
    pub fn set(&self, sample: AxisSample) {
        let mut inner = self.lock();
        inner.sample = sample.clamped();
        inner.generation = inner.generation.wrapping_add(1);
    }

    /// Replace a single channel. The value is clamped.
    pub fn set_axis(&self, channel: Channel, value: i32) {
        let mut inner = self.lock();
        inner.sample.set(channel, clamp_axis(value));
        inner.generation = inner.generation.wrapping_add(1);
    }

    /// Apply `f` to the sample under the lock, then clamp the result.
    pub fn update(&self, f: impl FnOnce(&mut AxisSample)) {
        let mut inner = self.lock();
        f(&mut inner.sample);
        inner.sample = inner.sample.clamped();
        inner.generation = inner.generation.wrapping_add(1);
    }

    /// Centre every channel, throttle included.
    pub fn center(&self) {
        self.set(AxisSample::centered());
    }

    /// Centre the sticks and pull the throttle fully down.
    pub fn disarm(&self) {
        self.set(AxisSample::disarmed());
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(AxisSample::centered())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::{AXIS_MAX, AXIS_MID, AXIS_MIN};

    #[test]
    fn writes_are_clamped() {
        let state = SessionState::default();
        state.set_axis(Channel::Throttle, 90_000);
        assert_eq!(state.snapshot().throttle, AXIS_MAX);

        state.set(AxisSample::new(-1, 0, AXIS_MID, 5));
        assert_eq!(state.snapshot(), AxisSample::new(AXIS_MIN, AXIS_MIN, AXIS_MID, 5));

        state.update(|s| s.yaw += 1_000_000);
        assert_eq!(state.snapshot().yaw, AXIS_MAX);
    }

    #[test]
    fn generation_tracks_writes() {
        let state = SessionState::default();
        assert_eq!(state.generation(), 0);
        state.center();
        state.set_axis(Channel::Roll, 10);
        let (sample, generation) = state.snapshot_with_generation();
        assert_eq!(generation, 2);
        assert_eq!(sample.roll, 10);
    }

    #[test]
    fn clones_share_the_same_sample() {
        let a = SessionState::default();
        let b = a.clone();
        b.disarm();
        assert_eq!(a.snapshot(), AxisSample::disarmed());
    }

    #[test]
    fn concurrent_writers_and_reader() {
        let state = SessionState::default();
        let writers: Vec<_> = (0..4)
            .map(|i| {
                let s = state.clone();
                std::thread::spawn(move || {
                    for v in 0..1000 {
                        s.set_axis(Channel::ALL[i], v * 40);
                    }
                })
            })
            .collect();
        for _ in 0..1000 {
            assert!(state.snapshot().in_range());
        }
        for w in writers {
            w.join().unwrap();
        }
        assert_eq!(state.generation(), 4000);
    }
}
