//! Frame timing utilities

use std::time::{Duration, Instant};

/// Per-frame timing context carried by traversals and load requests.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrameStamp {
    pub frame_number: u64,
    /// Seconds since the clock started. Monotonically increasing.
    pub reference_time: f64,
}

impl FrameStamp {
    pub fn new(frame_number: u64, reference_time: f64) -> Self {
        Self {
            frame_number,
            reference_time,
        }
    }
}

/// Produces one `FrameStamp` per frame
pub struct FrameClock {
    start: Instant,
    last_frame: Instant,
    delta: Duration,
    frame_number: u64,
    reference_time: f64,
}

impl FrameClock {
    /// Create a new frame clock starting at frame 0, time 0.0
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_frame: now,
            delta: Duration::ZERO,
            frame_number: 0,
            reference_time: 0.0,
        }
    }

    /// Call once per frame to advance from the wall clock
    pub fn tick(&mut self) -> FrameStamp {
        let now = Instant::now();
        self.delta = now - self.last_frame;
        self.last_frame = now;
        self.frame_number += 1;
        self.reference_time = (now - self.start).as_secs_f64();
        self.stamp()
    }

    /// Advance to an explicit reference time (simulations, tests).
    ///
    /// Times earlier than the current one are clamped so the clock never runs backwards.
    pub fn advance_to(&mut self, reference_time: f64) -> FrameStamp {
        let time = reference_time.max(self.reference_time);
        self.delta = Duration::from_secs_f64(time - self.reference_time);
        self.frame_number += 1;
        self.reference_time = time;
        self.stamp()
    }

    /// Stamp for the current frame
    pub fn stamp(&self) -> FrameStamp {
        FrameStamp::new(self.frame_number, self.reference_time)
    }

    /// Get delta time in seconds
    pub fn delta_secs(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Get total frame count
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_starts_at_zero() {
        let clock = FrameClock::new();
        assert_eq!(clock.stamp(), FrameStamp::new(0, 0.0));
    }

    #[test]
    fn test_tick_is_monotonic() {
        let mut clock = FrameClock::new();
        let a = clock.tick();
        let b = clock.tick();
        assert_eq!(a.frame_number, 1);
        assert_eq!(b.frame_number, 2);
        assert!(b.reference_time >= a.reference_time);
    }

    #[test]
    fn test_advance_to_never_goes_backwards() {
        let mut clock = FrameClock::new();
        let a = clock.advance_to(5.0);
        assert_eq!(a.reference_time, 5.0);
        assert_eq!(clock.delta_secs(), 5.0);

        let b = clock.advance_to(3.0);
        assert_eq!(b.reference_time, 5.0);
        assert_eq!(b.frame_number, 2);
        assert_eq!(clock.delta_secs(), 0.0);
    }
}
