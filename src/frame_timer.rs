use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Number of frame timestamps kept for the rolling average.
pub const SAMPLE_COUNT: usize = 10;

/// Step by which the pacing sleep grows or shrinks each frame.
const SLEEP_STEP: Duration = Duration::from_millis(1);

/// Rolling frame-rate estimate plus an adaptive sleep that keeps the loop
/// near a frame-rate cap.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    samples: VecDeque<Instant>,
    fps: f64,
    cap: Option<f64>,
    sleep: Duration,
}

impl FrameTimer {
    /// A cap of zero or less disables pacing.
    pub fn new(cap: f64) -> Self {
        Self {
            samples: VecDeque::with_capacity(SAMPLE_COUNT),
            fps: 0.0,
            cap: (cap > 0.0).then_some(cap),
            sleep: Duration::ZERO,
        }
    }

    /// Records the start of a frame.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    pub fn tick_at(&mut self, now: Instant) {
        if self.samples.len() == SAMPLE_COUNT {
            self.samples.pop_front();
        }
        self.samples.push_back(now);

        if let (Some(first), Some(last)) = (self.samples.front(), self.samples.back()) {
            let span = last.saturating_duration_since(*first).as_secs_f64();
            let intervals = (self.samples.len() - 1) as f64;
            if span > 0.0 && intervals > 0.0 {
                self.fps = intervals / span;
            }
        }
    }

    /// Smoothed frames per second over the last [`SAMPLE_COUNT`] frames.
    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn cap(&self) -> Option<f64> {
        self.cap
    }

    /// Adjusts and returns the sleep to insert before the next frame.
    ///
    /// While the loop runs faster than the cap the sleep grows by a
    /// millisecond per frame; once it is at or under the cap the sleep
    /// shrinks again and no time is spent sleeping.
    pub fn next_sleep(&mut self) -> Duration {
        let Some(cap) = self.cap else {
            return Duration::ZERO;
        };
        if self.fps <= cap {
            self.sleep = self.sleep.saturating_sub(SLEEP_STEP);
            return Duration::ZERO;
        }
        self.sleep += SLEEP_STEP;
        self.sleep
    }

    /// Sleeps for [`FrameTimer::next_sleep`], the loop's only suspension point.
    pub fn pace(&mut self) {
        let sleep = self.next_sleep();
        if !sleep.is_zero() {
            std::thread::sleep(sleep);
        }
    }
}
