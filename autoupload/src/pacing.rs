//! Randomised pauses and per-run budgets drawn from [`Timing`].

use crate::config::Timing;
use rand::Rng;
use std::ops::Range;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    Tiny,
    Small,
    Medium,
    Long,
}

#[derive(Debug, Clone)]
pub struct Pacing {
    timing: Timing,
}

impl Pacing {
    pub fn new(timing: Timing) -> Self {
        Self { timing }
    }

    pub async fn pause(&self, pause: Pause) {
        tokio::time::sleep(self.pause_duration(pause)).await;
    }

    pub fn pause_duration(&self, pause: Pause) -> Duration {
        let range = match pause {
            Pause::Tiny => &self.timing.tiny,
            Pause::Small => &self.timing.small,
            Pause::Medium => &self.timing.medium,
            Pause::Long => &self.timing.long,
        };
        secs_in(range)
    }

    pub fn mouse_travel(&self) -> Duration {
        secs_in(&self.timing.mouse_travel)
    }

    pub fn retry_interval(&self) -> Duration {
        secs_in(&self.timing.screen_retry_interval)
    }

    pub fn browser_launch_wait(&self) -> Duration {
        whole_secs_in(&self.timing.browser_launch_wait_secs)
    }

    pub fn click_timeout(&self) -> Duration {
        whole_secs_in(&self.timing.click_timeout_secs)
    }

    pub fn step2_timeout(&self) -> Duration {
        whole_secs_in(&self.timing.step2_load_timeout_secs)
    }

    pub fn click_confidence(&self) -> f32 {
        let range = &self.timing.click_confidence;
        if range.start >= range.end {
            return range.start;
        }
        rand::thread_rng().gen_range(range.clone())
    }
}

fn sample(range: &Range<f64>) -> f64 {
    if range.start >= range.end {
        return range.start.max(0.0);
    }
    rand::thread_rng().gen_range(range.clone()).max(0.0)
}

fn secs_in(range: &Range<f64>) -> Duration {
    Duration::from_secs_f64(sample(range))
}

// Budgets are truncated to whole seconds.
fn whole_secs_in(range: &Range<f64>) -> Duration {
    Duration::from_secs(sample(range) as u64)
}
