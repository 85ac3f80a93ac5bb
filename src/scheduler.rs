use std::thread::sleep;
use std::time::Duration;

/// Fixed-delay retry loop: at most `attempts` tries, with `delay` between
/// consecutive tries and none after the last.
#[derive(Debug, Clone, Copy)]
pub struct RetrySchedule {
    attempts: u32,
    delay: Duration,
}

impl RetrySchedule {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// job: called with the 1-based attempt number, returns true to stop.
    /// Returns whether any attempt succeeded.
    pub fn run<J>(&self, mut job: J) -> bool
    where
        J: FnMut(u32) -> bool,
    {
        for attempt in 1..=self.attempts {
            if job(attempt) {
                return true;
            }
            if attempt != self.attempts {
                sleep(self.delay);
            }
        }
        false
    }
}
