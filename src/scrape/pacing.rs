use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub const ZERO: DelayRange = DelayRange {
        min: Duration::ZERO,
        max: Duration::ZERO,
    };

    pub fn secs(min: f64, max: f64) -> Self {
        Self {
            min: Duration::from_secs_f64(min),
            max: Duration::from_secs_f64(max),
        }
    }

    /// Uniform draw from `[min, max]`.
    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        self.min + (self.max - self.min).mul_f64(fastrand::f64())
    }

    pub async fn sleep(&self) -> Duration {
        let delay = self.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        delay
    }
}

/// Request throttling and checkpoint cadence for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct PacingPolicy {
    /// Checkpoint after this many top-level comments.
    pub checkpoint_interval: usize,
    /// Pause taken after each checkpoint.
    pub rest: DelayRange,
    /// Chance of a short pause before each top-level comment.
    pub micro_probability: f64,
    pub micro: DelayRange,
    /// Pause before fetching the replies of a comment.
    pub reply: DelayRange,
}

impl PacingPolicy {
    pub fn tiktok() -> Self {
        Self {
            checkpoint_interval: 10,
            rest: DelayRange::secs(1.0, 3.0),
            micro_probability: 0.3,
            micro: DelayRange::secs(0.1, 0.8),
            reply: DelayRange::secs(0.5, 1.5),
        }
    }

    pub fn youtube() -> Self {
        Self {
            checkpoint_interval: 10,
            rest: DelayRange::secs(1.0, 2.0),
            micro_probability: 0.2,
            micro: DelayRange::secs(0.1, 0.5),
            reply: DelayRange::ZERO,
        }
    }

    /// No delays at all; used by tests and dry runs.
    pub fn immediate(checkpoint_interval: usize) -> Self {
        Self {
            checkpoint_interval: checkpoint_interval.max(1),
            rest: DelayRange::ZERO,
            micro_probability: 0.0,
            micro: DelayRange::ZERO,
            reply: DelayRange::ZERO,
        }
    }

    pub fn roll_micro_delay(&self) -> bool {
        self.micro_probability > 0.0 && fastrand::f64() < self.micro_probability
    }
}

/// What the fetch loop does with an unrecoverable error or an interrupt once
/// the final checkpoint has been attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FailurePolicy {
    /// Hand the error back to the caller.
    Propagate,
    /// Log it and return whatever was collected.
    #[value(name = "partial")]
    ReturnPartial,
}
