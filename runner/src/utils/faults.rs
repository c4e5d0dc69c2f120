//! Fault injection strategies for guarded I/O
//!
//! Production runs use [`NoFaults`]. Demo runs use [`RandomFaults`]; tests use
//! [`ScriptedFaults`] to get a deterministic failure schedule.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use thiserror::Error;

use crate::core::{FaultConfig, FaultMode};

/// Synthetic transient error raised in place of a real I/O call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("injected transient fault in {operation}")]
pub struct InjectedFault {
    pub operation: String,
}

/// Consulted once before every attempt of a guarded operation
pub trait FaultInjector: Send + Sync + fmt::Debug {
    /// Whether the upcoming attempt should fail with an [`InjectedFault`]
    fn should_inject_fault(&self) -> bool;

    /// Artificial latency to add before the upcoming attempt
    fn delay(&self) -> Duration;
}

/// Never injects anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFaults;

impl FaultInjector for NoFaults {
    fn should_inject_fault(&self) -> bool {
        false
    }

    fn delay(&self) -> Duration {
        Duration::ZERO
    }
}

/// Fails with a fixed probability and sleeps a uniform random delay
#[derive(Debug, Clone)]
pub struct RandomFaults {
    failure_rate: f64,
    min_delay: Duration,
    max_delay: Duration,
}

impl RandomFaults {
    pub fn new(failure_rate: f64, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            failure_rate: failure_rate.clamp(0.0, 1.0),
            min_delay: min_delay.min(max_delay),
            max_delay,
        }
    }
}

impl FaultInjector for RandomFaults {
    fn should_inject_fault(&self) -> bool {
        rand::thread_rng().gen_bool(self.failure_rate)
    }

    fn delay(&self) -> Duration {
        if self.min_delay == self.max_delay {
            return self.min_delay;
        }
        rand::thread_rng().gen_range(self.min_delay..=self.max_delay)
    }
}

/// Replays a fixed schedule of fault decisions, then stops injecting
#[derive(Debug, Default)]
pub struct ScriptedFaults {
    schedule: Mutex<VecDeque<bool>>,
    delay: Duration,
}

impl ScriptedFaults {
    pub fn new(schedule: impl IntoIterator<Item = bool>) -> Self {
        Self {
            schedule: Mutex::new(schedule.into_iter().collect()),
            delay: Duration::ZERO,
        }
    }

    /// Fail the next `n` attempts, then succeed
    pub fn failing(n: usize) -> Self {
        Self::new(std::iter::repeat_n(true, n))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn remaining(&self) -> usize {
        self.schedule.lock().len()
    }
}

impl FaultInjector for ScriptedFaults {
    fn should_inject_fault(&self) -> bool {
        self.schedule.lock().pop_front().unwrap_or(false)
    }

    fn delay(&self) -> Duration {
        self.delay
    }
}

/// Build the injector selected by configuration
pub fn from_config(config: &FaultConfig) -> Arc<dyn FaultInjector> {
    match config.mode {
        FaultMode::Off => Arc::new(NoFaults),
        FaultMode::Random => {
            tracing::warn!(
                failure_rate = config.failure_rate,
                "Fault injection enabled; do not use in production"
            );
            Arc::new(RandomFaults::new(
                config.failure_rate,
                config.min_delay,
                config.max_delay,
            ))
        }
    }
}
