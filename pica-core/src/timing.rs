//! Display timing: per-line and per-frame interrupts

use crate::interrupts::{InterruptRegisters, InterruptType};
use bincode::{Decode, Encode};

// ARM11 clock rate
pub const DEFAULT_CPU_CLOCK_HZ: u64 = 268_123_480;
pub const DEFAULT_FRAME_RATE: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimingConfig {
    pub frame_ticks: u64,
    pub lines_per_frame: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self { frame_ticks: DEFAULT_CPU_CLOCK_HZ / DEFAULT_FRAME_RATE, lines_per_frame: 240 }
    }
}

impl TimingConfig {
    fn line_ticks(&self) -> u64 {
        self.frame_ticks / u64::from(self.lines_per_frame.max(1))
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct DisplayTimer {
    config: TimingConfig,
    line: u32,
    last_line_ticks: u64,
    frame_count: u64,
}

impl DisplayTimer {
    #[must_use]
    pub fn new(config: TimingConfig) -> Self {
        Self { config, line: 0, last_line_ticks: 0, frame_count: 0 }
    }

    #[must_use]
    pub fn config(&self) -> TimingConfig {
        self.config
    }

    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Advance to `current_ticks`. At most one line completes per call.
    ///
    /// Returns true when the call completes a frame.
    pub fn tick(&mut self, current_ticks: u64, interrupts: &mut InterruptRegisters) -> bool {
        if current_ticks < self.last_line_ticks + self.config.line_ticks() {
            return false;
        }

        self.line += 1;
        self.last_line_ticks = current_ticks;
        interrupts.raise(InterruptType::Pdc0);

        if self.line < self.config.lines_per_frame {
            return false;
        }

        self.line = 0;
        self.frame_count += 1;
        interrupts.raise(InterruptType::Pdc1);

        log::trace!("Frame {} complete at tick {current_ticks}", self.frame_count);

        true
    }
}
