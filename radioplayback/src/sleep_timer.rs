//! Sleep timer
//!
//! Counts down while a stream plays, fades the volume out during the last
//! seconds and pauses playback at zero. The timer itself is a plain state
//! machine ticked by the session task once per [`SLEEP_TIMER_INTERVAL`].

use std::time::Duration;

pub const SLEEP_TIMER_INTERVAL: Duration = Duration::from_secs(1);

/// Volume fade starts this many seconds before the end
pub const DEFAULT_FADE_CUTOFF_SECS: u64 = 30;

pub const MAX_VOLUME: f32 = 1.0;

/// Durations offered by the timer picker, in minutes
pub const SLEEP_TIMER_OPTIONS_MINUTES: [i64; 10] = [0, 10, 15, 20, 30, 40, 50, 60, 120, 180];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SleepTimerState {
    #[default]
    Idle,
    Running { remaining_ms: i64 },
}

/// What the session must do after a start or a tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerTick {
    pub remaining_ms: i64,
    /// New volume when inside the fade window
    pub volume: Option<f32>,
    pub finished: bool,
}

#[derive(Debug, Clone)]
pub struct SleepTimer {
    state: SleepTimerState,
    interval_ms: i64,
    fade_cutoff_secs: u64,
}

impl Default for SleepTimer {
    fn default() -> Self {
        Self::new(DEFAULT_FADE_CUTOFF_SECS)
    }
}

impl SleepTimer {
    pub fn new(fade_cutoff_secs: u64) -> Self {
        Self {
            state: SleepTimerState::Idle,
            interval_ms: SLEEP_TIMER_INTERVAL.as_millis() as i64,
            fade_cutoff_secs: fade_cutoff_secs.max(1),
        }
    }

    pub fn state(&self) -> SleepTimerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SleepTimerState::Running { .. })
    }

    pub fn remaining_ms(&self) -> Option<i64> {
        match self.state {
            SleepTimerState::Idle => None,
            SleepTimerState::Running { remaining_ms } => Some(remaining_ms),
        }
    }

    /// Arms the timer, replacing any running countdown
    ///
    /// Returns the first tick, reported before any time has elapsed, or
    /// `None` when `duration_ms` is not positive (the timer is then idle).
    pub fn start(&mut self, duration_ms: i64) -> Option<TimerTick> {
        if duration_ms <= 0 {
            self.cancel();
            return None;
        }
        self.state = SleepTimerState::Running {
            remaining_ms: duration_ms,
        };
        Some(self.report(duration_ms))
    }

    pub fn cancel(&mut self) {
        self.state = SleepTimerState::Idle;
    }

    /// One interval elapsed
    pub fn tick(&mut self) -> Option<TimerTick> {
        let SleepTimerState::Running { remaining_ms } = self.state else {
            return None;
        };
        let remaining_ms = remaining_ms - self.interval_ms;
        if remaining_ms <= 0 {
            self.state = SleepTimerState::Idle;
            return Some(TimerTick {
                remaining_ms: 0,
                volume: Some(MAX_VOLUME),
                finished: true,
            });
        }
        self.state = SleepTimerState::Running { remaining_ms };
        Some(self.report(remaining_ms))
    }

    fn report(&self, remaining_ms: i64) -> TimerTick {
        TimerTick {
            remaining_ms,
            volume: fade_volume(remaining_ms, self.fade_cutoff_secs),
            finished: false,
        }
    }
}

/// Linear fade: whole seconds left over the cutoff
pub fn fade_volume(remaining_ms: i64, fade_cutoff_secs: u64) -> Option<f32> {
    let cutoff_ms = (fade_cutoff_secs as i64).saturating_mul(1000);
    if remaining_ms >= cutoff_ms {
        return None;
    }
    let seconds = remaining_ms.max(0) / 1000;
    Some(seconds as f32 / fade_cutoff_secs as f32)
}

/// Duration behind a picker index, 0 for anything out of range
pub fn sleep_timer_option_ms(index: usize) -> i64 {
    SLEEP_TIMER_OPTIONS_MINUTES
        .get(index)
        .map(|minutes| minutes * 60 * 1000)
        .unwrap_or(0)
}

/// `HH:MM:SS` from one hour up, `MM:SS` below, empty when inactive
pub fn format_sleep_timer(remaining_ms: Option<i64>) -> String {
    let Some(ms) = remaining_ms.filter(|ms| *ms > 0) else {
        return String::new();
    };
    let total_secs = ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
