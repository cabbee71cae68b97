use std::fmt;

use chrono::Duration;

use crate::utils::format_elapsed_time;

pub use super::message::DEFAULT_HOLD_TIME;
pub const DEFAULT_KEEPALIVE_TIME: u16 = 60;

/// Hold and keepalive countdowns, decremented once per tick while Established
///
/// An interval of 0 disables the corresponding timer.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SessionTimers {
    pub(crate) hold_interval: u16,
    pub(crate) keepalive_interval: u16,
    pub(crate) hold_timer: u16,
    pub(crate) keepalive_timer: u16,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct TimerEvents {
    pub hold_expired: bool,
    pub keepalive_due: bool,
}

impl SessionTimers {
    /// Arm both countdowns from their intervals
    pub fn load(&mut self, hold: u16, keepalive: u16) {
        self.hold_interval = hold;
        self.keepalive_interval = keepalive;
        self.hold_timer = hold;
        self.keepalive_timer = keepalive;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Something arrived from the peer, restart the hold countdown
    pub fn received(&mut self) {
        self.hold_timer = self.hold_interval;
    }

    pub fn reload_keepalive(&mut self) {
        self.keepalive_timer = self.keepalive_interval;
    }

    pub fn tick(&mut self) -> TimerEvents {
        TimerEvents {
            hold_expired: countdown(&mut self.hold_timer),
            keepalive_due: countdown(&mut self.keepalive_timer),
        }
    }
}

/// Returns true on the tick the timer reaches zero
fn countdown(timer: &mut u16) -> bool {
    if *timer > 0 {
        *timer -= 1;
        *timer == 0
    } else {
        false
    }
}

impl fmt::Display for SessionTimers {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            format_elapsed_time(Duration::seconds(self.hold_timer.into()))
        )
    }
}
