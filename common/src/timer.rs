//! Polled periodic timers on top of the millisecond tick clock.
//!
//! A recurring action owns an [`Expiration`] and polls it with the current
//! tick count. The poll reports at most one firing per call. While polls are
//! timely, deadlines advance by exactly one period from the previous deadline
//! (no drift). After a late poll the schedule is re-anchored to the poll time
//! instead of catching up with a burst of firings.
//!
//! A deadline is pending only while it lies at most one period ahead of the
//! current tick (measured as a wrapping difference). Any other deadline is
//! overdue, however long ago it was, so a deadline that wraps past
//! `u32::MAX` is not reported due early and arbitrarily long gaps between
//! polls still produce exactly one firing.

/// Next deadline of a recurring action, or "never armed".
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Expiration(Option<u32>);

/// Whether `deadline` lies in the pending window `(now, now + period]`.
///
/// The tick counter only moves forward within a boot, so a deadline outside
/// of this window can only have been missed.
fn is_pending(deadline: u32, period: u32, now: u32) -> bool {
    let ahead = deadline.wrapping_sub(now);
    ahead != 0 && ahead <= period
}

impl Expiration {
    pub const fn new() -> Self {
        Self(None)
    }

    /// The tick at which the action is next due, if armed.
    pub fn deadline(&self) -> Option<u32> {
        self.0
    }

    /// Forget the deadline. The next poll re-arms the timer.
    pub fn disarm(&mut self) {
        self.0 = None;
    }

    /// Return whether the action with the given `period` is due at `now`.
    ///
    /// The first poll arms the timer to `now + period`. A `period` of 0 makes
    /// every poll due. A poll more than one period late fires once and
    /// re-anchors the schedule to `now + period`.
    pub fn is_due(&mut self, period: u32, now: u32) -> bool {
        let deadline = *self.0.get_or_insert(now.wrapping_add(period));
        if is_pending(deadline, period, now) {
            return false;
        }

        let lateness = now.wrapping_sub(deadline);
        self.0 = Some(if lateness > period {
            now.wrapping_add(period)
        } else {
            deadline.wrapping_add(period)
        });
        true
    }
}

/// An [`Expiration`] bundled with its period.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PeriodicTimer {
    period: u32,
    expiration: Expiration,
}

impl PeriodicTimer {
    pub const fn new(period: u32) -> Self {
        Self {
            period,
            expiration: Expiration::new(),
        }
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    /// Poll the timer, see [`Expiration::is_due`].
    pub fn poll(&mut self, now: u32) -> bool {
        self.expiration.is_due(self.period, now)
    }

    /// Start over: the next poll arms the timer one period from then.
    pub fn reset(&mut self) {
        self.expiration.disarm();
    }
}
