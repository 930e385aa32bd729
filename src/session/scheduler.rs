//! Timer table for the single-threaded session loop.
//!
//! At most one instance of each [`Timer`] is armed. When several are due,
//! the earliest deadline fires first; equal deadlines fire in declaration
//! order (telemetry, then profile, then auto-stop).

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Timer {
    Telemetry,
    Profile,
    AutoStop,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    timer: Timer,
    due: Instant,
    period: Option<Duration>,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    entries: Vec<Entry>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a repeating timer; replaces any existing arming of `timer`.
    pub fn arm_periodic(&mut self, timer: Timer, first_due: Instant, period: Duration) {
        self.insert(Entry {
            timer,
            due: first_due,
            period: (!period.is_zero()).then_some(period),
        });
    }

    pub fn arm_once(&mut self, timer: Timer, due: Instant) {
        self.insert(Entry {
            timer,
            due,
            period: None,
        });
    }

    fn insert(&mut self, entry: Entry) {
        self.cancel(entry.timer);
        self.entries.push(entry);
    }

    pub fn cancel(&mut self, timer: Timer) {
        self.entries.retain(|e| e.timer != timer);
    }

    pub fn cancel_all(&mut self) {
        self.entries.clear();
    }

    pub fn is_armed(&self, timer: Timer) -> bool {
        self.entries.iter().any(|e| e.timer == timer)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.entries.iter().map(|e| e.due).min()
    }

    /// Removes and returns the next timer due at or before `now`, with the
    /// deadline it was due at. Periodic timers are re-armed one period later.
    pub fn pop_due(&mut self, now: Instant) -> Option<(Timer, Instant)> {
        let index = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.due <= now)
            .min_by_key(|(_, e)| (e.due, e.timer))
            .map(|(i, _)| i)?;

        let entry = self.entries[index];
        match entry.period {
            Some(period) => self.entries[index].due = entry.due + period,
            None => {
                self.entries.swap_remove(index);
            }
        }
        Some((entry.timer, entry.due))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn drain(s: &mut Scheduler, now: Instant) -> Vec<(Timer, Instant)> {
        std::iter::from_fn(|| s.pop_due(now)).collect()
    }

    #[test]
    fn nothing_fires_before_due() {
        let t0 = Instant::now();
        let mut s = Scheduler::new();
        s.arm_periodic(Timer::Telemetry, t0 + ms(1000), ms(1000));
        assert!(s.pop_due(t0 + ms(999)).is_none());
        assert_eq!(s.next_due(), Some(t0 + ms(1000)));
    }

    #[test]
    fn ties_fire_in_fixed_order() {
        let t0 = Instant::now();
        let mut s = Scheduler::new();
        s.arm_once(Timer::AutoStop, t0 + ms(2000));
        s.arm_periodic(Timer::Profile, t0 + ms(250), ms(250));
        s.arm_periodic(Timer::Telemetry, t0 + ms(1000), ms(1000));

        let fired: Vec<_> = drain(&mut s, t0 + ms(2000))
            .into_iter()
            .filter(|(_, due)| *due == t0 + ms(2000))
            .map(|(timer, _)| timer)
            .collect();
        assert_eq!(fired, vec![Timer::Telemetry, Timer::Profile, Timer::AutoStop]);
        assert!(!s.is_armed(Timer::AutoStop));
    }

    #[test]
    fn catch_up_fires_each_missed_period_in_due_order() {
        let t0 = Instant::now();
        let mut s = Scheduler::new();
        s.arm_periodic(Timer::Profile, t0 + ms(250), ms(250));
        s.arm_periodic(Timer::Telemetry, t0 + ms(1000), ms(1000));

        let fired = drain(&mut s, t0 + ms(1000));
        let timers: Vec<_> = fired.iter().map(|(t, _)| *t).collect();
        assert_eq!(
            timers,
            vec![
                Timer::Profile,
                Timer::Profile,
                Timer::Profile,
                Timer::Telemetry,
                Timer::Profile
            ]
        );
        assert_eq!(s.next_due(), Some(t0 + ms(1250)));
    }

    #[test]
    fn rearming_replaces_and_cancel_removes() {
        let t0 = Instant::now();
        let mut s = Scheduler::new();
        s.arm_once(Timer::AutoStop, t0 + ms(10));
        s.arm_once(Timer::AutoStop, t0 + ms(20));
        assert!(s.pop_due(t0 + ms(15)).is_none());

        s.cancel(Timer::AutoStop);
        assert!(s.is_empty());

        s.arm_periodic(Timer::Telemetry, t0, ms(5));
        s.cancel_all();
        assert_eq!(s.next_due(), None);
    }
}
