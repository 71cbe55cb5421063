use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Time source, swappable so tests can drive expiry deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-advanced clock for simulations and tests.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(now),
        }
    }

    pub fn advance_minutes(&self, minutes: i64) {
        let mut guard = self.current.lock().expect("clock mutex poisoned");
        *guard += Duration::minutes(minutes);
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.current.lock().expect("clock mutex poisoned") = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().expect("clock mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn manual_clock_advances_in_minutes() {
        let start = Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap();
        let clock = ManualClock::starting_at(start);
        clock.advance_minutes(25);
        assert_eq!(clock.now(), start + Duration::minutes(25));
    }
}
