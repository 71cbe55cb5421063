use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::SchedulingError;
use crate::config::SchedulingDefaults;

/// Length of the window opened by an explicit admin "start activity".
const STARTED_ACTIVITY_HOURS: i64 = 4;
/// Upper bound for every minute-valued setting.
pub const MAX_SETTING_MINUTES: u32 = 24 * 60;
/// Upper bound for per-position and per-candidate counts.
pub const MAX_QUEUE_LENGTH: u32 = 10_000;

/// Global activity schedule and timing parameters. Every minute value is in whole minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityWindow {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub active_flag: bool,
    pub active_queue_limit: u32,
    pub high_priority_quota: u32,
    pub average_interview_time: u32,
    pub buffer_time: u32,
    pub group_interview_max_size: u32,
    pub high_priority_time_limit: u32,
    pub max_queue_length: u32,
}

impl ActivityWindow {
    pub fn from_defaults(defaults: &SchedulingDefaults, now: DateTime<Utc>) -> Self {
        Self {
            start_time: now,
            end_time: now + Duration::hours(i64::from(defaults.activity_hours)),
            active_flag: true,
            active_queue_limit: defaults.active_queue_limit,
            high_priority_quota: defaults.high_priority_quota,
            average_interview_time: defaults.average_interview_minutes,
            buffer_time: defaults.buffer_minutes,
            group_interview_max_size: defaults.group_interview_max_size,
            high_priority_time_limit: defaults.high_priority_time_limit_minutes,
            max_queue_length: defaults.max_queue_length,
        }
    }

    pub fn can_join_queue(&self, now: DateTime<Utc>) -> bool {
        self.active_flag && now >= self.start_time && now < self.end_time
    }

    /// Whole minutes until the window opens; `None` once it has started.
    pub fn minutes_until_start(&self, now: DateTime<Utc>) -> Option<i64> {
        (now < self.start_time).then(|| (self.start_time - now).num_minutes())
    }

    pub fn minutes_until_end(&self, now: DateTime<Utc>) -> i64 {
        (self.end_time - now).num_minutes()
    }

    /// Priority boosts stop being granted once less than the boost length remains.
    pub fn priority_window_open(&self, now: DateTime<Utc>) -> bool {
        self.end_time - now >= Duration::minutes(i64::from(self.high_priority_time_limit))
    }

    /// Minutes one interview occupies a position, including the changeover buffer.
    pub fn service_minutes(&self) -> u32 {
        self.average_interview_time.saturating_add(self.buffer_time)
    }

    pub fn status(&self, now: DateTime<Utc>) -> ActivityStatusView {
        ActivityStatusView {
            is_active: self.active_flag,
            start_time: self.start_time,
            end_time: self.end_time,
            current_time: now,
            is_started: now >= self.start_time,
            is_ended: now >= self.end_time,
            can_join_queue: self.can_join_queue(now),
            minutes_until_start: self.minutes_until_start(now),
            minutes_until_end: self.minutes_until_end(now),
        }
    }

    /// Apply a partial settings change, leaving `self` untouched when validation fails.
    pub fn apply(&mut self, update: &ActivitySettingsUpdate) -> Result<(), SchedulingError> {
        let mut next = self.clone();

        if let Some(value) = update.active_flag {
            next.active_flag = value;
        }
        if let Some(value) = update.start_time {
            next.start_time = value;
        }
        if let Some(value) = update.end_time {
            next.end_time = value;
        }
        if let Some(value) = update.active_queue_limit {
            next.active_queue_limit = bounded("active_queue_limit", value, 1, MAX_QUEUE_LENGTH)?;
        }
        if let Some(value) = update.high_priority_quota {
            next.high_priority_quota = bounded("high_priority_quota", value, 0, MAX_QUEUE_LENGTH)?;
        }
        if let Some(value) = update.average_interview_time {
            next.average_interview_time =
                bounded("average_interview_time", value, 1, MAX_SETTING_MINUTES)?;
        }
        if let Some(value) = update.buffer_time {
            next.buffer_time = bounded("buffer_time", value, 0, MAX_SETTING_MINUTES)?;
        }
        if let Some(value) = update.group_interview_max_size {
            next.group_interview_max_size =
                bounded("group_interview_max_size", value, 1, MAX_QUEUE_LENGTH)?;
        }
        if let Some(value) = update.high_priority_time_limit {
            next.high_priority_time_limit =
                bounded("high_priority_time_limit", value, 1, MAX_SETTING_MINUTES)?;
        }
        if let Some(value) = update.max_queue_length {
            next.max_queue_length = bounded("max_queue_length", value, 1, MAX_QUEUE_LENGTH)?;
        }

        if next.start_time >= next.end_time {
            return Err(SchedulingError::validation(
                "end_time",
                "activity must end after it starts",
            ));
        }

        *self = next;
        Ok(())
    }
}

fn bounded(field: &'static str, value: u32, min: u32, max: u32) -> Result<u32, SchedulingError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(SchedulingError::validation(
            field,
            format!("must be between {min} and {max}"),
        ))
    }
}

/// Partial update accepted from the control admin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySettingsUpdate {
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub active_flag: Option<bool>,
    #[serde(default)]
    pub active_queue_limit: Option<u32>,
    #[serde(default)]
    pub high_priority_quota: Option<u32>,
    #[serde(default)]
    pub average_interview_time: Option<u32>,
    #[serde(default)]
    pub buffer_time: Option<u32>,
    #[serde(default)]
    pub group_interview_max_size: Option<u32>,
    #[serde(default)]
    pub high_priority_time_limit: Option<u32>,
    #[serde(default)]
    pub max_queue_length: Option<u32>,
}

/// Gate state reported to every role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityStatusView {
    pub is_active: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub current_time: DateTime<Utc>,
    pub is_started: bool,
    pub is_ended: bool,
    pub can_join_queue: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minutes_until_start: Option<i64>,
    pub minutes_until_end: i64,
}

/// Shared, read-mostly holder for the activity window. Writers take the lock exclusively.
#[derive(Debug)]
pub struct ActivityGate {
    window: RwLock<ActivityWindow>,
}

impl ActivityGate {
    pub fn new(window: ActivityWindow) -> Self {
        Self {
            window: RwLock::new(window),
        }
    }

    pub fn snapshot(&self) -> ActivityWindow {
        self.window
            .read()
            .expect("activity window lock poisoned")
            .clone()
    }

    pub fn can_join_queue(&self, now: DateTime<Utc>) -> bool {
        self.window
            .read()
            .expect("activity window lock poisoned")
            .can_join_queue(now)
    }

    pub fn update(&self, update: &ActivitySettingsUpdate) -> Result<ActivityWindow, SchedulingError> {
        let mut guard = self.window.write().expect("activity window lock poisoned");
        guard.apply(update)?;
        info!(
            active = guard.active_flag,
            start = %guard.start_time,
            end = %guard.end_time,
            average_interview_time = guard.average_interview_time,
            buffer_time = guard.buffer_time,
            "activity settings updated"
        );
        Ok(guard.clone())
    }

    /// Open a fresh window running from `now` for the standard session length.
    pub fn start(&self, now: DateTime<Utc>) -> ActivityWindow {
        let mut guard = self.window.write().expect("activity window lock poisoned");
        guard.start_time = now;
        guard.end_time = now + Duration::hours(STARTED_ACTIVITY_HOURS);
        guard.active_flag = true;
        info!(end = %guard.end_time, "activity started");
        guard.clone()
    }

    pub fn end(&self, now: DateTime<Utc>) -> ActivityWindow {
        let mut guard = self.window.write().expect("activity window lock poisoned");
        guard.active_flag = false;
        guard.end_time = now;
        if guard.start_time > now {
            guard.start_time = now;
        }
        info!("activity ended");
        guard.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn nine_am() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap()
    }

    fn window() -> ActivityWindow {
        ActivityWindow::from_defaults(&SchedulingDefaults::default(), nine_am())
    }

    #[test]
    fn gate_is_half_open_interval() {
        let window = window();
        assert!(window.can_join_queue(nine_am()));
        assert!(!window.can_join_queue(nine_am() - Duration::minutes(1)));
        assert!(!window.can_join_queue(window.end_time));
        assert!(window.can_join_queue(window.end_time - Duration::seconds(1)));
    }

    #[test]
    fn inactive_flag_closes_gate_inside_interval() {
        let mut window = window();
        window.active_flag = false;
        assert!(!window.can_join_queue(nine_am() + Duration::minutes(5)));
    }

    #[test]
    fn minutes_until_start_only_before_opening() {
        let window = window();
        assert_eq!(
            window.minutes_until_start(nine_am() - Duration::minutes(45)),
            Some(45)
        );
        assert_eq!(window.minutes_until_start(nine_am()), None);
    }

    #[test]
    fn priority_window_closes_near_end() {
        let window = window();
        let limit = i64::from(window.high_priority_time_limit);
        assert!(window.priority_window_open(window.end_time - Duration::minutes(limit)));
        assert!(!window.priority_window_open(window.end_time - Duration::minutes(limit - 1)));
    }

    #[test]
    fn apply_rejects_inverted_window_without_partial_changes() {
        let mut window = window();
        let before = window.clone();
        let update = ActivitySettingsUpdate {
            buffer_time: Some(9),
            end_time: Some(nine_am() - Duration::hours(1)),
            ..ActivitySettingsUpdate::default()
        };
        let error = window.apply(&update).expect_err("inverted window rejected");
        assert!(matches!(error, SchedulingError::Validation { field: "end_time", .. }));
        assert_eq!(window, before);
    }

    #[test]
    fn apply_rejects_zero_interview_time() {
        let mut window = window();
        let update = ActivitySettingsUpdate {
            average_interview_time: Some(0),
            ..ActivitySettingsUpdate::default()
        };
        assert!(window.apply(&update).is_err());
    }

    #[test]
    fn apply_rejects_settings_beyond_a_day() {
        let mut window = window();
        let before = window.clone();
        let update = ActivitySettingsUpdate {
            average_interview_time: Some(u32::MAX),
            ..ActivitySettingsUpdate::default()
        };
        let error = window.apply(&update).expect_err("oversized interview time");
        assert!(matches!(
            error,
            SchedulingError::Validation {
                field: "average_interview_time",
                ..
            }
        ));
        let update = ActivitySettingsUpdate {
            max_queue_length: Some(MAX_QUEUE_LENGTH + 1),
            ..ActivitySettingsUpdate::default()
        };
        assert!(window.apply(&update).is_err());
        assert_eq!(window, before);
    }

    #[test]
    fn service_minutes_saturate() {
        let mut window = window();
        window.average_interview_time = u32::MAX;
        window.buffer_time = 5;
        assert_eq!(window.service_minutes(), u32::MAX);
    }

    #[test]
    fn gate_start_and_end_toggle_window() {
        let gate = ActivityGate::new(window());
        let later = nine_am() + Duration::hours(2);
        let ended = gate.end(later);
        assert!(!ended.active_flag);
        assert!(!gate.can_join_queue(later));

        let started = gate.start(later);
        assert!(started.active_flag);
        assert_eq!(started.end_time, later + Duration::hours(4));
        assert!(gate.can_join_queue(later));
    }
}
