// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Event listing window and day/week grouping.
//!
//! Day boundaries follow the configured calendar timezone. Windows of up to
//! a week are grouped per calendar day, longer windows per Sunday-aligned
//! week.

use crate::error::AppError;
use crate::models::Event;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub const DEFAULT_DAYS: u32 = 7;
pub const MIN_DAYS: u32 = 1;
pub const MAX_DAYS: u32 = 365;
/// Largest window still grouped per day.
pub const MAX_DAYS_GROUPED_BY_DAY: u32 = 7;

const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Inclusive time window for an event listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub days: u32,
}

impl EventWindow {
    /// Compute the window for a listing request.
    ///
    /// The window opens at local midnight of `start_date` (default: `now`)
    /// and closes at 23:59:59.999 local on the `days`-th calendar day.
    pub fn compute(
        days: Option<u32>,
        start_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        tz: Tz,
    ) -> Result<Self, AppError> {
        let days = days.unwrap_or(DEFAULT_DAYS);
        if !(MIN_DAYS..=MAX_DAYS).contains(&days) {
            return Err(AppError::BadRequest(format!(
                "days must be between {} and {}",
                MIN_DAYS, MAX_DAYS
            )));
        }

        let first_day = start_date
            .unwrap_or(now)
            .with_timezone(&tz)
            .date_naive();
        let last_day = first_day + Duration::days(i64::from(days) - 1);

        let start = earliest_local(tz, first_day.and_time(NaiveTime::MIN));
        let end = latest_local(tz, last_day.and_time(end_of_day()));

        Ok(Self { start, end, days })
    }

    /// True when `instant` lies inside the window (both ends inclusive).
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    pub fn grouping(&self) -> Grouping {
        Grouping::for_days(self.days)
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN)
}

/// First instant of a local wall-clock time. Wall-clock times skipped by a
/// DST jump resolve to the first valid instant after the gap.
fn earliest_local(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    (0..=2)
        .find_map(|h| {
            tz.from_local_datetime(&(local + Duration::hours(h)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| local.and_utc())
}

/// Last instant of a local wall-clock time; the mirror of [`earliest_local`].
fn latest_local(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    (0..=2)
        .find_map(|h| {
            tz.from_local_datetime(&(local - Duration::hours(h)))
                .latest()
        })
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| local.and_utc())
}

/// How events are bucketed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    Day,
    Week,
}

impl Grouping {
    pub fn for_days(days: u32) -> Self {
        if days <= MAX_DAYS_GROUPED_BY_DAY {
            Grouping::Day
        } else {
            Grouping::Week
        }
    }

    /// Bucket date for an event start.
    pub fn key_date(self, start: DateTime<Utc>, tz: Tz) -> NaiveDate {
        let local = start.with_timezone(&tz).date_naive();
        match self {
            Grouping::Day => local,
            Grouping::Week => week_start(local),
        }
    }
}

/// Sunday on or before `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

/// One bucket of events. Serializes as `{ "date", "events" }` for day
/// buckets and `{ "weekStart", "events" }` for week buckets.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum EventGroup {
    Day {
        date: String,
        events: Vec<Event>,
    },
    Week {
        #[serde(rename = "weekStart")]
        week_start: String,
        events: Vec<Event>,
    },
}

impl EventGroup {
    fn new(grouping: Grouping, key: NaiveDate, events: Vec<Event>) -> Self {
        let key = key.format(DATE_KEY_FORMAT).to_string();
        match grouping {
            Grouping::Day => EventGroup::Day { date: key, events },
            Grouping::Week => EventGroup::Week {
                week_start: key,
                events,
            },
        }
    }

    /// Group key (`YYYY-MM-DD`).
    pub fn key(&self) -> &str {
        match self {
            EventGroup::Day { date, .. } => date,
            EventGroup::Week { week_start, .. } => week_start,
        }
    }

    pub fn events(&self) -> &[Event] {
        match self {
            EventGroup::Day { events, .. } | EventGroup::Week { events, .. } => events,
        }
    }
}

/// Partition events into buckets.
///
/// Events are sorted by start time (stable, so ties keep their input
/// order). Buckets appear in the order their first event appears.
pub fn group_events(mut events: Vec<Event>, grouping: Grouping, tz: Tz) -> Vec<EventGroup> {
    events.sort_by_key(|e| e.start_time);

    let mut buckets: Vec<(NaiveDate, Vec<Event>)> = Vec::new();
    let mut index: HashMap<NaiveDate, usize> = HashMap::new();

    for event in events {
        let key = grouping.key_date(event.start_time, tz);
        let slot = *index.entry(key).or_insert_with(|| {
            buckets.push((key, Vec::new()));
            buckets.len() - 1
        });
        buckets[slot].1.push(event);
    }

    buckets
        .into_iter()
        .map(|(key, mut bucket)| {
            bucket.sort_by_key(|e| e.start_time);
            EventGroup::new(grouping, key, bucket)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventDraft;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn event(id: &str, start: DateTime<Utc>) -> Event {
        let mut e = Event::new(
            "u1",
            EventDraft {
                google_event_id: Some(id.to_string()),
                title: id.to_string(),
                start_time: start,
                end_time: start + Duration::hours(1),
            },
            start,
        );
        e.id = id.to_string();
        e
    }

    #[test]
    fn test_single_day_window() {
        let window = EventWindow::compute(
            Some(1),
            Some(utc(2024, 6, 10, 15, 30)),
            utc(2020, 1, 1, 0, 0),
            Tz::UTC,
        )
        .unwrap();

        assert_eq!(window.start, utc(2024, 6, 10, 0, 0));
        assert_eq!(
            window.end,
            utc(2024, 6, 10, 23, 59) + Duration::milliseconds(59_999)
        );
        assert!(window.contains(utc(2024, 6, 10, 9, 0)));
        assert!(!window.contains(utc(2024, 6, 11, 0, 0)));
    }

    #[test]
    fn test_window_defaults_to_seven_days_from_now() {
        let now = utc(2024, 6, 10, 15, 30);
        let window = EventWindow::compute(None, None, now, Tz::UTC).unwrap();

        assert_eq!(window.days, 7);
        assert_eq!(window.start, utc(2024, 6, 10, 0, 0));
        assert_eq!(
            window.end,
            utc(2024, 6, 16, 23, 59) + Duration::milliseconds(59_999)
        );
    }

    #[test]
    fn test_window_rejects_out_of_range_days() {
        let now = utc(2024, 6, 10, 0, 0);
        assert!(matches!(
            EventWindow::compute(Some(0), None, now, Tz::UTC),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            EventWindow::compute(Some(366), None, now, Tz::UTC),
            Err(AppError::BadRequest(_))
        ));
        assert!(EventWindow::compute(Some(365), None, now, Tz::UTC).is_ok());
    }

    #[test]
    fn test_window_follows_configured_timezone() {
        let tz = chrono_tz::America::Los_Angeles;
        // 02:00 UTC on the 11th is still the 10th in Los Angeles (UTC-7)
        let window =
            EventWindow::compute(Some(1), Some(utc(2024, 6, 11, 2, 0)), utc(2024, 1, 1, 0, 0), tz)
                .unwrap();

        assert_eq!(window.start, utc(2024, 6, 10, 7, 0));
        assert_eq!(
            window.end,
            utc(2024, 6, 11, 6, 59) + Duration::milliseconds(59_999)
        );
    }

    #[test]
    fn test_window_across_dst_gap_starts_after_gap() {
        // Midnight does not exist in Santiago on 2024-09-08 (clocks jump to 01:00)
        let tz = chrono_tz::America::Santiago;
        let window =
            EventWindow::compute(Some(1), Some(utc(2024, 9, 8, 12, 0)), utc(2024, 1, 1, 0, 0), tz)
                .unwrap();

        assert_eq!(window.start, utc(2024, 9, 8, 4, 0));
    }

    #[test]
    fn test_group_by_day() {
        let events = vec![
            event("b", utc(2024, 6, 11, 8, 0)),
            event("a", utc(2024, 6, 10, 9, 0)),
            event("c", utc(2024, 6, 10, 7, 0)),
        ];

        let groups = group_events(events, Grouping::Day, Tz::UTC);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key(), "2024-06-10");
        let ids: Vec<&str> = groups[0].events().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
        assert_eq!(groups[1].key(), "2024-06-11");
    }

    #[test]
    fn test_group_by_week_is_sunday_aligned() {
        let events = vec![
            // Monday
            event("mon", utc(2024, 6, 10, 9, 0)),
            // Wednesday of the following week
            event("wed", utc(2024, 6, 19, 9, 0)),
            // Sunday starts its own week
            event("sun", utc(2024, 6, 16, 9, 0)),
            // Saturday closes the first week
            event("sat", utc(2024, 6, 15, 23, 0)),
        ];

        let groups = group_events(events, Grouping::Week, Tz::UTC);

        let keys: Vec<&str> = groups.iter().map(|g| g.key()).collect();
        assert_eq!(keys, vec!["2024-06-09", "2024-06-16"]);
        let first: Vec<&str> = groups[0].events().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(first, vec!["mon", "sat"]);
        let second: Vec<&str> = groups[1].events().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(second, vec!["sun", "wed"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let at = utc(2024, 6, 10, 9, 0);
        let events = vec![event("first", at), event("second", at), event("third", at)];

        let groups = group_events(events, Grouping::Day, Tz::UTC);

        let ids: Vec<&str> = groups[0].events().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_empty_input_yields_no_groups() {
        assert!(group_events(Vec::new(), Grouping::Week, Tz::UTC).is_empty());
    }

    #[test]
    fn test_group_keys_use_local_date() {
        let tz = chrono_tz::Asia::Tokyo;
        // 20:00 UTC on Saturday the 15th is Sunday the 16th in Tokyo
        let events = vec![event("late", utc(2024, 6, 15, 20, 0))];

        let by_day = group_events(events.clone(), Grouping::Day, tz);
        assert_eq!(by_day[0].key(), "2024-06-16");

        let by_week = group_events(events, Grouping::Week, tz);
        assert_eq!(by_week[0].key(), "2024-06-16");
    }

    #[test]
    fn test_group_serialization_shape() {
        let groups = vec![
            group_events(vec![event("a", utc(2024, 6, 10, 9, 0))], Grouping::Day, Tz::UTC),
            group_events(vec![event("a", utc(2024, 6, 10, 9, 0))], Grouping::Week, Tz::UTC),
        ];

        let day = serde_json::to_value(&groups[0][0]).unwrap();
        assert_eq!(day["date"], "2024-06-10");
        assert_eq!(day["events"][0]["start_time"], "2024-06-10T09:00:00.000Z");

        let week = serde_json::to_value(&groups[1][0]).unwrap();
        assert_eq!(week["weekStart"], "2024-06-09");
        assert!(week.get("date").is_none());
    }

    #[test]
    fn test_grouping_threshold() {
        assert_eq!(Grouping::for_days(1), Grouping::Day);
        assert_eq!(Grouping::for_days(7), Grouping::Day);
        assert_eq!(Grouping::for_days(8), Grouping::Week);
        assert_eq!(Grouping::for_days(365), Grouping::Week);
    }
}
