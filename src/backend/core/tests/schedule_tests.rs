//! Integration tests for fluent schedule declarations.
//!
//! Each test builds a schedule the way a host would at startup and checks the
//! fire dates it previews.

use chrono::{DateTime, Month, TimeZone, Utc, Weekday};
use std::time::Duration;
use tempo_core::schedule::{Day, ScheduleBuilder, ScheduleDescriptor, ScheduleError, Time};

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

#[test]
fn test_weekly_in_time_zone() {
    let schedule = ScheduleBuilder::new()
        .weekly()
        .on(Weekday::Mon)
        .at("9am".parse().unwrap())
        .in_time_zone(chrono_tz::America::New_York)
        .build()
        .unwrap();

    // 2019-01-01 is a Tuesday; 09:00 EST is 14:00 UTC
    assert_eq!(
        schedule.upcoming(utc(2019, 1, 1, 0, 0, 0), 2).unwrap(),
        vec![utc(2019, 1, 7, 14, 0, 0), utc(2019, 1, 14, 14, 0, 0)]
    );
}

#[test]
fn test_yearly_birthday() {
    let schedule = ScheduleBuilder::new()
        .yearly()
        .in_month(Month::May)
        .on(Day::Number(23))
        .unwrap()
        .at(Time::noon())
        .build()
        .unwrap();

    assert_eq!(
        schedule.upcoming(utc(2019, 1, 1, 0, 0, 0), 2).unwrap(),
        vec![utc(2019, 5, 23, 12, 0, 0), utc(2020, 5, 23, 12, 0, 0)]
    );
}

#[test]
fn test_monthly_day_skips_short_months() {
    let schedule = ScheduleBuilder::new()
        .monthly()
        .on(Day::Number(31))
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(
        schedule.upcoming(utc(2019, 2, 1, 0, 0, 0), 2).unwrap(),
        vec![utc(2019, 3, 31, 0, 0, 0), utc(2019, 5, 31, 0, 0, 0)]
    );
}

#[test]
fn test_hourly_in_half_hour_offset_zone() {
    // Kolkata is UTC+05:30, so local minute 15 lands on UTC minute 45
    let schedule = ScheduleBuilder::new()
        .hourly()
        .at(15)
        .unwrap()
        .in_time_zone(chrono_tz::Asia::Kolkata)
        .build()
        .unwrap();

    assert_eq!(
        schedule.upcoming(utc(2019, 1, 1, 0, 0, 0), 2).unwrap(),
        vec![utc(2019, 1, 1, 0, 45, 0), utc(2019, 1, 1, 1, 45, 0)]
    );
}

#[test]
fn test_every_spreads_slots_across_interval() {
    let schedule = ScheduleBuilder::new()
        .every(Duration::from_secs(20 * 60), Duration::from_secs(3600))
        .unwrap()
        .build()
        .unwrap();
    assert_eq!(schedule.len(), 3);

    let start = utc(2019, 1, 1, 0, 0, 0);
    assert_eq!(
        schedule.upcoming(start, 4).unwrap(),
        vec![
            utc(2019, 1, 1, 0, 0, 0),
            utc(2019, 1, 1, 0, 20, 0),
            utc(2019, 1, 1, 0, 40, 0),
            utc(2019, 1, 1, 1, 0, 0),
        ]
    );
}

#[test]
fn test_exact_date_fires_once() {
    let date = utc(2030, 6, 1, 12, 0, 0);
    let schedule = ScheduleBuilder::new().at(date).build().unwrap();

    assert_eq!(schedule.descriptors(), &[ScheduleDescriptor::Exact(date)]);
    assert_eq!(schedule.upcoming(utc(2030, 1, 1, 0, 0, 0), 3).unwrap(), vec![date]);
}

#[test]
fn test_nanosecond_offset() {
    let schedule = ScheduleBuilder::new()
        .minutely()
        .at(30)
        .unwrap()
        .nanosecond(500_000_000)
        .unwrap()
        .build()
        .unwrap();

    let next = schedule.upcoming(utc(2019, 1, 1, 0, 0, 0), 1).unwrap()[0];
    assert_eq!(next, utc(2019, 1, 1, 0, 0, 30) + chrono::Duration::milliseconds(500));
}

#[test]
fn test_invalid_declarations() {
    assert!(matches!(
        ScheduleBuilder::new().monthly().on(Day::Last),
        Err(ScheduleError::LastDayOfMonthUnsupported)
    ));
    assert!(matches!(
        ScheduleBuilder::new().monthly().on(Day::Number(32)),
        Err(ScheduleError::Constraint(_))
    ));
    assert!(matches!("24:00".parse::<Time>(), Err(ScheduleError::InvalidTime(_))));
    assert!(matches!(
        ScheduleBuilder::new().yearly().in_month(Month::February).on(Day::Number(30)).unwrap().build(),
        Err(ScheduleError::Resolution(_))
    ));
}
