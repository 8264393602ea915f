//! Pure calendar math for the orchestrator: which week is it, and when does
//! the next spread refresh run. Both take `now` as an argument so callers
//! can inject a clock.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use pickem_server_domain::week::WEEKS_PER_SEASON;

/// Derive the current regular-season week from the configured week-1 date.
///
/// Days are counted with floor division, so any instant before week-1
/// midnight maps to week 0 (preseason). Otherwise week = days/7 + 1,
/// clamped to the 18-week season.
pub fn current_week(now: DateTime<Utc>, week1_date: NaiveDate) -> i32 {
    let week1_start = week1_date.and_time(NaiveTime::MIN).and_utc();
    let days = (now - week1_start).num_seconds().div_euclid(86_400);
    if days < 0 {
        return 0;
    }
    (((days / 7) + 1) as i32).min(WEEKS_PER_SEASON)
}

/// Next spread-refresh instant: the coming Monday at 23:00 in the configured
/// timezone. An unknown timezone name falls back to UTC with a warning.
/// Exactly 23:00 on a Monday schedules the following Monday.
pub fn next_spread_refresh(now: DateTime<Utc>, tz_name: &str) -> DateTime<Utc> {
    match tz_name.parse::<Tz>() {
        Ok(tz) => next_monday_11pm(now.with_timezone(&tz)).with_timezone(&Utc),
        Err(_) => {
            log::warn!("unknown timezone '{tz_name}', scheduling spread refresh in UTC");
            next_monday_11pm(now)
        }
    }
}

fn next_monday_11pm<Z: TimeZone>(now: DateTime<Z>) -> DateTime<Z> {
    let eleven_pm = NaiveTime::from_hms_opt(23, 0, 0).unwrap();
    let days_until = u64::from((7 - now.weekday().num_days_from_monday()) % 7);
    let tz = now.timezone();

    let mut date = now.date_naive() + Days::new(days_until);
    loop {
        // earliest() skips nonexistent local times around DST transitions
        if let Some(candidate) = tz.from_local_datetime(&date.and_time(eleven_pm)).earliest()
            && candidate > now
        {
            return candidate;
        }
        date = date + Days::new(7);
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn week1() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 4).unwrap()
    }

    fn at_days(days: i64) -> DateTime<Utc> {
        week1().and_time(NaiveTime::MIN).and_utc() + Duration::days(days)
    }

    #[test]
    fn week_derivation_boundaries() {
        assert_eq!(current_week(at_days(-1), week1()), 0);
        assert_eq!(current_week(at_days(0), week1()), 1);
        assert_eq!(current_week(at_days(6), week1()), 1);
        assert_eq!(current_week(at_days(7), week1()), 2);
        assert_eq!(current_week(at_days(125), week1()), 18);
    }

    #[test]
    fn partial_days_floor_toward_preseason() {
        // one hour before week-1 midnight is still preseason
        assert_eq!(current_week(at_days(0) - Duration::hours(1), week1()), 0);
        assert_eq!(current_week(at_days(0) + Duration::hours(1), week1()), 1);
    }

    #[test]
    fn late_season_clamps_to_week_18() {
        assert_eq!(current_week(at_days(400), week1()), 18);
    }

    fn new_york(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        let tz: Tz = "America/New_York".parse().unwrap();
        tz.with_ymd_and_hms(y, mo, d, h, mi, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn monday_just_before_eleven_pm_schedules_same_day() {
        // 2025-09-08 is a Monday
        let now = new_york(2025, 9, 8, 22, 59);
        let next = next_spread_refresh(now, "America/New_York");
        assert_eq!(next, new_york(2025, 9, 8, 23, 0));
    }

    #[test]
    fn monday_at_eleven_pm_exactly_schedules_next_week() {
        let now = new_york(2025, 9, 8, 23, 0);
        let next = next_spread_refresh(now, "America/New_York");
        assert_eq!(next, new_york(2025, 9, 15, 23, 0));
    }

    #[test]
    fn midweek_schedules_the_coming_monday() {
        // 2025-09-10 is a Wednesday
        let now = new_york(2025, 9, 10, 12, 0);
        let next = next_spread_refresh(now, "America/New_York");
        assert_eq!(next, new_york(2025, 9, 15, 23, 0));
    }

    #[test]
    fn unknown_timezone_falls_back_to_utc() {
        let now = Utc.with_ymd_and_hms(2025, 9, 10, 12, 0, 0).unwrap();
        let next = next_spread_refresh(now, "Not/AZone");
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 9, 15, 23, 0, 0).unwrap());
    }
}
