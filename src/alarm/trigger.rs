use chrono::{DateTime, Duration, Local, LocalResult, NaiveDateTime, NaiveTime, TimeZone};

/// Next instant at which an alarm for `time` should fire, strictly after
/// `now`: today at `time` if that is still ahead, otherwise tomorrow.
pub fn next_trigger(time: NaiveTime, now: DateTime<Local>) -> DateTime<Local> {
    next_trigger_in_tz(time, &now, &Local)
}

pub(crate) fn next_trigger_in_tz<Tz>(time: NaiveTime, now: &DateTime<Tz>, timezone: &Tz) -> DateTime<Tz>
where
    Tz: TimeZone,
    Tz::Offset: Copy,
{
    let today = now.with_timezone(timezone).date_naive();
    let candidate = resolve_local_datetime(timezone, today.and_time(time));
    if candidate > *now {
        return candidate;
    }

    let tomorrow = today.succ_opt().unwrap_or(today);
    resolve_local_datetime(timezone, tomorrow.and_time(time))
}

/// Ambiguous local times take the earlier instant; times skipped by a DST
/// gap move forward to the first instant after the gap.
fn resolve_local_datetime<Tz>(timezone: &Tz, naive: NaiveDateTime) -> DateTime<Tz>
where
    Tz: TimeZone,
    Tz::Offset: Copy,
{
    match timezone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(first, _second) => first,
        LocalResult::None => {
            let mut probe = naive;
            for _ in 0..(24 * 4) {
                probe += Duration::minutes(15);
                if let Some(dt) = timezone.from_local_datetime(&probe).earliest() {
                    return dt;
                }
            }
            timezone.from_utc_datetime(&naive)
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Timelike};
    use chrono_tz::America::New_York;

    use super::*;

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Local> {
        Local
            .from_local_datetime(
                &NaiveDate::from_ymd_opt(y, m, d)
                    .unwrap()
                    .and_hms_opt(h, min, 0)
                    .unwrap(),
            )
            .earliest()
            .unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn past_time_rolls_to_tomorrow() {
        let now = local(2025, 3, 10, 14, 3);
        let next = next_trigger(hm(12, 30), now);
        assert_eq!(next.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 11).unwrap());
        assert_eq!((next.hour(), next.minute()), (12, 30));
    }

    #[test]
    fn future_time_fires_today() {
        let now = local(2025, 3, 10, 5, 0);
        let next = next_trigger(hm(5, 45), now);
        assert_eq!(next.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
        assert_eq!((next.hour(), next.minute(), next.second()), (5, 45, 0));
    }

    #[test]
    fn same_minute_rolls_forward_instead_of_firing_now() {
        let now = local(2025, 3, 10, 5, 45);
        let next = next_trigger(hm(5, 45), now);
        assert!(next > now);
        assert_eq!(next.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 11).unwrap());

        let just_after = now + Duration::milliseconds(250);
        assert_eq!(next_trigger(hm(5, 45), just_after), next);
    }

    #[test]
    fn trigger_is_always_ahead_and_never_beyond_tomorrow() {
        let base = local(2025, 6, 1, 0, 0);
        for step in 0..(24 * 4) {
            let now = base + Duration::minutes(step * 15 + 7);
            for (h, m) in [(0, 0), (2, 0), (5, 12), (12, 30), (18, 45), (23, 59)] {
                let next = next_trigger(hm(h, m), now);
                assert!(next > now);
                let days = (next.date_naive() - now.date_naive()).num_days();
                assert!(days == 0 || days == 1, "{days} days ahead");
                assert_eq!((next.hour(), next.minute()), (h, m));
            }
        }
    }

    #[test]
    fn dst_gap_moves_past_the_gap() {
        // 2025-03-09 02:00..03:00 does not exist in New York.
        let now = New_York
            .from_local_datetime(&NaiveDate::from_ymd_opt(2025, 3, 9).unwrap().and_hms_opt(1, 0, 0).unwrap())
            .single()
            .unwrap();
        let next = next_trigger_in_tz(hm(2, 30), &now, &New_York);
        assert!(next > now);
        assert_eq!(next.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 9).unwrap());
        assert_eq!(next.hour(), 3);
    }

    #[test]
    fn dst_overlap_takes_earlier_instant() {
        // 2025-11-02 01:30 happens twice in New York.
        let now = New_York
            .from_local_datetime(&NaiveDate::from_ymd_opt(2025, 11, 2).unwrap().and_hms_opt(0, 0, 0).unwrap())
            .single()
            .unwrap();
        let next = next_trigger_in_tz(hm(1, 30), &now, &New_York);
        let expected = match New_York.from_local_datetime(
            &NaiveDate::from_ymd_opt(2025, 11, 2).unwrap().and_hms_opt(1, 30, 0).unwrap(),
        ) {
            LocalResult::Ambiguous(first, _) => first,
            _ => panic!("expected ambiguous local time"),
        };
        assert_eq!(next, expected);
    }
}
