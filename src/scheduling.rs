//! Turns a doctor's availability rules into concrete bookable slots.
//!
//! All civil-calendar decisions (which weekday/month/year a moment falls on)
//! are made at the clinic's configured fixed offset, for both slot generation
//! and booking validation. Day iteration is calendar arithmetic, so a range
//! that crosses a DST boundary still advances one civil day at a time.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, TimeZone, Utc};

use crate::models::{AvailabilityRule, DAY_NAMES, Recurrence, Slot};

/// 0 = Sunday .. 6 = Saturday, matching the stored rule convention.
pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// The civil date a UTC moment falls on at the clinic offset.
pub fn civil_day(moment: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    moment.with_timezone(&offset).date_naive()
}

/// Does this rule open any hours on the given civil day?
pub fn rule_applies_on(rule: &AvailabilityRule, day: NaiveDate) -> bool {
    match &rule.recurrence {
        Recurrence::Weekly {
            day_of_week: dow,
            month,
            year,
        } => {
            *dow == day_of_week(day)
                && month.is_none_or(|m| u32::from(m) == day.month0())
                && year.is_none_or(|y| y == day.year())
        }
        Recurrence::Date { date } => *date == day,
    }
}

/// First rule covering the civil day of `moment`, in the doctor's rule order.
pub fn find_covering_rule<'a>(
    rules: &'a [AvailabilityRule],
    moment: DateTime<Utc>,
    offset: FixedOffset,
) -> Option<&'a AvailabilityRule> {
    let day = civil_day(moment, offset);
    rules.iter().find(|r| rule_applies_on(r, day))
}

/// The UTC instant of `time` on civil `day` at the clinic offset.
pub fn moment_on(day: NaiveDate, time: chrono::NaiveTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&day.and_time(time))
        .single()
        .map(|d| d.with_timezone(&Utc))
}

/// Walk every day of `range_start..=range_end`, select the rules applying to
/// each, and emit whole duration-sized slots. `booked_starts` are the start
/// moments of the doctor's existing appointments in the query range; a slot
/// is booked iff its start matches one exactly. Overlapping rules each emit
/// their own slots so operator misconfiguration stays visible.
pub fn generate_slots(
    rules: &[AvailabilityRule],
    range_start: NaiveDate,
    range_end: NaiveDate,
    booked_starts: &[DateTime<Utc>],
    offset: FixedOffset,
) -> Vec<Slot> {
    let mut slots = Vec::new();
    let mut day = range_start;
    while day <= range_end {
        for rule in rules.iter().filter(|r| rule_applies_on(r, day)) {
            slots.extend(slots_for_rule(rule, day, booked_starts, offset));
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    slots
}

fn slots_for_rule(
    rule: &AvailabilityRule,
    day: NaiveDate,
    booked_starts: &[DateTime<Utc>],
    offset: FixedOffset,
) -> Vec<Slot> {
    let (Some(open), Some(close)) = (
        moment_on(day, rule.start_time, offset),
        moment_on(day, rule.end_time, offset),
    ) else {
        return Vec::new();
    };

    let step = Duration::minutes(i64::from(rule.duration_minutes));
    let day_name = DAY_NAMES[usize::from(day_of_week(day))];
    let kind = rule.kind();

    let mut out = Vec::new();
    let mut cursor = open;
    // whole slots only: stop before any slot whose end would pass the close time
    while cursor + step <= close {
        out.push(Slot {
            start: cursor,
            end: cursor + step,
            booked: booked_starts.contains(&cursor),
            day_name,
            duration_minutes: rule.duration_minutes,
            rule_kind: kind,
        });
        cursor += step;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RuleKind;
    use chrono::NaiveTime;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn weekly(dow: u8, start: NaiveTime, end: NaiveTime, minutes: i32) -> AvailabilityRule {
        AvailabilityRule {
            recurrence: Recurrence::Weekly {
                day_of_week: dow,
                month: None,
                year: None,
            },
            start_time: start,
            end_time: end,
            duration_minutes: minutes,
        }
    }

    fn date_rule(date: NaiveDate, start: NaiveTime, end: NaiveTime, minutes: i32) -> AvailabilityRule {
        AvailabilityRule {
            recurrence: Recurrence::Date { date },
            start_time: start,
            end_time: end,
            duration_minutes: minutes,
        }
    }

    // 2026-08-24 is a Monday
    const MONDAY: &str = "2026-08-24";

    fn monday() -> NaiveDate {
        MONDAY.parse().unwrap()
    }

    #[test]
    fn no_rules_means_no_slots() {
        let slots = generate_slots(&[], monday(), monday() + Duration::days(30), &[], utc());
        assert!(slots.is_empty());
    }

    #[test]
    fn weekly_rule_yields_whole_slots_on_its_day() {
        let rules = [weekly(1, t(9, 0), t(10, 0), 30)];
        let slots = generate_slots(&rules, monday(), monday(), &[], utc());

        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].start, moment_on(monday(), t(9, 0), utc()).unwrap());
        assert_eq!(slots[0].end, moment_on(monday(), t(9, 30), utc()).unwrap());
        assert_eq!(slots[1].start, moment_on(monday(), t(9, 30), utc()).unwrap());
        assert_eq!(slots[1].end, moment_on(monday(), t(10, 0), utc()).unwrap());
        assert!(slots.iter().all(|s| !s.booked));
        assert!(slots.iter().all(|s| s.day_name == "Mon"));
        assert!(slots.iter().all(|s| s.rule_kind == RuleKind::Weekly));
    }

    #[test]
    fn weekly_rule_skips_other_days() {
        let rules = [weekly(1, t(9, 0), t(10, 0), 30)];
        let tuesday = monday() + Duration::days(1);
        let slots = generate_slots(&rules, tuesday, tuesday + Duration::days(5), &[], utc());
        assert!(slots.is_empty());
    }

    #[test]
    fn no_partial_trailing_slot() {
        // 75 minutes of open time at 30-minute granularity: two slots, not three
        let rules = [weekly(1, t(9, 0), t(10, 15), 30)];
        let slots = generate_slots(&rules, monday(), monday(), &[], utc());
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[1].end, moment_on(monday(), t(10, 0), utc()).unwrap());
    }

    #[test]
    fn booked_flag_matches_exact_start_only() {
        let rules = [weekly(1, t(9, 0), t(10, 0), 30)];
        let booked = [moment_on(monday(), t(9, 0), utc()).unwrap()];
        let slots = generate_slots(&rules, monday(), monday(), &booked, utc());
        assert!(slots[0].booked);
        assert!(!slots[1].booked);

        // one minute off a boundary flags nothing
        let off = [moment_on(monday(), t(9, 1), utc()).unwrap()];
        let slots = generate_slots(&rules, monday(), monday(), &off, utc());
        assert!(slots.iter().all(|s| !s.booked));
    }

    #[test]
    fn month_and_year_constraints_restrict_weekly_rules() {
        // August = month0 7
        let constrained = AvailabilityRule {
            recurrence: Recurrence::Weekly {
                day_of_week: 1,
                month: Some(7),
                year: Some(2026),
            },
            start_time: t(9, 0),
            end_time: t(9, 30),
            duration_minutes: 30,
        };
        assert!(rule_applies_on(&constrained, monday()));

        let september_monday: NaiveDate = "2026-09-07".parse().unwrap();
        assert!(!rule_applies_on(&constrained, september_monday));

        let wrong_year: NaiveDate = "2027-08-23".parse().unwrap(); // a Monday in Aug 2027
        assert!(!rule_applies_on(&constrained, wrong_year));
    }

    #[test]
    fn date_rule_matches_calendar_day_only() {
        let rules = [date_rule(monday(), t(14, 0), t(15, 0), 60)];
        let slots = generate_slots(&rules, monday(), monday() + Duration::days(2), &[], utc());
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].rule_kind, RuleKind::Date);
        assert_eq!(slots[0].duration_minutes, 60);
    }

    #[test]
    fn overlapping_rules_emit_independently() {
        let rules = [
            weekly(1, t(9, 0), t(10, 0), 30),
            weekly(1, t(9, 30), t(10, 30), 30),
        ];
        let slots = generate_slots(&rules, monday(), monday(), &[], utc());
        // 2 + 2 slots, duplicates preserved
        assert_eq!(slots.len(), 4);
        assert_eq!(slots[1].start, slots[2].start);
    }

    #[test]
    fn clinic_offset_decides_the_civil_day() {
        // UTC+5: 2026-08-23 21:00 UTC is already Monday 02:00 at the clinic
        let plus5 = FixedOffset::east_opt(5 * 3600).unwrap();
        let rules = [weekly(1, t(2, 0), t(3, 0), 30)];

        let sunday_utc: DateTime<Utc> = "2026-08-23T21:00:00Z".parse().unwrap();
        assert_eq!(civil_day(sunday_utc, plus5), monday());
        assert!(find_covering_rule(&rules, sunday_utc, plus5).is_some());
        assert!(find_covering_rule(&rules, sunday_utc, utc()).is_none());

        let slots = generate_slots(&rules, monday(), monday(), &[], plus5);
        assert_eq!(slots.len(), 2);
        // Monday 02:00 at UTC+5 is Sunday 21:00 UTC
        assert_eq!(slots[0].start, sunday_utc);
    }

    #[test]
    fn range_is_inclusive_of_both_endpoints() {
        let rules = [weekly(1, t(9, 0), t(9, 30), 30)];
        let prev_monday = monday() - Duration::days(7);
        let slots = generate_slots(&rules, prev_monday, monday(), &[], utc());
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].start, moment_on(prev_monday, t(9, 0), utc()).unwrap());
        assert_eq!(slots[1].start, moment_on(monday(), t(9, 0), utc()).unwrap());
    }
}
