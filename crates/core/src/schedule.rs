use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use tracing::warn;

use crate::tenant::TenantConfig;

/// Zone assumed when a tenant does not name one. An unrecognized name falls
/// through to UTC.
pub const DEFAULT_TIMEZONE: &str = "Australia/Brisbane";

const DEFAULT_START: &str = "00:00";
const DEFAULT_END: &str = "23:59";

/// Whether the store is open at `instant` (or right now when `None`).
///
/// Manual mode short-circuits the schedule entirely. Otherwise the first
/// day-rule matching the weekday wins; no rule for the day means the
/// `default_enabled` setting decides. Start/end bounds are inclusive on both
/// ends. Malformed time fields resolve to `default_enabled` rather than
/// erroring, and malformed boolean settings lean open: a configuration typo
/// must not turn customers away.
pub fn is_open(config: &TenantConfig, instant: Option<DateTime<Utc>>) -> bool {
    let manual_mode = config.setting("manual_mode").is_some_and(is_true);
    let manual_enabled = flag_or_true(config.setting("manual_enabled"));
    let default_enabled = flag_or_true(config.setting("default_enabled"));

    if manual_mode {
        return manual_enabled;
    }

    let tz = resolve_timezone(config.setting("timezone"));
    let local = instant.unwrap_or_else(Utc::now).with_timezone(&tz);
    let today = weekday_code(local.weekday());

    let Some(rule) = config.schedule.iter().find(|rule| rule.day == today) else {
        return default_enabled;
    };

    if !flag_or_true(rule.enabled.as_deref()) {
        return false;
    }

    let start = rule.start.as_deref().filter(|v| !v.trim().is_empty()).unwrap_or(DEFAULT_START);
    let end = rule.end.as_deref().filter(|v| !v.trim().is_empty()).unwrap_or(DEFAULT_END);

    match (parse_time_of_day(start), parse_time_of_day(end)) {
        (Some(start), Some(end)) => {
            let now = local.time();
            start <= now && now <= end
        }
        _ => {
            warn!(
                day = %today,
                start = %start,
                end = %end,
                "schedule rule has unparseable time bounds, using default_enabled"
            );
            default_enabled
        }
    }
}

/// Resolves a named IANA zone, then the fixed default, then UTC.
pub fn resolve_timezone(name: Option<&str>) -> Tz {
    let name = name.map(str::trim).filter(|n| !n.is_empty()).unwrap_or(DEFAULT_TIMEZONE);
    name.parse().unwrap_or_else(|_| {
        warn!(timezone = %name, "unrecognized timezone, falling back to UTC");
        chrono_tz::UTC
    })
}

fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

fn is_true(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

// False only on an explicit "FALSE"; absent or malformed values lean open.
fn flag_or_true(value: Option<&str>) -> bool {
    !value.is_some_and(|v| v.trim().eq_ignore_ascii_case("false"))
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::is_open;
    use crate::tenant::{DayRule, TenantConfig};

    fn config_with(settings: &[(&str, &str)], schedule: Vec<DayRule>) -> TenantConfig {
        let mut config = TenantConfig::default();
        for (key, value) in settings {
            config.settings.insert((*key).to_owned(), (*value).to_owned());
        }
        config.schedule = schedule;
        config
    }

    fn monday_nine_to_five() -> Vec<DayRule> {
        vec![DayRule {
            day: "Mon".to_owned(),
            enabled: Some("TRUE".to_owned()),
            start: Some("09:00".to_owned()),
            end: Some("17:00".to_owned()),
        }]
    }

    // 2026-08-24 is a Monday; Brisbane is UTC+10 year-round.
    fn brisbane_monday(hhmmss: &str) -> DateTime<Utc> {
        format!("2026-08-24T{hhmmss}+10:00")
            .parse::<DateTime<chrono::FixedOffset>>()
            .expect("valid test instant")
            .with_timezone(&Utc)
    }

    #[test]
    fn manual_mode_true_wins_over_any_schedule() {
        let config = config_with(
            &[("manual_mode", "TRUE"), ("manual_enabled", "TRUE")],
            vec![DayRule { day: "Mon".to_owned(), enabled: Some("FALSE".to_owned()), ..DayRule::default() }],
        );
        assert!(is_open(&config, Some(brisbane_monday("03:00:00"))));

        let config = config_with(&[("manual_mode", "true"), ("manual_enabled", "FALSE")], vec![]);
        assert!(!is_open(&config, None));
    }

    #[test]
    fn open_within_window_inclusive_on_both_ends() {
        let config =
            config_with(&[("timezone", "Australia/Brisbane")], monday_nine_to_five());

        assert!(is_open(&config, Some(brisbane_monday("09:00:00"))));
        assert!(is_open(&config, Some(brisbane_monday("17:00:00"))));
        assert!(!is_open(&config, Some(brisbane_monday("17:01:00"))));
        assert!(!is_open(&config, Some(brisbane_monday("08:59:00"))));
    }

    #[test]
    fn day_without_rule_uses_default_enabled() {
        let tuesday = brisbane_monday("10:00:00") + chrono::Duration::days(1);

        let config =
            config_with(&[("timezone", "Australia/Brisbane")], monday_nine_to_five());
        assert!(is_open(&config, Some(tuesday)), "default_enabled defaults open");

        let config = config_with(
            &[("timezone", "Australia/Brisbane"), ("default_enabled", "FALSE")],
            monday_nine_to_five(),
        );
        assert!(!is_open(&config, Some(tuesday)));
    }

    #[test]
    fn disabled_day_rule_closes_regardless_of_window() {
        let mut schedule = monday_nine_to_five();
        schedule[0].enabled = Some("FALSE".to_owned());
        let config = config_with(&[("timezone", "Australia/Brisbane")], schedule);

        assert!(!is_open(&config, Some(brisbane_monday("12:00:00"))));
    }

    #[test]
    fn first_matching_day_rule_wins_over_duplicates() {
        let mut schedule = monday_nine_to_five();
        schedule.push(DayRule {
            day: "Mon".to_owned(),
            enabled: Some("FALSE".to_owned()),
            ..DayRule::default()
        });
        let config = config_with(&[("timezone", "Australia/Brisbane")], schedule);

        assert!(is_open(&config, Some(brisbane_monday("12:00:00"))));
    }

    #[test]
    fn malformed_time_bounds_fall_back_to_default_enabled() {
        let mut schedule = monday_nine_to_five();
        schedule[0].start = Some("soonish".to_owned());
        let config = config_with(
            &[("timezone", "Australia/Brisbane"), ("default_enabled", "FALSE")],
            schedule,
        );

        assert!(!is_open(&config, Some(brisbane_monday("12:00:00"))));
    }

    #[test]
    fn absent_time_bounds_default_to_whole_day() {
        let schedule = vec![DayRule { day: "Mon".to_owned(), ..DayRule::default() }];
        let config = config_with(&[("timezone", "Australia/Brisbane")], schedule);

        assert!(is_open(&config, Some(brisbane_monday("00:00:00"))));
        assert!(is_open(&config, Some(brisbane_monday("23:58:00"))));
    }

    #[test]
    fn malformed_enabled_flag_leans_open() {
        let mut schedule = monday_nine_to_five();
        schedule[0].enabled = Some("yes".to_owned());
        let config = config_with(&[("timezone", "Australia/Brisbane")], schedule);

        assert!(is_open(&config, Some(brisbane_monday("12:00:00"))));
    }

    #[test]
    fn unknown_timezone_falls_back_to_utc() {
        // 23:00 UTC on a Monday; in any fantasy zone this must evaluate in UTC.
        let instant = "2026-08-24T23:00:00Z".parse::<DateTime<Utc>>().expect("valid instant");
        let config = config_with(&[("timezone", "Mars/Olympus_Mons")], monday_nine_to_five());

        assert!(!is_open(&config, Some(instant)), "23:00 UTC is outside 09:00-17:00");
    }
}
