//! Standard 5-field cron expressions (`minute hour day-of-month month day-of-week`).
//!
//! Field grammar is delegated to the `cron` crate, which expects a leading
//! seconds field, numbers weekdays 1-7 from Sunday, and requires day-of-month
//! and day-of-week to both match. [`CronExpr::parse`] bridges the notations:
//! when both day fields are restricted, a tick on either one fires.

use crate::error::{ReadmeError, Result};
use chrono::{DateTime, Utc};
use cron::Schedule;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct CronExpr {
    source: String,
    /// One schedule, or two when day-of-month and day-of-week are OR-ed.
    schedules: Vec<Schedule>,
}

impl CronExpr {
    pub fn parse(expression: &str) -> Result<Self> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(invalid(
                expression,
                format!("expected 5 fields, found {}", fields.len()),
            ));
        }
        let (minute, hour, dom, month) = (fields[0], fields[1], fields[2], fields[3]);
        let dow = translate_weekdays(fields[4]).map_err(|reason| invalid(expression, reason))?;

        let variants = if is_restricted(dom) && is_restricted(fields[4]) {
            vec![(dom, "*"), ("*", dow.as_str())]
        } else {
            vec![(dom, dow.as_str())]
        };
        let schedules = variants
            .into_iter()
            .map(|(dom, dow)| {
                Schedule::from_str(&format!("0 {minute} {hour} {dom} {month} {dow}"))
                    .map_err(|e| invalid(expression, e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            source: fields.join(" "),
            schedules,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Next `count` tick times strictly after `after`.
    pub fn upcoming(&self, after: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        let mut ticks: Vec<DateTime<Utc>> = self
            .schedules
            .iter()
            .flat_map(|s| s.after(&after).take(count))
            .collect();
        ticks.sort();
        ticks.dedup();
        ticks.truncate(count);
        ticks
    }

    /// Human-readable summary for the common shapes; the raw expression otherwise.
    pub fn describe(&self) -> String {
        let f: Vec<&str> = self.source.split(' ').collect();
        let rest_any = f[2] == "*" && f[3] == "*" && f[4] == "*";
        if !rest_any {
            return self.source.clone();
        }
        match (f[0], f[1]) {
            ("*", "*") => "every minute".to_string(),
            (m, "*") if m.starts_with("*/") => match m[2..].parse::<u32>() {
                Ok(1) => "every minute".to_string(),
                Ok(n) => format!("every {n} minutes"),
                Err(_) => self.source.clone(),
            },
            (m, "*") if m.parse::<u32>().is_ok() => format!("hourly at minute {m}"),
            (m, h) => match (m.parse::<u32>(), h.parse::<u32>()) {
                (Ok(m), Ok(h)) => format!("daily at {h:02}:{m:02}"),
                _ => self.source.clone(),
            },
        }
    }
}

impl fmt::Display for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for CronExpr {
    type Err = ReadmeError;

    fn from_str(s: &str) -> Result<Self> {
        CronExpr::parse(s)
    }
}

/// Summary used by `workflow schedule` and `--json` output.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleSummary {
    pub cron: String,
    pub description: String,
    pub upcoming: Vec<DateTime<Utc>>,
}

impl ScheduleSummary {
    pub fn new(expr: &CronExpr, after: DateTime<Utc>, count: usize) -> Self {
        Self {
            cron: expr.as_str().to_string(),
            description: expr.describe(),
            upcoming: expr.upcoming(after, count),
        }
    }
}

fn invalid(expression: &str, reason: impl Into<String>) -> ReadmeError {
    ReadmeError::InvalidCron {
        expression: expression.to_string(),
        reason: reason.into(),
    }
}

/// A day field starting with `*` (including `*/n`) leaves the other day field
/// in charge; anything else restricts it.
fn is_restricted(field: &str) -> bool {
    !field.starts_with('*')
}

/// Rewrite numeric weekdays from 0-7 (Sunday = 0 or 7) to the 1-7 numbering
/// (Sunday = 1). Numeric ranges are expanded to explicit lists so a range
/// ending on Sunday 7 never wraps. Names and `*` pass through.
fn translate_weekdays(field: &str) -> std::result::Result<String, String> {
    let mut days = BTreeSet::new();
    let mut passthrough = Vec::new();

    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((r, s)) => (r, Some(s)),
            None => (part, None),
        };
        if range == "*" {
            passthrough.push(part.to_string());
            continue;
        }

        let (lo, hi) = match range.split_once('-') {
            Some((a, b)) => match (a.parse::<u32>(), b.parse::<u32>()) {
                (Ok(lo), Ok(hi)) => (lo, hi),
                (Err(_), Err(_)) => {
                    passthrough.push(part.to_string());
                    continue;
                }
                _ => return Err(format!("day-of-week '{range}' mixes names and numbers")),
            },
            None => match range.parse::<u32>() {
                Ok(n) if step.is_some() => (n, 7),
                Ok(n) => (n, n),
                Err(_) => {
                    passthrough.push(part.to_string());
                    continue;
                }
            },
        };
        if let Some(n) = [lo, hi].into_iter().find(|n| *n > 7) {
            return Err(format!("day-of-week {n} out of range 0-7"));
        }
        if lo > hi {
            return Err(format!("day-of-week range {lo}-{hi} is reversed"));
        }
        let step = match step {
            Some(s) => s
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| format!("invalid day-of-week step '{s}'"))?,
            None => 1,
        };
        days.extend((lo..=hi).step_by(step).map(|d| d % 7 + 1));
    }

    let mut out: Vec<String> = days.iter().map(u32::to_string).collect();
    out.extend(passthrough);
    Ok(out.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike, Weekday};

    #[test]
    fn every_thirty_minutes() {
        let expr = CronExpr::parse("*/30 * * * *").unwrap();
        assert_eq!(expr.describe(), "every 30 minutes");

        let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 7, 0).unwrap();
        let ticks = expr.upcoming(start, 4);
        assert_eq!(ticks.len(), 4);
        assert_eq!(ticks[0], Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap());
        for pair in ticks.windows(2) {
            assert_eq!((pair[1] - pair[0]).num_minutes(), 30);
        }
    }

    #[test]
    fn rejects_wrong_field_count() {
        let err = CronExpr::parse("0 */30 * * * *").unwrap_err();
        assert!(err.to_string().contains("expected 5 fields"));
        assert!(CronExpr::parse("").is_err());
    }

    #[test]
    fn rejects_garbage_fields() {
        assert!(CronExpr::parse("*/30 * * * banana").is_err());
        assert!(CronExpr::parse("61 * * * *").is_err());
        assert!(CronExpr::parse("0 0 * * 9").is_err());
    }

    #[test]
    fn sunday_is_zero() {
        let expr = CronExpr::parse("0 12 * * 0").unwrap();
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let next = expr.upcoming(start, 1)[0];
        assert_eq!(next.weekday(), Weekday::Sun);
        assert_eq!(next.hour(), 12);
    }

    #[test]
    fn weekday_ranges_translate() {
        assert_eq!(translate_weekdays("1-5").unwrap(), "2,3,4,5,6");
        assert_eq!(translate_weekdays("0,7").unwrap(), "1");
        assert_eq!(translate_weekdays("5-7").unwrap(), "1,6,7");
        assert_eq!(translate_weekdays("1-7/2").unwrap(), "1,2,4,6");
        assert_eq!(translate_weekdays("*/2").unwrap(), "*/2");
        assert_eq!(translate_weekdays("MON-FRI").unwrap(), "MON-FRI");
        assert!(translate_weekdays("5-2").is_err());
        assert!(translate_weekdays("MON-5").is_err());
    }

    #[test]
    fn range_ending_on_sunday_seven() {
        let expr = CronExpr::parse("0 0 * * 5-7").unwrap();
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let days: Vec<Weekday> = expr.upcoming(start, 4).iter().map(|t| t.weekday()).collect();
        assert_eq!(
            days,
            vec![Weekday::Fri, Weekday::Sat, Weekday::Sun, Weekday::Fri]
        );
    }

    #[test]
    fn restricted_day_fields_fire_on_either() {
        let expr = CronExpr::parse("0 0 1 * 1").unwrap();
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let day = |d: u32| Utc.with_ymd_and_hms(2024, d / 100, d % 100, 0, 0, 0).unwrap();
        assert_eq!(
            expr.upcoming(start, 6),
            vec![day(506), day(513), day(520), day(527), day(601), day(603)]
        );
    }

    #[test]
    fn starred_day_of_month_keeps_weekday_only() {
        let expr = CronExpr::parse("0 0 */2 * 1").unwrap();
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        for tick in expr.upcoming(start, 3) {
            assert_eq!(tick.weekday(), Weekday::Mon);
            assert_eq!(tick.day() % 2, 1);
        }
    }

    #[test]
    fn describe_common_shapes() {
        assert_eq!(CronExpr::parse("* * * * *").unwrap().describe(), "every minute");
        assert_eq!(
            CronExpr::parse("15 * * * *").unwrap().describe(),
            "hourly at minute 15"
        );
        assert_eq!(
            CronExpr::parse("5 7 * * *").unwrap().describe(),
            "daily at 07:05"
        );
        assert_eq!(
            CronExpr::parse("0 0 1 * *").unwrap().describe(),
            "0 0 1 * *"
        );
    }

    #[test]
    fn normalizes_whitespace() {
        let expr: CronExpr = "*/30   *  * * *".parse().unwrap();
        assert_eq!(expr.to_string(), "*/30 * * * *");
    }
}
