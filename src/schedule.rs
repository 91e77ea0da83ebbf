//! Ingestion schedules
//!
//! A schedule is a standard five-field cron expression with an optional
//! start date. Validation rejects blank and unparsable expressions, and
//! expressions that fire more often than the configured minimum interval.

use chrono::{DateTime, Duration, Utc};
use croner::Cron;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Number of upcoming occurrences inspected for the interval check.
const LOOKAHEAD_OCCURRENCES: usize = 8;

/// Recurring-execution schedule attached to a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    /// Cron expression, e.g. `0 * * * *`
    pub repeat_frequency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
}

impl Schedule {
    pub fn new(repeat_frequency: impl Into<String>) -> Self {
        Self {
            repeat_frequency: repeat_frequency.into(),
            start_date: None,
        }
    }

    pub fn with_start_date(mut self, start_date: DateTime<Utc>) -> Self {
        self.start_date = Some(start_date);
        self
    }
}

/// Rules applied to ingestion schedules.
#[derive(Debug, Clone, Copy)]
pub struct SchedulePolicy {
    pub min_interval: Duration,
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        Self {
            min_interval: Duration::minutes(1),
        }
    }
}

impl SchedulePolicy {
    pub fn with_min_interval_minutes(minutes: u32) -> Self {
        Self {
            min_interval: Duration::minutes(i64::from(minutes)),
        }
    }

    /// Validate an optional schedule; `None` means the service is not scheduled.
    pub fn validate(&self, schedule: Option<&Schedule>) -> Result<()> {
        let Some(schedule) = schedule else {
            return Ok(());
        };

        let expression = schedule.repeat_frequency.trim();
        if expression.is_empty() {
            return Err(Error::InvalidInput(
                "Ingestion repeatFrequency must not be empty".to_string(),
            ));
        }

        let cron = Cron::new(expression).parse().map_err(|e| {
            Error::InvalidInput(format!(
                "Invalid ingestion repeatFrequency '{}': {}",
                expression, e
            ))
        })?;

        let from = schedule.start_date.unwrap_or_else(Utc::now);
        let shortest = shortest_gap(&cron, expression, from)?;
        if shortest < self.min_interval {
            return Err(Error::InvalidInput(format!(
                "Ingestion repeatFrequency '{}' is too short and must be at least {} minutes",
                expression,
                self.min_interval.num_minutes()
            )));
        }
        Ok(())
    }
}

/// Smallest gap between consecutive occurrences after `from`.
fn shortest_gap(cron: &Cron, expression: &str, from: DateTime<Utc>) -> Result<Duration> {
    let next = |at: &DateTime<Utc>| {
        cron.find_next_occurrence(at, false).map_err(|e| {
            Error::InvalidInput(format!(
                "Ingestion repeatFrequency '{}' never fires: {}",
                expression, e
            ))
        })
    };

    let mut previous = next(&from)?;
    let mut shortest: Option<Duration> = None;
    for _ in 0..LOOKAHEAD_OCCURRENCES {
        let current = next(&previous)?;
        let gap = current - previous;
        shortest = Some(shortest.map_or(gap, |s| s.min(gap)));
        previous = current;
    }
    Ok(shortest.unwrap_or_else(Duration::zero))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_valid_schedules() {
        let policy = SchedulePolicy::default();
        for expression in ["0 * * * *", "*/5 * * * *", "30 2 * * 1-5", "0 0 1 * *"] {
            assert!(
                policy.validate(Some(&Schedule::new(expression))).is_ok(),
                "{} should be accepted",
                expression
            );
        }
    }

    #[test]
    fn test_missing_schedule_is_accepted() {
        assert!(SchedulePolicy::default().validate(None).is_ok());
    }

    #[test]
    fn test_malformed_schedules() {
        let policy = SchedulePolicy::default();
        for expression in ["", "   ", "not a cron", "61 * * * *", "* * * *", "0 25 * * *"] {
            let err = policy.validate(Some(&Schedule::new(expression))).unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "{} should be rejected", expression);
        }
    }

    #[test]
    fn test_min_interval() {
        let policy = SchedulePolicy::with_min_interval_minutes(60);
        assert!(policy.validate(Some(&Schedule::new("0 * * * *"))).is_ok());

        let err = policy.validate(Some(&Schedule::new("*/5 * * * *"))).unwrap_err();
        assert!(err.to_string().contains("too short"));
    }

    #[test]
    fn test_irregular_gaps_use_shortest() {
        let policy = SchedulePolicy::with_min_interval_minutes(30);
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let schedule = Schedule::new("0,10 * * * *").with_start_date(start);
        assert!(policy.validate(Some(&schedule)).is_err());
    }

    #[test]
    fn test_schedule_json_shape() {
        let json = serde_json::to_value(Schedule::new("0 * * * *")).unwrap();
        assert_eq!(json["repeatFrequency"], "0 * * * *");
        assert!(json.get("startDate").is_none());
    }
}
