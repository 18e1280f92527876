//! When the update daemon runs

use crate::config::UpdateConfig;
use crate::ConfigResult;
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};

/// Trigger of the update daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Every day at the given UTC time
    Daily { at: NaiveTime },

    /// A single run at process start
    Once,
}

impl Schedule {
    /// Daily schedule at the configured `run-at`, or [`Schedule::Once`]
    pub fn from_config(update: &UpdateConfig, once: bool) -> ConfigResult<Self> {
        if once {
            return Ok(Self::Once);
        }
        Ok(Self::Daily {
            at: update.run_at_time()?,
        })
    }

    /// The next trigger strictly after `now`
    ///
    /// Returns `None` for [`Schedule::Once`], which has no recurring trigger.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Once => None,
            Self::Daily { at } => {
                let today = Utc.from_utc_datetime(&now.date_naive().and_time(*at));
                if today > now {
                    Some(today)
                } else {
                    Some(today + Duration::days(1))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> Schedule {
        Schedule::Daily {
            at: NaiveTime::from_hms_opt(h, m, 0).unwrap(),
        }
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_later_today() {
        let next = at(1, 0).next_run_after(utc("2024-03-10T00:30:00Z"));
        assert_eq!(next, Some(utc("2024-03-10T01:00:00Z")));
    }

    #[test]
    fn test_already_passed_today() {
        let next = at(1, 0).next_run_after(utc("2024-03-10T13:00:00Z"));
        assert_eq!(next, Some(utc("2024-03-11T01:00:00Z")));
    }

    #[test]
    fn test_exactly_now_moves_to_tomorrow() {
        let next = at(1, 0).next_run_after(utc("2024-03-10T01:00:00Z"));
        assert_eq!(next, Some(utc("2024-03-11T01:00:00Z")));
    }

    #[test]
    fn test_month_rollover() {
        let next = at(23, 30).next_run_after(utc("2024-02-29T23:45:00Z"));
        assert_eq!(next, Some(utc("2024-03-01T23:30:00Z")));
    }

    #[test]
    fn test_once_has_no_next_run() {
        assert_eq!(Schedule::Once.next_run_after(Utc::now()), None);
    }

    #[test]
    fn test_from_config() {
        let config = UpdateConfig::default();
        assert_eq!(Schedule::from_config(&config, true).unwrap(), Schedule::Once);
        assert_eq!(Schedule::from_config(&config, false).unwrap(), at(1, 0));

        let bad = UpdateConfig {
            run_at: "25:99".to_string(),
            ..UpdateConfig::default()
        };
        assert!(Schedule::from_config(&bad, false).is_err());
    }
}
