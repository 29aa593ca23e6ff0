//! Age classification of nodes.

use crate::node::Stat;
use std::fmt;
use std::str::FromStr;

/// Milliseconds in one day.
pub const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Which timestamp a node's age is measured from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AgeBasis {
    /// Creation time.
    Ctime,
    /// Last-modified time.
    #[default]
    Mtime,
}

impl AgeBasis {
    /// Selects the timestamp from a stat.
    pub fn timestamp(self, stat: &Stat) -> i64 {
        match self {
            Self::Ctime => stat.ctime,
            Self::Mtime => stat.mtime,
        }
    }
}

impl fmt::Display for AgeBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ctime => f.write_str("ctime"),
            Self::Mtime => f.write_str("mtime"),
        }
    }
}

impl FromStr for AgeBasis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ctime" => Ok(Self::Ctime),
            "mtime" => Ok(Self::Mtime),
            other => Err(format!("unknown age basis {other:?}, expected ctime or mtime")),
        }
    }
}

/// Whole days between the chosen timestamp and `now_ms`, rounded down.
pub fn age_days(stat: &Stat, now_ms: i64, basis: AgeBasis) -> i64 {
    now_ms
        .saturating_sub(basis.timestamp(stat))
        .div_euclid(MS_PER_DAY)
}

/// Returns true if the node is strictly older than `threshold_days`.
pub fn is_expired(stat: &Stat, now_ms: i64, basis: AgeBasis, threshold_days: u32) -> bool {
    age_days(stat, now_ms, basis) > i64::from(threshold_days)
}

/// A threshold paired with the timestamp it is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    /// Timestamp the age is measured from.
    pub basis: AgeBasis,
    /// Nodes strictly older than this many days are expired.
    pub threshold_days: u32,
}

impl ExpiryPolicy {
    /// Creates a policy.
    pub const fn new(basis: AgeBasis, threshold_days: u32) -> Self {
        Self {
            basis,
            threshold_days,
        }
    }

    /// Age of a node in whole days.
    pub fn age_days(&self, stat: &Stat, now_ms: i64) -> i64 {
        age_days(stat, now_ms, self.basis)
    }

    /// Classifies a node.
    pub fn is_expired(&self, stat: &Stat, now_ms: i64) -> bool {
        is_expired(stat, now_ms, self.basis, self.threshold_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    fn stat_aged(ctime_days: i64, mtime_days: i64) -> Stat {
        Stat {
            ctime: NOW - ctime_days * MS_PER_DAY,
            mtime: NOW - mtime_days * MS_PER_DAY,
            ..Stat::default()
        }
    }

    #[test]
    fn threshold_is_strict() {
        let policy = ExpiryPolicy::new(AgeBasis::Mtime, 30);
        assert!(!policy.is_expired(&stat_aged(0, 30), NOW));
        assert!(policy.is_expired(&stat_aged(0, 31), NOW));
    }

    #[test]
    fn partial_days_truncate() {
        let mut stat = stat_aged(0, 30);
        stat.mtime -= MS_PER_DAY - 1;
        assert_eq!(age_days(&stat, NOW, AgeBasis::Mtime), 30);
        assert!(!is_expired(&stat, NOW, AgeBasis::Mtime, 30));

        stat.mtime -= 1;
        assert_eq!(age_days(&stat, NOW, AgeBasis::Mtime), 31);
    }

    #[test]
    fn basis_selects_timestamp() {
        let stat = stat_aged(40, 2);
        assert!(is_expired(&stat, NOW, AgeBasis::Ctime, 30));
        assert!(!is_expired(&stat, NOW, AgeBasis::Mtime, 30));
    }

    #[test]
    fn future_timestamps_are_live() {
        let stat = Stat {
            mtime: NOW + 1,
            ..Stat::default()
        };
        assert_eq!(age_days(&stat, NOW, AgeBasis::Mtime), -1);
        assert!(!is_expired(&stat, NOW, AgeBasis::Mtime, 0));
    }

    #[test]
    fn zero_threshold_expires_after_one_full_day() {
        assert!(!is_expired(&stat_aged(0, 0), NOW, AgeBasis::Mtime, 0));
        assert!(is_expired(&stat_aged(0, 1), NOW, AgeBasis::Mtime, 0));
    }

    #[test]
    fn basis_parses() {
        assert_eq!("ctime".parse::<AgeBasis>().unwrap(), AgeBasis::Ctime);
        assert_eq!("MTIME".parse::<AgeBasis>().unwrap(), AgeBasis::Mtime);
        assert!("atime".parse::<AgeBasis>().is_err());
        assert_eq!(AgeBasis::Ctime.to_string(), "ctime");
    }
}
