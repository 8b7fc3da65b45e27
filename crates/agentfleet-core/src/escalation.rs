//! Escalation tiers for continuously blocked tasks.
//!
//! A tier is a pure function of how long a task has been blocked. The tier
//! stored on a task only ever moves up during one blocked episode.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Blocked duration at which tier 2 is reached.
pub const TIER2_AFTER_MINUTES: i64 = 30;

/// Blocked duration at which tier 3 is reached.
pub const TIER3_AFTER_MINUTES: i64 = 60;

/// Blocked duration at which tier 4 is reached.
pub const TIER4_AFTER_MINUTES: i64 = 4 * 60;

/// Discrete severity of a blocked task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum EscalationTier {
    /// Immediate: the assignee is told.
    Tier1,
    /// 30 minutes: the owners of the blocking tasks are told.
    Tier2,
    /// 60 minutes: the senior responder is told.
    Tier3,
    /// 4 hours: escalation channel, human attention required.
    Tier4,
}

impl EscalationTier {
    /// All tiers in ascending order.
    pub const ALL: [EscalationTier; 4] = [Self::Tier1, Self::Tier2, Self::Tier3, Self::Tier4];

    /// Tier reached after being blocked for `elapsed`.
    pub fn for_elapsed(elapsed: Duration) -> Self {
        if elapsed >= Duration::minutes(TIER4_AFTER_MINUTES) {
            Self::Tier4
        } else if elapsed >= Duration::minutes(TIER3_AFTER_MINUTES) {
            Self::Tier3
        } else if elapsed >= Duration::minutes(TIER2_AFTER_MINUTES) {
            Self::Tier2
        } else {
            Self::Tier1
        }
    }

    /// Tier reached at `now` for an episode that started at `blocked_since`.
    ///
    /// A `blocked_since` in the future (clock skew) counts as zero elapsed.
    pub fn at(blocked_since: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self::for_elapsed((now - blocked_since).max(Duration::zero()))
    }

    /// Numeric level, 1 through 4.
    pub fn level(&self) -> u8 {
        match self {
            Self::Tier1 => 1,
            Self::Tier2 => 2,
            Self::Tier3 => 3,
            Self::Tier4 => 4,
        }
    }

    /// Minimum blocked duration for this tier.
    pub fn threshold(&self) -> Duration {
        match self {
            Self::Tier1 => Duration::zero(),
            Self::Tier2 => Duration::minutes(TIER2_AFTER_MINUTES),
            Self::Tier3 => Duration::minutes(TIER3_AFTER_MINUTES),
            Self::Tier4 => Duration::minutes(TIER4_AFTER_MINUTES),
        }
    }
}

impl fmt::Display for EscalationTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.level())
    }
}

impl From<EscalationTier> for u8 {
    fn from(tier: EscalationTier) -> Self {
        tier.level()
    }
}

impl TryFrom<u8> for EscalationTier {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            1 => Ok(Self::Tier1),
            2 => Ok(Self::Tier2),
            3 => Ok(Self::Tier3),
            4 => Ok(Self::Tier4),
            other => Err(format!("escalation tier out of range: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds() {
        assert_eq!(EscalationTier::for_elapsed(Duration::zero()), EscalationTier::Tier1);
        assert_eq!(EscalationTier::for_elapsed(Duration::minutes(29)), EscalationTier::Tier1);
        assert_eq!(EscalationTier::for_elapsed(Duration::minutes(30)), EscalationTier::Tier2);
        assert_eq!(EscalationTier::for_elapsed(Duration::minutes(59)), EscalationTier::Tier2);
        assert_eq!(EscalationTier::for_elapsed(Duration::minutes(60)), EscalationTier::Tier3);
        assert_eq!(EscalationTier::for_elapsed(Duration::minutes(239)), EscalationTier::Tier3);
        assert_eq!(EscalationTier::for_elapsed(Duration::hours(4)), EscalationTier::Tier4);
        assert_eq!(EscalationTier::for_elapsed(Duration::days(3)), EscalationTier::Tier4);
    }

    #[test]
    fn test_tier_monotonic_in_elapsed_time() {
        let mut last = EscalationTier::Tier1;
        for minutes in 0..600 {
            let tier = EscalationTier::for_elapsed(Duration::minutes(minutes));
            assert!(tier >= last);
            last = tier;
        }
    }

    #[test]
    fn test_future_start_is_tier1() {
        let now = Utc::now();
        assert_eq!(
            EscalationTier::at(now + Duration::hours(5), now),
            EscalationTier::Tier1
        );
    }

    #[test]
    fn test_serializes_as_level() {
        assert_eq!(serde_json::to_string(&EscalationTier::Tier3).unwrap(), "3");
        let tier: EscalationTier = serde_json::from_str("2").unwrap();
        assert_eq!(tier, EscalationTier::Tier2);
        assert!(serde_json::from_str::<EscalationTier>("5").is_err());
    }
}
