use chrono::Duration;
use serde::{Deserialize, Serialize};

/// The set of lifetimes a sender may request.
///
/// Requested TTLs must be a member of the allowed set; anything else is
/// rejected rather than silently rounded, so a sender never gets a longer
/// (or shorter) lifetime than they asked for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtlPolicy {
    /// Allowed TTL values in seconds.
    #[serde(default = "default_allowed")]
    pub allowed_seconds: Vec<u64>,
    /// TTL applied when the sender does not request one. Must itself be
    /// a member of the allowed set.
    #[serde(default = "default_ttl")]
    pub default_seconds: u64,
}

fn default_allowed() -> Vec<u64> {
    // 1 hour, 24 hours, 3 days.
    vec![3_600, 86_400, 259_200]
}

fn default_ttl() -> u64 {
    86_400
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            allowed_seconds: default_allowed(),
            default_seconds: default_ttl(),
        }
    }
}

impl TtlPolicy {
    /// Resolve a requested TTL against the policy.
    ///
    /// Returns `None` when the requested value is not in the allowed set.
    /// An absent request resolves to the default.
    pub fn resolve(&self, requested: Option<u64>) -> Option<Duration> {
        let seconds = requested.unwrap_or(self.default_seconds);
        if !self.allowed_seconds.contains(&seconds) {
            return None;
        }
        Some(Duration::seconds(i64::try_from(seconds).ok()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_accepts_its_own_default() {
        let policy = TtlPolicy::default();
        assert_eq!(policy.resolve(None), Some(Duration::seconds(86_400)));
    }

    #[test]
    fn allowed_values_resolve() {
        let policy = TtlPolicy::default();
        assert_eq!(policy.resolve(Some(3_600)), Some(Duration::hours(1)));
        assert_eq!(policy.resolve(Some(259_200)), Some(Duration::days(3)));
    }

    #[test]
    fn out_of_set_values_are_rejected() {
        let policy = TtlPolicy::default();
        assert_eq!(policy.resolve(Some(0)), None);
        assert_eq!(policy.resolve(Some(7_200)), None);
        assert_eq!(policy.resolve(Some(u64::MAX)), None);
    }

    #[test]
    fn custom_set_is_honored() {
        let policy = TtlPolicy {
            allowed_seconds: vec![60, 600],
            default_seconds: 60,
        };
        assert_eq!(policy.resolve(Some(600)), Some(Duration::minutes(10)));
        assert_eq!(policy.resolve(Some(3_600)), None);
    }
}
