//! Timestamp representation for serialization.
//!
//! Milliseconds since the Unix epoch are the canonical unit, matching what
//! telemetry sources report for `lastChange` and `retrievedAt`.

use core::time::Duration;

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Create from milliseconds since the epoch.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Create from seconds since the epoch, saturating at `u64::MAX`.
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1000))
    }

    /// Get the value in milliseconds.
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// The current wall-clock time.
    #[cfg(feature = "std")]
    pub fn now() -> Self {
        Self(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
        )
    }

    /// Time elapsed since `earlier`, saturating at zero.
    pub fn duration_since(&self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl From<Duration> for Timestamp {
    fn from(d: Duration) -> Self {
        Self(d.as_millis() as u64)
    }
}

impl core::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        let t = Timestamp::from_secs(2);
        assert_eq!(t.as_millis(), 2000);
        assert_eq!(Timestamp::from(Duration::from_millis(1500)).as_millis(), 1500);
    }

    #[test]
    fn duration_since_saturates() {
        let early = Timestamp::from_millis(100);
        let late = Timestamp::from_millis(350);
        assert_eq!(late.duration_since(early), Duration::from_millis(250));
        assert_eq!(early.duration_since(late), Duration::ZERO);
    }

    #[test]
    fn from_secs_saturates() {
        assert_eq!(Timestamp::from_secs(u64::MAX).as_millis(), u64::MAX);
        assert_eq!(Timestamp::from_secs(u64::MAX / 1000).as_millis(), (u64::MAX / 1000) * 1000);
    }

    #[test]
    fn ordering_follows_millis() {
        assert!(Timestamp::from_millis(1) < Timestamp::from_millis(2));
    }

    #[cfg(feature = "std")]
    #[test]
    fn now_is_after_2020() {
        assert!(Timestamp::now() > Timestamp::from_secs(1_577_836_800));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serializes_as_bare_number() {
        let json = serde_json::to_string(&Timestamp::from_millis(42)).unwrap();
        assert_eq!(json, "42");
    }
}
