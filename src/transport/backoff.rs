//! Back-off configuration for the receiver's read loop.

use std::time::Duration;

/// Pause schedule applied when reading the control device fails transiently.
///
/// The receiver sleeps `initial_delay` after the first failed read and twice
/// as long after each further consecutive failure, never more than
/// `max_delay`. Any successful read starts the schedule over. The defaults
/// are 10 ms and 1 s.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Pause after the first failed read.
    pub initial_delay: Duration,
    /// Longest pause between reads.
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl BackoffConfig {
    const FLOOR: Duration = Duration::from_millis(1);

    /// Raise both delays to at least one millisecond and order them.
    ///
    /// The transport applies this when it is built, so a reversed pair is
    /// accepted rather than rejected.
    #[must_use]
    pub fn normalized(self) -> Self {
        let a = self.initial_delay.max(Self::FLOOR);
        let b = self.max_delay.max(Self::FLOOR);
        Self {
            initial_delay: a.min(b),
            max_delay: a.max(b),
        }
    }

    /// Pause to use after one that lasted `current`.
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use mbimlink::transport::BackoffConfig;
    ///
    /// let backoff = BackoffConfig {
    ///     initial_delay: Duration::from_millis(300),
    ///     max_delay: Duration::from_secs(1),
    /// };
    /// let second = backoff.next_delay(backoff.initial_delay);
    /// assert_eq!(second, Duration::from_millis(600));
    /// assert_eq!(backoff.next_delay(second), Duration::from_secs(1));
    /// ```
    #[must_use]
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_delay)
    }
}
